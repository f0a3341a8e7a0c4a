// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! `GLenum` values used across the driver seam.
//!
//! Values match the OpenGL registry so a native driver can pass them through.

#![allow(missing_docs)]

/// A raw `GLenum` / `GLbitfield` value.
pub type GLenum = u32;

// --- Errors ---
pub const NO_ERROR: GLenum = 0;
pub const INVALID_ENUM: GLenum = 0x0500;
pub const INVALID_VALUE: GLenum = 0x0501;
pub const INVALID_OPERATION: GLenum = 0x0502;
pub const OUT_OF_MEMORY: GLenum = 0x0505;

// --- Strings and limits ---
pub const VENDOR: GLenum = 0x1F00;
pub const RENDERER: GLenum = 0x1F01;
pub const VERSION: GLenum = 0x1F02;
pub const MAX_TEXTURE_SIZE: GLenum = 0x0D33;
pub const MAX_LABEL_LENGTH: GLenum = 0x82E8;
pub const UNIFORM_BUFFER_OFFSET_ALIGNMENT: GLenum = 0x8A34;
pub const MAX_TEXTURE_MAX_ANISOTROPY: GLenum = 0x84FF;

// --- Extensions ---
pub const EXT_KHR_DEBUG: &str = "GL_KHR_debug";
pub const EXT_DEBUG_LABEL: &str = "GL_EXT_debug_label";
pub const EXT_VERTEX_ATTRIB_BINDING: &str = "GL_ARB_vertex_attrib_binding";
pub const EXT_BUFFER_STORAGE: &str = "GL_ARB_buffer_storage";
pub const EXT_TEXTURE_FILTER_ANISOTROPIC: &str = "GL_EXT_texture_filter_anisotropic";

// --- Buffers ---
pub const ARRAY_BUFFER: GLenum = 0x8892;
pub const ELEMENT_ARRAY_BUFFER: GLenum = 0x8893;
pub const UNIFORM_BUFFER: GLenum = 0x8A11;
pub const STREAM_DRAW: GLenum = 0x88E0;
pub const STREAM_READ: GLenum = 0x88E1;
pub const STATIC_DRAW: GLenum = 0x88E4;
pub const STATIC_READ: GLenum = 0x88E5;
pub const DYNAMIC_DRAW: GLenum = 0x88E8;
pub const MAP_READ_BIT: GLenum = 0x0001;
pub const MAP_WRITE_BIT: GLenum = 0x0002;
pub const MAP_PERSISTENT_BIT: GLenum = 0x0040;
pub const DYNAMIC_STORAGE_BIT: GLenum = 0x0100;
pub const CLIENT_STORAGE_BIT: GLenum = 0x0200;

// --- Textures ---
pub const TEXTURE_2D: GLenum = 0x0DE1;
pub const TEXTURE_CUBE_MAP: GLenum = 0x8513;
pub const TEXTURE_CUBE_MAP_POSITIVE_X: GLenum = 0x8515;
pub const TEXTURE_BUFFER: GLenum = 0x8C2A;
pub const RGBA8: GLenum = 0x8058;
pub const R8: GLenum = 0x8229;
pub const R8I: GLenum = 0x8231;
pub const DEPTH_COMPONENT32F: GLenum = 0x8CAC;
pub const RGBA: GLenum = 0x1908;
pub const RED: GLenum = 0x1903;
pub const RED_INTEGER: GLenum = 0x8D94;
pub const DEPTH_COMPONENT: GLenum = 0x1902;
pub const TEXTURE_MAG_FILTER: GLenum = 0x2800;
pub const TEXTURE_MIN_FILTER: GLenum = 0x2801;
pub const TEXTURE_WRAP_S: GLenum = 0x2802;
pub const TEXTURE_WRAP_T: GLenum = 0x2803;
pub const TEXTURE_MAX_LOD: GLenum = 0x813B;
pub const TEXTURE_BASE_LEVEL: GLenum = 0x813C;
pub const TEXTURE_MAX_LEVEL: GLenum = 0x813D;
pub const TEXTURE_MAX_ANISOTROPY: GLenum = 0x84FE;
pub const NEAREST: GLenum = 0x2600;
pub const LINEAR: GLenum = 0x2601;
pub const NEAREST_MIPMAP_LINEAR: GLenum = 0x2702;
pub const LINEAR_MIPMAP_LINEAR: GLenum = 0x2703;
pub const REPEAT: GLenum = 0x2901;
pub const CLAMP_TO_EDGE: GLenum = 0x812F;

// --- Framebuffers ---
pub const FRAMEBUFFER: GLenum = 0x8D40;
pub const READ_FRAMEBUFFER: GLenum = 0x8CA8;
pub const DRAW_FRAMEBUFFER: GLenum = 0x8CA9;
pub const COLOR_ATTACHMENT0: GLenum = 0x8CE0;
pub const DEPTH_ATTACHMENT: GLenum = 0x8D00;
pub const COLOR_BUFFER_BIT: GLenum = 0x4000;
pub const DEPTH_BUFFER_BIT: GLenum = 0x0100;

// --- Shaders ---
pub const VERTEX_SHADER: GLenum = 0x8B31;
pub const FRAGMENT_SHADER: GLenum = 0x8B30;

// --- Fixed-function state ---
pub const DEPTH_TEST: GLenum = 0x0B71;
pub const CULL_FACE: GLenum = 0x0B44;
pub const BLEND: GLenum = 0x0BE2;
pub const SCISSOR_TEST: GLenum = 0x0C11;
pub const POLYGON_OFFSET_FILL: GLenum = 0x8037;
pub const COLOR_LOGIC_OP: GLenum = 0x0BF2;
pub const NEVER: GLenum = 0x0200;
pub const LESS: GLenum = 0x0201;
pub const EQUAL: GLenum = 0x0202;
pub const LEQUAL: GLenum = 0x0203;
pub const GREATER: GLenum = 0x0204;
pub const ALWAYS: GLenum = 0x0207;
pub const FRONT_AND_BACK: GLenum = 0x0408;
pub const LINE: GLenum = 0x1B01;
pub const FILL: GLenum = 0x1B02;
pub const COPY: GLenum = 0x1503;
pub const OR_REVERSE: GLenum = 0x150B;
pub const ZERO: GLenum = 0;
pub const ONE: GLenum = 1;
pub const SRC_COLOR: GLenum = 0x0300;
pub const ONE_MINUS_SRC_COLOR: GLenum = 0x0301;
pub const SRC_ALPHA: GLenum = 0x0302;
pub const ONE_MINUS_SRC_ALPHA: GLenum = 0x0303;
pub const DST_ALPHA: GLenum = 0x0304;
pub const ONE_MINUS_DST_ALPHA: GLenum = 0x0305;
pub const DST_COLOR: GLenum = 0x0306;
pub const ONE_MINUS_DST_COLOR: GLenum = 0x0307;

// --- Vertex data and draws ---
pub const BYTE: GLenum = 0x1400;
pub const UNSIGNED_BYTE: GLenum = 0x1401;
pub const SHORT: GLenum = 0x1402;
pub const UNSIGNED_SHORT: GLenum = 0x1403;
pub const INT: GLenum = 0x1404;
pub const UNSIGNED_INT: GLenum = 0x1405;
pub const FLOAT: GLenum = 0x1406;
pub const POINTS: GLenum = 0x0000;
pub const LINES: GLenum = 0x0001;
pub const LINE_STRIP: GLenum = 0x0003;
pub const TRIANGLES: GLenum = 0x0004;
pub const TRIANGLE_STRIP: GLenum = 0x0005;
pub const TRIANGLE_FAN: GLenum = 0x0006;

// --- Object identifiers for labels ---
pub const BUFFER: GLenum = 0x82E0;
pub const SHADER: GLenum = 0x82E1;
pub const PROGRAM: GLenum = 0x82E2;
pub const VERTEX_ARRAY: GLenum = 0x8074;
pub const TEXTURE: GLenum = 0x1702;
pub const BUFFER_OBJECT_EXT: GLenum = 0x9151;
pub const SHADER_OBJECT_EXT: GLenum = 0x8B48;
pub const PROGRAM_OBJECT_EXT: GLenum = 0x8B40;
pub const VERTEX_ARRAY_OBJECT_EXT: GLenum = 0x9154;

// --- Sync and queries ---
pub const ALREADY_SIGNALED: GLenum = 0x911A;
pub const TIMEOUT_EXPIRED: GLenum = 0x911B;
pub const CONDITION_SATISFIED: GLenum = 0x911C;
pub const WAIT_FAILED: GLenum = 0x911D;
pub const TIME_ELAPSED: GLenum = 0x88BF;
