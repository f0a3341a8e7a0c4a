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

use super::consts::{self as gl, GLenum};

use kiln_core::renderer::api::pipeline::{
    BlendFactor, DepthTestFunction, LogicOp, PolygonMode, PrimitiveTopology, VertexType,
};
use kiln_core::renderer::api::resource::{AddressMode, FilterMode};
use kiln_core::renderer::api::util::{IndexFormat, ShaderStage, TextureFormat};

/// A local extension trait to convert our engine's types into GL enums.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_gl()` syntax.
pub trait IntoGl<T> {
    /// Consumes self and converts it into a GL-compatible value.
    fn into_gl(self) -> T;
}

/// The three enums GL needs to allocate and transfer a texture format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlTextureFormat {
    /// Sized internal format.
    pub internal: GLenum,
    /// Pixel transfer format.
    pub format: GLenum,
    /// Pixel transfer component type.
    pub kind: GLenum,
}

impl IntoGl<GlTextureFormat> for TextureFormat {
    fn into_gl(self) -> GlTextureFormat {
        let (internal, format, kind) = match self {
            TextureFormat::Rgba8Unorm => (gl::RGBA8, gl::RGBA, gl::UNSIGNED_BYTE),
            TextureFormat::R8Unorm => (gl::R8, gl::RED, gl::UNSIGNED_BYTE),
            TextureFormat::R8Sint => (gl::R8I, gl::RED_INTEGER, gl::BYTE),
            TextureFormat::Depth32Float => (gl::DEPTH_COMPONENT32F, gl::DEPTH_COMPONENT, gl::FLOAT),
        };
        GlTextureFormat {
            internal,
            format,
            kind,
        }
    }
}

// --- Pipeline state ---

impl IntoGl<GLenum> for DepthTestFunction {
    fn into_gl(self) -> GLenum {
        match self {
            DepthTestFunction::NoDepthTest => gl::ALWAYS,
            DepthTestFunction::Equal => gl::EQUAL,
            DepthTestFunction::LessEqual => gl::LEQUAL,
            DepthTestFunction::Less => gl::LESS,
            DepthTestFunction::Greater => gl::GREATER,
        }
    }
}

impl IntoGl<GLenum> for BlendFactor {
    fn into_gl(self) -> GLenum {
        match self {
            BlendFactor::Zero => gl::ZERO,
            BlendFactor::One => gl::ONE,
            BlendFactor::SrcColor => gl::SRC_COLOR,
            BlendFactor::OneMinusSrcColor => gl::ONE_MINUS_SRC_COLOR,
            BlendFactor::SrcAlpha => gl::SRC_ALPHA,
            BlendFactor::OneMinusSrcAlpha => gl::ONE_MINUS_SRC_ALPHA,
            BlendFactor::DstColor => gl::DST_COLOR,
            BlendFactor::OneMinusDstColor => gl::ONE_MINUS_DST_COLOR,
            BlendFactor::DstAlpha => gl::DST_ALPHA,
            BlendFactor::OneMinusDstAlpha => gl::ONE_MINUS_DST_ALPHA,
        }
    }
}

impl IntoGl<GLenum> for PolygonMode {
    fn into_gl(self) -> GLenum {
        match self {
            PolygonMode::Fill => gl::FILL,
            PolygonMode::Wireframe => gl::LINE,
        }
    }
}

impl IntoGl<Option<GLenum>> for LogicOp {
    fn into_gl(self) -> Option<GLenum> {
        match self {
            LogicOp::None => None,
            LogicOp::OrReverse => Some(gl::OR_REVERSE),
        }
    }
}

impl IntoGl<GLenum> for PrimitiveTopology {
    fn into_gl(self) -> GLenum {
        match self {
            PrimitiveTopology::Points => gl::POINTS,
            PrimitiveTopology::Lines => gl::LINES,
            PrimitiveTopology::LineStrip => gl::LINE_STRIP,
            PrimitiveTopology::Triangles => gl::TRIANGLES,
            PrimitiveTopology::TriangleStrip => gl::TRIANGLE_STRIP,
            PrimitiveTopology::TriangleFan => gl::TRIANGLE_FAN,
        }
    }
}

// --- Vertex and index data ---

impl IntoGl<GLenum> for IndexFormat {
    fn into_gl(self) -> GLenum {
        match self {
            IndexFormat::Uint16 => gl::UNSIGNED_SHORT,
            IndexFormat::Uint32 => gl::UNSIGNED_INT,
        }
    }
}

impl IntoGl<GLenum> for VertexType {
    fn into_gl(self) -> GLenum {
        match self {
            VertexType::Float => gl::FLOAT,
            VertexType::UByte => gl::UNSIGNED_BYTE,
            VertexType::Byte => gl::BYTE,
            VertexType::UShort => gl::UNSIGNED_SHORT,
            VertexType::Short => gl::SHORT,
            VertexType::UInt => gl::UNSIGNED_INT,
            VertexType::Int => gl::INT,
        }
    }
}

// --- Samplers ---

impl IntoGl<GLenum> for AddressMode {
    fn into_gl(self) -> GLenum {
        match self {
            AddressMode::Repeat => gl::REPEAT,
            AddressMode::ClampToEdge => gl::CLAMP_TO_EDGE,
        }
    }
}

/// Converts a filter into its magnification (plain) form.
impl IntoGl<GLenum> for FilterMode {
    fn into_gl(self) -> GLenum {
        match self {
            FilterMode::Nearest => gl::NEAREST,
            FilterMode::Linear => gl::LINEAR,
        }
    }
}

/// The minification filter, which samples between mip levels when the
/// sampler has a level-of-detail range.
pub fn min_filter(filter: FilterMode, mipmapped: bool) -> GLenum {
    match (filter, mipmapped) {
        (FilterMode::Nearest, true) => gl::NEAREST_MIPMAP_LINEAR,
        (FilterMode::Linear, true) => gl::LINEAR_MIPMAP_LINEAR,
        (filter, false) => filter.into_gl(),
    }
}

// --- Shaders ---

impl IntoGl<GLenum> for ShaderStage {
    fn into_gl(self) -> GLenum {
        match self {
            ShaderStage::Vertex => gl::VERTEX_SHADER,
            ShaderStage::Fragment => gl::FRAGMENT_SHADER,
        }
    }
}
