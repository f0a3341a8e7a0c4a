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

//! The stateful driver seam the GL backend is written against.
//!
//! Object-taking entry points use direct-state-access style: they name the
//! object they act on instead of relying on a bind point, except where the
//! API itself is bind-based (framebuffers, programs, vertex arrays, units).

use super::consts::GLenum;

/// A driver object name. `0` is the null object.
pub type GlName = u32;

/// The low-level graphics API the backend drives.
///
/// Errors are reported the OpenGL way: calls never fail directly, they record
/// an error code that [`GlDriver::get_error`] returns and clears.
pub trait GlDriver: Send {
    // --- Queries ---

    /// `glGetString`.
    fn get_string(&self, name: GLenum) -> String;
    /// `glGetIntegerv` for a single value.
    fn get_integer(&self, name: GLenum) -> i32;
    /// Every extension string the context advertises.
    fn extensions(&self) -> Vec<String>;
    /// Returns and clears the oldest recorded error, or `NO_ERROR`.
    fn get_error(&mut self) -> GLenum;

    // --- Buffers ---

    /// Creates a buffer object without storage.
    fn create_buffer(&mut self) -> GlName;
    /// Deletes a buffer object. Its name may be handed out again.
    fn delete_buffer(&mut self, buffer: GlName);
    /// Allocates mutable storage with a usage hint.
    fn buffer_data(&mut self, buffer: GlName, size: u64, data: Option<&[u8]>, usage: GLenum);
    /// Allocates immutable storage with `*_BIT` flags.
    fn buffer_storage(&mut self, buffer: GlName, size: u64, data: Option<&[u8]>, flags: GLenum);
    /// Updates part of the buffer store.
    fn buffer_sub_data(&mut self, buffer: GlName, offset: u64, data: &[u8]);
    /// Maps a range and returns a staged copy of its contents.
    fn map_buffer_range(
        &mut self,
        buffer: GlName,
        offset: u64,
        length: u64,
        access: GLenum,
    ) -> Option<Vec<u8>>;
    /// Unmaps the buffer, writing `written` back into the mapped range.
    fn unmap_buffer(&mut self, buffer: GlName, written: Option<&[u8]>) -> bool;
    /// Copies between two buffer stores.
    fn copy_buffer_sub_data(
        &mut self,
        source: GlName,
        destination: GlName,
        source_offset: u64,
        destination_offset: u64,
        size: u64,
    );
    /// Binds a buffer to a non-indexed target.
    fn bind_buffer(&mut self, target: GLenum, buffer: GlName);
    /// Binds a range of a buffer to an indexed target.
    fn bind_buffer_range(
        &mut self,
        target: GLenum,
        index: u32,
        buffer: GlName,
        offset: u64,
        size: u64,
    );

    // --- Textures ---

    /// Creates a texture object for `target`.
    fn create_texture(&mut self, target: GLenum) -> GlName;
    /// Deletes a texture object.
    fn delete_texture(&mut self, texture: GlName);
    /// Allocates one mip level of one face. `face` is `TEXTURE_2D` or a cube face.
    #[allow(clippy::too_many_arguments)]
    fn tex_image_2d(
        &mut self,
        texture: GlName,
        face: GLenum,
        level: u32,
        internal_format: GLenum,
        width: u32,
        height: u32,
        data: Option<&[u8]>,
    );
    /// Uploads a region of one mip level.
    #[allow(clippy::too_many_arguments)]
    fn tex_sub_image_2d(
        &mut self,
        texture: GlName,
        level: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: &[u8],
    );
    /// `glTexParameteri`.
    fn tex_parameter(&mut self, texture: GlName, name: GLenum, value: i32);
    /// Whether a square `size` texture would fit, using the proxy target.
    fn proxy_texture_fits(&mut self, size: u32) -> bool;
    /// Attaches a buffer store to a buffer texture.
    fn tex_buffer(&mut self, texture: GlName, internal_format: GLenum, buffer: GlName);
    /// Binds a texture to a texture unit.
    fn bind_texture_unit(&mut self, unit: u32, target: GLenum, texture: GlName);

    // --- Samplers ---

    /// Creates a sampler object.
    fn create_sampler(&mut self) -> GlName;
    /// Deletes a sampler object.
    fn delete_sampler(&mut self, sampler: GlName);
    /// `glSamplerParameteri`.
    fn sampler_parameter(&mut self, sampler: GlName, name: GLenum, value: i32);
    /// `glSamplerParameterf`.
    fn sampler_parameter_f(&mut self, sampler: GlName, name: GLenum, value: f32);
    /// Binds a sampler to a texture unit.
    fn bind_sampler(&mut self, unit: u32, sampler: GlName);

    // --- Framebuffers ---

    /// Creates a framebuffer object.
    fn create_framebuffer(&mut self) -> GlName;
    /// Deletes a framebuffer object.
    fn delete_framebuffer(&mut self, framebuffer: GlName);
    /// Attaches a mip level of a texture, or detaches with texture `0`.
    fn framebuffer_texture(
        &mut self,
        framebuffer: GlName,
        attachment: GLenum,
        texture: GlName,
        level: u32,
    );
    /// Binds a framebuffer to `FRAMEBUFFER`, `READ_FRAMEBUFFER` or `DRAW_FRAMEBUFFER`.
    fn bind_framebuffer(&mut self, target: GLenum, framebuffer: GlName);
    /// Sets the color used by the next color clear.
    fn clear_color(&mut self, rgba: [f32; 4]);
    /// Sets the depth used by the next depth clear.
    fn clear_depth(&mut self, depth: f64);
    /// Clears the draw framebuffer, honoring scissor and write masks.
    fn clear(&mut self, mask: GLenum);
    /// Copies a rectangle from the read framebuffer to the draw framebuffer.
    fn blit_framebuffer(
        &mut self,
        source: [i32; 4],
        destination: [i32; 4],
        mask: GLenum,
        filter: GLenum,
    );
    /// Reads pixels from the read framebuffer into a buffer at `offset`.
    #[allow(clippy::too_many_arguments)]
    fn read_pixels_to_buffer(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        format: GLenum,
        buffer: GlName,
        offset: u64,
    );

    // --- Shaders and programs ---

    /// Creates a shader object of the given stage.
    fn create_shader(&mut self, kind: GLenum) -> GlName;
    /// Deletes a shader object.
    fn delete_shader(&mut self, shader: GlName);
    /// Replaces the shader source.
    fn shader_source(&mut self, shader: GlName, source: &str);
    /// Compiles the shader.
    fn compile_shader(&mut self, shader: GlName);
    /// `GL_COMPILE_STATUS`.
    fn shader_compile_status(&self, shader: GlName) -> bool;
    /// The shader info log.
    fn shader_info_log(&self, shader: GlName) -> String;
    /// Creates a program object.
    fn create_program(&mut self) -> GlName;
    /// Deletes a program object.
    fn delete_program(&mut self, program: GlName);
    /// Attaches a shader to a program.
    fn attach_shader(&mut self, program: GlName, shader: GlName);
    /// Binds a vertex attribute name to a location before linking.
    fn bind_attrib_location(&mut self, program: GlName, index: u32, name: &str);
    /// Links the program.
    fn link_program(&mut self, program: GlName);
    /// `GL_LINK_STATUS`.
    fn program_link_status(&self, program: GlName) -> bool;
    /// The program info log.
    fn program_info_log(&self, program: GlName) -> String;
    /// Makes the program current.
    fn use_program(&mut self, program: GlName);
    /// The location of a non-block uniform, if active.
    fn get_uniform_location(&self, program: GlName, name: &str) -> Option<i32>;
    /// The index of a uniform block, if active.
    fn get_uniform_block_index(&self, program: GlName, name: &str) -> Option<u32>;
    /// The names of every active uniform block, by index.
    fn active_uniform_blocks(&self, program: GlName) -> Vec<String>;
    /// Assigns a binding point to a uniform block.
    fn uniform_block_binding(&mut self, program: GlName, block: u32, binding: u32);
    /// Sets an integer uniform of the current program.
    fn uniform_1i(&mut self, location: i32, value: i32);

    // --- Vertex arrays ---

    /// Creates a vertex array object.
    fn create_vertex_array(&mut self) -> GlName;
    /// Deletes a vertex array object.
    fn delete_vertex_array(&mut self, vertex_array: GlName);
    /// Binds a vertex array object.
    fn bind_vertex_array(&mut self, vertex_array: GlName);
    /// Enables an attribute of the bound vertex array.
    fn enable_vertex_attrib_array(&mut self, index: u32);
    /// Declares the format of an attribute fetched as float.
    fn vertex_attrib_format(
        &mut self,
        index: u32,
        size: u32,
        kind: GLenum,
        normalized: bool,
        relative_offset: u32,
    );
    /// Declares the format of an attribute fetched as integer.
    fn vertex_attrib_i_format(&mut self, index: u32, size: u32, kind: GLenum, relative_offset: u32);
    /// Routes an attribute to a buffer binding slot.
    fn vertex_attrib_binding(&mut self, index: u32, binding: u32);
    /// Binds a buffer to a vertex buffer binding slot.
    fn bind_vertex_buffer(&mut self, binding: u32, buffer: GlName, offset: u64, stride: u32);
    /// Specifies a float attribute from the bound array buffer.
    fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: u32,
        kind: GLenum,
        normalized: bool,
        stride: u32,
        offset: u64,
    );
    /// Specifies an integer attribute from the bound array buffer.
    fn vertex_attrib_i_pointer(&mut self, index: u32, size: u32, kind: GLenum, stride: u32, offset: u64);

    // --- Fixed-function state ---

    /// `glEnable` / `glDisable`.
    fn set_capability(&mut self, capability: GLenum, enabled: bool);
    /// `glDepthFunc`.
    fn depth_func(&mut self, func: GLenum);
    /// `glDepthMask`.
    fn depth_mask(&mut self, write: bool);
    /// `glColorMask`.
    fn color_mask(&mut self, red: bool, green: bool, blue: bool, alpha: bool);
    /// `glBlendFuncSeparate`.
    fn blend_func_separate(
        &mut self,
        source_rgb: GLenum,
        destination_rgb: GLenum,
        source_alpha: GLenum,
        destination_alpha: GLenum,
    );
    /// `glPolygonMode` for front and back faces.
    fn polygon_mode(&mut self, mode: GLenum);
    /// `glPolygonOffset`.
    fn polygon_offset(&mut self, factor: f32, units: f32);
    /// `glLogicOp`.
    fn logic_op(&mut self, op: GLenum);
    /// `glScissor`.
    fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32);
    /// `glViewport`.
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32);

    // --- Draws ---

    /// `glDrawArrays`.
    fn draw_arrays(&mut self, mode: GLenum, first: u32, count: u32);
    /// `glDrawElements`. `offset` is a byte offset into the element buffer.
    fn draw_elements(&mut self, mode: GLenum, count: u32, index_type: GLenum, offset: u64);
    /// `glDrawElementsBaseVertex`.
    fn draw_elements_base_vertex(
        &mut self,
        mode: GLenum,
        count: u32,
        index_type: GLenum,
        offset: u64,
        base_vertex: i32,
    );
    /// `glDrawElementsInstanced`.
    fn draw_elements_instanced(
        &mut self,
        mode: GLenum,
        count: u32,
        index_type: GLenum,
        offset: u64,
        instances: u32,
    );
    /// `glDrawElementsInstancedBaseVertex`.
    fn draw_elements_instanced_base_vertex(
        &mut self,
        mode: GLenum,
        count: u32,
        index_type: GLenum,
        offset: u64,
        instances: u32,
        base_vertex: i32,
    );

    // --- Debug ---

    /// `glObjectLabel` (core / `GL_KHR_debug`).
    fn object_label(&mut self, identifier: GLenum, name: GlName, label: &str);
    /// `glLabelObjectEXT` (`GL_EXT_debug_label`).
    fn label_object_ext(&mut self, kind: GLenum, name: GlName, label: &str);
    /// `glPushDebugGroup`.
    fn push_debug_group(&mut self, message: &str);
    /// `glPopDebugGroup`.
    fn pop_debug_group(&mut self);

    // --- Sync ---

    /// Inserts a fence after all submitted work.
    fn fence_sync(&mut self) -> GlName;
    /// Waits for a fence. Returns one of the `*_SIGNALED`, `TIMEOUT_EXPIRED`,
    /// `CONDITION_SATISFIED` or `WAIT_FAILED` codes.
    fn client_wait_sync(&mut self, sync: GlName, timeout_ns: u64) -> GLenum;
    /// Deletes a fence.
    fn delete_sync(&mut self, sync: GlName);
    /// Creates a query object.
    fn create_query(&mut self) -> GlName;
    /// Deletes a query object.
    fn delete_query(&mut self, query: GlName);
    /// Starts a query on `target`.
    fn begin_query(&mut self, target: GLenum, query: GlName);
    /// Ends the active query on `target`.
    fn end_query(&mut self, target: GLenum);
    /// `GL_QUERY_RESULT_AVAILABLE`.
    fn query_result_available(&mut self, query: GlName) -> bool;
    /// `GL_QUERY_RESULT` as 64 bits.
    fn query_result(&mut self, query: GlName) -> u64;
}
