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

//! Command recording: the encoder state machine and render passes.

use crate::renderer::api::{
    command::{FenceStatus, RenderObject, RenderPassDescriptor, TextureRegion},
    pipeline::RenderPipeline,
    resource::{BufferId, BufferSlice, SamplerId, TextureId, TextureViewId},
    util::IndexFormat,
};
use crate::renderer::error::GpuError;

/// CPU access to a mapped buffer range.
///
/// Writes become visible to the GPU when the view is dropped.
pub trait MappedView {
    /// The mapped bytes.
    fn data(&self) -> &[u8];

    /// The mapped bytes, writable.
    fn data_mut(&mut self) -> &mut [u8];
}

/// A synchronization point inserted in the command stream.
pub trait GpuFence: Send {
    /// Waits up to `timeout_ns` for the GPU to reach the fence.
    ///
    /// # Errors
    ///
    /// A failed wait is a [`GpuError::DeviceError`].
    fn await_completion(&self, timeout_ns: u64) -> Result<FenceStatus, GpuError>;
}

/// A GPU timer query measuring the time between begin and end.
pub trait GpuQuery: Send {
    /// Identity of the query within its device.
    fn id(&self) -> u64;

    /// Elapsed nanoseconds, `None` until the result is available.
    fn value(&self) -> Option<u64>;
}

/// Records commands against a device.
///
/// An encoder is either idle or has exactly one render pass open. Every
/// operation except [`create_render_pass`](Self::create_render_pass) and the
/// timer queries requires the idle state and fails with
/// [`GpuError::InvalidState`] otherwise.
pub trait CommandEncoder: Send {
    /// Opens a render pass on the given attachments.
    fn create_render_pass(
        &mut self,
        descriptor: &RenderPassDescriptor,
    ) -> Result<Box<dyn RenderPass>, GpuError>;

    /// Clears a whole color texture.
    fn clear_color_texture(&mut self, texture: TextureId, argb: u32) -> Result<(), GpuError>;

    /// Clears a color texture and a depth texture together.
    fn clear_color_and_depth_textures(
        &mut self,
        color: TextureId,
        argb: u32,
        depth: TextureId,
        depth_value: f64,
    ) -> Result<(), GpuError>;

    /// Clears a region of a color texture and a depth texture together.
    fn clear_color_and_depth_textures_region(
        &mut self,
        color: TextureId,
        argb: u32,
        depth: TextureId,
        depth_value: f64,
        region: TextureRegion,
    ) -> Result<(), GpuError>;

    /// Clears a whole depth texture.
    fn clear_depth_texture(&mut self, texture: TextureId, depth: f64) -> Result<(), GpuError>;

    /// Uploads `data` at the start of `slice`.
    fn write_to_buffer(&mut self, slice: BufferSlice, data: &[u8]) -> Result<(), GpuError>;

    /// Maps `slice` for reading and/or writing.
    fn map_buffer(
        &mut self,
        slice: BufferSlice,
        read: bool,
        write: bool,
    ) -> Result<Box<dyn MappedView + '_>, GpuError>;

    /// Copies `source` into `destination`. Both slices must have the same length.
    fn copy_to_buffer(
        &mut self,
        source: BufferSlice,
        destination: BufferSlice,
    ) -> Result<(), GpuError>;

    /// Uploads tightly packed texels into a region of one mip level.
    fn write_to_texture(
        &mut self,
        texture: TextureId,
        data: &[u8],
        mip_level: u32,
        region: TextureRegion,
    ) -> Result<(), GpuError>;

    /// Reads back a region of one mip level (the whole level when `None`)
    /// into `buffer` at `offset`.
    fn copy_texture_to_buffer(
        &mut self,
        texture: TextureId,
        buffer: BufferId,
        offset: u64,
        mip_level: u32,
        region: Option<TextureRegion>,
    ) -> Result<(), GpuError>;

    /// Copies `source_region` of `source` to `(dest_x, dest_y)` in `destination`.
    fn copy_texture_to_texture(
        &mut self,
        source: TextureId,
        destination: TextureId,
        mip_level: u32,
        dest_x: u32,
        dest_y: u32,
        source_region: TextureRegion,
    ) -> Result<(), GpuError>;

    /// Blits a color view to the screen.
    fn present_texture(&mut self, view: TextureViewId) -> Result<(), GpuError>;

    /// Inserts a fence after every command recorded so far.
    fn create_fence(&mut self) -> Result<Box<dyn GpuFence>, GpuError>;

    /// Starts the encoder's single timer query.
    fn timer_query_begin(&mut self) -> Result<Box<dyn GpuQuery>, GpuError>;

    /// Ends the active timer query, which must be `query`.
    fn timer_query_end(&mut self, query: &dyn GpuQuery) -> Result<(), GpuError>;
}

/// An open render pass.
///
/// A pass does not borrow its encoder: the encoder tracks the open pass and
/// rejects other work until [`close`](Self::close) succeeds or the pass is
/// dropped. Every method fails with [`GpuError::InvalidState`] once closed.
pub trait RenderPass: Send {
    /// Binds a pipeline, compiling it through the device cache.
    fn set_pipeline(&mut self, pipeline: &RenderPipeline) -> Result<(), GpuError>;

    /// Binds a view and sampler to sampler `name`, or unbinds it.
    fn bind_texture(
        &mut self,
        name: &str,
        binding: Option<(TextureViewId, SamplerId)>,
    ) -> Result<(), GpuError>;

    /// Binds a slice to uniform `name`. The offset must be aligned.
    fn set_uniform(&mut self, name: &str, slice: BufferSlice) -> Result<(), GpuError>;

    /// Binds a whole buffer to uniform `name`.
    fn set_uniform_buffer(&mut self, name: &str, buffer: BufferId) -> Result<(), GpuError>;

    /// Binds the vertex buffer. Only slot 0 exists.
    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId) -> Result<(), GpuError>;

    /// Binds or unbinds the index buffer.
    fn set_index_buffer(
        &mut self,
        buffer: Option<BufferId>,
        format: IndexFormat,
    ) -> Result<(), GpuError>;

    /// Restricts rendering to a rectangle.
    fn enable_scissor(&mut self, x: i32, y: i32, width: i32, height: i32)
        -> Result<(), GpuError>;

    /// Renders to the whole target again.
    fn disable_scissor(&mut self) -> Result<(), GpuError>;

    /// Opens a nested debug group.
    fn push_debug_group(&mut self, label: &str) -> Result<(), GpuError>;

    /// Closes the innermost debug group pushed on this pass.
    fn pop_debug_group(&mut self) -> Result<(), GpuError>;

    /// Draws `vertex_count` vertices starting at `first_vertex`.
    fn draw(&mut self, first_vertex: u32, vertex_count: u32) -> Result<(), GpuError>;

    /// Draws indexed geometry from the bound index buffer.
    fn draw_indexed(
        &mut self,
        base_vertex: i32,
        first_index: u32,
        index_count: u32,
        instance_count: u32,
    ) -> Result<(), GpuError>;

    /// Draws several objects with the bound pipeline. Objects without their
    /// own index buffer use `shared_index_buffer`. Uniforms in
    /// `exempt_uniforms` may be left unbound.
    fn draw_multiple_indexed(
        &mut self,
        objects: &[RenderObject],
        shared_index_buffer: Option<BufferId>,
        shared_index_format: Option<IndexFormat>,
        exempt_uniforms: &[&str],
    ) -> Result<(), GpuError>;

    /// Ends the pass.
    ///
    /// # Errors
    ///
    /// Fails with [`GpuError::InvalidState`], leaving the pass open, while
    /// debug groups pushed on the pass are still open.
    fn close(&mut self) -> Result<(), GpuError>;

    /// `true` once the pass has been closed.
    fn is_closed(&self) -> bool;
}
