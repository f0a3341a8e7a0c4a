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

use super::{CommandEncoder, ShaderSourceResolver};
use crate::renderer::api::{
    pipeline::RenderPipeline,
    resource::{
        BufferId, BufferInfo, BufferUsage, SamplerDescriptor, SamplerId, TextureDescriptor,
        TextureId, TextureInfo, TextureViewId, TextureViewInfo,
    },
};
use crate::renderer::error::{GpuError, ShaderError};
use std::sync::Arc;

/// A pipeline after compilation against one shader-source resolver.
///
/// Compilation failures are values too: an invalid pipeline keeps its cache
/// slot so the same failing compile is not retried.
pub trait CompiledRenderPipeline: Send + Sync {
    /// `true` if both stages compiled and the program linked.
    fn is_valid(&self) -> bool;

    /// The description this pipeline was compiled from.
    fn pipeline(&self) -> &RenderPipeline;

    /// Why the pipeline is invalid, if it is.
    fn error(&self) -> Option<&ShaderError>;
}

/// The main contract of a graphics device.
///
/// A device owns every resource it creates. Handles are plain ids, checked
/// against the device's registries by every operation that consumes them.
/// All methods must be called from the thread that created the device.
pub trait GraphicsDevice: Send + Sync {
    // --- Buffers ---

    /// Creates an uninitialized buffer of `size` bytes.
    fn create_buffer(&self, label: &str, usage: BufferUsage, size: u64)
        -> Result<BufferId, GpuError>;

    /// Creates a buffer initialized with `data`.
    fn create_buffer_with_data(
        &self,
        label: &str,
        usage: BufferUsage,
        data: &[u8],
    ) -> Result<BufferId, GpuError>;

    /// Destroys a buffer. Its id is never handed out again.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), GpuError>;

    /// Metadata of a live buffer, `None` once destroyed.
    fn buffer_info(&self, id: BufferId) -> Option<BufferInfo>;

    // --- Textures ---

    /// Creates a texture, allocating every mip level (and face) eagerly.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, GpuError>;

    /// Destroys a texture and every view of it.
    fn destroy_texture(&self, id: TextureId) -> Result<(), GpuError>;

    /// Metadata of a live texture, `None` once destroyed.
    fn texture_info(&self, id: TextureId) -> Option<TextureInfo>;

    /// Creates a view over `mip_level_count` levels starting at `base_mip_level`.
    fn create_texture_view(
        &self,
        texture: TextureId,
        base_mip_level: u32,
        mip_level_count: u32,
    ) -> Result<TextureViewId, GpuError>;

    /// Creates a view over every mip level of `texture`.
    fn create_texture_view_full(&self, texture: TextureId) -> Result<TextureViewId, GpuError> {
        let info = self.texture_info(texture).ok_or_else(|| {
            GpuError::InvalidArgument("Can't create texture view with closed texture".into())
        })?;
        self.create_texture_view(texture, 0, info.mip_levels)
    }

    /// Destroys a texture view.
    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), GpuError>;

    /// Metadata of a live view, `None` once it or its texture is destroyed.
    fn texture_view_info(&self, id: TextureViewId) -> Option<TextureViewInfo>;

    // --- Samplers ---

    /// Creates a sampler.
    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, GpuError>;

    /// Destroys a sampler.
    fn destroy_sampler(&self, id: SamplerId) -> Result<(), GpuError>;

    // --- Pipelines ---

    /// Compiles `pipeline` against the default source resolver, or returns the
    /// cached result for its location.
    fn compile_pipeline_cached(&self, pipeline: &RenderPipeline)
        -> Arc<dyn CompiledRenderPipeline>;

    /// Compiles `pipeline` against an explicit resolver, `None` meaning the
    /// default one. Distinct resolvers get distinct cache entries.
    fn precompile_pipeline(
        &self,
        pipeline: &RenderPipeline,
        resolver: Option<Arc<dyn ShaderSourceResolver>>,
    ) -> Arc<dyn CompiledRenderPipeline>;

    /// Replaces the resolver used by [`compile_pipeline_cached`](Self::compile_pipeline_cached).
    fn set_default_source_resolver(&self, resolver: Arc<dyn ShaderSourceResolver>);

    /// Destroys every cached program and shader.
    fn clear_pipeline_cache(&self);

    // --- Commands ---

    /// Returns an encoder recording into this device.
    fn create_command_encoder(&self) -> Box<dyn CommandEncoder>;

    // --- Limits and introspection ---

    /// Required alignment of uniform slice offsets, in bytes.
    fn uniform_offset_alignment(&self) -> u64;

    /// Largest texture dimension the device accepts.
    fn max_texture_size(&self) -> u32;

    /// Largest sampler anisotropy, 1 when anisotropic filtering is unavailable.
    fn max_supported_anisotropy(&self) -> u32;

    /// Renderer string reported by the driver.
    fn renderer(&self) -> String;

    /// Vendor string reported by the driver.
    fn vendor(&self) -> String;

    /// Version string reported by the driver.
    fn version(&self) -> String;

    /// Name of the graphics API behind this device.
    fn backend_name(&self) -> &'static str;

    /// One-line description of the implementation for crash reports.
    fn implementation_information(&self) -> String;

    /// The optional capabilities the device actually uses.
    fn enabled_extensions(&self) -> Vec<String>;

    /// Releases cached GPU objects. The device should not be used afterwards.
    fn close(&self);
}
