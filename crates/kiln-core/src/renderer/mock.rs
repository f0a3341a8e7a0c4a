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

//! An in-memory device used by the unit tests of this crate.

#![allow(dead_code)]

use crate::renderer::{
    api::*,
    error::{GpuError, ShaderError},
    traits::*,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What the mock saw, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    OpenPass(String),
    SetPipeline(String),
    BindTexture(String, Option<TextureViewId>),
    SetUniform(String, BufferSlice),
    Draw(u32, u32),
    ClosePass,
}

struct Compiled {
    pipeline: RenderPipeline,
    error: Option<ShaderError>,
}

impl CompiledRenderPipeline for Compiled {
    fn is_valid(&self) -> bool {
        self.error.is_none()
    }
    fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }
    fn error(&self) -> Option<&ShaderError> {
        self.error.as_ref()
    }
}

#[derive(Default)]
struct State {
    buffers: HashMap<usize, (BufferInfo, Vec<u8>)>,
    textures: HashMap<usize, TextureInfo>,
    views: HashMap<usize, TextureViewInfo>,
    samplers: Vec<usize>,
    cache: HashMap<(String, usize), Arc<Compiled>>,
    default_resolver: Option<Arc<dyn ShaderSourceResolver>>,
    compiles: usize,
    maps: usize,
    events: Vec<Event>,
    /// Buffer creations left before `create_buffer` starts failing.
    buffers_until_failure: Option<usize>,
}

pub struct MockDevice {
    next_id: AtomicUsize,
    state: Arc<Mutex<State>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(1),
            state: Arc::new(Mutex::new(State {
                default_resolver: Some(Arc::new(EmptySources)),
                ..State::default()
            })),
        }
    }

    fn next(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Lets `count` more buffers be created, then fails every creation.
    pub fn fail_buffers_after(&self, count: usize) {
        self.lock().buffers_until_failure = Some(count);
    }

    pub fn live_buffers(&self) -> usize {
        self.lock().buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.lock().textures.len()
    }

    pub fn map_count(&self) -> usize {
        self.lock().maps
    }

    pub fn compile_count(&self) -> usize {
        self.lock().compiles
    }

    pub fn buffer_contents(&self, id: BufferId) -> Vec<u8> {
        self.lock()
            .buffers
            .get(&id.0)
            .map(|(_, data)| data.clone())
            .unwrap_or_default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    pub fn cached_pipelines(&self) -> usize {
        self.lock().cache.len()
    }

    fn compile(
        &self,
        pipeline: &RenderPipeline,
        resolver: Arc<dyn ShaderSourceResolver>,
    ) -> Arc<dyn CompiledRenderPipeline> {
        let key = (
            pipeline.location.clone(),
            Arc::as_ptr(&resolver) as *const () as usize,
        );
        let mut state = self.lock();
        if let Some(hit) = state.cache.get(&key) {
            return hit.clone();
        }
        state.compiles += 1;
        let error = [
            (ShaderStage::Vertex, &pipeline.vertex_shader),
            (ShaderStage::Fragment, &pipeline.fragment_shader),
        ]
        .into_iter()
        .find(|(stage, id)| resolver.source(id, *stage).is_none())
        .map(|(stage, id)| ShaderError::SourceNotFound {
            id: id.clone(),
            stage,
        });
        let compiled = Arc::new(Compiled {
            pipeline: pipeline.clone(),
            error,
        });
        state.cache.insert(key, compiled.clone());
        compiled
    }
}

impl GraphicsDevice for MockDevice {
    fn create_buffer(&self, label: &str, usage: BufferUsage, size: u64) -> Result<BufferId, GpuError> {
        if size == 0 {
            return Err(GpuError::InvalidArgument("Size must be greater than zero".into()));
        }
        let mut state = self.lock();
        if let Some(left) = state.buffers_until_failure.as_mut() {
            if *left == 0 {
                return Err(GpuError::OutOfMemory(format!("buffer {label}")));
            }
            *left -= 1;
        }
        let id = self.next();
        let info = BufferInfo {
            label: label.to_string(),
            size,
            usage,
        };
        state.buffers.insert(id, (info, vec![0; size as usize]));
        Ok(BufferId(id))
    }

    fn create_buffer_with_data(&self, label: &str, usage: BufferUsage, data: &[u8]) -> Result<BufferId, GpuError> {
        let id = self.create_buffer(label, usage, data.len() as u64)?;
        if let Some((_, contents)) = self.lock().buffers.get_mut(&id.0) {
            contents.copy_from_slice(data);
        }
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), GpuError> {
        self.lock()
            .buffers
            .remove(&id.0)
            .map(|_| ())
            .ok_or_else(|| GpuError::InvalidArgument("Buffer already closed".into()))
    }

    fn buffer_info(&self, id: BufferId) -> Option<BufferInfo> {
        self.lock().buffers.get(&id.0).map(|(info, _)| info.clone())
    }

    fn create_texture(&self, d: &TextureDescriptor) -> Result<TextureId, GpuError> {
        let id = self.next();
        let info = TextureInfo {
            label: d.label.clone().unwrap_or_default(),
            usage: d.usage,
            format: d.format,
            width: d.width,
            height: d.height,
            depth_or_layers: d.depth_or_layers,
            mip_levels: d.mip_levels,
        };
        self.lock().textures.insert(id, info);
        Ok(TextureId(id))
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), GpuError> {
        let mut state = self.lock();
        state.views.retain(|_, view| view.texture != id);
        state.textures.remove(&id.0);
        Ok(())
    }

    fn texture_info(&self, id: TextureId) -> Option<TextureInfo> {
        self.lock().textures.get(&id.0).cloned()
    }

    fn create_texture_view(&self, texture: TextureId, base: u32, count: u32) -> Result<TextureViewId, GpuError> {
        let info = self
            .texture_info(texture)
            .ok_or_else(|| GpuError::InvalidArgument("closed texture".into()))?;
        let id = self.next();
        self.lock().views.insert(
            id,
            TextureViewInfo {
                texture,
                base_mip_level: base,
                mip_level_count: count,
                width: info.width_at(base),
                height: info.height_at(base),
            },
        );
        Ok(TextureViewId(id))
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), GpuError> {
        self.lock().views.remove(&id.0);
        Ok(())
    }

    fn texture_view_info(&self, id: TextureViewId) -> Option<TextureViewInfo> {
        self.lock().views.get(&id.0).copied()
    }

    fn create_sampler(&self, _d: &SamplerDescriptor) -> Result<SamplerId, GpuError> {
        let id = self.next();
        self.lock().samplers.push(id);
        Ok(SamplerId(id))
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), GpuError> {
        self.lock().samplers.retain(|s| *s != id.0);
        Ok(())
    }

    fn compile_pipeline_cached(&self, pipeline: &RenderPipeline) -> Arc<dyn CompiledRenderPipeline> {
        self.precompile_pipeline(pipeline, None)
    }

    fn precompile_pipeline(
        &self,
        pipeline: &RenderPipeline,
        resolver: Option<Arc<dyn ShaderSourceResolver>>,
    ) -> Arc<dyn CompiledRenderPipeline> {
        let resolver = resolver.or_else(|| self.lock().default_resolver.clone());
        match resolver {
            Some(resolver) => self.compile(pipeline, resolver),
            None => self.compile(pipeline, Arc::new(EmptySources)),
        }
    }

    fn set_default_source_resolver(&self, resolver: Arc<dyn ShaderSourceResolver>) {
        self.lock().default_resolver = Some(resolver);
    }

    fn clear_pipeline_cache(&self) {
        self.lock().cache.clear();
    }

    fn create_command_encoder(&self) -> Box<dyn CommandEncoder> {
        Box::new(MockEncoder {
            state: self.state.clone(),
        })
    }

    fn uniform_offset_alignment(&self) -> u64 {
        256
    }
    fn max_texture_size(&self) -> u32 {
        4096
    }
    fn max_supported_anisotropy(&self) -> u32 {
        1
    }
    fn renderer(&self) -> String {
        "Mock".into()
    }
    fn vendor(&self) -> String {
        "Mock".into()
    }
    fn version(&self) -> String {
        "1.0".into()
    }
    fn backend_name(&self) -> &'static str {
        "Mock"
    }
    fn implementation_information(&self) -> String {
        "Mock".into()
    }
    fn enabled_extensions(&self) -> Vec<String> {
        Vec::new()
    }
    fn close(&self) {}
}

struct MockView {
    state: Arc<Mutex<State>>,
    slice: BufferSlice,
    data: Vec<u8>,
}

impl MappedView for MockView {
    fn data(&self) -> &[u8] {
        &self.data
    }
    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for MockView {
    fn drop(&mut self) {
        if let Some((_, contents)) = self.state.lock().unwrap().buffers.get_mut(&self.slice.buffer.0) {
            let start = self.slice.offset as usize;
            contents[start..start + self.data.len()].copy_from_slice(&self.data);
        }
    }
}

struct MockEncoder {
    state: Arc<Mutex<State>>,
}

impl CommandEncoder for MockEncoder {
    fn create_render_pass(&mut self, d: &RenderPassDescriptor) -> Result<Box<dyn RenderPass>, GpuError> {
        self.state.lock().unwrap().events.push(Event::OpenPass(d.label.clone()));
        Ok(Box::new(MockPass {
            state: self.state.clone(),
            closed: false,
        }))
    }
    fn clear_color_texture(&mut self, _t: TextureId, _c: u32) -> Result<(), GpuError> {
        Ok(())
    }
    fn clear_color_and_depth_textures(&mut self, _c: TextureId, _a: u32, _d: TextureId, _v: f64) -> Result<(), GpuError> {
        Ok(())
    }
    fn clear_color_and_depth_textures_region(
        &mut self,
        _c: TextureId,
        _a: u32,
        _d: TextureId,
        _v: f64,
        _r: TextureRegion,
    ) -> Result<(), GpuError> {
        Ok(())
    }
    fn clear_depth_texture(&mut self, _t: TextureId, _d: f64) -> Result<(), GpuError> {
        Ok(())
    }
    fn write_to_buffer(&mut self, slice: BufferSlice, data: &[u8]) -> Result<(), GpuError> {
        let mut state = self.state.lock().unwrap();
        let (_, contents) = state
            .buffers
            .get_mut(&slice.buffer.0)
            .ok_or_else(|| GpuError::InvalidArgument("closed buffer".into()))?;
        let start = slice.offset as usize;
        contents[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }
    fn map_buffer(&mut self, slice: BufferSlice, _read: bool, _write: bool) -> Result<Box<dyn MappedView + '_>, GpuError> {
        let mut state = self.state.lock().unwrap();
        state.maps += 1;
        let (info, contents) = state
            .buffers
            .get(&slice.buffer.0)
            .ok_or_else(|| GpuError::InvalidArgument("closed buffer".into()))?;
        if !slice.fits_in(info.size) {
            return Err(GpuError::InvalidArgument("out of bounds".into()));
        }
        let start = slice.offset as usize;
        let data = contents[start..start + slice.length as usize].to_vec();
        Ok(Box::new(MockView {
            state: self.state.clone(),
            slice,
            data,
        }))
    }
    fn copy_to_buffer(&mut self, _s: BufferSlice, _d: BufferSlice) -> Result<(), GpuError> {
        Ok(())
    }
    fn write_to_texture(&mut self, _t: TextureId, _d: &[u8], _m: u32, _r: TextureRegion) -> Result<(), GpuError> {
        Ok(())
    }
    fn copy_texture_to_buffer(
        &mut self,
        _t: TextureId,
        _b: BufferId,
        _o: u64,
        _m: u32,
        _r: Option<TextureRegion>,
    ) -> Result<(), GpuError> {
        Ok(())
    }
    fn copy_texture_to_texture(
        &mut self,
        _s: TextureId,
        _d: TextureId,
        _m: u32,
        _x: u32,
        _y: u32,
        _r: TextureRegion,
    ) -> Result<(), GpuError> {
        Ok(())
    }
    fn present_texture(&mut self, _v: TextureViewId) -> Result<(), GpuError> {
        Ok(())
    }
    fn create_fence(&mut self) -> Result<Box<dyn GpuFence>, GpuError> {
        Err(GpuError::UnsupportedOperation("mock".into()))
    }
    fn timer_query_begin(&mut self) -> Result<Box<dyn GpuQuery>, GpuError> {
        Err(GpuError::UnsupportedOperation("mock".into()))
    }
    fn timer_query_end(&mut self, _q: &dyn GpuQuery) -> Result<(), GpuError> {
        Ok(())
    }
}

struct MockPass {
    state: Arc<Mutex<State>>,
    closed: bool,
}

impl MockPass {
    fn record(&self, event: Event) -> Result<(), GpuError> {
        if self.closed {
            return Err(GpuError::InvalidState("closed".into()));
        }
        self.state.lock().unwrap().events.push(event);
        Ok(())
    }
}

impl RenderPass for MockPass {
    fn set_pipeline(&mut self, pipeline: &RenderPipeline) -> Result<(), GpuError> {
        self.record(Event::SetPipeline(pipeline.location.clone()))
    }
    fn bind_texture(&mut self, name: &str, binding: Option<(TextureViewId, SamplerId)>) -> Result<(), GpuError> {
        self.record(Event::BindTexture(name.to_string(), binding.map(|(v, _)| v)))
    }
    fn set_uniform(&mut self, name: &str, slice: BufferSlice) -> Result<(), GpuError> {
        self.record(Event::SetUniform(name.to_string(), slice))
    }
    fn set_uniform_buffer(&mut self, name: &str, buffer: BufferId) -> Result<(), GpuError> {
        let size = self
            .state
            .lock()
            .unwrap()
            .buffers
            .get(&buffer.0)
            .map(|(info, _)| info.size)
            .unwrap_or_default();
        self.set_uniform(name, BufferSlice::whole(buffer, size))
    }
    fn set_vertex_buffer(&mut self, _slot: u32, _b: BufferId) -> Result<(), GpuError> {
        Ok(())
    }
    fn set_index_buffer(&mut self, _b: Option<BufferId>, _f: IndexFormat) -> Result<(), GpuError> {
        Ok(())
    }
    fn enable_scissor(&mut self, _x: i32, _y: i32, _w: i32, _h: i32) -> Result<(), GpuError> {
        Ok(())
    }
    fn disable_scissor(&mut self) -> Result<(), GpuError> {
        Ok(())
    }
    fn push_debug_group(&mut self, _l: &str) -> Result<(), GpuError> {
        Ok(())
    }
    fn pop_debug_group(&mut self) -> Result<(), GpuError> {
        Ok(())
    }
    fn draw(&mut self, first: u32, count: u32) -> Result<(), GpuError> {
        self.record(Event::Draw(first, count))
    }
    fn draw_indexed(&mut self, _b: i32, _f: u32, _c: u32, _i: u32) -> Result<(), GpuError> {
        Ok(())
    }
    fn draw_multiple_indexed(
        &mut self,
        _o: &[RenderObject],
        _b: Option<BufferId>,
        _f: Option<IndexFormat>,
        _e: &[&str],
    ) -> Result<(), GpuError> {
        Ok(())
    }
    fn close(&mut self) -> Result<(), GpuError> {
        self.record(Event::ClosePass)?;
        self.closed = true;
        Ok(())
    }
    fn is_closed(&self) -> bool {
        self.closed
    }
}
