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

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::ThreadId;

use kiln_core::renderer::api::pipeline::{RenderPipeline, ShaderDefines, VertexFormat};
use kiln_core::renderer::api::resource::{
    BufferId, BufferInfo, BufferUsage, SamplerDescriptor, SamplerId, TextureDescriptor, TextureId,
    TextureInfo, TextureUsage, TextureViewId, TextureViewInfo,
};
use kiln_core::renderer::api::util::ShaderStage;
use kiln_core::renderer::error::{GpuError, ShaderError};
use kiln_core::renderer::traits::{
    CommandEncoder, CompiledRenderPipeline, DefineInjector, EmptySources, GraphicsDevice,
    ShaderPreprocessor, ShaderSourceResolver,
};

use super::buffer_storage::{select_storage, BufferStorage};
use super::capabilities::{GlBackendConfig, GlCapabilities};
use super::command::GlCommandEncoder;
use super::consts::{self as gl, GLenum};
use super::conversions::{min_filter, GlTextureFormat, IntoGl};
use super::driver::{GlDriver, GlName};
use super::labeler::{select_labeler, DebugLabeler, LabelKind};
use super::program::{compile_shader, link_program, GlProgram, GlShader};
use super::vertex_binding::{select_vertex_bindings, VertexBindingCache};

/// Attachments of a cached framebuffer: `(texture, mip level)` pairs.
pub(crate) type FramebufferKey = (Option<(TextureId, u32)>, Option<(TextureId, u32)>);

type ShaderKey = (String, ShaderStage, ShaderDefines, usize);

/// What a linked program depends on, per source resolver. Pipelines that
/// share a key but differ in fixed-function state get separate entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    location: String,
    vertex_shader: String,
    fragment_shader: String,
    vertex_format: VertexFormat,
    defines: ShaderDefines,
    resolver: usize,
}

impl PipelineKey {
    fn new(pipeline: &RenderPipeline, resolver: usize) -> Self {
        Self {
            location: pipeline.location.clone(),
            vertex_shader: pipeline.vertex_shader.clone(),
            fragment_shader: pipeline.fragment_shader.clone(),
            vertex_format: pipeline.vertex_format.clone(),
            defines: pipeline.defines.clone(),
            resolver,
        }
    }
}

/// Upper bound on stale errors drained before a creation.
const MAX_STALE_ERRORS: usize = 16;

#[derive(Debug)]
pub(crate) struct BufferEntry {
    pub(crate) name: GlName,
    pub(crate) info: BufferInfo,
}

#[derive(Debug)]
pub(crate) struct TextureEntry {
    pub(crate) name: GlName,
    pub(crate) target: GLenum,
    pub(crate) info: TextureInfo,
}

/// A pipeline compiled against one resolver.
pub struct GlCompiledPipeline {
    pub(crate) serial: u64,
    pipeline: RenderPipeline,
    pub(crate) program: Result<GlProgram, ShaderError>,
    released: AtomicBool,
}

impl GlCompiledPipeline {
    /// The linked program, if the pipeline is valid.
    pub(crate) fn program(&self) -> Option<&GlProgram> {
        if self.released.load(Ordering::Acquire) {
            return None;
        }
        self.program.as_ref().ok()
    }
}

impl CompiledRenderPipeline for GlCompiledPipeline {
    fn is_valid(&self) -> bool {
        self.program().is_some()
    }

    fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    fn error(&self) -> Option<&ShaderError> {
        self.program.as_ref().err()
    }
}

/// Everything behind the device lock.
pub(crate) struct DeviceState {
    pub(crate) driver: Box<dyn GlDriver>,
    pub(crate) labeler: Box<dyn DebugLabeler>,
    pub(crate) vertex_bindings: Box<dyn VertexBindingCache>,
    storage: Box<dyn BufferStorage>,

    pub(crate) buffers: HashMap<BufferId, BufferEntry>,
    pub(crate) textures: HashMap<TextureId, TextureEntry>,
    pub(crate) views: HashMap<TextureViewId, TextureViewInfo>,
    pub(crate) samplers: HashMap<SamplerId, GlName>,

    shaders: HashMap<ShaderKey, Result<GlShader, ShaderError>>,
    pipelines: HashMap<PipelineKey, Vec<Arc<GlCompiledPipeline>>>,
    resolvers: HashMap<usize, Arc<dyn ShaderSourceResolver>>,
    default_resolver: Arc<dyn ShaderSourceResolver>,
    preprocessor: Arc<dyn ShaderPreprocessor>,

    /// Serial of the pipeline whose fixed-function state is applied.
    pub(crate) applied_pipeline: Option<u64>,
    pub(crate) bound_program: GlName,
    pub(crate) active_query: Option<GlName>,
    /// Invalid pipelines already reported by non-validating draws.
    pub(crate) reported_invalid: HashSet<String>,
    /// Set while any encoder of this device has a render pass open.
    pub(crate) pass_open: bool,

    framebuffers: HashMap<FramebufferKey, GlName>,
    scratch_framebuffers: Option<(GlName, GlName)>,
}

impl DeviceState {
    pub(crate) fn buffer(&self, id: BufferId) -> Result<&BufferEntry, GpuError> {
        self.buffers
            .get(&id)
            .ok_or_else(|| GpuError::InvalidArgument("Buffer already closed".into()))
    }

    pub(crate) fn texture(&self, id: TextureId) -> Result<&TextureEntry, GpuError> {
        self.textures
            .get(&id)
            .ok_or_else(|| GpuError::InvalidArgument("Texture already closed".into()))
    }

    /// The framebuffer with exactly these attachments, created on first use.
    pub(crate) fn framebuffer(&mut self, key: FramebufferKey) -> GlName {
        if let Some(name) = self.framebuffers.get(&key) {
            return *name;
        }
        let name = self.driver.create_framebuffer();
        if let Some((texture, mip)) = key.0 {
            if let Some(entry) = self.textures.get(&texture) {
                self.driver
                    .framebuffer_texture(name, gl::COLOR_ATTACHMENT0, entry.name, mip);
            }
        }
        if let Some((texture, mip)) = key.1 {
            if let Some(entry) = self.textures.get(&texture) {
                self.driver
                    .framebuffer_texture(name, gl::DEPTH_ATTACHMENT, entry.name, mip);
            }
        }
        self.framebuffers.insert(key, name);
        name
    }

    /// Two framebuffers used as read and draw targets of copies.
    pub(crate) fn scratch_framebuffers(&mut self) -> (GlName, GlName) {
        if let Some(pair) = self.scratch_framebuffers {
            return pair;
        }
        let pair = (
            self.driver.create_framebuffer(),
            self.driver.create_framebuffer(),
        );
        self.scratch_framebuffers = Some(pair);
        pair
    }

    fn drop_framebuffers_of(&mut self, texture: TextureId) {
        let uses = |slot: Option<(TextureId, u32)>| slot.is_some_and(|(t, _)| t == texture);
        let stale: Vec<FramebufferKey> = self
            .framebuffers
            .keys()
            .filter(|(color, depth)| uses(*color) || uses(*depth))
            .copied()
            .collect();
        for key in stale {
            if let Some(name) = self.framebuffers.remove(&key) {
                self.driver.delete_framebuffer(name);
            }
        }
    }

    fn drain_errors(&mut self) {
        for _ in 0..MAX_STALE_ERRORS {
            if self.driver.get_error() == gl::NO_ERROR {
                break;
            }
        }
    }

    fn creation_error(&mut self, what: &str) -> Option<GpuError> {
        match self.driver.get_error() {
            gl::NO_ERROR => None,
            gl::OUT_OF_MEMORY => Some(GpuError::OutOfMemory(format!(
                "Could not allocate memory for {what}"
            ))),
            code => Some(GpuError::DeviceError(format!(
                "OpenGL error {code:#06x} while creating {what}"
            ))),
        }
    }

    fn shader(
        &mut self,
        resolver: &dyn ShaderSourceResolver,
        resolver_key: usize,
        pipeline: &RenderPipeline,
        stage: ShaderStage,
    ) -> Result<GlShader, ShaderError> {
        let id = match stage {
            ShaderStage::Vertex => &pipeline.vertex_shader,
            ShaderStage::Fragment => &pipeline.fragment_shader,
        };
        let key = (id.clone(), stage, pipeline.defines.clone(), resolver_key);
        if let Some(cached) = self.shaders.get(&key) {
            return cached.clone().map_err(|_| {
                let err = ShaderError::InvalidStage {
                    pipeline: pipeline.location.clone(),
                    stage,
                    id: id.clone(),
                };
                log::error!("GlBackend: {err}");
                err
            });
        }
        let result = compile_shader(
            self.driver.as_mut(),
            self.labeler.as_ref(),
            resolver,
            self.preprocessor.as_ref(),
            id,
            stage,
            &pipeline.defines,
        );
        self.shaders.insert(key, result.clone());
        result
    }

    fn pipeline_count(&self) -> usize {
        self.pipelines.values().map(Vec::len).sum()
    }

    fn release_pipelines(&mut self) {
        for compiled in self.pipelines.drain().flat_map(|(_, entries)| entries) {
            compiled.released.store(true, Ordering::Release);
            if let Ok(program) = &compiled.program {
                program.delete(self.driver.as_mut());
            }
        }
        for (_, shader) in self.shaders.drain() {
            if let Ok(shader) = shader {
                self.driver.delete_shader(shader.name);
            }
        }
        self.resolvers.clear();
        self.bound_program = 0;
        self.applied_pipeline = None;
        self.driver.use_program(0);
    }
}

struct Shared {
    owner: ThreadId,
    state: Mutex<DeviceState>,
    caps: GlCapabilities,
    config: GlBackendConfig,

    next_buffer_id: AtomicUsize,
    next_texture_id: AtomicUsize,
    next_texture_view_id: AtomicUsize,
    next_sampler_id: AtomicUsize,
    next_pipeline_serial: AtomicU64,
}

/// A clonable handle to an OpenGL device.
///
/// The device must be used from the thread that created it; every entry
/// point checks this.
#[derive(Clone)]
pub struct GlBackend {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for GlBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlBackend")
            .field("renderer", &self.shared.caps.renderer)
            .field("version", &self.shared.caps.version)
            .finish()
    }
}

impl GlBackend {
    /// Creates a device over `driver`, probing its capabilities once.
    pub fn new(mut driver: Box<dyn GlDriver>, config: GlBackendConfig) -> Self {
        let caps = GlCapabilities::detect(driver.as_mut(), &config);
        let labeler = select_labeler(&caps, &config);
        let vertex_bindings =
            select_vertex_bindings(caps.vertex_attrib_binding, &caps.vendor, &caps.version);
        let storage = select_storage(caps.buffer_storage);
        log::info!(
            "GlBackend: Initialized on '{}' ({}), labels: {}, immutable buffers: {}, max texture size: {}",
            caps.renderer,
            caps.version,
            labeler.name(),
            storage.is_immutable(),
            caps.max_texture_size
        );

        let state = DeviceState {
            driver,
            labeler,
            vertex_bindings,
            storage,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            views: HashMap::new(),
            samplers: HashMap::new(),
            shaders: HashMap::new(),
            pipelines: HashMap::new(),
            resolvers: HashMap::new(),
            default_resolver: Arc::new(EmptySources),
            preprocessor: Arc::new(DefineInjector),
            applied_pipeline: None,
            bound_program: 0,
            active_query: None,
            reported_invalid: HashSet::new(),
            pass_open: false,
            framebuffers: HashMap::new(),
            scratch_framebuffers: None,
        };

        Self {
            shared: Arc::new(Shared {
                owner: std::thread::current().id(),
                state: Mutex::new(state),
                caps,
                config,
                next_buffer_id: AtomicUsize::new(1),
                next_texture_id: AtomicUsize::new(1),
                next_texture_view_id: AtomicUsize::new(1),
                next_sampler_id: AtomicUsize::new(1),
                next_pipeline_serial: AtomicU64::new(1),
            }),
        }
    }

    /// Creates a device over a fresh headless driver and returns both.
    #[cfg(feature = "headless")]
    pub fn headless(
        config: GlBackendConfig,
        driver_config: super::headless::HeadlessConfig,
    ) -> (Self, super::headless::HeadlessDriver) {
        let driver = super::headless::HeadlessDriver::new(driver_config);
        (Self::new(Box::new(driver.clone()), config), driver)
    }

    /// Replaces the preprocessor applied to shader sources before compiling.
    pub fn set_shader_preprocessor(&self, preprocessor: Arc<dyn ShaderPreprocessor>) {
        self.state().preprocessor = preprocessor;
    }

    /// The detected capabilities.
    pub fn capabilities(&self) -> &GlCapabilities {
        &self.shared.caps
    }

    /// The configuration the device was created with.
    pub fn config(&self) -> &GlBackendConfig {
        &self.shared.config
    }

    /// Number of cached pipelines, valid or not.
    pub fn cached_pipelines(&self) -> usize {
        self.state().pipeline_count()
    }

    fn assert_owner(&self) {
        assert_eq!(
            std::thread::current().id(),
            self.shared.owner,
            "GlBackend used off its owning thread"
        );
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.assert_owner();
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn generate_buffer_id(&self) -> BufferId {
        BufferId(self.shared.next_buffer_id.fetch_add(1, Ordering::Relaxed))
    }

    fn generate_texture_id(&self) -> TextureId {
        TextureId(self.shared.next_texture_id.fetch_add(1, Ordering::Relaxed))
    }

    fn generate_texture_view_id(&self) -> TextureViewId {
        TextureViewId(self.shared.next_texture_view_id.fetch_add(1, Ordering::Relaxed))
    }

    fn generate_sampler_id(&self) -> SamplerId {
        SamplerId(self.shared.next_sampler_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Compiles `pipeline` with the lock held, or returns the cached entry.
    pub(crate) fn compile_locked(
        &self,
        state: &mut DeviceState,
        pipeline: &RenderPipeline,
        resolver: Option<Arc<dyn ShaderSourceResolver>>,
    ) -> Arc<GlCompiledPipeline> {
        let resolver = resolver.unwrap_or_else(|| state.default_resolver.clone());
        let resolver_key = Arc::as_ptr(&resolver) as *const () as usize;
        let key = PipelineKey::new(pipeline, resolver_key);
        let hit = state
            .pipelines
            .get(&key)
            .and_then(|entries| entries.iter().find(|c| c.pipeline == *pipeline));
        if let Some(hit) = hit {
            return hit.clone();
        }
        state
            .resolvers
            .entry(resolver_key)
            .or_insert_with(|| resolver.clone());

        let vertex = state.shader(resolver.as_ref(), resolver_key, pipeline, ShaderStage::Vertex);
        let fragment =
            state.shader(resolver.as_ref(), resolver_key, pipeline, ShaderStage::Fragment);
        let program = match (vertex, fragment) {
            (Ok(vs), Ok(fs)) => link_program(
                state.driver.as_mut(),
                state.labeler.as_ref(),
                pipeline,
                &vs,
                &fs,
            ),
            (Err(err), _) | (_, Err(err)) => Err(err),
        };
        match &program {
            Ok(p) => log::debug!(
                "GlBackend: Compiled pipeline '{}' into program {}",
                pipeline.location,
                p.name
            ),
            Err(err) => log::error!(
                "GlBackend: Couldn't compile pipeline {}: {err}",
                pipeline.location
            ),
        }

        let compiled = Arc::new(GlCompiledPipeline {
            serial: self.shared.next_pipeline_serial.fetch_add(1, Ordering::Relaxed),
            pipeline: pipeline.clone(),
            program,
            released: AtomicBool::new(false),
        });
        state.pipelines.entry(key).or_default().push(compiled.clone());
        compiled
    }

    fn allocate_buffer(
        &self,
        label: &str,
        usage: BufferUsage,
        size: u64,
        data: Option<&[u8]>,
    ) -> Result<BufferId, GpuError> {
        let mut state = self.state();
        state.drain_errors();
        let name = state.driver.create_buffer();
        let DeviceState {
            driver, storage, ..
        } = &mut *state;
        storage.allocate(driver.as_mut(), name, usage, size, data);
        if let Some(err) = state.creation_error(&format!("buffer '{label}' of {size} bytes")) {
            state.driver.delete_buffer(name);
            log::error!("GlBackend: Failed to create buffer '{label}': {err}");
            return Err(err);
        }
        let DeviceState {
            driver, labeler, ..
        } = &mut *state;
        labeler.label_object(driver.as_mut(), LabelKind::Buffer, name, label);

        let id = self.generate_buffer_id();
        state.buffers.insert(
            id,
            BufferEntry {
                name,
                info: BufferInfo {
                    label: label.to_string(),
                    size,
                    usage,
                },
            },
        );
        log::info!("GlBackend: Created buffer '{label}' with ID: {id:?}, size: {size} bytes");
        Ok(id)
    }

    fn validate_texture(&self, d: &TextureDescriptor) -> Result<(), GpuError> {
        if d.mip_levels < 1 {
            return Err(GpuError::InvalidArgument("mipLevels must be at least 1".into()));
        }
        if d.depth_or_layers < 1 {
            return Err(GpuError::InvalidArgument(
                "depthOrLayers must be at least 1".into(),
            ));
        }
        if d.width < 1 || d.height < 1 {
            return Err(GpuError::InvalidArgument(format!(
                "Texture size must be at least 1x1, but was {}x{}",
                d.width, d.height
            )));
        }
        if d.usage.contains(TextureUsage::CUBEMAP_COMPATIBLE) {
            if d.width != d.height {
                return Err(GpuError::InvalidArgument(format!(
                    "Cubemap compatible textures must be square, but size is {}x{}",
                    d.width, d.height
                )));
            }
            if d.depth_or_layers % 6 != 0 {
                return Err(GpuError::InvalidArgument(format!(
                    "Cubemap compatible textures must have a layer count with a multiple of 6, was {}",
                    d.depth_or_layers
                )));
            }
            if d.depth_or_layers > 6 {
                return Err(GpuError::UnsupportedOperation(
                    "Array textures are not yet supported".into(),
                ));
            }
        } else if d.depth_or_layers > 1 {
            return Err(GpuError::UnsupportedOperation(
                "Array or 3D textures are not yet supported".into(),
            ));
        }
        let max = self.shared.caps.max_texture_size;
        if d.width > max || d.height > max {
            return Err(GpuError::InvalidArgument(format!(
                "Texture size {}x{} exceeds the maximum of {max}",
                d.width, d.height
            )));
        }
        Ok(())
    }
}

impl GraphicsDevice for GlBackend {
    fn create_buffer(&self, label: &str, usage: BufferUsage, size: u64) -> Result<BufferId, GpuError> {
        if size == 0 {
            return Err(GpuError::InvalidArgument(
                "Buffer size must be greater than zero".into(),
            ));
        }
        self.allocate_buffer(label, usage, size, None)
    }

    fn create_buffer_with_data(
        &self,
        label: &str,
        usage: BufferUsage,
        data: &[u8],
    ) -> Result<BufferId, GpuError> {
        if data.is_empty() {
            return Err(GpuError::InvalidArgument(
                "Buffer source must not be empty".into(),
            ));
        }
        self.allocate_buffer(label, usage, data.len() as u64, Some(data))
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), GpuError> {
        let mut state = self.state();
        let entry = state
            .buffers
            .remove(&id)
            .ok_or_else(|| GpuError::InvalidArgument("Buffer already closed".into()))?;
        state.driver.delete_buffer(entry.name);
        log::debug!("GlBackend: Destroyed buffer with ID: {id:?}");
        Ok(())
    }

    fn buffer_info(&self, id: BufferId) -> Option<BufferInfo> {
        self.state().buffers.get(&id).map(|e| e.info.clone())
    }

    fn create_texture(&self, d: &TextureDescriptor) -> Result<TextureId, GpuError> {
        self.validate_texture(d)?;
        let label = d.label.clone().unwrap_or_default();
        let cubemap = d.usage.contains(TextureUsage::CUBEMAP_COMPATIBLE);
        let target = if cubemap {
            gl::TEXTURE_CUBE_MAP
        } else {
            gl::TEXTURE_2D
        };
        let format: GlTextureFormat = d.format.into_gl();

        let mut state = self.state();
        state.drain_errors();
        let name = state.driver.create_texture(target);
        let faces: Vec<GLenum> = if cubemap {
            (0..6).map(|i| gl::TEXTURE_CUBE_MAP_POSITIVE_X + i).collect()
        } else {
            vec![gl::TEXTURE_2D]
        };
        for face in faces {
            for mip in 0..d.mip_levels {
                let width = (d.width >> mip).max(1);
                let height = (d.height >> mip).max(1);
                state
                    .driver
                    .tex_image_2d(name, face, mip, format.internal, width, height, None);
            }
        }
        state.driver.tex_parameter(name, gl::TEXTURE_BASE_LEVEL, 0);
        state
            .driver
            .tex_parameter(name, gl::TEXTURE_MAX_LEVEL, d.mip_levels as i32 - 1);
        if let Some(err) = state.creation_error(&format!(
            "texture '{label}' ({}x{}, {} mips)",
            d.width, d.height, d.mip_levels
        )) {
            state.driver.delete_texture(name);
            log::error!("GlBackend: Failed to create texture '{label}': {err}");
            return Err(err);
        }
        if !label.is_empty() {
            let DeviceState {
                driver, labeler, ..
            } = &mut *state;
            labeler.label_object(driver.as_mut(), LabelKind::Texture, name, &label);
        }

        let id = self.generate_texture_id();
        state.textures.insert(
            id,
            TextureEntry {
                name,
                target,
                info: TextureInfo {
                    label: label.clone(),
                    usage: d.usage,
                    format: d.format,
                    width: d.width,
                    height: d.height,
                    depth_or_layers: d.depth_or_layers,
                    mip_levels: d.mip_levels,
                },
            },
        );
        log::info!(
            "GlBackend: Created texture '{label}' with ID: {id:?}, {}x{}, {} mips",
            d.width,
            d.height,
            d.mip_levels
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), GpuError> {
        let mut state = self.state();
        let entry = state
            .textures
            .remove(&id)
            .ok_or_else(|| GpuError::InvalidArgument("Texture already closed".into()))?;
        state.views.retain(|_, view| view.texture != id);
        state.drop_framebuffers_of(id);
        state.driver.delete_texture(entry.name);
        log::debug!("GlBackend: Destroyed texture with ID: {id:?}");
        Ok(())
    }

    fn texture_info(&self, id: TextureId) -> Option<TextureInfo> {
        self.state().textures.get(&id).map(|e| e.info.clone())
    }

    fn create_texture_view(
        &self,
        texture: TextureId,
        base_mip_level: u32,
        mip_level_count: u32,
    ) -> Result<TextureViewId, GpuError> {
        let mut state = self.state();
        let info = state
            .textures
            .get(&texture)
            .map(|e| e.info.clone())
            .ok_or_else(|| {
                GpuError::InvalidArgument("Can't create texture view with closed texture".into())
            })?;
        if mip_level_count < 1 || base_mip_level + mip_level_count > info.mip_levels {
            return Err(GpuError::InvalidArgument(format!(
                "Can't create texture view with mip levels {base_mip_level}-{}, texture only has {}",
                base_mip_level + mip_level_count,
                info.mip_levels
            )));
        }
        let id = self.generate_texture_view_id();
        state.views.insert(
            id,
            TextureViewInfo {
                texture,
                base_mip_level,
                mip_level_count,
                width: info.width_at(base_mip_level),
                height: info.height_at(base_mip_level),
            },
        );
        log::debug!("GlBackend: Created texture view {id:?} of texture {texture:?}");
        Ok(id)
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), GpuError> {
        self.state()
            .views
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| GpuError::InvalidArgument("Texture view already closed".into()))
    }

    fn texture_view_info(&self, id: TextureViewId) -> Option<TextureViewInfo> {
        self.state().views.get(&id).copied()
    }

    fn create_sampler(&self, d: &SamplerDescriptor) -> Result<SamplerId, GpuError> {
        let max = self.max_supported_anisotropy();
        if d.max_anisotropy < 1 || d.max_anisotropy > max {
            return Err(GpuError::InvalidArgument(format!(
                "maxAnisotropy out of range; must be >= 1 and <= {max}, but was {}",
                d.max_anisotropy
            )));
        }
        let mut state = self.state();
        let driver = state.driver.as_mut();
        let name = driver.create_sampler();
        driver.sampler_parameter(name, gl::TEXTURE_WRAP_S, d.address_mode_u.into_gl() as i32);
        driver.sampler_parameter(name, gl::TEXTURE_WRAP_T, d.address_mode_v.into_gl() as i32);
        driver.sampler_parameter(
            name,
            gl::TEXTURE_MIN_FILTER,
            min_filter(d.min_filter, d.max_lod.is_some()) as i32,
        );
        driver.sampler_parameter(name, gl::TEXTURE_MAG_FILTER, d.mag_filter.into_gl() as i32);
        if let Some(lod) = d.max_lod {
            driver.sampler_parameter_f(name, gl::TEXTURE_MAX_LOD, lod as f32);
        }
        if d.max_anisotropy > 1 {
            driver.sampler_parameter_f(name, gl::TEXTURE_MAX_ANISOTROPY, d.max_anisotropy as f32);
        }
        let id = self.generate_sampler_id();
        state.samplers.insert(id, name);
        log::debug!("GlBackend: Created sampler with ID: {id:?}");
        Ok(id)
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), GpuError> {
        let mut state = self.state();
        let name = state
            .samplers
            .remove(&id)
            .ok_or_else(|| GpuError::InvalidArgument("Sampler already closed".into()))?;
        state.driver.delete_sampler(name);
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
        let mut state = self.state();
        self.compile_locked(&mut state, pipeline, resolver)
    }

    fn set_default_source_resolver(&self, resolver: Arc<dyn ShaderSourceResolver>) {
        self.state().default_resolver = resolver;
    }

    fn clear_pipeline_cache(&self) {
        let mut state = self.state();
        let count = state.pipeline_count();
        state.release_pipelines();
        log::debug!("GlBackend: Cleared {count} cached pipelines");

        let renderer = &self.shared.caps.renderer;
        if self
            .shared
            .config
            .cache_cleanup_renderers
            .iter()
            .any(|trigger| renderer.contains(trigger.as_str()))
        {
            // Forces the driver to release memory held for deleted programs.
            let driver = state.driver.as_mut();
            let shader = driver.create_shader(gl::VERTEX_SHADER);
            let program = driver.create_program();
            driver.attach_shader(program, shader);
            driver.delete_shader(shader);
            driver.delete_program(program);
        }
    }

    fn create_command_encoder(&self) -> Box<dyn CommandEncoder> {
        self.assert_owner();
        Box::new(GlCommandEncoder::new(self.clone()))
    }

    fn uniform_offset_alignment(&self) -> u64 {
        self.shared.caps.uniform_offset_alignment
    }

    fn max_texture_size(&self) -> u32 {
        self.shared.caps.max_texture_size
    }

    fn max_supported_anisotropy(&self) -> u32 {
        self.shared.caps.max_anisotropy
    }

    fn renderer(&self) -> String {
        self.shared.caps.renderer.clone()
    }

    fn vendor(&self) -> String {
        self.shared.caps.vendor.clone()
    }

    fn version(&self) -> String {
        self.shared.caps.version.clone()
    }

    fn backend_name(&self) -> &'static str {
        "OpenGL"
    }

    fn implementation_information(&self) -> String {
        let caps = &self.shared.caps;
        format!("{} GL version {}, {}", caps.renderer, caps.version, caps.vendor)
    }

    fn enabled_extensions(&self) -> Vec<String> {
        self.shared.caps.enabled_extensions.clone()
    }

    fn close(&self) {
        self.clear_pipeline_cache();
        let mut state = self.state();
        let DeviceState {
            driver,
            vertex_bindings,
            ..
        } = &mut *state;
        vertex_bindings.destroy(driver.as_mut());
        let framebuffers: Vec<GlName> = state.framebuffers.drain().map(|(_, fb)| fb).collect();
        for fb in framebuffers {
            state.driver.delete_framebuffer(fb);
        }
        if let Some((read, draw)) = state.scratch_framebuffers.take() {
            state.driver.delete_framebuffer(read);
            state.driver.delete_framebuffer(draw);
        }
        log::info!("GlBackend: Closed");
    }
}

#[cfg(all(test, feature = "headless"))]
mod tests {
    use super::*;
    use crate::graphics::gl::headless::{HeadlessConfig, HeadlessDriver};
    use kiln_core::renderer::api::resource::{FilterMode, TextureUsage};
    use kiln_core::renderer::api::util::TextureFormat;

    fn backend() -> (GlBackend, HeadlessDriver) {
        GlBackend::headless(GlBackendConfig::default(), HeadlessConfig::default())
    }

    #[test]
    fn zero_sized_buffers_are_rejected() {
        let (device, _) = backend();
        let err = device
            .create_buffer("empty", BufferUsage::VERTEX, 0)
            .unwrap_err();
        assert_eq!(
            format!("{err}"),
            "Invalid argument: Buffer size must be greater than zero"
        );
        let err = device
            .create_buffer_with_data("empty", BufferUsage::VERTEX, &[])
            .unwrap_err();
        assert!(matches!(err, GpuError::InvalidArgument(_)));
    }

    #[test]
    fn driver_out_of_memory_is_classified_and_cleaned_up() {
        let (device, driver) = backend();
        driver.fail_next_allocation(gl::OUT_OF_MEMORY);
        let err = device
            .create_buffer("big", BufferUsage::UNIFORM, 64)
            .unwrap_err();
        assert!(matches!(err, GpuError::OutOfMemory(_)));
        assert_eq!(driver.live_objects().buffers, 0);

        driver.fail_next_allocation(gl::INVALID_VALUE);
        let err = device
            .create_texture(&TextureDescriptor::new_2d(
                "broken",
                TextureUsage::COPY_DST,
                TextureFormat::Rgba8Unorm,
                4,
                4,
            ))
            .unwrap_err();
        assert!(matches!(err, GpuError::DeviceError(_)));
        assert_eq!(driver.live_objects().textures, 0);
    }

    #[test]
    fn stale_errors_do_not_fail_creation() {
        let (device, mut driver) = backend();
        driver.bind_framebuffer(gl::FRAMEBUFFER, 1234);
        assert!(device.create_buffer("ok", BufferUsage::VERTEX, 16).is_ok());
    }

    #[test]
    fn textures_allocate_every_mip_eagerly() {
        let (device, driver) = backend();
        let mut descriptor = TextureDescriptor::new_2d(
            "mipped",
            TextureUsage::TEXTURE_BINDING,
            TextureFormat::Rgba8Unorm,
            64,
            32,
        );
        descriptor.mip_levels = 4;
        let id = device.create_texture(&descriptor).expect("valid texture");
        let name = device.state().textures[&id].name;
        assert_eq!(driver.texture_image_count(name), 4);
        assert_eq!(driver.texture_parameter(name, gl::TEXTURE_MAX_LEVEL), Some(3));
        assert_eq!(driver.label(gl::TEXTURE, name).as_deref(), Some("mipped"));
    }

    #[test]
    fn texture_validation_order() {
        let (device, _) = backend();
        let mut d = TextureDescriptor::new_2d(
            "cube",
            TextureUsage::CUBEMAP_COMPATIBLE,
            TextureFormat::Rgba8Unorm,
            16,
            8,
        );
        d.mip_levels = 0;
        assert_eq!(
            device.create_texture(&d).unwrap_err(),
            GpuError::InvalidArgument("mipLevels must be at least 1".into())
        );
        d.mip_levels = 1;
        d.depth_or_layers = 6;
        assert!(matches!(
            device.create_texture(&d),
            Err(GpuError::InvalidArgument(msg)) if msg.contains("square")
        ));
        d.height = 16;
        d.depth_or_layers = 12;
        assert!(matches!(
            device.create_texture(&d),
            Err(GpuError::UnsupportedOperation(_))
        ));
        d.depth_or_layers = 6;
        assert!(device.create_texture(&d).is_ok());
    }

    #[test]
    fn destroying_a_texture_invalidates_its_views() {
        let (device, _) = backend();
        let texture = device
            .create_texture(&TextureDescriptor::new_2d(
                "sampled",
                TextureUsage::TEXTURE_BINDING,
                TextureFormat::R8Unorm,
                8,
                8,
            ))
            .expect("valid texture");
        let view = device.create_texture_view_full(texture).expect("valid view");
        assert!(device.create_texture_view(texture, 0, 2).is_err());
        device.destroy_texture(texture).expect("live texture");
        assert!(device.texture_view_info(view).is_none());
        assert!(device.destroy_texture(texture).is_err());
    }

    #[test]
    fn sampler_anisotropy_is_range_checked() {
        let (device, driver) = backend();
        let mut d = SamplerDescriptor::clamped(FilterMode::Linear);
        d.max_anisotropy = 17;
        assert_eq!(
            format!("{}", device.create_sampler(&d).unwrap_err()),
            "Invalid argument: maxAnisotropy out of range; must be >= 1 and <= 16, but was 17"
        );
        d.max_anisotropy = 8;
        d.max_lod = Some(4.0);
        let id = device.create_sampler(&d).expect("valid sampler");
        let name = device.state().samplers[&id];
        assert_eq!(
            driver.sampler_parameter_value(name, gl::TEXTURE_MIN_FILTER),
            Some(gl::LINEAR_MIPMAP_LINEAR as f32)
        );
        assert_eq!(
            driver.sampler_parameter_value(name, gl::TEXTURE_MAX_ANISOTROPY),
            Some(8.0)
        );
    }

    #[test]
    fn introspection_strings() {
        let (device, _) = backend();
        assert_eq!(device.backend_name(), "OpenGL");
        assert_eq!(
            device.implementation_information(),
            "Kiln Headless Renderer GL version 4.6.0 Kiln Headless, Kiln"
        );
        assert_eq!(device.max_texture_size(), 16384);
        assert_eq!(device.uniform_offset_alignment(), 256);
        assert_eq!(device.enabled_extensions().len(), 4);
    }

    #[test]
    fn cache_cleanup_workaround_runs_for_matching_renderers() {
        let (device, driver) = GlBackend::headless(
            GlBackendConfig::default(),
            HeadlessConfig {
                renderer: "AMD Radeon RX 7900".into(),
                ..HeadlessConfig::default()
            },
        );
        device.clear_pipeline_cache();
        assert_eq!(driver.call_count("create_program"), 1);
        assert_eq!(driver.live_objects().programs, 0);
        assert_eq!(driver.live_objects().shaders, 0);

        let (device, driver) = backend();
        device.clear_pipeline_cache();
        assert_eq!(driver.call_count("create_program"), 0);
    }

    #[test]
    fn use_off_the_owning_thread_panics() {
        let (device, _) = backend();
        let result = std::thread::spawn(move || device.buffer_info(BufferId(1))).join();
        assert!(result.is_err());
    }
}
