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

//! An in-memory software implementation of [`GlDriver`].
//!
//! Buffers and textures have real storage: clears, uploads, blits, buffer
//! copies and read-backs produce the bytes a GPU would. Draws are recorded,
//! not rasterized. Shader compilation understands `#error` lines and
//! introspects `uniform` declarations so programs expose the same active
//! uniforms and blocks a real driver would report.
//!
//! The driver is a cheap handle over shared state, so tests keep a clone to
//! inspect what the backend did and to inject failures.

use super::consts::{self as gl, GLenum};
use super::driver::{GlDriver, GlName};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What the headless context reports about itself.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// `GL_VENDOR`.
    pub vendor: String,
    /// `GL_RENDERER`.
    pub renderer: String,
    /// `GL_VERSION`.
    pub version: String,
    /// Advertised extensions.
    pub extensions: Vec<String>,
    /// `GL_MAX_TEXTURE_SIZE`.
    pub max_texture_size: i32,
    /// The largest square size the proxy target accepts.
    pub proxy_limit: u32,
    /// `GL_MAX_LABEL_LENGTH`.
    pub max_label_length: i32,
    /// `GL_UNIFORM_BUFFER_OFFSET_ALIGNMENT`.
    pub uniform_offset_alignment: i32,
    /// `GL_MAX_TEXTURE_MAX_ANISOTROPY`.
    pub max_anisotropy: i32,
    /// Allocations above this many bytes fail with `OUT_OF_MEMORY`.
    pub max_allocation: u64,
    /// Size of the default framebuffer that presents blit into.
    pub default_framebuffer: (u32, u32),
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            vendor: "Kiln".to_string(),
            renderer: "Kiln Headless Renderer".to_string(),
            version: "4.6.0 Kiln Headless".to_string(),
            extensions: [
                gl::EXT_KHR_DEBUG,
                gl::EXT_DEBUG_LABEL,
                gl::EXT_VERTEX_ATTRIB_BINDING,
                gl::EXT_BUFFER_STORAGE,
                gl::EXT_TEXTURE_FILTER_ANISOTROPIC,
            ]
            .iter()
            .map(|e| e.to_string())
            .collect(),
            max_texture_size: 8192,
            proxy_limit: 16384,
            max_label_length: 256,
            uniform_offset_alignment: 256,
            max_anisotropy: 16,
            max_allocation: 1 << 30,
            default_framebuffer: (256, 256),
        }
    }
}

/// Which draw entry point a recorded draw went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawEntry {
    /// `glDrawArrays`.
    Arrays,
    /// `glDrawElements`.
    Elements,
    /// `glDrawElementsBaseVertex`.
    ElementsBaseVertex,
    /// `glDrawElementsInstanced`.
    ElementsInstanced,
    /// `glDrawElementsInstancedBaseVertex`.
    ElementsInstancedBaseVertex,
}

/// A draw the driver accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawRecord {
    /// The entry point used.
    pub entry: DrawEntry,
    /// Primitive mode.
    pub mode: GLenum,
    /// First vertex for array draws, `0` otherwise.
    pub first: u32,
    /// Vertex or index count.
    pub count: u32,
    /// Index type for element draws.
    pub index_type: Option<GLenum>,
    /// Byte offset into the element buffer.
    pub offset: u64,
    /// Base vertex, `0` when unused.
    pub base_vertex: i32,
    /// Instance count, `1` when unused.
    pub instances: u32,
    /// The current program.
    pub program: GlName,
    /// The bound vertex array.
    pub vertex_array: GlName,
}

/// Counts of objects that have been created and not deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveObjects {
    pub buffers: usize,
    pub textures: usize,
    pub samplers: usize,
    pub framebuffers: usize,
    pub shaders: usize,
    pub programs: usize,
    pub vertex_arrays: usize,
    pub syncs: usize,
    pub queries: usize,
}

/// Snapshot of the fixed-function state.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedFunctionState {
    pub depth_func: GLenum,
    pub depth_write: bool,
    pub color_write: [bool; 4],
    pub blend: [GLenum; 4],
    pub polygon_mode: GLenum,
    pub polygon_offset: (f32, f32),
    pub logic_op: GLenum,
    pub scissor: [i32; 4],
    pub viewport: [i32; 4],
}

#[derive(Debug, Default)]
struct Names {
    next: GlName,
    free: BTreeSet<GlName>,
}

impl Names {
    /// Hands out the lowest freed name first, like common drivers do.
    fn alloc(&mut self) -> GlName {
        if let Some(name) = self.free.pop_first() {
            return name;
        }
        self.next += 1;
        self.next
    }

    fn release(&mut self, name: GlName) {
        if name != 0 {
            self.free.insert(name);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Mapping {
    offset: usize,
    length: usize,
    access: GLenum,
}

#[derive(Debug, Default)]
struct Buffer {
    data: Vec<u8>,
    allocated: bool,
    immutable_flags: Option<GLenum>,
    mapping: Option<Mapping>,
}

#[derive(Debug, Clone)]
struct Image {
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
    data: Vec<u8>,
}

impl Image {
    fn new(width: u32, height: u32, bytes_per_pixel: usize) -> Self {
        Self {
            width,
            height,
            bytes_per_pixel,
            data: vec![0; width as usize * height as usize * bytes_per_pixel],
        }
    }

    fn pixel_index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.bytes_per_pixel
    }

    /// The `[x0, y0, x1, y1)` rectangle clamped to the image.
    fn clamp(&self, rect: [i32; 4]) -> (u32, u32, u32, u32) {
        let clamp_x = |v: i32| v.clamp(0, self.width as i32) as u32;
        let clamp_y = |v: i32| v.clamp(0, self.height as i32) as u32;
        (
            clamp_x(rect[0]),
            clamp_y(rect[1]),
            clamp_x(rect[0].saturating_add(rect[2])),
            clamp_y(rect[1].saturating_add(rect[3])),
        )
    }
}

#[derive(Debug)]
struct Texture {
    target: GLenum,
    images: HashMap<(GLenum, u32), Image>,
    parameters: HashMap<GLenum, i32>,
    depth: bool,
    buffer: Option<(GLenum, GlName)>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Framebuffer {
    color: Option<(GlName, u32)>,
    depth: Option<(GlName, u32)>,
}

#[derive(Debug)]
struct Shader {
    kind: GLenum,
    source: String,
    compiled: bool,
    log: String,
    blocks: Vec<String>,
    uniforms: Vec<String>,
}

#[derive(Debug, Default)]
struct Program {
    shaders: Vec<GlName>,
    attributes: HashMap<u32, String>,
    linked: bool,
    log: String,
    blocks: Vec<String>,
    uniforms: Vec<String>,
    block_bindings: HashMap<u32, u32>,
    uniform_values: HashMap<i32, i32>,
}

#[derive(Debug, Default)]
struct VertexArray {
    enabled: BTreeSet<u32>,
    vertex_buffer: Option<GlName>,
    element_buffer: GlName,
}

#[derive(Debug, Default)]
struct Query {
    result: Option<u64>,
}

struct HeadlessState {
    config: HeadlessConfig,
    error: GLenum,
    calls: HashMap<&'static str, usize>,
    total_calls: usize,
    draws: Vec<DrawRecord>,

    buffer_names: Names,
    texture_names: Names,
    sampler_names: Names,
    framebuffer_names: Names,
    object_names: Names,
    vertex_array_names: Names,
    sync_names: Names,
    query_names: Names,

    buffers: HashMap<GlName, Buffer>,
    textures: HashMap<GlName, Texture>,
    samplers: HashMap<GlName, HashMap<GLenum, f32>>,
    framebuffers: HashMap<GlName, Framebuffer>,
    shaders: HashMap<GlName, Shader>,
    programs: HashMap<GlName, Program>,
    vertex_arrays: HashMap<GlName, VertexArray>,
    syncs: HashSet<GlName>,
    queries: HashMap<GlName, Query>,
    active_query: Option<(GlName, usize)>,
    labels: HashMap<(GLenum, GlName), String>,
    debug_depth: usize,

    default_framebuffer: Image,
    draw_framebuffer: GlName,
    read_framebuffer: GlName,
    current_program: GlName,
    current_vertex_array: GlName,
    array_buffer: GlName,
    uniform_buffers: HashMap<u32, (GlName, u64, u64)>,
    texture_units: HashMap<u32, (GLenum, GlName)>,
    sampler_units: HashMap<u32, GlName>,

    capabilities: HashSet<GLenum>,
    fixed: FixedFunctionState,
    clear_rgba: [f32; 4],
    clear_depth_value: f64,

    next_link: Option<(bool, String)>,
    next_allocation_error: Option<GLenum>,
    stall_fences: bool,
}

impl HeadlessState {
    fn new(config: HeadlessConfig) -> Self {
        let (width, height) = config.default_framebuffer;
        let mut vertex_arrays = HashMap::new();
        vertex_arrays.insert(0, VertexArray::default());
        Self {
            default_framebuffer: Image::new(width, height, 4),
            config,
            error: gl::NO_ERROR,
            calls: HashMap::new(),
            total_calls: 0,
            draws: Vec::new(),
            buffer_names: Names::default(),
            texture_names: Names::default(),
            sampler_names: Names::default(),
            framebuffer_names: Names::default(),
            object_names: Names::default(),
            vertex_array_names: Names::default(),
            sync_names: Names::default(),
            query_names: Names::default(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            samplers: HashMap::new(),
            framebuffers: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            vertex_arrays,
            syncs: HashSet::new(),
            queries: HashMap::new(),
            active_query: None,
            labels: HashMap::new(),
            debug_depth: 0,
            draw_framebuffer: 0,
            read_framebuffer: 0,
            current_program: 0,
            current_vertex_array: 0,
            array_buffer: 0,
            uniform_buffers: HashMap::new(),
            texture_units: HashMap::new(),
            sampler_units: HashMap::new(),
            capabilities: HashSet::new(),
            fixed: FixedFunctionState {
                depth_func: gl::LESS,
                depth_write: true,
                color_write: [true; 4],
                blend: [gl::ONE, gl::ZERO, gl::ONE, gl::ZERO],
                polygon_mode: gl::FILL,
                polygon_offset: (0.0, 0.0),
                logic_op: gl::COPY,
                scissor: [0, 0, width as i32, height as i32],
                viewport: [0, 0, width as i32, height as i32],
            },
            clear_rgba: [0.0; 4],
            clear_depth_value: 1.0,
            next_link: None,
            next_allocation_error: None,
            stall_fences: false,
        }
    }

    /// Records an error unless an older one is still pending.
    fn fail(&mut self, error: GLenum) {
        if self.error == gl::NO_ERROR {
            self.error = error;
        }
    }

    fn check_allocation(&mut self, size: u64) -> bool {
        if let Some(error) = self.next_allocation_error.take() {
            self.fail(error);
            return false;
        }
        if size > self.config.max_allocation {
            self.fail(gl::OUT_OF_MEMORY);
            return false;
        }
        true
    }

    fn allocate_buffer(
        &mut self,
        buffer: GlName,
        size: u64,
        data: Option<&[u8]>,
        immutable_flags: Option<GLenum>,
    ) {
        match self.buffers.get(&buffer) {
            None => return self.fail(gl::INVALID_OPERATION),
            Some(b) if b.immutable_flags.is_some() => return self.fail(gl::INVALID_OPERATION),
            Some(_) => {}
        }
        if !self.check_allocation(size) {
            return;
        }
        let mut bytes = vec![0; size as usize];
        if let Some(data) = data {
            let n = data.len().min(bytes.len());
            bytes[..n].copy_from_slice(&data[..n]);
        }
        if let Some(b) = self.buffers.get_mut(&buffer) {
            b.data = bytes;
            b.allocated = true;
            b.immutable_flags = immutable_flags;
        }
    }

    fn range(&self, buffer: GlName, offset: u64, length: u64) -> Option<(usize, usize)> {
        let b = self.buffers.get(&buffer).filter(|b| b.allocated)?;
        let end = offset.checked_add(length)?;
        (end <= b.data.len() as u64).then_some((offset as usize, end as usize))
    }

    fn image(&self, attachment: Option<(GlName, u32)>) -> Option<&Image> {
        let (texture, level) = attachment?;
        self.textures.get(&texture)?.images.get(&(gl::TEXTURE_2D, level))
    }

    fn image_mut(&mut self, attachment: Option<(GlName, u32)>) -> Option<&mut Image> {
        let (texture, level) = attachment?;
        self.textures
            .get_mut(&texture)?
            .images
            .get_mut(&(gl::TEXTURE_2D, level))
    }

    fn framebuffer(&self, name: GlName) -> Framebuffer {
        self.framebuffers.get(&name).copied().unwrap_or_default()
    }

    fn color_target_mut(&mut self, framebuffer: GlName) -> Option<&mut Image> {
        if framebuffer == 0 {
            return Some(&mut self.default_framebuffer);
        }
        let attachment = self.framebuffer(framebuffer).color;
        self.image_mut(attachment)
    }

    fn color_source(&self, framebuffer: GlName) -> Option<&Image> {
        if framebuffer == 0 {
            return Some(&self.default_framebuffer);
        }
        self.image(self.framebuffer(framebuffer).color)
    }

    fn is_depth_texture(&self, attachment: Option<(GlName, u32)>) -> bool {
        attachment
            .and_then(|(t, _)| self.textures.get(&t))
            .is_some_and(|t| t.depth)
    }

    fn clear_color_target(&mut self) {
        let scissor = self
            .capabilities
            .contains(&gl::SCISSOR_TEST)
            .then_some(self.fixed.scissor);
        let mask = self.fixed.color_write;
        let rgba = self.clear_rgba;
        let framebuffer = self.draw_framebuffer;
        let Some(image) = self.color_target_mut(framebuffer) else {
            return;
        };
        let (x0, y0, x1, y1) = image.clamp(scissor.unwrap_or([0, 0, i32::MAX, i32::MAX]));
        let bytes = rgba.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        for y in y0..y1 {
            for x in x0..x1 {
                let i = image.pixel_index(x, y);
                for (c, byte) in bytes.iter().enumerate().take(image.bytes_per_pixel) {
                    if mask[c] {
                        image.data[i + c] = *byte;
                    }
                }
            }
        }
    }

    fn clear_depth_target(&mut self) {
        if !self.fixed.depth_write {
            return;
        }
        let scissor = self
            .capabilities
            .contains(&gl::SCISSOR_TEST)
            .then_some(self.fixed.scissor);
        let depth = self.clear_depth_value as f32;
        let attachment = self.framebuffer(self.draw_framebuffer).depth;
        let Some(image) = self.image_mut(attachment) else {
            return;
        };
        let (x0, y0, x1, y1) = image.clamp(scissor.unwrap_or([0, 0, i32::MAX, i32::MAX]));
        for y in y0..y1 {
            for x in x0..x1 {
                let i = image.pixel_index(x, y);
                image.data[i..i + 4].copy_from_slice(bytemuck::bytes_of(&depth));
            }
        }
    }

    fn blit(&mut self, source: [i32; 4], destination: [i32; 4], depth: bool) {
        let read = self.framebuffer(self.read_framebuffer);
        let src = if depth {
            self.image(read.depth).cloned()
        } else {
            self.color_source(self.read_framebuffer).cloned()
        };
        let Some(src) = src else {
            return self.fail(gl::INVALID_OPERATION);
        };
        let draw_attachment = self.framebuffer(self.draw_framebuffer).depth;
        let framebuffer = self.draw_framebuffer;
        let dst = if depth {
            self.image_mut(draw_attachment)
        } else {
            self.color_target_mut(framebuffer)
        };
        let Some(dst) = dst else {
            return self.fail(gl::INVALID_OPERATION);
        };
        if dst.bytes_per_pixel != src.bytes_per_pixel {
            return self.fail(gl::INVALID_OPERATION);
        }

        let (sw, sh) = (source[2] - source[0], source[3] - source[1]);
        let (dw, dh) = (destination[2] - destination[0], destination[3] - destination[1]);
        if sw <= 0 || sh <= 0 || dw <= 0 || dh <= 0 {
            return;
        }
        let bpp = src.bytes_per_pixel;
        for dy in 0..dh {
            let ty = destination[1] + dy;
            let sy = source[1] + dy * sh / dh;
            if ty < 0 || ty >= dst.height as i32 || sy < 0 || sy >= src.height as i32 {
                continue;
            }
            for dx in 0..dw {
                let tx = destination[0] + dx;
                let sx = source[0] + dx * sw / dw;
                if tx < 0 || tx >= dst.width as i32 || sx < 0 || sx >= src.width as i32 {
                    continue;
                }
                let si = src.pixel_index(sx as u32, sy as u32);
                let di = dst.pixel_index(tx as u32, ty as u32);
                dst.data[di..di + bpp].copy_from_slice(&src.data[si..si + bpp]);
            }
        }
    }

    fn record_draw(&mut self, mut record: DrawRecord) {
        let linked = self
            .programs
            .get(&self.current_program)
            .is_some_and(|p| p.linked);
        if !linked {
            return self.fail(gl::INVALID_OPERATION);
        }
        if record.index_type.is_some() {
            let elements = self
                .vertex_arrays
                .get(&self.current_vertex_array)
                .map_or(0, |v| v.element_buffer);
            if elements == 0 {
                return self.fail(gl::INVALID_OPERATION);
            }
        }
        record.program = self.current_program;
        record.vertex_array = self.current_vertex_array;
        self.draws.push(record);
    }
}

/// Splits GLSL source into declared uniform blocks and plain uniforms.
fn introspect(source: &str) -> (Vec<String>, Vec<String>) {
    let mut blocks = Vec::new();
    let mut uniforms = Vec::new();
    for line in source.lines() {
        let mut line = line.trim();
        if let Some(rest) = line.strip_prefix("layout") {
            if let Some(close) = rest.find(')') {
                line = rest[close + 1..].trim();
            }
        }
        let Some(rest) = line.strip_prefix("uniform ") else {
            continue;
        };
        if let Some(brace) = rest.find('{') {
            blocks.push(rest[..brace].trim().to_string());
            continue;
        }
        let tokens: Vec<&str> = rest
            .split(|c: char| c.is_whitespace() || c == ';')
            .filter(|t| !t.is_empty())
            .collect();
        match tokens.as_slice() {
            [name] => blocks.push(name.to_string()),
            [_, name, ..] => {
                let name = name.split('[').next().unwrap_or(name);
                uniforms.push(name.to_string());
            }
            [] => {}
        }
    }
    (blocks, uniforms)
}

fn push_unique(into: &mut Vec<String>, names: &[String]) {
    for name in names {
        if !into.contains(name) {
            into.push(name.clone());
        }
    }
}

fn bytes_per_pixel(internal_format: GLenum) -> Option<usize> {
    match internal_format {
        gl::RGBA8 | gl::DEPTH_COMPONENT32F => Some(4),
        gl::R8 | gl::R8I => Some(1),
        _ => None,
    }
}

/// A headless, software-only [`GlDriver`].
#[derive(Clone)]
pub struct HeadlessDriver {
    state: Arc<Mutex<HeadlessState>>,
}

impl Default for HeadlessDriver {
    fn default() -> Self {
        Self::new(HeadlessConfig::default())
    }
}

impl std::fmt::Debug for HeadlessDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessDriver")
            .field("renderer", &self.inspect().config.renderer)
            .finish()
    }
}

impl HeadlessDriver {
    /// Creates a driver reporting `config`.
    pub fn new(config: HeadlessConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(HeadlessState::new(config))),
        }
    }

    fn inspect(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn call(&self, entry: &'static str) -> MutexGuard<'_, HeadlessState> {
        let mut state = self.inspect();
        *state.calls.entry(entry).or_insert(0) += 1;
        state.total_calls += 1;
        state
    }

    // --- Probes ---

    /// How many times the named entry point was called, e.g. `"use_program"`.
    pub fn call_count(&self, entry: &str) -> usize {
        self.inspect().calls.get(entry).copied().unwrap_or(0)
    }

    /// Every draw the driver accepted, in order.
    pub fn draws(&self) -> Vec<DrawRecord> {
        self.inspect().draws.clone()
    }

    /// Objects created and not yet deleted.
    pub fn live_objects(&self) -> LiveObjects {
        let s = self.inspect();
        LiveObjects {
            buffers: s.buffers.len(),
            textures: s.textures.len(),
            samplers: s.samplers.len(),
            framebuffers: s.framebuffers.len(),
            shaders: s.shaders.len(),
            programs: s.programs.len(),
            vertex_arrays: s.vertex_arrays.len() - 1,
            syncs: s.syncs.len(),
            queries: s.queries.len(),
        }
    }

    /// The store of a buffer.
    pub fn buffer_contents(&self, buffer: GlName) -> Option<Vec<u8>> {
        self.inspect().buffers.get(&buffer).map(|b| b.data.clone())
    }

    /// The texels of a 2D texture mip level.
    pub fn texture_pixels(&self, texture: GlName, level: u32) -> Option<Vec<u8>> {
        let s = self.inspect();
        s.image(Some((texture, level))).map(|i| i.data.clone())
    }

    /// How many faces and levels a texture has storage for.
    pub fn texture_image_count(&self, texture: GlName) -> usize {
        self.inspect()
            .textures
            .get(&texture)
            .map_or(0, |t| t.images.len())
    }

    /// A texture parameter last set with `tex_parameter`.
    pub fn texture_parameter(&self, texture: GlName, name: GLenum) -> Option<i32> {
        self.inspect()
            .textures
            .get(&texture)
            .and_then(|t| t.parameters.get(&name).copied())
    }

    /// A sampler parameter.
    pub fn sampler_parameter_value(&self, sampler: GlName, name: GLenum) -> Option<f32> {
        self.inspect()
            .samplers
            .get(&sampler)
            .and_then(|p| p.get(&name).copied())
    }

    /// RGBA8 pixels of the default framebuffer.
    pub fn default_framebuffer_pixels(&self) -> Vec<u8> {
        self.inspect().default_framebuffer.data.clone()
    }

    /// The label attached to an object through either label entry point.
    pub fn label(&self, identifier: GLenum, name: GlName) -> Option<String> {
        self.inspect().labels.get(&(identifier, name)).cloned()
    }

    /// Number of labelled objects.
    pub fn label_count(&self) -> usize {
        self.inspect().labels.len()
    }

    /// Current debug group nesting depth.
    pub fn debug_group_depth(&self) -> usize {
        self.inspect().debug_depth
    }

    /// The buffer bound to vertex binding slot 0 of a vertex array.
    pub fn vertex_array_buffer(&self, vertex_array: GlName) -> Option<GlName> {
        self.inspect()
            .vertex_arrays
            .get(&vertex_array)
            .and_then(|v| v.vertex_buffer)
    }

    /// Enabled attribute indices of a vertex array.
    pub fn vertex_array_attributes(&self, vertex_array: GlName) -> Vec<u32> {
        self.inspect()
            .vertex_arrays
            .get(&vertex_array)
            .map(|v| v.enabled.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The currently bound program.
    pub fn current_program(&self) -> GlName {
        self.inspect().current_program
    }

    /// The value of an integer uniform of a program.
    pub fn uniform_value(&self, program: GlName, location: i32) -> Option<i32> {
        self.inspect()
            .programs
            .get(&program)
            .and_then(|p| p.uniform_values.get(&location).copied())
    }

    /// The binding point assigned to a uniform block.
    pub fn uniform_block_binding_of(&self, program: GlName, block: u32) -> Option<u32> {
        self.inspect()
            .programs
            .get(&program)
            .and_then(|p| p.block_bindings.get(&block).copied())
    }

    /// The attribute locations bound before linking.
    pub fn attribute_locations(&self, program: GlName) -> Vec<(u32, String)> {
        let s = self.inspect();
        let mut out: Vec<(u32, String)> = s
            .programs
            .get(&program)
            .map(|p| p.attributes.iter().map(|(i, n)| (*i, n.clone())).collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    /// The range bound at an indexed uniform buffer binding.
    pub fn uniform_buffer_binding(&self, index: u32) -> Option<(GlName, u64, u64)> {
        self.inspect().uniform_buffers.get(&index).copied()
    }

    /// The texture bound to a texture unit.
    pub fn texture_unit(&self, unit: u32) -> Option<(GLenum, GlName)> {
        self.inspect().texture_units.get(&unit).copied()
    }

    /// The buffer attached to a buffer texture.
    pub fn texture_buffer(&self, texture: GlName) -> Option<GlName> {
        self.inspect()
            .textures
            .get(&texture)
            .and_then(|t| t.buffer.map(|(_, b)| b))
    }

    /// The sampler bound to a texture unit.
    pub fn sampler_unit(&self, unit: u32) -> Option<GlName> {
        self.inspect().sampler_units.get(&unit).copied()
    }

    /// Whether a capability is enabled.
    pub fn is_enabled(&self, capability: GLenum) -> bool {
        self.inspect().capabilities.contains(&capability)
    }

    /// The fixed-function state.
    pub fn fixed_function(&self) -> FixedFunctionState {
        self.inspect().fixed.clone()
    }

    /// The framebuffer bound for drawing.
    pub fn draw_framebuffer(&self) -> GlName {
        self.inspect().draw_framebuffer
    }

    // --- Failure injection ---

    /// Makes the next link fail with `log`.
    pub fn fail_next_link(&self, log: impl Into<String>) {
        self.inspect().next_link = Some((false, log.into()));
    }

    /// Makes the next link succeed but report `log`.
    pub fn warn_next_link(&self, log: impl Into<String>) {
        self.inspect().next_link = Some((true, log.into()));
    }

    /// Makes the next buffer or texture allocation record `error`.
    pub fn fail_next_allocation(&self, error: GLenum) {
        self.inspect().next_allocation_error = Some(error);
    }

    /// While set, fence waits time out.
    pub fn stall_fences(&self, stall: bool) {
        self.inspect().stall_fences = stall;
    }
}

impl GlDriver for HeadlessDriver {
    fn get_string(&self, name: GLenum) -> String {
        let s = self.call("get_string");
        match name {
            gl::VENDOR => s.config.vendor.clone(),
            gl::RENDERER => s.config.renderer.clone(),
            gl::VERSION => s.config.version.clone(),
            _ => String::new(),
        }
    }

    fn get_integer(&self, name: GLenum) -> i32 {
        let s = self.call("get_integer");
        match name {
            gl::MAX_TEXTURE_SIZE => s.config.max_texture_size,
            gl::MAX_LABEL_LENGTH => s.config.max_label_length,
            gl::UNIFORM_BUFFER_OFFSET_ALIGNMENT => s.config.uniform_offset_alignment,
            gl::MAX_TEXTURE_MAX_ANISOTROPY => s.config.max_anisotropy,
            _ => 0,
        }
    }

    fn extensions(&self) -> Vec<String> {
        self.call("extensions").config.extensions.clone()
    }

    fn get_error(&mut self) -> GLenum {
        let mut s = self.call("get_error");
        std::mem::replace(&mut s.error, gl::NO_ERROR)
    }

    // --- Buffers ---

    fn create_buffer(&mut self) -> GlName {
        let mut s = self.call("create_buffer");
        let name = s.buffer_names.alloc();
        s.buffers.insert(name, Buffer::default());
        name
    }

    fn delete_buffer(&mut self, buffer: GlName) {
        let mut s = self.call("delete_buffer");
        if s.buffers.remove(&buffer).is_some() {
            s.buffer_names.release(buffer);
            s.labels.retain(|(id, n), _| {
                !(*n == buffer && (*id == gl::BUFFER || *id == gl::BUFFER_OBJECT_EXT))
            });
        }
    }

    fn buffer_data(&mut self, buffer: GlName, size: u64, data: Option<&[u8]>, _usage: GLenum) {
        self.call("buffer_data").allocate_buffer(buffer, size, data, None);
    }

    fn buffer_storage(&mut self, buffer: GlName, size: u64, data: Option<&[u8]>, flags: GLenum) {
        self.call("buffer_storage")
            .allocate_buffer(buffer, size, data, Some(flags));
    }

    fn buffer_sub_data(&mut self, buffer: GlName, offset: u64, data: &[u8]) {
        let mut s = self.call("buffer_sub_data");
        let Some((start, end)) = s.range(buffer, offset, data.len() as u64) else {
            return s.fail(gl::INVALID_VALUE);
        };
        let Some(b) = s.buffers.get_mut(&buffer) else {
            return;
        };
        if b.immutable_flags.is_some_and(|f| f & gl::DYNAMIC_STORAGE_BIT == 0) {
            return s.fail(gl::INVALID_OPERATION);
        }
        b.data[start..end].copy_from_slice(data);
    }

    fn map_buffer_range(
        &mut self,
        buffer: GlName,
        offset: u64,
        length: u64,
        access: GLenum,
    ) -> Option<Vec<u8>> {
        let mut s = self.call("map_buffer_range");
        let Some((start, end)) = s.range(buffer, offset, length) else {
            s.fail(gl::INVALID_VALUE);
            return None;
        };
        let wanted = access & (gl::MAP_READ_BIT | gl::MAP_WRITE_BIT);
        let b = s.buffers.get_mut(&buffer)?;
        let allowed = b.immutable_flags.map_or(true, |f| f & wanted == wanted);
        if wanted == 0 || !allowed || b.mapping.is_some() {
            s.fail(gl::INVALID_OPERATION);
            return None;
        }
        b.mapping = Some(Mapping {
            offset: start,
            length: end - start,
            access,
        });
        Some(b.data[start..end].to_vec())
    }

    fn unmap_buffer(&mut self, buffer: GlName, written: Option<&[u8]>) -> bool {
        let mut s = self.call("unmap_buffer");
        let Some(b) = s.buffers.get_mut(&buffer) else {
            s.fail(gl::INVALID_OPERATION);
            return false;
        };
        let Some(mapping) = b.mapping.take() else {
            s.fail(gl::INVALID_OPERATION);
            return false;
        };
        if let Some(written) = written {
            if mapping.access & gl::MAP_WRITE_BIT != 0 {
                let n = written.len().min(mapping.length);
                b.data[mapping.offset..mapping.offset + n].copy_from_slice(&written[..n]);
            }
        }
        true
    }

    fn copy_buffer_sub_data(
        &mut self,
        source: GlName,
        destination: GlName,
        source_offset: u64,
        destination_offset: u64,
        size: u64,
    ) {
        let mut s = self.call("copy_buffer_sub_data");
        let (Some((ss, se)), Some((ds, de))) = (
            s.range(source, source_offset, size),
            s.range(destination, destination_offset, size),
        ) else {
            return s.fail(gl::INVALID_VALUE);
        };
        let bytes = s.buffers[&source].data[ss..se].to_vec();
        if let Some(b) = s.buffers.get_mut(&destination) {
            b.data[ds..de].copy_from_slice(&bytes);
        }
    }

    fn bind_buffer(&mut self, target: GLenum, buffer: GlName) {
        let mut s = self.call("bind_buffer");
        if buffer != 0 && !s.buffers.contains_key(&buffer) {
            return s.fail(gl::INVALID_OPERATION);
        }
        match target {
            gl::ARRAY_BUFFER => s.array_buffer = buffer,
            gl::ELEMENT_ARRAY_BUFFER => {
                let vao = s.current_vertex_array;
                if let Some(v) = s.vertex_arrays.get_mut(&vao) {
                    v.element_buffer = buffer;
                }
            }
            _ => {}
        }
    }

    fn bind_buffer_range(
        &mut self,
        target: GLenum,
        index: u32,
        buffer: GlName,
        offset: u64,
        size: u64,
    ) {
        let mut s = self.call("bind_buffer_range");
        if target != gl::UNIFORM_BUFFER || s.range(buffer, offset, size).is_none() {
            return s.fail(gl::INVALID_VALUE);
        }
        let alignment = s.config.uniform_offset_alignment.max(1) as u64;
        if offset % alignment != 0 {
            return s.fail(gl::INVALID_VALUE);
        }
        s.uniform_buffers.insert(index, (buffer, offset, size));
    }

    // --- Textures ---

    fn create_texture(&mut self, target: GLenum) -> GlName {
        let mut s = self.call("create_texture");
        let name = s.texture_names.alloc();
        s.textures.insert(
            name,
            Texture {
                target,
                images: HashMap::new(),
                parameters: HashMap::new(),
                depth: false,
                buffer: None,
            },
        );
        name
    }

    fn delete_texture(&mut self, texture: GlName) {
        let mut s = self.call("delete_texture");
        if s.textures.remove(&texture).is_some() {
            s.texture_names.release(texture);
            s.labels.remove(&(gl::TEXTURE, texture));
        }
    }

    fn tex_image_2d(
        &mut self,
        texture: GlName,
        face: GLenum,
        level: u32,
        internal_format: GLenum,
        width: u32,
        height: u32,
        data: Option<&[u8]>,
    ) {
        let mut s = self.call("tex_image_2d");
        let Some(bpp) = bytes_per_pixel(internal_format) else {
            return s.fail(gl::INVALID_ENUM);
        };
        let max = s.config.proxy_limit;
        if width == 0 || height == 0 || width > max || height > max {
            return s.fail(gl::INVALID_VALUE);
        }
        if !s.textures.contains_key(&texture) {
            return s.fail(gl::INVALID_OPERATION);
        }
        let mut image = Image::new(width, height, bpp);
        if !s.check_allocation(image.data.len() as u64) {
            return;
        }
        if let Some(data) = data {
            let n = data.len().min(image.data.len());
            image.data[..n].copy_from_slice(&data[..n]);
        }
        if let Some(t) = s.textures.get_mut(&texture) {
            t.depth = internal_format == gl::DEPTH_COMPONENT32F;
            t.images.insert((face, level), image);
        }
    }

    fn tex_sub_image_2d(
        &mut self,
        texture: GlName,
        level: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: &[u8],
    ) {
        let mut s = self.call("tex_sub_image_2d");
        let Some(image) = s.image_mut(Some((texture, level))) else {
            return s.fail(gl::INVALID_OPERATION);
        };
        let bpp = image.bytes_per_pixel;
        let fits = x + width <= image.width && y + height <= image.height;
        if !fits || data.len() < width as usize * height as usize * bpp {
            return s.fail(gl::INVALID_VALUE);
        }
        let row = width as usize * bpp;
        for r in 0..height {
            let di = image.pixel_index(x, y + r);
            let si = r as usize * row;
            image.data[di..di + row].copy_from_slice(&data[si..si + row]);
        }
    }

    fn tex_parameter(&mut self, texture: GlName, name: GLenum, value: i32) {
        let mut s = self.call("tex_parameter");
        match s.textures.get_mut(&texture) {
            Some(t) => {
                t.parameters.insert(name, value);
            }
            None => s.fail(gl::INVALID_OPERATION),
        }
    }

    fn proxy_texture_fits(&mut self, size: u32) -> bool {
        let s = self.call("proxy_texture_fits");
        size <= s.config.proxy_limit
    }

    fn tex_buffer(&mut self, texture: GlName, internal_format: GLenum, buffer: GlName) {
        let mut s = self.call("tex_buffer");
        if !s.buffers.contains_key(&buffer) {
            return s.fail(gl::INVALID_OPERATION);
        }
        match s.textures.get_mut(&texture) {
            Some(t) if t.target == gl::TEXTURE_BUFFER => t.buffer = Some((internal_format, buffer)),
            _ => s.fail(gl::INVALID_OPERATION),
        }
    }

    fn bind_texture_unit(&mut self, unit: u32, target: GLenum, texture: GlName) {
        let mut s = self.call("bind_texture_unit");
        if texture != 0 && s.textures.get(&texture).map(|t| t.target) != Some(target) {
            return s.fail(gl::INVALID_OPERATION);
        }
        s.texture_units.insert(unit, (target, texture));
    }

    // --- Samplers ---

    fn create_sampler(&mut self) -> GlName {
        let mut s = self.call("create_sampler");
        let name = s.sampler_names.alloc();
        s.samplers.insert(name, HashMap::new());
        name
    }

    fn delete_sampler(&mut self, sampler: GlName) {
        let mut s = self.call("delete_sampler");
        if s.samplers.remove(&sampler).is_some() {
            s.sampler_names.release(sampler);
            s.sampler_units.retain(|_, bound| *bound != sampler);
        }
    }

    fn sampler_parameter(&mut self, sampler: GlName, name: GLenum, value: i32) {
        self.sampler_parameter_f(sampler, name, value as f32);
    }

    fn sampler_parameter_f(&mut self, sampler: GlName, name: GLenum, value: f32) {
        let mut s = self.call("sampler_parameter");
        match s.samplers.get_mut(&sampler) {
            Some(p) => {
                p.insert(name, value);
            }
            None => s.fail(gl::INVALID_OPERATION),
        }
    }

    fn bind_sampler(&mut self, unit: u32, sampler: GlName) {
        let mut s = self.call("bind_sampler");
        if sampler != 0 && !s.samplers.contains_key(&sampler) {
            return s.fail(gl::INVALID_OPERATION);
        }
        s.sampler_units.insert(unit, sampler);
    }

    // --- Framebuffers ---

    fn create_framebuffer(&mut self) -> GlName {
        let mut s = self.call("create_framebuffer");
        let name = s.framebuffer_names.alloc();
        s.framebuffers.insert(name, Framebuffer::default());
        name
    }

    fn delete_framebuffer(&mut self, framebuffer: GlName) {
        let mut s = self.call("delete_framebuffer");
        if s.framebuffers.remove(&framebuffer).is_some() {
            s.framebuffer_names.release(framebuffer);
            if s.draw_framebuffer == framebuffer {
                s.draw_framebuffer = 0;
            }
            if s.read_framebuffer == framebuffer {
                s.read_framebuffer = 0;
            }
        }
    }

    fn framebuffer_texture(
        &mut self,
        framebuffer: GlName,
        attachment: GLenum,
        texture: GlName,
        level: u32,
    ) {
        let mut s = self.call("framebuffer_texture");
        if texture != 0 && s.image(Some((texture, level))).is_none() {
            return s.fail(gl::INVALID_OPERATION);
        }
        let target = (texture != 0).then_some((texture, level));
        let Some(fb) = s.framebuffers.get_mut(&framebuffer) else {
            return s.fail(gl::INVALID_OPERATION);
        };
        match attachment {
            gl::COLOR_ATTACHMENT0 => fb.color = target,
            gl::DEPTH_ATTACHMENT => fb.depth = target,
            _ => s.fail(gl::INVALID_ENUM),
        }
    }

    fn bind_framebuffer(&mut self, target: GLenum, framebuffer: GlName) {
        let mut s = self.call("bind_framebuffer");
        if framebuffer != 0 && !s.framebuffers.contains_key(&framebuffer) {
            return s.fail(gl::INVALID_OPERATION);
        }
        match target {
            gl::FRAMEBUFFER => {
                s.draw_framebuffer = framebuffer;
                s.read_framebuffer = framebuffer;
            }
            gl::DRAW_FRAMEBUFFER => s.draw_framebuffer = framebuffer,
            gl::READ_FRAMEBUFFER => s.read_framebuffer = framebuffer,
            _ => s.fail(gl::INVALID_ENUM),
        }
    }

    fn clear_color(&mut self, rgba: [f32; 4]) {
        self.call("clear_color").clear_rgba = rgba;
    }

    fn clear_depth(&mut self, depth: f64) {
        self.call("clear_depth").clear_depth_value = depth;
    }

    fn clear(&mut self, mask: GLenum) {
        let mut s = self.call("clear");
        if mask & gl::COLOR_BUFFER_BIT != 0 {
            s.clear_color_target();
        }
        if mask & gl::DEPTH_BUFFER_BIT != 0 {
            s.clear_depth_target();
        }
    }

    fn blit_framebuffer(
        &mut self,
        source: [i32; 4],
        destination: [i32; 4],
        mask: GLenum,
        _filter: GLenum,
    ) {
        let mut s = self.call("blit_framebuffer");
        if mask & gl::COLOR_BUFFER_BIT != 0 {
            s.blit(source, destination, false);
        }
        if mask & gl::DEPTH_BUFFER_BIT != 0 {
            s.blit(source, destination, true);
        }
    }

    fn read_pixels_to_buffer(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        format: GLenum,
        buffer: GlName,
        offset: u64,
    ) {
        let mut s = self.call("read_pixels_to_buffer");
        let read = s.framebuffer(s.read_framebuffer);
        let source = if format == gl::DEPTH_COMPONENT {
            if !s.is_depth_texture(read.depth) {
                return s.fail(gl::INVALID_OPERATION);
            }
            s.image(read.depth).cloned()
        } else {
            s.color_source(s.read_framebuffer).cloned()
        };
        let Some(image) = source else {
            return s.fail(gl::INVALID_OPERATION);
        };
        if x + width > image.width || y + height > image.height {
            return s.fail(gl::INVALID_VALUE);
        }
        let row = width as usize * image.bytes_per_pixel;
        let Some((start, _)) = s.range(buffer, offset, (row * height as usize) as u64) else {
            return s.fail(gl::INVALID_OPERATION);
        };
        let Some(b) = s.buffers.get_mut(&buffer) else {
            return;
        };
        for r in 0..height {
            let si = image.pixel_index(x, y + r);
            let di = start + r as usize * row;
            b.data[di..di + row].copy_from_slice(&image.data[si..si + row]);
        }
    }

    // --- Shaders and programs ---

    fn create_shader(&mut self, kind: GLenum) -> GlName {
        let mut s = self.call("create_shader");
        let name = s.object_names.alloc();
        s.shaders.insert(
            name,
            Shader {
                kind,
                source: String::new(),
                compiled: false,
                log: String::new(),
                blocks: Vec::new(),
                uniforms: Vec::new(),
            },
        );
        name
    }

    fn delete_shader(&mut self, shader: GlName) {
        let mut s = self.call("delete_shader");
        if s.shaders.remove(&shader).is_some() {
            s.object_names.release(shader);
        }
    }

    fn shader_source(&mut self, shader: GlName, source: &str) {
        let mut s = self.call("shader_source");
        match s.shaders.get_mut(&shader) {
            Some(sh) => sh.source = source.to_string(),
            None => s.fail(gl::INVALID_VALUE),
        }
    }

    fn compile_shader(&mut self, shader: GlName) {
        let mut s = self.call("compile_shader");
        let Some(sh) = s.shaders.get_mut(&shader) else {
            return s.fail(gl::INVALID_VALUE);
        };
        let errors: Vec<String> = sh
            .source
            .lines()
            .enumerate()
            .filter_map(|(i, line)| {
                line.trim()
                    .strip_prefix("#error")
                    .map(|msg| format!("0:{}(0): error: {}", i + 1, msg.trim()))
            })
            .collect();
        sh.compiled = errors.is_empty();
        sh.log = errors.join("\n");
        if sh.compiled {
            let (blocks, uniforms) = introspect(&sh.source);
            sh.blocks = blocks;
            sh.uniforms = uniforms;
        }
    }

    fn shader_compile_status(&self, shader: GlName) -> bool {
        self.call("shader_compile_status")
            .shaders
            .get(&shader)
            .is_some_and(|sh| sh.compiled)
    }

    fn shader_info_log(&self, shader: GlName) -> String {
        self.call("shader_info_log")
            .shaders
            .get(&shader)
            .map(|sh| sh.log.clone())
            .unwrap_or_default()
    }

    fn create_program(&mut self) -> GlName {
        let mut s = self.call("create_program");
        let name = s.object_names.alloc();
        s.programs.insert(name, Program::default());
        name
    }

    fn delete_program(&mut self, program: GlName) {
        let mut s = self.call("delete_program");
        if s.programs.remove(&program).is_some() {
            s.object_names.release(program);
            if s.current_program == program {
                s.current_program = 0;
            }
        }
    }

    fn attach_shader(&mut self, program: GlName, shader: GlName) {
        let mut s = self.call("attach_shader");
        if !s.shaders.contains_key(&shader) {
            return s.fail(gl::INVALID_VALUE);
        }
        match s.programs.get_mut(&program) {
            Some(p) => p.shaders.push(shader),
            None => s.fail(gl::INVALID_VALUE),
        }
    }

    fn bind_attrib_location(&mut self, program: GlName, index: u32, name: &str) {
        let mut s = self.call("bind_attrib_location");
        match s.programs.get_mut(&program) {
            Some(p) => {
                p.attributes.insert(index, name.to_string());
            }
            None => s.fail(gl::INVALID_VALUE),
        }
    }

    fn link_program(&mut self, program: GlName) {
        let mut s = self.call("link_program");
        let Some(attached) = s.programs.get(&program).map(|p| p.shaders.clone()) else {
            return s.fail(gl::INVALID_VALUE);
        };
        let stages: Vec<&Shader> = attached.iter().filter_map(|n| s.shaders.get(n)).collect();
        let has = |kind| stages.iter().any(|sh| sh.kind == kind && sh.compiled);
        let complete = has(gl::VERTEX_SHADER) && has(gl::FRAGMENT_SHADER);
        let mut blocks = Vec::new();
        let mut uniforms = Vec::new();
        for sh in &stages {
            push_unique(&mut blocks, &sh.blocks);
            push_unique(&mut uniforms, &sh.uniforms);
        }

        let (linked, log) = match s.next_link.take() {
            Some(forced) => forced,
            None if complete => (true, String::new()),
            None => (
                false,
                "error: program needs a compiled vertex and fragment shader".to_string(),
            ),
        };
        if let Some(p) = s.programs.get_mut(&program) {
            p.linked = linked;
            p.log = log;
            p.blocks = if linked { blocks } else { Vec::new() };
            p.uniforms = if linked { uniforms } else { Vec::new() };
        }
    }

    fn program_link_status(&self, program: GlName) -> bool {
        self.call("program_link_status")
            .programs
            .get(&program)
            .is_some_and(|p| p.linked)
    }

    fn program_info_log(&self, program: GlName) -> String {
        self.call("program_info_log")
            .programs
            .get(&program)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: GlName) {
        let mut s = self.call("use_program");
        if program != 0 && !s.programs.get(&program).is_some_and(|p| p.linked) {
            return s.fail(gl::INVALID_OPERATION);
        }
        s.current_program = program;
    }

    fn get_uniform_location(&self, program: GlName, name: &str) -> Option<i32> {
        let s = self.call("get_uniform_location");
        let p = s.programs.get(&program)?;
        p.uniforms.iter().position(|u| u == name).map(|i| i as i32)
    }

    fn get_uniform_block_index(&self, program: GlName, name: &str) -> Option<u32> {
        let s = self.call("get_uniform_block_index");
        let p = s.programs.get(&program)?;
        p.blocks.iter().position(|b| b == name).map(|i| i as u32)
    }

    fn active_uniform_blocks(&self, program: GlName) -> Vec<String> {
        self.call("active_uniform_blocks")
            .programs
            .get(&program)
            .map(|p| p.blocks.clone())
            .unwrap_or_default()
    }

    fn uniform_block_binding(&mut self, program: GlName, block: u32, binding: u32) {
        let mut s = self.call("uniform_block_binding");
        match s.programs.get_mut(&program) {
            Some(p) if (block as usize) < p.blocks.len() => {
                p.block_bindings.insert(block, binding);
            }
            _ => s.fail(gl::INVALID_VALUE),
        }
    }

    fn uniform_1i(&mut self, location: i32, value: i32) {
        let mut s = self.call("uniform_1i");
        let current = s.current_program;
        match s.programs.get_mut(&current) {
            Some(p) if location >= 0 && (location as usize) < p.uniforms.len() => {
                p.uniform_values.insert(location, value);
            }
            _ => s.fail(gl::INVALID_OPERATION),
        }
    }

    // --- Vertex arrays ---

    fn create_vertex_array(&mut self) -> GlName {
        let mut s = self.call("create_vertex_array");
        let name = s.vertex_array_names.alloc();
        s.vertex_arrays.insert(name, VertexArray::default());
        name
    }

    fn delete_vertex_array(&mut self, vertex_array: GlName) {
        let mut s = self.call("delete_vertex_array");
        if vertex_array != 0 && s.vertex_arrays.remove(&vertex_array).is_some() {
            s.vertex_array_names.release(vertex_array);
            if s.current_vertex_array == vertex_array {
                s.current_vertex_array = 0;
            }
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: GlName) {
        let mut s = self.call("bind_vertex_array");
        if !s.vertex_arrays.contains_key(&vertex_array) {
            return s.fail(gl::INVALID_OPERATION);
        }
        s.current_vertex_array = vertex_array;
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        let mut s = self.call("enable_vertex_attrib_array");
        let vao = s.current_vertex_array;
        if let Some(v) = s.vertex_arrays.get_mut(&vao) {
            v.enabled.insert(index);
        }
    }

    fn vertex_attrib_format(
        &mut self,
        _index: u32,
        size: u32,
        _kind: GLenum,
        _normalized: bool,
        _relative_offset: u32,
    ) {
        let mut s = self.call("vertex_attrib_format");
        if !(1..=4).contains(&size) {
            s.fail(gl::INVALID_VALUE);
        }
    }

    fn vertex_attrib_i_format(&mut self, _index: u32, size: u32, _kind: GLenum, _offset: u32) {
        let mut s = self.call("vertex_attrib_i_format");
        if !(1..=4).contains(&size) {
            s.fail(gl::INVALID_VALUE);
        }
    }

    fn vertex_attrib_binding(&mut self, _index: u32, _binding: u32) {
        self.call("vertex_attrib_binding");
    }

    fn bind_vertex_buffer(&mut self, binding: u32, buffer: GlName, _offset: u64, _stride: u32) {
        let mut s = self.call("bind_vertex_buffer");
        if buffer != 0 && !s.buffers.contains_key(&buffer) {
            return s.fail(gl::INVALID_OPERATION);
        }
        let vao = s.current_vertex_array;
        if let (0, Some(v)) = (binding, s.vertex_arrays.get_mut(&vao)) {
            v.vertex_buffer = (buffer != 0).then_some(buffer);
        }
    }

    fn vertex_attrib_pointer(
        &mut self,
        _index: u32,
        size: u32,
        _kind: GLenum,
        _normalized: bool,
        _stride: u32,
        _offset: u64,
    ) {
        let mut s = self.call("vertex_attrib_pointer");
        s.attach_array_buffer(size);
    }

    fn vertex_attrib_i_pointer(
        &mut self,
        _index: u32,
        size: u32,
        _kind: GLenum,
        _stride: u32,
        _offset: u64,
    ) {
        let mut s = self.call("vertex_attrib_i_pointer");
        s.attach_array_buffer(size);
    }

    // --- Fixed-function state ---

    fn set_capability(&mut self, capability: GLenum, enabled: bool) {
        let mut s = self.call("set_capability");
        if enabled {
            s.capabilities.insert(capability);
        } else {
            s.capabilities.remove(&capability);
        }
    }

    fn depth_func(&mut self, func: GLenum) {
        self.call("depth_func").fixed.depth_func = func;
    }

    fn depth_mask(&mut self, write: bool) {
        self.call("depth_mask").fixed.depth_write = write;
    }

    fn color_mask(&mut self, red: bool, green: bool, blue: bool, alpha: bool) {
        self.call("color_mask").fixed.color_write = [red, green, blue, alpha];
    }

    fn blend_func_separate(
        &mut self,
        source_rgb: GLenum,
        destination_rgb: GLenum,
        source_alpha: GLenum,
        destination_alpha: GLenum,
    ) {
        self.call("blend_func_separate").fixed.blend =
            [source_rgb, destination_rgb, source_alpha, destination_alpha];
    }

    fn polygon_mode(&mut self, mode: GLenum) {
        self.call("polygon_mode").fixed.polygon_mode = mode;
    }

    fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.call("polygon_offset").fixed.polygon_offset = (factor, units);
    }

    fn logic_op(&mut self, op: GLenum) {
        self.call("logic_op").fixed.logic_op = op;
    }

    fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32) {
        let mut s = self.call("scissor");
        if width < 0 || height < 0 {
            return s.fail(gl::INVALID_VALUE);
        }
        s.fixed.scissor = [x, y, width, height];
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        let mut s = self.call("viewport");
        if width < 0 || height < 0 {
            return s.fail(gl::INVALID_VALUE);
        }
        s.fixed.viewport = [x, y, width, height];
    }

    // --- Draws ---

    fn draw_arrays(&mut self, mode: GLenum, first: u32, count: u32) {
        self.call("draw_arrays").record_draw(DrawRecord {
            entry: DrawEntry::Arrays,
            mode,
            first,
            count,
            index_type: None,
            offset: 0,
            base_vertex: 0,
            instances: 1,
            program: 0,
            vertex_array: 0,
        });
    }

    fn draw_elements(&mut self, mode: GLenum, count: u32, index_type: GLenum, offset: u64) {
        self.call("draw_elements").record_draw(DrawRecord {
            entry: DrawEntry::Elements,
            mode,
            first: 0,
            count,
            index_type: Some(index_type),
            offset,
            base_vertex: 0,
            instances: 1,
            program: 0,
            vertex_array: 0,
        });
    }

    fn draw_elements_base_vertex(
        &mut self,
        mode: GLenum,
        count: u32,
        index_type: GLenum,
        offset: u64,
        base_vertex: i32,
    ) {
        self.call("draw_elements_base_vertex").record_draw(DrawRecord {
            entry: DrawEntry::ElementsBaseVertex,
            mode,
            first: 0,
            count,
            index_type: Some(index_type),
            offset,
            base_vertex,
            instances: 1,
            program: 0,
            vertex_array: 0,
        });
    }

    fn draw_elements_instanced(
        &mut self,
        mode: GLenum,
        count: u32,
        index_type: GLenum,
        offset: u64,
        instances: u32,
    ) {
        self.call("draw_elements_instanced").record_draw(DrawRecord {
            entry: DrawEntry::ElementsInstanced,
            mode,
            first: 0,
            count,
            index_type: Some(index_type),
            offset,
            base_vertex: 0,
            instances,
            program: 0,
            vertex_array: 0,
        });
    }

    fn draw_elements_instanced_base_vertex(
        &mut self,
        mode: GLenum,
        count: u32,
        index_type: GLenum,
        offset: u64,
        instances: u32,
        base_vertex: i32,
    ) {
        self.call("draw_elements_instanced_base_vertex")
            .record_draw(DrawRecord {
                entry: DrawEntry::ElementsInstancedBaseVertex,
                mode,
                first: 0,
                count,
                index_type: Some(index_type),
                offset,
                base_vertex,
                instances,
                program: 0,
                vertex_array: 0,
            });
    }

    // --- Debug ---

    fn object_label(&mut self, identifier: GLenum, name: GlName, label: &str) {
        let mut s = self.call("object_label");
        s.store_label(identifier, name, label);
    }

    fn label_object_ext(&mut self, kind: GLenum, name: GlName, label: &str) {
        let mut s = self.call("label_object_ext");
        s.store_label(kind, name, label);
    }

    fn push_debug_group(&mut self, _message: &str) {
        self.call("push_debug_group").debug_depth += 1;
    }

    fn pop_debug_group(&mut self) {
        let mut s = self.call("pop_debug_group");
        match s.debug_depth.checked_sub(1) {
            Some(depth) => s.debug_depth = depth,
            None => s.fail(gl::INVALID_OPERATION),
        }
    }

    // --- Sync ---

    fn fence_sync(&mut self) -> GlName {
        let mut s = self.call("fence_sync");
        let name = s.sync_names.alloc();
        s.syncs.insert(name);
        name
    }

    fn client_wait_sync(&mut self, sync: GlName, _timeout_ns: u64) -> GLenum {
        let mut s = self.call("client_wait_sync");
        if !s.syncs.contains(&sync) {
            s.fail(gl::INVALID_VALUE);
            return gl::WAIT_FAILED;
        }
        if s.stall_fences {
            gl::TIMEOUT_EXPIRED
        } else {
            gl::ALREADY_SIGNALED
        }
    }

    fn delete_sync(&mut self, sync: GlName) {
        let mut s = self.call("delete_sync");
        if s.syncs.remove(&sync) {
            s.sync_names.release(sync);
        }
    }

    fn create_query(&mut self) -> GlName {
        let mut s = self.call("create_query");
        let name = s.query_names.alloc();
        s.queries.insert(name, Query::default());
        name
    }

    fn delete_query(&mut self, query: GlName) {
        let mut s = self.call("delete_query");
        if s.queries.remove(&query).is_some() {
            s.query_names.release(query);
            if s.active_query.is_some_and(|(q, _)| q == query) {
                s.active_query = None;
            }
        }
    }

    fn begin_query(&mut self, target: GLenum, query: GlName) {
        let mut s = self.call("begin_query");
        if target != gl::TIME_ELAPSED || s.active_query.is_some() || !s.queries.contains_key(&query) {
            return s.fail(gl::INVALID_OPERATION);
        }
        s.active_query = Some((query, s.total_calls));
    }

    fn end_query(&mut self, _target: GLenum) {
        let mut s = self.call("end_query");
        let Some((query, start)) = s.active_query.take() else {
            return s.fail(gl::INVALID_OPERATION);
        };
        // Each driver call inside the query counts as one microsecond.
        let elapsed = (s.total_calls - start) as u64 * 1_000;
        if let Some(q) = s.queries.get_mut(&query) {
            q.result = Some(elapsed);
        }
    }

    fn query_result_available(&mut self, query: GlName) -> bool {
        self.call("query_result_available")
            .queries
            .get(&query)
            .is_some_and(|q| q.result.is_some())
    }

    fn query_result(&mut self, query: GlName) -> u64 {
        self.call("query_result")
            .queries
            .get(&query)
            .and_then(|q| q.result)
            .unwrap_or(0)
    }
}

impl HeadlessState {
    fn attach_array_buffer(&mut self, size: u32) {
        if !(1..=4).contains(&size) {
            return self.fail(gl::INVALID_VALUE);
        }
        if self.array_buffer == 0 {
            return self.fail(gl::INVALID_OPERATION);
        }
        let buffer = self.array_buffer;
        let vao = self.current_vertex_array;
        if let Some(v) = self.vertex_arrays.get_mut(&vao) {
            v.vertex_buffer = Some(buffer);
        }
    }

    fn store_label(&mut self, identifier: GLenum, name: GlName, label: &str) {
        if label.len() >= self.config.max_label_length.max(0) as usize {
            return self.fail(gl::INVALID_VALUE);
        }
        self.labels.insert((identifier, name), label.to_string());
    }
}
