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

//! Command encoding, render passes and their synchronization objects.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use kiln_core::renderer::api::command::{
    FenceStatus, RenderObject, RenderPassDescriptor, ScissorState, TextureRegion,
};
use kiln_core::renderer::api::pipeline::{DepthTestFunction, RenderPipeline, UniformKind};
use kiln_core::renderer::api::resource::{
    BufferId, BufferSlice, BufferUsage, SamplerId, TextureId, TextureInfo, TextureUsage,
    TextureViewId,
};
use kiln_core::renderer::api::util::IndexFormat;
use kiln_core::renderer::error::GpuError;
use kiln_core::renderer::traits::{
    CommandEncoder, CompiledRenderPipeline, GpuFence, GpuQuery, MappedView, RenderPass,
};
use kiln_core::utils::argb;

use super::consts::{self as gl, GLenum};
use super::conversions::{GlTextureFormat, IntoGl};
use super::device::{DeviceState, GlBackend, GlCompiledPipeline};
use super::driver::GlName;
use super::program::UniformBinding;

/// Rejects textures with more than one layer.
fn single_layer(info: &TextureInfo) -> Result<(), GpuError> {
    if info.depth_or_layers > 1 {
        return Err(GpuError::UnsupportedOperation(
            "Textures with multiple depths or layers are not yet supported as an attachment".into(),
        ));
    }
    Ok(())
}

fn attachment_info(
    state: &DeviceState,
    texture: TextureId,
    what: &str,
    depth: bool,
) -> Result<TextureInfo, GpuError> {
    let info = state
        .textures
        .get(&texture)
        .map(|e| e.info.clone())
        .ok_or_else(|| GpuError::InvalidArgument(format!("{what} texture is closed")))?;
    if depth && !info.format.has_depth_aspect() {
        return Err(GpuError::InvalidArgument(format!(
            "{what} texture must have a depth format"
        )));
    }
    if !depth && !info.format.has_color_aspect() {
        return Err(GpuError::InvalidArgument(format!(
            "{what} texture must have a color format"
        )));
    }
    if !info.usage.contains(TextureUsage::RENDER_ATTACHMENT) {
        return Err(GpuError::InvalidArgument(format!(
            "{what} texture must have USAGE_RENDER_ATTACHMENT"
        )));
    }
    single_layer(&info)?;
    Ok(info)
}

/// Records commands for a [`GlBackend`].
///
/// Every encoder of a device shares one Idle/PassOpen state: while a pass is
/// open anywhere, no encoder may record outside it.
pub struct GlCommandEncoder {
    backend: GlBackend,
}

impl GlCommandEncoder {
    pub(crate) fn new(backend: GlBackend) -> Self {
        Self { backend }
    }

    fn ensure_idle(&self) -> Result<(), GpuError> {
        if self.backend.state().pass_open {
            return Err(GpuError::InvalidState(
                "Close the existing render pass before performing additional commands".into(),
            ));
        }
        Ok(())
    }

    fn clear_attachments(
        &mut self,
        color: Option<(TextureId, u32)>,
        depth: Option<(TextureId, f64)>,
        region: Option<TextureRegion>,
    ) -> Result<(), GpuError> {
        self.ensure_idle()?;
        let mut state = self.backend.state();
        if let Some((texture, _)) = color {
            let info = attachment_info(&state, texture, "Color", false)?;
            if let Some(r) = region {
                if !r.fits_in(info.width, info.height) {
                    return Err(GpuError::InvalidArgument(
                        "Clear region must lie within the color texture".into(),
                    ));
                }
            }
        }
        if let Some((texture, _)) = depth {
            let info = attachment_info(&state, texture, "Depth", true)?;
            if let Some(r) = region {
                if !r.fits_in(info.width, info.height) {
                    return Err(GpuError::InvalidArgument(
                        "Clear region must lie within the depth texture".into(),
                    ));
                }
            }
        }

        let framebuffer =
            state.framebuffer((color.map(|(t, _)| (t, 0)), depth.map(|(t, _)| (t, 0))));
        state.applied_pipeline = None;
        let driver = state.driver.as_mut();
        driver.bind_framebuffer(gl::DRAW_FRAMEBUFFER, framebuffer);
        match region {
            Some(r) => {
                driver.set_capability(gl::SCISSOR_TEST, true);
                driver.scissor(r.x as i32, r.y as i32, r.width as i32, r.height as i32);
            }
            None => driver.set_capability(gl::SCISSOR_TEST, false),
        }
        let mut mask = 0;
        if let Some((_, value)) = color {
            driver.color_mask(true, true, true, true);
            driver.clear_color(argb::to_rgba_f32(value));
            mask |= gl::COLOR_BUFFER_BIT;
        }
        if let Some((_, value)) = depth {
            driver.depth_mask(true);
            driver.clear_depth(value);
            mask |= gl::DEPTH_BUFFER_BIT;
        }
        driver.clear(mask);
        if region.is_some() {
            driver.set_capability(gl::SCISSOR_TEST, false);
        }
        driver.bind_framebuffer(gl::DRAW_FRAMEBUFFER, 0);
        Ok(())
    }
}

impl CommandEncoder for GlCommandEncoder {
    fn create_render_pass(
        &mut self,
        descriptor: &RenderPassDescriptor,
    ) -> Result<Box<dyn RenderPass>, GpuError> {
        let mut state = self.backend.state();
        if state.pass_open {
            return Err(GpuError::InvalidState(
                "Close the existing render pass before creating a new one!".into(),
            ));
        }
        let color_view = state
            .views
            .get(&descriptor.color_view)
            .copied()
            .ok_or_else(|| GpuError::InvalidArgument("Color texture is closed".into()))?;
        attachment_info(&state, color_view.texture, "Color", false)?;
        let depth_view = match descriptor.depth_view {
            Some(id) => {
                let view = state
                    .views
                    .get(&id)
                    .copied()
                    .ok_or_else(|| GpuError::InvalidArgument("Depth texture is closed".into()))?;
                attachment_info(&state, view.texture, "Depth", true)?;
                Some(view)
            }
            None => None,
        };
        if descriptor.clear_depth.is_some() && depth_view.is_none() {
            log::warn!(
                "GlBackend: Depth clear value was provided but no depth texture is being used in pass '{}'",
                descriptor.label
            );
        }

        let framebuffer = state.framebuffer((
            Some((color_view.texture, color_view.base_mip_level)),
            depth_view.map(|v| (v.texture, v.base_mip_level)),
        ));
        state.applied_pipeline = None;
        let DeviceState {
            driver, labeler, ..
        } = &mut *state;
        labeler.push_group(driver.as_mut(), &descriptor.label);
        driver.bind_framebuffer(gl::FRAMEBUFFER, framebuffer);

        let mut mask = 0;
        if let Some(value) = descriptor.clear_color {
            driver.clear_color(argb::to_rgba_f32(value));
            mask |= gl::COLOR_BUFFER_BIT;
        }
        if let (Some(value), Some(_)) = (descriptor.clear_depth, depth_view) {
            driver.clear_depth(value);
            mask |= gl::DEPTH_BUFFER_BIT;
        }
        if mask != 0 {
            driver.set_capability(gl::SCISSOR_TEST, false);
            driver.color_mask(true, true, true, true);
            driver.depth_mask(true);
            driver.clear(mask);
        }
        driver.viewport(0, 0, color_view.width as i32, color_view.height as i32);
        state.pass_open = true;
        drop(state);

        log::trace!("GlBackend: Opened render pass '{}'", descriptor.label);
        Ok(Box::new(GlRenderPass {
            backend: self.backend.clone(),
            label: descriptor.label.clone(),
            has_depth: depth_view.is_some(),
            state: PassState::default(),
        }))
    }

    fn clear_color_texture(&mut self, texture: TextureId, argb: u32) -> Result<(), GpuError> {
        self.clear_attachments(Some((texture, argb)), None, None)
    }

    fn clear_color_and_depth_textures(
        &mut self,
        color: TextureId,
        argb: u32,
        depth: TextureId,
        depth_value: f64,
    ) -> Result<(), GpuError> {
        self.clear_attachments(Some((color, argb)), Some((depth, depth_value)), None)
    }

    fn clear_color_and_depth_textures_region(
        &mut self,
        color: TextureId,
        argb: u32,
        depth: TextureId,
        depth_value: f64,
        region: TextureRegion,
    ) -> Result<(), GpuError> {
        self.clear_attachments(
            Some((color, argb)),
            Some((depth, depth_value)),
            Some(region),
        )
    }

    fn clear_depth_texture(&mut self, texture: TextureId, depth: f64) -> Result<(), GpuError> {
        self.clear_attachments(None, Some((texture, depth)), None)
    }

    fn write_to_buffer(&mut self, slice: BufferSlice, data: &[u8]) -> Result<(), GpuError> {
        self.ensure_idle()?;
        let mut state = self.backend.state();
        let entry = state.buffer(slice.buffer)?;
        if !entry.info.usage.contains(BufferUsage::COPY_DST) {
            return Err(GpuError::InvalidArgument(
                "Buffer must have USAGE_COPY_DST to be written to".into(),
            ));
        }
        if data.len() as u64 > slice.length {
            return Err(GpuError::InvalidArgument(
                "Cannot write more data than the slice allows".into(),
            ));
        }
        if !slice.fits_in(entry.info.size) {
            return Err(GpuError::InvalidArgument(
                "Slice must lie within the buffer".into(),
            ));
        }
        let name = entry.name;
        state.driver.buffer_sub_data(name, slice.offset, data);
        Ok(())
    }

    fn map_buffer(
        &mut self,
        slice: BufferSlice,
        read: bool,
        write: bool,
    ) -> Result<Box<dyn MappedView + '_>, GpuError> {
        self.ensure_idle()?;
        if !read && !write {
            return Err(GpuError::InvalidArgument(
                "At least read or write must be true".into(),
            ));
        }
        let mut state = self.backend.state();
        let entry = state.buffer(slice.buffer)?;
        if read && !entry.info.usage.contains(BufferUsage::MAP_READ) {
            return Err(GpuError::InvalidArgument("Buffer is not readable".into()));
        }
        if write && !entry.info.usage.contains(BufferUsage::MAP_WRITE) {
            return Err(GpuError::InvalidArgument("Buffer is not writable".into()));
        }
        if !slice.fits_in(entry.info.size) {
            return Err(GpuError::InvalidArgument(
                "Slice must lie within the buffer".into(),
            ));
        }
        let name = entry.name;
        let mut access = 0;
        if read {
            access |= gl::MAP_READ_BIT;
        }
        if write {
            access |= gl::MAP_WRITE_BIT;
        }
        let data = state
            .driver
            .map_buffer_range(name, slice.offset, slice.length, access)
            .ok_or_else(|| {
                GpuError::DeviceError(format!("Failed to map buffer {:?}", slice.buffer))
            })?;
        Ok(Box::new(GlMappedView {
            backend: self.backend.clone(),
            name,
            data,
            write,
        }))
    }

    fn copy_to_buffer(
        &mut self,
        source: BufferSlice,
        destination: BufferSlice,
    ) -> Result<(), GpuError> {
        self.ensure_idle()?;
        let mut state = self.backend.state();
        let src = state.buffer(source.buffer)?;
        let dst = state.buffer(destination.buffer)?;
        if !src.info.usage.contains(BufferUsage::COPY_SRC) {
            return Err(GpuError::InvalidArgument(
                "Source buffer must have USAGE_COPY_SRC".into(),
            ));
        }
        if !dst.info.usage.contains(BufferUsage::COPY_DST) {
            return Err(GpuError::InvalidArgument(
                "Destination buffer must have USAGE_COPY_DST".into(),
            ));
        }
        if source.length != destination.length {
            return Err(GpuError::InvalidArgument(format!(
                "Source slice length ({}) must match destination slice length ({})",
                source.length, destination.length
            )));
        }
        if !source.fits_in(src.info.size) || !destination.fits_in(dst.info.size) {
            return Err(GpuError::InvalidArgument(
                "Slices must lie within their buffers".into(),
            ));
        }
        let (src, dst) = (src.name, dst.name);
        state.driver.copy_buffer_sub_data(
            src,
            dst,
            source.offset,
            destination.offset,
            source.length,
        );
        Ok(())
    }

    fn write_to_texture(
        &mut self,
        texture: TextureId,
        data: &[u8],
        mip_level: u32,
        region: TextureRegion,
    ) -> Result<(), GpuError> {
        self.ensure_idle()?;
        let mut state = self.backend.state();
        let entry = state.texture(texture)?;
        let info = &entry.info;
        if !info.usage.contains(TextureUsage::COPY_DST) {
            return Err(GpuError::InvalidArgument(
                "Texture must have USAGE_COPY_DST to be written to".into(),
            ));
        }
        if mip_level >= info.mip_levels {
            return Err(GpuError::InvalidArgument(format!(
                "Invalid mipLevel {mip_level}, must be less than {}",
                info.mip_levels
            )));
        }
        if !region.fits_in(info.width_at(mip_level), info.height_at(mip_level)) {
            return Err(GpuError::InvalidArgument(
                "Region must lie within the mip level".into(),
            ));
        }
        let needed = u64::from(region.width)
            * u64::from(region.height)
            * u64::from(info.format.bytes_per_pixel());
        if (data.len() as u64) < needed {
            return Err(GpuError::InvalidArgument(format!(
                "Copy would overrun the source data ({needed} bytes needed, {} given)",
                data.len()
            )));
        }
        if info.depth_or_layers > 1 {
            return Err(GpuError::UnsupportedOperation(
                "Textures with multiple depths or layers are not yet supported as a copy target"
                    .into(),
            ));
        }
        let name = entry.name;
        state.driver.tex_sub_image_2d(
            name,
            mip_level,
            region.x,
            region.y,
            region.width,
            region.height,
            &data[..needed as usize],
        );
        Ok(())
    }

    fn copy_texture_to_buffer(
        &mut self,
        texture: TextureId,
        buffer: BufferId,
        offset: u64,
        mip_level: u32,
        region: Option<TextureRegion>,
    ) -> Result<(), GpuError> {
        self.ensure_idle()?;
        let mut state = self.backend.state();
        let entry = state.texture(texture)?;
        let info = entry.info.clone();
        let texture_name = entry.name;
        let target = state.buffer(buffer)?;
        let (buffer_name, buffer_info) = (target.name, target.info.clone());

        if mip_level >= info.mip_levels {
            return Err(GpuError::InvalidArgument(format!(
                "Invalid mipLevel {mip_level}, must be less than {}",
                info.mip_levels
            )));
        }
        let (mip_width, mip_height) = (info.width_at(mip_level), info.height_at(mip_level));
        let region = region.unwrap_or(TextureRegion::new(0, 0, mip_width, mip_height));
        if !region.fits_in(mip_width, mip_height) {
            return Err(GpuError::InvalidArgument(
                "Region must lie within the mip level".into(),
            ));
        }
        let size = u64::from(region.width)
            * u64::from(region.height)
            * u64::from(info.format.bytes_per_pixel());
        if size.checked_add(offset).map_or(true, |end| end > buffer_info.size) {
            return Err(GpuError::InvalidArgument(format!(
                "Copy would overrun the destination buffer (size is {}, offset is {offset}, needs {size} bytes)",
                buffer_info.size
            )));
        }
        if !info.usage.contains(TextureUsage::COPY_SRC) {
            return Err(GpuError::InvalidArgument(
                "Texture must have USAGE_COPY_SRC to be copied from".into(),
            ));
        }
        if !buffer_info.usage.contains(BufferUsage::COPY_DST) {
            return Err(GpuError::InvalidArgument(
                "Buffer must have USAGE_COPY_DST to be copied into".into(),
            ));
        }
        if info.depth_or_layers > 1 {
            return Err(GpuError::UnsupportedOperation(
                "Textures with multiple depths or layers are not yet supported for copying".into(),
            ));
        }

        let format: GlTextureFormat = info.format.into_gl();
        let attachment = if info.format.has_depth_aspect() {
            gl::DEPTH_ATTACHMENT
        } else {
            gl::COLOR_ATTACHMENT0
        };
        let (read, _) = state.scratch_framebuffers();
        let driver = state.driver.as_mut();
        driver.framebuffer_texture(read, attachment, texture_name, mip_level);
        driver.bind_framebuffer(gl::READ_FRAMEBUFFER, read);
        driver.read_pixels_to_buffer(
            region.x,
            region.y,
            region.width,
            region.height,
            format.format,
            buffer_name,
            offset,
        );
        driver.bind_framebuffer(gl::READ_FRAMEBUFFER, 0);
        driver.framebuffer_texture(read, attachment, 0, 0);
        Ok(())
    }

    fn copy_texture_to_texture(
        &mut self,
        source: TextureId,
        destination: TextureId,
        mip_level: u32,
        dest_x: u32,
        dest_y: u32,
        source_region: TextureRegion,
    ) -> Result<(), GpuError> {
        self.ensure_idle()?;
        let mut state = self.backend.state();
        let src = state.texture(source)?;
        let (src_name, src_info) = (src.name, src.info.clone());
        let dst = state.texture(destination)?;
        let (dst_name, dst_info) = (dst.name, dst.info.clone());

        if mip_level >= src_info.mip_levels || mip_level >= dst_info.mip_levels {
            return Err(GpuError::InvalidArgument(format!(
                "Invalid mipLevel {mip_level}, must be less than {} and {}",
                src_info.mip_levels, dst_info.mip_levels
            )));
        }
        if !source_region.fits_in(src_info.width_at(mip_level), src_info.height_at(mip_level)) {
            return Err(GpuError::InvalidArgument(
                "Source region must lie within the source mip level".into(),
            ));
        }
        let dest_region =
            TextureRegion::new(dest_x, dest_y, source_region.width, source_region.height);
        if !dest_region.fits_in(dst_info.width_at(mip_level), dst_info.height_at(mip_level)) {
            return Err(GpuError::InvalidArgument(
                "Destination region must lie within the destination mip level".into(),
            ));
        }
        if !src_info.usage.contains(TextureUsage::COPY_SRC) {
            return Err(GpuError::InvalidArgument(
                "Source texture must have USAGE_COPY_SRC".into(),
            ));
        }
        if !dst_info.usage.contains(TextureUsage::COPY_DST) {
            return Err(GpuError::InvalidArgument(
                "Destination texture must have USAGE_COPY_DST".into(),
            ));
        }
        if src_info.depth_or_layers > 1 || dst_info.depth_or_layers > 1 {
            return Err(GpuError::UnsupportedOperation(
                "Textures with multiple depths or layers are not yet supported for copying".into(),
            ));
        }
        let depth = src_info.format.has_depth_aspect();
        if depth != dst_info.format.has_depth_aspect() {
            return Err(GpuError::InvalidArgument(
                "Source and destination must both be color or both be depth textures".into(),
            ));
        }

        let (attachment, mask) = if depth {
            (gl::DEPTH_ATTACHMENT, gl::DEPTH_BUFFER_BIT)
        } else {
            (gl::COLOR_ATTACHMENT0, gl::COLOR_BUFFER_BIT)
        };
        let (read, draw) = state.scratch_framebuffers();
        let driver = state.driver.as_mut();
        driver.framebuffer_texture(read, attachment, src_name, mip_level);
        driver.framebuffer_texture(draw, attachment, dst_name, mip_level);
        driver.bind_framebuffer(gl::READ_FRAMEBUFFER, read);
        driver.bind_framebuffer(gl::DRAW_FRAMEBUFFER, draw);
        let r = source_region;
        driver.blit_framebuffer(
            [r.x as i32, r.y as i32, (r.x + r.width) as i32, (r.y + r.height) as i32],
            [
                dest_x as i32,
                dest_y as i32,
                (dest_x + r.width) as i32,
                (dest_y + r.height) as i32,
            ],
            mask,
            gl::NEAREST,
        );
        driver.bind_framebuffer(gl::FRAMEBUFFER, 0);
        driver.framebuffer_texture(read, attachment, 0, 0);
        driver.framebuffer_texture(draw, attachment, 0, 0);
        Ok(())
    }

    fn present_texture(&mut self, view: TextureViewId) -> Result<(), GpuError> {
        self.ensure_idle()?;
        let mut state = self.backend.state();
        let view = state
            .views
            .get(&view)
            .copied()
            .ok_or_else(|| GpuError::InvalidArgument("Texture view is closed".into()))?;
        attachment_info(&state, view.texture, "Presented", false)?;
        let name = state.texture(view.texture)?.name;
        let (read, _) = state.scratch_framebuffers();
        let driver = state.driver.as_mut();
        driver.framebuffer_texture(read, gl::COLOR_ATTACHMENT0, name, view.base_mip_level);
        driver.bind_framebuffer(gl::READ_FRAMEBUFFER, read);
        driver.bind_framebuffer(gl::DRAW_FRAMEBUFFER, 0);
        let rect = [0, 0, view.width as i32, view.height as i32];
        driver.blit_framebuffer(rect, rect, gl::COLOR_BUFFER_BIT, gl::NEAREST);
        driver.bind_framebuffer(gl::FRAMEBUFFER, 0);
        driver.framebuffer_texture(read, gl::COLOR_ATTACHMENT0, 0, 0);
        Ok(())
    }

    fn create_fence(&mut self) -> Result<Box<dyn GpuFence>, GpuError> {
        self.ensure_idle()?;
        let sync = self.backend.state().driver.fence_sync();
        Ok(Box::new(GlFence {
            backend: self.backend.clone(),
            sync,
        }))
    }

    fn timer_query_begin(&mut self) -> Result<Box<dyn GpuQuery>, GpuError> {
        let mut state = self.backend.state();
        if state.active_query.is_some() {
            return Err(GpuError::InvalidState(
                "A GL_TIME_ELAPSED query is already active".into(),
            ));
        }
        let name = state.driver.create_query();
        state.driver.begin_query(gl::TIME_ELAPSED, name);
        state.active_query = Some(name);
        Ok(Box::new(GlTimerQuery {
            backend: self.backend.clone(),
            name,
            result: OnceLock::new(),
        }))
    }

    fn timer_query_end(&mut self, query: &dyn GpuQuery) -> Result<(), GpuError> {
        let mut state = self.backend.state();
        match state.active_query {
            Some(active) if u64::from(active) == query.id() => {
                state.driver.end_query(gl::TIME_ELAPSED);
                state.active_query = None;
                Ok(())
            }
            _ => Err(GpuError::InvalidState(
                "Mismatched or duplicate GpuQuery when ending timerQuery".into(),
            )),
        }
    }
}

/// A mapped buffer range. Written bytes land in the buffer when dropped.
pub struct GlMappedView {
    backend: GlBackend,
    name: GlName,
    data: Vec<u8>,
    write: bool,
}

impl MappedView for GlMappedView {
    fn data(&self) -> &[u8] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for GlMappedView {
    fn drop(&mut self) {
        let written = self.write.then_some(self.data.as_slice());
        if !self.backend.state().driver.unmap_buffer(self.name, written) {
            log::error!("GlBackend: Failed to unmap buffer {}", self.name);
        }
    }
}

/// A sync object inserted into the command stream.
pub struct GlFence {
    backend: GlBackend,
    sync: GlName,
}

impl GpuFence for GlFence {
    fn await_completion(&self, timeout_ns: u64) -> Result<FenceStatus, GpuError> {
        match self
            .backend
            .state()
            .driver
            .client_wait_sync(self.sync, timeout_ns)
        {
            gl::ALREADY_SIGNALED | gl::CONDITION_SATISFIED => Ok(FenceStatus::Signaled),
            gl::TIMEOUT_EXPIRED => Ok(FenceStatus::TimedOut),
            code => Err(GpuError::DeviceError(format!(
                "Fence wait failed with status {code:#06x}"
            ))),
        }
    }
}

impl Drop for GlFence {
    fn drop(&mut self) {
        self.backend.state().driver.delete_sync(self.sync);
    }
}

/// A `GL_TIME_ELAPSED` query.
pub struct GlTimerQuery {
    backend: GlBackend,
    name: GlName,
    result: OnceLock<u64>,
}

impl GpuQuery for GlTimerQuery {
    fn id(&self) -> u64 {
        u64::from(self.name)
    }

    fn value(&self) -> Option<u64> {
        if let Some(value) = self.result.get() {
            return Some(*value);
        }
        let mut state = self.backend.state();
        if state.active_query == Some(self.name)
            || !state.driver.query_result_available(self.name)
        {
            return None;
        }
        let value = state.driver.query_result(self.name);
        Some(*self.result.get_or_init(|| value))
    }
}

impl Drop for GlTimerQuery {
    fn drop(&mut self) {
        let mut state = self.backend.state();
        if state.active_query == Some(self.name) {
            state.driver.end_query(gl::TIME_ELAPSED);
            state.active_query = None;
        }
        state.driver.delete_query(self.name);
    }
}

#[derive(Default)]
struct PassState {
    pipeline: Option<Arc<GlCompiledPipeline>>,
    vertex_buffer: Option<BufferId>,
    index_buffer: Option<BufferId>,
    index_format: IndexFormat,
    uniforms: HashMap<String, BufferSlice>,
    samplers: HashMap<String, (TextureViewId, SamplerId)>,
    /// Uniforms and samplers changed since the last draw.
    dirty: HashSet<String>,
    scissor: ScissorState,
    debug_groups: usize,
    closed: bool,
}

/// What a validated draw needs from its setup.
struct DrawSetup {
    mode: GLenum,
    /// Driver index type and index size in bytes.
    index: Option<(GLenum, u64)>,
}

/// An open render pass of a [`GlCommandEncoder`].
pub struct GlRenderPass {
    backend: GlBackend,
    label: String,
    has_depth: bool,
    state: PassState,
}

impl GlRenderPass {
    fn ensure_open(&self) -> Result<(), GpuError> {
        if self.state.closed {
            return Err(GpuError::InvalidState(format!(
                "Render pass '{}' is already closed",
                self.label
            )));
        }
        Ok(())
    }

    fn validate(
        &self,
        state: &DeviceState,
        pipeline: &RenderPipeline,
        indexed: bool,
        exempt: &[&str],
    ) -> Result<(), GpuError> {
        for uniform in &pipeline.uniforms {
            if exempt.contains(&uniform.name.as_str()) {
                continue;
            }
            let kind = match uniform.kind {
                UniformKind::UniformBuffer => "UNIFORM_BUFFER".to_string(),
                UniformKind::TexelBuffer(format) => format!("TEXEL_BUFFER({format:?})"),
            };
            let slice = self.state.uniforms.get(&uniform.name).ok_or_else(|| {
                GpuError::InvalidState(format!("Missing uniform {} (should be {kind})", uniform.name))
            })?;
            let buffer = state.buffers.get(&slice.buffer).ok_or_else(|| {
                GpuError::InvalidState(format!("Uniform buffer {} is already closed", uniform.name))
            })?;
            match uniform.kind {
                UniformKind::UniformBuffer => {
                    if !buffer.info.usage.contains(BufferUsage::UNIFORM) {
                        return Err(GpuError::InvalidState(format!(
                            "Uniform buffer {} must have USAGE_UNIFORM",
                            uniform.name
                        )));
                    }
                }
                UniformKind::TexelBuffer(_) => {
                    if slice.offset != 0 || slice.length != buffer.info.size {
                        return Err(GpuError::InvalidArgument(
                            "Uniform texel buffers do not support a slice of a buffer, must be entire buffer"
                                .into(),
                        ));
                    }
                    if !buffer.info.usage.contains(BufferUsage::UNIFORM_TEXEL_BUFFER) {
                        return Err(GpuError::InvalidState(format!(
                            "Uniform texel buffer {} must have USAGE_UNIFORM_TEXEL_BUFFER",
                            uniform.name
                        )));
                    }
                }
            }
        }

        for name in &pipeline.samplers {
            if exempt.contains(&name.as_str()) {
                continue;
            }
            let (view, sampler) = self
                .state
                .samplers
                .get(name)
                .ok_or_else(|| GpuError::InvalidState(format!("Missing sampler {name}")))?;
            let view = state.views.get(view).ok_or_else(|| {
                GpuError::InvalidState(format!("Texture view {name} has been closed!"))
            })?;
            let texture = state.textures.get(&view.texture).ok_or_else(|| {
                GpuError::InvalidState(format!("Texture view {name} has been closed!"))
            })?;
            if !texture.info.usage.contains(TextureUsage::TEXTURE_BINDING) {
                return Err(GpuError::InvalidState(format!(
                    "Texture view {name} ({}) must have USAGE_TEXTURE_BINDING!",
                    texture.info.label
                )));
            }
            if !state.samplers.contains_key(sampler) {
                return Err(GpuError::InvalidState(format!(
                    "Sampler for {name} ({}) has been closed!",
                    texture.info.label
                )));
            }
        }

        if indexed {
            let id = self
                .state
                .index_buffer
                .ok_or_else(|| GpuError::InvalidState("Missing index buffer".into()))?;
            let buffer = state
                .buffers
                .get(&id)
                .ok_or_else(|| GpuError::InvalidState("Index buffer is closed".into()))?;
            if !buffer.info.usage.contains(BufferUsage::INDEX) {
                return Err(GpuError::InvalidState(
                    "Index buffer must have USAGE_INDEX".into(),
                ));
            }
        }

        if !pipeline.vertex_format.is_empty() {
            let id = self.state.vertex_buffer.ok_or_else(|| {
                GpuError::InvalidState("Missing vertex buffer at slot 0".into())
            })?;
            let buffer = state
                .buffers
                .get(&id)
                .ok_or_else(|| GpuError::InvalidState("Vertex buffer is closed".into()))?;
            if !buffer.info.usage.contains(BufferUsage::VERTEX) {
                return Err(GpuError::InvalidState(
                    "Vertex buffer must have USAGE_VERTEX".into(),
                ));
            }
        }
        Ok(())
    }

    /// Validates and applies everything a draw needs. `None` skips the draw.
    fn setup(
        &mut self,
        state: &mut DeviceState,
        indexed: bool,
        exempt: &[&str],
    ) -> Result<Option<DrawSetup>, GpuError> {
        let validation = self.backend.config().validation;
        let Some(compiled) = self.state.pipeline.clone() else {
            if validation {
                return Err(GpuError::InvalidState("Pipeline not set".into()));
            }
            log::error!("GlBackend: Draw without a pipeline in pass '{}' skipped", self.label);
            return Ok(None);
        };
        let pipeline = compiled.pipeline();
        let Some(program) = compiled.program() else {
            if validation {
                return Err(GpuError::InvalidState(format!(
                    "Pipeline {} has an invalid shader program",
                    pipeline.location
                )));
            }
            if state.reported_invalid.insert(pipeline.location.clone()) {
                log::error!(
                    "GlBackend: Pipeline {} has an invalid shader program, its draws are skipped",
                    pipeline.location
                );
            }
            return Ok(None);
        };

        if validation {
            self.validate(state, pipeline, indexed, exempt)?;
        }
        let index = match (indexed, self.state.index_buffer) {
            (false, _) => None,
            (true, Some(id)) if state.buffers.contains_key(&id) => Some(id),
            (true, _) => {
                log::warn!(
                    "GlBackend: Indexed draw without an index buffer in pass '{}' skipped",
                    self.label
                );
                return Ok(None);
            }
        };

        let DeviceState {
            driver,
            labeler,
            vertex_bindings,
            buffers,
            textures,
            views,
            samplers,
            applied_pipeline,
            bound_program,
            ..
        } = state;

        let program_changed = *bound_program != program.name;
        if program_changed {
            driver.use_program(program.name);
            *bound_program = program.name;
        }

        if *applied_pipeline != Some(compiled.serial) {
            match pipeline.depth_test {
                DepthTestFunction::NoDepthTest => driver.set_capability(gl::DEPTH_TEST, false),
                func => {
                    driver.set_capability(gl::DEPTH_TEST, true);
                    driver.depth_func(func.into_gl());
                }
            }
            driver.set_capability(gl::CULL_FACE, pipeline.cull);
            match pipeline.blend {
                Some(blend) => {
                    driver.set_capability(gl::BLEND, true);
                    driver.blend_func_separate(
                        blend.source_color.into_gl(),
                        blend.dest_color.into_gl(),
                        blend.source_alpha.into_gl(),
                        blend.dest_alpha.into_gl(),
                    );
                }
                None => driver.set_capability(gl::BLEND, false),
            }
            driver.polygon_mode(pipeline.polygon_mode.into_gl());
            driver.depth_mask(pipeline.write_depth);
            driver.color_mask(
                pipeline.write_color,
                pipeline.write_color,
                pipeline.write_color,
                pipeline.write_alpha,
            );
            match pipeline.depth_bias {
                Some(bias) => {
                    driver.set_capability(gl::POLYGON_OFFSET_FILL, true);
                    driver.polygon_offset(bias.scale_factor, bias.constant);
                }
                None => driver.set_capability(gl::POLYGON_OFFSET_FILL, false),
            }
            let logic: Option<GLenum> = pipeline.color_logic.into_gl();
            match logic {
                Some(op) => {
                    driver.set_capability(gl::COLOR_LOGIC_OP, true);
                    driver.logic_op(op);
                }
                None => driver.set_capability(gl::COLOR_LOGIC_OP, false),
            }
            *applied_pipeline = Some(compiled.serial);
        }

        for (name, binding) in &program.bindings {
            let dirty = self.state.dirty.contains(name);
            match *binding {
                UniformBinding::Block { binding } => {
                    if !dirty {
                        continue;
                    }
                    let Some(slice) = self.state.uniforms.get(name) else {
                        continue;
                    };
                    if let Some(buffer) = buffers.get(&slice.buffer) {
                        driver.bind_buffer_range(
                            gl::UNIFORM_BUFFER,
                            binding,
                            buffer.name,
                            slice.offset,
                            slice.length,
                        );
                    }
                }
                UniformBinding::TexelBuffer {
                    location,
                    unit,
                    format,
                    texture,
                } => {
                    let Some(buffer) = self
                        .state
                        .uniforms
                        .get(name)
                        .and_then(|slice| buffers.get(&slice.buffer))
                    else {
                        continue;
                    };
                    if program_changed || dirty {
                        driver.uniform_1i(location, unit as i32);
                    }
                    driver.bind_texture_unit(unit, gl::TEXTURE_BUFFER, texture);
                    if dirty {
                        let format: GlTextureFormat = format.into_gl();
                        driver.tex_buffer(texture, format.internal, buffer.name);
                    }
                }
                UniformBinding::Sampler { location, unit } => {
                    let Some((view_id, sampler_id)) = self.state.samplers.get(name) else {
                        continue;
                    };
                    let (Some(view), Some(sampler)) = (views.get(view_id), samplers.get(sampler_id))
                    else {
                        continue;
                    };
                    let Some(texture) = textures.get(&view.texture) else {
                        continue;
                    };
                    if program_changed || dirty {
                        driver.uniform_1i(location, unit as i32);
                    }
                    driver.bind_texture_unit(unit, texture.target, texture.name);
                    driver.bind_sampler(unit, *sampler);
                    driver.tex_parameter(
                        texture.name,
                        gl::TEXTURE_BASE_LEVEL,
                        view.base_mip_level as i32,
                    );
                    driver.tex_parameter(
                        texture.name,
                        gl::TEXTURE_MAX_LEVEL,
                        (view.base_mip_level + view.mip_level_count) as i32 - 1,
                    );
                }
            }
        }
        self.state.dirty.clear();

        let scissor = self.state.scissor;
        if scissor.enabled {
            driver.set_capability(gl::SCISSOR_TEST, true);
            driver.scissor(scissor.x, scissor.y, scissor.width, scissor.height);
        } else {
            driver.set_capability(gl::SCISSOR_TEST, false);
        }

        let vertex = self
            .state
            .vertex_buffer
            .and_then(|id| buffers.get(&id).map(|b| (id, b.name)));
        vertex_bindings.bind(
            driver.as_mut(),
            labeler.as_ref(),
            &pipeline.vertex_format,
            vertex,
        );

        let index: Option<(GLenum, u64)> = match index.and_then(|id| buffers.get(&id)) {
            Some(buffer) => {
                driver.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, buffer.name);
                let format = self.state.index_format;
                Some((format.into_gl(), format.size()))
            }
            None => None,
        };

        Ok(Some(DrawSetup {
            mode: pipeline.topology.into_gl(),
            index,
        }))
    }

    fn draw_elements(
        &mut self,
        base_vertex: i32,
        first_index: u32,
        index_count: u32,
        instance_count: u32,
        exempt: &[&str],
    ) -> Result<(), GpuError> {
        let backend = self.backend.clone();
        let mut state = backend.state();
        let Some(setup) = self.setup(&mut state, true, exempt)? else {
            return Ok(());
        };
        let Some((index_type, index_size)) = setup.index else {
            return Ok(());
        };
        let offset = u64::from(first_index) * index_size;
        let driver = state.driver.as_mut();
        match (instance_count > 1, base_vertex > 0) {
            (true, true) => driver.draw_elements_instanced_base_vertex(
                setup.mode,
                index_count,
                index_type,
                offset,
                instance_count,
                base_vertex,
            ),
            (true, false) => driver.draw_elements_instanced(
                setup.mode,
                index_count,
                index_type,
                offset,
                instance_count,
            ),
            (false, true) => driver.draw_elements_base_vertex(
                setup.mode,
                index_count,
                index_type,
                offset,
                base_vertex,
            ),
            (false, false) => driver.draw_elements(setup.mode, index_count, index_type, offset),
        }
        Ok(())
    }

    fn finish(&mut self) {
        let mut state = self.backend.state();
        let DeviceState {
            driver, labeler, ..
        } = &mut *state;
        driver.bind_framebuffer(gl::FRAMEBUFFER, 0);
        labeler.pop_group(driver.as_mut());
        state.pass_open = false;
        self.state.closed = true;
    }
}

impl RenderPass for GlRenderPass {
    fn set_pipeline(&mut self, pipeline: &RenderPipeline) -> Result<(), GpuError> {
        self.ensure_open()?;
        let compiled = {
            let mut state = self.backend.state();
            self.backend.compile_locked(&mut state, pipeline, None)
        };
        if pipeline.wants_depth_texture() && !self.has_depth {
            log::warn!(
                "GlBackend: Render pipeline {} wants a depth texture but none was provided - this is probably a bug",
                pipeline.location
            );
        }
        let changed = self
            .state
            .pipeline
            .as_ref()
            .map_or(true, |current| current.serial != compiled.serial);
        if changed {
            let names: Vec<String> = self
                .state
                .uniforms
                .keys()
                .chain(self.state.samplers.keys())
                .cloned()
                .collect();
            self.state.dirty.extend(names);
        }
        self.state.pipeline = Some(compiled);
        Ok(())
    }

    fn bind_texture(
        &mut self,
        name: &str,
        binding: Option<(TextureViewId, SamplerId)>,
    ) -> Result<(), GpuError> {
        self.ensure_open()?;
        match binding {
            Some(binding) => {
                self.state.samplers.insert(name.to_string(), binding);
            }
            None => {
                self.state.samplers.remove(name);
            }
        }
        self.state.dirty.insert(name.to_string());
        Ok(())
    }

    fn set_uniform(&mut self, name: &str, slice: BufferSlice) -> Result<(), GpuError> {
        self.ensure_open()?;
        let alignment = self.backend.capabilities().uniform_offset_alignment;
        if slice.offset % alignment != 0 {
            return Err(GpuError::InvalidArgument(format!(
                "Uniform buffer offset must be aligned to {alignment}, but was {}",
                slice.offset
            )));
        }
        self.state.uniforms.insert(name.to_string(), slice);
        self.state.dirty.insert(name.to_string());
        Ok(())
    }

    fn set_uniform_buffer(&mut self, name: &str, buffer: BufferId) -> Result<(), GpuError> {
        self.ensure_open()?;
        let size = self.backend.state().buffer(buffer)?.info.size;
        self.set_uniform(name, BufferSlice::whole(buffer, size))
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId) -> Result<(), GpuError> {
        self.ensure_open()?;
        if slot != 0 {
            return Err(GpuError::InvalidArgument(format!(
                "Only vertex buffer slot 0 is supported, but got {slot}"
            )));
        }
        self.state.vertex_buffer = Some(buffer);
        Ok(())
    }

    fn set_index_buffer(
        &mut self,
        buffer: Option<BufferId>,
        index_format: IndexFormat,
    ) -> Result<(), GpuError> {
        self.ensure_open()?;
        self.state.index_buffer = buffer;
        self.state.index_format = index_format;
        Ok(())
    }

    fn enable_scissor(&mut self, x: i32, y: i32, width: i32, height: i32) -> Result<(), GpuError> {
        self.ensure_open()?;
        self.state.scissor = ScissorState::rect(x, y, width, height);
        Ok(())
    }

    fn disable_scissor(&mut self) -> Result<(), GpuError> {
        self.ensure_open()?;
        self.state.scissor = ScissorState::default();
        Ok(())
    }

    fn push_debug_group(&mut self, label: &str) -> Result<(), GpuError> {
        self.ensure_open()?;
        let mut state = self.backend.state();
        let DeviceState {
            driver, labeler, ..
        } = &mut *state;
        labeler.push_group(driver.as_mut(), label);
        self.state.debug_groups += 1;
        Ok(())
    }

    fn pop_debug_group(&mut self) -> Result<(), GpuError> {
        self.ensure_open()?;
        if self.state.debug_groups == 0 {
            return Err(GpuError::InvalidState(
                "No debug group was pushed on this render pass".into(),
            ));
        }
        let mut state = self.backend.state();
        let DeviceState {
            driver, labeler, ..
        } = &mut *state;
        labeler.pop_group(driver.as_mut());
        self.state.debug_groups -= 1;
        Ok(())
    }

    fn draw(&mut self, first_vertex: u32, vertex_count: u32) -> Result<(), GpuError> {
        self.ensure_open()?;
        let backend = self.backend.clone();
        let mut state = backend.state();
        if let Some(setup) = self.setup(&mut state, false, &[])? {
            state
                .driver
                .draw_arrays(setup.mode, first_vertex, vertex_count);
        }
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        base_vertex: i32,
        first_index: u32,
        index_count: u32,
        instance_count: u32,
    ) -> Result<(), GpuError> {
        self.ensure_open()?;
        self.draw_elements(base_vertex, first_index, index_count, instance_count, &[])
    }

    fn draw_multiple_indexed(
        &mut self,
        objects: &[RenderObject],
        shared_index_buffer: Option<BufferId>,
        index_format: Option<IndexFormat>,
        exempt_uniforms: &[&str],
    ) -> Result<(), GpuError> {
        self.ensure_open()?;
        for object in objects {
            for (name, slice) in &object.uniforms {
                self.set_uniform(name, *slice)?;
            }
            self.state.vertex_buffer = Some(object.vertex_buffer);
            self.state.index_buffer = object.index_buffer.or(shared_index_buffer);
            self.state.index_format = object
                .index_format
                .or(index_format)
                .unwrap_or(IndexFormat::Uint16);
            self.draw_elements(0, object.first_index, object.index_count, 1, exempt_uniforms)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), GpuError> {
        self.ensure_open()?;
        if self.state.debug_groups > 0 {
            return Err(GpuError::InvalidState(format!(
                "Render pass '{}' still has {} open debug group(s)",
                self.label, self.state.debug_groups
            )));
        }
        self.finish();
        log::trace!("GlBackend: Closed render pass '{}'", self.label);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.closed
    }
}

impl Drop for GlRenderPass {
    fn drop(&mut self) {
        if self.state.closed {
            return;
        }
        while self.state.debug_groups > 0 {
            if let Err(err) = self.pop_debug_group() {
                log::error!("GlBackend: Failed to pop debug group of dropped pass: {err}");
                break;
            }
        }
        self.finish();
    }
}

#[cfg(all(test, feature = "headless"))]
mod tests {
    use super::*;
    use crate::graphics::gl::capabilities::GlBackendConfig;
    use crate::graphics::gl::headless::{HeadlessConfig, HeadlessDriver};
    use kiln_core::renderer::api::pipeline::{
        PrimitiveTopology, VertexElement, VertexFormat, VertexType, VertexUsage,
    };
    use kiln_core::renderer::api::resource::TextureDescriptor;
    use kiln_core::renderer::api::util::TextureFormat;
    use kiln_core::renderer::traits::{GraphicsDevice, ShaderSourceResolver};
    use kiln_core::renderer::api::util::ShaderStage;

    struct Sources;

    impl ShaderSourceResolver for Sources {
        fn source(&self, id: &str, stage: ShaderStage) -> Option<String> {
            match (id, stage) {
                ("core/blit", ShaderStage::Vertex) => {
                    Some("#version 150\nin vec3 Position;\nvoid main() {}\n".into())
                }
                ("core/blit", ShaderStage::Fragment) => Some(
                    "#version 150\nuniform sampler2D InSampler;\nlayout(std140) uniform Globals {\n vec4 Tint;\n};\nvoid main() {}\n"
                        .into(),
                ),
                _ => None,
            }
        }
    }

    fn setup() -> (GlBackend, HeadlessDriver, TextureViewId) {
        let (device, driver) =
            GlBackend::headless(GlBackendConfig::default(), HeadlessConfig::default());
        device.set_default_source_resolver(Arc::new(Sources));
        let target = device
            .create_texture(&TextureDescriptor::new_2d(
                "target",
                TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC,
                TextureFormat::Rgba8Unorm,
                16,
                16,
            ))
            .expect("valid target");
        let view = device.create_texture_view_full(target).expect("valid view");
        (device, driver, view)
    }

    fn blit_pipeline() -> RenderPipeline {
        RenderPipeline::builder("core/blit")
            .with_vertex_shader("core/blit")
            .with_fragment_shader("core/blit")
            .with_sampler("InSampler")
            .with_uniform("Globals", UniformKind::UniformBuffer)
            .with_depth_test(DepthTestFunction::NoDepthTest)
            .with_depth_write(false)
            .with_vertex_format(
                VertexFormat::new(vec![VertexElement::new(
                    "Position",
                    VertexUsage::Position,
                    VertexType::Float,
                    3,
                )]),
                PrimitiveTopology::Triangles,
            )
            .build()
            .expect("complete pipeline")
    }

    #[test]
    fn second_pass_is_rejected_while_one_is_open() {
        let (device, driver, view) = setup();
        let mut encoder = device.create_command_encoder();
        let mut pass = encoder
            .create_render_pass(&RenderPassDescriptor::new("first", view))
            .expect("idle encoder");
        let calls = driver.call_count("bind_framebuffer");
        let err = encoder
            .create_render_pass(&RenderPassDescriptor::new("second", view))
            .err()
            .expect("pass already open");
        assert_eq!(
            format!("{err}"),
            "Invalid state: Close the existing render pass before creating a new one!"
        );
        assert_eq!(driver.call_count("bind_framebuffer"), calls);
        assert!(encoder.clear_color_texture(TextureId(1), 0).is_err());
        pass.close().expect("no debug groups");
        assert!(encoder.clear_color_texture(TextureId(1), 0).is_ok());
    }

    #[test]
    fn close_fails_while_debug_groups_are_open() {
        let (device, driver, view) = setup();
        let mut encoder = device.create_command_encoder();
        let mut pass = encoder
            .create_render_pass(&RenderPassDescriptor::new("groups", view))
            .expect("idle encoder");
        pass.push_debug_group("inner").expect("open pass");
        assert!(matches!(pass.close(), Err(GpuError::InvalidState(_))));
        assert!(!pass.is_closed());
        pass.pop_debug_group().expect("one group pushed");
        assert!(matches!(pass.pop_debug_group(), Err(GpuError::InvalidState(_))));
        pass.close().expect("groups balanced");
        assert_eq!(driver.debug_group_depth(), 0);
        assert!(matches!(pass.draw(0, 3), Err(GpuError::InvalidState(_))));
    }

    #[test]
    fn dropping_an_open_pass_closes_it() {
        let (device, driver, view) = setup();
        let mut encoder = device.create_command_encoder();
        {
            let mut pass = encoder
                .create_render_pass(&RenderPassDescriptor::new("dropped", view))
                .expect("idle encoder");
            pass.push_debug_group("left open").expect("open pass");
        }
        assert_eq!(driver.debug_group_depth(), 0);
        assert_eq!(driver.draw_framebuffer(), 0);
        assert!(encoder.create_fence().is_ok());
    }

    #[test]
    fn validated_draw_reports_missing_bindings() {
        let (device, driver, view) = setup();
        let mut encoder = device.create_command_encoder();
        let mut pass = encoder
            .create_render_pass(&RenderPassDescriptor::new("draw", view))
            .expect("idle encoder");
        assert_eq!(
            pass.draw(0, 3).unwrap_err(),
            GpuError::InvalidState("Pipeline not set".into())
        );
        pass.set_pipeline(&blit_pipeline()).expect("open pass");
        assert_eq!(
            pass.draw(0, 3).unwrap_err(),
            GpuError::InvalidState("Missing uniform Globals (should be UNIFORM_BUFFER)".into())
        );
        let globals = device
            .create_buffer("globals", BufferUsage::UNIFORM, 256)
            .expect("valid buffer");
        pass.set_uniform_buffer("Globals", globals).expect("open pass");
        assert_eq!(
            pass.draw(0, 3).unwrap_err(),
            GpuError::InvalidState("Missing sampler InSampler".into())
        );
        assert!(driver.draws().is_empty());
    }

    #[test]
    fn uniform_offsets_must_be_aligned() {
        let (device, _, view) = setup();
        let mut encoder = device.create_command_encoder();
        let mut pass = encoder
            .create_render_pass(&RenderPassDescriptor::new("align", view))
            .expect("idle encoder");
        let buffer = device
            .create_buffer("ubo", BufferUsage::UNIFORM, 1024)
            .expect("valid buffer");
        let err = pass
            .set_uniform("Globals", BufferSlice::new(buffer, 100, 64))
            .unwrap_err();
        assert!(matches!(err, GpuError::InvalidArgument(_)));
        assert!(pass
            .set_uniform("Globals", BufferSlice::new(buffer, 256, 64))
            .is_ok());
        assert!(matches!(
            pass.set_vertex_buffer(1, buffer),
            Err(GpuError::InvalidArgument(_))
        ));
    }

    #[test]
    fn map_requires_matching_usage() {
        let (device, _, _) = setup();
        let mut encoder = device.create_command_encoder();
        let buffer = device
            .create_buffer("readback", BufferUsage::MAP_READ, 16)
            .expect("valid buffer");
        let slice = BufferSlice::whole(buffer, 16);
        assert_eq!(
            encoder.map_buffer(slice, false, false).err(),
            Some(GpuError::InvalidArgument(
                "At least read or write must be true".into()
            ))
        );
        assert_eq!(
            encoder.map_buffer(slice, true, true).err(),
            Some(GpuError::InvalidArgument("Buffer is not writable".into()))
        );
        let view = encoder.map_buffer(slice, true, false).expect("readable");
        assert_eq!(view.data(), &[0u8; 16]);
    }
}
