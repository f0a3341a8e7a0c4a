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

//! A single post pass, ready to render.

use super::{RenderTarget, UniformValue};
use crate::renderer::{
    api::{
        command::RenderPassDescriptor,
        pipeline::RenderPipeline,
        resource::{BufferId, BufferUsage, SamplerId, TextureViewId},
        uniform::{RingBuffer, Std140SizeCalculator, Std140Writer},
    },
    error::GpuError,
    traits::{CommandEncoder, GraphicsDevice},
};
use std::collections::{BTreeMap, HashMap};

/// Where a pass input reads its texture from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SamplerSource {
    /// A fixed texture resolved when the effect was built.
    Texture {
        view: TextureViewId,
        width: u32,
        height: u32,
    },
    /// A render target resolved at render time.
    Target { target: String, depth: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PassSampler {
    pub name: String,
    pub source: SamplerSource,
    pub bilinear: bool,
}

/// The two clamped samplers shared by every pass of an effect.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PostSamplers {
    pub nearest: SamplerId,
    pub linear: SamplerId,
}

fn destroy_uniform_buffers(
    device: &dyn GraphicsDevice,
    id: &str,
    buffers: &BTreeMap<String, BufferId>,
) {
    for (name, buffer) in buffers {
        if let Err(e) = device.destroy_buffer(*buffer) {
            log::warn!("PostEffectPass({id}): Failed to destroy uniform buffer {name}: {e}");
        }
    }
}

/// A pass of a [`PostEffectProcessor`](super::PostEffectProcessor).
pub struct PostEffectPass {
    id: String,
    pipeline: RenderPipeline,
    output: String,
    uniform_buffers: BTreeMap<String, BufferId>,
    sampler_info: RingBuffer,
    samplers: Vec<PassSampler>,
}

impl PostEffectPass {
    pub(crate) fn new(
        device: &dyn GraphicsDevice,
        pipeline: RenderPipeline,
        output: String,
        uniforms: &BTreeMap<String, Vec<UniformValue>>,
        samplers: Vec<PassSampler>,
    ) -> Result<Self, GpuError> {
        let id = pipeline.location.clone();
        let mut uniform_buffers = BTreeMap::new();
        for (name, values) in uniforms {
            if values.is_empty() {
                continue;
            }
            let mut writer = Std140Writer::new();
            for value in values {
                value.write(&mut writer);
            }
            let created = device.create_buffer_with_data(
                &format!("{id} / {name}"),
                BufferUsage::UNIFORM,
                &writer.finish(),
            );
            match created {
                Ok(buffer) => {
                    uniform_buffers.insert(name.clone(), buffer);
                }
                Err(e) => {
                    destroy_uniform_buffers(device, &id, &uniform_buffers);
                    return Err(e);
                }
            }
        }

        let mut calc = Std140SizeCalculator::new();
        for _ in 0..=samplers.len() {
            calc.put_vec2();
        }
        let sampler_info = RingBuffer::new(
            device,
            &format!("{id} SamplerInfo"),
            BufferUsage::UNIFORM | BufferUsage::MAP_WRITE,
            calc.get() as u64,
        );
        let sampler_info = match sampler_info {
            Ok(ring) => ring,
            Err(e) => {
                destroy_uniform_buffers(device, &id, &uniform_buffers);
                return Err(e);
            }
        };

        Ok(Self {
            id,
            pipeline,
            output,
            uniform_buffers,
            sampler_info,
            samplers,
        })
    }

    /// The pipeline this pass draws with; its location is `<effect>/<index>`.
    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    /// Name of the target this pass renders into.
    pub fn output(&self) -> &str {
        &self.output
    }

    fn resolve(
        &self,
        sampler: &PassSampler,
        targets: &HashMap<String, RenderTarget>,
    ) -> Result<(TextureViewId, u32, u32), GpuError> {
        match &sampler.source {
            SamplerSource::Texture {
                view,
                width,
                height,
            } => Ok((*view, *width, *height)),
            SamplerSource::Target { target, depth } => {
                let found = targets.get(target).ok_or_else(|| {
                    GpuError::InvalidState(format!("Missing handle for target {target}"))
                })?;
                let view = if *depth {
                    found.depth.map(|(_, view)| view).ok_or_else(|| {
                        GpuError::InvalidState(format!("Missing depth texture for target {target}"))
                    })?
                } else {
                    found.color_view
                };
                Ok((view, found.width, found.height))
            }
        }
    }

    pub(crate) fn render(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        targets: &HashMap<String, RenderTarget>,
        post_samplers: PostSamplers,
    ) -> Result<(), GpuError> {
        let output = *targets.get(&self.output).ok_or_else(|| {
            GpuError::InvalidState(format!("Missing handle for target {}", self.output))
        })?;

        let mut inputs = Vec::with_capacity(self.samplers.len());
        for sampler in &self.samplers {
            let (view, width, height) = self.resolve(sampler, targets)?;
            let filter = if sampler.bilinear {
                post_samplers.linear
            } else {
                post_samplers.nearest
            };
            inputs.push((format!("{}Sampler", sampler.name), view, filter, width, height));
        }

        let info_slice = self.sampler_info.current_slice(0, self.sampler_info.size());
        {
            let mut writer = Std140Writer::new();
            writer.put_vec2([output.width as f32, output.height as f32]);
            for (_, _, _, width, height) in &inputs {
                writer.put_vec2([*width as f32, *height as f32]);
            }
            let bytes = writer.finish();
            let mut view = encoder.map_buffer(info_slice, false, true)?;
            let data = view.data_mut();
            let len = bytes.len().min(data.len());
            data[..len].copy_from_slice(&bytes[..len]);
        }

        let mut descriptor = RenderPassDescriptor::new(format!("Post pass {}", self.id), output.color_view);
        descriptor.depth_view = output.depth.map(|(_, view)| view);
        let mut pass = encoder.create_render_pass(&descriptor)?;
        pass.set_pipeline(&self.pipeline)?;
        pass.set_uniform("SamplerInfo", info_slice)?;
        for (name, buffer) in &self.uniform_buffers {
            pass.set_uniform_buffer(name, *buffer)?;
        }
        for (name, view, sampler, _, _) in &inputs {
            pass.bind_texture(name, Some((*view, *sampler)))?;
        }
        pass.draw(0, 3)?;
        pass.close()?;

        self.sampler_info.rotate();
        Ok(())
    }

    pub(crate) fn destroy(&self, device: &dyn GraphicsDevice) {
        for buffer in self.uniform_buffers.values() {
            if let Err(e) = device.destroy_buffer(*buffer) {
                log::warn!("PostEffectPass({}): Failed to destroy buffer: {}", self.id, e);
            }
        }
        self.sampler_info.destroy(device);
    }
}
