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

//! Turns a [`PostEffectPipeline`] description into GPU objects and runs it.

use super::pass::{PassSampler, PostSamplers, SamplerSource};
use super::{PostEffectPass, PostEffectPipeline, PostInput, PostTarget, RenderTarget};
use crate::renderer::{
    api::{
        pipeline::{DepthTestFunction, PrimitiveTopology, RenderPipeline, UniformKind, VertexFormat},
        resource::{FilterMode, SamplerDescriptor, TextureViewId},
    },
    error::{GpuError, LoadError},
    traits::{CommandEncoder, GraphicsDevice},
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Resolves the fixed texture inputs of a post effect.
pub trait EffectTextures {
    /// A view over the texture stored at `location`, if it is loaded.
    fn texture_view(&self, location: &str) -> Option<TextureViewId>;
}

impl EffectTextures for HashMap<String, TextureViewId> {
    fn texture_view(&self, location: &str) -> Option<TextureViewId> {
        self.get(location).copied()
    }
}

/// A post effect whose GPU objects have been created.
///
/// Internal targets marked persistent survive between renders and are only
/// recreated when their size changes; the others live for a single
/// [`render`](Self::render) call.
pub struct PostEffectProcessor {
    device: Arc<dyn GraphicsDevice>,
    id: String,
    passes: Vec<PostEffectPass>,
    internal_targets: BTreeMap<String, PostTarget>,
    external_targets: HashSet<String>,
    persistent: HashMap<String, RenderTarget>,
    samplers: PostSamplers,
}

impl PostEffectProcessor {
    /// Builds the pipelines, uniform buffers and samplers of `description`.
    ///
    /// # Errors
    ///
    /// [`LoadError::MissingExternalTargets`] when the description reads or
    /// writes a target that is neither internal nor in `available_external`,
    /// [`LoadError::MissingTexture`] when a fixed texture input cannot be
    /// resolved, and [`LoadError::Gpu`] on device failures.
    pub fn parse(
        device: Arc<dyn GraphicsDevice>,
        description: &PostEffectPipeline,
        id: &str,
        available_external: &HashSet<String>,
        textures: &dyn EffectTextures,
    ) -> Result<Self, LoadError> {
        let referenced = description.external_targets();
        let missing: Vec<String> = referenced
            .iter()
            .filter(|target| !available_external.contains(*target))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(LoadError::MissingExternalTargets(missing));
        }

        let nearest = device
            .create_sampler(&SamplerDescriptor::clamped(FilterMode::Nearest))
            .map_err(LoadError::Gpu)?;
        let linear = match device.create_sampler(&SamplerDescriptor::clamped(FilterMode::Linear)) {
            Ok(sampler) => sampler,
            Err(e) => {
                if let Err(err) = device.destroy_sampler(nearest) {
                    log::warn!("PostEffectProcessor({id}): Failed to destroy sampler: {err}");
                }
                return Err(LoadError::Gpu(e));
            }
        };

        let mut processor = Self {
            device: device.clone(),
            id: id.to_string(),
            passes: Vec::with_capacity(description.passes.len()),
            internal_targets: description.targets.clone(),
            external_targets: referenced.into_iter().collect(),
            persistent: HashMap::new(),
            samplers: PostSamplers { nearest, linear },
        };

        for (index, pass) in description.passes.iter().enumerate() {
            match processor.build_pass(index, pass, textures) {
                Ok(built) => processor.passes.push(built),
                Err(e) => {
                    processor.close();
                    return Err(e);
                }
            }
        }

        log::debug!(
            "PostEffectProcessor({}): Built {} pass(es)",
            processor.id,
            processor.passes.len()
        );
        Ok(processor)
    }

    fn build_pass(
        &self,
        index: usize,
        pass: &super::PostPass,
        textures: &dyn EffectTextures,
    ) -> Result<PostEffectPass, LoadError> {
        let mut builder = RenderPipeline::builder(format!("{}/{}", self.id, index))
            .with_vertex_shader(pass.vertex_shader.clone())
            .with_fragment_shader(pass.fragment_shader.clone())
            .with_uniform("SamplerInfo", UniformKind::UniformBuffer)
            .with_depth_test(DepthTestFunction::NoDepthTest)
            .with_depth_write(false)
            .with_vertex_format(VertexFormat::empty(), PrimitiveTopology::Triangles);

        let mut samplers = Vec::with_capacity(pass.inputs.len());
        for input in &pass.inputs {
            builder = builder.with_sampler(format!("{}Sampler", input.sampler_name()));
            let source = match input {
                PostInput::Texture(texture) => {
                    let view = textures
                        .texture_view(&texture.location)
                        .ok_or_else(|| LoadError::MissingTexture(texture.location.clone()))?;
                    SamplerSource::Texture {
                        view,
                        width: texture.width.get(),
                        height: texture.height.get(),
                    }
                }
                PostInput::Target(target) => SamplerSource::Target {
                    target: target.target.clone(),
                    depth: target.use_depth_buffer,
                },
            };
            samplers.push(PassSampler {
                name: input.sampler_name().to_string(),
                source,
                bilinear: input.bilinear(),
            });
        }
        for name in pass.uniforms.keys() {
            builder = builder.with_uniform(name.clone(), UniformKind::UniformBuffer);
        }

        let pipeline = builder.build().map_err(LoadError::Gpu)?;
        PostEffectPass::new(
            self.device.as_ref(),
            pipeline,
            pass.output.clone(),
            &pass.uniforms,
            samplers,
        )
        .map_err(LoadError::Gpu)
    }

    /// The id this effect was built under.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The passes, in execution order.
    pub fn passes(&self) -> &[PostEffectPass] {
        &self.passes
    }

    /// External targets this effect reads or writes.
    pub fn external_targets(&self) -> &HashSet<String> {
        &self.external_targets
    }

    /// Runs every pass at a `width`x`height` screen size.
    ///
    /// `external` must provide every target named by
    /// [`external_targets`](Self::external_targets).
    pub fn render(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        width: u32,
        height: u32,
        external: &HashMap<String, RenderTarget>,
    ) -> Result<(), GpuError> {
        let mut targets = HashMap::with_capacity(self.internal_targets.len() + external.len());
        for name in &self.external_targets {
            let target = external
                .get(name)
                .ok_or_else(|| GpuError::InvalidArgument(format!("Missing target with id {name}")))?;
            targets.insert(name.clone(), *target);
        }

        let mut transient = Vec::new();
        let result = self
            .acquire_internal_targets(encoder, width, height, &mut targets, &mut transient)
            .and_then(|()| {
                for pass in &mut self.passes {
                    pass.render(encoder, &targets, self.samplers)?;
                }
                Ok(())
            });

        for target in transient {
            target.destroy(self.device.as_ref());
        }
        result
    }

    fn acquire_internal_targets(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        width: u32,
        height: u32,
        targets: &mut HashMap<String, RenderTarget>,
        transient: &mut Vec<RenderTarget>,
    ) -> Result<(), GpuError> {
        for (name, desc) in &self.internal_targets {
            let target_width = desc.width.map_or(width, |w| w.get());
            let target_height = desc.height.map_or(height, |h| h.get());
            let label = format!("{} / {}", self.id, name);

            if desc.persistent {
                let reuse = self
                    .persistent
                    .get(name)
                    .filter(|t| t.width == target_width && t.height == target_height)
                    .copied();
                let target = match reuse {
                    Some(target) => target,
                    None => {
                        if let Some(stale) = self.persistent.remove(name) {
                            stale.destroy(self.device.as_ref());
                        }
                        let created = RenderTarget::create(
                            self.device.as_ref(),
                            &label,
                            target_width,
                            target_height,
                            true,
                        )?;
                        self.persistent.insert(name.clone(), created);
                        created.clear(encoder, desc.clear_color)?;
                        created
                    }
                };
                targets.insert(name.clone(), target);
            } else {
                let created = RenderTarget::create(
                    self.device.as_ref(),
                    &label,
                    target_width,
                    target_height,
                    true,
                )?;
                transient.push(created);
                created.clear(encoder, desc.clear_color)?;
                targets.insert(name.clone(), created);
            }
        }
        Ok(())
    }

    /// Releases every GPU object owned by this effect.
    pub fn close(&mut self) {
        for (_, target) in self.persistent.drain() {
            target.destroy(self.device.as_ref());
        }
        for pass in self.passes.drain(..) {
            pass.destroy(self.device.as_ref());
        }
        for sampler in [self.samplers.nearest, self.samplers.linear] {
            if let Err(e) = self.device.destroy_sampler(sampler) {
                log::warn!("PostEffectProcessor({}): Failed to destroy sampler: {}", self.id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::mock::{Event, MockDevice};
    use serde_json::json;

    fn textures() -> HashMap<String, TextureViewId> {
        HashMap::from([("noise".to_string(), TextureViewId(900))])
    }

    fn blur() -> PostEffectPipeline {
        let text = json!({
            "targets": { "swap": {}, "history": { "width": 8, "height": 8, "persistent": true } },
            "passes": [
                {
                    "vertex_shader": "post/blit",
                    "fragment_shader": "post/blur",
                    "inputs": [
                        { "sampler_name": "In", "target": "main" },
                        { "sampler_name": "Noise", "location": "noise", "width": 16, "height": 16, "bilinear": true }
                    ],
                    "output": "swap",
                    "uniforms": { "BlurConfig": [{ "type": "float", "value": 2.0 }] }
                },
                {
                    "vertex_shader": "post/blit",
                    "fragment_shader": "post/blit",
                    "inputs": [{ "sampler_name": "In", "target": "swap" }],
                    "output": "history"
                }
            ]
        })
        .to_string();
        PostEffectPipeline::from_json("blur", &text).unwrap()
    }

    fn externals() -> HashSet<String> {
        HashSet::from(["main".to_string()])
    }

    fn main_target(device: &MockDevice) -> RenderTarget {
        RenderTarget::create(device, "main", 32, 16, true).unwrap()
    }

    #[test]
    fn missing_external_target_fails_to_parse() {
        let device = Arc::new(MockDevice::new());
        let err = PostEffectProcessor::parse(device.clone(), &blur(), "blur", &HashSet::new(), &textures())
            .err()
            .unwrap();
        assert!(matches!(err, LoadError::MissingExternalTargets(ref t) if t == &vec!["main".to_string()]));
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn missing_texture_fails_and_releases_everything() {
        let device = Arc::new(MockDevice::new());
        let err = PostEffectProcessor::parse(device.clone(), &blur(), "blur", &externals(), &HashMap::new())
            .err()
            .unwrap();
        assert!(matches!(err, LoadError::MissingTexture(ref l) if l == "noise"));
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn parse_builds_one_pipeline_per_pass() {
        let device = Arc::new(MockDevice::new());
        let processor =
            PostEffectProcessor::parse(device.clone(), &blur(), "blur", &externals(), &textures()).unwrap();

        let first = processor.passes()[0].pipeline();
        assert_eq!(first.location, "blur/0");
        assert_eq!(first.samplers, vec!["InSampler".to_string(), "NoiseSampler".to_string()]);
        assert!(first.uniform("SamplerInfo").is_some());
        assert!(first.uniform("BlurConfig").is_some());
        assert_eq!(first.depth_test, DepthTestFunction::NoDepthTest);
        assert!(!first.write_depth);
        assert_eq!(processor.passes()[1].pipeline().location, "blur/1");

        // One BlurConfig buffer plus a three-buffer SamplerInfo ring per pass.
        assert_eq!(device.live_buffers(), 1 + 3 + 3);
    }

    #[test]
    fn render_draws_every_pass_in_order() {
        let device = Arc::new(MockDevice::new());
        let mut processor =
            PostEffectProcessor::parse(device.clone(), &blur(), "blur", &externals(), &textures()).unwrap();
        let main = main_target(&device);
        let external = HashMap::from([("main".to_string(), main)]);

        let mut encoder = device.create_command_encoder();
        processor.render(encoder.as_mut(), 32, 16, &external).unwrap();

        let events = device.events();
        let opened: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::OpenPass(label) => Some(label.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(opened, vec!["Post pass blur/0", "Post pass blur/1"]);
        assert!(events.contains(&Event::BindTexture("InSampler".into(), Some(main.color_view))));
        assert!(events.contains(&Event::BindTexture("NoiseSampler".into(), Some(TextureViewId(900)))));
        assert_eq!(events.iter().filter(|e| **e == Event::Draw(0, 3)).count(), 2);
        assert_eq!(events.last(), Some(&Event::ClosePass));
    }

    #[test]
    fn sampler_info_holds_output_then_input_sizes() {
        let device = Arc::new(MockDevice::new());
        let mut processor =
            PostEffectProcessor::parse(device.clone(), &blur(), "blur", &externals(), &textures()).unwrap();
        let external = HashMap::from([("main".to_string(), main_target(&device))]);
        let mut encoder = device.create_command_encoder();
        processor.render(encoder.as_mut(), 32, 16, &external).unwrap();

        let slice = device
            .events()
            .iter()
            .find_map(|e| match e {
                Event::SetUniform(name, slice) if name == "SamplerInfo" => Some(*slice),
                _ => None,
            })
            .unwrap();
        let bytes = device.buffer_contents(slice.buffer);
        let floats: Vec<f32> = bytes[..24]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        // swap is screen sized, main is 32x16, noise is 16x16.
        assert_eq!(floats, vec![32.0, 16.0, 32.0, 16.0, 16.0, 16.0]);
    }

    #[test]
    fn transient_targets_do_not_outlive_render() {
        let device = Arc::new(MockDevice::new());
        let mut processor =
            PostEffectProcessor::parse(device.clone(), &blur(), "blur", &externals(), &textures()).unwrap();
        let external = HashMap::from([("main".to_string(), main_target(&device))]);
        let baseline = device.live_textures();

        let mut encoder = device.create_command_encoder();
        processor.render(encoder.as_mut(), 32, 16, &external).unwrap();
        // Only the persistent "history" target (color + depth) remains.
        assert_eq!(device.live_textures(), baseline + 2);

        processor.render(encoder.as_mut(), 32, 16, &external).unwrap();
        assert_eq!(device.live_textures(), baseline + 2);
    }

    #[test]
    fn missing_external_at_render_is_an_error() {
        let device = Arc::new(MockDevice::new());
        let mut processor =
            PostEffectProcessor::parse(device.clone(), &blur(), "blur", &externals(), &textures()).unwrap();
        let mut encoder = device.create_command_encoder();
        let err = processor.render(encoder.as_mut(), 32, 16, &HashMap::new()).unwrap_err();
        assert_eq!(err, GpuError::InvalidArgument("Missing target with id main".into()));
        assert!(device.events().is_empty());
    }

    #[test]
    fn close_releases_every_buffer_and_target() {
        let device = Arc::new(MockDevice::new());
        let mut processor =
            PostEffectProcessor::parse(device.clone(), &blur(), "blur", &externals(), &textures()).unwrap();
        let main = main_target(&device);
        let external = HashMap::from([("main".to_string(), main)]);
        let mut encoder = device.create_command_encoder();
        processor.render(encoder.as_mut(), 32, 16, &external).unwrap();

        processor.close();
        main.destroy(device.as_ref());
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_textures(), 0);
    }
}
