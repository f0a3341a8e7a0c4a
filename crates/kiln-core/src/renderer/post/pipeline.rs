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

//! The declarative post-effect description, as stored in `post_effect/*.json`.

use crate::renderer::api::uniform::{Std140SizeCalculator, Std140Writer};
use crate::renderer::error::LoadError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::num::NonZeroU32;

/// A whole post effect: internal render targets and the passes between them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PostEffectPipeline {
    /// Render targets owned by the effect, by name.
    #[serde(default)]
    pub targets: BTreeMap<String, PostTarget>,
    /// Passes, in execution order.
    #[serde(default)]
    pub passes: Vec<PostPass>,
}

/// An internal render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostTarget {
    /// Fixed width; the screen width when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<NonZeroU32>,
    /// Fixed height; the screen height when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<NonZeroU32>,
    /// Kept across frames instead of being recreated every render.
    #[serde(default)]
    pub persistent: bool,
    /// Clear color as `0xAARRGGBB`.
    #[serde(default)]
    pub clear_color: u32,
}

/// One full-screen pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostPass {
    /// Vertex shader id.
    pub vertex_shader: String,
    /// Fragment shader id.
    pub fragment_shader: String,
    /// Sampled inputs.
    #[serde(default)]
    pub inputs: Vec<PostInput>,
    /// The target rendered into.
    pub output: String,
    /// Uniform blocks and their member values, in std140 order.
    #[serde(default)]
    pub uniforms: BTreeMap<String, Vec<UniformValue>>,
}

/// A fixed-size texture resource sampled by a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextureInput {
    /// Sampler name, without the `Sampler` suffix.
    pub sampler_name: String,
    /// Location of the texture resource.
    pub location: String,
    /// Texture width.
    pub width: NonZeroU32,
    /// Texture height.
    pub height: NonZeroU32,
    /// Linear filtering.
    #[serde(default)]
    pub bilinear: bool,
}

/// A render target sampled by a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetInput {
    /// Sampler name, without the `Sampler` suffix.
    pub sampler_name: String,
    /// The target to sample.
    pub target: String,
    /// Sample the depth attachment instead of the color one.
    #[serde(default)]
    pub use_depth_buffer: bool,
    /// Linear filtering.
    #[serde(default)]
    pub bilinear: bool,
}

/// A pass input: either a fixed texture or a render target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostInput {
    /// A fixed texture.
    Texture(TextureInput),
    /// A render target.
    Target(TargetInput),
}

impl PostInput {
    /// Sampler name, without the `Sampler` suffix.
    pub fn sampler_name(&self) -> &str {
        match self {
            PostInput::Texture(input) => &input.sampler_name,
            PostInput::Target(input) => &input.sampler_name,
        }
    }

    /// The render target read by this input, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            PostInput::Texture(_) => None,
            PostInput::Target(input) => Some(&input.target),
        }
    }

    /// `true` for linear filtering.
    pub fn bilinear(&self) -> bool {
        match self {
            PostInput::Texture(input) => input.bilinear,
            PostInput::Target(input) => input.bilinear,
        }
    }
}

/// A typed member of a post-pass uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum UniformValue {
    /// `int`.
    Int(i32),
    /// `float`.
    Float(f32),
    /// `vec2`.
    Vec2([f32; 2]),
    /// `vec3`.
    Vec3([f32; 3]),
    /// `ivec3`.
    Ivec3([i32; 3]),
    /// `vec4`.
    Vec4([f32; 4]),
    /// Column-major `mat4`.
    Matrix4x4([f32; 16]),
}

impl UniformValue {
    /// Adds this member to a size computation.
    pub fn add_size(&self, calc: &mut Std140SizeCalculator) {
        match self {
            UniformValue::Int(_) | UniformValue::Float(_) => calc.put_scalar(),
            UniformValue::Vec2(_) => calc.put_vec2(),
            UniformValue::Vec3(_) | UniformValue::Ivec3(_) => calc.put_vec3(),
            UniformValue::Vec4(_) => calc.put_vec4(),
            UniformValue::Matrix4x4(_) => calc.put_mat4(),
        };
    }

    /// Packs this member.
    pub fn write(&self, writer: &mut Std140Writer) {
        match *self {
            UniformValue::Int(v) => writer.put_int(v),
            UniformValue::Float(v) => writer.put_float(v),
            UniformValue::Vec2(v) => writer.put_vec2(v),
            UniformValue::Vec3(v) => writer.put_vec3(v),
            UniformValue::Ivec3(v) => writer.put_ivec3(v),
            UniformValue::Vec4(v) => writer.put_vec4(v),
            UniformValue::Matrix4x4(v) => writer.put_mat4(v),
        };
    }
}

impl PostPass {
    /// Every target this pass reads or writes.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .filter_map(PostInput::target)
            .chain(std::iter::once(self.output.as_str()))
    }
}

impl PostEffectPipeline {
    /// Parses and validates a JSON description.
    pub fn from_json(id: &str, text: &str) -> Result<Self, LoadError> {
        let pipeline: Self =
            serde_json::from_str(text).map_err(|e| LoadError::InvalidDescription {
                id: id.to_string(),
                details: e.to_string(),
            })?;
        pipeline.validate(id)?;
        Ok(pipeline)
    }

    /// Checks that no pass uses a sampler name twice.
    pub fn validate(&self, id: &str) -> Result<(), LoadError> {
        for pass in &self.passes {
            let mut names = HashSet::with_capacity(pass.inputs.len());
            for input in &pass.inputs {
                if !names.insert(input.sampler_name()) {
                    return Err(LoadError::InvalidDescription {
                        id: id.to_string(),
                        details: format!(
                            "Encountered repeated sampler name: {}",
                            input.sampler_name()
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Targets referenced by passes but not declared internally.
    pub fn external_targets(&self) -> BTreeSet<String> {
        self.passes
            .iter()
            .flat_map(PostPass::targets)
            .filter(|target| !self.targets.contains_key(*target))
            .map(str::to_string)
            .collect()
    }
}
