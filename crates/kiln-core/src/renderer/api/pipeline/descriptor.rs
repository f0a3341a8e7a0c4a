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

//! The render pipeline description and its builder.

use super::{
    BlendFunction, DepthTestFunction, LogicOp, PolygonMode, PrimitiveTopology, ShaderDefines,
    VertexFormat,
};
use crate::renderer::api::util::TextureFormat;
use crate::renderer::error::GpuError;

/// The kind of binding a declared uniform expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    /// A uniform block backed by a buffer with `UNIFORM` usage.
    UniformBuffer,
    /// A texel buffer whose texels are read with the given format.
    TexelBuffer(TextureFormat),
}

/// A uniform declared by a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniformDescription {
    /// Name of the uniform block or texel-buffer sampler in the shader.
    pub name: String,
    /// The binding kind.
    pub kind: UniformKind,
}

/// Polygon offset applied while rasterizing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBias {
    /// Factor scaled by the polygon's depth slope.
    pub scale_factor: f32,
    /// Constant offset in depth units.
    pub constant: f32,
}

/// A complete, immutable description of a render pipeline.
///
/// The device caches one compiled entry per distinct pipeline and source
/// resolver, so two pipelines at the same `location` with different defines
/// or state never share a program. The encoder only re-applies fixed-function
/// state when a different entry is bound.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPipeline {
    /// Unique identity of the pipeline, e.g. `"core/terrain"`.
    pub location: String,
    /// Logical id of the vertex shader.
    pub vertex_shader: String,
    /// Logical id of the fragment shader.
    pub fragment_shader: String,
    /// Defines injected into both stages.
    pub defines: ShaderDefines,
    /// Sampler names, in declaration order.
    pub samplers: Vec<String>,
    /// Uniform blocks and texel buffers, in declaration order.
    pub uniforms: Vec<UniformDescription>,
    /// Blending, or `None` for opaque output.
    pub blend: Option<BlendFunction>,
    /// Depth comparison.
    pub depth_test: DepthTestFunction,
    /// Rasterization mode.
    pub polygon_mode: PolygonMode,
    /// Back-face culling.
    pub cull: bool,
    /// Writes to the color channels.
    pub write_color: bool,
    /// Writes to the alpha channel.
    pub write_alpha: bool,
    /// Writes to the depth buffer.
    pub write_depth: bool,
    /// Logic op on the color output.
    pub color_logic: LogicOp,
    /// Layout of the vertex buffer at slot 0.
    pub vertex_format: VertexFormat,
    /// Primitive assembly.
    pub topology: PrimitiveTopology,
    /// Optional polygon offset.
    pub depth_bias: Option<DepthBias>,
}

impl RenderPipeline {
    /// Starts a builder for a pipeline at `location`.
    pub fn builder(location: impl Into<String>) -> RenderPipelineBuilder {
        RenderPipelineBuilder::new(location)
    }

    /// `true` if this pipeline reads or writes depth, and so expects a depth attachment.
    pub fn wants_depth_texture(&self) -> bool {
        self.depth_test != DepthTestFunction::NoDepthTest || self.write_depth
    }

    /// Looks up a declared uniform by name.
    pub fn uniform(&self, name: &str) -> Option<&UniformDescription> {
        self.uniforms.iter().find(|u| u.name == name)
    }
}

/// Builds a [`RenderPipeline`]. Both shaders are mandatory.
#[derive(Debug, Clone)]
pub struct RenderPipelineBuilder {
    location: String,
    vertex_shader: Option<String>,
    fragment_shader: Option<String>,
    defines: ShaderDefines,
    samplers: Vec<String>,
    uniforms: Vec<UniformDescription>,
    blend: Option<BlendFunction>,
    depth_test: DepthTestFunction,
    polygon_mode: PolygonMode,
    cull: bool,
    write_color: bool,
    write_alpha: bool,
    write_depth: bool,
    color_logic: LogicOp,
    vertex_format: VertexFormat,
    topology: PrimitiveTopology,
    depth_bias: Option<DepthBias>,
}

impl RenderPipelineBuilder {
    fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            vertex_shader: None,
            fragment_shader: None,
            defines: ShaderDefines::new(),
            samplers: Vec::new(),
            uniforms: Vec::new(),
            blend: None,
            depth_test: DepthTestFunction::LessEqual,
            polygon_mode: PolygonMode::Fill,
            cull: true,
            write_color: true,
            write_alpha: true,
            write_depth: true,
            color_logic: LogicOp::None,
            vertex_format: VertexFormat::empty(),
            topology: PrimitiveTopology::Triangles,
            depth_bias: None,
        }
    }

    /// Sets the vertex shader id.
    pub fn with_vertex_shader(mut self, id: impl Into<String>) -> Self {
        self.vertex_shader = Some(id.into());
        self
    }

    /// Sets the fragment shader id.
    pub fn with_fragment_shader(mut self, id: impl Into<String>) -> Self {
        self.fragment_shader = Some(id.into());
        self
    }

    /// Replaces the shader defines.
    pub fn with_defines(mut self, defines: ShaderDefines) -> Self {
        self.defines = defines;
        self
    }

    /// Declares a sampler.
    pub fn with_sampler(mut self, name: impl Into<String>) -> Self {
        self.samplers.push(name.into());
        self
    }

    /// Declares a uniform block or texel buffer.
    pub fn with_uniform(mut self, name: impl Into<String>, kind: UniformKind) -> Self {
        self.uniforms.push(UniformDescription {
            name: name.into(),
            kind,
        });
        self
    }

    /// Enables blending.
    pub fn with_blend(mut self, blend: BlendFunction) -> Self {
        self.blend = Some(blend);
        self
    }

    /// Disables blending.
    pub fn without_blend(mut self) -> Self {
        self.blend = None;
        self
    }

    /// Sets the depth comparison.
    pub fn with_depth_test(mut self, depth_test: DepthTestFunction) -> Self {
        self.depth_test = depth_test;
        self
    }

    /// Sets the polygon mode.
    pub fn with_polygon_mode(mut self, mode: PolygonMode) -> Self {
        self.polygon_mode = mode;
        self
    }

    /// Enables or disables back-face culling.
    pub fn with_cull(mut self, cull: bool) -> Self {
        self.cull = cull;
        self
    }

    /// Sets the color and alpha write masks.
    pub fn with_color_write(mut self, color: bool, alpha: bool) -> Self {
        self.write_color = color;
        self.write_alpha = alpha;
        self
    }

    /// Sets the depth write mask.
    pub fn with_depth_write(mut self, write: bool) -> Self {
        self.write_depth = write;
        self
    }

    /// Sets the color logic op.
    pub fn with_color_logic(mut self, logic: LogicOp) -> Self {
        self.color_logic = logic;
        self
    }

    /// Sets the vertex layout and primitive topology.
    pub fn with_vertex_format(mut self, format: VertexFormat, topology: PrimitiveTopology) -> Self {
        self.vertex_format = format;
        self.topology = topology;
        self
    }

    /// Sets a polygon offset.
    pub fn with_depth_bias(mut self, scale_factor: f32, constant: f32) -> Self {
        self.depth_bias = Some(DepthBias {
            scale_factor,
            constant,
        });
        self
    }

    /// Finishes the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::InvalidArgument`] if a shader is missing or a
    /// sampler name is declared twice.
    pub fn build(self) -> Result<RenderPipeline, GpuError> {
        let vertex_shader = self.vertex_shader.ok_or_else(|| {
            GpuError::InvalidArgument(format!("Pipeline {} has no vertex shader", self.location))
        })?;
        let fragment_shader = self.fragment_shader.ok_or_else(|| {
            GpuError::InvalidArgument(format!(
                "Pipeline {} has no fragment shader",
                self.location
            ))
        })?;
        for (i, name) in self.samplers.iter().enumerate() {
            if self.samplers[..i].contains(name) {
                return Err(GpuError::InvalidArgument(format!(
                    "Pipeline {} declares sampler {name} twice",
                    self.location
                )));
            }
        }

        Ok(RenderPipeline {
            location: self.location,
            vertex_shader,
            fragment_shader,
            defines: self.defines,
            samplers: self.samplers,
            uniforms: self.uniforms,
            blend: self.blend,
            depth_test: self.depth_test,
            polygon_mode: self.polygon_mode,
            cull: self.cull,
            write_color: self.write_color,
            write_alpha: self.write_alpha,
            write_depth: self.write_depth,
            color_logic: self.color_logic,
            vertex_format: self.vertex_format,
            topology: self.topology,
            depth_bias: self.depth_bias,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_both_shaders() {
        let err = RenderPipeline::builder("core/sky")
            .with_vertex_shader("core/sky")
            .build()
            .unwrap_err();
        assert_eq!(
            format!("{err}"),
            "Invalid argument: Pipeline core/sky has no fragment shader"
        );
    }

    #[test]
    fn builder_rejects_duplicate_samplers() {
        let result = RenderPipeline::builder("core/gui")
            .with_vertex_shader("core/gui")
            .with_fragment_shader("core/gui")
            .with_sampler("Sampler0")
            .with_sampler("Sampler0")
            .build();
        assert!(matches!(result, Err(GpuError::InvalidArgument(_))));
    }

    #[test]
    fn depth_expectation_follows_test_and_write() {
        let overlay = RenderPipeline::builder("core/overlay")
            .with_vertex_shader("core/blit")
            .with_fragment_shader("core/blit")
            .with_depth_test(DepthTestFunction::NoDepthTest)
            .with_depth_write(false)
            .with_uniform("Globals", UniformKind::UniformBuffer)
            .build()
            .unwrap();
        assert!(!overlay.wants_depth_texture());
        assert_eq!(
            overlay.uniform("Globals").map(|u| u.kind),
            Some(UniformKind::UniformBuffer)
        );
        assert!(overlay.uniform("Fog").is_none());
    }
}
