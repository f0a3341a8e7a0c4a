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

//! Shader compilation, program linking and uniform resolution.

use super::consts as gl;
use super::conversions::IntoGl;
use super::driver::{GlDriver, GlName};
use super::labeler::{DebugLabeler, LabelKind};
use kiln_core::renderer::api::pipeline::{RenderPipeline, ShaderDefines, UniformKind};
use kiln_core::renderer::api::util::{ShaderStage, TextureFormat};
use kiln_core::renderer::error::ShaderError;
use kiln_core::renderer::traits::{ShaderPreprocessor, ShaderSourceResolver};
use std::collections::HashMap;

/// Uniform blocks a program may use without declaring them in its pipeline.
pub const PREDEFINED_UNIFORM_BLOCKS: [&str; 4] = ["Projection", "Lighting", "Fog", "Globals"];

/// A compiled shader stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlShader {
    pub name: GlName,
    pub id: String,
    pub stage: ShaderStage,
}

/// Where a named uniform lives in a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformBinding {
    /// A uniform block, bound to an indexed uniform buffer binding point.
    Block { binding: u32 },
    /// A `samplerBuffer` backed by a buffer texture owned by the program.
    TexelBuffer {
        location: i32,
        unit: u32,
        format: TextureFormat,
        texture: GlName,
    },
    /// A sampled texture on a texture unit.
    Sampler { location: i32, unit: u32 },
}

/// A linked program and its resolved uniforms.
#[derive(Debug)]
pub struct GlProgram {
    pub name: GlName,
    pub label: String,
    pub bindings: HashMap<String, UniformBinding>,
}

impl GlProgram {
    /// Deletes the program and the buffer textures it owns.
    pub fn delete(&self, driver: &mut dyn GlDriver) {
        for binding in self.bindings.values() {
            if let UniformBinding::TexelBuffer { texture, .. } = binding {
                driver.delete_texture(*texture);
            }
        }
        driver.delete_program(self.name);
    }
}

/// Resolves, preprocesses and compiles one stage.
#[allow(clippy::too_many_arguments)]
pub fn compile_shader(
    driver: &mut dyn GlDriver,
    labeler: &dyn DebugLabeler,
    resolver: &dyn ShaderSourceResolver,
    preprocessor: &dyn ShaderPreprocessor,
    id: &str,
    stage: ShaderStage,
    defines: &ShaderDefines,
) -> Result<GlShader, ShaderError> {
    let Some(source) = resolver.source(id, stage) else {
        let err = ShaderError::SourceNotFound {
            id: id.to_string(),
            stage,
        };
        log::error!("{err}");
        return Err(err);
    };
    let source = preprocessor.process(&source, defines);

    let name = driver.create_shader(stage.into_gl());
    driver.shader_source(name, &source);
    driver.compile_shader(name);
    if !driver.shader_compile_status(name) {
        let err = ShaderError::CompilationFailed {
            id: id.to_string(),
            stage,
            log: driver.shader_info_log(name).trim().to_string(),
        };
        driver.delete_shader(name);
        log::error!("{err}");
        return Err(err);
    }

    labeler.label_object(driver, LabelKind::Shader, name, id);
    Ok(GlShader {
        name,
        id: id.to_string(),
        stage,
    })
}

/// Links `vertex` and `fragment` into a program for `pipeline`.
pub fn link_program(
    driver: &mut dyn GlDriver,
    labeler: &dyn DebugLabeler,
    pipeline: &RenderPipeline,
    vertex: &GlShader,
    fragment: &GlShader,
) -> Result<GlProgram, ShaderError> {
    let name = driver.create_program();
    for (index, attribute) in pipeline.vertex_format.attribute_names().enumerate() {
        driver.bind_attrib_location(name, index as u32, attribute);
    }
    driver.attach_shader(name, vertex.name);
    driver.attach_shader(name, fragment.name);
    driver.link_program(name);

    let linked = driver.program_link_status(name);
    let info = driver.program_info_log(name);
    if !linked || info.contains("Failed for unknown reason") {
        driver.delete_program(name);
        return Err(ShaderError::LinkFailed {
            vertex: vertex.id.clone(),
            fragment: fragment.id.clone(),
            log: info,
        });
    }
    if !info.is_empty() {
        log::info!(
            "Info log when linking program containing VS {} and FS {}. Log output: {}",
            vertex.id,
            fragment.id,
            info
        );
    }

    labeler.label_object(driver, LabelKind::Program, name, &pipeline.location);
    let mut program = GlProgram {
        name,
        label: pipeline.location.clone(),
        bindings: HashMap::new(),
    };
    resolve_bindings(driver, &mut program, pipeline);
    Ok(program)
}

/// Assigns binding points to blocks and texture units to samplers.
///
/// Declared blocks come first, then predefined blocks the shader uses
/// without declaring. Texel buffers and samplers share the unit counter.
fn resolve_bindings(driver: &mut dyn GlDriver, program: &mut GlProgram, pipeline: &RenderPipeline) {
    let mut next_binding = 0u32;
    let mut next_unit = 0u32;

    for uniform in &pipeline.uniforms {
        match uniform.kind {
            UniformKind::UniformBuffer => {
                let Some(index) = driver.get_uniform_block_index(program.name, &uniform.name) else {
                    log::warn!(
                        "{} shader program does not use ubo {} defined in the pipeline. This might be a bug.",
                        program.label,
                        uniform.name
                    );
                    continue;
                };
                driver.uniform_block_binding(program.name, index, next_binding);
                program.bindings.insert(
                    uniform.name.clone(),
                    UniformBinding::Block {
                        binding: next_binding,
                    },
                );
                next_binding += 1;
            }
            UniformKind::TexelBuffer(format) => {
                let Some(location) = driver.get_uniform_location(program.name, &uniform.name)
                else {
                    log::warn!(
                        "{} shader program does not use utb {} defined in the pipeline. This might be a bug.",
                        program.label,
                        uniform.name
                    );
                    continue;
                };
                let texture = driver.create_texture(gl::TEXTURE_BUFFER);
                program.bindings.insert(
                    uniform.name.clone(),
                    UniformBinding::TexelBuffer {
                        location,
                        unit: next_unit,
                        format,
                        texture,
                    },
                );
                next_unit += 1;
            }
        }
    }

    for sampler in &pipeline.samplers {
        let Some(location) = driver.get_uniform_location(program.name, sampler) else {
            log::warn!(
                "{} shader program does not use sampler {} defined in the pipeline. This might be a bug.",
                program.label,
                sampler
            );
            continue;
        };
        program.bindings.insert(
            sampler.clone(),
            UniformBinding::Sampler {
                location,
                unit: next_unit,
            },
        );
        next_unit += 1;
    }

    for (index, block) in driver.active_uniform_blocks(program.name).into_iter().enumerate() {
        if program.bindings.contains_key(&block) {
            continue;
        }
        if !pipeline.samplers.contains(&block) && PREDEFINED_UNIFORM_BLOCKS.contains(&block.as_str()) {
            driver.uniform_block_binding(program.name, index as u32, next_binding);
            program.bindings.insert(
                block,
                UniformBinding::Block {
                    binding: next_binding,
                },
            );
            next_binding += 1;
        } else {
            log::warn!("Found unknown and unsupported uniform {} in {}", block, program.label);
        }
    }
}

#[cfg(all(test, feature = "headless"))]
mod tests {
    use super::*;
    use crate::graphics::gl::headless::HeadlessDriver;
    use crate::graphics::gl::labeler::NoLabels;
    use kiln_core::renderer::traits::DefineInjector;

    const VERTEX: &str = "#version 150\nlayout(std140) uniform Projection {\n mat4 ProjMat;\n};\nuniform DynamicTransforms {\n mat4 ModelView;\n};\nvoid main() {}\n";
    const FRAGMENT: &str = "#version 150\nuniform sampler2D Sampler0;\nuniform samplerBuffer Palette;\nuniform Mystery {\n vec4 x;\n};\nvoid main() {}\n";

    fn sources() -> HashMap<(String, ShaderStage), String> {
        let mut sources = HashMap::new();
        sources.insert(("test/shape".to_string(), ShaderStage::Vertex), VERTEX.to_string());
        sources.insert(("test/shape".to_string(), ShaderStage::Fragment), FRAGMENT.to_string());
        sources
    }

    fn pipeline() -> RenderPipeline {
        RenderPipeline::builder("test/pipeline")
            .with_vertex_shader("test/shape")
            .with_fragment_shader("test/shape")
            .with_uniform("DynamicTransforms", UniformKind::UniformBuffer)
            .with_uniform("Palette", UniformKind::TexelBuffer(TextureFormat::R8Unorm))
            .with_sampler("Sampler0")
            .build()
            .expect("valid pipeline")
    }

    fn compile_both(driver: &mut HeadlessDriver) -> (GlShader, GlShader) {
        let sources = sources();
        let defines = ShaderDefines::default();
        let vs = compile_shader(driver, &NoLabels, &sources, &DefineInjector, "test/shape", ShaderStage::Vertex, &defines)
            .expect("vertex compiles");
        let fs = compile_shader(driver, &NoLabels, &sources, &DefineInjector, "test/shape", ShaderStage::Fragment, &defines)
            .expect("fragment compiles");
        (vs, fs)
    }

    #[test]
    fn missing_source_is_reported() {
        let mut driver = HeadlessDriver::default();
        let err = compile_shader(
            &mut driver,
            &NoLabels,
            &sources(),
            &DefineInjector,
            "test/absent",
            ShaderStage::Vertex,
            &ShaderDefines::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ShaderError::SourceNotFound { .. }));
        assert_eq!(driver.live_objects().shaders, 0);
    }

    #[test]
    fn compile_failure_carries_trimmed_log() {
        let mut driver = HeadlessDriver::default();
        let mut sources = sources();
        sources.insert(
            ("test/broken".to_string(), ShaderStage::Fragment),
            "#version 150\n#error nope\n".to_string(),
        );
        let err = compile_shader(
            &mut driver,
            &NoLabels,
            &sources,
            &DefineInjector,
            "test/broken",
            ShaderStage::Fragment,
            &ShaderDefines::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ShaderError::CompilationFailed {
                id: "test/broken".to_string(),
                stage: ShaderStage::Fragment,
                log: "0:2(0): error: nope".to_string(),
            }
        );
        assert_eq!(driver.live_objects().shaders, 0);
    }

    #[test]
    fn bindings_follow_declaration_order() {
        let mut driver = HeadlessDriver::default();
        let (vs, fs) = compile_both(&mut driver);
        let program = link_program(&mut driver, &NoLabels, &pipeline(), &vs, &fs).expect("links");

        assert_eq!(
            program.bindings.get("DynamicTransforms"),
            Some(&UniformBinding::Block { binding: 0 })
        );
        assert_eq!(
            program.bindings.get("Projection"),
            Some(&UniformBinding::Block { binding: 1 })
        );
        assert!(matches!(
            program.bindings.get("Palette"),
            Some(UniformBinding::TexelBuffer { unit: 0, .. })
        ));
        assert!(matches!(
            program.bindings.get("Sampler0"),
            Some(UniformBinding::Sampler { unit: 1, .. })
        ));
        assert!(!program.bindings.contains_key("Mystery"));

        program.delete(&mut driver);
        assert_eq!(driver.live_objects().programs, 0);
        assert_eq!(driver.live_objects().textures, 0);
    }

    #[test]
    fn declared_block_missing_from_program_gets_no_binding() {
        let mut driver = HeadlessDriver::default();
        let (vs, fs) = compile_both(&mut driver);
        let pipeline = RenderPipeline::builder("test/unused")
            .with_vertex_shader("test/shape")
            .with_fragment_shader("test/shape")
            .with_uniform("ShadowParams", UniformKind::UniformBuffer)
            .with_uniform("DynamicTransforms", UniformKind::UniformBuffer)
            .build()
            .expect("valid pipeline");

        let program = link_program(&mut driver, &NoLabels, &pipeline, &vs, &fs).expect("links");

        assert!(!program.bindings.contains_key("ShadowParams"));
        assert_eq!(
            program.bindings.get("DynamicTransforms"),
            Some(&UniformBinding::Block { binding: 0 }),
            "The absent block does not consume a binding point"
        );
        assert_eq!(driver.call_count("uniform_block_binding"), 2);
        program.delete(&mut driver);
    }

    #[test]
    fn unknown_failure_in_log_counts_as_link_failure() {
        let mut driver = HeadlessDriver::default();
        let (vs, fs) = compile_both(&mut driver);
        driver.warn_next_link("Failed for unknown reason");
        let err = link_program(&mut driver, &NoLabels, &pipeline(), &vs, &fs).unwrap_err();
        assert!(matches!(err, ShaderError::LinkFailed { .. }));
        assert_eq!(driver.live_objects().programs, 0);
    }
}
