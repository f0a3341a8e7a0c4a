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


use kiln_core::renderer::shader::MemoryResources;
use kiln_core::renderer::{
    DepthTestFunction, GpuError, GraphicsDevice, LoadError, PrimitiveTopology,
    RenderPassDescriptor, RenderPipeline, ShaderError, ShaderLoader, ShaderSourceResolver,
    ShaderDefines, ShaderStage, TextureDescriptor, TextureFormat, TextureUsage, TextureViewId,
    VertexFormat,
};
use kiln_core::renderer::{BufferUsage, VertexElement, VertexType, VertexUsage};
use kiln_infra::graphics::gl::{GlBackend, GlBackendConfig, HeadlessConfig, HeadlessDriver};
use std::collections::HashMap;
use std::sync::Arc;

const VERTEX: &str = "#version 150\nvoid main() {}\n";
const FRAGMENT: &str = "#version 150\nout vec4 fragColor;\nvoid main() {}\n";

/// Serves the same two stages for every id except `missing`.
struct FixedSources {
    missing: Option<&'static str>,
}

impl ShaderSourceResolver for FixedSources {
    fn source(&self, id: &str, stage: ShaderStage) -> Option<String> {
        if self.missing == Some(id) {
            return None;
        }
        Some(match stage {
            ShaderStage::Vertex => VERTEX.to_string(),
            ShaderStage::Fragment => FRAGMENT.to_string(),
        })
    }
}

fn fullscreen(name: &str) -> RenderPipeline {
    RenderPipeline::builder(format!("pipeline/{name}"))
        .with_vertex_shader(format!("core/{name}"))
        .with_fragment_shader(format!("core/{name}"))
        .with_depth_test(DepthTestFunction::NoDepthTest)
        .with_depth_write(false)
        .with_vertex_format(VertexFormat::empty(), PrimitiveTopology::Triangles)
        .build()
        .expect("pipeline is complete")
}

fn backend(config: GlBackendConfig, headless: HeadlessConfig) -> (GlBackend, HeadlessDriver) {
    let (device, driver) = GlBackend::headless(config, headless);
    device.set_default_source_resolver(Arc::new(FixedSources { missing: None }));
    (device, driver)
}

fn target_view(device: &GlBackend) -> TextureViewId {
    let texture = device
        .create_texture(&TextureDescriptor::new_2d(
            "pipeline target",
            TextureUsage::RENDER_ATTACHMENT,
            TextureFormat::Rgba8Unorm,
            8,
            8,
        ))
        .expect("target should be created");
    device.create_texture_view_full(texture).expect("view of live texture")
}

#[test]
fn test_cache_hit_compiles_once() {
    let (device, driver) = backend(GlBackendConfig::default(), HeadlessConfig::default());
    let pipeline = fullscreen("blit");

    let first = device.compile_pipeline_cached(&pipeline);
    let second = device.compile_pipeline_cached(&pipeline);

    assert!(first.is_valid());
    assert!(Arc::ptr_eq(&first, &second), "A cache hit returns the same entry");
    assert_eq!(driver.call_count("create_program"), 1);
    assert_eq!(driver.call_count("compile_shader"), 2, "One compile per stage");
    assert_eq!(device.cached_pipelines(), 1);
}

#[test]
fn test_same_location_with_other_defines_or_state_is_a_separate_entry() {
    // --- 1. ARRANGE ---
    let (device, driver) = backend(GlBackendConfig::default(), HeadlessConfig::default());
    let plain = fullscreen("foliage");
    let cutout = RenderPipeline {
        defines: ShaderDefines::new().with_flag("ALPHA_CUTOUT"),
        ..fullscreen("foliage")
    };
    let double_sided = RenderPipeline {
        cull: false,
        ..fullscreen("foliage")
    };

    // --- 2. ACT ---
    let plain_entry = device.compile_pipeline_cached(&plain);
    let cutout_entry = device.compile_pipeline_cached(&cutout);
    let double_sided_entry = device.compile_pipeline_cached(&double_sided);
    let plain_again = device.compile_pipeline_cached(&plain);

    // --- 3. ASSERT ---
    assert!(!Arc::ptr_eq(&plain_entry, &cutout_entry), "Defines are part of the key");
    assert!(!Arc::ptr_eq(&plain_entry, &double_sided_entry), "Fixed-function state is kept apart");
    assert!(Arc::ptr_eq(&plain_entry, &plain_again));
    assert_eq!(cutout_entry.pipeline().defines, cutout.defines);
    assert!(!double_sided_entry.pipeline().cull);
    assert_eq!(driver.call_count("create_program"), 3);
    assert_eq!(
        driver.call_count("compile_shader"),
        4,
        "Only the define set changes the compiled stages"
    );
    assert_eq!(device.cached_pipelines(), 3);
}

#[test]
fn test_distinct_resolvers_get_distinct_entries() {
    let (device, driver) = backend(GlBackendConfig::default(), HeadlessConfig::default());
    let pipeline = fullscreen("blit");
    let a: Arc<dyn ShaderSourceResolver> = Arc::new(FixedSources { missing: None });
    let b: Arc<dyn ShaderSourceResolver> = Arc::new(FixedSources { missing: Some("core/blit") });

    let with_a = device.precompile_pipeline(&pipeline, Some(a.clone()));
    let with_b = device.precompile_pipeline(&pipeline, Some(b));
    let again = device.precompile_pipeline(&pipeline, Some(a));

    assert!(with_a.is_valid());
    assert!(!with_b.is_valid(), "The second resolver has no source for core/blit");
    assert!(matches!(with_b.error(), Some(ShaderError::SourceNotFound { .. })));
    assert!(Arc::ptr_eq(&with_a, &again));
    assert_eq!(device.cached_pipelines(), 2);
    assert_eq!(driver.call_count("create_program"), 1);

    device.clear_pipeline_cache();
    assert_eq!(device.cached_pipelines(), 0);
    assert_eq!(driver.live_objects().programs, 0);
    assert_eq!(driver.live_objects().shaders, 0);
}

#[test]
fn test_invalid_pipeline_never_draws() {
    for validation in [false, true] {
        // --- 1. ARRANGE ---
        let config = GlBackendConfig {
            validation,
            ..GlBackendConfig::default()
        };
        let (device, driver) = backend(config, HeadlessConfig::default());
        driver.fail_next_link("error: fragColor is never written");
        let view = target_view(&device);
        let mut encoder = device.create_command_encoder();
        let mut pass = encoder
            .create_render_pass(&RenderPassDescriptor::new("broken", view))
            .expect("no other pass is open");

        // --- 2. ACT ---
        pass.set_pipeline(&fullscreen("broken"))
            .expect("an invalid program is reported at draw time");
        let first = pass.draw(0, 3);
        let second = pass.draw(0, 3);

        // --- 3. ASSERT ---
        if validation {
            assert!(
                matches!(&first, Err(GpuError::InvalidState(msg)) if msg.contains("invalid shader program")),
                "Validation should name the broken pipeline, got {first:?}"
            );
            assert!(second.is_err());
        } else {
            assert!(first.is_ok() && second.is_ok(), "Without validation the draw is skipped");
        }
        assert!(driver.draws().is_empty(), "validation={validation}: nothing may reach the driver");
        pass.close().expect("no debug group is open");
    }
}

#[test]
fn test_reload_with_missing_fragment_rolls_back() {
    // --- 1. ARRANGE ---
    let (gl, _driver) = backend(GlBackendConfig::default(), HeadlessConfig::default());
    let device: Arc<dyn GraphicsDevice> = Arc::new(gl.clone());
    let textures: HashMap<String, TextureViewId> = HashMap::new();
    let mut loader = ShaderLoader::new(device, Arc::new(textures));
    let required = [fullscreen("sky"), fullscreen("clouds")];

    let mut good = MemoryResources::new();
    for name in ["sky", "clouds"] {
        good.insert(format!("shaders/core/{name}.vsh"), VERTEX);
        good.insert(format!("shaders/core/{name}.fsh"), "#version 150\n// first\nvoid main() {}\n");
    }
    loader
        .apply(ShaderLoader::prepare(&good), &required)
        .expect("every required pipeline compiles");

    // --- 2. ACT ---
    let broken = MemoryResources::new()
        .with_file("shaders/core/sky.vsh", VERTEX)
        .with_file("shaders/core/sky.fsh", "#version 150\n// second\nvoid main() {}\n")
        .with_file("shaders/core/clouds.vsh", VERTEX);
    let result = loader.apply(ShaderLoader::prepare(&broken), &required);

    // --- 3. ASSERT ---
    match result {
        Err(LoadError::RequiredPrograms(failed)) => {
            assert_eq!(failed, vec!["pipeline/clouds".to_string()]);
        }
        other => panic!("expected a rollback naming pipeline/clouds, got {other:?}"),
    }
    assert_eq!(
        loader.source("core/sky", ShaderStage::Fragment).as_deref(),
        Some("#version 150\n// first\nvoid main() {}\n"),
        "The previous generation stays installed"
    );
    assert!(
        gl.compile_pipeline_cached(&fullscreen("clouds")).is_valid(),
        "The device still resolves against the previous sources"
    );
}

#[tokio::test]
async fn test_prepare_runs_off_the_render_thread() {
    let resources = Arc::new(
        MemoryResources::new()
            .with_file("shaders/core/sky.vsh", VERTEX)
            .with_file("shaders/core/sky.fsh", FRAGMENT),
    );
    let definitions = ShaderLoader::prepare_async(resources)
        .await
        .expect("blocking task completes");

    let (gl, _driver) = backend(GlBackendConfig::default(), HeadlessConfig::default());
    let device: Arc<dyn GraphicsDevice> = Arc::new(gl.clone());
    let textures: HashMap<String, TextureViewId> = HashMap::new();
    let mut loader = ShaderLoader::new(device, Arc::new(textures));
    loader
        .apply(definitions, &[fullscreen("sky")])
        .expect("sources prepared off-thread apply on the owner thread");
}

#[test]
fn test_amd_renderer_gets_a_throwaway_program_after_clearing() {
    let amd = HeadlessConfig {
        vendor: "ATI Technologies Inc.".into(),
        renderer: "AMD Radeon RX 7800 XT".into(),
        ..HeadlessConfig::default()
    };
    let (device, driver) = backend(GlBackendConfig::default(), amd);
    device.clear_pipeline_cache();
    assert_eq!(driver.call_count("create_program"), 1);
    assert_eq!(driver.live_objects().programs, 0, "The throwaway program is deleted");

    let (device, driver) = backend(GlBackendConfig::default(), HeadlessConfig::default());
    device.clear_pipeline_cache();
    assert_eq!(driver.call_count("create_program"), 0);
}

fn recycled_vertex_buffer_binds(headless: HeadlessConfig) -> usize {
    let (device, driver) = backend(GlBackendConfig::default(), headless);
    let pipeline = RenderPipeline::builder("pipeline/points")
        .with_vertex_shader("core/points")
        .with_fragment_shader("core/points")
        .with_depth_test(DepthTestFunction::NoDepthTest)
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
        .expect("pipeline is complete");
    let view = target_view(&device);
    let mut encoder = device.create_command_encoder();
    let mut pass = encoder
        .create_render_pass(&RenderPassDescriptor::new("points", view))
        .expect("no other pass is open");
    pass.set_pipeline(&pipeline).expect("pipeline is accepted");

    let first = device
        .create_buffer("points #1", BufferUsage::VERTEX, 36)
        .expect("vertex buffer should be created");
    pass.set_vertex_buffer(0, first).expect("slot 0 is valid");
    pass.draw(0, 3).expect("all bindings are present");
    device.destroy_buffer(first).expect("live buffer");

    let second = device
        .create_buffer("points #2", BufferUsage::VERTEX, 36)
        .expect("vertex buffer should be created");
    pass.set_vertex_buffer(0, second).expect("slot 0 is valid");
    pass.draw(0, 3).expect("all bindings are present");
    pass.close().expect("no debug group is open");
    assert_eq!(driver.draws().len(), 2);
    driver.call_count("bind_vertex_buffer")
}

#[test]
fn test_affected_mesa_versions_rebind_recycled_vertex_buffers() {
    let mesa = HeadlessConfig {
        vendor: "Mesa".into(),
        version: "4.6 (Core Profile) Mesa 25.0.1".into(),
        ..HeadlessConfig::default()
    };
    assert_eq!(
        recycled_vertex_buffer_binds(mesa),
        3,
        "First bind, then an unbind before binding the recycled name"
    );
    assert_eq!(recycled_vertex_buffer_binds(HeadlessConfig::default()), 2);
}

#[test]
fn test_disabled_extensions_are_neither_used_nor_reported() {
    let config = GlBackendConfig {
        allow_buffer_storage: false,
        allow_vertex_attrib_binding: false,
        ..GlBackendConfig::default()
    };
    let (device, driver) = backend(config, HeadlessConfig::default());
    assert!(!device.capabilities().buffer_storage);
    assert!(!device.capabilities().vertex_attrib_binding);
    assert!(device
        .enabled_extensions()
        .iter()
        .all(|e| !e.contains("buffer_storage") && !e.contains("vertex_attrib_binding")));

    device
        .create_buffer("mutable", BufferUsage::VERTEX, 64)
        .expect("buffer should be created");
    assert_eq!(driver.call_count("buffer_storage"), 0);
    assert_eq!(driver.call_count("buffer_data"), 1);
}

#[test]
fn test_introspection_strings() {
    let (device, _driver) = backend(GlBackendConfig::default(), HeadlessConfig::default());
    assert_eq!(device.backend_name(), "OpenGL");
    assert_eq!(
        device.implementation_information(),
        format!("{} GL version {}, {}", device.renderer(), device.version(), device.vendor())
    );
    assert_eq!(device.max_texture_size(), 16384, "The proxy probe raises the reported limit");
    assert_eq!(device.uniform_offset_alignment(), 256);
    assert_eq!(device.max_supported_anisotropy(), 16);
}
