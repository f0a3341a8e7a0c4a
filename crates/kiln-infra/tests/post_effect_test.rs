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


use kiln_core::renderer::post::RenderTarget;
use kiln_core::renderer::shader::MemoryResources;
use kiln_core::renderer::{
    DynamicUniformAllocator, GraphicsDevice, ShaderLoader, TextureViewId,
};
use kiln_infra::graphics::gl::headless::{DrawEntry, LiveObjects};
use kiln_infra::graphics::gl::{GlBackend, GlBackendConfig, HeadlessConfig, HeadlessDriver};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const BLIT_VERTEX: &str = "#version 150\nlayout(std140) uniform SamplerInfo {\n vec2 OutSize;\n vec2 InSize;\n};\nout vec2 texCoord;\nvoid main() {}\n";
const BLIT_FRAGMENT: &str = "#version 150\nuniform sampler2D InSampler;\nin vec2 texCoord;\nout vec4 fragColor;\nvoid main() {}\n";

const RESOLVE: &str = r#"{
    "targets": { "swap": {} },
    "passes": [
        {
            "vertex_shader": "post/blit",
            "fragment_shader": "post/blit",
            "inputs": [ { "sampler_name": "In", "target": "main" } ],
            "output": "swap"
        },
        {
            "vertex_shader": "post/blit",
            "fragment_shader": "post/blit",
            "inputs": [ { "sampler_name": "In", "target": "swap" } ],
            "output": "main"
        }
    ]
}"#;

fn headless() -> (GlBackend, HeadlessDriver, Arc<dyn GraphicsDevice>) {
    let (gl, driver) = GlBackend::headless(GlBackendConfig::default(), HeadlessConfig::default());
    let device: Arc<dyn GraphicsDevice> = Arc::new(gl.clone());
    (gl, driver, device)
}

#[test]
fn test_post_effect_renders_every_pass_on_gl() {
    // --- 1. ARRANGE ---
    let (gl, driver, device) = headless();
    let textures: HashMap<String, TextureViewId> = HashMap::new();
    let mut loader = ShaderLoader::new(device.clone(), Arc::new(textures));
    let resources = MemoryResources::new()
        .with_file("shaders/post/blit.vsh", BLIT_VERTEX)
        .with_file("shaders/post/blit.fsh", BLIT_FRAGMENT)
        .with_file("post_effect/resolve.json", RESOLVE);
    loader
        .apply(ShaderLoader::prepare(&resources), &[])
        .expect("no pipeline is required up front");

    let main = RenderTarget::create(device.as_ref(), "main", 32, 16, true)
        .expect("main target should be created");
    let external = HashMap::from([("main".to_string(), main)]);
    let available: HashSet<String> = external.keys().cloned().collect();

    // --- 2. ACT ---
    {
        let mut encoder = gl.create_command_encoder();
        main.clear(encoder.as_mut(), 0xFF0000FF).expect("main is a color target");
        let processor = loader
            .load_post_effect("resolve", &available)
            .expect("resolve builds against the applied sources");
        assert_eq!(processor.passes().len(), 2);
        processor
            .render(encoder.as_mut(), 32, 16, &external)
            .expect("every pass has its inputs");
    }

    // --- 3. ASSERT ---
    let draws = driver.draws();
    assert_eq!(draws.len(), 2, "One full-screen triangle per pass");
    assert!(draws
        .iter()
        .all(|d| d.entry == DrawEntry::Arrays && d.first == 0 && d.count == 3));
    assert_eq!(driver.debug_group_depth(), 0);
    assert_eq!(gl.cached_pipelines(), 2, "One cache entry per pass location");

    // --- 4. TEARDOWN ---
    loader.close();
    main.destroy(device.as_ref());
    gl.close();
    assert_eq!(
        driver.live_objects(),
        LiveObjects::default(),
        "Closing the loader and the device releases every object"
    );
}

#[test]
fn test_dynamic_uniforms_grow_and_release_on_gl() {
    // --- 1. ARRANGE ---
    let (gl, driver, device) = headless();
    let mut allocator = DynamicUniformAllocator::<[f32; 4]>::new(device, "transforms", 2)
        .expect("initial ring should be created");
    assert_eq!(allocator.block_size(), 256, "16 bytes rounded up to the offset alignment");
    assert_eq!(driver.live_objects().buffers, 3, "One buffer per ring slot");

    // --- 2. ACT ---
    let first = allocator.write(&[1.0, 0.0, 0.0, 1.0]).expect("room in the ring");
    let repeated = allocator.write(&[1.0, 0.0, 0.0, 1.0]).expect("same value");
    let second = allocator.write(&[0.0, 1.0, 0.0, 1.0]).expect("room in the ring");
    let grown = allocator.write(&[0.0, 0.0, 1.0, 1.0]).expect("ring grows");

    // --- 3. ASSERT ---
    assert_eq!(first, repeated, "An unchanged value reuses its block");
    assert_eq!(second.offset, 256);
    assert_eq!(grown.offset, 0, "Growing starts a fresh ring");
    assert_ne!(grown.buffer, first.buffer);
    assert_eq!(allocator.capacity(), 4);
    assert_eq!(allocator.old_buffers().len(), 1);
    assert_eq!(driver.live_objects().buffers, 6);

    let mut encoder = gl.create_command_encoder();
    assert!(
        encoder.map_buffer(grown, true, false).is_err(),
        "Uniform rings are write-only"
    );
    drop(encoder);

    allocator.clear();
    assert_eq!(driver.live_objects().buffers, 3, "Retired rings are destroyed on clear");
    allocator.destroy();
    assert_eq!(driver.live_objects().buffers, 0);
}
