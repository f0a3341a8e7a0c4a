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

//! The shader reload cycle: prepare off-thread, then apply atomically.

use super::import::{expand_imports, ResourceImports};
use crate::renderer::{
    api::{pipeline::RenderPipeline, util::ShaderStage},
    error::LoadError,
    post::{EffectTextures, PostEffectPipeline, PostEffectProcessor},
    traits::{GraphicsDevice, ShaderSourceResolver},
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::sync::Arc;

const SHADER_DIR: &str = "shaders/";
const POST_EFFECT_DIR: &str = "post_effect/";
const POST_EFFECT_EXTENSION: &str = ".json";

/// A read-only tree of text resources addressed by `/`-separated paths.
pub trait ShaderResources: Send + Sync {
    /// Every path starting with `prefix`.
    fn list(&self, prefix: &str) -> Vec<String>;
    /// The content of `path`.
    fn read(&self, path: &str) -> io::Result<String>;
}

/// A [`ShaderResources`] held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryResources {
    files: BTreeMap<String, String>,
}

impl MemoryResources {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, builder style.
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    /// Adds or replaces a file.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }
}

impl ShaderResources for MemoryResources {
    fn list(&self, prefix: &str) -> Vec<String> {
        self.files
            .keys()
            .filter(|path| path.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn read(&self, path: &str) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{path} not found")))
    }
}

/// Everything [`ShaderLoader::prepare`] found in a resource tree.
#[derive(Debug, Clone, Default)]
pub struct ShaderDefinitions {
    /// Expanded source text by shader id and stage.
    pub shader_sources: HashMap<(String, ShaderStage), String>,
    /// Post-effect descriptions by id.
    pub post_chains: HashMap<String, PostEffectPipeline>,
}

/// The shader sources of one loader generation.
#[derive(Debug, Default)]
pub struct ShaderSourceCache {
    sources: HashMap<(String, ShaderStage), String>,
}

impl ShaderSourceCache {
    fn new(sources: HashMap<(String, ShaderStage), String>) -> Self {
        Self { sources }
    }

    /// Number of (id, stage) entries.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// `true` when no source is known.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl ShaderSourceResolver for ShaderSourceCache {
    fn source(&self, id: &str, stage: ShaderStage) -> Option<String> {
        self.sources.get(&(id.to_string(), stage)).cloned()
    }
}

/// Callback receiving the first post-effect error of each generation.
pub type LoadErrorHandler = Box<dyn Fn(&LoadError) + Send + Sync>;

struct Generation {
    sources: Arc<ShaderSourceCache>,
    post_chains: HashMap<String, PostEffectPipeline>,
    processors: HashMap<String, Option<PostEffectProcessor>>,
    error_handled: bool,
}

impl Generation {
    fn new(sources: Arc<ShaderSourceCache>, post_chains: HashMap<String, PostEffectPipeline>) -> Self {
        Self {
            sources,
            post_chains,
            processors: HashMap::new(),
            error_handled: false,
        }
    }

    fn close(&mut self) {
        for (_, processor) in self.processors.drain() {
            if let Some(mut processor) = processor {
                processor.close();
            }
        }
    }
}

/// Owns the current shader-source cache and the post effects built from it.
///
/// A reload happens in two steps. [`prepare`](Self::prepare) reads a resource
/// tree and touches no GPU state, so it can run anywhere.
/// [`apply`](Self::apply) then warms every required pipeline against the new
/// sources and only swaps generations if all of them are valid.
pub struct ShaderLoader {
    device: Arc<dyn GraphicsDevice>,
    textures: Arc<dyn EffectTextures + Send + Sync>,
    generation: Generation,
    on_error: Option<LoadErrorHandler>,
}

impl ShaderLoader {
    /// A loader with an empty generation.
    pub fn new(device: Arc<dyn GraphicsDevice>, textures: Arc<dyn EffectTextures + Send + Sync>) -> Self {
        Self {
            device,
            textures,
            generation: Generation::new(Arc::default(), HashMap::new()),
            on_error: None,
        }
    }

    /// Installs the callback notified of post-effect failures.
    pub fn with_error_handler(mut self, handler: impl Fn(&LoadError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(handler));
        self
    }

    /// Scans `shaders/` for `.vsh` and `.fsh` sources and `post_effect/` for
    /// JSON descriptions.
    ///
    /// Files that cannot be read or parsed are logged and skipped. `.glsl`
    /// files are only reachable through `#import`.
    pub fn prepare(resources: &dyn ShaderResources) -> ShaderDefinitions {
        let mut definitions = ShaderDefinitions::default();

        for path in resources.list(SHADER_DIR) {
            let Some(stage) = ShaderStage::from_path(&path) else {
                continue;
            };
            let id = &path[SHADER_DIR.len()..path.len() - stage.extension().len()];
            match resources.read(&path) {
                Ok(text) => {
                    let imports = ResourceImports::new(resources, &path);
                    let expanded = expand_imports(&text, &imports);
                    definitions
                        .shader_sources
                        .insert((id.to_string(), stage), expanded);
                }
                Err(e) => log::error!("ShaderLoader: Failed to load shader source at {}: {}", path, e),
            }
        }

        for path in resources.list(POST_EFFECT_DIR) {
            let Some(id) = path
                .strip_prefix(POST_EFFECT_DIR)
                .and_then(|p| p.strip_suffix(POST_EFFECT_EXTENSION))
            else {
                continue;
            };
            let parsed = resources
                .read(&path)
                .map_err(|e| LoadError::InvalidDescription {
                    id: id.to_string(),
                    details: e.to_string(),
                })
                .and_then(|text| PostEffectPipeline::from_json(id, &text));
            match parsed {
                Ok(pipeline) => {
                    definitions.post_chains.insert(id.to_string(), pipeline);
                }
                Err(e) => log::error!("ShaderLoader: Failed to parse post chain at {}: {}", path, e),
            }
        }

        log::debug!(
            "ShaderLoader: Prepared {} shader source(s) and {} post chain(s)",
            definitions.shader_sources.len(),
            definitions.post_chains.len()
        );
        definitions
    }

    /// Runs [`prepare`](Self::prepare) on a blocking tokio task.
    pub async fn prepare_async(resources: Arc<dyn ShaderResources>) -> Result<ShaderDefinitions, LoadError> {
        tokio::task::spawn_blocking(move || Self::prepare(resources.as_ref()))
            .await
            .map_err(|e| LoadError::Prepare(e.to_string()))
    }

    /// Installs `definitions` if every pipeline of `required` compiles
    /// against them.
    ///
    /// On failure the device keeps resolving against the previous sources,
    /// the previous post effects stay alive, and the error names each failed
    /// pipeline location.
    pub fn apply(&mut self, definitions: ShaderDefinitions, required: &[RenderPipeline]) -> Result<(), LoadError> {
        let sources = Arc::new(ShaderSourceCache::new(definitions.shader_sources));
        let resolver: Arc<dyn ShaderSourceResolver> = sources.clone();

        self.device.clear_pipeline_cache();
        let mut seen = HashSet::with_capacity(required.len());
        let mut failed = Vec::new();
        for pipeline in required {
            if !seen.insert(pipeline.location.as_str()) {
                continue;
            }
            let compiled = self.device.precompile_pipeline(pipeline, Some(resolver.clone()));
            if !compiled.is_valid() {
                failed.push(pipeline.location.clone());
            }
        }

        if !failed.is_empty() {
            self.device.clear_pipeline_cache();
            let err = LoadError::RequiredPrograms(failed);
            log::error!("ShaderLoader: {}", err);
            return Err(err);
        }

        self.generation.close();
        self.generation = Generation::new(sources, definitions.post_chains);
        self.device.set_default_source_resolver(resolver);
        log::info!(
            "ShaderLoader: Applied {} shader source(s), {} pipeline(s) warmed",
            self.generation.sources.len(),
            seen.len()
        );
        Ok(())
    }

    /// Source of shader `id` for `stage` in the current generation.
    pub fn source(&self, id: &str, stage: ShaderStage) -> Option<String> {
        self.generation.sources.source(id, stage)
    }

    /// Ids of the post effects known to the current generation.
    pub fn post_chain_ids(&self) -> impl Iterator<Item = &str> {
        self.generation.post_chains.keys().map(String::as_str)
    }

    /// The post effect `id`, built on first use and cached, failures
    /// included, until the next successful [`apply`](Self::apply).
    pub fn load_post_effect(&mut self, id: &str, external: &HashSet<String>) -> Option<&mut PostEffectProcessor> {
        if !self.generation.processors.contains_key(id) {
            let built = match self.generation.post_chains.get(id) {
                Some(description) => PostEffectProcessor::parse(
                    self.device.clone(),
                    description,
                    id,
                    external,
                    self.textures.as_ref(),
                ),
                None => Err(LoadError::UnknownPostChain(id.to_string())),
            };
            let processor = match built {
                Ok(processor) => Some(processor),
                Err(e) => {
                    log::error!("ShaderLoader: Failed to load post chain {}: {}", id, e);
                    if !self.generation.error_handled {
                        self.generation.error_handled = true;
                        if let Some(handler) = &self.on_error {
                            handler(&e);
                        }
                    }
                    None
                }
            };
            self.generation.processors.insert(id.to_string(), processor);
        }
        self.generation.processors.get_mut(id).and_then(Option::as_mut)
    }

    /// Releases every post effect of the current generation.
    pub fn close(&mut self) {
        self.generation.close();
    }
}
