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

//! Backend configuration and the one-time capability probe.

use super::consts as gl;
use super::driver::GlDriver;
use serde::{Deserialize, Serialize};

/// User-facing switches of the GL backend.
///
/// Every `allow_*` flag can only turn an optional capability off: a flag set
/// to `true` still requires the driver to advertise the extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlBackendConfig {
    /// Attach debug labels to driver objects.
    pub debug_labels: bool,
    /// Use `GL_KHR_debug` for labels and debug groups.
    pub allow_khr_debug: bool,
    /// Use `GL_EXT_debug_label` when `GL_KHR_debug` is not used.
    pub allow_ext_debug_label: bool,
    /// Use separate attribute formats and buffer bindings.
    pub allow_vertex_attrib_binding: bool,
    /// Use immutable buffer storage.
    pub allow_buffer_storage: bool,
    /// Validate draw state and return errors instead of skipping bad draws.
    pub validation: bool,
    /// Renderer substrings that need a throwaway program after the pipeline
    /// cache is cleared to release driver memory.
    pub cache_cleanup_renderers: Vec<String>,
}

impl Default for GlBackendConfig {
    fn default() -> Self {
        Self {
            debug_labels: true,
            allow_khr_debug: true,
            allow_ext_debug_label: true,
            allow_vertex_attrib_binding: true,
            allow_buffer_storage: true,
            validation: true,
            cache_cleanup_renderers: vec!["AMD".to_string()],
        }
    }
}

/// What the driver supports, resolved against a [`GlBackendConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlCapabilities {
    pub khr_debug: bool,
    pub ext_debug_label: bool,
    pub vertex_attrib_binding: bool,
    pub buffer_storage: bool,
    pub anisotropic_filtering: bool,
    pub vendor: String,
    pub renderer: String,
    pub version: String,
    /// Largest texture size the proxy probe accepted.
    pub max_texture_size: u32,
    pub max_label_length: usize,
    /// Never below 1.
    pub uniform_offset_alignment: u64,
    /// 1 when anisotropic filtering is unavailable.
    pub max_anisotropy: u32,
    /// Extensions this backend actually relies on.
    pub enabled_extensions: Vec<String>,
}

const MIN_PROBED_TEXTURE_SIZE: u32 = 1024;
const MAX_PROBED_TEXTURE_SIZE: u32 = 32768;

impl GlCapabilities {
    /// Queries the driver once.
    pub fn detect(driver: &mut dyn GlDriver, config: &GlBackendConfig) -> Self {
        let extensions = driver.extensions();
        let has = |name: &str| extensions.iter().any(|e| e == name);

        let khr_debug = config.allow_khr_debug && has(gl::EXT_KHR_DEBUG);
        let ext_debug_label =
            !khr_debug && config.allow_ext_debug_label && has(gl::EXT_DEBUG_LABEL);
        let vertex_attrib_binding =
            config.allow_vertex_attrib_binding && has(gl::EXT_VERTEX_ATTRIB_BINDING);
        let buffer_storage = config.allow_buffer_storage && has(gl::EXT_BUFFER_STORAGE);
        let anisotropic_filtering = has(gl::EXT_TEXTURE_FILTER_ANISOTROPIC);

        let enabled_extensions = [
            (khr_debug, gl::EXT_KHR_DEBUG),
            (ext_debug_label, gl::EXT_DEBUG_LABEL),
            (vertex_attrib_binding, gl::EXT_VERTEX_ATTRIB_BINDING),
            (buffer_storage, gl::EXT_BUFFER_STORAGE),
            (anisotropic_filtering, gl::EXT_TEXTURE_FILTER_ANISOTROPIC),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, name)| name.to_string())
        .collect();

        let max_anisotropy = if anisotropic_filtering {
            driver.get_integer(gl::MAX_TEXTURE_MAX_ANISOTROPY).max(1) as u32
        } else {
            1
        };

        Self {
            khr_debug,
            ext_debug_label,
            vertex_attrib_binding,
            buffer_storage,
            anisotropic_filtering,
            vendor: driver.get_string(gl::VENDOR),
            renderer: driver.get_string(gl::RENDERER),
            version: driver.get_string(gl::VERSION),
            max_texture_size: probe_max_texture_size(driver),
            max_label_length: driver.get_integer(gl::MAX_LABEL_LENGTH).max(0) as usize,
            uniform_offset_alignment: driver
                .get_integer(gl::UNIFORM_BUFFER_OFFSET_ALIGNMENT)
                .max(1) as u64,
            max_anisotropy,
            enabled_extensions,
        }
    }
}

/// Finds the largest square texture the driver accepts, halving from the
/// larger of 32768 and the reported limit.
fn probe_max_texture_size(driver: &mut dyn GlDriver) -> u32 {
    let reported = driver.get_integer(gl::MAX_TEXTURE_SIZE).max(0) as u32;
    let mut size = reported.max(MAX_PROBED_TEXTURE_SIZE);
    while size >= MIN_PROBED_TEXTURE_SIZE {
        if driver.proxy_texture_fits(size) {
            return size;
        }
        size >>= 1;
    }
    let fallback = reported.max(MIN_PROBED_TEXTURE_SIZE);
    log::info!(
        "Failed to determine maximum texture size by probing, trying GL_MAX_TEXTURE_SIZE = {fallback}"
    );
    fallback
}

#[cfg(all(test, feature = "headless"))]
mod tests {
    use super::*;
    use crate::graphics::gl::headless::{HeadlessConfig, HeadlessDriver};

    #[test]
    fn probe_halves_until_the_proxy_fits() {
        let mut driver = HeadlessDriver::new(HeadlessConfig {
            proxy_limit: 10_000,
            ..HeadlessConfig::default()
        });
        let caps = GlCapabilities::detect(&mut driver, &GlBackendConfig::default());
        assert_eq!(caps.max_texture_size, 8192);
    }

    #[test]
    fn probe_falls_back_to_reported_limit() {
        let mut driver = HeadlessDriver::new(HeadlessConfig {
            proxy_limit: 0,
            max_texture_size: 512,
            ..HeadlessConfig::default()
        });
        let caps = GlCapabilities::detect(&mut driver, &GlBackendConfig::default());
        assert_eq!(caps.max_texture_size, 1024);
    }

    #[test]
    fn config_can_switch_extensions_off() {
        let mut driver = HeadlessDriver::default();
        let config = GlBackendConfig {
            allow_khr_debug: false,
            allow_buffer_storage: false,
            ..GlBackendConfig::default()
        };
        let caps = GlCapabilities::detect(&mut driver, &config);
        assert!(!caps.khr_debug);
        assert!(caps.ext_debug_label);
        assert!(!caps.buffer_storage);
        assert!(caps.vertex_attrib_binding);
        assert!(!caps
            .enabled_extensions
            .iter()
            .any(|e| e == gl::EXT_BUFFER_STORAGE));
    }

    #[test]
    fn anisotropy_is_one_without_the_extension() {
        let mut driver = HeadlessDriver::new(HeadlessConfig {
            extensions: Vec::new(),
            ..HeadlessConfig::default()
        });
        let caps = GlCapabilities::detect(&mut driver, &GlBackendConfig::default());
        assert_eq!(caps.max_anisotropy, 1);
        assert!(caps.enabled_extensions.is_empty());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: GlBackendConfig =
            serde_json::from_str(r#"{ "validation": false }"#).expect("valid json");
        assert!(!config.validation);
        assert!(config.debug_labels);
        assert_eq!(config.cache_cleanup_renderers, vec!["AMD".to_string()]);
    }
}
