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

//! Debug labels and debug groups, chosen once from the detected capabilities.

use super::capabilities::{GlBackendConfig, GlCapabilities};
use super::consts::{self as gl, GLenum};
use super::conversions::IntoGl;
use super::driver::{GlDriver, GlName};

/// The kinds of driver objects that receive labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    Buffer,
    Texture,
    Shader,
    Program,
    VertexArray,
}

/// Identifier for `glObjectLabel`.
struct CoreIdentifier(LabelKind);

/// Object type for `glLabelObjectEXT`.
struct ExtIdentifier(LabelKind);

impl IntoGl<GLenum> for CoreIdentifier {
    fn into_gl(self) -> GLenum {
        match self.0 {
            LabelKind::Buffer => gl::BUFFER,
            LabelKind::Texture => gl::TEXTURE,
            LabelKind::Shader => gl::SHADER,
            LabelKind::Program => gl::PROGRAM,
            LabelKind::VertexArray => gl::VERTEX_ARRAY,
        }
    }
}

impl IntoGl<GLenum> for ExtIdentifier {
    fn into_gl(self) -> GLenum {
        match self.0 {
            LabelKind::Buffer => gl::BUFFER_OBJECT_EXT,
            LabelKind::Texture => gl::TEXTURE,
            LabelKind::Shader => gl::SHADER_OBJECT_EXT,
            LabelKind::Program => gl::PROGRAM_OBJECT_EXT,
            LabelKind::VertexArray => gl::VERTEX_ARRAY_OBJECT_EXT,
        }
    }
}

/// Attaches human-readable names to driver objects.
pub trait DebugLabeler: Send {
    /// Labels an object. Labels longer than the driver limit are truncated.
    fn label_object(&self, driver: &mut dyn GlDriver, kind: LabelKind, name: GlName, label: &str);

    /// Opens a debug group, if supported.
    fn push_group(&self, driver: &mut dyn GlDriver, label: &str);

    /// Closes a debug group, if supported.
    fn pop_group(&self, driver: &mut dyn GlDriver);

    /// `true` if labels reach the driver.
    fn is_usable(&self) -> bool;

    /// Short description for logs.
    fn name(&self) -> &'static str;
}

/// Labels nothing.
#[derive(Debug, Default)]
pub struct NoLabels;

impl DebugLabeler for NoLabels {
    fn label_object(&self, _: &mut dyn GlDriver, _: LabelKind, _: GlName, _: &str) {}

    fn push_group(&self, _: &mut dyn GlDriver, _: &str) {}

    fn pop_group(&self, _: &mut dyn GlDriver) {}

    fn is_usable(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Labels through `GL_KHR_debug`, with debug groups.
#[derive(Debug)]
pub struct CoreLabels {
    max_label_length: usize,
}

impl DebugLabeler for CoreLabels {
    fn label_object(&self, driver: &mut dyn GlDriver, kind: LabelKind, name: GlName, label: &str) {
        let label = truncate(label, self.max_label_length);
        driver.object_label(CoreIdentifier(kind).into_gl(), name, label);
    }

    fn push_group(&self, driver: &mut dyn GlDriver, label: &str) {
        driver.push_debug_group(truncate(label, self.max_label_length));
    }

    fn pop_group(&self, driver: &mut dyn GlDriver) {
        driver.pop_debug_group();
    }

    fn is_usable(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "KHR_debug"
    }
}

/// Labels through `GL_EXT_debug_label`. No debug groups.
#[derive(Debug)]
pub struct ExtLabels {
    max_label_length: usize,
}

impl DebugLabeler for ExtLabels {
    fn label_object(&self, driver: &mut dyn GlDriver, kind: LabelKind, name: GlName, label: &str) {
        let label = truncate(label, self.max_label_length);
        driver.label_object_ext(ExtIdentifier(kind).into_gl(), name, label);
    }

    fn push_group(&self, _: &mut dyn GlDriver, _: &str) {}

    fn pop_group(&self, _: &mut dyn GlDriver) {}

    fn is_usable(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "EXT_debug_label"
    }
}

/// Cuts `label` so it fits a driver limit that counts the terminating NUL.
fn truncate(label: &str, max_label_length: usize) -> &str {
    let limit = max_label_length.saturating_sub(1);
    if label.len() <= limit {
        return label;
    }
    let mut end = limit;
    while !label.is_char_boundary(end) {
        end -= 1;
    }
    &label[..end]
}

/// Picks the labeler for this context.
pub fn select_labeler(caps: &GlCapabilities, config: &GlBackendConfig) -> Box<dyn DebugLabeler> {
    if !config.debug_labels {
        return Box::new(NoLabels);
    }
    let max_label_length = caps.max_label_length;
    if caps.khr_debug {
        Box::new(CoreLabels { max_label_length })
    } else if caps.ext_debug_label {
        Box::new(ExtLabels { max_label_length })
    } else {
        log::warn!("Debug labels were requested, but no debug label extension is available");
        Box::new(NoLabels)
    }
}
