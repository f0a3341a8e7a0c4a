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

//! Collaborators that supply shader text to a device.

use crate::renderer::api::{pipeline::ShaderDefines, util::ShaderStage};
use std::collections::HashMap;

/// Resolves a logical shader id and stage to source text.
///
/// Returning `None` is not fatal: the pipeline being compiled is cached as
/// invalid and its draws are skipped.
pub trait ShaderSourceResolver: Send + Sync {
    /// The source of shader `id` for `stage`, if known.
    fn source(&self, id: &str, stage: ShaderStage) -> Option<String>;
}

impl ShaderSourceResolver for HashMap<(String, ShaderStage), String> {
    fn source(&self, id: &str, stage: ShaderStage) -> Option<String> {
        self.get(&(id.to_string(), stage)).cloned()
    }
}

/// A resolver that knows no shader at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySources;

impl ShaderSourceResolver for EmptySources {
    fn source(&self, _id: &str, _stage: ShaderStage) -> Option<String> {
        None
    }
}

/// Transforms resolved source text before it is handed to the driver.
pub trait ShaderPreprocessor: Send + Sync {
    /// Applies `defines` to `source`.
    fn process(&self, source: &str, defines: &ShaderDefines) -> String {
        defines.inject_into(source)
    }
}

/// Injects defines after the `#version` line and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefineInjector;

impl ShaderPreprocessor for DefineInjector {}

/// Supplies the text behind an `#import` directive.
pub trait ImportResolver {
    /// Loads import `name`. `inline` is `true` for `#import "relative"` forms
    /// and `false` for `#import <library>` forms.
    fn load_import(&self, inline: bool, name: &str) -> Option<String>;
}
