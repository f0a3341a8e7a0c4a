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

//! Line-based `#import` expansion.

use super::ShaderResources;
use crate::renderer::traits::ImportResolver;
use std::cell::RefCell;
use std::collections::HashSet;

const INCLUDE_DIR: &str = "shaders/include/";
const DIRECTIVE: &str = "#import";

/// Parses `#import "name"` (inline) and `#import <name>` (library) lines.
fn parse_directive(line: &str) -> Option<(bool, &str)> {
    let rest = line.trim_start().strip_prefix(DIRECTIVE)?.trim();
    if let Some(name) = rest.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        return Some((true, name));
    }
    rest.strip_prefix('<')
        .and_then(|r| r.strip_suffix('>'))
        .map(|name| (false, name))
}

/// Replaces every `#import` line of `source` by the text `resolver` returns
/// for it, recursively. A `None` from the resolver drops the line.
pub fn expand_imports(source: &str, resolver: &dyn ImportResolver) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.lines() {
        match parse_directive(line) {
            Some((inline, name)) => {
                if let Some(text) = resolver.load_import(inline, name) {
                    out.push_str(&expand_imports(&text, resolver));
                    if !text.ends_with('\n') {
                        out.push('\n');
                    }
                }
            }
            None => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    out
}

/// Resolves `a/./b/../c` to `a/c`. Leading `..` segments that would escape
/// the root are dropped.
pub(crate) fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// The directory part of `path`, with a trailing slash.
pub(crate) fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..=index],
        None => "",
    }
}

/// Resolves imports of one top-level shader file against a resource tree.
///
/// Inline imports are relative to the directory of that file; library imports
/// live under `shaders/include/`. Each resolved path is emitted at most once.
pub(crate) struct ResourceImports<'a> {
    resources: &'a dyn ShaderResources,
    dir: String,
    processed: RefCell<HashSet<String>>,
}

impl<'a> ResourceImports<'a> {
    pub(crate) fn new(resources: &'a dyn ShaderResources, file: &str) -> Self {
        Self {
            resources,
            dir: parent_dir(file).to_string(),
            processed: RefCell::new(HashSet::new()),
        }
    }
}

impl ImportResolver for ResourceImports<'_> {
    fn load_import(&self, inline: bool, name: &str) -> Option<String> {
        let path = if inline {
            normalize_path(&format!("{}{}", self.dir, name))
        } else {
            normalize_path(&format!("{INCLUDE_DIR}{name}"))
        };

        if !self.processed.borrow_mut().insert(path.clone()) {
            return None;
        }
        match self.resources.read(&path) {
            Ok(text) => Some(text),
            Err(e) => {
                log::error!("ShaderLoader: Could not open GLSL import {}: {}", path, e);
                Some(format!("#error {e}\n"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::shader::MemoryResources;

    #[test]
    fn directive_forms() {
        assert_eq!(parse_directive("#import <fog.glsl>"), Some((false, "fog.glsl")));
        assert_eq!(parse_directive("  #import \"../common.glsl\""), Some((true, "../common.glsl")));
        assert_eq!(parse_directive("#import fog.glsl"), None);
        assert_eq!(parse_directive("// #import <fog.glsl>"), None);
    }

    #[test]
    fn paths_are_normalized() {
        assert_eq!(normalize_path("shaders/core/../lib/./a.glsl"), "shaders/lib/a.glsl");
        assert_eq!(parent_dir("shaders/core/sky.vsh"), "shaders/core/");
        assert_eq!(parent_dir("sky.vsh"), "");
    }

    #[test]
    fn imports_expand_once_and_recursively() {
        let resources = MemoryResources::new()
            .with_file("shaders/include/fog.glsl", "#import <common.glsl>\nfloat fog;\n")
            .with_file("shaders/include/common.glsl", "float common;")
            .with_file("shaders/core/local.glsl", "#import <common.glsl>\nfloat local;\n");
        let imports = ResourceImports::new(&resources, "shaders/core/sky.fsh");
        let source = "#version 150\n#import <fog.glsl>\n#import \"local.glsl\"\n#import <fog.glsl>\nvoid main() {}";

        assert_eq!(
            expand_imports(source, &imports),
            "#version 150\nfloat common;\nfloat fog;\nfloat local;\nvoid main() {}\n"
        );
    }

    #[test]
    fn missing_import_becomes_an_error_directive() {
        let resources = MemoryResources::new();
        let imports = ResourceImports::new(&resources, "shaders/core/sky.fsh");
        let out = expand_imports("#import <nope.glsl>\nvoid main() {}", &imports);
        assert!(out.starts_with("#error "));
        assert!(out.ends_with("void main() {}\n"));
    }
}
