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

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Preprocessor defines attached to a pipeline's shaders.
///
/// Ordered collections keep the generated source and the hash stable, so the
/// same defines always produce the same shader cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ShaderDefines {
    values: BTreeMap<String, String>,
    flags: BTreeSet<String>,
}

impl ShaderDefines {
    /// No defines.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `#define name value`.
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.values.insert(name.into(), value.to_string());
        self
    }

    /// Adds `#define name`.
    #[must_use]
    pub fn with_flag(mut self, name: impl Into<String>) -> Self {
        self.flags.insert(name.into());
        self
    }

    /// `true` if there is nothing to define.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.flags.is_empty()
    }

    /// The `#define` lines, one per entry, each ending with a newline.
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.values {
            out.push_str(&format!("#define {name} {value}\n"));
        }
        for flag in &self.flags {
            out.push_str(&format!("#define {flag}\n"));
        }
        out
    }

    /// Inserts the define lines right after the `#version` directive, or at
    /// the top when the source has none.
    pub fn inject_into(&self, source: &str) -> String {
        if self.is_empty() {
            return source.to_string();
        }
        let defines = self.to_source();
        match source.find("#version") {
            Some(start) => {
                let line_end = source[start..]
                    .find('\n')
                    .map(|i| start + i + 1)
                    .unwrap_or(source.len());
                let mut out = String::with_capacity(source.len() + defines.len() + 1);
                out.push_str(&source[..line_end]);
                if !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&defines);
                out.push_str(&source[line_end..]);
                out
            }
            None => format!("{defines}{source}"),
        }
    }
}

impl fmt::Display for ShaderDefines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self
            .values
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .chain(self.flags.iter().cloned())
            .collect();
        write!(f, "[{}]", entries.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defines_go_after_version_line() {
        let defines = ShaderDefines::new()
            .with_value("MAX_LIGHTS", 4)
            .with_flag("ALPHA_CUTOUT");
        let source = "#version 150\nvoid main() {}\n";
        assert_eq!(
            defines.inject_into(source),
            "#version 150\n#define MAX_LIGHTS 4\n#define ALPHA_CUTOUT\nvoid main() {}\n"
        );
    }

    #[test]
    fn empty_defines_leave_source_untouched() {
        let source = "void main() {}";
        assert_eq!(ShaderDefines::new().inject_into(source), source);
        assert_eq!(
            ShaderDefines::new().with_flag("FOG").inject_into(source),
            "#define FOG\nvoid main() {}"
        );
    }
}
