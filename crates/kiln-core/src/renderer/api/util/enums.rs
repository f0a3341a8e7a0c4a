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

//! Enums shared by resources, pipelines and commands.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The width of the indices stored in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    /// 16-bit unsigned indices.
    Uint16,
    /// 32-bit unsigned indices.
    #[default]
    Uint32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub const fn size(&self) -> u64 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// A programmable stage of a render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    /// The vertex stage.
    Vertex,
    /// The fragment stage.
    Fragment,
}

impl ShaderStage {
    /// Lowercase name, as used in log lines.
    pub const fn name(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }

    /// File extension of sources for this stage in a resource tree.
    pub const fn extension(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => ".vsh",
            ShaderStage::Fragment => ".fsh",
        }
    }

    /// Finds the stage whose source extension ends `path`.
    pub fn from_path(path: &str) -> Option<Self> {
        [ShaderStage::Vertex, ShaderStage::Fragment]
            .into_iter()
            .find(|stage| path.ends_with(stage.extension()))
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The texel formats a texture can be created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    /// Four 8-bit normalized channels.
    Rgba8Unorm,
    /// One 8-bit normalized channel.
    R8Unorm,
    /// One 8-bit signed integer channel.
    R8Sint,
    /// One 32-bit float depth channel.
    Depth32Float,
}

impl TextureFormat {
    /// Size of one texel in bytes.
    pub const fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm | TextureFormat::Depth32Float => 4,
            TextureFormat::R8Unorm | TextureFormat::R8Sint => 1,
        }
    }

    /// `true` for formats that can be used as a color attachment.
    pub const fn has_color_aspect(&self) -> bool {
        !self.has_depth_aspect()
    }

    /// `true` for depth formats.
    pub const fn has_depth_aspect(&self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }
}
