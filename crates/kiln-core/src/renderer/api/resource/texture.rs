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

//! Defines data structures related to GPU textures and texture views.

use crate::kiln_bitflags;
use crate::renderer::api::util::TextureFormat;

kiln_bitflags! {
    /// A set of flags describing the allowed usages of a [`TextureId`].
    pub struct TextureUsage: u32 {
        /// The texture can be the destination of a copy or a CPU upload.
        const COPY_DST = 1 << 0;
        /// The texture can be the source of a copy.
        const COPY_SRC = 1 << 1;
        /// The texture can be bound to a sampler in a shader.
        const TEXTURE_BINDING = 1 << 2;
        /// The texture can be a color or depth attachment of a render pass.
        const RENDER_ATTACHMENT = 1 << 3;
        /// The texture is a cubemap (six square faces).
        const CUBEMAP_COMPATIBLE = 1 << 4;
    }
}

/// A descriptor used to create a [`TextureId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDescriptor {
    /// Debug label; the driver object name is used when absent.
    pub label: Option<String>,
    /// Allowed usages.
    pub usage: TextureUsage,
    /// Texel format.
    pub format: TextureFormat,
    /// Width of mip 0.
    pub width: u32,
    /// Height of mip 0.
    pub height: u32,
    /// Depth or layer count. Must be 1, or 6 for cubemaps.
    pub depth_or_layers: u32,
    /// Number of mip levels, at least 1.
    pub mip_levels: u32,
}

impl TextureDescriptor {
    /// A single-layer 2D texture with one mip level.
    pub fn new_2d(
        label: impl Into<String>,
        usage: TextureUsage,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            label: Some(label.into()),
            usage,
            format,
            width,
            height,
            depth_or_layers: 1,
            mip_levels: 1,
        }
    }
}

/// An opaque handle to a GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);

/// An opaque handle to a view over a mip range of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureViewId(pub usize);

/// What a device knows about a live texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureInfo {
    /// The debug label (or the driver name when none was given).
    pub label: String,
    /// Allowed usages.
    pub usage: TextureUsage,
    /// Texel format.
    pub format: TextureFormat,
    /// Width of mip 0.
    pub width: u32,
    /// Height of mip 0.
    pub height: u32,
    /// Depth or layer count.
    pub depth_or_layers: u32,
    /// Number of mip levels.
    pub mip_levels: u32,
}

impl TextureInfo {
    /// Width of a mip level, never below 1.
    pub fn width_at(&self, mip: u32) -> u32 {
        (self.width >> mip).max(1)
    }

    /// Height of a mip level, never below 1.
    pub fn height_at(&self, mip: u32) -> u32 {
        (self.height >> mip).max(1)
    }
}

/// What a device knows about a live texture view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureViewInfo {
    /// The texture being viewed.
    pub texture: TextureId,
    /// First mip level of the view.
    pub base_mip_level: u32,
    /// Number of mip levels in the view.
    pub mip_level_count: u32,
    /// Width of the view's first mip.
    pub width: u32,
    /// Height of the view's first mip.
    pub height: u32,
}
