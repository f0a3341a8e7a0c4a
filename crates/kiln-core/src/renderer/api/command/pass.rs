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

use crate::renderer::api::{
    resource::{BufferId, BufferSlice, TextureViewId},
    util::IndexFormat,
};

/// Describes the attachments of a render pass and how to clear them.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassDescriptor {
    /// Debug group label pushed for the lifetime of the pass.
    pub label: String,
    /// The color attachment.
    pub color_view: TextureViewId,
    /// Clear color as `0xAARRGGBB`, or `None` to load.
    pub clear_color: Option<u32>,
    /// The optional depth attachment.
    pub depth_view: Option<TextureViewId>,
    /// Clear depth, or `None` to load.
    pub clear_depth: Option<f64>,
}

impl RenderPassDescriptor {
    /// A pass rendering into `color_view` without clearing.
    pub fn new(label: impl Into<String>, color_view: TextureViewId) -> Self {
        Self {
            label: label.into(),
            color_view,
            clear_color: None,
            depth_view: None,
            clear_depth: None,
        }
    }

    /// Clears the color attachment on open.
    pub fn with_clear_color(mut self, argb: u32) -> Self {
        self.clear_color = Some(argb);
        self
    }

    /// Attaches a depth view, optionally clearing it on open.
    pub fn with_depth(mut self, depth_view: TextureViewId, clear_depth: Option<f64>) -> Self {
        self.depth_view = Some(depth_view);
        self.clear_depth = clear_depth;
        self
    }
}

/// A sub-rectangle of a texture mip level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRegion {
    /// Left edge in texels.
    pub x: u32,
    /// Bottom edge in texels.
    pub y: u32,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
}

impl TextureRegion {
    /// Creates a region.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// `true` if the region lies within a `width × height` extent.
    pub fn fits_in(&self, width: u32, height: u32) -> bool {
        self.x.checked_add(self.width).is_some_and(|r| r <= width)
            && self.y.checked_add(self.height).is_some_and(|t| t <= height)
    }
}

/// The scissor rectangle of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScissorState {
    /// `true` while the scissor test is on.
    pub enabled: bool,
    /// Left edge.
    pub x: i32,
    /// Bottom edge.
    pub y: i32,
    /// Width.
    pub width: i32,
    /// Height.
    pub height: i32,
}

impl ScissorState {
    /// An enabled scissor rectangle.
    pub const fn rect(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            enabled: true,
            x,
            y,
            width,
            height,
        }
    }
}

/// One object submitted through `draw_multiple_indexed`.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderObject {
    /// Vertex buffer bound at slot 0.
    pub vertex_buffer: BufferId,
    /// Per-object index buffer, or `None` to use the shared one.
    pub index_buffer: Option<BufferId>,
    /// Width of the per-object indices.
    pub index_format: Option<IndexFormat>,
    /// First index to draw.
    pub first_index: u32,
    /// Number of indices to draw.
    pub index_count: u32,
    /// Uniform slices bound just for this object.
    pub uniforms: Vec<(String, BufferSlice)>,
}

impl RenderObject {
    /// An object drawing `index_count` indices from `vertex_buffer`.
    pub fn new(vertex_buffer: BufferId, first_index: u32, index_count: u32) -> Self {
        Self {
            vertex_buffer,
            index_buffer: None,
            index_format: None,
            first_index,
            index_count,
            uniforms: Vec::new(),
        }
    }

    /// Uses a dedicated index buffer for this object.
    pub fn with_index_buffer(mut self, buffer: BufferId, format: IndexFormat) -> Self {
        self.index_buffer = Some(buffer);
        self.index_format = Some(format);
        self
    }

    /// Binds a uniform slice for this object only.
    pub fn with_uniform(mut self, name: impl Into<String>, slice: BufferSlice) -> Self {
        self.uniforms.push((name.into(), slice));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_bounds() {
        assert!(TextureRegion::new(0, 0, 256, 256).fits_in(256, 256));
        assert!(!TextureRegion::new(1, 0, 256, 256).fits_in(256, 256));
        assert!(!TextureRegion::new(u32::MAX, 0, 2, 1).fits_in(u32::MAX, 1));
    }
}
