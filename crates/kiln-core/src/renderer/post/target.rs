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

use crate::renderer::{
    api::{
        resource::{TextureDescriptor, TextureId, TextureUsage, TextureViewId},
        util::TextureFormat,
    },
    error::GpuError,
    traits::{CommandEncoder, GraphicsDevice},
};

fn discard_texture(device: &dyn GraphicsDevice, label: &str, texture: TextureId) {
    if let Err(e) = device.destroy_texture(texture) {
        log::warn!("RenderTarget({label}): Failed to destroy texture: {}", e);
    }
}

/// A color attachment with an optional depth attachment, as read and written
/// by post passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    /// The color texture.
    pub color: TextureId,
    /// A view over the color texture.
    pub color_view: TextureViewId,
    /// The depth texture and its view.
    pub depth: Option<(TextureId, TextureViewId)>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl RenderTarget {
    /// Allocates an `Rgba8Unorm` color target, with a depth target if asked.
    pub fn create(
        device: &dyn GraphicsDevice,
        label: &str,
        width: u32,
        height: u32,
        with_depth: bool,
    ) -> Result<Self, GpuError> {
        let usage = TextureUsage::RENDER_ATTACHMENT
            | TextureUsage::TEXTURE_BINDING
            | TextureUsage::COPY_SRC
            | TextureUsage::COPY_DST;
        let color = device.create_texture(&TextureDescriptor::new_2d(
            format!("{label} / Color"),
            usage,
            TextureFormat::Rgba8Unorm,
            width,
            height,
        ))?;
        let color_view = match device.create_texture_view_full(color) {
            Ok(view) => view,
            Err(e) => {
                discard_texture(device, label, color);
                return Err(e);
            }
        };

        let depth = if with_depth {
            let created = device
                .create_texture(&TextureDescriptor::new_2d(
                    format!("{label} / Depth"),
                    usage,
                    TextureFormat::Depth32Float,
                    width,
                    height,
                ))
                .and_then(|depth| match device.create_texture_view_full(depth) {
                    Ok(view) => Ok((depth, view)),
                    Err(e) => {
                        discard_texture(device, label, depth);
                        Err(e)
                    }
                });
            match created {
                Ok(depth) => Some(depth),
                Err(e) => {
                    discard_texture(device, label, color);
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(Self {
            color,
            color_view,
            depth,
            width,
            height,
        })
    }

    /// Clears the color (and depth) attachments.
    pub fn clear(&self, encoder: &mut dyn CommandEncoder, argb: u32) -> Result<(), GpuError> {
        match self.depth {
            Some((depth, _)) => encoder.clear_color_and_depth_textures(self.color, argb, depth, 1.0),
            None => encoder.clear_color_texture(self.color, argb),
        }
    }

    /// Destroys both attachments and their views.
    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        if let Err(e) = device.destroy_texture(self.color) {
            log::warn!("RenderTarget: Failed to destroy color texture: {}", e);
        }
        if let Some((depth, _)) = self.depth {
            if let Err(e) = device.destroy_texture(depth) {
                log::warn!("RenderTarget: Failed to destroy depth texture: {}", e);
            }
        }
    }
}
