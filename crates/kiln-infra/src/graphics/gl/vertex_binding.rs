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

//! One vertex array object per distinct vertex format.
//!
//! With `GL_ARB_vertex_attrib_binding` the attribute layout is declared once
//! and only the buffer binding changes between draws. Without it every buffer
//! change re-specifies the attribute pointers.

use super::conversions::IntoGl;
use super::driver::{GlDriver, GlName};
use super::labeler::{DebugLabeler, LabelKind};
use kiln_core::renderer::api::pipeline::{AttributeFetch, VertexFormat};
use kiln_core::renderer::api::resource::BufferId;
use std::collections::HashMap;

/// A vertex buffer as both its device id and its driver name.
pub type BoundBuffer = (BufferId, GlName);

/// Binds the vertex array for a format, with `buffer` as its data source.
pub trait VertexBindingCache: Send {
    /// Binds (creating on first use) the vertex array for `format`.
    fn bind(
        &mut self,
        driver: &mut dyn GlDriver,
        labeler: &dyn DebugLabeler,
        format: &VertexFormat,
        buffer: Option<BoundBuffer>,
    );

    /// Deletes every vertex array.
    fn destroy(&mut self, driver: &mut dyn GlDriver);

    /// Number of cached vertex arrays.
    fn len(&self) -> usize;

    /// `true` when no vertex array has been created yet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct Entry {
    vao: GlName,
    last: Option<BoundBuffer>,
}

fn create_vertex_array(
    driver: &mut dyn GlDriver,
    labeler: &dyn DebugLabeler,
    format: &VertexFormat,
) -> GlName {
    let vao = driver.create_vertex_array();
    driver.bind_vertex_array(vao);
    let names: Vec<&str> = format.attribute_names().collect();
    labeler.label_object(
        driver,
        LabelKind::VertexArray,
        vao,
        &format!("Vertex format ({})", names.join(", ")),
    );
    vao
}

/// Separate attribute formats and a single buffer binding slot.
#[derive(Debug, Default)]
pub struct SeparateAttributeBindings {
    entries: HashMap<VertexFormat, Entry>,
    rebind_same_name: bool,
}

impl SeparateAttributeBindings {
    /// `rebind_same_name` unbinds before rebinding when a destroyed buffer's
    /// name was recycled by the driver, which some drivers otherwise ignore.
    pub fn new(rebind_same_name: bool) -> Self {
        Self {
            entries: HashMap::new(),
            rebind_same_name,
        }
    }

    fn declare(driver: &mut dyn GlDriver, format: &VertexFormat) {
        for (index, element) in format.elements().iter().enumerate() {
            let index = index as u32;
            let offset = format.offset_of(index as usize);
            driver.enable_vertex_attrib_array(index);
            match element.fetch() {
                AttributeFetch::Float => {
                    driver.vertex_attrib_format(index, element.count, element.ty.into_gl(), false, offset)
                }
                AttributeFetch::Normalized => {
                    driver.vertex_attrib_format(index, element.count, element.ty.into_gl(), true, offset)
                }
                AttributeFetch::Integer => {
                    driver.vertex_attrib_i_format(index, element.count, element.ty.into_gl(), offset)
                }
            }
            driver.vertex_attrib_binding(index, 0);
        }
    }
}

impl VertexBindingCache for SeparateAttributeBindings {
    fn bind(
        &mut self,
        driver: &mut dyn GlDriver,
        labeler: &dyn DebugLabeler,
        format: &VertexFormat,
        buffer: Option<BoundBuffer>,
    ) {
        let stride = format.vertex_size();
        if let Some(entry) = self.entries.get_mut(format) {
            driver.bind_vertex_array(entry.vao);
            if entry.last != buffer {
                if let Some((id, name)) = buffer {
                    let recycled = entry.last.is_some_and(|(old, old_name)| old != id && old_name == name);
                    if self.rebind_same_name && recycled {
                        driver.bind_vertex_buffer(0, 0, 0, 0);
                    }
                    driver.bind_vertex_buffer(0, name, 0, stride);
                }
                entry.last = buffer;
            }
            return;
        }

        let vao = create_vertex_array(driver, labeler, format);
        Self::declare(driver, format);
        if let Some((_, name)) = buffer {
            driver.bind_vertex_buffer(0, name, 0, stride);
        }
        self.entries.insert(format.clone(), Entry { vao, last: buffer });
    }

    fn destroy(&mut self, driver: &mut dyn GlDriver) {
        for (_, entry) in self.entries.drain() {
            driver.delete_vertex_array(entry.vao);
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Classic attribute pointers, re-specified whenever the buffer changes.
#[derive(Debug, Default)]
pub struct AttributePointerBindings {
    entries: HashMap<VertexFormat, Entry>,
}

impl AttributePointerBindings {
    fn specify(driver: &mut dyn GlDriver, format: &VertexFormat, buffer: GlName) {
        driver.bind_buffer(super::consts::ARRAY_BUFFER, buffer);
        let stride = format.vertex_size();
        for (index, element) in format.elements().iter().enumerate() {
            let offset = u64::from(format.offset_of(index));
            let index = index as u32;
            driver.enable_vertex_attrib_array(index);
            match element.fetch() {
                AttributeFetch::Float => driver.vertex_attrib_pointer(
                    index,
                    element.count,
                    element.ty.into_gl(),
                    false,
                    stride,
                    offset,
                ),
                AttributeFetch::Normalized => driver.vertex_attrib_pointer(
                    index,
                    element.count,
                    element.ty.into_gl(),
                    true,
                    stride,
                    offset,
                ),
                AttributeFetch::Integer => driver.vertex_attrib_i_pointer(
                    index,
                    element.count,
                    element.ty.into_gl(),
                    stride,
                    offset,
                ),
            }
        }
    }
}

impl VertexBindingCache for AttributePointerBindings {
    fn bind(
        &mut self,
        driver: &mut dyn GlDriver,
        labeler: &dyn DebugLabeler,
        format: &VertexFormat,
        buffer: Option<BoundBuffer>,
    ) {
        if let Some(entry) = self.entries.get_mut(format) {
            driver.bind_vertex_array(entry.vao);
            if entry.last != buffer {
                if let Some((_, name)) = buffer {
                    Self::specify(driver, format, name);
                }
                entry.last = buffer;
            }
            return;
        }

        let vao = create_vertex_array(driver, labeler, format);
        if let Some((_, name)) = buffer {
            Self::specify(driver, format, name);
        }
        self.entries.insert(format.clone(), Entry { vao, last: buffer });
    }

    fn destroy(&mut self, driver: &mut dyn GlDriver) {
        for (_, entry) in self.entries.drain() {
            driver.delete_vertex_array(entry.vao);
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Mesa 25.0.0 to 25.0.2 skip a vertex buffer rebind when the new buffer
/// reuses the name of the previous, deleted one.
pub fn needs_same_name_rebind(vendor: &str, version: &str) -> bool {
    vendor == "Mesa" && ["25.0.0", "25.0.1", "25.0.2"].iter().any(|v| version.contains(v))
}

/// Picks the binding strategy for this context.
pub fn select_vertex_bindings(
    attrib_binding: bool,
    vendor: &str,
    version: &str,
) -> Box<dyn VertexBindingCache> {
    if attrib_binding {
        Box::new(SeparateAttributeBindings::new(needs_same_name_rebind(vendor, version)))
    } else {
        Box::new(AttributePointerBindings::default())
    }
}

#[cfg(all(test, feature = "headless"))]
mod tests {
    use super::*;
    use crate::graphics::gl::headless::HeadlessDriver;
    use crate::graphics::gl::labeler::NoLabels;
    use kiln_core::renderer::api::pipeline::{VertexElement, VertexType, VertexUsage};

    fn position_color() -> VertexFormat {
        VertexFormat::new(vec![
            VertexElement::new("Position", VertexUsage::Position, VertexType::Float, 3),
            VertexElement::new("Color", VertexUsage::Color, VertexType::UByte, 4),
        ])
    }

    fn vertex_buffer(driver: &mut HeadlessDriver) -> GlName {
        let name = driver.create_buffer();
        driver.buffer_data(name, 64, None, super::super::consts::STATIC_DRAW);
        name
    }

    #[test]
    fn identical_formats_share_one_vertex_array() {
        let mut driver = HeadlessDriver::default();
        let buffer = vertex_buffer(&mut driver);
        let mut cache = SeparateAttributeBindings::new(false);
        cache.bind(&mut driver, &NoLabels, &position_color(), Some((BufferId(1), buffer)));
        cache.bind(&mut driver, &NoLabels, &position_color(), Some((BufferId(1), buffer)));
        assert_eq!(cache.len(), 1);
        assert_eq!(driver.call_count("create_vertex_array"), 1);
        assert_eq!(driver.call_count("bind_vertex_buffer"), 1);
    }

    #[test]
    fn recycled_name_is_unbound_first_when_required() {
        let mut driver = HeadlessDriver::default();
        let mut cache = SeparateAttributeBindings::new(true);
        let first = vertex_buffer(&mut driver);
        cache.bind(&mut driver, &NoLabels, &position_color(), Some((BufferId(1), first)));
        driver.delete_buffer(first);
        let second = vertex_buffer(&mut driver);
        assert_eq!(first, second);
        cache.bind(&mut driver, &NoLabels, &position_color(), Some((BufferId(2), second)));
        // Initial bind, the unbind, then the rebind.
        assert_eq!(driver.call_count("bind_vertex_buffer"), 3);
    }

    #[test]
    fn pointer_strategy_respecifies_on_buffer_change() {
        let mut driver = HeadlessDriver::default();
        let mut cache = AttributePointerBindings::default();
        let a = vertex_buffer(&mut driver);
        let b = vertex_buffer(&mut driver);
        cache.bind(&mut driver, &NoLabels, &position_color(), Some((BufferId(1), a)));
        cache.bind(&mut driver, &NoLabels, &position_color(), Some((BufferId(2), b)));
        assert_eq!(driver.call_count("vertex_attrib_pointer"), 4);
        assert_eq!(driver.get_error(), super::super::consts::NO_ERROR);
    }

    #[test]
    fn mesa_detection_matches_affected_versions() {
        assert!(needs_same_name_rebind("Mesa", "4.6 (Core Profile) Mesa 25.0.1"));
        assert!(!needs_same_name_rebind("Mesa", "4.6 (Core Profile) Mesa 25.1.0"));
        assert!(!needs_same_name_rebind("NVIDIA Corporation", "25.0.1"));
    }
}
