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

//! Vertex formats: the ordered list of attributes stored in a vertex buffer.

/// The scalar type of a vertex attribute component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexType {
    /// 32-bit float.
    Float,
    /// 8-bit unsigned integer.
    UByte,
    /// 8-bit signed integer.
    Byte,
    /// 16-bit unsigned integer.
    UShort,
    /// 16-bit signed integer.
    Short,
    /// 32-bit unsigned integer.
    UInt,
    /// 32-bit signed integer.
    Int,
}

impl VertexType {
    /// Size of one component in bytes.
    pub const fn size(&self) -> u32 {
        match self {
            VertexType::UByte | VertexType::Byte => 1,
            VertexType::UShort | VertexType::Short => 2,
            VertexType::Float | VertexType::UInt | VertexType::Int => 4,
        }
    }
}

/// What an attribute means to the shader, which decides how it is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexUsage {
    /// Position.
    Position,
    /// Packed normal, fetched normalized.
    Normal,
    /// Packed color, fetched normalized.
    Color,
    /// Texture coordinates.
    Uv,
    /// Anything else.
    Generic,
}

/// How the shader sees an attribute's components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeFetch {
    /// Fetched as floats without normalization.
    Float,
    /// Fetched as integers.
    Integer,
    /// Fetched as floats normalized to `[0, 1]` or `[-1, 1]`.
    Normalized,
}

/// A single attribute of a vertex format.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexElement {
    /// Attribute name in the vertex shader.
    pub name: String,
    /// Meaning of the attribute.
    pub usage: VertexUsage,
    /// Component type.
    pub ty: VertexType,
    /// Number of components (1 to 4).
    pub count: u32,
}

impl VertexElement {
    /// Creates an element.
    pub fn new(name: impl Into<String>, usage: VertexUsage, ty: VertexType, count: u32) -> Self {
        Self {
            name: name.into(),
            usage,
            ty,
            count,
        }
    }

    /// Size of the whole attribute in bytes.
    pub const fn size(&self) -> u32 {
        self.ty.size() * self.count
    }

    /// How the driver should expose this attribute to the shader.
    pub fn fetch(&self) -> AttributeFetch {
        match self.usage {
            VertexUsage::Normal | VertexUsage::Color => AttributeFetch::Normalized,
            VertexUsage::Position | VertexUsage::Uv | VertexUsage::Generic => {
                if self.ty == VertexType::Float {
                    AttributeFetch::Float
                } else {
                    AttributeFetch::Integer
                }
            }
        }
    }
}

/// An ordered, tightly packed list of vertex attributes.
///
/// Formats are compared and hashed by value, so two independently built but
/// identical formats share driver-side binding state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexFormat {
    elements: Vec<VertexElement>,
}

impl VertexFormat {
    /// A format without attributes, for draws that generate vertices in the shader.
    pub const fn empty() -> Self {
        Self {
            elements: Vec::new(),
        }
    }

    /// Builds a format from its elements, in attribute-location order.
    pub fn new(elements: Vec<VertexElement>) -> Self {
        Self { elements }
    }

    /// The elements, in attribute-location order.
    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }

    /// `true` if the format declares no attributes.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Byte offset of the element at `index`.
    pub fn offset_of(&self, index: usize) -> u32 {
        self.elements.iter().take(index).map(VertexElement::size).sum()
    }

    /// The stride of one vertex in bytes.
    pub fn vertex_size(&self) -> u32 {
        self.elements.iter().map(VertexElement::size).sum()
    }

    /// Attribute names in location order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(|e| e.name.as_str())
    }
}
