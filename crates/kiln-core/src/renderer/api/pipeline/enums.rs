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

//! Fixed-function state enums used by render pipelines.

/// The depth comparison of a pipeline, or no depth test at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthTestFunction {
    /// Depth testing is disabled.
    NoDepthTest,
    /// Passes if the new depth equals the stored one.
    Equal,
    /// Passes if the new depth is less than or equal to the stored one.
    #[default]
    LessEqual,
    /// Passes if the new depth is strictly less than the stored one.
    Less,
    /// Passes if the new depth is strictly greater than the stored one.
    Greater,
}

/// The rasterization mode for polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PolygonMode {
    /// Polygons are filled.
    #[default]
    Fill,
    /// Polygons are drawn as outlines.
    Wireframe,
}

/// A logical operation applied to the color output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LogicOp {
    /// No logic op.
    #[default]
    None,
    /// `source | !destination`.
    OrReverse,
}

/// A blend factor applied to the source or destination term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// `0`.
    Zero,
    /// `1`.
    One,
    /// Source color.
    SrcColor,
    /// `1 - source color`.
    OneMinusSrcColor,
    /// Source alpha.
    SrcAlpha,
    /// `1 - source alpha`.
    OneMinusSrcAlpha,
    /// Destination color.
    DstColor,
    /// `1 - destination color`.
    OneMinusDstColor,
    /// Destination alpha.
    DstAlpha,
    /// `1 - destination alpha`.
    OneMinusDstAlpha,
}

/// Separate color and alpha blend factors for additive blending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendFunction {
    /// Factor for the source color.
    pub source_color: BlendFactor,
    /// Factor for the destination color.
    pub dest_color: BlendFactor,
    /// Factor for the source alpha.
    pub source_alpha: BlendFactor,
    /// Factor for the destination alpha.
    pub dest_alpha: BlendFactor,
}

impl BlendFunction {
    /// Classic premultiplied-free alpha blending.
    pub const TRANSLUCENT: Self = Self {
        source_color: BlendFactor::SrcAlpha,
        dest_color: BlendFactor::OneMinusSrcAlpha,
        source_alpha: BlendFactor::One,
        dest_alpha: BlendFactor::OneMinusSrcAlpha,
    };

    /// Additive blending.
    pub const ADDITIVE: Self = Self {
        source_color: BlendFactor::One,
        dest_color: BlendFactor::One,
        source_alpha: BlendFactor::One,
        dest_alpha: BlendFactor::One,
    };
}

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Each vertex is a point.
    Points,
    /// Each pair of vertices is a line.
    Lines,
    /// A connected line strip.
    LineStrip,
    /// Each triple of vertices is a triangle.
    #[default]
    Triangles,
    /// A connected triangle strip.
    TriangleStrip,
    /// A triangle fan around the first vertex.
    TriangleFan,
}
