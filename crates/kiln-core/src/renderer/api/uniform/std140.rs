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

//! std140 layout: sizes and packing of uniform block members.

fn align_to(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

/// Computes the std140 size of a sequence of members without writing them.
#[derive(Debug, Default, Clone, Copy)]
pub struct Std140SizeCalculator {
    size: usize,
}

impl Std140SizeCalculator {
    /// An empty block.
    pub fn new() -> Self {
        Self::default()
    }

    fn member(&mut self, alignment: usize, size: usize) -> &mut Self {
        self.size = align_to(self.size, alignment) + size;
        self
    }

    /// A 4-byte scalar.
    pub fn put_scalar(&mut self) -> &mut Self {
        self.member(4, 4)
    }

    /// A `vec2`/`ivec2`.
    pub fn put_vec2(&mut self) -> &mut Self {
        self.member(8, 8)
    }

    /// A `vec3`/`ivec3`.
    pub fn put_vec3(&mut self) -> &mut Self {
        self.member(16, 12)
    }

    /// A `vec4`/`ivec4`.
    pub fn put_vec4(&mut self) -> &mut Self {
        self.member(16, 16)
    }

    /// A `mat4`.
    pub fn put_mat4(&mut self) -> &mut Self {
        self.member(16, 64)
    }

    /// The block size so far, padded to the 16-byte base alignment.
    pub fn get(&self) -> usize {
        align_to(self.size, 16)
    }
}

/// Packs uniform block members following std140 alignment rules.
#[derive(Debug, Default, Clone)]
pub struct Std140Writer {
    bytes: Vec<u8>,
}

impl Std140Writer {
    /// An empty block.
    pub fn new() -> Self {
        Self::default()
    }

    fn align(&mut self, alignment: usize) {
        let padded = align_to(self.bytes.len(), alignment);
        self.bytes.resize(padded, 0);
    }

    fn put(&mut self, alignment: usize, data: &[u8]) -> &mut Self {
        self.align(alignment);
        self.bytes.extend_from_slice(data);
        self
    }

    /// Writes a `float`.
    pub fn put_float(&mut self, value: f32) -> &mut Self {
        self.put(4, bytemuck::bytes_of(&value))
    }

    /// Writes an `int`.
    pub fn put_int(&mut self, value: i32) -> &mut Self {
        self.put(4, bytemuck::bytes_of(&value))
    }

    /// Writes a `vec2`.
    pub fn put_vec2(&mut self, value: [f32; 2]) -> &mut Self {
        self.put(8, bytemuck::cast_slice(&value))
    }

    /// Writes a `vec3`.
    pub fn put_vec3(&mut self, value: [f32; 3]) -> &mut Self {
        self.put(16, bytemuck::cast_slice(&value))
    }

    /// Writes an `ivec3`.
    pub fn put_ivec3(&mut self, value: [i32; 3]) -> &mut Self {
        self.put(16, bytemuck::cast_slice(&value))
    }

    /// Writes a `vec4`.
    pub fn put_vec4(&mut self, value: [f32; 4]) -> &mut Self {
        self.put(16, bytemuck::cast_slice(&value))
    }

    /// Writes a column-major `mat4`.
    pub fn put_mat4(&mut self, value: [f32; 16]) -> &mut Self {
        self.put(16, bytemuck::cast_slice(&value))
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// `true` if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The packed block, padded to the 16-byte base alignment.
    pub fn finish(mut self) -> Vec<u8> {
        self.align(16);
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec3_is_aligned_to_sixteen_bytes() {
        let mut writer = Std140Writer::new();
        writer.put_float(1.0).put_vec3([1.0, 2.0, 3.0]).put_float(4.0);
        // float at 0, vec3 at 16..28, float at 28.
        assert_eq!(writer.len(), 32);
        let bytes = writer.finish();
        assert_eq!(bytemuck::pod_read_unaligned::<f32>(&bytes[28..32]), 4.0);
        assert_eq!(bytemuck::pod_read_unaligned::<f32>(&bytes[16..20]), 1.0);
    }

    #[test]
    fn calculator_agrees_with_writer() {
        let mut calc = Std140SizeCalculator::new();
        calc.put_vec2().put_vec2().put_scalar().put_mat4();
        let mut writer = Std140Writer::new();
        writer
            .put_vec2([1.0, 1.0])
            .put_vec2([2.0, 2.0])
            .put_int(3)
            .put_mat4([0.0; 16]);
        assert_eq!(calc.get(), writer.finish().len());
        assert_eq!(calc.get(), 96);
    }
}
