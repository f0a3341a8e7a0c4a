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

//! A bump allocator for per-draw uniform values.

use super::RingBuffer;
use crate::renderer::{
    api::resource::{BufferSlice, BufferUsage},
    error::GpuError,
    traits::GraphicsDevice,
};
use std::sync::Arc;

/// Hands out aligned slices for values of one uniform type within a frame.
///
/// Values are written one block after the other into the current buffer of a
/// [`RingBuffer`]. When the ring is full the capacity doubles and a new ring is
/// allocated; the old one is kept in [`old_buffers`](Self::old_buffers) until
/// the next [`clear`](Self::clear), so slices handed out earlier in the frame
/// stay valid. Writing the same value twice in a row reuses the previous slice.
///
/// # Example
///
/// ```ignore
/// let mut transforms = DynamicUniformAllocator::<Transform>::new(device, "Transforms", 64)?;
///
/// // Per draw:
/// let slice = transforms.write(&transform)?;
/// pass.set_uniform("Transform", slice)?;
///
/// // Per frame:
/// transforms.clear();
/// ```
pub struct DynamicUniformAllocator<T: bytemuck::Pod + PartialEq> {
    device: Arc<dyn GraphicsDevice>,
    label: String,
    ring: RingBuffer,
    old_buffers: Vec<RingBuffer>,
    block_size: u64,
    capacity: u64,
    size: u64,
    last_value: Option<T>,
}

impl<T: bytemuck::Pod + PartialEq> DynamicUniformAllocator<T> {
    /// Creates an allocator with room for at least `initial_capacity` values.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        label: impl Into<String>,
        initial_capacity: u64,
    ) -> Result<Self, GpuError> {
        let label = label.into();
        let alignment = device.uniform_offset_alignment().max(1);
        let value_size = (std::mem::size_of::<T>() as u64).max(1);
        let block_size = value_size.div_ceil(alignment) * alignment;
        let capacity = initial_capacity.max(1).next_power_of_two();
        let ring = Self::allocate(device.as_ref(), &label, block_size * capacity)?;

        Ok(Self {
            device,
            label,
            ring,
            old_buffers: Vec::new(),
            block_size,
            capacity,
            size: 0,
            last_value: None,
        })
    }

    fn allocate(
        device: &dyn GraphicsDevice,
        label: &str,
        size: u64,
    ) -> Result<RingBuffer, GpuError> {
        RingBuffer::new(
            device,
            label,
            BufferUsage::UNIFORM | BufferUsage::MAP_WRITE,
            size,
        )
    }

    fn resize(&mut self, capacity: u64) -> Result<(), GpuError> {
        let ring = Self::allocate(
            self.device.as_ref(),
            &self.label,
            self.block_size * capacity,
        )?;
        log::debug!(
            "DynamicUniformAllocator({}): growing from {} to {} blocks",
            self.label,
            self.capacity,
            capacity
        );
        self.old_buffers.push(std::mem::replace(&mut self.ring, ring));
        self.capacity = capacity;
        self.size = 0;
        self.last_value = None;
        Ok(())
    }

    fn block(&self, index: u64) -> BufferSlice {
        self.ring.current_slice(index * self.block_size, self.block_size)
    }

    /// Writes `value` into the next block and returns its slice.
    ///
    /// A value equal to the previous one is not written again: the previous
    /// slice is returned instead. Writing maps the ring, so no render pass
    /// may be open on the device.
    pub fn write(&mut self, value: &T) -> Result<BufferSlice, GpuError> {
        if self.size > 0 && self.last_value.as_ref() == Some(value) {
            return Ok(self.block(self.size - 1));
        }
        if self.size >= self.capacity {
            self.resize(self.capacity * 2)?;
        }

        let slice = self.block(self.size);
        {
            let mut encoder = self.device.create_command_encoder();
            let mut view = encoder.map_buffer(slice, false, true)?;
            let bytes = bytemuck::bytes_of(value);
            view.data_mut()[..bytes.len()].copy_from_slice(bytes);
        }
        self.size += 1;
        self.last_value = Some(*value);
        Ok(slice)
    }

    /// Writes every value with a single map and returns one slice per value.
    ///
    /// Like [`Self::write`], this must happen before the pass that reads the
    /// slices is opened.
    pub fn write_all(&mut self, values: &[T]) -> Result<Vec<BufferSlice>, GpuError> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let count = values.len() as u64;
        if self.size + count > self.capacity {
            self.resize((self.capacity + 1).max(count).next_power_of_two())?;
        }

        let first = self.size;
        let whole = self
            .ring
            .current_slice(first * self.block_size, count * self.block_size);
        {
            let mut encoder = self.device.create_command_encoder();
            let mut view = encoder.map_buffer(whole, false, true)?;
            let data = view.data_mut();
            for (i, value) in values.iter().enumerate() {
                let start = i * self.block_size as usize;
                let bytes = bytemuck::bytes_of(value);
                data[start..start + bytes.len()].copy_from_slice(bytes);
            }
        }
        self.size += count;
        self.last_value = None;
        Ok((first..first + count).map(|i| self.block(i)).collect())
    }

    /// Starts a new frame: rewinds, rotates the ring and destroys retired rings.
    pub fn clear(&mut self) {
        self.size = 0;
        self.last_value = None;
        self.ring.rotate();
        for ring in self.old_buffers.drain(..) {
            ring.destroy(self.device.as_ref());
        }
    }

    /// Destroys the current ring and every retired one.
    pub fn destroy(mut self) {
        self.ring.destroy(self.device.as_ref());
        for ring in self.old_buffers.drain(..) {
            ring.destroy(self.device.as_ref());
        }
    }

    /// Rings retired by growth during this frame.
    pub fn old_buffers(&self) -> &[RingBuffer] {
        &self.old_buffers
    }

    /// Size of one block: the value size rounded up to the uniform alignment.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Number of blocks in the current ring buffer.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of blocks written since the last growth or clear.
    pub fn len(&self) -> u64 {
        self.size
    }

    /// `true` if nothing was written since the last growth or clear.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}
