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

//! A rotating set of host-mappable GPU buffers.
//!
//! The CPU writes into the current buffer while the GPU may still be reading
//! the ones used by previous frames:
//!
//! ```text
//! Frame N:     [#0: GPU reads]
//! Frame N+1:   [#1: CPU writes]  rotate()
//! Frame N+2:   [#2: CPU writes]  rotate()
//! Frame N+3:   [#0: CPU writes]  GPU finished with it
//! ```

use crate::renderer::{
    api::resource::{BufferId, BufferSlice, BufferUsage},
    error::GpuError,
    traits::GraphicsDevice,
};

/// Number of buffers in a ring.
pub const RING_BUFFER_COUNT: usize = 3;

/// A fixed set of equally sized buffers, one of which is current.
#[derive(Debug)]
pub struct RingBuffer {
    buffers: Vec<BufferId>,
    current: usize,
    size: u64,
    label: String,
}

impl RingBuffer {
    /// Creates [`RING_BUFFER_COUNT`] buffers of `size` bytes labelled `"{label} #{i}"`.
    ///
    /// # Errors
    ///
    /// Propagates the device error of the first failed creation; buffers
    /// created before it are destroyed.
    pub fn new(
        device: &dyn GraphicsDevice,
        label: &str,
        usage: BufferUsage,
        size: u64,
    ) -> Result<Self, GpuError> {
        let mut buffers = Vec::with_capacity(RING_BUFFER_COUNT);
        for i in 0..RING_BUFFER_COUNT {
            match device.create_buffer(&format!("{label} #{i}"), usage, size) {
                Ok(buffer) => buffers.push(buffer),
                Err(err) => {
                    for buffer in buffers {
                        if let Err(e) = device.destroy_buffer(buffer) {
                            log::warn!("RingBuffer({label}): Failed to destroy buffer: {e}");
                        }
                    }
                    return Err(err);
                }
            }
        }

        Ok(Self {
            buffers,
            current: 0,
            size,
            label: label.to_string(),
        })
    }

    /// The buffer to write this frame.
    pub fn current(&self) -> BufferId {
        self.buffers[self.current]
    }

    /// A slice of the current buffer.
    pub fn current_slice(&self, offset: u64, length: u64) -> BufferSlice {
        BufferSlice::new(self.current(), offset, length)
    }

    /// Size of each buffer in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Moves to the next buffer.
    pub fn rotate(&mut self) {
        self.current = (self.current + 1) % self.buffers.len();
    }

    /// Every buffer of the ring, current or not.
    pub fn buffers(&self) -> &[BufferId] {
        &self.buffers
    }

    /// Destroys every buffer of the ring.
    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        for buffer in &self.buffers {
            if let Err(e) = device.destroy_buffer(*buffer) {
                log::warn!("RingBuffer({}): Failed to destroy buffer: {}", self.label, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::mock::MockDevice;

    #[test]
    fn rotation_cycles_through_every_buffer() {
        let device = MockDevice::new();
        let mut ring = RingBuffer::new(&device, "Globals", BufferUsage::UNIFORM, 64).unwrap();
        let first = ring.current();
        let mut seen = vec![first];
        for _ in 1..RING_BUFFER_COUNT {
            ring.rotate();
            seen.push(ring.current());
        }
        ring.rotate();
        assert_eq!(ring.current(), first);
        seen.dedup();
        assert_eq!(seen.len(), RING_BUFFER_COUNT);
        assert_eq!(
            device.buffer_info(first).map(|info| info.label),
            Some("Globals #0".to_string())
        );
    }

    #[test]
    fn failed_creation_releases_earlier_buffers() {
        let device = MockDevice::new();
        device.fail_buffers_after(RING_BUFFER_COUNT - 1);
        let result = RingBuffer::new(&device, "Lighting", BufferUsage::UNIFORM, 32);
        assert!(matches!(result, Err(GpuError::OutOfMemory(_))));
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn destroy_releases_all_buffers() {
        let device = MockDevice::new();
        let ring = RingBuffer::new(&device, "Fog", BufferUsage::UNIFORM, 16).unwrap();
        assert_eq!(device.live_buffers(), RING_BUFFER_COUNT);
        ring.destroy(&device);
        assert_eq!(device.live_buffers(), 0);
    }
}
