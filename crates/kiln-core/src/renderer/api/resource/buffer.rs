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

//! Defines data structures related to GPU buffer resources.

use crate::kiln_bitflags;

kiln_bitflags! {
    /// A set of flags describing the allowed usages of a [`BufferId`].
    ///
    /// Usage is fixed at creation. Every operation that depends on a usage
    /// (mapping, copying, binding) checks it before touching the driver.
    pub struct BufferUsage: u32 {
        /// The buffer can be mapped for reading on the CPU.
        const MAP_READ = 1 << 0;
        /// The buffer can be mapped for writing on the CPU.
        const MAP_WRITE = 1 << 1;
        /// Hint that the buffer is mostly written from the CPU.
        const HINT_CLIENT_STORAGE = 1 << 2;
        /// The buffer can be the destination of a copy or a CPU upload.
        const COPY_DST = 1 << 3;
        /// The buffer can be the source of a copy.
        const COPY_SRC = 1 << 4;
        /// The buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 5;
        /// The buffer can be bound as an index buffer.
        const INDEX = 1 << 6;
        /// The buffer can be bound as a uniform block.
        const UNIFORM = 1 << 7;
        /// The buffer can back a uniform texel buffer.
        const UNIFORM_TEXEL_BUFFER = 1 << 8;
    }
}

/// An opaque handle to a GPU buffer resource.
///
/// Handles are never reused by a device: a destroyed buffer's handle stays
/// invalid forever, so use-after-destroy is always detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub usize);

/// What a device knows about a live buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferInfo {
    /// The debug label given at creation.
    pub label: String,
    /// Size in bytes.
    pub size: u64,
    /// The usage flags given at creation.
    pub usage: BufferUsage,
}

/// A non-owning `(buffer, offset, length)` view of a buffer.
///
/// The range is not checked here; every operation consuming a slice checks
/// `offset + length <= size` against the live buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferSlice {
    /// The buffer this slice points into.
    pub buffer: BufferId,
    /// Start of the slice in bytes.
    pub offset: u64,
    /// Length of the slice in bytes.
    pub length: u64,
}

impl BufferSlice {
    /// Creates a slice of `length` bytes starting at `offset`.
    pub const fn new(buffer: BufferId, offset: u64, length: u64) -> Self {
        Self {
            buffer,
            offset,
            length,
        }
    }

    /// A slice covering a whole buffer of `size` bytes.
    pub const fn whole(buffer: BufferId, size: u64) -> Self {
        Self::new(buffer, 0, size)
    }

    /// One past the last byte, or `None` on overflow.
    pub const fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.length)
    }

    /// A sub-range of this slice, relative to its start.
    pub const fn slice(&self, offset: u64, length: u64) -> Self {
        Self::new(self.buffer, self.offset + offset, length)
    }

    /// `true` if the slice lies inside a buffer of `size` bytes.
    pub fn fits_in(&self, size: u64) -> bool {
        self.end().is_some_and(|end| end <= size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_bounds_are_checked_against_size() {
        let slice = BufferSlice::new(BufferId(1), 64, 64);
        assert!(slice.fits_in(128));
        assert!(!slice.fits_in(127));
        assert!(!BufferSlice::new(BufferId(1), u64::MAX, 2).fits_in(u64::MAX));
    }

    #[test]
    fn sub_slice_is_relative_to_parent() {
        let parent = BufferSlice::new(BufferId(3), 256, 512);
        let child = parent.slice(16, 32);
        assert_eq!(child, BufferSlice::new(BufferId(3), 272, 32));
    }
}
