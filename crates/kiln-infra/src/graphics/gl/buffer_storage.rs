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

//! How buffer stores are allocated: immutable storage when available,
//! mutable storage with a usage hint otherwise.

use super::consts::{self as gl, GLenum};
use super::driver::{GlDriver, GlName};
use kiln_core::renderer::api::resource::BufferUsage;

/// Allocates the store of a freshly created buffer object.
pub trait BufferStorage: Send {
    /// Allocates `size` bytes, initialized from `data` when given.
    fn allocate(
        &self,
        driver: &mut dyn GlDriver,
        buffer: GlName,
        usage: BufferUsage,
        size: u64,
        data: Option<&[u8]>,
    );

    /// `true` when stores cannot be reallocated.
    fn is_immutable(&self) -> bool;
}

/// `glBufferStorage` with flags derived from the usage.
#[derive(Debug, Default)]
pub struct ImmutableStorage;

impl ImmutableStorage {
    pub(crate) fn flags(usage: BufferUsage) -> GLenum {
        let mut flags = 0;
        if usage.contains(BufferUsage::MAP_READ) {
            flags |= gl::MAP_PERSISTENT_BIT | gl::MAP_READ_BIT;
        }
        if usage.contains(BufferUsage::MAP_WRITE) {
            flags |= gl::MAP_PERSISTENT_BIT | gl::MAP_WRITE_BIT;
        }
        if usage.contains(BufferUsage::COPY_DST) {
            flags |= gl::DYNAMIC_STORAGE_BIT;
        }
        if usage.contains(BufferUsage::HINT_CLIENT_STORAGE) {
            flags |= gl::CLIENT_STORAGE_BIT;
        }
        flags
    }
}

impl BufferStorage for ImmutableStorage {
    fn allocate(
        &self,
        driver: &mut dyn GlDriver,
        buffer: GlName,
        usage: BufferUsage,
        size: u64,
        data: Option<&[u8]>,
    ) {
        driver.buffer_storage(buffer, size, data, Self::flags(usage));
    }

    fn is_immutable(&self) -> bool {
        true
    }
}

/// `glBufferData` with a usage hint.
#[derive(Debug, Default)]
pub struct MutableStorage;

impl MutableStorage {
    pub(crate) fn hint(usage: BufferUsage) -> GLenum {
        let client = usage.contains(BufferUsage::HINT_CLIENT_STORAGE);
        if usage.contains(BufferUsage::MAP_WRITE) {
            if client {
                gl::STREAM_DRAW
            } else {
                gl::STATIC_DRAW
            }
        } else if usage.contains(BufferUsage::MAP_READ) {
            if client {
                gl::STREAM_READ
            } else {
                gl::STATIC_READ
            }
        } else {
            gl::STATIC_DRAW
        }
    }
}

impl BufferStorage for MutableStorage {
    fn allocate(
        &self,
        driver: &mut dyn GlDriver,
        buffer: GlName,
        usage: BufferUsage,
        size: u64,
        data: Option<&[u8]>,
    ) {
        driver.buffer_data(buffer, size, data, Self::hint(usage));
    }

    fn is_immutable(&self) -> bool {
        false
    }
}

/// Picks the storage strategy for this context.
pub fn select_storage(buffer_storage: bool) -> Box<dyn BufferStorage> {
    if buffer_storage {
        Box::new(ImmutableStorage)
    } else {
        Box::new(MutableStorage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immutable_flags_follow_usage() {
        let flags = ImmutableStorage::flags(BufferUsage::MAP_READ | BufferUsage::COPY_DST);
        assert_eq!(
            flags,
            gl::MAP_PERSISTENT_BIT | gl::MAP_READ_BIT | gl::DYNAMIC_STORAGE_BIT
        );
        assert_eq!(ImmutableStorage::flags(BufferUsage::VERTEX), 0);
        assert_ne!(
            ImmutableStorage::flags(BufferUsage::HINT_CLIENT_STORAGE) & gl::CLIENT_STORAGE_BIT,
            0
        );
    }

    #[test]
    fn mutable_hint_prefers_stream_for_client_storage() {
        let usage = BufferUsage::MAP_WRITE | BufferUsage::HINT_CLIENT_STORAGE;
        assert_eq!(MutableStorage::hint(usage), gl::STREAM_DRAW);
        assert_eq!(MutableStorage::hint(BufferUsage::MAP_READ), gl::STATIC_READ);
        assert_eq!(MutableStorage::hint(BufferUsage::UNIFORM), gl::STATIC_DRAW);
    }
}
