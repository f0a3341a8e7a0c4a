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

//! Per-frame uniform storage: rotating buffers, a bump allocator over them,
//! and std140 packing.

mod dynamic_uniform;
mod ring_buffer;
mod std140;

pub use self::dynamic_uniform::DynamicUniformAllocator;
pub use self::ring_buffer::{RingBuffer, RING_BUFFER_COUNT};
pub use self::std140::{Std140SizeCalculator, Std140Writer};
