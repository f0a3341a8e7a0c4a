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

//! Backend-agnostic GPU API.
//!
//! Organized into several logical sub-modules:
//!
//! - **[`resource`]**: GPU handles (buffers, textures, views, samplers) and their descriptors.
//! - **[`pipeline`]**: Render pipeline descriptions, vertex formats and shader defines.
//! - **[`command`]**: Render pass descriptors, draw objects and synchronization results.
//! - **[`uniform`]**: Ring buffers, the dynamic uniform allocator and std140 packing.
//! - **[`util`]**: Shared enums (formats, shader stages, index widths).

pub mod command;
pub mod pipeline;
pub mod resource;
pub mod uniform;
pub mod util;

pub use self::command::*;
pub use self::pipeline::*;
pub use self::resource::*;
pub use self::uniform::*;
pub use self::util::*;
