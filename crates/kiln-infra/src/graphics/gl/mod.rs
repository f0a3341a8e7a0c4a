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


//! OpenGL implementation of the `kiln-core` device contracts.
//!
//! [`GlBackend`] talks to the driver exclusively through the [`GlDriver`]
//! seam. The `headless` feature provides [`HeadlessDriver`], an in-memory
//! driver that runs the whole backend without a context.

pub mod buffer_storage;
pub mod capabilities;
pub mod command;
pub mod consts;
pub mod conversions;
pub mod device;
pub mod driver;
#[cfg(feature = "headless")]
pub mod headless;
pub mod labeler;
pub mod program;
pub mod vertex_binding;

pub use capabilities::{GlBackendConfig, GlCapabilities};
pub use command::{GlCommandEncoder, GlFence, GlMappedView, GlRenderPass, GlTimerQuery};
pub use device::{GlBackend, GlCompiledPipeline};
pub use driver::{GlDriver, GlName};
#[cfg(feature = "headless")]
pub use headless::{HeadlessConfig, HeadlessDriver};
