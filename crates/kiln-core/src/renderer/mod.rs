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

//! Provides the public, backend-agnostic GPU contracts.
//!
//! This module defines the "common language" for every GPU operation: the
//! abstract `traits` (like [`GraphicsDevice`] and [`CommandEncoder`]), the data
//! structures describing resources and pipelines, and the error types.
//!
//! The 'how' is handled by a concrete backend in the `kiln-infra` crate,
//! which implements these traits on top of a stateful driver. Higher-level
//! helpers in this module ([`DynamicUniformAllocator`], [`ShaderLoader`],
//! [`PostEffectProcessor`]) only ever talk to the traits.

pub mod api;
pub mod error;
pub mod post;
pub mod shader;
pub mod traits;

#[cfg(test)]
pub(crate) mod mock;

pub use self::api::*;
pub use self::error::{GpuError, LoadError, ShaderError};
pub use self::post::{PostEffectPipeline, PostEffectProcessor};
pub use self::shader::ShaderLoader;
pub use self::traits::{
    CommandEncoder, CompiledRenderPipeline, GpuFence, GpuQuery, GraphicsDevice, MappedView,
    RenderPass, ShaderSourceResolver,
};
