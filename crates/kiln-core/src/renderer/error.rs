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

//! Defines the hierarchy of error types for the GPU layer.

use crate::renderer::api::util::ShaderStage;
use std::fmt;

/// An error produced while compiling a shader stage or linking a program.
///
/// These never escape a draw call: the pipeline that hit them is cached as
/// invalid and its draws are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    /// The source resolver had no text for this shader.
    SourceNotFound {
        /// Logical id of the shader.
        id: String,
        /// The stage that was requested.
        stage: ShaderStage,
    },
    /// The driver rejected the stage source.
    CompilationFailed {
        /// Logical id of the shader.
        id: String,
        /// The stage that failed.
        stage: ShaderStage,
        /// The trimmed driver info log.
        log: String,
    },
    /// The program failed to link.
    LinkFailed {
        /// Logical id of the vertex shader.
        vertex: String,
        /// Logical id of the fragment shader.
        fragment: String,
        /// The driver info log.
        log: String,
    },
    /// A pipeline could not be built because one of its stages is invalid.
    InvalidStage {
        /// Location of the pipeline.
        pipeline: String,
        /// The stage that was invalid.
        stage: ShaderStage,
        /// Logical id of that stage's shader.
        id: String,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::SourceNotFound { id, stage } => {
                write!(f, "Couldn't find source for {stage} shader ({id})")
            }
            ShaderError::CompilationFailed { id, stage, log } => {
                write!(f, "Couldn't compile {stage} shader ({id}): {log}")
            }
            ShaderError::LinkFailed {
                vertex,
                fragment,
                log,
            } => write!(
                f,
                "Error encountered when linking program containing VS {vertex} and FS {fragment}. Log output: {log}"
            ),
            ShaderError::InvalidStage {
                pipeline,
                stage,
                id,
            } => write!(
                f,
                "Couldn't compile pipeline {pipeline}: {stage} shader {id} was invalid"
            ),
        }
    }
}

impl std::error::Error for ShaderError {}

/// The error taxonomy of every device and encoder operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// The caller passed out-of-range or inconsistent parameters.
    InvalidArgument(String),
    /// The operation is not allowed in the current state (e.g. a render pass is open).
    InvalidState(String),
    /// The driver could not allocate memory for the resource.
    OutOfMemory(String),
    /// Any other driver failure, including synchronization failures.
    DeviceError(String),
    /// A shader stage or program failed to build.
    Shader(ShaderError),
    /// The request falls outside what this layer supports (e.g. layered attachments).
    UnsupportedOperation(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            GpuError::InvalidState(msg) => write!(f, "Invalid state: {msg}"),
            GpuError::OutOfMemory(msg) => write!(f, "Out of GPU memory: {msg}"),
            GpuError::DeviceError(msg) => write!(f, "Device error: {msg}"),
            GpuError::Shader(err) => write!(f, "Shader error: {err}"),
            GpuError::UnsupportedOperation(msg) => write!(f, "Unsupported operation: {msg}"),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::Shader(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for GpuError {
    fn from(err: ShaderError) -> Self {
        GpuError::Shader(err)
    }
}

/// An error raised by the shader reload cycle or while building a post effect.
#[derive(Debug)]
pub enum LoadError {
    /// One or more required pipelines failed to compile during a reload.
    RequiredPrograms(Vec<String>),
    /// No post-effect description is registered under this id.
    UnknownPostChain(String),
    /// The post effect references targets that the caller does not provide.
    MissingExternalTargets(Vec<String>),
    /// A fixed texture input could not be resolved.
    MissingTexture(String),
    /// A post-effect description is malformed.
    InvalidDescription {
        /// Id of the description.
        id: String,
        /// What was wrong with it.
        details: String,
    },
    /// The background preparation task did not complete.
    Prepare(String),
    /// A device operation failed while building GPU objects.
    Gpu(GpuError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::RequiredPrograms(ids) => {
                f.write_str("Failed to load required shader programs:")?;
                for id in ids {
                    write!(f, "\n - {id}")?;
                }
                Ok(())
            }
            LoadError::UnknownPostChain(id) => {
                write!(f, "Could not find post chain with id: {id}")
            }
            LoadError::MissingExternalTargets(targets) => write!(
                f,
                "Referenced external targets are not available in this context: [{}]",
                targets.join(", ")
            ),
            LoadError::MissingTexture(location) => {
                write!(f, "Missing texture for post effect input: {location}")
            }
            LoadError::InvalidDescription { id, details } => {
                write!(f, "Invalid post effect description '{id}': {details}")
            }
            LoadError::Prepare(msg) => write!(f, "Shader preparation failed: {msg}"),
            LoadError::Gpu(err) => write!(f, "GPU operation failed while loading: {err}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Gpu(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GpuError> for LoadError {
    fn from(err: GpuError) -> Self {
        LoadError::Gpu(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::CompilationFailed {
            id: "core/terrain".to_string(),
            stage: ShaderStage::Fragment,
            log: "0:12: syntax error".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Couldn't compile fragment shader (core/terrain): 0:12: syntax error"
        );
    }

    #[test]
    fn gpu_error_wrapping_shader_error_has_source() {
        let err: GpuError = ShaderError::SourceNotFound {
            id: "core/sky".to_string(),
            stage: ShaderStage::Vertex,
        }
        .into();
        assert_eq!(
            format!("{err}"),
            "Shader error: Couldn't find source for vertex shader (core/sky)"
        );
        assert!(err.source().is_some());
        assert!(GpuError::InvalidState("pass open".into()).source().is_none());
    }

    #[test]
    fn required_programs_lists_every_id() {
        let err = LoadError::RequiredPrograms(vec!["a/one".into(), "b/two".into()]);
        assert_eq!(
            format!("{err}"),
            "Failed to load required shader programs:\n - a/one\n - b/two"
        );
    }

    #[test]
    fn load_error_wraps_gpu_error() {
        let err: LoadError = GpuError::OutOfMemory("buffer of 64".into()).into();
        assert!(err.source().is_some());
        assert_eq!(
            format!("{err}"),
            "GPU operation failed while loading: Out of GPU memory: buffer of 64"
        );
    }
}
