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

//! Defines the hierarchy of error types for the rendering subsystem.

use crate::renderer::api::QueueKind;
use std::fmt;

/// An error raised while running a host compute kernel.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelError {
    /// The kernel received fewer resources than it binds, or one of the wrong kind.
    BindingMismatch {
        /// Position of the offending resource.
        index: usize,
        /// What the kernel expected at that position.
        expected: &'static str,
    },
    /// The push constant block has the wrong size.
    InvalidPushConstants {
        /// Size the kernel expects in bytes.
        expected: usize,
        /// Size that was recorded.
        actual: usize,
    },
    /// The kernel failed for another reason.
    Execution(String),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::BindingMismatch { index, expected } => {
                write!(f, "Kernel binding {index} mismatch: expected {expected}")
            }
            KernelError::InvalidPushConstants { expected, actual } => write!(
                f,
                "Invalid push constants: expected {expected} bytes, got {actual}"
            ),
            KernelError::Execution(msg) => write!(f, "Kernel execution failed: {msg}"),
        }
    }
}

impl std::error::Error for KernelError {}

/// An error related to the creation of a compute or render pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The shader source could not be turned into a pipeline.
    InvalidShader {
        /// The label of the pipeline being created.
        label: Option<String>,
        /// Details from the backend.
        details: String,
    },
    /// The entry point is empty or unknown.
    MissingEntryPoint {
        /// The label of the pipeline being created.
        label: Option<String>,
    },
    /// A required feature is not supported by the device.
    FeatureNotSupported(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InvalidShader { label, details } => write!(
                f,
                "Invalid shader for pipeline '{}': {details}",
                label.as_deref().unwrap_or("Unknown")
            ),
            PipelineError::MissingEntryPoint { label } => write!(
                f,
                "Missing entry point for pipeline '{}'",
                label.as_deref().unwrap_or("Unknown")
            ),
            PipelineError::FeatureNotSupported(msg) => {
                write!(f, "Feature not supported: {msg}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// An error related to the creation or use of a GPU resource (buffers, textures, etc.).
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// A pipeline-specific error occurred.
    Pipeline(PipelineError),
    /// A host kernel failed while executing a dispatch.
    Kernel(KernelError),
    /// A generic resource could not be found.
    NotFound,
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// The resource was used in a way its usage flags do not allow.
    InvalidUsage(String),
    /// An attempt was made to access a resource out of its bounds
    /// (a byte range of a buffer or a mip level of a texture).
    OutOfBounds,
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
            ResourceError::Kernel(err) => write!(f, "Compute dispatch error: {err}"),
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::InvalidUsage(msg) => write!(f, "Invalid resource usage: {msg}"),
            ResourceError::OutOfBounds => write!(f, "Resource access out of bounds."),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Pipeline(err) => Some(err),
            ResourceError::Kernel(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

impl From<KernelError> for ResourceError {
    fn from(err: KernelError) -> Self {
        ResourceError::Kernel(err)
    }
}

/// An error raised while handing command streams to a queue.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionError {
    /// `submit` was called without any stream.
    EmptySubmission,
    /// A stream recorded for one queue was submitted to another.
    QueueMismatch {
        /// Queue the stream was acquired from.
        stream: QueueKind,
        /// Queue it was submitted to.
        queue: QueueKind,
    },
    /// A blocking wait gave up before the work finished.
    Timeout,
    /// The device rejected or failed to execute the work.
    Device(ResourceError),
}

impl fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionError::EmptySubmission => write!(f, "Submission contains no stream."),
            SubmissionError::QueueMismatch { stream, queue } => write!(
                f,
                "Stream recorded for the {stream:?} queue submitted to the {queue:?} queue"
            ),
            SubmissionError::Timeout => write!(f, "Timed out waiting for submitted work."),
            SubmissionError::Device(err) => write!(f, "Device submission failed: {err}"),
        }
    }
}

impl std::error::Error for SubmissionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SubmissionError::Device(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for SubmissionError {
    fn from(err: ResourceError) -> Self {
        SubmissionError::Device(err)
    }
}

/// A high-level error that can occur within the render loop.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// An operation was attempted before the renderer was initialized.
    NotInitialized,
    /// A critical rendering operation failed.
    RenderingFailed(String),
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
    /// Work could not be submitted.
    SubmissionError(SubmissionError),
    /// The graphics device was lost.
    DeviceLost,
    /// An unexpected or internal error occurred.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotInitialized => write!(f, "The renderer is not initialized."),
            RenderError::RenderingFailed(msg) => {
                write!(f, "A critical rendering operation failed: {msg}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::SubmissionError(err) => write!(f, "Queue submission failed: {err}"),
            RenderError::DeviceLost => write!(f, "The graphics device was lost."),
            RenderError::Internal(msg) => {
                write!(f, "An internal or unexpected error occurred: {msg}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            RenderError::SubmissionError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

impl From<SubmissionError> for RenderError {
    fn from(err: SubmissionError) -> Self {
        RenderError::SubmissionError(err)
    }
}

impl From<PipelineError> for RenderError {
    fn from(err: PipelineError) -> Self {
        RenderError::ResourceError(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn kernel_error_display() {
        let err = KernelError::InvalidPushConstants {
            expected: 16,
            actual: 4,
        };
        assert_eq!(
            format!("{err}"),
            "Invalid push constants: expected 16 bytes, got 4"
        );
    }

    #[test]
    fn resource_error_wraps_kernel_error() {
        let res_err: ResourceError = KernelError::BindingMismatch {
            index: 2,
            expected: "storage image",
        }
        .into();
        assert_eq!(
            format!("{res_err}"),
            "Compute dispatch error: Kernel binding 2 mismatch: expected storage image"
        );
        assert!(res_err.source().is_some());
    }

    #[test]
    fn render_error_chain() {
        let sub: SubmissionError = ResourceError::OutOfBounds.into();
        let render: RenderError = sub.into();
        assert_eq!(
            format!("{render}"),
            "Queue submission failed: Device submission failed: Resource access out of bounds."
        );
        assert!(render.source().unwrap().source().is_some());
    }

    #[test]
    fn queue_mismatch_names_both_queues() {
        let err = SubmissionError::QueueMismatch {
            stream: QueueKind::Transfer,
            queue: QueueKind::Graphics,
        };
        let text = err.to_string();
        assert!(text.contains("Transfer") && text.contains("Graphics"));
    }
}
