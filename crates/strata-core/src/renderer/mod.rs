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

//! Provides the public, backend-agnostic rendering contracts.
//!
//! This module defines the common language for all GPU work: the
//! [`GraphicsDevice`] trait a backend implements, the descriptors and
//! recorded commands it consumes, the shared-ownership resource handles,
//! and the [`SubmissionQueue`] / [`CommandStream`] pair that turns recorded
//! work into timeline-ordered submissions. Concrete backends live in
//! `strata-infra`; `strata-lanes` and `strata-agents` only see these types.

pub mod api;
pub mod error;
pub mod resource;
pub mod submission;
pub mod traits;

pub use self::api::*;
pub use self::error::{KernelError, PipelineError, RenderError, ResourceError, SubmissionError};
pub use self::resource::{
    ComputePipeline, GpuBuffer, GpuSampler, GpuTexture, RenderPipeline, TrackedResource,
};
pub use self::submission::{Binding, ColorTarget, CommandStream, DepthTarget, SubmissionQueue};
pub use self::traits::GraphicsDevice;
