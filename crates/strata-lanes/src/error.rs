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

//! Error types of the lanes.

use strata_core::renderer::ResourceError;
use thiserror::Error;

/// Errors raised by the [`DepthPyramidCuller`](crate::render_lane::DepthPyramidCuller).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CullError {
    /// A GPU resource could not be created or accessed.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// An occlusion pass was requested before the pyramid exists.
    #[error("depth pyramid has not been created")]
    PyramidMissing,

    /// More instances were requested than the command buffer can hold.
    #[error("instance count {count} exceeds culler capacity {capacity}")]
    TooManyInstances {
        /// Requested instance count.
        count: u32,
        /// Capacity of the culler.
        capacity: u32,
    },

    /// The camera matrix cannot be inverted.
    #[error("camera view-projection matrix is singular")]
    DegenerateCamera,
}

/// Errors raised by render lanes and scene buffers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LaneError {
    /// A GPU resource could not be created or accessed.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// The culler rejected the work.
    #[error(transparent)]
    Cull(#[from] CullError),

    /// A pass resource the lane needs was not bound.
    #[error("lane '{lane}' expects resource '{name}'")]
    MissingResource {
        /// The lane.
        lane: &'static str,
        /// The missing resource.
        name: String,
    },

    /// The lane was rendered before `on_create`.
    #[error("lane '{0}' rendered before creation")]
    NotCreated(&'static str),

    /// A persistent buffer has no room left.
    #[error("{buffer} buffer full: {requested} requested, {available} available")]
    CapacityExceeded {
        /// Which buffer.
        buffer: &'static str,
        /// Elements requested.
        requested: u64,
        /// Elements still free.
        available: u64,
    },
}
