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

//! # Strata Lanes
//!
//! The hot paths of the renderer. Lanes are small, deterministic pipelines
//! driven by the agents one level up:
//!
//! - [`scene_lane`] owns the persistent GPU scene buffers, the instance
//!   buffer and the staging layout used to splice streamed scenes into them.
//! - [`render_lane`] holds the [`RenderLane`](render_lane::RenderLane) trait,
//!   the [`DepthPyramidCuller`](render_lane::DepthPyramidCuller) and the four
//!   passes of a frame: depth prepass, depth pyramid, instance culling and
//!   the indirect draw.

#![warn(missing_docs)]

pub mod error;
pub mod render_lane;
pub mod scene_lane;

pub use error::{CullError, LaneError};
