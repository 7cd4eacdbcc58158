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

//! Decides what a frame renders and in which order.
//!
//! A frame is described as data by a [`RenderGraphDesc`]: named resources
//! and passes, each pass naming the lane that records it. The
//! [`LaneRegistry`] turns lane keys into lanes, the [`RenderGraph`] orders
//! the passes and inserts the barriers between them, and the
//! [`RenderOrchestrator`] feeds it the instances, the camera and the culler
//! every frame.

mod desc;
mod graph;
mod orchestrator;
mod registry;

pub use desc::{BindingDesc, PassDesc, RenderGraphDesc, ResourceDesc, ResourceKind, TextureSize};
pub use graph::{FrameInputs, PassHandle, RenderGraph, ResourceHandle};
pub use orchestrator::RenderOrchestrator;
pub use registry::LaneRegistry;
