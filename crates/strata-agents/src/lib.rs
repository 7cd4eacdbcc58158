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

//! # Strata Agents
//!
//! The tactical layer between the engine loop and the lanes:
//!
//! - [`texture_agent`] hands out bindless texture slots and uploads decoded
//!   images on the transfer queue.
//! - [`scene_agent`] imports scenes on worker threads and splices them into
//!   the persistent scene buffers once their uploads have finished.
//! - [`render_agent`] builds the render graph and drives it every frame.

#![warn(missing_docs)]

pub mod render_agent;
pub mod scene_agent;
pub mod streaming;
pub mod texture_agent;

pub use render_agent::{LaneRegistry, RenderGraph, RenderGraphDesc, RenderOrchestrator};
pub use scene_agent::{InstanceDesc, LoadedScene, SceneStreamer};
pub use streaming::{StreamingCommit, StreamingContext};
pub use texture_agent::{TextureMask, TexturePool};
