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

//! Asynchronous scene streaming.
//!
//! A load runs in three phases:
//!
//! 1. A worker imports the file, reserves ranges in the scene buffers,
//!    requests the material textures and records the transfer copies.
//! 2. [`SceneStreamer::update`] submits what the workers published.
//! 3. [`SceneStreamer::poll_update`] releases a scene once its copies and
//!    every texture it depends on have finished.

mod streamer;

pub use streamer::{InstanceDesc, LoadedScene, SceneStreamer};
