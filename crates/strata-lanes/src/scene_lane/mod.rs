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

//! Scene lane: persistent GPU storage for streamed geometry and instances.

mod instance_buffer;
mod scene_buffers;
mod staging;

pub use instance_buffer::InstanceBuffer;
pub use scene_buffers::{SceneBuffers, SceneRange, VertexStream};
pub use staging::{mesh_infos, SceneStaging, SceneStream, StagedRegion};
