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

//! Shared plumbing of the asynchronous streaming pipeline.
//!
//! Worker tasks never submit: they decode, build staging data and record a
//! transfer stream, then hand everything to the main thread as a
//! [`StreamingCommit`]. Sending the commit moves ownership, which is what
//! orders the worker's writes before the main thread's submit.

use crate::texture_agent::TextureMask;
use crossbeam_channel::{Receiver, Sender};
use std::path::PathBuf;
use std::sync::Arc;
use strata_core::renderer::api::MeshInfo;
use strata_core::renderer::{CommandStream, GpuTexture, GraphicsDevice, SubmissionQueue};
use strata_core::vfs::FileSystemService;
use strata_core::WorkerPool;
use strata_io::{ImportedScene, MemoryFileSystem};
use strata_lanes::scene_lane::SceneRange;

/// Handles a streaming task needs, cheap to clone into a worker job.
#[derive(Clone)]
pub struct StreamingContext {
    /// The device resources are created on.
    pub device: Arc<dyn GraphicsDevice>,
    /// Tagged mounts every read goes through.
    pub fs: Arc<FileSystemService>,
    /// The table mounted as `FsTag::Embedded`, fed with images found in scene files.
    pub embedded: Arc<MemoryFileSystem>,
    /// Decode and staging workers.
    pub workers: Arc<WorkerPool>,
    /// The queue uploads are recorded for.
    pub transfer: Arc<SubmissionQueue>,
}

impl std::fmt::Debug for StreamingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingContext")
            .field("workers", &self.workers)
            .field("embedded_files", &self.embedded.len())
            .finish()
    }
}

/// A decoded texture waiting for its upload to be submitted.
#[derive(Debug)]
pub struct TextureCommit {
    /// Pool slot reserved by `fetch`.
    pub slot: u32,
    /// Path the texture was read from.
    pub name: String,
    /// The destination texture.
    pub texture: GpuTexture,
    /// Recorded copy from the staging buffer.
    pub stream: CommandStream,
}

/// A scene whose buffers are staged and whose copies are recorded.
#[derive(Debug)]
pub struct SceneCommit {
    /// Path of the scene file.
    pub path: PathBuf,
    /// Ranges reserved in the scene buffers.
    pub range: SceneRange,
    /// Draw information of every sub-mesh, in file order.
    pub meshes: Vec<MeshInfo>,
    /// The node hierarchy; mesh and image data already went to the GPU.
    pub graph: ImportedScene,
    /// Texture slots the scene's materials depend on.
    pub textures: TextureMask,
    /// Recorded copies into the scene buffers.
    pub stream: CommandStream,
}

/// A unit of work published by a streaming task.
#[derive(Debug)]
pub enum StreamingCommit {
    /// A texture upload.
    Texture(TextureCommit),
    /// A scene upload.
    Scene(SceneCommit),
}

/// Creates the channel commits travel through.
pub fn commit_channel() -> (Sender<StreamingCommit>, Receiver<StreamingCommit>) {
    crossbeam_channel::unbounded()
}
