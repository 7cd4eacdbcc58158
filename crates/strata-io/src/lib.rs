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

//! # Strata IO
//!
//! Everything that touches bytes on their way into the engine: the concrete
//! [`FileSystem`](strata_core::vfs::FileSystem) backends, RON configuration
//! files, image decoding and glTF scene import.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod image_loader;
pub mod scene;
pub mod vfs;

pub use error::{ImportError, IoError};
pub use image_loader::{CpuImage, ImageLoader};
pub use scene::{
    EmbeddedImage, ImageRef, ImportedMaterial, ImportedMesh, ImportedNode, ImportedScene,
    SceneImporter,
};
pub use vfs::{MemoryFileSystem, StdFileSystem};
