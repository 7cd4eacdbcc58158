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

//! Error types of the I/O layer.

use strata_core::vfs::VfsError;
use thiserror::Error;

/// Errors raised while reading configuration or decoding images.
#[derive(Error, Debug)]
pub enum IoError {
    /// The virtual file system could not provide the file.
    #[error(transparent)]
    Vfs(#[from] VfsError),

    /// A direct file access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A RON document could not be parsed.
    #[error("invalid configuration: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    /// A value could not be written as RON.
    #[error("failed to serialize configuration: {0}")]
    ConfigWrite(#[from] ron::Error),

    /// The image decoder rejected the data.
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    /// No decoder handles this format hint.
    #[error("unsupported image format '{0}'")]
    UnsupportedImage(String),
}

/// Errors raised while importing a scene file.
#[derive(Error, Debug)]
pub enum ImportError {
    /// The glTF document is malformed.
    #[error("failed to parse glTF: {0}")]
    Parse(#[from] gltf::Error),

    /// A buffer could not be loaded.
    #[error("buffer {index} unavailable: {reason}")]
    Buffer {
        /// Index of the buffer in the document.
        index: usize,
        /// What went wrong.
        reason: String,
    },

    /// A `data:` URI is malformed or uses an unknown encoding.
    #[error("unsupported data URI '{0}'")]
    DataUri(String),

    /// A base64 payload could not be decoded.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A primitive has no positions.
    #[error("mesh '{mesh}' has no POSITION attribute")]
    MissingPositions {
        /// Name of the offending mesh.
        mesh: String,
    },

    /// An external resource could not be read.
    #[error(transparent)]
    Vfs(#[from] VfsError),
}
