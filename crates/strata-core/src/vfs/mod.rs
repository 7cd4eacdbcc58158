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

//! Tagged virtual mount points.
//!
//! Every read in the engine goes through a [`FileSystemService`], addressed by
//! an [`FsTag`] and a path relative to that mount. The backing storage is a
//! [`FileSystem`] implementation: a directory on disk, an in-memory table of
//! images extracted from a scene file, and so on. Concrete backends live in
//! `strata-io`.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

/// Identifies a mount point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FsTag {
    /// The working directory.
    Default,
    /// Writable cache directory.
    Cache,
    /// Read-only asset root.
    Assets,
    /// Resources embedded inside a scene file.
    Embedded,
}

/// Errors raised by [`FileSystemService`].
#[derive(Debug)]
pub enum VfsError {
    /// No file system is mounted under the tag.
    NotMounted(FsTag),
    /// The file does not exist on the mount.
    NotFound {
        /// Mount the lookup went through.
        tag: FsTag,
        /// Requested path.
        path: PathBuf,
    },
    /// The backend failed to read the file.
    Io(std::io::Error),
}

impl fmt::Display for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VfsError::NotMounted(tag) => write!(f, "No file system mounted for {tag:?}"),
            VfsError::NotFound { tag, path } => {
                write!(f, "File '{}' not found on {tag:?}", path.display())
            }
            VfsError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for VfsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VfsError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for VfsError {
    fn from(e: std::io::Error) -> Self {
        VfsError::Io(e)
    }
}

/// A storage backend mounted under an [`FsTag`].
pub trait FileSystem: Send + Sync + fmt::Debug {
    /// Reads the whole file at `path`.
    fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>>;

    /// Returns `true` if `path` names an existing file.
    fn exists(&self, path: &Path) -> bool;

    /// Lists the files under `path`, optionally recursing into directories.
    fn enumerate(&self, path: &Path, recursive: bool) -> Vec<PathBuf>;

    /// Last modification time, when the backend tracks one.
    fn last_write_time(&self, path: &Path) -> Option<SystemTime>;

    /// A lowercase format hint for `path`, by default its extension.
    fn format_hint(&self, path: &Path) -> String {
        format_hint(path)
    }
}

/// Lowercase extension of `path` without the dot, or an empty string.
pub fn format_hint(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// The process-wide registry of mounted file systems.
#[derive(Debug, Default)]
pub struct FileSystemService {
    mounts: RwLock<HashMap<FsTag, Arc<dyn FileSystem>>>,
}

impl FileSystemService {
    /// Creates a service with nothing mounted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts `fs` under `tag`, replacing any previous mount.
    pub fn mount(&self, tag: FsTag, fs: Arc<dyn FileSystem>) {
        log::debug!("Mounting {fs:?} as {tag:?}");
        self.mounts.write().unwrap().insert(tag, fs);
    }

    /// Removes the mount for `tag`, returning it.
    pub fn unmount(&self, tag: FsTag) -> Option<Arc<dyn FileSystem>> {
        self.mounts.write().unwrap().remove(&tag)
    }

    /// Returns the file system mounted under `tag`.
    pub fn get(&self, tag: FsTag) -> Option<Arc<dyn FileSystem>> {
        self.mounts.read().unwrap().get(&tag).cloned()
    }

    /// Returns `true` if something is mounted under `tag`.
    pub fn is_mounted(&self, tag: FsTag) -> bool {
        self.mounts.read().unwrap().contains_key(&tag)
    }

    /// Reads `path` from the mount `tag`.
    ///
    /// ## Errors
    /// [`VfsError::NotMounted`], [`VfsError::NotFound`] or [`VfsError::Io`].
    pub fn read_file(&self, tag: FsTag, path: impl AsRef<Path>) -> Result<Vec<u8>, VfsError> {
        let path = path.as_ref();
        let fs = self.get(tag).ok_or(VfsError::NotMounted(tag))?;
        if !fs.exists(path) {
            return Err(VfsError::NotFound {
                tag,
                path: path.to_path_buf(),
            });
        }
        Ok(fs.read_file(path)?)
    }

    /// Returns `true` if `path` exists on the mount `tag`.
    pub fn exists(&self, tag: FsTag, path: impl AsRef<Path>) -> bool {
        self.get(tag)
            .map(|fs| fs.exists(path.as_ref()))
            .unwrap_or(false)
    }

    /// Lists files under `path` on the mount `tag`; empty when not mounted.
    pub fn enumerate(&self, tag: FsTag, path: impl AsRef<Path>, recursive: bool) -> Vec<PathBuf> {
        self.get(tag)
            .map(|fs| fs.enumerate(path.as_ref(), recursive))
            .unwrap_or_default()
    }

    /// Last modification time of `path` on the mount `tag`.
    pub fn last_write_time(&self, tag: FsTag, path: impl AsRef<Path>) -> Option<SystemTime> {
        self.get(tag)
            .and_then(|fs| fs.last_write_time(path.as_ref()))
    }

    /// Format hint for `path` as reported by the mount `tag`.
    pub fn format_hint(&self, tag: FsTag, path: impl AsRef<Path>) -> String {
        match self.get(tag) {
            Some(fs) => fs.format_hint(path.as_ref()),
            None => format_hint(path.as_ref()),
        }
    }
}
