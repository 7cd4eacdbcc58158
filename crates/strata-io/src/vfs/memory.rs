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

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;
use strata_core::vfs::{format_hint, FileSystem};

#[derive(Debug, Clone)]
struct MemoryFile {
    data: Vec<u8>,
    hint: String,
    modified: SystemTime,
}

/// An in-memory table of files.
///
/// Used for resources embedded in a scene file: the entries have no
/// meaningful extension, so each one carries its own format hint.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: RwLock<BTreeMap<PathBuf, MemoryFile>>,
}

impl MemoryFileSystem {
    /// Creates an empty file system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `data` under `path`, with the format hint derived from the extension.
    pub fn insert(&self, path: impl Into<PathBuf>, data: Vec<u8>) {
        let path = path.into();
        let hint = format_hint(&path);
        self.insert_with_hint(path, data, hint);
    }

    /// Stores `data` under `path` with an explicit format hint.
    pub fn insert_with_hint(&self, path: impl Into<PathBuf>, data: Vec<u8>, hint: impl Into<String>) {
        let path = path.into();
        log::trace!("Memory file '{}' stored ({} bytes).", path.display(), data.len());
        self.files.write().unwrap().insert(
            path,
            MemoryFile {
                data,
                hint: hint.into().to_ascii_lowercase(),
                modified: SystemTime::now(),
            },
        );
    }

    /// Removes `path`, returning `true` if it existed.
    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        self.files.write().unwrap().remove(path.as_ref()).is_some()
    }

    /// Removes every file under `prefix`.
    pub fn remove_prefix(&self, prefix: impl AsRef<Path>) -> usize {
        let prefix = prefix.as_ref();
        let mut files = self.files.write().unwrap();
        let before = files.len();
        files.retain(|path, _| !path.starts_with(prefix));
        before - files.len()
    }

    /// Number of stored files.
    pub fn len(&self) -> usize {
        self.files.read().unwrap().len()
    }

    /// Returns `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        self.files
            .read()
            .unwrap()
            .get(path)
            .map(|f| f.data.clone())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("'{}' is not in memory", path.display()),
                )
            })
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.read().unwrap().contains_key(path)
    }

    fn enumerate(&self, path: &Path, recursive: bool) -> Vec<PathBuf> {
        self.files
            .read()
            .unwrap()
            .keys()
            .filter(|p| {
                if recursive {
                    p.starts_with(path)
                } else {
                    p.parent().unwrap_or(Path::new("")) == path
                }
            })
            .cloned()
            .collect()
    }

    fn last_write_time(&self, path: &Path) -> Option<SystemTime> {
        self.files.read().unwrap().get(path).map(|f| f.modified)
    }

    fn format_hint(&self, path: &Path) -> String {
        self.files
            .read()
            .unwrap()
            .get(path)
            .map(|f| f.hint.clone())
            .unwrap_or_else(|| format_hint(path))
    }
}
