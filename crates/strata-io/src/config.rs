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

//! Loading and saving [`EngineConfig`] as RON.

use crate::error::IoError;
use std::path::Path;
use strata_core::config::EngineConfig;
use strata_core::vfs::{FileSystemService, FsTag};

/// Parses a configuration from RON text. Missing fields take their defaults.
pub fn from_str(text: &str) -> Result<EngineConfig, IoError> {
    Ok(ron::from_str(text)?)
}

/// Reads a configuration from a file on disk.
///
/// ## Errors
/// Returns [`IoError::Io`] when the file cannot be read and
/// [`IoError::ConfigParse`] when it is not valid RON.
pub fn load(path: impl AsRef<Path>) -> Result<EngineConfig, IoError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let config = ron::de::from_bytes(&bytes)?;
    log::info!("Loaded engine configuration from '{}'.", path.display());
    Ok(config)
}

/// Reads a configuration through a mounted file system.
pub fn load_from(
    fs: &FileSystemService,
    tag: FsTag,
    path: impl AsRef<Path>,
) -> Result<EngineConfig, IoError> {
    let bytes = fs.read_file(tag, path)?;
    Ok(ron::de::from_bytes(&bytes)?)
}

/// Loads `path` when it exists, otherwise falls back to the defaults.
///
/// A file that exists but does not parse is still an error.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<EngineConfig, IoError> {
    let path = path.as_ref();
    if path.is_file() {
        load(path)
    } else {
        log::info!(
            "No configuration at '{}', using defaults.",
            path.display()
        );
        Ok(EngineConfig::default())
    }
}

/// Renders a configuration as pretty RON.
pub fn to_string(config: &EngineConfig) -> Result<String, IoError> {
    let pretty = ron::ser::PrettyConfig::default().indentor("  ".to_string());
    Ok(ron::ser::to_string_pretty(config, pretty)?)
}

/// Writes a configuration to disk as pretty RON.
pub fn save(config: &EngineConfig, path: impl AsRef<Path>) -> Result<(), IoError> {
    std::fs::write(path, to_string(config)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_fill_in_defaults() {
        let config = from_str("(workers: 3, streaming: (cross_queue_wait: true))").unwrap();
        assert_eq!(config.workers, 3);
        assert!(config.streaming.cross_queue_wait);
        assert_eq!(config.window, EngineConfig::default().window);
    }

    #[test]
    fn saved_configuration_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.ron");
        let mut config = EngineConfig::default();
        config.scene_buffers.max_instances = 512;
        config.log_level = "debug".into();

        save(&config, &path).unwrap();
        assert_eq!(load(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_uses_defaults_but_bad_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.ron");
        assert_eq!(load_or_default(&missing).unwrap(), EngineConfig::default());

        let broken = dir.path().join("broken.ron");
        std::fs::write(&broken, "(workers: )").unwrap();
        assert!(matches!(
            load_or_default(&broken),
            Err(IoError::ConfigParse(_))
        ));
    }
}
