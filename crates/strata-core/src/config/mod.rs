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

//! Engine configuration.
//!
//! The types here only describe settings; parsing them from a file is done by
//! `strata-io`. Every field has a default so a partial file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Window and swapchain settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Initial width in pixels.
    pub width: u32,
    /// Initial height in pixels.
    pub height: u32,
    /// Whether the window may be resized.
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            resizable: true,
        }
    }
}

/// Capacities of the persistent scene buffers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneBufferConfig {
    /// Maximum number of sub-meshes (meshlets).
    pub max_meshes: u32,
    /// Size in bytes of each vertex-attribute and index buffer.
    pub max_buffer_bytes: u64,
    /// Maximum number of materials.
    pub max_materials: u32,
    /// Maximum number of instances.
    pub max_instances: u32,
}

impl Default for SceneBufferConfig {
    fn default() -> Self {
        Self {
            max_meshes: 2048,
            max_buffer_bytes: 64 * 1024 * 1024,
            max_materials: 2048,
            max_instances: 131_072,
        }
    }
}

/// Asynchronous streaming settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// When set, the graphics queue also waits on the transfer timeline for
    /// the most recently spliced upload, in addition to the CPU-side gate.
    pub cross_queue_wait: bool,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window settings.
    pub window: WindowConfig,
    /// Present with vertical sync.
    pub vsync: bool,
    /// Multisample count for the color target.
    pub msaa: u32,
    /// Enables validation and debug labels.
    pub debug: bool,
    /// Worker threads for decode and staging; 0 picks from the CPU count.
    pub workers: usize,
    /// Directory mounted as the asset root.
    pub asset_root: PathBuf,
    /// Directory mounted as the cache.
    pub cache_root: PathBuf,
    /// Scene buffer capacities.
    pub scene_buffers: SceneBufferConfig,
    /// Streaming settings.
    pub streaming: StreamingConfig,
    /// Default log filter when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            vsync: true,
            msaa: 1,
            debug: cfg!(debug_assertions),
            workers: 0,
            asset_root: PathBuf::from("assets"),
            cache_root: PathBuf::from(".cache"),
            scene_buffers: SceneBufferConfig::default(),
            streaming: StreamingConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Worker thread count after resolving `0` to the available parallelism.
    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1).max(1))
            .unwrap_or(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_scene_limits() {
        let config = EngineConfig::default();
        assert_eq!(config.scene_buffers.max_meshes, 2048);
        assert_eq!(config.scene_buffers.max_buffer_bytes, 64 * 1024 * 1024);
        assert!(!config.streaming.cross_queue_wait);
        assert_eq!(config.window.width, 1280);
    }

    #[test]
    fn explicit_worker_count_wins() {
        let config = EngineConfig {
            workers: 3,
            ..Default::default()
        };
        assert_eq!(config.resolved_workers(), 3);
        assert!(EngineConfig::default().resolved_workers() >= 1);
    }
}
