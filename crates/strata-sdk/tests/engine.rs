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

//! The engine loop on the software device.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use strata_core::config::{EngineConfig, SceneBufferConfig, WindowConfig};
use strata_core::math::{Extent2D, Vec3, FRAC_PI_2};
use strata_core::renderer::api::{Camera, QueueKind};
use strata_core::vfs::FsTag;
use strata_infra::{SoftwareDevice, SubmitMode};
use strata_sdk::{Engine, Services};

/// `triangle.gltf` holds one triangle at the origin, without materials;
/// `pair.gltf` places the same mesh twice.
fn write_triangles(dir: &Path) {
    let positions: [[f32; 3]; 3] = [[-0.5, -0.5, 0.0], [0.5, -0.5, 0.0], [0.0, 0.5, 0.0]];
    let mut bin = Vec::new();
    positions.iter().flatten().for_each(|f| bin.extend(f.to_le_bytes()));
    std::fs::write(dir.join("triangle.bin"), &bin).unwrap();
    let gltf = |roots: &str, nodes: &str| {
        format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scenes": [{{ "nodes": {roots} }}],
  "nodes": {nodes},
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }} }}] }}],
  "buffers": [{{ "byteLength": {len}, "uri": "triangle.bin" }}],
  "bufferViews": [{{ "buffer": 0, "byteLength": {len} }}],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [-0.5, -0.5, 0], "max": [0.5, 0.5, 0] }}
  ]
}}"#,
            len = bin.len()
        )
    };
    std::fs::write(
        dir.join("triangle.gltf"),
        gltf("[0]", r#"[{ "name": "triangle", "mesh": 0 }]"#),
    )
    .unwrap();
    std::fs::write(
        dir.join("pair.gltf"),
        gltf(
            "[0, 1]",
            r#"[{ "name": "left", "mesh": 0, "translation": [-1, 0, 0] },
                { "name": "right", "mesh": 0, "translation": [1, 0, 0] }]"#,
        ),
    )
    .unwrap();
}

fn config(dir: &Path, cross_queue_wait: bool) -> EngineConfig {
    let mut config = EngineConfig {
        window: WindowConfig {
            width: 32,
            height: 32,
            resizable: false,
        },
        workers: 2,
        asset_root: dir.to_path_buf(),
        cache_root: dir.join("cache"),
        scene_buffers: SceneBufferConfig {
            max_meshes: 16,
            max_buffer_bytes: 4096,
            max_materials: 16,
            max_instances: 16,
        },
        ..Default::default()
    };
    config.streaming.cross_queue_wait = cross_queue_wait;
    config
}

fn camera() -> Camera {
    Camera::look_at(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, FRAC_PI_2, 1.0, 0.1, 100.0).unwrap()
}

fn engine(mode: SubmitMode, cross_queue_wait: bool) -> (Engine, Arc<SoftwareDevice>, tempfile::TempDir) {
    engine_with(mode, |config| config.streaming.cross_queue_wait = cross_queue_wait)
}

fn engine_with(
    mode: SubmitMode,
    adjust: impl FnOnce(&mut EngineConfig),
) -> (Engine, Arc<SoftwareDevice>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    write_triangles(dir.path());
    let soft = Arc::new(SoftwareDevice::new(mode));
    let mut config = config(dir.path(), false);
    adjust(&mut config);
    let services = Services::new(soft.clone(), &config).unwrap();
    (Engine::new(services, config).unwrap(), soft, dir)
}

#[test]
fn streamed_scenes_are_rendered() {
    let (mut engine, soft, _dir) = engine(SubmitMode::Immediate, false);
    assert!(engine.load_scene("triangle.gltf", FsTag::Assets));
    assert!(engine.services().workers.wait_idle(Duration::from_secs(10)));

    assert_eq!(engine.update().unwrap(), 1);
    assert_eq!(engine.scenes().len(), 1);
    assert_eq!(engine.orchestrator().instance_count(), 1);

    engine.render(&camera()).unwrap();
    assert_eq!(engine.orchestrator().visible_count().unwrap(), 1);
    assert_eq!(soft.stats().indirect_draw_count, 1);

    // Nothing new: the next update splices nothing.
    assert_eq!(engine.update().unwrap(), 0);
}

#[test]
fn frames_wait_for_uploads_when_asked() {
    let (mut engine, soft, _dir) = engine(SubmitMode::Deferred, true);
    assert!(engine.load_scene("triangle.gltf", FsTag::Assets));
    assert!(engine.services().workers.wait_idle(Duration::from_secs(10)));

    // The upload is submitted but the transfer queue has not run.
    assert_eq!(engine.update().unwrap(), 0);
    let frame = engine.render(&camera()).unwrap();
    assert_eq!(soft.execute_pending(QueueKind::Graphics, usize::MAX), 0);
    assert!(!engine.services().graphics.poll(frame));

    soft.flush();
    assert!(engine.services().graphics.poll(frame));
    assert_eq!(engine.update().unwrap(), 1);
}

#[test]
fn oversized_scenes_are_not_spliced_partially() {
    let (mut engine, _soft, _dir) = engine_with(SubmitMode::Immediate, |config| {
        config.scene_buffers.max_instances = 1;
    });
    assert!(engine.load_scene("pair.gltf", FsTag::Assets));
    assert!(engine.services().workers.wait_idle(Duration::from_secs(10)));

    let err = engine.update().unwrap_err();
    assert!(format!("{err:#}").contains("pair.gltf"));
    assert_eq!(engine.orchestrator().instance_count(), 0);
    assert!(engine.scenes().is_empty());

    // A scene that fits still goes in.
    assert!(engine.load_scene("triangle.gltf", FsTag::Assets));
    assert!(engine.services().workers.wait_idle(Duration::from_secs(10)));
    assert_eq!(engine.update().unwrap(), 1);
    assert_eq!(engine.orchestrator().instance_count(), 1);
    assert_eq!(engine.orchestrator().free_instance_slots(), 0);
}

#[test]
fn resize_and_shutdown() {
    let (mut engine, _soft, _dir) = engine(SubmitMode::Immediate, false);
    engine.resize(Extent2D::new(64, 16)).unwrap();
    assert_eq!(engine.orchestrator().graph().extent(), Extent2D::new(64, 16));
    engine.render(&camera()).unwrap();

    engine.shutdown();
    engine.shutdown();
    assert_eq!(engine.services().graphics.in_flight_count(), 0);
}

#[test]
fn unknown_scene_formats_are_refused() {
    let (engine, _soft, _dir) = engine(SubmitMode::Immediate, false);
    assert!(!engine.load_scene("triangle.fbx", FsTag::Assets));
}
