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

// Strata Sandbox
// Streams a generated grid of cubes and renders it headlessly.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_core::math::{Vec3, FRAC_PI_4};
use strata_core::renderer::api::Camera;
use strata_core::vfs::FsTag;
use strata_infra::SoftwareDevice;
use strata_sdk::{Engine, Services};

const CONFIG_PATH: &str = "sandbox/sandbox.ron";
const FRAMES: u64 = 240;
const REPORT_EVERY: u64 = 60;
const GRID: i32 = 8;
const SPACING: f32 = 3.0;

const CUBE_POSITIONS: [[f32; 3]; 8] = [
    [-0.5, -0.5, -0.5],
    [0.5, -0.5, -0.5],
    [0.5, 0.5, -0.5],
    [-0.5, 0.5, -0.5],
    [-0.5, -0.5, 0.5],
    [0.5, -0.5, 0.5],
    [0.5, 0.5, 0.5],
    [-0.5, 0.5, 0.5],
];

#[rustfmt::skip]
const CUBE_INDICES: [u16; 36] = [
    0, 2, 1, 0, 3, 2, // back
    4, 5, 6, 4, 6, 7, // front
    0, 1, 5, 0, 5, 4, // bottom
    3, 6, 2, 3, 7, 6, // top
    0, 4, 7, 0, 7, 3, // left
    1, 2, 6, 1, 6, 5, // right
];

/// A glTF document instancing one cube `GRID * GRID` times, and its buffer.
fn cube_grid() -> (String, Vec<u8>) {
    let mut bin: Vec<u8> = bytemuck::cast_slice(&CUBE_POSITIONS[..]).to_vec();
    bin.extend_from_slice(bytemuck::cast_slice(&CUBE_INDICES[..]));

    let half = (GRID - 1) as f32 * SPACING / 2.0;
    let nodes = (0..GRID * GRID)
        .map(|i| {
            let x = (i % GRID) as f32 * SPACING - half;
            let z = (i / GRID) as f32 * SPACING - half;
            format!(r#"{{ "name": "cube{i}", "mesh": 0, "translation": [{x}, 0, {z}] }}"#)
        })
        .collect::<Vec<_>>();
    let roots = (0..GRID * GRID)
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let document = format!(
        r#"{{
  "asset": {{ "version": "2.0", "generator": "strata sandbox" }},
  "scene": 0,
  "scenes": [{{ "nodes": [{roots}] }}],
  "nodes": [{nodes}],
  "materials": [{{ "name": "grey", "pbrMetallicRoughness": {{ "baseColorFactor": [0.6, 0.6, 0.6, 1] }} }}],
  "meshes": [{{ "name": "cube", "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "indices": 1, "material": 0 }}] }}],
  "buffers": [{{ "byteLength": {len}, "uri": "grid.bin" }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 96 }},
    {{ "buffer": 0, "byteOffset": 96, "byteLength": 72 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 8, "type": "VEC3", "min": [-0.5, -0.5, -0.5], "max": [0.5, 0.5, 0.5] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 36, "type": "SCALAR" }}
  ]
}}"#,
        nodes = nodes.join(",\n    "),
        len = bin.len(),
    );
    (document, bin)
}

fn orbit(frame: u64) -> Option<Camera> {
    let angle = frame as f32 * 0.02;
    let radius = GRID as f32 * SPACING;
    let eye = Vec3::new(radius * angle.cos(), radius * 0.4, radius * angle.sin());
    Camera::look_at(eye, Vec3::ZERO, FRAC_PI_4, 16.0 / 9.0, 0.1, 500.0)
}

fn run(config_path: &str) -> Result<()> {
    let config = strata_io::config::load_or_default(config_path)
        .with_context(|| format!("Failed to read '{config_path}'"))?;
    strata_sdk::logging::init(&config.log_level);

    let device = Arc::new(SoftwareDevice::default());
    let services = Services::new(device.clone(), &config)?;
    let (document, bin) = cube_grid();
    services.embedded.insert("grid.gltf", document.into_bytes());
    services.embedded.insert("grid.bin", bin);

    let mut engine = Engine::new(services, config)?;
    engine.load_scene("grid.gltf", FsTag::Embedded);
    for path in std::env::args().skip(2) {
        engine.load_scene(&path, FsTag::Assets);
    }

    let start = Instant::now();
    for frame in 0..FRAMES {
        engine.update()?;
        let Some(camera) = orbit(frame) else {
            continue;
        };
        engine.render(&camera)?;

        if frame % REPORT_EVERY == REPORT_EVERY - 1 {
            let stats = device.stats();
            log::info!(
                "Frame {}: {} instance(s), {} visible, {} draw(s), {:.1} MiB on the device.",
                frame + 1,
                engine.orchestrator().instance_count(),
                engine.orchestrator().visible_count()?,
                stats.indirect_draw_count,
                device.allocated_bytes() as f64 / (1024.0 * 1024.0)
            );
        }
        // Give the workers a chance before the scene is needed.
        if engine.scenes().is_empty() {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    let elapsed = start.elapsed();
    log::info!(
        "{FRAMES} frame(s) in {:.2?} ({:.1} fps), {} scene(s) streamed.",
        elapsed,
        FRAMES as f64 / elapsed.as_secs_f64(),
        engine.scenes().len()
    );
    engine.shutdown();
    Ok(())
}

fn main() {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| CONFIG_PATH.to_string());
    if let Err(e) = run(&config_path) {
        // The logger may not be up if the configuration failed to load.
        strata_sdk::logging::init("error");
        log::error!("{e:#}");
        std::process::exit(1);
    }
}
