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

//! The engine loop: streaming, retirement and rendering on the main thread.

use crate::services::Services;
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use strata_agents::render_agent::RenderOrchestrator;
use strata_agents::scene_agent::{LoadedScene, SceneStreamer};
use strata_agents::streaming::commit_channel;
use strata_agents::texture_agent::TexturePool;
use strata_core::config::EngineConfig;
use strata_core::math::Extent2D;
use strata_core::renderer::api::Camera;
use strata_core::vfs::FsTag;
use strata_lanes::scene_lane::SceneBuffers;

/// How long [`Engine::shutdown`] waits for in-flight worker jobs.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the services, the streaming pipeline and the renderer.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    services: Services,
    textures: Arc<TexturePool>,
    streamer: SceneStreamer,
    orchestrator: RenderOrchestrator,
    scenes: Vec<LoadedScene>,
    upload_waited: u64,
    shut_down: bool,
}

impl Engine {
    /// Creates the scene buffers, the texture pool and the GPU-driven frame.
    ///
    /// ## Errors
    /// Fails when a GPU allocation fails or the render graph does not compile.
    pub fn new(services: Services, config: EngineConfig) -> Result<Self> {
        let scene = Arc::new(
            SceneBuffers::new(&services.device, &config.scene_buffers)
                .context("Failed to create the scene buffers")?,
        );
        let (commits, receiver) = commit_channel();
        let context = services.streaming_context();
        let textures = Arc::new(TexturePool::new(context.clone(), commits.clone())?);
        let streamer = SceneStreamer::new(
            context,
            Arc::clone(&textures),
            Arc::clone(&scene),
            (commits, receiver),
        );

        let extent = Extent2D::new(config.window.width, config.window.height);
        let orchestrator =
            RenderOrchestrator::gpu_driven(Arc::clone(&services.graphics), scene, extent)?
                .with_cross_queue_wait(config.streaming.cross_queue_wait);

        log::info!(
            "Engine initialized: {}x{} viewport, {} instance(s) max.",
            extent.width,
            extent.height,
            config.scene_buffers.max_instances
        );
        Ok(Self {
            config,
            services,
            textures,
            streamer,
            orchestrator,
            scenes: Vec::new(),
            upload_waited: 0,
            shut_down: false,
        })
    }

    /// Starts streaming the scene at `path` on the mount `tag`.
    ///
    /// Returns `false` when the file is not a scene format.
    pub fn load_scene(&self, path: impl AsRef<Path>, tag: FsTag) -> bool {
        self.streamer.load_scene(path, tag)
    }

    /// Runs the once-per-frame bookkeeping.
    ///
    /// Submits what the workers published, retires every queue, hands the
    /// transfer completions to the texture pool, then splices every scene
    /// that became ready into the renderer. Returns how many were spliced.
    ///
    /// ## Errors
    /// Fails when a scene does not fit the instance buffer. That scene is
    /// dropped without adding any of its instances; scenes still pending
    /// are spliced by later calls.
    pub fn update(&mut self) -> Result<usize> {
        self.streamer.update();

        let last_upload = self.streamer.last_scene_submission();
        if self.config.streaming.cross_queue_wait && last_upload > self.upload_waited {
            self.orchestrator
                .wait_for_upload(self.services.transfer.semaphore(last_upload));
            self.upload_waited = last_upload;
        }

        self.services.retire_all();
        for event in self.services.events.drain() {
            self.textures.receive(&event);
        }

        let mut spliced = 0;
        while let Some(scene) = self.streamer.poll_update() {
            let instances: Vec<_> = scene
                .instances
                .iter()
                .filter_map(|instance| match scene.mesh(instance.mesh_id) {
                    Some(mesh) => Some((instance, mesh)),
                    None => {
                        log::warn!(
                            "Instance {:?} of {} names unknown mesh {}.",
                            instance.name,
                            scene.path.display(),
                            instance.mesh_id
                        );
                        None
                    }
                })
                .collect();

            // A scene is spliced whole or not at all.
            let free = self.orchestrator.free_instance_slots();
            if instances.len() > free as usize {
                bail!(
                    "Splicing {}: {} instance(s) requested, {free} slot(s) free",
                    scene.path.display(),
                    instances.len()
                );
            }
            for (instance, mesh) in instances {
                self.orchestrator
                    .add_instance(instance.transform, instance.mesh_id, mesh)
                    .with_context(|| format!("Splicing {}", scene.path.display()))?;
            }
            self.scenes.push(scene);
            spliced += 1;
        }
        Ok(spliced)
    }

    /// Renders one frame. Returns its graphics submission id.
    ///
    /// ## Errors
    /// Fails when the frame cannot be recorded or submitted.
    pub fn render(&mut self, camera: &Camera) -> Result<u64> {
        self.orchestrator.render_frame(camera)
    }

    /// Adapts the renderer to a new viewport size.
    ///
    /// ## Errors
    /// Fails when a reallocation fails.
    pub fn resize(&mut self, extent: Extent2D) -> Result<()> {
        self.orchestrator.resize(extent)
    }

    /// Waits for outstanding work and retires every queue. Idempotent; also
    /// runs on drop.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        log::info!("Shutting down after {} frame(s)...", self.orchestrator.frame_count());
        self.services.wait_idle(SHUTDOWN_TIMEOUT);
        // Commits published during the wait still hold GPU handles.
        self.streamer.update();
        self.services.transfer.wait_idle();
        self.services.retire_all();
        self.services.events.drain();
        log::info!("Engine shut down.");
    }

    /// Scenes spliced so far.
    pub fn scenes(&self) -> &[LoadedScene] {
        &self.scenes
    }

    /// The renderer.
    pub fn orchestrator(&self) -> &RenderOrchestrator {
        &self.orchestrator
    }

    /// The renderer, for instance patches.
    pub fn orchestrator_mut(&mut self) -> &mut RenderOrchestrator {
        &mut self.orchestrator
    }

    /// The texture pool.
    pub fn textures(&self) -> &Arc<TexturePool> {
        &self.textures
    }

    /// The shared services.
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
