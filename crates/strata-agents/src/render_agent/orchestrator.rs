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

//! Owns the frame: instance data, the culler and the render graph.

use super::desc::RenderGraphDesc;
use super::graph::{FrameInputs, RenderGraph};
use super::registry::LaneRegistry;
use anyhow::{Context, Result};
use std::sync::Arc;
use strata_core::math::{Extent2D, Mat4};
use strata_core::renderer::api::{Camera, GpuInstance, MeshInfo, SemaphoreSubmit};
use strata_core::renderer::{GraphicsDevice, SubmissionQueue};
use strata_lanes::render_lane::{names, DepthPyramidCuller};
use strata_lanes::scene_lane::{InstanceBuffer, SceneBuffers};

/// Drives one render graph on the graphics queue.
#[derive(Debug)]
pub struct RenderOrchestrator {
    device: Arc<dyn GraphicsDevice>,
    graphics: Arc<SubmissionQueue>,
    scene: Arc<SceneBuffers>,
    instances: InstanceBuffer,
    culler: DepthPyramidCuller,
    graph: RenderGraph,
    cross_queue_wait: bool,
    upload_wait: Option<SemaphoreSubmit>,
    frames: u64,
}

impl RenderOrchestrator {
    /// Builds the graph described by `desc` for a viewport of `extent`.
    ///
    /// The culler's draw list, visible count and depth pyramid are imported
    /// under the names the default lanes look up, for every one of them the
    /// description declares.
    ///
    /// ## Errors
    /// Fails when a GPU allocation fails or the graph does not compile.
    pub fn new(
        graphics: Arc<SubmissionQueue>,
        scene: Arc<SceneBuffers>,
        extent: Extent2D,
        desc: &RenderGraphDesc,
        registry: &LaneRegistry,
    ) -> Result<Self> {
        let device = Arc::clone(graphics.device());
        let max_instances = scene.config().max_instances;
        let instances = InstanceBuffer::new(&device, max_instances)
            .context("Failed to create the instance buffer")?;
        let mut culler = DepthPyramidCuller::new(
            &device,
            instances.buffer().clone(),
            scene.meshlet_buffer().clone(),
            max_instances,
        )
        .context("Failed to create the culler")?;
        culler.create_depth_pyramid(extent)?;

        let mut graph = RenderGraph::from_desc(desc, registry)?;
        import_culler_outputs(&mut graph, &culler);
        graph
            .compile(&device, extent)
            .context("Failed to compile the render graph")?;

        Ok(Self {
            device,
            graphics,
            scene,
            instances,
            culler,
            graph,
            cross_queue_wait: false,
            upload_wait: None,
            frames: 0,
        })
    }

    /// The GPU-driven frame with the default lanes.
    ///
    /// ## Errors
    /// See [`new`](Self::new).
    pub fn gpu_driven(
        graphics: Arc<SubmissionQueue>,
        scene: Arc<SceneBuffers>,
        extent: Extent2D,
    ) -> Result<Self> {
        Self::new(
            graphics,
            scene,
            extent,
            &RenderGraphDesc::gpu_driven(),
            &LaneRegistry::with_defaults(),
        )
    }

    /// Makes the next frame also wait on the transfer timeline for uploads
    /// announced through [`wait_for_upload`](Self::wait_for_upload).
    pub fn with_cross_queue_wait(mut self, enabled: bool) -> Self {
        self.cross_queue_wait = enabled;
        self
    }

    /// Announces an upload the next frame reads from.
    ///
    /// Ignored unless cross-queue waits are enabled: by default scenes are
    /// only spliced after the CPU saw their transfer finish.
    pub fn wait_for_upload(&mut self, semaphore: SemaphoreSubmit) {
        if !self.cross_queue_wait {
            return;
        }
        self.upload_wait = Some(match self.upload_wait {
            Some(pending) if pending.timeline == semaphore.timeline => SemaphoreSubmit {
                timeline: semaphore.timeline,
                value: pending.value.max(semaphore.value),
            },
            _ => semaphore,
        });
    }

    /// Appends an instance of the global mesh `mesh_id`. Returns its index.
    ///
    /// ## Errors
    /// Fails once the instance buffer is full.
    pub fn add_instance(&mut self, transform: Mat4, mesh_id: u32, mesh: &MeshInfo) -> Result<u32> {
        Ok(self
            .instances
            .push(GpuInstance::new(transform, mesh_id, mesh))?)
    }

    /// Replaces the transform of instance `index`. Returns `false` if it
    /// does not exist.
    pub fn patch_instance(&mut self, index: u32, transform: Mat4) -> bool {
        self.instances.patch_transform(index, transform)
    }

    /// Records and submits one frame. Returns the graphics submission id.
    ///
    /// A frame that fails leaves no trace: instance patches stay queued for
    /// the next frame, the graph's tracked states are rolled back and the
    /// stream goes back to the pool.
    ///
    /// ## Errors
    /// Fails when a pass fails to record or the submission is rejected.
    pub fn render_frame(&mut self, camera: &Camera) -> Result<u64> {
        let mut stream = self.graphics.acquire_stream();
        let patches = self.instances.flush(&mut stream);
        let states = self.graph.tracked_states();

        let inputs = FrameInputs {
            camera,
            culler: &self.culler,
            scene: &self.scene,
            instance_count: self.instances.len(),
        };
        if let Err(e) = self.graph.execute(&mut stream, &inputs) {
            self.graphics.release_stream(stream);
            return Err(e);
        }

        if let Some(semaphore) = self.upload_wait.take() {
            log::debug!(
                "Frame {} waits for transfer value {}.",
                self.frames,
                semaphore.value
            );
            self.graphics.queue_wait(semaphore);
        }
        let id = match self.graphics.submit(vec![stream]) {
            Ok(id) => id,
            Err(e) => {
                // The queue keeps the wait for the next attempt.
                self.graph.restore_states(states);
                return Err(e).context("Failed to submit the frame");
            }
        };
        self.instances.mark_flushed();
        self.frames += 1;
        log::trace!(
            "Frame {} submitted as {id} ({} instance(s), {patches} patch(es)).",
            self.frames,
            self.instances.len()
        );
        Ok(id)
    }

    /// Adapts the pyramid and every viewport-sized target to `extent`.
    ///
    /// ## Errors
    /// Fails when a reallocation fails.
    pub fn resize(&mut self, extent: Extent2D) -> Result<()> {
        if extent == self.graph.extent() {
            return Ok(());
        }
        self.culler.create_depth_pyramid(extent)?;
        import_culler_outputs(&mut self.graph, &self.culler);
        self.graph.resize(extent)?;
        log::info!("Viewport resized to {}x{}.", extent.width, extent.height);
        Ok(())
    }

    /// Number of instances.
    pub fn instance_count(&self) -> u32 {
        self.instances.len()
    }

    /// Instances that can still be added.
    pub fn free_instance_slots(&self) -> u32 {
        self.instances.remaining()
    }

    /// Frames submitted so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Instances that survived the last finished cull.
    pub fn visible_count(&self) -> Result<u32> {
        Ok(self.culler.visible_count()?)
    }

    /// The render graph.
    pub fn graph(&self) -> &RenderGraph {
        &self.graph
    }

    /// The culler.
    pub fn culler(&self) -> &DepthPyramidCuller {
        &self.culler
    }

    /// The instance buffer.
    pub fn instances(&self) -> &InstanceBuffer {
        &self.instances
    }

    /// The device the frame runs on.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }
}

fn import_culler_outputs(graph: &mut RenderGraph, culler: &DepthPyramidCuller) {
    if graph.resource(names::COMMANDS).is_some() {
        graph.import_buffer(names::COMMANDS, culler.commands().clone());
    }
    if graph.resource(names::COUNT).is_some() {
        graph.import_buffer(names::COUNT, culler.count().clone());
    }
    if let (Some(pyramid), Some(_)) = (culler.pyramid(), graph.resource(names::DEPTH_PYRAMID)) {
        graph.import_texture(names::DEPTH_PYRAMID, pyramid.texture().clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::config::SceneBufferConfig;
    use strata_core::math::{Aabb, BoundingSphere, Vec3, FRAC_PI_2};
    use strata_core::renderer::api::QueueKind;
    use strata_infra::{SoftwareDevice, SubmitMode};
    use strata_lanes::render_lane::LaneResource;

    fn cube() -> MeshInfo {
        MeshInfo {
            index_count: 36,
            first_index: 0,
            vertex_offset: 0,
            vertex_count: 8,
            material_id: 0,
            aabb: Aabb::from_min_max(Vec3::splat(-0.5), Vec3::splat(0.5)),
            sphere: BoundingSphere::new(Vec3::ZERO, 0.87),
        }
    }

    fn camera() -> Camera {
        Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, FRAC_PI_2, 1.0, 0.1, 100.0).unwrap()
    }

    struct Fixture {
        soft: Arc<SoftwareDevice>,
        graphics: Arc<SubmissionQueue>,
        orchestrator: RenderOrchestrator,
    }

    fn fixture(mode: SubmitMode) -> Fixture {
        let soft = Arc::new(SoftwareDevice::new(mode));
        let device: Arc<dyn GraphicsDevice> = soft.clone();
        let graphics = Arc::new(SubmissionQueue::new(device.clone(), QueueKind::Graphics).unwrap());
        let scene = Arc::new(
            SceneBuffers::new(
                &device,
                &SceneBufferConfig {
                    max_meshes: 4,
                    max_buffer_bytes: 1024,
                    max_materials: 4,
                    max_instances: 8,
                },
            )
            .unwrap(),
        );
        scene
            .meshlet_buffer()
            .write(0, bytemuck::bytes_of(&cube().meshlet()))
            .unwrap();
        let orchestrator =
            RenderOrchestrator::gpu_driven(graphics.clone(), scene, Extent2D::new(32, 32)).unwrap();
        Fixture {
            soft,
            graphics,
            orchestrator,
        }
    }

    #[test]
    fn renders_the_visible_instances() {
        let mut f = fixture(SubmitMode::Immediate);
        for z in [0.0, 10.0] {
            f.orchestrator
                .add_instance(Mat4::from_translation(Vec3::new(0.0, 0.0, z)), 0, &cube())
                .unwrap();
        }

        let id = f.orchestrator.render_frame(&camera()).unwrap();

        assert!(f.graphics.poll(id));
        assert_eq!(f.orchestrator.frame_count(), 1);
        assert_eq!(f.orchestrator.visible_count().unwrap(), 1);
        let stats = f.soft.stats();
        assert_eq!(stats.indirect_draw_count, 1);
        assert_eq!(stats.render_passes, 2);
        assert_eq!(
            f.orchestrator.graph().order_names(),
            vec!["depth_prepass", "depth_pyramid", "instance_cull", "indirect_draw"]
        );
    }

    #[test]
    fn patched_instances_leave_the_frustum() {
        let mut f = fixture(SubmitMode::Immediate);
        let index = f
            .orchestrator
            .add_instance(Mat4::IDENTITY, 0, &cube())
            .unwrap();
        f.orchestrator.render_frame(&camera()).unwrap();
        assert_eq!(f.orchestrator.visible_count().unwrap(), 1);

        assert!(f
            .orchestrator
            .patch_instance(index, Mat4::from_translation(Vec3::new(0.0, 0.0, 20.0))));
        assert!(!f.orchestrator.patch_instance(7, Mat4::IDENTITY));
        f.orchestrator.render_frame(&camera()).unwrap();
        assert_eq!(f.orchestrator.visible_count().unwrap(), 0);
    }

    #[test]
    fn failed_frames_keep_instance_patches() {
        let mut f = fixture(SubmitMode::Immediate);
        f.orchestrator.add_instance(Mat4::IDENTITY, 0, &cube()).unwrap();
        let pooled = f.graphics.pooled_count();
        let degenerate = Camera {
            view: Mat4::from_cols_array_2d(&[[0.0; 4]; 4]),
            proj: Mat4::from_cols_array_2d(&[[0.0; 4]; 4]),
            id: 0,
        };

        assert!(f.orchestrator.render_frame(&degenerate).is_err());
        assert_eq!(f.orchestrator.frame_count(), 0);
        assert_eq!(f.orchestrator.instances().pending_patches(), 1);
        assert_eq!(f.graphics.pooled_count(), pooled.max(1));

        f.orchestrator.render_frame(&camera()).unwrap();
        let gpu = f
            .orchestrator
            .instances()
            .buffer()
            .read_pod::<GpuInstance>(0, 1)
            .unwrap();
        assert_eq!(Some(&gpu[0]), f.orchestrator.instances().get(0));
        assert_eq!(f.orchestrator.instances().pending_patches(), 0);
        assert_eq!(f.orchestrator.visible_count().unwrap(), 1);
    }

    #[test]
    fn resize_swaps_the_pyramid_and_viewport_targets() {
        let mut f = fixture(SubmitMode::Immediate);
        let color = |o: &RenderOrchestrator| match o.graph().get(o.graph().resource("color").unwrap()) {
            Some(LaneResource::Texture(t)) => t.size(),
            _ => panic!("color is not a texture"),
        };
        let before = f.orchestrator.culler().pyramid().unwrap().size();

        f.orchestrator.resize(Extent2D::new(64, 48)).unwrap();

        assert_eq!(color(&f.orchestrator), Extent2D::new(64, 48));
        assert!(f.orchestrator.culler().pyramid().unwrap().size() > before);
        f.orchestrator.add_instance(Mat4::IDENTITY, 0, &cube()).unwrap();
        f.orchestrator.render_frame(&camera()).unwrap();
        assert_eq!(f.orchestrator.visible_count().unwrap(), 1);
    }

    #[test]
    fn upload_waits_are_opt_in() {
        let mut f = fixture(SubmitMode::Deferred);
        let transfer = SubmissionQueue::new(f.graphics.device().clone(), QueueKind::Transfer).unwrap();

        f.orchestrator.wait_for_upload(transfer.semaphore(1));
        let frame = f.orchestrator.render_frame(&camera()).unwrap();
        assert!(f.graphics.wait(frame, std::time::Duration::from_millis(100)));

        let mut f = fixture(SubmitMode::Deferred);
        let transfer = SubmissionQueue::new(f.graphics.device().clone(), QueueKind::Transfer).unwrap();
        f.orchestrator = f.orchestrator.with_cross_queue_wait(true);
        f.orchestrator.wait_for_upload(transfer.semaphore(1));
        let frame = f.orchestrator.render_frame(&camera()).unwrap();
        assert_eq!(f.soft.execute_pending(QueueKind::Graphics, usize::MAX), 0);
        assert!(!f.graphics.poll(frame));

        transfer.submit(vec![transfer.acquire_stream()]).unwrap();
        f.soft.flush();
        assert!(f.graphics.poll(frame));
    }
}
