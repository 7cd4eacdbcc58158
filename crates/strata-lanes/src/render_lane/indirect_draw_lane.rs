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

//! Main geometry pass driven by the occlusion-culled draw list.

use super::{names, LaneFrame, PassKind, PassResources, RenderLane};
use crate::error::LaneError;
use std::mem::size_of;
use std::sync::Arc;
use strata_core::renderer::api::{DrawCommand, RenderPipelineDescriptor, ShaderSource};
use strata_core::renderer::{ColorTarget, DepthTarget, GraphicsDevice, RenderPipeline};

/// Draws every visible instance with one count-bounded indirect call.
#[derive(Debug, Default)]
pub struct IndirectDrawLane {
    shader: Option<ShaderSource>,
    clear_color: [f32; 4],
    pipeline: Option<RenderPipeline>,
}

impl IndirectDrawLane {
    /// A lane clearing to `clear_color`.
    pub fn new(clear_color: [f32; 4]) -> Self {
        Self {
            clear_color,
            ..Default::default()
        }
    }

    /// Uses `shader` for the geometry pipeline.
    pub fn with_shader(mut self, shader: ShaderSource) -> Self {
        self.shader = Some(shader);
        self
    }
}

impl RenderLane for IndirectDrawLane {
    fn strategy_name(&self) -> &'static str {
        "indirect_draw"
    }

    fn kind(&self) -> PassKind {
        PassKind::Graphics
    }

    fn on_create(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        resources: &PassResources,
    ) -> Result<(), LaneError> {
        let color = resources.texture(self.strategy_name(), names::COLOR)?;
        let depth = resources.texture(self.strategy_name(), names::DEPTH)?;
        self.pipeline = Some(RenderPipeline::new(
            device,
            &RenderPipelineDescriptor {
                label: Some("indirect draw".into()),
                shader: self.shader.clone(),
                color_formats: vec![color.format()],
                depth_format: Some(depth.format()),
                // Depth is already final after the prepass.
                depth_write: false,
            },
        )?);
        Ok(())
    }

    fn render(&mut self, frame: &mut LaneFrame<'_>) -> Result<(), LaneError> {
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or(LaneError::NotCreated("indirect_draw"))?;
        let color = frame.resources.texture(self.strategy_name(), names::COLOR)?;
        let depth = frame.resources.texture(self.strategy_name(), names::DEPTH)?;

        frame.stream.begin_render_pass(
            "indirect draw",
            &[ColorTarget {
                texture: color,
                clear: Some(self.clear_color),
            }],
            Some(DepthTarget {
                texture: depth,
                clear: None,
            }),
        );
        frame.stream.set_render_pipeline(pipeline);
        frame.stream.bind_vertex_buffers(0, &frame.scene.vertex_buffers());
        frame.stream.bind_index_buffer(frame.scene.index_buffer());
        frame.stream.draw_indexed_indirect_count(
            frame.culler.commands(),
            frame.culler.count(),
            frame.culler.max_instances(),
            size_of::<DrawCommand>() as u32,
        );
        frame.stream.end_render_pass();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::test_util::LaneHarness;
    use crate::render_lane::{DepthPrepassLane, DepthPyramidLane, InstanceCullLane};
    use strata_core::math::{Aabb, BoundingSphere, Mat4, Vec3};
    use strata_core::renderer::api::{Command, GpuInstance, MeshInfo};

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

    #[test]
    fn binds_all_vertex_streams() {
        let harness = LaneHarness::new();
        let mut lane = IndirectDrawLane::new([0.0, 0.0, 0.0, 1.0]);
        lane.on_create(&harness.device, &harness.resources).unwrap();

        let commands = harness.record(&mut lane);
        let streams = commands.iter().find_map(|c| match c {
            Command::BindVertexBuffers { buffers, .. } => Some(buffers.len()),
            _ => None,
        });
        assert_eq!(streams, Some(4));
    }

    #[test]
    fn full_frame_draws_the_visible_instances() {
        let mut harness = LaneHarness::new();
        harness
            .scene
            .meshlet_buffer()
            .write(0, bytemuck::bytes_of(&cube().meshlet()))
            .unwrap();
        // One cube in front of the camera, one behind it.
        for z in [0.0, 10.0] {
            harness
                .instances
                .push(GpuInstance::new(
                    Mat4::from_translation(Vec3::new(0.0, 0.0, z)),
                    0,
                    &cube(),
                ))
                .unwrap();
        }
        let mut stream = harness.queue.acquire_stream();
        harness.instances.flush(&mut stream);
        harness.queue.submit_and_wait(vec![stream]).unwrap();
        harness.instances.mark_flushed();

        let mut lanes: Vec<Box<dyn RenderLane>> = vec![
            Box::new(DepthPrepassLane::new()),
            Box::new(DepthPyramidLane),
            Box::new(InstanceCullLane),
            Box::new(IndirectDrawLane::new([0.0; 4])),
        ];
        for lane in &mut lanes {
            lane.on_create(&harness.device, &harness.resources).unwrap();
            harness.record(lane.as_mut());
        }

        // The depth pass only tallies draws, so nothing occludes the front cube.
        assert_eq!(harness.culler.visible_count().unwrap(), 1);
        assert_eq!(harness.soft.stats().indirect_draw_count, 1);
        assert_eq!(harness.soft.stats().render_passes, 2);
    }
}
