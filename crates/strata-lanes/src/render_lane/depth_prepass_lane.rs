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

//! Depth prepass: frustum-cull every instance, then draw the survivors
//! depth-only so the pyramid has occluders to work with.

use super::{names, LaneFrame, PassKind, PassResources, RenderLane};
use crate::error::LaneError;
use crate::scene_lane::VertexStream;
use std::mem::size_of;
use std::sync::Arc;
use strata_core::renderer::api::{DrawCommand, RenderPipelineDescriptor, TextureFormat};
use strata_core::renderer::{DepthTarget, GraphicsDevice, RenderPipeline};

/// Depth cleared at the start of every frame.
pub const DEPTH_CLEAR: f32 = 1.0;

/// Draws the frustum-visible scene into the depth attachment.
#[derive(Debug, Default)]
pub struct DepthPrepassLane {
    pipeline: Option<RenderPipeline>,
}

impl DepthPrepassLane {
    /// A lane whose pipeline is built on `on_create`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderLane for DepthPrepassLane {
    fn strategy_name(&self) -> &'static str {
        "depth_prepass"
    }

    fn kind(&self) -> PassKind {
        PassKind::Graphics
    }

    fn on_create(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        resources: &PassResources,
    ) -> Result<(), LaneError> {
        let depth = resources.texture(self.strategy_name(), names::DEPTH)?;
        self.pipeline = Some(RenderPipeline::new(
            device,
            &RenderPipelineDescriptor {
                label: Some("depth prepass".into()),
                shader: None,
                color_formats: Vec::new(),
                depth_format: Some(depth.format()),
                depth_write: true,
            },
        )?);
        debug_assert_eq!(depth.format(), TextureFormat::Depth32Float);
        Ok(())
    }

    fn render(&mut self, frame: &mut LaneFrame<'_>) -> Result<(), LaneError> {
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or(LaneError::NotCreated("depth_prepass"))?;
        let depth = frame.resources.texture(self.strategy_name(), names::DEPTH)?;

        frame
            .culler
            .dispatch(frame.stream, frame.camera, frame.instance_count, true)?;

        frame.stream.begin_render_pass(
            "depth prepass",
            &[],
            Some(DepthTarget {
                texture: depth,
                clear: Some(DEPTH_CLEAR),
            }),
        );
        frame.stream.set_render_pipeline(pipeline);
        frame
            .stream
            .bind_vertex_buffers(0, &[frame.scene.vertex_buffer(VertexStream::Position)]);
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
    use strata_core::renderer::api::Command;

    #[test]
    fn render_before_create_fails() {
        let harness = LaneHarness::new();
        let mut lane = DepthPrepassLane::new();
        let mut stream = harness.queue.acquire_stream();
        let mut frame = LaneFrame {
            stream: &mut stream,
            camera: &harness.camera,
            culler: &harness.culler,
            scene: &harness.scene,
            instance_count: 0,
            resources: &harness.resources,
        };
        assert_eq!(
            lane.render(&mut frame),
            Err(LaneError::NotCreated("depth_prepass"))
        );
    }

    #[test]
    fn clears_depth_and_draws_indirectly() {
        let harness = LaneHarness::new();
        let mut lane = DepthPrepassLane::new();
        lane.on_create(&harness.device, &harness.resources).unwrap();

        let commands = harness.record(&mut lane);
        let begin = commands
            .iter()
            .find_map(|c| match c {
                Command::BeginRenderPass { color, depth, .. } => Some((color.len(), *depth)),
                _ => None,
            })
            .unwrap();
        assert_eq!(begin.0, 0);
        assert_eq!(begin.1.and_then(|d| d.clear), Some(DEPTH_CLEAR));
        assert!(matches!(
            commands.last(),
            Some(Command::EndRenderPass)
        ));
        assert_eq!(harness.soft.stats().render_passes, 1);
        assert_eq!(harness.soft.stats().indirect_draw_count, 0);
    }
}
