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

//! Builds the hierarchical depth pyramid from the prepass depth.

use super::{names, LaneFrame, PassKind, PassResources, RenderLane};
use crate::error::LaneError;
use std::sync::Arc;
use strata_core::renderer::GraphicsDevice;

/// Min-reduces the depth attachment into the culler's pyramid.
#[derive(Debug, Default)]
pub struct DepthPyramidLane;

impl RenderLane for DepthPyramidLane {
    fn strategy_name(&self) -> &'static str {
        "depth_pyramid"
    }

    fn kind(&self) -> PassKind {
        PassKind::Compute
    }

    fn on_create(
        &mut self,
        _device: &Arc<dyn GraphicsDevice>,
        resources: &PassResources,
    ) -> Result<(), LaneError> {
        resources.texture(self.strategy_name(), names::DEPTH)?;
        Ok(())
    }

    fn render(&mut self, frame: &mut LaneFrame<'_>) -> Result<(), LaneError> {
        let depth = frame.resources.texture(self.strategy_name(), names::DEPTH)?;
        frame.culler.render_depth_pyramid(depth, frame.stream)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::test_util::LaneHarness;
    use strata_core::renderer::api::Command;

    #[test]
    fn dispatches_one_reduction_per_level() {
        let harness = LaneHarness::new();
        let mut lane = DepthPyramidLane;
        lane.on_create(&harness.device, &harness.resources).unwrap();

        let commands = harness.record(&mut lane);
        let dispatches = commands
            .iter()
            .filter(|c| matches!(c, Command::Dispatch { .. }))
            .count();
        let levels = harness.culler.pyramid().unwrap().levels();
        assert_eq!(dispatches as u32, levels);
        assert_eq!(harness.soft.stats().dispatches as u32, levels);
    }

    #[test]
    fn requires_a_depth_attachment() {
        let harness = LaneHarness::new();
        let mut lane = DepthPyramidLane;
        let result = lane.on_create(&harness.device, &Default::default());
        assert!(matches!(result, Err(LaneError::MissingResource { .. })));
    }
}
