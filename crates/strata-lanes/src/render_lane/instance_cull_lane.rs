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

//! Main culling pass: frustum and Hi-Z occlusion against this frame's pyramid.

use super::{LaneFrame, PassKind, PassResources, RenderLane};
use crate::error::LaneError;
use std::sync::Arc;
use strata_core::renderer::GraphicsDevice;

/// Rebuilds the indirect draw list with occlusion enabled.
#[derive(Debug, Default)]
pub struct InstanceCullLane;

impl RenderLane for InstanceCullLane {
    fn strategy_name(&self) -> &'static str {
        "instance_cull"
    }

    fn kind(&self) -> PassKind {
        PassKind::Compute
    }

    fn on_create(
        &mut self,
        _device: &Arc<dyn GraphicsDevice>,
        _resources: &PassResources,
    ) -> Result<(), LaneError> {
        Ok(())
    }

    fn render(&mut self, frame: &mut LaneFrame<'_>) -> Result<(), LaneError> {
        frame
            .culler
            .dispatch(frame.stream, frame.camera, frame.instance_count, false)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::test_util::LaneHarness;
    use strata_core::math::{Aabb, BoundingSphere, Mat4, Vec3};
    use strata_core::renderer::api::{FrustumUniform, GpuInstance, MeshInfo, CULL_OCCLUSION};

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
    fn uploads_an_occlusion_uniform() {
        let mut harness = LaneHarness::new();
        harness
            .instances
            .push(GpuInstance::new(Mat4::IDENTITY, 0, &cube()))
            .unwrap();
        let mut lane = InstanceCullLane;
        harness.record(&mut lane);

        let uniform = harness
            .culler
            .frustum()
            .read_pod::<FrustumUniform>(0, 1)
            .unwrap()[0];
        assert_eq!(uniform.cull, CULL_OCCLUSION);
        assert_eq!(uniform.num, 1);
        assert_eq!(uniform.pyramid_size, [16.0, 16.0]);
    }
}
