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

//! Lane factories addressed by name.

use std::collections::BTreeMap;
use std::fmt;
use strata_lanes::render_lane::{
    DepthPrepassLane, DepthPyramidLane, IndirectDrawLane, InstanceCullLane, RenderLane,
};

type LaneFactory = Box<dyn Fn() -> Box<dyn RenderLane> + Send + Sync>;

/// Maps the lane keys of a [`RenderGraphDesc`](super::RenderGraphDesc) to constructors.
#[derive(Default)]
pub struct LaneRegistry {
    factories: BTreeMap<String, LaneFactory>,
}

impl LaneRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the four lanes of the GPU-driven frame.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("depth_prepass", || Box::new(DepthPrepassLane::new()));
        registry.register("depth_pyramid", || Box::new(DepthPyramidLane));
        registry.register("instance_cull", || Box::new(InstanceCullLane));
        registry.register("indirect_draw", || {
            Box::new(IndirectDrawLane::new([0.0, 0.0, 0.0, 1.0]))
        });
        registry
    }

    /// Registers `factory` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn RenderLane> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Builds a fresh lane registered under `name`.
    pub fn create(&self, name: &str) -> Option<Box<dyn RenderLane>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Registered keys, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for LaneRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_lanes::render_lane::PassKind;

    #[test]
    fn defaults_cover_the_gpu_driven_frame() {
        let registry = LaneRegistry::with_defaults();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["depth_prepass", "depth_pyramid", "indirect_draw", "instance_cull"]
        );
        let cull = registry.create("instance_cull").unwrap();
        assert_eq!(cull.strategy_name(), "instance_cull");
        assert_eq!(cull.kind(), PassKind::Compute);
        assert!(registry.create("ray_marcher").is_none());
    }
}
