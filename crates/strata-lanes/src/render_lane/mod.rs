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

//! Rendering lanes - the passes of a frame.
//!
//! A lane records GPU commands for one pass of the render graph. It never
//! owns the resources it reads or writes: the graph allocates them, tracks
//! their state and hands them over through [`PassResources`].

use crate::error::LaneError;
use crate::scene_lane::SceneBuffers;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strata_core::math::Extent2D;
use strata_core::renderer::api::{Camera, ResourceState};
use strata_core::renderer::{CommandStream, GpuBuffer, GpuTexture, GraphicsDevice};

pub mod culling;
mod depth_prepass_lane;
mod depth_pyramid_lane;
mod indirect_draw_lane;
mod instance_cull_lane;

pub use culling::{DepthPyramid, DepthPyramidCuller};
pub use depth_prepass_lane::DepthPrepassLane;
pub use depth_pyramid_lane::DepthPyramidLane;
pub use indirect_draw_lane::IndirectDrawLane;
pub use instance_cull_lane::InstanceCullLane;

/// The queue capability a pass needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    /// Render passes with attachments.
    #[default]
    Graphics,
    /// Compute dispatches only.
    Compute,
    /// Ray tracing dispatches.
    Raytrace,
}

/// How a pass uses one of its resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    /// A buffer read by shaders.
    ReadOnlyBuffer,
    /// A texture sampled by shaders.
    SampledTexture,
    /// A buffer written by shaders.
    StorageBuffer,
    /// A texture written by shaders.
    StorageImage,
    /// A color attachment.
    RenderTarget,
    /// A depth attachment with writes enabled.
    DepthWrite,
    /// An acceleration structure read by ray queries.
    Raytracing,
}

impl BindingKind {
    /// The state the resource must be in while the pass runs.
    pub fn state(self) -> ResourceState {
        match self {
            BindingKind::ReadOnlyBuffer
            | BindingKind::SampledTexture
            | BindingKind::Raytracing => ResourceState::ShaderRead,
            BindingKind::StorageBuffer => ResourceState::StorageWrite,
            BindingKind::StorageImage => ResourceState::General,
            BindingKind::RenderTarget => ResourceState::RenderTarget,
            BindingKind::DepthWrite => ResourceState::DepthWrite,
        }
    }

    /// Returns `true` if the pass writes the resource.
    pub fn is_output(self) -> bool {
        matches!(
            self,
            BindingKind::StorageBuffer
                | BindingKind::StorageImage
                | BindingKind::RenderTarget
                | BindingKind::DepthWrite
        )
    }

    /// Returns `true` for texture bindings.
    pub fn is_texture(self) -> bool {
        matches!(
            self,
            BindingKind::SampledTexture
                | BindingKind::StorageImage
                | BindingKind::RenderTarget
                | BindingKind::DepthWrite
        )
    }
}

/// A GPU resource handed to a pass.
#[derive(Debug, Clone)]
pub enum LaneResource {
    /// A buffer.
    Buffer(GpuBuffer),
    /// A texture.
    Texture(GpuTexture),
}

/// One resource of a pass, with the way the pass uses it.
#[derive(Debug, Clone)]
pub struct PassBinding {
    /// Name of the resource in the graph.
    pub name: String,
    /// How the pass uses it.
    pub kind: BindingKind,
    /// The resource.
    pub resource: LaneResource,
}

/// The resources bound to one pass, looked up by name.
#[derive(Debug, Clone, Default)]
pub struct PassResources {
    bindings: Vec<PassBinding>,
}

impl PassResources {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the binding named `name`.
    pub fn insert(&mut self, name: impl Into<String>, kind: BindingKind, resource: LaneResource) {
        let name = name.into();
        self.bindings.retain(|b| b.name != name);
        self.bindings.push(PassBinding {
            name,
            kind,
            resource,
        });
    }

    /// The binding named `name`.
    pub fn get(&self, name: &str) -> Option<&PassBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    /// All bindings, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &PassBinding> {
        self.bindings.iter()
    }

    /// The buffer named `name`.
    ///
    /// ## Errors
    /// `LaneError::MissingResource` if absent or not a buffer.
    pub fn buffer(&self, lane: &'static str, name: &str) -> Result<&GpuBuffer, LaneError> {
        match self.get(name).map(|b| &b.resource) {
            Some(LaneResource::Buffer(buffer)) => Ok(buffer),
            _ => Err(LaneError::MissingResource {
                lane,
                name: name.to_string(),
            }),
        }
    }

    /// The texture named `name`.
    ///
    /// ## Errors
    /// `LaneError::MissingResource` if absent or not a texture.
    pub fn texture(&self, lane: &'static str, name: &str) -> Result<&GpuTexture, LaneError> {
        match self.get(name).map(|b| &b.resource) {
            Some(LaneResource::Texture(texture)) => Ok(texture),
            _ => Err(LaneError::MissingResource {
                lane,
                name: name.to_string(),
            }),
        }
    }
}

/// Everything a lane sees while recording one frame.
pub struct LaneFrame<'a> {
    /// The graphics stream of the frame.
    pub stream: &'a mut CommandStream,
    /// The viewing camera.
    pub camera: &'a Camera,
    /// The culler, owner of the indirect draw list.
    pub culler: &'a DepthPyramidCuller,
    /// The persistent scene buffers.
    pub scene: &'a SceneBuffers,
    /// Instances to cull this frame.
    pub instance_count: u32,
    /// The resources of the pass being recorded.
    pub resources: &'a PassResources,
}

/// A pass of the render graph.
///
/// The graph calls `on_create` once after allocating the pass resources,
/// `on_resize` whenever the viewport changes and `render` every frame in
/// topological order.
pub trait RenderLane: Send + Sync {
    /// A human-readable identifier for logs.
    fn strategy_name(&self) -> &'static str;

    /// The queue capability the pass needs.
    fn kind(&self) -> PassKind;

    /// Creates pipelines and other per-lane state.
    fn on_create(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        resources: &PassResources,
    ) -> Result<(), LaneError>;

    /// Reacts to a new viewport size. Most lanes have nothing to do.
    fn on_resize(
        &mut self,
        _device: &Arc<dyn GraphicsDevice>,
        _resources: &PassResources,
        _extent: Extent2D,
    ) -> Result<(), LaneError> {
        Ok(())
    }

    /// Records the pass.
    fn render(&mut self, frame: &mut LaneFrame<'_>) -> Result<(), LaneError>;
}

/// Names of the resources the default lanes look up.
pub mod names {
    /// The depth attachment.
    pub const DEPTH: &str = "depth";
    /// The color attachment.
    pub const COLOR: &str = "color";
    /// The depth pyramid.
    pub const DEPTH_PYRAMID: &str = "depth_pyramid";
    /// The indirect draw commands.
    pub const COMMANDS: &str = "commands";
    /// The visible count.
    pub const COUNT: &str = "count";
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::scene_lane::InstanceBuffer;
    use strata_core::config::SceneBufferConfig;
    use strata_core::math::{Vec3, FRAC_PI_2};
    use strata_core::renderer::api::*;
    use strata_core::renderer::SubmissionQueue;
    use strata_infra::SoftwareDevice;

    pub(crate) struct LaneHarness {
        pub soft: Arc<SoftwareDevice>,
        pub device: Arc<dyn GraphicsDevice>,
        pub queue: SubmissionQueue,
        pub scene: SceneBuffers,
        pub instances: InstanceBuffer,
        pub culler: DepthPyramidCuller,
        pub resources: PassResources,
        pub camera: Camera,
    }

    impl LaneHarness {
        pub(crate) fn new() -> Self {
            let soft = Arc::new(SoftwareDevice::default());
            let device: Arc<dyn GraphicsDevice> = soft.clone();
            let queue = SubmissionQueue::new(device.clone(), QueueKind::Graphics).unwrap();
            let scene = SceneBuffers::new(
                &device,
                &SceneBufferConfig {
                    max_meshes: 4,
                    max_buffer_bytes: 1024,
                    max_materials: 4,
                    max_instances: 8,
                },
            )
            .unwrap();
            let instances = InstanceBuffer::new(&device, 8).unwrap();
            let mut culler = DepthPyramidCuller::new(
                &device,
                instances.buffer().clone(),
                scene.meshlet_buffer().clone(),
                8,
            )
            .unwrap();
            culler.create_depth_pyramid(Extent2D::new(16, 16)).unwrap();

            let texture = |label: &str, format: TextureFormat| {
                GpuTexture::new(
                    &device,
                    &TextureDescriptor {
                        label: Some(label.to_string().into()),
                        size: Extent2D::new(16, 16),
                        mip_level_count: 1,
                        format,
                        usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::SAMPLED,
                    },
                )
                .unwrap()
            };
            let mut resources = PassResources::new();
            resources.insert(
                names::DEPTH,
                BindingKind::DepthWrite,
                LaneResource::Texture(texture("depth", TextureFormat::Depth32Float)),
            );
            resources.insert(
                names::COLOR,
                BindingKind::RenderTarget,
                LaneResource::Texture(texture("color", TextureFormat::Rgba8Unorm)),
            );
            resources.insert(
                names::COMMANDS,
                BindingKind::ReadOnlyBuffer,
                LaneResource::Buffer(culler.commands().clone()),
            );
            resources.insert(
                names::COUNT,
                BindingKind::ReadOnlyBuffer,
                LaneResource::Buffer(culler.count().clone()),
            );

            let camera =
                Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, FRAC_PI_2, 1.0, 0.1, 100.0)
                    .unwrap();
            Self {
                soft,
                device,
                queue,
                scene,
                instances,
                culler,
                resources,
                camera,
            }
        }

        /// Records `lane` into a fresh stream and returns the stream's commands.
        pub(crate) fn record(&self, lane: &mut dyn RenderLane) -> Vec<Command> {
            let mut stream = self.queue.acquire_stream();
            let mut frame = LaneFrame {
                stream: &mut stream,
                camera: &self.camera,
                culler: &self.culler,
                scene: &self.scene,
                instance_count: self.instances.len(),
                resources: &self.resources,
            };
            lane.render(&mut frame).unwrap();
            let commands = stream.commands().to_vec();
            self.queue.submit_and_wait(vec![stream]).unwrap();
            commands
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_kinds_map_to_states() {
        assert_eq!(BindingKind::DepthWrite.state(), ResourceState::DepthWrite);
        assert_eq!(BindingKind::StorageImage.state(), ResourceState::General);
        assert!(BindingKind::StorageBuffer.is_output());
        assert!(!BindingKind::SampledTexture.is_output());
        assert!(!BindingKind::ReadOnlyBuffer.is_texture());
    }

    #[test]
    fn lookups_check_the_resource_type() {
        let resources = PassResources::new();
        assert_eq!(
            resources.buffer("test", "commands").unwrap_err(),
            LaneError::MissingResource {
                lane: "test",
                name: "commands".into()
            }
        );
    }
}
