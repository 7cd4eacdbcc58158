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

//! A small render graph: named resources, passes with typed bindings,
//! dependency ordering and automatic barriers.
//!
//! Resources are allocated once per name at [`compile`](RenderGraph::compile)
//! time. Edges run from the last writer of a resource to its later readers,
//! and from earlier users to the next writer, all in declaration order; the
//! execution order is a topological sort of those edges. During
//! [`execute`](RenderGraph::execute) the graph tracks the state of every
//! resource and records a barrier whenever a pass needs a different one.

use super::desc::{RenderGraphDesc, ResourceKind, TextureSize};
use super::registry::LaneRegistry;
use anyhow::{anyhow, bail, Context, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use strata_core::graph::topological_sort;
use strata_core::math::Extent2D;
use strata_core::renderer::api::*;
use strata_core::renderer::{CommandStream, GpuBuffer, GpuTexture, GraphicsDevice};
use strata_lanes::render_lane::{
    BindingKind, DepthPyramidCuller, LaneFrame, LaneResource, PassResources, RenderLane,
};
use strata_lanes::scene_lane::SceneBuffers;

/// Index of a resource in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(pub usize);

/// Index of a pass in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassHandle(pub usize);

#[derive(Debug)]
struct GraphResource {
    name: String,
    kind: ResourceKind,
    resource: Option<LaneResource>,
    state: ResourceState,
}

struct GraphPass {
    name: String,
    lane: Box<dyn RenderLane>,
    bindings: Vec<(ResourceHandle, BindingKind)>,
    resources: PassResources,
}

/// The per-frame inputs every lane sees.
pub struct FrameInputs<'a> {
    /// The viewing camera.
    pub camera: &'a Camera,
    /// The culler owning the draw list and the pyramid.
    pub culler: &'a DepthPyramidCuller,
    /// The persistent scene buffers.
    pub scene: &'a SceneBuffers,
    /// Instances to cull.
    pub instance_count: u32,
}

/// Passes and the resources flowing between them.
#[derive(Default)]
pub struct RenderGraph {
    resources: Vec<GraphResource>,
    passes: Vec<GraphPass>,
    order: Vec<usize>,
    extent: Extent2D,
    device: Option<Arc<dyn GraphicsDevice>>,
}

impl RenderGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiates `desc`, building each pass's lane through `registry`.
    ///
    /// ## Errors
    /// Fails on an unknown lane key, a duplicate pass name or a binding to an
    /// undeclared resource.
    pub fn from_desc(desc: &RenderGraphDesc, registry: &LaneRegistry) -> Result<Self> {
        let mut graph = Self::new();
        for resource in &desc.resources {
            graph.declare(&resource.name, resource.kind);
        }
        for pass in &desc.passes {
            let lane = registry
                .create(&pass.lane)
                .ok_or_else(|| anyhow!("Pass '{}' uses unknown lane '{}'", pass.name, pass.lane))?;
            let bindings = pass
                .bindings
                .iter()
                .map(|b| (b.resource.as_str(), b.kind))
                .collect::<Vec<_>>();
            graph.add_pass(&pass.name, lane, &bindings)?;
        }
        Ok(graph)
    }

    fn declare(&mut self, name: &str, kind: ResourceKind) -> ResourceHandle {
        if let Some(handle) = self.resource(name) {
            let entry = &mut self.resources[handle.0];
            if entry.kind != kind {
                log::warn!("Render graph resource '{name}' redeclared as {kind:?}.");
                entry.kind = kind;
                entry.resource = None;
            }
            return handle;
        }
        self.resources.push(GraphResource {
            name: name.to_string(),
            kind,
            resource: None,
            state: ResourceState::Undefined,
        });
        ResourceHandle(self.resources.len() - 1)
    }

    /// Declares a texture the graph allocates. Declaring a name twice
    /// returns the first handle.
    pub fn add_texture(
        &mut self,
        name: &str,
        format: TextureFormat,
        size: TextureSize,
    ) -> ResourceHandle {
        self.declare(name, ResourceKind::Texture { format, size })
    }

    /// Declares a buffer the graph allocates.
    pub fn add_buffer(&mut self, name: &str, size: u64) -> ResourceHandle {
        self.declare(name, ResourceKind::Buffer { size })
    }

    /// Hands an externally owned buffer to the graph under `name`.
    ///
    /// Importing over an existing name replaces the resource; passes of a
    /// compiled graph see the new one from the next frame on.
    pub fn import_buffer(&mut self, name: &str, buffer: GpuBuffer) -> ResourceHandle {
        self.import(name, LaneResource::Buffer(buffer))
    }

    /// Hands an externally owned texture to the graph under `name`.
    pub fn import_texture(&mut self, name: &str, texture: GpuTexture) -> ResourceHandle {
        self.import(name, LaneResource::Texture(texture))
    }

    fn import(&mut self, name: &str, resource: LaneResource) -> ResourceHandle {
        let handle = self.declare(name, ResourceKind::External);
        let entry = &mut self.resources[handle.0];
        entry.kind = ResourceKind::External;
        entry.resource = Some(resource);
        entry.state = ResourceState::Undefined;
        self.refresh_bindings();
        handle
    }

    /// Appends a pass recorded by `lane`.
    ///
    /// ## Errors
    /// Fails on a duplicate pass name or a binding to an undeclared resource.
    pub fn add_pass(
        &mut self,
        name: &str,
        lane: Box<dyn RenderLane>,
        bindings: &[(&str, BindingKind)],
    ) -> Result<PassHandle> {
        if self.pass(name).is_some() {
            bail!("Duplicate render pass '{name}'");
        }
        let bindings = bindings
            .iter()
            .map(|(resource, kind)| {
                self.resource(resource)
                    .map(|handle| (handle, *kind))
                    .ok_or_else(|| anyhow!("Pass '{name}' binds undeclared resource '{resource}'"))
            })
            .collect::<Result<Vec<_>>>()?;
        self.passes.push(GraphPass {
            name: name.to_string(),
            lane,
            bindings,
            resources: PassResources::new(),
        });
        self.order.clear();
        Ok(PassHandle(self.passes.len() - 1))
    }

    /// Allocates every resource, orders the passes and creates the lanes.
    ///
    /// ## Errors
    /// Fails on a dependency cycle, an external resource that was never
    /// imported, an allocation failure or a lane failing to create.
    pub fn compile(&mut self, device: &Arc<dyn GraphicsDevice>, extent: Extent2D) -> Result<()> {
        self.device = Some(Arc::clone(device));
        self.extent = extent;
        self.allocate(device, false)?;

        let edges = self.edges();
        self.order = topological_sort(self.passes.len(), edges.iter().copied()).map_err(|e| {
            let passes = e
                .unresolved
                .iter()
                .map(|p| self.passes[*p].name.as_str())
                .collect::<Vec<_>>();
            anyhow!("Render graph has a dependency cycle between {passes:?}")
        })?;

        self.refresh_bindings();
        for pass in &mut self.passes {
            pass.lane
                .on_create(device, &pass.resources)
                .with_context(|| format!("Creating pass '{}'", pass.name))?;
        }
        log::info!(
            "Render graph compiled: {} pass(es), {} resource(s), order {:?}.",
            self.passes.len(),
            self.resources.len(),
            self.order_names()
        );
        Ok(())
    }

    /// Reallocates viewport-sized textures and notifies every lane.
    ///
    /// ## Errors
    /// Fails before [`compile`](Self::compile), or when an allocation or a
    /// lane fails.
    pub fn resize(&mut self, extent: Extent2D) -> Result<()> {
        let device = self
            .device
            .clone()
            .ok_or_else(|| anyhow!("Render graph resized before compile"))?;
        if extent == self.extent {
            return Ok(());
        }
        self.extent = extent;
        self.allocate(&device, true)?;
        self.refresh_bindings();
        for pass in &mut self.passes {
            pass.lane
                .on_resize(&device, &pass.resources, extent)
                .with_context(|| format!("Resizing pass '{}'", pass.name))?;
        }
        log::debug!("Render graph resized to {}x{}.", extent.width, extent.height);
        Ok(())
    }

    /// Records every pass into `stream` in dependency order.
    ///
    /// On failure the tracked resource states are rolled back, since the
    /// barriers already recorded will never run.
    ///
    /// ## Errors
    /// Fails before [`compile`](Self::compile) or when a lane fails.
    pub fn execute(&mut self, stream: &mut CommandStream, inputs: &FrameInputs<'_>) -> Result<()> {
        if self.order.len() != self.passes.len() {
            bail!("Render graph executed before compile");
        }
        let states = self.tracked_states();
        let result = self.record(stream, inputs);
        if result.is_err() {
            self.restore_states(states);
        }
        result
    }

    /// The tracked state of every resource, in handle order.
    pub(super) fn tracked_states(&self) -> Vec<ResourceState> {
        self.resources.iter().map(|r| r.state).collect()
    }

    /// Puts back states taken with [`tracked_states`](Self::tracked_states).
    pub(super) fn restore_states(&mut self, states: Vec<ResourceState>) {
        for (entry, state) in self.resources.iter_mut().zip(states) {
            entry.state = state;
        }
    }

    fn record(&mut self, stream: &mut CommandStream, inputs: &FrameInputs<'_>) -> Result<()> {
        for &index in &self.order {
            let pass = &mut self.passes[index];
            for &(handle, kind) in &pass.bindings {
                let entry = &mut self.resources[handle.0];
                let target = kind.state();
                if entry.state == target {
                    continue;
                }
                match &entry.resource {
                    Some(LaneResource::Texture(texture)) => stream.image_barrier(
                        texture,
                        0..texture.mip_level_count(),
                        entry.state,
                        target,
                    ),
                    Some(LaneResource::Buffer(buffer)) => {
                        stream.buffer_barrier(buffer, entry.state, target)
                    }
                    None => bail!("Resource '{}' is not allocated", entry.name),
                }
                entry.state = target;
            }

            log::trace!("Recording pass '{}'.", pass.name);
            let mut frame = LaneFrame {
                stream: &mut *stream,
                camera: inputs.camera,
                culler: inputs.culler,
                scene: inputs.scene,
                instance_count: inputs.instance_count,
                resources: &pass.resources,
            };
            pass.lane
                .render(&mut frame)
                .with_context(|| format!("Recording pass '{}'", pass.name))?;
        }
        Ok(())
    }

    /// Handle of the resource named `name`.
    pub fn resource(&self, name: &str) -> Option<ResourceHandle> {
        self.resources
            .iter()
            .position(|r| r.name == name)
            .map(ResourceHandle)
    }

    /// Handle of the pass named `name`.
    pub fn pass(&self, name: &str) -> Option<PassHandle> {
        self.passes
            .iter()
            .position(|p| p.name == name)
            .map(PassHandle)
    }

    /// The GPU resource behind `handle`, once allocated or imported.
    pub fn get(&self, handle: ResourceHandle) -> Option<&LaneResource> {
        self.resources.get(handle.0)?.resource.as_ref()
    }

    /// The texture named `name`.
    pub fn texture(&self, name: &str) -> Option<&GpuTexture> {
        match self.get(self.resource(name)?)? {
            LaneResource::Texture(texture) => Some(texture),
            LaneResource::Buffer(_) => None,
        }
    }

    /// The buffer named `name`.
    pub fn buffer(&self, name: &str) -> Option<&GpuBuffer> {
        match self.get(self.resource(name)?)? {
            LaneResource::Buffer(buffer) => Some(buffer),
            LaneResource::Texture(_) => None,
        }
    }

    /// The state the graph last moved `handle` to.
    pub fn state(&self, handle: ResourceHandle) -> Option<ResourceState> {
        self.resources.get(handle.0).map(|r| r.state)
    }

    /// Name of the pass behind `handle`.
    pub fn pass_name(&self, handle: PassHandle) -> Option<&str> {
        self.passes.get(handle.0).map(|p| p.name.as_str())
    }

    /// Pass names in execution order; empty before compilation.
    pub fn order_names(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&i| self.passes[i].name.as_str())
            .collect()
    }

    /// Number of passes.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// The viewport the graph was last compiled or resized for.
    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    fn edges(&self) -> BTreeSet<(usize, usize)> {
        let mut edges = BTreeSet::new();
        let mut last_writer: Vec<Option<usize>> = vec![None; self.resources.len()];
        let mut readers: Vec<Vec<usize>> = vec![Vec::new(); self.resources.len()];

        for (pass, entry) in self.passes.iter().enumerate() {
            for &(handle, kind) in &entry.bindings {
                let r = handle.0;
                if let Some(writer) = last_writer[r] {
                    if writer != pass {
                        edges.insert((writer, pass));
                    }
                }
                if kind.is_output() {
                    for &reader in &readers[r] {
                        if reader != pass {
                            edges.insert((reader, pass));
                        }
                    }
                    readers[r].clear();
                    last_writer[r] = Some(pass);
                } else {
                    readers[r].push(pass);
                }
            }
        }
        edges
    }

    fn usage_of(&self, handle: ResourceHandle) -> (TextureUsage, BufferUsage) {
        let mut texture = TextureUsage::COPY_SRC;
        let mut buffer = BufferUsage::COPY_SRC | BufferUsage::COPY_DST;
        let kinds = self
            .passes
            .iter()
            .flat_map(|p| p.bindings.iter())
            .filter(|(h, _)| *h == handle)
            .map(|(_, kind)| *kind);
        for kind in kinds {
            match kind {
                BindingKind::SampledTexture => texture |= TextureUsage::SAMPLED,
                BindingKind::StorageImage => texture |= TextureUsage::STORAGE,
                BindingKind::RenderTarget | BindingKind::DepthWrite => {
                    texture |= TextureUsage::RENDER_ATTACHMENT
                }
                BindingKind::ReadOnlyBuffer | BindingKind::Raytracing => {
                    buffer |= BufferUsage::UNIFORM | BufferUsage::STORAGE
                }
                BindingKind::StorageBuffer => buffer |= BufferUsage::STORAGE,
            }
        }
        (texture, buffer)
    }

    fn allocate(&mut self, device: &Arc<dyn GraphicsDevice>, viewport_only: bool) -> Result<()> {
        for index in 0..self.resources.len() {
            let handle = ResourceHandle(index);
            let (texture_usage, buffer_usage) = self.usage_of(handle);
            let extent = self.extent;
            let entry = &mut self.resources[index];
            let resource = match entry.kind {
                ResourceKind::External => {
                    if entry.resource.is_none() {
                        bail!("External resource '{}' was never imported", entry.name);
                    }
                    continue;
                }
                ResourceKind::Texture { format, size } => {
                    if viewport_only && entry.resource.is_some() && size != TextureSize::Viewport {
                        continue;
                    }
                    let size = size.resolve(extent);
                    LaneResource::Texture(
                        GpuTexture::new(
                            device,
                            &TextureDescriptor {
                                label: Some(entry.name.as_str().into()),
                                size: Extent2D::new(size.width.max(1), size.height.max(1)),
                                mip_level_count: 1,
                                format,
                                usage: texture_usage,
                            },
                        )
                        .with_context(|| format!("Allocating texture '{}'", entry.name))?,
                    )
                }
                ResourceKind::Buffer { size } => {
                    if viewport_only && entry.resource.is_some() {
                        continue;
                    }
                    LaneResource::Buffer(
                        GpuBuffer::new(
                            device,
                            &BufferDescriptor {
                                label: Some(entry.name.as_str().into()),
                                size,
                                usage: buffer_usage,
                                mapped_at_creation: false,
                            },
                        )
                        .with_context(|| format!("Allocating buffer '{}'", entry.name))?,
                    )
                }
            };
            entry.resource = Some(resource);
            entry.state = ResourceState::Undefined;
        }
        Ok(())
    }

    fn refresh_bindings(&mut self) {
        for pass in &mut self.passes {
            let mut resources = PassResources::new();
            for &(handle, kind) in &pass.bindings {
                let entry = &self.resources[handle.0];
                if let Some(resource) = &entry.resource {
                    resources.insert(entry.name.as_str(), kind, resource.clone());
                }
            }
            pass.resources = resources;
        }
    }
}

impl std::fmt::Debug for RenderGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderGraph")
            .field(
                "passes",
                &self.passes.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            )
            .field("order", &self.order)
            .field("extent", &self.extent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_agent::{PassDesc, ResourceDesc};
    use std::sync::Mutex;
    use strata_core::config::SceneBufferConfig;
    use strata_core::math::{Vec3, FRAC_PI_2};
    use strata_core::renderer::SubmissionQueue;
    use strata_infra::SoftwareDevice;
    use strata_lanes::render_lane::PassKind;
    use strata_lanes::LaneError;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
    }

    impl RenderLane for Recorder {
        fn strategy_name(&self) -> &'static str {
            self.name
        }

        fn kind(&self) -> PassKind {
            PassKind::Compute
        }

        fn on_create(
            &mut self,
            _device: &Arc<dyn GraphicsDevice>,
            _resources: &PassResources,
        ) -> Result<(), LaneError> {
            self.log.lock().unwrap().push(format!("create {}", self.name));
            Ok(())
        }

        fn on_resize(
            &mut self,
            _device: &Arc<dyn GraphicsDevice>,
            resources: &PassResources,
            extent: Extent2D,
        ) -> Result<(), LaneError> {
            for binding in resources.iter() {
                if let LaneResource::Texture(texture) = &binding.resource {
                    assert_eq!(texture.size(), extent);
                }
            }
            self.log.lock().unwrap().push(format!("resize {}", self.name));
            Ok(())
        }

        fn render(&mut self, _frame: &mut LaneFrame<'_>) -> Result<(), LaneError> {
            self.log.lock().unwrap().push(self.name.to_string());
            Ok(())
        }
    }

    struct Failing;

    impl RenderLane for Failing {
        fn strategy_name(&self) -> &'static str {
            "failing"
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

        fn render(&mut self, _frame: &mut LaneFrame<'_>) -> Result<(), LaneError> {
            Err(LaneError::NotCreated("failing"))
        }
    }

    struct Fixture {
        device: Arc<dyn GraphicsDevice>,
        queue: SubmissionQueue,
        scene: SceneBuffers,
        culler: DepthPyramidCuller,
        camera: Camera,
        log: Log,
    }

    fn fixture() -> Fixture {
        let device: Arc<dyn GraphicsDevice> = Arc::new(SoftwareDevice::default());
        let queue = SubmissionQueue::new(device.clone(), QueueKind::Graphics).unwrap();
        let scene = SceneBuffers::new(
            &device,
            &SceneBufferConfig {
                max_meshes: 2,
                max_buffer_bytes: 256,
                max_materials: 2,
                max_instances: 2,
            },
        )
        .unwrap();
        let instances = GpuBuffer::new(
            &device,
            &BufferDescriptor {
                label: None,
                size: 256,
                usage: BufferUsage::STORAGE,
                mapped_at_creation: false,
            },
        )
        .unwrap();
        let culler =
            DepthPyramidCuller::new(&device, instances, scene.meshlet_buffer().clone(), 2).unwrap();
        let camera =
            Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, FRAC_PI_2, 1.0, 0.1, 10.0)
                .unwrap();
        Fixture {
            device,
            queue,
            scene,
            culler,
            camera,
            log: Arc::default(),
        }
    }

    impl Fixture {
        fn lane(&self, name: &'static str) -> Box<dyn RenderLane> {
            Box::new(Recorder {
                name,
                log: Arc::clone(&self.log),
            })
        }

        fn run(&self, graph: &mut RenderGraph) -> Vec<Command> {
            let mut stream = self.queue.acquire_stream();
            let inputs = FrameInputs {
                camera: &self.camera,
                culler: &self.culler,
                scene: &self.scene,
                instance_count: 0,
            };
            graph.execute(&mut stream, &inputs).unwrap();
            let commands = stream.commands().to_vec();
            self.queue.submit_and_wait(vec![stream]).unwrap();
            commands
        }

        fn take_log(&self) -> Vec<String> {
            std::mem::take(&mut *self.log.lock().unwrap())
        }
    }

    #[test]
    fn earlier_readers_precede_later_writers() {
        let fx = fixture();
        let mut graph = RenderGraph::new();
        graph.add_buffer("lights", 64);
        graph.add_texture("hdr", TextureFormat::Rgba8Unorm, TextureSize::Viewport);
        graph
            .add_pass("tonemap", fx.lane("tonemap"), &[("hdr", BindingKind::SampledTexture)])
            .unwrap();
        graph
            .add_pass(
                "shade",
                fx.lane("shade"),
                &[
                    ("lights", BindingKind::ReadOnlyBuffer),
                    ("hdr", BindingKind::RenderTarget),
                ],
            )
            .unwrap();
        graph
            .add_pass("light_cull", fx.lane("light_cull"), &[("lights", BindingKind::StorageBuffer)])
            .unwrap();
        graph.compile(&fx.device, Extent2D::new(8, 8)).unwrap();

        // Each pass reads what the next one overwrites.
        assert_eq!(graph.order_names(), vec!["tonemap", "shade", "light_cull"]);
        fx.take_log();
        fx.run(&mut graph);
        assert_eq!(fx.take_log(), vec!["tonemap", "shade", "light_cull"]);
    }

    #[test]
    fn writer_precedes_reader() {
        let fx = fixture();
        let mut graph = RenderGraph::new();
        graph.add_texture("depth", TextureFormat::Depth32Float, TextureSize::Viewport);
        graph
            .add_pass("prepass", fx.lane("prepass"), &[("depth", BindingKind::DepthWrite)])
            .unwrap();
        graph
            .add_pass("reduce", fx.lane("reduce"), &[("depth", BindingKind::SampledTexture)])
            .unwrap();
        graph.compile(&fx.device, Extent2D::new(4, 4)).unwrap();
        assert_eq!(graph.order_names(), vec!["prepass", "reduce"]);
        assert_eq!(fx.take_log(), vec!["create prepass", "create reduce"]);
    }

    #[test]
    fn barriers_follow_binding_states() {
        let fx = fixture();
        let mut graph = RenderGraph::new();
        let depth = graph.add_texture("depth", TextureFormat::Depth32Float, TextureSize::Viewport);
        graph
            .add_pass("prepass", fx.lane("prepass"), &[("depth", BindingKind::DepthWrite)])
            .unwrap();
        graph
            .add_pass("reduce", fx.lane("reduce"), &[("depth", BindingKind::SampledTexture)])
            .unwrap();
        graph.compile(&fx.device, Extent2D::new(4, 4)).unwrap();

        let transitions = |commands: &[Command]| {
            commands
                .iter()
                .filter_map(|c| match c {
                    Command::Barrier(Barrier::Image { from, to, .. }) => Some((*from, *to)),
                    _ => None,
                })
                .collect::<Vec<_>>()
        };
        let first = fx.run(&mut graph);
        assert_eq!(
            transitions(&first),
            vec![
                (ResourceState::Undefined, ResourceState::DepthWrite),
                (ResourceState::DepthWrite, ResourceState::ShaderRead),
            ]
        );
        // The next frame starts from where the last one left off.
        let second = fx.run(&mut graph);
        assert_eq!(
            transitions(&second),
            vec![
                (ResourceState::ShaderRead, ResourceState::DepthWrite),
                (ResourceState::DepthWrite, ResourceState::ShaderRead),
            ]
        );
        assert_eq!(graph.state(depth), Some(ResourceState::ShaderRead));
    }

    #[test]
    fn failed_frames_roll_back_tracked_states() {
        let fx = fixture();
        let mut graph = RenderGraph::new();
        let color = graph.add_texture("color", TextureFormat::Rgba8Unorm, TextureSize::Viewport);
        graph
            .add_pass("draw", fx.lane("draw"), &[("color", BindingKind::RenderTarget)])
            .unwrap();
        graph
            .add_pass("post", Box::new(Failing), &[("color", BindingKind::SampledTexture)])
            .unwrap();
        graph.compile(&fx.device, Extent2D::new(4, 4)).unwrap();
        let before = graph.state(color);

        let mut stream = fx.queue.acquire_stream();
        let inputs = FrameInputs {
            camera: &fx.camera,
            culler: &fx.culler,
            scene: &fx.scene,
            instance_count: 0,
        };
        let err = graph.execute(&mut stream, &inputs).unwrap_err();
        assert!(format!("{err:#}").contains("Recording pass 'post'"));
        assert_eq!(before, Some(ResourceState::Undefined));
        assert_eq!(graph.state(color), before);
        fx.queue.release_stream(stream);
    }

    #[test]
    fn crossed_buffers_keep_declaration_order() {
        let fx = fixture();
        let mut graph = RenderGraph::new();
        graph.add_buffer("a", 16);
        graph.add_buffer("b", 16);
        graph
            .add_pass(
                "first",
                fx.lane("first"),
                &[("a", BindingKind::StorageBuffer), ("b", BindingKind::ReadOnlyBuffer)],
            )
            .unwrap();
        graph
            .add_pass(
                "second",
                fx.lane("second"),
                &[("a", BindingKind::ReadOnlyBuffer), ("b", BindingKind::StorageBuffer)],
            )
            .unwrap();
        graph.compile(&fx.device, Extent2D::new(1, 1)).unwrap();
        assert_eq!(graph.order_names(), vec!["first", "second"]);
    }

    #[test]
    fn unknown_resources_and_duplicates_are_rejected() {
        let fx = fixture();
        let mut graph = RenderGraph::new();
        assert!(graph
            .add_pass("p", fx.lane("p"), &[("missing", BindingKind::StorageBuffer)])
            .is_err());
        graph.add_pass("p", fx.lane("p"), &[]).unwrap();
        assert!(graph.add_pass("p", fx.lane("p"), &[]).is_err());
    }

    #[test]
    fn externals_must_be_imported() {
        let fx = fixture();
        let mut desc = RenderGraphDesc::default();
        desc.resources.push(ResourceDesc {
            name: "commands".into(),
            kind: ResourceKind::External,
        });
        let mut graph = RenderGraph::from_desc(&desc, &LaneRegistry::new()).unwrap();
        assert!(graph.compile(&fx.device, Extent2D::new(1, 1)).is_err());

        graph.import_buffer("commands", fx.culler.commands().clone());
        graph.compile(&fx.device, Extent2D::new(1, 1)).unwrap();
        assert_eq!(
            graph.buffer("commands").map(GpuBuffer::id),
            Some(fx.culler.commands().id())
        );
    }

    #[test]
    fn resize_reallocates_viewport_textures_only() {
        let fx = fixture();
        let mut graph = RenderGraph::new();
        graph.add_texture("color", TextureFormat::Rgba8Unorm, TextureSize::Viewport);
        graph.add_texture(
            "lut",
            TextureFormat::Rgba8Unorm,
            TextureSize::Fixed {
                width: 4,
                height: 4,
            },
        );
        graph
            .add_pass("draw", fx.lane("draw"), &[("color", BindingKind::RenderTarget)])
            .unwrap();
        assert!(graph.resize(Extent2D::new(2, 2)).is_err());
        graph.compile(&fx.device, Extent2D::new(8, 8)).unwrap();
        let lut = graph.texture("lut").unwrap().id();
        fx.take_log();

        graph.resize(Extent2D::new(16, 8)).unwrap();
        assert_eq!(graph.texture("color").unwrap().size(), Extent2D::new(16, 8));
        assert_eq!(graph.texture("lut").unwrap().id(), lut);
        assert_eq!(fx.take_log(), vec!["resize draw"]);

        // Same extent: nothing to do.
        graph.resize(Extent2D::new(16, 8)).unwrap();
        assert!(fx.take_log().is_empty());
    }

    #[test]
    fn unknown_lanes_fail_instantiation() {
        let desc = RenderGraphDesc {
            resources: Vec::new(),
            passes: vec![PassDesc {
                name: "p".into(),
                lane: "nope".into(),
                bindings: Vec::new(),
            }],
        };
        assert!(RenderGraph::from_desc(&desc, &LaneRegistry::with_defaults()).is_err());
    }
}
