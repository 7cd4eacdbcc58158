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

//! The [`DepthPyramidCuller`].

use super::frustum::Frustum;
use super::kernels::{cull_bindings, reduce_bindings, DepthReduceKernel, InstanceCullKernel};
use super::{
    divide_rounding_up, mip_count, round_up_to_power_of_two, CULL_WORKGROUP_SIZE,
    PYRAMID_TILE_SIZE,
};
use crate::error::CullError;
use std::mem::size_of;
use std::sync::Arc;
use strata_core::math::Extent2D;
use strata_core::renderer::api::*;
use strata_core::renderer::{
    Binding, CommandStream, ComputePipeline, GpuBuffer, GpuSampler, GpuTexture, GraphicsDevice,
};

/// Shader sources of the two culling pipelines.
///
/// The default runs the host kernels, which is what the software device
/// executes. A GPU backend passes its SPIR-V modules instead.
#[derive(Debug, Clone)]
pub struct CullShaders {
    /// Builds one pyramid level from the level below.
    pub reduce: ShaderSource,
    /// Culls instances and emits draw commands.
    pub cull: ShaderSource,
}

impl Default for CullShaders {
    fn default() -> Self {
        Self {
            reduce: ShaderSource::Host(Arc::new(DepthReduceKernel)),
            cull: ShaderSource::Host(Arc::new(InstanceCullKernel)),
        }
    }
}

/// A square min-depth mip chain and its min-reduction sampler.
#[derive(Debug)]
pub struct DepthPyramid {
    texture: GpuTexture,
    sampler: GpuSampler,
    views: Vec<TextureViewId>,
    size: u32,
    levels: u32,
}

impl DepthPyramid {
    /// The `R32Float` image.
    pub fn texture(&self) -> &GpuTexture {
        &self.texture
    }

    /// The min-reduction sampler.
    pub fn sampler(&self) -> &GpuSampler {
        &self.sampler
    }

    /// Width and height of level 0.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of levels.
    pub fn levels(&self) -> u32 {
        self.levels
    }

    /// Width and height of `level`.
    pub fn level_size(&self, level: u32) -> u32 {
        self.size.checked_shr(level).unwrap_or(0).max(1)
    }

    /// The single-level view of `level`.
    pub fn view(&self, level: u32) -> Option<TextureViewId> {
        self.views.get(level as usize).copied()
    }
}

/// Builds the depth pyramid each frame and rewrites the indirect draw list.
///
/// The culler reads the instance and meshlet buffers it was created with and
/// owns the outputs: the packed [`DrawCommand`] buffer, the visible count and
/// the frustum uniform.
#[derive(Debug)]
pub struct DepthPyramidCuller {
    device: Arc<dyn GraphicsDevice>,
    reduce: ComputePipeline,
    cull: ComputePipeline,
    instances: GpuBuffer,
    meshlets: GpuBuffer,
    commands: GpuBuffer,
    count: GpuBuffer,
    frustum: GpuBuffer,
    pyramid: Option<DepthPyramid>,
    max_instances: u32,
}

impl DepthPyramidCuller {
    /// Creates a culler running the host kernels.
    pub fn new(
        device: &Arc<dyn GraphicsDevice>,
        instances: GpuBuffer,
        meshlets: GpuBuffer,
        max_instances: u32,
    ) -> Result<Self, CullError> {
        Self::with_shaders(device, instances, meshlets, max_instances, CullShaders::default())
    }

    /// Creates a culler with explicit shader sources.
    ///
    /// ## Errors
    /// `CullError::Resource` when a pipeline or buffer cannot be created.
    pub fn with_shaders(
        device: &Arc<dyn GraphicsDevice>,
        instances: GpuBuffer,
        meshlets: GpuBuffer,
        max_instances: u32,
        shaders: CullShaders,
    ) -> Result<Self, CullError> {
        let reduce = ComputePipeline::new(
            device,
            &ComputePipelineDescriptor {
                label: Some("depth reduce".into()),
                shader: shaders.reduce,
                entry_point: "main".into(),
                push_constant_size: 0,
            },
        )?;
        let cull = ComputePipeline::new(
            device,
            &ComputePipelineDescriptor {
                label: Some("instance cull".into()),
                shader: shaders.cull,
                entry_point: "main".into(),
                push_constant_size: 0,
            },
        )?;

        let commands = GpuBuffer::new(
            device,
            &BufferDescriptor {
                label: Some("draw commands".into()),
                size: max_instances.max(1) as u64 * size_of::<DrawCommand>() as u64,
                usage: BufferUsage::STORAGE | BufferUsage::INDIRECT | BufferUsage::COPY_SRC,
                mapped_at_creation: false,
            },
        )?;
        let count = GpuBuffer::new(
            device,
            &BufferDescriptor {
                label: Some("draw count".into()),
                size: 4,
                usage: BufferUsage::STORAGE
                    | BufferUsage::INDIRECT
                    | BufferUsage::COPY_DST
                    | BufferUsage::MAP_READ,
                mapped_at_creation: false,
            },
        )?;
        let frustum = GpuBuffer::new(
            device,
            &BufferDescriptor {
                label: Some("frustum".into()),
                size: size_of::<FrustumUniform>() as u64,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            },
        )?;

        Ok(Self {
            device: device.clone(),
            reduce,
            cull,
            instances,
            meshlets,
            commands,
            count,
            frustum,
            pyramid: None,
            max_instances,
        })
    }

    /// (Re)allocates the pyramid for a viewport of `extent`.
    ///
    /// An empty extent (a minimized window) keeps the current pyramid.
    pub fn create_depth_pyramid(&mut self, extent: Extent2D) -> Result<(), CullError> {
        if extent.is_empty() {
            log::debug!("Ignoring depth pyramid resize to an empty extent.");
            return Ok(());
        }
        let size = round_up_to_power_of_two(extent.max_dimension());
        let levels = mip_count(size);

        let texture = GpuTexture::new(
            &self.device,
            &TextureDescriptor {
                label: Some("depth pyramid".into()),
                size: Extent2D::new(size, size),
                mip_level_count: levels,
                format: TextureFormat::R32Float,
                usage: TextureUsage::STORAGE | TextureUsage::SAMPLED,
            },
        )?;
        let views = (0..levels)
            .map(|level| texture.view(level, 1))
            .collect::<Result<Vec<_>, _>>()?;
        let sampler = GpuSampler::new(
            &self.device,
            &SamplerDescriptor {
                label: Some("depth pyramid min".into()),
                filter: FilterMode::Linear,
                address_mode: AddressMode::ClampToEdge,
                max_lod: levels as f32,
                reduction: SamplerReduction::Min,
            },
        )?;

        log::info!(
            "Depth pyramid created: {size}x{size}, {levels} level(s) for a {}x{} viewport.",
            extent.width,
            extent.height
        );
        self.pyramid = Some(DepthPyramid {
            texture,
            sampler,
            views,
            size,
            levels,
        });
        Ok(())
    }

    /// Records the downsampling of `depth` into every pyramid level.
    ///
    /// `depth` is expected in the depth-write state and is restored to it.
    ///
    /// ## Errors
    /// `CullError::PyramidMissing` before [`create_depth_pyramid`](Self::create_depth_pyramid).
    pub fn render_depth_pyramid(
        &self,
        depth: &GpuTexture,
        stream: &mut CommandStream,
    ) -> Result<(), CullError> {
        let pyramid = self.pyramid.as_ref().ok_or(CullError::PyramidMissing)?;
        let texture = &pyramid.texture;

        stream.image_barrier(depth, 0..1, ResourceState::DepthWrite, ResourceState::ShaderRead);
        stream.image_barrier(
            texture,
            0..pyramid.levels,
            ResourceState::Undefined,
            ResourceState::General,
        );

        for level in 0..pyramid.levels {
            debug_assert!(
                level < texture.mip_level_count(),
                "pyramid level {level} beyond the allocated mip chain"
            );
            let source = if level == 0 {
                Binding::SampledImage {
                    binding: reduce_bindings::SOURCE,
                    texture: depth,
                    base_mip_level: 0,
                    mip_level_count: 1,
                    sampler: &pyramid.sampler,
                }
            } else {
                Binding::SampledImage {
                    binding: reduce_bindings::SOURCE,
                    texture,
                    base_mip_level: level - 1,
                    mip_level_count: 1,
                    sampler: &pyramid.sampler,
                }
            };
            let groups = divide_rounding_up(pyramid.level_size(level), PYRAMID_TILE_SIZE);
            stream.dispatch(
                &self.reduce,
                &[
                    source,
                    Binding::StorageImage {
                        binding: reduce_bindings::DESTINATION,
                        texture,
                        mip_level: level,
                    },
                ],
                &[],
                [groups, groups, 1],
            );
            stream.image_barrier(
                texture,
                level..level + 1,
                ResourceState::General,
                ResourceState::ShaderRead,
            );
        }

        stream.image_barrier(depth, 0..1, ResourceState::ShaderRead, ResourceState::DepthWrite);
        Ok(())
    }

    /// Records the culling of the first `instance_count` instances.
    ///
    /// `pre_pass` selects the frustum-only test: the pyramid of the current
    /// frame does not exist yet when the depth prepass draws.
    ///
    /// ## Errors
    /// * `CullError::TooManyInstances` - More instances than command slots.
    /// * `CullError::PyramidMissing` - Occlusion requested without a pyramid.
    /// * `CullError::DegenerateCamera` - The camera matrix is singular.
    pub fn dispatch(
        &self,
        stream: &mut CommandStream,
        camera: &Camera,
        instance_count: u32,
        pre_pass: bool,
    ) -> Result<(), CullError> {
        if instance_count > self.max_instances {
            return Err(CullError::TooManyInstances {
                count: instance_count,
                capacity: self.max_instances,
            });
        }
        let (cull, pyramid) = if pre_pass {
            (CULL_FRUSTUM_ONLY, None)
        } else {
            let pyramid = self.pyramid.as_ref().ok_or(CullError::PyramidMissing)?;
            (CULL_OCCLUSION, Some(pyramid))
        };
        let uniform = frustum_uniform(camera, instance_count, cull, self.pyramid.as_ref())?;

        stream.update_buffer(&self.frustum, 0, bytemuck::bytes_of(&uniform));
        stream.fill_buffer(&self.count, 0, 4, 0);
        stream.buffer_barrier(&self.frustum, ResourceState::TransferDst, ResourceState::ShaderRead);
        stream.buffer_barrier(&self.count, ResourceState::TransferDst, ResourceState::StorageWrite);

        let mut bindings = vec![
            Binding::Buffer {
                binding: cull_bindings::FRUSTUM,
                buffer: &self.frustum,
            },
            Binding::Buffer {
                binding: cull_bindings::INSTANCES,
                buffer: &self.instances,
            },
            Binding::Buffer {
                binding: cull_bindings::MESHLETS,
                buffer: &self.meshlets,
            },
            Binding::Buffer {
                binding: cull_bindings::COMMANDS,
                buffer: &self.commands,
            },
            Binding::Buffer {
                binding: cull_bindings::COUNT,
                buffer: &self.count,
            },
        ];
        if let Some(pyramid) = pyramid {
            bindings.push(Binding::SampledImage {
                binding: cull_bindings::PYRAMID,
                texture: &pyramid.texture,
                base_mip_level: 0,
                mip_level_count: pyramid.levels,
                sampler: &pyramid.sampler,
            });
        }

        let groups = divide_rounding_up(instance_count, CULL_WORKGROUP_SIZE).max(1);
        stream.dispatch(&self.cull, &bindings, &[], [groups, 1, 1]);

        stream.buffer_barrier(
            &self.commands,
            ResourceState::StorageWrite,
            ResourceState::IndirectArgument,
        );
        stream.buffer_barrier(
            &self.count,
            ResourceState::StorageWrite,
            ResourceState::IndirectArgument,
        );
        log::trace!(
            "Recorded {} cull of {instance_count} instance(s) in {groups} workgroup(s).",
            if pre_pass { "prepass" } else { "occlusion" }
        );
        Ok(())
    }

    /// Reads the visible count back. Only meaningful once the dispatch finished.
    pub fn visible_count(&self) -> Result<u32, CullError> {
        let count = self.count.read_pod::<u32>(0, 1)?;
        Ok(count.first().copied().unwrap_or(0))
    }

    /// Reads the emitted draw commands back.
    pub fn draw_commands(&self) -> Result<Vec<DrawCommand>, CullError> {
        let count = self.visible_count()?.min(self.max_instances) as usize;
        Ok(self.commands.read_pod::<DrawCommand>(0, count)?)
    }

    /// The packed draw commands.
    pub fn commands(&self) -> &GpuBuffer {
        &self.commands
    }

    /// The visible count, first `u32` of the buffer.
    pub fn count(&self) -> &GpuBuffer {
        &self.count
    }

    /// The frustum uniform buffer.
    pub fn frustum(&self) -> &GpuBuffer {
        &self.frustum
    }

    /// The pyramid, once created.
    pub fn pyramid(&self) -> Option<&DepthPyramid> {
        self.pyramid.as_ref()
    }

    /// Command slots, the largest instance count accepted.
    pub fn max_instances(&self) -> u32 {
        self.max_instances
    }
}

/// Fills the uniform block for one dispatch.
///
/// ## Errors
/// `CullError::DegenerateCamera` when `proj * view` cannot be inverted.
pub fn frustum_uniform(
    camera: &Camera,
    instance_count: u32,
    cull: u32,
    pyramid: Option<&DepthPyramid>,
) -> Result<FrustumUniform, CullError> {
    let view_proj = camera.view_proj();
    let frustum = Frustum::from_matrix(&view_proj).ok_or(CullError::DegenerateCamera)?;
    let (size, levels) = pyramid.map_or((0, 0), |p| (p.size, p.levels));
    Ok(FrustumUniform {
        planes: frustum.planes.map(|p| p.to_array()),
        corners: frustum.corners.map(|c| [c.x, c.y, c.z, 1.0]),
        view_proj: view_proj.to_cols_array_2d(),
        pyramid_size: [size as f32, size as f32],
        num: instance_count,
        cull,
        camera_id: camera.id,
        pyramid_levels: levels,
        _pad: [0; 2],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_lane::InstanceBuffer;
    use strata_core::math::{Aabb, BoundingSphere, Mat4, Vec3, FRAC_PI_2};
    use strata_core::renderer::SubmissionQueue;
    use strata_infra::SoftwareDevice;

    struct Fixture {
        soft: Arc<SoftwareDevice>,
        device: Arc<dyn GraphicsDevice>,
        queue: SubmissionQueue,
        instances: InstanceBuffer,
        culler: DepthPyramidCuller,
    }

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
        Camera::look_at(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), FRAC_PI_2, 1.0, 0.1, 100.0).unwrap()
    }

    fn fixture(max_instances: u32) -> Fixture {
        let soft = Arc::new(SoftwareDevice::default());
        let device: Arc<dyn GraphicsDevice> = soft.clone();
        let queue = SubmissionQueue::new(device.clone(), QueueKind::Graphics).unwrap();
        let instances = InstanceBuffer::new(&device, max_instances).unwrap();
        let meshlets = GpuBuffer::with_data(
            &device,
            "meshlets",
            BufferUsage::STORAGE,
            bytemuck::bytes_of(&cube().meshlet()),
        )
        .unwrap();
        let culler =
            DepthPyramidCuller::new(&device, instances.buffer().clone(), meshlets, max_instances)
                .unwrap();
        Fixture {
            soft,
            device,
            queue,
            instances,
            culler,
        }
    }

    impl Fixture {
        fn place(&mut self, positions: &[Vec3]) {
            for p in positions {
                self.instances
                    .push(GpuInstance::new(Mat4::from_translation(*p), 0, &cube()))
                    .unwrap();
            }
            let mut stream = self.queue.acquire_stream();
            self.instances.flush(&mut stream);
            self.queue.submit_and_wait(vec![stream]).unwrap();
            self.instances.mark_flushed();
        }

        fn depth(&self, size: Extent2D, texels: &[f32]) -> GpuTexture {
            let depth = GpuTexture::new(
                &self.device,
                &TextureDescriptor {
                    label: Some("depth".into()),
                    size,
                    mip_level_count: 1,
                    format: TextureFormat::Depth32Float,
                    usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::SAMPLED,
                },
            )
            .unwrap();
            depth.write_level(0, bytemuck::cast_slice(texels)).unwrap();
            depth
        }

        fn build_pyramid(&self, depth: &GpuTexture) {
            let mut stream = self.queue.acquire_stream();
            self.culler.render_depth_pyramid(depth, &mut stream).unwrap();
            self.queue.submit_and_wait(vec![stream]).unwrap();
        }

        fn cull(&self, pre_pass: bool) -> Vec<DrawCommand> {
            let mut stream = self.queue.acquire_stream();
            self.culler
                .dispatch(&mut stream, &camera(), self.instances.len(), pre_pass)
                .unwrap();
            self.queue.submit_and_wait(vec![stream]).unwrap();
            self.culler.draw_commands().unwrap()
        }
    }

    fn level(texture: &GpuTexture, mip: u32) -> Vec<f32> {
        bytemuck::pod_collect_to_vec(&texture.read_level(mip).unwrap())
    }

    #[test]
    fn pyramid_size_follows_the_viewport() {
        let mut f = fixture(4);
        f.culler.create_depth_pyramid(Extent2D::new(800, 600)).unwrap();
        let pyramid = f.culler.pyramid().unwrap();
        assert_eq!(pyramid.size(), 1024);
        assert_eq!(pyramid.levels(), 11);
        assert_eq!(pyramid.texture().mip_level_count(), 11);
        assert_eq!(pyramid.level_size(10), 1);
        assert!(pyramid.view(10).is_some());

        f.culler.create_depth_pyramid(Extent2D::new(0, 0)).unwrap();
        assert_eq!(f.culler.pyramid().unwrap().size(), 1024);
    }

    #[test]
    fn each_level_is_the_minimum_of_its_footprint() {
        let mut f = fixture(4);
        f.culler.create_depth_pyramid(Extent2D::new(8, 8)).unwrap();
        let texels: Vec<f32> = (0..64u32)
            .map(|i| {
                let (x, y) = (i % 8, i / 8);
                if (x + y) % 2 == 0 {
                    0.9 - (x * 8 + y) as f32 * 0.001
                } else {
                    0.2 + (x * 3 + y * 5) as f32 * 0.01
                }
            })
            .collect();
        let depth = f.depth(Extent2D::new(8, 8), &texels);
        f.build_pyramid(&depth);

        let pyramid = f.culler.pyramid().unwrap();
        let mut below = level(pyramid.texture(), 0);
        assert_eq!(below, texels);
        for mip in 1..pyramid.levels() {
            let width = pyramid.level_size(mip) as usize;
            let current = level(pyramid.texture(), mip);
            for y in 0..width {
                for x in 0..width {
                    let at = |dx: usize, dy: usize| below[(2 * y + dy) * 2 * width + 2 * x + dx];
                    let expected = at(0, 0).min(at(1, 0)).min(at(0, 1)).min(at(1, 1));
                    assert_eq!(current[y * width + x], expected, "level {mip} texel {x},{y}");
                }
            }
            below = current;
        }
        assert_eq!(
            f.soft.texture_state(depth.id(), 0),
            Some(ResourceState::DepthWrite)
        );
    }

    #[test]
    fn zero_instances_dispatch_one_workgroup() {
        let f = fixture(4);
        let mut stream = f.queue.acquire_stream();
        f.culler.dispatch(&mut stream, &camera(), 0, true).unwrap();
        let groups = stream.commands().iter().find_map(|c| match c {
            Command::Dispatch { workgroups, .. } => Some(*workgroups),
            _ => None,
        });
        assert_eq!(groups, Some([1, 1, 1]));
        f.queue.submit_and_wait(vec![stream]).unwrap();
        assert_eq!(f.culler.visible_count().unwrap(), 0);
    }

    #[test]
    fn frustum_pass_keeps_exactly_the_visible_instances() {
        let mut f = fixture(8);
        f.place(&[
            Vec3::new(0.0, 0.0, -10.0),
            Vec3::new(3.0, 0.0, -20.0),
            Vec3::new(-5.0, 1.0, -30.0),
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(50.0, 0.0, -5.0),
            Vec3::new(0.0, 0.0, -200.0),
        ]);

        let draws = f.cull(true);
        assert!(draws.len() <= f.instances.len() as usize);
        let kept: Vec<u32> = draws.iter().map(|d| d.base_instance).collect();
        assert_eq!(kept, vec![0, 1, 2]);
        for (slot, draw) in draws.iter().enumerate() {
            assert_eq!(draw.draw_id, slot as u32);
            assert_eq!(draw.index_count, 36);
            assert_eq!(draw.instance_count, 1);
        }
    }

    #[test]
    fn nothing_in_the_frustum_yields_no_draws() {
        let mut f = fixture(4);
        f.place(&[Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, -40.0, 2.0)]);
        assert!(f.cull(true).is_empty());
    }

    #[test]
    fn occluded_instance_is_culled_only_with_occlusion() {
        let mut f = fixture(4);
        f.place(&[Vec3::new(0.0, 0.0, -10.0)]);
        f.culler.create_depth_pyramid(Extent2D::new(64, 64)).unwrap();

        let near_wall = f.depth(Extent2D::new(64, 64), &[0.1; 64 * 64]);
        f.build_pyramid(&near_wall);
        assert_eq!(f.cull(true).len(), 1);
        assert!(f.cull(false).is_empty());

        let clear = f.depth(Extent2D::new(64, 64), &[1.0; 64 * 64]);
        f.build_pyramid(&clear);
        assert_eq!(f.cull(false).len(), 1);
    }

    #[test]
    fn occlusion_pass_requires_a_pyramid() {
        let f = fixture(4);
        let mut stream = f.queue.acquire_stream();
        let result = f.culler.dispatch(&mut stream, &camera(), 0, false);
        assert_eq!(result, Err(CullError::PyramidMissing));
    }

    #[test]
    fn instance_count_is_bounded_by_capacity() {
        let f = fixture(2);
        let mut stream = f.queue.acquire_stream();
        let result = f.culler.dispatch(&mut stream, &camera(), 3, true);
        assert_eq!(
            result,
            Err(CullError::TooManyInstances {
                count: 3,
                capacity: 2
            })
        );
    }
}
