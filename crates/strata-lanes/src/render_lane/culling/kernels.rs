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

//! Host implementations of the two culling compute shaders.
//!
//! They follow the dispatch semantics of their GPU counterparts: work is
//! split in workgroups and a thread outside the dispatch never runs.

use super::frustum::Frustum;
use super::{CULL_WORKGROUP_SIZE, PYRAMID_TILE_SIZE};
use std::mem::size_of;
use strata_core::math::{Aabb, Vec3, Vec4};
use strata_core::renderer::api::*;
use strata_core::renderer::KernelError;

/// Bindings of [`DepthReduceKernel`].
pub mod reduce_bindings {
    /// The source level, sampled through the min-reduction sampler.
    pub const SOURCE: u32 = 0;
    /// The destination level, a storage image.
    pub const DESTINATION: u32 = 1;
}

/// Bindings of [`InstanceCullKernel`].
pub mod cull_bindings {
    /// The [`FrustumUniform`](strata_core::renderer::api::FrustumUniform).
    pub const FRUSTUM: u32 = 0;
    /// The instance buffer.
    pub const INSTANCES: u32 = 1;
    /// The meshlet buffer.
    pub const MESHLETS: u32 = 2;
    /// The compacted draw commands.
    pub const COMMANDS: u32 = 3;
    /// The visible count.
    pub const COUNT: u32 = 4;
    /// The depth pyramid, only bound for occlusion passes.
    pub const PYRAMID: u32 = 5;
}

/// Writes one pyramid level from the level below.
///
/// Each thread of a 32×32 tile samples the source at the center of its
/// destination texel. With a min-reduction sampler that point is the shared
/// corner of a 2×2 footprint, so the result is the footprint minimum.
#[derive(Debug, Default)]
pub struct DepthReduceKernel;

impl HostKernel for DepthReduceKernel {
    fn name(&self) -> &str {
        "depth_reduce"
    }

    fn dispatch(
        &self,
        workgroups: [u32; 3],
        _push_constants: &[u8],
        resources: &mut [KernelResource],
    ) -> Result<(), KernelError> {
        let [source, destination] = resources else {
            return Err(KernelError::BindingMismatch {
                index: resources.len(),
                expected: "source and destination images",
            });
        };
        let source = source
            .as_sampled_image()
            .ok_or(KernelError::BindingMismatch {
                index: reduce_bindings::SOURCE as usize,
                expected: "sampled image",
            })?;
        let destination = destination
            .as_storage_image_mut()
            .ok_or(KernelError::BindingMismatch {
                index: reduce_bindings::DESTINATION as usize,
                expected: "storage image",
            })?;

        let (width, height) = (destination.width, destination.height);
        let threads_x = (workgroups[0] * PYRAMID_TILE_SIZE).min(width);
        let threads_y = (workgroups[1] * PYRAMID_TILE_SIZE).min(height);
        for y in 0..threads_y {
            for x in 0..threads_x {
                let uv = [
                    (x as f32 + 0.5) / width as f32,
                    (y as f32 + 0.5) / height as f32,
                ];
                destination.set(x, y, source.sample_level(uv, 0.0));
            }
        }
        Ok(())
    }
}

/// Tests every instance against the frustum and, in occlusion passes,
/// against the depth pyramid, appending a [`DrawCommand`] per survivor.
#[derive(Debug, Default)]
pub struct InstanceCullKernel;

impl InstanceCullKernel {
    /// The frustum-then-occlusion test of one instance.
    pub fn is_visible(
        frustum: &Frustum,
        uniform: &FrustumUniform,
        instance: &GpuInstance,
        pyramid: Option<&SampledImage>,
    ) -> bool {
        let model = instance.transform();
        let aabb = instance.local_aabb().transform(&model);
        let sphere = instance.local_sphere().transform(&model);
        if !frustum.intersects_sphere(&sphere) || !frustum.intersects_aabb(&aabb) {
            return false;
        }
        match pyramid {
            Some(pyramid) if uniform.cull != CULL_FRUSTUM_ONLY => {
                !is_occluded(uniform, &aabb, pyramid)
            }
            _ => true,
        }
    }
}

/// Projects the box and compares its nearest depth with the pyramid.
fn is_occluded(uniform: &FrustumUniform, aabb: &Aabb, pyramid: &SampledImage) -> bool {
    let view_proj = strata_core::math::Mat4::from_cols_array_2d(&uniform.view_proj);
    let mut min = Vec3::splat(f32::INFINITY);
    let mut max = Vec3::splat(f32::NEG_INFINITY);
    for corner in aabb.corners() {
        let clip = view_proj * Vec4::from_vec3(corner, 1.0);
        if clip.w <= strata_core::math::EPSILON {
            // Crosses the eye plane: the projection is meaningless, keep it.
            return false;
        }
        let ndc = clip.truncate() / clip.w;
        min = min.min(ndc);
        max = max.max(ndc);
    }

    // Screen y grows downwards.
    let uv_min = [
        (min.x * 0.5 + 0.5).clamp(0.0, 1.0),
        (0.5 - 0.5 * max.y).clamp(0.0, 1.0),
    ];
    let uv_max = [
        (max.x * 0.5 + 0.5).clamp(0.0, 1.0),
        (0.5 - 0.5 * min.y).clamp(0.0, 1.0),
    ];
    let width = (uv_max[0] - uv_min[0]) * uniform.pyramid_size[0];
    let height = (uv_max[1] - uv_min[1]) * uniform.pyramid_size[1];
    let extent = width.max(height);
    let last = uniform.pyramid_levels.saturating_sub(1) as f32;
    let level = if extent > 1.0 {
        extent.log2().ceil().min(last)
    } else {
        0.0
    };

    let center = [
        (uv_min[0] + uv_max[0]) * 0.5,
        (uv_min[1] + uv_max[1]) * 0.5,
    ];
    let occluder = pyramid.sample_level(center, level);
    min.z > occluder
}

impl HostKernel for InstanceCullKernel {
    fn name(&self) -> &str {
        "instance_cull"
    }

    fn dispatch(
        &self,
        workgroups: [u32; 3],
        _push_constants: &[u8],
        resources: &mut [KernelResource],
    ) -> Result<(), KernelError> {
        let buffer = |resources: &[KernelResource], binding: u32| -> Result<Vec<u8>, KernelError> {
            resources
                .get(binding as usize)
                .and_then(KernelResource::as_buffer)
                .map(<[u8]>::to_vec)
                .ok_or(KernelError::BindingMismatch {
                    index: binding as usize,
                    expected: "buffer",
                })
        };

        let uniform_bytes = buffer(resources, cull_bindings::FRUSTUM)?;
        if uniform_bytes.len() < size_of::<FrustumUniform>() {
            return Err(KernelError::Execution(format!(
                "frustum uniform holds {} bytes",
                uniform_bytes.len()
            )));
        }
        let uniform: FrustumUniform =
            bytemuck::pod_read_unaligned(&uniform_bytes[..size_of::<FrustumUniform>()]);
        let frustum = Frustum::from_uniform(&uniform);

        let occlusion = uniform.cull != CULL_FRUSTUM_ONLY;
        let pyramid = if occlusion {
            let image = resources
                .get(cull_bindings::PYRAMID as usize)
                .and_then(KernelResource::as_sampled_image)
                .ok_or(KernelError::BindingMismatch {
                    index: cull_bindings::PYRAMID as usize,
                    expected: "sampled depth pyramid",
                })?;
            Some(image)
        } else {
            None
        };

        let survivors = {
            let instances: Vec<GpuInstance> =
                bytemuck::pod_collect_to_vec(&buffer(resources, cull_bindings::INSTANCES)?);
            let meshlets: Vec<GpuMeshlet> =
                bytemuck::pod_collect_to_vec(&buffer(resources, cull_bindings::MESHLETS)?);
            let threads = workgroups[0] as usize * CULL_WORKGROUP_SIZE as usize;
            let count = (uniform.num as usize).min(threads).min(instances.len());

            let mut survivors = Vec::new();
            for (index, instance) in instances.iter().enumerate().take(count) {
                let Some(meshlet) = meshlets.get(instance.mesh_id as usize) else {
                    continue;
                };
                if Self::is_visible(&frustum, &uniform, instance, pyramid) {
                    survivors.push((index as u32, *meshlet));
                }
            }
            survivors
        };

        let counter = resources
            .get_mut(cull_bindings::COUNT as usize)
            .and_then(KernelResource::as_buffer_mut)
            .filter(|b| b.len() >= 4)
            .ok_or(KernelError::BindingMismatch {
                index: cull_bindings::COUNT as usize,
                expected: "count buffer",
            })?;
        let mut count = bytemuck::pod_read_unaligned::<u32>(&counter[..4]);
        let first = count;

        let commands = resources
            .get_mut(cull_bindings::COMMANDS as usize)
            .and_then(KernelResource::as_buffer_mut)
            .ok_or(KernelError::BindingMismatch {
                index: cull_bindings::COMMANDS as usize,
                expected: "command buffer",
            })?;
        let stride = size_of::<DrawCommand>();
        let slots = (commands.len() / stride) as u32;
        for (instance, meshlet) in survivors {
            if count >= slots {
                break;
            }
            let command = DrawCommand {
                index_count: meshlet.index_count,
                instance_count: 1,
                first_index: meshlet.first_index,
                base_vertex: meshlet.vertex_offset as i32,
                base_instance: instance,
                draw_id: count,
            };
            let offset = count as usize * stride;
            commands[offset..offset + stride].copy_from_slice(bytemuck::bytes_of(&command));
            count += 1;
        }

        if let Some(counter) = resources
            .get_mut(cull_bindings::COUNT as usize)
            .and_then(KernelResource::as_buffer_mut)
        {
            counter[..4].copy_from_slice(&count.to_le_bytes());
        }
        log::trace!("Culling kept {} instance(s).", count - first);
        Ok(())
    }
}
