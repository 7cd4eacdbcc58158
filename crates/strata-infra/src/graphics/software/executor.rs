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

//! Validation and CPU execution of recorded command lists.

use super::resources::{byte_range, Resources};
use super::DeviceStats;
use std::mem::size_of;
use strata_core::renderer::api::*;
use strata_core::renderer::{KernelError, ResourceError};

/// Checks every handle and every statically known range of `command`.
///
/// Runs at submit time so configuration bugs surface as an error from
/// `submit` rather than as a silent failure on the device timeline.
pub(crate) fn validate(res: &Resources, command: &Command) -> Result<(), ResourceError> {
    match command {
        Command::CopyBuffer { src, dst, regions } => {
            let src_len = res.buffer(*src)?.data.len();
            let dst_len = res.buffer(*dst)?.data.len();
            for region in regions {
                byte_range(src_len, region.src_offset, region.size)?;
                byte_range(dst_len, region.dst_offset, region.size)?;
            }
        }
        Command::CopyBufferToTexture {
            src,
            src_offset,
            dst,
            mip_level,
        } => {
            let src_len = res.buffer(*src)?.data.len();
            let texture = res.texture(*dst)?;
            texture.check_mips(&(*mip_level..*mip_level + 1))?;
            let level_len = texture.levels[*mip_level as usize].len() as u64;
            byte_range(src_len, *src_offset, level_len)?;
        }
        Command::FillBuffer {
            buffer,
            offset,
            size,
            ..
        } => {
            if size % 4 != 0 {
                return Err(ResourceError::InvalidUsage(format!(
                    "fill size {size} is not a multiple of 4"
                )));
            }
            byte_range(res.buffer(*buffer)?.data.len(), *offset, *size)?;
        }
        Command::UpdateBuffer {
            buffer,
            offset,
            data,
        } => {
            byte_range(res.buffer(*buffer)?.data.len(), *offset, data.len() as u64)?;
        }
        Command::Barrier(Barrier::Image { texture, mips, .. }) => {
            res.texture(*texture)?.check_mips(mips)?;
        }
        Command::Barrier(Barrier::Buffer { buffer, .. }) => {
            res.buffer(*buffer)?;
        }
        Command::Barrier(Barrier::Execution) | Command::EndRenderPass => {}
        Command::Dispatch {
            pipeline, bindings, ..
        } => {
            if !res.compute_pipelines.contains_key(pipeline) {
                return Err(ResourceError::InvalidHandle);
            }
            for binding in bindings {
                match *binding {
                    BindingResource::Buffer {
                        buffer,
                        offset,
                        size,
                        ..
                    } => {
                        let len = res.buffer(buffer)?.data.len();
                        let size = size.unwrap_or((len as u64).saturating_sub(offset));
                        byte_range(len, offset, size)?;
                    }
                    BindingResource::StorageImage {
                        texture, mip_level, ..
                    } => {
                        res.texture(texture)?
                            .check_mips(&(mip_level..mip_level + 1))?;
                    }
                    BindingResource::SampledImage {
                        texture,
                        base_mip_level,
                        mip_level_count,
                        sampler,
                        ..
                    } => {
                        res.texture(texture)?
                            .check_mips(&(base_mip_level..base_mip_level + mip_level_count))?;
                        res.sampler(sampler)?;
                    }
                }
            }
        }
        Command::BeginRenderPass { color, depth, .. } => {
            for attachment in color {
                res.texture(attachment.texture)?;
            }
            if let Some(depth) = depth {
                res.texture(depth.texture)?;
            }
        }
        Command::SetRenderPipeline(id) => {
            if !res.render_pipelines.contains_key(id) {
                return Err(ResourceError::InvalidHandle);
            }
        }
        Command::BindVertexBuffers { buffers, .. } => {
            for buffer in buffers {
                res.buffer(*buffer)?;
            }
        }
        Command::BindIndexBuffer(buffer) => {
            res.buffer(*buffer)?;
        }
        Command::DrawIndexed { .. } => {}
        Command::DrawIndexedIndirectCount {
            commands, count, ..
        } => {
            res.buffer(*commands)?;
            byte_range(res.buffer(*count)?.data.len(), 0, 4)?;
        }
    }
    Ok(())
}

/// Executes one command against host memory.
pub(crate) fn execute(
    res: &mut Resources,
    stats: &mut DeviceStats,
    command: Command,
) -> Result<(), ResourceError> {
    match command {
        Command::CopyBuffer { src, dst, regions } => {
            for region in regions {
                let bytes = {
                    let data = &res.buffer(src)?.data;
                    data[byte_range(data.len(), region.src_offset, region.size)?].to_vec()
                };
                let data = &mut res.buffer_mut(dst)?.data;
                let range = byte_range(data.len(), region.dst_offset, region.size)?;
                data[range].copy_from_slice(&bytes);
                stats.copies += 1;
                stats.bytes_copied += region.size;
            }
        }
        Command::CopyBufferToTexture {
            src,
            src_offset,
            dst,
            mip_level,
        } => {
            let level_len = res
                .texture(dst)?
                .levels
                .get(mip_level as usize)
                .map(Vec::len)
                .ok_or(ResourceError::OutOfBounds)?;
            let bytes = {
                let data = &res.buffer(src)?.data;
                data[byte_range(data.len(), src_offset, level_len as u64)?].to_vec()
            };
            res.texture_mut(dst)?.levels[mip_level as usize].copy_from_slice(&bytes);
            stats.copies += 1;
            stats.bytes_copied += level_len as u64;
        }
        Command::FillBuffer {
            buffer,
            offset,
            size,
            value,
        } => {
            let data = &mut res.buffer_mut(buffer)?.data;
            let range = byte_range(data.len(), offset, size)?;
            for chunk in data[range].chunks_exact_mut(4) {
                chunk.copy_from_slice(&value.to_le_bytes());
            }
        }
        Command::UpdateBuffer {
            buffer,
            offset,
            data: bytes,
        } => {
            let data = &mut res.buffer_mut(buffer)?.data;
            let range = byte_range(data.len(), offset, bytes.len() as u64)?;
            data[range].copy_from_slice(&bytes);
        }
        Command::Barrier(Barrier::Image {
            texture, mips, to, ..
        }) => {
            let entry = res.texture_mut(texture)?;
            entry.check_mips(&mips)?;
            for mip in mips {
                entry.states[mip as usize] = to;
            }
        }
        Command::Barrier(_) => {}
        Command::Dispatch {
            pipeline,
            mut bindings,
            push_constants,
            workgroups,
        } => {
            bindings.sort_by_key(BindingResource::binding);
            dispatch(res, pipeline, &bindings, &push_constants, workgroups)?;
            stats.dispatches += 1;
        }
        Command::BeginRenderPass { color, depth, .. } => {
            for attachment in color {
                let entry = res.texture_mut(attachment.texture)?;
                if let Some(clear) = attachment.clear {
                    entry.clear(clear);
                }
                entry.states[0] = ResourceState::RenderTarget;
            }
            if let Some(depth) = depth {
                let entry = res.texture_mut(depth.texture)?;
                if let Some(clear) = depth.clear {
                    entry.clear([clear, 0.0, 0.0, 0.0]);
                }
                entry.states[0] = ResourceState::DepthWrite;
            }
            stats.render_passes += 1;
        }
        Command::EndRenderPass
        | Command::SetRenderPipeline(_)
        | Command::BindVertexBuffers { .. }
        | Command::BindIndexBuffer(_) => {}
        Command::DrawIndexed {
            index_count,
            instance_count,
            ..
        } => {
            stats.draw_calls += 1;
            stats.instances_drawn += instance_count as u64;
            stats.indices_drawn += index_count as u64 * instance_count as u64;
        }
        Command::DrawIndexedIndirectCount {
            commands,
            count,
            max_draw_count,
            stride,
        } => {
            let count_data = &res.buffer(count)?.data;
            let draws = bytemuck::pod_read_unaligned::<u32>(
                &count_data[byte_range(count_data.len(), 0, 4)?],
            )
            .min(max_draw_count);
            let stride = (stride as usize).max(size_of::<DrawCommand>());
            let command_data = &res.buffer(commands)?.data;
            for i in 0..draws as usize {
                let range = byte_range(
                    command_data.len(),
                    (i * stride) as u64,
                    size_of::<DrawCommand>() as u64,
                )?;
                let draw: DrawCommand = bytemuck::pod_read_unaligned(&command_data[range]);
                stats.draw_calls += 1;
                stats.instances_drawn += draw.instance_count as u64;
                stats.indices_drawn += draw.index_count as u64 * draw.instance_count as u64;
            }
            stats.indirect_draw_count = draws;
        }
    }
    Ok(())
}

fn dispatch(
    res: &mut Resources,
    pipeline: ComputePipelineId,
    bindings: &[BindingResource],
    push_constants: &[u8],
    workgroups: [u32; 3],
) -> Result<(), ResourceError> {
    let (kernel, label) = {
        let entry = res
            .compute_pipelines
            .get(&pipeline)
            .ok_or(ResourceError::InvalidHandle)?;
        (entry.kernel.clone(), entry.label.clone())
    };

    let mut resources = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let resource = match *binding {
            BindingResource::Buffer {
                buffer,
                offset,
                size,
                ..
            } => {
                let data = &res.buffer(buffer)?.data;
                let size = size.unwrap_or((data.len() as u64).saturating_sub(offset));
                KernelResource::Buffer(data[byte_range(data.len(), offset, size)?].to_vec())
            }
            BindingResource::StorageImage {
                texture, mip_level, ..
            } => KernelResource::StorageImage(res.texture(texture)?.read_float_level(mip_level)?),
            BindingResource::SampledImage {
                texture,
                base_mip_level,
                mip_level_count,
                sampler,
                ..
            } => {
                let entry = res.texture(texture)?;
                let sampler = res.sampler(sampler)?;
                let levels = (base_mip_level..base_mip_level + mip_level_count)
                    .map(|mip| entry.read_float_level(mip))
                    .collect::<Result<Vec<_>, _>>()?;
                KernelResource::SampledImage(SampledImage {
                    levels,
                    filter: sampler.filter,
                    reduction: sampler.reduction,
                    max_lod: sampler.max_lod,
                })
            }
        };
        resources.push(resource);
    }

    log::trace!(
        "Dispatching {} ({:?}) over {workgroups:?}.",
        kernel.name(),
        label
    );
    kernel.dispatch(workgroups, push_constants, &mut resources)?;

    for (binding, resource) in bindings.iter().zip(resources) {
        match (*binding, resource) {
            (
                BindingResource::Buffer {
                    buffer,
                    offset,
                    size,
                    ..
                },
                KernelResource::Buffer(bytes),
            ) => {
                let data = &mut res.buffer_mut(buffer)?.data;
                let size = size.unwrap_or((data.len() as u64).saturating_sub(offset));
                if bytes.len() as u64 != size {
                    return Err(KernelError::Execution(format!(
                        "{} resized buffer binding {}",
                        kernel.name(),
                        binding.binding()
                    ))
                    .into());
                }
                let range = byte_range(data.len(), offset, size)?;
                data[range].copy_from_slice(&bytes);
            }
            (
                BindingResource::StorageImage {
                    texture, mip_level, ..
                },
                KernelResource::StorageImage(level),
            ) => {
                res.texture_mut(texture)?.write_float_level(mip_level, &level)?;
            }
            _ => {}
        }
    }
    Ok(())
}
