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

//! The recorded command list a device executes.
//!
//! Commands reference resources by raw id. Lifetime is the business of the
//! [`CommandStream`](crate::renderer::submission::CommandStream) that recorded
//! them, which holds strong references until the submission retires.

use super::buffer::{BufferCopy, BufferId};
use super::pipeline::{ComputePipelineId, RenderPipelineId};
use super::texture::{SamplerId, TextureId};
use std::ops::Range;

/// The access state of a resource, used to express barriers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    /// Contents are undefined and may be discarded.
    #[default]
    Undefined,
    /// Any access, the layout of storage images.
    General,
    /// Read from shaders.
    ShaderRead,
    /// Written from compute shaders.
    StorageWrite,
    /// Color attachment.
    RenderTarget,
    /// Depth attachment being written.
    DepthWrite,
    /// Depth attachment being tested only.
    DepthRead,
    /// Source of a transfer.
    TransferSrc,
    /// Destination of a transfer.
    TransferDst,
    /// Read as indirect draw arguments.
    IndirectArgument,
    /// Handed to the presentation engine.
    Present,
}

/// A synchronization point between commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Barrier {
    /// Full execution and memory dependency.
    Execution,
    /// Transition of a mip range of a texture.
    Image {
        /// The texture.
        texture: TextureId,
        /// Affected mip levels.
        mips: Range<u32>,
        /// State before the barrier.
        from: ResourceState,
        /// State after the barrier.
        to: ResourceState,
    },
    /// Dependency on a buffer.
    Buffer {
        /// The buffer.
        buffer: BufferId,
        /// Access before the barrier.
        from: ResourceState,
        /// Access after the barrier.
        to: ResourceState,
    },
}

/// A resource bound to a compute dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BindingResource {
    /// A byte range of a buffer; `size: None` binds to the end.
    Buffer {
        /// Binding slot.
        binding: u32,
        /// The buffer.
        buffer: BufferId,
        /// Start of the range.
        offset: u64,
        /// Length of the range.
        size: Option<u64>,
    },
    /// One writable mip level.
    StorageImage {
        /// Binding slot.
        binding: u32,
        /// The texture.
        texture: TextureId,
        /// The mip level.
        mip_level: u32,
    },
    /// A sampled mip range with its sampler.
    SampledImage {
        /// Binding slot.
        binding: u32,
        /// The texture.
        texture: TextureId,
        /// First visible level.
        base_mip_level: u32,
        /// Number of visible levels.
        mip_level_count: u32,
        /// The sampler.
        sampler: SamplerId,
    },
}

impl BindingResource {
    /// The binding slot.
    pub fn binding(&self) -> u32 {
        match *self {
            BindingResource::Buffer { binding, .. }
            | BindingResource::StorageImage { binding, .. }
            | BindingResource::SampledImage { binding, .. } => binding,
        }
    }
}

/// A color attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAttachment {
    /// Target texture.
    pub texture: TextureId,
    /// Clear color, or `None` to load.
    pub clear: Option<[f32; 4]>,
}

/// The depth attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthAttachment {
    /// Target texture.
    pub texture: TextureId,
    /// Clear depth, or `None` to load.
    pub clear: Option<f32>,
}

/// One recorded command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Buffer to buffer copy of several regions.
    CopyBuffer {
        /// Source.
        src: BufferId,
        /// Destination.
        dst: BufferId,
        /// Non-empty regions.
        regions: Vec<BufferCopy>,
    },
    /// Tightly packed buffer data into one mip level.
    CopyBufferToTexture {
        /// Source.
        src: BufferId,
        /// Byte offset of the level data.
        src_offset: u64,
        /// Destination.
        dst: TextureId,
        /// Destination level.
        mip_level: u32,
    },
    /// Repeats a 32-bit value over a byte range.
    FillBuffer {
        /// The buffer.
        buffer: BufferId,
        /// Start of the range.
        offset: u64,
        /// Length of the range, a multiple of 4.
        size: u64,
        /// The value.
        value: u32,
    },
    /// Inline data written at execution time.
    UpdateBuffer {
        /// The buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: u64,
        /// The data.
        data: Vec<u8>,
    },
    /// A barrier.
    Barrier(Barrier),
    /// A compute dispatch.
    Dispatch {
        /// The pipeline.
        pipeline: ComputePipelineId,
        /// Bound resources.
        bindings: Vec<BindingResource>,
        /// The push constant block.
        push_constants: Vec<u8>,
        /// Workgroup counts.
        workgroups: [u32; 3],
    },
    /// Opens a render pass.
    BeginRenderPass {
        /// Debug label.
        label: Option<String>,
        /// Color targets.
        color: Vec<ColorAttachment>,
        /// Depth target.
        depth: Option<DepthAttachment>,
    },
    /// Closes the current render pass.
    EndRenderPass,
    /// Binds a render pipeline.
    SetRenderPipeline(RenderPipelineId),
    /// Binds vertex buffers starting at `first_slot`.
    BindVertexBuffers {
        /// First slot.
        first_slot: u32,
        /// Buffers, one per slot.
        buffers: Vec<BufferId>,
    },
    /// Binds a 32-bit index buffer.
    BindIndexBuffer(BufferId),
    /// A direct indexed draw.
    DrawIndexed {
        /// Indices per instance.
        index_count: u32,
        /// Instances.
        instance_count: u32,
        /// First index.
        first_index: u32,
        /// Added to every index.
        base_vertex: i32,
        /// First instance id.
        first_instance: u32,
    },
    /// Indirect indexed draws whose count is read from a buffer.
    DrawIndexedIndirectCount {
        /// Packed draw commands.
        commands: BufferId,
        /// Buffer holding the draw count as its first `u32`.
        count: BufferId,
        /// Upper bound on the count.
        max_draw_count: u32,
        /// Distance between commands in bytes.
        stride: u32,
    },
}
