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

use crate::renderer::api::*;
use crate::renderer::resource::{
    ComputePipeline, GpuBuffer, GpuSampler, GpuTexture, RenderPipeline, TrackedResource,
};
use std::ops::Range;

/// A resource bound to a compute dispatch, by handle.
#[derive(Debug, Clone, Copy)]
pub enum Binding<'a> {
    /// A whole buffer.
    Buffer {
        /// Binding slot.
        binding: u32,
        /// The buffer.
        buffer: &'a GpuBuffer,
    },
    /// A byte range of a buffer.
    BufferRange {
        /// Binding slot.
        binding: u32,
        /// The buffer.
        buffer: &'a GpuBuffer,
        /// Start of the range.
        offset: u64,
        /// Length of the range.
        size: u64,
    },
    /// One writable mip level.
    StorageImage {
        /// Binding slot.
        binding: u32,
        /// The texture.
        texture: &'a GpuTexture,
        /// The level.
        mip_level: u32,
    },
    /// A sampled mip range.
    SampledImage {
        /// Binding slot.
        binding: u32,
        /// The texture.
        texture: &'a GpuTexture,
        /// First visible level.
        base_mip_level: u32,
        /// Number of visible levels.
        mip_level_count: u32,
        /// The sampler.
        sampler: &'a GpuSampler,
    },
}

/// A color target of a render pass, by handle.
#[derive(Debug, Clone, Copy)]
pub struct ColorTarget<'a> {
    /// The texture.
    pub texture: &'a GpuTexture,
    /// Clear color, or `None` to load.
    pub clear: Option<[f32; 4]>,
}

/// The depth target of a render pass, by handle.
#[derive(Debug, Clone, Copy)]
pub struct DepthTarget<'a> {
    /// The texture.
    pub texture: &'a GpuTexture,
    /// Clear depth, or `None` to load.
    pub clear: Option<f32>,
}

/// A recyclable command list bound to one queue.
///
/// Streams are obtained from [`SubmissionQueue::acquire_stream`](super::SubmissionQueue::acquire_stream)
/// and handed back through `submit`. Every resource a recording method
/// touches is retained by the stream until the queue retires it, so callers
/// may drop their own handles right after recording.
#[derive(Debug)]
pub struct CommandStream {
    serial: u64,
    queue: QueueKind,
    submission_id: u64,
    recording: bool,
    commands: Vec<Command>,
    referenced: Vec<TrackedResource>,
}

impl CommandStream {
    pub(crate) fn new(serial: u64, queue: QueueKind) -> Self {
        Self {
            serial,
            queue,
            submission_id: 0,
            recording: false,
            commands: Vec::new(),
            referenced: Vec::new(),
        }
    }

    pub(crate) fn begin(&mut self) {
        debug_assert_eq!(self.submission_id, 0, "stream handed out before retirement");
        self.recording = true;
    }

    pub(crate) fn take_commands(&mut self) -> Vec<Command> {
        self.recording = false;
        std::mem::take(&mut self.commands)
    }

    pub(crate) fn mark_submitted(&mut self, submission_id: u64) {
        self.submission_id = submission_id;
    }

    /// Clears the stream so it can go back to the pool. Drops every reference.
    pub(crate) fn reset(&mut self) {
        self.submission_id = 0;
        self.recording = false;
        self.commands.clear();
        self.referenced.clear();
    }

    /// Unique serial of the stream within its queue.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// The queue the stream records for.
    pub fn queue(&self) -> QueueKind {
        self.queue
    }

    /// The id of the submission carrying this stream, 0 when not submitted.
    pub fn submission_id(&self) -> u64 {
        self.submission_id
    }

    /// Returns `true` between acquisition and submission.
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// The commands recorded so far.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of strong references held.
    pub fn referenced_count(&self) -> usize {
        self.referenced.len()
    }

    /// Keeps `resource` alive until the stream retires without recording anything.
    pub fn retain(&mut self, resource: impl Into<TrackedResource>) {
        self.referenced.push(resource.into());
    }

    fn record(&mut self, command: Command) {
        debug_assert!(self.recording, "recording into a stream that is not recording");
        self.commands.push(command);
    }

    /// Copies the non-empty `regions` from `src` to `dst`.
    pub fn copy_buffer(&mut self, src: &GpuBuffer, dst: &GpuBuffer, regions: &[BufferCopy]) {
        let regions: Vec<BufferCopy> = regions.iter().copied().filter(|r| !r.is_empty()).collect();
        if regions.is_empty() {
            return;
        }
        self.retain(src);
        self.retain(dst);
        self.record(Command::CopyBuffer {
            src: src.id(),
            dst: dst.id(),
            regions,
        });
    }

    /// Copies tightly packed texels at `src_offset` into `mip_level` of `dst`.
    pub fn copy_buffer_to_texture(
        &mut self,
        src: &GpuBuffer,
        src_offset: u64,
        dst: &GpuTexture,
        mip_level: u32,
    ) {
        self.retain(src);
        self.retain(dst);
        self.record(Command::CopyBufferToTexture {
            src: src.id(),
            src_offset,
            dst: dst.id(),
            mip_level,
        });
    }

    /// Fills `size` bytes at `offset` with the repeated 32-bit `value`.
    pub fn fill_buffer(&mut self, buffer: &GpuBuffer, offset: u64, size: u64, value: u32) {
        self.retain(buffer);
        self.record(Command::FillBuffer {
            buffer: buffer.id(),
            offset,
            size,
            value,
        });
    }

    /// Writes `data` at `offset` when the stream executes.
    pub fn update_buffer(&mut self, buffer: &GpuBuffer, offset: u64, data: &[u8]) {
        self.retain(buffer);
        self.record(Command::UpdateBuffer {
            buffer: buffer.id(),
            offset,
            data: data.to_vec(),
        });
    }

    /// Full execution and memory barrier.
    pub fn barrier(&mut self) {
        self.record(Command::Barrier(Barrier::Execution));
    }

    /// Transitions `mips` of `texture` from `from` to `to`.
    pub fn image_barrier(
        &mut self,
        texture: &GpuTexture,
        mips: Range<u32>,
        from: ResourceState,
        to: ResourceState,
    ) {
        self.retain(texture);
        self.record(Command::Barrier(Barrier::Image {
            texture: texture.id(),
            mips,
            from,
            to,
        }));
    }

    /// Orders accesses to `buffer`.
    pub fn buffer_barrier(&mut self, buffer: &GpuBuffer, from: ResourceState, to: ResourceState) {
        self.retain(buffer);
        self.record(Command::Barrier(Barrier::Buffer {
            buffer: buffer.id(),
            from,
            to,
        }));
    }

    /// Dispatches `pipeline` over `workgroups`.
    pub fn dispatch(
        &mut self,
        pipeline: &ComputePipeline,
        bindings: &[Binding<'_>],
        push_constants: &[u8],
        workgroups: [u32; 3],
    ) {
        self.retain(pipeline);
        let mut resolved = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let resource = match *binding {
                Binding::Buffer { binding, buffer } => {
                    self.retain(buffer);
                    BindingResource::Buffer {
                        binding,
                        buffer: buffer.id(),
                        offset: 0,
                        size: None,
                    }
                }
                Binding::BufferRange {
                    binding,
                    buffer,
                    offset,
                    size,
                } => {
                    self.retain(buffer);
                    BindingResource::Buffer {
                        binding,
                        buffer: buffer.id(),
                        offset,
                        size: Some(size),
                    }
                }
                Binding::StorageImage {
                    binding,
                    texture,
                    mip_level,
                } => {
                    self.retain(texture);
                    BindingResource::StorageImage {
                        binding,
                        texture: texture.id(),
                        mip_level,
                    }
                }
                Binding::SampledImage {
                    binding,
                    texture,
                    base_mip_level,
                    mip_level_count,
                    sampler,
                } => {
                    self.retain(texture);
                    self.retain(sampler);
                    BindingResource::SampledImage {
                        binding,
                        texture: texture.id(),
                        base_mip_level,
                        mip_level_count,
                        sampler: sampler.id(),
                    }
                }
            };
            resolved.push(resource);
        }
        self.record(Command::Dispatch {
            pipeline: pipeline.id(),
            bindings: resolved,
            push_constants: push_constants.to_vec(),
            workgroups,
        });
    }

    /// Opens a render pass over the given targets.
    pub fn begin_render_pass(
        &mut self,
        label: &str,
        color: &[ColorTarget<'_>],
        depth: Option<DepthTarget<'_>>,
    ) {
        let color = color
            .iter()
            .map(|target| {
                self.retain(target.texture);
                ColorAttachment {
                    texture: target.texture.id(),
                    clear: target.clear,
                }
            })
            .collect();
        let depth = depth.map(|target| {
            self.retain(target.texture);
            DepthAttachment {
                texture: target.texture.id(),
                clear: target.clear,
            }
        });
        self.record(Command::BeginRenderPass {
            label: Some(label.to_string()),
            color,
            depth,
        });
    }

    /// Binds `pipeline` for subsequent draws.
    pub fn set_render_pipeline(&mut self, pipeline: &RenderPipeline) {
        self.retain(pipeline);
        self.record(Command::SetRenderPipeline(pipeline.id()));
    }

    /// Binds vertex buffers to consecutive slots starting at `first_slot`.
    pub fn bind_vertex_buffers(&mut self, first_slot: u32, buffers: &[&GpuBuffer]) {
        let ids = buffers
            .iter()
            .map(|b| {
                self.retain(*b);
                b.id()
            })
            .collect();
        self.record(Command::BindVertexBuffers {
            first_slot,
            buffers: ids,
        });
    }

    /// Binds a 32-bit index buffer.
    pub fn bind_index_buffer(&mut self, buffer: &GpuBuffer) {
        self.retain(buffer);
        self.record(Command::BindIndexBuffer(buffer.id()));
    }

    /// Records a direct indexed draw.
    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) {
        self.record(Command::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            base_vertex,
            first_instance,
        });
    }

    /// Records indirect draws whose count is the first `u32` of `count`.
    pub fn draw_indexed_indirect_count(
        &mut self,
        commands: &GpuBuffer,
        count: &GpuBuffer,
        max_draw_count: u32,
        stride: u32,
    ) {
        self.retain(commands);
        self.retain(count);
        self.record(Command::DrawIndexedIndirectCount {
            commands: commands.id(),
            count: count.id(),
            max_draw_count,
            stride,
        });
    }

    /// Closes the current render pass.
    pub fn end_render_pass(&mut self) {
        self.record(Command::EndRenderPass);
    }
}
