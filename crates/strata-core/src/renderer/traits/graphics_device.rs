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
use crate::renderer::error::{ResourceError, SubmissionError};
use std::fmt::Debug;
use std::time::Duration;

/// The low-level device every backend implements.
///
/// Resource creation and host access are immediate. Recorded work only runs
/// through [`GraphicsDevice::submit`], whose progress is observed through
/// timeline counters and fences.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Creates a new GPU buffer.
    /// ## Arguments
    /// * `descriptor` - A reference to a `BufferDescriptor` containing the buffer configuration.
    /// ## Returns
    /// A `Result` containing the ID of the created buffer or an error if the creation fails.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Destroys a GPU buffer.
    /// ## Arguments
    /// * `id` - The ID of the buffer to be destroyed.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Writes data to a host-visible GPU buffer.
    /// ## Arguments
    /// * `id` - The ID of the buffer to write to.
    /// * `offset` - The offset in the buffer where the data will be written.
    /// * `data` - A slice of bytes containing the data to be written.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the range exceeds the buffer.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Reads `size` bytes back from a buffer.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the range exceeds the buffer.
    fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, ResourceError>;

    /// Creates a new GPU texture.
    /// ## Arguments
    /// * `descriptor` - A reference to a `TextureDescriptor` containing the texture configuration.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Destroys a GPU texture.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Writes tightly packed texel data into one mip level.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the level does not exist or the data has the wrong size.
    fn write_texture(&self, id: TextureId, mip_level: u32, data: &[u8])
        -> Result<(), ResourceError>;

    /// Reads one mip level back as tightly packed texel data.
    fn read_texture(&self, id: TextureId, mip_level: u32) -> Result<Vec<u8>, ResourceError>;

    /// Creates a view over a mip range of a texture.
    fn create_texture_view(
        &self,
        texture: TextureId,
        descriptor: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError>;

    /// Destroys a texture view.
    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError>;

    /// Creates a sampler.
    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError>;

    /// Destroys a sampler.
    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError>;

    /// Creates a compute pipeline.
    /// ## Errors
    /// * `ResourceError::Pipeline` - If the backend cannot run the shader source.
    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError>;

    /// Destroys a compute pipeline.
    fn destroy_compute_pipeline(&self, id: ComputePipelineId) -> Result<(), ResourceError>;

    /// Creates a render pipeline.
    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError>;

    /// Destroys a render pipeline.
    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError>;

    /// Creates a timeline counter starting at `initial_value`.
    fn create_timeline(&self, initial_value: u64) -> Result<TimelineId, ResourceError>;

    /// Current value of a timeline counter, without blocking.
    fn timeline_value(&self, id: TimelineId) -> Result<u64, ResourceError>;

    /// Blocks until the counter reaches `value` or the timeout elapses.
    /// ## Arguments
    /// * `timeout` - `None` waits forever.
    /// ## Returns
    /// `true` if the value was reached.
    fn wait_timeline(
        &self,
        id: TimelineId,
        value: u64,
        timeout: Option<Duration>,
    ) -> Result<bool, ResourceError>;

    /// Sets the counter from the host. Values never decrease.
    fn signal_timeline(&self, id: TimelineId, value: u64) -> Result<(), ResourceError>;

    /// Creates an unsignalled fence.
    fn create_fence(&self) -> Result<FenceId, ResourceError>;

    /// Blocks until the fence is signalled or the timeout elapses.
    fn wait_fence(&self, id: FenceId, timeout: Option<Duration>) -> Result<bool, ResourceError>;

    /// Destroys a fence.
    fn destroy_fence(&self, id: FenceId) -> Result<(), ResourceError>;

    /// Hands recorded work to a queue.
    ///
    /// The device must honour `waits` before running the command lists and
    /// apply `signals` and the fence once they completed.
    /// ## Errors
    /// * `SubmissionError::Device` - If a handle is unknown or the backend rejects the work.
    fn submit(&self, submission: QueueSubmission) -> Result<(), SubmissionError>;
}
