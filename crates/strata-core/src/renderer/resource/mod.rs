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

//! Shared-ownership GPU resources.
//!
//! Each handle is a cheap `Arc` clone around a raw device id. The device
//! allocation is released when the last clone drops, which is either the
//! owner letting go or a retired command stream dropping its references.

use crate::math::Extent2D;
use crate::renderer::api::*;
use crate::renderer::error::ResourceError;
use crate::renderer::traits::GraphicsDevice;
use bytemuck::Pod;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

struct BufferInner {
    device: Arc<dyn GraphicsDevice>,
    id: BufferId,
    size: u64,
    usage: BufferUsage,
    label: Option<String>,
}

impl Drop for BufferInner {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_buffer(self.id) {
            log::error!("Failed to destroy buffer {:?} ({:?}): {e}", self.id, self.label);
        }
    }
}

/// A reference-counted GPU buffer.
#[derive(Clone)]
pub struct GpuBuffer(Arc<BufferInner>);

impl GpuBuffer {
    /// Allocates a buffer on `device`.
    pub fn new(
        device: &Arc<dyn GraphicsDevice>,
        descriptor: &BufferDescriptor,
    ) -> Result<Self, ResourceError> {
        let id = device.create_buffer(descriptor)?;
        Ok(Self(Arc::new(BufferInner {
            device: Arc::clone(device),
            id,
            size: descriptor.size,
            usage: descriptor.usage,
            label: descriptor.label.as_ref().map(|l| l.to_string()),
        })))
    }

    /// Allocates a host-writable buffer holding `data`.
    pub fn with_data(
        device: &Arc<dyn GraphicsDevice>,
        label: &str,
        usage: BufferUsage,
        data: &[u8],
    ) -> Result<Self, ResourceError> {
        let buffer = Self::new(
            device,
            &BufferDescriptor {
                label: Some(label.into()),
                size: data.len() as u64,
                usage: usage | BufferUsage::MAP_WRITE,
                mapped_at_creation: true,
            },
        )?;
        if !data.is_empty() {
            buffer.write(0, data)?;
        }
        Ok(buffer)
    }

    /// The raw device id.
    pub fn id(&self) -> BufferId {
        self.0.id
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.0.size
    }

    /// Usage flags.
    pub fn usage(&self) -> BufferUsage {
        self.0.usage
    }

    /// The debug label.
    pub fn label(&self) -> Option<&str> {
        self.0.label.as_deref()
    }

    /// Writes `data` at `offset` from the host.
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        self.0.device.write_buffer(self.0.id, offset, data)
    }

    /// Reads `size` bytes at `offset` back to the host.
    pub fn read(&self, offset: u64, size: u64) -> Result<Vec<u8>, ResourceError> {
        self.0.device.read_buffer(self.0.id, offset, size)
    }

    /// Reads `count` values of `T` at `offset`.
    pub fn read_pod<T: Pod>(&self, offset: u64, count: usize) -> Result<Vec<T>, ResourceError> {
        let bytes = self.read(offset, (count * std::mem::size_of::<T>()) as u64)?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    /// Number of live clones of this handle.
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("id", &self.0.id)
            .field("label", &self.0.label)
            .field("size", &self.0.size)
            .finish()
    }
}

struct TextureInner {
    device: Arc<dyn GraphicsDevice>,
    id: TextureId,
    size: Extent2D,
    mip_level_count: u32,
    format: TextureFormat,
    usage: TextureUsage,
    label: Option<String>,
    views: Mutex<HashMap<(u32, u32), TextureViewId>>,
}

impl Drop for TextureInner {
    fn drop(&mut self) {
        let views = std::mem::take(&mut *self.views.lock().unwrap());
        for view in views.into_values() {
            if let Err(e) = self.device.destroy_texture_view(view) {
                log::error!("Failed to destroy texture view {view:?}: {e}");
            }
        }
        if let Err(e) = self.device.destroy_texture(self.id) {
            log::error!("Failed to destroy texture {:?} ({:?}): {e}", self.id, self.label);
        }
    }
}

/// A reference-counted GPU texture with its cached views.
#[derive(Clone)]
pub struct GpuTexture(Arc<TextureInner>);

impl GpuTexture {
    /// Allocates a texture on `device`.
    pub fn new(
        device: &Arc<dyn GraphicsDevice>,
        descriptor: &TextureDescriptor,
    ) -> Result<Self, ResourceError> {
        let id = device.create_texture(descriptor)?;
        Ok(Self(Arc::new(TextureInner {
            device: Arc::clone(device),
            id,
            size: descriptor.size,
            mip_level_count: descriptor.mip_level_count.max(1),
            format: descriptor.format,
            usage: descriptor.usage,
            label: descriptor.label.as_ref().map(|l| l.to_string()),
            views: Mutex::new(HashMap::new()),
        })))
    }

    /// The raw device id.
    pub fn id(&self) -> TextureId {
        self.0.id
    }

    /// Size of mip level 0.
    pub fn size(&self) -> Extent2D {
        self.0.size
    }

    /// Number of mip levels.
    pub fn mip_level_count(&self) -> u32 {
        self.0.mip_level_count
    }

    /// Pixel format.
    pub fn format(&self) -> TextureFormat {
        self.0.format
    }

    /// Usage flags.
    pub fn usage(&self) -> TextureUsage {
        self.0.usage
    }

    /// The debug label.
    pub fn label(&self) -> Option<&str> {
        self.0.label.as_deref()
    }

    /// Returns the view over `count` levels starting at `base`, creating it on first use.
    ///
    /// ## Errors
    /// `ResourceError::OutOfBounds` when the range exceeds the mip chain.
    pub fn view(&self, base: u32, count: u32) -> Result<TextureViewId, ResourceError> {
        if count == 0 || base.saturating_add(count) > self.0.mip_level_count {
            return Err(ResourceError::OutOfBounds);
        }
        let mut views = self.0.views.lock().unwrap();
        if let Some(view) = views.get(&(base, count)) {
            return Ok(*view);
        }
        let view = self.0.device.create_texture_view(
            self.0.id,
            &TextureViewDescriptor {
                base_mip_level: base,
                mip_level_count: count,
            },
        )?;
        views.insert((base, count), view);
        Ok(view)
    }

    /// The view over the full mip chain.
    pub fn full_view(&self) -> Result<TextureViewId, ResourceError> {
        self.view(0, self.0.mip_level_count)
    }

    /// Writes one mip level from the host.
    pub fn write_level(&self, mip_level: u32, data: &[u8]) -> Result<(), ResourceError> {
        self.0.device.write_texture(self.0.id, mip_level, data)
    }

    /// Reads one mip level back to the host.
    pub fn read_level(&self, mip_level: u32) -> Result<Vec<u8>, ResourceError> {
        self.0.device.read_texture(self.0.id, mip_level)
    }

    /// Number of live clones of this handle.
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuTexture")
            .field("id", &self.0.id)
            .field("label", &self.0.label)
            .field("size", &self.0.size)
            .field("mips", &self.0.mip_level_count)
            .field("format", &self.0.format)
            .finish()
    }
}

macro_rules! simple_handle {
    ($(#[$doc:meta])* $name:ident, $inner:ident, $id:ty, $destroy:ident) => {
        struct $inner {
            device: Arc<dyn GraphicsDevice>,
            id: $id,
        }

        impl Drop for $inner {
            fn drop(&mut self) {
                if let Err(e) = self.device.$destroy(self.id) {
                    log::error!("Failed to destroy {:?}: {e}", self.id);
                }
            }
        }

        $(#[$doc])*
        #[derive(Clone)]
        pub struct $name(Arc<$inner>);

        impl $name {
            /// The raw device id.
            pub fn id(&self) -> $id {
                self.0.id
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0.id).finish()
            }
        }
    };
}

simple_handle!(
    /// A reference-counted sampler.
    GpuSampler,
    SamplerInner,
    SamplerId,
    destroy_sampler
);
simple_handle!(
    /// A reference-counted compute pipeline.
    ComputePipeline,
    ComputePipelineInner,
    ComputePipelineId,
    destroy_compute_pipeline
);
simple_handle!(
    /// A reference-counted render pipeline.
    RenderPipeline,
    RenderPipelineInner,
    RenderPipelineId,
    destroy_render_pipeline
);

impl GpuSampler {
    /// Creates a sampler on `device`.
    pub fn new(
        device: &Arc<dyn GraphicsDevice>,
        descriptor: &SamplerDescriptor,
    ) -> Result<Self, ResourceError> {
        let id = device.create_sampler(descriptor)?;
        Ok(Self(Arc::new(SamplerInner {
            device: Arc::clone(device),
            id,
        })))
    }
}

impl ComputePipeline {
    /// Creates a compute pipeline on `device`.
    pub fn new(
        device: &Arc<dyn GraphicsDevice>,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<Self, ResourceError> {
        let id = device.create_compute_pipeline(descriptor)?;
        log::debug!("Created compute pipeline {:?} ({:?}).", id, descriptor.label);
        Ok(Self(Arc::new(ComputePipelineInner {
            device: Arc::clone(device),
            id,
        })))
    }
}

impl RenderPipeline {
    /// Creates a render pipeline on `device`.
    pub fn new(
        device: &Arc<dyn GraphicsDevice>,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<Self, ResourceError> {
        let id = device.create_render_pipeline(descriptor)?;
        log::debug!("Created render pipeline {:?} ({:?}).", id, descriptor.label);
        Ok(Self(Arc::new(RenderPipelineInner {
            device: Arc::clone(device),
            id,
        })))
    }
}

/// A strong reference held by a command stream until it retires.
#[derive(Debug, Clone)]
pub enum TrackedResource {
    /// A buffer.
    Buffer(GpuBuffer),
    /// A texture.
    Texture(GpuTexture),
    /// A sampler.
    Sampler(GpuSampler),
    /// A compute pipeline.
    ComputePipeline(ComputePipeline),
    /// A render pipeline.
    RenderPipeline(RenderPipeline),
}

impl From<&GpuBuffer> for TrackedResource {
    fn from(value: &GpuBuffer) -> Self {
        TrackedResource::Buffer(value.clone())
    }
}

impl From<&GpuTexture> for TrackedResource {
    fn from(value: &GpuTexture) -> Self {
        TrackedResource::Texture(value.clone())
    }
}

impl From<&GpuSampler> for TrackedResource {
    fn from(value: &GpuSampler) -> Self {
        TrackedResource::Sampler(value.clone())
    }
}

impl From<&ComputePipeline> for TrackedResource {
    fn from(value: &ComputePipeline) -> Self {
        TrackedResource::ComputePipeline(value.clone())
    }
}

impl From<&RenderPipeline> for TrackedResource {
    fn from(value: &RenderPipeline) -> Self {
        TrackedResource::RenderPipeline(value.clone())
    }
}
