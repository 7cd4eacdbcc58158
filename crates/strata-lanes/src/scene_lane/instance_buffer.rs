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

//! The instance buffer and its CPU mirror.

use crate::error::LaneError;
use std::collections::BTreeSet;
use std::mem::size_of;
use std::sync::Arc;
use strata_core::math::Mat4;
use strata_core::renderer::api::*;
use strata_core::renderer::{CommandStream, GpuBuffer, GraphicsDevice, ResourceError};

const STRIDE: u64 = size_of::<GpuInstance>() as u64;

/// Every instance ever made renderable, mirrored on the CPU.
///
/// Instances are appended or patched in place, never removed. Changes are
/// collected in a patch list and written by [`InstanceBuffer::flush`] as
/// in-stream updates, one per contiguous run of dirty instances. The list is
/// only cleared by [`InstanceBuffer::mark_flushed`] once the stream was
/// accepted, so a dropped frame re-sends its patches.
#[derive(Debug)]
pub struct InstanceBuffer {
    buffer: GpuBuffer,
    capacity: u32,
    instances: Vec<GpuInstance>,
    dirty: BTreeSet<u32>,
}

impl InstanceBuffer {
    /// Allocates room for `capacity` instances.
    pub fn new(device: &Arc<dyn GraphicsDevice>, capacity: u32) -> Result<Self, ResourceError> {
        let buffer = GpuBuffer::new(
            device,
            &BufferDescriptor {
                label: Some("instances".into()),
                size: capacity.max(1) as u64 * STRIDE,
                usage: BufferUsage::STORAGE | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            },
        )?;
        Ok(Self {
            buffer,
            capacity,
            instances: Vec::new(),
            dirty: BTreeSet::new(),
        })
    }

    /// Appends `instance` and returns its index.
    ///
    /// ## Errors
    /// `LaneError::CapacityExceeded` once the buffer is full.
    pub fn push(&mut self, instance: GpuInstance) -> Result<u32, LaneError> {
        let index = self.instances.len() as u32;
        if index >= self.capacity {
            return Err(LaneError::CapacityExceeded {
                buffer: "instance",
                requested: 1,
                available: 0,
            });
        }
        self.instances.push(instance);
        self.dirty.insert(index);
        Ok(index)
    }

    /// Replaces the model transform of instance `index`.
    ///
    /// Returns `false` when the index was never pushed.
    pub fn patch_transform(&mut self, index: u32, model: Mat4) -> bool {
        match self.instances.get_mut(index as usize) {
            Some(instance) => {
                instance.model = model.to_cols_array_2d();
                self.dirty.insert(index);
                true
            }
            None => false,
        }
    }

    /// Replaces instance `index` entirely.
    ///
    /// Returns `false` when the index was never pushed.
    pub fn set(&mut self, index: u32, instance: GpuInstance) -> bool {
        match self.instances.get_mut(index as usize) {
            Some(slot) => {
                *slot = instance;
                self.dirty.insert(index);
                true
            }
            None => false,
        }
    }

    /// Records the pending patches into `stream`. The patch list is kept
    /// until [`mark_flushed`](Self::mark_flushed).
    ///
    /// Returns the number of instances written.
    pub fn flush(&self, stream: &mut CommandStream) -> usize {
        let written = self.dirty.len();
        let mut runs: Vec<(u32, u32)> = Vec::new();
        for &index in &self.dirty {
            match runs.last_mut() {
                Some((start, len)) if *start + *len == index => *len += 1,
                _ => runs.push((index, 1)),
            }
        }
        for (start, len) in runs {
            let slice = &self.instances[start as usize..(start + len) as usize];
            stream.update_buffer(&self.buffer, start as u64 * STRIDE, bytemuck::cast_slice(slice));
        }
        if written > 0 {
            log::trace!("Flushed {written} instance patch(es).");
        }
        written
    }

    /// Clears the patch list after the stream holding the last
    /// [`flush`](Self::flush) was submitted.
    pub fn mark_flushed(&mut self) {
        self.dirty.clear();
    }

    /// The CPU copy of instance `index`.
    pub fn get(&self, index: u32) -> Option<&GpuInstance> {
        self.instances.get(index as usize)
    }

    /// The GPU buffer.
    pub fn buffer(&self) -> &GpuBuffer {
        &self.buffer
    }

    /// Number of instances.
    pub fn len(&self) -> u32 {
        self.instances.len() as u32
    }

    /// Returns `true` before the first push.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Maximum number of instances.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Pushes left before the buffer is full.
    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.len())
    }

    /// Number of instances waiting for the next flush.
    pub fn pending_patches(&self) -> usize {
        self.dirty.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::math::{Aabb, BoundingSphere, Vec3};
    use strata_core::renderer::SubmissionQueue;
    use strata_infra::SoftwareDevice;

    fn mesh() -> MeshInfo {
        MeshInfo {
            index_count: 3,
            first_index: 0,
            vertex_offset: 0,
            vertex_count: 3,
            material_id: 0,
            aabb: Aabb::from_min_max(Vec3::ZERO, Vec3::ONE),
            sphere: BoundingSphere::new(Vec3::splat(0.5), 0.9),
        }
    }

    #[test]
    fn contiguous_patches_are_coalesced() {
        let device: Arc<dyn GraphicsDevice> = Arc::new(SoftwareDevice::default());
        let queue = SubmissionQueue::new(device.clone(), QueueKind::Graphics).unwrap();
        let mut instances = InstanceBuffer::new(&device, 8).unwrap();
        for i in 0..4 {
            instances
                .push(GpuInstance::new(Mat4::IDENTITY, i, &mesh()))
                .unwrap();
        }

        let mut stream = queue.acquire_stream();
        assert_eq!(instances.flush(&mut stream), 4);
        assert_eq!(stream.commands().len(), 1);
        queue.submit_and_wait(vec![stream]).unwrap();
        instances.mark_flushed();

        let moved = Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0));
        assert!(instances.patch_transform(3, moved));
        assert!(instances.patch_transform(1, moved));
        assert!(!instances.patch_transform(9, moved));

        let mut stream = queue.acquire_stream();
        assert_eq!(instances.flush(&mut stream), 2);
        assert_eq!(stream.commands().len(), 2);
        queue.submit_and_wait(vec![stream]).unwrap();
        instances.mark_flushed();

        let gpu = instances.buffer().read_pod::<GpuInstance>(0, 4).unwrap();
        assert_eq!(gpu[3].transform(), moved);
        assert_eq!(gpu[2].transform(), Mat4::IDENTITY);
        assert_eq!(instances.pending_patches(), 0);
    }

    #[test]
    fn patches_survive_a_discarded_stream() {
        let device: Arc<dyn GraphicsDevice> = Arc::new(SoftwareDevice::default());
        let queue = SubmissionQueue::new(device.clone(), QueueKind::Graphics).unwrap();
        let mut instances = InstanceBuffer::new(&device, 4).unwrap();
        instances
            .push(GpuInstance::new(Mat4::IDENTITY, 0, &mesh()))
            .unwrap();

        let mut dropped = queue.acquire_stream();
        assert_eq!(instances.flush(&mut dropped), 1);
        queue.release_stream(dropped);
        assert_eq!(instances.pending_patches(), 1);

        let mut stream = queue.acquire_stream();
        assert_eq!(instances.flush(&mut stream), 1);
        queue.submit_and_wait(vec![stream]).unwrap();
        instances.mark_flushed();

        let gpu = instances.buffer().read_pod::<GpuInstance>(0, 1).unwrap();
        assert_eq!(gpu[0].transform(), Mat4::IDENTITY);
        assert_eq!(instances.pending_patches(), 0);
    }

    #[test]
    fn push_past_capacity_fails() {
        let device: Arc<dyn GraphicsDevice> = Arc::new(SoftwareDevice::default());
        let mut instances = InstanceBuffer::new(&device, 1).unwrap();
        instances
            .push(GpuInstance::new(Mat4::IDENTITY, 0, &mesh()))
            .unwrap();
        assert!(matches!(
            instances.push(GpuInstance::new(Mat4::IDENTITY, 0, &mesh())),
            Err(LaneError::CapacityExceeded { .. })
        ));
        assert_eq!(instances.len(), 1);
        assert_eq!(instances.remaining(), 0);
    }
}
