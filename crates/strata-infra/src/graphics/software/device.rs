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

use super::executor;
use super::resources::{byte_range, BufferEntry, ComputeEntry, Resources, SamplerEntry, TextureEntry};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};
use strata_core::renderer::api::*;
use strata_core::renderer::{GraphicsDevice, PipelineError, ResourceError, SubmissionError};

/// When submitted work runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitMode {
    /// Work runs inside `submit`, as soon as its waits are satisfied.
    #[default]
    Immediate,
    /// Work is queued until [`SoftwareDevice::flush`],
    /// [`SoftwareDevice::execute_pending`] or a blocking wait runs it.
    Deferred,
}

/// Counters describing the work the device executed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Submissions executed.
    pub submissions: u64,
    /// Submissions whose execution failed.
    pub failed_submissions: u64,
    /// Copy regions executed.
    pub copies: u64,
    /// Bytes moved by copies.
    pub bytes_copied: u64,
    /// Compute dispatches executed.
    pub dispatches: u64,
    /// Render passes opened.
    pub render_passes: u64,
    /// Draws, direct and indirect.
    pub draw_calls: u64,
    /// Instances across all draws.
    pub instances_drawn: u64,
    /// Indices across all draws.
    pub indices_drawn: u64,
    /// Draw count read by the most recent indirect-count draw.
    pub indirect_draw_count: u32,
}

#[derive(Debug, Default)]
struct SyncState {
    timelines: HashMap<TimelineId, u64>,
    fences: HashMap<FenceId, bool>,
    pending: HashMap<QueueKind, VecDeque<QueueSubmission>>,
}

impl SyncState {
    fn waits_satisfied(&self, submission: &QueueSubmission) -> bool {
        submission.waits.iter().all(|wait| {
            self.timelines
                .get(&wait.timeline)
                .is_some_and(|value| *value >= wait.value)
        })
    }

    fn has_runnable(&self) -> bool {
        self.pending
            .values()
            .filter_map(VecDeque::front)
            .any(|s| self.waits_satisfied(s))
    }

    fn signal(&mut self, timeline: TimelineId, value: u64) {
        if let Some(current) = self.timelines.get_mut(&timeline) {
            *current = (*current).max(value);
        }
    }
}

/// A headless [`GraphicsDevice`] backed by host memory.
///
/// Transfers and host compute kernels run on the CPU, graphics commands are
/// validated and tallied in [`DeviceStats`]. Each queue executes its
/// submissions in order; a submission whose waits are not yet satisfied
/// blocks the queue behind it until another queue or the host signals.
#[derive(Debug)]
pub struct SoftwareDevice {
    mode: SubmitMode,
    next_id: AtomicUsize,
    resources: Mutex<Resources>,
    sync: Mutex<SyncState>,
    progress: Condvar,
    execution: Mutex<()>,
    stats: Mutex<DeviceStats>,
    allocated_bytes: AtomicUsize,
    peak_bytes: AtomicU64,
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new(SubmitMode::Immediate)
    }
}

impl SoftwareDevice {
    /// Creates a device with the given submission mode.
    pub fn new(mode: SubmitMode) -> Self {
        log::info!("Software device created ({mode:?} submission).");
        Self {
            mode,
            next_id: AtomicUsize::new(1),
            resources: Mutex::new(Resources::default()),
            sync: Mutex::new(SyncState::default()),
            progress: Condvar::new(),
            execution: Mutex::new(()),
            stats: Mutex::new(DeviceStats::default()),
            allocated_bytes: AtomicUsize::new(0),
            peak_bytes: AtomicU64::new(0),
        }
    }

    /// The submission mode.
    pub fn mode(&self) -> SubmitMode {
        self.mode
    }

    /// A snapshot of the execution counters.
    pub fn stats(&self) -> DeviceStats {
        self.stats.lock().unwrap().clone()
    }

    /// Zeroes the execution counters.
    pub fn reset_stats(&self) {
        *self.stats.lock().unwrap() = DeviceStats::default();
    }

    /// Bytes currently held by buffers and textures.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes.load(Ordering::Relaxed)
    }

    /// Highest value [`SoftwareDevice::allocated_bytes`] reached.
    pub fn peak_bytes(&self) -> u64 {
        self.peak_bytes.load(Ordering::Relaxed)
    }

    /// Number of submissions waiting on `queue`.
    pub fn pending_submissions(&self, queue: QueueKind) -> usize {
        self.sync
            .lock()
            .unwrap()
            .pending
            .get(&queue)
            .map_or(0, VecDeque::len)
    }

    /// The recorded state of `mip` of `texture` after the last executed barrier.
    pub fn texture_state(&self, texture: TextureId, mip: u32) -> Option<ResourceState> {
        let resources = self.resources.lock().unwrap();
        resources
            .textures
            .get(&texture)
            .and_then(|t| t.states.get(mip as usize).copied())
    }

    /// Runs every runnable submission on every queue.
    ///
    /// Returns how many submissions executed.
    pub fn flush(&self) -> usize {
        self.pump(None, usize::MAX)
    }

    /// Runs up to `max` runnable submissions of `queue`, oldest first.
    pub fn execute_pending(&self, queue: QueueKind, max: usize) -> usize {
        self.pump(Some(queue), max)
    }

    fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn track_allocation(&self, bytes: usize) {
        let total = self.allocated_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.peak_bytes.fetch_max(total as u64, Ordering::Relaxed);
    }

    fn track_release(&self, bytes: usize) {
        self.allocated_bytes.fetch_sub(bytes, Ordering::Relaxed);
    }

    /// Pops and executes runnable submissions until none is left or `max` ran.
    fn pump(&self, only: Option<QueueKind>, max: usize) -> usize {
        let _exclusive = self.execution.lock().unwrap();
        let mut executed = 0;
        while executed < max {
            let next = {
                let mut sync = self.sync.lock().unwrap();
                let queue = QueueKind::ALL
                    .into_iter()
                    .filter(|q| only.map_or(true, |o| o == *q))
                    .find(|q| {
                        sync.pending
                            .get(q)
                            .and_then(VecDeque::front)
                            .is_some_and(|s| sync.waits_satisfied(s))
                    });
                queue.and_then(|q| sync.pending.get_mut(&q).and_then(VecDeque::pop_front))
            };
            let Some(submission) = next else { break };
            self.run(submission);
            executed += 1;
        }
        executed
    }

    fn run(&self, submission: QueueSubmission) {
        let QueueSubmission {
            queue,
            command_lists,
            signals,
            fence,
            ..
        } = submission;

        let result = {
            let mut resources = self.resources.lock().unwrap();
            let mut stats = self.stats.lock().unwrap();
            stats.submissions += 1;
            let result = command_lists
                .into_iter()
                .flatten()
                .try_for_each(|command| executor::execute(&mut resources, &mut stats, command));
            if result.is_err() {
                stats.failed_submissions += 1;
            }
            result
        };
        if let Err(e) = result {
            log::error!("{queue:?} submission failed on the software device: {e}");
        }

        let mut sync = self.sync.lock().unwrap();
        for signal in signals {
            sync.signal(signal.timeline, signal.value);
        }
        if let Some(fence) = fence {
            sync.fences.insert(fence, true);
        }
        drop(sync);
        self.progress.notify_all();
    }

    fn wait_until<F>(&self, timeout: Option<Duration>, mut done: F) -> bool
    where
        F: FnMut(&SyncState) -> bool,
    {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        loop {
            self.flush();
            let sync = self.sync.lock().unwrap();
            if done(&sync) {
                return true;
            }
            // A signal may have landed between the flush and the lock.
            if sync.has_runnable() {
                continue;
            }
            match (timeout, deadline) {
                (Some(_), Some(deadline)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    drop(self.progress.wait_timeout(sync, deadline - now).unwrap());
                }
                (Some(t), None) if t.is_zero() => return false,
                _ => drop(self.progress.wait(sync).unwrap()),
            }
        }
    }
}

impl GraphicsDevice for SoftwareDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let id = BufferId(self.next_id());
        let size = usize::try_from(descriptor.size).map_err(|_| ResourceError::OutOfBounds)?;
        self.resources.lock().unwrap().buffers.insert(
            id,
            BufferEntry {
                data: vec![0; size],
                label: descriptor.label.as_ref().map(|l| l.to_string()),
            },
        );
        self.track_allocation(size);
        log::trace!("Created buffer {id:?} ({:?}, {size} bytes).", descriptor.label);
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let entry = self
            .resources
            .lock()
            .unwrap()
            .buffers
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        self.track_release(entry.data.len());
        log::trace!("Destroyed buffer {id:?} ({:?}).", entry.label);
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut resources = self.resources.lock().unwrap();
        let buffer = resources.buffer_mut(id)?;
        let range = byte_range(buffer.data.len(), offset, data.len() as u64)?;
        buffer.data[range].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, ResourceError> {
        let resources = self.resources.lock().unwrap();
        let buffer = resources.buffer(id)?;
        Ok(buffer.data[byte_range(buffer.data.len(), offset, size)?].to_vec())
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        if descriptor.size.is_empty() {
            return Err(ResourceError::InvalidUsage(format!(
                "texture {:?} has an empty extent",
                descriptor.label
            )));
        }
        let id = TextureId(self.next_id());
        let entry = TextureEntry::new(descriptor);
        self.track_allocation(entry.byte_size());
        self.resources.lock().unwrap().textures.insert(id, entry);
        log::trace!("Created texture {id:?} ({:?}).", descriptor.label);
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        let mut resources = self.resources.lock().unwrap();
        let entry = resources.textures.remove(&id).ok_or(ResourceError::NotFound)?;
        resources.views.retain(|_, (texture, _)| *texture != id);
        self.track_release(entry.byte_size());
        Ok(())
    }

    fn write_texture(
        &self,
        id: TextureId,
        mip_level: u32,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let mut resources = self.resources.lock().unwrap();
        let texture = resources.texture_mut(id)?;
        texture.check_mips(&(mip_level..mip_level + 1))?;
        let level = &mut texture.levels[mip_level as usize];
        if level.len() != data.len() {
            return Err(ResourceError::OutOfBounds);
        }
        level.copy_from_slice(data);
        Ok(())
    }

    fn read_texture(&self, id: TextureId, mip_level: u32) -> Result<Vec<u8>, ResourceError> {
        let resources = self.resources.lock().unwrap();
        let texture = resources.texture(id)?;
        texture.check_mips(&(mip_level..mip_level + 1))?;
        Ok(texture.levels[mip_level as usize].clone())
    }

    fn create_texture_view(
        &self,
        texture: TextureId,
        descriptor: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError> {
        let mut resources = self.resources.lock().unwrap();
        let base = descriptor.base_mip_level;
        resources
            .texture(texture)?
            .check_mips(&(base..base + descriptor.mip_level_count))?;
        let id = TextureViewId(self.next_id());
        resources.views.insert(id, (texture, *descriptor));
        Ok(id)
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError> {
        // Views of a destroyed texture are already gone.
        self.resources.lock().unwrap().views.remove(&id);
        Ok(())
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        let id = SamplerId(self.next_id());
        self.resources.lock().unwrap().samplers.insert(
            id,
            SamplerEntry {
                filter: descriptor.filter,
                max_lod: descriptor.max_lod,
                reduction: descriptor.reduction,
            },
        );
        Ok(id)
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        self.resources
            .lock()
            .unwrap()
            .samplers
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError> {
        let kernel = match &descriptor.shader {
            ShaderSource::Host(kernel) => kernel.clone(),
            ShaderSource::SpirV(_) => {
                return Err(PipelineError::FeatureNotSupported(format!(
                    "the software device cannot run SPIR-V ({:?})",
                    descriptor.label
                ))
                .into())
            }
        };
        if descriptor.entry_point.is_empty() {
            return Err(PipelineError::MissingEntryPoint {
                label: descriptor.label.clone(),
            }
            .into());
        }
        let id = ComputePipelineId(self.next_id());
        self.resources.lock().unwrap().compute_pipelines.insert(
            id,
            ComputeEntry {
                kernel,
                label: descriptor.label.clone(),
            },
        );
        Ok(id)
    }

    fn destroy_compute_pipeline(&self, id: ComputePipelineId) -> Result<(), ResourceError> {
        self.resources
            .lock()
            .unwrap()
            .compute_pipelines
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError> {
        if let Some(ShaderSource::SpirV(_)) = descriptor.shader {
            log::debug!(
                "Render pipeline {:?}: SPIR-V is ignored, draws are only tallied.",
                descriptor.label
            );
        }
        let id = RenderPipelineId(self.next_id());
        self.resources
            .lock()
            .unwrap()
            .render_pipelines
            .insert(id, descriptor.label.clone());
        Ok(id)
    }

    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError> {
        self.resources
            .lock()
            .unwrap()
            .render_pipelines
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_timeline(&self, initial_value: u64) -> Result<TimelineId, ResourceError> {
        let id = TimelineId(self.next_id());
        self.sync.lock().unwrap().timelines.insert(id, initial_value);
        Ok(id)
    }

    fn timeline_value(&self, id: TimelineId) -> Result<u64, ResourceError> {
        self.sync
            .lock()
            .unwrap()
            .timelines
            .get(&id)
            .copied()
            .ok_or(ResourceError::InvalidHandle)
    }

    fn wait_timeline(
        &self,
        id: TimelineId,
        value: u64,
        timeout: Option<Duration>,
    ) -> Result<bool, ResourceError> {
        self.timeline_value(id)?;
        Ok(self.wait_until(timeout, |sync| {
            sync.timelines.get(&id).is_some_and(|v| *v >= value)
        }))
    }

    fn signal_timeline(&self, id: TimelineId, value: u64) -> Result<(), ResourceError> {
        {
            let mut sync = self.sync.lock().unwrap();
            if !sync.timelines.contains_key(&id) {
                return Err(ResourceError::InvalidHandle);
            }
            sync.signal(id, value);
        }
        self.progress.notify_all();
        if self.mode == SubmitMode::Immediate {
            self.flush();
        }
        Ok(())
    }

    fn create_fence(&self) -> Result<FenceId, ResourceError> {
        let id = FenceId(self.next_id());
        self.sync.lock().unwrap().fences.insert(id, false);
        Ok(id)
    }

    fn wait_fence(&self, id: FenceId, timeout: Option<Duration>) -> Result<bool, ResourceError> {
        if !self.sync.lock().unwrap().fences.contains_key(&id) {
            return Err(ResourceError::InvalidHandle);
        }
        Ok(self.wait_until(timeout, |sync| {
            sync.fences.get(&id).copied().unwrap_or(false)
        }))
    }

    fn destroy_fence(&self, id: FenceId) -> Result<(), ResourceError> {
        self.sync
            .lock()
            .unwrap()
            .fences
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn submit(&self, submission: QueueSubmission) -> Result<(), SubmissionError> {
        {
            let resources = self.resources.lock().unwrap();
            for command in submission.command_lists.iter().flatten() {
                executor::validate(&resources, command)?;
            }
        }
        {
            let mut sync = self.sync.lock().unwrap();
            let unknown = submission
                .waits
                .iter()
                .chain(&submission.signals)
                .any(|s| !sync.timelines.contains_key(&s.timeline));
            if unknown {
                return Err(ResourceError::InvalidHandle.into());
            }
            if let Some(fence) = submission.fence {
                match sync.fences.get_mut(&fence) {
                    Some(signalled) => *signalled = false,
                    None => return Err(ResourceError::InvalidHandle.into()),
                }
            }
            log::trace!(
                "{:?} submission queued with {} list(s).",
                submission.queue,
                submission.command_lists.len()
            );
            sync.pending
                .entry(submission.queue)
                .or_default()
                .push_back(submission);
        }
        if self.mode == SubmitMode::Immediate {
            self.flush();
        }
        Ok(())
    }
}
