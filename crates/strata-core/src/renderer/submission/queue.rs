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

use super::stream::CommandStream;
use crate::renderer::api::{
    CompletionEvent, QueueKind, QueueSubmission, SemaphoreSubmit, TimelineId,
};
use crate::renderer::error::{ResourceError, SubmissionError};
use crate::renderer::traits::GraphicsDevice;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct QueueState {
    last_submitted: u64,
    last_finished: u64,
    in_flight: Vec<CommandStream>,
    pool: Vec<CommandStream>,
    waits: Vec<SemaphoreSubmit>,
    signals: Vec<SemaphoreSubmit>,
}

/// One device queue with its timeline counter and stream pool.
///
/// Every `submit` consumes the next id and signals the timeline with it, so
/// ids are strictly increasing and "id N finished" means every submission up
/// to N finished. All bookkeeping sits behind one mutex, which makes
/// [`SubmissionQueue::acquire_stream`] callable from worker threads while
/// the main thread submits and retires.
#[derive(Debug)]
pub struct SubmissionQueue {
    device: Arc<dyn GraphicsDevice>,
    kind: QueueKind,
    timeline: TimelineId,
    next_serial: AtomicU64,
    state: Mutex<QueueState>,
    events: Option<flume::Sender<CompletionEvent>>,
}

impl SubmissionQueue {
    /// Creates the queue and its timeline counter.
    ///
    /// ## Errors
    /// The device error if the timeline cannot be created.
    pub fn new(device: Arc<dyn GraphicsDevice>, kind: QueueKind) -> Result<Self, ResourceError> {
        let timeline = device.create_timeline(0)?;
        log::debug!("{kind:?} queue created with timeline {timeline:?}.");
        Ok(Self {
            device,
            kind,
            timeline,
            next_serial: AtomicU64::new(1),
            state: Mutex::new(QueueState::default()),
            events: None,
        })
    }

    /// Routes completion events of retired transfer submissions to `sender`.
    pub fn with_completion_events(mut self, sender: flume::Sender<CompletionEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// The queue kind.
    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    /// The timeline counter signalled by every submission.
    pub fn timeline(&self) -> TimelineId {
        self.timeline
    }

    /// The semaphore another queue waits on to observe submission `id`.
    pub fn semaphore(&self, id: u64) -> SemaphoreSubmit {
        SemaphoreSubmit {
            timeline: self.timeline,
            value: id,
        }
    }

    /// Returns a recording stream, recycled from the pool when possible.
    pub fn acquire_stream(&self) -> CommandStream {
        let mut state = self.state.lock().unwrap();
        let mut stream = state.pool.pop().unwrap_or_else(|| {
            let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
            log::trace!("{:?} queue allocating stream #{serial}.", self.kind);
            CommandStream::new(serial, self.kind)
        });
        stream.begin();
        stream
    }

    /// Hands back a stream that will not be submitted. Its commands and
    /// resource references are dropped and it returns to the pool.
    pub fn release_stream(&self, mut stream: CommandStream) {
        if stream.queue() != self.kind || stream.submission_id() != 0 {
            log::warn!(
                "{:?} queue refused stream #{} ({:?}, submission {}).",
                self.kind,
                stream.serial(),
                stream.queue(),
                stream.submission_id()
            );
            return;
        }
        stream.reset();
        self.state.lock().unwrap().pool.push(stream);
    }

    /// Registers a one-shot wait for the next submit.
    pub fn queue_wait(&self, semaphore: SemaphoreSubmit) {
        self.state.lock().unwrap().waits.push(semaphore);
    }

    /// Registers a one-shot signal for the next submit.
    pub fn queue_signal(&self, semaphore: SemaphoreSubmit) {
        self.state.lock().unwrap().signals.push(semaphore);
    }

    /// Submits `streams` as one batch and returns its id.
    ///
    /// Pending one-shot waits and signals are attached and cleared. On
    /// failure the id is not consumed and the streams go back to the pool.
    ///
    /// ## Errors
    /// * `SubmissionError::EmptySubmission` - If `streams` is empty.
    /// * `SubmissionError::QueueMismatch` - If a stream belongs to another queue.
    /// * `SubmissionError::Device` - If the device rejects the work.
    pub fn submit(&self, mut streams: Vec<CommandStream>) -> Result<u64, SubmissionError> {
        if streams.is_empty() {
            return Err(SubmissionError::EmptySubmission);
        }
        if let Some(stream) = streams.iter().find(|s| s.queue() != self.kind) {
            return Err(SubmissionError::QueueMismatch {
                stream: stream.queue(),
                queue: self.kind,
            });
        }

        let mut state = self.state.lock().unwrap();
        let id = state.last_submitted + 1;
        let waits = std::mem::take(&mut state.waits);
        let mut signals = std::mem::take(&mut state.signals);
        signals.push(self.semaphore(id));

        let submission = QueueSubmission {
            queue: self.kind,
            command_lists: streams.iter_mut().map(|s| s.take_commands()).collect(),
            waits: waits.clone(),
            signals: signals.clone(),
            fence: None,
        };

        if let Err(e) = self.device.submit(submission) {
            log::error!("{:?} queue submission {id} failed: {e}", self.kind);
            // The one-shot semaphores stay queued for the next attempt.
            signals.pop();
            state.waits = waits;
            state.signals = signals;
            for mut stream in streams {
                stream.reset();
                state.pool.push(stream);
            }
            return Err(e);
        }

        for stream in &mut streams {
            stream.mark_submitted(id);
        }
        log::debug!(
            "{:?} queue submitted {} stream(s) as #{id}.",
            self.kind,
            streams.len()
        );
        state.in_flight.extend(streams);
        state.last_submitted = id;
        Ok(id)
    }

    /// Returns `true` if submission `id` finished, without blocking.
    ///
    /// Id 0 and ids never submitted are reported as not finished.
    pub fn poll(&self, id: u64) -> bool {
        {
            let state = self.state.lock().unwrap();
            if id == 0 || id > state.last_submitted {
                return false;
            }
            if id <= state.last_finished {
                return true;
            }
        }
        match self.device.timeline_value(self.timeline) {
            Ok(value) => {
                self.update_finished(value);
                id <= value
            }
            Err(e) => {
                log::error!("Failed to query the {:?} timeline: {e}", self.kind);
                false
            }
        }
    }

    /// Blocks until submission `id` finished or `timeout` elapses.
    pub fn wait(&self, id: u64, timeout: Duration) -> bool {
        self.wait_for(id, Some(timeout))
    }

    fn wait_for(&self, id: u64, timeout: Option<Duration>) -> bool {
        {
            let state = self.state.lock().unwrap();
            if id == 0 || id > state.last_submitted {
                return false;
            }
            if id <= state.last_finished {
                return true;
            }
        }
        match self.device.wait_timeline(self.timeline, id, timeout) {
            Ok(true) => {
                self.update_finished(id);
                true
            }
            Ok(false) => false,
            Err(e) => {
                log::error!("Failed to wait on the {:?} timeline: {e}", self.kind);
                false
            }
        }
    }

    fn update_finished(&self, value: u64) {
        let mut state = self.state.lock().unwrap();
        let value = value.min(state.last_submitted);
        if value > state.last_finished {
            state.last_finished = value;
        }
    }

    /// Recycles every finished stream and returns how many were retired.
    ///
    /// The timeline is queried once. On the transfer queue one
    /// [`CompletionEvent`] is published per distinct finished id.
    pub fn retire(&self) -> usize {
        let value = match self.device.timeline_value(self.timeline) {
            Ok(value) => value,
            Err(e) => {
                log::error!("Failed to query the {:?} timeline: {e}", self.kind);
                return 0;
            }
        };

        let mut state = self.state.lock().unwrap();
        let value = value.min(state.last_submitted);
        if value > state.last_finished {
            state.last_finished = value;
        }
        let last_finished = state.last_finished;

        let (finished, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut state.in_flight)
            .into_iter()
            .partition(|s| s.submission_id() <= last_finished);
        state.in_flight = pending;

        let mut retired_ids: Vec<u64> = finished.iter().map(|s| s.submission_id()).collect();
        retired_ids.dedup();

        let count = finished.len();
        for mut stream in finished {
            stream.reset();
            state.pool.push(stream);
        }
        drop(state);

        if self.kind == QueueKind::Transfer {
            if let Some(events) = &self.events {
                for submission_id in retired_ids {
                    let event = CompletionEvent {
                        submission_id,
                        queue: self.kind,
                    };
                    if events.send(event).is_err() {
                        log::warn!("Completion event receiver dropped.");
                        break;
                    }
                }
            }
        }

        if count > 0 {
            log::debug!("{:?} queue retired {count} stream(s).", self.kind);
        }
        count
    }

    /// Submits `streams`, blocks until they finished and retires them.
    pub fn submit_and_wait(&self, streams: Vec<CommandStream>) -> Result<u64, SubmissionError> {
        let id = self.submit(streams)?;
        if !self.wait_for(id, None) {
            return Err(SubmissionError::Timeout);
        }
        self.retire();
        Ok(id)
    }

    /// Runs `stream` to completion behind a fence, outside the timeline.
    ///
    /// No id is consumed and pending one-shot semaphores stay queued for the
    /// next `submit`. The stream goes straight back to the pool.
    pub fn submit_oneshot(&self, mut stream: CommandStream) -> Result<(), SubmissionError> {
        if stream.queue() != self.kind {
            return Err(SubmissionError::QueueMismatch {
                stream: stream.queue(),
                queue: self.kind,
            });
        }
        let fence = self.device.create_fence()?;
        let submission = QueueSubmission {
            queue: self.kind,
            command_lists: vec![stream.take_commands()],
            fence: Some(fence),
            ..Default::default()
        };

        let result = self
            .device
            .submit(submission)
            .and_then(|()| match self.device.wait_fence(fence, None) {
                Ok(true) => Ok(()),
                Ok(false) => Err(SubmissionError::Timeout),
                Err(e) => Err(e.into()),
            });
        if let Err(e) = self.device.destroy_fence(fence) {
            log::error!("Failed to destroy fence {fence:?}: {e}");
        }

        stream.reset();
        self.state.lock().unwrap().pool.push(stream);
        result
    }

    /// Waits for the last submission and retires everything.
    pub fn wait_idle(&self) {
        let last = self.last_submitted();
        if last > 0 && !self.wait_for(last, None) {
            log::error!("{:?} queue failed to go idle.", self.kind);
        }
        self.retire();
    }

    /// Id of the most recent submission, 0 before the first.
    pub fn last_submitted(&self) -> u64 {
        self.state.lock().unwrap().last_submitted
    }

    /// Highest id known to have finished.
    pub fn last_finished(&self) -> u64 {
        self.state.lock().unwrap().last_finished
    }

    /// Number of submitted streams awaiting retirement.
    pub fn in_flight_count(&self) -> usize {
        self.state.lock().unwrap().in_flight.len()
    }

    /// Number of streams ready for reuse.
    pub fn pooled_count(&self) -> usize {
        self.state.lock().unwrap().pool.len()
    }

    /// The device this queue submits to.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }
}
