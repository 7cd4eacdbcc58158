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

//! Queues, timeline counters and fences.

use super::command::Command;

/// The hardware queue a submission targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum QueueKind {
    /// Graphics and everything else.
    #[default]
    Graphics,
    /// Async compute.
    Compute,
    /// Dedicated copy engine.
    Transfer,
}

impl QueueKind {
    /// All queue kinds, in a stable order.
    pub const ALL: [QueueKind; 3] = [QueueKind::Graphics, QueueKind::Compute, QueueKind::Transfer];
}

/// An opaque handle to a timeline counter (a timeline semaphore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimelineId(pub usize);

/// An opaque handle to a binary fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FenceId(pub usize);

/// A timeline counter and the value to wait for or signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemaphoreSubmit {
    /// The counter.
    pub timeline: TimelineId,
    /// The value.
    pub value: u64,
}

/// Published once per distinct submission id when a transfer submission retires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompletionEvent {
    /// The id returned by the submit call.
    pub submission_id: u64,
    /// The queue the submission ran on.
    pub queue: QueueKind,
}

/// Everything a device needs to execute one submit call.
#[derive(Debug, Default)]
pub struct QueueSubmission {
    /// Target queue.
    pub queue: QueueKind,
    /// One command list per stream, executed in order.
    pub command_lists: Vec<Vec<Command>>,
    /// Counters that must reach their value before execution starts.
    pub waits: Vec<SemaphoreSubmit>,
    /// Counters set to their value once execution ends.
    pub signals: Vec<SemaphoreSubmit>,
    /// Fence signalled once execution ends.
    pub fence: Option<FenceId>,
}
