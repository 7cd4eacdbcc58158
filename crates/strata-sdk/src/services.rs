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

//! The shared services every engine part is built from.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use strata_agents::streaming::StreamingContext;
use strata_core::config::EngineConfig;
use strata_core::renderer::api::{CompletionEvent, QueueKind};
use strata_core::renderer::{GraphicsDevice, SubmissionQueue};
use strata_core::vfs::{FileSystemService, FsTag};
use strata_core::{EventBus, WorkerPool};
use strata_infra::SoftwareDevice;
use strata_io::{MemoryFileSystem, StdFileSystem};

/// Device, queues, file systems and workers.
///
/// Built once at startup and passed explicitly; nothing here is global.
#[derive(Debug)]
pub struct Services {
    /// The graphics device.
    pub device: Arc<dyn GraphicsDevice>,
    /// Tagged file system mounts.
    pub fs: Arc<FileSystemService>,
    /// The in-memory mount behind [`FsTag::Embedded`].
    pub embedded: Arc<MemoryFileSystem>,
    /// Decode and staging workers.
    pub workers: Arc<WorkerPool>,
    /// Completion events of retired transfer submissions.
    pub events: EventBus<CompletionEvent>,
    /// Queue for frames.
    pub graphics: Arc<SubmissionQueue>,
    /// Queue for asynchronous compute.
    pub compute: Arc<SubmissionQueue>,
    /// Queue for uploads.
    pub transfer: Arc<SubmissionQueue>,
}

impl Services {
    /// Builds the services around `device`.
    ///
    /// `FsTag::Default` is the working directory, `Assets` and `Cache` the
    /// configured roots and `Embedded` an empty in-memory table.
    ///
    /// ## Errors
    /// Fails when the workers or a queue cannot be created.
    pub fn new(device: Arc<dyn GraphicsDevice>, config: &EngineConfig) -> Result<Self> {
        let fs = Arc::new(FileSystemService::new());
        fs.mount(FsTag::Default, Arc::new(StdFileSystem::new(".")));
        fs.mount(FsTag::Assets, Arc::new(StdFileSystem::new(&config.asset_root)));
        fs.mount(FsTag::Cache, Arc::new(StdFileSystem::new(&config.cache_root)));
        let embedded = Arc::new(MemoryFileSystem::new());
        fs.mount(FsTag::Embedded, embedded.clone());

        let workers = Arc::new(
            WorkerPool::new(config.resolved_workers()).context("Failed to start the worker pool")?,
        );
        let events = EventBus::new();
        let queue = |kind: QueueKind| {
            SubmissionQueue::new(device.clone(), kind)
                .with_context(|| format!("Failed to create the {kind:?} queue"))
        };
        let graphics = Arc::new(queue(QueueKind::Graphics)?);
        let compute = Arc::new(queue(QueueKind::Compute)?);
        let transfer = Arc::new(queue(QueueKind::Transfer)?.with_completion_events(events.sender()));

        log::info!(
            "Services ready: {} worker(s), assets at '{}'.",
            workers.thread_count(),
            config.asset_root.display()
        );
        Ok(Self {
            device,
            fs,
            embedded,
            workers,
            events,
            graphics,
            compute,
            transfer,
        })
    }

    /// Services on a [`SoftwareDevice`].
    ///
    /// ## Errors
    /// See [`new`](Self::new).
    pub fn headless(config: &EngineConfig) -> Result<Self> {
        Self::new(Arc::new(SoftwareDevice::default()), config)
    }

    /// The handles a streaming task needs.
    pub fn streaming_context(&self) -> StreamingContext {
        StreamingContext {
            device: Arc::clone(&self.device),
            fs: Arc::clone(&self.fs),
            embedded: Arc::clone(&self.embedded),
            workers: Arc::clone(&self.workers),
            transfer: Arc::clone(&self.transfer),
        }
    }

    /// Retires every finished stream on all three queues.
    pub fn retire_all(&self) -> usize {
        self.graphics.retire() + self.compute.retire() + self.transfer.retire()
    }

    /// Waits for the workers, then for every queue.
    ///
    /// Returns `false` if the workers were still busy after `timeout`.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let idle = self.workers.wait_idle(timeout);
        if !idle {
            log::warn!("{} worker job(s) still running.", self.workers.pending());
        }
        self.transfer.wait_idle();
        self.compute.wait_idle();
        self.graphics.wait_idle();
        idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_completions_reach_the_bus() {
        let services = Services::headless(&EngineConfig::default()).unwrap();
        let id = services
            .transfer
            .submit(vec![services.transfer.acquire_stream()])
            .unwrap();
        services
            .graphics
            .submit(vec![services.graphics.acquire_stream()])
            .unwrap();

        assert_eq!(services.retire_all(), 2);
        let events = services.events.drain();
        assert_eq!(
            events,
            vec![CompletionEvent {
                submission_id: id,
                queue: QueueKind::Transfer
            }]
        );
    }

    #[test]
    fn every_tag_is_mounted() {
        let services = Services::headless(&EngineConfig::default()).unwrap();
        for tag in [FsTag::Default, FsTag::Assets, FsTag::Cache, FsTag::Embedded] {
            assert!(services.fs.is_mounted(tag));
        }
        services.embedded.insert("a.png", vec![1]);
        assert!(services.fs.exists(FsTag::Embedded, "a.png"));
    }
}
