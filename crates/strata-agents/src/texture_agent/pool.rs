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

//! Bindless texture slots filled asynchronously by worker tasks.

use super::TextureMask;
use crate::streaming::{StreamingCommit, StreamingContext, TextureCommit};
use anyhow::{bail, Context, Result};
use crossbeam_channel::Sender;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use strata_core::math::Extent2D;
use strata_core::renderer::api::*;
use strata_core::renderer::{GpuBuffer, GpuTexture};
use strata_core::vfs::FsTag;
use strata_io::ImageLoader;

/// Number of slots in the pool.
pub const TEXTURE_POOL_CAPACITY: u32 = 300;

/// The built-in 1×1 white texture, always loaded.
pub const FALLBACK_SLOT: u32 = 0;

const FALLBACK_NAME: &str = "<fallback>";

#[derive(Debug, Default)]
struct Slots {
    textures: Vec<Option<GpuTexture>>,
    names: BTreeMap<String, Vec<u32>>,
    submitted: HashMap<u64, Vec<u32>>,
    loaded: TextureMask,
}

/// A fixed array of texture slots addressed by index from shaders.
///
/// Slots are reserved with a lock-free counter so worker tasks can hand out
/// indices while the main thread renders. A slot becomes usable once the
/// transfer submission filling it reports completion through
/// [`receive`](Self::receive).
#[derive(Debug)]
pub struct TexturePool {
    context: StreamingContext,
    commits: Sender<StreamingCommit>,
    count: AtomicU32,
    slots: Mutex<Slots>,
    fallback: GpuTexture,
}

impl TexturePool {
    /// Creates the pool with its fallback texture in slot 0.
    ///
    /// ## Errors
    /// Fails if the device cannot create the fallback texture.
    pub fn new(context: StreamingContext, commits: Sender<StreamingCommit>) -> Result<Self> {
        let fallback = GpuTexture::new(
            &context.device,
            &TextureDescriptor {
                label: Some(FALLBACK_NAME.into()),
                size: Extent2D::new(1, 1),
                mip_level_count: 1,
                format: TextureFormat::Rgba8Unorm,
                usage: TextureUsage::SAMPLED | TextureUsage::COPY_DST,
            },
        )
        .context("Failed to create the fallback texture")?;
        fallback
            .write_level(0, &[255; 4])
            .context("Failed to fill the fallback texture")?;

        let mut slots = Slots {
            textures: vec![None; TEXTURE_POOL_CAPACITY as usize],
            ..Default::default()
        };
        slots.textures[FALLBACK_SLOT as usize] = Some(fallback.clone());
        slots
            .names
            .insert(FALLBACK_NAME.to_string(), vec![FALLBACK_SLOT]);
        slots.loaded.set(FALLBACK_SLOT);

        Ok(Self {
            context,
            commits,
            count: AtomicU32::new(FALLBACK_SLOT + 1),
            slots: Mutex::new(slots),
            fallback,
        })
    }

    /// Requests the image at `path` on the mount `tag`.
    ///
    /// Returns the reserved slot, or [`FALLBACK_SLOT`] when the format is not
    /// decodable. The upload is prepared on a worker; the slot reads as the
    /// fallback until it completes.
    pub fn fetch(&self, path: impl AsRef<Path>, tag: FsTag) -> u32 {
        let path = path.as_ref().to_path_buf();
        let hint = self.context.fs.format_hint(tag, &path);
        if !ImageLoader::supports(&hint) {
            log::warn!(
                "Unsupported image format '{hint}' for {}; using the fallback texture.",
                path.display()
            );
            return FALLBACK_SLOT;
        }

        let slot = self.allocate();
        let context = self.context.clone();
        let commits = self.commits.clone();
        self.context.workers.spawn(move || {
            match prepare_texture(&context, slot, tag, &path, &hint) {
                Ok(commit) => {
                    log::debug!("Texture '{}' staged for slot {slot}.", commit.name);
                    if commits.send(StreamingCommit::Texture(commit)).is_err() {
                        log::warn!("Streaming channel closed; dropping texture slot {slot}.");
                    }
                }
                Err(e) => log::error!("Failed to load texture {}: {e:#}", path.display()),
            }
        });
        slot
    }

    /// Reserves the next free slot.
    ///
    /// Running out of slots is unrecoverable for a bindless table sized at
    /// startup: the error is logged and the process exits.
    pub fn allocate(&self) -> u32 {
        match self.try_allocate() {
            Ok(slot) => slot,
            Err(e) => {
                log::error!("{e:#}");
                std::process::exit(1);
            }
        }
    }

    /// Reserves the next free slot.
    ///
    /// ## Errors
    /// Fails once all [`TEXTURE_POOL_CAPACITY`] slots are taken.
    pub fn try_allocate(&self) -> Result<u32> {
        match self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < TEXTURE_POOL_CAPACITY).then_some(n + 1)
            }) {
            Ok(slot) => Ok(slot),
            Err(_) => bail!("TexturePool capacity of {TEXTURE_POOL_CAPACITY} textures exceeded"),
        }
    }

    /// Binds `texture` to `slot`, pending the transfer submission `submission_id`.
    pub fn set(&self, slot: u32, name: impl Into<String>, texture: GpuTexture, submission_id: u64) {
        if slot >= self.len() {
            log::warn!("Ignoring texture for unreserved slot {slot}.");
            return;
        }
        let mut slots = self.slots.lock().unwrap();
        slots.textures[slot as usize] = Some(texture);
        slots.names.entry(name.into()).or_default().push(slot);
        slots.submitted.entry(submission_id).or_default().push(slot);
    }

    /// Marks the slots uploaded by a finished transfer submission as loaded.
    pub fn receive(&self, event: &CompletionEvent) {
        if event.queue != QueueKind::Transfer {
            return;
        }
        let mut slots = self.slots.lock().unwrap();
        if let Some(done) = slots.submitted.remove(&event.submission_id) {
            for slot in done {
                slots.loaded.set(slot);
            }
            log::trace!("Textures of transfer {} are resident.", event.submission_id);
        }
    }

    /// Returns `true` when every slot in `mask` is loaded.
    pub fn verify(&self, mask: &TextureMask) -> bool {
        self.slots.lock().unwrap().loaded.contains_all(mask)
    }

    /// The set of loaded slots.
    pub fn loaded(&self) -> TextureMask {
        self.slots.lock().unwrap().loaded
    }

    /// The texture bound to `slot`, if any.
    pub fn texture(&self, slot: u32) -> Option<GpuTexture> {
        self.slots
            .lock()
            .unwrap()
            .textures
            .get(slot as usize)
            .cloned()
            .flatten()
    }

    /// One view per reserved slot, in slot order. Slots that are not loaded
    /// yet show the fallback texture.
    pub fn views(&self) -> Result<Vec<TextureViewId>> {
        let slots = self.slots.lock().unwrap();
        (0..self.len())
            .map(|slot| {
                let texture = match &slots.textures[slot as usize] {
                    Some(texture) if slots.loaded.contains(slot) => texture,
                    _ => &self.fallback,
                };
                texture
                    .full_view()
                    .with_context(|| format!("No view for texture slot {slot}"))
            })
            .collect()
    }

    /// Names of every bound texture, sorted.
    pub fn texture_names(&self) -> Vec<String> {
        self.slots.lock().unwrap().names.keys().cloned().collect()
    }

    /// The first slot bound under `name`.
    pub fn slot_by_name(&self, name: &str) -> Option<u32> {
        self.slots
            .lock()
            .unwrap()
            .names
            .get(name)
            .and_then(|slots| slots.first().copied())
    }

    /// Number of reserved slots, the fallback included.
    pub fn len(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Always `false`: the fallback occupies slot 0.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of slots.
    pub fn capacity(&self) -> u32 {
        TEXTURE_POOL_CAPACITY
    }
}

fn prepare_texture(
    context: &StreamingContext,
    slot: u32,
    tag: FsTag,
    path: &Path,
    hint: &str,
) -> Result<TextureCommit> {
    let bytes = context
        .fs
        .read_file(tag, path)
        .with_context(|| format!("Reading {} from {tag:?}", path.display()))?;
    let image = ImageLoader::srgb().decode(&bytes, hint)?;
    let name = path.to_string_lossy().into_owned();

    let texture = GpuTexture::new(
        &context.device,
        &TextureDescriptor {
            label: Some(name.as_str().into()),
            size: image.size,
            mip_level_count: 1,
            format: image.format,
            usage: TextureUsage::SAMPLED | TextureUsage::COPY_DST,
        },
    )?;
    let staging = GpuBuffer::with_data(
        &context.device,
        "texture staging",
        BufferUsage::COPY_SRC,
        &image.pixels,
    )?;

    let mut stream = context.transfer.acquire_stream();
    stream.copy_buffer_to_texture(&staging, 0, &texture, 0);
    Ok(TextureCommit {
        slot,
        name,
        texture,
        stream,
    })
}
