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

use crate::streaming::{SceneCommit, StreamingCommit, StreamingContext};
use crate::texture_agent::{TextureMask, TexturePool, FALLBACK_SLOT};
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strata_core::math::Mat4;
use strata_core::renderer::api::{GpuMaterial, MeshInfo};
use strata_core::vfs::FsTag;
use strata_io::{ImageRef, ImportedMaterial, ImportedScene, SceneImporter};
use strata_lanes::scene_lane::{mesh_infos, SceneBuffers, SceneRange, SceneStaging};

/// One object to instantiate from a loaded scene.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDesc {
    /// Name of the node it comes from.
    pub name: Option<String>,
    /// World transform, parents applied.
    pub transform: Mat4,
    /// Global mesh id in the scene buffers.
    pub mesh_id: u32,
}

/// A scene whose data is resident on the GPU.
#[derive(Debug, Clone)]
pub struct LoadedScene {
    /// Path of the scene file.
    pub path: PathBuf,
    /// Ranges it occupies in the scene buffers.
    pub range: SceneRange,
    /// Draw information per sub-mesh; `meshes[i]` is mesh `range.first_mesh + i`.
    pub meshes: Vec<MeshInfo>,
    /// Objects to instantiate.
    pub instances: Vec<InstanceDesc>,
}

impl LoadedScene {
    /// The draw information of the global mesh `mesh_id`.
    pub fn mesh(&self, mesh_id: u32) -> Option<&MeshInfo> {
        let local = mesh_id.checked_sub(self.range.first_mesh)?;
        self.meshes.get(local as usize)
    }
}

#[derive(Debug)]
struct PendingScene {
    submission_id: u64,
    path: PathBuf,
    range: SceneRange,
    meshes: Vec<MeshInfo>,
    graph: ImportedScene,
    textures: TextureMask,
}

/// Streams glTF scenes into the persistent scene buffers.
#[derive(Debug)]
pub struct SceneStreamer {
    context: StreamingContext,
    textures: Arc<TexturePool>,
    scene: Arc<SceneBuffers>,
    sender: Sender<StreamingCommit>,
    receiver: Receiver<StreamingCommit>,
    pending: Vec<PendingScene>,
    last_scene_submission: u64,
}

impl SceneStreamer {
    /// Creates a streamer publishing through `sender` and draining `receiver`.
    ///
    /// The texture pool must publish to the same channel: scene materials
    /// only become ready once their texture commits went through
    /// [`update`](Self::update).
    pub fn new(
        context: StreamingContext,
        textures: Arc<TexturePool>,
        scene: Arc<SceneBuffers>,
        (sender, receiver): (Sender<StreamingCommit>, Receiver<StreamingCommit>),
    ) -> Self {
        Self {
            context,
            textures,
            scene,
            sender,
            receiver,
            pending: Vec::new(),
            last_scene_submission: 0,
        }
    }

    /// Queues the import of `path` from the mount `tag`.
    ///
    /// Returns `false`, after logging, when the extension is not a scene format.
    pub fn load_scene(&self, path: impl AsRef<Path>, tag: FsTag) -> bool {
        let path = path.as_ref().to_path_buf();
        let hint = self.context.fs.format_hint(tag, &path);
        if !SceneImporter::supports(&hint) {
            log::warn!("Unsupported scene format '{hint}' for {}.", path.display());
            return false;
        }

        let context = self.context.clone();
        let textures = Arc::clone(&self.textures);
        let scene = Arc::clone(&self.scene);
        let sender = self.sender.clone();
        log::info!("Streaming scene {}...", path.display());
        self.context.workers.spawn(move || {
            match stage_scene(&context, &textures, &scene, tag, &path) {
                Ok(commit) => {
                    if sender.send(StreamingCommit::Scene(commit)).is_err() {
                        log::warn!("Streaming channel closed; dropping {}.", path.display());
                    }
                }
                Err(e) => log::error!("Failed to stream scene {}: {e:#}", path.display()),
            }
        });
        true
    }

    /// Submits every commit the workers published since the last call.
    ///
    /// Returns the number of commits submitted. A commit whose submission
    /// fails is logged and dropped.
    pub fn update(&mut self) -> usize {
        let mut submitted = 0;
        while let Ok(commit) = self.receiver.try_recv() {
            match commit {
                StreamingCommit::Texture(commit) => {
                    match self.context.transfer.submit(vec![commit.stream]) {
                        Ok(id) => {
                            self.textures.set(commit.slot, commit.name, commit.texture, id);
                            submitted += 1;
                        }
                        Err(e) => log::error!("Texture upload for slot {} failed: {e}", commit.slot),
                    }
                }
                StreamingCommit::Scene(SceneCommit {
                    path,
                    range,
                    meshes,
                    graph,
                    textures,
                    stream,
                }) => match self.context.transfer.submit(vec![stream]) {
                    Ok(id) => {
                        log::debug!("Scene {} submitted as transfer {id}.", path.display());
                        self.last_scene_submission = id;
                        self.pending.push(PendingScene {
                            submission_id: id,
                            path,
                            range,
                            meshes,
                            graph,
                            textures,
                        });
                        submitted += 1;
                    }
                    Err(e) => log::error!("Scene upload {} failed: {e}", path.display()),
                },
            }
        }
        submitted
    }

    /// Releases the first pending scene whose copies finished and whose
    /// textures are all loaded.
    pub fn poll_update(&mut self) -> Option<LoadedScene> {
        let transfer = &self.context.transfer;
        let textures = &self.textures;
        let ready = self
            .pending
            .iter()
            .position(|p| transfer.poll(p.submission_id) && textures.verify(&p.textures))?;
        let scene = self.pending.remove(ready);

        let first_mesh = scene.range.first_mesh;
        let graph = &scene.graph;
        let instances = graph
            .nodes
            .iter()
            .enumerate()
            .flat_map(|(index, node)| {
                let transform = graph.world_transform(index);
                node.meshes.iter().map(move |mesh| InstanceDesc {
                    name: node.name.clone(),
                    transform,
                    mesh_id: first_mesh + mesh,
                })
            })
            .collect::<Vec<_>>();
        log::info!(
            "Scene {} is resident: {} mesh(es), {} instance(s).",
            scene.path.display(),
            scene.meshes.len(),
            instances.len()
        );
        Some(LoadedScene {
            path: scene.path,
            range: scene.range,
            meshes: scene.meshes,
            instances,
        })
    }

    /// Scenes submitted but not yet released.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Id of the most recent scene upload on the transfer queue, 0 if none.
    pub fn last_scene_submission(&self) -> u64 {
        self.last_scene_submission
    }

    /// The texture pool scene materials draw from.
    pub fn textures(&self) -> &Arc<TexturePool> {
        &self.textures
    }
}

fn stage_scene(
    context: &StreamingContext,
    textures: &TexturePool,
    scene: &SceneBuffers,
    tag: FsTag,
    path: &Path,
) -> Result<SceneCommit> {
    let mut imported = SceneImporter
        .import(&context.fs, tag, path)
        .with_context(|| format!("Importing {}", path.display()))?;

    for image in &imported.images {
        context
            .embedded
            .insert_with_hint(path.join(&image.name), image.data.clone(), &image.format_hint);
    }

    let range = scene.reserve(
        imported.meshes.len() as u32,
        imported.index_count() as u32,
        imported.vertex_count() as u32,
        imported.materials.len() as u32,
    )?;
    let infos = mesh_infos(&imported.meshes, &range);

    let mut mask = TextureMask::new();
    let materials = imported
        .materials
        .iter()
        .map(|material| gpu_material(material, &imported, textures, tag, path, &mut mask))
        .collect::<Vec<_>>();

    let staging = SceneStaging::build(&imported.meshes, &materials, &infos, &range);
    let buffer = staging.create_buffer(&context.device)?;
    let mut stream = context.transfer.acquire_stream();
    staging.record(&mut stream, &buffer, scene);
    log::debug!(
        "Staged {} ({} bytes, {} textures).",
        path.display(),
        staging.data().len(),
        mask.count()
    );

    let graph = ImportedScene {
        nodes: std::mem::take(&mut imported.nodes),
        ..Default::default()
    };
    Ok(SceneCommit {
        path: path.to_path_buf(),
        range,
        meshes: infos,
        graph,
        textures: mask,
        stream,
    })
}

fn gpu_material(
    material: &ImportedMaterial,
    imported: &ImportedScene,
    textures: &TexturePool,
    tag: FsTag,
    path: &Path,
    mask: &mut TextureMask,
) -> GpuMaterial {
    let mut slot = |image: &Option<ImageRef>| {
        let slot = match image {
            Some(ImageRef::Embedded(index)) => match imported.images.get(*index) {
                Some(image) => textures.fetch(path.join(&image.name), FsTag::Embedded),
                None => FALLBACK_SLOT,
            },
            Some(ImageRef::External(uri)) => {
                let base = path.parent().unwrap_or(Path::new(""));
                textures.fetch(base.join(uri), tag)
            }
            None => FALLBACK_SLOT,
        };
        if slot != FALLBACK_SLOT {
            mask.set(slot);
        }
        slot
    };
    GpuMaterial {
        color: material.base_color,
        texture_id: slot(&material.color_texture),
        normal_id: slot(&material.normal_texture),
        _pad: [0; 2],
    }
}
