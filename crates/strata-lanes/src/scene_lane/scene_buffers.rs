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

//! The shared vertex, index, material and meshlet buffers.
//!
//! Every streamed scene lives in one contiguous range of each buffer. Ranges
//! are reserved once, before the upload is recorded, and never released.

use crate::error::LaneError;
use std::mem::size_of;
use std::sync::{Arc, Mutex};
use strata_core::config::SceneBufferConfig;
use strata_core::renderer::api::*;
use strata_core::renderer::{GpuBuffer, GraphicsDevice, ResourceError};

/// One per-vertex attribute stream, each in its own buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexStream {
    /// `[f32; 3]` positions.
    Position,
    /// `[f32; 3]` normals.
    Normal,
    /// `[f32; 2]` texture coordinates.
    TexCoord,
    /// `[f32; 4]` tangents.
    Tangent,
}

impl VertexStream {
    /// All streams, in binding order.
    pub const ALL: [VertexStream; 4] = [
        VertexStream::Position,
        VertexStream::Normal,
        VertexStream::TexCoord,
        VertexStream::Tangent,
    ];

    /// Size of one element in bytes.
    pub const fn stride(self) -> u64 {
        match self {
            VertexStream::Position | VertexStream::Normal => 12,
            VertexStream::TexCoord => 8,
            VertexStream::Tangent => 16,
        }
    }

    fn label(self) -> &'static str {
        match self {
            VertexStream::Position => "scene positions",
            VertexStream::Normal => "scene normals",
            VertexStream::TexCoord => "scene texcoords",
            VertexStream::Tangent => "scene tangents",
        }
    }
}

/// The first element of each buffer reserved for one scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SceneRange {
    /// First meshlet slot.
    pub first_mesh: u32,
    /// First index.
    pub first_index: u32,
    /// First vertex, shared by every attribute stream.
    pub first_vertex: u32,
    /// First material slot.
    pub first_material: u32,
}

#[derive(Debug, Default)]
struct Cursor {
    meshes: u32,
    indices: u32,
    vertices: u32,
    materials: u32,
}

/// The persistent scene buffers.
#[derive(Debug)]
pub struct SceneBuffers {
    config: SceneBufferConfig,
    max_vertices: u32,
    max_indices: u32,
    vertices: [GpuBuffer; 4],
    indices: GpuBuffer,
    materials: GpuBuffer,
    meshlets: GpuBuffer,
    cursor: Mutex<Cursor>,
}

impl SceneBuffers {
    /// Allocates every buffer at its full capacity.
    ///
    /// Each attribute buffer holds `max_buffer_bytes / 16` vertices, the
    /// largest attribute bounding the shared vertex count.
    pub fn new(
        device: &Arc<dyn GraphicsDevice>,
        config: &SceneBufferConfig,
    ) -> Result<Self, ResourceError> {
        let max_vertices = (config.max_buffer_bytes / VertexStream::Tangent.stride())
            .min(u32::MAX as u64) as u32;
        let max_indices = (config.max_buffer_bytes / 4).min(u32::MAX as u64) as u32;

        let vertex_buffer = |stream: VertexStream| {
            GpuBuffer::new(
                device,
                &BufferDescriptor {
                    label: Some(stream.label().into()),
                    size: max_vertices as u64 * stream.stride(),
                    usage: BufferUsage::VERTEX | BufferUsage::STORAGE | BufferUsage::COPY_DST,
                    mapped_at_creation: false,
                },
            )
        };
        let vertices = [
            vertex_buffer(VertexStream::Position)?,
            vertex_buffer(VertexStream::Normal)?,
            vertex_buffer(VertexStream::TexCoord)?,
            vertex_buffer(VertexStream::Tangent)?,
        ];
        let indices = GpuBuffer::new(
            device,
            &BufferDescriptor {
                label: Some("scene indices".into()),
                size: max_indices as u64 * 4,
                usage: BufferUsage::INDEX | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            },
        )?;
        let materials = GpuBuffer::new(
            device,
            &BufferDescriptor {
                label: Some("scene materials".into()),
                size: config.max_materials.max(1) as u64 * size_of::<GpuMaterial>() as u64,
                usage: BufferUsage::STORAGE | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            },
        )?;
        let meshlets = GpuBuffer::new(
            device,
            &BufferDescriptor {
                label: Some("scene meshlets".into()),
                size: config.max_meshes.max(1) as u64 * size_of::<GpuMeshlet>() as u64,
                usage: BufferUsage::STORAGE | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            },
        )?;

        log::info!(
            "Scene buffers allocated: {} vertices, {} indices, {} meshes, {} materials.",
            max_vertices,
            max_indices,
            config.max_meshes,
            config.max_materials
        );

        Ok(Self {
            config: config.clone(),
            max_vertices,
            max_indices,
            vertices,
            indices,
            materials,
            meshlets,
            cursor: Mutex::new(Cursor::default()),
        })
    }

    /// Reserves ranges for a whole scene, all or nothing.
    ///
    /// Safe to call from worker threads.
    ///
    /// ## Errors
    /// `LaneError::CapacityExceeded` naming the first buffer without room.
    /// Nothing is reserved in that case.
    pub fn reserve(
        &self,
        meshes: u32,
        indices: u32,
        vertices: u32,
        materials: u32,
    ) -> Result<SceneRange, LaneError> {
        let mut cursor = self.cursor.lock().unwrap();
        let checks = [
            ("meshlet", cursor.meshes, meshes, self.config.max_meshes),
            ("index", cursor.indices, indices, self.max_indices),
            ("vertex", cursor.vertices, vertices, self.max_vertices),
            ("material", cursor.materials, materials, self.config.max_materials),
        ];
        for (buffer, used, requested, capacity) in checks {
            let available = capacity.saturating_sub(used);
            if requested > available {
                return Err(LaneError::CapacityExceeded {
                    buffer,
                    requested: requested as u64,
                    available: available as u64,
                });
            }
        }

        let range = SceneRange {
            first_mesh: cursor.meshes,
            first_index: cursor.indices,
            first_vertex: cursor.vertices,
            first_material: cursor.materials,
        };
        cursor.meshes += meshes;
        cursor.indices += indices;
        cursor.vertices += vertices;
        cursor.materials += materials;
        log::debug!("Reserved scene range {range:?}.");
        Ok(range)
    }

    /// The buffer of one vertex stream.
    pub fn vertex_buffer(&self, stream: VertexStream) -> &GpuBuffer {
        &self.vertices[stream as usize]
    }

    /// All vertex buffers, in binding order.
    pub fn vertex_buffers(&self) -> [&GpuBuffer; 4] {
        [
            &self.vertices[0],
            &self.vertices[1],
            &self.vertices[2],
            &self.vertices[3],
        ]
    }

    /// The 32-bit index buffer.
    pub fn index_buffer(&self) -> &GpuBuffer {
        &self.indices
    }

    /// The [`GpuMaterial`] buffer.
    pub fn material_buffer(&self) -> &GpuBuffer {
        &self.materials
    }

    /// The [`GpuMeshlet`] buffer, indexed by mesh id.
    pub fn meshlet_buffer(&self) -> &GpuBuffer {
        &self.meshlets
    }

    /// Capacities this instance was created with.
    pub fn config(&self) -> &SceneBufferConfig {
        &self.config
    }

    /// Vertex capacity shared by every attribute stream.
    pub fn max_vertices(&self) -> u32 {
        self.max_vertices
    }

    /// Index capacity.
    pub fn max_indices(&self) -> u32 {
        self.max_indices
    }

    /// Meshlets reserved so far.
    pub fn mesh_count(&self) -> u32 {
        self.cursor.lock().unwrap().meshes
    }

    /// Indices reserved so far.
    pub fn index_count(&self) -> u32 {
        self.cursor.lock().unwrap().indices
    }

    /// Vertices reserved so far.
    pub fn vertex_count(&self) -> u32 {
        self.cursor.lock().unwrap().vertices
    }

    /// Materials reserved so far.
    pub fn material_count(&self) -> u32 {
        self.cursor.lock().unwrap().materials
    }
}
