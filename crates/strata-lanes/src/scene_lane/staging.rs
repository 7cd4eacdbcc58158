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

//! Staging layout for splicing an imported scene into the scene buffers.
//!
//! One host buffer carries every stream back to back; one [`BufferCopy`] per
//! stream moves it into the range reserved in [`SceneBuffers`].

use super::scene_buffers::{SceneBuffers, SceneRange, VertexStream};
use std::sync::Arc;
use strata_core::renderer::api::*;
use strata_core::renderer::{CommandStream, GpuBuffer, GraphicsDevice, ResourceError};
use strata_io::ImportedMesh;

/// Destination of a staged region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneStream {
    /// The index buffer.
    Index,
    /// One vertex attribute buffer.
    Vertex(VertexStream),
    /// The material buffer.
    Material,
    /// The meshlet buffer.
    Meshlet,
}

impl SceneStream {
    /// Every stream, in staging order.
    pub const ALL: [SceneStream; 7] = [
        SceneStream::Index,
        SceneStream::Vertex(VertexStream::Position),
        SceneStream::Vertex(VertexStream::Normal),
        SceneStream::Vertex(VertexStream::TexCoord),
        SceneStream::Vertex(VertexStream::Tangent),
        SceneStream::Material,
        SceneStream::Meshlet,
    ];

    fn target(self, scene: &SceneBuffers) -> &GpuBuffer {
        match self {
            SceneStream::Index => scene.index_buffer(),
            SceneStream::Vertex(stream) => scene.vertex_buffer(stream),
            SceneStream::Material => scene.material_buffer(),
            SceneStream::Meshlet => scene.meshlet_buffer(),
        }
    }
}

/// One stream of the staging buffer and where it lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedRegion {
    /// Destination buffer.
    pub stream: SceneStream,
    /// Source and destination offsets. Zero-sized when no mesh has the stream.
    pub copy: BufferCopy,
}

/// Host bytes and copy regions for one scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneStaging {
    data: Vec<u8>,
    regions: Vec<StagedRegion>,
}

/// Computes the [`MeshInfo`] of every sub-mesh placed at `range`.
pub fn mesh_infos(meshes: &[ImportedMesh], range: &SceneRange) -> Vec<MeshInfo> {
    let mut first_index = range.first_index;
    let mut vertex_offset = range.first_vertex;
    meshes
        .iter()
        .map(|mesh| {
            let info = MeshInfo {
                index_count: mesh.indices.len() as u32,
                first_index,
                vertex_offset,
                vertex_count: mesh.vertex_count() as u32,
                material_id: range.first_material + mesh.material,
                aabb: mesh.aabb(),
                sphere: mesh.bounding_sphere(),
            };
            first_index += info.index_count;
            vertex_offset += info.vertex_count;
            info
        })
        .collect()
}

impl SceneStaging {
    /// Lays out every stream of the scene.
    ///
    /// Optional attributes are zero-filled for meshes lacking them as long
    /// as one mesh of the scene carries them, so vertex offsets stay shared
    /// across streams.
    pub fn build(
        meshes: &[ImportedMesh],
        materials: &[GpuMaterial],
        infos: &[MeshInfo],
        range: &SceneRange,
    ) -> Self {
        let mut staging = Self::default();

        let indices: Vec<u32> = meshes.iter().flat_map(|m| m.indices.iter().copied()).collect();
        staging.push(
            SceneStream::Index,
            bytemuck::cast_slice(&indices),
            range.first_index as u64 * 4,
        );

        let positions: Vec<[f32; 3]> = meshes
            .iter()
            .flat_map(|m| m.positions.iter().copied())
            .collect();
        staging.push_vertices(VertexStream::Position, bytemuck::cast_slice(&positions), range);

        let normals = gather(meshes, |m| m.normals.as_deref());
        staging.push_vertices(VertexStream::Normal, bytemuck::cast_slice(&normals), range);

        let tex_coords = gather(meshes, |m| m.tex_coords.as_deref());
        staging.push_vertices(VertexStream::TexCoord, bytemuck::cast_slice(&tex_coords), range);

        let tangents = gather(meshes, |m| m.tangents.as_deref());
        staging.push_vertices(VertexStream::Tangent, bytemuck::cast_slice(&tangents), range);

        staging.push(
            SceneStream::Material,
            bytemuck::cast_slice(materials),
            range.first_material as u64 * std::mem::size_of::<GpuMaterial>() as u64,
        );

        let meshlets: Vec<GpuMeshlet> = infos.iter().map(MeshInfo::meshlet).collect();
        staging.push(
            SceneStream::Meshlet,
            bytemuck::cast_slice(&meshlets),
            range.first_mesh as u64 * std::mem::size_of::<GpuMeshlet>() as u64,
        );

        staging
    }

    fn push_vertices(&mut self, stream: VertexStream, bytes: &[u8], range: &SceneRange) {
        self.push(
            SceneStream::Vertex(stream),
            bytes,
            range.first_vertex as u64 * stream.stride(),
        );
    }

    fn push(&mut self, stream: SceneStream, bytes: &[u8], dst_offset: u64) {
        let src_offset = self.data.len() as u64;
        self.data.extend_from_slice(bytes);
        self.regions.push(StagedRegion {
            stream,
            copy: BufferCopy::new(src_offset, dst_offset, bytes.len() as u64),
        });
    }

    /// The packed host bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// One region per [`SceneStream`], in staging order.
    pub fn regions(&self) -> &[StagedRegion] {
        &self.regions
    }

    /// The region of `stream`.
    pub fn region(&self, stream: SceneStream) -> Option<&StagedRegion> {
        self.regions.iter().find(|r| r.stream == stream)
    }

    /// Uploads the packed bytes into a new host-visible staging buffer.
    pub fn create_buffer(&self, device: &Arc<dyn GraphicsDevice>) -> Result<GpuBuffer, ResourceError> {
        GpuBuffer::with_data(device, "scene staging", BufferUsage::COPY_SRC, &self.data)
    }

    /// Records one copy per non-empty region from `staging` into `scene`.
    pub fn record(&self, stream: &mut CommandStream, staging: &GpuBuffer, scene: &SceneBuffers) {
        for region in self.regions.iter().filter(|r| !r.copy.is_empty()) {
            stream.copy_buffer(staging, region.stream.target(scene), &[region.copy]);
        }
    }
}

/// Concatenates an optional attribute over all meshes, or nothing when no mesh has it.
fn gather<T, F>(meshes: &[ImportedMesh], attribute: F) -> Vec<T>
where
    T: Copy + Default,
    F: Fn(&ImportedMesh) -> Option<&[T]>,
{
    if meshes.iter().all(|m| attribute(m).is_none()) {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(meshes.iter().map(ImportedMesh::vertex_count).sum());
    for mesh in meshes {
        let values = attribute(mesh).unwrap_or(&[]);
        let count = mesh.vertex_count();
        out.extend(values.iter().take(count).copied());
        out.extend(std::iter::repeat(T::default()).take(count.saturating_sub(values.len())));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;
    use strata_core::config::SceneBufferConfig;
    use strata_core::renderer::SubmissionQueue;
    use strata_infra::SoftwareDevice;

    fn triangle(material: u32, with_normals: bool) -> ImportedMesh {
        ImportedMesh {
            name: "tri".into(),
            indices: vec![0, 1, 2],
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: with_normals.then(|| vec![[0.0, 0.0, 1.0]; 3]),
            tex_coords: None,
            tangents: None,
            material,
        }
    }

    fn range() -> SceneRange {
        SceneRange {
            first_mesh: 1,
            first_index: 6,
            first_vertex: 4,
            first_material: 2,
        }
    }

    #[test]
    fn mesh_infos_accumulate_offsets() {
        let meshes = [triangle(0, false), triangle(1, false)];
        let infos = mesh_infos(&meshes, &range());
        assert_eq!(infos[0].first_index, 6);
        assert_eq!(infos[1].first_index, 9);
        assert_eq!(infos[1].vertex_offset, 7);
        assert_eq!(infos[1].material_id, 3);
        assert_eq!(infos[0].aabb.max.x, 1.0);
    }

    #[test]
    fn layout_has_one_region_per_stream() {
        let meshes = [triangle(0, true), triangle(0, false)];
        let infos = mesh_infos(&meshes, &range());
        let staging = SceneStaging::build(&meshes, &[GpuMaterial::zeroed()], &infos, &range());

        assert_eq!(staging.regions().len(), 7);
        let position = staging.region(SceneStream::Vertex(VertexStream::Position)).unwrap();
        assert_eq!(position.copy.dst_offset, 4 * 12);
        assert_eq!(position.copy.size, 6 * 12);

        // The second mesh has no normals: zero-filled, not dropped.
        let normal = staging.region(SceneStream::Vertex(VertexStream::Normal)).unwrap();
        assert_eq!(normal.copy.size, 6 * 12);

        // No mesh has texcoords: empty region.
        let uv = staging.region(SceneStream::Vertex(VertexStream::TexCoord)).unwrap();
        assert!(uv.copy.is_empty());

        let meshlet = staging.region(SceneStream::Meshlet).unwrap();
        assert_eq!(meshlet.copy.dst_offset, 16);
        assert_eq!(
            staging.data().len() as u64,
            staging.regions().iter().map(|r| r.copy.size).sum::<u64>()
        );
    }

    #[test]
    fn recorded_copies_land_in_the_scene_buffers() {
        let device: Arc<dyn GraphicsDevice> = Arc::new(SoftwareDevice::default());
        let config = SceneBufferConfig {
            max_meshes: 4,
            max_buffer_bytes: 4096,
            max_materials: 4,
            max_instances: 4,
        };
        let scene = SceneBuffers::new(&device, &config).unwrap();
        let queue = SubmissionQueue::new(device.clone(), QueueKind::Transfer).unwrap();

        let meshes = [triangle(0, true)];
        let range = scene.reserve(1, 3, 3, 1).unwrap();
        let infos = mesh_infos(&meshes, &range);
        let staging = SceneStaging::build(&meshes, &[GpuMaterial::zeroed()], &infos, &range);
        let buffer = staging.create_buffer(&device).unwrap();

        let mut stream = queue.acquire_stream();
        staging.record(&mut stream, &buffer, &scene);
        // Index, position, normal, material and meshlet; no texcoord or tangent.
        assert_eq!(stream.commands().len(), 5);
        queue.submit_and_wait(vec![stream]).unwrap();

        let indices = scene.index_buffer().read_pod::<u32>(0, 3).unwrap();
        assert_eq!(indices, vec![0, 1, 2]);
        let meshlet = scene.meshlet_buffer().read_pod::<GpuMeshlet>(0, 1).unwrap();
        assert_eq!(meshlet[0].index_count, 3);
    }
}
