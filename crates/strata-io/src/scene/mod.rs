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

//! CPU-side scene data produced by the importers.
//!
//! An [`ImportedScene`] is a flat description: sub-meshes with their vertex
//! streams, materials referencing images, a node hierarchy referencing
//! sub-meshes, and the images embedded in the file itself. Nothing here
//! touches the GPU; the streaming pipeline turns it into staging copies.

mod gltf;

pub use self::gltf::SceneImporter;

use strata_core::math::{Aabb, BoundingSphere, Mat4, Vec3};

/// One drawable sub-mesh (a glTF primitive).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedMesh {
    /// Name of the owning mesh, suffixed with the primitive index.
    pub name: String,
    /// Triangle-list indices, relative to this sub-mesh.
    pub indices: Vec<u32>,
    /// Vertex positions.
    pub positions: Vec<[f32; 3]>,
    /// Vertex normals, when present in the file.
    pub normals: Option<Vec<[f32; 3]>>,
    /// First UV set, when present in the file.
    pub tex_coords: Option<Vec<[f32; 2]>>,
    /// Tangents with handedness in `w`, when present in the file.
    pub tangents: Option<Vec<[f32; 4]>>,
    /// Index into [`ImportedScene::materials`].
    pub material: u32,
}

impl ImportedMesh {
    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Local-space bounding box, or [`Aabb::INVALID`] for an empty mesh.
    pub fn aabb(&self) -> Aabb {
        Aabb::from_points(&self.points()).unwrap_or(Aabb::INVALID)
    }

    /// Local-space bounding sphere: centroid plus farthest vertex.
    pub fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere::from_points(&self.points())
    }

    fn points(&self) -> Vec<Vec3> {
        self.positions.iter().copied().map(Vec3::from_array).collect()
    }
}

/// Where a material finds an image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageRef {
    /// Index into [`ImportedScene::images`].
    Embedded(usize),
    /// A path relative to the scene file.
    External(String),
}

/// A surface description.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedMaterial {
    /// Material name.
    pub name: Option<String>,
    /// Flat base color, used when there is no color texture.
    pub base_color: [f32; 4],
    /// Base color texture.
    pub color_texture: Option<ImageRef>,
    /// Tangent-space normal map.
    pub normal_texture: Option<ImageRef>,
}

impl Default for ImportedMaterial {
    fn default() -> Self {
        Self {
            name: None,
            base_color: [1.0; 4],
            color_texture: None,
            normal_texture: None,
        }
    }
}

/// A node of the scene hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedNode {
    /// Node name.
    pub name: Option<String>,
    /// Transform relative to the parent.
    pub local: Mat4,
    /// Parent node index.
    pub parent: Option<usize>,
    /// Sub-meshes drawn at this node.
    pub meshes: Vec<u32>,
}

/// An image stored inside the scene file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    /// Stable name, `*<index>`.
    pub name: String,
    /// Lowercase format hint such as `png`.
    pub format_hint: String,
    /// Encoded bytes.
    pub data: Vec<u8>,
}

/// Everything an importer extracted from one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedScene {
    /// Sub-meshes, in file order.
    pub meshes: Vec<ImportedMesh>,
    /// Materials, in file order.
    pub materials: Vec<ImportedMaterial>,
    /// Nodes, in file order.
    pub nodes: Vec<ImportedNode>,
    /// Embedded images, in file order.
    pub images: Vec<EmbeddedImage>,
}

impl ImportedScene {
    /// Total index count over all sub-meshes.
    pub fn index_count(&self) -> usize {
        self.meshes.iter().map(|m| m.indices.len()).sum()
    }

    /// Total vertex count over all sub-meshes.
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(ImportedMesh::vertex_count).sum()
    }

    /// World transform of `node`: its local transform pre-multiplied by
    /// every ancestor's, root first.
    pub fn world_transform(&self, node: usize) -> Mat4 {
        let mut world = self.nodes[node].local;
        let mut parent = self.nodes[node].parent;
        // A malformed file could loop; a chain is never longer than the node count.
        let mut budget = self.nodes.len();
        while let (Some(p), true) = (parent, budget > 0) {
            world = self.nodes[p].local * world;
            parent = self.nodes[p].parent;
            budget -= 1;
        }
        world
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn node(local: Mat4, parent: Option<usize>) -> ImportedNode {
        ImportedNode {
            name: None,
            local,
            parent,
            meshes: Vec::new(),
        }
    }

    #[test]
    fn world_transform_walks_the_parent_chain() {
        let scene = ImportedScene {
            nodes: vec![
                node(Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)), None),
                node(Mat4::from_scale(Vec3::splat(2.0)), Some(0)),
                node(Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)), Some(1)),
            ],
            ..Default::default()
        };
        let p = scene.world_transform(2).transform_point3(Vec3::ZERO);
        assert_relative_eq!(p.x, 1.0);
        assert_relative_eq!(p.y, 2.0);
        assert_relative_eq!(p.z, 0.0);
    }

    #[test]
    fn bounds_follow_positions() {
        let mesh = ImportedMesh {
            positions: vec![[-1.0, 0.0, 0.0], [1.0, 2.0, 0.0]],
            ..Default::default()
        };
        let aabb = mesh.aabb();
        assert_eq!(aabb.min, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 2.0, 0.0));
        let sphere = mesh.bounding_sphere();
        assert_relative_eq!(sphere.center.y, 1.0);
        assert_relative_eq!(sphere.radius, 2.0f32.sqrt());
        assert!(!ImportedMesh::default().aabb().is_valid());
    }
}
