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

//! GPU-visible scene records shared by the culling and streaming pipelines.
//!
//! Every `Gpu*` struct is `#[repr(C)]` and `Pod` so it can be uploaded as-is;
//! their layouts match the storage buffers the culling kernels read.

use crate::math::{Aabb, BoundingSphere, Mat4, Vec3};
use bytemuck::{Pod, Zeroable};

/// Cull flag value for the prepass: frustum test only.
pub const CULL_FRUSTUM_ONLY: u32 = 0;
/// Cull flag value for the main pass: frustum and occlusion tests.
pub const CULL_OCCLUSION: u32 = 42;

/// Per-submesh ranges and bounds, immutable after the scene is loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshInfo {
    /// Number of indices.
    pub index_count: u32,
    /// First index in the shared index buffer.
    pub first_index: u32,
    /// First vertex in the shared vertex buffers.
    pub vertex_offset: u32,
    /// Number of vertices.
    pub vertex_count: u32,
    /// Global material id.
    pub material_id: u32,
    /// Local-space bounding box.
    pub aabb: Aabb,
    /// Local-space bounding sphere: centroid and max distance.
    pub sphere: BoundingSphere,
}

impl MeshInfo {
    /// The GPU record used by the culling kernel to emit draws.
    pub fn meshlet(&self) -> GpuMeshlet {
        GpuMeshlet {
            index_count: self.index_count,
            first_index: self.first_index,
            vertex_offset: self.vertex_offset,
            _pad: 0,
        }
    }
}

/// A renderable instance as seen by the culling kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuInstance {
    /// Object to world transform, column major.
    pub model: [[f32; 4]; 4],
    /// Local AABB minimum.
    pub bounds_min: [f32; 3],
    /// Index into the meshlet buffer.
    pub mesh_id: u32,
    /// Local AABB maximum.
    pub bounds_max: [f32; 3],
    /// Index into the material buffer.
    pub material_id: u32,
    /// Local bounding sphere, center in xyz and radius in w.
    pub sphere: [f32; 4],
    /// Level of detail selector.
    pub lod_id: u32,
    /// Padding to 128 bytes.
    pub _pad: [u32; 3],
}

impl GpuInstance {
    /// Builds an instance of mesh `mesh_id` placed at `model`.
    pub fn new(model: Mat4, mesh_id: u32, mesh: &MeshInfo) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            bounds_min: mesh.aabb.min.to_array(),
            mesh_id,
            bounds_max: mesh.aabb.max.to_array(),
            material_id: mesh.material_id,
            sphere: [
                mesh.sphere.center.x,
                mesh.sphere.center.y,
                mesh.sphere.center.z,
                mesh.sphere.radius,
            ],
            lod_id: 0,
            _pad: [0; 3],
        }
    }

    /// The model matrix.
    pub fn transform(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.model)
    }

    /// The local bounding box.
    pub fn local_aabb(&self) -> Aabb {
        Aabb::from_min_max(
            Vec3::from_array(self.bounds_min),
            Vec3::from_array(self.bounds_max),
        )
    }

    /// The local bounding sphere.
    pub fn local_sphere(&self) -> BoundingSphere {
        BoundingSphere::new(
            Vec3::new(self.sphere[0], self.sphere[1], self.sphere[2]),
            self.sphere[3],
        )
    }
}

/// A material record.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuMaterial {
    /// Flat color used when no texture is bound.
    pub color: [f32; 4],
    /// Texture pool slot of the base color, 0 for the fallback.
    pub texture_id: u32,
    /// Texture pool slot of the normal map, 0 for none.
    pub normal_id: u32,
    /// Padding.
    pub _pad: [u32; 2],
}

/// Index and vertex ranges of one submesh.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct GpuMeshlet {
    /// Number of indices.
    pub index_count: u32,
    /// First index.
    pub first_index: u32,
    /// Added to every index.
    pub vertex_offset: u32,
    /// Padding.
    pub _pad: u32,
}

/// One indexed indirect draw, followed by the instance it draws.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct DrawCommand {
    /// Indices per instance.
    pub index_count: u32,
    /// Always 1.
    pub instance_count: u32,
    /// First index.
    pub first_index: u32,
    /// Added to every index.
    pub base_vertex: i32,
    /// The instance id, so the vertex stage can fetch its transform.
    pub base_instance: u32,
    /// The draw id.
    pub draw_id: u32,
}

/// Per-dispatch input of the culling kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrustumUniform {
    /// Left, right, bottom, top, near, far planes as `(n, d)` with `n·p + d ≥ 0` inside.
    pub planes: [[f32; 4]; 6],
    /// World-space frustum corners, w = 1.
    pub corners: [[f32; 4]; 8],
    /// Projection times view.
    pub view_proj: [[f32; 4]; 4],
    /// Size of pyramid level 0 in texels.
    pub pyramid_size: [f32; 2],
    /// Number of instances to test.
    pub num: u32,
    /// [`CULL_FRUSTUM_ONLY`] or [`CULL_OCCLUSION`].
    pub cull: u32,
    /// Identifies the camera.
    pub camera_id: u32,
    /// Mip count of the pyramid.
    pub pyramid_levels: u32,
    /// Padding.
    pub _pad: [u32; 2],
}

/// A view into the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// World to view.
    pub view: Mat4,
    /// View to clip, depth in `[0, 1]`.
    pub proj: Mat4,
    /// Identifies the camera in the culling uniform.
    pub id: u32,
}

impl Camera {
    /// A perspective camera at `eye` looking at `target` with +Y up.
    ///
    /// Returns `None` when `eye` and `target` coincide.
    pub fn look_at(
        eye: Vec3,
        target: Vec3,
        fov_y_radians: f32,
        aspect_ratio: f32,
        z_near: f32,
        z_far: f32,
    ) -> Option<Self> {
        Some(Self {
            view: Mat4::look_at_rh(eye, target, Vec3::Y)?,
            proj: Mat4::perspective_rh_zo(fov_y_radians, aspect_ratio, z_near, z_far),
            id: 0,
        })
    }

    /// Projection times view.
    pub fn view_proj(&self) -> Mat4 {
        self.proj * self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn gpu_layouts() {
        assert_eq!(size_of::<GpuInstance>(), 128);
        assert_eq!(size_of::<GpuMaterial>(), 32);
        assert_eq!(size_of::<GpuMeshlet>(), 16);
        assert_eq!(size_of::<DrawCommand>(), 24);
        assert_eq!(size_of::<FrustumUniform>(), 320);
    }

    #[test]
    fn instance_keeps_local_bounds() {
        let mesh = MeshInfo {
            index_count: 36,
            first_index: 6,
            vertex_offset: 4,
            vertex_count: 24,
            material_id: 3,
            aabb: Aabb::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0)),
            sphere: BoundingSphere::new(Vec3::ZERO, 3f32.sqrt()),
        };
        let instance = GpuInstance::new(Mat4::from_translation(Vec3::X), 7, &mesh);
        assert_eq!(instance.mesh_id, 7);
        assert_eq!(instance.material_id, 3);
        assert_eq!(instance.local_aabb(), mesh.aabb);
        assert_eq!(instance.transform(), Mat4::from_translation(Vec3::X));
        assert_eq!(mesh.meshlet().first_index, 6);
    }
}
