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

//! Frustum extraction and the conservative visibility tests.

use strata_core::math::{Aabb, BoundingSphere, Mat4, Vec3, Vec4};
use strata_core::renderer::api::{Camera, FrustumUniform};

/// A world-space frustum: six inward-facing planes and eight corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far. `n·p + d >= 0` is inside.
    pub planes: [Vec4; 6],
    /// Corners of the NDC cube `[-1, 1]³` brought back to world space.
    pub corners: [Vec3; 8],
}

impl Frustum {
    /// Extracts the frustum of `view_proj`.
    ///
    /// Returns `None` when the matrix cannot be inverted.
    pub fn from_matrix(view_proj: &Mat4) -> Option<Self> {
        Some(Self {
            planes: planes(view_proj),
            corners: corners(view_proj)?,
        })
    }

    /// The frustum of `camera`.
    pub fn from_camera(camera: &Camera) -> Option<Self> {
        Self::from_matrix(&camera.view_proj())
    }

    /// Reads the frustum back from a uniform block.
    pub fn from_uniform(uniform: &FrustumUniform) -> Self {
        Self {
            planes: uniform.planes.map(Vec4::from_array),
            corners: uniform.corners.map(|c| Vec3::new(c[0], c[1], c[2])),
        }
    }

    /// Returns `false` if the sphere lies entirely outside one plane.
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|p| signed_distance(p, sphere.center) >= -sphere.radius)
    }

    /// Returns `false` if the box lies entirely outside the frustum.
    ///
    /// The plane test alone accepts large boxes sitting next to a frustum
    /// edge; testing the frustum corners against the box rejects those.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        let outside_plane = self.planes.iter().any(|p| {
            let positive = Vec3::new(
                if p.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if p.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if p.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            signed_distance(p, positive) < 0.0
        });
        if outside_plane {
            return false;
        }

        for axis in 0..3 {
            if self.corners.iter().all(|c| c[axis] > aabb.max[axis])
                || self.corners.iter().all(|c| c[axis] < aabb.min[axis])
            {
                return false;
            }
        }
        true
    }
}

fn signed_distance(plane: &Vec4, point: Vec3) -> f32 {
    plane.x * point.x + plane.y * point.y + plane.z * point.z + plane.w
}

/// Planes of `m = proj * view`, `plane = row3 ± row_i`, normalized.
///
/// Order: left, right, bottom, top, near, far.
pub fn planes(m: &Mat4) -> [Vec4; 6] {
    let r0 = m.get_row(0);
    let r1 = m.get_row(1);
    let r2 = m.get_row(2);
    let r3 = m.get_row(3);
    [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r3 + r2, r3 - r2].map(normalize_plane)
}

fn normalize_plane(p: Vec4) -> Vec4 {
    let len = p.truncate().length();
    if len > 0.0 {
        p / len
    } else {
        p
    }
}

/// World-space corners of the NDC cube with `z ∈ {-1, 1}`.
///
/// Bit 0 of the index selects x, bit 1 y, bit 2 z, matching [`Aabb::corners`].
pub fn corners(m: &Mat4) -> Option<[Vec3; 8]> {
    let inverse = m.inverse()?;
    Some(std::array::from_fn(|i| {
        let ndc = Vec4::new(
            if i & 1 == 0 { -1.0 } else { 1.0 },
            if i & 2 == 0 { -1.0 } else { 1.0 },
            if i & 4 == 0 { -1.0 } else { 1.0 },
            1.0,
        );
        let world = inverse * ndc;
        world.truncate() / world.w
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use strata_core::math::FRAC_PI_2;

    fn camera() -> Camera {
        Camera::look_at(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), FRAC_PI_2, 1.0, 0.1, 100.0).unwrap()
    }

    fn cube(center: Vec3, half: f32) -> Aabb {
        Aabb::from_min_max(center - Vec3::splat(half), center + Vec3::splat(half))
    }

    #[test]
    fn box_in_front_is_visible() {
        let frustum = Frustum::from_camera(&camera()).unwrap();
        assert!(frustum.intersects_aabb(&cube(Vec3::new(0.0, 0.0, -10.0), 1.0)));
        assert!(frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0)));
    }

    #[test]
    fn box_behind_is_culled() {
        let frustum = Frustum::from_camera(&camera()).unwrap();
        assert!(!frustum.intersects_aabb(&cube(Vec3::new(0.0, 0.0, 10.0), 1.0)));
        assert!(!frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(0.0, 0.0, 10.0), 1.0)));
    }

    #[test]
    fn box_beyond_far_plane_is_culled() {
        let frustum = Frustum::from_camera(&camera()).unwrap();
        assert!(!frustum.intersects_aabb(&cube(Vec3::new(0.0, 0.0, -150.0), 1.0)));
    }

    #[test]
    fn corner_test_rejects_boxes_outside_a_frustum_edge() {
        let frustum = Frustum::from_camera(&camera()).unwrap();
        // Every far corner has |x| <= 100, so a box starting at x = 120 is out
        // even though it straddles the right and far planes' outer sides.
        let beside = Aabb::from_min_max(Vec3::new(120.0, -5.0, -200.0), Vec3::new(130.0, 5.0, -90.0));
        assert!(!frustum.intersects_aabb(&beside));
    }

    #[test]
    fn corners_span_the_far_plane() {
        let frustum = Frustum::from_camera(&camera()).unwrap();
        // Far corners sit at z = -100 with a 90 degree fov.
        let far = frustum.corners[7];
        assert_abs_diff_eq!(far.z, -100.0, epsilon = 0.1);
        assert_abs_diff_eq!(far.x, 100.0, epsilon = 0.1);
        assert!(Frustum::from_matrix(&Mat4::from_scale(Vec3::ZERO)).is_none());
    }
}
