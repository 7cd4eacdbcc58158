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

//! A column-major 4x4 matrix for transforms and camera projections.

use super::{Vec3, Vec4, EPSILON};
use std::ops::Mul;

/// A 4x4 column-major matrix.
///
/// The memory layout is column-major, which matches what GPU buffers expect,
/// so [`Mat4::to_cols_array_2d`] can be copied straight into a uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Mat4 {
    /// The columns of the matrix. `cols[0]` is the first column, and so on.
    pub cols: [Vec4; 4],
}

impl Mat4 {
    /// The 4x4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [Vec4::X, Vec4::Y, Vec4::Z, Vec4::W],
    };

    /// Creates a new matrix from four column vectors.
    #[inline]
    pub const fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self {
            cols: [c0, c1, c2, c3],
        }
    }

    /// Creates a matrix from a column-major nested array.
    #[inline]
    pub const fn from_cols_array_2d(m: &[[f32; 4]; 4]) -> Self {
        Self::from_cols(
            Vec4::from_array(m[0]),
            Vec4::from_array(m[1]),
            Vec4::from_array(m[2]),
            Vec4::from_array(m[3]),
        )
    }

    /// Returns the matrix as a column-major nested array.
    #[inline]
    pub const fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        [
            self.cols[0].to_array(),
            self.cols[1].to_array(),
            self.cols[2].to_array(),
            self.cols[3].to_array(),
        ]
    }

    /// Returns a row of the matrix as a `Vec4`.
    #[inline]
    pub fn get_row(&self, index: usize) -> Vec4 {
        Vec4::new(
            self.cols[0].get(index),
            self.cols[1].get(index),
            self.cols[2].get(index),
            self.cols[3].get(index),
        )
    }

    /// Creates a translation matrix.
    #[inline]
    pub const fn from_translation(v: Vec3) -> Self {
        Self::from_cols(Vec4::X, Vec4::Y, Vec4::Z, Vec4::new(v.x, v.y, v.z, 1.0))
    }

    /// Creates a non-uniform scale matrix.
    #[inline]
    pub const fn from_scale(s: Vec3) -> Self {
        Self::from_cols(
            Vec4::new(s.x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, s.y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, s.z, 0.0),
            Vec4::W,
        )
    }

    /// Creates a rotation around the Y axis.
    #[inline]
    pub fn from_rotation_y(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_cols(
            Vec4::new(c, 0.0, -s, 0.0),
            Vec4::Y,
            Vec4::new(s, 0.0, c, 0.0),
            Vec4::W,
        )
    }

    /// Creates a right-handed perspective projection with a `[0, 1]` depth range.
    ///
    /// # Arguments
    ///
    /// * `fov_y_radians`: Vertical field of view in radians.
    /// * `aspect_ratio`: Width divided by height of the viewport.
    /// * `z_near`: Distance to the near clipping plane (must be positive).
    /// * `z_far`: Distance to the far clipping plane (must be greater than `z_near`).
    #[inline]
    pub fn perspective_rh_zo(fov_y_radians: f32, aspect_ratio: f32, z_near: f32, z_far: f32) -> Self {
        debug_assert!(z_near > 0.0 && z_far > z_near);
        let f = 1.0 / (fov_y_radians * 0.5).tan();
        let range = z_far / (z_near - z_far);
        Self::from_cols(
            Vec4::new(f / aspect_ratio, 0.0, 0.0, 0.0),
            Vec4::new(0.0, f, 0.0, 0.0),
            Vec4::new(0.0, 0.0, range, -1.0),
            Vec4::new(0.0, 0.0, range * z_near, 0.0),
        )
    }

    /// Creates a right-handed orthographic projection with a `[0, 1]` depth range.
    #[inline]
    pub fn orthographic_rh_zo(
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        z_near: f32,
        z_far: f32,
    ) -> Self {
        let inv_w = 1.0 / (right - left);
        let inv_h = 1.0 / (top - bottom);
        let inv_d = 1.0 / (z_far - z_near);
        Self::from_cols(
            Vec4::new(2.0 * inv_w, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 * inv_h, 0.0, 0.0),
            Vec4::new(0.0, 0.0, -inv_d, 0.0),
            Vec4::new(
                -(right + left) * inv_w,
                -(top + bottom) * inv_h,
                -z_near * inv_d,
                1.0,
            ),
        )
    }

    /// Creates a right-handed view matrix looking from `eye` towards `target`.
    ///
    /// Returns `None` when `eye` and `target` coincide or `up` is parallel to the
    /// view direction.
    pub fn look_at_rh(eye: Vec3, target: Vec3, up: Vec3) -> Option<Self> {
        let forward = target - eye;
        if forward.length_squared() < EPSILON * EPSILON {
            return None;
        }
        let f = forward.normalize();
        let s = f.cross(up);
        if s.length_squared() < EPSILON * EPSILON {
            return None;
        }
        let s = s.normalize();
        let u = s.cross(f);

        Some(Self::from_cols(
            Vec4::new(s.x, u.x, -f.x, 0.0),
            Vec4::new(s.y, u.y, -f.y, 0.0),
            Vec4::new(s.z, u.z, -f.z, 0.0),
            Vec4::new(-eye.dot(s), -eye.dot(u), eye.dot(f), 1.0),
        ))
    }

    /// Returns the transpose of the matrix.
    #[inline]
    pub fn transpose(&self) -> Self {
        Self::from_cols(self.get_row(0), self.get_row(1), self.get_row(2), self.get_row(3))
    }

    /// Computes the inverse with the 2x2 sub-determinant expansion.
    ///
    /// Returns `None` if the matrix is singular.
    pub fn inverse(&self) -> Option<Self> {
        let m = self.to_cols_array_2d();
        // Element (row r, column c) is m[c][r].
        let a = |r: usize, c: usize| m[c][r];

        let s0 = a(0, 0) * a(1, 1) - a(1, 0) * a(0, 1);
        let s1 = a(0, 0) * a(1, 2) - a(1, 0) * a(0, 2);
        let s2 = a(0, 0) * a(1, 3) - a(1, 0) * a(0, 3);
        let s3 = a(0, 1) * a(1, 2) - a(1, 1) * a(0, 2);
        let s4 = a(0, 1) * a(1, 3) - a(1, 1) * a(0, 3);
        let s5 = a(0, 2) * a(1, 3) - a(1, 2) * a(0, 3);

        let c5 = a(2, 2) * a(3, 3) - a(3, 2) * a(2, 3);
        let c4 = a(2, 1) * a(3, 3) - a(3, 1) * a(2, 3);
        let c3 = a(2, 1) * a(3, 2) - a(3, 1) * a(2, 2);
        let c2 = a(2, 0) * a(3, 3) - a(3, 0) * a(2, 3);
        let c1 = a(2, 0) * a(3, 2) - a(3, 0) * a(2, 2);
        let c0 = a(2, 0) * a(3, 1) - a(3, 0) * a(2, 1);

        let det = s0 * c5 - s1 * c4 + s2 * c3 + s3 * c2 - s4 * c1 + s5 * c0;
        if det.abs() <= f32::MIN_POSITIVE {
            return None;
        }
        let inv = 1.0 / det;

        // Rows of the inverse.
        let r0 = [
            (a(1, 1) * c5 - a(1, 2) * c4 + a(1, 3) * c3) * inv,
            (-a(0, 1) * c5 + a(0, 2) * c4 - a(0, 3) * c3) * inv,
            (a(3, 1) * s5 - a(3, 2) * s4 + a(3, 3) * s3) * inv,
            (-a(2, 1) * s5 + a(2, 2) * s4 - a(2, 3) * s3) * inv,
        ];
        let r1 = [
            (-a(1, 0) * c5 + a(1, 2) * c2 - a(1, 3) * c1) * inv,
            (a(0, 0) * c5 - a(0, 2) * c2 + a(0, 3) * c1) * inv,
            (-a(3, 0) * s5 + a(3, 2) * s2 - a(3, 3) * s1) * inv,
            (a(2, 0) * s5 - a(2, 2) * s2 + a(2, 3) * s1) * inv,
        ];
        let r2 = [
            (a(1, 0) * c4 - a(1, 1) * c2 + a(1, 3) * c0) * inv,
            (-a(0, 0) * c4 + a(0, 1) * c2 - a(0, 3) * c0) * inv,
            (a(3, 0) * s4 - a(3, 1) * s2 + a(3, 3) * s0) * inv,
            (-a(2, 0) * s4 + a(2, 1) * s2 - a(2, 3) * s0) * inv,
        ];
        let r3 = [
            (-a(1, 0) * c3 + a(1, 1) * c1 - a(1, 2) * c0) * inv,
            (a(0, 0) * c3 - a(0, 1) * c1 + a(0, 2) * c0) * inv,
            (-a(3, 0) * s3 + a(3, 1) * s1 - a(3, 2) * s0) * inv,
            (a(2, 0) * s3 - a(2, 1) * s1 + a(2, 2) * s0) * inv,
        ];

        Some(
            Self::from_cols(
                Vec4::from_array(r0),
                Vec4::from_array(r1),
                Vec4::from_array(r2),
                Vec4::from_array(r3),
            )
            .transpose(),
        )
    }

    /// Transforms a point (w = 1), without perspective division.
    #[inline]
    pub fn transform_point3(&self, p: Vec3) -> Vec3 {
        (*self * Vec4::from_vec3(p, 1.0)).truncate()
    }

    /// Returns the largest axis scale factor of the upper 3x3 block.
    #[inline]
    pub fn max_scale(&self) -> f32 {
        self.cols[0]
            .truncate()
            .length()
            .max(self.cols[1].truncate().length())
            .max(self.cols[2].truncate().length())
    }
}

impl Default for Mat4 {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Mat4> for Mat4 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Mat4) -> Self {
        Self::from_cols(
            self * rhs.cols[0],
            self * rhs.cols[1],
            self * rhs.cols[2],
            self * rhs.cols[3],
        )
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;
    #[inline]
    fn mul(self, rhs: Vec4) -> Vec4 {
        self.cols[0] * rhs.x + self.cols[1] * rhs.y + self.cols[2] * rhs.z + self.cols[3] * rhs.w
    }
}
