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

//! Bounding volumes used by mesh import and instance culling.

use super::{Mat4, Vec3};

/// An Axis-Aligned Bounding Box.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Aabb {
    /// The corner of the box with the smallest coordinates on all axes.
    pub min: Vec3,
    /// The corner of the box with the largest coordinates on all axes.
    pub max: Vec3,
}

impl Aabb {
    /// An empty box, neutral for [`Aabb::merge`] and [`Aabb::merged_with_point`].
    pub const INVALID: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Creates a box from two corners given in any order.
    #[inline]
    pub fn from_min_max(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Computes the smallest box containing all `points`, or `None` when empty.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        Some(
            points
                .iter()
                .fold(Self::INVALID, |acc, p| acc.merged_with_point(*p)),
        )
    }

    /// Returns `true` if `min <= max` on all axes.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// The center point of the box.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half the size of the box along each axis.
    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Grows the box to include `point`.
    #[inline]
    pub fn merged_with_point(&self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    /// Smallest box containing both boxes.
    #[inline]
    pub fn merge(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Returns `true` if the boxes overlap (touching counts).
    #[inline]
    pub fn intersects_aabb(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Returns `true` if `point` lies inside or on the box.
    #[inline]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// The eight corners of the box. Bit 0 of the index selects x, bit 1 y, bit 2 z.
    pub fn corners(&self) -> [Vec3; 8] {
        std::array::from_fn(|i| {
            Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            )
        })
    }

    /// World-space box enclosing this box after an affine `matrix`.
    pub fn transform(&self, matrix: &Mat4) -> Self {
        let corners = self.corners();
        corners
            .iter()
            .fold(Self::INVALID, |acc, c| acc.merged_with_point(matrix.transform_point3(*c)))
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::INVALID
    }
}

/// A bounding sphere.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingSphere {
    /// The sphere center.
    pub center: Vec3,
    /// The sphere radius.
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a sphere.
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere centred on the centroid of `points`, radius = farthest point.
    pub fn from_points(points: &[Vec3]) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        let sum = points.iter().fold(Vec3::ZERO, |acc, p| acc + *p);
        let center = sum / points.len() as f32;
        let radius = points
            .iter()
            .map(|p| p.distance(center))
            .fold(0.0_f32, f32::max);
        Self { center, radius }
    }

    /// Transforms the sphere by an affine matrix, scaling the radius by the largest axis scale.
    pub fn transform(&self, matrix: &Mat4) -> Self {
        Self {
            center: matrix.transform_point3(self.center),
            radius: self.radius * matrix.max_scale(),
        }
    }
}
