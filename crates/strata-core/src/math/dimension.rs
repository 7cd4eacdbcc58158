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

//! Integer extents for viewports, attachments and texture levels.

use serde::{Deserialize, Serialize};

/// A two-dimensional extent, typically a viewport or attachment size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent2D {
    /// The width component of the extent.
    pub width: u32,
    /// The height component of the extent.
    pub height: u32,
}

impl Extent2D {
    /// Creates a new extent.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the largest of the two dimensions.
    pub fn max_dimension(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Returns `true` if either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A three-dimensional extent, representing width, height, and depth or layer count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3D {
    /// The width component of the extent.
    pub width: u32,
    /// The height component of the extent.
    pub height: u32,
    /// The depth or number of array layers.
    pub depth_or_array_layers: u32,
}

impl Extent3D {
    /// Creates a single-layer extent from a 2D size.
    pub const fn from_2d(extent: Extent2D) -> Self {
        Self {
            width: extent.width,
            height: extent.height,
            depth_or_array_layers: 1,
        }
    }

    /// Returns the size of the given mip level, never smaller than one texel.
    pub fn mip_level_size(&self, level: u32) -> Extent2D {
        Extent2D {
            width: self.width.checked_shr(level).unwrap_or(0).max(1),
            height: self.height.checked_shr(level).unwrap_or(0).max(1),
        }
    }
}

impl From<Extent2D> for Extent3D {
    fn from(value: Extent2D) -> Self {
        Self::from_2d(value)
    }
}
