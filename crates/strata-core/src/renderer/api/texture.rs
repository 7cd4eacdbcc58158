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

//! Defines data structures related to textures, views and samplers.

use crate::math::{Extent2D, Extent3D};
use crate::strata_bitflags;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Pixel formats understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFormat {
    /// 8-bit RGBA, linear.
    Rgba8Unorm,
    /// 8-bit RGBA, sRGB encoded.
    Rgba8UnormSrgb,
    /// Single 32-bit float channel.
    R32Float,
    /// 32-bit float depth.
    Depth32Float,
}

impl TextureFormat {
    /// Size of one texel in bytes.
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::R32Float
            | TextureFormat::Depth32Float => 4,
        }
    }

    /// Returns `true` for depth formats.
    pub const fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }

    /// Returns `true` if texels are single 32-bit floats.
    pub const fn is_f32(self) -> bool {
        matches!(self, TextureFormat::R32Float | TextureFormat::Depth32Float)
    }
}

strata_bitflags! {
    /// A set of flags describing how a texture may be used.
    pub struct TextureUsage: u32 {
        /// Source of a copy.
        const COPY_SRC = 1 << 0;
        /// Destination of a copy.
        const COPY_DST = 1 << 1;
        /// Sampled from shaders.
        const SAMPLED = 1 << 2;
        /// Written as a storage image.
        const STORAGE = 1 << 3;
        /// Color or depth attachment.
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

/// A descriptor used to create a 2D [`TextureId`].
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Size of mip level 0.
    pub size: Extent2D,
    /// Number of mip levels, at least 1.
    pub mip_level_count: u32,
    /// Pixel format.
    pub format: TextureFormat,
    /// Allowed usages.
    pub usage: TextureUsage,
}

impl TextureDescriptor<'_> {
    /// Size of mip level `level`, never smaller than 1×1.
    pub fn mip_size(&self, level: u32) -> Extent2D {
        Extent3D::from_2d(self.size).mip_level_size(level)
    }

    /// Number of bytes in mip level `level`.
    pub fn mip_byte_size(&self, level: u32) -> u64 {
        let size = self.mip_size(level);
        size.width as u64 * size.height as u64 * self.format.bytes_per_pixel() as u64
    }
}

/// An opaque handle to a GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);

/// An opaque handle to a view over a mip range of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureViewId(pub usize);

/// Describes the mip range a view covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureViewDescriptor {
    /// First visible mip level.
    pub base_mip_level: u32,
    /// Number of visible mip levels.
    pub mip_level_count: u32,
}

/// Texel filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Nearest texel.
    Nearest,
    /// Bilinear footprint.
    #[default]
    Linear,
}

/// Behavior outside the `[0, 1]` coordinate range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    /// Clamp to the edge texel.
    #[default]
    ClampToEdge,
    /// Wrap around.
    Repeat,
}

/// How the texels of a filter footprint are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerReduction {
    /// Weighted average of the footprint.
    #[default]
    WeightedAverage,
    /// Minimum of the texels with a non-zero weight.
    Min,
    /// Maximum of the texels with a non-zero weight.
    Max,
}

/// A descriptor used to create a [`SamplerId`].
#[derive(Debug, Clone, Default)]
pub struct SamplerDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Minification and magnification filter.
    pub filter: FilterMode,
    /// Addressing on every axis.
    pub address_mode: AddressMode,
    /// Highest mip level the sampler may select.
    pub max_lod: f32,
    /// Reduction applied to the filter footprint.
    pub reduction: SamplerReduction,
}

/// An opaque handle to a sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SamplerId(pub usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_sizes_never_reach_zero() {
        let desc = TextureDescriptor {
            label: None,
            size: Extent2D::new(8, 2),
            mip_level_count: 4,
            format: TextureFormat::R32Float,
            usage: TextureUsage::STORAGE,
        };
        assert_eq!(desc.mip_size(1), Extent2D::new(4, 1));
        assert_eq!(desc.mip_size(3), Extent2D::new(1, 1));
        assert_eq!(desc.mip_byte_size(0), 8 * 2 * 4);
    }

    #[test]
    fn format_properties() {
        assert!(TextureFormat::Depth32Float.is_depth());
        assert!(TextureFormat::R32Float.is_f32());
        assert!(!TextureFormat::Rgba8Unorm.is_f32());
        assert_eq!(TextureFormat::Rgba8UnormSrgb.bytes_per_pixel(), 4);
    }
}
