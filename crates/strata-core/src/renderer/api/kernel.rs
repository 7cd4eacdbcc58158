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

//! Host-executable compute kernels.
//!
//! A [`HostKernel`] is the CPU counterpart of a compute shader. Backends that
//! cannot run SPIR-V (the headless software device, test doubles) gather the
//! bound resources into [`KernelResource`]s, call [`HostKernel::dispatch`] and
//! write the mutable resources back.

use super::texture::{FilterMode, SamplerReduction};
use crate::renderer::error::KernelError;
use std::fmt;

/// A compute kernel that runs on the CPU.
pub trait HostKernel: Send + Sync + fmt::Debug {
    /// A short name used in logs.
    fn name(&self) -> &str;

    /// Runs the kernel over `workgroups`.
    ///
    /// ## Arguments
    /// * `workgroups` - The dispatch size, in workgroups.
    /// * `push_constants` - The raw push constant block.
    /// * `resources` - The bound resources, ordered by binding index.
    ///
    /// ## Errors
    /// [`KernelError`] when the bindings do not match what the kernel expects.
    fn dispatch(
        &self,
        workgroups: [u32; 3],
        push_constants: &[u8],
        resources: &mut [KernelResource],
    ) -> Result<(), KernelError>;
}

/// One level of a single-channel float image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageLevel {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Row-major texels.
    pub texels: Vec<f32>,
}

impl ImageLevel {
    /// Creates a level filled with `value`.
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            texels: vec![value; width as usize * height as usize],
        }
    }

    /// Reads the texel at `(x, y)`, clamped to the edge.
    pub fn get(&self, x: i64, y: i64) -> f32 {
        if self.texels.is_empty() {
            return 0.0;
        }
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.texels[y * self.width as usize + x]
    }

    /// Writes the texel at `(x, y)`; out-of-range writes are dropped.
    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        if x < self.width && y < self.height {
            self.texels[y as usize * self.width as usize + x as usize] = value;
        }
    }

    /// Samples the level at normalized coordinates.
    ///
    /// With [`FilterMode::Linear`] the footprint is the usual 2×2 bilinear
    /// neighbourhood; the min and max reductions only consider texels with a
    /// non-zero weight.
    pub fn sample(&self, uv: [f32; 2], filter: FilterMode, reduction: SamplerReduction) -> f32 {
        let u = uv[0].clamp(0.0, 1.0) * self.width as f32;
        let v = uv[1].clamp(0.0, 1.0) * self.height as f32;
        if filter == FilterMode::Nearest {
            return self.get(u.floor() as i64, v.floor() as i64);
        }

        let x = u - 0.5;
        let y = v - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);
        let taps = [
            (x0, y0, (1.0 - fx) * (1.0 - fy)),
            (x0 + 1, y0, fx * (1.0 - fy)),
            (x0, y0 + 1, (1.0 - fx) * fy),
            (x0 + 1, y0 + 1, fx * fy),
        ];

        match reduction {
            SamplerReduction::WeightedAverage => taps
                .iter()
                .map(|&(tx, ty, w)| self.get(tx, ty) * w)
                .sum(),
            SamplerReduction::Min => taps
                .iter()
                .filter(|t| t.2 > 0.0)
                .map(|&(tx, ty, _)| self.get(tx, ty))
                .fold(f32::INFINITY, f32::min),
            SamplerReduction::Max => taps
                .iter()
                .filter(|t| t.2 > 0.0)
                .map(|&(tx, ty, _)| self.get(tx, ty))
                .fold(f32::NEG_INFINITY, f32::max),
        }
    }
}

/// A sampled mip chain together with its sampler state.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledImage {
    /// Visible levels, finest first.
    pub levels: Vec<ImageLevel>,
    /// Filter of the bound sampler.
    pub filter: FilterMode,
    /// Reduction of the bound sampler.
    pub reduction: SamplerReduction,
    /// Highest selectable level.
    pub max_lod: f32,
}

impl SampledImage {
    /// Samples at an explicit level of detail, clamped to the visible range.
    pub fn sample_level(&self, uv: [f32; 2], lod: f32) -> f32 {
        let Some(last) = self.levels.len().checked_sub(1) else {
            return 0.0;
        };
        let max = (last as f32).min(self.max_lod.max(0.0));
        let level = lod.round().clamp(0.0, max) as usize;
        self.levels[level].sample(uv, self.filter, self.reduction)
    }
}

/// A resource handed to a [`HostKernel`].
#[derive(Debug, Clone, PartialEq)]
pub enum KernelResource {
    /// The bound byte range of a buffer.
    Buffer(Vec<u8>),
    /// A single writable image level.
    StorageImage(ImageLevel),
    /// A read-only sampled mip chain.
    SampledImage(SampledImage),
}

impl KernelResource {
    /// The bytes of a buffer binding.
    pub fn as_buffer(&self) -> Option<&[u8]> {
        match self {
            KernelResource::Buffer(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The bytes of a buffer binding, mutably.
    pub fn as_buffer_mut(&mut self) -> Option<&mut Vec<u8>> {
        match self {
            KernelResource::Buffer(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The level of a storage image binding, mutably.
    pub fn as_storage_image_mut(&mut self) -> Option<&mut ImageLevel> {
        match self {
            KernelResource::StorageImage(level) => Some(level),
            _ => None,
        }
    }

    /// The chain of a sampled image binding.
    pub fn as_sampled_image(&self) -> Option<&SampledImage> {
        match self {
            KernelResource::SampledImage(image) => Some(image),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> ImageLevel {
        ImageLevel {
            width: 2,
            height: 2,
            texels: vec![0.1, 0.9, 0.8, 0.4],
        }
    }

    #[test]
    fn min_reduction_at_shared_corner_takes_all_four() {
        let level = checker();
        let v = level.sample([0.5, 0.5], FilterMode::Linear, SamplerReduction::Min);
        assert_eq!(v, 0.1);
        let v = level.sample([0.5, 0.5], FilterMode::Linear, SamplerReduction::Max);
        assert_eq!(v, 0.9);
    }

    #[test]
    fn texel_center_only_reads_one_texel() {
        let level = checker();
        let v = level.sample([0.75, 0.25], FilterMode::Linear, SamplerReduction::Min);
        assert_eq!(v, 0.9);
        let avg = level.sample([0.75, 0.25], FilterMode::Linear, SamplerReduction::WeightedAverage);
        assert!((avg - 0.9).abs() < 1e-6);
    }

    #[test]
    fn sample_level_clamps_lod() {
        let image = SampledImage {
            levels: vec![checker(), ImageLevel::filled(1, 1, 0.05)],
            filter: FilterMode::Linear,
            reduction: SamplerReduction::Min,
            max_lod: 8.0,
        };
        assert_eq!(image.sample_level([0.5, 0.5], 7.0), 0.05);
        assert_eq!(image.sample_level([0.25, 0.25], -3.0), 0.1);
    }

    #[test]
    fn edge_reads_are_clamped() {
        let level = checker();
        assert_eq!(level.get(-5, 0), 0.1);
        assert_eq!(level.get(9, 9), 0.4);
    }
}
