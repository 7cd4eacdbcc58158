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

//! Host-memory storage behind the software device.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use strata_core::math::{Extent2D, Extent3D};
use strata_core::renderer::api::*;
use strata_core::renderer::ResourceError;

#[derive(Debug)]
pub(crate) struct BufferEntry {
    pub(crate) data: Vec<u8>,
    pub(crate) label: Option<String>,
}

#[derive(Debug)]
pub(crate) struct TextureEntry {
    pub(crate) size: Extent2D,
    pub(crate) format: TextureFormat,
    pub(crate) label: Option<String>,
    pub(crate) levels: Vec<Vec<u8>>,
    pub(crate) states: Vec<ResourceState>,
}

impl TextureEntry {
    pub(crate) fn new(descriptor: &TextureDescriptor) -> Self {
        let mips = descriptor.mip_level_count.max(1);
        let levels = (0..mips)
            .map(|mip| vec![0u8; descriptor.mip_byte_size(mip) as usize])
            .collect();
        Self {
            size: descriptor.size,
            format: descriptor.format,
            label: descriptor.label.as_ref().map(|l| l.to_string()),
            levels,
            states: vec![ResourceState::Undefined; mips as usize],
        }
    }

    pub(crate) fn mip_count(&self) -> u32 {
        self.levels.len() as u32
    }

    pub(crate) fn level_size(&self, mip: u32) -> Extent2D {
        Extent3D::from_2d(self.size).mip_level_size(mip)
    }

    pub(crate) fn check_mips(&self, mips: &Range<u32>) -> Result<(), ResourceError> {
        if mips.start >= mips.end || mips.end > self.mip_count() {
            log::error!(
                "Mip range {mips:?} out of bounds for texture {:?} with {} level(s).",
                self.label,
                self.mip_count()
            );
            return Err(ResourceError::OutOfBounds);
        }
        Ok(())
    }

    pub(crate) fn byte_size(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Decodes one level as floats. Only single-channel float formats qualify.
    pub(crate) fn read_float_level(&self, mip: u32) -> Result<ImageLevel, ResourceError> {
        if !self.format.is_f32() {
            return Err(ResourceError::InvalidUsage(format!(
                "{:?} texture {:?} is not a float image",
                self.format, self.label
            )));
        }
        self.check_mips(&(mip..mip + 1))?;
        let size = self.level_size(mip);
        Ok(ImageLevel {
            width: size.width,
            height: size.height,
            texels: bytemuck::pod_collect_to_vec(&self.levels[mip as usize]),
        })
    }

    pub(crate) fn write_float_level(
        &mut self,
        mip: u32,
        level: &ImageLevel,
    ) -> Result<(), ResourceError> {
        self.check_mips(&(mip..mip + 1))?;
        let dst = &mut self.levels[mip as usize];
        let src: &[u8] = bytemuck::cast_slice(&level.texels[..]);
        if src.len() != dst.len() {
            return Err(ResourceError::OutOfBounds);
        }
        dst.copy_from_slice(src);
        Ok(())
    }

    /// Fills level 0 with one encoded texel value.
    pub(crate) fn clear(&mut self, value: [f32; 4]) {
        let texel: Vec<u8> = match self.format {
            TextureFormat::R32Float | TextureFormat::Depth32Float => value[0].to_le_bytes().to_vec(),
            TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb => value
                .iter()
                .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
                .collect(),
        };
        if let Some(level) = self.levels.first_mut() {
            for chunk in level.chunks_exact_mut(texel.len()) {
                chunk.copy_from_slice(&texel);
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SamplerEntry {
    pub(crate) filter: FilterMode,
    pub(crate) max_lod: f32,
    pub(crate) reduction: SamplerReduction,
}

#[derive(Debug)]
pub(crate) struct ComputeEntry {
    pub(crate) kernel: Arc<dyn HostKernel>,
    pub(crate) label: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct Resources {
    pub(crate) buffers: HashMap<BufferId, BufferEntry>,
    pub(crate) textures: HashMap<TextureId, TextureEntry>,
    pub(crate) views: HashMap<TextureViewId, (TextureId, TextureViewDescriptor)>,
    pub(crate) samplers: HashMap<SamplerId, SamplerEntry>,
    pub(crate) compute_pipelines: HashMap<ComputePipelineId, ComputeEntry>,
    pub(crate) render_pipelines: HashMap<RenderPipelineId, Option<String>>,
}

impl Resources {
    pub(crate) fn buffer(&self, id: BufferId) -> Result<&BufferEntry, ResourceError> {
        self.buffers.get(&id).ok_or(ResourceError::InvalidHandle)
    }

    pub(crate) fn buffer_mut(&mut self, id: BufferId) -> Result<&mut BufferEntry, ResourceError> {
        self.buffers.get_mut(&id).ok_or(ResourceError::InvalidHandle)
    }

    pub(crate) fn texture(&self, id: TextureId) -> Result<&TextureEntry, ResourceError> {
        self.textures.get(&id).ok_or(ResourceError::InvalidHandle)
    }

    pub(crate) fn texture_mut(&mut self, id: TextureId) -> Result<&mut TextureEntry, ResourceError> {
        self.textures.get_mut(&id).ok_or(ResourceError::InvalidHandle)
    }

    pub(crate) fn sampler(&self, id: SamplerId) -> Result<SamplerEntry, ResourceError> {
        self.samplers.get(&id).copied().ok_or(ResourceError::InvalidHandle)
    }
}

/// Converts `offset..offset + size` into a checked index range over `len` bytes.
pub(crate) fn byte_range(len: usize, offset: u64, size: u64) -> Result<Range<usize>, ResourceError> {
    let end = offset.checked_add(size).ok_or(ResourceError::OutOfBounds)?;
    if end > len as u64 {
        return Err(ResourceError::OutOfBounds);
    }
    Ok(offset as usize..end as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth_desc() -> TextureDescriptor<'static> {
        TextureDescriptor {
            label: Some("depth".into()),
            size: Extent2D::new(4, 2),
            mip_level_count: 3,
            format: TextureFormat::Depth32Float,
            usage: TextureUsage::RENDER_ATTACHMENT,
        }
    }

    #[test]
    fn levels_are_allocated_per_mip() {
        let entry = TextureEntry::new(&depth_desc());
        assert_eq!(entry.mip_count(), 3);
        assert_eq!(entry.levels[0].len(), 32);
        assert_eq!(entry.levels[2].len(), 4);
        assert_eq!(entry.byte_size(), 32 + 8 + 4);
    }

    #[test]
    fn clear_and_float_roundtrip() {
        let mut entry = TextureEntry::new(&depth_desc());
        entry.clear([1.0, 0.0, 0.0, 0.0]);
        let level = entry.read_float_level(0).unwrap();
        assert!(level.texels.iter().all(|&t| t == 1.0));
        assert_eq!(entry.read_float_level(3), Err(ResourceError::OutOfBounds));
    }

    #[test]
    fn byte_ranges_are_checked() {
        assert_eq!(byte_range(16, 4, 8).unwrap(), 4..12);
        assert!(byte_range(16, 12, 8).is_err());
        assert!(byte_range(16, u64::MAX, 2).is_err());
    }
}
