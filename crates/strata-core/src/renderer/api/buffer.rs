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

//! Defines data structures related to GPU buffer resources.

use crate::strata_bitflags;
use std::borrow::Cow;

strata_bitflags! {
    /// A set of flags describing the allowed usages of a [`BufferId`].
    pub struct BufferUsage: u32 {
        /// The buffer can be mapped for reading on the CPU.
        const MAP_READ = 1 << 0;
        /// The buffer can be mapped for writing on the CPU.
        const MAP_WRITE = 1 << 1;
        /// The buffer can be used as the source of a copy operation.
        const COPY_SRC = 1 << 2;
        /// The buffer can be used as the destination of a copy operation.
        const COPY_DST = 1 << 3;

        /// The buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 4;
        /// The buffer can be bound as an index buffer.
        const INDEX = 1 << 5;
        /// The buffer can be bound as a uniform buffer.
        const UNIFORM = 1 << 6;

        /// The buffer can be bound as a storage buffer (read/write access from shaders).
        const STORAGE = 1 << 7;
        /// The buffer can be used for indirect draw or dispatch commands.
        const INDIRECT = 1 << 8;
    }
}

/// A descriptor used to create a [`BufferId`].
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// An optional debug label for the buffer.
    pub label: Option<Cow<'a, str>>,
    /// The total size of the buffer in bytes.
    pub size: u64,
    /// A bitmask of [`BufferUsage`] flags describing how the buffer will be used.
    pub usage: BufferUsage,
    /// If `true`, the buffer is created host-visible and ready for CPU writes.
    pub mapped_at_creation: bool,
}

impl<'a> BufferDescriptor<'a> {
    /// A host-visible staging buffer used as a copy source.
    pub fn staging(label: impl Into<Cow<'a, str>>, size: u64) -> Self {
        Self {
            label: Some(label.into()),
            size,
            usage: BufferUsage::COPY_SRC | BufferUsage::MAP_WRITE,
            mapped_at_creation: true,
        }
    }
}

/// An opaque handle to a GPU buffer resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub usize);

/// One region of a buffer-to-buffer copy.
///
/// Zero-sized regions are legal and skipped when recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferCopy {
    /// Offset in the source buffer, in bytes.
    pub src_offset: u64,
    /// Offset in the destination buffer, in bytes.
    pub dst_offset: u64,
    /// Number of bytes to copy.
    pub size: u64,
}

impl BufferCopy {
    /// Creates a copy region.
    pub const fn new(src_offset: u64, dst_offset: u64, size: u64) -> Self {
        Self {
            src_offset,
            dst_offset,
            size,
        }
    }

    /// Returns `true` if the region copies nothing.
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_descriptor_is_copy_source() {
        let desc = BufferDescriptor::staging("scene staging", 256);
        assert!(desc.usage.contains(BufferUsage::COPY_SRC));
        assert!(desc.mapped_at_creation);
        assert_eq!(desc.size, 256);
    }

    #[test]
    fn empty_region() {
        assert!(BufferCopy::new(4, 8, 0).is_empty());
        assert!(!BufferCopy::new(0, 0, 1).is_empty());
    }
}
