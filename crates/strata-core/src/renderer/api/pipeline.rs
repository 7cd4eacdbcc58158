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

//! Pipeline descriptors and handles.

use super::kernel::HostKernel;
use super::texture::TextureFormat;
use std::sync::Arc;

/// The code a pipeline runs.
#[derive(Debug, Clone)]
pub enum ShaderSource {
    /// A SPIR-V module, for backends driving a real GPU.
    SpirV(Arc<[u32]>),
    /// A CPU kernel, for host-executing backends.
    Host(Arc<dyn HostKernel>),
}

/// A descriptor used to create a [`ComputePipelineId`].
#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor {
    /// An optional debug label.
    pub label: Option<String>,
    /// The kernel to run.
    pub shader: ShaderSource,
    /// Entry point of the module.
    pub entry_point: String,
    /// Size of the push constant block in bytes.
    pub push_constant_size: u32,
}

/// An opaque handle to a compute pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputePipelineId(pub usize);

/// A descriptor used to create a [`RenderPipelineId`].
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor {
    /// An optional debug label.
    pub label: Option<String>,
    /// Vertex and fragment code, absent for host backends that only tally draws.
    pub shader: Option<ShaderSource>,
    /// Formats of the color attachments.
    pub color_formats: Vec<TextureFormat>,
    /// Format of the depth attachment, if any.
    pub depth_format: Option<TextureFormat>,
    /// Whether the pipeline writes depth.
    pub depth_write: bool,
}

/// An opaque handle to a render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderPipelineId(pub usize);
