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

//! Serializable render graph descriptions.
//!
//! A description names resources and passes; passes name their lane by the
//! key it is registered under in a [`LaneRegistry`](super::LaneRegistry).
//! The format is plain JSON:
//!
//! ```json
//! {
//!   "resources": [
//!     { "name": "depth", "type": "texture", "format": "depth32_float" },
//!     { "name": "commands", "type": "external" }
//!   ],
//!   "passes": [
//!     { "name": "prepass", "lane": "depth_prepass",
//!       "bindings": [ { "resource": "depth", "kind": "depth_write" } ] }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use strata_core::math::Extent2D;
use strata_core::renderer::api::TextureFormat;
use strata_lanes::render_lane::{names, BindingKind};

/// How big a graph texture is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureSize {
    /// Follows the viewport and is reallocated on resize.
    #[default]
    Viewport,
    /// A fixed size in texels.
    Fixed {
        /// Width in texels.
        width: u32,
        /// Height in texels.
        height: u32,
    },
}

impl TextureSize {
    /// The size for a viewport of `extent`.
    pub fn resolve(self, extent: Extent2D) -> Extent2D {
        match self {
            TextureSize::Viewport => extent,
            TextureSize::Fixed { width, height } => Extent2D::new(width, height),
        }
    }
}

/// What backs a named resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceKind {
    /// A texture allocated by the graph.
    Texture {
        /// Texel format.
        format: TextureFormat,
        /// Size policy.
        #[serde(default)]
        size: TextureSize,
    },
    /// A buffer allocated by the graph.
    Buffer {
        /// Size in bytes.
        size: u64,
    },
    /// A resource owned elsewhere and imported before compilation.
    External,
}

/// A named resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDesc {
    /// Unique name.
    pub name: String,
    /// What backs it.
    #[serde(flatten)]
    pub kind: ResourceKind,
}

/// One resource use of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingDesc {
    /// Name of the resource.
    pub resource: String,
    /// How the pass uses it.
    pub kind: BindingKind,
}

/// A pass and the lane that records it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassDesc {
    /// Unique name.
    pub name: String,
    /// Registry key of the lane.
    pub lane: String,
    /// Resource uses.
    #[serde(default)]
    pub bindings: Vec<BindingDesc>,
}

/// A whole frame.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RenderGraphDesc {
    /// Resources, in declaration order.
    #[serde(default)]
    pub resources: Vec<ResourceDesc>,
    /// Passes, in declaration order.
    #[serde(default)]
    pub passes: Vec<PassDesc>,
}

impl RenderGraphDesc {
    /// Parses a JSON description.
    ///
    /// ## Errors
    /// Fails on malformed JSON or unknown formats and binding kinds.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Invalid render graph description")
    }

    /// Serializes to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize render graph description")
    }

    /// The GPU-driven frame: depth prepass, depth pyramid, occlusion cull
    /// and the indirect geometry pass.
    pub fn gpu_driven() -> Self {
        fn resource(name: &str, kind: ResourceKind) -> ResourceDesc {
            ResourceDesc {
                name: name.to_string(),
                kind,
            }
        }
        fn pass(name: &str, lane: &str, bindings: &[(&str, BindingKind)]) -> PassDesc {
            PassDesc {
                name: name.to_string(),
                lane: lane.to_string(),
                bindings: bindings
                    .iter()
                    .map(|(resource, kind)| BindingDesc {
                        resource: resource.to_string(),
                        kind: *kind,
                    })
                    .collect(),
            }
        }

        Self {
            resources: vec![
                resource(
                    names::DEPTH,
                    ResourceKind::Texture {
                        format: TextureFormat::Depth32Float,
                        size: TextureSize::Viewport,
                    },
                ),
                resource(
                    names::COLOR,
                    ResourceKind::Texture {
                        format: TextureFormat::Rgba8Unorm,
                        size: TextureSize::Viewport,
                    },
                ),
                resource(names::DEPTH_PYRAMID, ResourceKind::External),
                resource(names::COMMANDS, ResourceKind::External),
                resource(names::COUNT, ResourceKind::External),
            ],
            passes: vec![
                pass(
                    "depth_prepass",
                    "depth_prepass",
                    &[
                        (names::DEPTH, BindingKind::DepthWrite),
                        (names::COMMANDS, BindingKind::StorageBuffer),
                        (names::COUNT, BindingKind::StorageBuffer),
                    ],
                ),
                pass(
                    "depth_pyramid",
                    "depth_pyramid",
                    &[
                        (names::DEPTH, BindingKind::SampledTexture),
                        (names::DEPTH_PYRAMID, BindingKind::StorageImage),
                    ],
                ),
                pass(
                    "instance_cull",
                    "instance_cull",
                    &[
                        (names::DEPTH_PYRAMID, BindingKind::SampledTexture),
                        (names::COMMANDS, BindingKind::StorageBuffer),
                        (names::COUNT, BindingKind::StorageBuffer),
                    ],
                ),
                pass(
                    "indirect_draw",
                    "indirect_draw",
                    &[
                        (names::COMMANDS, BindingKind::ReadOnlyBuffer),
                        (names::COUNT, BindingKind::ReadOnlyBuffer),
                        (names::COLOR, BindingKind::RenderTarget),
                        (names::DEPTH, BindingKind::DepthWrite),
                    ],
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_documented_format() {
        let desc = RenderGraphDesc::from_json(
            r#"{
                "resources": [
                    { "name": "depth", "type": "texture", "format": "depth32_float" },
                    { "name": "shadow", "type": "texture", "format": "r32_float",
                      "size": { "fixed": { "width": 512, "height": 512 } } },
                    { "name": "lights", "type": "buffer", "size": 4096 },
                    { "name": "commands", "type": "external" }
                ],
                "passes": [
                    { "name": "prepass", "lane": "depth_prepass",
                      "bindings": [ { "resource": "depth", "kind": "depth_write" } ] }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(
            desc.resources[0].kind,
            ResourceKind::Texture {
                format: TextureFormat::Depth32Float,
                size: TextureSize::Viewport
            }
        );
        assert_eq!(
            desc.resources[1].kind,
            ResourceKind::Texture {
                format: TextureFormat::R32Float,
                size: TextureSize::Fixed {
                    width: 512,
                    height: 512
                }
            }
        );
        assert_eq!(desc.resources[2].kind, ResourceKind::Buffer { size: 4096 });
        assert_eq!(desc.resources[3].kind, ResourceKind::External);
        assert_eq!(desc.passes[0].bindings[0].kind, BindingKind::DepthWrite);
    }

    #[test]
    fn rejects_unknown_binding_kinds() {
        let result = RenderGraphDesc::from_json(
            r#"{ "passes": [ { "name": "p", "lane": "l",
                 "bindings": [ { "resource": "r", "kind": "telepathy" } ] } ] }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn gpu_driven_description_survives_json() {
        let desc = RenderGraphDesc::gpu_driven();
        let text = desc.to_json().unwrap();
        assert_eq!(RenderGraphDesc::from_json(&text).unwrap(), desc);
        assert_eq!(desc.passes.len(), 4);
    }

    #[test]
    fn fixed_sizes_ignore_the_viewport() {
        let viewport = Extent2D::new(800, 600);
        assert_eq!(TextureSize::Viewport.resolve(viewport), viewport);
        assert_eq!(
            TextureSize::Fixed {
                width: 64,
                height: 32
            }
            .resolve(viewport),
            Extent2D::new(64, 32)
        );
    }
}
