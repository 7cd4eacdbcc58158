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

//! GPU-driven culling: the depth pyramid and the instance culler.

mod culler;
mod frustum;
mod kernels;

pub use culler::{frustum_uniform, CullShaders, DepthPyramid, DepthPyramidCuller};
pub use frustum::{corners, planes, Frustum};
pub use kernels::{cull_bindings, reduce_bindings, DepthReduceKernel, InstanceCullKernel};

/// Threads per workgroup of the instance cull kernel.
pub const CULL_WORKGROUP_SIZE: u32 = 64;

/// Width and height of a depth-reduce workgroup tile.
pub const PYRAMID_TILE_SIZE: u32 = 32;

/// Smallest power of two `>= value`; 1 for 0.
pub fn round_up_to_power_of_two(value: u32) -> u32 {
    value.max(1).next_power_of_two()
}

/// `ceil(value / divisor)`.
pub fn divide_rounding_up(value: u32, divisor: u32) -> u32 {
    value.div_ceil(divisor)
}

/// `floor(log2(size)) + 1`, the number of levels down to 1×1.
pub fn mip_count(size: u32) -> u32 {
    u32::BITS - size.max(1).leading_zeros()
}
