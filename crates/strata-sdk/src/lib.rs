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

//! # Strata SDK
//!
//! The public entry point. Build [`Services`] once, hand them to an
//! [`Engine`], then call [`Engine::update`] and [`Engine::render`] every
//! frame:
//!
//! ```no_run
//! use strata_sdk::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = EngineConfig::default();
//! strata_sdk::logging::init(&config.log_level);
//! let mut engine = Engine::new(Services::headless(&config)?, config)?;
//! engine.load_scene("sponza.gltf", FsTag::Assets);
//! let camera = Camera::look_at(Vec3::new(0.0, 1.0, 5.0), Vec3::ZERO, FRAC_PI_4, 16.0 / 9.0, 0.1, 100.0)
//!     .expect("valid camera");
//! loop {
//!     engine.update()?;
//!     engine.render(&camera)?;
//! }
//! # }
//! ```

#![warn(missing_docs)]

pub mod engine;
pub mod logging;
pub mod services;

pub use engine::Engine;
pub use services::Services;

/// The types an application usually needs.
pub mod prelude {
    pub use crate::{Engine, Services};
    pub use strata_core::config::EngineConfig;
    pub use strata_core::math::{Extent2D, Mat4, Vec3, FRAC_PI_2, FRAC_PI_4};
    pub use strata_core::renderer::api::Camera;
    pub use strata_core::vfs::FsTag;
}
