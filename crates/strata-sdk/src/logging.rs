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

//! Logger setup shared by every binary.

use env_logger::{Builder, Env};

/// Installs an `env_logger` logger.
///
/// `RUST_LOG` wins when set; `default_level` is used otherwise. Returns
/// `false` if a logger was already installed, which is harmless.
pub fn init(default_level: &str) -> bool {
    let installed = Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .try_init()
        .is_ok();
    if installed {
        log::debug!("Logger installed with default level '{default_level}'.");
    }
    installed
}
