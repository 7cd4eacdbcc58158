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

//! Command recording and queue submission.
//!
//! A [`SubmissionQueue`] hands out [`CommandStream`]s, submits them under a
//! monotonically increasing id signalled on its timeline counter, and
//! recycles them once the device reports the id finished.

mod queue;
mod stream;

pub use self::queue::SubmissionQueue;
pub use self::stream::{Binding, ColorTarget, CommandStream, DepthTarget};
