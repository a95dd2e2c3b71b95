// Copyright 2026 atrium Project Authors
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

//! atrium is a bounded, thread-safe, read-through cache for slow, blocking data sources.
//!
//! Wrap a [`Source`] with a [`Cache`] in a [`ReadThrough`] and use it wherever the source was used. Concurrent
//! fetches of the same key hit the source only once.

mod prelude;
mod read_through;

pub use prelude::*;

/// Shared components and utils.
pub mod common {
    pub use atrium_common::*;
}

/// The read-through cache engine.
pub mod memory {
    pub use atrium_memory::*;
}
