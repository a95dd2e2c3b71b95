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

//! The read-through cache engine of atrium.
//!
//! A [`Cache`] owns a bounded set of items keyed by `K`. Each item is in flight, materialized or failed. A miss
//! registers an in-flight item and makes the caller its owner: the owner fetches the value from the caller-provided
//! [`Source`] without holding the cache lock, while every concurrent caller of the same key waits for the owner's
//! result. Hits refresh the item's position, and an insertion that overflows the capacity evicts the item with the
//! oldest position.

mod cache;
mod indexer;
mod inflight;
mod prelude;
mod raw;
mod record;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use prelude::*;
