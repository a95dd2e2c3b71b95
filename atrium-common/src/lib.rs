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

//! Shared components and utils for atrium.

/// Allow to enable debug assertions in release profile with feature "strict_assertion".
pub mod assert;
/// Trait bounds for cache keys and values.
pub mod code;
/// The error type and result alias shared by all atrium crates.
pub mod error;
/// Cache entry lifecycle events and listeners.
pub mod event;
/// Metrics components for atrium.
pub mod metrics;
/// The backing source contract a read-through cache sits in front of.
pub mod source;
