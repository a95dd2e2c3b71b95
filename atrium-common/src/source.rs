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

use std::sync::Arc;

use crate::{
    code::{Key, Value},
    error::Result,
};

/// A slow, blocking data source keyed by an identifier.
///
/// A read-through cache calls [`Source::fetch`] at most once per key while a fetch for that key is outstanding.
/// Fetches of distinct keys may run concurrently on different threads, so implementations must be [`Sync`].
pub trait Source: Send + Sync + 'static {
    /// Associated key type.
    type Key: Key;
    /// Associated value type.
    type Value: Value;

    /// Fetch the value of the given key.
    ///
    /// The call may block for an arbitrary duration. Errors whose [`ErrorKind`](crate::error::ErrorKind) is a fetch
    /// kind are delivered unchanged to every caller waiting on the same key.
    fn fetch(&self, key: &Self::Key) -> Result<Self::Value>;

    /// List all keys known to the source.
    fn list_keys(&self) -> Vec<Self::Key>;
}

impl<S> Source for Arc<S>
where
    S: Source + ?Sized,
{
    type Key = S::Key;
    type Value = S::Value;

    fn fetch(&self, key: &Self::Key) -> Result<Self::Value> {
        self.as_ref().fetch(key)
    }

    fn list_keys(&self) -> Vec<Self::Key> {
        self.as_ref().list_keys()
    }
}

impl<S> Source for Box<S>
where
    S: Source + ?Sized,
{
    type Key = S::Key;
    type Value = S::Value;

    fn fetch(&self, key: &Self::Key) -> Result<Self::Value> {
        self.as_ref().fetch(key)
    }

    fn list_keys(&self) -> Vec<Self::Key> {
        self.as_ref().list_keys()
    }
}
