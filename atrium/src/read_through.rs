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

use std::{fmt::Debug, sync::Arc};

use ahash::RandomState;
use atrium_common::{code::HashBuilder, error::Result, source::Source};
use atrium_memory::Cache;

/// A [`Source`] that serves reads through a [`Cache`].
///
/// [`Source::fetch`] goes through the cache, [`Source::list_keys`] goes straight to the wrapped source.
pub struct ReadThrough<SRC, S = RandomState>
where
    SRC: Source,
    S: HashBuilder,
{
    cache: Cache<SRC::Key, SRC::Value, S>,
    source: Arc<SRC>,
}

impl<SRC, S> Debug for ReadThrough<SRC, S>
where
    SRC: Source,
    S: HashBuilder,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThrough").field("cache", &self.cache).finish()
    }
}

impl<SRC, S> Clone for ReadThrough<SRC, S>
where
    SRC: Source,
    S: HashBuilder,
{
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            source: self.source.clone(),
        }
    }
}

impl<SRC, S> ReadThrough<SRC, S>
where
    SRC: Source,
    S: HashBuilder,
{
    /// Serve reads of `source` through `cache`.
    pub fn new(cache: Cache<SRC::Key, SRC::Value, S>, source: SRC) -> Self {
        Self::with_shared_source(cache, Arc::new(source))
    }

    /// Serve reads of a shared `source` through `cache`.
    pub fn with_shared_source(cache: Cache<SRC::Key, SRC::Value, S>, source: Arc<SRC>) -> Self {
        Self { cache, source }
    }

    /// The cache in front of the source.
    pub fn cache(&self) -> &Cache<SRC::Key, SRC::Value, S> {
        &self.cache
    }

    /// The wrapped source.
    pub fn source(&self) -> &Arc<SRC> {
        &self.source
    }
}

impl<SRC, S> Source for ReadThrough<SRC, S>
where
    SRC: Source,
    S: HashBuilder,
{
    type Key = SRC::Key;
    type Value = SRC::Value;

    #[cfg_attr(feature = "tracing", fastrace::trace(name = "atrium::read_through::fetch"))]
    fn fetch(&self, key: &Self::Key) -> Result<Self::Value> {
        self.cache.get(key, self.source.as_ref())
    }

    fn list_keys(&self) -> Vec<Self::Key> {
        self.source.list_keys()
    }
}
