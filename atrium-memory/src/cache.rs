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

use std::{
    borrow::Cow,
    fmt::Debug,
    hash::Hash,
    sync::Arc,
    time::{Duration, Instant},
};

use ahash::RandomState;
use atrium_common::{
    code::{HashBuilder, Key, Value},
    error::{Error, Result},
    event::EventListener,
    metrics::{model::Metrics, registry::noop::NoopMetricsRegistry, BoxedRegistry},
    source::Source,
};
use equivalent::Equivalent;
use parking_lot::Mutex;

use crate::{
    inflight::{Notifier, Waiter},
    raw::{Garbage, Lookup, RawCache},
};

/// Default bound on how long a caller waits for another caller's in-flight fetch.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(3);

/// Shared event listener.
pub type ArcEventListener<K, V> = Arc<dyn EventListener<Key = K, Value = V>>;

/// Read-through cache builder.
pub struct CacheBuilder<K, V, S = RandomState>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    name: Cow<'static, str>,
    capacity: usize,
    wait_timeout: Duration,
    hash_builder: S,
    event_listener: Option<ArcEventListener<K, V>>,
    registry: BoxedRegistry,
}

impl<K, V> CacheBuilder<K, V, RandomState>
where
    K: Key,
    V: Value,
{
    /// Create a read-through cache builder that holds at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            name: "atrium".into(),
            capacity,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            hash_builder: RandomState::default(),
            event_listener: None,
            registry: Box::new(NoopMetricsRegistry),
        }
    }
}

impl<K, V, S> CacheBuilder<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    /// Set the name of the cache, used as the `name` label of its metrics.
    ///
    /// Default: `atrium`.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Set how long a caller waits for another caller's in-flight fetch before giving up.
    ///
    /// Default: 3 seconds.
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Set the hash builder of the key index.
    pub fn with_hash_builder<OS>(self, hash_builder: OS) -> CacheBuilder<K, V, OS>
    where
        OS: HashBuilder,
    {
        CacheBuilder {
            name: self.name,
            capacity: self.capacity,
            wait_timeout: self.wait_timeout,
            hash_builder,
            event_listener: self.event_listener,
            registry: self.registry,
        }
    }

    /// Set the event listener, notified when items leave the cache.
    pub fn with_event_listener(mut self, event_listener: ArcEventListener<K, V>) -> Self {
        self.event_listener = Some(event_listener);
        self
    }

    /// Set the metrics registry.
    ///
    /// Default: [`NoopMetricsRegistry`].
    pub fn with_metrics_registry(mut self, registry: BoxedRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Build the read-through cache.
    pub fn build(self) -> Result<Cache<K, V, S>> {
        if self.capacity == 0 {
            return Err(Error::config("capacity must be greater than 0").with_context("name", &self.name));
        }
        if self.wait_timeout.is_zero() {
            return Err(Error::config("wait timeout must be greater than 0").with_context("name", &self.name));
        }

        let metrics = Arc::new(Metrics::new(self.name.clone(), &*self.registry)?);
        let raw = RawCache::new(self.capacity, self.hash_builder, metrics.clone());

        tracing::debug!(name = %self.name, capacity = self.capacity, wait_timeout = ?self.wait_timeout, "[cache]: build");

        Ok(Cache {
            inner: Arc::new(Inner {
                raw: Mutex::new(raw),
                name: self.name,
                capacity: self.capacity,
                wait_timeout: self.wait_timeout,
                metrics,
                event_listener: self.event_listener,
            }),
        })
    }
}

struct Inner<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    raw: Mutex<RawCache<K, V, S>>,
    name: Cow<'static, str>,
    capacity: usize,
    wait_timeout: Duration,
    metrics: Arc<Metrics>,
    event_listener: Option<ArcEventListener<K, V>>,
}

/// A bounded, thread-safe, read-through cache.
///
/// [`Cache::get`] returns the cached value of a key, or fetches it from the given source on a miss. Concurrent gets
/// of the same key share one fetch: the first caller fetches, the others wait for its result. The cache holds at most
/// `capacity` items and evicts the least recently touched one when a new key overflows it.
///
/// Coalescing only holds while the in-flight item stays resident. If it is evicted before its fetch completes, the
/// next get of that key starts a second fetch; the first one still delivers its result to its own waiters, but the
/// result is not cached.
pub struct Cache<K, V, S = RandomState>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    inner: Arc<Inner<K, V, S>>,
}

impl<K, V, S> Clone for Cache<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V, S> Debug for Cache<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.inner.name)
            .field("capacity", &self.inner.capacity)
            .field("wait_timeout", &self.inner.wait_timeout)
            .finish()
    }
}

impl<K, V, S> Cache<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    /// Get the value of `key`, fetching it from `source` if it is not cached.
    ///
    /// If another caller is already fetching `key`, wait for its result instead of issuing a second fetch. The wait is
    /// bounded by the configured wait timeout; giving up does not cancel the other caller's fetch.
    ///
    /// # Errors
    ///
    /// - The error of the fetch, shared by every caller that waited on it.
    /// - [`ErrorKind::Timeout`](atrium_common::error::ErrorKind::Timeout) if the in-flight fetch did not complete in
    ///   time.
    /// - [`ErrorKind::Cancelled`](atrium_common::error::ErrorKind::Cancelled) if the fetching caller panicked.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "atrium::memory::cache::get"))]
    pub fn get<SRC>(&self, key: &K, source: &SRC) -> Result<V>
    where
        SRC: Source<Key = K, Value = V> + ?Sized,
    {
        let mut garbages = vec![];
        let lookup = self.inner.raw.lock().lookup(key, &mut garbages);
        self.dispatch(garbages);

        match lookup {
            Lookup::Hit(value) => Ok(value),
            Lookup::Owner(notifier) => self.fetch(key, source, notifier),
            Lookup::Wait(waiter) => self.wait(key, waiter),
        }
    }

    fn fetch<SRC>(&self, key: &K, source: &SRC, notifier: Notifier<V>) -> Result<V>
    where
        SRC: Source<Key = K, Value = V> + ?Sized,
    {
        let waiter = notifier.waiter();

        self.inner.metrics.memory_fetch.increase(1);
        let start = Instant::now();
        let result = source.fetch(key);
        self.inner
            .metrics
            .memory_fetch_duration
            .record(start.elapsed().as_secs_f64());
        if result.is_err() {
            self.inner.metrics.memory_fetch_error.increase(1);
        }

        notifier.notify(result.clone());
        let recorded = self.inner.raw.lock().complete(key, &waiter, &result);
        tracing::trace!(?key, ok = result.is_ok(), recorded, "[cache]: fetch completed");

        result
    }

    fn wait(&self, key: &K, waiter: Waiter<V>) -> Result<V> {
        let start = Instant::now();
        let result = waiter.wait_for(self.inner.wait_timeout);
        self.inner
            .metrics
            .memory_wait_duration
            .record(start.elapsed().as_secs_f64());

        result.map_err(|e| {
            if e.is_timeout() {
                tracing::trace!(?key, "[cache]: wait timed out");
                self.inner.metrics.memory_timeout.increase(1);
                e.with_context("key", format!("{key:?}"))
            } else {
                e
            }
        })
    }

    fn dispatch(&self, garbages: Vec<Garbage<K, V>>) {
        if let Some(listener) = self.inner.event_listener.as_ref() {
            for (event, key, value) in garbages {
                listener.on_leave(event, &key, value.as_ref());
            }
        }
    }

    /// Resident item count, in-flight items included.
    pub fn len(&self) -> usize {
        self.inner.raw.lock().len()
    }

    /// Returns `true` if the cache holds no item.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum resident item count.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Returns `true` if `key` is resident, in any state. Does not refresh its position.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        self.inner.raw.lock().contains(key)
    }

    /// Bound on how long a caller waits for another caller's in-flight fetch.
    pub fn wait_timeout(&self) -> Duration {
        self.inner.wait_timeout
    }

    /// Name of the cache.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Metrics of the cache.
    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    #[cfg(any(test, feature = "test_utils"))]
    #[doc(hidden)]
    pub fn sanity(&self) {
        self.inner.raw.lock().sanity();
    }
}
