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

//! Utilities for testing.

use std::{
    ops::Range,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::Duration,
};

use atrium_common::{
    error::{Error, ErrorKind, Result},
    event::{Event, EventListener},
    source::Source,
};
use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;

/// A source over a range of `u64` keys whose value is `key * 10`.
///
/// Counts fetches and can inject latency, failures and panics per key.
#[derive(Debug)]
pub struct TestSource {
    keys: Range<u64>,
    latency: Duration,
    failing: Mutex<HashSet<u64>>,
    panicking: Mutex<HashSet<u64>>,
    fetches: AtomicUsize,
    fetches_per_key: Mutex<HashMap<u64, usize>>,
}

impl TestSource {
    /// Create a source that knows the given keys.
    pub fn new(keys: Range<u64>) -> Self {
        Self {
            keys,
            latency: Duration::ZERO,
            failing: Mutex::default(),
            panicking: Mutex::default(),
            fetches: AtomicUsize::new(0),
            fetches_per_key: Mutex::default(),
        }
    }

    /// Sleep for `latency` on every fetch.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Value the source returns for `key`.
    pub fn value_of(key: u64) -> u64 {
        key * 10
    }

    /// Make fetches of `key` fail with [`ErrorKind::Unavailable`].
    pub fn fail(&self, key: u64) {
        self.failing.lock().insert(key);
    }

    /// Make fetches of `key` succeed again.
    pub fn recover(&self, key: u64) {
        self.failing.lock().remove(&key);
        self.panicking.lock().remove(&key);
    }

    /// Make fetches of `key` panic after the latency.
    pub fn panic_on(&self, key: u64) {
        self.panicking.lock().insert(key);
    }

    /// Total fetch count.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::Acquire)
    }

    /// Fetch count of `key`.
    pub fn fetches_of(&self, key: u64) -> usize {
        self.fetches_per_key.lock().get(&key).copied().unwrap_or_default()
    }
}

impl Source for TestSource {
    type Key = u64;
    type Value = u64;

    fn fetch(&self, key: &u64) -> Result<u64> {
        self.fetches.fetch_add(1, Ordering::AcqRel);
        *self.fetches_per_key.lock().entry(*key).or_default() += 1;

        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }

        if self.panicking.lock().contains(key) {
            panic!("injected panic on fetching key {key}");
        }
        if self.failing.lock().contains(key) {
            return Err(Error::new(ErrorKind::Unavailable, "injected failure").with_context("key", key));
        }
        if !self.keys.contains(key) {
            return Err(Error::not_found(key));
        }
        Ok(Self::value_of(*key))
    }

    fn list_keys(&self) -> Vec<u64> {
        self.keys.clone().collect()
    }
}

/// An event listener that records all events.
#[derive(Debug, Default)]
pub struct TestEventListener {
    events: Mutex<Vec<(Event, u64, Option<u64>)>>,
}

impl TestEventListener {
    /// Get all recorded events.
    pub fn events(&self) -> Vec<(Event, u64, Option<u64>)> {
        self.events.lock().clone()
    }
}

impl EventListener for TestEventListener {
    type Key = u64;
    type Value = u64;

    fn on_leave(&self, reason: Event, key: &u64, value: Option<&u64>) {
        self.events.lock().push((reason, *key, value.copied()));
    }
}
