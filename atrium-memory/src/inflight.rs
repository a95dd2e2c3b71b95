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

//! Single-producer, multi-consumer completion signal for in-flight fetches.
//!
//! The caller that registers a missing key receives the [`Notifier`] and performs the fetch. Every other caller that
//! finds the key in flight receives a clone of the [`Waiter`] and blocks on it. The notifier publishes exactly one
//! result, exactly once; any number of waiters observe that single publication.

use std::{
    fmt::Debug,
    sync::Arc,
    time::{Duration, Instant},
};

use atrium_common::{
    code::Value,
    error::{Error, Result},
    strict_assert,
};
use parking_lot::{Condvar, Mutex};

struct Slot<V> {
    result: Mutex<Option<Result<V>>>,
    condvar: Condvar,
}

/// Create a connected pair of [`Notifier`] and [`Waiter`].
pub fn channel<V>() -> (Notifier<V>, Waiter<V>) {
    let slot = Arc::new(Slot {
        result: Mutex::new(None),
        condvar: Condvar::new(),
    });
    let notifier = Notifier {
        slot: slot.clone(),
        notified: false,
    };
    let waiter = Waiter { slot };
    (notifier, waiter)
}

/// The producing half of an in-flight fetch, held by the owner.
///
/// Dropping a notifier without calling [`Notifier::notify`], e.g. when the fetch panics, publishes an
/// [`ErrorKind::Cancelled`](atrium_common::error::ErrorKind::Cancelled) error so waiters are released promptly.
pub struct Notifier<V> {
    slot: Arc<Slot<V>>,
    notified: bool,
}

impl<V> Debug for Notifier<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("slot", &Arc::as_ptr(&self.slot))
            .field("notified", &self.notified)
            .finish()
    }
}

impl<V> Notifier<V> {
    /// Get a waiter attached to this notifier.
    pub fn waiter(&self) -> Waiter<V> {
        Waiter {
            slot: self.slot.clone(),
        }
    }

    /// Publish the fetch result to all attached waiters.
    pub fn notify(mut self, result: Result<V>) {
        self.publish(result);
    }

    fn publish(&mut self, result: Result<V>) {
        let mut guard = self.slot.result.lock();
        strict_assert!(guard.is_none(), "in-flight result must be published exactly once");
        *guard = Some(result);
        self.notified = true;
        drop(guard);
        self.slot.condvar.notify_all();
    }
}

impl<V> Drop for Notifier<V> {
    fn drop(&mut self) {
        if !self.notified {
            self.publish(Err(Error::cancelled()));
        }
    }
}

/// The consuming half of an in-flight fetch, shared by all waiters of a key.
pub struct Waiter<V> {
    slot: Arc<Slot<V>>,
}

impl<V> Clone for Waiter<V> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<V> Debug for Waiter<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter").field("slot", &Arc::as_ptr(&self.slot)).finish()
    }
}

impl<V> Waiter<V> {
    /// Returns `true` if both waiters are attached to the same in-flight fetch.
    pub fn same_fetch(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    /// Returns `true` if the result has been published.
    pub fn is_completed(&self) -> bool {
        self.slot.result.lock().is_some()
    }
}

impl<V> Waiter<V>
where
    V: Value,
{
    /// Get the published result without blocking, if any.
    pub fn try_get(&self) -> Option<Result<V>> {
        self.slot.result.lock().clone()
    }

    /// Block until the result is published or `timeout` elapses.
    ///
    /// A timeout only affects this call. The owner keeps fetching and still publishes its result.
    pub fn wait_for(&self, timeout: Duration) -> Result<V> {
        let start = Instant::now();
        let mut guard = self.slot.result.lock();
        self.slot
            .condvar
            .wait_while_for(&mut guard, |result| result.is_none(), timeout);
        match guard.as_ref() {
            Some(result) => result.clone(),
            None => Err(Error::timeout(start.elapsed())),
        }
    }
}
