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

use std::{hash::Hash, sync::Arc};

use atrium_common::{
    code::{HashBuilder, Key, Value},
    error::Result,
    event::Event,
    metrics::model::Metrics,
    strict_assert, strict_assert_eq,
};
use equivalent::Equivalent;
use hashbrown::HashMap;

use crate::{
    indexer::Indexer,
    inflight::{channel, Notifier, Waiter},
    record::{Record, State},
};

/// An item that left the cache, to be reported to the event listener once the lock is released.
pub type Garbage<K, V> = (Event, K, Option<V>);

/// Outcome of [`RawCache::lookup`].
#[derive(Debug)]
pub enum Lookup<V> {
    /// The key is materialized.
    Hit(V),
    /// The caller registered a new in-flight item and must fetch it.
    Owner(Notifier<V>),
    /// Another caller is fetching the key.
    Wait(Waiter<V>),
}

/// Unsynchronized cache state: the key index, the position index and the capacity bound.
///
/// All methods are O(1) amortized and never block, so the owner can call them under a single mutex.
pub struct RawCache<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    records: HashMap<K, Record<V>, S>,
    indexer: Indexer<K>,
    capacity: usize,
    metrics: Arc<Metrics>,
}

impl<K, V, S> RawCache<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    pub fn new(capacity: usize, hash_builder: S, metrics: Arc<Metrics>) -> Self {
        strict_assert!(capacity > 0);
        Self {
            records: HashMap::with_capacity_and_hasher(capacity + 1, hash_builder),
            indexer: Indexer::new(),
            capacity,
            metrics,
        }
    }

    /// Look up `key`, registering it as in flight on a miss.
    ///
    /// Items leaving the cache are pushed to `garbages`.
    pub fn lookup(&mut self, key: &K, garbages: &mut Vec<Garbage<K, V>>) -> Lookup<V> {
        if let Some(record) = self.records.get_mut(key) {
            let position = self.indexer.refresh(record.position());
            record.set_position(position);
            record.settle();

            match record.state() {
                State::Materialized(value) => {
                    tracing::trace!(?key, position, "[raw]: hit");
                    self.metrics.memory_hit.increase(1);
                    return Lookup::Hit(value.clone());
                }
                State::InFlight(waiter) => {
                    tracing::trace!(?key, position, "[raw]: attach to in-flight fetch");
                    self.metrics.memory_hit.increase(1);
                    self.metrics.memory_coalesce.increase(1);
                    return Lookup::Wait(waiter.clone());
                }
                State::Failed(e) => {
                    tracing::trace!(?key, position, error = %e, "[raw]: replace failed item");
                    let (notifier, waiter) = channel();
                    let old = std::mem::replace(record, Record::in_flight(position, waiter));
                    self.metrics.memory_replace.increase(1);
                    garbages.push((Event::Replace, key.clone(), old.into_value()));
                    return Lookup::Owner(notifier);
                }
            }
        }

        let (notifier, waiter) = channel();
        let position = self.indexer.next();
        self.indexer.insert(position, key.clone());
        self.records.insert(key.clone(), Record::in_flight(position, waiter));
        tracing::trace!(?key, position, "[raw]: register in-flight item");
        self.metrics.memory_miss.increase(1);
        self.metrics.memory_usage.increase(1);

        if self.records.len() > self.capacity {
            self.evict(garbages);
        }

        Lookup::Owner(notifier)
    }

    /// Record the terminal state of the fetch attached to `waiter`.
    ///
    /// Returns `false` if the item was evicted, replaced or already settled in the meantime.
    pub fn complete(&mut self, key: &K, waiter: &Waiter<V>, result: &Result<V>) -> bool {
        match self.records.get_mut(key) {
            Some(record) => record.complete(waiter, result),
            None => false,
        }
    }

    fn evict(&mut self, garbages: &mut Vec<Garbage<K, V>>) {
        let Some((position, key)) = self.indexer.pop_oldest() else {
            return;
        };
        let record = self.records.remove(&key);
        strict_assert!(record.as_ref().is_some_and(|r| r.position() == position));
        tracing::trace!(?key, position, "[raw]: evict");
        self.metrics.memory_evict.increase(1);
        self.metrics.memory_usage.decrease(1);
        garbages.push((Event::Evict, key, record.and_then(Record::into_value)));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        self.records.contains_key(key)
    }

    /// Verify that both indices agree and the capacity bound holds.
    pub fn sanity(&self) {
        strict_assert_eq!(self.records.len(), self.indexer.len());
        strict_assert!(self.records.len() <= self.capacity);
        for (key, record) in self.records.iter() {
            strict_assert!(record.position() >= self.indexer.cursor());
            strict_assert_eq!(self.indexer.get(record.position()), Some(key));
        }
    }
}

#[cfg(test)]
mod tests {
    use ahash::RandomState;
    use atrium_common::error::{Error, ErrorKind};

    use super::*;

    fn raw(capacity: usize) -> RawCache<u64, u64, RandomState> {
        RawCache::new(capacity, RandomState::default(), Arc::new(Metrics::noop()))
    }

    fn fill(raw: &mut RawCache<u64, u64, RandomState>, key: u64) -> Vec<Garbage<u64, u64>> {
        let mut garbages = vec![];
        match raw.lookup(&key, &mut garbages) {
            Lookup::Owner(notifier) => {
                let waiter = notifier.waiter();
                let result = Ok(key * 10);
                notifier.notify(result.clone());
                assert!(raw.complete(&key, &waiter, &result));
            }
            lookup => panic!("expected owner, got {lookup:?}"),
        }
        raw.sanity();
        garbages
    }

    fn keys(raw: &RawCache<u64, u64, RandomState>) -> Vec<u64> {
        let mut keys = raw.records.keys().copied().collect::<Vec<_>>();
        keys.sort();
        keys
    }

    #[test]
    fn test_miss_then_hit() {
        let mut raw = raw(4);
        assert!(fill(&mut raw, 1).is_empty());
        assert!(raw.contains(&1));

        let mut garbages = vec![];
        assert!(matches!(raw.lookup(&1, &mut garbages), Lookup::Hit(10)));
        assert!(garbages.is_empty());
        raw.sanity();
    }

    #[test]
    fn test_evict_oldest() {
        let mut raw = raw(2);
        fill(&mut raw, 1);
        fill(&mut raw, 2);
        let garbages = fill(&mut raw, 3);
        assert_eq!(garbages, vec![(Event::Evict, 1, Some(10))]);
        assert_eq!(keys(&raw), vec![2, 3]);
    }

    #[test]
    fn test_hit_protects_from_eviction() {
        let mut raw = raw(2);
        fill(&mut raw, 1);
        fill(&mut raw, 2);

        let mut garbages = vec![];
        assert!(matches!(raw.lookup(&1, &mut garbages), Lookup::Hit(10)));

        let garbages = fill(&mut raw, 3);
        assert_eq!(garbages, vec![(Event::Evict, 2, Some(20))]);
        assert_eq!(keys(&raw), vec![1, 3]);
    }

    #[test]
    fn test_in_flight_waiter_and_settle() {
        let mut raw = raw(2);
        let mut garbages = vec![];

        let notifier = match raw.lookup(&1, &mut garbages) {
            Lookup::Owner(notifier) => notifier,
            lookup => panic!("expected owner, got {lookup:?}"),
        };
        let waiter = match raw.lookup(&1, &mut garbages) {
            Lookup::Wait(waiter) => waiter,
            lookup => panic!("expected waiter, got {lookup:?}"),
        };
        assert!(waiter.same_fetch(&notifier.waiter()));

        // Published but not yet recorded by the owner: the next reader converts it.
        notifier.notify(Ok(10));
        assert!(matches!(raw.lookup(&1, &mut garbages), Lookup::Hit(10)));
        assert!(!raw.complete(&1, &waiter, &Ok(10)));
        raw.sanity();
    }

    #[test]
    fn test_failed_item_is_replaced() {
        let mut raw = raw(2);
        let mut garbages = vec![];

        let notifier = match raw.lookup(&1, &mut garbages) {
            Lookup::Owner(notifier) => notifier,
            lookup => panic!("expected owner, got {lookup:?}"),
        };
        let waiter = notifier.waiter();
        let result = Err(Error::not_found(1));
        notifier.notify(result.clone());
        assert!(raw.complete(&1, &waiter, &result));

        match raw.lookup(&1, &mut garbages) {
            Lookup::Owner(notifier) => assert!(!notifier.waiter().same_fetch(&waiter)),
            lookup => panic!("expected owner, got {lookup:?}"),
        }
        assert_eq!(garbages, vec![(Event::Replace, 1, None)]);
        assert_eq!(raw.len(), 1);
        raw.sanity();

        // The replaced attempt was dropped without notifying.
        match raw.lookup(&1, &mut garbages) {
            Lookup::Owner(_) => {}
            lookup => panic!("expected owner, got {lookup:?}"),
        }
        assert_eq!(garbages.len(), 2);
        assert_eq!(waiter.try_get().unwrap().unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_evict_in_flight() {
        let mut raw = raw(1);
        let mut garbages = vec![];

        let notifier = match raw.lookup(&1, &mut garbages) {
            Lookup::Owner(notifier) => notifier,
            lookup => panic!("expected owner, got {lookup:?}"),
        };
        let garbages = fill(&mut raw, 2);
        assert_eq!(garbages, vec![(Event::Evict, 1, None)]);

        let waiter = notifier.waiter();
        notifier.notify(Ok(10));
        assert!(!raw.complete(&1, &waiter, &Ok(10)));
        assert_eq!(keys(&raw), vec![2]);
    }

    #[test]
    fn test_capacity_invariant_under_churn() {
        let mut raw = raw(5);
        for i in 0..1000u64 {
            let key = (i * 7919) % 37;
            let mut garbages = vec![];
            match raw.lookup(&key, &mut garbages) {
                Lookup::Owner(notifier) => {
                    let waiter = notifier.waiter();
                    notifier.notify(Ok(key));
                    raw.complete(&key, &waiter, &Ok(key));
                }
                Lookup::Hit(value) => assert_eq!(value, key),
                Lookup::Wait(_) => unreachable!(),
            }
            assert!(garbages.len() <= 1);
            assert!(raw.len() <= raw.capacity());
            raw.sanity();
        }
    }
}
