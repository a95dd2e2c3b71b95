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

//! Scenario tests for the read-through cache.

use std::{
    sync::{Arc, Barrier},
    thread,
    time::Duration,
};

use atrium::{CacheBuilder, ErrorKind, Event, ReadThrough, Source};
use atrium_common::metrics::registry::prometheus::PrometheusMetricsRegistry;
use atrium_memory::test_utils::{TestEventListener, TestSource};
use itertools::Itertools;
use prometheus::{Registry, TextEncoder};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

const A: u64 = 1;
const B: u64 = 2;
const C: u64 = 3;

fn read_through(capacity: usize, source: TestSource) -> ReadThrough<TestSource> {
    ReadThrough::new(CacheBuilder::new(capacity).build().unwrap(), source)
}

#[test_log::test]
fn test_capacity_invariant() {
    const THREADS: usize = 8;
    const GETS: usize = 500;
    const CAPACITY: usize = 8;

    let rt = read_through(CAPACITY, TestSource::new(0..64).with_latency(Duration::from_micros(100)));

    let handles = (0..THREADS)
        .map(|i| {
            let rt = rt.clone();
            thread::spawn(move || {
                let mut rng = SmallRng::seed_from_u64(i as u64);
                for _ in 0..GETS {
                    let key = rng.random_range(0..64);
                    match rt.fetch(&key) {
                        Ok(value) => assert_eq!(value, TestSource::value_of(key)),
                        // Another thread held the key in flight past the wait timeout.
                        Err(e) => assert_eq!(e.kind(), ErrorKind::Timeout),
                    }
                    assert!(rt.cache().len() <= CAPACITY);
                }
            })
        })
        .collect_vec();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(rt.cache().len() <= CAPACITY);
    rt.cache().sanity();
}

#[test_log::test]
fn test_coalescing() {
    const THREADS: usize = 16;

    let rt = read_through(4, TestSource::new(0..64).with_latency(Duration::from_millis(200)));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles = (0..THREADS)
        .map(|_| {
            let rt = rt.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                rt.fetch(&42)
            })
        })
        .collect_vec();

    let values = handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect_vec();
    assert!(values.iter().all(|v| *v == 420));
    assert_eq!(rt.source().fetches(), 1);
}

#[test_log::test]
fn test_coalescing_error() {
    const THREADS: usize = 16;

    let rt = read_through(4, TestSource::new(0..64).with_latency(Duration::from_millis(200)));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles = (0..THREADS)
        .map(|_| {
            let rt = rt.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                rt.fetch(&1000)
            })
        })
        .collect_vec();

    let errors = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap_err())
        .collect_vec();
    assert!(errors.iter().all(|e| e.kind() == ErrorKind::NotFound));
    assert!(errors.iter().map(|e| e.to_string()).all_equal());
    assert_eq!(rt.source().fetches(), 1);
}

#[test_log::test]
fn test_hit_correctness() {
    let rt = read_through(4, TestSource::new(0..64));

    for key in 0..4 {
        assert_eq!(rt.fetch(&key).unwrap(), TestSource::value_of(key));
    }
    for _ in 0..10 {
        for key in 0..4 {
            assert_eq!(rt.fetch(&key).unwrap(), TestSource::value_of(key));
        }
    }
    assert_eq!(rt.source().fetches(), 4);
}

#[test_log::test]
fn test_eviction_order() {
    let listener = Arc::new(TestEventListener::default());
    let cache = CacheBuilder::<u64, u64>::new(3)
        .with_event_listener(listener.clone())
        .build()
        .unwrap();
    let rt = ReadThrough::new(cache, TestSource::new(0..64));

    for key in [1, 2, 3] {
        rt.fetch(&key).unwrap();
    }
    // Key 1 is now the most recently touched one.
    rt.fetch(&1).unwrap();
    rt.fetch(&4).unwrap();
    rt.fetch(&5).unwrap();

    assert!(rt.cache().contains(&1));
    assert!(!rt.cache().contains(&2));
    assert!(!rt.cache().contains(&3));
    assert!(rt.cache().contains(&4));
    assert!(rt.cache().contains(&5));
    assert_eq!(
        listener.events(),
        vec![(Event::Evict, 2, Some(20)), (Event::Evict, 3, Some(30))]
    );
}

#[test_log::test]
fn test_hot_key_survives() {
    let rt = read_through(4, TestSource::new(0..1000));

    for key in 100..200 {
        rt.fetch(&key).unwrap();
        rt.fetch(&7).unwrap();
    }
    assert!(rt.cache().contains(&7));
    assert_eq!(rt.source().fetches_of(7), 1);
}

#[test_log::test]
fn test_miss_after_eviction() {
    let rt = read_through(2, TestSource::new(0..64));

    rt.fetch(&1).unwrap();
    rt.fetch(&2).unwrap();
    rt.fetch(&3).unwrap();
    assert!(!rt.cache().contains(&1));

    assert_eq!(rt.fetch(&1).unwrap(), 10);
    assert_eq!(rt.source().fetches_of(1), 2);
    assert_eq!(rt.fetch(&1).unwrap(), 10);
    assert_eq!(rt.source().fetches_of(1), 2);
}

#[test_log::test]
fn test_timeout_independence() {
    let source = Arc::new(TestSource::new(0..64).with_latency(Duration::from_millis(300)));
    let cache = CacheBuilder::new(4)
        .with_wait_timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let rt = ReadThrough::with_shared_source(cache, source.clone());

    let owner = {
        let rt = rt.clone();
        thread::spawn(move || rt.fetch(&5))
    };
    while source.fetches() == 0 {
        thread::yield_now();
    }

    let waiters = (0..4)
        .map(|_| {
            let rt = rt.clone();
            thread::spawn(move || rt.fetch(&5))
        })
        .collect_vec();
    for waiter in waiters {
        assert_eq!(waiter.join().unwrap().unwrap_err().kind(), ErrorKind::Timeout);
    }

    assert_eq!(owner.join().unwrap().unwrap(), 50);
    assert_eq!(rt.fetch(&5).unwrap(), 50);
    assert_eq!(source.fetches(), 1);
}

#[test_log::test]
fn test_capacity_two_scenario() {
    let rt = read_through(2, TestSource::new(0..64));

    for key in [A, B, C] {
        assert_eq!(rt.fetch(&key).unwrap(), TestSource::value_of(key));
    }
    assert_eq!(rt.cache().len(), 2);
    assert!(!rt.cache().contains(&A));
    assert!(rt.cache().contains(&B));
    assert!(rt.cache().contains(&C));
    assert_eq!(rt.source().fetches(), 3);

    assert_eq!(rt.fetch(&A).unwrap(), TestSource::value_of(A));
    assert_eq!(rt.source().fetches(), 4);
    assert_eq!(rt.source().fetches_of(A), 2);
}

#[test_log::test]
fn test_gaussian_workers() {
    const START: u64 = 1000;
    const COUNT: u64 = 1000;
    const WORKERS: usize = 4;
    const GETS: usize = 20;
    const DEVIATION: f64 = 5.0;

    let rt = read_through(
        5,
        TestSource::new(START..START + COUNT).with_latency(Duration::from_millis(20)),
    );
    let mean = (START + rt.list_keys().len() as u64 / 2) as f64;

    let handles = (0..WORKERS)
        .map(|i| {
            let rt = rt.clone();
            thread::spawn(move || {
                let mut rng = SmallRng::seed_from_u64(i as u64);
                let normal = Normal::new(mean, DEVIATION).unwrap();
                for _ in 0..GETS {
                    let key = normal.sample(&mut rng).round() as u64;
                    match rt.fetch(&key) {
                        Ok(value) => assert_eq!(value, TestSource::value_of(key)),
                        Err(e) => {
                            assert!(!(START..START + COUNT).contains(&key));
                            assert_eq!(e.kind(), ErrorKind::NotFound);
                        }
                    }
                }
            })
        })
        .collect_vec();
    for handle in handles {
        handle.join().unwrap();
    }

    let fetches = rt.source().fetches();
    tracing::info!(fetches, "gaussian workload finished");
    assert!(fetches < WORKERS * GETS);
    assert!(rt.cache().len() <= 5);
    rt.cache().sanity();
}

#[test_log::test]
fn test_failed_item_is_retried() {
    let rt = read_through(4, TestSource::new(0..64));

    rt.source().fail(9);
    assert_eq!(rt.fetch(&9).unwrap_err().kind(), ErrorKind::Unavailable);
    assert_eq!(rt.fetch(&9).unwrap_err().kind(), ErrorKind::Unavailable);
    rt.source().recover(9);
    assert_eq!(rt.fetch(&9).unwrap(), 90);
    assert_eq!(rt.fetch(&9).unwrap(), 90);
    assert_eq!(rt.source().fetches_of(9), 3);
}

#[test_log::test]
fn test_owner_panic_releases_waiters() {
    let source = Arc::new(TestSource::new(0..64).with_latency(Duration::from_millis(200)));
    let rt = ReadThrough::with_shared_source(CacheBuilder::new(4).build().unwrap(), source.clone());
    source.panic_on(5);

    let owner = {
        let rt = rt.clone();
        thread::spawn(move || rt.fetch(&5))
    };
    while source.fetches() == 0 {
        thread::yield_now();
    }

    let e = rt.fetch(&5).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Cancelled);
    assert!(owner.join().is_err());

    source.recover(5);
    assert_eq!(rt.fetch(&5).unwrap(), 50);
    assert_eq!(source.fetches_of(5), 2);
}

#[test_log::test]
fn test_caches_share_metrics_registry() {
    let p8s = PrometheusMetricsRegistry::new(Registry::new());
    let build = |name: &'static str| {
        let cache = CacheBuilder::new(2)
            .with_name(name)
            .with_metrics_registry(Box::new(p8s.clone()))
            .build()
            .unwrap();
        ReadThrough::new(cache, TestSource::new(0..64))
    };
    let products = build("products");
    let users = build("users");

    products.fetch(&1).unwrap();
    products.fetch(&1).unwrap();
    users.fetch(&2).unwrap();
    users.fetch(&3).unwrap();
    users.fetch(&4).unwrap();

    let text = TextEncoder::new().encode_to_string(&p8s.registry().gather()).unwrap();
    for line in [
        r#"atrium_memory_op_total{name="products",op="hit"} 1"#,
        r#"atrium_memory_op_total{name="products",op="miss"} 1"#,
        r#"atrium_memory_op_total{name="users",op="miss"} 3"#,
        r#"atrium_memory_op_total{name="users",op="evict"} 1"#,
        r#"atrium_memory_usage{name="products"} 1"#,
        r#"atrium_memory_usage{name="users"} 2"#,
    ] {
        assert!(text.contains(line), "missing `{line}` in:\n{text}");
    }
}

#[test]
fn test_metrics_registration_conflict_fails_build() {
    let registry = Registry::new();
    CacheBuilder::<u64, u64>::new(2)
        .with_metrics_registry(Box::new(PrometheusMetricsRegistry::new(registry.clone())))
        .build()
        .unwrap();

    let e = CacheBuilder::<u64, u64>::new(2)
        .with_metrics_registry(Box::new(PrometheusMetricsRegistry::new(registry)))
        .build()
        .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Config);
}
