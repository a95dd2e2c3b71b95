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

//! Demonstration driver for atrium: concurrent workers reading a slow product catalog through a read-through cache.

mod catalog;
mod report;

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use anyhow::Context;
use atrium::{Cache, CacheBuilder, Event, EventListener, PrometheusMetricsRegistry, ReadThrough, Source};
use clap::Parser;
use itertools::Itertools;
use prometheus::{Registry, TextEncoder};
use rand::{rngs::SmallRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Serialize, Serializer};

use crate::{
    catalog::{CatalogStub, ProductDetails},
    report::{Summary, WorkerReport},
};

#[derive(Parser, Debug, Clone, Serialize)]
#[command(author, version, about)]
pub struct Args {
    /// First product id of the catalog.
    #[arg(long, default_value_t = 1000)]
    key_start: u64,

    /// Product count of the catalog.
    #[arg(long, default_value_t = 1000)]
    key_count: u64,

    /// Artificial latency of every catalog fetch.
    #[arg(long, default_value = "150ms", value_parser = humantime::parse_duration)]
    #[serde(serialize_with = "serialize_duration")]
    latency: Duration,

    /// Worker thread count.
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Gets per worker.
    #[arg(long, default_value_t = 20)]
    fetches: usize,

    /// Standard deviation of the product ids each worker reads, around the middle of the catalog.
    #[arg(long, default_value_t = 5.0)]
    deviation: f64,

    /// Cache capacity. (items)
    #[arg(long, default_value_t = 5)]
    capacity: usize,

    /// How long a get waits for another worker's in-flight fetch of the same id.
    #[arg(long, default_value = "3s", value_parser = humantime::parse_duration)]
    #[serde(serialize_with = "serialize_duration")]
    wait_timeout: Duration,

    /// Seed of the workers' id generators. Random if absent.
    #[arg(long)]
    seed: Option<u64>,

    /// Skip the serial warm-up reads.
    #[arg(long, default_value_t = false)]
    no_warm_up: bool,

    /// Dump the cache metrics in Prometheus text format after the run.
    #[arg(long, default_value_t = false)]
    metrics: bool,
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&humantime::format_duration(*duration))
}

type Catalog = ReadThrough<CatalogStub>;

/// Logs products leaving the cache.
#[derive(Debug)]
struct LeaveLogger;

impl EventListener for LeaveLogger {
    type Key = u64;
    type Value = ProductDetails;

    fn on_leave(&self, reason: Event, key: &u64, value: Option<&ProductDetails>) {
        tracing::debug!(?reason, product_id = key, materialized = value.is_some(), "[bench]: product left cache");
    }
}

fn init_logger() {
    use tracing_subscriber::{prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_line_number(true))
        .with(EnvFilter::from_default_env())
        .init();
}

fn middle(catalog: &Catalog, start: u64) -> u64 {
    start + catalog.list_keys().len() as u64 / 2
}

/// Serial reads covering hits, misses and evictions before the concurrent run.
fn warm_up(catalog: &Catalog, start: u64) {
    let mid = middle(catalog, start);
    let ids = [mid, mid + 1, mid + 2, mid + 3, mid + 5, mid, mid, mid + 4];

    let line = ids
        .iter()
        .map(|id| match catalog.fetch(id) {
            Ok(product) => product.product_id.to_string(),
            Err(e) => format!("<{e}>"),
        })
        .join(" ");
    println!("warm-up: {line}");
}

fn work(worker: usize, catalog: Catalog, args: &Args) -> anyhow::Result<WorkerReport> {
    let mut rng = match args.seed {
        Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(worker as u64)),
        None => SmallRng::from_os_rng(),
    };
    let mean = middle(&catalog, args.key_start) as f64;
    let normal = Normal::new(mean, args.deviation).context("invalid id distribution")?;

    let mut report = WorkerReport::new(worker)?;
    for _ in 0..args.fetches {
        let id = normal.sample(&mut rng).round().max(0.0) as u64;

        let now = Instant::now();
        let res = catalog.fetch(&id);
        report.record(now.elapsed())?;

        match res {
            Ok(product) => report.ids.push(product.product_id),
            Err(e) => {
                tracing::warn!(worker, product_id = id, "[bench]: get failed: {e}");
                report.errors += 1;
            }
        }
    }
    Ok(report)
}

fn main() -> anyhow::Result<()> {
    init_logger();

    #[cfg(feature = "deadlock")]
    {
        std::thread::spawn(move || loop {
            std::thread::sleep(Duration::from_secs(1));
            let deadlocks = parking_lot::deadlock::check_deadlock();
            if deadlocks.is_empty() {
                continue;
            }

            println!("{} deadlocks detected", deadlocks.len());
            for (i, threads) in deadlocks.iter().enumerate() {
                println!("Deadlock #{}", i);
                for t in threads {
                    println!("Thread Id {:#?}", t.thread_id());
                    println!("{:#?}", t.backtrace());
                }
            }
            panic!()
        });
    }

    let args = Args::parse();
    println!("{}", serde_json::to_string_pretty(&args)?);
    anyhow::ensure!(args.key_count > 0, "\"--key-count\" value must be greater than 0");

    let registry = PrometheusMetricsRegistry::new(Registry::new());

    let cache: Cache<u64, ProductDetails> = CacheBuilder::new(args.capacity)
        .with_name("catalog")
        .with_wait_timeout(args.wait_timeout)
        .with_event_listener(Arc::new(LeaveLogger))
        .with_metrics_registry(Box::new(registry.clone()))
        .build()?;
    let catalog = ReadThrough::new(
        cache,
        CatalogStub::new(args.key_start, args.key_count, args.latency),
    );

    if !args.no_warm_up {
        warm_up(&catalog, args.key_start);
    }

    let start = Instant::now();
    let handles = (0..args.workers)
        .map(|worker| {
            let catalog = catalog.clone();
            let args = args.clone();
            thread::Builder::new()
                .name(format!("atrium-bench-worker-{worker}"))
                .spawn(move || work(worker, catalog, &args))
        })
        .collect::<std::io::Result<Vec<_>>>()?;

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        let report = handle
            .join()
            .map_err(|_| anyhow::anyhow!("worker panicked"))??;
        println!(
            "worker {}: {}",
            report.worker,
            report.ids.iter().map(|id| id.to_string()).join(" ")
        );
        reports.push(report);
    }

    let summary = Summary::new(
        start.elapsed(),
        catalog.source().fetches(),
        catalog.cache().len(),
        &reports,
    )?;
    println!("\nTotal:\n{summary}");

    if args.metrics {
        let text = TextEncoder::new().encode_to_string(&registry.registry().gather())?;
        println!("{text}");
    }

    Ok(())
}
