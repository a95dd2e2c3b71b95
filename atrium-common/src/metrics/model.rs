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

use std::borrow::Cow;

use super::{registry::noop::NoopMetricsRegistry, BoxedCounter, BoxedGauge, BoxedHistogram, Boxer, RegistryOps};
use crate::error::Result;

/// Metrics of a read-through cache instance.
#[derive(Debug)]
pub struct Metrics {
    /// Lookups served by a resident item, materialized or in flight.
    pub memory_hit: BoxedCounter,
    /// Lookups that created a new item.
    pub memory_miss: BoxedCounter,
    /// Lookups that attached to another caller's in-flight fetch.
    pub memory_coalesce: BoxedCounter,
    /// Items evicted to keep the cache within capacity.
    pub memory_evict: BoxedCounter,
    /// Failed items replaced by a fresh fetch attempt.
    pub memory_replace: BoxedCounter,
    /// Fetches issued against the backing source.
    pub memory_fetch: BoxedCounter,
    /// Fetches that returned an error.
    pub memory_fetch_error: BoxedCounter,
    /// Waits that gave up before the in-flight fetch completed.
    pub memory_timeout: BoxedCounter,

    /// Resident item count.
    pub memory_usage: BoxedGauge,

    /// Duration of backing source fetches, in seconds.
    pub memory_fetch_duration: BoxedHistogram,
    /// Duration of waits on in-flight fetches, in seconds.
    pub memory_wait_duration: BoxedHistogram,
}

impl Metrics {
    /// Create a new metric with the given name.
    ///
    /// Caches sharing a registry share the metric families and are told apart by the `name` label.
    pub fn new(name: impl Into<Cow<'static, str>>, registry: &dyn RegistryOps) -> Result<Self> {
        let name: Cow<'static, str> = name.into();

        let atrium_memory_op_total = registry.register_counter_vec(
            "atrium_memory_op_total".into(),
            "atrium read-through cache operations".into(),
            &["name", "op"],
        )?;
        let atrium_memory_usage = registry.register_gauge_vec(
            "atrium_memory_usage".into(),
            "atrium read-through cache resident items".into(),
            &["name"],
        )?;
        let atrium_memory_op_duration = registry.register_histogram_vec(
            "atrium_memory_op_duration".into(),
            "atrium read-through cache op durations".into(),
            &["name", "op"],
        )?;

        let memory_hit = atrium_memory_op_total.counter(&[name.clone(), "hit".into()])?;
        let memory_miss = atrium_memory_op_total.counter(&[name.clone(), "miss".into()])?;
        let memory_coalesce = atrium_memory_op_total.counter(&[name.clone(), "coalesce".into()])?;
        let memory_evict = atrium_memory_op_total.counter(&[name.clone(), "evict".into()])?;
        let memory_replace = atrium_memory_op_total.counter(&[name.clone(), "replace".into()])?;
        let memory_fetch = atrium_memory_op_total.counter(&[name.clone(), "fetch".into()])?;
        let memory_fetch_error = atrium_memory_op_total.counter(&[name.clone(), "fetch_error".into()])?;
        let memory_timeout = atrium_memory_op_total.counter(&[name.clone(), "timeout".into()])?;

        let memory_usage = atrium_memory_usage.gauge(&[name.clone()])?;

        let memory_fetch_duration = atrium_memory_op_duration.histogram(&[name.clone(), "fetch".into()])?;
        let memory_wait_duration = atrium_memory_op_duration.histogram(&[name, "wait".into()])?;

        Ok(Self {
            memory_hit,
            memory_miss,
            memory_coalesce,
            memory_evict,
            memory_replace,
            memory_fetch,
            memory_fetch_error,
            memory_timeout,
            memory_usage,
            memory_fetch_duration,
            memory_wait_duration,
        })
    }

    /// Build noop metrics.
    ///
    /// Note: `noop` is only supposed to be called by other atrium components.
    #[doc(hidden)]
    pub fn noop() -> Self {
        Self {
            memory_hit: NoopMetricsRegistry.boxed(),
            memory_miss: NoopMetricsRegistry.boxed(),
            memory_coalesce: NoopMetricsRegistry.boxed(),
            memory_evict: NoopMetricsRegistry.boxed(),
            memory_replace: NoopMetricsRegistry.boxed(),
            memory_fetch: NoopMetricsRegistry.boxed(),
            memory_fetch_error: NoopMetricsRegistry.boxed(),
            memory_timeout: NoopMetricsRegistry.boxed(),
            memory_usage: NoopMetricsRegistry.boxed(),
            memory_fetch_duration: NoopMetricsRegistry.boxed(),
            memory_wait_duration: NoopMetricsRegistry.boxed(),
        }
    }
}
