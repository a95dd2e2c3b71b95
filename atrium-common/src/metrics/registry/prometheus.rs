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

use std::{borrow::Cow, collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use prometheus::{
    core::Collector, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry,
};

use crate::{
    error::{Error, Result},
    metrics::{
        BoxedCounter, BoxedCounterVec, BoxedGauge, BoxedGaugeVec, BoxedHistogram, BoxedHistogramVec, Boxer, CounterOps,
        CounterVecOps, GaugeOps, GaugeVecOps, HistogramOps, HistogramVecOps, RegistryOps,
    },
};

#[derive(Debug, Clone)]
enum Family {
    Counter(IntCounterVec),
    Gauge(IntGaugeVec),
    Histogram(HistogramVec),
}

impl Family {
    fn collector(&self) -> Box<dyn Collector> {
        match self {
            Family::Counter(v) => Box::new(v.clone()),
            Family::Gauge(v) => Box::new(v.clone()),
            Family::Histogram(v) => Box::new(v.clone()),
        }
    }
}

fn label_values<'a>(labels: &'a [Cow<'static, str>]) -> Vec<&'a str> {
    labels.iter().map(Cow::as_ref).collect()
}

fn label_error(e: prometheus::Error, labels: &[Cow<'static, str>]) -> Error {
    Error::config("invalid metric labels")
        .with_context("labels", labels.join(","))
        .with_source(e)
}

impl CounterOps for IntCounter {
    fn increase(&self, val: u64) {
        self.inc_by(val);
    }
}

impl CounterVecOps for IntCounterVec {
    fn counter(&self, labels: &[Cow<'static, str>]) -> Result<BoxedCounter> {
        let counter = self
            .get_metric_with_label_values(&label_values(labels))
            .map_err(|e| label_error(e, labels))?;
        Ok(counter.boxed())
    }
}

impl GaugeOps for IntGauge {
    fn increase(&self, val: u64) {
        self.add(val as _);
    }

    fn decrease(&self, val: u64) {
        self.sub(val as _);
    }

    fn absolute(&self, val: u64) {
        self.set(val as _);
    }
}

impl GaugeVecOps for IntGaugeVec {
    fn gauge(&self, labels: &[Cow<'static, str>]) -> Result<BoxedGauge> {
        let gauge = self
            .get_metric_with_label_values(&label_values(labels))
            .map_err(|e| label_error(e, labels))?;
        Ok(gauge.boxed())
    }
}

impl HistogramOps for Histogram {
    fn record(&self, val: f64) {
        self.observe(val);
    }
}

impl HistogramVecOps for HistogramVec {
    fn histogram(&self, labels: &[Cow<'static, str>]) -> Result<BoxedHistogram> {
        let histogram = self
            .get_metric_with_label_values(&label_values(labels))
            .map_err(|e| label_error(e, labels))?;
        Ok(histogram.boxed())
    }
}

/// Metrics registry backed by a [`prometheus::Registry`].
///
/// Clones share the registered families, so one registry (and its clones) can serve several caches. Each metric
/// family is registered to the underlying [`Registry`] once. Wrapping the same [`Registry`] in two separately created
/// [`PrometheusMetricsRegistry`]s makes the second registration of a family fail.
#[derive(Debug, Clone)]
pub struct PrometheusMetricsRegistry {
    registry: Registry,
    families: Arc<Mutex<HashMap<Cow<'static, str>, Family>>>,
}

impl PrometheusMetricsRegistry {
    /// Create a Prometheus metrics registry.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            families: Arc::default(),
        }
    }

    /// Get the underlying Prometheus registry, e.g. to gather and encode its metric families.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn family(
        &self,
        name: Cow<'static, str>,
        create: impl FnOnce() -> prometheus::Result<Family>,
    ) -> Result<Family> {
        let mut families = self.families.lock();
        if let Some(family) = families.get(&name) {
            return Ok(family.clone());
        }

        let family = create()
            .and_then(|family| self.registry.register(family.collector()).map(|_| family))
            .map_err(|e| {
                Error::config("failed to register metric family")
                    .with_context("name", &name)
                    .with_source(e)
            })?;
        families.insert(name, family.clone());
        Ok(family)
    }
}

fn kind_mismatch(name: &str, expected: &'static str) -> Error {
    Error::config("metric family registered with another type")
        .with_context("name", name)
        .with_context("expected", expected)
}

impl RegistryOps for PrometheusMetricsRegistry {
    fn register_counter_vec(
        &self,
        name: Cow<'static, str>,
        desc: Cow<'static, str>,
        label_names: &'static [&'static str],
    ) -> Result<BoxedCounterVec> {
        let family = self.family(name.clone(), || {
            IntCounterVec::new(Opts::new(name.clone(), desc), label_names).map(Family::Counter)
        })?;
        match family {
            Family::Counter(v) => Ok(v.boxed()),
            _ => Err(kind_mismatch(&name, "counter")),
        }
    }

    fn register_gauge_vec(
        &self,
        name: Cow<'static, str>,
        desc: Cow<'static, str>,
        label_names: &'static [&'static str],
    ) -> Result<BoxedGaugeVec> {
        let family = self.family(name.clone(), || {
            IntGaugeVec::new(Opts::new(name.clone(), desc), label_names).map(Family::Gauge)
        })?;
        match family {
            Family::Gauge(v) => Ok(v.boxed()),
            _ => Err(kind_mismatch(&name, "gauge")),
        }
    }

    fn register_histogram_vec(
        &self,
        name: Cow<'static, str>,
        desc: Cow<'static, str>,
        label_names: &'static [&'static str],
    ) -> Result<BoxedHistogramVec> {
        let family = self.family(name.clone(), || {
            HistogramVec::new(HistogramOpts::new(name.clone(), desc), label_names).map(Family::Histogram)
        })?;
        match family {
            Family::Histogram(v) => Ok(v.boxed()),
            _ => Err(kind_mismatch(&name, "histogram")),
        }
    }
}
