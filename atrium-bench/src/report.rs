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

use std::{fmt::Display, time::Duration};

use hdrhistogram::Histogram;

/// What one worker observed.
#[derive(Debug)]
pub struct WorkerReport {
    pub worker: usize,
    pub ids: Vec<u64>,
    pub errors: usize,
    /// Latency of every get, in microseconds.
    pub latency: Histogram<u64>,
}

impl WorkerReport {
    pub fn new(worker: usize) -> anyhow::Result<Self> {
        Ok(Self {
            worker,
            ids: vec![],
            errors: 0,
            latency: new_histogram()?,
        })
    }

    pub fn record(&mut self, elapsed: Duration) -> anyhow::Result<()> {
        self.latency.record(elapsed.as_micros().max(1) as u64)?;
        Ok(())
    }
}

/// Aggregated result of a run.
#[derive(Debug)]
pub struct Summary {
    pub elapsed: Duration,
    pub gets: u64,
    pub errors: usize,
    pub fetches: usize,
    pub resident: usize,
    pub latency: Histogram<u64>,
}

impl Summary {
    pub fn new(elapsed: Duration, fetches: usize, resident: usize, reports: &[WorkerReport]) -> anyhow::Result<Self> {
        let mut latency = new_histogram()?;
        for report in reports {
            latency.add(&report.latency)?;
        }
        Ok(Self {
            elapsed,
            gets: latency.len(),
            errors: reports.iter().map(|r| r.errors).sum(),
            fetches,
            resident,
            latency,
        })
    }
}

fn new_histogram() -> anyhow::Result<Histogram<u64>> {
    // 1us ..= 1h, 3 significant figures.
    Ok(Histogram::new_with_bounds(1, 60 * 60 * 1_000_000, 3)?)
}

fn micros(us: u64) -> humantime::FormattedDuration {
    humantime::format_duration(Duration::from_micros(us))
}

impl Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let saved = self.gets.saturating_sub(self.fetches as u64);
        let ratio = if self.gets == 0 {
            0.0
        } else {
            saved as f64 / self.gets as f64 * 100.0
        };

        writeln!(f, "elapsed:  {}", humantime::format_duration(self.elapsed))?;
        writeln!(f, "gets:     {}", self.gets)?;
        writeln!(f, "errors:   {}", self.errors)?;
        writeln!(f, "fetches:  {} ({saved} gets served without a fetch, {ratio:.1}%)", self.fetches)?;
        writeln!(f, "resident: {}", self.resident)?;
        writeln!(
            f,
            "latency:  p50 {}, p90 {}, p99 {}, max {}",
            micros(self.latency.value_at_quantile(0.5)),
            micros(self.latency.value_at_quantile(0.9)),
            micros(self.latency.value_at_quantile(0.99)),
            micros(self.latency.max()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        let mut r1 = WorkerReport::new(0).unwrap();
        let mut r2 = WorkerReport::new(1).unwrap();
        for ms in [1, 2, 3] {
            r1.record(Duration::from_millis(ms)).unwrap();
        }
        r2.record(Duration::from_millis(150)).unwrap();
        r2.errors = 1;

        let summary = Summary::new(Duration::from_secs(1), 2, 2, &[r1, r2]).unwrap();
        assert_eq!(summary.gets, 4);
        assert_eq!(summary.errors, 1);
        assert!(summary.latency.max() >= 149_000);

        let text = summary.to_string();
        assert!(text.contains("gets:     4"));
        assert!(text.contains("2 gets served without a fetch, 50.0%"));
    }
}
