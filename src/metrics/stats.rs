use std::time::Instant;

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;

use super::percentiles::PercentileSet;

// HdrHistogram range: 1 μs → 60 s, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

/// Thread-safe running totals over profiled requests.
/// The middleware calls `record()`, the panel calls `snapshot()`.
pub struct RequestStats {
    inner: Mutex<Inner>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsSnapshot {
    pub latency_us: PercentileSet,
    pub total_requests: u64,
    pub client_errors: u64,
    pub server_errors: u64,
    /// Collector slots that ended up `Failed`.
    pub collector_failures: u64,
    pub requests_per_sec: f64,
    pub elapsed_secs: f64,
}

struct Inner {
    latency: Histogram<u64>,
    total_requests: u64,
    client_errors: u64,
    server_errors: u64,
    collector_failures: u64,
    start_time: Option<Instant>,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
        }
    }

    pub fn record(&self, duration_us: u64, status: u16, collector_failures: usize) {
        self.inner.lock().record(duration_us, status, collector_failures);
    }

    /// Wipe everything, e.g. when the panel history is cleaned.
    pub fn reset(&self) {
        *self.inner.lock() = Inner::new();
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner.lock().snapshot()
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn new() -> Self {
        Self {
            latency: Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
                .expect("histogram creation"),
            total_requests: 0,
            client_errors: 0,
            server_errors: 0,
            collector_failures: 0,
            start_time: None,
        }
    }

    fn record(&mut self, duration_us: u64, status: u16, collector_failures: usize) {
        self.start_time.get_or_insert_with(Instant::now);

        self.total_requests += 1;
        match status {
            400..=499 => self.client_errors += 1,
            500..=599 => self.server_errors += 1,
            _ => {}
        }
        self.collector_failures += collector_failures as u64;

        // Clamp into the histogram range
        let _ = self.latency.record(duration_us.clamp(HIST_LOW, HIST_HIGH));
    }

    fn snapshot(&self) -> StatsSnapshot {
        let elapsed_secs = self
            .start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);

        let requests_per_sec = if elapsed_secs > 0.0 {
            self.total_requests as f64 / elapsed_secs
        } else {
            0.0
        };

        StatsSnapshot {
            latency_us: PercentileSet::from_histogram(&self.latency),
            total_requests: self.total_requests,
            client_errors: self.client_errors,
            server_errors: self.server_errors,
            collector_failures: self.collector_failures,
            requests_per_sec,
            elapsed_secs,
        }
    }
}
