use hdrhistogram::Histogram;
use serde::Serialize;

/// Latency breakdown (μs) over every profiled request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PercentileSet {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub count: u64,
}

impl PercentileSet {
    /// Zeroed when the histogram is empty.
    pub fn from_histogram(hist: &Histogram<u64>) -> Self {
        if hist.len() == 0 {
            return Self::default();
        }

        Self {
            min: hist.min(),
            max: hist.max(),
            mean: hist.mean(),
            p50: hist.value_at_percentile(50.0),
            p95: hist.value_at_percentile(95.0),
            p99: hist.value_at_percentile(99.0),
            count: hist.len(),
        }
    }

    pub fn has_data(&self) -> bool {
        self.count > 0
    }
}
