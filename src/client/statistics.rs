//! Single-pass latency statistics and their pooling across workers

use crate::client::constants::*;
use crate::client::error::{ClientError, Result};
use hdrhistogram::Histogram;
use tracing::{debug, warn};

/// Running mean and sum of squared deviations of one worker's samples.
///
/// Updated with Welford's single-pass algorithm, so no raw samples are kept.
/// All fields are zero until the first sample arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WorkerResult {
    pub n: u64,
    pub mean: f64,
    /// Sum of squared deviations from the mean (`S`); variance is `S / n`
    pub sum_sq_dev: f64,
}

impl WorkerResult {
    pub fn from_samples(samples: &[f64]) -> Self {
        let mut result = Self::default();
        for &x in samples {
            result.push(x);
        }
        result
    }

    /// Fold one sample into the running statistics
    pub fn push(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.sum_sq_dev += (x - self.mean) * delta;
    }

    /// Population standard deviation, zero for an empty result
    pub fn stddev(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            (self.sum_sq_dev / self.n as f64).sqrt()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }
}

/// Statistics pooled over every worker of every generation so far.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PooledStats {
    pub n: u64,
    pub mean: f64,
    pub stddev: f64,
}

impl PooledStats {
    /// Pool worker results in slice order
    pub fn from_results(results: &[WorkerResult]) -> Self {
        let mut pooled = Self::default();
        for result in results {
            pooled.absorb(result);
        }
        pooled
    }

    /// Combine another partition into this one.
    ///
    /// The `delta² · n₁ · n₂ / n` term accounts for the distance between the
    /// two partition means, so the pooled stddev equals the single-pass value
    /// over the union of both sample sets. An empty result is ignored.
    pub fn absorb(&mut self, other: &WorkerResult) {
        if other.n == 0 {
            return;
        }

        let n1 = self.n as f64;
        let n2 = other.n as f64;
        let n = n1 + n2;
        let delta = other.mean - self.mean;

        let mean = (n1 * self.mean + n2 * other.mean) / n;
        let sum_sq_dev = self.sum_sq_dev() + other.sum_sq_dev + delta * delta * n1 * n2 / n;

        self.mean = mean;
        self.stddev = (sum_sq_dev / n).sqrt();
        self.n += other.n;
    }

    pub fn sum_sq_dev(&self) -> f64 {
        self.stddev * self.stddev * self.n as f64
    }

    /// Half-width of the confidence interval around the mean for critical value `z`
    pub fn half_width(&self, z: f64) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            z * self.stddev / (self.n as f64).sqrt()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }
}

/// Latency distribution backed by an HDR histogram, kept alongside the
/// running statistics for percentile reporting.
#[derive(Debug, Clone)]
pub struct LatencyDistribution {
    hist: Histogram<u64>,
    real_min: u64,
    real_max: u64,
    clamped_count: u64,
}

impl LatencyDistribution {
    pub fn new() -> Result<Self> {
        let hist = Histogram::<u64>::new_with_bounds(
            HISTOGRAM_LOW_BOUND_NS,
            HISTOGRAM_HIGH_BOUND_NS,
            HISTOGRAM_SIGNIFICANT_DIGITS,
        )
        .map_err(|e| ClientError::Measurement(format!("Failed to create histogram: {}", e)))?;

        Ok(Self {
            hist,
            real_min: u64::MAX,
            real_max: 0,
            clamped_count: 0,
        })
    }

    /// Record one latency, clamped into the histogram bounds
    pub fn record(&mut self, latency_ns: u64) {
        self.real_min = self.real_min.min(latency_ns);
        self.real_max = self.real_max.max(latency_ns);

        let clamped = latency_ns.clamp(HISTOGRAM_LOW_BOUND_NS, HISTOGRAM_HIGH_BOUND_NS);
        if clamped != latency_ns {
            self.clamped_count += 1;
        }
        self.hist.saturating_record(clamped);
    }

    /// Merge another worker's distribution into this one
    pub fn merge(&mut self, other: &LatencyDistribution) -> Result<()> {
        self.hist.add(&other.hist).map_err(|e| {
            warn!(error = %e, "Failed to merge latency histograms");
            ClientError::Measurement(format!("Failed to merge histograms: {}", e))
        })?;
        self.real_min = self.real_min.min(other.real_min);
        self.real_max = self.real_max.max(other.real_max);
        self.clamped_count += other.clamped_count;
        debug!(count = self.count(), "Latency histograms merged");
        Ok(())
    }

    /// Minimum latency (unclamped), zero when empty
    pub fn min(&self) -> u64 {
        if self.count() == 0 {
            0
        } else {
            self.real_min
        }
    }

    /// Maximum latency (unclamped)
    pub fn max(&self) -> u64 {
        self.real_max
    }

    pub fn percentile(&self, quantile: f64) -> u64 {
        self.hist.value_at_quantile(quantile)
    }

    pub fn clamped_count(&self) -> u64 {
        self.clamped_count
    }

    pub fn count(&self) -> u64 {
        self.hist.len()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-6 * (1.0 + a.abs().max(b.abs()))
    }

    proptest! {
        #[test]
        fn test_single_pass_matches_two_pass(
            samples in prop::collection::vec(0.0f64..1e7, 1..200)
        ) {
            let result = WorkerResult::from_samples(&samples);
            let n = samples.len() as f64;
            let mean = samples.iter().sum::<f64>() / n;
            let s = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>();

            prop_assert_eq!(result.n, samples.len() as u64);
            prop_assert!(close(result.mean, mean));
            prop_assert!(close(result.sum_sq_dev, s));
        }

        #[test]
        fn test_pooling_partitions_matches_union(
            samples in prop::collection::vec(0.0f64..1e7, 2..200),
            split in 0usize..200,
            offset in 0.0f64..1e6,
        ) {
            let split = split % samples.len();
            let mut left = samples[..split].to_vec();
            let right = samples[split..].to_vec();
            // shift one partition so the means differ
            for x in &mut left {
                *x += offset;
            }
            let union: Vec<f64> = left.iter().chain(right.iter()).copied().collect();

            let pooled = PooledStats::from_results(&[
                WorkerResult::from_samples(&left),
                WorkerResult::from_samples(&right),
            ]);
            let direct = PooledStats::from_results(&[WorkerResult::from_samples(&union)]);

            prop_assert_eq!(pooled.n, direct.n);
            prop_assert!(close(pooled.mean, direct.mean));
            prop_assert!(close(pooled.stddev, direct.stddev));
        }
    }
}
