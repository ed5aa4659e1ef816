//! Online (streaming) scalar statistics using Welford's algorithm.

/// Running mean and variance of a scalar stream.
///
/// # Example
///
/// ```
/// use tripoli_core::statistics::OnlineStats;
///
/// let mut stats = OnlineStats::new();
/// for x in [99.0, 101.0, 100.0] {
///     stats.update(x);
/// }
/// assert!((stats.mean() - 100.0).abs() < 1e-12);
/// assert!((stats.variance() - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Default)]
pub struct OnlineStats {
    count: usize,
    mean: f64,
    /// Sum of squared deviations from the current mean.
    m2: f64,
}

impl OnlineStats {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one value.
    pub fn update(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    /// Number of values seen.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Current mean (0 if empty).
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance with `n − 1` denominator (0 if fewer than two values).
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// Snapshot of the current estimates.
    pub fn finalize(&self) -> StatsSnapshot {
        StatsSnapshot {
            mean: self.mean,
            variance: self.variance(),
            count: self.count,
        }
    }
}

/// Mean and variance at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    /// Sample mean.
    pub mean: f64,
    /// Sample variance (n − 1 denominator).
    pub variance: f64,
    /// Number of values.
    pub count: usize,
}

impl StatsSnapshot {
    /// Standard deviation.
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_online_stats_basic() {
        let mut stats = OnlineStats::new();
        for x in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.update(x);
        }
        let snapshot = stats.finalize();
        assert!((snapshot.mean - 3.0).abs() < 1e-10);
        assert!((snapshot.variance - 2.5).abs() < 1e-10);
        assert_eq!(snapshot.count, 5);
    }

    #[test]
    fn test_single_value_has_zero_variance() {
        let mut stats = OnlineStats::new();
        stats.update(42.0);
        assert_eq!(stats.variance(), 0.0);
        assert_eq!(stats.finalize().std_dev(), 0.0);
    }

    #[test]
    fn test_large_offset_is_stable() {
        let mut stats = OnlineStats::new();
        for x in [1e9 + 4.0, 1e9 + 7.0, 1e9 + 13.0, 1e9 + 16.0] {
            stats.update(x);
        }
        assert!((stats.variance() - 30.0).abs() < 1e-6);
    }
}
