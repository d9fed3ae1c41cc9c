//! Fixed-capacity running average

use quai_dash_core::RUNNING_AVERAGE_CAPACITY;
use std::collections::VecDeque;

/// Arithmetic mean of the most recent samples
#[derive(Debug, Clone)]
pub struct RunningAverage {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RunningAverage {
    pub fn new() -> Self {
        Self::with_capacity(RUNNING_AVERAGE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a sample, evicting the oldest when full; non-finite samples are ignored
    pub fn push(&mut self, sample: f64) {
        if !sample.is_finite() {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Mean of the held samples, `None` when empty
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().sum();
        Some(sum / self.samples.len() as f64)
    }
}

impl Default for RunningAverage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_average_is_unknown() {
        assert_eq!(RunningAverage::new().mean(), None);
    }

    #[test]
    fn test_evicts_oldest_sample() {
        let mut avg = RunningAverage::with_capacity(3);
        for sample in [1.0, 2.0, 3.0] {
            avg.push(sample);
        }
        assert_eq!(avg.mean(), Some(2.0));

        avg.push(10.0);
        assert_eq!(avg.samples.len(), 3);
        assert_eq!(avg.mean(), Some(5.0));
    }

    #[test]
    fn test_default_capacity_is_sixty() {
        let mut avg = RunningAverage::new();
        for i in 0..100 {
            avg.push(i as f64);
        }
        assert_eq!(avg.samples.len(), 60);
        // Samples 40..=99
        assert_eq!(avg.mean(), Some(69.5));
    }

    #[test]
    fn test_ignores_nan() {
        let mut avg = RunningAverage::with_capacity(4);
        avg.push(4.0);
        avg.push(f64::NAN);
        assert_eq!(avg.mean(), Some(4.0));
    }
}
