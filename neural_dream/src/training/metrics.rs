//! Training metrics and output types.

use std::collections::{BTreeMap, VecDeque};

use burn::prelude::*;
use burn::tensor::ElementConversion;

/// Output from a single training step.
#[derive(Debug, Clone)]
pub struct TrainOutput<B: Backend> {
    /// Total loss (scalar).
    pub loss: Tensor<B, 1>,
    /// Logged values by name (`train/loss_sds`, `train_params/lambda_sds`, ...).
    pub logs: BTreeMap<String, f32>,
}

impl<B: Backend> TrainOutput<B> {
    /// Create a new training output.
    pub fn new(loss: Tensor<B, 1>, logs: BTreeMap<String, f32>) -> Self {
        Self { loss, logs }
    }

    /// Get the loss as a scalar value.
    pub fn loss_value(&self) -> f32 {
        self.loss.clone().into_scalar().elem()
    }

    /// A logged value.
    pub fn get(&self, name: &str) -> Option<f32> {
        self.logs.get(name).copied()
    }
}

/// Running average tracker for logged values.
#[derive(Debug, Clone)]
pub struct MetricsTracker {
    /// Window size for running average.
    window_size: usize,
    /// Recent values per name.
    windows: BTreeMap<String, VecDeque<f32>>,
    /// Total steps.
    total_steps: usize,
}

impl MetricsTracker {
    /// Create a new metrics tracker.
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            windows: BTreeMap::new(),
            total_steps: 0,
        }
    }

    /// Add the logs of a training step.
    pub fn add(&mut self, logs: &BTreeMap<String, f32>) {
        for (name, &value) in logs {
            let window = self.windows.entry(name.clone()).or_default();
            if window.len() >= self.window_size {
                window.pop_front();
            }
            window.push_back(value);
        }
        self.total_steps += 1;
    }

    /// Average of each value over the window.
    pub fn averages(&self) -> BTreeMap<String, f32> {
        self.windows
            .iter()
            .filter(|(_, window)| !window.is_empty())
            .map(|(name, window)| (name.clone(), window.iter().sum::<f32>() / window.len() as f32))
            .collect()
    }

    /// Get total number of steps.
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Log windowed averages of the `train/` values.
    pub fn log(&self, step: usize, max_steps: usize) {
        let summary = self
            .averages()
            .into_iter()
            .filter_map(|(name, value)| {
                name.strip_prefix("train/")
                    .map(|short| format!("{}={:.6}", short, value))
            })
            .collect::<Vec<_>>()
            .join(" ");
        log::info!("Step {}/{}: {}", step, max_steps, summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_loss_value() {
        let device = Default::default();
        let output = TrainOutput::<NdArray>::new(
            Tensor::from_data([0.25f32], &device),
            BTreeMap::from([("train/loss_sds".to_string(), 0.5)]),
        );
        assert!((output.loss_value() - 0.25).abs() < 1e-6);
        assert_eq!(output.get("train/loss_sds"), Some(0.5));
        assert_eq!(output.get("train/loss_shape"), None);
    }

    #[test]
    fn test_metrics_tracker() {
        let mut tracker = MetricsTracker::new(10);

        for i in 0..20 {
            let logs = BTreeMap::from([("train/loss_sds".to_string(), i as f32 * 0.1)]);
            tracker.add(&logs);
        }

        assert_eq!(tracker.total_steps(), 20);

        // Last 10 values: 1.0, 1.1, ..., 1.9
        let avg = tracker.averages();
        assert!((avg["train/loss_sds"] - 1.45).abs() < 1e-5);
    }

    #[test]
    fn test_terms_logged_on_some_steps() {
        let mut tracker = MetricsTracker::new(4);
        tracker.add(&BTreeMap::from([("train/loss_orient".to_string(), 2.0)]));
        tracker.add(&BTreeMap::from([("train/loss_sparsity".to_string(), 1.0)]));
        let avg = tracker.averages();
        assert_eq!(avg.len(), 2);
        assert_eq!(avg["train/loss_orient"], 2.0);
    }
}
