//! RMSprop optimizer for scene parameters.
//!
//! Every trainable tensor gets its own [`RmsPropState`]; [`SceneOptimizer`]
//! keeps them keyed by dotted parameter name.

use std::collections::BTreeMap;

use burn::config::Config;
use burn::prelude::*;
use burn::tensor::ElementConversion;

/// RMSprop hyperparameters shared by every scene parameter.
#[derive(Config, Debug)]
pub struct OptimizerConfig {
    /// Step size.
    #[config(default = 1e-3)]
    pub learning_rate: f64,

    /// Decay of the squared-gradient average.
    #[config(default = 0.99)]
    pub alpha: f32,

    /// Added to the denominator.
    #[config(default = 1e-8)]
    pub epsilon: f32,

    /// L2 penalty folded into the gradient.
    #[config(default = 0.0)]
    pub weight_decay: f64,

    /// Maximum gradient L2 norm per tensor (0 disables clipping).
    #[config(default = 0.0)]
    pub gradient_clip: f32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizerConfig {
    /// Check the hyperparameter ranges.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.learning_rate > 0.0) {
            return Err(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if !(0.0..1.0).contains(&self.alpha) {
            return Err("alpha must be in [0, 1)".to_string());
        }
        if self.gradient_clip < 0.0 || self.weight_decay < 0.0 {
            return Err("gradient_clip and weight_decay must be non-negative".to_string());
        }
        Ok(())
    }
}

/// Running statistics of one parameter tensor.
#[derive(Debug, Clone)]
pub struct RmsPropState<B: Backend> {
    /// Decayed mean of `grad²`.
    mean_sq: Tensor<B, 2>,
    config: OptimizerConfig,
    steps: usize,
}

impl<B: Backend> RmsPropState<B> {
    /// Zeroed statistics for a tensor of `shape`.
    pub fn new(shape: [usize; 2], config: OptimizerConfig, device: &B::Device) -> Self {
        Self {
            mean_sq: Tensor::zeros(shape, device),
            config,
            steps: 0,
        }
    }

    /// Apply one update and return the new parameter value.
    pub fn step(&mut self, param: Tensor<B, 2>, grad: Tensor<B, 2>) -> Tensor<B, 2> {
        self.steps += 1;
        let config = &self.config;

        let mut grad = grad;
        if config.gradient_clip > 0.0 {
            grad = clip_grad_norm(grad, config.gradient_clip);
        }
        if config.weight_decay > 0.0 {
            grad = grad + param.clone() * config.weight_decay as f32;
        }

        let decay = config.alpha;
        self.mean_sq = self.mean_sq.clone() * decay + grad.clone().powf_scalar(2.0) * (1.0 - decay);

        let direction = grad / (self.mean_sq.clone().sqrt() + config.epsilon);
        param - direction * config.learning_rate as f32
    }

    /// Number of updates applied so far.
    pub fn current_step(&self) -> usize {
        self.steps
    }
}

/// Rescale `grad` so its L2 norm is at most `max_norm`.
fn clip_grad_norm<B: Backend>(grad: Tensor<B, 2>, max_norm: f32) -> Tensor<B, 2> {
    let norm: f32 = grad.clone().powf_scalar(2.0).sum().sqrt().into_scalar().elem();
    if norm > max_norm {
        grad * (max_norm / norm)
    } else {
        grad
    }
}

/// RMSprop states for every parameter of a scene, keyed by name.
///
/// States are created lazily on the first update of each parameter.
#[derive(Debug)]
pub struct SceneOptimizer<B: Backend> {
    config: OptimizerConfig,
    states: BTreeMap<String, RmsPropState<B>>,
}

impl<B: Backend> SceneOptimizer<B> {
    /// Create an optimizer with no states.
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config,
            states: BTreeMap::new(),
        }
    }

    /// Update one named parameter.
    pub fn step(&mut self, name: &str, param: Tensor<B, 2>, grad: Tensor<B, 2>) -> Tensor<B, 2> {
        let config = &self.config;
        let state = self.states.entry(name.to_string()).or_insert_with(|| {
            RmsPropState::new(param.dims(), config.clone(), &param.device())
        });
        state.step(param, grad)
    }

    /// Number of parameters with state.
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Optimizer configuration.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn values(t: Tensor<TestBackend, 2>) -> Vec<f32> {
        t.into_data().iter::<f32>().collect()
    }

    #[test]
    fn test_config_ranges() {
        let config = OptimizerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.clone().with_learning_rate(0.0).validate().is_err());
        assert!(config.clone().with_alpha(1.0).validate().is_err());
        assert!(config.with_weight_decay(-0.5).validate().is_err());
    }

    #[test]
    fn test_first_step_moves_against_gradient() {
        let device = Default::default();
        let config = OptimizerConfig::new().with_learning_rate(0.1);
        let mut state = RmsPropState::<TestBackend>::new([3, 2], config, &device);

        let updated = state.step(Tensor::zeros([3, 2], &device), Tensor::full([3, 2], 2.0, &device));

        // mean_sq = 0.01 * 4, so the normalized step is 2 / 0.2 = 10.
        assert!(values(updated).iter().all(|v| (v + 1.0).abs() < 1e-4));
        assert_eq!(state.current_step(), 1);
    }

    #[test]
    fn test_weight_decay_shrinks_toward_zero() {
        let device = Default::default();
        let config = OptimizerConfig::new().with_learning_rate(0.01).with_weight_decay(1.0);
        let mut state = RmsPropState::<TestBackend>::new([4, 2], config, &device);

        let mut param = Tensor::ones([4, 2], &device);
        for _ in 0..5 {
            param = state.step(param, Tensor::zeros([4, 2], &device));
        }
        assert!(values(param).iter().all(|v| v.is_finite() && *v < 1.0 && *v > 0.0));
    }

    #[test]
    fn test_clip_limits_norm() {
        let device = Default::default();
        let clipped = clip_grad_norm(Tensor::<TestBackend, 2>::full([4, 1], 3.0, &device), 2.0);
        let norm = values(clipped).iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 2.0).abs() < 1e-5);

        let small = clip_grad_norm(Tensor::<TestBackend, 2>::full([1, 1], 0.5, &device), 2.0);
        assert_eq!(values(small), vec![0.5]);
    }

    #[test]
    fn test_scene_optimizer_keeps_state_per_name() {
        let device = Default::default();
        let mut optimizer = SceneOptimizer::<TestBackend>::new(OptimizerConfig::new());
        let a = Tensor::zeros([2, 2], &device);
        let b = Tensor::zeros([3, 1], &device);
        optimizer.step("geometry.grid", a.clone(), a);
        optimizer.step("background.color", b.clone(), b.clone());
        optimizer.step("background.color", b.clone(), b);
        assert_eq!(optimizer.num_states(), 2);
    }
}
