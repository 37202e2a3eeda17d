//! Loss weights that vary with training progress.
//!
//! A weight is written in JSON either as a plain number (constant) or as a
//! ramp array:
//!
//! ```text
//! 0.5                      constant 0.5
//! [10.0, 1.0, 5000]        10.0 at step 0, 1.0 from step 5000 on
//! [1000, 0.0, 1.0, 2000]   0.0 until step 1000, 1.0 from step 2000 on
//! ```
//!
//! Step positions must be integer literals; `2000.0` is rejected.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Position of the training loop, passed to schedules each step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Current epoch.
    pub epoch: usize,
    /// Number of optimizer steps taken so far.
    pub global_step: usize,
}

impl Progress {
    /// Progress at a given step of the first epoch.
    pub fn at_step(global_step: usize) -> Self {
        Self {
            epoch: 0,
            global_step,
        }
    }
}

/// A loss weight, constant or linearly ramped over steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScheduleRepr", into = "ScheduleRepr")]
pub enum WeightSchedule {
    /// Same value at every step.
    Constant(f32),
    /// Linear interpolation between two steps, clamped outside them.
    Linear {
        /// Step at which the ramp starts.
        start_step: usize,
        /// Value before and at `start_step`.
        start_value: f32,
        /// Value at and after `end_step`.
        end_value: f32,
        /// Step at which the ramp ends.
        end_step: usize,
    },
}

impl WeightSchedule {
    /// Evaluate the weight at the given progress.
    pub fn evaluate(&self, progress: Progress) -> f32 {
        match *self {
            WeightSchedule::Constant(value) => value,
            WeightSchedule::Linear {
                start_step,
                start_value,
                end_value,
                end_step,
            } => {
                let step = progress.global_step;
                if end_step <= start_step {
                    return if step >= end_step { end_value } else { start_value };
                }
                let t = (step as f32 - start_step as f32) / (end_step - start_step) as f32;
                start_value + (end_value - start_value) * t.clamp(0.0, 1.0)
            }
        }
    }
}

impl From<f32> for WeightSchedule {
    fn from(value: f32) -> Self {
        WeightSchedule::Constant(value)
    }
}

impl From<f64> for WeightSchedule {
    fn from(value: f64) -> Self {
        WeightSchedule::Constant(value as f32)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ScheduleRepr {
    Constant(f32),
    Ramp(Vec<RampEntry>),
}

/// One ramp array element. Integer literals stay distinct from float
/// literals so `10` and `10.0` can be told apart as step positions.
#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum RampEntry {
    Int(u64),
    Float(f64),
}

impl RampEntry {
    fn value(self) -> f32 {
        match self {
            RampEntry::Int(v) => v as f32,
            RampEntry::Float(v) => v as f32,
        }
    }

    fn step(self) -> Result<usize, String> {
        match self {
            RampEntry::Int(v) => usize::try_from(v).map_err(|_| format!("schedule step {v} is out of range")),
            // Float positions would mean epochs; only step ramps are supported.
            RampEntry::Float(v) => Err(format!(
                "schedule step must be an integer literal, got {v:?}"
            )),
        }
    }
}

impl TryFrom<ScheduleRepr> for WeightSchedule {
    type Error = String;

    fn try_from(repr: ScheduleRepr) -> Result<Self, Self::Error> {
        match repr {
            ScheduleRepr::Constant(value) => Ok(WeightSchedule::Constant(value)),
            ScheduleRepr::Ramp(values) => match values.as_slice() {
                &[start_value, end_value, end_step] => Ok(WeightSchedule::Linear {
                    start_step: 0,
                    start_value: start_value.value(),
                    end_value: end_value.value(),
                    end_step: end_step.step()?,
                }),
                &[start_step, start_value, end_value, end_step] => Ok(WeightSchedule::Linear {
                    start_step: start_step.step()?,
                    start_value: start_value.value(),
                    end_value: end_value.value(),
                    end_step: end_step.step()?,
                }),
                other => Err(format!(
                    "schedule array must have 3 or 4 elements, got {}",
                    other.len()
                )),
            },
        }
    }
}

impl From<WeightSchedule> for ScheduleRepr {
    fn from(schedule: WeightSchedule) -> Self {
        match schedule {
            WeightSchedule::Constant(value) => ScheduleRepr::Constant(value),
            WeightSchedule::Linear {
                start_step,
                start_value,
                end_value,
                end_step,
            } => ScheduleRepr::Ramp(vec![
                RampEntry::Int(start_step as u64),
                RampEntry::Float(start_value as f64),
                RampEntry::Float(end_value as f64),
                RampEntry::Int(end_step as u64),
            ]),
        }
    }
}

/// Named loss weights, keyed `lambda_<term>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LossWeights(BTreeMap<String, WeightSchedule>);

impl LossWeights {
    /// Empty weight map; every term evaluates to zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// The weights of a coarse latent-space run.
    pub fn latent_nerf() -> Self {
        Self::new()
            .with("lambda_sds", 1.0)
            .with("lambda_orient", 0.0)
            .with("lambda_sparsity", 0.0)
            .with("lambda_opaque", 0.0)
            .with("lambda_shape", 0.0)
    }

    /// Set a weight, returning the updated map.
    pub fn with(mut self, name: &str, schedule: impl Into<WeightSchedule>) -> Self {
        self.0.insert(name.to_string(), schedule.into());
        self
    }

    /// Set a weight in place.
    pub fn set(&mut self, name: &str, schedule: impl Into<WeightSchedule>) {
        self.0.insert(name.to_string(), schedule.into());
    }

    /// Look up a weight.
    pub fn get(&self, name: &str) -> Option<&WeightSchedule> {
        self.0.get(name)
    }

    /// Current value of a weight; absent terms are zero.
    pub fn value(&self, name: &str, progress: Progress) -> f32 {
        self.0
            .get(name)
            .map(|schedule| schedule.evaluate(progress))
            .unwrap_or(0.0)
    }

    /// All configured weights in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &WeightSchedule)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> WeightSchedule {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_constant() {
        let s = parse("0.25");
        assert_eq!(s, WeightSchedule::Constant(0.25));
        assert_eq!(s.evaluate(Progress::at_step(0)), 0.25);
        assert_eq!(s.evaluate(Progress::at_step(100_000)), 0.25);
    }

    #[test]
    fn test_three_element_ramp() {
        let s = parse("[10.0, 0.0, 100]");
        assert_eq!(s.evaluate(Progress::at_step(0)), 10.0);
        assert!((s.evaluate(Progress::at_step(50)) - 5.0).abs() < 1e-6);
        assert_eq!(s.evaluate(Progress::at_step(100)), 0.0);
        assert_eq!(s.evaluate(Progress::at_step(500)), 0.0);
    }

    #[test]
    fn test_four_element_ramp_clamps() {
        let s = parse("[100, 0.0, 1.0, 200]");
        assert_eq!(s.evaluate(Progress::at_step(0)), 0.0);
        assert_eq!(s.evaluate(Progress::at_step(100)), 0.0);
        assert!((s.evaluate(Progress::at_step(150)) - 0.5).abs() < 1e-6);
        assert_eq!(s.evaluate(Progress::at_step(300)), 1.0);
    }

    #[test]
    fn test_step_function_when_steps_coincide() {
        let s = parse("[50, 0.0, 2.0, 50]");
        assert_eq!(s.evaluate(Progress::at_step(49)), 0.0);
        assert_eq!(s.evaluate(Progress::at_step(50)), 2.0);
    }

    #[test]
    fn test_rejects_bad_arrays() {
        assert!(serde_json::from_str::<WeightSchedule>("[1.0, 2.0]").is_err());
        assert!(serde_json::from_str::<WeightSchedule>("[1.0, 2.0, 10.5]").is_err());
        assert!(serde_json::from_str::<WeightSchedule>("[-1, 0.0, 1.0, 10]").is_err());
    }

    #[test]
    fn test_float_step_positions_rejected() {
        assert!(serde_json::from_str::<WeightSchedule>("[1.0, 0.0, 10.0]").is_err());
        assert!(serde_json::from_str::<WeightSchedule>("[0.0, 0.0, 1.0, 10]").is_err());
        let s = parse("[0, 0, 1, 10]");
        assert!((s.evaluate(Progress::at_step(5)) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_loss_weights_json() {
        let weights: LossWeights =
            serde_json::from_str(r#"{"lambda_sds": 1.0, "lambda_sparsity": [0, 0.0, 1.0, 10]}"#)
                .unwrap();
        let p = Progress::at_step(5);
        assert_eq!(weights.value("lambda_sds", p), 1.0);
        assert!((weights.value("lambda_sparsity", p) - 0.5).abs() < 1e-6);
        assert_eq!(weights.value("lambda_missing", p), 0.0);

        let json = serde_json::to_string(&weights).unwrap();
        let back: LossWeights = serde_json::from_str(&json).unwrap();
        assert_eq!(back, weights);
    }
}
