//! Tensor activation workload
//!
//! Applies ReLU, a partial softmax and batch normalization to preallocated
//! tensors of several common shapes.

use rand::rngs::SmallRng;
use rand::Rng;

use super::{record_failure, EngineError, WorkloadEngine};
use crate::models::{EngineKind, StatsRecorder};

/// Default tensor shapes as (batch, height, width)
pub const DEFAULT_SHAPES: [(usize, usize, usize); 5] = [
    (1, 512, 512),
    (1, 1024, 1024),
    (3, 224, 224),
    (1, 256, 256),
    (4, 128, 128),
];

/// Elements covered by the softmax pass
const SOFTMAX_SPAN: usize = 1000;
const NORM_EPSILON: f32 = 1e-5;

struct TensorPair {
    input: Vec<f32>,
    output: Vec<f32>,
}

pub struct ArrayMathEngine {
    rng: SmallRng,
    tensors: Vec<TensorPair>,
}

impl ArrayMathEngine {
    pub fn new(rng: SmallRng) -> Self {
        Self::with_shapes(rng, &DEFAULT_SHAPES)
    }

    /// Preallocate one input/output pair per shape, inputs in [-1, 1]
    pub fn with_shapes(mut rng: SmallRng, shapes: &[(usize, usize, usize)]) -> Self {
        let tensors = shapes
            .iter()
            .map(|&(batch, height, width)| {
                let len = batch * height * width;
                let input = (0..len).map(|_| rng.gen_range(-1.0f32..=1.0)).collect();
                TensorPair {
                    input,
                    output: vec![0.0; len],
                }
            })
            .collect();
        Self { rng, tensors }
    }

    fn run_unit(&mut self) -> Result<(), EngineError> {
        if self.tensors.is_empty() {
            return Err(EngineError::ResourceUnavailable("no tensors allocated".to_string()));
        }
        let idx = self.rng.gen_range(0..self.tensors.len());
        let TensorPair { input, output } = &mut self.tensors[idx];
        if input.is_empty() || input.len() != output.len() {
            return Err(EngineError::ResourceUnavailable(format!(
                "tensor {} has mismatched shape",
                idx
            )));
        }

        relu(input, output);
        softmax_prefix(output, SOFTMAX_SPAN)?;
        batch_normalize(output)
    }
}

impl WorkloadEngine for ArrayMathEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::ArrayMath
    }

    fn run_operations(&mut self, iterations: u32, stats: &mut StatsRecorder<'_>) {
        for _ in 0..iterations {
            match self.run_unit() {
                Ok(()) => stats.record_operations(1),
                Err(err) => record_failure(stats, &err),
            }
        }
    }
}

fn relu(input: &[f32], output: &mut [f32]) {
    for (out, &value) in output.iter_mut().zip(input) {
        *out = value.max(0.0);
    }
}

fn softmax_prefix(values: &mut [f32], span: usize) -> Result<(), EngineError> {
    let end = span.min(values.len());
    let prefix = &mut values[..end];
    let sum: f32 = prefix.iter().map(|v| v.exp()).sum();
    if !sum.is_finite() || sum <= 0.0 {
        return Err(EngineError::NonFinite("softmax"));
    }
    for value in prefix.iter_mut() {
        *value = value.exp() / sum;
    }
    Ok(())
}

fn batch_normalize(values: &mut [f32]) -> Result<(), EngineError> {
    let count = values.len() as f32;
    let mean = values.iter().sum::<f32>() / count;
    let mean_square = values.iter().map(|v| v * v).sum::<f32>() / count;
    let stddev = (mean_square - mean * mean + NORM_EPSILON).max(NORM_EPSILON).sqrt();
    if !stddev.is_finite() {
        return Err(EngineError::NonFinite("batch normalization"));
    }
    let inv = 1.0 / stddev;
    for value in values.iter_mut() {
        *value = (*value - mean) * inv;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::clock::ManualClock;
    use crate::models::Statistics;
    use rand::SeedableRng;
    use std::sync::Arc;

    #[test]
    fn test_counts_one_operation_per_unit() {
        let mut engine =
            ArrayMathEngine::with_shapes(SmallRng::seed_from_u64(3), &[(1, 16, 16), (2, 8, 8)]);
        let mut stats = Statistics::new(Arc::new(ManualClock::new()));
        engine.run_operations(15, &mut stats.recorder(EngineKind::ArrayMath));
        assert_eq!(stats.operations(EngineKind::ArrayMath), 15);
        assert!(stats.errors().is_empty());
    }

    #[test]
    fn test_missing_tensors_are_logged_not_fatal() {
        let mut engine = ArrayMathEngine::with_shapes(SmallRng::seed_from_u64(3), &[]);
        let mut stats = Statistics::new(Arc::new(ManualClock::new()));
        engine.run_operations(3, &mut stats.recorder(EngineKind::ArrayMath));
        assert_eq!(stats.operations(EngineKind::ArrayMath), 0);
        assert_eq!(stats.errors().len(), 3);
        assert!(stats.errors()[0].starts_with("CoreML error:"));
    }

    #[test]
    fn test_softmax_covers_only_prefix() {
        let mut values = vec![0.0; 6];
        softmax_prefix(&mut values, 4).unwrap();
        assert!(values[..4].iter().all(|v| (v - 0.25).abs() < 1e-6));
        assert_eq!(&values[4..], &[0.0, 0.0]);

        let mut short = vec![1.0, 1.0];
        softmax_prefix(&mut short, SOFTMAX_SPAN).unwrap();
        assert_eq!(short, vec![0.5, 0.5]);
    }

    #[test]
    fn test_batch_normalize_centers_values() {
        let mut values = vec![1.0, 2.0, 3.0, 4.0];
        batch_normalize(&mut values).unwrap();
        let mean: f32 = values.iter().sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-5);
    }
}
