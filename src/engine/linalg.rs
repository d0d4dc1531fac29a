//! Dense linear algebra workload
//!
//! Vector reductions, element-wise kernels and a square matrix multiply over
//! preallocated buffers.

use rand::rngs::SmallRng;
use rand::Rng;

use super::{record_failure, EngineError, WorkloadEngine};
use crate::models::{EngineKind, StatsRecorder};

/// Default matrix dimension; vectors hold `dim * dim` elements
pub const DEFAULT_DIM: usize = 256;

pub struct LinearAlgebraEngine {
    rng: SmallRng,
    dim: usize,
    input: Vec<f32>,
    output: Vec<f32>,
    product: Vec<f32>,
}

impl LinearAlgebraEngine {
    pub fn new(rng: SmallRng) -> Self {
        Self::with_dim(rng, DEFAULT_DIM)
    }

    pub fn with_dim(mut rng: SmallRng, dim: usize) -> Self {
        let size = dim * dim;
        let input = (0..size).map(|_| rng.gen_range(-1.0f32..=1.0)).collect();
        Self {
            rng,
            dim,
            input,
            output: vec![0.0; size],
            product: vec![0.0; size],
        }
    }

    fn reseed_input(&mut self) {
        for value in self.input.iter_mut() {
            *value = self.rng.gen_range(-1.0f32..=1.0);
        }
    }

    fn run_unit(&mut self) -> Result<(), EngineError> {
        if self.dim == 0 {
            return Err(EngineError::EmptyInput("zero-sized matrices".to_string()));
        }

        let sum: f32 = self.input.iter().sum();
        for (out, &x) in self.output.iter_mut().zip(&self.input) {
            *out = x * sum;
        }
        for (out, &x) in self.output.iter_mut().zip(&self.input) {
            *out += x;
        }
        let dot: f32 = self.input.iter().zip(&self.output).map(|(a, b)| a * b).sum();
        if !dot.is_finite() {
            return Err(EngineError::NonFinite("dot product"));
        }

        matmul(&self.input, &self.output, &mut self.product, self.dim);

        // Feed |product| back negated, rescaled so values stay bounded
        let peak = self.product.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));
        if !peak.is_finite() {
            return Err(EngineError::NonFinite("matrix multiply"));
        }
        let scale = if peak > 0.0 { 1.0 / peak } else { 1.0 };
        for (next, &p) in self.input.iter_mut().zip(&self.product) {
            *next = -(p.abs() * scale);
        }
        Ok(())
    }
}

impl WorkloadEngine for LinearAlgebraEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::LinearAlgebra
    }

    fn run_operations(&mut self, iterations: u32, stats: &mut StatsRecorder<'_>) {
        for _ in 0..iterations {
            match self.run_unit() {
                Ok(()) => stats.record_operations(1),
                Err(err) => {
                    record_failure(stats, &err);
                    self.reseed_input();
                }
            }
        }
    }
}

/// `c = a * b` for row-major `n x n` matrices
fn matmul(a: &[f32], b: &[f32], c: &mut [f32], n: usize) {
    c.fill(0.0);
    for i in 0..n {
        let row = &mut c[i * n..(i + 1) * n];
        for k in 0..n {
            let aik = a[i * n + k];
            let b_row = &b[k * n..(k + 1) * n];
            for (cij, &bkj) in row.iter_mut().zip(b_row) {
                *cij += aik * bkj;
            }
        }
    }
}
