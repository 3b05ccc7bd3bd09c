//! Feed-forward classifier backing the default fraud scorer.
//!
//! A small dense network: 20 inputs, two ReLU hidden layers (64 and 32
//! units), softmax over {not-fraud, fraud}. Weights are Xavier-initialized
//! from a fixed-seed PCG so a fresh network is identical across runs, and the
//! whole state serializes to JSON for file persistence.

use super::features::FEATURE_COUNT;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

pub const HIDDEN_1: usize = 64;
pub const HIDDEN_2: usize = 32;
pub const OUTPUT_SIZE: usize = 2;

/// Seed for fresh weight initialization.
pub const INIT_SEED: u64 = 123;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DenseLayer {
    /// Row-major weights, one row per output unit
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
}

impl DenseLayer {
    fn xavier(input: usize, output: usize, rng: &mut Pcg64) -> Self {
        let limit = (6.0 / (input + output) as f64).sqrt();
        let weights = (0..output)
            .map(|_| (0..input).map(|_| rng.gen_range(-limit..limit)).collect())
            .collect();
        Self {
            weights,
            biases: vec![0.0; output],
        }
    }

    /// Pre-activation output `W·x + b`.
    fn affine(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(row, bias)| {
                row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + bias
            })
            .collect()
    }
}

/// The classifier network. Deterministic for a given weight state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseNetwork {
    hidden1: DenseLayer,
    hidden2: DenseLayer,
    output: DenseLayer,
}

impl DenseNetwork {
    /// Freshly initialized network with the fixed seed.
    pub fn new() -> Self {
        Self::seeded(INIT_SEED)
    }

    pub fn seeded(seed: u64) -> Self {
        let mut rng = Pcg64::seed_from_u64(seed);
        Self {
            hidden1: DenseLayer::xavier(FEATURE_COUNT, HIDDEN_1, &mut rng),
            hidden2: DenseLayer::xavier(HIDDEN_1, HIDDEN_2, &mut rng),
            output: DenseLayer::xavier(HIDDEN_2, OUTPUT_SIZE, &mut rng),
        }
    }

    /// Class probabilities `[not_fraud, fraud]` for one feature vector.
    pub fn forward(&self, features: &[f64]) -> [f64; OUTPUT_SIZE] {
        let h1 = relu(self.hidden1.affine(features));
        let h2 = relu(self.hidden2.affine(&h1));
        softmax(self.output.affine(&h2))
    }

    /// Probability of the fraud class.
    pub fn fraud_probability(&self, features: &[f64]) -> f64 {
        self.forward(features)[1]
    }

    /// Gradient-descent training over labeled feature vectors.
    ///
    /// Plain SGD against softmax cross-entropy; sample order is preserved so
    /// two identical calls produce identical weights.
    pub fn fit(&mut self, samples: &[(Vec<f64>, bool)], epochs: usize, learning_rate: f64) {
        for _ in 0..epochs {
            for (features, is_fraud) in samples {
                if features.len() != FEATURE_COUNT {
                    continue;
                }
                self.step(features, *is_fraud, learning_rate);
            }
        }
    }

    fn step(&mut self, features: &[f64], is_fraud: bool, lr: f64) {
        // Forward pass keeping activations for backprop
        let z1 = self.hidden1.affine(features);
        let h1 = relu(z1.clone());
        let z2 = self.hidden2.affine(&h1);
        let h2 = relu(z2.clone());
        let probs = softmax(self.output.affine(&h2));

        // Softmax + cross-entropy gradient at the logits
        let target = if is_fraud { [0.0, 1.0] } else { [1.0, 0.0] };
        let d_logits: Vec<f64> = probs.iter().zip(target).map(|(p, t)| p - t).collect();

        // Output layer
        let d_h2 = backprop_layer(&mut self.output, &h2, &d_logits, lr);
        // Hidden layer 2, through the ReLU
        let d_z2 = relu_grad(&d_h2, &z2);
        let d_h1 = backprop_layer(&mut self.hidden2, &h1, &d_z2, lr);
        // Hidden layer 1
        let d_z1 = relu_grad(&d_h1, &z1);
        backprop_layer(&mut self.hidden1, features, &d_z1, lr);
    }
}

impl Default for DenseNetwork {
    fn default() -> Self {
        Self::new()
    }
}

fn relu(mut values: Vec<f64>) -> Vec<f64> {
    for v in &mut values {
        if *v < 0.0 {
            *v = 0.0;
        }
    }
    values
}

fn relu_grad(upstream: &[f64], pre_activation: &[f64]) -> Vec<f64> {
    upstream
        .iter()
        .zip(pre_activation)
        .map(|(g, z)| if *z > 0.0 { *g } else { 0.0 })
        .collect()
}

fn softmax(logits: Vec<f64>) -> [f64; OUTPUT_SIZE] {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    [exps[0] / sum, exps[1] / sum]
}

/// Apply one SGD step to a layer and return the gradient w.r.t. its input.
fn backprop_layer(layer: &mut DenseLayer, input: &[f64], d_output: &[f64], lr: f64) -> Vec<f64> {
    let mut d_input = vec![0.0; input.len()];

    for (weights_row, d_out) in layer.weights.iter_mut().zip(d_output) {
        for (w, (x, d_in)) in weights_row.iter_mut().zip(input.iter().zip(&mut d_input)) {
            // Input gradient uses the pre-update weight
            *d_in += *w * d_out;
            *w -= lr * d_out * x;
        }
    }
    for (b, d_out) in layer.biases.iter_mut().zip(d_output) {
        *b -= lr * d_out;
    }

    d_input
}
