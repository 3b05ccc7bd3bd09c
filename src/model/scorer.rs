//! Pluggable fraud probability scorer

use super::features::{FeatureExtractor, FEATURE_COUNT};
use super::network::DenseNetwork;
use crate::types::Transaction;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{error, info, warn};

/// Produces a fraud probability in [0, 1] from a feature vector.
///
/// Implementations must be deterministic for a given model state and return
/// the neutral 0.5 on any internal failure rather than erroring out.
pub trait FraudScorer: Send + Sync {
    fn score(&self, features: &[f64]) -> f64;
}

/// Default scorer backed by the dense classifier network.
///
/// Weights load from a JSON file when one exists; otherwise the scorer starts
/// from the fixed-seed fresh initialization. Scoring takes a read lock only,
/// so concurrent requests never serialize on each other; training takes the
/// write lock.
pub struct NeuralScorer {
    network: RwLock<DenseNetwork>,
    path: Option<PathBuf>,
}

impl NeuralScorer {
    /// Load weights from `path`, falling back to a fresh network when the
    /// file is absent or unreadable.
    pub fn load_or_init<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let network = match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<DenseNetwork>(&contents) {
                Ok(network) => {
                    info!(path = %path.display(), "Loaded fraud model weights");
                    network
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Model file unreadable, starting fresh");
                    DenseNetwork::new()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "No model file found, starting fresh");
                DenseNetwork::new()
            }
        };

        Self {
            network: RwLock::new(network),
            path: Some(path.to_path_buf()),
        }
    }

    /// Fresh network with no backing file.
    pub fn fresh() -> Self {
        Self {
            network: RwLock::new(DenseNetwork::new()),
            path: None,
        }
    }

    /// Train on labeled transactions and persist the updated weights.
    ///
    /// Mismatched or empty input is rejected with a warning; training errors
    /// never propagate past this boundary.
    pub fn fit_transactions(&self, transactions: &[Transaction], labels: &[bool]) {
        if transactions.is_empty() || transactions.len() != labels.len() {
            warn!(
                transactions = transactions.len(),
                labels = labels.len(),
                "Invalid training data size"
            );
            return;
        }

        let extractor = FeatureExtractor::new();
        let samples: Vec<(Vec<f64>, bool)> = transactions
            .iter()
            .zip(labels)
            .map(|(tx, label)| (extractor.extract(tx, None), *label))
            .collect();

        match self.network.write() {
            Ok(mut network) => {
                network.fit(&samples, 10, 0.01);
                info!(samples = samples.len(), "Model trained");
            }
            Err(e) => {
                error!(error = %e, "Model lock poisoned, skipping training");
                return;
            }
        }

        if let Err(e) = self.save() {
            error!(error = %e, "Failed to persist trained model");
        }
    }

    /// Write current weights to the configured path.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let network = self
            .network
            .read()
            .map_err(|e| anyhow::anyhow!("model lock poisoned: {e}"))?;
        let json = serde_json::to_string(&*network).context("Failed to serialize model")?;
        drop(network);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;

        info!(path = %path.display(), "Model saved");
        Ok(())
    }
}

impl FraudScorer for NeuralScorer {
    fn score(&self, features: &[f64]) -> f64 {
        if features.len() != FEATURE_COUNT {
            warn!(
                got = features.len(),
                expected = FEATURE_COUNT,
                "Feature vector has wrong length, returning neutral score"
            );
            return 0.5;
        }

        let Ok(network) = self.network.read() else {
            return 0.5;
        };

        let probability = network.fraud_probability(features);
        if probability.is_finite() {
            probability.clamp(0.0, 1.0)
        } else {
            0.5
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_is_deterministic_and_bounded() {
        let scorer = NeuralScorer::fresh();
        let features = vec![0.4; FEATURE_COUNT];

        let first = scorer.score(&features);
        let second = scorer.score(&features);

        assert_eq!(first, second);
        assert!((0.0..=1.0).contains(&first));
    }

    #[test]
    fn test_wrong_length_returns_neutral() {
        let scorer = NeuralScorer::fresh();
        assert_eq!(scorer.score(&[0.1, 0.2]), 0.5);
        assert_eq!(scorer.score(&[]), 0.5);
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let original = NeuralScorer::load_or_init(&path);
        let features = vec![0.6; FEATURE_COUNT];
        let expected = original.score(&features);
        original.save().unwrap();

        let reloaded = NeuralScorer::load_or_init(&path);
        assert_eq!(reloaded.score(&features), expected);
    }

    #[test]
    fn test_missing_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let scorer = NeuralScorer::load_or_init(dir.path().join("absent.json"));
        let fresh = NeuralScorer::fresh();

        let features = vec![0.3; FEATURE_COUNT];
        assert_eq!(scorer.score(&features), fresh.score(&features));
    }

    #[test]
    fn test_fit_rejects_mismatched_labels() {
        let scorer = NeuralScorer::fresh();
        let before = scorer.score(&vec![0.5; FEATURE_COUNT]);

        scorer.fit_transactions(&[], &[true]);

        assert_eq!(scorer.score(&vec![0.5; FEATURE_COUNT]), before);
    }
}
