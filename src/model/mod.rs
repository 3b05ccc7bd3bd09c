//! Statistical fraud model: feature extraction, classifier network, scorer

pub mod features;
pub mod network;
pub mod scorer;

pub use features::{FeatureExtractor, FEATURE_COUNT};
pub use network::DenseNetwork;
pub use scorer::{FraudScorer, NeuralScorer};
