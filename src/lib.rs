//! Fraud Detection Engine Library
//!
//! A real-time payment fraud scoring engine: incoming transactions are
//! enriched with behavioral and velocity features, scored by a weighted rule
//! engine and a statistical model, banded into a decision, and fed back into
//! per-user trust scores and behavior profiles.

pub mod behavior;
pub mod clock;
pub mod config;
pub mod decider;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod metrics;
pub mod model;
pub mod rules;
pub mod store;
pub mod types;

pub use behavior::BehaviorAggregator;
pub use config::AppConfig;
pub use decider::Decider;
pub use engine::FraudEngine;
pub use error::{EngineError, StoreError};
pub use metrics::EngineMetrics;
pub use model::{FraudScorer, NeuralScorer};
pub use rules::RuleEngine;
pub use store::{MemoryStore, Store};
pub use types::{FraudAlert, Transaction, TransactionRequest, TransactionResponse, User};
