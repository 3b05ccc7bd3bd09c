//! Combined fraud decision produced by the scoring pipeline

use crate::types::alert::{DetectionMethod, RiskLevel};
use crate::types::transaction::FraudStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Action recommended to the payment surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Approve,
    Review,
    Decline,
}

impl Recommendation {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            Recommendation::Decline
        } else if score >= 0.4 {
            Recommendation::Review
        } else {
            Recommendation::Approve
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::Approve => "APPROVE",
            Recommendation::Review => "REVIEW",
            Recommendation::Decline => "DECLINE",
        };
        f.write_str(s)
    }
}

/// Behavioral flags mirroring the rule firings for one transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorFlags {
    pub unusual_amount: bool,
    pub unusual_time: bool,
    pub unusual_location: bool,
    pub unusual_device: bool,
    pub high_velocity: bool,
    pub new_device: bool,
}

/// Outcome of combining the rule score and the model score for one
/// transaction. Carries everything the feedback applier and the response
/// builder need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudDecision {
    pub is_fraud: bool,

    /// Combined score in [0, 1]
    pub fraud_score: f64,

    /// Model probability, absent when the scorer missed its time budget
    pub ml_score: Option<f64>,

    pub rule_score: f64,

    pub behavior_score: f64,

    pub risk_level: RiskLevel,

    pub fraud_status: FraudStatus,

    pub recommendation: Recommendation,

    /// Fired rule identifiers in fixed rule order
    pub triggered_rules: Vec<String>,

    pub primary_reason: String,

    pub reasons: Vec<String>,

    pub flags: BehaviorFlags,

    /// Standard deviations between the amount and the profile mean
    pub amount_deviation: f64,

    pub user_trust_score: f64,

    pub user_fraud_history: u64,

    pub detection_method: DetectionMethod,

    pub processing_time_ms: u64,
}
