//! Score combination and risk banding

use crate::rules::RuleOutcome;
use crate::types::alert::{DetectionMethod, RiskLevel};
use crate::types::decision::{BehaviorFlags, FraudDecision, Recommendation};
use crate::types::transaction::{FraudStatus, TransactionStatus};
use crate::types::{User, UserBehavior};
use tracing::debug;

/// Weight of the model score in the combined score.
const MODEL_WEIGHT: f64 = 0.6;
/// Weight of the rule score in the combined score.
const RULE_WEIGHT: f64 = 0.4;

/// What a post-transaction re-verification does to a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostTransactionOutcome {
    /// New terminal status, `None` keeps the current one
    pub status: Option<TransactionStatus>,
    pub fraud_status: FraudStatus,
    pub lock_account: bool,
}

/// Combines rule and model scores into a single decision and maps scores to
/// terminal transaction statuses.
#[derive(Debug, Clone, Default)]
pub struct Decider;

impl Decider {
    pub fn new() -> Self {
        Self
    }

    /// Combine a rule pass with an optional model score.
    ///
    /// `ml_score` is `None` when the scorer missed its soft time budget; the
    /// decision then falls back to the rule score alone.
    pub fn combine(
        &self,
        rules: &RuleOutcome,
        ml_score: Option<f64>,
        user: Option<&User>,
        behavior: Option<&UserBehavior>,
        amount_deviation: f64,
    ) -> FraudDecision {
        let fraud_score = match ml_score {
            Some(ml) => MODEL_WEIGHT * ml + RULE_WEIGHT * rules.rule_score,
            None => rules.rule_score,
        }
        .clamp(0.0, 1.0);

        let detection_method = if ml_score.is_some() {
            DetectionMethod::Hybrid
        } else {
            DetectionMethod::RuleBased
        };

        let mut reasons = rules.reasons.clone();
        let primary_reason = if let Some(first) = reasons.first() {
            first.clone()
        } else if ml_score.is_some_and(|ml| ml >= 0.7) {
            let reason = "ML model detected suspicious patterns".to_string();
            reasons.push(reason.clone());
            reason
        } else {
            "Transaction appears normal".to_string()
        };

        let decision = FraudDecision {
            is_fraud: fraud_score >= 0.7,
            fraud_score,
            ml_score,
            rule_score: rules.rule_score,
            behavior_score: behavior_score(behavior),
            risk_level: RiskLevel::from_score(fraud_score),
            fraud_status: fraud_status_from_score(fraud_score),
            recommendation: Recommendation::from_score(fraud_score),
            triggered_rules: rules
                .triggered_rules
                .iter()
                .map(|r| r.as_str().to_string())
                .collect(),
            primary_reason,
            reasons,
            flags: rules.flags,
            amount_deviation,
            user_trust_score: user.map(|u| u.trust_score).unwrap_or(100.0),
            user_fraud_history: user.map(|u| u.fraud_count).unwrap_or(0),
            detection_method,
            processing_time_ms: 0,
        };

        debug!(
            fraud_score = decision.fraud_score,
            risk_level = %decision.risk_level,
            method = %decision.detection_method,
            "Scores combined"
        );

        decision
    }

    /// Terminal status for a freshly scored (pre-commitment) transaction.
    /// Never produces BLOCKED.
    pub fn pre_transaction_status(&self, fraud_score: f64) -> TransactionStatus {
        if fraud_score >= 0.7 {
            TransactionStatus::Declined
        } else if fraud_score >= 0.4 {
            TransactionStatus::Review
        } else {
            TransactionStatus::Approved
        }
    }

    /// Outcome of a post-transaction (QR verification) re-score.
    pub fn post_transaction_outcome(&self, fraud_score: f64) -> PostTransactionOutcome {
        if fraud_score >= 0.9 {
            PostTransactionOutcome {
                status: Some(TransactionStatus::Blocked),
                fraud_status: FraudStatus::Fraud,
                lock_account: true,
            }
        } else if fraud_score >= 0.7 {
            PostTransactionOutcome {
                status: Some(TransactionStatus::Hold),
                fraud_status: FraudStatus::Fraud,
                lock_account: false,
            }
        } else if fraud_score >= 0.4 {
            PostTransactionOutcome {
                status: None,
                fraud_status: FraudStatus::Suspicious,
                lock_account: false,
            }
        } else {
            PostTransactionOutcome {
                status: None,
                fraud_status: FraudStatus::Safe,
                lock_account: false,
            }
        }
    }

    /// Neutral decision emitted when the pipeline fails internally.
    pub fn error_decision(&self) -> FraudDecision {
        let reason = "Error in fraud detection - manual review required".to_string();
        FraudDecision {
            is_fraud: false,
            fraud_score: 0.5,
            ml_score: None,
            rule_score: 0.0,
            behavior_score: 0.5,
            risk_level: RiskLevel::Medium,
            fraud_status: FraudStatus::Unknown,
            recommendation: Recommendation::Review,
            triggered_rules: Vec::new(),
            primary_reason: reason.clone(),
            reasons: vec![reason],
            flags: BehaviorFlags::default(),
            amount_deviation: 0.0,
            user_trust_score: 0.0,
            user_fraud_history: 0,
            detection_method: DetectionMethod::Error,
            processing_time_ms: 0,
        }
    }
}

fn fraud_status_from_score(score: f64) -> FraudStatus {
    if score >= 0.7 {
        FraudStatus::Fraud
    } else if score >= 0.4 {
        FraudStatus::Suspicious
    } else {
        FraudStatus::Safe
    }
}

fn behavior_score(behavior: Option<&UserBehavior>) -> f64 {
    let Some(behavior) = behavior else { return 0.5 };

    let failed_penalty = (behavior.failed_attempts as f64 * 0.1).min(0.5);
    (behavior.consistency_score - failed_penalty).max(0.0)
}
