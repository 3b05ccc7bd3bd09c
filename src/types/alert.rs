//! Fraud alert data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk level classification of a combined fraud score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Band a combined fraud score, lower bound inclusive.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            RiskLevel::Critical
        } else if score >= 0.7 {
            RiskLevel::High
        } else if score >= 0.4 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Alert severity band. Differs from [`RiskLevel`] in the medium cutoff:
/// alerts escalate to MEDIUM at 0.5 rather than 0.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            AlertSeverity::Critical
        } else if score >= 0.7 {
            AlertSeverity::High
        } else if score >= 0.5 {
            AlertSeverity::Medium
        } else {
            AlertSeverity::Low
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertSeverity::Low => "LOW",
            AlertSeverity::Medium => "MEDIUM",
            AlertSeverity::High => "HIGH",
            AlertSeverity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Recommended handling for an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertAction {
    Block,
    Review,
    AllowWithWarning,
}

impl AlertAction {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            AlertAction::Block
        } else if score >= 0.5 {
            AlertAction::Review
        } else {
            AlertAction::AllowWithWarning
        }
    }
}

/// Which part of the pipeline produced the decision behind an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionMethod {
    RuleBased,
    MlBased,
    Hybrid,
    Error,
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DetectionMethod::RuleBased => "RULE_BASED",
            DetectionMethod::MlBased => "ML_BASED",
            DetectionMethod::Hybrid => "HYBRID",
            DetectionMethod::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Persisted record of a scoring outcome with fraud score >= 0.4, subject to
/// later human review. At most one alert exists per transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudAlert {
    pub alert_id: String,

    pub transaction_id: String,

    pub user_id: String,

    pub alert_type: DetectionMethod,

    pub severity: AlertSeverity,

    pub fraud_score: f64,

    pub reason: String,

    /// Rule identifiers that fired, in fixed rule order
    pub rules_fired: Vec<String>,

    /// Snapshot of the model feature vector, when the model ran
    pub ml_features: Option<Vec<f64>>,

    pub action: AlertAction,

    pub reviewed: bool,

    pub reviewed_by: Option<String>,

    pub reviewed_at: Option<DateTime<Utc>>,

    pub review_comments: Option<String>,

    pub confirmed_fraud: Option<bool>,

    pub detected_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

impl FraudAlert {
    /// Create an unreviewed alert for a scored transaction.
    pub fn new(
        transaction_id: String,
        user_id: String,
        alert_type: DetectionMethod,
        fraud_score: f64,
        reason: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            alert_id: uuid::Uuid::new_v4().to_string(),
            transaction_id,
            user_id,
            alert_type,
            severity: AlertSeverity::from_score(fraud_score),
            fraud_score,
            reason,
            rules_fired: Vec::new(),
            ml_features: None,
            action: AlertAction::from_score(fraud_score),
            reviewed: false,
            reviewed_by: None,
            reviewed_at: None,
            review_comments: None,
            confirmed_fraud: None,
            detected_at: now,
            created_at: now,
        }
    }

    pub fn with_rules_fired(mut self, rules: Vec<String>) -> Self {
        self.rules_fired = rules;
        self
    }

    pub fn with_ml_features(mut self, features: Vec<f64>) -> Self {
        self.ml_features = Some(features);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_from_score() {
        assert_eq!(RiskLevel::from_score(0.1), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.4), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.7), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0.9), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(0.39999), RiskLevel::Low);
    }

    #[test]
    fn test_alert_severity_uses_half_cutoff() {
        assert_eq!(AlertSeverity::from_score(0.45), AlertSeverity::Low);
        assert_eq!(AlertSeverity::from_score(0.5), AlertSeverity::Medium);
        assert_eq!(AlertSeverity::from_score(0.75), AlertSeverity::High);
        assert_eq!(AlertSeverity::from_score(0.95), AlertSeverity::Critical);
    }

    #[test]
    fn test_alert_action_bands() {
        assert_eq!(AlertAction::from_score(0.95), AlertAction::Block);
        assert_eq!(AlertAction::from_score(0.7), AlertAction::Review);
        assert_eq!(AlertAction::from_score(0.45), AlertAction::AllowWithWarning);
    }

    #[test]
    fn test_fraud_alert_serialization() {
        let alert = FraudAlert::new(
            "TXN-AB12CD34".to_string(),
            "USR-TEST0001".to_string(),
            DetectionMethod::Hybrid,
            0.78,
            "Transaction amount significantly higher than user's average".to_string(),
            Utc::now(),
        )
        .with_rules_fired(vec!["HIGH_AMOUNT".to_string()]);

        assert_eq!(alert.severity, AlertSeverity::High);
        assert_eq!(alert.action, AlertAction::Review);
        assert!(!alert.reviewed);

        let json = serde_json::to_string(&alert).unwrap();
        let back: FraudAlert = serde_json::from_str(&json).unwrap();
        assert_eq!(back.transaction_id, alert.transaction_id);
        assert_eq!(back.severity, alert.severity);
        assert_eq!(back.alert_type, DetectionMethod::Hybrid);
    }
}
