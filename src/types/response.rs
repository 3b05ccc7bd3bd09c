//! Response payloads exposed to the payment surface

use crate::types::alert::RiskLevel;
use crate::types::decision::{FraudDecision, Recommendation};
use crate::types::transaction::{FraudStatus, Transaction, TransactionStatus, TransactionType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one transaction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub transaction_id: String,
    pub user_id: String,
    pub amount: f64,
    pub currency: String,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub fraud_status: FraudStatus,
    pub fraud_score: f64,
    pub fraud_reason: String,
    pub approved: bool,
    pub message: String,
    pub transaction_time: DateTime<Utc>,
    pub fraud_analysis: Option<FraudAnalysis>,
}

/// Detailed scoring breakdown attached to a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudAnalysis {
    pub ml_score: Option<f64>,
    pub rule_based_score: f64,
    pub risk_level: RiskLevel,
    pub triggered_rules: Vec<String>,
    pub recommendation: Recommendation,
    pub behavior_analysis: BehaviorAnalysis,
}

/// Behavioral flags surfaced to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorAnalysis {
    pub unusual_amount: bool,
    pub unusual_time: bool,
    pub unusual_location: bool,
    pub unusual_device: bool,
    pub high_velocity: bool,
    pub deviation_from_normal: f64,
}

/// Per-user fraud exposure summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFraudStatistics {
    pub user_id: String,
    pub trust_score: f64,
    pub total_fraud_alerts: u64,
    pub fraudulent_transactions: u64,
    pub account_locked: bool,
}

impl TransactionResponse {
    /// Assemble a response from a scored transaction and its decision.
    pub fn from_decision(transaction: &Transaction, decision: &FraudDecision) -> Self {
        Self {
            transaction_id: transaction.transaction_id.clone(),
            user_id: transaction.user_id.clone(),
            amount: transaction.amount,
            currency: transaction.currency.clone(),
            transaction_type: transaction.transaction_type,
            status: transaction.status,
            fraud_status: transaction.fraud_status,
            fraud_score: decision.fraud_score,
            fraud_reason: decision.primary_reason.clone(),
            approved: transaction.status == TransactionStatus::Approved,
            message: status_message(transaction.status, &decision.primary_reason),
            transaction_time: transaction.transaction_time,
            fraud_analysis: Some(FraudAnalysis {
                ml_score: decision.ml_score,
                rule_based_score: decision.rule_score,
                risk_level: decision.risk_level,
                triggered_rules: decision.triggered_rules.clone(),
                recommendation: decision.recommendation,
                behavior_analysis: BehaviorAnalysis {
                    unusual_amount: decision.flags.unusual_amount,
                    unusual_time: decision.flags.unusual_time,
                    unusual_location: decision.flags.unusual_location,
                    unusual_device: decision.flags.unusual_device,
                    high_velocity: decision.flags.high_velocity,
                    deviation_from_normal: decision.amount_deviation,
                },
            }),
        }
    }
}

/// Human message keyed by terminal status.
pub fn status_message(status: TransactionStatus, primary_reason: &str) -> String {
    match status {
        TransactionStatus::Approved => "Transaction approved successfully".to_string(),
        TransactionStatus::Declined => format!("Transaction declined - {primary_reason}"),
        TransactionStatus::Review => {
            format!("Transaction flagged for manual review - {primary_reason}")
        }
        TransactionStatus::Hold => "Transaction on hold pending verification".to_string(),
        TransactionStatus::Blocked => "Transaction blocked - Fraud detected".to_string(),
        TransactionStatus::Pending => "Transaction status: PENDING".to_string(),
    }
}
