//! Transaction data structures for payment fraud scoring

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payment channel of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    QrCode,
    Upi,
    Card,
    Wallet,
}

impl FromStr for TransactionType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QR_CODE" => Ok(TransactionType::QrCode),
            "UPI" => Ok(TransactionType::Upi),
            "CARD" => Ok(TransactionType::Card),
            "WALLET" => Ok(TransactionType::Wallet),
            other => Err(EngineError::Validation(format!(
                "unknown transaction type: {other}"
            ))),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionType::QrCode => "QR_CODE",
            TransactionType::Upi => "UPI",
            TransactionType::Card => "CARD",
            TransactionType::Wallet => "WALLET",
        };
        f.write_str(s)
    }
}

/// Processing status. PENDING is transient; every scored transaction ends in
/// one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Review,
    Hold,
    Declined,
    Blocked,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Approved => "APPROVED",
            TransactionStatus::Review => "REVIEW",
            TransactionStatus::Hold => "HOLD",
            TransactionStatus::Declined => "DECLINED",
            TransactionStatus::Blocked => "BLOCKED",
        };
        f.write_str(s)
    }
}

/// Fraud classification assigned by the decider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FraudStatus {
    Unknown,
    Safe,
    Suspicious,
    Fraud,
}

impl fmt::Display for FraudStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FraudStatus::Unknown => "UNKNOWN",
            FraudStatus::Safe => "SAFE",
            FraudStatus::Suspicious => "SUSPICIOUS",
            FraudStatus::Fraud => "FRAUD",
        };
        f.write_str(s)
    }
}

/// A payment transaction, enriched with behavioral features before scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction identifier (`TXN-XXXXXXXX`)
    pub transaction_id: String,

    pub user_id: String,

    /// Amount in `currency` units, always positive
    pub amount: f64,

    pub currency: String,

    pub transaction_type: TransactionType,

    pub transaction_time: DateTime<Utc>,

    // Merchant info
    pub merchant_id: Option<String>,
    pub merchant_name: Option<String>,
    pub merchant_category: Option<String>,

    // Location
    pub ip_address: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    // Device
    pub device_id: Option<String>,
    pub device_type: Option<String>,
    pub device_fingerprint: Option<String>,
    pub user_agent: Option<String>,

    // QR code payload
    pub qr_code_id: Option<String>,
    pub qr_code_data: Option<String>,

    pub status: TransactionStatus,

    pub fraud_status: FraudStatus,

    /// Combined fraud score in [0, 1], written by the decider
    pub fraud_score: Option<f64>,

    pub fraud_reason: Option<String>,

    // Enrichment fields, populated before scoring
    /// Seconds since this user's most recent previous transaction
    pub time_since_last_transaction: Option<i64>,
    pub transactions_in_last_hour: Option<u64>,
    pub transactions_in_last_day: Option<u64>,
    pub avg_transaction_amount: Option<f64>,
    pub unusual_amount: Option<bool>,
    pub unusual_time: Option<bool>,
    pub unusual_location: Option<bool>,
    pub unusual_device: Option<bool>,
    pub velocity_score: Option<f64>,

    pub metadata: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Incoming transaction request, as handed over by the payment surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub user_id: String,
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub transaction_type: String,
    pub merchant_id: Option<String>,
    pub merchant_name: Option<String>,
    pub merchant_category: Option<String>,
    pub ip_address: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub device_id: Option<String>,
    pub device_type: Option<String>,
    pub device_fingerprint: Option<String>,
    pub user_agent: Option<String>,
    pub qr_code_id: Option<String>,
    pub qr_code_data: Option<String>,
    pub metadata: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl TransactionRequest {
    /// Validate the request before the pipeline runs.
    ///
    /// Rejects non-positive amounts, unknown transaction types, and requests
    /// without a device identifier.
    pub fn validate(&self) -> Result<TransactionType, EngineError> {
        if self.amount <= 0.0 || !self.amount.is_finite() {
            return Err(EngineError::Validation(format!(
                "transaction amount must be positive, got {}",
                self.amount
            )));
        }

        let transaction_type = self.transaction_type.parse::<TransactionType>()?;

        if self.device_id.as_deref().map_or(true, str::is_empty) {
            return Err(EngineError::Validation(
                "device id is required".to_string(),
            ));
        }

        Ok(transaction_type)
    }
}

impl Transaction {
    /// Build a PENDING transaction from a validated request.
    pub fn from_request(
        transaction_id: String,
        request: TransactionRequest,
        transaction_type: TransactionType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id,
            user_id: request.user_id,
            amount: request.amount,
            currency: request.currency,
            transaction_type,
            transaction_time: now,
            merchant_id: request.merchant_id,
            merchant_name: request.merchant_name,
            merchant_category: request.merchant_category,
            ip_address: request.ip_address,
            country: request.country,
            city: request.city,
            latitude: request.latitude,
            longitude: request.longitude,
            device_id: request.device_id,
            device_type: request.device_type,
            device_fingerprint: request.device_fingerprint,
            user_agent: request.user_agent,
            qr_code_id: request.qr_code_id,
            qr_code_data: request.qr_code_data,
            status: TransactionStatus::Pending,
            fraud_status: FraudStatus::Unknown,
            fraud_score: None,
            fraud_reason: None,
            time_since_last_transaction: None,
            transactions_in_last_hour: None,
            transactions_in_last_day: None,
            avg_transaction_amount: None,
            unusual_amount: None,
            unusual_time: None,
            unusual_location: None,
            unusual_device: None,
            velocity_score: None,
            metadata: request.metadata,
            created_at: now,
            updated_at: None,
        }
    }
}
