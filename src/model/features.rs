//! Feature extraction for fraud model inference.
//!
//! Builds the fixed 20-dimensional feature vector from a transaction and the
//! user's behavioral profile. Features are extracted in the exact order the
//! network was initialized for; every value lands in [0, 1].

use crate::types::{Transaction, TransactionType, UserBehavior};
use chrono::{Datelike, Timelike};

/// Length of the model input vector.
pub const FEATURE_COUNT: usize = 20;

/// Feature extractor that transforms transactions into model input features.
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the model feature vector.
    ///
    /// The transaction is expected to be enriched (velocity counts, rule
    /// flags, time-since-last) before extraction; missing values fall back to
    /// the documented neutral defaults.
    pub fn extract(&self, tx: &Transaction, behavior: Option<&UserBehavior>) -> Vec<f64> {
        let mut features = Vec::with_capacity(FEATURE_COUNT);

        // Amount features
        features.push(normalize_amount(tx.amount));
        features.push(
            behavior
                .and_then(|b| b.avg_transaction_amount)
                .map(|avg| tx.amount / avg)
                .unwrap_or(1.0),
        );

        // Time features
        features.push(f64::from(tx.transaction_time.hour()) / 24.0);
        features.push(f64::from(tx.transaction_time.weekday().number_from_monday()) / 7.0);
        features.push(flag(tx.unusual_time));

        // Velocity features
        features.push(
            tx.transactions_in_last_hour
                .map(|n| (n as f64 / 10.0).min(1.0))
                .unwrap_or(0.0),
        );
        features.push(
            tx.transactions_in_last_day
                .map(|n| (n as f64 / 50.0).min(1.0))
                .unwrap_or(0.0),
        );
        features.push(tx.velocity_score.unwrap_or(0.0));

        // Location features
        features.push(flag(tx.unusual_location));
        features.push(tx.latitude.map(normalize_coordinate).unwrap_or(0.0));
        features.push(tx.longitude.map(normalize_coordinate).unwrap_or(0.0));

        // Device features
        features.push(flag(tx.unusual_device));
        features.push(if tx.device_type.as_deref() == Some("MOBILE") {
            1.0
        } else {
            0.0
        });

        // Transaction type features
        features.push(if tx.transaction_type == TransactionType::QrCode {
            1.0
        } else {
            0.0
        });
        features.push(if tx.transaction_type == TransactionType::Upi {
            1.0
        } else {
            0.0
        });

        // Behavior profile features
        features.push(behavior.map(|b| b.consistency_score).unwrap_or(0.5));
        features.push(
            behavior
                .map(|b| (b.failed_attempts as f64 / 10.0).min(1.0))
                .unwrap_or(0.0),
        );
        features.push(
            behavior
                .map(|b| (b.chargebacks as f64 / 5.0).min(1.0))
                .unwrap_or(0.0),
        );

        // Recency
        features.push(
            tx.time_since_last_transaction
                .map(|s| (s as f64 / 86_400.0).min(1.0))
                .unwrap_or(1.0),
        );

        // Merchant category presence
        features.push(if tx.merchant_category.is_some() {
            1.0
        } else {
            0.0
        });

        features
    }

    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Feature names, in extraction order.
    pub fn feature_names(&self) -> Vec<&'static str> {
        vec![
            "amount_log_norm",
            "amount_over_avg",
            "hour_of_day",
            "day_of_week",
            "unusual_time",
            "tx_last_hour",
            "tx_last_day",
            "velocity_score",
            "unusual_location",
            "latitude_norm",
            "longitude_norm",
            "unusual_device",
            "is_mobile",
            "is_qr_code",
            "is_upi",
            "consistency_score",
            "failed_attempts",
            "chargebacks",
            "time_since_last_tx",
            "has_merchant_category",
        ]
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn flag(value: Option<bool>) -> f64 {
    if value.unwrap_or(false) {
        1.0
    } else {
        0.0
    }
}

// Log normalization for amounts, saturating around 100k.
fn normalize_amount(amount: f64) -> f64 {
    (amount.ln_1p() / 100_000f64.ln()).min(1.0)
}

fn normalize_coordinate(coordinate: f64) -> f64 {
    (coordinate + 180.0) / 360.0
}
