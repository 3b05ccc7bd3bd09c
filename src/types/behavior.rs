//! Per-user behavioral profile

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derived behavioral aggregate for one user.
///
/// Rewritten wholesale by the behavior aggregator from the user's accepted
/// transaction history; read as an immutable snapshot by the scoring path.
/// All frequency-ranked sets are bounded (top 3 hours/weekdays, top 5
/// cities/categories, top 10 merchants) and ordered most-frequent first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBehavior {
    pub user_id: String,

    // Amount statistics over accepted transactions
    pub avg_transaction_amount: Option<f64>,
    pub max_transaction_amount: Option<f64>,
    pub min_transaction_amount: Option<f64>,
    pub std_dev_transaction_amount: Option<f64>,

    // Frequency windows
    pub transactions_per_day: u64,
    pub transactions_per_week: u64,
    pub transactions_per_month: u64,

    // Time patterns
    pub preferred_hours: Vec<u32>,
    pub preferred_days: Vec<u32>,

    // Location patterns
    pub frequent_cities: Vec<String>,
    pub frequent_countries: Vec<String>,

    // Device patterns
    pub known_devices: Vec<String>,
    pub known_ip_addresses: Vec<String>,

    // Merchant patterns
    pub frequent_merchants: Vec<String>,
    pub frequent_categories: Vec<String>,

    // Behavioral scores, all in [0, 1]
    pub consistency_score: f64,
    pub diversity_score: f64,
    pub velocity_pattern: f64,

    // Risk counters
    pub failed_attempts: u64,
    pub chargebacks: u64,
    pub disputed_transactions: u64,
    pub last_fraudulent_activity: Option<DateTime<Utc>>,

    /// Number of accepted transactions in the last aggregation
    pub data_points_count: u64,

    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl UserBehavior {
    /// Neutral profile for a user with no history: scores at 0.5, empty sets.
    pub fn neutral(user_id: String, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            avg_transaction_amount: None,
            max_transaction_amount: None,
            min_transaction_amount: None,
            std_dev_transaction_amount: None,
            transactions_per_day: 0,
            transactions_per_week: 0,
            transactions_per_month: 0,
            preferred_hours: Vec::new(),
            preferred_days: Vec::new(),
            frequent_cities: Vec::new(),
            frequent_countries: Vec::new(),
            known_devices: Vec::new(),
            known_ip_addresses: Vec::new(),
            frequent_merchants: Vec::new(),
            frequent_categories: Vec::new(),
            consistency_score: 0.5,
            diversity_score: 0.5,
            velocity_pattern: 0.5,
            failed_attempts: 0,
            chargebacks: 0,
            disputed_transactions: 0,
            last_fraudulent_activity: None,
            data_points_count: 0,
            last_updated: now,
            created_at: now,
        }
    }
}
