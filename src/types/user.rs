//! User account data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account holder.
///
/// `trust_score` summarizes accumulated fraud exposure on a 0-100 scale.
/// It starts at 100, drops on suspicious or fraudulent outcomes, and slowly
/// recovers on clean transactions. `account_locked` implies `!enabled`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Stable opaque identifier, unique across the system
    pub user_id: String,

    pub email: String,

    pub phone_number: String,

    pub name: Option<String>,

    /// Opaque credential material. The engine never inspects it.
    pub password: String,

    pub registration_date: DateTime<Utc>,

    /// Trust score in [0, 100]
    pub trust_score: f64,

    /// Lifetime transaction count
    pub total_transactions: u64,

    /// Number of transactions scored as fraud
    pub fraud_count: u64,

    pub account_locked: bool,

    pub enabled: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a freshly registered user with full trust and an unlocked account.
    pub fn register(
        user_id: String,
        name: Option<String>,
        email: String,
        phone_number: String,
        password: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            email,
            phone_number,
            name,
            password,
            registration_date: now,
            trust_score: 100.0,
            total_transactions: 0,
            fraud_count: 0,
            account_locked: false,
            enabled: true,
            created_at: now,
            updated_at: None,
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_defaults() {
        let user = User::register(
            "USR-TEST0001".to_string(),
            Some("Test".to_string()),
            "test@example.com".to_string(),
            "+15550001111".to_string(),
            "secret".to_string(),
            Utc::now(),
        );

        assert_eq!(user.trust_score, 100.0);
        assert!(user.enabled);
        assert!(!user.account_locked);
        assert_eq!(user.fraud_count, 0);
    }
}
