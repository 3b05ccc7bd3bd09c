//! Weighted rule evaluation over a transaction and its behavioral context

use crate::config::FraudConfig;
use crate::types::decision::BehaviorFlags;
use crate::types::{Transaction, User, UserBehavior};
use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Identifier of a fraud rule. Variants are declared in evaluation order;
/// `triggered_rules` always lists fired rules in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleId {
    HighAmount,
    HighVelocity,
    UnusualTime,
    UnusualLocation,
    NewDevice,
    LowTrustScore,
    NewAccount,
    MultipleFailedAttempts,
    RoundAmount,
    AmountLimitExceeded,
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::HighAmount => "HIGH_AMOUNT",
            RuleId::HighVelocity => "HIGH_VELOCITY",
            RuleId::UnusualTime => "UNUSUAL_TIME",
            RuleId::UnusualLocation => "UNUSUAL_LOCATION",
            RuleId::NewDevice => "NEW_DEVICE",
            RuleId::LowTrustScore => "LOW_TRUST_SCORE",
            RuleId::NewAccount => "NEW_ACCOUNT",
            RuleId::MultipleFailedAttempts => "MULTIPLE_FAILED_ATTEMPTS",
            RuleId::RoundAmount => "ROUND_AMOUNT",
            RuleId::AmountLimitExceeded => "AMOUNT_LIMIT_EXCEEDED",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Velocity and device read-outs the coordinator gathers from the store
/// before rule evaluation. `now` anchors the account-age check.
#[derive(Debug, Clone)]
pub struct RuleContext {
    pub transactions_last_hour: u64,
    pub transactions_last_day: u64,
    /// Devices seen on this user's previous transactions
    pub known_devices: Vec<String>,
    pub now: DateTime<Utc>,
}

/// Result of one rule pass.
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    /// Sum of fired rule weights, clamped to 1
    pub rule_score: f64,
    /// Rule-only fraud verdict (`rule_score >= 0.7`)
    pub is_fraud: bool,
    pub triggered_rules: Vec<RuleId>,
    /// Human-readable reasons; the first entry is the primary reason
    pub reasons: Vec<String>,
    pub flags: BehaviorFlags,
}

/// Deterministic rule engine. Pure function of its inputs; safe to invoke
/// concurrently across requests.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    max_transaction_amount: f64,
    max_transactions_per_hour: u64,
    max_transactions_per_day: u64,
}

impl RuleEngine {
    pub fn new(config: &FraudConfig) -> Self {
        Self {
            max_transaction_amount: config.max_transaction_amount,
            max_transactions_per_hour: config.max_transactions_per_hour,
            max_transactions_per_day: config.max_transactions_per_day,
        }
    }

    /// Evaluate all rules against a transaction.
    pub fn evaluate(
        &self,
        transaction: &Transaction,
        user: Option<&User>,
        behavior: Option<&UserBehavior>,
        context: &RuleContext,
    ) -> RuleOutcome {
        let mut score = 0.0;
        let mut triggered = Vec::new();
        let mut reasons = Vec::new();
        let mut flags = BehaviorFlags::default();

        let mut fire = |weight: f64, rule: RuleId, reason: &str| {
            score += weight;
            triggered.push(rule);
            reasons.push(reason.to_string());
        };

        if self.check_high_amount(transaction, behavior) {
            fire(0.30, RuleId::HighAmount, "Transaction amount significantly higher than user's average");
            flags.unusual_amount = true;
        }

        if context.transactions_last_hour > self.max_transactions_per_hour
            || context.transactions_last_day > self.max_transactions_per_day
        {
            fire(0.25, RuleId::HighVelocity, "Too many transactions in short time period");
            flags.high_velocity = true;
        }

        let hour = transaction.transaction_time.hour();
        if (2..6).contains(&hour) {
            fire(0.15, RuleId::UnusualTime, "Transaction at unusual hour for this user");
            flags.unusual_time = true;
        }

        if self.check_unusual_location(transaction, behavior) {
            fire(0.20, RuleId::UnusualLocation, "Transaction from new or unusual location");
            flags.unusual_location = true;
        }

        if self.check_new_device(transaction, context) {
            fire(0.15, RuleId::NewDevice, "Transaction from unrecognized device");
            flags.unusual_device = true;
            flags.new_device = true;
        }

        if user.is_some_and(|u| u.trust_score < 50.0) {
            fire(0.20, RuleId::LowTrustScore, "User has low trust score");
        }

        if user.is_some_and(|u| u.registration_date > context.now - Duration::days(7)) {
            fire(0.10, RuleId::NewAccount, "Transaction from new account");
        }

        if behavior.is_some_and(|b| b.failed_attempts > 3) {
            fire(0.15, RuleId::MultipleFailedAttempts, "Multiple failed transaction attempts recently");
        }

        if is_round_amount(transaction.amount) {
            fire(0.05, RuleId::RoundAmount, "Suspiciously round transaction amount");
        }

        if transaction.amount > self.max_transaction_amount {
            fire(0.40, RuleId::AmountLimitExceeded, "Transaction amount exceeds maximum limit");
        }

        let rule_score = score.min(1.0);

        debug!(
            transaction_id = %transaction.transaction_id,
            rule_score,
            triggered = triggered.len(),
            "Rule evaluation complete"
        );

        RuleOutcome {
            rule_score,
            is_fraud: rule_score >= 0.7,
            triggered_rules: triggered,
            reasons,
            flags,
        }
    }

    /// Amount in standard deviations from the profile mean. Zero when the
    /// profile or its spread is missing.
    pub fn behavior_deviation(
        &self,
        transaction: &Transaction,
        behavior: Option<&UserBehavior>,
    ) -> f64 {
        let Some(behavior) = behavior else { return 0.0 };
        let Some(avg) = behavior.avg_transaction_amount else {
            return 0.0;
        };

        let std_dev = behavior.std_dev_transaction_amount.unwrap_or(avg * 0.5);
        if std_dev == 0.0 {
            return 0.0;
        }

        (transaction.amount - avg).abs() / std_dev
    }

    fn check_high_amount(&self, transaction: &Transaction, behavior: Option<&UserBehavior>) -> bool {
        let Some(avg) = behavior.and_then(|b| b.avg_transaction_amount) else {
            // No profile to compare against
            return transaction.amount > 5000.0;
        };

        let std_dev = behavior
            .and_then(|b| b.std_dev_transaction_amount)
            .unwrap_or(avg * 0.5);

        transaction.amount > avg + 3.0 * std_dev
    }

    fn check_unusual_location(
        &self,
        transaction: &Transaction,
        behavior: Option<&UserBehavior>,
    ) -> bool {
        let Some(country) = transaction.country.as_deref() else {
            return false;
        };
        let Some(behavior) = behavior else {
            // No history to judge against
            return false;
        };

        !behavior.frequent_countries.iter().any(|c| c == country)
    }

    fn check_new_device(&self, transaction: &Transaction, context: &RuleContext) -> bool {
        let Some(device_id) = transaction.device_id.as_deref() else {
            return false;
        };

        !context.known_devices.iter().any(|d| d == device_id)
    }
}

fn is_round_amount(amount: f64) -> bool {
    amount >= 500.0 && (amount % 1000.0 == 0.0 || amount % 500.0 == 0.0)
}
