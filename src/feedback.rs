//! Side effects of a fraud decision: transaction write, alert, trust score

use crate::store::Store;
use crate::types::{FraudAlert, FraudDecision, Transaction};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Whether the decision came from a pre-commitment scoring or a
/// post-transaction re-verification. Only the latter may lock accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckPhase {
    Pre,
    Post,
}

/// Applies the ordered side effects of a decision.
///
/// Each step is independent: a failed alert write never rolls back the
/// transaction write, and persistence failures are logged rather than
/// propagated — the caller already holds the computed decision.
///
/// Re-applying the same decision to the same transaction is idempotent:
/// alerts are upserted by transaction id, and the trust-score delta is
/// skipped when the persisted transaction already carries this decision.
pub struct FeedbackApplier {
    store: Arc<dyn Store>,
}

impl FeedbackApplier {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn apply(
        &self,
        transaction: &mut Transaction,
        decision: &FraudDecision,
        ml_features: Option<&[f64]>,
        phase: CheckPhase,
        now: DateTime<Utc>,
    ) {
        let already_applied = self.decision_already_applied(transaction, decision).await;

        // 1. Fraud fields onto the transaction
        transaction.fraud_score = Some(decision.fraud_score);
        transaction.fraud_reason = Some(decision.primary_reason.clone());
        transaction.unusual_amount = Some(decision.flags.unusual_amount);
        transaction.unusual_time = Some(decision.flags.unusual_time);
        transaction.unusual_location = Some(decision.flags.unusual_location);
        transaction.unusual_device = Some(decision.flags.unusual_device);
        transaction.updated_at = Some(now);

        if let Err(e) = self.store.save_transaction(transaction).await {
            error!(
                transaction_id = %transaction.transaction_id,
                error = %e,
                "Failed to persist scored transaction"
            );
        }

        // 2. Alert, when the score warrants one
        if decision.fraud_score >= 0.4 {
            let alert = FraudAlert::new(
                transaction.transaction_id.clone(),
                transaction.user_id.clone(),
                decision.detection_method,
                decision.fraud_score,
                decision.primary_reason.clone(),
                now,
            )
            .with_rules_fired(decision.triggered_rules.clone());

            let alert = match ml_features {
                Some(features) => alert.with_ml_features(features.to_vec()),
                None => alert,
            };

            if let Err(e) = self.store.save_fraud_alert(&alert).await {
                error!(
                    transaction_id = %transaction.transaction_id,
                    error = %e,
                    "Error creating fraud alert"
                );
            }
        }

        // 3. Trust score, once per (transaction, decision)
        if !already_applied {
            self.adjust_trust_score(&transaction.user_id, decision, now)
                .await;
        }

        // 4. Critical post-transaction fraud locks the account
        if phase == CheckPhase::Post && decision.fraud_score >= 0.9 {
            self.lock_account(&transaction.user_id, now).await;
        }
    }

    async fn decision_already_applied(
        &self,
        transaction: &Transaction,
        decision: &FraudDecision,
    ) -> bool {
        match self
            .store
            .find_transaction_by_id(&transaction.transaction_id)
            .await
        {
            Ok(Some(existing)) => {
                existing.fraud_score == Some(decision.fraud_score)
                    && existing.fraud_reason.as_deref() == Some(decision.primary_reason.as_str())
            }
            Ok(None) => false,
            Err(e) => {
                warn!(
                    transaction_id = %transaction.transaction_id,
                    error = %e,
                    "Could not check for prior feedback, assuming none"
                );
                false
            }
        }
    }

    async fn adjust_trust_score(&self, user_id: &str, decision: &FraudDecision, now: DateTime<Utc>) {
        let fraud_score = decision.fraud_score;
        let result = self
            .store
            .update_user(
                user_id,
                Box::new(move |user| {
                    if fraud_score >= 0.7 {
                        user.trust_score = (user.trust_score - 20.0).max(0.0);
                        user.fraud_count += 1;
                    } else if fraud_score >= 0.4 {
                        user.trust_score = (user.trust_score - 5.0).max(0.0);
                    } else {
                        user.trust_score = (user.trust_score + 0.5).min(100.0);
                    }
                    user.updated_at = Some(now);
                }),
            )
            .await;

        match result {
            Ok(Some(user)) => {
                debug!(
                    user_id,
                    trust_score = user.trust_score,
                    fraud_count = user.fraud_count,
                    "Trust score updated"
                );
            }
            Ok(None) => {}
            Err(e) => {
                error!(user_id, error = %e, "Failed to update trust score");
            }
        }
    }

    async fn lock_account(&self, user_id: &str, now: DateTime<Utc>) {
        let result = self
            .store
            .update_user(
                user_id,
                Box::new(move |user| {
                    user.account_locked = true;
                    user.enabled = false;
                    user.updated_at = Some(now);
                }),
            )
            .await;

        match result {
            Ok(Some(_)) => {
                warn!(user_id, "User account locked due to critical fraud");
            }
            Ok(None) => {}
            Err(e) => {
                error!(user_id, error = %e, "Failed to lock user account");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decider::Decider;
    use crate::rules::RuleOutcome;
    use crate::store::MemoryStore;
    use crate::types::decision::BehaviorFlags;
    use crate::types::{
        FraudStatus, TransactionRequest, TransactionStatus, TransactionType, User,
    };

    fn decision_with_score(rule_score: f64, ml_score: f64) -> FraudDecision {
        let rules = RuleOutcome {
            rule_score,
            is_fraud: rule_score >= 0.7,
            triggered_rules: Vec::new(),
            reasons: vec!["Too many transactions in short time period".to_string()],
            flags: BehaviorFlags::default(),
        };
        Decider::new().combine(&rules, Some(ml_score), None, None, 0.0)
    }

    fn transaction(id: &str, user_id: &str) -> Transaction {
        let request = TransactionRequest {
            user_id: user_id.to_string(),
            amount: 100.0,
            currency: "USD".to_string(),
            transaction_type: "CARD".to_string(),
            merchant_id: None,
            merchant_name: None,
            merchant_category: None,
            ip_address: None,
            country: None,
            city: None,
            latitude: None,
            longitude: None,
            device_id: Some("dev-1".to_string()),
            device_type: None,
            device_fingerprint: None,
            user_agent: None,
            qr_code_id: None,
            qr_code_data: None,
            metadata: None,
        };
        Transaction::from_request(id.to_string(), request, TransactionType::Card, Utc::now())
    }

    async fn setup(user_id: &str) -> (Arc<MemoryStore>, FeedbackApplier) {
        let store = Arc::new(MemoryStore::new());
        let user = User::register(
            user_id.to_string(),
            None,
            format!("{user_id}@example.com"),
            "+15550001111".to_string(),
            "secret".to_string(),
            Utc::now(),
        );
        store.save_user(&user).await.unwrap();
        let applier = FeedbackApplier::new(store.clone() as Arc<dyn Store>);
        (store, applier)
    }

    #[tokio::test]
    async fn test_suspicious_decision_creates_alert_and_docks_trust() {
        let (store, applier) = setup("USR-FBCK0001").await;
        let mut tx = transaction("TXN-FBCK0001", "USR-FBCK0001");
        let decision = decision_with_score(0.85, 0.5); // combined 0.64

        applier
            .apply(&mut tx, &decision, None, CheckPhase::Pre, Utc::now())
            .await;

        let saved = store
            .find_transaction_by_id("TXN-FBCK0001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.fraud_score, Some(decision.fraud_score));

        let alerts = store.find_alerts_by_user_id("USR-FBCK0001").await.unwrap();
        assert_eq!(alerts.len(), 1);

        let user = store.find_user_by_id("USR-FBCK0001").await.unwrap().unwrap();
        assert_eq!(user.trust_score, 95.0);
        assert_eq!(user.fraud_count, 0);
    }

    #[tokio::test]
    async fn test_clean_decision_raises_trust_without_alert() {
        let (store, applier) = setup("USR-FBCK0002").await;
        let mut user = store.find_user_by_id("USR-FBCK0002").await.unwrap().unwrap();
        user.trust_score = 90.0;
        store.save_user(&user).await.unwrap();

        let mut tx = transaction("TXN-FBCK0002", "USR-FBCK0002");
        let decision = decision_with_score(0.0, 0.1); // combined 0.06

        applier
            .apply(&mut tx, &decision, None, CheckPhase::Pre, Utc::now())
            .await;

        let alerts = store.find_alerts_by_user_id("USR-FBCK0002").await.unwrap();
        assert!(alerts.is_empty());

        let user = store.find_user_by_id("USR-FBCK0002").await.unwrap().unwrap();
        assert_eq!(user.trust_score, 90.5);
    }

    #[tokio::test]
    async fn test_reapplying_same_decision_is_idempotent() {
        let (store, applier) = setup("USR-FBCK0003").await;
        let mut tx = transaction("TXN-FBCK0003", "USR-FBCK0003");
        let decision = decision_with_score(1.0, 0.8); // combined 0.88

        applier
            .apply(&mut tx, &decision, None, CheckPhase::Pre, Utc::now())
            .await;
        applier
            .apply(&mut tx, &decision, None, CheckPhase::Pre, Utc::now())
            .await;

        let user = store.find_user_by_id("USR-FBCK0003").await.unwrap().unwrap();
        // One -20 delta and one fraud count, not two
        assert_eq!(user.trust_score, 80.0);
        assert_eq!(user.fraud_count, 1);

        let alerts = store.find_alerts_by_user_id("USR-FBCK0003").await.unwrap();
        assert_eq!(alerts.len(), 1);
    }

    #[tokio::test]
    async fn test_post_critical_locks_and_disables() {
        let (store, applier) = setup("USR-FBCK0004").await;
        let mut tx = transaction("TXN-FBCK0004", "USR-FBCK0004");
        tx.status = TransactionStatus::Blocked;
        tx.fraud_status = FraudStatus::Fraud;
        let decision = decision_with_score(0.9, 0.95); // combined 0.93

        applier
            .apply(&mut tx, &decision, None, CheckPhase::Post, Utc::now())
            .await;

        let user = store.find_user_by_id("USR-FBCK0004").await.unwrap().unwrap();
        assert!(user.account_locked);
        assert!(!user.enabled);
    }

    #[tokio::test]
    async fn test_pre_phase_never_locks() {
        let (store, applier) = setup("USR-FBCK0005").await;
        let mut tx = transaction("TXN-FBCK0005", "USR-FBCK0005");
        let decision = decision_with_score(1.0, 0.95); // combined 0.97

        applier
            .apply(&mut tx, &decision, None, CheckPhase::Pre, Utc::now())
            .await;

        let user = store.find_user_by_id("USR-FBCK0005").await.unwrap().unwrap();
        assert!(!user.account_locked);
        assert!(user.enabled);
    }
}
