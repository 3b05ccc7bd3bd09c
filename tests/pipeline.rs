//! End-to-end scoring pipeline scenarios

use chrono::{DateTime, Duration, TimeZone, Utc};
use fraud_detection_engine::behavior::BehaviorAggregator;
use fraud_detection_engine::clock::FixedClock;
use fraud_detection_engine::config::AppConfig;
use fraud_detection_engine::engine::FraudEngine;
use fraud_detection_engine::error::EngineError;
use fraud_detection_engine::model::FraudScorer;
use fraud_detection_engine::store::{MemoryStore, Store};
use fraud_detection_engine::types::{
    AlertAction, AlertSeverity, FraudStatus, Transaction, TransactionRequest, TransactionStatus,
    TransactionType, User,
};
use std::sync::Arc;

/// Deterministic model double returning a constant probability.
struct StubScorer(f64);

impl FraudScorer for StubScorer {
    fn score(&self, _features: &[f64]) -> f64 {
        self.0
    }
}

/// A scorer that always overruns the soft time budget.
struct SlowScorer;

impl FraudScorer for SlowScorer {
    fn score(&self, _features: &[f64]) -> f64 {
        std::thread::sleep(std::time::Duration::from_millis(400));
        0.99
    }
}

/// Monday 2025-06-16, 14:00 UTC — an unremarkable afternoon.
fn afternoon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 16, 14, 0, 0).unwrap()
}

fn engine_at(
    store: Arc<MemoryStore>,
    scorer: Arc<dyn FraudScorer>,
    now: DateTime<Utc>,
) -> FraudEngine {
    FraudEngine::with_clock(
        store as Arc<dyn Store>,
        scorer,
        &AppConfig::default(),
        Arc::new(FixedClock(now)),
    )
}

async fn seeded_user(store: &MemoryStore, user_id: &str, now: DateTime<Utc>) -> User {
    let mut user = User::register(
        user_id.to_string(),
        Some("Scenario User".to_string()),
        format!("{user_id}@example.com"),
        "+15550009999".to_string(),
        "secret".to_string(),
        now,
    );
    // A long-standing account, so NEW_ACCOUNT stays quiet
    user.registration_date = now - Duration::days(400);
    user.created_at = now - Duration::days(400);
    store.save_user(&user).await.unwrap();
    user
}

fn request(user_id: &str, amount: f64) -> TransactionRequest {
    TransactionRequest {
        user_id: user_id.to_string(),
        amount,
        currency: "USD".to_string(),
        transaction_type: "CARD".to_string(),
        merchant_id: Some("M-1".to_string()),
        merchant_name: Some("Corner Grocery".to_string()),
        merchant_category: Some("groceries".to_string()),
        ip_address: Some("10.0.0.1".to_string()),
        country: Some("US".to_string()),
        city: Some("Austin".to_string()),
        latitude: Some(30.27),
        longitude: Some(-97.74),
        device_id: Some("dev-known".to_string()),
        device_type: Some("MOBILE".to_string()),
        device_fingerprint: Some("fp-1".to_string()),
        user_agent: None,
        qr_code_id: None,
        qr_code_data: None,
        metadata: None,
    }
}

fn history_transaction(
    index: u32,
    user_id: &str,
    amount: f64,
    time: DateTime<Utc>,
) -> Transaction {
    let mut req = request(user_id, amount);
    req.transaction_type = "CARD".to_string();
    let mut tx = Transaction::from_request(
        format!("TXN-SEED{index:04}"),
        req,
        TransactionType::Card,
        time,
    );
    tx.transaction_time = time;
    tx.status = TransactionStatus::Approved;
    tx.fraud_status = FraudStatus::Safe;
    tx
}

async fn seed_profile(store: Arc<MemoryStore>, user_id: &str, now: DateTime<Utc>) {
    let aggregator = BehaviorAggregator::new(store as Arc<dyn Store>);
    aggregator.update_at(user_id, now).await.unwrap();
}

#[tokio::test]
async fn scenario_normal_small_transaction_approves() {
    let now = afternoon();
    let store = Arc::new(MemoryStore::new());
    let user = seeded_user(&store, "USR-SCEN0001", now).await;

    for i in 0..50u32 {
        let amount = if i % 2 == 0 { 80.0 } else { 120.0 };
        let time = now - Duration::hours(2 * i64::from(i) + 2);
        let tx = history_transaction(i, &user.user_id, amount, time);
        store.save_transaction(&tx).await.unwrap();
    }
    seed_profile(store.clone(), &user.user_id, now).await;

    let engine = engine_at(store.clone(), Arc::new(StubScorer(0.5)), now);
    let response = engine
        .process_transaction(request(&user.user_id, 120.0))
        .await
        .unwrap();

    assert_eq!(response.status, TransactionStatus::Approved);
    assert!(response.approved);
    assert_eq!(response.fraud_status, FraudStatus::Safe);

    let analysis = response.fraud_analysis.unwrap();
    assert_eq!(analysis.rule_based_score, 0.0);
    assert!(analysis.triggered_rules.is_empty());
    // Combined score is the weighted model score alone
    assert!((response.fraud_score - 0.6 * 0.5).abs() < 1e-9);

    // Trust stays clamped at 100
    let user = store
        .find_user_by_id(&user.user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.trust_score, 100.0);

    // No alert below 0.4
    assert!(store
        .find_alerts_by_user_id(&user.user_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn scenario_round_amount_new_device_at_3am_goes_to_review() {
    let night = Utc.with_ymd_and_hms(2025, 6, 16, 3, 0, 0).unwrap();
    let store = Arc::new(MemoryStore::new());
    let user = seeded_user(&store, "USR-SCEN0002", night).await;

    for i in 0..50u32 {
        let amount = if i % 2 == 0 { 80.0 } else { 120.0 };
        let time = night - Duration::hours(2 * i64::from(i) + 2);
        let tx = history_transaction(i, &user.user_id, amount, time);
        store.save_transaction(&tx).await.unwrap();
    }
    seed_profile(store.clone(), &user.user_id, night).await;

    let mut req = request(&user.user_id, 10_000.0);
    req.country = Some("KP".to_string());
    req.device_id = Some("dev-unseen".to_string());

    let engine = engine_at(store.clone(), Arc::new(StubScorer(0.5)), night);
    let response = engine.process_transaction(req).await.unwrap();

    let analysis = response.fraud_analysis.as_ref().unwrap();
    // Fixed rule order, not firing order
    assert_eq!(
        analysis.triggered_rules,
        vec![
            "HIGH_AMOUNT",
            "UNUSUAL_TIME",
            "UNUSUAL_LOCATION",
            "NEW_DEVICE",
            "ROUND_AMOUNT",
        ]
    );
    assert!((analysis.rule_based_score - 0.85).abs() < 1e-9);
    // 0.6 * 0.5 + 0.4 * 0.85 = 0.64
    assert!((response.fraud_score - 0.64).abs() < 1e-9);
    assert_eq!(response.status, TransactionStatus::Review);
    assert_eq!(response.fraud_status, FraudStatus::Suspicious);
    assert!(analysis.behavior_analysis.unusual_device);
    assert!(analysis.behavior_analysis.unusual_location);

    // Alert lands in the 0.5..0.7 severity band
    let alerts = store.find_alerts_by_user_id(&user.user_id).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, AlertSeverity::Medium);
    assert_eq!(alerts[0].action, AlertAction::Review);
    assert!(alerts[0].ml_features.is_some());

    // Suspicious decision docks five trust points
    let user = store
        .find_user_by_id(&user.user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.trust_score, 95.0);
    assert_eq!(user.fraud_count, 0);
}

#[tokio::test]
async fn scenario_limit_exceeded_goes_to_review() {
    let now = afternoon();
    let store = Arc::new(MemoryStore::new());
    let user = seeded_user(&store, "USR-SCEN0003", now).await;

    for i in 0..50u32 {
        let amount = if i % 2 == 0 { 80.0 } else { 120.0 };
        let time = now - Duration::hours(2 * i64::from(i) + 2);
        let tx = history_transaction(i, &user.user_id, amount, time);
        store.save_transaction(&tx).await.unwrap();
    }
    seed_profile(store.clone(), &user.user_id, now).await;

    let engine = engine_at(store.clone(), Arc::new(StubScorer(0.5)), now);
    let response = engine
        .process_transaction(request(&user.user_id, 15_000.0))
        .await
        .unwrap();

    let analysis = response.fraud_analysis.as_ref().unwrap();
    assert!(analysis
        .triggered_rules
        .contains(&"AMOUNT_LIMIT_EXCEEDED".to_string()));
    assert_eq!(response.status, TransactionStatus::Review);
    assert_eq!(response.fraud_status, FraudStatus::Suspicious);
}

#[tokio::test]
async fn scenario_velocity_burst_sets_flag() {
    let now = afternoon();
    let store = Arc::new(MemoryStore::new());
    let user = seeded_user(&store, "USR-SCEN0004", now).await;

    // Fifteen transactions inside the last hour
    for i in 0..15u32 {
        let time = now - Duration::minutes(3 * i64::from(i) + 1);
        let tx = history_transaction(i, &user.user_id, 100.0, time);
        store.save_transaction(&tx).await.unwrap();
    }
    seed_profile(store.clone(), &user.user_id, now).await;

    let engine = engine_at(store.clone(), Arc::new(StubScorer(0.1)), now);
    let response = engine
        .process_transaction(request(&user.user_id, 100.0))
        .await
        .unwrap();

    let analysis = response.fraud_analysis.unwrap();
    assert!(analysis
        .triggered_rules
        .contains(&"HIGH_VELOCITY".to_string()));
    assert!(analysis.behavior_analysis.high_velocity);
}

#[tokio::test]
async fn scenario_locked_account_declines_without_scoring() {
    let now = afternoon();
    let store = Arc::new(MemoryStore::new());
    let mut user = seeded_user(&store, "USR-SCEN0005", now).await;
    user.account_locked = true;
    user.enabled = false;
    store.save_user(&user).await.unwrap();

    let engine = engine_at(store.clone(), Arc::new(StubScorer(0.5)), now);
    let response = engine
        .process_transaction(request(&user.user_id, 50.0))
        .await
        .unwrap();

    assert_eq!(response.status, TransactionStatus::Declined);
    assert_eq!(response.fraud_status, FraudStatus::Fraud);
    assert_eq!(response.fraud_score, 1.0);
    assert!(!response.approved);
    assert_eq!(
        response.message,
        "Transaction declined - Account is locked due to fraud"
    );
    assert!(response.fraud_analysis.is_none());

    // No scoring side effects at all
    assert!(store
        .find_by_user_id_order_by_time_desc(&user.user_id)
        .await
        .unwrap()
        .is_empty());
    assert!(store
        .find_alerts_by_user_id(&user.user_id)
        .await
        .unwrap()
        .is_empty());
    let user = store
        .find_user_by_id(&user.user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.trust_score, 100.0);
}

#[tokio::test]
async fn scenario_post_transaction_critical_blocks_and_locks() {
    let now = afternoon();
    let store = Arc::new(MemoryStore::new());
    let user = seeded_user(&store, "USR-SCEN0006", now).await;

    for i in 0..20u32 {
        let amount = if i % 2 == 0 { 80.0 } else { 120.0 };
        let time = now - Duration::hours(2 * i64::from(i) + 2);
        let tx = history_transaction(i, &user.user_id, amount, time);
        store.save_transaction(&tx).await.unwrap();
    }
    seed_profile(store.clone(), &user.user_id, now).await;

    // A suspicious QR transaction already persisted from the pre-check
    let mut qr_req = request(&user.user_id, 15_000.0);
    qr_req.transaction_type = "QR_CODE".to_string();
    qr_req.country = Some("KP".to_string());
    qr_req.device_id = Some("dev-evil".to_string());
    qr_req.qr_code_id = Some("QR-0001".to_string());
    qr_req.qr_code_data = Some("payload".to_string());
    let mut qr_tx = Transaction::from_request(
        "TXN-QRSCEN01".to_string(),
        qr_req,
        TransactionType::QrCode,
        now - Duration::minutes(10),
    );
    qr_tx.transaction_time = now - Duration::minutes(10);
    qr_tx.status = TransactionStatus::Review;
    qr_tx.fraud_status = FraudStatus::Suspicious;
    store.save_transaction(&qr_tx).await.unwrap();

    let engine = engine_at(store.clone(), Arc::new(StubScorer(0.95)), now);
    let response = engine
        .verify_qr_transaction("QR-0001", &user.user_id)
        .await
        .unwrap();

    // Rule score clamps at 1.0; combined = 0.6 * 0.95 + 0.4 = 0.97
    assert!(response.fraud_score >= 0.9);
    assert_eq!(response.status, TransactionStatus::Blocked);
    assert_eq!(response.fraud_status, FraudStatus::Fraud);

    let user = store
        .find_user_by_id(&user.user_id)
        .await
        .unwrap()
        .unwrap();
    assert!(user.account_locked);
    assert!(!user.enabled);
    assert_eq!(user.fraud_count, 1);
    assert_eq!(user.trust_score, 80.0);

    let alerts = store.find_alerts_by_user_id(&user.user_id).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, AlertSeverity::Critical);
    assert_eq!(alerts[0].action, AlertAction::Block);
}

#[tokio::test]
async fn model_timeout_falls_back_to_rule_only() {
    let now = afternoon();
    let store = Arc::new(MemoryStore::new());
    let user = seeded_user(&store, "USR-SCEN0007", now).await;

    let mut config = AppConfig::default();
    config.model.score_timeout_ms = 50;
    let engine = FraudEngine::with_clock(
        store.clone() as Arc<dyn Store>,
        Arc::new(SlowScorer),
        &config,
        Arc::new(FixedClock(now)),
    );

    // First transaction for this user: the empty profile trips the
    // high-amount default, location, and device rules, plus the round amount
    let response = engine
        .process_transaction(request(&user.user_id, 6_000.0))
        .await
        .unwrap();

    let analysis = response.fraud_analysis.unwrap();
    assert!(analysis.ml_score.is_none());
    // With the model out of budget, the combined score IS the rule score
    assert_eq!(response.fraud_score, analysis.rule_based_score);
    assert!((analysis.rule_based_score - 0.70).abs() < 1e-9);
    assert_eq!(response.status, TransactionStatus::Declined);
}

#[tokio::test]
async fn validation_rejects_before_pipeline() {
    let now = afternoon();
    let store = Arc::new(MemoryStore::new());
    let user = seeded_user(&store, "USR-SCEN0008", now).await;
    let engine = engine_at(store.clone(), Arc::new(StubScorer(0.5)), now);

    let bad_amount = request(&user.user_id, 0.0);
    assert!(matches!(
        engine.process_transaction(bad_amount).await,
        Err(EngineError::Validation(_))
    ));

    let mut bad_type = request(&user.user_id, 10.0);
    bad_type.transaction_type = "BARTER".to_string();
    assert!(matches!(
        engine.process_transaction(bad_type).await,
        Err(EngineError::Validation(_))
    ));

    let mut no_device = request(&user.user_id, 10.0);
    no_device.device_id = None;
    assert!(matches!(
        engine.process_transaction(no_device).await,
        Err(EngineError::Validation(_))
    ));

    // Nothing was persisted for any rejected request
    assert!(store
        .find_by_user_id_order_by_time_desc(&user.user_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let now = afternoon();
    let store = Arc::new(MemoryStore::new());
    let engine = engine_at(store, Arc::new(StubScorer(0.5)), now);

    let result = engine
        .process_transaction(request("USR-NOBODY01", 10.0))
        .await;
    assert!(matches!(result, Err(EngineError::UserNotFound(_))));
}

#[tokio::test]
async fn qr_transaction_requires_payload() {
    let now = afternoon();
    let store = Arc::new(MemoryStore::new());
    let user = seeded_user(&store, "USR-SCEN0009", now).await;
    let engine = engine_at(store.clone(), Arc::new(StubScorer(0.1)), now);

    let no_payload = request(&user.user_id, 25.0);
    assert!(matches!(
        engine.process_qr_transaction(no_payload).await,
        Err(EngineError::Validation(_))
    ));

    let mut with_payload = request(&user.user_id, 25.0);
    with_payload.qr_code_id = Some("QR-0002".to_string());
    with_payload.qr_code_data = Some("payload".to_string());
    let response = engine.process_qr_transaction(with_payload).await.unwrap();

    // Channel is forced to QR_CODE
    assert_eq!(response.transaction_type, TransactionType::QrCode);
    assert_eq!(response.status, TransactionStatus::Approved);
}

#[tokio::test]
async fn verify_qr_without_matching_transaction_is_not_found() {
    let now = afternoon();
    let store = Arc::new(MemoryStore::new());
    let user = seeded_user(&store, "USR-SCEN0010", now).await;
    let engine = engine_at(store, Arc::new(StubScorer(0.1)), now);

    let result = engine.verify_qr_transaction("QR-GHOST01", &user.user_id).await;
    assert!(matches!(result, Err(EngineError::TransactionNotFound(_))));
}

#[tokio::test]
async fn fraud_statistics_reflect_outcomes() {
    let now = afternoon();
    let store = Arc::new(MemoryStore::new());
    let user = seeded_user(&store, "USR-SCEN0011", now).await;
    let engine = engine_at(store.clone(), Arc::new(StubScorer(0.95)), now);

    // High model score with an over-limit amount: combined lands >= 0.7
    let response = engine
        .process_transaction(request(&user.user_id, 15_000.0))
        .await
        .unwrap();
    assert_eq!(response.status, TransactionStatus::Declined);

    let stats = engine.user_fraud_statistics(&user.user_id).await.unwrap();
    assert_eq!(stats.user_id, user.user_id);
    assert_eq!(stats.trust_score, 80.0);
    assert_eq!(stats.total_fraud_alerts, 1);
    assert_eq!(stats.fraudulent_transactions, 1);
    assert!(!stats.account_locked);
}

#[tokio::test]
async fn repeated_registration_returns_existing_user() {
    let now = afternoon();
    let store = Arc::new(MemoryStore::new());
    let engine = engine_at(store, Arc::new(StubScorer(0.1)), now);

    let first = engine
        .register_user(
            Some("Ada".to_string()),
            "ada@example.com".to_string(),
            "+15550001234".to_string(),
            "secret".to_string(),
        )
        .await
        .unwrap();
    assert_eq!(first.trust_score, 100.0);
    assert!(first.user_id.starts_with("USR-"));

    let second = engine
        .register_user(
            Some("Ada Again".to_string()),
            "ada@example.com".to_string(),
            "+15550005678".to_string(),
            "other".to_string(),
        )
        .await
        .unwrap();
    assert_eq!(second.user_id, first.user_id);
}
