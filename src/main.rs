//! Fraud Detection Engine - Demo Driver
//!
//! Registers a set of users, replays a synthetic mix of legitimate and
//! fraudulent transactions through the scoring pipeline, and prints a metrics
//! summary. Supports parallel transaction processing for throughput.

use anyhow::Result;
use fraud_detection_engine::{
    config::AppConfig, engine::FraudEngine, model::NeuralScorer, store::MemoryStore,
    types::TransactionRequest, Store, User,
};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

const DEMO_TRANSACTIONS: usize = 500;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fraud_detection_engine=info".parse()?),
        )
        .init();

    info!("Starting Fraud Detection Engine demo");

    // Load configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Falling back to default configuration");
        AppConfig::default()
    });
    info!(
        "Limits: amount<={:.0}, velocity {}/h {}/d, model budget {}ms",
        config.fraud.max_transaction_amount,
        config.fraud.max_transactions_per_hour,
        config.fraud.max_transactions_per_day,
        config.model.score_timeout_ms
    );

    // Assemble the engine
    let store = Arc::new(MemoryStore::new());
    let scorer = Arc::new(NeuralScorer::load_or_init(&config.model.path));
    let engine = Arc::new(FraudEngine::new(
        store.clone() as Arc<dyn Store>,
        scorer,
        &config,
    ));
    let metrics = engine.metrics();

    // Register demo users
    let mut users: Vec<User> = Vec::new();
    for i in 0..10 {
        let user = engine
            .register_user(
                Some(format!("Demo User {i}")),
                format!("demo{i}@example.com"),
                format!("+1555000{i:04}"),
                "demo-password".to_string(),
            )
            .await?;
        users.push(user);
    }
    info!(count = users.len(), "Demo users registered");

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(config.pipeline.workers));
    let processed_count = Arc::new(AtomicU64::new(0));
    let mut handles = Vec::with_capacity(DEMO_TRANSACTIONS);

    info!(
        workers = config.pipeline.workers,
        transactions = DEMO_TRANSACTIONS,
        "Starting transaction replay"
    );

    for i in 0..DEMO_TRANSACTIONS {
        let request = generate_request(&users, i);

        let permit = semaphore.clone().acquire_owned().await?;
        let engine = engine.clone();
        let processed_count = processed_count.clone();

        handles.push(tokio::spawn(async move {
            match engine.process_transaction(request).await {
                Ok(response) => {
                    let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
                    if count % 100 == 0 {
                        info!(
                            processed = count,
                            last_status = %response.status,
                            "Processing milestone"
                        );
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Transaction rejected");
                }
            }
            drop(permit);
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    // Let a round of behavior aggregation land before the summary
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    info!(
        processed = processed_count.load(Ordering::Relaxed),
        "Replay complete"
    );
    metrics.print_summary();

    for user in users.iter().take(3) {
        let stats = engine.user_fraud_statistics(&user.user_id).await?;
        info!(
            user_id = %stats.user_id,
            trust_score = stats.trust_score,
            alerts = stats.total_fraud_alerts,
            locked = stats.account_locked,
            "User fraud statistics"
        );
    }

    Ok(())
}

/// Generate a synthetic transaction request. Most are small and ordinary;
/// roughly one in twelve looks like a fraud attempt.
fn generate_request(users: &[User], sequence: usize) -> TransactionRequest {
    let mut rng = rand::thread_rng();
    let user = &users[sequence % users.len()];
    let fraudulent = sequence % 12 == 11;

    let (amount, country, device_id) = if fraudulent {
        (
            f64::from(rng.gen_range(5..15)) * 1000.0,
            pick(&mut rng, &["KP", "ZZ", "XX"]),
            format!("dev-burner-{}", rng.gen_range(1000..9999)),
        )
    } else {
        (
            rng.gen_range(10.0..400.0),
            pick(&mut rng, &["US", "US", "US", "CA"]),
            format!("dev-{}-{}", user.user_id, sequence % 2),
        )
    };

    TransactionRequest {
        user_id: user.user_id.clone(),
        amount,
        currency: "USD".to_string(),
        transaction_type: pick(&mut rng, &["CARD", "UPI", "WALLET", "QR_CODE"]),
        merchant_id: Some(format!("merchant_{}", rng.gen_range(1..40))),
        merchant_name: None,
        merchant_category: Some(pick(&mut rng, &["groceries", "dining", "fuel", "retail"])),
        ip_address: Some(format!(
            "{}.{}.{}.{}",
            rng.gen_range(1..255),
            rng.gen_range(0..255),
            rng.gen_range(0..255),
            rng.gen_range(1..255)
        )),
        country: Some(country),
        city: Some(pick(&mut rng, &["Austin", "Dallas", "Houston"])),
        latitude: Some(rng.gen_range(-60.0..60.0)),
        longitude: Some(rng.gen_range(-120.0..120.0)),
        device_id: Some(device_id),
        device_type: Some(pick(&mut rng, &["MOBILE", "WEB"])),
        device_fingerprint: Some(format!("fp_{:016x}", rng.gen::<u64>())),
        user_agent: None,
        qr_code_id: None,
        qr_code_data: None,
        metadata: None,
    }
}

fn pick(rng: &mut impl Rng, choices: &[&str]) -> String {
    choices[rng.gen_range(0..choices.len())].to_string()
}
