//! Transaction-processing coordinator
//!
//! Owns the synchronous scoring path: validate, enrich, score, decide, apply
//! feedback, respond. Behavior re-aggregation is handed to the background
//! queue after the response is assembled.

use crate::behavior::{self, spawn_behavior_worker, BehaviorAggregator, BehaviorQueue};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::decider::Decider;
use crate::error::EngineError;
use crate::feedback::{CheckPhase, FeedbackApplier};
use crate::metrics::EngineMetrics;
use crate::model::{FeatureExtractor, FraudScorer};
use crate::rules::{RuleContext, RuleEngine};
use crate::store::Store;
use crate::types::alert::AlertSeverity;
use crate::types::{
    FraudDecision, FraudStatus, Transaction, TransactionRequest, TransactionResponse,
    TransactionStatus, TransactionType, User, UserBehavior, UserFraudStatistics,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::task;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// The fraud scoring engine. One instance serves all requests; every
/// component it holds is re-entrant.
pub struct FraudEngine {
    store: Arc<dyn Store>,
    scorer: Arc<dyn FraudScorer>,
    extractor: FeatureExtractor,
    rules: RuleEngine,
    decider: Decider,
    feedback: FeedbackApplier,
    aggregator: Arc<BehaviorAggregator>,
    behavior_queue: BehaviorQueue,
    metrics: Arc<EngineMetrics>,
    score_timeout: std::time::Duration,
    clock: Arc<dyn Clock>,
}

impl FraudEngine {
    /// Assemble the engine and spawn its background behavior worker. Must be
    /// called from within a tokio runtime.
    pub fn new(store: Arc<dyn Store>, scorer: Arc<dyn FraudScorer>, config: &AppConfig) -> Self {
        Self::with_clock(store, scorer, config, Arc::new(SystemClock))
    }

    /// Engine with an explicit time source. Tests pin the clock so
    /// time-of-day rules and window counts are reproducible.
    pub fn with_clock(
        store: Arc<dyn Store>,
        scorer: Arc<dyn FraudScorer>,
        config: &AppConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let aggregator = Arc::new(BehaviorAggregator::new(store.clone()));
        let behavior_queue =
            spawn_behavior_worker(aggregator.clone(), config.pipeline.behavior_queue_depth);

        Self {
            feedback: FeedbackApplier::new(store.clone()),
            rules: RuleEngine::new(&config.fraud),
            decider: Decider::new(),
            extractor: FeatureExtractor::new(),
            aggregator,
            behavior_queue,
            metrics: Arc::new(EngineMetrics::new()),
            score_timeout: std::time::Duration::from_millis(config.model.score_timeout_ms),
            store,
            scorer,
            clock,
        }
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        self.metrics.clone()
    }

    /// Score an incoming transaction request and return the decision.
    ///
    /// Validation and user lookup failures surface as errors; a locked
    /// account short-circuits to a declined response without scoring. Any
    /// failure inside the scoring section itself degrades to the neutral
    /// error decision rather than erroring out — the transaction never stays
    /// PENDING once persisted.
    pub async fn process_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionResponse, EngineError> {
        let started = Instant::now();
        let transaction_type = request.validate()?;

        let user = self
            .store
            .find_user_by_id(&request.user_id)
            .await?
            .ok_or_else(|| EngineError::UserNotFound(request.user_id.clone()))?;

        if user.account_locked {
            warn!(user_id = %user.user_id, "Transaction rejected: account is locked");
            return Ok(locked_account_response(
                &request,
                transaction_type,
                self.clock.now(),
            ));
        }

        let now = self.clock.now();
        let mut transaction = Transaction::from_request(
            generate_transaction_id(),
            request,
            transaction_type,
            now,
        );

        // One history read feeds enrichment and the velocity read-out; the
        // device set is read before the initial persist so it only covers
        // previous transactions.
        let history = self
            .store
            .find_by_user_id_order_by_time_desc(&user.user_id)
            .await?;
        let behavior = self.aggregator.profile_for(&user.user_id).await?;
        let devices = self
            .store
            .find_distinct_devices_by_user_id(&user.user_id)
            .await;

        enrich(&mut transaction, &history, &behavior, now);
        self.store.save_transaction(&transaction).await?;

        // From here on the transaction must not stay PENDING: a failure
        // inside the scoring section degrades to the neutral error decision
        // instead of erroring out.
        let (mut decision, features) = match devices {
            Ok(known_devices) => {
                let context = RuleContext {
                    transactions_last_hour: transaction.transactions_in_last_hour.unwrap_or(0),
                    transactions_last_day: transaction.transactions_in_last_day.unwrap_or(0),
                    known_devices,
                    now,
                };
                self.score(&mut transaction, &user, &behavior, &context).await
            }
            Err(e) => {
                error!(
                    transaction_id = %transaction.transaction_id,
                    error = %e,
                    "Fraud pipeline failed, emitting neutral decision"
                );
                (self.decider.error_decision(), None)
            }
        };

        transaction.status = self.decider.pre_transaction_status(decision.fraud_score);
        transaction.fraud_status = decision.fraud_status;

        self.feedback
            .apply(
                &mut transaction,
                &decision,
                features.as_deref(),
                CheckPhase::Pre,
                now,
            )
            .await;

        self.behavior_queue.schedule(&user.user_id);

        decision.processing_time_ms = started.elapsed().as_millis() as u64;
        self.record_metrics(started, &decision, transaction.status);

        info!(
            transaction_id = %transaction.transaction_id,
            user_id = %user.user_id,
            status = %transaction.status,
            fraud_score = decision.fraud_score,
            processing_time_ms = decision.processing_time_ms,
            "Transaction processed"
        );

        Ok(TransactionResponse::from_decision(&transaction, &decision))
    }

    /// Process a QR-code payment: same pipeline with the QR payload required
    /// and the channel forced to QR_CODE.
    pub async fn process_qr_transaction(
        &self,
        mut request: TransactionRequest,
    ) -> Result<TransactionResponse, EngineError> {
        if request.qr_code_id.as_deref().map_or(true, str::is_empty)
            || request.qr_code_data.as_deref().map_or(true, str::is_empty)
        {
            return Err(EngineError::Validation("invalid QR code data".to_string()));
        }

        request.transaction_type = TransactionType::QrCode.to_string();
        self.process_transaction(request).await
    }

    /// Re-score the user's most recent transaction carrying `qr_code_id`
    /// after the QR scan, in post-transaction mode: high scores put the
    /// transaction on HOLD, critical scores block it and lock the account.
    pub async fn verify_qr_transaction(
        &self,
        qr_code_id: &str,
        user_id: &str,
    ) -> Result<TransactionResponse, EngineError> {
        let started = Instant::now();

        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| EngineError::UserNotFound(user_id.to_string()))?;

        let history = self
            .store
            .find_by_user_id_order_by_time_desc(user_id)
            .await?;
        let mut transaction = history
            .iter()
            .find(|t| t.qr_code_id.as_deref() == Some(qr_code_id))
            .cloned()
            .ok_or_else(|| {
                EngineError::TransactionNotFound(format!("no transaction for QR code {qr_code_id}"))
            })?;

        let behavior = self.aggregator.profile_for(user_id).await?;
        let now = self.clock.now();

        // The verified transaction is already persisted; the read-out must
        // only cover the rest of the history.
        let prior: Vec<&Transaction> = history
            .iter()
            .filter(|t| t.transaction_id != transaction.transaction_id)
            .collect();
        let hour_ago = now - Duration::hours(1);
        let day_ago = now - Duration::days(1);
        let mut known_devices: Vec<String> = prior
            .iter()
            .filter_map(|t| t.device_id.clone())
            .collect();
        known_devices.sort();
        known_devices.dedup();

        let context = RuleContext {
            transactions_last_hour: prior
                .iter()
                .filter(|t| t.transaction_time > hour_ago)
                .count() as u64,
            transactions_last_day: prior
                .iter()
                .filter(|t| t.transaction_time > day_ago)
                .count() as u64,
            known_devices,
            now,
        };
        transaction.transactions_in_last_hour = Some(context.transactions_last_hour);
        transaction.transactions_in_last_day = Some(context.transactions_last_day);

        let (mut decision, features) =
            self.score(&mut transaction, &user, &behavior, &context).await;

        let outcome = self.decider.post_transaction_outcome(decision.fraud_score);
        if let Some(status) = outcome.status {
            transaction.status = status;
        }
        transaction.fraud_status = outcome.fraud_status;

        self.feedback
            .apply(
                &mut transaction,
                &decision,
                features.as_deref(),
                CheckPhase::Post,
                now,
            )
            .await;

        self.behavior_queue.schedule(user_id);

        decision.processing_time_ms = started.elapsed().as_millis() as u64;
        self.record_metrics(started, &decision, transaction.status);

        info!(
            transaction_id = %transaction.transaction_id,
            user_id,
            status = %transaction.status,
            fraud_score = decision.fraud_score,
            "QR transaction verified"
        );

        Ok(TransactionResponse::from_decision(&transaction, &decision))
    }

    /// Register a new user. An already-registered email returns the existing
    /// account unchanged.
    pub async fn register_user(
        &self,
        name: Option<String>,
        email: String,
        phone_number: String,
        password: String,
    ) -> Result<User, EngineError> {
        if let Some(existing) = self.store.find_user_by_email(&email).await? {
            return Ok(existing);
        }

        let user = User::register(
            generate_user_id(),
            name,
            email,
            phone_number,
            password,
            self.clock.now(),
        );
        self.store.save_user(&user).await?;
        info!(user_id = %user.user_id, "New user registered");
        Ok(user)
    }

    pub async fn get_transaction(&self, transaction_id: &str) -> Result<Transaction, EngineError> {
        self.store
            .find_transaction_by_id(transaction_id)
            .await?
            .ok_or_else(|| EngineError::TransactionNotFound(transaction_id.to_string()))
    }

    pub async fn get_user_transactions(
        &self,
        user_id: &str,
    ) -> Result<Vec<Transaction>, EngineError> {
        Ok(self
            .store
            .find_by_user_id_order_by_time_desc(user_id)
            .await?)
    }

    /// Fraud exposure summary for one user.
    pub async fn user_fraud_statistics(
        &self,
        user_id: &str,
    ) -> Result<UserFraudStatistics, EngineError> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| EngineError::UserNotFound(user_id.to_string()))?;

        let alerts = self.store.find_alerts_by_user_id(user_id).await?;
        let fraudulent = self.store.count_fraudulent_transactions(user_id).await?;

        Ok(UserFraudStatistics {
            user_id: user.user_id,
            trust_score: user.trust_score,
            total_fraud_alerts: alerts.len() as u64,
            fraudulent_transactions: fraudulent,
            account_locked: user.account_locked,
        })
    }

    /// Run rule and model scoring and combine the results. Internal failures
    /// degrade to the neutral error decision.
    async fn score(
        &self,
        transaction: &mut Transaction,
        user: &User,
        behavior: &UserBehavior,
        context: &RuleContext,
    ) -> (FraudDecision, Option<Vec<f64>>) {
        let rules = self
            .rules
            .evaluate(transaction, Some(user), Some(behavior), context);

        // Flags become enrichment fields before feature extraction
        transaction.unusual_amount = Some(rules.flags.unusual_amount);
        transaction.unusual_time = Some(rules.flags.unusual_time);
        transaction.unusual_location = Some(rules.flags.unusual_location);
        transaction.unusual_device = Some(rules.flags.unusual_device);

        let features = self.extractor.extract(transaction, Some(behavior));

        let ml_score = {
            let scorer = self.scorer.clone();
            let features = features.clone();
            match timeout(
                self.score_timeout,
                task::spawn_blocking(move || scorer.score(&features)),
            )
            .await
            {
                Ok(Ok(score)) => Some(score.clamp(0.0, 1.0)),
                Ok(Err(e)) => {
                    error!(
                        transaction_id = %transaction.transaction_id,
                        error = %e,
                        "Model scorer task failed, proceeding rule-only"
                    );
                    None
                }
                Err(_) => {
                    warn!(
                        transaction_id = %transaction.transaction_id,
                        budget_ms = self.score_timeout.as_millis() as u64,
                        "Model scorer missed its time budget, proceeding rule-only"
                    );
                    None
                }
            }
        };

        let deviation = self.rules.behavior_deviation(transaction, Some(behavior));
        let decision = self
            .decider
            .combine(&rules, ml_score, Some(user), Some(behavior), deviation);

        (decision, Some(features))
    }

    fn record_metrics(&self, started: Instant, decision: &FraudDecision, status: TransactionStatus) {
        self.metrics
            .record_decision(started.elapsed(), decision.fraud_score, status);
        if decision.fraud_score >= 0.4 {
            self.metrics
                .record_alert(AlertSeverity::from_score(decision.fraud_score));
        }
    }
}

/// Enrich a fresh transaction from the user's prior history.
fn enrich(
    transaction: &mut Transaction,
    history: &[Transaction],
    behavior: &UserBehavior,
    now: DateTime<Utc>,
) {
    if let Some(last) = history.first() {
        transaction.time_since_last_transaction =
            Some((transaction.transaction_time - last.transaction_time).num_seconds());
    }

    let hour_ago = now - Duration::hours(1);
    let day_ago = now - Duration::days(1);
    transaction.transactions_in_last_hour = Some(
        history
            .iter()
            .filter(|t| t.transaction_time > hour_ago)
            .count() as u64,
    );
    transaction.transactions_in_last_day = Some(
        history
            .iter()
            .filter(|t| t.transaction_time > day_ago)
            .count() as u64,
    );

    let accepted_amounts: Vec<f64> = history
        .iter()
        .filter(|t| behavior::is_accepted(t))
        .map(|t| t.amount)
        .collect();
    transaction.avg_transaction_amount = Some(if accepted_amounts.is_empty() {
        transaction.amount
    } else {
        accepted_amounts.iter().sum::<f64>() / accepted_amounts.len() as f64
    });

    transaction.velocity_score = Some(behavior.velocity_pattern);
}

/// Declined response for a locked account; no scoring happens.
fn locked_account_response(
    request: &TransactionRequest,
    transaction_type: TransactionType,
    now: DateTime<Utc>,
) -> TransactionResponse {
    let reason = "Account is locked due to fraud";
    TransactionResponse {
        transaction_id: generate_transaction_id(),
        user_id: request.user_id.clone(),
        amount: request.amount,
        currency: request.currency.clone(),
        transaction_type,
        status: TransactionStatus::Declined,
        fraud_status: FraudStatus::Fraud,
        fraud_score: 1.0,
        fraud_reason: reason.to_string(),
        approved: false,
        message: format!("Transaction declined - {reason}"),
        transaction_time: now,
        fraud_analysis: None,
    }
}

fn generate_transaction_id() -> String {
    format!("TXN-{}", short_uuid())
}

fn generate_user_id() -> String {
    format!("USR-{}", short_uuid())
}

fn short_uuid() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}
