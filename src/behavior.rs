//! Behavioral profile aggregation
//!
//! The aggregator is the sole writer of [`UserBehavior`]. It recomputes the
//! whole profile from the user's accepted transaction history and is
//! idempotent: duplicate or out-of-order runs over the same history converge
//! to the same profile. Scoring reads profiles as immutable snapshots.

use crate::store::{Store, StoreResult};
use crate::types::{FraudStatus, Transaction, TransactionStatus, UserBehavior};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const TOP_HOURS: usize = 3;
const TOP_DAYS: usize = 3;
const TOP_CITIES: usize = 5;
const TOP_MERCHANTS: usize = 10;
const TOP_CATEGORIES: usize = 5;

/// Seconds in a week, the normalization base for inter-arrival intervals.
const WEEK_SECONDS: f64 = 604_800.0;

/// Recomputes user behavior profiles from transaction history.
pub struct BehaviorAggregator {
    store: Arc<dyn Store>,
}

impl BehaviorAggregator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Get the user's profile, creating and persisting a neutral one on
    /// first reference.
    pub async fn profile_for(&self, user_id: &str) -> StoreResult<UserBehavior> {
        if let Some(behavior) = self.store.find_behavior_by_user_id(user_id).await? {
            return Ok(behavior);
        }

        let behavior = UserBehavior::neutral(user_id.to_string(), Utc::now());
        self.store.save_behavior(&behavior).await?;
        Ok(behavior)
    }

    /// Recompute the profile from current history. Errors never escape this
    /// boundary; the next transaction triggers a retry.
    pub async fn update(&self, user_id: &str) {
        if let Err(e) = self.update_at(user_id, Utc::now()).await {
            error!(user_id, error = %e, "Error updating user behavior");
        }
    }

    /// Deterministic core of [`update`], anchored to an explicit `now`.
    pub async fn update_at(&self, user_id: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let transactions = self
            .store
            .find_by_user_id_order_by_time_desc(user_id)
            .await?;
        if transactions.is_empty() {
            debug!(user_id, "No transactions found, profile unchanged");
            return Ok(());
        }

        let mut behavior = self.profile_for(user_id).await?;

        // Only accepted transactions shape the profile
        let accepted: Vec<&Transaction> = transactions.iter().filter(|t| is_accepted(t)).collect();
        if accepted.is_empty() {
            return Ok(());
        }

        self.update_amount_statistics(&mut behavior, &accepted, now);
        self.update_time_patterns(&mut behavior, &accepted);
        self.update_location_patterns(&mut behavior, &accepted);
        self.update_device_patterns(&mut behavior, &accepted);
        self.update_merchant_patterns(&mut behavior, &accepted);
        self.update_behavioral_scores(&mut behavior, &accepted);

        behavior.data_points_count = accepted.len() as u64;
        behavior.last_updated = now;

        self.store.save_behavior(&behavior).await?;
        info!(user_id, data_points = behavior.data_points_count, "Behavior profile updated");
        Ok(())
    }

    fn update_amount_statistics(
        &self,
        behavior: &mut UserBehavior,
        accepted: &[&Transaction],
        now: DateTime<Utc>,
    ) {
        let amounts: Vec<f64> = accepted.iter().map(|t| t.amount).collect();
        let stats = AmountStats::from_values(&amounts);

        behavior.avg_transaction_amount = Some(stats.mean);
        behavior.max_transaction_amount = Some(stats.max);
        behavior.min_transaction_amount = Some(stats.min);
        behavior.std_dev_transaction_amount = Some(stats.std_dev);

        behavior.transactions_per_day = count_since(accepted, now - Duration::days(1));
        behavior.transactions_per_week = count_since(accepted, now - Duration::days(7));
        behavior.transactions_per_month = count_since(accepted, now - Duration::days(30));
    }

    fn update_time_patterns(&self, behavior: &mut UserBehavior, accepted: &[&Transaction]) {
        behavior.preferred_hours = top_k(
            accepted.iter().map(|t| t.transaction_time.hour()),
            TOP_HOURS,
        );
        behavior.preferred_days = top_k(
            accepted
                .iter()
                .map(|t| t.transaction_time.weekday().number_from_monday()),
            TOP_DAYS,
        );
    }

    fn update_location_patterns(&self, behavior: &mut UserBehavior, accepted: &[&Transaction]) {
        behavior.frequent_countries =
            distinct_sorted(accepted.iter().filter_map(|t| t.country.clone()));
        behavior.frequent_cities = top_k(
            accepted.iter().filter_map(|t| t.city.clone()),
            TOP_CITIES,
        );
    }

    fn update_device_patterns(&self, behavior: &mut UserBehavior, accepted: &[&Transaction]) {
        behavior.known_devices =
            distinct_sorted(accepted.iter().filter_map(|t| t.device_id.clone()));
        behavior.known_ip_addresses =
            distinct_sorted(accepted.iter().filter_map(|t| t.ip_address.clone()));
    }

    fn update_merchant_patterns(&self, behavior: &mut UserBehavior, accepted: &[&Transaction]) {
        behavior.frequent_merchants = top_k(
            accepted.iter().filter_map(|t| t.merchant_id.clone()),
            TOP_MERCHANTS,
        );
        behavior.frequent_categories = top_k(
            accepted.iter().filter_map(|t| t.merchant_category.clone()),
            TOP_CATEGORIES,
        );
    }

    fn update_behavioral_scores(&self, behavior: &mut UserBehavior, accepted: &[&Transaction]) {
        behavior.consistency_score = consistency_score(accepted);
        behavior.diversity_score = diversity_score(accepted);
        behavior.velocity_pattern = velocity_pattern(accepted);
    }
}

pub(crate) fn is_accepted(transaction: &Transaction) -> bool {
    transaction.fraud_status == FraudStatus::Safe
        || transaction.status == TransactionStatus::Approved
}

fn count_since(accepted: &[&Transaction], since: DateTime<Utc>) -> u64 {
    accepted
        .iter()
        .filter(|t| t.transaction_time > since)
        .count() as u64
}

/// Descriptive statistics over transaction amounts. The standard deviation is
/// the sample deviation (n − 1), zero with fewer than two values.
struct AmountStats {
    mean: f64,
    max: f64,
    min: f64,
    std_dev: f64,
}

impl AmountStats {
    fn from_values(values: &[f64]) -> Self {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let max = values.iter().cloned().fold(f64::MIN, f64::max);
        let min = values.iter().cloned().fold(f64::MAX, f64::min);
        let std_dev = if values.len() < 2 {
            0.0
        } else {
            let variance =
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            variance.sqrt()
        };

        Self {
            mean,
            max,
            min,
            std_dev,
        }
    }
}

/// Predictability of spending: low coefficient of variation means high
/// consistency. Neutral under ten data points.
fn consistency_score(accepted: &[&Transaction]) -> f64 {
    if accepted.len() < 10 {
        return 0.5;
    }

    let amounts: Vec<f64> = accepted.iter().map(|t| t.amount).collect();
    let stats = AmountStats::from_values(&amounts);
    let coefficient_of_variation = stats.std_dev / stats.mean;

    (1.0 - coefficient_of_variation.min(1.0)).max(0.0)
}

fn diversity_score(accepted: &[&Transaction]) -> f64 {
    let merchants = distinct_sorted(accepted.iter().filter_map(|t| t.merchant_id.clone())).len();
    let categories =
        distinct_sorted(accepted.iter().filter_map(|t| t.merchant_category.clone())).len();

    let merchant_diversity = (merchants as f64 / 20.0).min(1.0);
    let category_diversity = (categories as f64 / 10.0).min(1.0);

    (merchant_diversity + category_diversity) / 2.0
}

/// Mean inter-arrival interval normalized against a week, clamped to [0, 1].
/// Neutral with fewer than two samples.
fn velocity_pattern(accepted: &[&Transaction]) -> f64 {
    if accepted.len() < 2 {
        return 0.5;
    }

    let intervals: Vec<f64> = accepted
        .windows(2)
        .map(|pair| {
            (pair[0].transaction_time - pair[1].transaction_time)
                .num_seconds()
                .unsigned_abs() as f64
        })
        .collect();

    let avg_interval = intervals.iter().sum::<f64>() / intervals.len() as f64;
    (avg_interval / WEEK_SECONDS).min(1.0)
}

/// Keys ranked by frequency, ties broken by the natural key order so the
/// result is deterministic, truncated to `k`.
fn top_k<K: Ord + Hash>(items: impl Iterator<Item = K>, k: usize) -> Vec<K> {
    let mut counts: HashMap<K, u64> = HashMap::new();
    for item in items {
        *counts.entry(item).or_insert(0) += 1;
    }

    let mut entries: Vec<(K, u64)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(k);
    entries.into_iter().map(|(key, _)| key).collect()
}

fn distinct_sorted(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut values: Vec<String> = items.collect();
    values.sort();
    values.dedup();
    values
}

/// Handle for scheduling background profile updates. Cloneable; dropping all
/// handles shuts the worker down.
#[derive(Clone)]
pub struct BehaviorQueue {
    sender: mpsc::Sender<String>,
}

impl BehaviorQueue {
    /// Enqueue a profile update without waiting for it. A full queue drops
    /// the request: the aggregator is idempotent and the next transaction
    /// schedules it again.
    pub fn schedule(&self, user_id: &str) {
        if let Err(e) = self.sender.try_send(user_id.to_string()) {
            warn!(user_id, error = %e, "Behavior update queue full, dropping request");
        }
    }
}

/// Spawn the background worker that drains the update queue.
pub fn spawn_behavior_worker(
    aggregator: Arc<BehaviorAggregator>,
    queue_depth: usize,
) -> BehaviorQueue {
    let (sender, mut receiver) = mpsc::channel::<String>(queue_depth.max(1));

    tokio::spawn(async move {
        while let Some(user_id) = receiver.recv().await {
            aggregator.update(&user_id).await;
        }
        debug!("Behavior worker shutting down");
    });

    BehaviorQueue { sender }
}
