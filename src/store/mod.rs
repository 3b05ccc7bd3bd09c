//! Persistence contract for users, transactions, behavior profiles, and alerts
//!
//! The engine only ever talks to this trait; durable backends live behind it.
//! Absent records come back as `Ok(None)` — "not found" is never an error at
//! this boundary.

mod memory;

pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::types::{FraudAlert, Transaction, User, UserBehavior};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub type StoreResult<T> = Result<T, StoreError>;

/// Read/write operations over persisted state. No policy lives here.
#[async_trait]
pub trait Store: Send + Sync {
    // Users
    async fn find_user_by_id(&self, user_id: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_phone(&self, phone_number: &str) -> StoreResult<Option<User>>;
    async fn exists_by_email(&self, email: &str) -> StoreResult<bool>;
    async fn exists_by_phone(&self, phone_number: &str) -> StoreResult<bool>;
    async fn save_user(&self, user: &User) -> StoreResult<()>;

    /// Atomic per-user read-modify-write.
    ///
    /// Two concurrent scorings of the same user must not interleave their
    /// trust-score reads and writes; implementations serialize the closure
    /// against other updates for the same user (row-level transaction or an
    /// equivalent lock). Returns the updated user, or `None` when absent.
    async fn update_user(
        &self,
        user_id: &str,
        update: Box<dyn for<'a> FnOnce(&'a mut User) + Send + 'static>,
    ) -> StoreResult<Option<User>>;

    // Transactions
    async fn find_transaction_by_id(&self, transaction_id: &str)
        -> StoreResult<Option<Transaction>>;
    async fn find_by_user_id_order_by_time_desc(
        &self,
        user_id: &str,
    ) -> StoreResult<Vec<Transaction>>;
    async fn count_transactions_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<u64>;
    async fn find_distinct_devices_by_user_id(&self, user_id: &str) -> StoreResult<Vec<String>>;
    async fn find_distinct_countries_by_user_id(&self, user_id: &str) -> StoreResult<Vec<String>>;
    async fn count_fraudulent_transactions(&self, user_id: &str) -> StoreResult<u64>;
    async fn save_transaction(&self, transaction: &Transaction) -> StoreResult<()>;

    // Behavior profiles (one per user)
    async fn find_behavior_by_user_id(&self, user_id: &str) -> StoreResult<Option<UserBehavior>>;
    async fn save_behavior(&self, behavior: &UserBehavior) -> StoreResult<()>;

    // Alerts
    /// Upsert keyed on `transaction_id`: at most one alert per transaction.
    async fn save_fraud_alert(&self, alert: &FraudAlert) -> StoreResult<()>;
    async fn find_alerts_by_user_id(&self, user_id: &str) -> StoreResult<Vec<FraudAlert>>;
    async fn find_unreviewed_alerts(&self) -> StoreResult<Vec<FraudAlert>>;
    async fn find_alert_by_id(&self, alert_id: &str) -> StoreResult<Option<FraudAlert>>;
}
