//! In-process store used by tests and the demo binary

use super::{Store, StoreResult};
use crate::types::{FraudAlert, FraudStatus, Transaction, User, UserBehavior};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    transactions: HashMap<String, Transaction>,
    behaviors: HashMap<String, UserBehavior>,
    /// Keyed by transaction id: the upsert discipline for alerts
    alerts: HashMap<String, FraudAlert>,
}

/// Hash-map backed [`Store`]. The single write lock trivially satisfies the
/// per-user serialization requirement of `update_user`.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user_by_id(&self, user_id: &str) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_phone(&self, phone_number: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.phone_number == phone_number)
            .cloned())
    }

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        Ok(self.find_user_by_email(email).await?.is_some())
    }

    async fn exists_by_phone(&self, phone_number: &str) -> StoreResult<bool> {
        Ok(self.find_user_by_phone(phone_number).await?.is_some())
    }

    async fn save_user(&self, user: &User) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .users
            .insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn update_user(
        &self,
        user_id: &str,
        update: Box<dyn for<'a> FnOnce(&'a mut User) + Send + 'static>,
    ) -> StoreResult<Option<User>> {
        let mut inner = self.inner.write().await;
        Ok(inner.users.get_mut(user_id).map(|user| {
            update(user);
            user.clone()
        }))
    }

    async fn find_transaction_by_id(
        &self,
        transaction_id: &str,
    ) -> StoreResult<Option<Transaction>> {
        Ok(self
            .inner
            .read()
            .await
            .transactions
            .get(transaction_id)
            .cloned())
    }

    async fn find_by_user_id_order_by_time_desc(
        &self,
        user_id: &str,
    ) -> StoreResult<Vec<Transaction>> {
        let inner = self.inner.read().await;
        let mut transactions: Vec<Transaction> = inner
            .transactions
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        transactions.sort_by(|a, b| b.transaction_time.cmp(&a.transaction_time));
        Ok(transactions)
    }

    async fn count_transactions_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .transactions
            .values()
            .filter(|t| t.user_id == user_id && t.transaction_time > since)
            .count() as u64)
    }

    async fn find_distinct_devices_by_user_id(&self, user_id: &str) -> StoreResult<Vec<String>> {
        let inner = self.inner.read().await;
        let mut devices: Vec<String> = inner
            .transactions
            .values()
            .filter(|t| t.user_id == user_id)
            .filter_map(|t| t.device_id.clone())
            .collect();
        devices.sort();
        devices.dedup();
        Ok(devices)
    }

    async fn find_distinct_countries_by_user_id(&self, user_id: &str) -> StoreResult<Vec<String>> {
        let inner = self.inner.read().await;
        let mut countries: Vec<String> = inner
            .transactions
            .values()
            .filter(|t| t.user_id == user_id)
            .filter_map(|t| t.country.clone())
            .collect();
        countries.sort();
        countries.dedup();
        Ok(countries)
    }

    async fn count_fraudulent_transactions(&self, user_id: &str) -> StoreResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .transactions
            .values()
            .filter(|t| t.user_id == user_id && t.fraud_status == FraudStatus::Fraud)
            .count() as u64)
    }

    async fn save_transaction(&self, transaction: &Transaction) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .transactions
            .insert(transaction.transaction_id.clone(), transaction.clone());
        Ok(())
    }

    async fn find_behavior_by_user_id(&self, user_id: &str) -> StoreResult<Option<UserBehavior>> {
        Ok(self.inner.read().await.behaviors.get(user_id).cloned())
    }

    async fn save_behavior(&self, behavior: &UserBehavior) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .behaviors
            .insert(behavior.user_id.clone(), behavior.clone());
        Ok(())
    }

    async fn save_fraud_alert(&self, alert: &FraudAlert) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .alerts
            .insert(alert.transaction_id.clone(), alert.clone());
        Ok(())
    }

    async fn find_alerts_by_user_id(&self, user_id: &str) -> StoreResult<Vec<FraudAlert>> {
        let inner = self.inner.read().await;
        let mut alerts: Vec<FraudAlert> = inner
            .alerts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        Ok(alerts)
    }

    async fn find_unreviewed_alerts(&self) -> StoreResult<Vec<FraudAlert>> {
        let inner = self.inner.read().await;
        let mut alerts: Vec<FraudAlert> = inner
            .alerts
            .values()
            .filter(|a| !a.reviewed)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        Ok(alerts)
    }

    async fn find_alert_by_id(&self, alert_id: &str) -> StoreResult<Option<FraudAlert>> {
        let inner = self.inner.read().await;
        Ok(inner
            .alerts
            .values()
            .find(|a| a.alert_id == alert_id)
            .cloned())
    }
}
