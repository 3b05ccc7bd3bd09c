//! Type definitions for the fraud detection engine

pub mod alert;
pub mod behavior;
pub mod decision;
pub mod response;
pub mod transaction;
pub mod user;

pub use alert::{AlertAction, AlertSeverity, DetectionMethod, FraudAlert, RiskLevel};
pub use behavior::UserBehavior;
pub use decision::{BehaviorFlags, FraudDecision, Recommendation};
pub use response::{BehaviorAnalysis, FraudAnalysis, TransactionResponse, UserFraudStatistics};
pub use transaction::{
    FraudStatus, Transaction, TransactionRequest, TransactionStatus, TransactionType,
};
pub use user::User;
