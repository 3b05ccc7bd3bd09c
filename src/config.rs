//! Configuration management for the fraud detection engine

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub fraud: FraudConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Thresholds driving the rule engine
#[derive(Debug, Clone, Deserialize)]
pub struct FraudConfig {
    /// Hard per-transaction amount ceiling
    #[serde(default = "default_max_transaction_amount")]
    pub max_transaction_amount: f64,
    /// Velocity limit for the trailing hour
    #[serde(default = "default_max_transactions_per_hour")]
    pub max_transactions_per_hour: u64,
    /// Velocity limit for the trailing day
    #[serde(default = "default_max_transactions_per_day")]
    pub max_transactions_per_day: u64,
}

/// Model scorer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Where serialized network weights live; a missing file means a freshly
    /// initialized model
    #[serde(default = "default_model_path")]
    pub path: String,
    /// Reserved for confidence-gated decisions
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Soft time budget for one score call; on expiry the pipeline proceeds
    /// rule-only
    #[serde(default = "default_score_timeout_ms")]
    pub score_timeout_ms: u64,
}

/// Pipeline concurrency configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Concurrent request workers in the demo driver
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Capacity of the background behavior-aggregation queue
    #[serde(default = "default_behavior_queue_depth")]
    pub behavior_queue_depth: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_max_transaction_amount() -> f64 {
    10_000.0
}

fn default_max_transactions_per_hour() -> u64 {
    10
}

fn default_max_transactions_per_day() -> u64 {
    50
}

fn default_model_path() -> String {
    "models/fraud_model.json".to_string()
}

fn default_confidence_threshold() -> f64 {
    0.7
}

fn default_score_timeout_ms() -> u64 {
    250
}

fn default_workers() -> usize {
    4
}

fn default_behavior_queue_depth() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl AppConfig {
    /// Load configuration from the default file location, with
    /// `FRAUD_ENGINE__*` environment overrides on top.
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix("FRAUD_ENGINE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fraud: FraudConfig::default(),
            model: ModelConfig::default(),
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            max_transaction_amount: default_max_transaction_amount(),
            max_transactions_per_hour: default_max_transactions_per_hour(),
            max_transactions_per_day: default_max_transactions_per_day(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            confidence_threshold: default_confidence_threshold(),
            score_timeout_ms: default_score_timeout_ms(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            behavior_queue_depth: default_behavior_queue_depth(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
