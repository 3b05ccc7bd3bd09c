//! Scoring throughput and latency tracking for the fraud detection engine.

use crate::types::alert::AlertSeverity;
use crate::types::transaction::TransactionStatus;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for the scoring pipeline
pub struct EngineMetrics {
    /// Total transactions scored
    pub transactions_processed: AtomicU64,
    /// Total alerts generated
    pub alerts_generated: AtomicU64,
    /// Decisions by terminal status
    decisions_by_status: RwLock<HashMap<String, u64>>,
    /// Alerts by severity
    alerts_by_severity: RwLock<HashMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Fraud score distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            transactions_processed: AtomicU64::new(0),
            alerts_generated: AtomicU64::new(0),
            decisions_by_status: RwLock::new(HashMap::new()),
            alerts_by_severity: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a scored transaction
    pub fn record_decision(
        &self,
        processing_time: Duration,
        fraud_score: f64,
        status: TransactionStatus,
    ) {
        self.transactions_processed.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only recent samples for memory efficiency
            if times.len() > 10_000 {
                times.drain(0..5_000);
            }
        }

        let bucket = ((fraud_score * 10.0) as usize).min(9);
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }

        if let Ok(mut by_status) = self.decisions_by_status.write() {
            *by_status.entry(status.to_string()).or_insert(0) += 1;
        }
    }

    /// Record an emitted alert
    pub fn record_alert(&self, severity: AlertSeverity) {
        self.alerts_generated.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_severity) = self.alerts_by_severity.write() {
            *by_severity.entry(severity.to_string()).or_insert(0) += 1;
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = match self.processing_times.read() {
            Ok(times) => times,
            Err(_) => return ProcessingStats::default(),
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get current throughput (transactions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    pub fn get_decisions_by_status(&self) -> HashMap<String, u64> {
        self.decisions_by_status
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn get_alerts_by_severity(&self) -> HashMap<String, u64> {
        self.alerts_by_severity
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let tx_count = self.transactions_processed.load(Ordering::Relaxed);
        let alert_count = self.alerts_generated.load(Ordering::Relaxed);
        let alert_rate = if tx_count > 0 {
            (alert_count as f64 / tx_count as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();
        let by_status = self.get_decisions_by_status();
        let by_severity = self.get_alerts_by_severity();
        let score_dist = self.get_score_distribution();

        info!("================ FRAUD ENGINE - METRICS SUMMARY ================");
        info!(
            "Transactions scored: {} | Throughput: {:.1} tx/s",
            tx_count, throughput
        );
        info!(
            "Alerts generated:    {} | Alert rate: {:.1}%",
            alert_count, alert_rate
        );
        info!(
            "Processing time (us): mean={} p50={} p95={} p99={}",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );

        info!("Decisions by status:");
        let mut statuses: Vec<_> = by_status.iter().collect();
        statuses.sort();
        for (status, count) in statuses {
            info!("  {:10}: {}", status, count);
        }

        if !by_severity.is_empty() {
            info!("Alerts by severity:");
            let mut severities: Vec<_> = by_severity.iter().collect();
            severities.sort();
            for (severity, count) in severities {
                info!("  {:10}: {}", severity, count);
            }
        }

        info!("Fraud score distribution:");
        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            let pct = if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            let bar = "#".repeat(((pct / 2.0) as usize).min(40));
            info!(
                "  {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("================================================================");
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}
