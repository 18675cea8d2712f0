//! Settlement counters for staked matchmaking attempts

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Counter metric for tracking cumulative values
#[derive(Debug, Default)]
struct Counter {
    value: AtomicU64,
}

impl Counter {
    fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    fn add(&self, amount: u64) {
        self.value.fetch_add(amount, Ordering::Relaxed);
    }

    fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub attempts_started: u64,
    pub matches_started: u64,
    pub debits: u64,
    pub debited_amount: u64,
    pub refunds: u64,
    pub refunded_amount: u64,
    pub refund_failures: u64,
    pub seat_rejections: u64,
    pub seat_ack_timeouts: u64,
    pub matchmaking_timeouts: u64,
    pub cancellations: u64,
    pub failures: u64,
}

/// Counters shared by every orchestrator built from the same registry
#[derive(Debug, Default)]
pub struct SettlementMetrics {
    attempts_started: Counter,
    matches_started: Counter,
    debits: Counter,
    debited_amount: Counter,
    refunds: Counter,
    refunded_amount: Counter,
    refund_failures: Counter,
    seat_rejections: Counter,
    seat_ack_timeouts: Counter,
    matchmaking_timeouts: Counter,
    cancellations: Counter,
    failures: Counter,
    seat_ack_latency_ms: Mutex<Vec<u64>>,
}

/// Seat-ack latency samples kept for the percentile
const MAX_LATENCY_SAMPLES: usize = 1000;

impl SettlementMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self) {
        self.attempts_started.increment();
    }

    pub fn record_match_started(&self) {
        self.matches_started.increment();
    }

    pub fn record_debit(&self, amount: u64) {
        self.debits.increment();
        self.debited_amount.add(amount);
    }

    pub fn record_refund(&self, amount: u64, succeeded: bool) {
        if succeeded {
            self.refunds.increment();
            self.refunded_amount.add(amount);
        } else {
            self.refund_failures.increment();
        }
    }

    pub fn record_seat_rejected(&self) {
        self.seat_rejections.increment();
    }

    pub fn record_seat_ack_timeout(&self) {
        self.seat_ack_timeouts.increment();
    }

    pub fn record_matchmaking_timeout(&self) {
        self.matchmaking_timeouts.increment();
    }

    pub fn record_cancellation(&self) {
        self.cancellations.increment();
    }

    pub fn record_failure(&self) {
        self.failures.increment();
    }

    pub fn record_seat_ack_latency(&self, latency: Duration) {
        if let Ok(mut samples) = self.seat_ack_latency_ms.lock() {
            samples.push(u64::try_from(latency.as_millis()).unwrap_or(u64::MAX));
            if samples.len() > MAX_LATENCY_SAMPLES {
                samples.remove(0);
            }
        }
    }

    /// p-th percentile of recorded seat-ack latencies in milliseconds
    pub fn seat_ack_latency_percentile(&self, p: f64) -> Option<u64> {
        let mut samples = self.seat_ack_latency_ms.lock().ok()?.clone();
        if samples.is_empty() {
            return None;
        }
        samples.sort_unstable();
        let index = ((p / 100.0) * samples.len() as f64) as usize;
        samples.get(index.min(samples.len() - 1)).copied()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attempts_started: self.attempts_started.get(),
            matches_started: self.matches_started.get(),
            debits: self.debits.get(),
            debited_amount: self.debited_amount.get(),
            refunds: self.refunds.get(),
            refunded_amount: self.refunded_amount.get(),
            refund_failures: self.refund_failures.get(),
            seat_rejections: self.seat_rejections.get(),
            seat_ack_timeouts: self.seat_ack_timeouts.get(),
            matchmaking_timeouts: self.matchmaking_timeouts.get(),
            cancellations: self.cancellations.get(),
            failures: self.failures.get(),
        }
    }

    /// Export counters in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let counters = [
            ("tablestake_attempts_started_total", snapshot.attempts_started),
            ("tablestake_matches_started_total", snapshot.matches_started),
            ("tablestake_debits_total", snapshot.debits),
            ("tablestake_debited_amount_total", snapshot.debited_amount),
            ("tablestake_refunds_total", snapshot.refunds),
            ("tablestake_refunded_amount_total", snapshot.refunded_amount),
            ("tablestake_refund_failures_total", snapshot.refund_failures),
            ("tablestake_seat_rejections_total", snapshot.seat_rejections),
            ("tablestake_seat_ack_timeouts_total", snapshot.seat_ack_timeouts),
            ("tablestake_matchmaking_timeouts_total", snapshot.matchmaking_timeouts),
            ("tablestake_cancellations_total", snapshot.cancellations),
            ("tablestake_failures_total", snapshot.failures),
        ];

        let mut output = String::new();
        for (name, value) in counters {
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n", name, value));
        }

        if let Some(p95) = self.seat_ack_latency_percentile(95.0) {
            output.push_str("# TYPE tablestake_seat_ack_latency_ms summary\n");
            output.push_str(&format!("tablestake_seat_ack_latency_ms{{quantile=\"0.95\"}} {}\n", p95));
        }

        output
    }
}
