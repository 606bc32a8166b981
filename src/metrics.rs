//! Exchange timing - round-trip latency and retry tracking

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct TimingMetrics {
    round_trip_hist: Arc<Mutex<Histogram<u64>>>,
    exchanges: Arc<AtomicU64>,
    retries: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
}

impl TimingMetrics {
    pub fn new() -> Self {
        Self {
            round_trip_hist: Arc::new(Mutex::new(
                Histogram::new(3).expect("valid histogram precision"),
            )),
            exchanges: Arc::new(AtomicU64::new(0)),
            retries: Arc::new(AtomicU64::new(0)),
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_round_trip(&self, duration: Duration) {
        self.exchanges.fetch_add(1, Ordering::Relaxed);
        self.round_trip_hist
            .lock()
            .record(duration.as_micros() as u64)
            .ok();
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self) -> MetricsReport {
        let rtt = self.round_trip_hist.lock();

        MetricsReport {
            round_trip_p50: Duration::from_micros(rtt.value_at_quantile(0.5)),
            round_trip_p99: Duration::from_micros(rtt.value_at_quantile(0.99)),
            round_trip_max: Duration::from_micros(rtt.max()),
            exchanges: self.exchanges.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for TimingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsReport {
    pub round_trip_p50: Duration,
    pub round_trip_p99: Duration,
    pub round_trip_max: Duration,
    pub exchanges: u64,
    pub retries: u64,
    pub failures: u64,
}
