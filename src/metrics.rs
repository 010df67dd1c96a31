use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sliding window of transform latencies
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: Arc<Mutex<VecDeque<u64>>>,
    window_size: usize,
}

impl LatencyWindow {
    pub fn new(window_size: usize) -> Self {
        Self {
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(window_size))),
            window_size: window_size.max(1),
        }
    }

    /// Record one transform duration in nanoseconds
    pub fn record(&self, nanos: u64) {
        let mut samples = self.samples.lock();
        if samples.len() >= self.window_size {
            samples.pop_front();
        }
        samples.push_back(nanos);
    }

    /// Percentile in microseconds, `p` in `0.0..=1.0`
    pub fn percentile_us(&self, p: f64) -> f64 {
        let mut sorted: Vec<u64> = self.samples.lock().iter().copied().collect();
        if sorted.is_empty() {
            return 0.0;
        }
        sorted.sort_unstable();

        let idx = ((sorted.len() as f64 * p).ceil() as usize)
            .saturating_sub(1)
            .min(sorted.len() - 1);
        sorted[idx] as f64 / 1000.0
    }

    pub fn count(&self) -> usize {
        self.samples.lock().len()
    }
}

/// Per-stage counters, updated by the run loop and readable from any thread.
///
/// Cloning shares the underlying counters.
#[derive(Debug, Clone)]
pub struct StageMetrics {
    inputs: Arc<AtomicU64>,
    idle_polls: Arc<AtomicU64>,
    outputs: Arc<AtomicU64>,
    swallowed: Arc<AtomicU64>,
    dispatch_failures: Arc<AtomicU64>,
    latency: LatencyWindow,
    start_time: Instant,
}

impl StageMetrics {
    pub fn new() -> Self {
        Self {
            inputs: Arc::new(AtomicU64::new(0)),
            idle_polls: Arc::new(AtomicU64::new(0)),
            outputs: Arc::new(AtomicU64::new(0)),
            swallowed: Arc::new(AtomicU64::new(0)),
            dispatch_failures: Arc::new(AtomicU64::new(0)),
            latency: LatencyWindow::new(1000),
            start_time: Instant::now(),
        }
    }

    pub(crate) fn record_input(&self) {
        self.inputs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_idle(&self) {
        self.idle_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_output(&self) {
        self.outputs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_swallowed(&self) {
        self.swallowed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatch_failure(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_latency(&self, elapsed: Duration) {
        self.latency.record(elapsed.as_nanos() as u64);
    }

    /// Inputs handed to the transform
    pub fn inputs(&self) -> u64 {
        self.inputs.load(Ordering::Relaxed)
    }

    /// Iterations where acquire-input produced nothing
    pub fn idle_polls(&self) -> u64 {
        self.idle_polls.load(Ordering::Relaxed)
    }

    /// Outputs delivered successfully
    pub fn outputs(&self) -> u64 {
        self.outputs.load(Ordering::Relaxed)
    }

    /// Inputs the transform consumed without producing output
    pub fn swallowed(&self) -> u64 {
        self.swallowed.load(Ordering::Relaxed)
    }

    pub fn dispatch_failures(&self) -> u64 {
        self.dispatch_failures.load(Ordering::Relaxed)
    }

    /// Transformed inputs per second since creation
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.inputs() as f64 / elapsed
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            inputs: self.inputs(),
            idle_polls: self.idle_polls(),
            outputs: self.outputs(),
            swallowed: self.swallowed(),
            dispatch_failures: self.dispatch_failures(),
            throughput: self.throughput(),
            latency_p50_us: self.latency.percentile_us(0.50),
            latency_p99_us: self.latency.percentile_us(0.99),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for StageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of a stage's counters
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub inputs: u64,
    pub idle_polls: u64,
    pub outputs: u64,
    pub swallowed: u64,
    pub dispatch_failures: u64,
    pub throughput: f64,
    pub latency_p50_us: f64,
    pub latency_p99_us: f64,
    pub elapsed: Duration,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "inputs: {}, outputs: {}, swallowed: {}, dispatch failures: {}, idle: {}, \
             throughput: {:.2}/s, p50: {:.2}µs, p99: {:.2}µs, elapsed: {:.2}s",
            self.inputs,
            self.outputs,
            self.swallowed,
            self.dispatch_failures,
            self.idle_polls,
            self.throughput,
            self.latency_p50_us,
            self.latency_p99_us,
            self.elapsed.as_secs_f64()
        )
    }
}
