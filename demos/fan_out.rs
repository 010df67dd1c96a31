//! A hand-written stage fanning each output out to two callbacks
//!
//! Usage: cargo run --example fan_out

use modular_pipeline::{Callbacks, OutputSink, SpinMode, Stage, StageConfig, StageCore, StageWorker};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Generates its own input instead of reading a queue
struct TickerStage {
    core: StageCore,
    ticks: AtomicU64,
    outputs: Callbacks<String>,
}

impl TickerStage {
    fn new(id: &str) -> Self {
        Self {
            core: StageCore::new(StageConfig::new(id, SpinMode::Continuous)),
            ticks: AtomicU64::new(0),
            outputs: Callbacks::new(),
        }
    }
}

impl Stage for TickerStage {
    type Input = u64;
    type Output = String;

    fn core(&self) -> &StageCore {
        &self.core
    }

    fn acquire_input(&self) -> Option<u64> {
        thread::sleep(Duration::from_millis(1));
        Some(self.ticks.fetch_add(1, Ordering::Relaxed))
    }

    fn transform(&self, tick: u64) -> Option<String> {
        Some(format!("[Output] = tick {tick}"))
    }

    fn dispatch_output(&self, output: String) -> bool {
        self.outputs.dispatch(output)
    }

    fn teardown_queues(&self) {}
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let stage = Arc::new(TickerStage::new("ticker"));
    stage.outputs.register(|out: &String| info!("CB_1 receives: {out}"));
    stage.outputs.register(|out: &String| info!("CB_2 receives: {out}"));

    let worker = StageWorker::spawn(Arc::clone(&stage)).expect("failed to start worker");
    thread::sleep(Duration::from_millis(5));
    worker.shutdown().expect("failed to stop worker");

    info!("{}", stage.metrics().snapshot());
}
