use crate::config::{SpinMode, StageConfig};
use crate::metrics::StageMetrics;
use crossbeam::utils::Backoff;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Lifecycle of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// Constructed, never spun
    Idle,
    /// Inside or between `spin()` calls
    Running,
    /// `shutdown()` called while a `spin()` was still in progress
    ShuttingDown,
    /// Shut down and no `spin()` in progress
    Stopped,
}

impl StageState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => StageState::Idle,
            1 => StageState::Running,
            2 => StageState::ShuttingDown,
            _ => StageState::Stopped,
        }
    }
}

/// Consumes one input and produces zero or one output.
///
/// Any `FnMut(I) -> Option<O>` closure is a transform.
pub trait Transform<I, O>: Send + 'static {
    fn transform(&mut self, input: I) -> Option<O>;
}

impl<I, O, F> Transform<I, O> for F
where
    F: FnMut(I) -> Option<O> + Send + 'static,
{
    fn transform(&mut self, input: I) -> Option<O> {
        self(input)
    }
}

/// State every stage carries: identity, run mode and lifecycle flags.
///
/// All flags are atomics so `shutdown()` may run on any thread while the
/// worker thread is inside `spin()`.
#[derive(Debug)]
pub struct StageCore {
    config: StageConfig,
    shutdown: AtomicBool,
    working: AtomicBool,
    spinning: AtomicBool,
    state: AtomicU8,
    metrics: StageMetrics,
}

impl StageCore {
    pub fn new(config: StageConfig) -> Self {
        Self {
            config,
            shutdown: AtomicBool::new(false),
            working: AtomicBool::new(false),
            spinning: AtomicBool::new(false),
            state: AtomicU8::new(StageState::Idle as u8),
            metrics: StageMetrics::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn mode(&self) -> SpinMode {
        self.config.mode
    }

    pub fn idle_sleep(&self) -> Duration {
        self.config.idle_sleep
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn is_working(&self) -> bool {
        self.working.load(Ordering::Acquire)
    }

    pub fn state(&self) -> StageState {
        StageState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    fn enter_spin(&self) -> SpinGuard<'_> {
        self.spinning.store(true, Ordering::SeqCst);
        let _ = self.state.compare_exchange(
            StageState::Idle as u8,
            StageState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        SpinGuard(self)
    }

    fn exit_spin(&self) {
        self.spinning.store(false, Ordering::SeqCst);
        if self.is_shutdown() {
            self.state.store(StageState::Stopped as u8, Ordering::Release);
        }
    }

    /// Returns `false` if shutdown had already been requested
    fn request_shutdown(&self) -> bool {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.state.store(StageState::ShuttingDown as u8, Ordering::Release);
        true
    }

    fn finish_shutdown(&self) {
        if !self.spinning.load(Ordering::SeqCst) {
            self.state.store(StageState::Stopped as u8, Ordering::Release);
        }
    }

    fn begin_work(&self) -> WorkingGuard<'_> {
        self.working.store(true, Ordering::Release);
        WorkingGuard(&self.working)
    }
}

/// Leaves the spin when `spin()` returns or a hook unwinds
struct SpinGuard<'a>(&'a StageCore);

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        self.0.exit_spin();
    }
}

/// Clears the working flag when the transform returns or unwinds
struct WorkingGuard<'a>(&'a AtomicBool);

impl Drop for WorkingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A pipeline stage: acquire input, transform it, dispatch the output.
///
/// Implementors provide the four hooks and a [`StageCore`]; the run loop,
/// shutdown and status methods are provided. Every method takes `&self` so
/// one thread can drive `spin()` while another calls `shutdown()`; share the
/// stage with an `Arc`.
pub trait Stage: Send + Sync {
    type Input;
    type Output;

    fn core(&self) -> &StageCore;

    /// Produce the next input, or `None` if nothing is available
    fn acquire_input(&self) -> Option<Self::Input>;

    /// Turn one input into zero or one output
    fn transform(&self, input: Self::Input) -> Option<Self::Output>;

    /// Deliver one output downstream; `false` on failure
    fn dispatch_output(&self, output: Self::Output) -> bool;

    /// Release anything blocked on queues this stage owns
    fn teardown_queues(&self);

    fn id(&self) -> &str {
        self.core().id()
    }

    /// True exactly while the transform hook runs
    fn is_working(&self) -> bool {
        self.core().is_working()
    }

    fn state(&self) -> StageState {
        self.core().state()
    }

    fn metrics(&self) -> &StageMetrics {
        self.core().metrics()
    }

    /// Run the stage.
    ///
    /// In sequential mode this performs at most one iteration and returns;
    /// in continuous mode it loops until `shutdown()` is observed. Returns
    /// immediately if the stage is already shut down. Input acquired after
    /// shutdown was requested is dropped rather than transformed.
    fn spin(&self) {
        let core = self.core();
        let _spinning = core.enter_spin();

        let backoff = Backoff::new();
        while !core.is_shutdown() {
            let progressed = run_iteration(self);

            if core.mode().is_sequential() {
                break;
            }

            if progressed {
                backoff.reset();
            } else if backoff.is_completed() {
                thread::sleep(core.idle_sleep());
            } else {
                backoff.snooze();
            }
        }
    }

    /// Stop the stage and tear down its queues. Repeated calls only warn.
    fn shutdown(&self) {
        let core = self.core();
        if !core.request_shutdown() {
            warn!(stage = %core.id(), "shutdown() already requested");
            return;
        }

        info!(stage = %core.id(), "shutting down queues");
        self.teardown_queues();
        core.finish_shutdown();
        info!(stage = %core.id(), "shutdown finished");
    }
}

/// One acquire → transform → dispatch pass. Returns whether input was found.
fn run_iteration<S: Stage + ?Sized>(stage: &S) -> bool {
    let core = stage.core();
    let metrics = core.metrics();

    let Some(input) = stage.acquire_input() else {
        metrics.record_idle();
        debug!(stage = %core.id(), "no input payload");
        return false;
    };
    if core.is_shutdown() {
        debug!(stage = %core.id(), "dropping input acquired during shutdown");
        return false;
    }
    metrics.record_input();

    let output = {
        let _working = core.begin_work();
        let start = Instant::now();
        let output = stage.transform(input);
        metrics.record_latency(start.elapsed());
        output
    };

    match output {
        Some(output) => {
            if stage.dispatch_output(output) {
                metrics.record_output();
                trace!(stage = %core.id(), "sent output");
            } else {
                metrics.record_dispatch_failure();
                warn!(stage = %core.id(), "send output failed");
            }
        }
        None => {
            metrics.record_swallowed();
            debug!(stage = %core.id(), "no output payload");
        }
    }
    true
}
