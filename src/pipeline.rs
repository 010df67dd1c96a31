use crate::config::SpinMode;
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::stage::{Stage, StageState};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info};

/// Object-safe view of a stage, so stages with different payload types can
/// share one pipeline
trait Driven: Send + Sync {
    fn label(&self) -> &str;
    fn mode(&self) -> SpinMode;
    fn lifecycle(&self) -> StageState;
    fn counters(&self) -> &StageMetrics;
    fn drive(&self);
    fn halt(&self);
}

impl<S: Stage> Driven for S {
    fn label(&self) -> &str {
        Stage::id(self)
    }

    fn mode(&self) -> SpinMode {
        self.core().mode()
    }

    fn lifecycle(&self) -> StageState {
        Stage::state(self)
    }

    fn counters(&self) -> &StageMetrics {
        Stage::metrics(self)
    }

    fn drive(&self) {
        Stage::spin(self)
    }

    fn halt(&self) {
        Stage::shutdown(self)
    }
}

/// A continuous-mode stage running on its own named thread
pub struct StageWorker {
    stage: Arc<dyn Driven>,
    handle: Option<JoinHandle<()>>,
}

impl StageWorker {
    /// Spawn a thread that runs `stage.spin()` until the stage is shut down.
    ///
    /// Sequential stages are driven by their caller and are rejected, as are
    /// stages that have already been spun or shut down.
    pub fn spawn<S: Stage + 'static>(stage: Arc<S>) -> Result<Self> {
        Self::spawn_dyn(stage)
    }

    fn spawn_dyn(stage: Arc<dyn Driven>) -> Result<Self> {
        let id = stage.label().to_string();

        if stage.mode().is_sequential() {
            return Err(PipelineError::ConfigError(format!(
                "stage '{id}' is sequential and must be spun by its caller"
            )));
        }
        if stage.lifecycle() != StageState::Idle {
            return Err(PipelineError::AlreadyStarted);
        }

        let runner = Arc::clone(&stage);
        let handle = thread::Builder::new()
            .name(id.clone())
            .spawn(move || runner.drive())
            .map_err(|e| PipelineError::ThreadError {
                stage: id.clone(),
                reason: e.to_string(),
            })?;

        info!(stage = %id, "worker started");
        Ok(Self {
            stage,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> &str {
        self.stage.label()
    }

    pub fn metrics(&self) -> &StageMetrics {
        self.stage.counters()
    }

    /// True once the worker thread has returned from `spin()`
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Shut the stage down and wait for its thread
    pub fn shutdown(mut self) -> Result<()> {
        self.stage.halt();
        self.join_inner()
    }

    fn join_inner(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        handle.join().map_err(|_| {
            error!(stage = %self.stage.label(), "worker panicked");
            PipelineError::ThreadError {
                stage: self.stage.label().to_string(),
                reason: "worker panicked".into(),
            }
        })?;
        info!(stage = %self.stage.label(), "worker joined");
        Ok(())
    }
}

impl Drop for StageWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stage.halt();
            let _ = self.join_inner();
        }
    }
}

/// Builder collecting stages that should run together
pub struct Pipeline {
    stages: Vec<Arc<dyn Driven>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Add a stage; stages are shut down in the order they were added,
    /// so add upstream stages first
    pub fn add_stage<S: Stage + 'static>(mut self, stage: Arc<S>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Spawn one worker thread per stage
    pub fn start(self) -> Result<RunningPipeline> {
        if self.stages.is_empty() {
            return Err(PipelineError::NoStages);
        }

        let mut workers = Vec::with_capacity(self.stages.len());
        for stage in self.stages {
            // On error, workers already started are stopped by their Drop
            workers.push(StageWorker::spawn_dyn(stage)?);
        }
        Ok(RunningPipeline { workers })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Stages of a started pipeline, each on its own thread
pub struct RunningPipeline {
    workers: Vec<StageWorker>,
}

impl RunningPipeline {
    pub fn ids(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.id()).collect()
    }

    pub fn stage_metrics(&self, index: usize) -> Option<&StageMetrics> {
        self.workers.get(index).map(|w| w.metrics())
    }

    /// True while every worker thread is still spinning
    pub fn is_running(&self) -> bool {
        self.workers.iter().all(|w| !w.is_finished())
    }

    pub fn metrics_summary(&self) -> String {
        let mut summary = String::from("Pipeline metrics:\n");
        for worker in &self.workers {
            summary.push_str(&format!(
                "  {}: {}\n",
                worker.id(),
                worker.metrics().snapshot()
            ));
        }
        summary
    }

    /// Shut every stage down in insertion order and join all threads.
    /// Returns the first join error, after attempting all of them.
    pub fn shutdown(self) -> Result<()> {
        let mut first_error = None;
        for worker in self.workers {
            if let Err(e) = worker.shutdown() {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
