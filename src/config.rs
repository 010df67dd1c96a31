use crate::error::{PipelineError, QueueEnd, Result};
use crate::io::{Callbacks, FnSource, InputSource, QueueInput, QueueOutput};
use crate::module::{FanOutStage, Module, QueueInputStage, QueueOutputStage, QueueToQueueStage};
use crate::queue::BlockingQueue;
use crate::stage::Transform;
use std::sync::Arc;
use std::time::Duration;

/// How `spin()` drives a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinMode {
    /// One iteration per `spin()` call; the caller drives the loop
    Sequential,
    /// `spin()` loops until the stage is shut down
    Continuous,
}

impl SpinMode {
    pub fn from_sequential(sequential: bool) -> Self {
        if sequential {
            SpinMode::Sequential
        } else {
            SpinMode::Continuous
        }
    }

    pub fn is_sequential(self) -> bool {
        self == SpinMode::Sequential
    }
}

/// Validated settings shared by every stage variant
#[derive(Debug, Clone)]
pub struct StageConfig {
    pub id: String,
    pub mode: SpinMode,
    /// Sleep between empty polls once the spin backoff is exhausted
    pub idle_sleep: Duration,
}

impl StageConfig {
    pub fn new(id: impl Into<String>, mode: SpinMode) -> Self {
        Self {
            id: id.into(),
            mode,
            idle_sleep: Duration::from_micros(10),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(PipelineError::ConfigError(
                "stage id must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for wiring a stage to its input and output ends
///
/// ```ignore
/// let input = Arc::new(BlockingQueue::new());
/// let stage = StageBuilder::new("upper")
///     .input_queue(Arc::clone(&input))
///     .build_queue_input(|s: String| Some(s.to_uppercase()))?;
/// stage.register_output_callback(|out: &String| println!("{out}"));
/// ```
pub struct StageBuilder<I, O> {
    config: StageConfig,
    input: Option<Arc<BlockingQueue<I>>>,
    output: Option<Arc<BlockingQueue<O>>>,
}

impl<I, O> StageBuilder<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Start a continuous-mode stage named `id`
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            config: StageConfig::new(id, SpinMode::Continuous),
            input: None,
            output: None,
        }
    }

    /// Choose sequential (one item per `spin()`) or continuous mode
    pub fn sequential(mut self, sequential: bool) -> Self {
        self.config.mode = SpinMode::from_sequential(sequential);
        self
    }

    pub fn idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.config.idle_sleep = idle_sleep;
        self
    }

    pub fn input_queue(mut self, queue: Arc<BlockingQueue<I>>) -> Self {
        self.input = Some(queue);
        self
    }

    pub fn output_queue(mut self, queue: Arc<BlockingQueue<O>>) -> Self {
        self.output = Some(queue);
        self
    }

    fn take_input(&mut self) -> Result<Arc<BlockingQueue<I>>> {
        self.input.take().ok_or_else(|| PipelineError::MissingQueue {
            stage: self.config.id.clone(),
            end: QueueEnd::Input,
        })
    }

    fn take_output(&mut self) -> Result<Arc<BlockingQueue<O>>> {
        self.output.take().ok_or_else(|| PipelineError::MissingQueue {
            stage: self.config.id.clone(),
            end: QueueEnd::Output,
        })
    }

    /// Fan-out stage whose input comes from `acquire`
    pub fn build_fan_out<A, X>(self, acquire: A, transform: X) -> Result<FanOutStage<FnSource<A>, X, O>>
    where
        A: FnMut() -> Option<I> + Send + 'static,
        X: Transform<I, O>,
    {
        Module::new(
            self.config,
            FnSource::new(acquire),
            transform,
            Callbacks::new(),
        )
    }

    /// Fan-out stage fed by the configured input queue
    pub fn build_queue_input<X>(mut self, transform: X) -> Result<QueueInputStage<I, X, O>>
    where
        X: Transform<I, O>,
    {
        let input = self.take_input()?;
        Module::new(
            self.config,
            QueueInput::new(input),
            transform,
            Callbacks::new(),
        )
    }

    /// Stage pulling from `source` and pushing onto the configured output queue
    pub fn build_queue_output<S, X>(mut self, source: S, transform: X) -> Result<QueueOutputStage<S, X, O>>
    where
        S: InputSource<Item = I>,
        X: Transform<I, O>,
    {
        let output = self.take_output()?;
        Module::new(
            self.config,
            source,
            transform,
            QueueOutput::new(output),
        )
    }

    /// Stage between two queues
    pub fn build_queue_to_queue<X>(mut self, transform: X) -> Result<QueueToQueueStage<I, X, O>>
    where
        X: Transform<I, O>,
    {
        let input = self.take_input()?;
        let output = self.take_output()?;
        Module::new(
            self.config,
            QueueInput::new(input),
            transform,
            QueueOutput::new(output),
        )
    }
}
