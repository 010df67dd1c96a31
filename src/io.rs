//! Input and output ends a [`Module`](crate::module::Module) is wired from.

use crate::config::SpinMode;
use crate::error::{PipelineError, Result};
use crate::queue::BlockingQueue;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::debug;

/// Where a stage's input comes from
pub trait InputSource: Send + Sync + 'static {
    type Item: Send;

    /// Produce one input. Sequential mode must not block indefinitely.
    fn acquire(&self, mode: SpinMode) -> Option<Self::Item>;

    /// Release anything blocked in `acquire`
    fn teardown(&self) {}
}

/// Where a stage's output goes
pub trait OutputSink: Send + Sync + 'static {
    type Item: Send;

    /// Deliver one output; `false` if it could not be delivered
    fn dispatch(&self, output: Self::Item) -> bool;

    fn teardown(&self) {}
}

/// Input produced by a user closure
pub struct FnSource<A> {
    acquire: Mutex<A>,
}

impl<A> FnSource<A> {
    pub fn new(acquire: A) -> Self {
        Self {
            acquire: Mutex::new(acquire),
        }
    }
}

impl<A, I> InputSource for FnSource<A>
where
    A: FnMut() -> Option<I> + Send + 'static,
    I: Send,
{
    type Item = I;

    fn acquire(&self, _mode: SpinMode) -> Option<I> {
        let mut acquire = self.acquire.lock();
        (*acquire)()
    }
}

/// Input popped from a shared queue: `try_pop` in sequential mode,
/// `wait_and_pop` in continuous mode. Teardown shuts the queue down.
pub struct QueueInput<I> {
    queue: Arc<BlockingQueue<I>>,
}

impl<I> QueueInput<I> {
    pub fn new(queue: Arc<BlockingQueue<I>>) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &Arc<BlockingQueue<I>> {
        &self.queue
    }
}

impl<I: Send + 'static> InputSource for QueueInput<I> {
    type Item = I;

    fn acquire(&self, mode: SpinMode) -> Option<I> {
        match mode {
            SpinMode::Sequential => self.queue.try_pop(),
            SpinMode::Continuous => self.queue.wait_and_pop(),
        }
    }

    fn teardown(&self) {
        self.queue.shutdown();
    }
}

/// A registered output subscriber
pub type OutputCallback<O> = Arc<dyn Fn(&O) + Send + Sync>;

/// Ordered fan-out list of output callbacks.
///
/// Every output is handed by reference to each callback in registration
/// order, on the thread running the stage. Duplicates are kept.
pub struct Callbacks<O> {
    callbacks: RwLock<Vec<OutputCallback<O>>>,
}

impl<O> Callbacks<O> {
    pub fn new() -> Self {
        Self {
            callbacks: RwLock::new(Vec::new()),
        }
    }

    pub fn register<F>(&self, callback: F)
    where
        F: Fn(&O) + Send + Sync + 'static,
    {
        self.callbacks.write().push(Arc::new(callback));
    }

    /// Register a callback that may be unset; `None` is rejected
    pub fn try_register(&self, callback: Option<OutputCallback<O>>) -> Result<()> {
        let callback = callback.ok_or_else(|| {
            PipelineError::InvalidArgument("output callback must be set".into())
        })?;
        self.callbacks.write().push(callback);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<O> Default for Callbacks<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Send + 'static> OutputSink for Callbacks<O> {
    type Item = O;

    fn dispatch(&self, output: O) -> bool {
        // Snapshot so a callback may register more callbacks without deadlocking
        let callbacks = self.callbacks.read().clone();
        if callbacks.is_empty() {
            debug!("no output callbacks registered");
        }
        for callback in &callbacks {
            callback(&output);
        }
        true
    }
}

/// Output pushed onto a shared queue. Teardown shuts the queue down.
pub struct QueueOutput<O> {
    queue: Arc<BlockingQueue<O>>,
}

impl<O> QueueOutput<O> {
    pub fn new(queue: Arc<BlockingQueue<O>>) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &Arc<BlockingQueue<O>> {
        &self.queue
    }
}

impl<O: Send + 'static> OutputSink for QueueOutput<O> {
    type Item = O;

    fn dispatch(&self, output: O) -> bool {
        self.queue.push(output).is_ok()
    }

    fn teardown(&self) {
        self.queue.shutdown();
    }
}

/// Callback that copies each output into `queue`, chaining a fan-out stage
/// into a downstream queue-fed stage
pub fn forward_to<O>(queue: Arc<BlockingQueue<O>>) -> impl Fn(&O) + Send + Sync + 'static
where
    O: Clone + Send + 'static,
{
    move |output: &O| {
        if queue.push(output.clone()).is_err() {
            debug!("downstream queue is shut down, output dropped");
        }
    }
}
