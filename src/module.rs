use crate::config::StageConfig;
use crate::error::Result;
use crate::io::{Callbacks, InputSource, OutputCallback, OutputSink, QueueInput, QueueOutput};
use crate::queue::BlockingQueue;
use crate::stage::{Stage, StageCore, Transform};
use parking_lot::Mutex;
use std::sync::Arc;

/// A stage assembled from an input end, a transform and an output end.
///
/// The ends decide the wiring strategy; see the aliases below for the
/// common combinations. Build them with [`StageBuilder`](crate::StageBuilder)
/// or directly through [`Module::new`] for custom ends.
pub struct Module<S, X, K> {
    core: StageCore,
    source: S,
    /// Only the spinning thread locks this
    transform: Mutex<X>,
    sink: K,
}

/// Input from a user closure, output fanned out to callbacks
pub type FanOutStage<S, X, O> = Module<S, X, Callbacks<O>>;

/// Input from a shared queue, output fanned out to callbacks
pub type QueueInputStage<I, X, O> = Module<QueueInput<I>, X, Callbacks<O>>;

/// Input from any source, output pushed onto a shared queue
pub type QueueOutputStage<S, X, O> = Module<S, X, QueueOutput<O>>;

/// Input from a shared queue, output pushed onto another.
/// Many producers may feed the input queue.
pub type QueueToQueueStage<I, X, O> = Module<QueueInput<I>, X, QueueOutput<O>>;

impl<S, X, K> Module<S, X, K>
where
    S: InputSource,
    K: OutputSink,
    X: Transform<S::Item, K::Item>,
{
    pub fn new(config: StageConfig, source: S, transform: X, sink: K) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            core: StageCore::new(config),
            source,
            transform: Mutex::new(transform),
            sink,
        })
    }
}

impl<S, X, K> Module<S, X, K> {
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }
}

impl<S, X, O> Module<S, X, Callbacks<O>> {
    /// Subscribe to this stage's outputs; called in registration order
    pub fn register_output_callback<F>(&self, callback: F)
    where
        F: Fn(&O) + Send + Sync + 'static,
    {
        self.sink.register(callback);
    }

    /// Subscribe a callback that may be unset; `None` is an invalid argument
    pub fn try_register_output_callback(&self, callback: Option<OutputCallback<O>>) -> Result<()> {
        self.sink.try_register(callback)
    }
}

impl<I, X, K> Module<QueueInput<I>, X, K> {
    pub fn input_queue(&self) -> &Arc<BlockingQueue<I>> {
        self.source.queue()
    }
}

impl<S, X, O> Module<S, X, QueueOutput<O>> {
    pub fn output_queue(&self) -> &Arc<BlockingQueue<O>> {
        self.sink.queue()
    }
}

impl<S, X, K> Stage for Module<S, X, K>
where
    S: InputSource,
    K: OutputSink,
    X: Transform<S::Item, K::Item>,
{
    type Input = S::Item;
    type Output = K::Item;

    fn core(&self) -> &StageCore {
        &self.core
    }

    fn acquire_input(&self) -> Option<S::Item> {
        self.source.acquire(self.core.mode())
    }

    fn transform(&self, input: S::Item) -> Option<K::Item> {
        self.transform.lock().transform(input)
    }

    fn dispatch_output(&self, output: K::Item) -> bool {
        self.sink.dispatch(output)
    }

    fn teardown_queues(&self) {
        self.source.teardown();
        self.sink.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SpinMode, StageBuilder};
    use crate::io::FnSource;
    use crate::stage::StageState;
    use std::thread;
    use std::time::Duration;

    fn prefix(input: String) -> Option<String> {
        Some(format!("out:{input}"))
    }

    #[test]
    fn test_sequential_queue_input_processes_one_item() {
        let input = Arc::new(BlockingQueue::new());
        let stage = StageBuilder::new("seq")
            .sequential(true)
            .input_queue(Arc::clone(&input))
            .build_queue_input(prefix)
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            stage.register_output_callback(move |out: &String| seen.lock().push(out.clone()));
        }

        input.push("A".to_string()).unwrap();
        stage.spin();
        assert_eq!(*seen.lock(), vec!["out:A"]);

        // Empty queue: returns without blocking or dispatching
        stage.spin();
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(stage.metrics().idle_polls(), 1);
    }

    #[test]
    fn test_fan_out_calls_each_callback_once_in_order() {
        let mut pending = vec!["x".to_string()];
        let stage = StageBuilder::new("fan")
            .sequential(true)
            .build_fan_out(move || pending.pop(), |s: String| Some(s.len()))
            .unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        for tag in ["c1", "c2"] {
            let calls = Arc::clone(&calls);
            stage.register_output_callback(move |len: &usize| calls.lock().push((tag, *len)));
        }

        stage.spin();
        assert_eq!(*calls.lock(), vec![("c1", 1), ("c2", 1)]);
    }

    #[test]
    fn test_try_register_rejects_unset_callback() {
        let stage = StageBuilder::<u8, u8>::new("fan")
            .build_fan_out(|| None, |x: u8| Some(x))
            .unwrap();
        assert!(stage.try_register_output_callback(None).is_err());
        assert!(stage.sink().is_empty());
    }

    #[test]
    fn test_queue_output_stage_pushes_results() {
        let output = Arc::new(BlockingQueue::new());
        let mut next = 0u32;
        let stage = StageBuilder::new("numbers")
            .sequential(true)
            .output_queue(Arc::clone(&output))
            .build_queue_output(
                FnSource::new(move || {
                    next += 1;
                    Some(next)
                }),
                |n: u32| Some(n * n),
            )
            .unwrap();

        stage.spin();
        stage.spin();
        assert_eq!(output.try_pop(), Some(1));
        assert_eq!(output.try_pop(), Some(4));

        stage.shutdown();
        assert!(output.is_shutdown());
    }

    #[test]
    fn test_rejected_output_push_is_dispatch_failure() {
        let output = Arc::new(BlockingQueue::new());
        output.shutdown();
        let stage = StageBuilder::new("closed")
            .sequential(true)
            .output_queue(Arc::clone(&output))
            .build_queue_output(FnSource::new(|| Some(1u8)), |n: u8| Some(n))
            .unwrap();

        stage.spin();
        assert_eq!(stage.metrics().dispatch_failures(), 1);
        assert_eq!(stage.state(), StageState::Running);
    }

    #[test]
    fn test_queue_to_queue_shutdown_unblocks_worker() {
        let input = Arc::new(BlockingQueue::new());
        let output = Arc::new(BlockingQueue::new());
        let stage = Arc::new(
            StageBuilder::new("relay")
                .input_queue(Arc::clone(&input))
                .output_queue(Arc::clone(&output))
                .build_queue_to_queue(|s: &'static str| Some(s.len()))
                .unwrap(),
        );
        assert_eq!(stage.core().mode(), SpinMode::Continuous);

        let worker = {
            let stage = Arc::clone(&stage);
            thread::spawn(move || stage.spin())
        };

        input.push("abc").unwrap();
        assert_eq!(output.wait_and_pop_timeout(Duration::from_secs(5)), Some(3));

        stage.shutdown();
        worker.join().unwrap();
        assert!(input.is_shutdown());
        assert!(output.is_shutdown());
        assert_eq!(stage.state(), StageState::Stopped);
    }
}
