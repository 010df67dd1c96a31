//! Building blocks for multi-stage concurrent processing pipelines.
//!
//! A pipeline is made of stages that each pull an input, transform it and
//! push the output to zero or more consumers. Every stage runs on its own
//! thread and stages are connected through shutdown-aware blocking queues.
//!
//! # Features
//!
//! - Unbounded FIFO [`BlockingQueue`] whose blocking pops are released by `shutdown`
//! - [`Stage`] trait with a provided run loop in sequential or continuous mode
//! - Wiring variants: callback fan-out, queue input, queue output, queue-to-queue
//! - Cooperative, idempotent shutdown callable from any thread
//! - Per-stage metrics: inputs, outputs, swallowed items, dispatch failures, latency
//! - Worker threads and multi-stage pipelines with ordered shutdown
//!
//! # Example
//!
//! ```ignore
//! use modular_pipeline::{BlockingQueue, StageBuilder, StageWorker};
//! use std::sync::Arc;
//!
//! let input = Arc::new(BlockingQueue::new());
//! let stage = Arc::new(
//!     StageBuilder::new("prefix")
//!         .input_queue(Arc::clone(&input))
//!         .build_queue_input(|s: String| Some(format!("out:{s}")))?,
//! );
//! stage.register_output_callback(|out: &String| println!("{out}"));
//!
//! let worker = StageWorker::spawn(Arc::clone(&stage))?;
//! input.push("A".to_string()).ok();
//! worker.shutdown()?;
//! ```

pub mod config;
pub mod error;
pub mod io;
pub mod metrics;
pub mod module;
pub mod pipeline;
pub mod queue;
pub mod stage;

// Re-exports for convenience
pub use config::{SpinMode, StageBuilder, StageConfig};
pub use error::{PipelineError, QueueEnd, Result};
pub use io::{
    forward_to, Callbacks, FnSource, InputSource, OutputCallback, OutputSink, QueueInput,
    QueueOutput,
};
pub use metrics::{MetricsSnapshot, StageMetrics};
pub use module::{FanOutStage, Module, QueueInputStage, QueueOutputStage, QueueToQueueStage};
pub use pipeline::{Pipeline, RunningPipeline, StageWorker};
pub use queue::BlockingQueue;
pub use stage::{Stage, StageCore, StageState, Transform};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
