//! Publisher/consumer handoff over a shutdown-aware queue
//!
//! Usage: cargo run --example concurrent_queue
//!        (set RUST_LOG=debug for more detail)

use modular_pipeline::BlockingQueue;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn publisher(queue: Arc<BlockingQueue<String>>) {
    info!("publisher started");
    thread::sleep(Duration::from_millis(500));
    if queue.push("Hello from publisher!".to_string()).is_err() {
        info!("queue already shut down");
    }
    thread::sleep(Duration::from_millis(500));
    info!("publisher shutting the queue down");
    queue.shutdown();
}

fn consumer(queue: Arc<BlockingQueue<String>>) {
    info!(size = queue.len(), empty = queue.is_empty(), "consumer started");

    match queue.try_pop() {
        Some(value) => info!("try_pop: {value}"),
        None => info!("try_pop: nothing queued yet"),
    }

    if let Some(value) = queue.wait_and_pop() {
        info!("wait_and_pop: {value}");
    }

    // Released by the publisher's shutdown
    let mut value = String::new();
    let received = queue.wait_and_pop_into(&mut value);
    info!(received, shutdown = queue.is_shutdown(), "consumer finished");
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let queue = Arc::new(BlockingQueue::new());
    let handles = [
        thread::spawn({
            let queue = Arc::clone(&queue);
            move || publisher(queue)
        }),
        thread::spawn({
            let queue = Arc::clone(&queue);
            move || consumer(queue)
        }),
    ];

    for handle in handles {
        handle.join().expect("thread panicked");
    }
}
