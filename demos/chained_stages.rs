//! Line → word count → report across two chained stages
//!
//! Reads lines from stdin until EOF. The reader is sequential and stepped
//! once per line by `main`; the reporter runs on its own worker thread.
//!
//! Usage: cargo run --example chained_stages < some_file.txt

use modular_pipeline::{forward_to, BlockingQueue, FnSource, Pipeline, Stage, StageBuilder};
use std::io::{self, BufRead};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> modular_pipeline::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let counts = Arc::new(BlockingQueue::new());
    let reports = Arc::new(BlockingQueue::new());

    let mut lines = io::stdin().lock().lines().map_while(|line| line.ok()).collect::<Vec<_>>().into_iter();
    let total_lines = lines.len();

    let reader = Arc::new(
        StageBuilder::new("reader")
            .sequential(true)
            .output_queue(Arc::clone(&counts))
            .build_queue_output(FnSource::new(move || lines.next()), |line: String| {
                let words = line.split_whitespace().count();
                (words > 0).then_some(words)
            })?,
    );

    let reporter = Arc::new(
        StageBuilder::new("reporter")
            .input_queue(Arc::clone(&counts))
            .build_queue_input(|words: usize| Some(format!("{words:>4} words")))?,
    );
    reporter.register_output_callback(forward_to(Arc::clone(&reports)));

    let running = Pipeline::new().add_stage(Arc::clone(&reporter)).start()?;

    for _ in 0..total_lines {
        reader.spin();
    }
    let mut printed = 0;
    while let Some(report) = reports.wait_and_pop_timeout(Duration::from_millis(200)) {
        println!("{report}");
        printed += 1;
    }

    eprintln!("reader: {}", reader.metrics().snapshot());
    eprint!("{}", running.metrics_summary());
    reader.shutdown();
    running.shutdown()?;
    eprintln!("{printed} non-empty of {total_lines} lines");
    Ok(())
}
