use criterion::{criterion_group, criterion_main, Criterion};
use modular_pipeline::{BlockingQueue, Pipeline, StageBuilder};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn benchmark_queue_push_pop(c: &mut Criterion) {
    c.bench_function("queue_push_pop_1000_msgs", |b| {
        let queue = BlockingQueue::new();
        b.iter(|| {
            for i in 0..1000u32 {
                let _ = queue.push(black_box(i));
            }
            while let Some(item) = queue.try_pop() {
                black_box(item);
            }
        });
    });
}

fn benchmark_queue_cross_thread(c: &mut Criterion) {
    c.bench_function("queue_cross_thread_1000_msgs", |b| {
        b.iter(|| {
            let queue = Arc::new(BlockingQueue::new());
            let consumer = {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut received = 0;
                    while queue.wait_and_pop().is_some() {
                        received += 1;
                    }
                    received
                })
            };

            for i in 0..1000 {
                let _ = queue.push(vec![i as u8; 64]);
            }
            queue.shutdown();
            black_box(consumer.join().expect("Consumer panicked"));
        });
    });
}

fn benchmark_three_stage_pipeline(c: &mut Criterion) {
    c.bench_function("three_stage_1000_msgs", |b| {
        b.iter(|| {
            let queues: Vec<Arc<BlockingQueue<Vec<u8>>>> =
                (0..4).map(|_| Arc::new(BlockingQueue::new())).collect();

            let mut pipeline = Pipeline::new();
            for (idx, pair) in queues.windows(2).enumerate() {
                let stage = StageBuilder::new(format!("stage{idx}"))
                    .input_queue(Arc::clone(&pair[0]))
                    .output_queue(Arc::clone(&pair[1]))
                    .build_queue_to_queue(Some)
                    .expect("Build failed");
                pipeline = pipeline.add_stage(Arc::new(stage));
            }
            let running = pipeline.start().expect("Start failed");

            for i in 0..1000 {
                let _ = queues[0].push(black_box(vec![i as u8; 64]));
            }
            let sink = &queues[3];
            for _ in 0..1000 {
                black_box(sink.wait_and_pop_timeout(Duration::from_secs(5)));
            }
            let _ = running.shutdown();
        });
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(10));
    targets = benchmark_queue_push_pop, benchmark_queue_cross_thread, benchmark_three_stage_pipeline
);
criterion_main!(benches);
