use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use tokio::runtime::Runtime;
use topicbus::Engine;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

fn bench_subscribe_unsubscribe(c: &mut Criterion) {
    let rt = runtime();
    let engine = rt.block_on(async { Engine::<u64>::new(8).unwrap() });

    let handle = &engine;
    c.bench_function("subscribe_unsubscribe", |b| {
        b.to_async(&rt).iter(|| async move {
            let engine = handle;
            let queue = engine.subscribe(black_box(["t1", "t2", "t3"]));
            engine.unsubscribe_all(&queue);
            engine.snapshot().await.unwrap();
        })
    });

    rt.block_on(async { engine.shutdown() });
}

fn bench_add_subscription(c: &mut Criterion) {
    let rt = runtime();
    let engine = rt.block_on(async { Engine::<u64>::new(8).unwrap() });
    let queue = rt.block_on(async { engine.subscribe(["base"]) });

    let (handle, queue) = (&engine, &queue);
    c.bench_function("add_subscription", |b| {
        b.to_async(&rt).iter(|| async move {
            let engine = handle;
            engine.add_subscription(&queue, black_box(["extra"]));
            engine.unsubscribe(&queue, ["extra"]);
            engine.snapshot().await.unwrap();
        })
    });

    rt.block_on(async { engine.shutdown() });
}

fn bench_close_topic(c: &mut Criterion) {
    let rt = runtime();
    let engine = rt.block_on(async { Engine::<u64>::new(8).unwrap() });

    let handle = &engine;
    c.bench_function("close_topic_10_subs", |b| {
        b.to_async(&rt).iter(|| async move {
            let engine = handle;
            let _queues: Vec<_> = (0..10).map(|_| engine.subscribe(["chan"])).collect();
            engine.close(["chan"]);
            engine.snapshot().await.unwrap();
        })
    });

    rt.block_on(async { engine.shutdown() });
}

criterion_group!(
    benches,
    bench_subscribe_unsubscribe,
    bench_add_subscription,
    bench_close_topic
);
criterion_main!(benches);
