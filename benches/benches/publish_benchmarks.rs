use std::hint::black_box;

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;
use topicbus::{DeliveryQueue, Engine};

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

/// Публикует одно сообщение, дожидается его обработки и вычитывает все
/// очереди, чтобы буферы не заполнялись между итерациями.
async fn publish_round(
    engine: &Engine<Bytes>,
    queues: &mut [DeliveryQueue<Bytes>],
) {
    engine.publish(black_box(Bytes::from_static(b"x")), ["chan"]);
    engine.snapshot().await.unwrap();
    for queue in queues.iter_mut() {
        while queue.try_recv().is_ok() {}
    }
}

fn bench_publish_fan_out(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("publish_fan_out");

    for subs in [0usize, 1, 10, 100] {
        let (engine, mut queues) = rt.block_on(async {
            let engine = Engine::<Bytes>::new(16).unwrap();
            let queues: Vec<_> = (0..subs).map(|_| engine.subscribe(["chan"])).collect();
            (engine, queues)
        });

        group.bench_with_input(BenchmarkId::from_parameter(subs), &subs, |b, _| {
            b.iter(|| rt.block_on(publish_round(&engine, &mut queues)))
        });

        rt.block_on(async { engine.shutdown() });
    }
    group.finish();
}

fn bench_publish_overlapping_topics(c: &mut Criterion) {
    let rt = runtime();
    let (engine, mut queues) = rt.block_on(async {
        let engine = Engine::<Bytes>::new(16).unwrap();
        let queues: Vec<_> = (0..10)
            .map(|_| engine.subscribe(["chan", "a", "b"]))
            .collect();
        (engine, queues)
    });

    c.bench_function("publish_overlapping_topics", |b| {
        b.iter(|| {
            rt.block_on(async {
                engine.publish(Bytes::from_static(b"x"), ["chan", "a", "b"]);
                engine.snapshot().await.unwrap();
                for queue in queues.iter_mut() {
                    while queue.try_recv().is_ok() {}
                }
            })
        })
    });

    rt.block_on(async { engine.shutdown() });
}

fn bench_try_publish_full(c: &mut Criterion) {
    let rt = runtime();
    let (engine, _queues) = rt.block_on(async {
        let engine = Engine::<Bytes>::new(1).unwrap();
        let queues: Vec<_> = (0..10).map(|_| engine.subscribe(["chan"])).collect();
        engine.publish(Bytes::from_static(b"fill"), ["chan"]);
        (engine, queues)
    });

    let handle = &engine;
    c.bench_function("try_publish_full_queues", |b| {
        b.to_async(&rt).iter(|| async move {
            let engine = handle;
            engine.try_publish(black_box(Bytes::from_static(b"x")), ["chan"]);
            engine.snapshot().await.unwrap();
        })
    });

    rt.block_on(async { engine.shutdown() });
}

criterion_group!(
    benches,
    bench_publish_fan_out,
    bench_publish_overlapping_topics,
    bench_try_publish_full
);
criterion_main!(benches);
