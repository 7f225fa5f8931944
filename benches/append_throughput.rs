//! Throughput benchmark for `MemoryStore::append`, unconditional and
//! guarded, at increasing batch sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use eventline::{Condition, MemoryStore, Store};
use serde_json::json;
use tokio::runtime::Runtime;

fn make_batch(n: usize, offset: usize) -> Vec<eventline::Message> {
    (0..n)
        .map(|i| {
            eventline::Message::builder(
                "orders.created",
                json!({"order_id": format!("O{}", offset + i)}),
            )
            .build()
        })
        .collect()
}

fn bench_unconditional_append(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("append_unconditional");
    for batch_size in [1usize, 10, 100, 1000] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &batch_size, |b, &batch_size| {
            b.to_async(&rt).iter_batched(
                || (MemoryStore::new(), make_batch(batch_size, 0)),
                |(store, batch)| async move {
                    store.append(batch, None).await.unwrap();
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_guarded_append(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("append_guarded");
    for batch_size in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &batch_size, |b, &batch_size| {
            b.to_async(&rt).iter_batched(
                || {
                    let store = MemoryStore::new();
                    let conditions = vec![Condition::new("orders.created", "order_id", "O0")];
                    (store, conditions, make_batch(batch_size, 1))
                },
                |(store, conditions, batch)| async move {
                    let (_, guard) = store.read(&conditions, None, None).await.unwrap();
                    store.append(batch, Some(guard)).await.unwrap();
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_unconditional_append, bench_guarded_append);
criterion_main!(benches);
