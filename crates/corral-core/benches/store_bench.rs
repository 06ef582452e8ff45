//! # Store Benchmarks
//!
//! Performance benchmarks for payload encoding, resource commits and
//! relation upserts.
//!
//! Run with: `cargo bench -p corral-core`

use corral_core::{
    Cluster, Corral, Encoded, IpAddress, IpAddressType, Node, Record, RelationFilter, Request,
    Resource,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

/// A request whose fragment holds `size` entries.
fn wide_request(size: usize) -> Request {
    let mut fragment = Record::new();
    for i in 0..size {
        fragment.insert(
            format!("key_{i:05}"),
            Encoded::List(vec![Encoded::Int(i as i64), Encoded::text("value")]),
        );
    }
    Request::new("bench", fragment, None)
}

fn bench_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoding");

    for size in [10, 100, 1000] {
        let request = wide_request(size);
        let bytes = request.serialize().expect("serialize");

        group.bench_with_input(BenchmarkId::new("serialize", size), &request, |b, r| {
            b.iter(|| black_box(r.serialize().expect("serialize")));
        });
        group.bench_with_input(BenchmarkId::new("deserialize", size), &bytes, |b, bytes| {
            b.iter(|| {
                black_box(Request::deserialize(bytes, Some(request.id())).expect("deserialize"))
            });
        });
    }

    group.finish();
}

fn bench_commits(c: &mut Criterion) {
    let mut group = c.benchmark_group("commits");

    group.bench_function("register_cluster", |b| {
        let corral = Corral::in_memory().expect("context");
        b.iter(|| black_box(Cluster::make(&corral, "edge", None).expect("cluster")));
    });

    for batch in [10, 100] {
        group.bench_with_input(BenchmarkId::new("session_batch", batch), &batch, |b, &batch| {
            let corral = Corral::in_memory().expect("context");
            b.iter(|| {
                corral
                    .in_session(|_| {
                        for _ in 0..batch {
                            Cluster::make(&corral, "edge", None)?;
                        }
                        Ok(())
                    })
                    .expect("batch");
            });
        });
    }

    group.finish();
}

fn bench_relations(c: &mut Criterion) {
    let mut group = c.benchmark_group("relations");

    let corral = Corral::in_memory().expect("context");
    let cluster = Cluster::make(&corral, "edge", None).expect("cluster");
    let ips: Vec<_> = (0..50)
        .map(|i| {
            IpAddress::make(&corral, "eth", &format!("10.0.0.{i}"), IpAddressType::V4, None)
                .expect("ip")
        })
        .collect();
    let node = Node::make(&corral, "worker", &ips, &cluster, None).expect("node");

    group.bench_function("reassert_edge", |b| {
        b.iter(|| {
            black_box(
                corral
                    .relations()
                    .create(&*ips[0], corral_core::RelationType::BelongsTo, &*node, None)
                    .expect("edge"),
            )
        });
    });

    group.bench_function("filter_by_destination", |b| {
        let filter = RelationFilter::any().destination(node.id().clone());
        b.iter(|| black_box(corral.relations().get(&filter).expect("rows")));
    });

    group.finish();
}

criterion_group!(benches, bench_encoding, bench_commits, bench_relations);
criterion_main!(benches);
