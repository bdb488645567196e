//! Benchmarks for join planning and filter compilation.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use basequery_engine::alias::AliasResolver;
use basequery_engine::filter::compile_filters;
use basequery_engine::relations::{EntityMetadata, JoinPlanner, RelationMeta, Schema, SchemaRegistry};
use basequery_engine::{FilterCondition, FilterValue, Operator};

/// A chain `Node0 -> Node1 -> ... -> NodeN`, each hop a many-to-one.
fn chain_schema(depth: usize) -> Schema {
    let mut schema = Schema::new();
    for i in 0..=depth {
        let mut entity = EntityMetadata::new(format!("Node{}", i), format!("nodes_{}", i))
            .columns(["id", "label", "nextId", "createdAt"]);
        if i < depth {
            entity = entity
                .relation(RelationMeta::many_to_one("next", format!("Node{}", i + 1)).join_on("nextId", "id"));
        }
        schema = schema.with_entity(entity);
    }
    schema
}

fn chain_path(depth: usize) -> String {
    vec!["next"; depth].join(".")
}

fn bench_join_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("join_planning");

    for depth in [1, 3, 6] {
        let schema = chain_schema(depth);
        let root = schema.entity("Node0").expect("root entity");
        let relations = vec![chain_path(depth)];
        let select = vec!["id".to_string(), format!("{}.label", chain_path(depth))];

        group.bench_with_input(BenchmarkId::new("full", depth), &depth, |b, _| {
            let planner = JoinPlanner::new(&schema, root);
            b.iter(|| {
                let mut aliases = AliasResolver::new("Node0");
                black_box(planner.plan(&relations, None, None, &mut aliases))
            })
        });

        group.bench_with_input(BenchmarkId::new("projected", depth), &depth, |b, _| {
            let planner = JoinPlanner::new(&schema, root);
            b.iter(|| {
                let mut aliases = AliasResolver::new("Node0");
                black_box(planner.plan(&relations, Some(select.as_slice()), None, &mut aliases))
            })
        });
    }

    group.finish();
}

fn bench_filter_compilation(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_compilation");

    for count in [1, 10, 50] {
        let filters: Vec<FilterCondition> = (0..count)
            .map(|i| match i % 3 {
                0 => FilterCondition::new(format!("field_{}", i), Operator::Equals, FilterValue::Int(i as i64)),
                1 => FilterCondition::new("status", Operator::In, "paid,void,pending"),
                _ => FilterCondition::new("name", Operator::ILike, "ana").on_relation("person"),
            })
            .collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &filters, |b, filters| {
            b.iter(|| {
                let mut aliases = AliasResolver::new("Payment");
                black_box(compile_filters(filters, &mut aliases))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_join_planning, bench_filter_compilation);
criterion_main!(benches);
