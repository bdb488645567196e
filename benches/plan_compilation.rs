//! Benchmarks for end-to-end plan compilation and rendering.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use basequery::prelude::*;

fn schema() -> Schema {
    Schema::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/payroll.toml"))
        .expect("fixture schema")
}

fn listing_request() -> ListingRequest {
    ListingRequest::new()
        .page(3, 25)
        .search("ana")
        .date_range(Some("2024-01-01"), Some("2024-12-31"))
        .filter("status", "paid,void")
}

fn listing_config() -> ListingConfig {
    ListingConfig::new()
        .relations(["employee", "employee.person", "employee.department"])
        .search_fields(["reference", "employee.person.name"])
        .date_field("createdAt")
        .filter(FilterFieldConfig::new("status").operator(Operator::In))
}

fn bench_build_options(c: &mut Criterion) {
    let schema = schema();
    let request = listing_request();
    let config = listing_config();

    c.bench_function("build_query_options", |b| {
        b.iter(|| black_box(build_query_options(&schema, "Payment", &request, &config)))
    });
}

fn bench_compile_and_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_and_render");
    let schema = schema();
    let options = build_query_options(&schema, "Payment", &listing_request(), &listing_config())
        .expect("valid options");

    group.bench_function("compile", |b| {
        b.iter(|| black_box(compile_plan(&schema, "Payment", &options)))
    });

    let plan = compile_plan(&schema, "Payment", &options).expect("valid plan");
    for db in [DatabaseType::PostgreSQL, DatabaseType::MySQL, DatabaseType::SQLite] {
        let renderer = PlanRenderer::new(db);
        group.bench_with_input(BenchmarkId::new("render", format!("{:?}", db)), &plan, |b, plan| {
            b.iter(|| black_box((renderer.select(plan), renderer.count(plan))))
        });
    }

    group.finish();
}

fn bench_projection(c: &mut Criterion) {
    let schema = schema();
    let full = QueryOptions::new().relations(["employee.person.address", "employee.department"]);
    let projected = full
        .clone()
        .select(["id", "amount", "employee.person.address.city", "employee.department.title"]);

    let mut group = c.benchmark_group("projection");
    group.bench_function("full", |b| b.iter(|| black_box(compile_plan(&schema, "Payment", &full))));
    group.bench_function("projected", |b| {
        b.iter(|| black_box(compile_plan(&schema, "Payment", &projected)))
    });
    group.finish();
}

criterion_group!(benches, bench_build_options, bench_compile_and_render, bench_projection);
criterion_main!(benches);
