//! Fuzz target for validation and join planning.
//!
//! Generates arbitrary relation paths, selections, filters and sort
//! fields against a fixed entity graph. Compilation may reject the
//! request but must never panic, and every accepted plan must render.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_relation_planning
//! ```

#![no_main]

use arbitrary::Arbitrary;
use basequery_engine::prelude::*;
use libfuzzer_sys::fuzz_target;

const SEGMENTS: &[&str] = &["employee", "person", "department", "address", "tags", "payments", "bogus"];
const FIELDS: &[&str] = &["id", "name", "role", "title", "city", "label", "amount", "createdAt", "nope"];

#[derive(Debug, Arbitrary)]
struct FuzzPath(Vec<u8>);

impl FuzzPath {
    fn relation(&self) -> String {
        self.0
            .iter()
            .take(4)
            .map(|b| SEGMENTS[*b as usize % SEGMENTS.len()])
            .collect::<Vec<_>>()
            .join(".")
    }

    fn field(&self, leaf: u8) -> String {
        let leaf = FIELDS[leaf as usize % FIELDS.len()];
        match self.relation() {
            relation if relation.is_empty() => leaf.to_string(),
            relation => format!("{}.{}", relation, leaf),
        }
    }
}

#[derive(Debug, Arbitrary)]
enum FuzzValue {
    Null,
    Int(i64),
    Text(String),
    List(Vec<String>),
}

impl From<FuzzValue> for FilterValue {
    fn from(value: FuzzValue) -> Self {
        match value {
            FuzzValue::Null => FilterValue::Null,
            FuzzValue::Int(i) => FilterValue::Int(i),
            FuzzValue::Text(s) => FilterValue::String(s),
            FuzzValue::List(items) => FilterValue::List(items.into_iter().map(FilterValue::String).collect()),
        }
    }
}

#[derive(Debug, Arbitrary)]
struct FuzzFilter {
    path: FuzzPath,
    leaf: u8,
    operator: u8,
    value: FuzzValue,
}

#[derive(Debug, Arbitrary)]
struct FuzzRequest {
    relations: Vec<FuzzPath>,
    select: Option<Vec<(FuzzPath, u8)>>,
    sort: Option<(FuzzPath, u8)>,
    search: Option<(String, Vec<(FuzzPath, u8)>)>,
    filters: Vec<FuzzFilter>,
    page: u8,
    limit: u8,
    with_deleted: bool,
}

const OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::Like,
    Operator::ILike,
    Operator::In,
    Operator::NotIn,
    Operator::Between,
    Operator::Gt,
    Operator::Gte,
    Operator::Lt,
    Operator::Lte,
    Operator::IsNull,
    Operator::IsNotNull,
];

fn schema() -> Schema {
    Schema::new()
        .with_entity(
            EntityMetadata::new("Payment", "payments")
                .columns(["id", "amount", "employeeId", "createdAt", "deletedAt"])
                .soft_delete("deletedAt")
                .relation(RelationMeta::many_to_one("employee", "Employee").join_on("employeeId", "id")),
        )
        .with_entity(
            EntityMetadata::new("Employee", "employees")
                .columns(["id", "role", "personId", "departmentId"])
                .relation(RelationMeta::many_to_one("person", "Person").join_on("personId", "id"))
                .relation(RelationMeta::many_to_one("department", "Department").join_on("departmentId", "id"))
                .relation(RelationMeta::one_to_many("payments", "Payment").join_on("id", "employeeId")),
        )
        .with_entity(
            EntityMetadata::new("Person", "people")
                .columns(["id", "name", "addressId"])
                .relation(RelationMeta::many_to_one("address", "Address").join_on("addressId", "id")),
        )
        .with_entity(EntityMetadata::new("Department", "departments").columns(["id", "title"]))
        .with_entity(EntityMetadata::new("Address", "addresses").columns(["id", "city"]))
}

fuzz_target!(|request: FuzzRequest| {
    let schema = schema();

    let mut options = QueryOptions::new()
        .page(u64::from(request.page), u64::from(request.limit))
        .relations(request.relations.iter().map(FuzzPath::relation).filter(|r| !r.is_empty()))
        .with_deleted(request.with_deleted);

    if let Some(select) = &request.select {
        options = options.select(select.iter().map(|(path, leaf)| path.field(*leaf)));
    }
    if let Some((path, leaf)) = &request.sort {
        options = options.sort(path.field(*leaf), SortOrder::Asc);
    }
    if let Some((term, fields)) = &request.search {
        options = options.search(term.clone(), fields.iter().map(|(path, leaf)| path.field(*leaf)));
    }
    for filter in request.filters {
        let relation = filter.path.relation();
        let operator = OPERATORS[filter.operator as usize % OPERATORS.len()];
        let leaf = FIELDS[filter.leaf as usize % FIELDS.len()];
        let mut condition = FilterCondition::new(leaf, operator, FilterValue::from(filter.value));
        if !relation.is_empty() {
            condition = condition.on_relation(relation);
        }
        options = options.filter(condition);
    }

    if let Ok(plan) = compile_plan(&schema, "Payment", &options) {
        for db in [DatabaseType::PostgreSQL, DatabaseType::MySQL, DatabaseType::SQLite] {
            let renderer = PlanRenderer::new(db);
            assert!(renderer.select(&plan).is_ok());
            assert!(renderer.count(&plan).is_ok());
        }
    }
});
