//! Listing query assembly: request normalization, plan compilation and
//! execution through a [`QueryEngine`].
//!
//! ```rust
//! use basequery_engine::prelude::*;
//!
//! let schema = Schema::new()
//!     .with_entity(
//!         EntityMetadata::new("Payment", "payments")
//!             .columns(["id", "amount", "personId", "createdAt"])
//!             .relation(RelationMeta::many_to_one("person", "Person").join_on("personId", "id")),
//!     )
//!     .with_entity(EntityMetadata::new("Person", "people").columns(["id", "name"]));
//!
//! let config = ListingConfig::new()
//!     .relations(["person"])
//!     .search_fields(["person.name"]);
//! let request = ListingRequest::new().search("João");
//!
//! let options = build_query_options(&schema, "Payment", &request, &config).unwrap();
//! let plan = compile_plan(&schema, "Payment", &options).unwrap();
//! assert_eq!(plan.where_clause(), "(person.name LIKE :search_0)");
//! ```

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;

use crate::alias::AliasResolver;
use crate::config::ListingConfig;
use crate::error::{QueryError, QueryResult};
use crate::filter::{FilterCondition, FilterValue, Operator, Predicate, compile_filters};
use crate::options::{DEFAULT_LIMIT, DEFAULT_PAGE, ListingRequest, QueryOptions};
use crate::pagination::{PageMeta, Pagination, PaginationResult};
use crate::plan::CompiledPlan;
use crate::relations::{JoinPlanner, SchemaRegistry, path};
use crate::row::decode_rows;
use crate::search::compile_search;
use crate::sql::{PlanRenderer, Statement};
use crate::traits::QueryEngine;
use crate::types::{ColumnRef, DEFAULT_SORT_COLUMN, OrderByField};
use crate::validate::validate;

/// Normalize a listing request against its configuration and validate it.
///
/// Request filter keys are matched against the configured filter entries;
/// ignored entries, absent values and unknown keys produce no filter. A date
/// range on the configured date field becomes one `BETWEEN` when both
/// bounds are given, `GTE` or `LTE` when only one is.
pub fn build_query_options<R: SchemaRegistry + ?Sized>(
    schema: &R,
    root: &str,
    request: &ListingRequest,
    config: &ListingConfig,
) -> QueryResult<QueryOptions> {
    let entity = schema.require_entity(root)?;

    let mut filters = Vec::with_capacity(config.filters.len() + 1);
    for entry in config.filters.iter().filter(|entry| !entry.ignore) {
        let Some(value) = request.filters.get(&entry.field) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        filters.push(FilterCondition {
            field: entry.column().to_string(),
            operator: entry.operator,
            value: value.clone(),
            relation: entry.relation.clone(),
        });
    }

    if let Some(date_filter) = date_range_filter(request, config)? {
        filters.push(date_filter);
    }

    let options = QueryOptions {
        page: request.page.unwrap_or(DEFAULT_PAGE),
        limit: request.limit.unwrap_or(DEFAULT_LIMIT),
        search: request.search.clone(),
        search_fields: config.search_fields.clone(),
        sort_by: request.sort_by.clone().or_else(|| config.default_sort_by.clone()),
        sort_order: request.sort_order.unwrap_or_default(),
        filters,
        relations: config.relations.clone(),
        select: config.select.clone(),
        date_field: config.date_field.clone(),
        with_deleted: request.with_deleted.unwrap_or(config.with_deleted),
        foreign_key_exclusion: config.foreign_key_exclusion,
    };

    validate(schema, entity, &options)?;

    tracing::debug!(
        root,
        page = options.page,
        limit = options.limit,
        filters = options.filters.len(),
        "built query options"
    );
    Ok(options)
}

fn date_range_filter(request: &ListingRequest, config: &ListingConfig) -> QueryResult<Option<FilterCondition>> {
    let Some(date_field) = config.date_field.as_deref() else {
        return Ok(None);
    };
    let start = non_blank(request.start_date.as_deref());
    let end = non_blank(request.end_date.as_deref());

    for bound in [start, end].into_iter().flatten() {
        if !is_date_like(bound) {
            return Err(QueryError::invalid_filter_value(
                date_field,
                format!("'{}' is not a date or datetime", bound),
            )
            .with_suggestion("Use YYYY-MM-DD or an RFC 3339 timestamp"));
        }
    }

    let (relation, field) = match path::split_field(date_field) {
        (Some(relation), leaf) => (Some(relation.to_string()), leaf),
        (None, column) => (None, column),
    };
    let (operator, value) = match (start, end) {
        (Some(start), Some(end)) => (Operator::Between, FilterValue::from(vec![start, end])),
        (Some(start), None) => (Operator::Gte, FilterValue::from(start)),
        (None, Some(end)) => (Operator::Lte, FilterValue::from(end)),
        (None, None) => return Ok(None),
    };

    Ok(Some(FilterCondition {
        field: field.to_string(),
        operator,
        value,
        relation,
    }))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn is_date_like(value: &str) -> bool {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").is_ok()
}

/// Compile validated options into a store-agnostic plan.
///
/// Pure: no I/O, and the same inputs always produce the same plan.
pub fn compile_plan<R: SchemaRegistry + ?Sized>(
    schema: &R,
    root: &str,
    options: &QueryOptions,
) -> QueryResult<CompiledPlan> {
    let entity = schema.require_entity(root)?;
    validate(schema, entity, options)?;

    let mut aliases = AliasResolver::new(&entity.name);
    let joins = JoinPlanner::new(schema, entity)
        .foreign_key_exclusion(options.foreign_key_exclusion)
        .with_deleted(options.with_deleted)
        .plan(
            &options.relations,
            options.select.as_deref(),
            options.sort_by.as_deref(),
            &mut aliases,
        )?;

    let compiled_filters = compile_filters(&options.filters, &mut aliases);
    let mut predicates = compiled_filters.predicates;
    let mut params = compiled_filters.params;

    if let Some(search) = compile_search(options.search.as_deref(), &options.search_fields, &mut aliases) {
        predicates.push(search.predicate);
        params.extend(search.params);
    }

    if !options.with_deleted {
        if let Some(column) = &entity.soft_delete_column {
            predicates.push(Predicate::Null {
                column: ColumnRef::new(aliases.root(), column),
                negated: false,
            });
        }
    }

    let order = match options.sort_by.as_deref() {
        Some(sort_by) => vec![OrderByField::new(aliases.dotted_column(sort_by), options.sort_order)],
        None if entity.has_column(DEFAULT_SORT_COLUMN) => {
            vec![OrderByField::desc(ColumnRef::new(aliases.root(), DEFAULT_SORT_COLUMN))]
        }
        None => entity
            .primary_key
            .iter()
            .map(|pk| OrderByField::asc(ColumnRef::new(aliases.root(), pk)))
            .collect(),
    };

    let plan = CompiledPlan {
        root_entity: entity.name.clone(),
        root_table: entity.table.clone(),
        root_alias: aliases.root().to_string(),
        primary_key: entity.primary_key.clone(),
        joins: joins.joins,
        select: joins.select,
        predicates,
        params,
        order,
        pagination: Pagination::page(options.page, options.limit),
    };

    crate::bq_debug!(
        root,
        joins = ?plan.join_paths(),
        predicates = %plan.where_clause(),
        "compiled plan"
    );
    Ok(plan)
}

/// Listing query entry point bound to a schema and an executor.
///
/// Cheap to clone; every call works on its own plan.
pub struct BaseQuery<E> {
    schema: Arc<dyn SchemaRegistry>,
    engine: Arc<E>,
}

impl<E> Clone for BaseQuery<E> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<E: QueryEngine> BaseQuery<E> {
    /// Create a query entry point.
    pub fn new(schema: Arc<dyn SchemaRegistry>, engine: E) -> Self {
        Self {
            schema,
            engine: Arc::new(engine),
        }
    }

    /// Create a query entry point from a shared engine.
    pub fn with_shared_engine(schema: Arc<dyn SchemaRegistry>, engine: Arc<E>) -> Self {
        Self { schema, engine }
    }

    /// The schema.
    pub fn schema(&self) -> &dyn SchemaRegistry {
        self.schema.as_ref()
    }

    /// The executor.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// See [`build_query_options`].
    pub fn build_query_options(
        &self,
        root: &str,
        request: &ListingRequest,
        config: &ListingConfig,
    ) -> QueryResult<QueryOptions> {
        build_query_options(self.schema.as_ref(), root, request, config)
    }

    /// See [`compile_plan`].
    pub fn compile(&self, root: &str, options: &QueryOptions) -> QueryResult<CompiledPlan> {
        compile_plan(self.schema.as_ref(), root, options)
    }

    /// Render the page and count statements for `options`.
    pub fn render(&self, root: &str, options: &QueryOptions) -> QueryResult<(Statement, Statement)> {
        let plan = self.compile(root, options)?;
        let renderer = PlanRenderer::new(self.engine.dialect());
        Ok((renderer.select(&plan)?, renderer.count(&plan)?))
    }

    /// Run a listing query and return one page of `T`.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        root: &str,
        options: &QueryOptions,
    ) -> QueryResult<PaginationResult<T>> {
        let plan = self.compile(root, options)?;
        let renderer = PlanRenderer::new(self.engine.dialect());
        let page = renderer.select(&plan)?;
        let count = renderer.count(&plan)?;

        let raw = self
            .engine
            .fetch_page(&page, &count)
            .await
            .map_err(|e| e.with_model(root).classify_storage())?;

        let data = decode_rows::<T>(&plan, &raw.rows)?;
        tracing::debug!(root, rows = raw.rows.len(), records = data.len(), total = raw.total, "executed listing query");
        Ok(PaginationResult::new(data, PageMeta::new(options.page, options.limit, raw.total)))
    }

    /// [`build_query_options`] followed by [`execute`](Self::execute).
    pub async fn list<T: DeserializeOwned>(
        &self,
        root: &str,
        request: &ListingRequest,
        config: &ListingConfig,
    ) -> QueryResult<PaginationResult<T>> {
        let options = self.build_query_options(root, request, config)?;
        self.execute(root, &options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterFieldConfig;
    use crate::error::ErrorCode;
    use crate::relations::Schema;
    use crate::testing::payroll_schema;
    use crate::traits::{BoxFuture, RawPage, Row};
    use crate::types::SortOrder;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Mutex;

    struct MockEngine {
        rows: Vec<Row>,
        total: u64,
        error: Option<String>,
        seen: Mutex<Vec<Statement>>,
    }

    impl MockEngine {
        fn returning(rows: Vec<serde_json::Value>, total: u64) -> Self {
            Self {
                rows: rows
                    .into_iter()
                    .filter_map(|v| match v {
                        serde_json::Value::Object(map) => Some(map),
                        _ => None,
                    })
                    .collect(),
                total,
                error: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            let mut engine = Self::returning(Vec::new(), 0);
            engine.error = Some(message.to_string());
            engine
        }
    }

    impl QueryEngine for MockEngine {
        fn fetch_page<'a>(&'a self, page: &'a Statement, count: &'a Statement) -> BoxFuture<'a, QueryResult<RawPage>> {
            Box::pin(async move {
                self.seen.lock().unwrap().extend([page.clone(), count.clone()]);
                match &self.error {
                    Some(message) => Err(QueryError::database(message.clone()).with_sql(&page.sql)),
                    None => Ok(RawPage::new(self.rows.clone(), self.total)),
                }
            })
        }
    }

    fn schema() -> Arc<dyn SchemaRegistry> {
        Arc::new(payroll_schema())
    }

    #[test]
    fn test_build_options_defaults() {
        let schema = payroll_schema();
        let options =
            build_query_options(&schema, "Payment", &ListingRequest::new(), &ListingConfig::new()).unwrap();

        assert_eq!(options.page, 1);
        assert_eq!(options.limit, 10);
        assert_eq!(options.sort_order, SortOrder::Desc);
        assert_eq!(options.sort_by, None);
        assert!(options.filters.is_empty());
    }

    #[test]
    fn test_build_options_limit_bounds() {
        let schema = payroll_schema();
        let config = ListingConfig::new();
        for (page, limit) in [(0, 10), (1, 0), (1, 101)] {
            let request = ListingRequest::new().page(page, limit);
            let err = build_query_options(&schema, "Payment", &request, &config).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidParameter);
        }
    }

    #[test]
    fn test_build_options_date_range() {
        let schema = payroll_schema();
        let config = ListingConfig::new().date_field("createdAt");

        let both = ListingRequest::new().date_range(Some("2024-01-01"), Some("2024-12-31"));
        let options = build_query_options(&schema, "Payment", &both, &config).unwrap();
        assert_eq!(
            options.filters,
            vec![FilterCondition::new("createdAt", Operator::Between, vec!["2024-01-01", "2024-12-31"])]
        );

        let start = ListingRequest::new().date_range(Some("2024-01-01T00:00:00Z"), None);
        let options = build_query_options(&schema, "Payment", &start, &config).unwrap();
        assert_eq!(options.filters[0].operator, Operator::Gte);

        let end = ListingRequest::new().date_range(None, Some("2024-12-31"));
        let options = build_query_options(&schema, "Payment", &end, &config).unwrap();
        assert_eq!(options.filters[0].operator, Operator::Lte);
        assert_eq!(options.filters[0].value, FilterValue::from("2024-12-31"));

        let bad = ListingRequest::new().date_range(Some("yesterday"), None);
        let err = build_query_options(&schema, "Payment", &bad, &config).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFilterValue);
    }

    #[test]
    fn test_build_options_maps_filters() {
        let schema = payroll_schema();
        let config = ListingConfig::new()
            .relations(["employee.person"])
            .filter(FilterFieldConfig::new("status").operator(Operator::In))
            .filter(
                FilterFieldConfig::new("personName")
                    .map_field("name")
                    .relation("employee.person")
                    .operator(Operator::ILike),
            )
            .filter(FilterFieldConfig::new("tab").ignored());
        let request = ListingRequest::new()
            .filter("status", "PAID,PENDING")
            .filter("personName", "ana")
            .filter("tab", "archived")
            .filter("unknown", 1)
            .with_deleted(true);

        let options = build_query_options(&schema, "Payment", &request, &config).unwrap();
        assert_eq!(
            options.filters,
            vec![
                FilterCondition::new("status", Operator::In, "PAID,PENDING"),
                FilterCondition::new("name", Operator::ILike, "ana").on_relation("employee.person"),
            ]
        );
        assert!(options.with_deleted);
    }

    #[test]
    fn test_build_options_sort_falls_back_to_config() {
        let schema = payroll_schema();
        let config = ListingConfig::new().default_sort_by("amount");
        let options = build_query_options(&schema, "Payment", &ListingRequest::new(), &config).unwrap();
        assert_eq!(options.sort_by.as_deref(), Some("amount"));

        let request = ListingRequest::new().sort("reference", SortOrder::Asc);
        let options = build_query_options(&schema, "Payment", &request, &config).unwrap();
        assert_eq!(options.sort_by.as_deref(), Some("reference"));
        assert_eq!(options.sort_order, SortOrder::Asc);
    }

    #[test]
    fn test_compile_default_order_and_soft_delete() {
        let schema = payroll_schema();
        let plan = compile_plan(&schema, "Payment", &QueryOptions::new()).unwrap();

        assert_eq!(plan.order, vec![OrderByField::desc(ColumnRef::new("payment", "createdAt"))]);
        assert_eq!(plan.where_clause(), "payment.deletedAt IS NULL");

        let plan = compile_plan(&schema, "Payment", &QueryOptions::new().with_deleted(true)).unwrap();
        assert!(plan.predicates.is_empty());

        let plan = compile_plan(&schema, "Person", &QueryOptions::new()).unwrap();
        assert_eq!(plan.order, vec![OrderByField::asc(ColumnRef::new("person", "id"))]);
    }

    #[test]
    fn test_compile_dotted_sort() {
        let schema = payroll_schema();
        let options = QueryOptions::new()
            .relations(["employee.person"])
            .sort("employee.person.name", SortOrder::Asc);
        let plan = compile_plan(&schema, "Payment", &options).unwrap();
        assert_eq!(
            plan.order,
            vec![OrderByField::asc(ColumnRef::new("employee_person", "name"))]
        );
    }

    #[test]
    fn test_compile_unknown_root() {
        let schema = payroll_schema();
        let err = compile_plan(&schema, "Invoice", &QueryOptions::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfiguration);
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct PaymentRow {
        id: i64,
        amount: i64,
    }

    #[tokio::test]
    async fn test_execute_builds_page() {
        let engine = MockEngine::returning(vec![json!({"id": 1, "amount": 10}), json!({"id": 2, "amount": 20})], 95);
        let query = BaseQuery::new(schema(), engine);

        let options = QueryOptions::new().select(["id", "amount"]).page(10, 10);
        let result: PaginationResult<PaymentRow> = query.execute("Payment", &options).await.unwrap();

        assert_eq!(result.data, vec![PaymentRow { id: 1, amount: 10 }, PaymentRow { id: 2, amount: 20 }]);
        assert_eq!(result.meta.total_pages, 10);
        assert!(!result.meta.has_next_page);
        assert!(result.meta.has_previous_page);

        let seen = query.engine().seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].sql.ends_with("LIMIT 10 OFFSET 90"));
        assert!(seen[1].sql.starts_with("SELECT COUNT(DISTINCT \"payment\".\"id\")"));
    }

    #[tokio::test]
    async fn test_execute_validation_runs_before_engine() {
        let query = BaseQuery::new(schema(), MockEngine::returning(Vec::new(), 0));
        let options = QueryOptions::new()
            .relations(["employee"])
            .select(["id", "employee.person.name"]);

        let err = query.execute::<PaymentRow>("Payment", &options).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingRequiredRelation);
        assert!(query.engine().seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_execute_classifies_storage_errors() {
        let query = BaseQuery::new(schema(), MockEngine::failing("column employee.nmae does not exist"));
        let err = query.execute::<PaymentRow>("Payment", &QueryOptions::new()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidQueryRelation);
        assert!(err.context.sql.is_some());

        let query = BaseQuery::new(schema(), MockEngine::failing("deadlock detected"));
        let err = query.execute::<PaymentRow>("Payment", &QueryOptions::new()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn test_base_query_is_clone_send_sync() {
        fn assert_traits<T: Clone + Send + Sync>() {}
        assert_traits::<BaseQuery<MockEngine>>();
        let _: Arc<dyn SchemaRegistry> = Arc::new(Schema::new());
    }
}
