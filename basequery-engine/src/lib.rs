//! # basequery-engine
//!
//! Generic relational listing-query engine.
//!
//! This crate turns a declarative listing request into a validated,
//! parameterized query plan over an arbitrary entity graph:
//! - Pagination, free-text search, typed filters, sorting and date ranges
//! - Arbitrary-depth relation joins with column projection
//! - Pre-execution validation of relations and fields
//! - Dialect-aware SQL rendering and a swappable executor seam
//! - Hydration of joined rows into nested records
//!
//! ## Schema
//!
//! Entities, their columns and relations are described once:
//!
//! ```rust
//! use basequery_engine::{EntityMetadata, RelationMeta, Schema, SchemaRegistry};
//!
//! let schema = Schema::new()
//!     .with_entity(
//!         EntityMetadata::new("Employee", "employees")
//!             .columns(["id", "role", "personId", "createdAt"])
//!             .relation(RelationMeta::many_to_one("person", "Person").join_on("personId", "id")),
//!     )
//!     .with_entity(EntityMetadata::new("Person", "people").columns(["id", "name"]));
//!
//! assert!(schema.entity("Person").is_some());
//! ```
//!
//! ## Compiling a plan
//!
//! ```rust
//! use basequery_engine::prelude::*;
//! # let schema = Schema::new()
//! #     .with_entity(
//! #         EntityMetadata::new("Employee", "employees")
//! #             .columns(["id", "role", "personId", "createdAt"])
//! #             .relation(RelationMeta::many_to_one("person", "Person").join_on("personId", "id")),
//! #     )
//! #     .with_entity(EntityMetadata::new("Person", "people").columns(["id", "name"]));
//!
//! let options = QueryOptions::new()
//!     .relations(["person"])
//!     .select(["id", "person.name"])
//!     .filter(FilterCondition::new("role", Operator::Equals, "ops"));
//!
//! let plan = compile_plan(&schema, "Employee", &options).unwrap();
//! assert_eq!(plan.join_paths(), vec!["person"]);
//! assert_eq!(plan.where_clause(), "employee.role = :filter_0");
//!
//! let statement = PlanRenderer::new(DatabaseType::PostgreSQL).select(&plan).unwrap();
//! assert!(statement.sql.contains("LEFT JOIN \"people\" AS \"person\""));
//! ```
//!
//! ## Errors
//!
//! Every failure is a [`QueryError`] with an [`ErrorCode`]. Configuration
//! mistakes (missing relations, unknown fields, out-of-range pages) are
//! reported before any statement is rendered.

pub mod alias;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod options;
pub mod pagination;
pub mod plan;
pub mod query;
pub mod relations;
pub mod row;
pub mod search;
pub mod sql;
pub mod traits;
pub mod types;
pub mod validate;

#[cfg(test)]
mod testing;

pub use alias::AliasResolver;
pub use config::{FilterFieldConfig, ForeignKeyExclusion, ListingCatalog, ListingConfig};
pub use error::{ErrorCode, ErrorContext, QueryError, QueryResult, Suggestion};
pub use filter::{CompareOp, FilterCondition, FilterValue, NamedParams, Operator, Predicate};
pub use options::{ListingRequest, QueryOptions};
pub use pagination::{PageMeta, Pagination, PaginationResult};
pub use plan::{CompiledPlan, JoinMode, JoinStep, LinkTable, SelectColumn};
pub use query::{BaseQuery, build_query_options, compile_plan};
pub use relations::{
    ColumnMeta, EntityMetadata, Hop, JoinColumn, JoinPlan, JoinPlanner, JoinTableMeta,
    RelationMeta, RelationType, Schema, SchemaRegistry,
};
pub use row::{Hydrator, decode_rows};
pub use sql::{DatabaseType, PlanRenderer, SqlBuilder, Statement};
pub use traits::{BoxFuture, QueryEngine, RawPage, Row};
pub use types::{ColumnRef, OrderByField, SortOrder};
pub use validate::validate;

// Re-export logging utilities
pub use logging::{get_log_format, get_log_level, init as init_logging, is_debug_enabled};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{FilterFieldConfig, ForeignKeyExclusion, ListingCatalog, ListingConfig};
    pub use crate::error::{ErrorCode, QueryError, QueryResult};
    pub use crate::filter::{FilterCondition, FilterValue, Operator};
    pub use crate::options::{ListingRequest, QueryOptions};
    pub use crate::pagination::{PageMeta, PaginationResult};
    pub use crate::plan::CompiledPlan;
    pub use crate::query::{BaseQuery, build_query_options, compile_plan};
    pub use crate::relations::{EntityMetadata, RelationMeta, RelationType, Schema, SchemaRegistry};
    pub use crate::sql::{DatabaseType, PlanRenderer, Statement};
    pub use crate::traits::{BoxFuture, QueryEngine, RawPage, Row};
    pub use crate::types::SortOrder;
}
