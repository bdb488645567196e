//! # basequery
//!
//! Declarative listing queries over relational entity graphs.
//!
//! basequery provides:
//! - An entity schema describing tables, columns and relations
//! - Listing configuration per resource (relations, filters, search, date range)
//! - Validation of every relation, column and field before SQL is produced
//! - Join planning with column projection across arbitrary relation depth
//! - Parameterized SQL rendering, pagination and hydration into nested records
//! - A PostgreSQL executor built on `tokio-postgres` and `deadpool-postgres`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use basequery::prelude::*;
//! use basequery::postgres::PgEngine;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let schema = Schema::from_file("schema.toml")?;
//!     let catalog = ListingCatalog::from_file("listings.toml")?;
//!     let listings = BaseQuery::new(Arc::new(schema), PgEngine::connect("postgresql://localhost/payroll")?);
//!
//!     let request = ListingRequest::default()
//!         .page(1, 20)
//!         .search("ana")
//!         .filter("status", "paid");
//!     let page = listings
//!         .list::<serde_json::Value>("Payment", &request, catalog.get("payments")?)
//!         .await?;
//!
//!     println!("page {} of {}", page.meta.page, page.meta.total_pages);
//!     Ok(())
//! }
//! ```
//!
//! Plans can be compiled and rendered without a database:
//!
//! ```rust
//! use basequery::prelude::*;
//!
//! let schema = Schema::new()
//!     .with_entity(
//!         EntityMetadata::new("Payment", "payments")
//!             .columns(["id", "amount", "employeeId", "createdAt"])
//!             .relation(RelationMeta::many_to_one("employee", "Employee").join_on("employeeId", "id")),
//!     )
//!     .with_entity(EntityMetadata::new("Employee", "employees").columns(["id", "role"]));
//!
//! let options = QueryOptions::new().relations(["employee"]).select(["id", "employee.role"]);
//! let plan = compile_plan(&schema, "Payment", &options).unwrap();
//! let page = PlanRenderer::new(DatabaseType::PostgreSQL).select(&plan).unwrap();
//! assert!(page.sql.starts_with("SELECT"));
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use basequery_engine::*;

/// PostgreSQL executor.
#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres {
    pub use basequery_postgres::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use basequery_engine::prelude::*;

    #[cfg(feature = "postgres")]
    pub use basequery_postgres::{PgConfig, PgEngine, PgPool};
}
