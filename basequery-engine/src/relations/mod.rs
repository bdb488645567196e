//! Relation metadata, relation paths and join planning.
//!
//! - entity and relation metadata plus the [`SchemaRegistry`] seam
//! - [`path`]: helpers for dot-delimited relation paths
//! - [`planner`]: turns declared relation paths into ordered `LEFT JOIN`s
//!
//! ```rust
//! use basequery_engine::relations::{EntityMetadata, RelationMeta, Schema, SchemaRegistry};
//!
//! let schema = Schema::new()
//!     .with_entity(
//!         EntityMetadata::new("Payment", "payments")
//!             .columns(["id", "personId"])
//!             .relation(RelationMeta::many_to_one("person", "Person").join_on("personId", "id")),
//!     )
//!     .with_entity(EntityMetadata::new("Person", "people").columns(["id", "name"]));
//!
//! let root = schema.entity("Payment").unwrap();
//! let hops = schema.resolve_path(root, "person").unwrap();
//! assert_eq!(hops[0].target.table, "people");
//! ```

mod metadata;
pub mod path;
pub mod planner;

pub use metadata::{
    ColumnMeta, EntityMetadata, Hop, JoinColumn, JoinTableMeta, RelationMeta, RelationType,
    Schema, SchemaRegistry,
};
pub use planner::{JoinPlan, JoinPlanner};
