//! The compiled, store-agnostic plan of one listing query.

use std::fmt;

use crate::filter::{NamedParams, Predicate};
use crate::pagination::Pagination;
use crate::relations::RelationType;
use crate::types::{ColumnRef, OrderByField};

/// How a join contributes to the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinMode {
    /// Join and select every physical column of the target.
    Full,
    /// Join for traversal, select only the planned columns (possibly none).
    Projected,
}

/// Join-table hop of a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTable {
    /// Join table name.
    pub table: String,
    /// Alias of the join table.
    pub alias: String,
    /// `link.source = parent.local`.
    pub on_parent: (ColumnRef, ColumnRef),
}

/// One `LEFT JOIN` of the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStep {
    /// Relation path (e.g. `"employee.person"`).
    pub path: String,
    /// Alias of the joined table.
    pub alias: String,
    /// Alias of the parent (root or the parent path).
    pub parent_alias: String,
    /// Physical table joined.
    pub table: String,
    /// Relation kind of the last hop.
    pub kind: RelationType,
    /// Whether this hop or any ancestor hop is to-many.
    pub many: bool,
    /// Selection mode.
    pub mode: JoinMode,
    /// Equality pairs of the ON clause, `(left, right)`.
    pub on: Vec<(ColumnRef, ColumnRef)>,
    /// `alias.deletedAt IS NULL` appended to the ON clause.
    pub soft_delete: Option<ColumnRef>,
    /// Join table passed through first, for many-to-many relations.
    pub link: Option<LinkTable>,
    /// Columns selected from the target.
    pub columns: Vec<String>,
    /// Primary key of the target.
    pub primary_key: Vec<String>,
}

impl JoinStep {
    /// Whether the step contributes any column.
    pub fn is_selected(&self) -> bool {
        !self.columns.is_empty()
    }
}

impl fmt::Display for JoinStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            JoinMode::Full => "full",
            JoinMode::Projected => "projected",
        };
        write!(f, "{} AS {} ({}: {})", self.path, self.alias, mode, self.columns.join(", "))
    }
}

/// One selected column and the name it is returned under.
///
/// Root columns keep their name; relation columns are returned as
/// `"path.column"` so rows can be hydrated into nested objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectColumn {
    /// Source column.
    pub column: ColumnRef,
    /// Output name.
    pub output: String,
}

impl SelectColumn {
    /// A root column.
    pub fn root(alias: &str, column: &str) -> Self {
        Self {
            column: ColumnRef::new(alias, column),
            output: column.to_string(),
        }
    }

    /// A column of a joined relation path.
    pub fn relation(path: &str, alias: &str, column: &str) -> Self {
        Self {
            column: ColumnRef::new(alias, column),
            output: format!("{}.{}", path, column),
        }
    }
}

/// A fully compiled listing query, ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPlan {
    /// Root entity name.
    pub root_entity: String,
    /// Root table.
    pub root_table: String,
    /// Root alias.
    pub root_alias: String,
    /// Root primary key.
    pub primary_key: Vec<String>,
    /// Joins, parents before children.
    pub joins: Vec<JoinStep>,
    /// Selected columns, root first then joins in order.
    pub select: Vec<SelectColumn>,
    /// Conjoined WHERE predicates.
    pub predicates: Vec<Predicate>,
    /// Named parameter bindings.
    pub params: NamedParams,
    /// ORDER BY.
    pub order: Vec<OrderByField>,
    /// LIMIT/OFFSET window.
    pub pagination: Pagination,
}

impl CompiledPlan {
    /// Whether any join multiplies root rows.
    pub fn has_to_many(&self) -> bool {
        self.joins.iter().any(|j| j.many)
    }

    /// Look up a join by path.
    pub fn join(&self, path: &str) -> Option<&JoinStep> {
        self.joins.iter().find(|j| j.path == path)
    }

    /// Join paths in plan order.
    pub fn join_paths(&self) -> Vec<&str> {
        self.joins.iter().map(|j| j.path.as_str()).collect()
    }

    /// WHERE clause with named parameters, for logs.
    pub fn where_clause(&self) -> String {
        self.predicates
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}
