//! Common types used in plan building.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::QueryError;

/// Sort order for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// Ascending order (A-Z, 0-9, oldest first).
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    /// Descending order (Z-A, 9-0, newest first).
    #[default]
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

impl SortOrder {
    /// Get the SQL keyword for this sort order.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl SortOrder {
    /// Parse an optional request value, defaulting to `DESC`.
    pub fn parse_or_default(value: Option<&str>) -> Result<Self, QueryError> {
        value.map(str::parse).transpose().map(Option::unwrap_or_default)
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

impl FromStr for SortOrder {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            other => Err(QueryError::invalid_input(
                "sortOrder",
                format!("expected ASC or DESC, got '{}'", other),
            )),
        }
    }
}

/// A column qualified by the alias of the table (or join) it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Alias of the root entity or of a joined relation path.
    pub alias: String,
    /// Physical column name.
    pub column: String,
}

impl ColumnRef {
    /// Create a new column reference.
    pub fn new(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.alias, self.column)
    }
}

/// A single ORDER BY column and direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByField {
    /// The column to order by.
    pub column: ColumnRef,
    /// The sort order.
    pub order: SortOrder,
}

impl OrderByField {
    /// Create a new order by field.
    pub fn new(column: ColumnRef, order: SortOrder) -> Self {
        Self { column, order }
    }

    /// Create an ascending order.
    pub fn asc(column: ColumnRef) -> Self {
        Self::new(column, SortOrder::Asc)
    }

    /// Create a descending order.
    pub fn desc(column: ColumnRef) -> Self {
        Self::new(column, SortOrder::Desc)
    }
}

/// Column used for the default ordering when a listing names no sort field.
pub const DEFAULT_SORT_COLUMN: &str = "createdAt";
