//! Static listing configuration.
//!
//! A [`ListingConfig`] declares, per listing, which relations are joined,
//! which fields are searchable and which request keys become filters. A
//! [`ListingCatalog`] keeps several of them in one TOML file:
//!
//! ```toml
//! [listings.payments]
//! relations = ["employee", "employee.person"]
//! defaultSortBy = "createdAt"
//! searchFields = ["reference", "employee.person.name"]
//! dateField = "createdAt"
//!
//! [[listings.payments.filters]]
//! field = "status"
//! operator = "IN"
//!
//! [[listings.payments.filters]]
//! field = "personName"
//! mapField = "name"
//! relation = "employee.person"
//! operator = "ILIKE"
//! ```

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::filter::Operator;

/// Which foreign-key columns a projected intermediate join hides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ForeignKeyExclusion {
    /// Only the foreign keys leading to the next hop(s) of the traversal.
    #[default]
    NextHop,
    /// Every owner-side foreign key of the intermediate entity.
    AllForeignKeys,
}

/// Maps one request key to a filter condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterFieldConfig {
    /// Request key, and the column name unless `map_field` is set.
    pub field: String,
    /// Operator applied to the request value.
    #[serde(default)]
    pub operator: Operator,
    /// Relation path the column lives on.
    #[serde(default)]
    pub relation: Option<String>,
    /// Accept the key but never turn it into a filter.
    #[serde(default)]
    pub ignore: bool,
    /// Column to filter on when it differs from the request key.
    #[serde(default)]
    pub map_field: Option<String>,
}

impl FilterFieldConfig {
    /// A filter entry with the `EQUALS` operator.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: Operator::Equals,
            relation: None,
            ignore: false,
            map_field: None,
        }
    }

    /// Set the operator.
    pub fn operator(mut self, operator: Operator) -> Self {
        self.operator = operator;
        self
    }

    /// Put the column on a relation path.
    pub fn relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    /// Filter on `column` instead of the request key.
    pub fn map_field(mut self, column: impl Into<String>) -> Self {
        self.map_field = Some(column.into());
        self
    }

    /// Accept but ignore the key.
    pub fn ignored(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// The column this entry filters on.
    pub fn column(&self) -> &str {
        self.map_field.as_deref().unwrap_or(&self.field)
    }
}

/// Declarative configuration of one listing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingConfig {
    /// Relation paths to join.
    pub relations: Vec<String>,
    /// Sort field when the request names none.
    pub default_sort_by: Option<String>,
    /// Fields the free-text search runs over.
    pub search_fields: Vec<String>,
    /// Column the request's date range applies to.
    pub date_field: Option<String>,
    /// Request keys accepted as filters.
    pub filters: Vec<FilterFieldConfig>,
    /// Projection; every physical column when absent.
    pub select: Option<Vec<String>>,
    /// Include soft-deleted rows unless the request says otherwise.
    pub with_deleted: bool,
    /// Foreign-key exclusion policy for projected intermediate joins.
    pub foreign_key_exclusion: ForeignKeyExclusion,
}

impl ListingConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the relation paths.
    pub fn relations(mut self, relations: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.relations = relations.into_iter().map(Into::into).collect();
        self
    }

    /// Set the default sort field.
    pub fn default_sort_by(mut self, field: impl Into<String>) -> Self {
        self.default_sort_by = Some(field.into());
        self
    }

    /// Set the search fields.
    pub fn search_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the date-range column.
    pub fn date_field(mut self, field: impl Into<String>) -> Self {
        self.date_field = Some(field.into());
        self
    }

    /// Add a filter entry.
    pub fn filter(mut self, filter: FilterFieldConfig) -> Self {
        self.filters.push(filter);
        self
    }

    /// Set the projection.
    pub fn select(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Include soft-deleted rows by default.
    pub fn with_deleted(mut self, with_deleted: bool) -> Self {
        self.with_deleted = with_deleted;
        self
    }

    /// Set the foreign-key exclusion policy.
    pub fn foreign_key_exclusion(mut self, policy: ForeignKeyExclusion) -> Self {
        self.foreign_key_exclusion = policy;
        self
    }

    /// Parse a single listing configuration from TOML.
    pub fn from_toml_str(content: &str) -> QueryResult<Self> {
        toml::from_str(content).map_err(|e| {
            QueryError::configuration(format!("Invalid listing TOML: {}", e)).with_source(e)
        })
    }
}

/// Named listing configurations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingCatalog {
    /// Listings keyed by name.
    #[serde(default)]
    pub listings: IndexMap<String, ListingConfig>,
}

impl ListingCatalog {
    /// Parse a catalog from TOML.
    pub fn from_toml_str(content: &str) -> QueryResult<Self> {
        toml::from_str(content).map_err(|e| {
            QueryError::configuration(format!("Invalid listing catalog TOML: {}", e)).with_source(e)
        })
    }

    /// Load a catalog from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            QueryError::configuration(format!("Cannot read listing catalog {}: {}", path.display(), e))
                .with_source(e)
        })?;
        Self::from_toml_str(&content)
    }

    /// Register a listing.
    pub fn insert(&mut self, name: impl Into<String>, config: ListingConfig) {
        self.listings.insert(name.into(), config);
    }

    /// Look up a listing by name.
    pub fn get(&self, name: &str) -> QueryResult<&ListingConfig> {
        self.listings.get(name).ok_or_else(|| {
            QueryError::configuration(format!("Unknown listing '{}'", name))
                .with_suggestion(format!(
                    "Known listings: {}",
                    self.listings.keys().cloned().collect::<Vec<_>>().join(", ")
                ))
        })
    }
}
