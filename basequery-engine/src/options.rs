//! Normalized query options and the raw listing request they are built from.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::ForeignKeyExclusion;
use crate::filter::{FilterCondition, FilterValue};
use crate::types::SortOrder;

/// Default page number.
pub const DEFAULT_PAGE: u64 = 1;
/// Default page size.
pub const DEFAULT_LIMIT: u64 = 10;
/// Largest accepted page size.
pub const MAX_LIMIT: u64 = 100;

/// Everything needed to compile one listing query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    /// 1-based page number.
    pub page: u64,
    /// Page size, `1..=100`.
    pub limit: u64,
    /// Free-text search term.
    pub search: Option<String>,
    /// Fields searched by `search`.
    pub search_fields: Vec<String>,
    /// Sort column, possibly dotted.
    pub sort_by: Option<String>,
    /// Sort direction.
    pub sort_order: SortOrder,
    /// Filters, conjoined.
    pub filters: Vec<FilterCondition>,
    /// Relation paths to join.
    pub relations: Vec<String>,
    /// Projection; every physical column when absent.
    pub select: Option<Vec<String>>,
    /// Column the date range was applied to, checked like a sort field.
    pub date_field: Option<String>,
    /// Include soft-deleted rows.
    pub with_deleted: bool,
    /// Foreign-key exclusion policy for projected intermediate joins.
    pub foreign_key_exclusion: ForeignKeyExclusion,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            search: None,
            search_fields: Vec::new(),
            sort_by: None,
            sort_order: SortOrder::Desc,
            filters: Vec::new(),
            relations: Vec::new(),
            select: None,
            date_field: None,
            with_deleted: false,
            foreign_key_exclusion: ForeignKeyExclusion::NextHop,
        }
    }
}

impl QueryOptions {
    /// Options for the first page of 10.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set page and page size.
    pub fn page(mut self, page: u64, limit: u64) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    /// Set the search term and fields.
    pub fn search(
        mut self,
        term: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.search = Some(term.into());
        self.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the sort column and direction.
    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(field.into());
        self.sort_order = order;
        self
    }

    /// Add a filter.
    pub fn filter(mut self, filter: FilterCondition) -> Self {
        self.filters.push(filter);
        self
    }

    /// Set the relation paths.
    pub fn relations(mut self, relations: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.relations = relations.into_iter().map(Into::into).collect();
        self
    }

    /// Set the projection.
    pub fn select(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Include soft-deleted rows.
    pub fn with_deleted(mut self, with_deleted: bool) -> Self {
        self.with_deleted = with_deleted;
        self
    }

    /// Set the foreign-key exclusion policy.
    pub fn foreign_key_exclusion(mut self, policy: ForeignKeyExclusion) -> Self {
        self.foreign_key_exclusion = policy;
        self
    }

    /// Number of rows skipped before this page.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

/// A listing request as received from a caller (query string or JSON body).
///
/// Keys that are not listed here land in `filters` and are matched against
/// the listing's filter configuration; unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRequest {
    /// Requested page.
    #[serde(default)]
    pub page: Option<u64>,
    /// Requested page size.
    #[serde(default)]
    pub limit: Option<u64>,
    /// Free-text search term.
    #[serde(default)]
    pub search: Option<String>,
    /// Sort column.
    #[serde(default)]
    pub sort_by: Option<String>,
    /// Sort direction.
    #[serde(default)]
    pub sort_order: Option<SortOrder>,
    /// Lower bound of the date range (date or RFC 3339 datetime).
    #[serde(default)]
    pub start_date: Option<String>,
    /// Upper bound of the date range.
    #[serde(default)]
    pub end_date: Option<String>,
    /// Override the listing's soft-delete setting.
    #[serde(default)]
    pub with_deleted: Option<bool>,
    /// Remaining keys.
    #[serde(flatten)]
    pub filters: IndexMap<String, FilterValue>,
}

impl ListingRequest {
    /// Create an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set page and page size.
    pub fn page(mut self, page: u64, limit: u64) -> Self {
        self.page = Some(page);
        self.limit = Some(limit);
        self
    }

    /// Set the search term.
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// Set the sort column and direction.
    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(field.into());
        self.sort_order = Some(order);
        self
    }

    /// Set the date range bounds.
    pub fn date_range(mut self, start: Option<&str>, end: Option<&str>) -> Self {
        self.start_date = start.map(str::to_string);
        self.end_date = end.map(str::to_string);
        self
    }

    /// Set a filter value.
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Override the soft-delete setting.
    pub fn with_deleted(mut self, with_deleted: bool) -> Self {
        self.with_deleted = Some(with_deleted);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let options = QueryOptions::new();
        assert_eq!(options.page, 1);
        assert_eq!(options.limit, 10);
        assert_eq!(options.sort_order, SortOrder::Desc);
        assert_eq!(options.offset(), 0);
        assert_eq!(QueryOptions::new().page(3, 25).offset(), 50);
    }

    #[test]
    fn test_request_flattens_filters() {
        let request: ListingRequest = serde_json::from_str(
            r#"{"page": 2, "limit": 20, "sortBy": "amount", "sortOrder": "asc",
                "startDate": "2024-01-01", "status": ["PAID", "PENDING"], "employeeId": 7}"#,
        )
        .unwrap();

        assert_eq!(request.page, Some(2));
        assert_eq!(request.sort_order, Some(SortOrder::Asc));
        assert_eq!(request.start_date.as_deref(), Some("2024-01-01"));
        assert_eq!(request.filters.len(), 2);
        assert_eq!(request.filters["employeeId"], FilterValue::Int(7));
        assert_eq!(
            request.filters["status"],
            FilterValue::List(vec!["PAID".into(), "PENDING".into()])
        );
    }
}
