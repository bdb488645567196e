//! Offset pagination and the paginated result envelope.
//!
//! ```rust
//! use basequery_engine::pagination::{PageMeta, Pagination};
//!
//! let page_3 = Pagination::page(3, 25);
//! assert_eq!(page_3.skip, 50);
//! assert_eq!(page_3.to_sql(), "LIMIT 25 OFFSET 50");
//!
//! let meta = PageMeta::new(10, 10, 95);
//! assert_eq!(meta.total_pages, 10);
//! assert!(!meta.has_next_page);
//! assert!(meta.has_previous_page);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// LIMIT/OFFSET window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    /// Rows skipped.
    pub skip: u64,
    /// Rows taken.
    pub take: u64,
}

impl Pagination {
    /// Window for a 1-based page.
    pub fn page(page: u64, page_size: u64) -> Self {
        Self {
            skip: page.saturating_sub(1).saturating_mul(page_size),
            take: page_size,
        }
    }

    /// Generate the `LIMIT .. OFFSET ..` clause.
    pub fn to_sql(&self) -> String {
        let mut sql = String::with_capacity(32);
        self.write_sql(&mut sql);
        sql
    }

    /// Write the clause into an existing buffer.
    #[inline]
    pub fn write_sql(&self, buffer: &mut String) {
        let _ = write!(buffer, "LIMIT {} OFFSET {}", self.take, self.skip);
    }
}

/// Page metadata returned alongside the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    /// 1-based page number.
    pub page: u64,
    /// Page size.
    pub limit: u64,
    /// Total matching root records.
    pub total: u64,
    /// `ceil(total / limit)`.
    pub total_pages: u64,
    /// `page < total_pages`.
    pub has_next_page: bool,
    /// `page > 1`.
    pub has_previous_page: bool,
}

impl PageMeta {
    /// Compute metadata for a page.
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            page,
            limit,
            total,
            total_pages,
            has_next_page: page < total_pages,
            has_previous_page: page > 1,
        }
    }
}

/// A page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationResult<T> {
    /// The rows of this page.
    pub data: Vec<T>,
    /// Page metadata.
    pub meta: PageMeta,
}

impl<T> PaginationResult<T> {
    /// Create a result.
    pub fn new(data: Vec<T>, meta: PageMeta) -> Self {
        Self { data, meta }
    }

    /// Number of rows on this page.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether this page is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Map every row, keeping the metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginationResult<U> {
        PaginationResult {
            data: self.data.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

impl<T> IntoIterator for PaginationResult<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}
