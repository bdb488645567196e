//! The executor seam between plan compilation and a concrete store.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::QueryResult;
use crate::sql::{DatabaseType, Statement};

/// A boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One result row keyed by output column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Rows of one page plus the total number of matching root records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPage {
    /// Page rows, one per joined row.
    pub rows: Vec<Row>,
    /// Result of the count statement.
    pub total: u64,
}

impl RawPage {
    /// Create a raw page.
    pub fn new(rows: Vec<Row>, total: u64) -> Self {
        Self { rows, total }
    }
}

/// Executes rendered statements against a store.
///
/// Implementations run the page and count statements in a single round
/// trip and report storage failures as [`QueryError`](crate::QueryError)s
/// with their SQL attached.
pub trait QueryEngine: Send + Sync {
    /// Dialect the engine expects statements in.
    fn dialect(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    /// Run the page and count statements.
    fn fetch_page<'a>(&'a self, page: &'a Statement, count: &'a Statement) -> BoxFuture<'a, QueryResult<RawPage>>;
}

impl<E: QueryEngine + ?Sized> QueryEngine for Arc<E> {
    fn dialect(&self) -> DatabaseType {
        (**self).dialect()
    }

    fn fetch_page<'a>(&'a self, page: &'a Statement, count: &'a Statement) -> BoxFuture<'a, QueryResult<RawPage>> {
        (**self).fetch_page(page, count)
    }
}
