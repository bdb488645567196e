//! PostgreSQL query engine implementation.

use basequery_engine::{BoxFuture, DatabaseType, QueryEngine, QueryError, QueryResult, RawPage, Statement};
use deadpool_postgres::Object;
use tracing::debug;

use crate::config::PgConfig;
use crate::error::{PgError, PgResult};
use crate::pool::PgPool;
use crate::row::rows_to_json;
use crate::types::{as_sql_refs, bind_params};

/// PostgreSQL engine that executes listing statements on a pooled connection.
#[derive(Debug, Clone)]
pub struct PgEngine {
    pool: PgPool,
}

impl PgEngine {
    /// Create a new PostgreSQL engine with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an engine with a default-sized pool for `url`.
    pub fn connect(url: impl AsRef<str>) -> PgResult<Self> {
        Ok(Self::new(PgPool::new(PgConfig::from_url(url)?)?))
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn run(&self, page: &Statement, count: &Statement) -> QueryResult<RawPage> {
        let client = self.pool.get().await.map_err(QueryError::from)?;

        // Both statements go out on the same connection; tokio-postgres
        // pipelines them.
        let (rows, total) = futures::try_join!(
            fetch_rows(&client, page),
            fetch_total(&client, count)
        )?;

        debug!(rows = rows.len(), total, "Listing page fetched");
        Ok(RawPage::new(rows, total))
    }
}

impl QueryEngine for PgEngine {
    fn dialect(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    fn fetch_page<'a>(&'a self, page: &'a Statement, count: &'a Statement) -> BoxFuture<'a, QueryResult<RawPage>> {
        Box::pin(self.run(page, count))
    }
}

async fn fetch_rows(client: &Object, statement: &Statement) -> QueryResult<Vec<basequery_engine::Row>> {
    debug!(sql = %statement.sql, params = statement.params.len(), "Executing page query");
    let params = bind_params(&statement.params).map_err(|e| storage_error(e, statement))?;
    let prepared = client
        .prepare_cached(&statement.sql)
        .await
        .map_err(|e| storage_error(e.into(), statement))?;
    let rows = client
        .query(&prepared, &as_sql_refs(&params))
        .await
        .map_err(|e| storage_error(e.into(), statement))?;
    rows_to_json(&rows).map_err(|e| {
        QueryError::deserialization(e.to_string())
            .with_sql(&statement.sql)
            .with_source(e)
    })
}

async fn fetch_total(client: &Object, statement: &Statement) -> QueryResult<u64> {
    debug!(sql = %statement.sql, "Executing count query");
    let params = bind_params(&statement.params).map_err(|e| storage_error(e, statement))?;
    let prepared = client
        .prepare_cached(&statement.sql)
        .await
        .map_err(|e| storage_error(e.into(), statement))?;
    let row = client
        .query_one(&prepared, &as_sql_refs(&params))
        .await
        .map_err(|e| storage_error(e.into(), statement))?;
    let total: i64 = row
        .try_get(0)
        .map_err(|e| storage_error(e.into(), statement))?;
    Ok(u64::try_from(total).unwrap_or_default())
}

fn storage_error(err: PgError, statement: &Statement) -> QueryError {
    QueryError::from(err).with_sql(&statement.sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_engine_dialect() {
        let engine = PgEngine::connect("postgresql://localhost/payroll").unwrap();
        assert_eq!(engine.dialect(), DatabaseType::PostgreSQL);
        assert_eq!(engine.pool().config().database, "payroll");
    }

    #[test]
    fn test_connect_rejects_bad_url() {
        assert!(PgEngine::connect("not a url").is_err());
    }

    #[test]
    fn test_storage_error_keeps_sql() {
        let statement = Statement {
            sql: "SELECT 1".to_string(),
            params: Vec::new(),
        };
        let err = storage_error(PgError::connection("refused"), &statement);
        assert!(err.is_connection_error());
        assert_eq!(err.context.sql.as_deref(), Some("SELECT 1"));
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL at DATABASE_URL"]
    async fn test_fetch_page_live() {
        let engine = PgEngine::new(PgPool::new(PgConfig::from_env().unwrap()).unwrap());
        let page = Statement {
            sql: "SELECT $1::int4 AS \"id\", 'ana'::text AS \"person.name\"".to_string(),
            params: vec![basequery_engine::FilterValue::Int(7)],
        };
        let count = Statement {
            sql: "SELECT COUNT(*) AS \"total\"".to_string(),
            params: Vec::new(),
        };

        let raw = engine.fetch_page(&page, &count).await.unwrap();
        assert_eq!(raw.total, 1);
        assert_eq!(raw.rows[0]["id"], serde_json::json!(7));
        assert_eq!(raw.rows[0]["person.name"], serde_json::json!("ana"));
    }
}
