//! DuckDB backend implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};

use crate::error::{QuarryError, Result};
use crate::executor::{value_to_json, ColumnMeta, QueryResult};

use super::BackendConnection;

/// DuckDB connection implementing the unified backend trait.
#[derive(Clone)]
pub struct DuckDbBackend {
    database_path: PathBuf,
    limiter: Arc<Semaphore>,
    pool: Arc<Mutex<Vec<duckdb::Connection>>>,
}

impl DuckDbBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        tracing::debug!(path = %path.display(), "creating DuckDB backend");
        Self {
            database_path: path,
            limiter: Arc::new(Semaphore::new(16)),
            pool: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Configure maximum concurrent executions; callers can tune based on hardware.
    pub fn with_max_concurrency(mut self, max_in_flight: usize) -> Self {
        self.limiter = Arc::new(Semaphore::new(max_in_flight));
        self
    }

    async fn acquire_slot(&self) -> Result<SemaphorePermit<'_>> {
        self.limiter
            .acquire()
            .await
            .map_err(|e| QuarryError::Execution(format!("limiter closed: {e}")))
    }

    async fn checkout_connection(&self) -> Result<duckdb::Connection> {
        if let Some(conn) = self.pool.lock().await.pop() {
            return Ok(conn);
        }
        tracing::debug!(path = %self.database_path.display(), "opening new DuckDB connection");
        Ok(duckdb::Connection::open(self.database_path.clone())?)
    }

    async fn return_connection(&self, conn: duckdb::Connection) {
        self.pool.lock().await.push(conn);
    }
}

#[async_trait]
impl BackendConnection for DuckDbBackend {
    async fn execute_sql(&self, sql: &str) -> Result<QueryResult> {
        let sql = sql.to_string();
        let _permit = self.acquire_slot().await?;
        let conn = self.checkout_connection().await?;
        let result =
            tokio::task::spawn_blocking(move || -> Result<(QueryResult, duckdb::Connection)> {
                let start = Instant::now();
                // Statement borrows the connection; keep it scoped so the
                // connection can be handed back to the pool.
                let (columns, rows) = {
                    let mut stmt = conn.prepare(&sql)?;
                    let mut rows_iter = stmt.query([])?;
                    let stmt_ref = rows_iter
                        .as_ref()
                        .ok_or_else(|| QuarryError::Execution("statement missing".to_string()))?;
                    let mut column_names = Vec::new();
                    for idx in 0..stmt_ref.column_count() {
                        let name = stmt_ref
                            .column_name(idx)
                            .map_err(|e| QuarryError::Execution(e.to_string()))?;
                        column_names.push(name.to_string());
                    }
                    let mut rows = Vec::new();
                    while let Some(row) = rows_iter.next()? {
                        let mut map = serde_json::Map::new();
                        for (idx, name) in column_names.iter().enumerate() {
                            let value = value_to_json(row.get_ref(idx)?.to_owned());
                            map.insert(name.clone(), value);
                        }
                        rows.push(map);
                    }
                    let columns: Vec<_> = column_names
                        .into_iter()
                        .map(|name| ColumnMeta { name })
                        .collect();
                    (columns, rows)
                };
                let elapsed = start.elapsed();
                tracing::debug!(
                    rows = rows.len(),
                    columns = columns.len(),
                    ms = elapsed.as_millis(),
                    "duckdb execute_sql"
                );
                Ok((QueryResult { columns, rows }, conn))
            })
            .await
            .map_err(|e| QuarryError::Execution(format!("task join error: {e}")))?;

        let (result, conn) = result?;
        self.return_connection(conn).await;
        Ok(result)
    }

    async fn execute_batch(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        let _permit = self.acquire_slot().await?;
        let conn = self.checkout_connection().await?;
        let conn = tokio::task::spawn_blocking(move || -> Result<duckdb::Connection> {
            let start = Instant::now();
            conn.execute_batch(&sql)?;
            tracing::debug!(ms = start.elapsed().as_millis(), "duckdb execute_batch");
            Ok(conn)
        })
        .await
        .map_err(|e| QuarryError::Execution(format!("task join error: {e}")))??;

        self.return_connection(conn).await;
        Ok(())
    }
}
