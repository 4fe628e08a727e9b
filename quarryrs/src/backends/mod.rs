//! Execution backends.

use async_trait::async_trait;

use crate::error::Result;
use crate::executor::QueryResult;

pub mod duckdb;

pub use self::duckdb::DuckDbBackend;

/// Unified interface to the target database.
#[async_trait]
pub trait BackendConnection: Send + Sync {
    /// Run a select statement and collect its result set.
    async fn execute_sql(&self, sql: &str) -> Result<QueryResult>;
    /// Run one or more DDL/DML statements, discarding output.
    async fn execute_batch(&self, sql: &str) -> Result<()>;
}
