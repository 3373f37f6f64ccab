//! Storage SPI
//!
//! The engine composes table/column permission checks before any storage
//! call, so queries arrive here as structure rather than SQL: a table,
//! a projection, ANDed equality predicates, order, limit and offset.
//! Backends turn that into their own query form.
//!
//! Every table carries a BIGINT `id` primary key; all other columns are
//! text. Where-values compare on canonical display form, so `Int(5)`
//! matches a stored `"5"`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use genesis_core::Value;

use crate::error::DbResult;

/// A stored row: column name to value.
pub type Row = BTreeMap<String, Value>;

/// Structured read query.
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    pub table: String,
    /// Empty means all columns.
    pub columns: Vec<String>,
    /// ANDed equality predicates.
    pub wheres: Vec<(String, Value)>,
    /// Order column and descending flag; default `id` ascending.
    pub order: Option<(String, bool)>,
    pub limit: i64,
    pub offset: i64,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn columns(mut self, cols: &[&str]) -> Self {
        self.columns = cols.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn filter(mut self, column: impl Into<String>, value: Value) -> Self {
        self.wheres.push((column.into(), value));
        self
    }

    pub fn wheres_from(mut self, wheres: &[(String, Value)]) -> Self {
        self.wheres.extend(wheres.iter().cloned());
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, desc: bool) -> Self {
        self.order = Some((column.into(), desc));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// A datastore that can open serializable transactions.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Opens a transaction. Effects are invisible to other transactions
    /// until commit; the engine runs one transaction per contract call.
    async fn begin(&self) -> DbResult<Box<dyn StoreTx>>;

    /// Creates the global schema if it does not exist yet.
    async fn init_schema(&self) -> DbResult<()>;
}

/// A serializable storage transaction.
#[async_trait]
pub trait StoreTx: Send {
    async fn select(&mut self, query: &SelectQuery) -> DbResult<Vec<Row>>;

    /// Inserts a row; the row must carry an `id` column.
    async fn insert(&mut self, table: &str, row: &Row) -> DbResult<()>;

    /// Updates matching rows with the given column values; returns the
    /// number of rows touched.
    async fn update(
        &mut self,
        table: &str,
        wheres: &[(String, Value)],
        values: &Row,
    ) -> DbResult<u64>;

    /// Deletes matching rows; returns the number of rows removed.
    async fn delete(&mut self, table: &str, wheres: &[(String, Value)]) -> DbResult<u64>;

    /// Next free primary key for the table (max id + 1, at least 1).
    async fn next_id(&mut self, table: &str) -> DbResult<i64>;

    /// Total row count of the table.
    async fn count(&mut self, table: &str) -> DbResult<i64>;

    /// Creates a table with the given extra columns (besides `id`).
    async fn create_table(&mut self, table: &str, columns: &[String]) -> DbResult<()>;

    /// Adds a text column to an existing table.
    async fn add_column(&mut self, table: &str, column: &str) -> DbResult<()>;

    async fn table_exists(&mut self, table: &str) -> DbResult<bool>;

    async fn commit(self: Box<Self>) -> DbResult<()>;

    async fn rollback(self: Box<Self>) -> DbResult<()>;
}

/// Builds a one-column row, the common case for partial updates.
pub fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
