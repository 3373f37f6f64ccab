//! Database layer errors

use genesis_core::error::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Query error: {0}")]
    Query(String),

    #[error("Table {0} does not exist")]
    NoSuchTable(String),

    #[error("Column {column} does not exist in {table}")]
    NoSuchColumn { table: String, column: String },

    #[error("Row without id inserted into {0}")]
    MissingId(String),

    #[error("Duplicate id {id} in {table}")]
    DuplicateId { table: String, id: i64 },

    #[error("Transaction already finished")]
    Finished,
}

pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        EngineError::Db(err.to_string())
    }
}
