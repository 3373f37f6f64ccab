//! Postgres datastore
//!
//! Relational backend over sqlx. The SPI's column model maps directly:
//! `id BIGINT PRIMARY KEY`, every other column `TEXT`. Transactions run
//! at SERIALIZABLE isolation, the engine's unit of isolation per call.

use async_trait::async_trait;
use genesis_core::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Postgres, Row as SqlxRow, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::schema;
use crate::spi::{Datastore, Row, SelectQuery, StoreTx};

/// Postgres implementation of the storage SPI.
#[derive(Clone)]
pub struct PgDatastore {
    pool: PgPool,
}

impl PgDatastore {
    /// Connects to the DSN from the node configuration.
    pub async fn connect(dsn: &str) -> DbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(dsn)
            .await
            .map_err(|e| DbError::Query(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Datastore for PgDatastore {
    async fn begin(&self) -> DbResult<Box<dyn StoreTx>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::Query(e.to_string()))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::Query(e.to_string()))?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn init_schema(&self) -> DbResult<()> {
        for (table, columns) in schema::global_tables() {
            sqlx::query(&schema::table_ddl(&table, &columns))
                .execute(&self.pool)
                .await
                .map_err(|e| DbError::Query(e.to_string()))?;
        }
        Ok(())
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

enum Bind {
    Int(i64),
    Text(String),
}

fn bind_value(column: &str, value: &Value) -> Bind {
    if column == "id" {
        if let Ok(id) = value.to_int() {
            return Bind::Int(id);
        }
    }
    Bind::Text(value.to_display())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', ""))
}

fn decode_row(pg_row: &PgRow) -> Row {
    let mut row = Row::new();
    for col in pg_row.columns() {
        let name = col.name();
        if name == "id" {
            if let Ok(id) = pg_row.try_get::<i64, _>(name) {
                row.insert(name.to_string(), Value::Int(id));
            }
        } else if let Ok(text) = pg_row.try_get::<String, _>(name) {
            row.insert(name.to_string(), Value::Str(text));
        }
    }
    row
}

impl PgTx {
    fn where_clause(wheres: &[(String, Value)], binds: &mut Vec<Bind>) -> String {
        if wheres.is_empty() {
            return String::new();
        }
        let mut clause = String::from(" WHERE ");
        for (i, (col, val)) in wheres.iter().enumerate() {
            if i > 0 {
                clause.push_str(" AND ");
            }
            binds.push(bind_value(col, val));
            clause.push_str(&format!("{} = ${}", quote_ident(col), binds.len()));
        }
        clause
    }

    async fn run(&mut self, sql: &str, binds: Vec<Bind>) -> DbResult<u64> {
        debug!(sql, "executing");
        let mut query = sqlx::query(sql);
        for bind in binds {
            query = match bind {
                Bind::Int(v) => query.bind(v),
                Bind::Text(v) => query.bind(v),
            };
        }
        let result = query
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DbError::Query(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn fetch(&mut self, sql: &str, binds: Vec<Bind>) -> DbResult<Vec<PgRow>> {
        debug!(sql, "querying");
        let mut query = sqlx::query(sql);
        for bind in binds {
            query = match bind {
                Bind::Int(v) => query.bind(v),
                Bind::Text(v) => query.bind(v),
            };
        }
        query
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| DbError::Query(e.to_string()))
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn select(&mut self, query: &SelectQuery) -> DbResult<Vec<Row>> {
        let projection = if query.columns.is_empty() {
            "*".to_string()
        } else {
            let mut cols: Vec<String> = query.columns.iter().map(|c| quote_ident(c)).collect();
            if !query.columns.iter().any(|c| c == "id") {
                cols.push(quote_ident("id"));
            }
            cols.join(", ")
        };

        let mut binds = Vec::new();
        let mut sql = format!(
            "SELECT {} FROM {}{}",
            projection,
            quote_ident(&query.table),
            Self::where_clause(&query.wheres, &mut binds),
        );

        match &query.order {
            Some((col, desc)) => {
                sql.push_str(&format!(
                    " ORDER BY {}{}",
                    quote_ident(col),
                    if *desc { " DESC" } else { "" }
                ));
            }
            None => sql.push_str(" ORDER BY id"),
        }
        if query.limit > 0 {
            sql.push_str(&format!(" LIMIT {}", query.limit));
        }
        if query.offset > 0 {
            sql.push_str(&format!(" OFFSET {}", query.offset));
        }

        let rows = self.fetch(&sql, binds).await?;
        Ok(rows.iter().map(decode_row).collect())
    }

    async fn insert(&mut self, table: &str, row: &Row) -> DbResult<()> {
        if !row.contains_key("id") {
            return Err(DbError::MissingId(table.to_string()));
        }
        let mut cols = Vec::new();
        let mut placeholders = Vec::new();
        let mut binds = Vec::new();
        for (col, val) in row {
            binds.push(bind_value(col, val));
            cols.push(quote_ident(col));
            placeholders.push(format!("${}", binds.len()));
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            cols.join(", "),
            placeholders.join(", ")
        );
        self.run(&sql, binds).await?;
        Ok(())
    }

    async fn update(
        &mut self,
        table: &str,
        wheres: &[(String, Value)],
        values: &Row,
    ) -> DbResult<u64> {
        let mut binds = Vec::new();
        let mut sets = Vec::new();
        for (col, val) in values {
            if col == "id" {
                continue;
            }
            binds.push(bind_value(col, val));
            sets.push(format!("{} = ${}", quote_ident(col), binds.len()));
        }
        if sets.is_empty() {
            return Ok(0);
        }
        let clause = Self::where_clause(wheres, &mut binds);
        let sql = format!(
            "UPDATE {} SET {}{}",
            quote_ident(table),
            sets.join(", "),
            clause
        );
        self.run(&sql, binds).await
    }

    async fn delete(&mut self, table: &str, wheres: &[(String, Value)]) -> DbResult<u64> {
        let mut binds = Vec::new();
        let clause = Self::where_clause(wheres, &mut binds);
        let sql = format!("DELETE FROM {}{}", quote_ident(table), clause);
        self.run(&sql, binds).await
    }

    async fn next_id(&mut self, table: &str) -> DbResult<i64> {
        let sql = format!(
            "SELECT COALESCE(MAX(id), 0) + 1 AS next FROM {}",
            quote_ident(table)
        );
        let rows = self.fetch(&sql, Vec::new()).await?;
        let next = rows
            .first()
            .and_then(|r| r.try_get::<i64, _>("next").ok())
            .unwrap_or(1);
        Ok(next)
    }

    async fn count(&mut self, table: &str) -> DbResult<i64> {
        let sql = format!("SELECT COUNT(*) AS total FROM {}", quote_ident(table));
        let rows = self.fetch(&sql, Vec::new()).await?;
        Ok(rows
            .first()
            .and_then(|r| r.try_get::<i64, _>("total").ok())
            .unwrap_or(0))
    }

    async fn create_table(&mut self, table: &str, columns: &[String]) -> DbResult<()> {
        let ddl = schema::table_ddl(table, columns);
        self.run(&ddl, Vec::new()).await?;
        Ok(())
    }

    async fn add_column(&mut self, table: &str, column: &str) -> DbResult<()> {
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} TEXT NOT NULL DEFAULT ''",
            quote_ident(table),
            quote_ident(column)
        );
        self.run(&sql, Vec::new()).await?;
        Ok(())
    }

    async fn table_exists(&mut self, table: &str) -> DbResult<bool> {
        let rows = self
            .fetch(
                "SELECT 1 AS found FROM information_schema.tables WHERE table_name = $1",
                vec![Bind::Text(table.to_string())],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::Query(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> DbResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::Query(e.to_string()))
    }
}
