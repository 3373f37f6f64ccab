//! In-memory datastore
//!
//! Single-writer store used by tests and by nodes running without a
//! relational backend. `begin` takes the store lock for the life of the
//! transaction, so transactions serialize exactly like the engine's
//! serial-within-block execution. A snapshot taken at `begin` backs
//! rollback; a transaction dropped without commit restores it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use genesis_core::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{DbError, DbResult};
use crate::spi::{Datastore, Row, SelectQuery, StoreTx};

#[derive(Debug, Clone, Default)]
struct Table {
    columns: BTreeSet<String>,
    rows: BTreeMap<i64, Row>,
}

#[derive(Debug, Clone, Default)]
struct Inner {
    tables: BTreeMap<String, Table>,
}

/// In-memory implementation of the storage SPI.
#[derive(Clone, Default)]
pub struct MemoryDatastore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn begin(&self) -> DbResult<Box<dyn StoreTx>> {
        let guard = self.inner.clone().lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            snapshot,
            finished: false,
        }))
    }

    async fn init_schema(&self) -> DbResult<()> {
        let mut tx = self.begin().await?;
        for (name, columns) in crate::schema::global_tables() {
            if !tx.table_exists(&name).await? {
                tx.create_table(&name, &columns).await?;
            }
        }
        tx.commit().await
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<Inner>,
    snapshot: Inner,
    finished: bool,
}

impl MemoryTx {
    fn table(&self, name: &str) -> DbResult<&Table> {
        self.guard
            .tables
            .get(name)
            .ok_or_else(|| DbError::NoSuchTable(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> DbResult<&mut Table> {
        self.guard
            .tables
            .get_mut(name)
            .ok_or_else(|| DbError::NoSuchTable(name.to_string()))
    }

    fn matching_ids(&self, name: &str, wheres: &[(String, Value)]) -> DbResult<Vec<i64>> {
        let table = self.table(name)?;
        let mut out = Vec::new();
        for (id, row) in &table.rows {
            if wheres.iter().all(|(col, want)| {
                let have = if col == "id" {
                    Some(Value::Int(*id))
                } else {
                    row.get(col).cloned()
                };
                match have {
                    Some(have) => have.to_display() == want.to_display(),
                    None => false,
                }
            }) {
                out.push(*id);
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn select(&mut self, query: &SelectQuery) -> DbResult<Vec<Row>> {
        let ids = self.matching_ids(&query.table, &query.wheres)?;
        let table = self.table(&query.table)?;

        let mut rows: Vec<(i64, Row)> = ids
            .into_iter()
            .map(|id| {
                let mut row = table.rows[&id].clone();
                row.insert("id".to_string(), Value::Int(id));
                (id, row)
            })
            .collect();

        if let Some((col, desc)) = &query.order {
            rows.sort_by(|(_, a), (_, b)| {
                let av = a.get(col).cloned().unwrap_or(Value::Null);
                let bv = b.get(col).cloned().unwrap_or(Value::Null);
                // numeric columns sort numerically, everything else on
                // display form
                let ord = match (av.to_int(), bv.to_int()) {
                    (Ok(ai), Ok(bi)) => ai.cmp(&bi),
                    _ => av.to_display().cmp(&bv.to_display()),
                };
                if *desc {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        let offset = query.offset.max(0) as usize;
        let limit = if query.limit > 0 {
            query.limit as usize
        } else {
            usize::MAX
        };

        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, mut row)| {
                if !query.columns.is_empty() {
                    // id always travels with a projection, as in SQL backends
                    row.retain(|col, _| col == "id" || query.columns.iter().any(|c| c == col));
                }
                row
            })
            .collect())
    }

    async fn insert(&mut self, table: &str, row: &Row) -> DbResult<()> {
        let id = row
            .get("id")
            .and_then(|v| v.to_int().ok())
            .ok_or_else(|| DbError::MissingId(table.to_string()))?;
        let tbl = self.table_mut(table)?;
        if tbl.rows.contains_key(&id) {
            return Err(DbError::DuplicateId {
                table: table.to_string(),
                id,
            });
        }
        let mut stored = row.clone();
        stored.remove("id");
        for col in stored.keys() {
            tbl.columns.insert(col.clone());
        }
        tbl.rows.insert(id, stored);
        Ok(())
    }

    async fn update(
        &mut self,
        table: &str,
        wheres: &[(String, Value)],
        values: &Row,
    ) -> DbResult<u64> {
        let ids = self.matching_ids(table, wheres)?;
        let tbl = self.table_mut(table)?;
        for id in &ids {
            if let Some(row) = tbl.rows.get_mut(id) {
                for (col, val) in values {
                    if col == "id" {
                        continue;
                    }
                    tbl.columns.insert(col.clone());
                    row.insert(col.clone(), val.clone());
                }
            }
        }
        Ok(ids.len() as u64)
    }

    async fn delete(&mut self, table: &str, wheres: &[(String, Value)]) -> DbResult<u64> {
        let ids = self.matching_ids(table, wheres)?;
        let tbl = self.table_mut(table)?;
        for id in &ids {
            tbl.rows.remove(id);
        }
        Ok(ids.len() as u64)
    }

    async fn next_id(&mut self, table: &str) -> DbResult<i64> {
        let tbl = self.table(table)?;
        Ok(tbl.rows.keys().max().map(|id| id + 1).unwrap_or(1))
    }

    async fn count(&mut self, table: &str) -> DbResult<i64> {
        Ok(self.table(table)?.rows.len() as i64)
    }

    async fn create_table(&mut self, table: &str, columns: &[String]) -> DbResult<()> {
        if self.guard.tables.contains_key(table) {
            return Err(DbError::Query(format!("table {} already exists", table)));
        }
        self.guard.tables.insert(
            table.to_string(),
            Table {
                columns: columns.iter().cloned().collect(),
                rows: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn add_column(&mut self, table: &str, column: &str) -> DbResult<()> {
        let tbl = self.table_mut(table)?;
        if !tbl.columns.insert(column.to_string()) {
            return Err(DbError::Query(format!(
                "column {} already exists in {}",
                column, table
            )));
        }
        Ok(())
    }

    async fn table_exists(&mut self, table: &str) -> DbResult<bool> {
        Ok(self.guard.tables.contains_key(table))
    }

    async fn commit(mut self: Box<Self>) -> DbResult<()> {
        self.finished = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> DbResult<()> {
        *self.guard = self.snapshot.clone();
        self.finished = true;
        Ok(())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.finished {
            *self.guard = self.snapshot.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::row;

    fn sample_row(name: &str) -> Row {
        row(&[
            ("id", Value::Int(1)),
            ("name", Value::Str(name.into())),
            ("amount", Value::Str("100".into())),
        ])
    }

    #[tokio::test]
    async fn insert_select_update_delete() {
        let ds = MemoryDatastore::new();
        let mut tx = ds.begin().await.unwrap();
        tx.create_table("t", &["name".into(), "amount".into()])
            .await
            .unwrap();
        tx.insert("t", &sample_row("alice")).await.unwrap();

        let rows = tx
            .select(&SelectQuery::new("t").filter("name", Value::Str("alice".into())))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["amount"], Value::Str("100".into()));
        assert_eq!(rows[0]["id"], Value::Int(1));

        let touched = tx
            .update(
                "t",
                &[("id".to_string(), Value::Int(1))],
                &row(&[("amount", Value::Str("50".into()))]),
            )
            .await
            .unwrap();
        assert_eq!(touched, 1);

        let removed = tx
            .delete("t", &[("id".to_string(), Value::Int(1))])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(tx.count("t").await.unwrap(), 0);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn rollback_restores_snapshot() {
        let ds = MemoryDatastore::new();
        let mut tx = ds.begin().await.unwrap();
        tx.create_table("t", &["name".into()]).await.unwrap();
        tx.insert("t", &sample_row("kept")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = ds.begin().await.unwrap();
        tx.update(
            "t",
            &[("id".to_string(), Value::Int(1))],
            &row(&[("name", Value::Str("mutated".into()))]),
        )
        .await
        .unwrap();
        tx.rollback().await.unwrap();

        let mut tx = ds.begin().await.unwrap();
        let rows = tx.select(&SelectQuery::new("t")).await.unwrap();
        assert_eq!(rows[0]["name"], Value::Str("kept".into()));
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let ds = MemoryDatastore::new();
        let mut tx = ds.begin().await.unwrap();
        tx.create_table("t", &["name".into()]).await.unwrap();
        tx.commit().await.unwrap();

        {
            let mut tx = ds.begin().await.unwrap();
            tx.insert("t", &sample_row("ghost")).await.unwrap();
            // dropped without commit
        }

        let mut tx = ds.begin().await.unwrap();
        assert_eq!(tx.count("t").await.unwrap(), 0);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn next_id_is_monotonic() {
        let ds = MemoryDatastore::new();
        let mut tx = ds.begin().await.unwrap();
        tx.create_table("t", &[]).await.unwrap();
        assert_eq!(tx.next_id("t").await.unwrap(), 1);
        tx.insert("t", &row(&[("id", Value::Int(7))])).await.unwrap();
        assert_eq!(tx.next_id("t").await.unwrap(), 8);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn where_matches_across_value_types() {
        let ds = MemoryDatastore::new();
        let mut tx = ds.begin().await.unwrap();
        tx.create_table("t", &["amount".into()]).await.unwrap();
        tx.insert(
            "t",
            &row(&[("id", Value::Int(1)), ("amount", Value::Str("5".into()))]),
        )
        .await
        .unwrap();
        let rows = tx
            .select(&SelectQuery::new("t").filter("amount", Value::Int(5)))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        tx.commit().await.unwrap();
    }
}
