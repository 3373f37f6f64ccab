//! Reversible write path
//!
//! Every mutation contract code performs flows through
//! [`selective_update`]: read the current row, journal the prior column
//! values, then update or insert. Exactly one journal record is appended
//! per write while journaling is on; denied or failed operations append
//! nothing.

use std::collections::BTreeMap;

use genesis_core::error::{EngineError, EngineResult};
use genesis_core::Value;
use genesis_db::{Row, SelectQuery};
use tracing::debug;

use crate::context::SmartContract;
use crate::rollback::RollbackRecord;

/// Fuel price of one row read.
pub const COST_READ: i64 = 50;
/// Fuel price of one row write.
pub const COST_WRITE: i64 = 100;

/// Upsert-or-update with rollback logging. Returns `(qcost, row_id)`.
///
/// When the where clause matches a row, the named columns are updated
/// and their prior values journaled; otherwise a row is inserted (the
/// journal record's empty blob marks it as created in-tx), unless
/// `must_exist` demands an update target.
pub async fn selective_update(
    sc: &mut SmartContract,
    columns: &[String],
    values: &[Value],
    table: &str,
    where_cols: &[String],
    where_vals: &[Value],
    log_rollback: bool,
    must_exist: bool,
) -> EngineResult<(i64, i64)> {
    if columns.len() != values.len() {
        return Err(EngineError::InvalidObject(format!(
            "{} columns for {} values",
            columns.len(),
            values.len()
        )));
    }

    let wheres: Vec<(String, Value)> = where_cols
        .iter()
        .zip(where_vals)
        .map(|(c, v)| (c.trim().to_string(), v.clone()))
        .collect();

    let mut qcost = COST_READ;
    // an empty where clause is the pure-insert path; it must not match
    // arbitrary existing rows
    let existing = if wheres.is_empty() {
        Vec::new()
    } else {
        sc.db
            .select(&SelectQuery::new(table).wheres_from(&wheres).limit(1))
            .await?
    };

    match existing.first() {
        Some(found) => {
            let id = found
                .get("id")
                .map(|v| v.to_int())
                .transpose()?
                .ok_or_else(|| EngineError::Db(format!("row in {} has no id", table)))?;

            if log_rollback {
                let mut prior = BTreeMap::new();
                for col in columns {
                    let col = col.trim();
                    if col == "id" {
                        continue;
                    }
                    let value = found.get(col).map(|v| v.to_display()).unwrap_or_default();
                    prior.insert(col.to_string(), serde_json::Value::String(value));
                }
                let blob = serde_json::to_string(&prior)
                    .map_err(|e| EngineError::JsonMarshall(e.to_string()))?;
                sc.append_journal(RollbackRecord {
                    table: table.to_string(),
                    table_id: id.to_string(),
                    data: blob,
                });
            }

            let update_row = build_row(columns, values, None);
            qcost += COST_WRITE;
            sc.db
                .update(table, &[("id".to_string(), Value::Int(id))], &update_row)
                .await?;
            debug!(table, id, "row updated");
            Ok((qcost, id))
        }
        None => {
            if must_exist {
                return Err(EngineError::NotFound(format!("Record in {}", table)));
            }

            // an id-targeted miss keeps the requested id, otherwise the
            // table's NextID primitive assigns one
            let id = match (where_cols.len() == 1 && where_cols[0].trim() == "id")
                .then(|| where_vals[0].to_int())
            {
                Some(Ok(id)) => id,
                _ => match columns.iter().position(|c| c.trim() == "id") {
                    Some(at) => values[at].to_int()?,
                    None => sc.db.next_id(table).await?,
                },
            };

            let insert_row = build_row(columns, values, Some(id));
            qcost += COST_WRITE;
            sc.db.insert(table, &insert_row).await?;
            if log_rollback {
                sc.append_journal(RollbackRecord {
                    table: table.to_string(),
                    table_id: id.to_string(),
                    data: String::new(),
                });
            }
            debug!(table, id, "row inserted");
            Ok((qcost, id))
        }
    }
}

/// Values are normalized to their canonical display strings so both
/// storage backends hold identical bytes and journal diffs compare
/// exactly.
fn build_row(columns: &[String], values: &[Value], id: Option<i64>) -> Row {
    let mut row = Row::new();
    for (col, value) in columns.iter().zip(values) {
        let col = col.trim();
        if col == "id" {
            continue;
        }
        row.insert(col.to_string(), Value::Str(value.to_display()));
    }
    if let Some(id) = id {
        row.insert("id".to_string(), Value::Int(id));
    }
    row
}
