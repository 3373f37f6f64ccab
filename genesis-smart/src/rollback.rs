//! Rollback journal
//!
//! Ordered, per-transaction record of prior state for every mutation.
//! Records are collected in memory during execution and persisted under
//! `(block_id, tx_hash, sequence)` at commit; replay walks sequence
//! descending and issues inverse operations. An empty prior-value blob
//! marks a row created inside the transaction.

use genesis_core::error::{EngineError, EngineResult};
use genesis_core::{tables, Value};
use genesis_db::{row, SelectQuery, StoreTx};
use genesis_script::VmRegistry;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::context::SmartContract;

/// One journal entry. `data` holds the JSON blob of prior column values;
/// empty means the row did not exist before this transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackRecord {
    pub table: String,
    pub table_id: String,
    pub data: String,
}

/// VM-side inverse hints (`SysRollback`).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SysHint {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Id", default)]
    id: String,
    #[serde(rename = "State", default)]
    state: String,
}

/// Records an ecosystem-level inverse hint for operations that alter
/// VM-side state. No-op under a non-journaling policy.
pub fn sys_rollback(sc: &mut SmartContract, hint: &str) -> EngineResult<()> {
    if !sc.policy.write_journal {
        return Ok(());
    }
    // validate eagerly so replay never meets a malformed hint
    serde_json::from_str::<SysHint>(hint)
        .map_err(|e| EngineError::JsonUnmarshall(e.to_string()))?;
    sc.append_journal(RollbackRecord {
        table: String::new(),
        table_id: String::new(),
        data: hint.to_string(),
    });
    Ok(())
}

/// Persists the collected journal under the transaction key. Called by
/// the envelope inside the same storage transaction that commits the
/// effects.
pub async fn persist(
    db: &mut dyn StoreTx,
    records: &[RollbackRecord],
    block_id: i64,
    tx_hash: &str,
) -> EngineResult<()> {
    let mut id = db.next_id(tables::ROLLBACK_TX).await?;
    for (seq, record) in records.iter().enumerate() {
        db.insert(
            tables::ROLLBACK_TX,
            &row(&[
                ("id", Value::Int(id)),
                ("block_id", Value::Int(block_id)),
                ("tx_hash", Value::Str(tx_hash.to_string())),
                ("sequence", Value::Int(seq as i64 + 1)),
                ("table_name", Value::Str(record.table.clone())),
                ("table_id", Value::Str(record.table_id.clone())),
                ("data", Value::Str(record.data.clone())),
            ]),
        )
        .await?;
        id += 1;
    }
    debug!(tx_hash, count = records.len(), "journal persisted");
    Ok(())
}

/// Replays a committed transaction's journal in reverse: prior-value
/// updates, deletes for rows created in-tx, inserts for rows deleted
/// in-tx. Consumes the journal rows.
pub async fn replay(
    db: &mut dyn StoreTx,
    registry: &VmRegistry,
    tx_hash: &str,
) -> EngineResult<()> {
    let records = db
        .select(
            &SelectQuery::new(tables::ROLLBACK_TX)
                .filter("tx_hash", Value::Str(tx_hash.to_string()))
                .order_by("sequence", true),
        )
        .await?;

    for record in &records {
        let table = record
            .get("table_name")
            .map(|v| v.to_display())
            .unwrap_or_default();
        let data = record.get("data").map(|v| v.to_display()).unwrap_or_default();

        if table.is_empty() {
            apply_sys_hint(registry, &data);
            continue;
        }

        let table_id = record
            .get("table_id")
            .map(|v| v.to_display())
            .unwrap_or_default();
        let wheres = [("id".to_string(), Value::Str(table_id.clone()))];

        if data.is_empty() {
            // the row was created inside the transaction
            db.delete(&table, &wheres).await?;
            continue;
        }

        let prior: serde_json::Value =
            serde_json::from_str(&data).map_err(|e| EngineError::JsonUnmarshall(e.to_string()))?;
        let object = prior
            .as_object()
            .ok_or_else(|| EngineError::InvalidObject("rollback blob is not an object".into()))?;
        let mut values = genesis_db::Row::new();
        for (col, val) in object {
            values.insert(
                col.clone(),
                Value::Str(val.as_str().map(|s| s.to_string()).unwrap_or_else(|| val.to_string())),
            );
        }

        let touched = db.update(&table, &wheres, &values).await?;
        if touched == 0 {
            // the row was deleted inside the transaction; restore it
            let id = table_id.parse::<i64>().map_err(|_| {
                EngineError::Conversion(format!("bad rollback id {}", table_id))
            })?;
            values.insert("id".to_string(), Value::Int(id));
            db.insert(&table, &values).await?;
        }
    }

    db.delete(
        tables::ROLLBACK_TX,
        &[("tx_hash".to_string(), Value::Str(tx_hash.to_string()))],
    )
    .await?;
    info!(tx_hash, count = records.len(), "journal replayed");
    Ok(())
}

fn apply_sys_hint(registry: &VmRegistry, data: &str) {
    let hint: SysHint = match serde_json::from_str(data) {
        Ok(hint) => hint,
        Err(err) => {
            warn!(error = %err, "skipping malformed sys rollback hint");
            return;
        }
    };
    match hint.kind.as_str() {
        // undo of an activation flip is the opposite flip
        "ActivateContract" => {
            if let Ok(id) = hint.id.parse::<i64>() {
                registry.set_active(id, false);
            }
        }
        "DeactivateContract" => {
            if let Ok(id) = hint.id.parse::<i64>() {
                registry.set_active(id, true);
            }
        }
        // these install no VM-side objects; the row records already
        // carry their storage-side inverses
        "NewEcosystem" | "NewTable" | "NewColumn" => {}
        other => {
            warn!(kind = other, state = %hint.state, "unknown sys rollback hint");
        }
    }
}
