//! Access control
//!
//! Table naming, table-level and column-level permission checks, and the
//! caller-contract whitelists admin host functions gate on. Permission
//! expressions are contract-language conditions evaluated against the
//! current caller; denial never touches state or the journal.

use genesis_core::error::{EngineError, EngineResult};
use genesis_core::{tables, Value};
use genesis_db::SelectQuery;
use genesis_script::{compile_expr, eval_code};
use tracing::warn;

use crate::context::SmartContract;
use crate::extend;

/// Table operations a permission can gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOp {
    Insert,
    Update,
    Read,
    NewColumn,
}

impl TableOp {
    pub fn key(&self) -> &'static str {
        match self {
            TableOp::Insert => "insert",
            TableOp::Update => "update",
            TableOp::Read => "read",
            TableOp::NewColumn => "new_column",
        }
    }
}

/// Resolves a contract-visible table name: bare names take the caller's
/// ecosystem prefix, `@N_name` pins ecosystem N.
pub fn table_name(sc: &SmartContract, raw: &str) -> String {
    if let Some(rest) = raw.strip_prefix('@') {
        return rest.to_string();
    }
    format!("{}_{}", sc.tx.ecosystem_id, raw)
}

/// The `N_tables` definition table holding permissions for `table`.
fn definition_table(table: &str) -> String {
    let ecosystem = table
        .split('_')
        .next()
        .and_then(|prefix| prefix.parse::<i64>().ok())
        .unwrap_or(genesis_core::FIRST_ECOSYSTEM_ID);
    tables::definitions(ecosystem)
}

/// Evaluates a conditions expression for the current caller.
pub async fn eval_bool(sc: &mut SmartContract, expr_src: &str) -> EngineResult<bool> {
    let trimmed = expr_src.trim();
    if trimmed.is_empty() {
        return Ok(true);
    }
    let block = compile_expr(trimmed, &extend::host_symbols())?;
    let registry = sc.registry.clone();
    let ecosystem = sc.tx.ecosystem_id;
    let value = eval_code(&registry, &block, sc, ecosystem).await?;
    Ok(value.as_bool())
}

/// Table-level permission check. Report tables are read-only to contract
/// code regardless of their definitions.
pub async fn access_table(sc: &mut SmartContract, table: &str, op: TableOp) -> EngineResult<()> {
    if sc.full_access {
        return Ok(());
    }
    if table.contains("_reports_") && op != TableOp::Read {
        warn!(table, "write access to report table denied");
        return Err(EngineError::AccessDenied);
    }

    let def = sc
        .db
        .select(
            &SelectQuery::new(definition_table(table))
                .columns(&["permissions"])
                .filter("name", Value::Str(table.to_string())),
        )
        .await?;
    let row = match def.first() {
        Some(row) => row,
        None => {
            warn!(table, "no table definition");
            return Err(EngineError::AccessDenied);
        }
    };

    let raw = row
        .get("permissions")
        .map(|v| v.to_display())
        .unwrap_or_default();
    let perms: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| EngineError::JsonUnmarshall(e.to_string()))?;
    let expr = perms
        .get(op.key())
        .and_then(|v| v.as_str())
        .unwrap_or("false");

    if eval_bool(sc, expr).await? {
        Ok(())
    } else {
        warn!(table, op = op.key(), "table access denied");
        Err(EngineError::AccessDenied)
    }
}

/// Column-level permission mask.
pub async fn access_columns(
    sc: &mut SmartContract,
    table: &str,
    columns: &[String],
    for_write: bool,
) -> EngineResult<()> {
    if sc.full_access || !for_write {
        return Ok(());
    }

    let def = sc
        .db
        .select(
            &SelectQuery::new(definition_table(table))
                .columns(&["columns"])
                .filter("name", Value::Str(table.to_string())),
        )
        .await?;
    let raw = match def.first() {
        Some(row) => row.get("columns").map(|v| v.to_display()).unwrap_or_default(),
        None => return Ok(()),
    };
    if raw.is_empty() {
        return Ok(());
    }
    let masks: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| EngineError::JsonUnmarshall(e.to_string()))?;

    for column in columns {
        let column = column.trim();
        if column == "id" {
            continue;
        }
        if let Some(expr) = masks.get(column).and_then(|v| v.as_str()) {
            if !eval_bool(sc, expr).await? {
                warn!(table, column, "column access denied");
                return Err(EngineError::AccessDenied);
            }
        }
    }
    Ok(())
}

/// True when the transaction's entry contract is one of the named system
/// contracts (`names` are bare, ecosystem-1 names).
pub fn access_contracts(sc: &SmartContract, names: &[&str]) -> bool {
    names
        .iter()
        .any(|name| sc.tx_contract_name == format!("@1{}", name))
}

/// Admin-gate guard: `IncorrectCallingContract` unless the entry
/// contract is whitelisted.
pub fn require_caller(sc: &SmartContract, func: &str, names: &[&str]) -> EngineResult<()> {
    if access_contracts(sc, names) {
        return Ok(());
    }
    let allowed = names
        .iter()
        .map(|n| format!("@1{}", n))
        .collect::<Vec<_>>()
        .join(", ");
    warn!(func, caller = %sc.tx_contract_name, "incorrect calling contract");
    Err(EngineError::IncorrectCallingContract(format!(
        "{} can be only called from {}",
        func, allowed
    )))
}
