//! DB extend functions
//!
//! All routed through the state-access layer: table/column permissions
//! first, then the reversible write path. Costs are function-priced
//! (qcost), charged against the transaction's fuel.

use genesis_core::error::{EngineError, EngineResult};
use genesis_core::{tables, Value};
use genesis_db::SelectQuery;
use tracing::{error, info};

use super::{arg_int, arg_str, opt_int, opt_str};
use crate::access::{self, TableOp};
use crate::context::SmartContract;
use crate::dml::{self, COST_READ};
use crate::syspar;

/// `DBInsert(table, "col1,col2", val1, val2, ...)` → new row id.
pub async fn db_insert(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    let table = access::table_name(sc, &arg_str(&args, 0, "DBInsert")?);
    let columns: Vec<String> = split_columns(&arg_str(&args, 1, "DBInsert")?);
    let values = args[2..].to_vec();

    access::access_table(sc, &table, TableOp::Insert).await?;
    access::access_columns(sc, &table, &columns, true).await?;

    let journal = sc.journaling();
    let (qcost, id) =
        dml::selective_update(sc, &columns, &values, &table, &[], &[], journal, false).await?;
    sc.charge_fuel(qcost)?;
    Ok(Value::Int(id))
}

/// `DBUpdate(table, id, "col1,col2", val1, val2, ...)`.
pub async fn db_update(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    let table = access::table_name(sc, &arg_str(&args, 0, "DBUpdate")?);
    let id = arg_int(&args, 1, "DBUpdate")?;
    let columns = split_columns(&arg_str(&args, 2, "DBUpdate")?);
    let values = args[3..].to_vec();

    update_where(
        sc,
        table,
        columns,
        values,
        vec!["id".to_string()],
        vec![Value::Int(id)],
    )
    .await
}

/// `DBUpdateExt(table, column, value, "col1,col2", val1, val2, ...)`.
pub async fn db_update_ext(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    let table = access::table_name(sc, &arg_str(&args, 0, "DBUpdateExt")?);
    let column = arg_str(&args, 1, "DBUpdateExt")?;
    let value = super::arg(&args, 2, "DBUpdateExt")?.clone();
    let columns = split_columns(&arg_str(&args, 3, "DBUpdateExt")?);
    let values = args[4..].to_vec();

    update_where(sc, table, columns, values, vec![column], vec![value]).await
}

async fn update_where(
    sc: &mut SmartContract,
    table: String,
    columns: Vec<String>,
    values: Vec<Value>,
    where_cols: Vec<String>,
    where_vals: Vec<Value>,
) -> EngineResult<Value> {
    access::access_table(sc, &table, TableOp::Update).await?;
    if table.contains("_reports_") {
        return Err(EngineError::AccessDenied);
    }
    access::access_columns(sc, &table, &columns, true).await?;

    let journal = sc.journaling();
    let (qcost, id) = dml::selective_update(
        sc, &columns, &values, &table, &where_cols, &where_vals, journal, true,
    )
    .await?;
    sc.charge_fuel(qcost)?;
    Ok(Value::Int(id))
}

/// `DBSelect(table, "col1,col2", id, order, offset, limit, whereCol,
/// whereVal)` → array of row maps. Zero/empty arguments fall back to
/// defaults; the row limit is capped.
pub async fn db_select(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    let table = access::table_name(sc, &arg_str(&args, 0, "DBSelect")?);
    let columns = split_columns(&opt_str(&args, 1));
    let id = opt_int(&args, 2);
    let order = opt_str(&args, 3);
    let offset = opt_int(&args, 4);
    let mut limit = opt_int(&args, 5);
    let where_col = opt_str(&args, 6);
    let where_val = opt_str(&args, 7);

    access::access_table(sc, &table, TableOp::Read).await?;

    if limit <= 0 {
        limit = genesis_core::DB_SELECT_LIMIT;
    }
    limit = limit.min(genesis_core::DB_SELECT_MAX);

    let mut query = SelectQuery::new(table.as_str()).limit(limit).offset(offset);
    if !columns.is_empty() {
        let refs: Vec<&str> = columns.iter().map(|s| s.as_str()).collect();
        query = query.columns(&refs);
    }
    if id != 0 {
        query = query.filter("id", Value::Int(id));
    } else if !where_col.is_empty() {
        query = query.filter(where_col, Value::Str(where_val));
    }
    if !order.is_empty() {
        let (col, desc) = match order.strip_suffix(" desc") {
            Some(col) => (col.trim().to_string(), true),
            None => (order.clone(), false),
        };
        query = query.order_by(col, desc);
    }

    let rows = sc.db.select(&query).await.map_err(|err| {
        error!(table = %table, error = %err, "DBSelect failed");
        EngineError::from(err)
    })?;
    sc.charge_fuel(COST_READ + rows.len() as i64)?;

    Ok(Value::Array(
        rows.into_iter()
            .map(|row| Value::Map(row.into_iter().collect()))
            .collect(),
    ))
}

/// `UpdateSysParam(name, value, conditions)`: authorization expression
/// first, then the value-domain check; either failure leaves the
/// parameter untouched.
pub async fn update_sys_param(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    let name = arg_str(&args, 0, "UpdateSysParam")?;
    let value = opt_str(&args, 1);
    let conditions = opt_str(&args, 2);

    let rows = sc
        .db
        .select(
            &SelectQuery::new(tables::SYSTEM_PARAMETERS)
                .filter("name", Value::Str(name.clone()))
                .limit(1),
        )
        .await?;
    let row = rows.first().ok_or_else(|| {
        error!(name = %name, kind = "NotFound", "system parameter get");
        EngineError::NotFound(format!("Parameter {}", name))
    })?;
    let id = row
        .get("id")
        .map(|v| v.to_int())
        .transpose()?
        .unwrap_or_default();

    let guard = row
        .get("conditions")
        .map(|v| v.to_display())
        .unwrap_or_default();
    if !guard.is_empty() && !access::eval_bool(sc, &guard).await? {
        error!(name = %name, kind = "AccessDenied", "system parameter update denied");
        return Err(EngineError::AccessDenied);
    }

    let mut columns = Vec::new();
    let mut values = Vec::new();
    if !value.is_empty() {
        syspar::validate_value(&name, &value).map_err(|err| {
            error!(name = %name, value = %value, kind = err.kind(), "invalid system parameter value");
            err
        })?;
        columns.push("value".to_string());
        values.push(Value::Str(value));
    }
    if !conditions.is_empty() {
        // the new authorization expression must at least compile
        genesis_script::compile_expr(&conditions, &super::host_symbols())?;
        columns.push("conditions".to_string());
        values.push(Value::Str(conditions));
    }
    if columns.is_empty() {
        return Err(EngineError::EmptyObject("empty value and condition".into()));
    }

    let journal = sc.journaling();
    let (qcost, _) = dml::selective_update(
        sc,
        &columns,
        &values,
        tables::SYSTEM_PARAMETERS,
        &["id".to_string()],
        &[Value::Int(id)],
        journal,
        false,
    )
    .await?;
    sc.charge_fuel(qcost)?;

    sc.syspar.reload(sc.db.as_mut()).await?;
    sc.sys_update = true;
    info!(name = %name, "system parameter updated");
    Ok(Value::Int(0))
}

fn split_columns(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}
