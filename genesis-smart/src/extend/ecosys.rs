//! Ecosystem and table administration
//!
//! Every function here asserts its caller against a whitelist of system
//! contracts before touching anything; a wrong caller gets
//! `IncorrectCallingContract` and state stays put.

use genesis_core::error::{EngineError, EngineResult};
use genesis_core::{tables, Value};
use genesis_db::{seed, SelectQuery};
use tracing::info;

use super::{arg_int, arg_str, dbfns, opt_str};
use crate::access::{self, require_caller, TableOp};
use crate::context::SmartContract;
use crate::rollback::sys_rollback;

/// `CreateEcosystem(wallet, name)` → new ecosystem id. Only callable
/// from `@1NewEcosystem`.
pub async fn create_ecosystem(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    require_caller(sc, "CreateEcosystem", &["NewEcosystem"])?;
    let wallet = arg_int(&args, 0, "CreateEcosystem")?;
    let name = arg_str(&args, 1, "CreateEcosystem")?;

    let founder_rows = sc
        .db
        .select(
            &SelectQuery::new(tables::parameters(1))
                .filter("name", Value::Str("founder_account".into()))
                .limit(1),
        )
        .await?;
    let founder = founder_rows
        .first()
        .and_then(|row| row.get("value"))
        .and_then(|v| v.to_int().ok())
        .filter(|v| *v != 0)
        .ok_or_else(|| EngineError::NotFound("Founder account".into()))?;

    let id = sc.db.next_id(tables::ECOSYSTEMS).await?;
    seed::exec_ecosystem_schema(sc.db.as_mut(), id, wallet, &name, founder).await?;

    // bootstrap rows go in without ACLs or journaling: the new tables
    // have no usable conditions yet and a failed creation rolls the
    // whole schema back anyway
    sc.rollback_enabled = false;
    sc.full_access = true;

    let default_page = sc.syspar.sys_string("default_ecosystem_page");
    let default_menu = sc.syspar.sys_string("default_ecosystem_menu");
    dbfns::db_insert(
        sc,
        vec![
            Value::Str(format!("@{}", tables::pages(id))),
            Value::Str("id,name,value,menu,conditions".into()),
            Value::Int(1),
            Value::Str("default_page".into()),
            Value::Str(default_page),
            Value::Str("default_menu".into()),
            Value::Str("ContractConditions(\"MainCondition\")".into()),
        ],
    )
    .await?;
    dbfns::db_insert(
        sc,
        vec![
            Value::Str(format!("@{}", tables::menu(id))),
            Value::Str("id,name,value,title,conditions".into()),
            Value::Int(1),
            Value::Str("default_menu".into()),
            Value::Str(default_menu),
            Value::Str("default".into()),
            Value::Str("ContractConditions(\"MainCondition\")".into()),
        ],
    )
    .await?;

    let pub_rows = sc
        .db
        .select(
            &SelectQuery::new(tables::keys(1))
                .columns(&["pub"])
                .filter("id", Value::Int(wallet))
                .limit(1),
        )
        .await?;
    let pubkey = pub_rows
        .first()
        .and_then(|row| row.get("pub"))
        .map(|v| v.to_display())
        .unwrap_or_default();
    dbfns::db_insert(
        sc,
        vec![
            Value::Str(format!("@{}", tables::keys(id))),
            Value::Str("id,pub".into()),
            Value::Int(wallet),
            Value::Str(pubkey),
        ],
    )
    .await?;

    sc.full_access = false;
    // the ecosystem row itself journals: replay needs to know which
    // ecosystem to unwind
    sc.rollback_enabled = true;
    dbfns::db_insert(
        sc,
        vec![
            Value::Str(format!("@{}", tables::ECOSYSTEMS)),
            Value::Str("id,name".into()),
            Value::Int(id),
            Value::Str(name.clone()),
        ],
    )
    .await?;

    sys_rollback(sc, r#"{"Type": "NewEcosystem"}"#)?;
    info!(ecosystem = id, wallet, name = %name, "ecosystem created");
    Ok(Value::Int(id))
}

/// `EditEcosysName(sysID, newName)`. Only callable from
/// `@1EditEcosystemName`.
pub async fn edit_ecosys_name(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    require_caller(sc, "EditEcosystemName", &["EditEcosystemName"])?;
    let sys_id = arg_int(&args, 0, "EditEcosysName")?;
    let new_name = arg_str(&args, 1, "EditEcosysName")?;
    dbfns::db_update(
        sc,
        vec![
            Value::Str(format!("@{}", tables::ECOSYSTEMS)),
            Value::Int(sys_id),
            Value::Str("name".into()),
            Value::Str(new_name),
        ],
    )
    .await?;
    Ok(Value::Int(0))
}

/// `CreateTable(name, columnsJSON, permissionsJSON)`.
pub async fn create_table(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    require_caller(sc, "CreateTable", &["NewTable", "Import"])?;
    let name = arg_str(&args, 0, "CreateTable")?;
    let columns_json = arg_str(&args, 1, "CreateTable")?;
    let permissions_json = arg_str(&args, 2, "CreateTable")?;

    let table = access::table_name(sc, &name);
    validate_table_spec(sc, &table, &columns_json, &permissions_json, false).await?;

    let columns: Vec<String> = serde_json::from_str(&columns_json)
        .map_err(|e| EngineError::JsonUnmarshall(e.to_string()))?;
    let max_columns = sc.syspar.sys_int64("max_columns");
    if max_columns > 0 && columns.len() as i64 > max_columns {
        return Err(EngineError::InvalidObject(format!(
            "too many columns, maximum is {}",
            max_columns
        )));
    }

    sc.db.create_table(&table, &columns).await?;

    let mask: serde_json::Map<String, serde_json::Value> = columns
        .iter()
        .map(|c| (c.clone(), serde_json::Value::String("true".into())))
        .collect();
    let def_table = tables::definitions(sc.tx.ecosystem_id);
    let journal = sc.journaling();
    let (qcost, _) = crate::dml::selective_update(
        sc,
        &[
            "name".to_string(),
            "permissions".to_string(),
            "columns".to_string(),
            "conditions".to_string(),
        ],
        &[
            Value::Str(table.clone()),
            Value::Str(permissions_json),
            Value::Str(serde_json::Value::Object(mask).to_string()),
            Value::Str("ContractConditions(\"MainCondition\")".into()),
        ],
        &def_table,
        &[],
        &[],
        journal,
        false,
    )
    .await?;
    sc.charge_fuel(qcost)?;

    sys_rollback(sc, &format!(r#"{{"Type": "NewTable", "Id": "{}"}}"#, table))?;
    info!(table = %table, "table created");
    Ok(Value::Int(0))
}

/// `PermTable(name, permissionsJSON)`.
pub async fn perm_table(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    require_caller(sc, "PermTable", &["EditTable"])?;
    let name = arg_str(&args, 0, "PermTable")?;
    let permissions_json = arg_str(&args, 1, "PermTable")?;
    let table = access::table_name(sc, &name);

    validate_permissions(&permissions_json)?;

    let def_table = tables::definitions(sc.tx.ecosystem_id);
    let journal = sc.journaling();
    let (qcost, _) = crate::dml::selective_update(
        sc,
        &["permissions".to_string()],
        &[Value::Str(permissions_json)],
        &def_table,
        &["name".to_string()],
        &[Value::Str(table)],
        journal,
        true,
    )
    .await?;
    sc.charge_fuel(qcost)?;
    Ok(Value::Int(0))
}

/// `CreateColumn(table, column, permissions)`.
pub async fn create_column(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    require_caller(sc, "CreateColumn", &["NewColumn"])?;
    let table = access::table_name(sc, &arg_str(&args, 0, "CreateColumn")?);
    let column = arg_str(&args, 1, "CreateColumn")?.to_lowercase();
    let permissions = opt_str(&args, 2);

    access::access_table(sc, &table, TableOp::NewColumn).await?;
    sc.db.add_column(&table, &column).await?;
    set_column_permission(sc, &table, &column, &permissions).await?;

    sys_rollback(
        sc,
        &format!(r#"{{"Type": "NewColumn", "Id": "{}.{}"}}"#, table, column),
    )?;
    info!(table = %table, column = %column, "column created");
    Ok(Value::Int(0))
}

/// `PermColumn(table, column, permissions)`.
pub async fn perm_column(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    require_caller(sc, "PermColumn", &["EditColumn"])?;
    let table = access::table_name(sc, &arg_str(&args, 0, "PermColumn")?);
    let column = arg_str(&args, 1, "PermColumn")?.to_lowercase();
    let permissions = opt_str(&args, 2);

    if !permissions.is_empty() {
        genesis_script::compile_expr(&permissions, &super::host_symbols())?;
    }
    set_column_permission(sc, &table, &column, &permissions).await?;
    Ok(Value::Int(0))
}

/// `ColumnCondition(table, column, permissions)`: validation used by the
/// column-admin contracts before they commit to anything.
pub async fn column_condition(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    let table = access::table_name(sc, &arg_str(&args, 0, "ColumnCondition")?);
    let permissions = opt_str(&args, 2);

    let def_table = tables::definitions(sc.tx.ecosystem_id);
    let rows = sc
        .db
        .select(
            &SelectQuery::new(def_table)
                .filter("name", Value::Str(table.clone()))
                .limit(1),
        )
        .await?;
    if rows.is_empty() {
        return Err(EngineError::NotFound(format!("Table {}", table)));
    }
    if !permissions.is_empty() {
        genesis_script::compile_expr(&permissions, &super::host_symbols())?;
    }
    Ok(Value::Int(0))
}

/// `TableConditions(name, columnsJSON, permissionsJSON)`: validation for
/// the table-admin contracts.
pub async fn table_conditions(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    let name = arg_str(&args, 0, "TableConditions")?;
    let columns_json = arg_str(&args, 1, "TableConditions")?;
    let permissions_json = arg_str(&args, 2, "TableConditions")?;
    let table = access::table_name(sc, &name);
    validate_table_spec(sc, &table, &columns_json, &permissions_json, false).await?;
    Ok(Value::Int(0))
}

async fn validate_table_spec(
    sc: &mut SmartContract,
    table: &str,
    columns_json: &str,
    permissions_json: &str,
    allow_existing: bool,
) -> EngineResult<()> {
    if !allow_existing && sc.db.table_exists(table).await? {
        return Err(EngineError::InvalidObject(format!(
            "table {} already exists",
            table
        )));
    }
    let columns: Vec<String> = serde_json::from_str(columns_json)
        .map_err(|e| EngineError::JsonUnmarshall(e.to_string()))?;
    if columns.is_empty() {
        return Err(EngineError::EmptyObject("no columns".into()));
    }
    validate_permissions(permissions_json)
}

fn validate_permissions(permissions_json: &str) -> EngineResult<()> {
    let perms: serde_json::Value = serde_json::from_str(permissions_json)
        .map_err(|e| EngineError::JsonUnmarshall(e.to_string()))?;
    let object = perms
        .as_object()
        .ok_or_else(|| EngineError::InvalidObject("permissions must be an object".into()))?;
    for key in ["insert", "update", "new_column"] {
        let expr = object
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| EngineError::InvalidObject(format!("missing {} permission", key)))?;
        genesis_script::compile_expr(expr, &super::host_symbols())?;
    }
    Ok(())
}

async fn set_column_permission(
    sc: &mut SmartContract,
    table: &str,
    column: &str,
    permissions: &str,
) -> EngineResult<()> {
    let def_table = tables::definitions(sc.tx.ecosystem_id);
    let rows = sc
        .db
        .select(
            &SelectQuery::new(def_table.as_str())
                .filter("name", Value::Str(table.to_string()))
                .limit(1),
        )
        .await?;
    let row = rows
        .first()
        .ok_or_else(|| EngineError::NotFound(format!("Table {}", table)))?;

    let raw = row.get("columns").map(|v| v.to_display()).unwrap_or_default();
    let mut mask: serde_json::Map<String, serde_json::Value> = if raw.is_empty() {
        serde_json::Map::new()
    } else {
        serde_json::from_str(&raw).map_err(|e| EngineError::JsonUnmarshall(e.to_string()))?
    };
    mask.insert(
        column.to_string(),
        serde_json::Value::String(if permissions.is_empty() {
            "true".to_string()
        } else {
            permissions.to_string()
        }),
    );

    let journal = sc.journaling();
    let (qcost, _) = crate::dml::selective_update(
        sc,
        &["columns".to_string()],
        &[Value::Str(serde_json::Value::Object(mask).to_string())],
        &def_table,
        &["name".to_string()],
        &[Value::Str(table.to_string())],
        journal,
        true,
    )
    .await?;
    sc.charge_fuel(qcost)?;
    Ok(())
}
