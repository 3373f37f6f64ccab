//! Meta extend functions: parameters, JSON, condition evaluation and
//! language resources.

use genesis_core::error::{EngineError, EngineResult};
use genesis_core::{tables, Value};
use genesis_db::SelectQuery;
use genesis_script::eval_conditions;
use std::collections::HashMap;
use tracing::info;

use super::{arg_str, opt_int, opt_str};
use crate::access::{self, require_caller};
use crate::context::SmartContract;
use crate::dml;

pub fn sys_param_string(sc: &SmartContract, args: &[Value]) -> EngineResult<Value> {
    let name = arg_str(args, 0, "SysParamString")?;
    Ok(Value::Str(sc.syspar.sys_string(&name)))
}

pub fn sys_param_int(sc: &SmartContract, args: &[Value]) -> EngineResult<Value> {
    let name = arg_str(args, 0, "SysParamInt")?;
    Ok(Value::Int(sc.syspar.sys_int64(&name)))
}

/// `SysFuel(state)` → fuel rate for the ecosystem as a string.
pub fn sys_fuel(sc: &SmartContract, args: &[Value]) -> EngineResult<Value> {
    let state = args
        .first()
        .and_then(|v| v.to_int().ok())
        .unwrap_or(sc.tx.token_ecosystem);
    Ok(Value::Str(sc.syspar.fuel_rate(state).to_string()))
}

/// `EcosysParam(name)` → value from the caller's `N_parameters`.
pub async fn ecosys_param(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    let name = arg_str(&args, 0, "EcosysParam")?;
    let table = tables::parameters(sc.tx.ecosystem_id);
    let rows = sc
        .db
        .select(
            &SelectQuery::new(table)
                .columns(&["value"])
                .filter("name", Value::Str(name))
                .limit(1),
        )
        .await?;
    Ok(Value::Str(
        rows.first()
            .and_then(|row| row.get("value"))
            .map(|v| v.to_display())
            .unwrap_or_default(),
    ))
}

pub fn json_decode(args: &[Value]) -> EngineResult<Value> {
    let input = arg_str(args, 0, "JSONDecode")?;
    Value::json_decode(&input)
}

pub fn json_encode(args: &[Value]) -> EngineResult<Value> {
    let input = super::arg(args, 0, "JSONEncode")?;
    Ok(Value::Str(input.json_encode()?))
}

/// `JSONToMap(input)`: like JSONDecode but the top level must be an
/// object.
pub fn json_to_map(args: &[Value]) -> EngineResult<Value> {
    let input = arg_str(args, 0, "JSONToMap")?;
    match Value::json_decode(&input)? {
        map @ Value::Map(_) => Ok(map),
        other => Err(EngineError::JsonUnmarshall(format!(
            "expected an object, got {}",
            other.type_name()
        ))),
    }
}

/// `EvalCondition(table, name, condfield)`: reads the row's condition
/// column and evaluates it for the current caller.
pub async fn eval_condition(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    let table = access::table_name(sc, &arg_str(&args, 0, "EvalCondition")?);
    let name = arg_str(&args, 1, "EvalCondition")?;
    let condfield = arg_str(&args, 2, "EvalCondition")?;

    let rows = sc
        .db
        .select(
            &SelectQuery::new(table)
                .filter("name", Value::Str(name.clone()))
                .limit(1),
        )
        .await?;
    let conditions = rows
        .first()
        .and_then(|row| row.get(condfield.as_str()))
        .map(|v| v.to_display())
        .unwrap_or_default();
    if conditions.is_empty() {
        return Err(EngineError::NotFound(format!("Record {}", name)));
    }
    eval(sc, vec![Value::Str(conditions)]).await
}

/// `ValidateCondition(condition)`: the expression must compile.
pub fn validate_condition(args: &[Value]) -> EngineResult<Value> {
    let condition = arg_str(args, 0, "ValidateCondition")?;
    genesis_script::compile_expr(&condition, &super::host_symbols())?;
    Ok(Value::Int(0))
}

/// `Eval(condition)`: evaluates the expression; a falsy result is an
/// access denial.
pub async fn eval(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    let condition = arg_str(&args, 0, "Eval")?;
    if access::eval_bool(sc, &condition).await? {
        Ok(Value::Bool(true))
    } else {
        Err(EngineError::AccessDenied)
    }
}

/// `LangRes(appID, name, lang)` → the translation, or the resource name
/// when no entry matches.
pub async fn lang_res(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    let app_id = opt_int(&args, 0);
    let name = arg_str(&args, 1, "LangRes")?;
    let lang = arg_str(&args, 2, "LangRes")?;

    let table = tables::languages(sc.tx.ecosystem_id);
    let mut query = SelectQuery::new(table)
        .columns(&["res"])
        .filter("name", Value::Str(name.clone()))
        .limit(1);
    if app_id != 0 {
        query = query.filter("app_id", Value::Int(app_id));
    }
    let rows = sc.db.select(&query).await?;
    let res = rows
        .first()
        .and_then(|row| row.get("res"))
        .map(|v| v.to_display())
        .unwrap_or_default();
    if res.is_empty() {
        return Ok(Value::Str(name));
    }
    let translations: HashMap<String, String> =
        serde_json::from_str(&res).map_err(|e| EngineError::JsonUnmarshall(e.to_string()))?;
    Ok(Value::Str(
        translations
            .get(&lang)
            .or_else(|| translations.get("en"))
            .cloned()
            .unwrap_or(name),
    ))
}

/// `CreateLanguage(name, trans, appID)`. Only callable from `@1NewLang`,
/// `@1NewLangJoint` or `@1Import`.
pub async fn create_language(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    require_caller(sc, "CreateLanguage", &["NewLang", "NewLangJoint", "Import"])?;
    let name = arg_str(&args, 0, "CreateLanguage")?;
    let trans = arg_str(&args, 1, "CreateLanguage")?;
    let app_id = opt_int(&args, 2);

    serde_json::from_str::<HashMap<String, String>>(&trans)
        .map_err(|e| EngineError::JsonUnmarshall(e.to_string()))?;

    let table = tables::languages(sc.tx.ecosystem_id);
    let journal = sc.journaling();
    let (qcost, id) = dml::selective_update(
        sc,
        &["name".to_string(), "res".to_string(), "app_id".to_string()],
        &[
            Value::Str(name.clone()),
            Value::Str(trans),
            Value::Int(app_id),
        ],
        &table,
        &[],
        &[],
        journal,
        false,
    )
    .await?;
    sc.charge_fuel(qcost)?;
    info!(name = %name, "language created");
    Ok(Value::Int(id))
}

/// `EditLanguage(id, name, trans, appID)`. Only callable from
/// `@1EditLang`, `@1EditLangJoint` or `@1Import`.
pub async fn edit_language(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    require_caller(sc, "EditLanguage", &["EditLang", "EditLangJoint", "Import"])?;
    let id = super::arg_int(&args, 0, "EditLanguage")?;
    let name = arg_str(&args, 1, "EditLanguage")?;
    let trans = arg_str(&args, 2, "EditLanguage")?;
    let app_id = opt_int(&args, 3);

    serde_json::from_str::<HashMap<String, String>>(&trans)
        .map_err(|e| EngineError::JsonUnmarshall(e.to_string()))?;

    let table = tables::languages(sc.tx.ecosystem_id);
    let journal = sc.journaling();
    let (qcost, _) = dml::selective_update(
        sc,
        &["name".to_string(), "res".to_string(), "app_id".to_string()],
        &[Value::Str(name), Value::Str(trans), Value::Int(app_id)],
        &table,
        &["id".to_string()],
        &[Value::Int(id)],
        journal,
        true,
    )
    .await?;
    sc.charge_fuel(qcost)?;
    Ok(Value::Int(0))
}

/// `ContractAccess(name, ...)`: whether the transaction's entry contract
/// is one of the named contracts.
pub fn contract_access(sc: &SmartContract, args: &[Value]) -> EngineResult<Value> {
    for arg in args {
        let name = arg.to_display();
        let want = if name.starts_with('@') {
            name
        } else {
            format!("@{}{}", sc.tx.ecosystem_id, name)
        };
        if sc.tx_contract_name == want {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

/// `ContractConditions(name, ...)`: runs each named contract's
/// `conditions` block; any failure or falsy return denies.
pub async fn contract_conditions(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    let registry = sc.registry.clone();
    for arg in &args {
        let name = arg.to_display();
        let contract = registry
            .get(sc.tx.ecosystem_id, &name)
            .ok_or_else(|| EngineError::ContractNotFound(name.clone()))?;
        let verdict = eval_conditions(&registry, &contract, sc, &HashMap::new()).await?;
        if !matches!(verdict, Value::Null) && !verdict.as_bool() {
            return Err(EngineError::AccessDenied);
        }
    }
    Ok(Value::Bool(true))
}
