//! Contract administration
//!
//! Contracts are only ever mutated through the `NewContract`,
//! `EditContract` and `Import` flows; activation flips come from
//! `ActivateContract`/`DeactivateContract`. Everything else is rejected
//! before any state moves.

use genesis_core::error::{EngineError, EngineResult};
use genesis_core::{tables, Value};
use genesis_script::{compile_source, parse_contract_ref, ContractDef};
use tracing::info;

use super::{arg_int, arg_str, opt_int, opt_str};
use crate::access::require_caller;
use crate::context::SmartContract;
use crate::dml;
use crate::rollback::sys_rollback;

/// `GetContractByName(name)` → contract id, 0 when unknown.
pub fn get_contract_by_name(sc: &SmartContract, args: &[Value]) -> EngineResult<Value> {
    let name = arg_str(args, 0, "GetContractByName")?;
    Ok(Value::Int(
        sc.registry
            .get(sc.tx.ecosystem_id, &name)
            .map(|def| def.id)
            .unwrap_or(0),
    ))
}

/// `GetContractById(id)` → contract name, empty when unknown.
pub fn get_contract_by_id(sc: &SmartContract, args: &[Value]) -> EngineResult<Value> {
    let id = arg_int(args, 0, "GetContractById")?;
    Ok(Value::Str(
        sc.registry
            .get_by_id(id)
            .map(|def| def.name.clone())
            .unwrap_or_default(),
    ))
}

/// `Activate(id, state)` / `Deactivate(id, state)`: flips the VM-side
/// activation flag and journals the inverse hint.
pub fn activate(sc: &mut SmartContract, args: Vec<Value>, active: bool) -> EngineResult<Value> {
    let func = if active { "ActivateContract" } else { "DeactivateContract" };
    require_caller(sc, func, &["ActivateContract", "DeactivateContract"])?;
    let id = arg_int(&args, 0, func)?;
    let state = opt_int(&args, 1);

    if !sc.registry.set_active(id, active) {
        return Err(EngineError::ContractNotFound(format!("id {}", id)));
    }
    sys_rollback(
        sc,
        &format!(
            r#"{{"Type": "{}", "Id": "{}", "State": "{}"}}"#,
            func, id, state
        ),
    )?;
    info!(id, active, "contract activation changed");
    Ok(Value::Int(0))
}

/// `RollbackContract(name)`: removes the contract from the VM registry.
/// Only the `NewContract`/`Import` unwind paths may do this.
pub fn rollback_contract(sc: &mut SmartContract, args: &[Value]) -> EngineResult<Value> {
    require_caller(sc, "RollbackContract", &["NewContract", "Import"])?;
    let name = arg_str(args, 0, "RollbackContract")?;
    sc.registry.remove(sc.tx.ecosystem_id, &name);
    info!(name = %name, "contract rolled back");
    Ok(Value::Int(0))
}

/// `CreateContract(name, source, conditions, walletID, tokenEcosystem)`
/// → new contract id. The source must define exactly the named contract.
pub async fn create_contract(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    require_caller(sc, "CreateContract", &["NewContract", "Import"])?;
    let name = arg_str(&args, 0, "CreateContract")?;
    let source = arg_str(&args, 1, "CreateContract")?;
    let conditions = opt_str(&args, 2);
    let wallet = opt_int(&args, 3);
    let token_ecosystem = match opt_int(&args, 4) {
        0 => genesis_core::FIRST_ECOSYSTEM_ID,
        other => other,
    };

    let (_, bare) = parse_contract_ref(&name, sc.tx.ecosystem_id);
    let compiled = compile_source(&source, &super::host_symbols())?;
    let contract = compiled
        .contracts
        .into_iter()
        .find(|c| c.name == bare)
        .ok_or_else(|| {
            EngineError::InvalidObject(format!("source does not define contract {}", bare))
        })?;
    if sc.registry.get(sc.tx.ecosystem_id, &bare).is_some() {
        return Err(EngineError::InvalidObject(format!(
            "contract {} already exists",
            bare
        )));
    }

    let table = tables::contracts(sc.tx.ecosystem_id);
    let journal = sc.journaling();
    let (qcost, id) = dml::selective_update(
        sc,
        &[
            "name".to_string(),
            "value".to_string(),
            "wallet_id".to_string(),
            "token_id".to_string(),
            "active".to_string(),
            "conditions".to_string(),
        ],
        &[
            Value::Str(bare.clone()),
            Value::Str(source),
            Value::Int(wallet),
            Value::Int(token_ecosystem),
            Value::Str("1".into()),
            Value::Str(conditions),
        ],
        &table,
        &[],
        &[],
        journal,
        false,
    )
    .await?;
    sc.charge_fuel(qcost)?;

    sc.registry.put_new(ContractDef {
        id,
        name: bare.clone(),
        ecosystem: sc.tx.ecosystem_id,
        owner: wallet,
        token_ecosystem,
        active: true,
        compiled: contract,
    })?;

    info!(contract = %bare, id, "contract created");
    Ok(Value::Int(id))
}

/// `UpdateContract(id, source, conditions)`: replaces the stored source
/// and the installed code. The contract's id and name never change.
pub async fn update_contract(sc: &mut SmartContract, args: Vec<Value>) -> EngineResult<Value> {
    require_caller(sc, "UpdateContract", &["EditContract", "Import"])?;
    let id = arg_int(&args, 0, "UpdateContract")?;
    let source = arg_str(&args, 1, "UpdateContract")?;
    let conditions = opt_str(&args, 2);

    let existing = sc
        .registry
        .get_by_id(id)
        .ok_or_else(|| EngineError::ContractNotFound(format!("id {}", id)))?;

    let compiled = compile_source(&source, &super::host_symbols())?;
    let contract = compiled
        .contracts
        .into_iter()
        .find(|c| c.name == existing.name)
        .ok_or_else(|| {
            EngineError::InvalidObject(format!(
                "source does not define contract {}",
                existing.name
            ))
        })?;

    let table = tables::contracts(existing.ecosystem);
    let mut columns = vec!["value".to_string()];
    let mut values = vec![Value::Str(source)];
    if !conditions.is_empty() {
        columns.push("conditions".to_string());
        values.push(Value::Str(conditions));
    }
    let journal = sc.journaling();
    let (qcost, _) = dml::selective_update(
        sc,
        &columns,
        &values,
        &table,
        &["id".to_string()],
        &[Value::Int(id)],
        journal,
        true,
    )
    .await?;
    sc.charge_fuel(qcost)?;

    sc.registry.put(ContractDef {
        id,
        name: existing.name.clone(),
        ecosystem: existing.ecosystem,
        owner: existing.owner,
        token_ecosystem: existing.token_ecosystem,
        active: existing.active,
        compiled: contract,
    });

    info!(contract = %existing.name, id, "contract updated");
    Ok(Value::Int(id))
}
