//! Extend ABI
//!
//! The closed library of host functions contracts may call. Every
//! function consumes and produces [`Value`]; admin-flavored members gate
//! on the transaction's entry contract and return
//! `IncorrectCallingContract` from anywhere else. Extending the set
//! means adding the name here and to [`host_symbols`] - nothing is
//! discovered dynamically.

use genesis_core::error::{EngineError, EngineResult};
use genesis_core::Value;
use genesis_script::HostSymbols;

use crate::context::SmartContract;

pub mod contracts;
pub mod cryptofns;
pub mod dbfns;
pub mod ecosys;
pub mod meta;
pub mod metrics;
pub mod types;

/// Every extend function, in dispatch order.
pub const FUNCTIONS: &[&str] = &[
    // type & coercion
    "Int", "Float", "Money", "Str", "Size", "Substr", "Replace", "HasPrefix", "Contains", "Join",
    "Split", "Sprintf", "Len", "Append",
    // crypto
    "Sha256", "PubToID", "HexToBytes", "AddressToId", "IdToAddress",
    // db access
    "DBInsert", "DBUpdate", "DBUpdateExt", "DBSelect", "DBUpdateSysParam", "UpdateSysParam",
    // ecosystem admin
    "CreateEcosystem", "EditEcosysName", "NewState", "CreateTable", "PermTable", "CreateColumn",
    "PermColumn", "ColumnCondition", "TableConditions",
    // contract admin
    "GetContractByName", "GetContractById", "Activate", "Deactivate", "RollbackContract",
    "CreateContract", "UpdateContract",
    // meta
    "SysParamString", "SysParamInt", "SysFuel", "EcosysParam", "JSONDecode", "JSONEncode",
    "JSONToMap", "EvalCondition", "ValidateCondition", "Eval", "LangRes", "CreateLanguage",
    "EditLanguage", "ContractAccess", "ContractConditions",
    // metrics
    "DBSelectMetrics", "DBCollectMetrics",
];

/// Context values contracts read as identifiers.
pub const CONTEXT_VARS: &[&str] = &[
    "key_id",
    "ecosystem_id",
    "time",
    "block",
    "txhash",
    "this_contract",
];

/// Symbol set handed to the compiler.
pub fn host_symbols() -> HostSymbols {
    HostSymbols {
        funcs: FUNCTIONS.iter().map(|s| s.to_string()).collect(),
        vars: CONTEXT_VARS.iter().map(|s| s.to_string()).collect(),
    }
}

/// Dispatches one host call.
pub async fn dispatch(
    sc: &mut SmartContract,
    name: &str,
    args: Vec<Value>,
) -> EngineResult<Value> {
    match name {
        "Int" => types::int(&args),
        "Float" => types::float(&args),
        "Money" => types::money(&args),
        "Str" => types::str_(&args),
        "Size" => types::size(&args),
        "Substr" => types::substr(&args),
        "Replace" => types::replace(&args),
        "HasPrefix" => types::has_prefix(&args),
        "Contains" => types::contains(&args),
        "Join" => types::join(&args),
        "Split" => types::split(&args),
        "Sprintf" => types::sprintf(&args),
        "Len" => types::len(&args),
        "Append" => types::append(args),

        "Sha256" => cryptofns::sha256(&args),
        "PubToID" => cryptofns::pub_to_id(&args),
        "HexToBytes" => cryptofns::hex_to_bytes(&args),
        "AddressToId" => cryptofns::address_to_id(&args),
        "IdToAddress" => cryptofns::id_to_address(&args),

        "DBInsert" => dbfns::db_insert(sc, args).await,
        "DBUpdate" => dbfns::db_update(sc, args).await,
        "DBUpdateExt" => dbfns::db_update_ext(sc, args).await,
        "DBSelect" => dbfns::db_select(sc, args).await,
        "DBUpdateSysParam" | "UpdateSysParam" => dbfns::update_sys_param(sc, args).await,

        "CreateEcosystem" | "NewState" => ecosys::create_ecosystem(sc, args).await,
        "EditEcosysName" => ecosys::edit_ecosys_name(sc, args).await,
        "CreateTable" => ecosys::create_table(sc, args).await,
        "PermTable" => ecosys::perm_table(sc, args).await,
        "CreateColumn" => ecosys::create_column(sc, args).await,
        "PermColumn" => ecosys::perm_column(sc, args).await,
        "ColumnCondition" => ecosys::column_condition(sc, args).await,
        "TableConditions" => ecosys::table_conditions(sc, args).await,

        "GetContractByName" => contracts::get_contract_by_name(sc, &args),
        "GetContractById" => contracts::get_contract_by_id(sc, &args),
        "Activate" => contracts::activate(sc, args, true),
        "Deactivate" => contracts::activate(sc, args, false),
        "RollbackContract" => contracts::rollback_contract(sc, &args),
        "CreateContract" => contracts::create_contract(sc, args).await,
        "UpdateContract" => contracts::update_contract(sc, args).await,

        "SysParamString" => meta::sys_param_string(sc, &args),
        "SysParamInt" => meta::sys_param_int(sc, &args),
        "SysFuel" => meta::sys_fuel(sc, &args),
        "EcosysParam" => meta::ecosys_param(sc, args).await,
        "JSONDecode" => meta::json_decode(&args),
        "JSONEncode" => meta::json_encode(&args),
        "JSONToMap" => meta::json_to_map(&args),
        "EvalCondition" => meta::eval_condition(sc, args).await,
        "ValidateCondition" => meta::validate_condition(&args),
        "Eval" => meta::eval(sc, args).await,
        "LangRes" => meta::lang_res(sc, args).await,
        "CreateLanguage" => meta::create_language(sc, args).await,
        "EditLanguage" => meta::edit_language(sc, args).await,
        "ContractAccess" => meta::contract_access(sc, &args),
        "ContractConditions" => meta::contract_conditions(sc, args).await,

        "DBSelectMetrics" => metrics::db_select_metrics(sc, args).await,
        "DBCollectMetrics" => metrics::db_collect_metrics(sc).await,

        other => Err(EngineError::Eval(format!(
            "unknown extend function {}",
            other
        ))),
    }
}

// --- argument helpers shared by the submodules ---

pub(crate) fn arg<'a>(args: &'a [Value], at: usize, func: &str) -> EngineResult<&'a Value> {
    args.get(at).ok_or_else(|| {
        EngineError::InvalidObject(format!("{} is missing argument {}", func, at + 1))
    })
}

pub(crate) fn arg_str(args: &[Value], at: usize, func: &str) -> EngineResult<String> {
    Ok(arg(args, at, func)?.to_display())
}

pub(crate) fn arg_int(args: &[Value], at: usize, func: &str) -> EngineResult<i64> {
    arg(args, at, func)?.to_int()
}

pub(crate) fn opt_str(args: &[Value], at: usize) -> String {
    args.get(at).map(|v| v.to_display()).unwrap_or_default()
}

pub(crate) fn opt_int(args: &[Value], at: usize) -> i64 {
    args.get(at).and_then(|v| v.to_int().ok()).unwrap_or(0)
}
