//! System parameters
//!
//! An in-process cache over `1_system_parameters`, refreshed whenever a
//! transaction updates a parameter. Write-time value domains live in
//! [`validate_value`]; out-of-domain writes fail with `InvalidValue` and
//! leave the parameter untouched.

use std::collections::HashMap;
use std::sync::RwLock;

use genesis_core::error::{EngineError, EngineResult};
use genesis_core::{syspar_names, tables, Value};
use genesis_db::{SelectQuery, StoreTx};
use tracing::debug;

/// Cached system parameters. Shared process-wide behind an `Arc`.
#[derive(Default)]
pub struct SysParams {
    values: RwLock<HashMap<String, String>>,
}

impl SysParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reloads the cache from storage.
    pub async fn reload(&self, tx: &mut dyn StoreTx) -> EngineResult<()> {
        let rows = tx
            .select(&SelectQuery::new(tables::SYSTEM_PARAMETERS).columns(&["name", "value"]))
            .await?;
        let mut values = HashMap::new();
        for row in rows {
            let name = row.get("name").map(|v| v.to_display()).unwrap_or_default();
            let value = row.get("value").map(|v| v.to_display()).unwrap_or_default();
            values.insert(name, value);
        }
        debug!(count = values.len(), "system parameters loaded");
        *self.values.write().expect("syspar lock poisoned") = values;
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.values
            .read()
            .expect("syspar lock poisoned")
            .contains_key(name)
    }

    pub fn sys_string(&self, name: &str) -> String {
        self.values
            .read()
            .expect("syspar lock poisoned")
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn sys_int64(&self, name: &str) -> i64 {
        self.sys_string(name).trim().parse::<i64>().unwrap_or(0)
    }

    /// Fuel rate for an ecosystem from the `fuel_rate` pair list; 0 when
    /// the ecosystem has no entry.
    pub fn fuel_rate(&self, ecosystem: i64) -> i64 {
        self.pair_value(syspar_names::FUEL_RATE, ecosystem)
    }

    /// Commission wallet for an ecosystem from the `commission_wallet`
    /// pair list.
    pub fn commission_wallet(&self, ecosystem: i64) -> i64 {
        self.pair_value(syspar_names::COMMISSION_WALLET, ecosystem)
    }

    fn pair_value(&self, name: &str, ecosystem: i64) -> i64 {
        let raw = self.sys_string(name);
        let parsed: Vec<Vec<String>> = match serde_json::from_str(&raw) {
            Ok(list) => list,
            Err(_) => return 0,
        };
        for pair in parsed {
            if pair.len() == 2 && pair[0].parse::<i64>() == Ok(ecosystem) {
                return pair[1].parse::<i64>().unwrap_or(0);
            }
        }
        0
    }
}

/// Validates a new value for a constrained parameter. `Ok(())` means the
/// write may proceed.
pub fn validate_value(name: &str, value: &str) -> EngineResult<()> {
    let ival = value.trim().parse::<i64>().unwrap_or(0);
    let int_ok = |ok: bool| {
        // the value must also be a canonical integer rendering
        if ok && ival.to_string() == value {
            Ok(())
        } else {
            Err(EngineError::InvalidValue)
        }
    };

    match name {
        syspar_names::GAP_BETWEEN_BLOCKS => int_ok(ival > 0 && ival < 86400),
        "rb_blocks_1" | "number_of_nodes" => int_ok(ival > 0 && ival < 1000),
        "ecosystem_price" | "contract_price" | "column_price" | "table_price" | "menu_price"
        | "page_price" | syspar_names::COMMISSION_SIZE => int_ok(ival >= 0),
        "max_block_size" | "max_tx_size" | "max_tx_count" | "max_columns" | "max_indexes"
        | "max_block_user_tx" | "max_fuel_tx" | "max_fuel_block" | "max_forsign_size" => {
            int_ok(ival > 0)
        }
        syspar_names::FUEL_RATE | syspar_names::COMMISSION_WALLET => {
            let list: Vec<Vec<String>> = serde_json::from_str(value)
                .map_err(|e| EngineError::JsonUnmarshall(e.to_string()))?;
            for item in &list {
                if item.len() != 2 {
                    return Err(EngineError::InvalidValue);
                }
                let eco = item[0].parse::<i64>().unwrap_or(0);
                let rate = item[1].parse::<i64>().unwrap_or(0);
                if eco <= 0 {
                    return Err(EngineError::InvalidValue);
                }
                if name == syspar_names::FUEL_RATE && rate <= 0 {
                    return Err(EngineError::InvalidValue);
                }
                if name == syspar_names::COMMISSION_WALLET && rate == 0 {
                    return Err(EngineError::InvalidValue);
                }
            }
            Ok(())
        }
        syspar_names::FULL_NODES => {
            let list: Vec<serde_json::Value> = serde_json::from_str(value)
                .map_err(|_| EngineError::InvalidValue)?;
            if list.is_empty() {
                return Err(EngineError::InvalidValue);
            }
            Ok(())
        }
        _ if name.starts_with("extend_cost_") => int_ok(ival >= 0),
        _ => Ok(()),
    }
}

/// The `extend_cost_<name>` parameter key for a host function:
/// CamelCase becomes snake_case, acronyms fold (`DBSelect` →
/// `db_select`, `PubToID` → `pub_to_id`).
pub fn extend_cost_key(func: &str) -> String {
    let mut out = String::from("extend_cost_");
    let chars: Vec<char> = func.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev_lower = i > 0 && chars[i - 1].is_ascii_lowercase();
            let next_lower = i + 1 < chars.len() && chars[i + 1].is_ascii_lowercase();
            if i > 0 && (prev_lower || (next_lower && chars[i - 1].is_ascii_uppercase())) {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(*c);
        }
    }
    out
}

/// Lookup used by host-call cost accounting: the registered extend cost,
/// or −1 when the function prices itself.
pub fn cost_of(params: &SysParams, func: &str) -> i64 {
    let key = extend_cost_key(func);
    if params.has(&key) {
        params.sys_int64(&key)
    } else {
        -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_gap_between_blocks() {
        assert!(validate_value("gap_between_blocks", "2").is_ok());
        assert_eq!(
            validate_value("gap_between_blocks", "0"),
            Err(EngineError::InvalidValue)
        );
        assert_eq!(
            validate_value("gap_between_blocks", "86400"),
            Err(EngineError::InvalidValue)
        );
        assert_eq!(
            validate_value("gap_between_blocks", "07"),
            Err(EngineError::InvalidValue)
        );
    }

    #[test]
    fn domain_pair_lists() {
        assert!(validate_value("fuel_rate", r#"[["1","100"]]"#).is_ok());
        assert_eq!(
            validate_value("fuel_rate", r#"[["0","100"]]"#),
            Err(EngineError::InvalidValue)
        );
        assert_eq!(
            validate_value("fuel_rate", r#"[["1","0"]]"#),
            Err(EngineError::InvalidValue)
        );
        assert_eq!(
            validate_value("commission_wallet", r#"[["1","0"]]"#),
            Err(EngineError::InvalidValue)
        );
        assert!(validate_value("commission_wallet", r#"[["1","-5"]]"#).is_ok());
        assert!(matches!(
            validate_value("fuel_rate", "not json"),
            Err(EngineError::JsonUnmarshall(_))
        ));
    }

    #[test]
    fn extend_costs_nonnegative() {
        assert!(validate_value("extend_cost_sha256", "0").is_ok());
        assert_eq!(
            validate_value("extend_cost_sha256", "-1"),
            Err(EngineError::InvalidValue)
        );
    }

    #[test]
    fn unconstrained_parameters_accept_anything() {
        assert!(validate_value("default_ecosystem_page", "whatever").is_ok());
    }

    #[test]
    fn cost_key_folds_camel_case() {
        assert_eq!(extend_cost_key("Sha256"), "extend_cost_sha256");
        assert_eq!(extend_cost_key("DBSelect"), "extend_cost_db_select");
        assert_eq!(extend_cost_key("PubToID"), "extend_cost_pub_to_id");
        assert_eq!(extend_cost_key("HasPrefix"), "extend_cost_has_prefix");
        assert_eq!(
            extend_cost_key("CreateEcosystem"),
            "extend_cost_create_ecosystem"
        );
    }

    #[test]
    fn pair_lookup() {
        let params = SysParams::new();
        params
            .values
            .write()
            .unwrap()
            .insert("fuel_rate".into(), r#"[["1","100"],["2","50"]]"#.into());
        assert_eq!(params.fuel_rate(1), 100);
        assert_eq!(params.fuel_rate(2), 50);
        assert_eq!(params.fuel_rate(3), 0);
    }
}
