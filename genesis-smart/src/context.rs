//! Per-invocation contract context
//!
//! One [`SmartContract`] exists per transaction: it owns the storage
//! transaction, the fuel counter, the rollback journal, and the payload,
//! and implements the VM's `ExtendHost` seam so host calls dispatch into
//! the extend library.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use genesis_core::error::{EngineError, EngineResult};
use genesis_core::Value;
use genesis_db::StoreTx;
use genesis_script::{ExtendHost, VmRegistry};

use crate::extend;
use crate::rollback::RollbackRecord;
use crate::syspar::{self, SysParams};

/// Execution policy: consensus mode journals every write; VDE executions
/// are best-effort and non-reversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecPolicy {
    pub write_journal: bool,
    pub require_consensus: bool,
}

impl ExecPolicy {
    pub fn consensus() -> Self {
        Self {
            write_journal: true,
            require_consensus: true,
        }
    }

    pub fn vde() -> Self {
        Self {
            write_journal: false,
            require_consensus: false,
        }
    }
}

/// Transaction header fields shared with the envelope.
#[derive(Debug, Clone, Default)]
pub struct TxInfo {
    pub tx_type: i64,
    pub time: i64,
    pub key_id: i64,
    pub ecosystem_id: i64,
    pub token_ecosystem: i64,
    pub request_id: String,
    pub signed_by: i64,
    pub hash: String,
}

/// Default charge for host calls that price themselves.
const EXTEND_DEFAULT_COST: i64 = 10;

pub(crate) struct Fuel {
    pub limit: i64,
    pub spent: i64,
}

impl Fuel {
    fn charge(&mut self, amount: i64) -> EngineResult<()> {
        self.spent += amount;
        if self.spent > self.limit {
            return Err(EngineError::OutOfFuel);
        }
        Ok(())
    }
}

/// The per-invocation call context.
pub struct SmartContract {
    pub tx: TxInfo,
    /// Entry contract of the transaction in `@N_Name` form; admin gates
    /// compare against it.
    pub tx_contract_name: String,
    /// Call payload.
    pub data: HashMap<String, Value>,
    /// Public keys usable to verify co-signatures.
    pub public_keys: Vec<Vec<u8>>,
    pub db: Box<dyn StoreTx>,
    pub registry: Arc<VmRegistry>,
    pub syspar: Arc<SysParams>,
    pub policy: ExecPolicy,
    /// Bypasses table/column ACLs during ecosystem bootstrap.
    pub full_access: bool,
    /// Set when a system parameter changed inside this transaction.
    pub sys_update: bool,
    /// Suppresses journal records during bootstrap windows.
    pub rollback_enabled: bool,
    pub block_id: i64,
    pub(crate) fuel: Fuel,
    pub(crate) journal: Vec<RollbackRecord>,
}

impl SmartContract {
    pub fn new(
        tx: TxInfo,
        tx_contract_name: String,
        data: HashMap<String, Value>,
        db: Box<dyn StoreTx>,
        registry: Arc<VmRegistry>,
        syspar: Arc<SysParams>,
        policy: ExecPolicy,
        fuel_limit: i64,
        block_id: i64,
    ) -> Self {
        Self {
            tx,
            tx_contract_name,
            data,
            public_keys: Vec::new(),
            db,
            registry,
            syspar,
            policy,
            full_access: false,
            sys_update: false,
            rollback_enabled: true,
            block_id,
            fuel: Fuel {
                limit: fuel_limit,
                spent: 0,
            },
            journal: Vec::new(),
        }
    }

    /// Whether writes must journal in the current window.
    pub fn journaling(&self) -> bool {
        self.policy.write_journal && self.rollback_enabled
    }

    /// Charges fuel outside the VM loop (DB work priced per row).
    pub fn charge_fuel(&mut self, amount: i64) -> EngineResult<()> {
        self.fuel.charge(amount)
    }

    pub fn fuel_limit(&self) -> i64 {
        self.fuel.limit
    }

    /// Records collected by this transaction, in append order.
    pub fn journal(&self) -> &[RollbackRecord] {
        &self.journal
    }

    pub(crate) fn append_journal(&mut self, record: RollbackRecord) {
        self.journal.push(record);
    }
}

#[async_trait]
impl ExtendHost for SmartContract {
    async fn call_host(&mut self, name: &str, args: Vec<Value>) -> EngineResult<Value> {
        if self.host_cost(name) < 0 {
            // function-priced: a floor charge, the function adds its own
            self.fuel.charge(EXTEND_DEFAULT_COST)?;
        }
        extend::dispatch(self, name, args).await
    }

    fn host_cost(&self, name: &str) -> i64 {
        syspar::cost_of(&self.syspar, name)
    }

    fn extern_value(&self, name: &str) -> Option<Value> {
        match name {
            "key_id" => Some(Value::Int(self.tx.key_id)),
            "ecosystem_id" => Some(Value::Int(self.tx.ecosystem_id)),
            "time" => Some(Value::Int(self.tx.time)),
            "block" => Some(Value::Int(self.block_id)),
            "txhash" => Some(Value::Str(self.tx.hash.clone())),
            "this_contract" => Some(Value::Str(self.tx_contract_name.clone())),
            _ => None,
        }
    }

    fn charge(&mut self, amount: i64) -> EngineResult<()> {
        self.fuel.charge(amount)
    }

    fn fuel_spent(&self) -> i64 {
        self.fuel.spent
    }
}
