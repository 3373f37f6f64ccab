//! Transaction envelope
//!
//! Decodes and verifies transactions, builds the call context, drives
//! the VM, and commits or discards. The signable portion of an envelope
//! is the comma-joined `ForSign` string; co-signers are verified against
//! the contract's persisted sign-spec. Fuel budget comes from `MaxSum`
//! via the token ecosystem's fuel rate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use genesis_core::error::{trim_db_error, EngineError, EngineResult};
use genesis_core::{syspar_names, tables, Value};
use genesis_db::{row, Datastore, SelectQuery, StoreTx};
use genesis_script::{invoke, ContractDef, FuncDef, VmRegistry};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::context::{ExecPolicy, SmartContract, TxInfo};
use crate::extend;
use crate::rollback;
use crate::syspar::SysParams;

/// Signed transaction header.
#[derive(Debug, Clone, Default)]
pub struct TxHeader {
    pub tx_type: i64,
    pub time: i64,
    pub key_id: i64,
    pub ecosystem_id: i64,
}

/// A decoded transaction envelope.
#[derive(Debug, Clone, Default)]
pub struct TxEnvelope {
    pub header: TxHeader,
    pub request_id: String,
    pub token_ecosystem: i64,
    pub max_sum: String,
    pub pay_over: String,
    pub signed_by: i64,
    /// Hex public key of the signer; binds the key on first use.
    pub public_key: String,
    /// Hex signature over the ForSign string.
    pub signature: String,
    /// Contract call payload, including co-signature fields.
    pub params: HashMap<String, Value>,
}

impl TxEnvelope {
    /// The canonical signable string.
    pub fn for_sign(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{}",
            self.request_id,
            self.header.tx_type,
            self.header.time,
            self.header.key_id,
            self.header.ecosystem_id,
            self.token_ecosystem,
            self.max_sum,
            self.pay_over,
            self.signed_by,
        )
    }

    /// Transaction hash: SHA-256 over the signable string and the
    /// signature.
    pub fn hash(&self) -> String {
        genesis_crypto::hash_hex(format!("{}{}", self.for_sign(), self.signature).as_bytes())
    }
}

/// Outcome surfaced to `txstatus`.
#[derive(Debug, Clone, PartialEq)]
pub struct TxResult {
    pub hash: String,
    /// 0 when the transaction failed.
    pub block_id: i64,
    /// Error kind on failure, contract result otherwise.
    pub result: String,
    pub error: Option<String>,
}

/// One co-signer requirement from a sign-spec.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignRes {
    #[serde(rename = "name")]
    pub param: String,
    #[serde(rename = "text")]
    pub title: String,
}

/// The persisted sign-spec for contracts that demand co-signatures.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TxSignJSON {
    #[serde(rename = "forsign")]
    pub for_sign: String,
    #[serde(rename = "field")]
    pub field: String,
    #[serde(rename = "title")]
    pub title: String,
    #[serde(rename = "params")]
    pub params: Vec<SignRes>,
}

/// Parsed sign-specs keyed by `(ecosystem, contract)`. Entries drop when
/// a transaction writes the ecosystem's signatures table.
#[derive(Default)]
pub struct SignSpecCache {
    inner: RwLock<HashMap<(i64, String), Option<Arc<TxSignJSON>>>>,
}

impl SignSpecCache {
    async fn get_or_load(
        &self,
        db: &mut dyn StoreTx,
        ecosystem: i64,
        contract: &str,
    ) -> EngineResult<Option<Arc<TxSignJSON>>> {
        let key = (ecosystem, contract.to_string());
        if let Some(cached) = self.inner.read().expect("sign cache poisoned").get(&key) {
            return Ok(cached.clone());
        }

        let table = tables::signatures(ecosystem);
        let rows = db
            .select(
                &SelectQuery::new(table)
                    .columns(&["value"])
                    .filter("name", Value::Str(contract.to_string()))
                    .limit(1),
            )
            .await?;
        let raw = rows
            .first()
            .and_then(|row| row.get("value"))
            .map(|v| v.to_display())
            .unwrap_or_default();

        let spec = if raw.is_empty() {
            None
        } else {
            let parsed: TxSignJSON = serde_json::from_str(&raw)
                .map_err(|e| EngineError::JsonUnmarshall(e.to_string()))?;
            Some(Arc::new(parsed))
        };
        self.inner
            .write()
            .expect("sign cache poisoned")
            .insert(key, spec.clone());
        Ok(spec)
    }

    fn invalidate_ecosystem(&self, ecosystem: i64) {
        self.inner
            .write()
            .expect("sign cache poisoned")
            .retain(|(eco, _), _| *eco != ecosystem);
    }
}

/// The node-facing execution engine: owns the registry, the system
/// parameter cache, and the block counter; processes one envelope at a
/// time.
pub struct ContractEngine {
    datastore: Arc<dyn Datastore>,
    registry: Arc<VmRegistry>,
    syspar: Arc<SysParams>,
    policy: ExecPolicy,
    sign_cache: SignSpecCache,
    blocks: AtomicI64,
    wall_clock: Duration,
}

impl ContractEngine {
    /// Builds an engine over an initialized datastore: loads system
    /// parameters and installs every stored contract into the registry.
    pub async fn new(datastore: Arc<dyn Datastore>, policy: ExecPolicy) -> EngineResult<Self> {
        let engine = Self {
            datastore,
            registry: Arc::new(VmRegistry::new()),
            syspar: Arc::new(SysParams::new()),
            policy,
            sign_cache: SignSpecCache::default(),
            blocks: AtomicI64::new(0),
            wall_clock: Duration::from_millis(genesis_core::DEFAULT_TX_WALL_CLOCK_MS),
        };

        let mut tx = engine.datastore.begin().await?;
        engine.syspar.reload(tx.as_mut()).await?;
        engine.load_contracts(tx.as_mut()).await?;

        let status = tx
            .select(
                &SelectQuery::new(tables::TRANSACTIONS_STATUS)
                    .columns(&["block_id"])
                    .order_by("id", true)
                    .limit(1),
            )
            .await?;
        let last_block = status
            .first()
            .and_then(|row| row.get("block_id"))
            .and_then(|v| v.to_int().ok())
            .unwrap_or(0);
        engine.blocks.store(last_block, Ordering::SeqCst);
        tx.rollback().await?;

        Ok(engine)
    }

    pub fn with_wall_clock(mut self, wall_clock: Duration) -> Self {
        self.wall_clock = wall_clock;
        self
    }

    pub fn registry(&self) -> Arc<VmRegistry> {
        self.registry.clone()
    }

    pub fn syspar(&self) -> Arc<SysParams> {
        self.syspar.clone()
    }

    pub fn datastore(&self) -> Arc<dyn Datastore> {
        self.datastore.clone()
    }

    async fn load_contracts(&self, tx: &mut dyn StoreTx) -> EngineResult<()> {
        let ecosystems = tx
            .select(&SelectQuery::new(tables::ECOSYSTEMS).columns(&["id"]))
            .await?;
        let mut installed = 0usize;
        for eco_row in ecosystems {
            let eco = match eco_row.get("id").and_then(|v| v.to_int().ok()) {
                Some(eco) if eco > 0 => eco,
                _ => continue,
            };
            let rows = tx
                .select(&SelectQuery::new(tables::contracts(eco)))
                .await?;
            for row in rows {
                let id = row.get("id").and_then(|v| v.to_int().ok()).unwrap_or(0);
                let source = row.get("value").map(|v| v.to_display()).unwrap_or_default();
                let active = row
                    .get("active")
                    .map(|v| v.to_display() != "0")
                    .unwrap_or(true);
                let owner = row
                    .get("wallet_id")
                    .and_then(|v| v.to_int().ok())
                    .unwrap_or(0);
                let token = row
                    .get("token_id")
                    .and_then(|v| v.to_int().ok())
                    .unwrap_or(genesis_core::FIRST_ECOSYSTEM_ID);

                let compiled = match genesis_script::compile_source(&source, &extend::host_symbols())
                {
                    Ok(compiled) => compiled,
                    Err(err) => {
                        error!(ecosystem = eco, id, error = %err, "skipping stored contract");
                        continue;
                    }
                };
                for func in compiled.funcs {
                    self.registry.put_func(FuncDef {
                        ecosystem: eco,
                        compiled: func,
                    });
                }
                for contract in compiled.contracts {
                    self.registry.put(ContractDef {
                        id,
                        name: contract.name.clone(),
                        ecosystem: eco,
                        owner,
                        token_ecosystem: token,
                        active,
                        compiled: contract,
                    });
                    installed += 1;
                }
            }
        }
        info!(installed, "contracts loaded");
        Ok(())
    }

    /// Bootstrap/import path: compiles a source file, stores each
    /// contract in the ecosystem's contracts table and installs it.
    pub async fn install_source(
        &self,
        ecosystem: i64,
        owner: i64,
        source: &str,
    ) -> EngineResult<Vec<i64>> {
        let compiled = genesis_script::compile_source(source, &extend::host_symbols())?;
        let mut tx = self.datastore.begin().await?;
        let table = tables::contracts(ecosystem);
        let mut ids = Vec::new();

        for func in compiled.funcs {
            self.registry.put_func(FuncDef {
                ecosystem,
                compiled: func,
            });
        }
        for contract in compiled.contracts {
            let id = tx.next_id(&table).await?;
            tx.insert(
                &table,
                &row(&[
                    ("id", Value::Int(id)),
                    ("name", Value::Str(contract.name.clone())),
                    ("value", Value::Str(source.to_string())),
                    ("wallet_id", Value::Str(owner.to_string())),
                    (
                        "token_id",
                        Value::Str(genesis_core::FIRST_ECOSYSTEM_ID.to_string()),
                    ),
                    ("active", Value::Str("1".into())),
                    ("conditions", Value::Str("true".into())),
                ]),
            )
            .await?;
            self.registry.put(ContractDef {
                id,
                name: contract.name.clone(),
                ecosystem,
                owner,
                token_ecosystem: genesis_core::FIRST_ECOSYSTEM_ID,
                active: true,
                compiled: contract,
            });
            ids.push(id);
        }
        tx.commit().await?;
        Ok(ids)
    }

    /// Signature validation without execution.
    pub async fn validate_signatures(&self, env: &TxEnvelope) -> EngineResult<()> {
        let mut tx = self.datastore.begin().await?;
        let outcome = self.verify_with_tx(env, tx.as_mut()).await;
        tx.rollback().await?;
        outcome.map(|_| ())
    }

    async fn verify_with_tx(
        &self,
        env: &TxEnvelope,
        tx: &mut dyn StoreTx,
    ) -> EngineResult<(Arc<ContractDef>, Option<String>)> {
        let contract = self
            .registry
            .get_by_id(env.header.tx_type)
            .ok_or_else(|| EngineError::ContractNotFound(format!("type {}", env.header.tx_type)))?;
        if contract.ecosystem != env.header.ecosystem_id {
            return Err(EngineError::ContractNotFound(contract.full_name()));
        }

        // the signer's registered key, or a first-use binding
        let keys_table = tables::keys(env.header.ecosystem_id);
        let rows = tx
            .select(
                &SelectQuery::new(keys_table)
                    .columns(&["pub"])
                    .filter("id", Value::Int(env.header.key_id))
                    .limit(1),
            )
            .await?;
        let stored_pub = rows
            .first()
            .and_then(|row| row.get("pub"))
            .map(|v| v.to_display())
            .unwrap_or_default();

        let (pub_hex, bind) = if stored_pub.is_empty() {
            if genesis_crypto::address_from_hex(&env.public_key) != env.header.key_id {
                warn!(key_id = env.header.key_id, "public key does not match wallet");
                return Err(EngineError::IncorrectSignature(
                    "public key does not match wallet".into(),
                ));
            }
            (env.public_key.clone(), Some(env.public_key.clone()))
        } else {
            (stored_pub, None)
        };

        let pub_bytes =
            hex::decode(&pub_hex).map_err(|e| EngineError::Crypto(e.to_string()))?;
        let sig_bytes =
            hex::decode(&env.signature).map_err(|e| EngineError::Crypto(e.to_string()))?;
        let forsign = env.for_sign();
        if !genesis_crypto::verify(&pub_bytes, forsign.as_bytes(), &sig_bytes) {
            warn!(key_id = env.header.key_id, "bad envelope signature");
            return Err(EngineError::IncorrectSignature(forsign));
        }

        self.check_co_signatures(env, tx, &contract, &pub_bytes).await?;
        Ok((contract, bind))
    }

    /// Verifies additional signatures demanded by the contract's
    /// sign-spec.
    async fn check_co_signatures(
        &self,
        env: &TxEnvelope,
        tx: &mut dyn StoreTx,
        contract: &ContractDef,
        pub_bytes: &[u8],
    ) -> EngineResult<()> {
        let spec = match self
            .sign_cache
            .get_or_load(tx, env.header.ecosystem_id, &contract.name)
            .await?
        {
            Some(spec) => spec,
            None => return Ok(()),
        };

        let mut forsign = format!(
            "{},{}",
            env.header.time as u64, env.header.key_id as u64
        );
        for sign_par in &spec.params {
            let value = env
                .params
                .get(&sign_par.param)
                .map(|v| v.to_display())
                .unwrap_or_default();
            forsign.push_str(&format!(",{}", value));
        }

        let hexsign = env
            .params
            .get(&spec.field)
            .map(|v| v.to_display())
            .unwrap_or_default();
        let sig = hex::decode(&hexsign).map_err(|_| {
            EngineError::IncorrectSignature("wrong signature".into())
        })?;
        if sig.is_empty() || !genesis_crypto::verify(pub_bytes, forsign.as_bytes(), &sig) {
            warn!(contract = %contract.name, "bad co-signature");
            return Err(EngineError::IncorrectSignature(forsign));
        }
        Ok(())
    }

    /// Fuel budget for an envelope: `MaxSum` times the token ecosystem's
    /// fuel rate, capped by `max_fuel_tx`.
    fn fuel_budget(&self, env: &TxEnvelope) -> EngineResult<i64> {
        let max_sum = env
            .max_sum
            .trim()
            .parse::<i64>()
            .map_err(|_| EngineError::Conversion(format!("bad MaxSum {:?}", env.max_sum)))?;
        let rate = self.syspar.fuel_rate(env.token_ecosystem).max(1);
        let mut budget = max_sum.saturating_mul(rate);
        let cap = self.syspar.sys_int64("max_fuel_tx");
        if cap > 0 {
            budget = budget.min(cap);
        }
        Ok(budget)
    }

    /// Processes one envelope end to end. Contract failures are
    /// reported in the result (and in `txstatus`), not as `Err`; only
    /// infrastructure trouble errors out.
    pub async fn execute(&self, env: &TxEnvelope) -> EngineResult<TxResult> {
        let hash = env.hash();
        let outcome = self.try_execute(env, &hash).await;

        match outcome {
            Ok(result) => Ok(result),
            Err(err) => {
                error!(
                    tx_hash = %hash,
                    kind = err.kind(),
                    error = %err,
                    "transaction failed"
                );
                self.write_failure_status(env, &hash, &err).await?;
                Ok(TxResult {
                    hash,
                    block_id: 0,
                    result: err.kind().to_string(),
                    error: Some(trim_db_error(&err.to_string())),
                })
            }
        }
    }

    async fn try_execute(&self, env: &TxEnvelope, hash: &str) -> EngineResult<TxResult> {
        let mut tx = self.datastore.begin().await?;
        let (contract, bind) = self.verify_with_tx(env, tx.as_mut()).await?;

        if let Some(pub_hex) = bind {
            // first-use binding: the row may already exist with an empty pub
            let keys_table = tables::keys(env.header.ecosystem_id);
            let wheres = [("id".to_string(), Value::Int(env.header.key_id))];
            let touched = tx
                .update(&keys_table, &wheres, &row(&[("pub", Value::Str(pub_hex.clone()))]))
                .await?;
            if touched == 0 {
                tx.insert(
                    &keys_table,
                    &row(&[
                        ("id", Value::Int(env.header.key_id)),
                        ("pub", Value::Str(pub_hex)),
                        ("amount", Value::Str("0".into())),
                    ]),
                )
                .await?;
            }
        }

        let block_id = self.blocks.load(Ordering::SeqCst) + 1;
        let fuel = self.fuel_budget(env)?;
        let mut sc = SmartContract::new(
            TxInfo {
                tx_type: env.header.tx_type,
                time: env.header.time,
                key_id: env.header.key_id,
                ecosystem_id: env.header.ecosystem_id,
                token_ecosystem: env.token_ecosystem,
                request_id: env.request_id.clone(),
                signed_by: env.signed_by,
                hash: hash.to_string(),
            },
            contract.full_name(),
            env.params.clone(),
            tx,
            self.registry.clone(),
            self.syspar.clone(),
            self.policy,
            fuel,
            block_id,
        );

        let registry = self.registry.clone();
        let run = invoke(&registry, &contract, &mut sc, &env.params, false);
        let result = match tokio::time::timeout(self.wall_clock, run).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(tx_hash = %hash, "transaction exceeded the block wall clock");
                return Err(EngineError::Eval("transaction timeout".into()));
            }
        };

        self.settle_commission(&mut sc).await?;

        // take everything back out of the context and commit
        let fuel_spent = sc.fuel.spent;
        let journal = std::mem::take(&mut sc.journal);
        let mut tx = sc.db;
        if self.policy.write_journal {
            rollback::persist(tx.as_mut(), &journal, block_id, hash).await?;
        }
        let status_id = tx.next_id(tables::TRANSACTIONS_STATUS).await?;
        tx.insert(
            tables::TRANSACTIONS_STATUS,
            &status_row(status_id, env, hash, block_id, ""),
        )
        .await?;
        tx.commit().await?;

        for record in &journal {
            if record.table.ends_with("_signatures") {
                self.sign_cache.invalidate_ecosystem(env.header.ecosystem_id);
                break;
            }
        }
        self.blocks.store(block_id, Ordering::SeqCst);

        info!(
            tx_hash = %hash,
            block_id,
            contract = %contract.full_name(),
            fuel = fuel_spent,
            "transaction committed"
        );
        Ok(TxResult {
            hash: hash.to_string(),
            block_id,
            result: result.to_display(),
            error: None,
        })
    }

    /// Flat commission debit from the payer, credited to the token
    /// ecosystem's commission wallet. Not journaled: consensus-level
    /// payment, outside contract state.
    async fn settle_commission(&self, sc: &mut SmartContract) -> EngineResult<()> {
        if !self.policy.require_consensus {
            return Ok(());
        }
        let commission = self.syspar.sys_int64(syspar_names::COMMISSION_SIZE);
        if commission <= 0 {
            return Ok(());
        }
        let wallet = self.syspar.commission_wallet(sc.tx.token_ecosystem);
        let keys_table = tables::keys(sc.tx.token_ecosystem);
        let payer = sc.tx.key_id;

        let amount = Decimal::from(commission);
        adjust_balance(sc.db.as_mut(), &keys_table, payer, -amount).await?;
        if wallet != 0 && wallet != payer {
            adjust_balance(sc.db.as_mut(), &keys_table, wallet, amount).await?;
        }
        Ok(())
    }

    async fn write_failure_status(
        &self,
        env: &TxEnvelope,
        hash: &str,
        err: &EngineError,
    ) -> EngineResult<()> {
        let mut tx = self.datastore.begin().await?;
        let message = trim_db_error(&err.to_string());
        let id = tx.next_id(tables::TRANSACTIONS_STATUS).await?;
        tx.insert(
            tables::TRANSACTIONS_STATUS,
            &status_row(id, env, hash, 0, &format!("{}: {}", err.kind(), message)),
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }
}

fn status_row(
    id: i64,
    env: &TxEnvelope,
    hash: &str,
    block_id: i64,
    error: &str,
) -> genesis_db::Row {
    row(&[
        ("id", Value::Int(id)),
        ("hash", Value::Str(hash.to_string())),
        ("time", Value::Str(env.header.time.to_string())),
        ("type", Value::Str(env.header.tx_type.to_string())),
        ("ecosystem", Value::Str(env.header.ecosystem_id.to_string())),
        ("wallet_id", Value::Str(env.header.key_id.to_string())),
        (
            "block_id",
            Value::Str(if block_id > 0 {
                block_id.to_string()
            } else {
                String::new()
            }),
        ),
        ("error", Value::Str(error.to_string())),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_sign_joins_the_signable_fields() {
        let env = TxEnvelope {
            header: TxHeader {
                tx_type: 42,
                time: 1_700_000_000,
                key_id: -77,
                ecosystem_id: 1,
            },
            request_id: "req-1".into(),
            token_ecosystem: 1,
            max_sum: "10000".into(),
            pay_over: "".into(),
            signed_by: 0,
            ..Default::default()
        };
        assert_eq!(env.for_sign(), "req-1,42,1700000000,-77,1,1,10000,,0");
    }

    #[test]
    fn hash_depends_on_signature() {
        let mut env = TxEnvelope::default();
        env.signature = "aa".into();
        let first = env.hash();
        env.signature = "bb".into();
        assert_ne!(first, env.hash());
    }

    #[test]
    fn sign_spec_rejects_unknown_fields() {
        let good = r#"{"forsign":"","field":"Signature2","title":"t","params":[{"name":"Recipient","text":"r"}]}"#;
        assert!(serde_json::from_str::<TxSignJSON>(good).is_ok());

        let bad = r#"{"forsign":"","field":"x","title":"t","params":[],"extra":1}"#;
        assert!(serde_json::from_str::<TxSignJSON>(bad).is_err());

        let bad_param = r#"{"forsign":"","field":"x","title":"t","params":[{"name":"a","text":"b","oops":true}]}"#;
        assert!(serde_json::from_str::<TxSignJSON>(bad_param).is_err());
    }
}

/// Adjusts a wallet balance by a signed amount; balances never go
/// negative.
async fn adjust_balance(
    tx: &mut dyn StoreTx,
    keys_table: &str,
    wallet: i64,
    delta: Decimal,
) -> EngineResult<()> {
    let rows = tx
        .select(
            &SelectQuery::new(keys_table)
                .columns(&["amount"])
                .filter("id", Value::Int(wallet))
                .limit(1),
        )
        .await?;
    let current = rows
        .first()
        .and_then(|row| row.get("amount"))
        .map(|v| v.to_display())
        .unwrap_or_else(|| "0".to_string());
    let current: Decimal = current.trim().parse().unwrap_or(Decimal::ZERO);
    let updated = current + delta;
    if updated < Decimal::ZERO {
        return Err(EngineError::InvalidValue);
    }

    if rows.is_empty() {
        tx.insert(
            keys_table,
            &row(&[
                ("id", Value::Int(wallet)),
                ("pub", Value::Str(String::new())),
                ("amount", Value::Str(updated.to_string())),
            ]),
        )
        .await?;
    } else {
        tx.update(
            keys_table,
            &[("id".to_string(), Value::Int(wallet))],
            &row(&[("amount", Value::Str(updated.to_string()))]),
        )
        .await?;
    }
    Ok(())
}
