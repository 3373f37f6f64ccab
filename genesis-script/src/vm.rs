//! Virtual machine
//!
//! Executes compiled blocks on per-call stack frames. Fuel is owned by
//! the host context and charged before every instruction and host call;
//! a negative budget aborts the call with `OutOfFuel`. The process-wide
//! [`VmRegistry`] holds compiled contracts and functions: installs and
//! activation flips take the single writer lock, calls read `Arc`
//! snapshots.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use genesis_core::error::{EngineError, EngineResult};
use genesis_core::Value;
use rust_decimal::Decimal;
use tracing::debug;

use crate::ast::Type;
use crate::bytecode::{BinOp, CodeBlock, Instr, NumFamily, UnOp};
use crate::compiler::{CompiledContract, CompiledFunc};

pub const DEFAULT_CALL_DEPTH: usize = genesis_core::DEFAULT_CALL_DEPTH;

/// Per-call execution states, in order. Error edges lead to RolledBack
/// from any state; Commit stays conditional on the enclosing
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Pending,
    ConditionEval,
    ActionExec,
    Commit,
    RolledBack,
}

/// Host seam the smart layer implements: extend dispatch, context
/// values, and the fuel counter.
#[async_trait]
pub trait ExtendHost: Send {
    /// Dispatches a host extend function.
    async fn call_host(&mut self, name: &str, args: Vec<Value>) -> EngineResult<Value>;

    /// Registered extend cost for a host function; −1 means the function
    /// prices itself during execution (DB work).
    fn host_cost(&self, name: &str) -> i64;

    /// Context value for load-extern instructions (key_id, ...).
    fn extern_value(&self, name: &str) -> Option<Value>;

    /// Charges fuel. Fails with `OutOfFuel` once the budget is spent.
    fn charge(&mut self, amount: i64) -> EngineResult<()>;

    /// Fuel consumed so far.
    fn fuel_spent(&self) -> i64;
}

/// An installed contract.
#[derive(Debug, Clone)]
pub struct ContractDef {
    pub id: i64,
    pub name: String,
    pub ecosystem: i64,
    pub owner: i64,
    pub token_ecosystem: i64,
    pub active: bool,
    pub compiled: CompiledContract,
}

impl ContractDef {
    /// Fully-qualified `@N_Name` form.
    pub fn full_name(&self) -> String {
        format!("@{}{}", self.ecosystem, self.name)
    }
}

/// An installed top-level function.
#[derive(Debug, Clone)]
pub struct FuncDef {
    pub ecosystem: i64,
    pub compiled: CompiledFunc,
}

/// Splits `@1NewEcosystem` into (1, "NewEcosystem"); bare names take the
/// default ecosystem.
pub fn parse_contract_ref(name: &str, default_ecosystem: i64) -> (i64, String) {
    if let Some(rest) = name.strip_prefix('@') {
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            if let Ok(eco) = digits.parse::<i64>() {
                return (eco, rest[digits.len()..].to_string());
            }
        }
    }
    (default_ecosystem, name.to_string())
}

#[derive(Default)]
struct RegistryInner {
    contracts: HashMap<(i64, String), Arc<ContractDef>>,
    by_id: HashMap<i64, (i64, String)>,
    funcs: HashMap<(i64, String), Arc<FuncDef>>,
}

/// Process-wide contract registry. Owned by the node and passed to every
/// call; a single writer lock guards mutation, reads clone `Arc`s.
#[derive(Default)]
pub struct VmRegistry {
    inner: RwLock<RegistryInner>,
}

impl VmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs or replaces a contract.
    pub fn put(&self, def: ContractDef) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let key = (def.ecosystem, def.name.clone());
        inner.by_id.insert(def.id, key.clone());
        inner.contracts.insert(key, Arc::new(def));
    }

    /// Installs a contract, failing when the name is already taken.
    pub fn put_new(&self, def: ContractDef) -> EngineResult<()> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let key = (def.ecosystem, def.name.clone());
        if inner.contracts.contains_key(&key) {
            return Err(EngineError::Eval(format!(
                "contract {} already exists",
                def.full_name()
            )));
        }
        inner.by_id.insert(def.id, key.clone());
        inner.contracts.insert(key, Arc::new(def));
        Ok(())
    }

    pub fn put_func(&self, def: FuncDef) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner
            .funcs
            .insert((def.ecosystem, def.compiled.name.clone()), Arc::new(def));
    }

    pub fn get(&self, ecosystem: i64, name: &str) -> Option<Arc<ContractDef>> {
        let (eco, bare) = parse_contract_ref(name, ecosystem);
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.contracts.get(&(eco, bare)).cloned()
    }

    pub fn get_by_id(&self, id: i64) -> Option<Arc<ContractDef>> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let key = inner.by_id.get(&id)?;
        inner.contracts.get(key).cloned()
    }

    pub fn get_func(&self, ecosystem: i64, name: &str) -> Option<Arc<FuncDef>> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.funcs.get(&(ecosystem, name.to_string())).cloned()
    }

    /// Flips the activation flag; false when the id is unknown.
    pub fn set_active(&self, id: i64, active: bool) -> bool {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let key = match inner.by_id.get(&id) {
            Some(key) => key.clone(),
            None => return false,
        };
        if let Some(existing) = inner.contracts.get(&key) {
            let mut def = (**existing).clone();
            def.active = active;
            inner.contracts.insert(key, Arc::new(def));
            return true;
        }
        false
    }

    /// Removes a contract (the RollbackContract path).
    pub fn remove(&self, ecosystem: i64, name: &str) -> bool {
        let (eco, bare) = parse_contract_ref(name, ecosystem);
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if let Some(def) = inner.contracts.remove(&(eco, bare)) {
            inner.by_id.remove(&def.id);
            return true;
        }
        false
    }

    pub fn contract_count(&self) -> usize {
        self.inner.read().expect("registry lock poisoned").contracts.len()
    }
}

/// Invokes a contract: coerce parameters, evaluate `conditions`, run
/// `action`. The same host context is reused across nested calls; depth
/// is bounded by [`DEFAULT_CALL_DEPTH`].
pub async fn invoke(
    registry: &VmRegistry,
    contract: &Arc<ContractDef>,
    host: &mut dyn ExtendHost,
    params: &HashMap<String, Value>,
    allow_inactive: bool,
) -> EngineResult<Value> {
    invoke_depth(registry, contract, host, params, allow_inactive, 0).await
}

async fn invoke_depth(
    registry: &VmRegistry,
    contract: &Arc<ContractDef>,
    host: &mut dyn ExtendHost,
    params: &HashMap<String, Value>,
    allow_inactive: bool,
    depth: usize,
) -> EngineResult<Value> {
    if depth >= DEFAULT_CALL_DEPTH {
        return Err(EngineError::Eval(format!(
            "call depth {} exceeded",
            DEFAULT_CALL_DEPTH
        )));
    }
    if !contract.active && !allow_inactive {
        return Err(EngineError::ContractNotFound(contract.full_name()));
    }

    debug!(contract = %contract.full_name(), state = ?CallState::Pending, "invoke");

    let coerced = coerce_params(contract, params)?;

    debug!(contract = %contract.full_name(), state = ?CallState::ConditionEval, "conditions");
    if !contract.compiled.conditions.code.is_empty() {
        let locals = frame_locals(&contract.compiled.conditions, &coerced);
        let verdict = exec_block(
            registry,
            &contract.compiled.conditions,
            host,
            locals,
            contract.ecosystem,
            depth,
        )
        .await;
        match verdict {
            Ok(Value::Null) => {}
            Ok(value) if value.as_bool() => {}
            Ok(_) => {
                debug!(contract = %contract.full_name(), state = ?CallState::RolledBack, "conditions returned false");
                return Err(EngineError::AccessDenied);
            }
            Err(EngineError::Eval(_)) => {
                debug!(contract = %contract.full_name(), state = ?CallState::RolledBack, "conditions errored");
                return Err(EngineError::AccessDenied);
            }
            Err(err) => return Err(err),
        }
    }

    debug!(contract = %contract.full_name(), state = ?CallState::ActionExec, "action");
    let locals = frame_locals(&contract.compiled.action, &coerced);
    let result = exec_block(
        registry,
        &contract.compiled.action,
        host,
        locals,
        contract.ecosystem,
        depth,
    )
    .await;

    let state = match result {
        Ok(_) => CallState::Commit,
        Err(_) => CallState::RolledBack,
    };
    debug!(contract = %contract.full_name(), ?state, fuel = host.fuel_spent(), "invoke finished");
    result
}

/// Coerces the call payload to the declared parameter types. Missing
/// non-optional parameters are rejected.
fn coerce_params(
    contract: &Arc<ContractDef>,
    params: &HashMap<String, Value>,
) -> EngineResult<HashMap<String, Value>> {
    let mut out = HashMap::new();
    for param in &contract.compiled.params {
        match params.get(&param.name) {
            Some(value) => {
                out.insert(param.name.clone(), coerce_value(value, param.ty)?);
            }
            None if param.optional => {
                out.insert(param.name.clone(), default_of(param.ty));
            }
            None => {
                return Err(EngineError::InvalidObject(format!(
                    "parameter {} is not provided",
                    param.name
                )));
            }
        }
    }
    Ok(out)
}

fn coerce_value(value: &Value, ty: Type) -> EngineResult<Value> {
    Ok(match ty {
        Type::Int => Value::Int(value.to_int()?),
        Type::Float => Value::Float(value.to_float()),
        Type::Money => Value::Money(value.to_money()?),
        Type::Str => Value::Str(value.to_display()),
        Type::Bool => Value::Bool(value.as_bool()),
        Type::Bytes => match value {
            Value::Bytes(b) => Value::Bytes(b.clone()),
            other => Value::Bytes(other.to_display().into_bytes()),
        },
        Type::Array | Type::Map => match value {
            Value::Array(_) | Value::Map(_) => value.clone(),
            Value::Str(s) if !s.is_empty() => Value::json_decode(s)?,
            _ => default_of(ty),
        },
    })
}

fn default_of(ty: Type) -> Value {
    match ty {
        Type::Int => Value::Int(0),
        Type::Float => Value::Float(0.0),
        Type::Money => Value::Money(Decimal::ZERO),
        Type::Str => Value::Str(String::new()),
        Type::Bytes => Value::Bytes(Vec::new()),
        Type::Bool => Value::Bool(false),
        Type::Array => Value::Array(Vec::new()),
        Type::Map => Value::Map(BTreeMap::new()),
    }
}

/// Lays out a frame's locals: named parameters fill their slots, the
/// rest start nil.
fn frame_locals(block: &CodeBlock, params: &HashMap<String, Value>) -> Vec<Value> {
    block
        .locals
        .iter()
        .map(|name| params.get(name).cloned().unwrap_or(Value::Null))
        .collect()
}

fn pop(stack: &mut Vec<Value>) -> EngineResult<Value> {
    stack
        .pop()
        .ok_or_else(|| EngineError::Eval("stack underflow".to_string()))
}

async fn exec_block(
    registry: &VmRegistry,
    block: &CodeBlock,
    host: &mut dyn ExtendHost,
    mut locals: Vec<Value>,
    ecosystem: i64,
    depth: usize,
) -> EngineResult<Value> {
    let mut stack: Vec<Value> = Vec::new();
    let mut pc = 0usize;

    while pc < block.code.len() {
        let instr = &block.code[pc];
        host.charge(instr.base_cost())?;
        pc += 1;

        match instr {
            Instr::Push(value) => stack.push(value.clone()),
            Instr::Load(slot) => {
                let value = locals
                    .get(*slot as usize)
                    .cloned()
                    .ok_or_else(|| EngineError::Eval("bad local slot".to_string()))?;
                stack.push(value);
            }
            Instr::Store(slot) => {
                let value = pop(&mut stack)?;
                let slot = *slot as usize;
                if slot >= locals.len() {
                    return Err(EngineError::Eval("bad local slot".to_string()));
                }
                locals[slot] = value;
            }
            Instr::LoadExtern(name) => {
                let value = host
                    .extern_value(name)
                    .ok_or_else(|| EngineError::Eval(format!("unknown extern {}", name)))?;
                stack.push(value);
            }
            Instr::CallHost { name, argc } => {
                let mut args = Vec::with_capacity(*argc as usize);
                for _ in 0..*argc {
                    args.push(pop(&mut stack)?);
                }
                args.reverse();
                let cost = host.host_cost(name);
                if cost >= 0 {
                    host.charge(cost)?;
                }
                let result = host.call_host(name, args).await?;
                stack.push(result);
            }
            Instr::Call { name, argc } => {
                let mut args = Vec::with_capacity(*argc as usize);
                for _ in 0..*argc {
                    args.push(pop(&mut stack)?);
                }
                args.reverse();

                if let Some(func) = registry.get_func(ecosystem, name) {
                    if args.len() != func.compiled.params.len() {
                        return Err(EngineError::Eval(format!(
                            "{} expects {} arguments",
                            name,
                            func.compiled.params.len()
                        )));
                    }
                    let mut named = HashMap::new();
                    for ((pname, pty), arg) in func.compiled.params.iter().zip(args) {
                        named.insert(pname.clone(), coerce_value(&arg, *pty)?);
                    }
                    let locals = frame_locals(&func.compiled.body, &named);
                    let result = Box::pin(exec_block(
                        registry,
                        &func.compiled.body,
                        host,
                        locals,
                        ecosystem,
                        depth + 1,
                    ))
                    .await?;
                    stack.push(result);
                } else if let Some(target) = registry.get(ecosystem, name) {
                    let mut named = HashMap::new();
                    for (param, arg) in target.compiled.params.iter().zip(args) {
                        named.insert(param.name.clone(), arg);
                    }
                    let result = Box::pin(invoke_depth(
                        registry,
                        &target,
                        host,
                        &named,
                        false,
                        depth + 1,
                    ))
                    .await?;
                    stack.push(result);
                } else {
                    return Err(EngineError::ContractNotFound(name.clone()));
                }
            }
            Instr::Jump(target) => pc = *target,
            Instr::JumpIfZero(target) => {
                let value = pop(&mut stack)?;
                if !value.as_bool() {
                    pc = *target;
                }
            }
            Instr::Binary(op) => {
                let rhs = pop(&mut stack)?;
                let lhs = pop(&mut stack)?;
                stack.push(eval_binary(*op, lhs, rhs)?);
            }
            Instr::Unary(op) => {
                let value = pop(&mut stack)?;
                stack.push(eval_unary(*op, value)?);
            }
            Instr::Index => {
                let index = pop(&mut stack)?;
                let container = pop(&mut stack)?;
                stack.push(container.index(&index)?);
            }
            Instr::Field(name) => {
                let value = pop(&mut stack)?;
                match value {
                    Value::Map(map) => {
                        stack.push(map.get(name).cloned().unwrap_or(Value::Null));
                    }
                    other => {
                        return Err(EngineError::InvalidObject(format!(
                            "cannot select field {} of {}",
                            name,
                            other.type_name()
                        )))
                    }
                }
            }
            Instr::MakeArray(count) => {
                let mut items = Vec::with_capacity(*count as usize);
                for _ in 0..*count {
                    items.push(pop(&mut stack)?);
                }
                items.reverse();
                stack.push(Value::Array(items));
            }
            Instr::MakeMap(count) => {
                let mut pairs = Vec::with_capacity(*count as usize);
                for _ in 0..*count {
                    let value = pop(&mut stack)?;
                    let key = pop(&mut stack)?;
                    pairs.push((key.to_display(), value));
                }
                // restore source order so a repeated key keeps its last
                // written value
                pairs.reverse();
                let mut map = BTreeMap::new();
                for (key, value) in pairs {
                    map.insert(key, value);
                }
                stack.push(Value::Map(map));
            }
            Instr::Coerce(family) => {
                let value = pop(&mut stack)?;
                stack.push(match family {
                    NumFamily::Int => Value::Int(value.to_int()?),
                    NumFamily::Float => Value::Float(value.to_float()),
                    NumFamily::Money => Value::Money(value.to_money()?),
                });
            }
            Instr::Interp => {
                let template = pop(&mut stack)?.to_display();
                let resolved = interpolate(&template, |name| {
                    block
                        .slot_of(name)
                        .and_then(|slot| locals.get(slot as usize).cloned())
                        .or_else(|| host.extern_value(name))
                });
                stack.push(Value::Str(resolved));
            }
            Instr::Pop => {
                pop(&mut stack)?;
            }
            Instr::Return => return pop(&mut stack),
        }
    }
    Ok(Value::Null)
}

/// Runs only a contract's `conditions` block (the `ContractConditions`
/// path). The caller supplies whatever parameters the block needs.
pub async fn eval_conditions(
    registry: &VmRegistry,
    contract: &Arc<ContractDef>,
    host: &mut dyn ExtendHost,
    params: &HashMap<String, Value>,
) -> EngineResult<Value> {
    let coerced = coerce_params(contract, params)?;
    let locals = frame_locals(&contract.compiled.conditions, &coerced);
    exec_block(
        registry,
        &contract.compiled.conditions,
        host,
        locals,
        contract.ecosystem,
        0,
    )
    .await
}

/// Evaluates a compiled standalone expression (conditions strings).
pub async fn eval_code(
    registry: &VmRegistry,
    block: &CodeBlock,
    host: &mut dyn ExtendHost,
    ecosystem: i64,
) -> EngineResult<Value> {
    exec_block(registry, block, host, Vec::new(), ecosystem, 0).await
}

/// Resolves `$name$` markers against the lookup; unknown names stay
/// literal.
pub fn interpolate(template: &str, lookup: impl Fn(&str) -> Option<Value>) -> String {
    let bytes = template.as_bytes();
    let mut out = String::with_capacity(template.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            let mut j = i + 1;
            while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
                j += 1;
            }
            if j > i + 1 && j < bytes.len() && bytes[j] == b'$' {
                let name = &template[i + 1..j];
                if let Some(value) = lookup(name) {
                    out.push_str(&value.to_display());
                    i = j + 1;
                    continue;
                }
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

fn eval_binary(op: BinOp, lhs: Value, rhs: Value) -> EngineResult<Value> {
    use std::cmp::Ordering;

    fn is_numeric(v: &Value) -> bool {
        matches!(v, Value::Int(_) | Value::Float(_) | Value::Money(_))
    }

    fn numeric_family(lhs: &Value, rhs: &Value) -> NumFamily {
        if matches!(lhs, Value::Money(_)) || matches!(rhs, Value::Money(_)) {
            NumFamily::Money
        } else if matches!(lhs, Value::Float(_)) || matches!(rhs, Value::Float(_)) {
            NumFamily::Float
        } else {
            NumFamily::Int
        }
    }

    fn compare(lhs: &Value, rhs: &Value) -> EngineResult<Ordering> {
        if is_numeric(lhs) && is_numeric(rhs) {
            return Ok(match numeric_family(lhs, rhs) {
                NumFamily::Int => lhs.to_int()?.cmp(&rhs.to_int()?),
                NumFamily::Float => lhs
                    .to_float()
                    .partial_cmp(&rhs.to_float())
                    .unwrap_or(Ordering::Equal),
                NumFamily::Money => lhs.to_money()?.cmp(&rhs.to_money()?),
            });
        }
        match (lhs, rhs) {
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            // a numeric compared against a numeric-looking string
            (a, b) if is_numeric(a) || is_numeric(b) => {
                Ok(a.to_money()?.cmp(&b.to_money()?))
            }
            (a, b) => Err(EngineError::Eval(format!(
                "cannot compare {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    match op {
        BinOp::Add => {
            if matches!(lhs, Value::Str(_)) || matches!(rhs, Value::Str(_)) {
                return Ok(Value::Str(format!("{}{}", lhs.to_display(), rhs.to_display())));
            }
            match numeric_family(&lhs, &rhs) {
                NumFamily::Int => lhs
                    .to_int()?
                    .checked_add(rhs.to_int()?)
                    .map(Value::Int)
                    .ok_or_else(|| EngineError::Conversion("integer overflow".to_string())),
                NumFamily::Float => Ok(Value::Float(lhs.to_float() + rhs.to_float())),
                NumFamily::Money => Ok(Value::Money(lhs.to_money()? + rhs.to_money()?)),
            }
        }
        BinOp::Sub => match numeric_family(&lhs, &rhs) {
            NumFamily::Int => lhs
                .to_int()?
                .checked_sub(rhs.to_int()?)
                .map(Value::Int)
                .ok_or_else(|| EngineError::Conversion("integer overflow".to_string())),
            NumFamily::Float => Ok(Value::Float(lhs.to_float() - rhs.to_float())),
            NumFamily::Money => Ok(Value::Money(lhs.to_money()? - rhs.to_money()?)),
        },
        BinOp::Mul => match numeric_family(&lhs, &rhs) {
            NumFamily::Int => lhs
                .to_int()?
                .checked_mul(rhs.to_int()?)
                .map(Value::Int)
                .ok_or_else(|| EngineError::Conversion("integer overflow".to_string())),
            NumFamily::Float => Ok(Value::Float(lhs.to_float() * rhs.to_float())),
            NumFamily::Money => Ok(Value::Money(lhs.to_money()? * rhs.to_money()?)),
        },
        BinOp::Div => match numeric_family(&lhs, &rhs) {
            NumFamily::Int => {
                let divisor = rhs.to_int()?;
                if divisor == 0 {
                    return Err(EngineError::Eval("division by zero".to_string()));
                }
                Ok(Value::Int(lhs.to_int()? / divisor))
            }
            NumFamily::Float => {
                let divisor = rhs.to_float();
                if divisor == 0.0 {
                    return Err(EngineError::Eval("division by zero".to_string()));
                }
                Ok(Value::Float(lhs.to_float() / divisor))
            }
            NumFamily::Money => {
                let divisor = rhs.to_money()?;
                if divisor.is_zero() {
                    return Err(EngineError::Eval("division by zero".to_string()));
                }
                Ok(Value::Money(lhs.to_money()? / divisor))
            }
        },
        BinOp::Mod => {
            let divisor = rhs.to_int()?;
            if divisor == 0 {
                return Err(EngineError::Eval("division by zero".to_string()));
            }
            Ok(Value::Int(lhs.to_int()? % divisor))
        }
        BinOp::Eq | BinOp::NotEq => {
            let equal = if is_numeric(&lhs) && is_numeric(&rhs) {
                compare(&lhs, &rhs)? == Ordering::Equal
            } else {
                lhs.to_display() == rhs.to_display()
            };
            Ok(Value::Bool(if op == BinOp::Eq { equal } else { !equal }))
        }
        BinOp::Lt => Ok(Value::Bool(compare(&lhs, &rhs)? == Ordering::Less)),
        BinOp::LtEq => Ok(Value::Bool(compare(&lhs, &rhs)? != Ordering::Greater)),
        BinOp::Gt => Ok(Value::Bool(compare(&lhs, &rhs)? == Ordering::Greater)),
        BinOp::GtEq => Ok(Value::Bool(compare(&lhs, &rhs)? != Ordering::Less)),
    }
}

fn eval_unary(op: UnOp, value: Value) -> EngineResult<Value> {
    match op {
        UnOp::Neg => match value {
            Value::Int(v) => v
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| EngineError::Conversion("integer overflow".to_string())),
            Value::Float(v) => Ok(Value::Float(-v)),
            Value::Money(v) => Ok(Value::Money(-v)),
            other => Err(EngineError::Eval(format!(
                "cannot negate {}",
                other.type_name()
            ))),
        },
        UnOp::Not => Ok(Value::Bool(!value.as_bool())),
    }
}
