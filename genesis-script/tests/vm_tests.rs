//! VM integration tests: fuel metering, conditions gating, nested calls.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use genesis_core::error::{EngineError, EngineResult};
use genesis_core::Value;
use genesis_script::{
    compile_source, invoke, ContractDef, ExtendHost, FuncDef, HostSymbols, VmRegistry,
};

/// Test host: a couple of pure extend functions, context values and a
/// plain fuel counter.
struct TestHost {
    fuel: i64,
    spent: i64,
    key_id: i64,
    log: Vec<String>,
}

impl TestHost {
    fn new(fuel: i64) -> Self {
        Self {
            fuel,
            spent: 0,
            key_id: 42,
            log: Vec::new(),
        }
    }
}

#[async_trait]
impl ExtendHost for TestHost {
    async fn call_host(&mut self, name: &str, args: Vec<Value>) -> EngineResult<Value> {
        match name {
            "Println" => {
                self.log.push(
                    args.iter()
                        .map(|a| a.to_display())
                        .collect::<Vec<_>>()
                        .join(" "),
                );
                Ok(Value::Null)
            }
            "Int" => args
                .first()
                .ok_or_else(|| EngineError::Eval("Int needs an argument".into()))?
                .to_int()
                .map(Value::Int),
            "Burn" => {
                // function-priced host call: charges per unit burned
                let units = args.first().map(|a| a.to_int()).transpose()?.unwrap_or(0);
                self.charge(units)?;
                Ok(Value::Int(units))
            }
            other => Err(EngineError::Eval(format!("unknown host fn {}", other))),
        }
    }

    fn host_cost(&self, name: &str) -> i64 {
        match name {
            "Println" => 5,
            "Int" => 1,
            // priced by the function itself
            "Burn" => -1,
            _ => 0,
        }
    }

    fn extern_value(&self, name: &str) -> Option<Value> {
        match name {
            "key_id" => Some(Value::Int(self.key_id)),
            "ecosystem_id" => Some(Value::Int(1)),
            _ => None,
        }
    }

    fn charge(&mut self, amount: i64) -> EngineResult<()> {
        self.fuel -= amount;
        self.spent += amount;
        if self.fuel < 0 {
            return Err(EngineError::OutOfFuel);
        }
        Ok(())
    }

    fn fuel_spent(&self) -> i64 {
        self.spent
    }
}

fn symbols() -> HostSymbols {
    HostSymbols {
        funcs: ["Println", "Int", "Burn"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        vars: ["key_id", "ecosystem_id"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

fn install(registry: &VmRegistry, source: &str) {
    let compiled = compile_source(source, &symbols()).unwrap();
    for func in compiled.funcs {
        registry.put_func(FuncDef {
            ecosystem: 1,
            compiled: func,
        });
    }
    for (i, contract) in compiled.contracts.into_iter().enumerate() {
        let id = registry.contract_count() as i64 + i as i64 + 1;
        registry.put(ContractDef {
            id,
            name: contract.name.clone(),
            ecosystem: 1,
            owner: 42,
            token_ecosystem: 1,
            active: true,
            compiled: contract,
        });
    }
}

fn params(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn action_runs_and_returns() {
    let registry = VmRegistry::new();
    install(
        &registry,
        r#"
        contract Sum {
            data { A int B int }
            action { return A + B }
        }
        "#,
    );
    let contract = registry.get(1, "Sum").unwrap();
    let mut host = TestHost::new(10_000);
    let result = invoke(
        &registry,
        &contract,
        &mut host,
        &params(&[("A", Value::Int(2)), ("B", Value::Str("3".into()))]),
        false,
    )
    .await
    .unwrap();
    assert_eq!(result, Value::Int(5));
}

#[tokio::test]
async fn conditions_false_denies_access() {
    let registry = VmRegistry::new();
    install(
        &registry,
        r#"
        contract Guarded {
            conditions { return key_id == 1 }
            action { return 1 }
        }
        "#,
    );
    let contract = registry.get(1, "Guarded").unwrap();
    let mut host = TestHost::new(10_000);
    let err = invoke(&registry, &contract, &mut host, &HashMap::new(), false)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::AccessDenied);
}

#[tokio::test]
async fn out_of_fuel_aborts_immediately() {
    let registry = VmRegistry::new();
    install(
        &registry,
        r#"
        contract Spin {
            action {
                var i int
                while i < 1000000 { i = i + 1 }
            }
        }
        "#,
    );
    let contract = registry.get(1, "Spin").unwrap();
    let mut host = TestHost::new(500);
    let err = invoke(&registry, &contract, &mut host, &HashMap::new(), false)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::OutOfFuel);
    // the budget may be overshot by at most the last instruction's cost
    assert!(host.spent >= 500);
}

#[tokio::test]
async fn fuel_is_monotonic_in_instruction_count() {
    let registry = VmRegistry::new();
    install(
        &registry,
        r#"
        contract Loop {
            data { N int }
            action {
                var i int
                while i < N { i = i + 1 }
            }
        }
        "#,
    );
    let contract = registry.get(1, "Loop").unwrap();

    let mut spent = Vec::new();
    for n in [1i64, 5, 25] {
        let mut host = TestHost::new(1_000_000);
        invoke(
            &registry,
            &contract,
            &mut host,
            &params(&[("N", Value::Int(n))]),
            false,
        )
        .await
        .unwrap();
        spent.push(host.fuel_spent());
    }
    assert!(spent[0] < spent[1] && spent[1] < spent[2]);
}

#[tokio::test]
async fn function_priced_host_calls_charge_their_own_cost() {
    let registry = VmRegistry::new();
    install(
        &registry,
        r#"
        contract Burner {
            data { Units int }
            action { Burn(Units) }
        }
        "#,
    );
    let contract = registry.get(1, "Burner").unwrap();

    let mut cheap = TestHost::new(10_000);
    invoke(
        &registry,
        &contract,
        &mut cheap,
        &params(&[("Units", Value::Int(1))]),
        false,
    )
    .await
    .unwrap();

    let mut costly = TestHost::new(10_000);
    invoke(
        &registry,
        &contract,
        &mut costly,
        &params(&[("Units", Value::Int(500))]),
        false,
    )
    .await
    .unwrap();

    assert_eq!(costly.fuel_spent() - cheap.fuel_spent(), 499);
}

#[tokio::test]
async fn contracts_call_contracts_with_bounded_depth() {
    let registry = VmRegistry::new();
    install(
        &registry,
        r#"
        contract Inner {
            data { X int }
            action { return X * 2 }
        }
        contract Outer {
            data { X int }
            action { return Inner(X) + 1 }
        }
        contract Recurse {
            action { Recurse() }
        }
        "#,
    );

    let outer = registry.get(1, "Outer").unwrap();
    let mut host = TestHost::new(100_000);
    let result = invoke(
        &registry,
        &outer,
        &mut host,
        &params(&[("X", Value::Int(21))]),
        false,
    )
    .await
    .unwrap();
    assert_eq!(result, Value::Int(43));

    let recurse = registry.get(1, "Recurse").unwrap();
    let mut host = TestHost::new(10_000_000);
    let err = invoke(&registry, &recurse, &mut host, &HashMap::new(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Eval(msg) if msg.contains("depth")));
}

#[tokio::test]
async fn declared_funcs_are_callable() {
    let registry = VmRegistry::new();
    install(
        &registry,
        r#"
        func triple(x int) int { return x * 3 }
        contract UsesFunc {
            data { X int }
            action { return triple(X) }
        }
        "#,
    );
    let contract = registry.get(1, "UsesFunc").unwrap();
    let mut host = TestHost::new(100_000);
    let result = invoke(
        &registry,
        &contract,
        &mut host,
        &params(&[("X", Value::Int(7))]),
        false,
    )
    .await
    .unwrap();
    assert_eq!(result, Value::Int(21));
}

#[tokio::test]
async fn inactive_contracts_reject_plain_calls() {
    let registry = VmRegistry::new();
    install(
        &registry,
        "contract Dormant { action { return 1 } }",
    );
    let id = registry.get(1, "Dormant").unwrap().id;
    registry.set_active(id, false);

    let contract = registry.get(1, "Dormant").unwrap();
    let mut host = TestHost::new(1_000);
    let err = invoke(&registry, &contract, &mut host, &HashMap::new(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ContractNotFound(_)));

    // the admin path may still run it
    let mut host = TestHost::new(1_000);
    assert!(invoke(&registry, &contract, &mut host, &HashMap::new(), true)
        .await
        .is_ok());
}

#[tokio::test]
async fn missing_required_parameter_rejected() {
    let registry = VmRegistry::new();
    install(
        &registry,
        r#"
        contract Strict {
            data { Must int Optional string "optional" }
            action { return Must }
        }
        "#,
    );
    let contract = registry.get(1, "Strict").unwrap();
    let mut host = TestHost::new(1_000);
    let err = invoke(&registry, &contract, &mut host, &HashMap::new(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidObject(msg) if msg.contains("Must")));
}

#[tokio::test]
async fn string_interpolation_resolves_params_and_context() {
    let registry = VmRegistry::new();
    install(
        &registry,
        r#"
        contract Hello {
            data { Name string }
            action { return "Hello $Name$ from $key_id$" }
        }
        "#,
    );
    let contract = registry.get(1, "Hello").unwrap();
    let mut host = TestHost::new(10_000);
    let result = invoke(
        &registry,
        &contract,
        &mut host,
        &params(&[("Name", Value::Str("world".into()))]),
        false,
    )
    .await
    .unwrap();
    assert_eq!(result, Value::Str("Hello world from 42".into()));
}

#[tokio::test]
async fn map_literals_build_and_index() {
    let registry = VmRegistry::new();
    install(
        &registry,
        r#"
        contract Payload {
            data { To int }
            action {
                var m map
                m = { "to": To, "memo": "transfer", "flags": { "urgent": true } }
                return m["to"] + m.flags["urgent"]
            }
        }
        "#,
    );
    let contract = registry.get(1, "Payload").unwrap();
    let mut host = TestHost::new(10_000);
    let result = invoke(
        &registry,
        &contract,
        &mut host,
        &params(&[("To", Value::Int(41))]),
        false,
    )
    .await
    .unwrap();
    // true coerces to 1 under integer addition
    assert_eq!(result, Value::Int(42));
}

#[tokio::test]
async fn non_convertible_param_is_a_conversion_error() {
    let registry = VmRegistry::new();
    install(
        &registry,
        "contract Conv { data { N int } action { return N } }",
    );
    let contract = registry.get(1, "Conv").unwrap();
    let mut host = TestHost::new(1_000);
    let err = invoke(
        &registry,
        &contract,
        &mut host,
        &params(&[("N", Value::Str("not a number".into()))]),
        false,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::Conversion(_)));
}

#[test]
fn registry_reads_are_arc_snapshots() {
    let registry = Arc::new(VmRegistry::new());
    install(
        &registry,
        "contract Stable { action { return 1 } }",
    );
    let before = registry.get(1, "Stable").unwrap();
    // a replace does not disturb snapshots already taken
    install(
        &registry,
        "contract Other { action { return 2 } }",
    );
    assert_eq!(before.name, "Stable");
    assert!(registry.get(1, "Other").is_some());
}
