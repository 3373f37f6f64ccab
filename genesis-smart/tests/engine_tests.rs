//! End-to-end engine scenarios: money transfer, fuel exhaustion, system
//! parameter domains, admin gates, rollback replay.

use std::collections::HashMap;
use std::sync::Arc;

use genesis_core::Value;
use genesis_crypto::GenesisSigningKey;
use genesis_db::{row, seed, Datastore, MemoryDatastore, SelectQuery};
use genesis_smart::{ContractEngine, ExecPolicy, TxEnvelope, TxHeader};

const TRANSFER_SRC: &str = r#"
contract TransferMoney {
    data {
        Recipient int
        Amount money
    }
    conditions {
        return Amount > 0m
    }
    action {
        var rows array, sender money, receiver money
        rows = DBSelect("keys", "id,amount", key_id, "", 0, 1, "", "")
        sender = Money(rows[0]["amount"])
        DBUpdate("keys", key_id, "amount", sender - Amount)
        rows = DBSelect("keys", "id,amount", Recipient, "", 0, 1, "", "")
        receiver = Money(rows[0]["amount"])
        DBUpdate("keys", Recipient, "amount", receiver + Amount)
        return "success"
    }
}
"#;

const ADMIN_SRC: &str = r#"
contract UpdateSysParam {
    data {
        Name string
        Value string
        Conditions string "optional"
    }
    action {
        DBUpdateSysParam(Name, Value, Conditions)
    }
}

contract NewEcosystem {
    data { Name string }
    action {
        return CreateEcosystem(key_id, Name)
    }
}

contract RogueEcosystem {
    data { Name string }
    action {
        return CreateEcosystem(key_id, Name)
    }
}
"#;

struct World {
    engine: ContractEngine,
    datastore: MemoryDatastore,
    key: GenesisSigningKey,
    founder: i64,
    recipient: i64,
    contract_ids: HashMap<String, i64>,
}

async fn build_world(commission: &str) -> World {
    let datastore = MemoryDatastore::new();
    datastore.init_schema().await.unwrap();

    let key = GenesisSigningKey::generate();
    let founder = key.wallet_id();
    let recipient = founder.wrapping_add(1);

    let mut tx = datastore.begin().await.unwrap();
    seed::init_data(tx.as_mut(), founder, &key.public_key_hex())
        .await
        .unwrap();
    tx.update(
        "1_keys",
        &[("id".to_string(), Value::Int(founder))],
        &row(&[("amount", Value::Str("5000".into()))]),
    )
    .await
    .unwrap();
    tx.insert(
        "1_keys",
        &row(&[
            ("id", Value::Int(recipient)),
            ("pub", Value::Str(String::new())),
            ("amount", Value::Str("0".into())),
        ]),
    )
    .await
    .unwrap();
    tx.update(
        "1_system_parameters",
        &[("name".to_string(), Value::Str("commission_size".into()))],
        &row(&[("value", Value::Str(commission.into()))]),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let engine = ContractEngine::new(Arc::new(datastore.clone()), ExecPolicy::consensus())
        .await
        .unwrap();

    let mut contract_ids = HashMap::new();
    for src in [TRANSFER_SRC, ADMIN_SRC] {
        let ids = engine.install_source(1, founder, src).await.unwrap();
        for id in ids {
            let def = engine.registry().get_by_id(id).unwrap();
            contract_ids.insert(def.name.clone(), id);
        }
    }

    World {
        engine,
        datastore,
        key,
        founder,
        recipient,
        contract_ids,
    }
}

fn signed_envelope(world: &World, contract: &str, max_sum: &str, params: &[(&str, &str)]) -> TxEnvelope {
    let mut env = TxEnvelope {
        header: TxHeader {
            tx_type: world.contract_ids[contract],
            time: 1_700_000_000,
            key_id: world.founder,
            ecosystem_id: 1,
        },
        request_id: "req".into(),
        token_ecosystem: 1,
        max_sum: max_sum.into(),
        pay_over: "0".into(),
        signed_by: 0,
        public_key: world.key.public_key_hex(),
        ..Default::default()
    };
    for (name, value) in params {
        env.params
            .insert(name.to_string(), Value::Str(value.to_string()));
    }
    env.signature = hex::encode(world.key.sign(env.for_sign().as_bytes()));
    env
}

async fn balance(world: &World, wallet: i64) -> String {
    let mut tx = world.datastore.begin().await.unwrap();
    let rows = tx
        .select(
            &SelectQuery::new("1_keys")
                .columns(&["amount"])
                .filter("id", Value::Int(wallet)),
        )
        .await
        .unwrap();
    tx.rollback().await.unwrap();
    rows.first()
        .and_then(|r| r.get("amount"))
        .map(|v| v.to_display())
        .unwrap_or_default()
}

async fn journal_len(world: &World, tx_hash: &str) -> usize {
    let mut tx = world.datastore.begin().await.unwrap();
    let rows = tx
        .select(&SelectQuery::new("rollback_tx").filter("tx_hash", Value::Str(tx_hash.into())))
        .await
        .unwrap();
    tx.rollback().await.unwrap();
    rows.len()
}

#[tokio::test]
async fn transfer_commits_with_commission() {
    let world = build_world("10").await;
    let env = signed_envelope(
        &world,
        "TransferMoney",
        "10000",
        &[
            ("Recipient", &world.recipient.to_string()),
            ("Amount", "1000"),
        ],
    );

    let result = world.engine.execute(&env).await.unwrap();
    assert!(result.block_id > 0, "expected a commit: {:?}", result);
    assert_eq!(result.result, "success");

    // sender pays the amount plus the flat commission
    assert_eq!(balance(&world, world.founder).await, "3990");
    assert_eq!(balance(&world, world.recipient).await, "1000");
    assert_eq!(journal_len(&world, &result.hash).await, 2);
}

#[tokio::test]
async fn out_of_fuel_rolls_everything_back() {
    let world = build_world("10").await;
    let env = signed_envelope(
        &world,
        "TransferMoney",
        "1",
        &[
            ("Recipient", &world.recipient.to_string()),
            ("Amount", "1000"),
        ],
    );

    let result = world.engine.execute(&env).await.unwrap();
    assert_eq!(result.block_id, 0);
    assert_eq!(result.result, "OutOfFuel");

    assert_eq!(balance(&world, world.founder).await, "5000");
    assert_eq!(balance(&world, world.recipient).await, "0");
    assert_eq!(journal_len(&world, &result.hash).await, 0);
}

#[tokio::test]
async fn bad_sys_param_value_leaves_parameter_unchanged() {
    let world = build_world("10").await;
    let env = signed_envelope(
        &world,
        "UpdateSysParam",
        "10000",
        &[("Name", "gap_between_blocks"), ("Value", "0")],
    );

    let result = world.engine.execute(&env).await.unwrap();
    assert_eq!(result.block_id, 0);
    assert_eq!(result.result, "InvalidValue");

    let mut tx = world.datastore.begin().await.unwrap();
    let rows = tx
        .select(
            &SelectQuery::new("1_system_parameters")
                .filter("name", Value::Str("gap_between_blocks".into())),
        )
        .await
        .unwrap();
    tx.rollback().await.unwrap();
    assert_eq!(rows[0]["value"], Value::Str("2".into()));
}

#[tokio::test]
async fn good_sys_param_value_updates_and_reloads_cache() {
    let world = build_world("10").await;
    let env = signed_envelope(
        &world,
        "UpdateSysParam",
        "10000",
        &[("Name", "gap_between_blocks"), ("Value", "5")],
    );

    let result = world.engine.execute(&env).await.unwrap();
    assert!(result.block_id > 0, "{:?}", result);
    assert_eq!(world.engine.syspar().sys_int64("gap_between_blocks"), 5);
}

#[tokio::test]
async fn create_ecosystem_from_wrong_caller_is_rejected() {
    let world = build_world("0").await;
    let count_before = {
        let mut tx = world.datastore.begin().await.unwrap();
        let n = tx.count("1_ecosystems").await.unwrap();
        tx.rollback().await.unwrap();
        n
    };

    let env = signed_envelope(&world, "RogueEcosystem", "10000", &[("Name", "pirate")]);
    let result = world.engine.execute(&env).await.unwrap();
    assert_eq!(result.block_id, 0);
    assert_eq!(result.result, "IncorrectCallingContract");

    let mut tx = world.datastore.begin().await.unwrap();
    assert_eq!(tx.count("1_ecosystems").await.unwrap(), count_before);
    tx.rollback().await.unwrap();
}

#[tokio::test]
async fn create_ecosystem_from_whitelisted_caller_succeeds() {
    let world = build_world("0").await;
    let env = signed_envelope(&world, "NewEcosystem", "10000", &[("Name", "second")]);

    let result = world.engine.execute(&env).await.unwrap();
    assert!(result.block_id > 0, "{:?}", result);
    assert_eq!(result.result, "2");

    let mut tx = world.datastore.begin().await.unwrap();
    assert_eq!(tx.count("1_ecosystems").await.unwrap(), 2);
    assert!(tx.table_exists("2_keys").await.unwrap());
    assert!(tx.table_exists("2_contracts").await.unwrap());
    tx.rollback().await.unwrap();
}

#[tokio::test]
async fn wrong_signature_is_rejected() {
    let world = build_world("10").await;
    let mut env = signed_envelope(
        &world,
        "TransferMoney",
        "10000",
        &[
            ("Recipient", &world.recipient.to_string()),
            ("Amount", "1000"),
        ],
    );

    assert!(world.engine.validate_signatures(&env).await.is_ok());

    // tamper with a signed field after signing
    env.max_sum = "99999".into();
    let err = world.engine.validate_signatures(&env).await.unwrap_err();
    assert_eq!(err.kind(), "IncorrectSignature");

    let result = world.engine.execute(&env).await.unwrap();
    assert_eq!(result.block_id, 0);
    assert_eq!(balance(&world, world.founder).await, "5000");
}

#[tokio::test]
async fn replaying_the_journal_restores_pre_state() {
    // commission off so the keys table is fully covered by the journal
    let world = build_world("0").await;

    let before = {
        let mut tx = world.datastore.begin().await.unwrap();
        let rows = tx.select(&SelectQuery::new("1_keys")).await.unwrap();
        tx.rollback().await.unwrap();
        rows
    };

    let env = signed_envelope(
        &world,
        "TransferMoney",
        "10000",
        &[
            ("Recipient", &world.recipient.to_string()),
            ("Amount", "1000"),
        ],
    );
    let result = world.engine.execute(&env).await.unwrap();
    assert!(result.block_id > 0, "{:?}", result);
    assert_ne!(balance(&world, world.founder).await, "5000");

    // block reorganization: replay the committed journal in reverse
    let mut tx = world.datastore.begin().await.unwrap();
    genesis_smart::rollback::replay(tx.as_mut(), &world.engine.registry(), &result.hash)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let after = {
        let mut tx = world.datastore.begin().await.unwrap();
        let rows = tx.select(&SelectQuery::new("1_keys")).await.unwrap();
        tx.rollback().await.unwrap();
        rows
    };
    assert_eq!(before, after);
    assert_eq!(journal_len(&world, &result.hash).await, 0);
}

#[tokio::test]
async fn denied_table_access_touches_nothing() {
    let mut world = build_world("0").await;

    // lock inserts on the languages table
    let mut tx = world.datastore.begin().await.unwrap();
    tx.update(
        "1_tables",
        &[("name".to_string(), Value::Str("1_languages".into()))],
        &row(&[(
            "permissions",
            Value::Str(
                r#"{"insert": "false", "update": "false", "read": "true", "new_column": "false"}"#
                    .into(),
            ),
        )]),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let locked_src = r#"
        contract AddLang {
            action {
                DBInsert("languages", "name,res", "greeting", "{}")
            }
        }
    "#;
    let ids = world
        .engine
        .install_source(1, world.founder, locked_src)
        .await
        .unwrap();
    world.contract_ids.insert("AddLang".to_string(), ids[0]);

    let env = signed_envelope(&world, "AddLang", "10000", &[]);
    let result = world.engine.execute(&env).await.unwrap();
    assert_eq!(result.block_id, 0);
    assert_eq!(result.result, "AccessDenied");

    let mut tx = world.datastore.begin().await.unwrap();
    assert_eq!(tx.count("1_languages").await.unwrap(), 0);
    tx.rollback().await.unwrap();
    assert_eq!(journal_len(&world, &result.hash).await, 0);
}

#[tokio::test]
async fn vde_mode_writes_no_journal() {
    let datastore = MemoryDatastore::new();
    datastore.init_schema().await.unwrap();
    let key = GenesisSigningKey::generate();
    let founder = key.wallet_id();
    let recipient = founder.wrapping_add(1);

    let mut tx = datastore.begin().await.unwrap();
    seed::init_data(tx.as_mut(), founder, &key.public_key_hex())
        .await
        .unwrap();
    tx.update(
        "1_keys",
        &[("id".to_string(), Value::Int(founder))],
        &row(&[("amount", Value::Str("5000".into()))]),
    )
    .await
    .unwrap();
    tx.insert(
        "1_keys",
        &row(&[
            ("id", Value::Int(recipient)),
            ("pub", Value::Str(String::new())),
            ("amount", Value::Str("0".into())),
        ]),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let engine = ContractEngine::new(Arc::new(datastore.clone()), ExecPolicy::vde())
        .await
        .unwrap();
    let ids = engine.install_source(1, founder, TRANSFER_SRC).await.unwrap();

    let mut env = TxEnvelope {
        header: TxHeader {
            tx_type: ids[0],
            time: 1_700_000_000,
            key_id: founder,
            ecosystem_id: 1,
        },
        request_id: "req".into(),
        token_ecosystem: 1,
        max_sum: "10000".into(),
        pay_over: "0".into(),
        signed_by: 0,
        public_key: key.public_key_hex(),
        ..Default::default()
    };
    env.params
        .insert("Recipient".into(), Value::Str(recipient.to_string()));
    env.params.insert("Amount".into(), Value::Str("1000".into()));
    env.signature = hex::encode(key.sign(env.for_sign().as_bytes()));

    let result = engine.execute(&env).await.unwrap();
    assert!(result.block_id > 0, "{:?}", result);

    let mut tx = datastore.begin().await.unwrap();
    assert_eq!(tx.count("rollback_tx").await.unwrap(), 0);
    tx.rollback().await.unwrap();
}

#[tokio::test]
async fn co_signature_spec_is_enforced() {
    let world = build_world("0").await;

    let mut tx = world.datastore.begin().await.unwrap();
    let spec = r#"{"forsign":"","field":"Signature2","title":"co-sign","params":[{"name":"Recipient","text":"recipient"}]}"#;
    let id = tx.next_id("1_signatures").await.unwrap();
    tx.insert(
        "1_signatures",
        &row(&[
            ("id", Value::Int(id)),
            ("name", Value::Str("TransferMoney".into())),
            ("value", Value::Str(spec.into())),
            ("conditions", Value::Str("true".into())),
        ]),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let recipient = world.recipient.to_string();
    let mut env = signed_envelope(
        &world,
        "TransferMoney",
        "10000",
        &[("Recipient", &recipient), ("Amount", "1000")],
    );

    // no co-signature yet
    let err = world.engine.validate_signatures(&env).await.unwrap_err();
    assert_eq!(err.kind(), "IncorrectSignature");

    // append the expected nested forsign signature
    let nested = format!(
        "{},{},{}",
        env.header.time as u64, env.header.key_id as u64, recipient
    );
    env.params.insert(
        "Signature2".into(),
        Value::Str(hex::encode(world.key.sign(nested.as_bytes()))),
    );
    assert!(world.engine.validate_signatures(&env).await.is_ok());
}
