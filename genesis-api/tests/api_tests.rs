//! API handler scenarios: the login round-trip and the avatar fetch.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::{Extension, Form};
use genesis_api::auth;
use genesis_api::dto::{EcosystemQuery, LoginForm, SendTxForm};
use genesis_api::routes::{avatar, balance, login, sendtx, txstatus, uid};
use genesis_api::AppState;
use genesis_core::NONCE_SALT;
use genesis_crypto::GenesisSigningKey;
use genesis_db::{row, seed, Datastore, MemoryDatastore};
use genesis_smart::{ContractEngine, ExecPolicy};

async fn build_state() -> (AppState, GenesisSigningKey) {
    let datastore = MemoryDatastore::new();
    datastore.init_schema().await.unwrap();

    let key = GenesisSigningKey::generate();
    let founder = key.wallet_id();

    let mut tx = datastore.begin().await.unwrap();
    seed::init_data(tx.as_mut(), founder, &key.public_key_hex())
        .await
        .unwrap();
    tx.update(
        "1_keys",
        &[("id".to_string(), genesis_core::Value::Int(founder))],
        &row(&[("amount", genesis_core::Value::Str("123450000000000000000".into()))]),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let engine = ContractEngine::new(Arc::new(datastore), ExecPolicy::consensus())
        .await
        .unwrap();
    (
        AppState::new(Arc::new(engine), "api-test-secret-0123456789abcdef"),
        key,
    )
}

#[tokio::test]
async fn login_round_trip() {
    let (state, key) = build_state().await;

    // S1: fetch a nonce, sign it, log in
    let uid_resp = uid::get_uid(State(state.clone())).await.unwrap().0;
    assert!(!uid_resp.uid.is_empty());

    let claims = auth::validate_token(&state.jwt_secret, &uid_resp.token).unwrap();
    assert_eq!(claims.uid.as_deref(), Some(uid_resp.uid.as_str()));

    let signature = key.sign(format!("{}{}", NONCE_SALT, uid_resp.uid).as_bytes());
    let form = LoginForm {
        pubkey: key.public_key_hex(),
        signature: hex::encode(signature),
        ecosystem: Some(1),
    };
    let login_resp = login::login(State(state.clone()), Extension(claims.clone()), Form(form))
        .await
        .unwrap()
        .0;

    assert_eq!(login_resp.address, key.wallet_id().to_string());
    let session = auth::validate_token(&state.jwt_secret, &login_resp.token).unwrap();
    assert_eq!(session.key_id, Some(key.wallet_id()));

    // a wrong signature is rejected
    let bad = LoginForm {
        pubkey: key.public_key_hex(),
        signature: hex::encode(key.sign(b"something else")),
        ecosystem: Some(1),
    };
    assert!(login::login(State(state), Extension(claims), Form(bad))
        .await
        .is_err());
}

#[tokio::test]
async fn avatar_returns_png() {
    let (state, key) = build_state().await;

    // S2: the avatar body is a non-empty png even without a profile
    let result = avatar::avatar(
        State(state),
        Path(key.wallet_id().to_string()),
    )
    .await
    .unwrap();
    let response = result.into_response();
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(!body.is_empty());
    // png magic
    assert_eq!(&body[..4], &[0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn balance_reports_amount_and_money() {
    let (state, key) = build_state().await;

    let response = balance::balance(
        State(state),
        Path(key.wallet_id().to_string()),
        Query(EcosystemQuery { ecosystem: Some(1) }),
    )
    .await
    .unwrap()
    .0;
    assert_eq!(response.amount, "123450000000000000000");
    assert_eq!(response.money, "123.45");
}

#[tokio::test]
async fn send_tx_then_poll_status() {
    let (state, key) = build_state().await;

    let ids = state
        .engine
        .install_source(
            1,
            key.wallet_id(),
            "contract Touch { action { return \"done\" } }",
        )
        .await
        .unwrap();

    let claims = auth::Claims {
        uid: None,
        key_id: Some(key.wallet_id()),
        ecosystem_id: 1,
        exp: i64::MAX,
        iat: 0,
    };

    let mut fields = std::collections::HashMap::new();
    fields.insert("type".to_string(), ids[0].to_string());
    fields.insert("time".to_string(), "1700000000".to_string());
    fields.insert("request_id".to_string(), "req-7".to_string());
    fields.insert("max_sum".to_string(), "10000".to_string());
    fields.insert("pubkey".to_string(), key.public_key_hex());

    // sign the canonical envelope string the handler will rebuild
    let forsign = format!(
        "req-7,{},1700000000,{},1,1,10000,,0",
        ids[0],
        key.wallet_id()
    );
    fields.insert(
        "signature".to_string(),
        hex::encode(key.sign(forsign.as_bytes())),
    );

    let sent = sendtx::send_tx(
        State(state.clone()),
        Extension(claims),
        Form(SendTxForm { fields }),
    )
    .await
    .unwrap()
    .0;
    assert_eq!(sent.result, "done");
    let block = sent.block_id.expect("transaction should commit");

    let status = txstatus::tx_status(State(state), Path(sent.hash))
        .await
        .unwrap()
        .0;
    assert_eq!(status.block_id, Some(block));
    assert!(status.message.is_none());
}

#[tokio::test]
async fn balance_rejects_garbage_wallets() {
    let (state, _) = build_state().await;
    assert!(balance::balance(
        State(state),
        Path("not-a-wallet".into()),
        Query(EcosystemQuery { ecosystem: None }),
    )
    .await
    .is_err());
}
