//! Transaction submission
//!
//! Accepts a signed envelope as an urlencoded form: reserved fields
//! name the envelope, every other field becomes a contract parameter.
//! Execution is synchronous; the response carries the assigned block id
//! or the failure kind, and `txstatus` serves the same outcome later.

use std::collections::HashMap;

use axum::{extract::State, Extension, Form, Json};
use genesis_core::Value;
use genesis_smart::{TxEnvelope, TxHeader};
use tracing::info;

use crate::auth::Claims;
use crate::dto::{SendTxForm, SendTxResponse};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const RESERVED: &[&str] = &[
    "type",
    "time",
    "request_id",
    "token_ecosystem",
    "max_sum",
    "payover",
    "signed_by",
    "pubkey",
    "signature",
];

/// `POST /sendTx` (form-encoded).
pub async fn send_tx(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Form(form): Form<SendTxForm>,
) -> ApiResult<Json<SendTxResponse>> {
    let env = envelope_from_form(&claims, &form.fields)?;
    let result = state.engine.execute(&env).await?;

    info!(hash = %result.hash, block_id = result.block_id, "sendTx");
    Ok(Json(SendTxResponse {
        hash: result.hash,
        block_id: (result.block_id > 0).then(|| result.block_id.to_string()),
        result: result.result,
    }))
}

fn envelope_from_form(
    claims: &Claims,
    fields: &HashMap<String, String>,
) -> Result<TxEnvelope, ApiError> {
    let get = |name: &str| fields.get(name).cloned().unwrap_or_default();
    let get_int = |name: &str| get(name).trim().parse::<i64>().unwrap_or(0);

    let tx_type = get_int("type");
    if tx_type == 0 {
        return Err(ApiError::BadRequest("missing contract type".to_string()));
    }
    let key_id = claims
        .key_id
        .ok_or_else(|| ApiError::Unauthorized("login required".to_string()))?;

    let mut env = TxEnvelope {
        header: TxHeader {
            tx_type,
            time: get_int("time"),
            key_id,
            ecosystem_id: claims.ecosystem_id,
        },
        request_id: get("request_id"),
        token_ecosystem: match get_int("token_ecosystem") {
            0 => genesis_core::FIRST_ECOSYSTEM_ID,
            other => other,
        },
        max_sum: get("max_sum"),
        pay_over: get("payover"),
        signed_by: get_int("signed_by"),
        public_key: get("pubkey"),
        signature: get("signature"),
        params: HashMap::new(),
    };

    for (name, value) in fields {
        if RESERVED.contains(&name.as_str()) {
            continue;
        }
        env.params
            .insert(name.clone(), Value::Str(value.clone()));
    }
    Ok(env)
}
