//! Signature login
//!
//! The client signs `NONCE_SALT + uid` with its private key; a valid
//! signature upgrades the nonce token to a session token and binds the
//! public key to its wallet on first use.

use axum::{extract::State, Extension, Form, Json};
use genesis_core::{tables, Value, NONCE_SALT};
use genesis_db::{row, SelectQuery};
use tracing::info;

use crate::auth::{self, Claims};
use crate::dto::{LoginForm, LoginResponse};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `POST /login` with `pubkey`, `signature`, `ecosystem`.
pub async fn login(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Form(form): Form<LoginForm>,
) -> ApiResult<Json<LoginResponse>> {
    let uid = claims
        .uid
        .ok_or_else(|| ApiError::Unauthorized("uid token required".to_string()))?;
    let ecosystem = form.ecosystem.unwrap_or(genesis_core::FIRST_ECOSYSTEM_ID);

    let pub_bytes =
        hex::decode(form.pubkey.trim()).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let sig_bytes =
        hex::decode(form.signature.trim()).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let message = format!("{}{}", NONCE_SALT, uid);
    if !genesis_crypto::verify(&pub_bytes, message.as_bytes(), &sig_bytes) {
        return Err(ApiError::Unauthorized("invalid signature".to_string()));
    }

    let key_id = genesis_crypto::address(&pub_bytes);

    // bind the key on first login
    let datastore = state.engine.datastore();
    let mut tx = datastore.begin().await.map_err(|e| ApiError::Engine(e.into()))?;
    let keys_table = tables::keys(ecosystem);
    let rows = tx
        .select(
            &SelectQuery::new(keys_table.as_str())
                .columns(&["pub"])
                .filter("id", Value::Int(key_id))
                .limit(1),
        )
        .await
        .map_err(|e| ApiError::Engine(e.into()))?;
    if rows.is_empty() {
        tx.insert(
            &keys_table,
            &row(&[
                ("id", Value::Int(key_id)),
                ("pub", Value::Str(hex::encode(&pub_bytes))),
                ("amount", Value::Str("0".into())),
            ]),
        )
        .await
        .map_err(|e| ApiError::Engine(e.into()))?;
    }
    tx.commit().await.map_err(|e| ApiError::Engine(e.into()))?;

    let token = auth::issue_session_token(&state.jwt_secret, key_id, ecosystem)?;
    info!(key_id, ecosystem, "login");
    Ok(Json(LoginResponse {
        token,
        ecosystem_id: ecosystem.to_string(),
        key_id: key_id.to_string(),
        address: key_id.to_string(),
    }))
}
