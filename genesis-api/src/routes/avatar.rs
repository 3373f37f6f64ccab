//! Member avatar endpoint

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use genesis_core::{convert, tables, Value};
use genesis_db::SelectQuery;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Fallback avatar: a 1×1 transparent PNG.
const DEFAULT_AVATAR: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x62, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// `GET /avatar/:key` → `image/png` bytes from the member profile, or
/// the built-in placeholder.
pub async fn avatar(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let key_id = convert::string_to_address(&key);
    if key_id == 0 {
        return Err(ApiError::BadRequest(format!("invalid wallet {}", key)));
    }

    let datastore = state.engine.datastore();
    let mut tx = datastore
        .begin()
        .await
        .map_err(|e| ApiError::Engine(e.into()))?;
    let rows = tx
        .select(
            &SelectQuery::new(tables::members(genesis_core::FIRST_ECOSYSTEM_ID))
                .columns(&["avatar"])
                .filter("id", Value::Int(key_id))
                .limit(1),
        )
        .await
        .map_err(|e| ApiError::Engine(e.into()))?;
    tx.rollback().await.map_err(|e| ApiError::Engine(e.into()))?;

    let stored = rows
        .first()
        .and_then(|row| row.get("avatar"))
        .map(|v| v.to_display())
        .unwrap_or_default();

    // avatars are stored hex-encoded; fall back when unset or unreadable
    let bytes = if stored.is_empty() {
        DEFAULT_AVATAR.to_vec()
    } else {
        hex::decode(&stored).unwrap_or_else(|_| DEFAULT_AVATAR.to_vec())
    };

    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}
