//! Login nonce endpoint

use axum::{extract::State, Json};
use uuid::Uuid;

use crate::auth;
use crate::dto::UidResponse;
use crate::error::ApiResult;
use crate::state::AppState;

/// `GET /getuid` → a fresh nonce and the token that carries it.
pub async fn get_uid(State(state): State<AppState>) -> ApiResult<Json<UidResponse>> {
    let uid = Uuid::new_v4().simple().to_string();
    let token = auth::issue_uid_token(&state.jwt_secret, &uid)?;
    Ok(Json(UidResponse { uid, token }))
}
