//! Transaction status polling

use axum::{
    extract::{Path, State},
    Json,
};
use genesis_core::{tables, Value};
use genesis_db::SelectQuery;

use crate::dto::{TxStatusMessage, TxStatusResponse};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `GET /txstatus/:hash` → `{block_id, result}` once committed,
/// `{message}` on failure, empty while pending.
pub async fn tx_status(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> ApiResult<Json<TxStatusResponse>> {
    let datastore = state.engine.datastore();
    let mut tx = datastore
        .begin()
        .await
        .map_err(|e| ApiError::Engine(e.into()))?;
    let rows = tx
        .select(
            &SelectQuery::new(tables::TRANSACTIONS_STATUS)
                .filter("hash", Value::Str(hash.clone()))
                .limit(1),
        )
        .await
        .map_err(|e| ApiError::Engine(e.into()))?;
    tx.rollback().await.map_err(|e| ApiError::Engine(e.into()))?;

    let row = rows
        .first()
        .ok_or_else(|| ApiError::NotFound(format!("transaction {}", hash)))?;

    let block_id = row
        .get("block_id")
        .map(|v| v.to_display())
        .unwrap_or_default();
    let error = row.get("error").map(|v| v.to_display()).unwrap_or_default();

    let response = if !block_id.is_empty() {
        TxStatusResponse {
            block_id: Some(block_id),
            result: Some(String::new()),
            message: None,
        }
    } else if !error.is_empty() {
        // stored as "Kind: message"
        let (kind, message) = match error.split_once(':') {
            Some((kind, message)) => (kind.trim().to_string(), message.trim().to_string()),
            None => ("Error".to_string(), error),
        };
        TxStatusResponse {
            block_id: None,
            result: Some(kind.clone()),
            message: Some(TxStatusMessage {
                kind,
                error: message,
            }),
        }
    } else {
        TxStatusResponse {
            block_id: None,
            result: None,
            message: None,
        }
    };
    Ok(Json(response))
}
