//! Wallet balance endpoint

use axum::{
    extract::{Path, Query, State},
    Json,
};
use genesis_core::{convert, tables, Value};
use genesis_db::SelectQuery;

use crate::dto::{BalanceResponse, EcosystemQuery};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `GET /balance/:wallet?ecosystem=N` → raw amount and the money form.
pub async fn balance(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
    Query(query): Query<EcosystemQuery>,
) -> ApiResult<Json<BalanceResponse>> {
    let key_id = convert::string_to_address(&wallet);
    if key_id == 0 {
        return Err(ApiError::BadRequest(format!("invalid wallet {}", wallet)));
    }
    let ecosystem = query.ecosystem.unwrap_or(genesis_core::FIRST_ECOSYSTEM_ID);

    let datastore = state.engine.datastore();
    let mut tx = datastore
        .begin()
        .await
        .map_err(|e| ApiError::Engine(e.into()))?;
    let rows = tx
        .select(
            &SelectQuery::new(tables::keys(ecosystem))
                .columns(&["amount"])
                .filter("id", Value::Int(key_id))
                .limit(1),
        )
        .await
        .map_err(|e| ApiError::Engine(e.into()))?;
    tx.rollback().await.map_err(|e| ApiError::Engine(e.into()))?;

    let amount = rows
        .first()
        .and_then(|row| row.get("amount"))
        .map(|v| v.to_display())
        .unwrap_or_else(|| "0".to_string());

    Ok(Json(BalanceResponse {
        money: convert::money_display(&amount),
        amount,
    }))
}
