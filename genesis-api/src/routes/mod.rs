//! Route wiring

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use genesis_core::API_PATH;

use crate::auth;
use crate::state::AppState;

pub mod avatar;
pub mod balance;
pub mod login;
pub mod sendtx;
pub mod txstatus;
pub mod uid;

/// Builds the `/api/v2` router.
pub fn create_router(state: AppState) -> Router {
    let public = Router::new().route("/getuid", get(uid::get_uid));

    let login = Router::new()
        .route("/login", post(login::login))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_uid,
        ));

    let session = Router::new()
        .route("/txstatus/:hash", get(txstatus::tx_status))
        .route("/sendTx", post(sendtx::send_tx))
        .route("/balance/:wallet", get(balance::balance))
        .route("/avatar/:key", get(avatar::avatar))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    Router::new()
        .nest(API_PATH, public.merge(login).merge(session))
        .with_state(state)
}
