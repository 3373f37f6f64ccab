//! Genesis HTTP API
//!
//! The external collaborator surface over the execution engine:
//! login (nonce + Ed25519 signature), transaction submission, status
//! polling, balances and avatars. Everything except `getuid` and
//! `login` sits behind JWT bearer auth.

pub mod auth;
pub mod dto;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use server::{create_server, run_server, start_background_server};
pub use state::{ApiConfig, AppState};
