//! Genesis Core - shared types for the smart-contract execution engine
//!
//! This crate provides the types every other engine crate builds on:
//! - Chain-observable error kinds ([`error::EngineError`])
//! - The dynamic [`value::Value`] type contract data flows through,
//!   with centralised coercion rules
//! - Wallet-address and money formatting helpers ([`convert`])
//! - Engine-wide constants and logging conventions

pub mod constants;
pub mod convert;
pub mod error;
pub mod logging;
pub mod value;

pub use constants::*;
pub use error::{EngineError, EngineResult};
pub use value::Value;
