//! Logging conventions
//!
//! All engine crates log through `tracing` with structured fields. Every
//! failure path carries `kind = %err.kind()` so operators can filter on
//! the chain-observable error kinds, matching what `txstatus` reports.

/// Standard log field names
pub mod fields {
    /// Transaction hash (hex)
    pub const TX_HASH: &str = "tx_hash";
    /// Contract name, `@N_Name` form
    pub const CONTRACT: &str = "contract";
    /// Ecosystem id
    pub const ECOSYSTEM: &str = "ecosystem";
    /// Wallet / key id
    pub const KEY_ID: &str = "key_id";
    /// Table touched by a state operation
    pub const TABLE: &str = "table";
    /// Fuel remaining or consumed
    pub const FUEL: &str = "fuel";
    /// Error kind tag
    pub const KIND: &str = "kind";
    /// Error message
    pub const ERROR: &str = "error";
    /// Block id
    pub const BLOCK_ID: &str = "block_id";
}
