//! Engine-wide constants

/// The system ecosystem that owns the global `1_*` tables.
pub const FIRST_ECOSYSTEM_ID: i64 = 1;

/// Maximum contract-to-contract call depth.
pub const DEFAULT_CALL_DEPTH: usize = 100;

/// Fractional digits of the native token; balances are stored as integer
/// strings scaled by 10^MONEY_DIGITS.
pub const MONEY_DIGITS: u32 = 18;

/// Default row limit for DBSelect when the caller passes 0.
pub const DB_SELECT_LIMIT: i64 = 25;

/// Hard cap on DBSelect row limits.
pub const DB_SELECT_MAX: i64 = 250;

/// Salt prepended to the login nonce before signing.
pub const NONCE_SALT: &str = "LOGIN";

/// HTTP API prefix.
pub const API_PATH: &str = "/api/v2";

/// Wall-clock budget for executing one transaction inside a block.
pub const DEFAULT_TX_WALL_CLOCK_MS: u64 = 1500;

/// Table names: the global tables of the system ecosystem, and the
/// per-ecosystem tables stamped out for each tenant.
pub mod tables {
    pub const ECOSYSTEMS: &str = "1_ecosystems";
    pub const SYSTEM_PARAMETERS: &str = "1_system_parameters";
    pub const TRANSACTIONS_STATUS: &str = "1_transactions_status";
    pub const ROLLBACK_TX: &str = "rollback_tx";
    pub const METRICS: &str = "1_metrics";

    pub fn contracts(ecosystem: i64) -> String {
        format!("{}_contracts", ecosystem)
    }

    pub fn keys(ecosystem: i64) -> String {
        format!("{}_keys", ecosystem)
    }

    pub fn members(ecosystem: i64) -> String {
        format!("{}_members", ecosystem)
    }

    pub fn pages(ecosystem: i64) -> String {
        format!("{}_pages", ecosystem)
    }

    pub fn menu(ecosystem: i64) -> String {
        format!("{}_menu", ecosystem)
    }

    pub fn languages(ecosystem: i64) -> String {
        format!("{}_languages", ecosystem)
    }

    pub fn parameters(ecosystem: i64) -> String {
        format!("{}_parameters", ecosystem)
    }

    /// The `N_tables` table holding an ecosystem's table definitions.
    pub fn definitions(ecosystem: i64) -> String {
        format!("{}_tables", ecosystem)
    }

    pub fn signatures(ecosystem: i64) -> String {
        format!("{}_signatures", ecosystem)
    }
}

/// Well-known system parameter names with constrained value domains.
pub mod syspar_names {
    pub const GAP_BETWEEN_BLOCKS: &str = "gap_between_blocks";
    pub const FUEL_RATE: &str = "fuel_rate";
    pub const COMMISSION_WALLET: &str = "commission_wallet";
    pub const COMMISSION_SIZE: &str = "commission_size";
    pub const FULL_NODES: &str = "full_nodes";
}
