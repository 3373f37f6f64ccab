//! Genesis Smart-Contract Runtime
//!
//! The execution side of the engine, layered over the script VM:
//! - [`context`] - the per-invocation `SmartContract` state and the
//!   execution policy (consensus vs VDE)
//! - [`extend`] - the closed library of host functions contracts call
//! - [`access`] - table naming and table/column permission checks
//! - [`dml`] - the reversible write path every mutation goes through
//! - [`rollback`] - the per-transaction journal and its LIFO replay
//! - [`syspar`] - the system-parameter cache and value domains
//! - [`envelope`] - transaction decoding, signature verification, fuel
//!   budgeting and the commit/rollback drive

pub mod access;
pub mod context;
pub mod dml;
pub mod envelope;
pub mod extend;
pub mod rollback;
pub mod syspar;

pub use context::{ExecPolicy, SmartContract};
pub use envelope::{ContractEngine, TxEnvelope, TxHeader, TxResult};
pub use syspar::SysParams;
