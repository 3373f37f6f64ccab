//! Compilation errors
//!
//! Lexical and syntactic failures are fatal to compilation and carry a
//! 1-based line and column. Compile errors convert into the engine's
//! `EvalError` kind at the envelope seam.

use genesis_core::error::EngineError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("{line}:{column}: {message}")]
    Lex {
        line: u32,
        column: u32,
        message: String,
    },

    #[error("{line}:{column}: {message}")]
    Parse {
        line: u32,
        column: u32,
        message: String,
    },

    #[error("unknown identifier {0}")]
    UndefinedIdent(String),

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("conditions must return boolean")]
    ConditionsNotBool,

    #[error("contract {0} already exists")]
    DuplicateContract(String),

    #[error("duplicate parameter {0}")]
    DuplicateParam(String),

    #[error("{0}")]
    Compile(String),
}

pub type ScriptResult<T> = Result<T, ScriptError>;

impl From<ScriptError> for EngineError {
    fn from(err: ScriptError) -> Self {
        EngineError::Eval(err.to_string())
    }
}
