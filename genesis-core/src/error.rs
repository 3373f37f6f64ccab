//! Engine error kinds
//!
//! Every failure that can surface to an operator or be observed on chain
//! carries one of these kinds. Host functions and the state-access layer
//! construct them directly; crate-local errors convert in at the seams.

use thiserror::Error;

/// Chain-observable engine errors.
///
/// The kind string (see [`EngineError::kind`]) is what `txstatus` and the
/// structured logs report; the message is the human-readable part.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("JSON unmarshall error: {0}")]
    JsonUnmarshall(String),

    #[error("JSON marshall error: {0}")]
    JsonMarshall(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("DB error: {0}")]
    Db(String),

    #[error("{0} has not been found")]
    NotFound(String),

    #[error("Empty object: {0}")]
    EmptyObject(String),

    #[error("Invalid object: {0}")]
    InvalidObject(String),

    #[error("Invalid value")]
    InvalidValue,

    #[error("Access denied")]
    AccessDenied,

    #[error("{0}")]
    IncorrectCallingContract(String),

    #[error("Eval error: {0}")]
    Eval(String),

    #[error("Out of fuel")]
    OutOfFuel,

    #[error("incorrect signature {0}")]
    IncorrectSignature(String),

    #[error("Contract {0} has not been found")]
    ContractNotFound(String),
}

impl EngineError {
    /// Stable kind tag used in `txstatus` results and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Conversion(_) => "ConversionError",
            Self::JsonUnmarshall(_) => "JSONUnmarshallError",
            Self::JsonMarshall(_) => "JSONMarshallError",
            Self::Crypto(_) => "CryptoError",
            Self::Db(_) => "DBError",
            Self::NotFound(_) => "NotFound",
            Self::EmptyObject(_) => "EmptyObject",
            Self::InvalidObject(_) => "InvalidObject",
            Self::InvalidValue => "InvalidValue",
            Self::AccessDenied => "AccessDenied",
            Self::IncorrectCallingContract(_) => "IncorrectCallingContract",
            Self::Eval(_) => "EvalError",
            Self::OutOfFuel => "OutOfFuel",
            Self::IncorrectSignature(_) => "IncorrectSignature",
            Self::ContractNotFound(_) => "ContractNotFound",
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        // serde_json does not distinguish directions; callers that marshal
        // use EngineError::JsonMarshall explicitly.
        Self::JsonUnmarshall(err.to_string())
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Trims a DB driver message at the first '(' so internals never reach
/// a chain-observable result string.
pub fn trim_db_error(msg: &str) -> String {
    match msg.find('(') {
        Some(off) => msg[..off].trim().to_string(),
        None => msg.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_are_stable() {
        assert_eq!(EngineError::OutOfFuel.kind(), "OutOfFuel");
        assert_eq!(EngineError::InvalidValue.kind(), "InvalidValue");
        assert_eq!(
            EngineError::IncorrectCallingContract("x".into()).kind(),
            "IncorrectCallingContract"
        );
        assert_eq!(
            EngineError::Conversion("bad int".into()).kind(),
            "ConversionError"
        );
    }

    #[test]
    fn not_found_message_matches_surface_form() {
        let err = EngineError::NotFound("Parameter gap_between_blocks".into());
        assert_eq!(
            err.to_string(),
            "Parameter gap_between_blocks has not been found"
        );
    }

    #[test]
    fn trims_driver_details() {
        assert_eq!(
            trim_db_error("duplicate key value (SQLSTATE 23505)"),
            "duplicate key value"
        );
        assert_eq!(trim_db_error("plain message"), "plain message");
    }
}
