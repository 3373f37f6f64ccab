//! Crypto extend functions

use genesis_core::convert;
use genesis_core::error::{EngineError, EngineResult};
use genesis_core::Value;

use super::{arg_int, arg_str};

/// Hex-encoded SHA-256 of the text.
pub fn sha256(args: &[Value]) -> EngineResult<Value> {
    let text = arg_str(args, 0, "Sha256")?;
    Ok(Value::Str(genesis_crypto::hash_hex(text.as_bytes())))
}

/// Wallet id for a hex public key; 0 when the hex does not decode.
pub fn pub_to_id(args: &[Value]) -> EngineResult<Value> {
    let hexkey = arg_str(args, 0, "PubToID")?;
    Ok(Value::Int(genesis_crypto::address_from_hex(&hexkey)))
}

pub fn hex_to_bytes(args: &[Value]) -> EngineResult<Value> {
    let hexdata = arg_str(args, 0, "HexToBytes")?;
    hex::decode(hexdata.trim())
        .map(Value::Bytes)
        .map_err(|e| EngineError::Conversion(e.to_string()))
}

pub fn address_to_id(args: &[Value]) -> EngineResult<Value> {
    let addr = arg_str(args, 0, "AddressToId")?;
    Ok(Value::Int(convert::string_to_address(&addr)))
}

pub fn id_to_address(args: &[Value]) -> EngineResult<Value> {
    let id = arg_int(args, 0, "IdToAddress")?;
    Ok(Value::Str(convert::address_to_string(id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hexes() {
        let out = sha256(&[Value::Str("text".into())]).unwrap().to_display();
        assert_eq!(out.len(), 64);
        assert!(out.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn address_round_trip() {
        let addr = id_to_address(&[Value::Int(-5)]).unwrap();
        let back = address_to_id(&[addr]).unwrap();
        assert_eq!(back, Value::Int(-5));
    }

    #[test]
    fn bad_hex_is_a_conversion_error() {
        assert!(matches!(
            hex_to_bytes(&[Value::Str("zz".into())]),
            Err(EngineError::Conversion(_))
        ));
        assert_eq!(
            pub_to_id(&[Value::Str("zz".into())]).unwrap(),
            Value::Int(0)
        );
    }
}
