//! Genesis Cryptographic Primitives
//!
//! Ed25519 signing and verification, SHA-256 hashing, and wallet address
//! derivation. Everything here is deterministic: the same inputs always
//! produce the same outputs, which the envelope's signature round-trip
//! property depends on.

pub mod error;
pub mod keys;

pub use error::{CryptoError, CryptoResult};
pub use keys::{GenesisSigningKey, GenesisVerifyingKey};

use sha2::{Digest, Sha256};

/// SHA-256 digest of the input.
pub fn hash(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hex-encoded SHA-256 digest, the `Sha256` host-function form.
pub fn hash_hex(data: &[u8]) -> String {
    hex::encode(hash(data))
}

/// Derives the wallet id for a public key: the first eight bytes of
/// SHA-256(pubkey) read big-endian, reinterpreted as i64.
pub fn address(pubkey: &[u8]) -> i64 {
    let digest = hash(pubkey);
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(raw) as i64
}

/// Address of a hex-encoded public key; 0 when the hex does not decode.
pub fn address_from_hex(hexkey: &str) -> i64 {
    match hex::decode(hexkey) {
        Ok(pub_bytes) => address(&pub_bytes),
        Err(_) => 0,
    }
}

/// Signs `msg` with a hex-encoded private key.
pub fn sign(private_hex: &str, msg: &[u8]) -> CryptoResult<Vec<u8>> {
    let key = GenesisSigningKey::from_hex(private_hex)?;
    Ok(key.sign(msg))
}

/// Verifies `sig` over `msg` against a raw public key. Malformed keys or
/// signatures verify as false rather than erroring; the caller only needs
/// the boolean.
pub fn verify(pubkey: &[u8], msg: &[u8], sig: &[u8]) -> bool {
    match GenesisVerifyingKey::from_bytes(pubkey) {
        Ok(key) => key.verify(msg, sig),
        Err(_) => false,
    }
}

/// Derives the hex public key for a hex private key.
pub fn private_to_public(private_hex: &str) -> CryptoResult<String> {
    let key = GenesisSigningKey::from_hex(private_hex)?;
    Ok(key.public_key_hex())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash(b"genesis"), hash(b"genesis"));
        assert_ne!(hash(b"genesis"), hash(b"genesi"));
        assert_eq!(hash_hex(b"").len(), 64);
    }

    #[test]
    fn address_is_deterministic_and_key_dependent() {
        let a = GenesisSigningKey::generate();
        let b = GenesisSigningKey::generate();
        let pub_a = a.public_key_bytes();
        assert_eq!(address(&pub_a), address(&pub_a));
        assert_ne!(address(&pub_a), address(&b.public_key_bytes()));
    }

    #[test]
    fn sign_verify_round_trip() {
        let key = GenesisSigningKey::generate();
        let msg = b"1,42,1700000000,77,1,1,1000,,0";
        let sig = key.sign(msg);
        assert!(verify(&key.public_key_bytes(), msg, &sig));
        assert!(!verify(&key.public_key_bytes(), b"other", &sig));
    }

    #[test]
    fn verify_rejects_garbage_inputs() {
        assert!(!verify(b"short", b"msg", b"sig"));
        let key = GenesisSigningKey::generate();
        assert!(!verify(&key.public_key_bytes(), b"msg", b"not a signature"));
    }

    #[test]
    fn private_to_public_matches_keypair() {
        let key = GenesisSigningKey::generate();
        let private_hex = key.private_key_hex();
        assert_eq!(private_to_public(&private_hex).unwrap(), key.public_key_hex());
    }
}
