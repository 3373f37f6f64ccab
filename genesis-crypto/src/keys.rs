//! Ed25519 key wrappers

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;

use crate::error::{CryptoError, CryptoResult};

/// An Ed25519 key pair for signing transaction envelopes.
#[derive(Clone)]
pub struct GenesisSigningKey {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl GenesisSigningKey {
    /// Generate a new random signing key
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Create from existing secret key bytes (32 bytes)
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(bytes);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Create from a hex-encoded secret key
    pub fn from_hex(hex_str: &str) -> CryptoResult<Self> {
        let bytes =
            hex::decode(hex_str.trim()).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self::from_bytes(&arr))
    }

    /// Raw public key bytes (32 bytes)
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Hex-encoded public key
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key.to_bytes())
    }

    /// Hex-encoded secret key
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Wallet id this key controls.
    pub fn wallet_id(&self) -> i64 {
        crate::address(&self.public_key_bytes())
    }

    /// Sign a message, returning the raw 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }
}

/// An Ed25519 public key for signature verification.
#[derive(Clone, Debug)]
pub struct GenesisVerifyingKey {
    verifying_key: VerifyingKey,
}

impl GenesisVerifyingKey {
    /// Create from raw public key bytes (32 bytes)
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        let verifying_key = VerifyingKey::from_bytes(&arr)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Self { verifying_key })
    }

    /// Create from a hex-encoded public key
    pub fn from_hex(hex_str: &str) -> CryptoResult<Self> {
        let bytes =
            hex::decode(hex_str.trim()).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], sig: &[u8]) -> bool {
        let sig = match Signature::from_slice(sig) {
            Ok(s) => s,
            Err(_) => return false,
        };
        self.verifying_key.verify(message, &sig).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let key = GenesisSigningKey::generate();
        let restored = GenesisSigningKey::from_hex(&key.private_key_hex()).unwrap();
        assert_eq!(restored.public_key_hex(), key.public_key_hex());
        assert_eq!(restored.wallet_id(), key.wallet_id());
    }

    #[test]
    fn rejects_wrong_length_keys() {
        assert!(matches!(
            GenesisSigningKey::from_hex("abcd"),
            Err(CryptoError::InvalidKeyLength { .. })
        ));
        assert!(GenesisVerifyingKey::from_bytes(&[0u8; 16]).is_err());
    }

    #[test]
    fn verifying_key_checks_signatures() {
        let key = GenesisSigningKey::generate();
        let vk = GenesisVerifyingKey::from_hex(&key.public_key_hex()).unwrap();
        let sig = key.sign(b"payload");
        assert!(vk.verify(b"payload", &sig));
        assert!(!vk.verify(b"tampered", &sig));
    }
}
