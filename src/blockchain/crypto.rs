use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use std::fmt;
use std::str::FromStr;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// Length in hex characters of every digest produced by [`digest`]
pub const DIGEST_LEN: usize = 64;

/// Hashes an ordered sequence of values into a hex SHA-256 digest.
///
/// Callers pass a tuple or slice; the values are encoded as a JSON array so
/// that field order is part of the preimage. Struct fields serialize in
/// declaration order, which keeps the result stable across calls.
pub fn digest<T: Serialize + ?Sized>(values: &T) -> Result<String, CryptoError> {
    let bytes = serde_json::to_vec(values).map_err(|e| CryptoError::EncodingError(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);

    Ok(hex::encode(hasher.finalize()))
}

/// Identity of a ledger participant (verifying key in base58 format)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Creates a new address from a public key
    pub fn from_public_key(public_key: &VerifyingKey) -> Self {
        let encoded = bs58::encode(public_key.as_bytes()).into_string();
        Address(encoded)
    }

    /// Converts the address back to the verifying key it encodes
    pub fn to_public_key(&self) -> Result<VerifyingKey, CryptoError> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let key_bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidPublicKey("Invalid public key length".to_string())
        })?;

        VerifyingKey::from_bytes(&key_bytes).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    /// Short form used in log lines
    pub fn short(&self) -> &str {
        let end = self.0.char_indices().nth(8).map_or(self.0.len(), |(i, _)| i);
        &self.0[..end]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = Address(s.to_string());

        // Only strings that decode to a usable verifying key are identities
        address.to_public_key()?;

        Ok(address)
    }
}

/// Represents a digital signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalSignature(pub String);

impl DigitalSignature {
    /// Creates a new digital signature from a signature
    pub fn from_signature(signature: &Signature) -> Self {
        let encoded = bs58::encode(signature.to_bytes()).into_string();
        DigitalSignature(encoded)
    }

    /// Converts the digital signature to a signature
    pub fn to_signature(&self) -> Result<Signature, CryptoError> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let signature_bytes: [u8; 64] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidSignature("Invalid signature length".to_string())
        })?;

        Ok(Signature::from_bytes(&signature_bytes))
    }
}

/// Verifies a signature against a message and public key.
///
/// Returns `Ok(false)` when the signature is well formed but does not match;
/// `Err` is reserved for signatures that cannot be decoded at all.
pub fn verify_signature(
    message: &[u8],
    signature: &DigitalSignature,
    public_key: &VerifyingKey,
) -> Result<bool, CryptoError> {
    let signature = signature.to_signature()?;

    Ok(public_key.verify(message, &signature).is_ok())
}
