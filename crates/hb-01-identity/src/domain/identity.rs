//! # Identity
//!
//! Holds the node's private signing key and its derived address.
//!
//! ## Security Notes
//!
//! - The secret key never leaves this type except through
//!   [`Identity::secret_hex`], which returns a zeroizing buffer.
//! - `Debug` output redacts the key.

use super::errors::IdentityError;
use super::signature::Signature;
use k256::ecdsa::{SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};
use shared_types::{Address, ADDRESS_LEN};
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

/// Prefix prepended to every signed message before hashing.
const SIGNED_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// A node's signing identity.
///
/// The address is computed once at construction and never changes.
#[derive(Clone)]
pub struct Identity {
    signing_key: SigningKey,
    address: Address,
}

impl Identity {
    /// Generate a fresh random identity.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand::thread_rng()))
    }

    /// Restore an identity from raw 32-byte secret key material.
    pub fn from_secret_bytes(secret: &[u8]) -> Result<Self, IdentityError> {
        let signing_key = SigningKey::from_slice(secret).map_err(|_| IdentityError::InvalidSecretKey)?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// Restore an identity from a hex secret, with or without `0x`.
    pub fn from_secret_hex(secret: &str) -> Result<Self, IdentityError> {
        let digits = secret.strip_prefix("0x").unwrap_or(secret);
        let mut bytes = [0u8; 32];
        let decoded = hex::decode_to_slice(digits, &mut bytes);
        let identity = decoded
            .map_err(|_| IdentityError::InvalidSecretKey)
            .and_then(|()| Self::from_secret_bytes(&bytes));
        bytes.zeroize();
        identity
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = address_from_pubkey(signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    /// Stable public address of this identity.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Hex encoding of the secret key, for persisting the identity.
    pub fn secret_hex(&self) -> Zeroizing<String> {
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        let encoded = Zeroizing::new(format!("0x{}", hex::encode(bytes)));
        bytes.zeroize();
        encoded
    }

    /// Sign a message string.
    pub fn sign(&self, message: &str) -> Result<Signature, IdentityError> {
        let digest = hash_message(message);
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|_| IdentityError::SigningFailed)?;
        Ok(Signature::from_parts(&signature, recovery_id))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.address)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Keccak256 hash function.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Digest that is actually signed for a message string.
pub fn hash_message(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(SIGNED_MESSAGE_PREFIX.as_bytes());
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

/// Derive the address of a public key.
pub fn address_from_pubkey(public_key: &VerifyingKey) -> Address {
    let encoded = public_key.to_encoded_point(false);
    // Skip the 0x04 uncompressed-point tag.
    let hash = keccak256(&encoded.as_bytes()[1..]);
    let mut address = [0u8; ADDRESS_LEN];
    address.copy_from_slice(&hash[32 - ADDRESS_LEN..]);
    Address::from_bytes(address)
}
