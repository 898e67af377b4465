//! # Recoverable Signatures
//!
//! A signature is `r || s || v`, 65 bytes, rendered as `0x`-prefixed hex with
//! `v = 27 + recovery_id`. Verification recovers the public key from the
//! signature and compares the derived address with the claimed one, so the
//! verifier never needs the public key itself.
//!
//! ## Security Notes
//!
//! - High-S signatures are rejected before recovery.
//! - Address comparison is constant-time (`subtle`).

use super::errors::IdentityError;
use super::identity::{address_from_pubkey, hash_message};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use serde::{Deserialize, Serialize};
use shared_types::Address;
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Offset added to the recovery id in the serialized form.
const RECOVERY_OFFSET: u8 = 27;

/// Serialized signature length in bytes.
pub const SIGNATURE_LEN: usize = 65;

/// Signature bytes plus recovery discriminant.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    r: [u8; 32],
    s: [u8; 32],
    /// Recovery id, 0 or 1.
    v: u8,
}

impl Signature {
    pub(crate) fn from_parts(signature: &EcdsaSignature, recovery_id: RecoveryId) -> Self {
        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Self {
            r,
            s,
            v: recovery_id.to_byte(),
        }
    }

    /// Parse from 65 raw bytes. Accepts `v` as 0, 1, 27 or 28.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(IdentityError::InvalidFormat);
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        let v = parse_recovery_id(bytes[64])?.to_byte();
        Ok(Self { r, s, v })
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        let mut out = [0u8; SIGNATURE_LEN];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v + RECOVERY_OFFSET;
        out
    }

    /// Recovery discriminant (0 or 1).
    pub fn recovery_id(&self) -> u8 {
        self.v
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_bytes()))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

impl FromStr for Signature {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; SIGNATURE_LEN];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| IdentityError::InvalidFormat)?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Recover the address that produced `signature` over `message`.
pub fn recover(message: &str, signature: &Signature) -> Result<Address, IdentityError> {
    let recovery_id = parse_recovery_id(signature.v)?;

    let mut sig_bytes = [0u8; 64];
    sig_bytes[..32].copy_from_slice(&signature.r);
    sig_bytes[32..].copy_from_slice(&signature.s);
    let parsed = EcdsaSignature::from_slice(&sig_bytes);
    sig_bytes.zeroize();
    let sig = parsed.map_err(|_| IdentityError::InvalidFormat)?;

    if sig.normalize_s().is_some() {
        return Err(IdentityError::MalleableSignature);
    }

    let digest = hash_message(message);
    let recovered = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|_| IdentityError::RecoveryFailed)?;
    Ok(address_from_pubkey(&recovered))
}

/// Check that `signature` over `message` was produced by `address`.
pub fn verify(message: &str, signature: &Signature, address: &Address) -> bool {
    match recover(message, signature) {
        Ok(recovered) => bool::from(recovered.as_bytes().ct_eq(address.as_bytes())),
        Err(e) => {
            tracing::debug!(error = %e, "Signature recovery failed");
            false
        }
    }
}

fn parse_recovery_id(v: u8) -> Result<RecoveryId, IdentityError> {
    let normalized = match v {
        0 | 1 => v,
        27 | 28 => v - RECOVERY_OFFSET,
        _ => return Err(IdentityError::InvalidRecoveryId(v)),
    };
    RecoveryId::from_byte(normalized).ok_or(IdentityError::InvalidRecoveryId(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::Identity;

    #[test]
    fn test_sign_then_verify() {
        let identity = Identity::generate();
        let signature = identity.sign("I am ws://127.0.0.1:3000").unwrap();
        assert!(verify("I am ws://127.0.0.1:3000", &signature, &identity.address()));
    }

    #[test]
    fn test_wrong_message_fails() {
        let identity = Identity::generate();
        let signature = identity.sign("I am ws://127.0.0.1:3000").unwrap();
        assert!(!verify("I am ws://127.0.0.1:3001", &signature, &identity.address()));
    }

    #[test]
    fn test_wrong_address_fails() {
        let identity = Identity::generate();
        let other = Identity::generate();
        let signature = identity.sign("hello").unwrap();
        assert!(!verify("hello", &signature, &other.address()));
    }

    #[test]
    fn test_flipped_recovery_id_fails() {
        let identity = Identity::generate();
        let mut signature = identity.sign("hello").unwrap();
        signature.v ^= 1;
        assert!(!verify("hello", &signature, &identity.address()));
    }

    #[test]
    fn test_string_form_roundtrip() {
        let identity = Identity::generate();
        let signature = identity.sign("hello").unwrap();
        let encoded = signature.to_string();
        assert_eq!(encoded.len(), 2 + SIGNATURE_LEN * 2);
        assert!(encoded.ends_with("1b") || encoded.ends_with("1c"));
        let decoded: Signature = encoded.parse().unwrap();
        assert_eq!(decoded, signature);
    }

    #[test]
    fn test_high_s_rejected() {
        let identity = Identity::generate();
        let signature = identity.sign("hello").unwrap();
        let sig = EcdsaSignature::from_slice(&signature.to_bytes()[..64]).unwrap();
        // Negate s to obtain the high-S twin of a valid signature.
        let high = EcdsaSignature::from_scalars(sig.r(), -*sig.s()).unwrap();
        let twin = Signature::from_parts(&high, RecoveryId::from_byte(signature.v ^ 1).unwrap());
        assert_eq!(recover("hello", &twin), Err(IdentityError::MalleableSignature));
    }

    #[test]
    fn test_parse_recovery_id() {
        assert!(parse_recovery_id(0).is_ok());
        assert!(parse_recovery_id(28).is_ok());
        assert_eq!(parse_recovery_id(2).unwrap_err(), IdentityError::InvalidRecoveryId(2));
        assert!("0x1234".parse::<Signature>().is_err());
    }
}
