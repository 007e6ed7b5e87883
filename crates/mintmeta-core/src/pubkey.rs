//! 32-byte account address with a base58 string form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Length of an address in bytes.
pub const PUBKEY_BYTES: usize = 32;

const MAX_SEEDS: usize = 16;
const MAX_SEED_LEN: usize = 32;
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Errors produced when parsing an address from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PubkeyError {
    #[error("invalid base58 address: {0}")]
    InvalidBase58(String),

    #[error("invalid address length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Address of an on-chain account.
///
/// Ordered, hashable and cheap to copy, so it doubles as a map key. The
/// base58 form produced by `Display` is the canonical string representation.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pubkey([u8; PUBKEY_BYTES]);

impl Pubkey {
    pub const fn new(bytes: [u8; PUBKEY_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(self) -> [u8; PUBKEY_BYTES] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; PUBKEY_BYTES] {
        &self.0
    }

    /// Build from a slice, failing unless it is exactly 32 bytes.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, PubkeyError> {
        let arr: [u8; PUBKEY_BYTES] = bytes
            .try_into()
            .map_err(|_| PubkeyError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Derive a program address from `seeds`, searching bump seeds from 255
    /// down until the hash falls off the ed25519 curve.
    ///
    /// Returns `None` if no bump produces a valid address or the seeds exceed
    /// the runtime limits.
    pub fn find_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Option<(Pubkey, u8)> {
        if seeds.len() >= MAX_SEEDS || seeds.iter().any(|s| s.len() > MAX_SEED_LEN) {
            return None;
        }
        for bump in (0..=u8::MAX).rev() {
            let mut hasher = Sha256::new();
            for seed in seeds {
                hasher.update(seed);
            }
            hasher.update([bump]);
            hasher.update(program_id.as_bytes());
            hasher.update(PDA_MARKER);
            let hash: [u8; PUBKEY_BYTES] = hasher.finalize().into();
            if !is_on_curve(&hash) {
                return Some((Pubkey(hash), bump));
            }
        }
        None
    }
}

fn is_on_curve(bytes: &[u8; PUBKEY_BYTES]) -> bool {
    ed25519_dalek::VerifyingKey::from_bytes(bytes).is_ok()
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({self})")
    }
}

impl FromStr for Pubkey {
    type Err = PubkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| PubkeyError::InvalidBase58(e.to_string()))?;
        Self::try_from_slice(&bytes)
    }
}

impl From<[u8; PUBKEY_BYTES]> for Pubkey {
    fn from(bytes: [u8; PUBKEY_BYTES]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN_PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

    #[test]
    fn base58_roundtrip() {
        let key: Pubkey = TOKEN_PROGRAM.parse().unwrap();
        assert_eq!(key.to_string(), TOKEN_PROGRAM);
    }

    #[test]
    fn rejects_wrong_length() {
        let err = "3yZe7d".parse::<Pubkey>().unwrap_err();
        assert!(matches!(err, PubkeyError::InvalidLength(_)));
    }

    #[test]
    fn rejects_bad_alphabet() {
        let err = "0OIl".parse::<Pubkey>().unwrap_err();
        assert!(matches!(err, PubkeyError::InvalidBase58(_)));
    }

    #[test]
    fn serde_uses_base58_string() {
        let key: Pubkey = TOKEN_PROGRAM.parse().unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{TOKEN_PROGRAM}\""));
        let back: Pubkey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn program_address_is_off_curve_and_deterministic() {
        let program: Pubkey = TOKEN_PROGRAM.parse().unwrap();
        let (a, bump_a) = Pubkey::find_program_address(&[b"seed"], &program).unwrap();
        let (b, bump_b) = Pubkey::find_program_address(&[b"seed"], &program).unwrap();
        assert_eq!(a, b);
        assert_eq!(bump_a, bump_b);
        assert!(!is_on_curve(a.as_bytes()));
    }

    #[test]
    fn program_address_rejects_long_seed() {
        let program = Pubkey::default();
        let long = [0u8; 33];
        assert!(Pubkey::find_program_address(&[&long], &program).is_none());
    }
}
