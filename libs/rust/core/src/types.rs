//! Fixed-width identifiers shared by every ledger component.
//!
//! `Digest` is a 256-bit commitment (Merkle roots, content hashes, ids).
//! `Account` is a 20-byte caller identity derived from a secp256k1 public key.
//! Both render as `0x`-prefixed lowercase hex and serialize the same way.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Ledger time in whole seconds. The execution environment supplies it; it is
/// coarse and shared by every operation committed in the same step.
pub type Timestamp = u64;

/// Largest representable timestamp, used for "open ended" publisher windows.
pub const MAX_TIMESTAMP: Timestamp = u64::MAX;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseHexError {
    #[error("invalid hex: {0}")]
    Hex(String),
    #[error("expected {expected} bytes, got {got}")]
    Length { expected: usize, got: usize },
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], ParseHexError> {
    let raw = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let bytes = hex::decode(raw).map_err(|e| ParseHexError::Hex(e.to_string()))?;
    if bytes.len() != N {
        return Err(ParseHexError::Length { expected: N, got: bytes.len() });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// 256-bit digest. Ordering is the numeric ordering of the big-endian value,
/// which is the lexicographic ordering of the bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    pub const ZERO: Digest = Digest([0u8; 32]);

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 32 {
            return None;
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Some(Digest(arr))
    }

    /// Big-endian 256-bit encoding of an unsigned integer.
    pub fn from_u64(v: u64) -> Self {
        let mut arr = [0u8; 32];
        arr[24..].copy_from_slice(&v.to_be_bytes());
        Digest(arr)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({}..)", hex::encode(&self.0[..6]))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = ParseHexError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s).map(Digest)
    }
}

impl From<[u8; 32]> for Digest {
    fn from(v: [u8; 32]) -> Self {
        Digest(v)
    }
}

/// 20-byte account identifier. `Account::ZERO` doubles as the "no signer"
/// sentinel returned by signature recovery.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Account(pub [u8; 20]);

impl Account {
    pub const ZERO: Account = Account([0u8; 20]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Left-padded 32-byte word, the form accounts take inside hashed encodings.
    pub fn to_word(&self) -> [u8; 32] {
        let mut w = [0u8; 32];
        w[12..].copy_from_slice(&self.0);
        w
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Account({})", self.to_hex())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Account {
    type Err = ParseHexError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<20>(s).map(Account)
    }
}

impl From<[u8; 20]> for Account {
    fn from(v: [u8; 20]) -> Self {
        Account(v)
    }
}

// Hex-string serde so JSON event logs and config files stay readable.
macro_rules! hex_serde {
    ($ty:ident, $len:expr, $visitor:ident) => {
        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where S: Serializer {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where D: Deserializer<'de> {
                struct $visitor;
                impl<'de> Visitor<'de> for $visitor {
                    type Value = $ty;
                    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                        write!(formatter, "a 0x-prefixed {}-byte hex string", $len)
                    }
                    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
                    where E: de::Error {
                        v.parse::<$ty>().map_err(E::custom)
                    }
                }
                deserializer.deserialize_str($visitor)
            }
        }
    };
}

hex_serde!(Digest, 32, DigestVisitor);
hex_serde!(Account, 20, AccountVisitor);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_hex_roundtrip_and_ordering() {
        let a: Digest = "0x00000000000000000000000000000000000000000000000000000000000000ff".parse().unwrap();
        let b = Digest::from_u64(256);
        assert!(a < b);
        assert_eq!(a, Digest::from_u64(255));
        assert_eq!(a.to_string().parse::<Digest>().unwrap(), a);
    }

    #[test]
    fn account_rejects_wrong_length() {
        let err = "0x1234".parse::<Account>().unwrap_err();
        assert_eq!(err, ParseHexError::Length { expected: 20, got: 2 });
    }

    #[test]
    fn serde_uses_hex_strings() {
        let acct = Account([0xab; 20]);
        let json = serde_json::to_string(&acct).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(20)));
        let back: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(back, acct);
    }

    #[test]
    fn account_word_is_left_padded() {
        let w = Account([1; 20]).to_word();
        assert_eq!(&w[..12], &[0u8; 12]);
        assert_eq!(&w[12..], &[1u8; 20]);
    }
}
