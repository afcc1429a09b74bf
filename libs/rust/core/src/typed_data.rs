//! Domain-separated structured messages.
//!
//! A message declares its type name and an ordered field list. Encoding:
//!   typeHash   = H("Name(type1 field1,type2 field2,...)")
//!   structHash = H(typeHash || enc(field1) || enc(field2) || ...)
//!   digest     = H(0x19 || 0x01 || domainSeparator || structHash)
//! where strings encode as H(utf8), integers and accounts as 32-byte
//! big-endian words. The domain binds a deployment name/version, the chain id
//! and the verifying instance, so a digest from one instance never matches
//! another.

use serde::{Deserialize, Serialize};

use crate::hashing::{keccak256, keccak256_concat};
use crate::types::{Account, Digest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Bytes32(Digest),
    Uint(u64),
    Address(Account),
    Str(&'a str),
}

impl FieldValue<'_> {
    fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Bytes32(_) => "bytes32",
            FieldValue::Uint(_) => "uint256",
            FieldValue::Address(_) => "address",
            FieldValue::Str(_) => "string",
        }
    }

    fn encode(&self) -> [u8; 32] {
        match self {
            FieldValue::Bytes32(d) => d.0,
            FieldValue::Uint(v) => Digest::from_u64(*v).0,
            FieldValue::Address(a) => a.to_word(),
            FieldValue::Str(s) => keccak256(s.as_bytes()).0,
        }
    }
}

/// A message that can be hashed under a [`SigningDomain`].
pub trait TypedStruct {
    const TYPE_NAME: &'static str;

    fn fields(&self) -> Vec<(&'static str, FieldValue<'_>)>;

    fn type_string(&self) -> String {
        let body: Vec<String> = self
            .fields()
            .iter()
            .map(|(name, value)| format!("{} {}", value.type_name(), name))
            .collect();
        format!("{}({})", Self::TYPE_NAME, body.join(","))
    }

    fn type_hash(&self) -> Digest {
        keccak256(self.type_string().as_bytes())
    }

    fn struct_hash(&self) -> Digest {
        let mut buf = Vec::with_capacity(32 * (self.fields().len() + 1));
        buf.extend_from_slice(self.type_hash().as_bytes());
        for (_, value) in self.fields() {
            buf.extend_from_slice(&value.encode());
        }
        keccak256(&buf)
    }
}

const DOMAIN_TYPE: &str = "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningDomain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Account,
}

impl SigningDomain {
    pub fn new(name: impl Into<String>, version: impl Into<String>, chain_id: u64, verifying_contract: Account) -> Self {
        Self { name: name.into(), version: version.into(), chain_id, verifying_contract }
    }

    pub fn separator(&self) -> Digest {
        keccak256_concat(&[
            keccak256(DOMAIN_TYPE.as_bytes()).as_bytes(),
            keccak256(self.name.as_bytes()).as_bytes(),
            keccak256(self.version.as_bytes()).as_bytes(),
            Digest::from_u64(self.chain_id).as_bytes(),
            &self.verifying_contract.to_word(),
        ])
    }

    /// Final digest a publisher signs for `msg`.
    pub fn digest<T: TypedStruct>(&self, msg: &T) -> Digest {
        keccak256_concat(&[&[0x19, 0x01], self.separator().as_bytes(), msg.struct_hash().as_bytes()])
    }
}
