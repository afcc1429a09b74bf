//! Keccak-256 helpers and the deterministic id derivations used on the ledger.

use sha3::{Digest as Sha3Digest, Keccak256};

use crate::types::{Account, Digest, Timestamp};

pub fn keccak256(data: &[u8]) -> Digest {
    Digest(Keccak256::digest(data).into())
}

/// Hash of the concatenation of `parts`, without allocating the joined buffer.
pub fn keccak256_concat(parts: &[&[u8]]) -> Digest {
    let mut hasher = Keccak256::new();
    for p in parts {
        hasher.update(p);
    }
    Digest(hasher.finalize().into())
}

/// Identifier for a human-readable dataset name.
pub fn compute_dataset_id(name: &str) -> Digest {
    keccak256(name.as_bytes())
}

/// Derived model id for `createModel` calls that do not supply one.
/// `nonce` is the ledger's monotonically increasing creation counter, so two
/// calls from the same caller in the same second still get distinct ids.
pub fn derive_model_id(
    caller: &Account,
    dataset_id: &Digest,
    dataset_version: u64,
    chain_id: u64,
    now: Timestamp,
    nonce: u64,
) -> Digest {
    keccak256_concat(&[
        caller.as_bytes(),
        dataset_id.as_bytes(),
        Digest::from_u64(dataset_version).as_bytes(),
        Digest::from_u64(chain_id).as_bytes(),
        Digest::from_u64(now).as_bytes(),
        Digest::from_u64(nonce).as_bytes(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_known_vector() {
        // keccak256("") is the well known c5d2..a470 constant
        assert_eq!(
            keccak256(b"").to_hex(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn concat_matches_single_buffer() {
        assert_eq!(keccak256_concat(&[b"ab", b"cd"]), keccak256(b"abcd"));
    }

    #[test]
    fn dataset_id_is_name_hash() {
        assert_eq!(compute_dataset_id("imagenet-mini"), keccak256(b"imagenet-mini"));
        assert_ne!(compute_dataset_id("a"), compute_dataset_id("b"));
    }

    #[test]
    fn derived_model_ids_differ_by_nonce() {
        let caller = Account([7; 20]);
        let ds = compute_dataset_id("d");
        let a = derive_model_id(&caller, &ds, 1, 31337, 1_700_000_000, 0);
        let b = derive_model_id(&caller, &ds, 1, 31337, 1_700_000_000, 1);
        assert_ne!(a, b);
    }
}
