/// secp256k1 recoverable signatures over 32-byte digests.
///
/// Wire format: 65 bytes `r || s || v`. A `v` below 27 is normalized by adding
/// 27; after that only 27 and 28 are valid. Recovery never judges whether the
/// signer is the expected one; callers compare the returned account.
///
/// Accounts are the last 20 bytes of keccak256 over the uncompressed public key
/// (without the 0x04 tag).

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use std::fmt;

use crate::error::{LedgerError, LedgerResult};
use crate::hashing::keccak256;
use crate::types::{Account, Digest};

pub const SIGNATURE_LEN: usize = 65;
const RECOVERY_ID_OFFSET: u8 = 27;

/// Recovers the account that produced a signature. Kept behind a trait so the
/// authenticator does not depend on a particular curve.
pub trait SignatureBackend: Send + Sync {
    fn scheme(&self) -> &'static str;

    /// `Err` only for malformed input (length, recovery id). A well-formed
    /// signature that does not recover yields `Account::ZERO`.
    fn recover(&self, digest: &Digest, signature: &[u8]) -> LedgerResult<Account>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Secp256k1Backend;

impl SignatureBackend for Secp256k1Backend {
    fn scheme(&self) -> &'static str {
        "secp256k1-recoverable"
    }

    fn recover(&self, digest: &Digest, signature: &[u8]) -> LedgerResult<Account> {
        if signature.len() != SIGNATURE_LEN {
            return Err(LedgerError::SignatureLength(signature.len()));
        }
        let mut v = signature[64];
        if v < RECOVERY_ID_OFFSET {
            v += RECOVERY_ID_OFFSET;
        }
        if v != 27 && v != 28 {
            return Err(LedgerError::InvalidRecoveryId(v));
        }
        let Some(recid) = RecoveryId::from_byte(v - RECOVERY_ID_OFFSET) else {
            return Err(LedgerError::InvalidRecoveryId(v));
        };
        let Ok(sig) = Signature::from_slice(&signature[..64]) else {
            return Ok(Account::ZERO);
        };
        match VerifyingKey::recover_from_prehash(digest.as_bytes(), &sig, recid) {
            Ok(key) => Ok(account_of(&key)),
            Err(_) => Ok(Account::ZERO),
        }
    }
}

pub fn account_of(key: &VerifyingKey) -> Account {
    let point = key.as_affine().to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash.0[12..]);
    Account(out)
}

/// Off-ledger signer holding a publisher's private key.
#[derive(Clone)]
pub struct LocalSigner {
    key: SigningKey,
    account: Account,
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalSigner({}, ***)", self.account)
    }
}

impl LocalSigner {
    pub fn from_secret(secret: &[u8]) -> Result<Self, k256::ecdsa::Error> {
        let key = SigningKey::from_slice(secret)?;
        let account = account_of(key.verifying_key());
        Ok(Self { key, account })
    }

    /// Deterministic key from a seed phrase; handy for fixtures and devnets.
    pub fn from_seed(seed: &str) -> Result<Self, k256::ecdsa::Error> {
        Self::from_secret(keccak256(seed.as_bytes()).as_bytes())
    }

    pub fn account(&self) -> Account {
        self.account
    }

    pub fn sign_digest(&self, digest: &Digest) -> Result<[u8; SIGNATURE_LEN], k256::ecdsa::Error> {
        let (sig, recid) = self.key.sign_prehash_recoverable(digest.as_bytes())?;
        let mut out = [0u8; SIGNATURE_LEN];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = recid.to_byte() + RECOVERY_ID_OFFSET;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> LocalSigner {
        LocalSigner::from_seed("publisher-one").unwrap()
    }

    #[test]
    fn recovers_signer_account() {
        let s = signer();
        let digest = keccak256(b"receipt");
        let sig = s.sign_digest(&digest).unwrap();
        assert_eq!(Secp256k1Backend.recover(&digest, &sig).unwrap(), s.account());
    }

    #[test]
    fn low_recovery_id_is_normalized() {
        let s = signer();
        let digest = keccak256(b"receipt");
        let mut sig = s.sign_digest(&digest).unwrap();
        sig[64] -= 27;
        assert_eq!(Secp256k1Backend.recover(&digest, &sig).unwrap(), s.account());
    }

    #[test]
    fn rejects_bad_length_and_recovery_id() {
        let digest = keccak256(b"x");
        assert_eq!(Secp256k1Backend.recover(&digest, &[0u8; 64]), Err(LedgerError::SignatureLength(64)));
        let mut sig = signer().sign_digest(&digest).unwrap();
        sig[64] = 29;
        assert_eq!(Secp256k1Backend.recover(&digest, &sig), Err(LedgerError::InvalidRecoveryId(29)));
    }

    #[test]
    fn different_digest_recovers_someone_else() {
        let s = signer();
        let sig = s.sign_digest(&keccak256(b"a")).unwrap();
        let got = Secp256k1Backend.recover(&keccak256(b"b"), &sig).unwrap();
        assert_ne!(got, s.account());
    }

    #[test]
    fn zero_signature_yields_sentinel() {
        let mut sig = [0u8; 65];
        sig[64] = 27;
        assert_eq!(Secp256k1Backend.recover(&keccak256(b"a"), &sig).unwrap(), Account::ZERO);
    }
}
