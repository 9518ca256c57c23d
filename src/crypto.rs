//! Hash and signature primitives consumed by contract methods
//!
//! Contracts never call a hash function or a curve library directly; they go
//! through [`CryptoProvider`], so tests and embedders can swap the backend.

use crate::types::*;
use bitcoin_hashes::{sha256d, Hash as BitcoinHash};
use ripemd::Ripemd160;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, VerifyOnly};
use sha2::{Digest, Sha256};

/// Primitive crypto provider
pub trait CryptoProvider: Send + Sync {
    /// SHA256(x)
    fn sha256(&self, data: &[u8]) -> Hash;

    /// RIPEMD160(SHA256(x))
    fn hash160(&self, data: &[u8]) -> PubKeyHash;

    /// SHA256(SHA256(x))
    fn double_sha256(&self, data: &[u8]) -> Hash;

    /// Verify a DER-encoded ECDSA signature over a 32-byte digest
    fn verify_signature(&self, digest: &Hash, signature: &[u8], public_key: &[u8]) -> bool;
}

/// Default provider backed by `sha2`, `ripemd`, `bitcoin_hashes` and `secp256k1`
pub struct Secp256k1Crypto {
    secp: Secp256k1<VerifyOnly>,
}

impl Secp256k1Crypto {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::verification_only(),
        }
    }
}

impl Default for Secp256k1Crypto {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoProvider for Secp256k1Crypto {
    fn sha256(&self, data: &[u8]) -> Hash {
        sha256(data)
    }

    fn hash160(&self, data: &[u8]) -> PubKeyHash {
        hash160(data)
    }

    fn double_sha256(&self, data: &[u8]) -> Hash {
        double_sha256(data)
    }

    fn verify_signature(&self, digest: &Hash, signature: &[u8], public_key: &[u8]) -> bool {
        let pubkey = match PublicKey::from_slice(public_key) {
            Ok(pk) => pk,
            Err(_) => return false,
        };

        let signature = match Signature::from_der(signature) {
            Ok(sig) => sig,
            Err(_) => return false,
        };

        let message = match Message::from_digest_slice(digest) {
            Ok(msg) => msg,
            Err(_) => return false,
        };

        self.secp.verify_ecdsa(&message, &signature, &pubkey).is_ok()
    }
}

/// SHA256(x)
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// RIPEMD160(SHA256(x))
pub fn hash160(data: &[u8]) -> PubKeyHash {
    let sha256_hash = Sha256::digest(data);
    Ripemd160::digest(sha256_hash).into()
}

/// SHA256(SHA256(x))
pub fn double_sha256(data: &[u8]) -> Hash {
    sha256d::Hash::hash(data).into_inner()
}
