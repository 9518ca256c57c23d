//! External collaborators injected into the builder
//!
//! Output discovery, key custody, fee policy and deployment all live outside
//! this crate. Failures surface as `anyhow::Error` and are mapped to
//! [`ContractError::ExternalIo`](crate::error::ContractError::ExternalIo)
//! at the builder boundary.

use crate::constants::DEFAULT_FEE_RATE;
use crate::contracts::ContractInstance;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Source of spendable outputs locked by a given script
pub trait OutputSource {
    fn fetch_utxos(&self, locking_script: &[u8]) -> anyhow::Result<Vec<Utxo>>;
}

/// Key custody and transaction broadcast
pub trait Signer {
    /// SEC-encoded public key for `key_id`
    fn public_key(&self, key_id: &str) -> anyhow::Result<PubKey>;

    /// DER-encoded ECDSA signature over `digest`, without the sighash flag
    fn sign(&self, digest: &Hash, key_id: &str) -> anyhow::Result<ByteString>;

    /// Submit a serialized transaction, returning its txid
    fn broadcast(&self, raw_tx: &[u8]) -> anyhow::Result<Hash>;
}

/// Fee for a transaction of a given serialized size
pub trait FeeStrategy {
    fn fee(&self, size: usize) -> Integer;
}

/// Fixed rate in satoshis per 1000 bytes, rounded up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRate {
    pub sats_per_kb: u64,
}

impl FeeRate {
    pub fn new(sats_per_kb: u64) -> Self {
        Self { sats_per_kb }
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        Self::new(DEFAULT_FEE_RATE)
    }
}

impl FeeStrategy for FeeRate {
    fn fee(&self, size: usize) -> Integer {
        let fee = (size as u64).saturating_mul(self.sats_per_kb).div_ceil(1000);
        Integer::try_from(fee).unwrap_or(Integer::MAX)
    }
}

/// Locks a fresh contract instance on chain
pub trait Deployer {
    fn deploy(&self, instance: &ContractInstance, amount: Integer) -> anyhow::Result<Hash>;
}
