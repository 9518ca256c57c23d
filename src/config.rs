//! Builder configuration

use crate::collaborators::FeeRate;
use crate::constants::*;
use crate::error::{ContractError, Result};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Transaction building parameters
///
/// Every field is optional in JSON; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    pub tx_version: Natural,
    /// Satoshis per 1000 bytes
    pub fee_rate: u64,
    /// Change below this is folded into the fee
    pub dust_limit: Integer,
    /// Unlocking script bytes assumed per input when estimating size
    pub unlock_size_estimate: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            tx_version: DEFAULT_TX_VERSION,
            fee_rate: DEFAULT_FEE_RATE,
            dust_limit: DEFAULT_DUST_LIMIT,
            unlock_size_estimate: DEFAULT_UNLOCK_SIZE_ESTIMATE,
        }
    }
}

impl BuilderConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ContractError::Serialization(format!("invalid builder config: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ContractError::ExternalIo(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn fee_strategy(&self) -> FeeRate {
        FeeRate::new(self.fee_rate)
    }
}
