//! Signature hash computation
//!
//! Preimage layout (BIP143 with the FORKID flag):
//!
//! ```text
//! nVersion ‖ hashPrevouts ‖ hashSequence ‖ outpoint ‖ scriptCode ‖ value
//!          ‖ nSequence ‖ hashOutputs ‖ nLockTime ‖ sighashType
//! ```
//!
//! The digest signed and checked is SHA256(SHA256(preimage)).

use crate::constants::*;
use crate::crypto::double_sha256;
use crate::error::{ContractError, Result};
use crate::transaction::{check_wire_fields, hash_outputs, write_outpoint, write_varint};
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Which outputs a signature (and a contract's outputs commitment) covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SighashBase {
    All,
    None,
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SighashType {
    pub base: SighashBase,
    pub anyone_can_pay: bool,
}

impl SighashType {
    pub const ALL: SighashType = SighashType {
        base: SighashBase::All,
        anyone_can_pay: false,
    };

    pub const SINGLE_ANYONECANPAY: SighashType = SighashType {
        base: SighashBase::Single,
        anyone_can_pay: true,
    };

    /// Flag byte appended to signatures; FORKID is always set
    pub fn to_byte(&self) -> u8 {
        let base = match self.base {
            SighashBase::All => SIGHASH_ALL,
            SighashBase::None => SIGHASH_NONE,
            SighashBase::Single => SIGHASH_SINGLE,
        };
        let acp = if self.anyone_can_pay { SIGHASH_ANYONECANPAY } else { 0 };
        base | SIGHASH_FORKID | acp
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        if byte & SIGHASH_FORKID == 0 {
            return Err(ContractError::Serialization(format!(
                "sighash type 0x{byte:02x} lacks FORKID"
            )));
        }
        let base = match byte & 0x1f {
            SIGHASH_ALL => SighashBase::All,
            SIGHASH_NONE => SighashBase::None,
            SIGHASH_SINGLE => SighashBase::Single,
            _ => {
                return Err(ContractError::Serialization(format!(
                    "unknown sighash type 0x{byte:02x}"
                )))
            }
        };
        Ok(SighashType {
            base,
            anyone_can_pay: byte & SIGHASH_ANYONECANPAY != 0,
        })
    }
}

impl Default for SighashType {
    fn default() -> Self {
        SighashType::ALL
    }
}

fn check_index(tx: &Transaction, input_index: usize) -> Result<()> {
    if input_index >= tx.inputs.len() {
        return Err(ContractError::TransactionValidation(format!(
            "input index {} out of range ({} inputs)",
            input_index,
            tx.inputs.len()
        )));
    }
    Ok(())
}

/// The outputs commitment an input signs under `sighash_type`
pub fn committed_outputs_hash(tx: &Transaction, input_index: usize, sighash_type: SighashType) -> Hash {
    match sighash_type.base {
        SighashBase::All => hash_outputs(&tx.outputs),
        SighashBase::Single if input_index < tx.outputs.len() => {
            hash_outputs(std::slice::from_ref(&tx.outputs[input_index]))
        }
        _ => [0u8; 32],
    }
}

fn hash_prevouts(tx: &Transaction) -> Hash {
    let mut buf = Vec::with_capacity(tx.inputs.len() * 36);
    for input in &tx.inputs {
        write_outpoint(&mut buf, &input.prevout);
    }
    double_sha256(&buf)
}

fn hash_sequence(tx: &Transaction) -> Hash {
    let mut buf = Vec::with_capacity(tx.inputs.len() * 4);
    for input in &tx.inputs {
        buf.extend_from_slice(&(input.sequence as u32).to_le_bytes());
    }
    double_sha256(&buf)
}

/// Signature preimage for input `input_index` spending `spent`
pub fn signature_preimage(
    tx: &Transaction,
    input_index: usize,
    spent: &TransactionOutput,
    sighash_type: SighashType,
) -> Result<ByteString> {
    check_index(tx, input_index)?;
    check_wire_fields(tx)?;
    let input = &tx.inputs[input_index];

    let prevouts = if sighash_type.anyone_can_pay {
        [0u8; 32]
    } else {
        hash_prevouts(tx)
    };
    let sequences = if sighash_type.anyone_can_pay || sighash_type.base != SighashBase::All {
        [0u8; 32]
    } else {
        hash_sequence(tx)
    };

    let mut preimage = Vec::with_capacity(156 + spent.script_pubkey.len());
    preimage.extend_from_slice(&(tx.version as u32).to_le_bytes());
    preimage.extend_from_slice(&prevouts);
    preimage.extend_from_slice(&sequences);
    write_outpoint(&mut preimage, &input.prevout);
    write_varint(&mut preimage, spent.script_pubkey.len() as u64);
    preimage.extend_from_slice(&spent.script_pubkey);
    preimage.extend_from_slice(&spent.value.to_le_bytes());
    preimage.extend_from_slice(&(input.sequence as u32).to_le_bytes());
    preimage.extend_from_slice(&committed_outputs_hash(tx, input_index, sighash_type));
    preimage.extend_from_slice(&(tx.lock_time as u32).to_le_bytes());
    preimage.extend_from_slice(&(sighash_type.to_byte() as u32).to_le_bytes());
    Ok(preimage)
}

/// SHA256(SHA256(preimage))
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    spent: &TransactionOutput,
    sighash_type: SighashType,
) -> Result<Hash> {
    Ok(double_sha256(&signature_preimage(tx, input_index, spent, sighash_type)?))
}
