//! Transaction serialization, outputs commitment and structural checks

use crate::constants::*;
use crate::crypto::double_sha256;
use crate::error::{ContractError, Result};
use crate::types::*;

/// Append a Bitcoin-style compact size
pub fn write_varint(buf: &mut ByteString, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x10000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Output serialization: value (8 bytes LE) ‖ varint(|script|) ‖ script
pub fn write_output(buf: &mut ByteString, output: &TransactionOutput) {
    buf.extend_from_slice(&output.value.to_le_bytes());
    write_varint(buf, output.script_pubkey.len() as u64);
    buf.extend_from_slice(&output.script_pubkey);
}

pub fn serialize_output(output: &TransactionOutput) -> ByteString {
    let mut buf = Vec::with_capacity(9 + output.script_pubkey.len());
    write_output(&mut buf, output);
    buf
}

/// Concatenation of serialized outputs, in order
pub fn serialize_outputs(outputs: &[TransactionOutput]) -> ByteString {
    let mut buf = Vec::new();
    for output in outputs {
        write_output(&mut buf, output);
    }
    buf
}

/// OutputsCommitment: SHA256(SHA256(o₁ ‖ … ‖ oₙ))
pub fn hash_outputs(outputs: &[TransactionOutput]) -> Hash {
    double_sha256(&serialize_outputs(outputs))
}

pub fn write_outpoint(buf: &mut ByteString, outpoint: &OutPoint) {
    buf.extend_from_slice(&outpoint.hash);
    buf.extend_from_slice(&(outpoint.index as u32).to_le_bytes());
}

/// Legacy wire serialization
pub fn serialize_transaction(tx: &Transaction) -> ByteString {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(tx.version as u32).to_le_bytes());

    write_varint(&mut buf, tx.inputs.len() as u64);
    for input in &tx.inputs {
        write_outpoint(&mut buf, &input.prevout);
        write_varint(&mut buf, input.script_sig.len() as u64);
        buf.extend_from_slice(&input.script_sig);
        buf.extend_from_slice(&(input.sequence as u32).to_le_bytes());
    }

    write_varint(&mut buf, tx.outputs.len() as u64);
    for output in &tx.outputs {
        write_output(&mut buf, output);
    }

    buf.extend_from_slice(&(tx.lock_time as u32).to_le_bytes());
    buf
}

/// Transaction id in internal byte order
pub fn txid(tx: &Transaction) -> Hash {
    double_sha256(&serialize_transaction(tx))
}

/// Transaction id in the conventional reversed hex form
pub fn txid_hex(txid: &Hash) -> String {
    let mut reversed = *txid;
    reversed.reverse();
    hex::encode(reversed)
}

/// CheckTransaction: 𝒯𝒳 → {valid, invalid}
///
/// A transaction tx = (v, ins, outs, lt) is valid if and only if:
/// 1. |ins| > 0 ∧ |outs| > 0
/// 2. ∀o ∈ outs: 0 ≤ o.value ≤ M_max, and Σ o.value ≤ M_max
/// 3. |ins| ≤ M_max_inputs ∧ |outs| ≤ M_max_outputs
/// 4. version, lock time, every sequence and prevout index fit in 32 bits
/// 5. |tx| ≤ M_max_tx_size
pub fn check_transaction(tx: &Transaction) -> Result<ValidationResult> {
    // 1. Check inputs and outputs are not empty
    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return Ok(ValidationResult::Invalid("Empty inputs or outputs".to_string()));
    }

    // 2. Check output values are valid
    let mut total: i64 = 0;
    for (i, output) in tx.outputs.iter().enumerate() {
        if output.value < 0 || output.value > MAX_MONEY {
            return Ok(ValidationResult::Invalid(format!(
                "Invalid output value {} at index {}",
                output.value, i
            )));
        }
        total += output.value;
        if total > MAX_MONEY {
            return Ok(ValidationResult::Invalid(
                "Total output value exceeds MAX_MONEY".to_string(),
            ));
        }
    }

    // 3. Check input and output count limits
    if tx.inputs.len() > MAX_INPUTS {
        return Ok(ValidationResult::Invalid(format!(
            "Too many inputs: {}",
            tx.inputs.len()
        )));
    }
    if tx.outputs.len() > MAX_OUTPUTS {
        return Ok(ValidationResult::Invalid(format!(
            "Too many outputs: {}",
            tx.outputs.len()
        )));
    }

    // 4. Check 32-bit fields
    if let Err(err) = check_wire_fields(tx) {
        return Ok(ValidationResult::Invalid(err.to_string()));
    }

    // 5. Check transaction size limit
    let tx_size = calculate_transaction_size(tx);
    if tx_size > MAX_TX_SIZE {
        return Ok(ValidationResult::Invalid(format!(
            "Transaction too large: {} bytes",
            tx_size
        )));
    }

    Ok(ValidationResult::Valid)
}

/// Version, lock time, every sequence and prevout index must fit their
/// 32-bit wire fields; wider values would be truncated when serialized
pub fn check_wire_fields(tx: &Transaction) -> Result<()> {
    let max_u32 = u32::MAX as u64;
    if tx.version > max_u32 || tx.lock_time > max_u32 {
        return Err(ContractError::TransactionValidation(
            "Version or lock time exceeds 32 bits".to_string(),
        ));
    }
    for (i, input) in tx.inputs.iter().enumerate() {
        if input.sequence > max_u32 || input.prevout.index > max_u32 {
            return Err(ContractError::TransactionValidation(format!(
                "Sequence or prevout index of input {} exceeds 32 bits",
                i
            )));
        }
    }
    Ok(())
}

/// Serialized size in bytes
pub fn calculate_transaction_size(tx: &Transaction) -> usize {
    serialize_transaction(tx).len()
}
