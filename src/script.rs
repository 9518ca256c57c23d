//! Output and script builder
//!
//! Contracts are not compiled to a general script program. A locking script is
//! a fixed code template identifying the contract followed by its serialized
//! state:
//!
//! ```text
//! <code template> OP_RETURN <state pushes> <u32 LE state length> <version>
//! ```
//!
//! where the code template is `PUSH(tag) OP_DROP`. The parsers in this module
//! are exact inverses of the builders.

use crate::constants::*;
use crate::error::{ContractError, Result};
use crate::types::*;
use serde::{Deserialize, Serialize};

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DROP: u8 = 0x75;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;

/// Length of the state trailer: u32 state length + version byte
const STATE_TRAILER_LEN: usize = 5;

/// Contract code templates known to this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractKind {
    Auction,
    Crowdfund,
    HashPuzzle,
    Counter,
    P2pkh,
    Cltv,
    AnyoneCanSpend,
}

impl ContractKind {
    pub const ALL: [ContractKind; 7] = [
        ContractKind::Auction,
        ContractKind::Crowdfund,
        ContractKind::HashPuzzle,
        ContractKind::Counter,
        ContractKind::P2pkh,
        ContractKind::Cltv,
        ContractKind::AnyoneCanSpend,
    ];

    pub fn tag(&self) -> &'static [u8] {
        match self {
            ContractKind::Auction => b"auction",
            ContractKind::Crowdfund => b"crowdfund",
            ContractKind::HashPuzzle => b"hashpuzzle",
            ContractKind::Counter => b"counter",
            ContractKind::P2pkh => b"p2pkh",
            ContractKind::Cltv => b"cltv",
            ContractKind::AnyoneCanSpend => b"acs",
        }
    }

    /// Fixed code bytes for this contract
    pub fn code_template(&self) -> ByteString {
        let mut code = Vec::with_capacity(self.tag().len() + 2);
        push_data(&mut code, self.tag());
        code.push(OP_DROP);
        code
    }

    fn from_code(code: &[u8]) -> Option<ContractKind> {
        ContractKind::ALL
            .into_iter()
            .find(|kind| kind.code_template() == code)
    }
}

/// Append a data push, choosing the smallest push opcode for the length
pub fn push_data(script: &mut ByteString, data: &[u8]) {
    match data.len() {
        0 => script.push(OP_0),
        n @ 1..=75 => script.push(n as u8),
        n if n <= 0xff => {
            script.push(OP_PUSHDATA1);
            script.push(n as u8);
        }
        n if n <= 0xffff => {
            script.push(OP_PUSHDATA2);
            script.extend_from_slice(&(n as u16).to_le_bytes());
        }
        n => {
            script.push(OP_PUSHDATA4);
            script.extend_from_slice(&(n as u32).to_le_bytes());
        }
    }
    script.extend_from_slice(data);
}

/// Append an integer as a pushed minimal script number
pub fn push_int(script: &mut ByteString, value: Integer) {
    push_data(script, &encode_script_num(value));
}

/// Append a natural as a pushed script number; it must fit a signed 64-bit integer
pub fn push_natural(script: &mut ByteString, value: Natural) -> Result<()> {
    let value = Integer::try_from(value)
        .map_err(|_| ContractError::Serialization(format!("natural {value} exceeds script number range")))?;
    push_int(script, value);
    Ok(())
}

/// Minimal little-endian sign-magnitude encoding; zero is the empty string
pub fn encode_script_num(value: Integer) -> ByteString {
    if value == 0 {
        return Vec::new();
    }

    let negative = value < 0;
    let mut magnitude = value.unsigned_abs();
    let mut out = Vec::with_capacity(9);
    while magnitude > 0 {
        out.push((magnitude & 0xff) as u8);
        magnitude >>= 8;
    }

    if let Some(last) = out.last_mut() {
        if *last & 0x80 != 0 {
            out.push(if negative { 0x80 } else { 0x00 });
        } else if negative {
            *last |= 0x80;
        }
    }
    out
}

/// Inverse of [`encode_script_num`]; rejects non-minimal encodings
pub fn decode_script_num(bytes: &[u8]) -> Result<Integer> {
    if bytes.is_empty() {
        return Ok(0);
    }
    if bytes.len() > 9 {
        return Err(ContractError::Serialization(format!(
            "script number too long: {} bytes",
            bytes.len()
        )));
    }

    let last = bytes[bytes.len() - 1];
    if last & 0x7f == 0 && (bytes.len() == 1 || bytes[bytes.len() - 2] & 0x80 == 0) {
        return Err(ContractError::Serialization(
            "non-minimally encoded script number".to_string(),
        ));
    }

    let mut magnitude: u128 = 0;
    for (i, byte) in bytes.iter().enumerate() {
        let byte = if i == bytes.len() - 1 { byte & 0x7f } else { *byte };
        magnitude |= (byte as u128) << (8 * i);
    }
    let value = if last & 0x80 != 0 {
        -(magnitude as i128)
    } else {
        magnitude as i128
    };

    Integer::try_from(value)
        .map_err(|_| ContractError::Serialization(format!("script number {value} out of range")))
}

/// Sequential reader over push-only script bytes
pub struct ScriptReader<'a> {
    script: &'a [u8],
    pos: usize,
}

impl<'a> ScriptReader<'a> {
    pub fn new(script: &'a [u8]) -> Self {
        Self { script, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.script.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.script.len())
            .ok_or_else(|| {
                ContractError::Serialization(format!(
                    "push of {} bytes overruns script at offset {}",
                    n, self.pos
                ))
            })?;
        let data = &self.script[self.pos..end];
        self.pos = end;
        Ok(data)
    }

    /// Read the next data push
    pub fn read_push(&mut self) -> Result<&'a [u8]> {
        let opcode = self.take(1)?[0];
        let len = match opcode {
            OP_0 => 0,
            0x01..=0x4b => opcode as usize,
            OP_PUSHDATA1 => self.take(1)?[0] as usize,
            OP_PUSHDATA2 => {
                let b = self.take(2)?;
                u16::from_le_bytes([b[0], b[1]]) as usize
            }
            OP_PUSHDATA4 => {
                let b = self.take(4)?;
                u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize
            }
            other => {
                return Err(ContractError::Serialization(format!(
                    "expected a data push, found opcode 0x{other:02x}"
                )))
            }
        };
        self.take(len)
    }

    pub fn read_int(&mut self) -> Result<Integer> {
        decode_script_num(self.read_push()?)
    }

    pub fn read_natural(&mut self) -> Result<Natural> {
        let value = self.read_int()?;
        Natural::try_from(value)
            .map_err(|_| ContractError::Serialization(format!("negative natural {value}")))
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let data = self.read_push()?;
        <[u8; N]>::try_from(data).map_err(|_| {
            ContractError::Serialization(format!("expected {} bytes, found {}", N, data.len()))
        })
    }

    pub fn read_bytes(&mut self) -> Result<ByteString> {
        Ok(self.read_push()?.to_vec())
    }

    /// Fail unless every byte was consumed
    pub fn finish(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ContractError::Serialization(format!(
                "{} trailing bytes",
                self.script.len() - self.pos
            )))
        }
    }
}

/// OP_DUP OP_HASH160 <pkh> OP_EQUALVERIFY OP_CHECKSIG
pub fn build_p2pkh_script(pubkey_hash: &PubKeyHash) -> ByteString {
    let mut script = Vec::with_capacity(25);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    push_data(&mut script, pubkey_hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

pub fn build_p2pkh_output(pubkey_hash: &PubKeyHash, value: Integer) -> TransactionOutput {
    TransactionOutput {
        value,
        script_pubkey: build_p2pkh_script(pubkey_hash),
    }
}

/// Public key hash of a standard P2PKH script
pub fn parse_p2pkh_script(script: &[u8]) -> Option<PubKeyHash> {
    if script.len() != 25
        || script[0] != OP_DUP
        || script[1] != OP_HASH160
        || script[2] != 20
        || script[23] != OP_EQUALVERIFY
        || script[24] != OP_CHECKSIG
    {
        return None;
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&script[3..23]);
    Some(hash)
}

/// Code template followed by the serialized state
pub fn build_state_script(kind: ContractKind, state: &[u8]) -> Result<ByteString> {
    let state_len = u32::try_from(state.len())
        .map_err(|_| ContractError::Serialization("state too large".to_string()))?;

    let code = kind.code_template();
    let mut script = Vec::with_capacity(code.len() + 1 + state.len() + STATE_TRAILER_LEN);
    script.extend_from_slice(&code);
    script.push(OP_RETURN);
    script.extend_from_slice(state);
    script.extend_from_slice(&state_len.to_le_bytes());
    script.push(STATE_VERSION);

    if script.len() > MAX_SCRIPT_SIZE {
        return Err(ContractError::Serialization(format!(
            "locking script too large: {} bytes",
            script.len()
        )));
    }
    Ok(script)
}

/// Split a locking script into its contract kind and raw state bytes
pub fn parse_locking_script(script: &[u8]) -> Result<(ContractKind, &[u8])> {
    let len = script.len();
    if len < STATE_TRAILER_LEN + 1 {
        return Err(ContractError::Serialization(format!(
            "locking script too short: {len} bytes"
        )));
    }

    let version = script[len - 1];
    if version != STATE_VERSION {
        return Err(ContractError::Serialization(format!(
            "unsupported state version {version}"
        )));
    }

    let trailer = &script[len - STATE_TRAILER_LEN..len - 1];
    let state_len = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]) as usize;
    let state_end = len - STATE_TRAILER_LEN;
    let state_start = state_end
        .checked_sub(state_len)
        .ok_or_else(|| ContractError::Serialization("state length exceeds script".to_string()))?;
    let return_pos = state_start
        .checked_sub(1)
        .ok_or_else(|| ContractError::Serialization("missing OP_RETURN".to_string()))?;

    if script[return_pos] != OP_RETURN {
        return Err(ContractError::Serialization(
            "state is not separated by OP_RETURN".to_string(),
        ));
    }

    let kind = ContractKind::from_code(&script[..return_pos])
        .ok_or_else(|| ContractError::Serialization("unknown contract code".to_string()))?;

    Ok((kind, &script[state_start..state_end]))
}

/// `PUSH(arg_0) .. PUSH(arg_n) PUSH(method_index)`
pub fn build_unlocking_script(args: &[ByteString], method_index: usize) -> ByteString {
    let mut script = Vec::new();
    for arg in args {
        push_data(&mut script, arg);
    }
    push_int(&mut script, method_index as Integer);
    script
}

/// Inverse of [`build_unlocking_script`]
pub fn parse_unlocking_script(script: &[u8]) -> Result<(Vec<ByteString>, usize)> {
    let mut reader = ScriptReader::new(script);
    let mut pushes = Vec::new();
    while !reader.is_empty() {
        pushes.push(reader.read_bytes()?);
    }

    let selector = pushes
        .pop()
        .ok_or_else(|| ContractError::Serialization("empty unlocking script".to_string()))?;
    let index = decode_script_num(&selector)?;
    let index = usize::try_from(index)
        .map_err(|_| ContractError::Serialization(format!("invalid method index {index}")))?;

    Ok((pushes, index))
}
