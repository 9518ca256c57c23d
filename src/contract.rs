//! Contract state machine
//!
//! A contract is an immutable state value plus a set of named methods. A
//! method is a pure function of (state, call context, witness arguments): it
//! either rejects, or accepts and optionally names the next state together
//! with the value it must stay locked at.
//!
//! VerifyCall: 𝒮 × 𝒞𝒯𝒳 × 𝒲 → (𝒮 × ℤ)? ∪ {reject}

use crate::crypto::CryptoProvider;
use crate::error::{ContractError, RejectReason, Result};
use crate::script::*;
use crate::sighash::{committed_outputs_hash, signature_hash, SighashType};
use crate::transaction::serialize_outputs;
use crate::types::*;
use std::fmt::Debug;

/// Transaction-committed fields a method may inspect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// Outputs commitment under `sighash_type`
    pub hash_outputs: Hash,
    pub lock_time: Natural,
    /// Sequence number of the input being unlocked
    pub sequence: Natural,
    /// Value of the output being spent
    pub spent_value: Integer,
    pub input_index: usize,
    /// Digest that signatures over this input must sign
    pub sighash: Hash,
    pub sighash_type: SighashType,
}

impl CallContext {
    /// Derive the context of input `input_index` of a (sealed) transaction
    pub fn from_transaction(
        tx: &Transaction,
        input_index: usize,
        spent: &TransactionOutput,
        sighash_type: SighashType,
    ) -> Result<Self> {
        let sighash = signature_hash(tx, input_index, spent, sighash_type)?;
        Ok(CallContext {
            hash_outputs: committed_outputs_hash(tx, input_index, sighash_type),
            lock_time: tx.lock_time,
            sequence: tx.inputs[input_index].sequence,
            spent_value: spent.value,
            input_index,
            sighash,
            sighash_type,
        })
    }
}

/// Next instance of a stateful contract and the value it is locked at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation<C> {
    pub state: C,
    pub value: Integer,
}

/// Typed method call with its witness arguments
pub trait ContractCall: Sized + Clone + Debug {
    /// Method names; a method's position is its selector in unlocking scripts
    const METHODS: &'static [&'static str];

    fn method(&self) -> &'static str;

    fn to_args(&self) -> Vec<ByteString>;

    fn from_args(method: &str, args: &[ByteString]) -> Result<Self>;

    fn method_index(&self) -> usize {
        let index = Self::METHODS.iter().position(|m| *m == self.method());
        debug_assert!(
            index.is_some(),
            "method {} is not listed in METHODS {:?}",
            self.method(),
            Self::METHODS
        );
        index.unwrap_or_default()
    }

    fn to_unlocking_script(&self) -> ByteString {
        build_unlocking_script(&self.to_args(), self.method_index())
    }

    fn from_unlocking_script(script: &[u8]) -> Result<Self> {
        let (args, index) = parse_unlocking_script(script)?;
        let method = method_name(Self::METHODS, index)?;
        Self::from_args(method, &args)
    }
}

pub(crate) fn method_name(methods: &'static [&'static str], index: usize) -> Result<&'static str> {
    methods.get(index).copied().ok_or_else(|| {
        ContractError::Serialization(format!("method index {index} out of range"))
    })
}

pub trait Contract: Sized + Clone + PartialEq + Debug {
    const KIND: ContractKind;

    type Call: ContractCall;

    /// State fields as concatenated pushes, in declaration order
    fn encode_state(&self) -> Result<ByteString>;

    fn decode_state(reader: &mut ScriptReader<'_>) -> Result<Self>;

    /// Scope of the outputs commitment and signatures for `method`
    fn sighash_type(_method: &str) -> SighashType {
        SighashType::ALL
    }

    /// Outputs a call pins through the outputs commitment, in order
    fn required_outputs(&self, _call: &Self::Call, _spent_value: Integer) -> Result<Vec<TransactionOutput>> {
        Ok(Vec::new())
    }

    fn call(
        &self,
        call: &Self::Call,
        ctx: &CallContext,
        crypto: &dyn CryptoProvider,
    ) -> Result<Option<Continuation<Self>>>;

    fn locking_script(&self) -> Result<ByteString> {
        build_state_script(Self::KIND, &self.encode_state()?)
    }

    fn state_output(&self, value: Integer) -> Result<TransactionOutput> {
        Ok(TransactionOutput {
            value,
            script_pubkey: self.locking_script()?,
        })
    }

    fn from_locking_script(script: &[u8]) -> Result<Self> {
        let (kind, state) = parse_locking_script(script)?;
        if kind != Self::KIND {
            return Err(ContractError::Serialization(format!(
                "expected {:?} contract, found {:?}",
                Self::KIND,
                kind
            )));
        }
        let mut reader = ScriptReader::new(state);
        let decoded = Self::decode_state(&mut reader)?;
        reader.finish()?;
        Ok(decoded)
    }
}

/// verify(method, state, ctx, witness) → next state or none
pub fn verify<C: Contract>(
    method: &str,
    state: &C,
    ctx: &CallContext,
    witness: &[ByteString],
    crypto: &dyn CryptoProvider,
) -> Result<Option<Continuation<C>>> {
    let call = C::Call::from_args(method, witness)?;
    state.call(&call, ctx, crypto)
}

/// Recompute the commitment over `outputs` and require it to match the transaction's
pub fn check_outputs_commitment(
    ctx: &CallContext,
    crypto: &dyn CryptoProvider,
    outputs: &[TransactionOutput],
) -> Result<()> {
    let expected = crypto.double_sha256(&serialize_outputs(outputs));
    if expected != ctx.hash_outputs {
        return Err(ContractError::MalformedCommitment(format!(
            "declared outputs hash to {}, transaction commits to {}",
            hex::encode(expected),
            hex::encode(ctx.hash_outputs)
        )));
    }
    Ok(())
}

/// Signature is DER ‖ sighash flag; the flag must match the method's scope
pub fn check_sig(
    ctx: &CallContext,
    crypto: &dyn CryptoProvider,
    signature: &[u8],
    public_key: &[u8],
) -> Result<()> {
    let (flag, der) = signature
        .split_last()
        .ok_or(RejectReason::SignatureInvalid)?;
    if *flag != ctx.sighash_type.to_byte() {
        return Err(RejectReason::SignatureInvalid.into());
    }
    if !crypto.verify_signature(&ctx.sighash, der, public_key) {
        return Err(RejectReason::SignatureInvalid.into());
    }
    Ok(())
}

/// Positional access to witness arguments
pub struct WitnessArgs<'a> {
    method: &'a str,
    args: &'a [ByteString],
}

impl<'a> WitnessArgs<'a> {
    pub fn new(method: &'a str, args: &'a [ByteString], arity: usize) -> Result<Self> {
        if args.len() != arity {
            return Err(ContractError::Serialization(format!(
                "{} takes {} arguments, got {}",
                method,
                arity,
                args.len()
            )));
        }
        Ok(Self { method, args })
    }

    pub fn bytes(&self, i: usize) -> ByteString {
        self.args[i].clone()
    }

    pub fn int(&self, i: usize) -> Result<Integer> {
        decode_script_num(&self.args[i])
    }

    pub fn array<const N: usize>(&self, i: usize) -> Result<[u8; N]> {
        <[u8; N]>::try_from(self.args[i].as_slice()).map_err(|_| {
            ContractError::Serialization(format!(
                "{} argument {} must be {} bytes, got {}",
                self.method,
                i,
                N,
                self.args[i].len()
            ))
        })
    }
}

pub(crate) fn unknown_method(method: &str) -> ContractError {
    ContractError::Serialization(format!("unknown method `{method}`"))
}
