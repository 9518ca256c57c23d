//! # Covenant-Proof
//!
//! Verification of UTXO-model state-transition contracts, plus a builder for
//! the transactions that call them.
//!
//! A contract instance is an immutable state value serialized into the
//! locking script of a transaction output. Calling one of its methods spends
//! that output: the method checks the spending transaction (through the
//! outputs commitment, lock time, sequence and signatures) and, for stateful
//! contracts, names the successor instance that must be locked in the same
//! transaction.
//!
//! ## Design Principles
//!
//! 1. **Pure Verification**: contract methods are deterministic functions of
//!    state, call context and witness arguments
//! 2. **Commitment Binding**: a method accepts only if the outputs it declares
//!    hash to the commitment the transaction signs
//! 3. **Two-Phase Building**: witnesses are attached only after a transaction
//!    is sealed
//! 4. **Injected Collaborators**: keys, UTXO discovery and fees come from the
//!    caller
//!
//! ## Usage
//!
//! ```rust
//! use covenant_proof::CovenantProof;
//! use covenant_proof::contracts::{ContractInstance, HashPuzzle};
//! use covenant_proof::crypto::sha256;
//!
//! let proof = CovenantProof::new();
//! let puzzle: ContractInstance = HashPuzzle::new(sha256(b"open sesame")).into();
//! let script = proof.locking_script(&puzzle).unwrap();
//! assert_eq!(proof.parse_locking_script(&script).unwrap(), puzzle);
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod crypto;
pub mod script;
pub mod transaction;
pub mod sighash;
pub mod timelock;
pub mod contract;
pub mod contracts;
pub mod arena;
pub mod collaborators;
pub mod config;
pub mod builder;

// Re-export commonly used types
pub use types::*;
pub use constants::*;
pub use error::{ContractError, RejectReason, Result};
pub use contract::{CallContext, Contract, ContractCall, Continuation};
pub use contracts::ContractInstance;

use crypto::{CryptoProvider, Secp256k1Crypto};
use sighash::SighashType;

/// Main contract verification entry point
///
/// # Examples
///
/// ```
/// use covenant_proof::CovenantProof;
/// use covenant_proof::types::*;
///
/// let proof = CovenantProof::new();
///
/// let tx = Transaction {
///     version: 1,
///     inputs: vec![TransactionInput {
///         prevout: OutPoint {
///             hash: [0u8; 32],
///             index: 0,
///         },
///         script_sig: vec![0x00],
///         sequence: 0xffffffff,
///     }],
///     outputs: vec![TransactionOutput {
///         value: 1000,
///         script_pubkey: vec![0x51],
///     }],
///     lock_time: 0,
/// };
///
/// let result = proof.validate_transaction(&tx).unwrap();
/// assert_eq!(result, ValidationResult::Valid);
/// ```
pub struct CovenantProof {
    crypto: Box<dyn CryptoProvider>,
}

impl CovenantProof {
    /// Create a verifier backed by secp256k1
    ///
    /// # Examples
    ///
    /// ```
    /// use covenant_proof::CovenantProof;
    ///
    /// let proof = CovenantProof::new();
    /// ```
    pub fn new() -> Self {
        Self::with_crypto(Box::new(Secp256k1Crypto::new()))
    }

    pub fn with_crypto(crypto: Box<dyn CryptoProvider>) -> Self {
        Self { crypto }
    }

    pub fn crypto(&self) -> &dyn CryptoProvider {
        self.crypto.as_ref()
    }

    /// Structural checks on a transaction: non-empty, value bounds, sizes
    pub fn validate_transaction(&self, tx: &Transaction) -> Result<ValidationResult> {
        transaction::check_transaction(tx)
    }

    /// Run `method` on `instance` with positional witness arguments
    ///
    /// Returns the successor instance and its locked value for methods that
    /// continue the contract.
    ///
    /// # Examples
    ///
    /// ```
    /// use covenant_proof::{CovenantProof, RejectReason};
    /// use covenant_proof::contract::CallContext;
    /// use covenant_proof::contracts::{ContractInstance, HashPuzzle};
    /// use covenant_proof::crypto::sha256;
    /// use covenant_proof::sighash::SighashType;
    ///
    /// let proof = CovenantProof::new();
    /// let puzzle: ContractInstance = HashPuzzle::new(sha256(b"abc")).into();
    /// let ctx = CallContext {
    ///     hash_outputs: [0; 32],
    ///     lock_time: 0,
    ///     sequence: 0xffffffff,
    ///     spent_value: 1000,
    ///     input_index: 0,
    ///     sighash: [0; 32],
    ///     sighash_type: SighashType::ALL,
    /// };
    ///
    /// assert!(proof.verify_call(&puzzle, "unlock", &ctx, &[b"abc".to_vec()]).is_ok());
    ///
    /// let err = proof.verify_call(&puzzle, "unlock", &ctx, &[b"abd".to_vec()]).unwrap_err();
    /// assert_eq!(err.reject_reason(), Some(RejectReason::HashMismatch));
    /// ```
    pub fn verify_call(
        &self,
        instance: &ContractInstance,
        method: &str,
        ctx: &CallContext,
        witness: &[ByteString],
    ) -> Result<Option<(ContractInstance, Integer)>> {
        instance.verify(method, ctx, witness, self.crypto())
    }

    /// Verify input `input_index` of a complete transaction
    ///
    /// The spent output's locking script selects the contract, the input's
    /// unlocking script selects the method and carries its arguments, and the
    /// call context is derived from the transaction itself.
    pub fn verify_input(
        &self,
        tx: &Transaction,
        input_index: usize,
        spent_outputs: &[TransactionOutput],
    ) -> Result<Option<(ContractInstance, Integer)>> {
        let spent = spent_outputs.get(input_index).ok_or_else(|| {
            ContractError::TransactionValidation(format!(
                "no spent output for input {} ({} given)",
                input_index,
                spent_outputs.len()
            ))
        })?;
        let input = tx.inputs.get(input_index).ok_or_else(|| {
            ContractError::TransactionValidation(format!(
                "input index {} out of range ({} inputs)",
                input_index,
                tx.inputs.len()
            ))
        })?;

        let instance = ContractInstance::from_locking_script(&spent.script_pubkey)?;
        let method = instance.selected_method(&input.script_sig)?;
        let ctx = CallContext::from_transaction(tx, input_index, spent, instance.sighash_type(method))?;
        instance.verify_unlocking_script(&input.script_sig, &ctx, self.crypto())
    }

    /// hash256 of the serialized outputs, as a method recomputes it
    ///
    /// # Examples
    ///
    /// ```
    /// use covenant_proof::CovenantProof;
    /// use covenant_proof::script::build_p2pkh_output;
    ///
    /// let proof = CovenantProof::new();
    /// let a = proof.outputs_commitment(&[build_p2pkh_output(&[1; 20], 1000)]);
    /// let b = proof.outputs_commitment(&[build_p2pkh_output(&[1; 20], 1001)]);
    /// assert_ne!(a, b);
    /// ```
    pub fn outputs_commitment(&self, outputs: &[TransactionOutput]) -> Hash {
        self.crypto.double_sha256(&transaction::serialize_outputs(outputs))
    }

    pub fn locking_script(&self, instance: &ContractInstance) -> Result<ByteString> {
        instance.locking_script()
    }

    pub fn parse_locking_script(&self, script: &[u8]) -> Result<ContractInstance> {
        ContractInstance::from_locking_script(script)
    }

    /// Sighash scope of `method` on `instance`
    pub fn sighash_type(&self, instance: &ContractInstance, method: &str) -> SighashType {
        instance.sighash_type(method)
    }
}

impl Default for CovenantProof {
    fn default() -> Self {
        Self::new()
    }
}
