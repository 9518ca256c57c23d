//! Spendable by anyone, no key required.
//!
//! The only condition is on the output at the spending input's own index,
//! which must pay `output_amount` to `pubkey_hash`. The commitment scope is
//! SINGLE | ANYONECANPAY, so every other input and output is left free.

use crate::contract::*;
use crate::crypto::CryptoProvider;
use crate::error::Result;
use crate::script::*;
use crate::sighash::SighashType;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnyoneCanSpend {
    pub pubkey_hash: PubKeyHash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyoneCanSpendCall {
    Unlock { output_amount: Integer },
}

impl ContractCall for AnyoneCanSpendCall {
    const METHODS: &'static [&'static str] = &["unlock"];

    fn method(&self) -> &'static str {
        "unlock"
    }

    fn to_args(&self) -> Vec<ByteString> {
        let AnyoneCanSpendCall::Unlock { output_amount } = self;
        vec![encode_script_num(*output_amount)]
    }

    fn from_args(method: &str, args: &[ByteString]) -> Result<Self> {
        if method != "unlock" {
            return Err(unknown_method(method));
        }
        let w = WitnessArgs::new(method, args, 1)?;
        Ok(AnyoneCanSpendCall::Unlock {
            output_amount: w.int(0)?,
        })
    }
}

impl AnyoneCanSpend {
    pub fn new(pubkey_hash: PubKeyHash) -> Self {
        Self { pubkey_hash }
    }

    pub fn unlock(&self, output_amount: Integer, ctx: &CallContext, crypto: &dyn CryptoProvider) -> Result<()> {
        check_outputs_commitment(ctx, crypto, &[build_p2pkh_output(&self.pubkey_hash, output_amount)])
    }
}

impl Contract for AnyoneCanSpend {
    const KIND: ContractKind = ContractKind::AnyoneCanSpend;

    type Call = AnyoneCanSpendCall;

    fn encode_state(&self) -> Result<ByteString> {
        let mut state = Vec::new();
        push_data(&mut state, &self.pubkey_hash);
        Ok(state)
    }

    fn decode_state(reader: &mut ScriptReader<'_>) -> Result<Self> {
        Ok(AnyoneCanSpend {
            pubkey_hash: reader.read_array()?,
        })
    }

    fn sighash_type(_method: &str) -> SighashType {
        SighashType::SINGLE_ANYONECANPAY
    }

    fn required_outputs(&self, call: &AnyoneCanSpendCall, _spent_value: Integer) -> Result<Vec<TransactionOutput>> {
        let AnyoneCanSpendCall::Unlock { output_amount } = call;
        Ok(vec![build_p2pkh_output(&self.pubkey_hash, *output_amount)])
    }

    fn call(
        &self,
        call: &AnyoneCanSpendCall,
        ctx: &CallContext,
        crypto: &dyn CryptoProvider,
    ) -> Result<Option<Continuation<Self>>> {
        let AnyoneCanSpendCall::Unlock { output_amount } = call;
        self.unlock(*output_amount, ctx, crypto)?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::test_support::*;
    use crate::sighash::committed_outputs_hash;

    fn spend_tx(outputs: Vec<TransactionOutput>) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prevout: OutPoint { hash: [1; 32], index: 0 },
                script_sig: vec![],
                sequence: 0,
            }],
            outputs,
            lock_time: 0,
        }
    }

    #[test]
    fn test_unlock_ignores_extra_outputs() {
        let acs = AnyoneCanSpend::new([8; 20]);
        let tx = spend_tx(vec![
            build_p2pkh_output(&[8; 20], 1),
            build_p2pkh_output(&[9; 20], 5000),
        ]);
        let ctx = CallContext {
            hash_outputs: committed_outputs_hash(&tx, 0, SighashType::SINGLE_ANYONECANPAY),
            ..base_ctx()
        };
        assert!(acs.unlock(1, &ctx, &crypto()).is_ok());
    }

    #[test]
    fn test_unlock_wrong_amount() {
        let acs = AnyoneCanSpend::new([8; 20]);
        let tx = spend_tx(vec![build_p2pkh_output(&[8; 20], 1)]);
        let ctx = CallContext {
            hash_outputs: committed_outputs_hash(&tx, 0, SighashType::SINGLE_ANYONECANPAY),
            ..base_ctx()
        };
        assert!(acs.unlock(2, &ctx, &crypto()).is_err());
    }
}
