//! Crowdfunding: the recipient collects once the target is met, otherwise
//! the contributor takes the funds back after the deadline.

use crate::contract::*;
use crate::crypto::CryptoProvider;
use crate::error::{RejectReason, Result};
use crate::script::*;
use crate::timelock::check_time_lock;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crowdfund {
    pub recipient: PubKeyHash,
    pub contributor: PubKey,
    pub deadline: Natural,
    pub target: Integer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrowdfundCall {
    Collect { raised: Integer },
    Refund { signature: ByteString },
}

impl ContractCall for CrowdfundCall {
    const METHODS: &'static [&'static str] = &["collect", "refund"];

    fn method(&self) -> &'static str {
        match self {
            CrowdfundCall::Collect { .. } => "collect",
            CrowdfundCall::Refund { .. } => "refund",
        }
    }

    fn to_args(&self) -> Vec<ByteString> {
        match self {
            CrowdfundCall::Collect { raised } => vec![encode_script_num(*raised)],
            CrowdfundCall::Refund { signature } => vec![signature.clone()],
        }
    }

    fn from_args(method: &str, args: &[ByteString]) -> Result<Self> {
        let w = WitnessArgs::new(method, args, 1);
        match method {
            "collect" => Ok(CrowdfundCall::Collect { raised: w?.int(0)? }),
            "refund" => Ok(CrowdfundCall::Refund { signature: w?.bytes(0) }),
            _ => Err(unknown_method(method)),
        }
    }
}

impl Crowdfund {
    pub fn new(recipient: PubKeyHash, contributor: PubKey, deadline: Natural, target: Integer) -> Self {
        Self {
            recipient,
            contributor,
            deadline,
            target,
        }
    }

    pub fn collect(&self, raised: Integer, ctx: &CallContext, crypto: &dyn CryptoProvider) -> Result<()> {
        if raised < self.target {
            return Err(RejectReason::TargetNotReached.into());
        }
        check_outputs_commitment(ctx, crypto, &[build_p2pkh_output(&self.recipient, raised)])
    }

    pub fn refund(&self, signature: &[u8], ctx: &CallContext, crypto: &dyn CryptoProvider) -> Result<()> {
        check_time_lock(self.deadline, ctx.lock_time, ctx.sequence)?;
        check_sig(ctx, crypto, signature, &self.contributor)
    }
}

impl Contract for Crowdfund {
    const KIND: ContractKind = ContractKind::Crowdfund;

    type Call = CrowdfundCall;

    fn encode_state(&self) -> Result<ByteString> {
        let mut state = Vec::new();
        push_data(&mut state, &self.recipient);
        push_data(&mut state, &self.contributor);
        push_natural(&mut state, self.deadline)?;
        push_int(&mut state, self.target);
        Ok(state)
    }

    fn decode_state(reader: &mut ScriptReader<'_>) -> Result<Self> {
        Ok(Crowdfund {
            recipient: reader.read_array()?,
            contributor: reader.read_bytes()?,
            deadline: reader.read_natural()?,
            target: reader.read_int()?,
        })
    }

    fn required_outputs(&self, call: &CrowdfundCall, _spent_value: Integer) -> Result<Vec<TransactionOutput>> {
        match call {
            CrowdfundCall::Collect { raised } => Ok(vec![build_p2pkh_output(&self.recipient, *raised)]),
            CrowdfundCall::Refund { .. } => Ok(Vec::new()),
        }
    }

    fn call(
        &self,
        call: &CrowdfundCall,
        ctx: &CallContext,
        crypto: &dyn CryptoProvider,
    ) -> Result<Option<Continuation<Self>>> {
        match call {
            CrowdfundCall::Collect { raised } => self.collect(*raised, ctx, crypto)?,
            CrowdfundCall::Refund { signature } => self.refund(signature, ctx, crypto)?,
        }
        Ok(None)
    }
}
