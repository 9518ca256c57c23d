//! Value-preserving counter: every call locks `count + 1` at the same value.
//!
//! `increment` commits only to its own continuation output (SINGLE |
//! ANYONECANPAY), so anyone may add funding inputs and a change output.

use crate::contract::*;
use crate::crypto::CryptoProvider;
use crate::error::{ContractError, Result};
use crate::script::*;
use crate::sighash::SighashType;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub count: Integer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterCall {
    Increment,
}

impl ContractCall for CounterCall {
    const METHODS: &'static [&'static str] = &["increment"];

    fn method(&self) -> &'static str {
        "increment"
    }

    fn to_args(&self) -> Vec<ByteString> {
        Vec::new()
    }

    fn from_args(method: &str, args: &[ByteString]) -> Result<Self> {
        if method != "increment" {
            return Err(unknown_method(method));
        }
        WitnessArgs::new(method, args, 0)?;
        Ok(CounterCall::Increment)
    }
}

impl Counter {
    pub fn new(count: Integer) -> Self {
        Self { count }
    }

    pub fn next(&self) -> Result<Counter> {
        let count = self
            .count
            .checked_add(1)
            .ok_or_else(|| ContractError::Serialization("counter overflow".to_string()))?;
        Ok(Counter { count })
    }

    pub fn increment(&self, ctx: &CallContext, crypto: &dyn CryptoProvider) -> Result<Continuation<Self>> {
        let next = self.next()?;
        check_outputs_commitment(ctx, crypto, &[next.state_output(ctx.spent_value)?])?;
        Ok(Continuation {
            state: next,
            value: ctx.spent_value,
        })
    }
}

impl Contract for Counter {
    const KIND: ContractKind = ContractKind::Counter;

    type Call = CounterCall;

    fn encode_state(&self) -> Result<ByteString> {
        let mut state = Vec::new();
        push_int(&mut state, self.count);
        Ok(state)
    }

    fn decode_state(reader: &mut ScriptReader<'_>) -> Result<Self> {
        Ok(Counter {
            count: reader.read_int()?,
        })
    }

    fn sighash_type(_method: &str) -> SighashType {
        SighashType::SINGLE_ANYONECANPAY
    }

    fn required_outputs(&self, _call: &CounterCall, spent_value: Integer) -> Result<Vec<TransactionOutput>> {
        Ok(vec![self.next()?.state_output(spent_value)?])
    }

    fn call(
        &self,
        _call: &CounterCall,
        ctx: &CallContext,
        crypto: &dyn CryptoProvider,
    ) -> Result<Option<Continuation<Self>>> {
        self.increment(ctx, crypto).map(Some)
    }
}
