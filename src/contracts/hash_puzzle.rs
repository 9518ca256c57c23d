//! Spendable by whoever reveals the SHA-256 preimage.

use crate::contract::*;
use crate::crypto::CryptoProvider;
use crate::error::{RejectReason, Result};
use crate::script::*;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashPuzzle {
    pub digest: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashPuzzleCall {
    Unlock { preimage: ByteString },
}

impl ContractCall for HashPuzzleCall {
    const METHODS: &'static [&'static str] = &["unlock"];

    fn method(&self) -> &'static str {
        "unlock"
    }

    fn to_args(&self) -> Vec<ByteString> {
        let HashPuzzleCall::Unlock { preimage } = self;
        vec![preimage.clone()]
    }

    fn from_args(method: &str, args: &[ByteString]) -> Result<Self> {
        if method != "unlock" {
            return Err(unknown_method(method));
        }
        let w = WitnessArgs::new(method, args, 1)?;
        Ok(HashPuzzleCall::Unlock { preimage: w.bytes(0) })
    }
}

impl HashPuzzle {
    pub fn new(digest: Hash) -> Self {
        Self { digest }
    }

    pub fn unlock(&self, preimage: &[u8], crypto: &dyn CryptoProvider) -> Result<()> {
        if crypto.sha256(preimage) != self.digest {
            return Err(RejectReason::HashMismatch.into());
        }
        Ok(())
    }
}

impl Contract for HashPuzzle {
    const KIND: ContractKind = ContractKind::HashPuzzle;

    type Call = HashPuzzleCall;

    fn encode_state(&self) -> Result<ByteString> {
        let mut state = Vec::new();
        push_data(&mut state, &self.digest);
        Ok(state)
    }

    fn decode_state(reader: &mut ScriptReader<'_>) -> Result<Self> {
        Ok(HashPuzzle {
            digest: reader.read_array()?,
        })
    }

    fn call(
        &self,
        call: &HashPuzzleCall,
        _ctx: &CallContext,
        crypto: &dyn CryptoProvider,
    ) -> Result<Option<Continuation<Self>>> {
        let HashPuzzleCall::Unlock { preimage } = call;
        self.unlock(preimage, crypto)?;
        Ok(None)
    }
}
