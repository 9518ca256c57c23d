//! Pay to public key hash.

use crate::contract::*;
use crate::crypto::CryptoProvider;
use crate::error::{RejectReason, Result};
use crate::script::*;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct P2pkh {
    pub pubkey_hash: PubKeyHash,
}

/// `unlock(sig, pubkey)` of the P2PKH contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigUnlock {
    pub signature: ByteString,
    pub public_key: PubKey,
}

impl ContractCall for SigUnlock {
    const METHODS: &'static [&'static str] = &["unlock"];

    fn method(&self) -> &'static str {
        "unlock"
    }

    fn to_args(&self) -> Vec<ByteString> {
        vec![self.signature.clone(), self.public_key.clone()]
    }

    fn from_args(method: &str, args: &[ByteString]) -> Result<Self> {
        if method != "unlock" {
            return Err(unknown_method(method));
        }
        let w = WitnessArgs::new(method, args, 2)?;
        Ok(SigUnlock {
            signature: w.bytes(0),
            public_key: w.bytes(1),
        })
    }
}

impl P2pkh {
    pub fn new(pubkey_hash: PubKeyHash) -> Self {
        Self { pubkey_hash }
    }

    pub fn unlock(
        &self,
        signature: &[u8],
        public_key: &[u8],
        ctx: &CallContext,
        crypto: &dyn CryptoProvider,
    ) -> Result<()> {
        if crypto.hash160(public_key) != self.pubkey_hash {
            return Err(RejectReason::PubKeyHashMismatch.into());
        }
        check_sig(ctx, crypto, signature, public_key)
    }
}

impl Contract for P2pkh {
    const KIND: ContractKind = ContractKind::P2pkh;

    type Call = SigUnlock;

    fn encode_state(&self) -> Result<ByteString> {
        let mut state = Vec::new();
        push_data(&mut state, &self.pubkey_hash);
        Ok(state)
    }

    fn decode_state(reader: &mut ScriptReader<'_>) -> Result<Self> {
        Ok(P2pkh {
            pubkey_hash: reader.read_array()?,
        })
    }

    fn call(
        &self,
        call: &SigUnlock,
        ctx: &CallContext,
        crypto: &dyn CryptoProvider,
    ) -> Result<Option<Continuation<Self>>> {
        self.unlock(&call.signature, &call.public_key, ctx, crypto)?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::test_support::*;

    #[test]
    fn test_unlock_with_owner_key() {
        let key = TestKey::new(4);
        let p2pkh = P2pkh::new(key.pubkey_hash());
        let ctx = timed_ctx(0, 0);
        assert!(p2pkh.unlock(&key.sign(&ctx), &key.public_key(), &ctx, &crypto()).is_ok());
    }

    #[test]
    fn test_unlock_with_other_pubkey() {
        let key = TestKey::new(4);
        let other = TestKey::new(5);
        let p2pkh = P2pkh::new(key.pubkey_hash());
        let ctx = timed_ctx(0, 0);
        let err = p2pkh
            .unlock(&other.sign(&ctx), &other.public_key(), &ctx, &crypto())
            .unwrap_err();
        assert_eq!(err.reject_reason(), Some(RejectReason::PubKeyHashMismatch));
    }

    #[test]
    fn test_unlock_with_signature_over_other_digest() {
        let key = TestKey::new(4);
        let p2pkh = P2pkh::new(key.pubkey_hash());
        let ctx = timed_ctx(0, 0);
        let mut other_ctx = ctx.clone();
        other_ctx.sighash = [0x42; 32];
        let err = p2pkh
            .unlock(&key.sign(&other_ctx), &key.public_key(), &ctx, &crypto())
            .unwrap_err();
        assert_eq!(err.reject_reason(), Some(RejectReason::SignatureInvalid));
    }
}
