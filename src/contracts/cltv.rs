//! Output that only becomes spendable once the lock time is reached.

use crate::contract::*;
use crate::crypto::CryptoProvider;
use crate::error::Result;
use crate::script::*;
use crate::timelock::check_time_lock;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cltv {
    pub lock_time_min: Natural,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CltvCall {
    Unlock,
}

impl ContractCall for CltvCall {
    const METHODS: &'static [&'static str] = &["unlock"];

    fn method(&self) -> &'static str {
        "unlock"
    }

    fn to_args(&self) -> Vec<ByteString> {
        Vec::new()
    }

    fn from_args(method: &str, args: &[ByteString]) -> Result<Self> {
        if method != "unlock" {
            return Err(unknown_method(method));
        }
        WitnessArgs::new(method, args, 0)?;
        Ok(CltvCall::Unlock)
    }
}

impl Cltv {
    pub fn new(lock_time_min: Natural) -> Self {
        Self { lock_time_min }
    }

    pub fn unlock(&self, ctx: &CallContext) -> Result<()> {
        check_time_lock(self.lock_time_min, ctx.lock_time, ctx.sequence)?;
        Ok(())
    }
}

impl Contract for Cltv {
    const KIND: ContractKind = ContractKind::Cltv;

    type Call = CltvCall;

    fn encode_state(&self) -> Result<ByteString> {
        let mut state = Vec::new();
        push_natural(&mut state, self.lock_time_min)?;
        Ok(state)
    }

    fn decode_state(reader: &mut ScriptReader<'_>) -> Result<Self> {
        Ok(Cltv {
            lock_time_min: reader.read_natural()?,
        })
    }

    fn call(
        &self,
        _call: &CltvCall,
        ctx: &CallContext,
        _crypto: &dyn CryptoProvider,
    ) -> Result<Option<Continuation<Self>>> {
        self.unlock(ctx)?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::contracts::test_support::*;
    use crate::error::{ContractError, RejectReason};

    #[test]
    fn test_unlock_after_mature_time() {
        let mature = 1_700_000_000;
        let cltv = Cltv::new(mature);
        assert!(cltv.unlock(&timed_ctx(mature, 0)).is_ok());
        assert!(cltv.unlock(&timed_ctx(mature + 10, 0)).is_ok());
    }

    #[test]
    fn test_unlock_before_mature_time() {
        let cltv = Cltv::new(1_700_000_000);
        let err = cltv.unlock(&timed_ctx(1_699_999_999, 0)).unwrap_err();
        assert_eq!(err.reject_reason(), Some(RejectReason::DeadlineNotReached));
    }

    #[test]
    fn test_unlock_with_final_sequence() {
        let err = Cltv::new(10).unlock(&timed_ctx(10, SEQUENCE_FINAL)).unwrap_err();
        assert_eq!(err.reject_reason(), Some(RejectReason::LocktimeDisabled));
    }

    #[test]
    fn test_unlock_takes_no_arguments() {
        let cltv = Cltv::new(100);
        let ctx = timed_ctx(100, 0);
        assert!(verify("unlock", &cltv, &ctx, &[], &crypto()).unwrap().is_none());
        assert!(matches!(
            verify("unlock", &cltv, &ctx, &[vec![0x01]], &crypto()),
            Err(ContractError::Serialization(_))
        ));
    }

    #[test]
    fn test_state_roundtrip() {
        let cltv = Cltv::new(LOCKTIME_THRESHOLD);
        let script = cltv.locking_script().unwrap();
        assert_eq!(Cltv::from_locking_script(&script).unwrap(), cltv);
    }

    #[test]
    fn test_lock_time_beyond_script_range() {
        assert!(matches!(
            Cltv::new(u64::MAX).locking_script(),
            Err(ContractError::Serialization(_))
        ));
    }
}
