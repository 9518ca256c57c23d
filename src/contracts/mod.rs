//! Contract variants and dynamic dispatch over them

pub mod anyone_can_spend;
pub mod auction;
pub mod cltv;
pub mod counter;
pub mod crowdfund;
pub mod hash_puzzle;
pub mod p2pkh;

pub use anyone_can_spend::{AnyoneCanSpend, AnyoneCanSpendCall};
pub use auction::{Auction, AuctionCall};
pub use cltv::{Cltv, CltvCall};
pub use counter::{Counter, CounterCall};
pub use crowdfund::{Crowdfund, CrowdfundCall};
pub use hash_puzzle::{HashPuzzle, HashPuzzleCall};
pub use p2pkh::{P2pkh, SigUnlock};

use crate::contract::*;
use crate::crypto::CryptoProvider;
use crate::error::Result;
use crate::script::{parse_locking_script, parse_unlocking_script, ContractKind};
use crate::sighash::SighashType;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Any contract instance, as recovered from a locking script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractInstance {
    Auction(Auction),
    Crowdfund(Crowdfund),
    HashPuzzle(HashPuzzle),
    Counter(Counter),
    P2pkh(P2pkh),
    Cltv(Cltv),
    AnyoneCanSpend(AnyoneCanSpend),
}

macro_rules! with_contract {
    ($instance:expr, $c:ident => $body:expr) => {
        match $instance {
            ContractInstance::Auction($c) => $body,
            ContractInstance::Crowdfund($c) => $body,
            ContractInstance::HashPuzzle($c) => $body,
            ContractInstance::Counter($c) => $body,
            ContractInstance::P2pkh($c) => $body,
            ContractInstance::Cltv($c) => $body,
            ContractInstance::AnyoneCanSpend($c) => $body,
        }
    };
}

macro_rules! impl_from_contract {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for ContractInstance {
                fn from(contract: $variant) -> Self {
                    ContractInstance::$variant(contract)
                }
            }
        )*
    };
}

impl_from_contract!(Auction, Crowdfund, HashPuzzle, Counter, P2pkh, Cltv, AnyoneCanSpend);

fn methods_of<C: Contract>(_: &C) -> &'static [&'static str] {
    <C::Call as ContractCall>::METHODS
}

fn sighash_of<C: Contract>(_: &C, method: &str) -> SighashType {
    C::sighash_type(method)
}

fn verify_as<C>(
    contract: &C,
    method: &str,
    ctx: &CallContext,
    witness: &[ByteString],
    crypto: &dyn CryptoProvider,
) -> Result<Option<(ContractInstance, Integer)>>
where
    C: Contract,
    ContractInstance: From<C>,
{
    Ok(verify(method, contract, ctx, witness, crypto)?.map(|next| (next.state.into(), next.value)))
}

impl ContractInstance {
    pub fn kind(&self) -> ContractKind {
        match self {
            ContractInstance::Auction(_) => ContractKind::Auction,
            ContractInstance::Crowdfund(_) => ContractKind::Crowdfund,
            ContractInstance::HashPuzzle(_) => ContractKind::HashPuzzle,
            ContractInstance::Counter(_) => ContractKind::Counter,
            ContractInstance::P2pkh(_) => ContractKind::P2pkh,
            ContractInstance::Cltv(_) => ContractKind::Cltv,
            ContractInstance::AnyoneCanSpend(_) => ContractKind::AnyoneCanSpend,
        }
    }

    pub fn locking_script(&self) -> Result<ByteString> {
        with_contract!(self, c => c.locking_script())
    }

    pub fn state_output(&self, value: Integer) -> Result<TransactionOutput> {
        with_contract!(self, c => c.state_output(value))
    }

    pub fn from_locking_script(script: &[u8]) -> Result<Self> {
        let (kind, _) = parse_locking_script(script)?;
        Ok(match kind {
            ContractKind::Auction => Auction::from_locking_script(script)?.into(),
            ContractKind::Crowdfund => Crowdfund::from_locking_script(script)?.into(),
            ContractKind::HashPuzzle => HashPuzzle::from_locking_script(script)?.into(),
            ContractKind::Counter => Counter::from_locking_script(script)?.into(),
            ContractKind::P2pkh => P2pkh::from_locking_script(script)?.into(),
            ContractKind::Cltv => Cltv::from_locking_script(script)?.into(),
            ContractKind::AnyoneCanSpend => AnyoneCanSpend::from_locking_script(script)?.into(),
        })
    }

    pub fn methods(&self) -> &'static [&'static str] {
        with_contract!(self, c => methods_of(c))
    }

    pub fn sighash_type(&self, method: &str) -> SighashType {
        with_contract!(self, c => sighash_of(c, method))
    }

    /// Run `method` with positional witness arguments
    pub fn verify(
        &self,
        method: &str,
        ctx: &CallContext,
        witness: &[ByteString],
        crypto: &dyn CryptoProvider,
    ) -> Result<Option<(ContractInstance, Integer)>> {
        with_contract!(self, c => verify_as(c, method, ctx, witness, crypto))
    }

    /// Run the method selected by an unlocking script
    pub fn verify_unlocking_script(
        &self,
        unlocking_script: &[u8],
        ctx: &CallContext,
        crypto: &dyn CryptoProvider,
    ) -> Result<Option<(ContractInstance, Integer)>> {
        let (args, index) = parse_unlocking_script(unlocking_script)?;
        let method = method_name(self.methods(), index)?;
        self.verify(method, ctx, &args, crypto)
    }

    /// Method name selected by an unlocking script
    pub fn selected_method(&self, unlocking_script: &[u8]) -> Result<&'static str> {
        let (_, index) = parse_unlocking_script(unlocking_script)?;
        method_name(self.methods(), index)
    }
}
