//! Ascending-bid auction
//!
//! Each higher bid replaces the locked instance, refunding the previous
//! highest bidder in the same transaction. After the deadline the auctioneer
//! closes the auction with a signature.

use crate::contract::*;
use crate::crypto::CryptoProvider;
use crate::error::{RejectReason, Result};
use crate::script::*;
use crate::timelock::check_time_lock;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    /// Current highest bidder
    pub bidder: PubKeyHash,
    pub auctioneer: PubKey,
    /// Block height or timestamp
    pub deadline: Natural,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuctionCall {
    Bid {
        bidder: PubKeyHash,
        bid: Integer,
        change: Integer,
    },
    Close {
        signature: ByteString,
    },
}

impl ContractCall for AuctionCall {
    const METHODS: &'static [&'static str] = &["bid", "close"];

    fn method(&self) -> &'static str {
        match self {
            AuctionCall::Bid { .. } => "bid",
            AuctionCall::Close { .. } => "close",
        }
    }

    fn to_args(&self) -> Vec<ByteString> {
        match self {
            AuctionCall::Bid { bidder, bid, change } => vec![
                bidder.to_vec(),
                encode_script_num(*bid),
                encode_script_num(*change),
            ],
            AuctionCall::Close { signature } => vec![signature.clone()],
        }
    }

    fn from_args(method: &str, args: &[ByteString]) -> Result<Self> {
        match method {
            "bid" => {
                let w = WitnessArgs::new(method, args, 3)?;
                Ok(AuctionCall::Bid {
                    bidder: w.array(0)?,
                    bid: w.int(1)?,
                    change: w.int(2)?,
                })
            }
            "close" => {
                let w = WitnessArgs::new(method, args, 1)?;
                Ok(AuctionCall::Close { signature: w.bytes(0) })
            }
            _ => Err(unknown_method(method)),
        }
    }
}

impl Auction {
    pub fn new(bidder: PubKeyHash, auctioneer: PubKey, deadline: Natural) -> Self {
        Self {
            bidder,
            auctioneer,
            deadline,
        }
    }

    /// Continuation at `bid`, refund of `highest` to the outgoing bidder, optional change
    pub fn bid_outputs(
        &self,
        bidder: &PubKeyHash,
        bid: Integer,
        change: Integer,
        highest: Integer,
    ) -> Result<Vec<TransactionOutput>> {
        let next = Auction {
            bidder: *bidder,
            ..self.clone()
        };

        let mut outputs = vec![
            next.state_output(bid)?,
            build_p2pkh_output(&self.bidder, highest),
        ];
        if change > 0 {
            outputs.push(build_p2pkh_output(bidder, change));
        }
        Ok(outputs)
    }

    pub fn bid(
        &self,
        bidder: &PubKeyHash,
        bid: Integer,
        change: Integer,
        ctx: &CallContext,
        crypto: &dyn CryptoProvider,
    ) -> Result<Continuation<Self>> {
        let highest = ctx.spent_value;
        if bid <= highest {
            return Err(RejectReason::BidTooLow.into());
        }

        let outputs = self.bid_outputs(bidder, bid, change, highest)?;
        check_outputs_commitment(ctx, crypto, &outputs)?;

        Ok(Continuation {
            state: Auction {
                bidder: *bidder,
                ..self.clone()
            },
            value: bid,
        })
    }

    pub fn close(&self, signature: &[u8], ctx: &CallContext, crypto: &dyn CryptoProvider) -> Result<()> {
        check_time_lock(self.deadline, ctx.lock_time, ctx.sequence)?;
        check_sig(ctx, crypto, signature, &self.auctioneer)
    }
}

impl Contract for Auction {
    const KIND: ContractKind = ContractKind::Auction;

    type Call = AuctionCall;

    fn encode_state(&self) -> Result<ByteString> {
        let mut state = Vec::new();
        push_data(&mut state, &self.bidder);
        push_data(&mut state, &self.auctioneer);
        push_natural(&mut state, self.deadline)?;
        Ok(state)
    }

    fn decode_state(reader: &mut ScriptReader<'_>) -> Result<Self> {
        Ok(Auction {
            bidder: reader.read_array()?,
            auctioneer: reader.read_bytes()?,
            deadline: reader.read_natural()?,
        })
    }

    fn required_outputs(&self, call: &AuctionCall, spent_value: Integer) -> Result<Vec<TransactionOutput>> {
        match call {
            AuctionCall::Bid { bidder, bid, change } => self.bid_outputs(bidder, *bid, *change, spent_value),
            AuctionCall::Close { .. } => Ok(Vec::new()),
        }
    }

    fn call(
        &self,
        call: &AuctionCall,
        ctx: &CallContext,
        crypto: &dyn CryptoProvider,
    ) -> Result<Option<Continuation<Self>>> {
        match call {
            AuctionCall::Bid { bidder, bid, change } => {
                self.bid(bidder, *bid, *change, ctx, crypto).map(Some)
            }
            AuctionCall::Close { signature } => self.close(signature, ctx, crypto).map(|_| None),
        }
    }
}
