//! Transaction template builder
//!
//! Building a contract call is two-phase. A [`TransactionTemplate`] collects
//! inputs, outputs, lock time and sequences; [`TransactionTemplate::seal`]
//! freezes them into a [`SealedTransaction`], from which call contexts and
//! sighashes are derived. Unlocking scripts are attached only to a sealed
//! transaction, which exposes no way to touch outputs, so the digest a
//! witness signs is the digest of the transaction that gets broadcast.
//!
//! [`ContractCaller`] drives the whole flow for one contract input: it
//! builds the template from a [`CallPlan`], seals it, asks for the typed
//! call, verifies that call locally, then attaches it and signs funding
//! inputs.

use crate::arena::{InstanceArena, InstanceId};
use crate::collaborators::{Deployer, FeeStrategy, OutputSource, Signer};
use crate::config::BuilderConfig;
use crate::constants::SEQUENCE_FINAL;
use crate::contract::{CallContext, Contract, ContractCall};
use crate::contracts::*;
use crate::crypto::CryptoProvider;
use crate::error::{ContractError, Result};
use crate::script::{build_p2pkh_output, build_p2pkh_script, push_data};
use crate::sighash::{signature_hash, SighashType};
use crate::transaction::{check_transaction, serialize_transaction, txid, txid_hex};
use crate::types::*;
use tracing::{debug, info, warn};

/// How a template input gets unlocked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputUnlock {
    /// Contract method call; the witness is supplied after sealing
    Contract { sighash_type: SighashType },
    /// Plain P2PKH funding input signed through the [`Signer`]
    P2pkh { key_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateInput {
    pub utxo: Utxo,
    pub sequence: Natural,
    pub unlock: InputUnlock,
}

/// Serialized size with a placeholder unlocking script on every input
pub fn estimated_size(
    version: Natural,
    input_count: usize,
    outputs: &[TransactionOutput],
    unlock_size: usize,
) -> usize {
    let draft = Transaction {
        version,
        inputs: (0..input_count)
            .map(|_| TransactionInput {
                prevout: OutPoint { hash: [0; 32], index: 0 },
                script_sig: vec![0; unlock_size],
                sequence: 0,
            })
            .collect(),
        outputs: outputs.to_vec(),
        lock_time: 0,
    };
    serialize_transaction(&draft).len()
}

/// Mutable phase: inputs and outputs may still change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionTemplate {
    version: Natural,
    inputs: Vec<TemplateInput>,
    outputs: Vec<TransactionOutput>,
    lock_time: Natural,
}

impl TransactionTemplate {
    pub fn new(version: Natural) -> Self {
        Self {
            version,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }

    pub fn inputs(&self) -> &[TemplateInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TransactionOutput] {
        &self.outputs
    }

    pub fn add_contract_input(&mut self, utxo: Utxo, sighash_type: SighashType, sequence: Natural) -> usize {
        self.inputs.push(TemplateInput {
            utxo,
            sequence,
            unlock: InputUnlock::Contract { sighash_type },
        });
        self.inputs.len() - 1
    }

    pub fn add_funding_input(&mut self, utxo: Utxo, key_id: &str) -> usize {
        self.inputs.push(TemplateInput {
            utxo,
            sequence: SEQUENCE_FINAL,
            unlock: InputUnlock::P2pkh {
                key_id: key_id.to_string(),
            },
        });
        self.inputs.len() - 1
    }

    pub fn add_output(&mut self, output: TransactionOutput) -> usize {
        self.outputs.push(output);
        self.outputs.len() - 1
    }

    pub fn set_lock_time(&mut self, lock_time: Natural) {
        self.lock_time = lock_time;
    }

    pub fn set_sequence(&mut self, input_index: usize, sequence: Natural) -> Result<()> {
        let input = self.inputs.get_mut(input_index).ok_or_else(|| {
            ContractError::Builder(format!("no input at index {}", input_index))
        })?;
        input.sequence = sequence;
        Ok(())
    }

    pub fn input_value(&self) -> Integer {
        self.inputs.iter().map(|i| i.utxo.value()).sum()
    }

    pub fn output_value(&self) -> Integer {
        self.outputs.iter().map(|o| o.value).sum()
    }

    pub fn estimated_size(&self, unlock_size: usize) -> usize {
        estimated_size(self.version, self.inputs.len(), &self.outputs, unlock_size)
    }

    /// Append a P2PKH change output balancing inputs against outputs plus fee
    ///
    /// Returns the change amount, or `None` when it falls below `dust_limit`
    /// and is left to the fee.
    pub fn add_change(
        &mut self,
        to: &PubKeyHash,
        fees: &dyn FeeStrategy,
        unlock_size: usize,
        dust_limit: Integer,
    ) -> Result<Option<Integer>> {
        let mut draft = self.outputs.clone();
        draft.push(build_p2pkh_output(to, 0));
        let fee = fees.fee(estimated_size(self.version, self.inputs.len(), &draft, unlock_size));

        let change = self
            .input_value()
            .checked_sub(self.output_value())
            .and_then(|rest| rest.checked_sub(fee))
            .filter(|change| *change >= 0)
            .ok_or_else(|| {
                ContractError::Builder(format!(
                    "insufficient funds: inputs {} < outputs {} + fee {}",
                    self.input_value(),
                    self.output_value(),
                    fee
                ))
            })?;
        if change < dust_limit {
            debug!(change, dust_limit, "change below dust limit, left to fee");
            return Ok(None);
        }
        self.outputs.push(build_p2pkh_output(to, change));
        Ok(Some(change))
    }

    /// Freeze inputs, outputs, lock time and sequences
    pub fn seal(self) -> Result<SealedTransaction> {
        if self.inputs.is_empty() {
            return Err(ContractError::Builder("template has no inputs".to_string()));
        }
        if self.input_value() < self.output_value() {
            return Err(ContractError::Builder(format!(
                "outputs {} exceed inputs {}",
                self.output_value(),
                self.input_value()
            )));
        }

        let tx = Transaction {
            version: self.version,
            inputs: self
                .inputs
                .iter()
                .map(|i| TransactionInput {
                    prevout: i.utxo.outpoint,
                    script_sig: Vec::new(),
                    sequence: i.sequence,
                })
                .collect(),
            outputs: self.outputs,
            lock_time: self.lock_time,
        };
        debug!(
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            lock_time = tx.lock_time,
            "template sealed"
        );
        Ok(SealedTransaction {
            tx,
            inputs: self.inputs,
        })
    }
}

/// Sealed phase: only unlocking scripts may be attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedTransaction {
    tx: Transaction,
    inputs: Vec<TemplateInput>,
}

impl SealedTransaction {
    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    fn input(&self, input_index: usize) -> Result<&TemplateInput> {
        self.inputs.get(input_index).ok_or_else(|| {
            ContractError::Builder(format!("no input at index {}", input_index))
        })
    }

    pub fn spent_output(&self, input_index: usize) -> Result<&TransactionOutput> {
        Ok(&self.input(input_index)?.utxo.output)
    }

    pub fn sighash_type(&self, input_index: usize) -> Result<SighashType> {
        Ok(match self.input(input_index)?.unlock {
            InputUnlock::Contract { sighash_type } => sighash_type,
            InputUnlock::P2pkh { .. } => SighashType::ALL,
        })
    }

    pub fn sighash(&self, input_index: usize) -> Result<Hash> {
        let input = self.input(input_index)?;
        signature_hash(
            &self.tx,
            input_index,
            &input.utxo.output,
            self.sighash_type(input_index)?,
        )
    }

    pub fn call_context(&self, input_index: usize) -> Result<CallContext> {
        CallContext::from_transaction(
            &self.tx,
            input_index,
            self.spent_output(input_index)?,
            self.sighash_type(input_index)?,
        )
    }

    pub fn set_unlocking_script(&mut self, input_index: usize, script: ByteString) -> Result<()> {
        self.input(input_index)?;
        self.tx.inputs[input_index].script_sig = script;
        Ok(())
    }

    /// Sign every P2PKH funding input with SIGHASH_ALL
    pub fn sign_funding_inputs(&mut self, signer: &dyn Signer) -> Result<()> {
        for index in 0..self.inputs.len() {
            let key_id = match &self.inputs[index].unlock {
                InputUnlock::P2pkh { key_id } => key_id.clone(),
                InputUnlock::Contract { .. } => continue,
            };
            let digest = self.sighash(index)?;
            let mut signature = signer.sign(&digest, &key_id).map_err(ContractError::external)?;
            signature.push(SighashType::ALL.to_byte());
            let public_key = signer.public_key(&key_id).map_err(ContractError::external)?;

            let mut script = Vec::with_capacity(signature.len() + public_key.len() + 2);
            push_data(&mut script, &signature);
            push_data(&mut script, &public_key);
            self.set_unlocking_script(index, script)?;
            debug!(input = index, key_id = %key_id, "funding input signed");
        }
        Ok(())
    }

    /// Require every input to be unlocked and the result to be well formed
    pub fn finalize(self) -> Result<Transaction> {
        if let Some(index) = self.tx.inputs.iter().position(|i| i.script_sig.is_empty()) {
            return Err(ContractError::Builder(format!(
                "input {} has no unlocking script",
                index
            )));
        }
        match check_transaction(&self.tx)? {
            ValidationResult::Valid => Ok(self.tx),
            ValidationResult::Invalid(reason) => Err(ContractError::TransactionValidation(reason)),
        }
    }
}

/// P2PKH outputs owned by one signer key, used to pay for a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Funding {
    pub key_id: String,
    pub pubkey_hash: PubKeyHash,
    pub utxos: Vec<Utxo>,
}

impl Funding {
    pub fn total(&self) -> Integer {
        self.utxos.iter().map(Utxo::value).sum()
    }
}

/// Everything needed to spend one contract output, short of the witness
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPlan {
    pub instance: ContractInstance,
    pub method: &'static str,
    /// The contract output being spent; always input 0
    pub utxo: Utxo,
    /// Outputs in order, starting at index 0
    pub outputs: Vec<TransactionOutput>,
    /// Receives inputs minus outputs minus fee as a trailing output
    pub remainder_to: Option<PubKeyHash>,
    pub funding: Option<Funding>,
    pub lock_time: Natural,
    pub sequence: Natural,
}

impl CallPlan {
    pub fn new(instance: ContractInstance, method: &str, utxo: Utxo) -> Result<Self> {
        let method = instance
            .methods()
            .iter()
            .copied()
            .find(|m| *m == method)
            .ok_or_else(|| {
                ContractError::Builder(format!(
                    "{:?} contract has no method `{}`",
                    instance.kind(),
                    method
                ))
            })?;
        Ok(Self {
            instance,
            method,
            utxo,
            outputs: Vec::new(),
            remainder_to: None,
            funding: None,
            lock_time: 0,
            sequence: SEQUENCE_FINAL,
        })
    }

    pub fn with_outputs(mut self, outputs: Vec<TransactionOutput>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn pay_remainder_to(mut self, pubkey_hash: PubKeyHash) -> Self {
        self.remainder_to = Some(pubkey_hash);
        self
    }

    pub fn funded_by(mut self, funding: Funding) -> Self {
        self.funding = Some(funding);
        self
    }

    pub fn with_lock_time(mut self, lock_time: Natural) -> Self {
        self.lock_time = lock_time;
        self
    }

    pub fn with_sequence(mut self, sequence: Natural) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn sighash_type(&self) -> SighashType {
        self.instance.sighash_type(self.method)
    }

    fn input_count(&self) -> usize {
        1 + self.funding.as_ref().map_or(0, |f| f.utxos.len())
    }
}

/// New contract instance produced by a call, and where it is locked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextInstance {
    pub instance: ContractInstance,
    pub utxo: Utxo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub transaction: Transaction,
    pub txid: Hash,
    pub method: &'static str,
    pub continuation: Option<NextInstance>,
}

impl CallOutcome {
    /// Record the continuation as the successor of `from`
    pub fn record(&self, arena: &mut InstanceArena, from: InstanceId) -> Result<Option<InstanceId>> {
        match &self.continuation {
            Some(next) => arena
                .advance(
                    from,
                    next.instance.clone(),
                    next.utxo.value(),
                    Some(next.utxo.outpoint),
                )
                .map(Some),
            None => Ok(None),
        }
    }
}

/// View of a sealed call handed to the witness builder
pub struct SealedCall<'a> {
    sealed: &'a SealedTransaction,
    ctx: CallContext,
    signer: &'a dyn Signer,
}

impl<'a> SealedCall<'a> {
    pub fn context(&self) -> &CallContext {
        &self.ctx
    }

    pub fn transaction(&self) -> &Transaction {
        self.sealed.transaction()
    }

    /// Signature over the contract input's sighash, flag byte appended
    pub fn sign(&self, key_id: &str) -> Result<ByteString> {
        let mut signature = self
            .signer
            .sign(&self.ctx.sighash, key_id)
            .map_err(ContractError::external)?;
        signature.push(self.ctx.sighash_type.to_byte());
        Ok(signature)
    }

    pub fn public_key(&self, key_id: &str) -> Result<PubKey> {
        self.signer.public_key(key_id).map_err(ContractError::external)
    }
}

/// Builds, verifies and signs contract calls
pub struct ContractCaller<'a> {
    crypto: &'a dyn CryptoProvider,
    signer: &'a dyn Signer,
    source: &'a dyn OutputSource,
    fees: Box<dyn FeeStrategy + 'a>,
    config: BuilderConfig,
}

impl<'a> ContractCaller<'a> {
    pub fn new(
        crypto: &'a dyn CryptoProvider,
        signer: &'a dyn Signer,
        source: &'a dyn OutputSource,
        config: BuilderConfig,
    ) -> Self {
        Self {
            crypto,
            signer,
            source,
            fees: Box::new(config.fee_strategy()),
            config,
        }
    }

    pub fn with_fee_strategy(mut self, fees: impl FeeStrategy + 'a) -> Self {
        self.fees = Box::new(fees);
        self
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn pubkey_hash(&self, key_id: &str) -> Result<PubKeyHash> {
        let public_key = self.signer.public_key(key_id).map_err(ContractError::external)?;
        Ok(self.crypto.hash160(&public_key))
    }

    /// Every P2PKH output the source knows for `key_id`
    pub fn funding(&self, key_id: &str) -> Result<Funding> {
        let pubkey_hash = self.pubkey_hash(key_id)?;
        let utxos = self
            .source
            .fetch_utxos(&build_p2pkh_script(&pubkey_hash))
            .map_err(ContractError::external)?;
        if utxos.is_empty() {
            return Err(ContractError::Builder(format!(
                "no spendable outputs for key {}",
                key_id
            )));
        }
        Ok(Funding {
            key_id: key_id.to_string(),
            pubkey_hash,
            utxos,
        })
    }

    fn fee_for(&self, input_count: usize, outputs: &[TransactionOutput]) -> Integer {
        self.fees.fee(estimated_size(
            self.config.tx_version,
            input_count,
            outputs,
            self.config.unlock_size_estimate,
        ))
    }

    /// Outbid the current highest bidder with funds held by `bidder_key`
    pub fn plan_bid(
        &self,
        auction: &Auction,
        utxo: Utxo,
        bidder_key: &str,
        bid: Integer,
    ) -> Result<(CallPlan, AuctionCall)> {
        let funding = self.funding(bidder_key)?;
        let bidder = funding.pubkey_hash;
        let highest = utxo.value();

        let sizing = auction.bid_outputs(&bidder, bid, 1, highest)?;
        let fee = self.fee_for(1 + funding.utxos.len(), &sizing);
        let mut change = funding
            .total()
            .checked_sub(bid)
            .and_then(|rest| rest.checked_sub(fee))
            .filter(|change| *change >= 0)
            .ok_or_else(|| {
                ContractError::Builder(format!(
                    "insufficient funds for bid {}: have {}, fee {}",
                    bid,
                    funding.total(),
                    fee
                ))
            })?;
        if change < self.config.dust_limit {
            change = 0;
        }

        let outputs = auction.bid_outputs(&bidder, bid, change, highest)?;
        let plan = CallPlan::new(auction.clone().into(), "bid", utxo)?
            .with_outputs(outputs)
            .funded_by(funding);
        Ok((plan, AuctionCall::Bid { bidder, bid, change }))
    }

    /// Pay the winning bid, less fee, to the auctioneer
    pub fn plan_close(&self, auction: &Auction, utxo: Utxo, now: Natural) -> Result<CallPlan> {
        let auctioneer = self.crypto.hash160(&auction.auctioneer);
        Ok(CallPlan::new(auction.clone().into(), "close", utxo)?
            .with_lock_time(now)
            .with_sequence(0)
            .pay_remainder_to(auctioneer))
    }

    /// Send everything raised, less fee, to the recipient
    pub fn plan_collect(&self, crowdfund: &Crowdfund, utxo: Utxo) -> Result<(CallPlan, CrowdfundCall)> {
        let fee = self.fee_for(1, &[build_p2pkh_output(&crowdfund.recipient, utxo.value())]);
        let raised = utxo.value() - fee;
        let plan = CallPlan::new(crowdfund.clone().into(), "collect", utxo)?
            .with_outputs(vec![build_p2pkh_output(&crowdfund.recipient, raised)]);
        Ok((plan, CrowdfundCall::Collect { raised }))
    }

    /// Return the contribution, less fee, after the deadline
    pub fn plan_refund(
        &self,
        crowdfund: &Crowdfund,
        utxo: Utxo,
        now: Natural,
        to: PubKeyHash,
    ) -> Result<CallPlan> {
        Ok(CallPlan::new(crowdfund.clone().into(), "refund", utxo)?
            .with_lock_time(now)
            .with_sequence(1)
            .pay_remainder_to(to))
    }

    /// Increment at the same value; `payer_key` covers the fee and takes change
    pub fn plan_increment(
        &self,
        counter: &Counter,
        utxo: Utxo,
        payer_key: &str,
    ) -> Result<(CallPlan, CounterCall)> {
        let funding = self.funding(payer_key)?;
        let payer = funding.pubkey_hash;
        let call = CounterCall::Increment;
        let outputs = counter.required_outputs(&call, utxo.value())?;
        let plan = CallPlan::new(counter.clone().into(), "increment", utxo)?
            .with_outputs(outputs)
            .funded_by(funding)
            .pay_remainder_to(payer);
        Ok((plan, call))
    }

    pub fn template(&self, plan: &CallPlan) -> Result<TransactionTemplate> {
        let mut template = TransactionTemplate::new(self.config.tx_version);
        template.set_lock_time(plan.lock_time);
        template.add_contract_input(plan.utxo.clone(), plan.sighash_type(), plan.sequence);
        if let Some(funding) = &plan.funding {
            for utxo in &funding.utxos {
                template.add_funding_input(utxo.clone(), &funding.key_id);
            }
        }
        for output in &plan.outputs {
            template.add_output(output.clone());
        }
        if let Some(to) = &plan.remainder_to {
            template.add_change(
                to,
                self.fees.as_ref(),
                self.config.unlock_size_estimate,
                self.config.dust_limit,
            )?;
        }
        debug_assert_eq!(template.inputs().len(), plan.input_count());
        Ok(template)
    }

    /// Build the call transaction
    ///
    /// `make_call` sees the sealed transaction and returns the typed call,
    /// signing through [`SealedCall::sign`] where the method needs it. The
    /// call is verified before its unlocking script is attached; a rejected
    /// call produces no transaction.
    pub fn call<C, F>(&self, plan: CallPlan, make_call: F) -> Result<CallOutcome>
    where
        C: ContractCall,
        F: FnOnce(&SealedCall<'_>) -> Result<C>,
    {
        let mut sealed = self.template(&plan)?.seal()?;
        let ctx = sealed.call_context(0)?;

        let call = make_call(&SealedCall {
            sealed: &sealed,
            ctx: ctx.clone(),
            signer: self.signer,
        })?;
        if call.method() != plan.method {
            return Err(ContractError::Builder(format!(
                "plan is for `{}`, call is `{}`",
                plan.method,
                call.method()
            )));
        }

        let next = match plan.instance.verify(plan.method, &ctx, &call.to_args(), self.crypto) {
            Ok(next) => next,
            Err(err) => {
                warn!(method = plan.method, error = %err, "call rejected locally");
                return Err(err);
            }
        };

        sealed.set_unlocking_script(0, call.to_unlocking_script())?;
        sealed.sign_funding_inputs(self.signer)?;
        let transaction = sealed.finalize()?;
        let txid = txid(&transaction);

        let continuation = match next {
            Some((instance, value)) => {
                let output = instance.state_output(value)?;
                if transaction.outputs.first() != Some(&output) {
                    return Err(ContractError::Builder(
                        "continuation is not locked at output 0".to_string(),
                    ));
                }
                Some(NextInstance {
                    instance,
                    utxo: Utxo {
                        outpoint: OutPoint { hash: txid, index: 0 },
                        output,
                    },
                })
            }
            None => None,
        };

        info!(
            txid = %txid_hex(&txid),
            method = plan.method,
            kind = ?plan.instance.kind(),
            continues = continuation.is_some(),
            "contract call built"
        );
        Ok(CallOutcome {
            transaction,
            txid,
            method: plan.method,
            continuation,
        })
    }

    pub fn broadcast(&self, tx: &Transaction) -> Result<Hash> {
        let txid = self
            .signer
            .broadcast(&serialize_transaction(tx))
            .map_err(ContractError::external)?;
        info!(txid = %txid_hex(&txid), "transaction broadcast");
        Ok(txid)
    }

    /// Lock a fresh instance through `deployer`; the instance is output 0
    pub fn deploy(&self, deployer: &dyn Deployer, instance: &ContractInstance, amount: Integer) -> Result<Utxo> {
        let output = instance.state_output(amount)?;
        let hash = deployer
            .deploy(instance, amount)
            .map_err(ContractError::external)?;
        info!(txid = %txid_hex(&hash), kind = ?instance.kind(), amount, "contract deployed");
        Ok(Utxo {
            outpoint: OutPoint { hash, index: 0 },
            output,
        })
    }
}
