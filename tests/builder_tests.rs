//! End-to-end contract calls through the transaction builder

mod common;

use common::*;
use covenant_proof::arena::InstanceArena;
use covenant_proof::builder::{CallPlan, ContractCaller};
use covenant_proof::config::BuilderConfig;
use covenant_proof::contracts::*;
use covenant_proof::crypto::{sha256, CryptoProvider, Secp256k1Crypto};
use covenant_proof::script::{build_p2pkh_output, ScriptReader};
use covenant_proof::sighash::{signature_hash, SighashType};
use covenant_proof::transaction::txid;
use covenant_proof::*;

fn signer() -> LocalSigner {
    LocalSigner::new()
        .with_key("auctioneer", 1)
        .with_key("alice", 2)
        .with_key("contributor", 3)
        .with_key("payer", 4)
        .with_key("owner", 5)
}

fn spent_outputs(tx: &Transaction, contract: &Utxo, source: &MemorySource, funder: &PubKeyHash) -> Vec<TransactionOutput> {
    use covenant_proof::collaborators::OutputSource;
    let funding = source
        .fetch_utxos(&covenant_proof::script::build_p2pkh_script(funder))
        .unwrap();
    tx.inputs
        .iter()
        .map(|input| {
            if input.prevout == contract.outpoint {
                contract.output.clone()
            } else {
                funding
                    .iter()
                    .find(|u| u.outpoint == input.prevout)
                    .unwrap()
                    .output
                    .clone()
            }
        })
        .collect()
}

#[test]
fn test_bid_transaction_refunds_and_continues() {
    let crypto = Secp256k1Crypto::new();
    let signer = signer();
    let source = MemorySource::new();
    let alice = signer.pubkey_hash("alice");
    source.fund(&alice, 10_000, 0x21);

    let auction = Auction::new([0xaa; 20], signer.pubkey("auctioneer"), 1000);
    let utxo = contract_utxo(&auction.clone().into(), 1000, 0x11);

    let caller = ContractCaller::new(&crypto, &signer, &source, BuilderConfig::default());
    let (plan, call) = caller.plan_bid(&auction, utxo.clone(), "alice", 2000).unwrap();
    let outcome = caller.call(plan, |_| Ok(call)).unwrap();
    let tx = &outcome.transaction;

    assert_eq!(tx.outputs[1], build_p2pkh_output(&[0xaa; 20], 1000));
    let next = outcome.continuation.as_ref().unwrap();
    assert_eq!(next.utxo.value(), 2000);
    assert_eq!(
        next.instance,
        ContractInstance::from(Auction::new(alice, signer.pubkey("auctioneer"), 1000))
    );
    assert_eq!(next.utxo.outpoint.hash, txid(tx));

    // the fee is what is left after the change output
    let change = tx.outputs[2].value;
    let fee = 11_000 - 2000 - 1000 - change;
    assert!(fee > 0 && fee < 100);

    let spent = spent_outputs(tx, &utxo, &source, &alice);
    let verified = CovenantProof::new().verify_input(tx, 0, &spent).unwrap();
    assert_eq!(verified, Some((next.instance.clone(), 2000)));
}

#[test]
fn test_bid_funding_input_is_signed() {
    let crypto = Secp256k1Crypto::new();
    let signer = signer();
    let source = MemorySource::new();
    let alice = signer.pubkey_hash("alice");
    source.fund(&alice, 10_000, 0x21);

    let auction = Auction::new([0xaa; 20], signer.pubkey("auctioneer"), 1000);
    let utxo = contract_utxo(&auction.clone().into(), 1000, 0x11);
    let caller = ContractCaller::new(&crypto, &signer, &source, BuilderConfig::default());
    let (plan, call) = caller.plan_bid(&auction, utxo.clone(), "alice", 2000).unwrap();
    let tx = caller.call(plan, |_| Ok(call)).unwrap().transaction;

    let mut reader = ScriptReader::new(&tx.inputs[1].script_sig);
    let signature = reader.read_bytes().unwrap();
    let public_key = reader.read_bytes().unwrap();
    reader.finish().unwrap();

    let (flag, der) = signature.split_last().unwrap();
    assert_eq!(*flag, SighashType::ALL.to_byte());
    assert_eq!(public_key, signer.pubkey("alice"));

    let spent = spent_outputs(&tx, &utxo, &source, &alice);
    let digest = signature_hash(&tx, 1, &spent[1], SighashType::ALL).unwrap();
    assert!(crypto.verify_signature(&digest, der, &public_key));
}

#[test]
fn test_low_bid_is_rejected_before_attaching() {
    let crypto = Secp256k1Crypto::new();
    let signer = signer();
    let source = MemorySource::new();
    source.fund(&signer.pubkey_hash("alice"), 10_000, 0x21);

    let auction = Auction::new([0xaa; 20], signer.pubkey("auctioneer"), 1000);
    let utxo = contract_utxo(&auction.clone().into(), 5000, 0x11);
    let caller = ContractCaller::new(&crypto, &signer, &source, BuilderConfig::default());
    let (plan, call) = caller.plan_bid(&auction, utxo, "alice", 5000).unwrap();

    let err = caller.call(plan, |_| Ok(call)).unwrap_err();
    assert_eq!(err.reject_reason(), Some(RejectReason::BidTooLow));
}

#[test]
fn test_bid_without_enough_funds() {
    let crypto = Secp256k1Crypto::new();
    let signer = signer();
    let source = MemorySource::new();
    source.fund(&signer.pubkey_hash("alice"), 1500, 0x21);

    let auction = Auction::new([0xaa; 20], signer.pubkey("auctioneer"), 1000);
    let utxo = contract_utxo(&auction.clone().into(), 1000, 0x11);
    let caller = ContractCaller::new(&crypto, &signer, &source, BuilderConfig::default());
    assert!(matches!(
        caller.plan_bid(&auction, utxo, "alice", 2000),
        Err(ContractError::Builder(_))
    ));
}

#[test]
fn test_close_pays_auctioneer_after_deadline() {
    let crypto = Secp256k1Crypto::new();
    let signer = signer();
    let source = MemorySource::new();

    let auction = Auction::new([0xaa; 20], signer.pubkey("auctioneer"), 1000);
    let utxo = contract_utxo(&auction.clone().into(), 2000, 0x11);
    let caller = ContractCaller::new(&crypto, &signer, &source, BuilderConfig::default());

    let plan = caller.plan_close(&auction, utxo.clone(), 1000).unwrap();
    let outcome = caller
        .call(plan, |sealed| {
            Ok(AuctionCall::Close {
                signature: sealed.sign("auctioneer")?,
            })
        })
        .unwrap();

    let tx = &outcome.transaction;
    assert!(outcome.continuation.is_none());
    assert_eq!(tx.lock_time, 1000);
    assert_eq!(tx.inputs[0].sequence, 0);
    assert_eq!(tx.outputs.len(), 1);
    assert_eq!(
        tx.outputs[0].script_pubkey,
        build_p2pkh_output(&signer.pubkey_hash("auctioneer"), 0).script_pubkey
    );
    assert!(tx.outputs[0].value < 2000);

    let proof = CovenantProof::new();
    assert_eq!(proof.verify_input(tx, 0, &[utxo.output.clone()]).unwrap(), None);
}

#[test]
fn test_close_before_deadline_is_rejected() {
    let crypto = Secp256k1Crypto::new();
    let signer = signer();
    let source = MemorySource::new();

    let auction = Auction::new([0xaa; 20], signer.pubkey("auctioneer"), 1000);
    let utxo = contract_utxo(&auction.clone().into(), 2000, 0x11);
    let caller = ContractCaller::new(&crypto, &signer, &source, BuilderConfig::default());

    let plan = caller.plan_close(&auction, utxo, 999).unwrap();
    let err = caller
        .call(plan, |sealed| {
            Ok(AuctionCall::Close {
                signature: sealed.sign("auctioneer")?,
            })
        })
        .unwrap_err();
    assert_eq!(err.reject_reason(), Some(RejectReason::DeadlineNotReached));
}

#[test]
fn test_close_signed_by_bidder_is_rejected() {
    let crypto = Secp256k1Crypto::new();
    let signer = signer();
    let source = MemorySource::new();

    let auction = Auction::new([0xaa; 20], signer.pubkey("auctioneer"), 1000);
    let utxo = contract_utxo(&auction.clone().into(), 2000, 0x11);
    let caller = ContractCaller::new(&crypto, &signer, &source, BuilderConfig::default());

    let plan = caller.plan_close(&auction, utxo, 1200).unwrap();
    let err = caller
        .call(plan, |sealed| {
            Ok(AuctionCall::Close {
                signature: sealed.sign("alice")?,
            })
        })
        .unwrap_err();
    assert_eq!(err.reject_reason(), Some(RejectReason::SignatureInvalid));
}

#[test]
fn test_collect_and_refund() {
    let crypto = Secp256k1Crypto::new();
    let signer = signer();
    let source = MemorySource::new();
    let caller = ContractCaller::new(&crypto, &signer, &source, BuilderConfig::default());

    let deadline = 1_700_000_000;
    let crowdfund = Crowdfund::new([0xcc; 20], signer.pubkey("contributor"), deadline, 5000);

    let utxo = contract_utxo(&crowdfund.clone().into(), 6000, 0x31);
    let (plan, call) = caller.plan_collect(&crowdfund, utxo).unwrap();
    let tx = caller.call(plan, |_| Ok(call.clone())).unwrap().transaction;
    let CrowdfundCall::Collect { raised } = call else {
        panic!("expected collect");
    };
    assert_eq!(tx.outputs, vec![build_p2pkh_output(&[0xcc; 20], raised)]);
    assert!(raised >= 5000);

    let short = contract_utxo(&crowdfund.clone().into(), 5000, 0x32);
    let (plan, call) = caller.plan_collect(&crowdfund, short.clone()).unwrap();
    let err = caller.call(plan, |_| Ok(call)).unwrap_err();
    assert_eq!(err.reject_reason(), Some(RejectReason::TargetNotReached));

    let back_to = signer.pubkey_hash("contributor");
    let plan = caller
        .plan_refund(&crowdfund, short, deadline + 60, back_to)
        .unwrap();
    let tx = caller
        .call(plan, |sealed| {
            Ok(CrowdfundCall::Refund {
                signature: sealed.sign("contributor")?,
            })
        })
        .unwrap()
        .transaction;
    assert_eq!(tx.inputs[0].sequence, 1);
    assert_eq!(tx.lock_time, deadline + 60);
    assert_eq!(tx.outputs[0].script_pubkey, build_p2pkh_output(&back_to, 0).script_pubkey);
}

#[test]
fn test_refund_before_deadline_is_rejected() {
    let crypto = Secp256k1Crypto::new();
    let signer = signer();
    let source = MemorySource::new();
    let caller = ContractCaller::new(&crypto, &signer, &source, BuilderConfig::default());

    let deadline = 1_700_000_000;
    let crowdfund = Crowdfund::new([0xcc; 20], signer.pubkey("contributor"), deadline, 5000);
    let utxo = contract_utxo(&crowdfund.clone().into(), 3000, 0x31);

    let plan = caller
        .plan_refund(&crowdfund, utxo, deadline - 1, signer.pubkey_hash("contributor"))
        .unwrap();
    let err = caller
        .call(plan, |sealed| {
            Ok(CrowdfundCall::Refund {
                signature: sealed.sign("contributor")?,
            })
        })
        .unwrap_err();
    assert_eq!(err.reject_reason(), Some(RejectReason::DeadlineNotReached));
}

#[test]
fn test_counter_chain_preserves_value() {
    let crypto = Secp256k1Crypto::new();
    let signer = signer();
    let source = MemorySource::new();
    source.fund(&signer.pubkey_hash("payer"), 50_000, 0x41);
    let caller = ContractCaller::new(&crypto, &signer, &source, BuilderConfig::default());

    let deployer = MemoryDeployer::default();
    let genesis: ContractInstance = Counter::new(0).into();
    let mut utxo = caller.deploy(&deployer, &genesis, 1000).unwrap();

    let mut arena = InstanceArena::new();
    let mut id = arena.genesis(genesis, 1000, Some(utxo.outpoint));
    let mut counter = Counter::new(0);

    for step in 1..=3 {
        let (plan, call) = caller.plan_increment(&counter, utxo, "payer").unwrap();
        let outcome = caller.call(plan, |_| Ok(call)).unwrap();
        id = outcome.record(&mut arena, id).unwrap().unwrap();

        let next = outcome.continuation.unwrap();
        assert_eq!(next.instance, ContractInstance::from(Counter::new(step)));
        assert_eq!(next.utxo.value(), 1000);
        counter = Counter::new(step);
        utxo = next.utxo;
    }

    let lineage = arena.lineage(id).unwrap();
    assert_eq!(lineage.len(), 4);
    assert_eq!(lineage[3].version, 3);
    assert_eq!(lineage[3].amount, 1000);
    assert_eq!(deployer.deployed.lock().unwrap().len(), 1);
}

#[test]
fn test_hash_puzzle_generic_plan() {
    let crypto = Secp256k1Crypto::new();
    let signer = signer();
    let source = MemorySource::new();
    let caller = ContractCaller::new(&crypto, &signer, &source, BuilderConfig::default());

    let puzzle: ContractInstance = HashPuzzle::new(sha256(b"preimage")).into();
    let utxo = contract_utxo(&puzzle, 1000, 0x51);
    let to = signer.pubkey_hash("owner");

    let plan = CallPlan::new(puzzle.clone(), "unlock", utxo.clone())
        .unwrap()
        .pay_remainder_to(to);
    let outcome = caller
        .call(plan.clone(), |_| {
            Ok(HashPuzzleCall::Unlock {
                preimage: b"preimage".to_vec(),
            })
        })
        .unwrap();
    assert!(outcome.continuation.is_none());
    assert_eq!(outcome.method, "unlock");

    let err = caller
        .call(plan, |_| {
            Ok(HashPuzzleCall::Unlock {
                preimage: b"guess".to_vec(),
            })
        })
        .unwrap_err();
    assert_eq!(err.reject_reason(), Some(RejectReason::HashMismatch));
}

#[test]
fn test_cltv_and_anyone_can_spend() {
    let crypto = Secp256k1Crypto::new();
    let signer = signer();
    let source = MemorySource::new();
    let caller = ContractCaller::new(&crypto, &signer, &source, BuilderConfig::default());
    let owner = signer.pubkey_hash("owner");

    let cltv: ContractInstance = Cltv::new(800_000).into();
    let plan = CallPlan::new(cltv.clone(), "unlock", contract_utxo(&cltv, 1000, 0x61))
        .unwrap()
        .with_sequence(0)
        .pay_remainder_to(owner);
    let outcome = caller.call(plan.clone().with_lock_time(800_001), |_| Ok(CltvCall::Unlock));
    assert!(outcome.is_ok());

    let err = caller
        .call(plan.with_lock_time(799_999), |_| Ok(CltvCall::Unlock))
        .unwrap_err();
    assert_eq!(err.reject_reason(), Some(RejectReason::DeadlineNotReached));

    let acs: ContractInstance = AnyoneCanSpend::new(owner).into();
    let plan = CallPlan::new(acs.clone(), "unlock", contract_utxo(&acs, 1000, 0x62))
        .unwrap()
        .with_outputs(vec![build_p2pkh_output(&owner, 900)]);
    assert_eq!(plan.sighash_type(), SighashType::SINGLE_ANYONECANPAY);
    let tx = caller
        .call(plan.clone(), |_| Ok(AnyoneCanSpendCall::Unlock { output_amount: 900 }))
        .unwrap()
        .transaction;
    assert_eq!(tx.outputs[0].value, 900);

    let err = caller
        .call(plan, |_| Ok(AnyoneCanSpendCall::Unlock { output_amount: 950 }))
        .unwrap_err();
    assert!(matches!(err, ContractError::MalformedCommitment(_)));
}

#[test]
fn test_call_must_match_planned_method() {
    let crypto = Secp256k1Crypto::new();
    let signer = signer();
    let source = MemorySource::new();
    let caller = ContractCaller::new(&crypto, &signer, &source, BuilderConfig::default());

    let auction = Auction::new([0xaa; 20], signer.pubkey("auctioneer"), 1000);
    let utxo = contract_utxo(&auction.clone().into(), 2000, 0x11);
    let plan = caller.plan_close(&auction, utxo, 1000).unwrap();
    let err = caller
        .call(plan, |_| {
            Ok(AuctionCall::Bid {
                bidder: [1; 20],
                bid: 3000,
                change: 0,
            })
        })
        .unwrap_err();
    assert!(matches!(err, ContractError::Builder(_)));
}

#[test]
fn test_broadcast_returns_txid() {
    let crypto = Secp256k1Crypto::new();
    let signer = signer();
    let source = MemorySource::new();
    let caller = ContractCaller::new(&crypto, &signer, &source, BuilderConfig::default());

    let puzzle: ContractInstance = HashPuzzle::new(sha256(b"")).into();
    let plan = CallPlan::new(puzzle.clone(), "unlock", contract_utxo(&puzzle, 1000, 0x71))
        .unwrap()
        .pay_remainder_to([0x77; 20]);
    let outcome = caller
        .call(plan, |_| Ok(HashPuzzleCall::Unlock { preimage: vec![] }))
        .unwrap();

    assert_eq!(caller.broadcast(&outcome.transaction).unwrap(), outcome.txid);
    assert_eq!(signer.broadcasts.lock().unwrap().len(), 1);
}

#[test]
fn test_fee_rate_from_config() {
    let crypto = Secp256k1Crypto::new();
    let signer = signer();
    let source = MemorySource::new();
    let config = BuilderConfig::from_json_str(r#"{ "fee_rate": 0 }"#).unwrap();
    let caller = ContractCaller::new(&crypto, &signer, &source, config);

    let puzzle: ContractInstance = HashPuzzle::new(sha256(b"")).into();
    let plan = CallPlan::new(puzzle.clone(), "unlock", contract_utxo(&puzzle, 1000, 0x71))
        .unwrap()
        .pay_remainder_to([0x77; 20]);
    let tx = caller
        .call(plan, |_| Ok(HashPuzzleCall::Unlock { preimage: vec![] }))
        .unwrap()
        .transaction;
    assert_eq!(tx.outputs[0].value, 1000);
}
