//! Property-based tests for contract invariants

use covenant_proof::contracts::*;
use covenant_proof::crypto::{sha256, Secp256k1Crypto};
use covenant_proof::script::{build_p2pkh_output, decode_script_num, encode_script_num};
use covenant_proof::sighash::{signature_hash, SighashType};
use covenant_proof::timelock::check_time_lock;
use covenant_proof::transaction::hash_outputs;
use covenant_proof::*;
use proptest::prelude::*;

fn ctx(hash_outputs: Hash, spent_value: Integer) -> CallContext {
    CallContext {
        hash_outputs,
        lock_time: 0,
        sequence: SEQUENCE_FINAL,
        spent_value,
        input_index: 0,
        sighash: [0; 32],
        sighash_type: SighashType::ALL,
    }
}

fn arb_output() -> impl Strategy<Value = TransactionOutput> {
    (0i64..MAX_MONEY, prop::collection::vec(any::<u8>(), 0..40)).prop_map(|(value, script_pubkey)| {
        TransactionOutput {
            value,
            script_pubkey,
        }
    })
}

fn arb_natural() -> impl Strategy<Value = Natural> {
    prop_oneof![0..LOCKTIME_THRESHOLD, 0..=(Integer::MAX as Natural)]
}

fn arb_instance() -> impl Strategy<Value = ContractInstance> {
    prop_oneof![
        (any::<[u8; 20]>(), prop::collection::vec(any::<u8>(), 33), arb_natural())
            .prop_map(|(b, a, d)| ContractInstance::from(Auction::new(b, a, d))),
        (any::<[u8; 20]>(), prop::collection::vec(any::<u8>(), 33), arb_natural(), 0i64..MAX_MONEY)
            .prop_map(|(r, c, d, t)| ContractInstance::from(Crowdfund::new(r, c, d, t))),
        any::<[u8; 32]>().prop_map(|d| ContractInstance::from(HashPuzzle::new(d))),
        any::<i64>().prop_map(|c| ContractInstance::from(Counter::new(c))),
        any::<[u8; 20]>().prop_map(|h| ContractInstance::from(P2pkh::new(h))),
        arb_natural().prop_map(|t| ContractInstance::from(Cltv::new(t))),
        any::<[u8; 20]>().prop_map(|h| ContractInstance::from(AnyoneCanSpend::new(h))),
    ]
}

proptest! {
    #[test]
    fn prop_locking_script_parse_inverts_build(instance in arb_instance()) {
        let script = instance.locking_script().unwrap();
        prop_assert_eq!(ContractInstance::from_locking_script(&script).unwrap(), instance);
    }

    #[test]
    fn prop_deadline_beyond_script_range_is_rejected(deadline in (Integer::MAX as Natural + 1)..=Natural::MAX) {
        let auction = Auction::new([1; 20], vec![2; 33], deadline);
        prop_assert!(matches!(auction.locking_script(), Err(ContractError::Serialization(_))));
        prop_assert!(matches!(Cltv::new(deadline).locking_script(), Err(ContractError::Serialization(_))));
    }

    #[test]
    fn prop_script_num_roundtrip(value in any::<i64>()) {
        prop_assert_eq!(decode_script_num(&encode_script_num(value)).unwrap(), value);
    }

    #[test]
    fn prop_hash_puzzle_accepts_only_preimage(
        preimage in prop::collection::vec(any::<u8>(), 0..64),
        other in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let crypto = Secp256k1Crypto::new();
        let puzzle = HashPuzzle::new(sha256(&preimage));
        prop_assert!(puzzle.unlock(&preimage, &crypto).is_ok());
        if other != preimage {
            prop_assert!(puzzle.unlock(&other, &crypto).is_err());
        }
    }

    #[test]
    fn prop_bid_accepted_iff_higher(highest in 1i64..1_000_000, bid in 1i64..1_000_000) {
        let crypto = Secp256k1Crypto::new();
        let auction = Auction::new([1; 20], vec![2; 33], 100);
        let bidder = [3; 20];
        let outputs = auction.bid_outputs(&bidder, bid, 0, highest).unwrap();
        let result = auction.bid(&bidder, bid, 0, &ctx(hash_outputs(&outputs), highest), &crypto);
        prop_assert_eq!(result.is_ok(), bid > highest);
        if let Ok(next) = result {
            prop_assert_eq!(next.value, bid);
        }
    }

    #[test]
    fn prop_collect_accepted_iff_target_met(target in 0i64..1_000_000, raised in 0i64..1_000_000) {
        let crypto = Secp256k1Crypto::new();
        let crowdfund = Crowdfund::new([4; 20], vec![5; 33], 100, target);
        let outputs = vec![build_p2pkh_output(&[4; 20], raised)];
        let result = crowdfund.collect(raised, &ctx(hash_outputs(&outputs), raised), &crypto);
        prop_assert_eq!(result.is_ok(), raised >= target);
    }

    #[test]
    fn prop_counter_chain(start in -1000i64..1000, steps in 1usize..20, value in 1i64..1_000_000) {
        let crypto = Secp256k1Crypto::new();
        let mut counter = Counter::new(start);
        for _ in 0..steps {
            let outputs = counter.required_outputs(&CounterCall::Increment, value).unwrap();
            let mut call_ctx = ctx(hash_outputs(&outputs), value);
            call_ctx.sighash_type = SighashType::SINGLE_ANYONECANPAY;
            let next = counter.increment(&call_ctx, &crypto).unwrap();
            prop_assert_eq!(next.value, value);
            counter = next.state;
        }
        prop_assert_eq!(counter.count, start + steps as Integer);
    }

    #[test]
    fn prop_commitment_binding(
        outputs in prop::collection::vec(arb_output(), 1..5),
        index in any::<prop::sample::Index>(),
        delta in 1i64..1000,
    ) {
        let mut tampered = outputs.clone();
        let i = index.index(tampered.len());
        tampered[i].value = (tampered[i].value + delta) % MAX_MONEY;
        prop_assume!(tampered[i].value != outputs[i].value);
        prop_assert_ne!(hash_outputs(&outputs), hash_outputs(&tampered));
    }

    #[test]
    fn prop_sighash_covers_every_output(
        outputs in prop::collection::vec(arb_output(), 1..5),
        index in any::<prop::sample::Index>(),
    ) {
        let tx = Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prevout: OutPoint { hash: [1; 32], index: 0 },
                script_sig: Vec::new(),
                sequence: SEQUENCE_FINAL,
            }],
            outputs,
            lock_time: 0,
        };
        let spent = build_p2pkh_output(&[1; 20], MAX_MONEY);
        let before = signature_hash(&tx, 0, &spent, SighashType::ALL).unwrap();

        let mut tampered = tx.clone();
        let i = index.index(tampered.outputs.len());
        tampered.outputs[i].script_pubkey.push(0x51);
        prop_assert_ne!(signature_hash(&tampered, 0, &spent, SighashType::ALL).unwrap(), before);
    }

    #[test]
    fn prop_time_lock_threshold(deadline in 0u64..1_000_000_000, lock_time in 0u64..1_000_000_000) {
        let same_kind = (deadline < LOCKTIME_THRESHOLD) == (lock_time < LOCKTIME_THRESHOLD);
        let result = check_time_lock(deadline, lock_time, 0);
        prop_assert_eq!(result.is_ok(), same_kind && lock_time >= deadline);
        prop_assert!(check_time_lock(deadline, lock_time, SEQUENCE_FINAL).is_err());
    }
}
