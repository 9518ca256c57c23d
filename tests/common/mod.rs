//! Local collaborators for integration tests

#![allow(dead_code)]

use anyhow::{anyhow, bail};
use covenant_proof::collaborators::{Deployer, OutputSource, Signer};
use covenant_proof::contracts::ContractInstance;
use covenant_proof::crypto::{double_sha256, hash160};
use covenant_proof::script::build_p2pkh_output;
use covenant_proof::*;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use std::collections::HashMap;
use std::sync::Mutex;

/// Keys derived from a one-byte seed, named by id
#[derive(Default)]
pub struct LocalSigner {
    keys: HashMap<String, SecretKey>,
    pub broadcasts: Mutex<Vec<ByteString>>,
}

impl LocalSigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key_id: &str, seed: u8) -> Self {
        let secret = SecretKey::from_slice(&[seed; 32]).unwrap();
        self.keys.insert(key_id.to_string(), secret);
        self
    }

    fn secret(&self, key_id: &str) -> anyhow::Result<&SecretKey> {
        self.keys
            .get(key_id)
            .ok_or_else(|| anyhow!("unknown key {}", key_id))
    }

    pub fn pubkey(&self, key_id: &str) -> PubKey {
        self.public_key(key_id).unwrap()
    }

    pub fn pubkey_hash(&self, key_id: &str) -> PubKeyHash {
        hash160(&self.pubkey(key_id))
    }
}

impl Signer for LocalSigner {
    fn public_key(&self, key_id: &str) -> anyhow::Result<PubKey> {
        let secret = self.secret(key_id)?;
        Ok(PublicKey::from_secret_key(&Secp256k1::new(), secret)
            .serialize()
            .to_vec())
    }

    fn sign(&self, digest: &Hash, key_id: &str) -> anyhow::Result<ByteString> {
        let secret = self.secret(key_id)?;
        let msg = Message::from_digest_slice(digest)?;
        Ok(Secp256k1::new()
            .sign_ecdsa(&msg, secret)
            .serialize_der()
            .to_vec())
    }

    fn broadcast(&self, raw_tx: &[u8]) -> anyhow::Result<Hash> {
        self.broadcasts.lock().unwrap().push(raw_tx.to_vec());
        Ok(double_sha256(raw_tx))
    }
}

/// UTXOs indexed by locking script
#[derive(Default)]
pub struct MemorySource {
    utxos: Mutex<HashMap<ByteString, Vec<Utxo>>>,
    pub offline: bool,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    /// Credit `value` to `pubkey_hash` at a distinct outpoint
    pub fn fund(&self, pubkey_hash: &PubKeyHash, value: Integer, tag: u8) -> Utxo {
        let output = build_p2pkh_output(pubkey_hash, value);
        let utxo = Utxo {
            outpoint: OutPoint {
                hash: [tag; 32],
                index: 0,
            },
            output: output.clone(),
        };
        self.utxos
            .lock()
            .unwrap()
            .entry(output.script_pubkey)
            .or_default()
            .push(utxo.clone());
        utxo
    }
}

impl OutputSource for MemorySource {
    fn fetch_utxos(&self, locking_script: &[u8]) -> anyhow::Result<Vec<Utxo>> {
        if self.offline {
            bail!("output source unreachable");
        }
        Ok(self
            .utxos
            .lock()
            .unwrap()
            .get(locking_script)
            .cloned()
            .unwrap_or_default())
    }
}

/// Pretends to deploy by hashing the instance's locking script
#[derive(Default)]
pub struct MemoryDeployer {
    pub deployed: Mutex<Vec<(ContractInstance, Integer)>>,
}

impl Deployer for MemoryDeployer {
    fn deploy(&self, instance: &ContractInstance, amount: Integer) -> anyhow::Result<Hash> {
        let script = instance
            .locking_script()
            .map_err(|e| anyhow!("cannot deploy: {}", e))?;
        self.deployed.lock().unwrap().push((instance.clone(), amount));
        Ok(double_sha256(&script))
    }
}

/// Spendable contract output at a fixed outpoint
pub fn contract_utxo(instance: &ContractInstance, value: Integer, tag: u8) -> Utxo {
    Utxo {
        outpoint: OutPoint {
            hash: [tag; 32],
            index: 0,
        },
        output: instance.state_output(value).unwrap(),
    }
}
