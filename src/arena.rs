//! Versioned history of contract instances
//!
//! Instances are immutable. A call that continues a contract appends a
//! successor that points back at its predecessor; the predecessor can never
//! be advanced again, so every lineage is linear.

use crate::contracts::ContractInstance;
use crate::error::{ContractError, Result};
use crate::types::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Index of an instance in its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedInstance {
    pub id: InstanceId,
    /// 0 for a freshly deployed instance
    pub version: Natural,
    pub predecessor: Option<InstanceId>,
    pub instance: ContractInstance,
    /// Value locked in the instance's output
    pub amount: Integer,
    /// Where the instance is locked, once known
    pub outpoint: Option<OutPoint>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct InstanceArena {
    entries: Vec<VersionedInstance>,
    successors: Vec<Option<InstanceId>>,
}

impl InstanceArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a freshly deployed instance
    pub fn genesis(
        &mut self,
        instance: ContractInstance,
        amount: Integer,
        outpoint: Option<OutPoint>,
    ) -> InstanceId {
        let id = InstanceId(self.entries.len());
        debug!(id = id.0, kind = ?instance.kind(), amount, "genesis instance");
        self.entries.push(VersionedInstance {
            id,
            version: 0,
            predecessor: None,
            instance,
            amount,
            outpoint,
        });
        self.successors.push(None);
        id
    }

    /// Append the successor of `from`
    pub fn advance(
        &mut self,
        from: InstanceId,
        instance: ContractInstance,
        amount: Integer,
        outpoint: Option<OutPoint>,
    ) -> Result<InstanceId> {
        let prev = self.get(from)?;
        if let Some(next) = self.successors[from.0] {
            return Err(ContractError::Builder(format!(
                "instance {} already advanced to {}",
                from.0, next.0
            )));
        }
        if instance.kind() != prev.instance.kind() {
            return Err(ContractError::Builder(format!(
                "cannot advance {:?} instance to {:?}",
                prev.instance.kind(),
                instance.kind()
            )));
        }

        let id = InstanceId(self.entries.len());
        let version = prev.version + 1;
        debug!(from = from.0, id = id.0, version, amount, "advance instance");
        self.entries.push(VersionedInstance {
            id,
            version,
            predecessor: Some(from),
            instance,
            amount,
            outpoint,
        });
        self.successors.push(None);
        self.successors[from.0] = Some(id);
        Ok(id)
    }

    pub fn get(&self, id: InstanceId) -> Result<&VersionedInstance> {
        self.entries
            .get(id.0)
            .ok_or_else(|| ContractError::Builder(format!("unknown instance {}", id.0)))
    }

    pub fn successor(&self, id: InstanceId) -> Option<InstanceId> {
        self.successors.get(id.0).copied().flatten()
    }

    /// Newest instance descended from `id` (possibly `id` itself)
    pub fn latest(&self, id: InstanceId) -> Result<&VersionedInstance> {
        let mut current = self.get(id)?.id;
        while let Some(next) = self.successor(current) {
            current = next;
        }
        self.get(current)
    }

    /// `id` and all its predecessors, oldest first
    pub fn lineage(&self, id: InstanceId) -> Result<Vec<&VersionedInstance>> {
        let mut chain = vec![self.get(id)?];
        while let Some(prev) = chain[chain.len() - 1].predecessor {
            chain.push(self.get(prev)?);
        }
        chain.reverse();
        Ok(chain)
    }
}
