//! In-memory deployment registry

use std::collections::VecDeque;
use std::sync::RwLock;

use crate::models::deployment::DeploymentRecord;

/// Known deployments, newest first.
///
/// The registry only grows: there is no update or remove. Records live for
/// the lifetime of the process.
#[derive(Debug, Default)]
pub struct DeploymentRegistry {
    records: RwLock<VecDeque<DeploymentRecord>>,
}

impl DeploymentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record ahead of every older one.
    ///
    /// Ids are minted at completion, so this is position 0 unless two
    /// completions raced between minting and prepending; the record then
    /// lands behind the newer id.
    pub fn prepend(&self, record: DeploymentRecord) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let position = records
            .iter()
            .position(|existing| existing.id < record.id)
            .unwrap_or(records.len());
        records.insert(position, record);
    }

    /// Point-in-time snapshot, newest first
    pub fn read(&self) -> Vec<DeploymentRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.iter().cloned().collect()
    }

    /// Most recently prepended record
    pub fn latest(&self) -> Option<DeploymentRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.front().cloned()
    }

    pub fn len(&self) -> usize {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
