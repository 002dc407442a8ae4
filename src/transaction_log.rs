use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::{
    EntryId, EntryStatus, Error, ListQuery, NewEntry, OwnerId, TransactionLogEntry,
};

/// Append-only ledger of money movements.
///
/// Entries are never rewritten. A later status change (a pending withdrawal
/// completing or failing) is appended as an amendment and folded in on read.
#[derive(Debug, Default)]
pub struct TransactionLog {
    state: RwLock<LogState>,
}

#[derive(Debug, Default)]
struct LogState {
    entries: Vec<TransactionLogEntry>,
    amendments: Vec<StatusAmendment>,
    by_owner: HashMap<OwnerId, Vec<usize>>,
    latest_status: HashMap<EntryId, EntryStatus>,
}

#[derive(Debug, Clone)]
struct StatusAmendment {
    entry_id: EntryId,
    status: EntryStatus,
}

impl LogState {
    fn resolved(&self, index: usize) -> TransactionLogEntry {
        let mut entry = self.entries[index].clone();
        if let Some(status) = self.latest_status.get(&entry.id) {
            entry.status = *status;
        }
        entry
    }
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, entry: NewEntry) -> TransactionLogEntry {
        let mut state = self.state.write().await;
        let index = state.entries.len();
        let stored = TransactionLogEntry {
            id: EntryId(index as u64 + 1),
            owner_id: entry.owner_id,
            kind: entry.kind,
            amount: entry.amount,
            status: entry.status,
            reference: entry.reference,
            created_at: Utc::now(),
        };
        state
            .by_owner
            .entry(stored.owner_id.clone())
            .or_default()
            .push(index);
        state.entries.push(stored.clone());
        stored
    }

    pub async fn amend_status(&self, entry_id: EntryId, status: EntryStatus) -> Result<(), Error> {
        let mut state = self.state.write().await;
        let exists = entry_id.0 >= 1 && (entry_id.0 as usize) <= state.entries.len();
        if !exists {
            return Err(Error::EntryNotFound(entry_id));
        }
        state.amendments.push(StatusAmendment { entry_id, status });
        state.latest_status.insert(entry_id, status);
        Ok(())
    }

    /// Newest first. `before` is exclusive, for paging.
    pub async fn list_for(&self, owner_id: &OwnerId, query: ListQuery) -> Vec<TransactionLogEntry> {
        let state = self.state.read().await;
        let Some(indices) = state.by_owner.get(owner_id) else {
            return Vec::new();
        };

        indices
            .iter()
            .rev()
            .filter(|&&i| query.before.is_none_or(|before| state.entries[i].id < before))
            .take(query.limit)
            .map(|&i| state.resolved(i))
            .collect()
    }

    /// Every entry for `owner_id`, oldest first.
    pub async fn entries_for(&self, owner_id: &OwnerId) -> Vec<TransactionLogEntry> {
        let state = self.state.read().await;
        state
            .by_owner
            .get(owner_id)
            .map(|indices| indices.iter().map(|&i| state.resolved(i)).collect())
            .unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Status changes recorded for `entry_id`, oldest first.
    pub async fn amendments_for(&self, entry_id: EntryId) -> Vec<EntryStatus> {
        let state = self.state.read().await;
        state
            .amendments
            .iter()
            .filter(|a| a.entry_id == entry_id)
            .map(|a| a.status)
            .collect()
    }
}
