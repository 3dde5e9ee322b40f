use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Per-row pending status. Absent from the ledger means clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowStatus {
    Clean,
    PendingCreate,
    PendingUpdate,
    PendingDelete,
}

/// What a recorded delete requires of the commit coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteDisposition {
    /// The row only ever existed client-side; it vanishes with no request.
    LocalOnly,
    /// The row was persisted at some point; the server must be told.
    NeedsServer,
}

/// Tracks which rows changed and how. A single map from id to status keeps
/// the create/update/delete classifications structurally disjoint.
#[derive(Debug, Default)]
pub struct ChangeLedger {
    status: HashMap<String, RowStatus>,
}

impl ChangeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, id: &str) -> RowStatus {
        self.status.get(id).copied().unwrap_or(RowStatus::Clean)
    }

    pub fn is_clean(&self) -> bool {
        self.status.is_empty()
    }

    pub fn mark_created(&mut self, id: &str) {
        self.status.insert(id.to_string(), RowStatus::PendingCreate);
    }

    /// A row already pending creation or deletion is not separately marked
    /// updated; those classifications override update.
    pub fn mark_updated(&mut self, id: &str) {
        self.status
            .entry(id.to_string())
            .or_insert(RowStatus::PendingUpdate);
    }

    pub fn mark_deleted(&mut self, id: &str) -> DeleteDisposition {
        match self.status.get(id) {
            Some(RowStatus::PendingCreate) => {
                self.status.remove(id);
                DeleteDisposition::LocalOnly
            }
            _ => {
                self.status.insert(id.to_string(), RowStatus::PendingDelete);
                DeleteDisposition::NeedsServer
            }
        }
    }

    /// Settles an id after its commit request succeeded.
    pub fn forget(&mut self, id: &str) {
        self.status.remove(id);
    }

    pub fn clear(&mut self) {
        self.status.clear();
    }

    pub fn pending_create(&self) -> impl Iterator<Item = &str> {
        self.with_status(RowStatus::PendingCreate)
    }

    pub fn pending_update(&self) -> impl Iterator<Item = &str> {
        self.with_status(RowStatus::PendingUpdate)
    }

    pub fn pending_delete(&self) -> impl Iterator<Item = &str> {
        self.with_status(RowStatus::PendingDelete)
    }

    fn with_status(&self, wanted: RowStatus) -> impl Iterator<Item = &str> {
        self.status
            .iter()
            .filter(move |(_, s)| **s == wanted)
            .map(|(id, _)| id.as_str())
    }
}
