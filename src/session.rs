use crate::commit::{run_commit, CommitOutcome, Persistence};
use crate::error::Result;
use crate::grid::{apply_ops, GridOp};
use crate::ledger::{ChangeLedger, RowStatus};
use crate::record::Record;
use crate::store::RowStore;

/// One bulk-edit session over a grid of rows: the row store, the change
/// ledger, and the operations that tie them together (apply, commit,
/// cancel).
///
/// The session is single-threaded UI state. Callers are expected to
/// disable grid edits while a `commit` future is being awaited.
pub struct GridSession<R: Record> {
    store: RowStore<R>,
    ledger: ChangeLedger,
}

impl<R: Record> GridSession<R> {
    /// Opens a session over the server-confirmed rows; they become both
    /// the working set and the baseline.
    pub fn new(rows: Vec<R>) -> Self {
        Self { store: RowStore::new(rows), ledger: ChangeLedger::new() }
    }

    pub fn working_rows(&self) -> &[R] {
        self.store.working()
    }

    pub fn baseline_rows(&self) -> &[R] {
        self.store.baseline()
    }

    pub fn working_row(&self, id: &str) -> Option<&R> {
        self.store.working_row(id)
    }

    /// Pending status for one row, for the presentation layer to render
    /// dirty/pending affordances.
    pub fn status(&self, id: &str) -> RowStatus {
        self.ledger.status(id)
    }

    pub fn is_dirty(&self) -> bool {
        !self.ledger.is_clean()
    }

    /// Applies one user interaction's worth of grid operations, in order,
    /// classifying each row as created, updated, or deleted as it goes.
    pub fn apply(&mut self, ops: Vec<GridOp<R>>) -> Result<()> {
        apply_ops(&mut self.store, &mut self.ledger, ops)
    }

    /// Flushes all pending changes to the persistence collaborator.
    /// Partial failure is reported, never raised; failed rows stay pending
    /// so a later `commit` retries exactly them. A clean session commits
    /// nothing and reports zeroes.
    pub async fn commit<P: Persistence>(&mut self, persistence: &P) -> CommitOutcome {
        run_commit(&mut self.store, &mut self.ledger, persistence).await
    }

    /// Reverts the working set to the baseline and clears all pending
    /// classifications. Synchronous, idempotent, no network.
    pub fn cancel(&mut self) {
        self.store.revert_to_baseline();
        self.ledger.clear();
    }
}
