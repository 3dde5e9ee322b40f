use std::collections::{HashMap, HashSet};

use futures::future::join_all;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::ledger::{ChangeLedger, RowStatus};
use crate::record::Record;
use crate::store::RowStore;

/// Server-confirmed result of a create request: the assigned id plus any
/// server-populated field values (generated timestamps etc.).
#[derive(Debug, Clone)]
pub struct CreatedRecord {
    pub id: String,
    pub fields: Map<String, Value>,
}

/// The entity CRUD boundary. Each call may fail independently; the
/// coordinator treats any rejection as a per-row failure.
#[allow(async_fn_in_trait)]
pub trait Persistence {
    async fn create(&self, payload: &Map<String, Value>) -> Result<CreatedRecord>;
    async fn update(&self, id: &str, payload: &Map<String, Value>) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Aggregate result of one commit. Partial failure is an expected outcome,
/// not an exception; failed rows stay pending and retry on the next commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

impl CommitOutcome {
    fn success(&mut self) {
        self.succeeded += 1;
    }

    fn failure(&mut self) {
        self.failed += 1;
    }
}

/// Drains the ledger against the persistence collaborator and reconciles
/// the results back into the store.
///
/// Creates are issued first (the deletion phase consults their failures),
/// then updates and deletes run concurrently; requests within a phase are
/// gathered with `join_all` so one rejection never cancels its siblings.
pub(crate) async fn run_commit<R: Record, P: Persistence>(
    store: &mut RowStore<R>,
    ledger: &mut ChangeLedger,
    persistence: &P,
) -> CommitOutcome {
    if ledger.is_clean() {
        return CommitOutcome::default();
    }

    let mut outcome = CommitOutcome::default();

    // Creation phase. Rows are snapshotted up front; a row missing from the
    // working set cannot be submitted and counts as a failure.
    let mut create_rows: Vec<R> = Vec::new();
    for id in ledger.pending_create() {
        match store.working_row(id) {
            Some(row) => create_rows.push(row.clone()),
            None => {
                warn!("create skipped: row {} not in working set", id);
                outcome.failure();
            }
        }
    }
    let create_results: Vec<(String, Result<CreatedRecord>)> =
        join_all(create_rows.into_iter().map(|row| async move {
            let temp_id = row.id().to_string();
            if let Err(e) = row.validate_for_create() {
                warn!("create rejected before request: {}", e);
                return (temp_id, Err(e));
            }
            let payload = row.payload();
            (temp_id, persistence.create(&payload).await)
        }))
        .await;

    let mut created_ok: HashMap<String, CreatedRecord> = HashMap::new();
    let mut created_failed: HashSet<String> = HashSet::new();
    for (temp_id, result) in create_results {
        match result {
            Ok(confirmed) => {
                created_ok.insert(temp_id, confirmed);
            }
            Err(e) => {
                warn!("create failed for {}: {}", temp_id, e);
                created_failed.insert(temp_id);
            }
        }
    }

    // Update phase. The ledger keeps the classifications disjoint by
    // construction; the status is re-checked anyway so a row that is
    // simultaneously being created or deleted is never updated.
    let mut update_rows: Vec<R> = Vec::new();
    for id in ledger.pending_update() {
        if ledger.status(id) != RowStatus::PendingUpdate {
            continue;
        }
        match store.working_row(id) {
            Some(row) => update_rows.push(row.clone()),
            None => {
                warn!("update skipped: row {} not in working set", id);
                outcome.failure();
            }
        }
    }
    let updates = join_all(update_rows.into_iter().map(|row| async move {
        let id = row.id().to_string();
        let payload = row.payload();
        let result = persistence.update(&id, &payload).await;
        (id, result)
    }));

    // Deletion phase. An id whose create was attempted and failed in this
    // very commit never reached the server; it settles client-side as a
    // trivial success with no request.
    let mut delete_ids: Vec<String> = Vec::new();
    let mut trivially_deleted: Vec<String> = Vec::new();
    for id in ledger.pending_delete() {
        if created_failed.contains(id) {
            trivially_deleted.push(id.to_string());
        } else {
            delete_ids.push(id.to_string());
        }
    }
    let deletes = join_all(delete_ids.into_iter().map(|id| async move {
        let result = persistence.delete(&id).await;
        (id, result)
    }));

    let (update_results, delete_results) = futures::join!(updates, deletes);

    // Reconciliation. Rebuild the working set in display order: drop rows
    // whose delete settled, remap rows whose create succeeded (the relation
    // list rides along verbatim; payloads never carry it), keep failed rows
    // as-is so they stay visibly dirty.
    let mut delete_succeeded: HashSet<String> = trivially_deleted.iter().cloned().collect();
    for (id, result) in &delete_results {
        if result.is_ok() {
            delete_succeeded.insert(id.clone());
        }
    }

    let next_working: Vec<R> = store
        .working()
        .iter()
        .filter(|row| !delete_succeeded.contains(row.id()))
        .map(|row| {
            let mut row = row.clone();
            if let Some(confirmed) = created_ok.get(row.id()) {
                row.assign_id(confirmed.id.clone());
                row.absorb_server_fields(&confirmed.fields);
            }
            row
        })
        .collect();
    store.replace_working_set(next_working);
    store.promote_to_baseline();

    // Settle the ledger: successes are forgotten, failures keep their
    // status so a subsequent commit retries them.
    for (temp_id, confirmed) in &created_ok {
        debug!("created {} -> {}", temp_id, confirmed.id);
        ledger.forget(temp_id);
        outcome.success();
    }
    outcome.failed += created_failed.len();

    for (id, result) in update_results {
        match result {
            Ok(()) => {
                ledger.forget(&id);
                outcome.success();
            }
            Err(e) => {
                warn!("update failed for {}: {}", id, e);
                outcome.failure();
            }
        }
    }

    for id in &trivially_deleted {
        ledger.forget(id);
        outcome.success();
    }
    for (id, result) in delete_results {
        match result {
            Ok(()) => {
                ledger.forget(&id);
                outcome.success();
            }
            Err(e) => {
                warn!("delete failed for {}: {}", id, e);
                outcome.failure();
            }
        }
    }

    debug!("commit settled: {} succeeded, {} failed", outcome.succeeded, outcome.failed);
    outcome
}
