use crate::error::{Error, Result};
use crate::ledger::ChangeLedger;
use crate::record::Record;
use crate::store::RowStore;

/// One positional edit produced by a grid interaction. Ranges are
/// half-open; `Create`/`Update` carry the affected rows since the engine
/// owns the working array.
#[derive(Debug, Clone)]
pub enum GridOp<R> {
    /// Insert `rows` starting at index `at`.
    Create { at: usize, rows: Vec<R> },
    /// Replace the rows in `[at, at + rows.len())` with new field values.
    /// Each replacement must keep the id of the row it replaces.
    Update { at: usize, rows: Vec<R> },
    /// Remove the rows in `[from, to)`.
    Delete { from: usize, to: usize },
    /// Move the row at `from` to position `to`. Pure reorder; row identity
    /// and pending status are unaffected.
    Move { from: usize, to: usize },
}

/// Applies a batch of grid operations in order, each against the array
/// state produced by the previous one, recording identifier classifications
/// in the ledger as it goes.
pub(crate) fn apply_ops<R: Record>(
    store: &mut RowStore<R>,
    ledger: &mut ChangeLedger,
    ops: Vec<GridOp<R>>,
) -> Result<()> {
    for op in ops {
        match op {
            GridOp::Create { at, rows } => {
                let working = store.working_mut();
                if at > working.len() {
                    return Err(Error::InvalidOp(format!(
                        "create at {} past end of {} rows",
                        at,
                        working.len()
                    )));
                }
                for (offset, row) in rows.into_iter().enumerate() {
                    ledger.mark_created(row.id());
                    working.insert(at + offset, row);
                }
            }
            GridOp::Update { at, rows } => {
                let working = store.working_mut();
                let to = at + rows.len();
                if to > working.len() {
                    return Err(Error::InvalidOp(format!(
                        "update range {}..{} past end of {} rows",
                        at,
                        to,
                        working.len()
                    )));
                }
                for (offset, row) in rows.into_iter().enumerate() {
                    let slot = &mut working[at + offset];
                    if slot.id() != row.id() {
                        return Err(Error::InvalidOp(format!(
                            "update at index {} changes row id {} to {}",
                            at + offset,
                            slot.id(),
                            row.id()
                        )));
                    }
                    ledger.mark_updated(row.id());
                    *slot = row;
                }
            }
            GridOp::Delete { from, to } => {
                let working = store.working_mut();
                if from > to || to > working.len() {
                    return Err(Error::InvalidOp(format!(
                        "delete range {}..{} invalid for {} rows",
                        from,
                        to,
                        working.len()
                    )));
                }
                // Classified against the pre-removal snapshot.
                for row in &working[from..to] {
                    ledger.mark_deleted(row.id());
                }
                working.drain(from..to);
            }
            GridOp::Move { from, to } => {
                let working = store.working_mut();
                if from >= working.len() || to >= working.len() {
                    return Err(Error::InvalidOp(format!(
                        "move {} -> {} invalid for {} rows",
                        from,
                        to,
                        working.len()
                    )));
                }
                let row = working.remove(from);
                working.insert(to, row);
            }
        }
    }
    Ok(())
}
