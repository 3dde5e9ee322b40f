//! Bulk-edit reconciliation engine for spreadsheet-style grid editors.
//!
//! A [`GridSession`] holds the working set of rows being edited and the
//! baseline they can be reverted to. Grid interactions arrive as batches of
//! positional [`GridOp`]s; the session classifies each touched row as
//! pending creation, update, or deletion. [`GridSession::commit`] flushes
//! the pending rows to a [`Persistence`] collaborator with per-row
//! partial-failure tolerance, remaps client temp ids to server ids, and
//! promotes the reconciled working set to the new baseline.
//! [`RelationEditor`] edits a row's many-to-many links independently of the
//! batched commit and refuses to touch rows that are not yet persisted.

mod commit;
mod error;
mod grid;
mod ledger;
mod record;
mod relation;
mod session;
mod store;

pub use commit::{CommitOutcome, CreatedRecord, Persistence};
pub use error::{Error, Result};
pub use grid::GridOp;
pub use ledger::RowStatus;
pub use record::{temp_id, EntitySchema, FieldRow, LinkedItem, Record};
pub use relation::{LinkOutcome, LinkableItem, RelationBackend, RelationEditor};
pub use session::GridSession;
pub use store::RowStore;
