use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ledger::RowStatus;
use crate::record::Record;
use crate::session::GridSession;

/// A catalog entry that can be linked to a row, with an optional sublabel
/// (e.g. a control's framework code) that search also matches on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkableItem {
    pub id: String,
    pub name: String,
    pub sublabel: Option<String>,
}

impl LinkableItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), sublabel: None }
    }

    pub fn with_sublabel(mut self, sublabel: impl Into<String>) -> Self {
        self.sublabel = Some(sublabel.into());
        self
    }

    fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.name.to_lowercase().contains(&term)
            || self
                .sublabel
                .as_deref()
                .is_some_and(|s| s.to_lowercase().contains(&term))
    }
}

/// The many-to-many relation boundary. Link and unlink are never batched.
#[allow(async_fn_in_trait)]
pub trait RelationBackend {
    async fn search_linkable(&self, term: &str) -> Result<Vec<LinkableItem>>;
    async fn link(&self, owner_id: &str, item_id: &str) -> Result<()>;
    async fn unlink(&self, owner_id: &str, item_id: &str) -> Result<()>;
}

/// Result of a link/unlink attempt. `Blocked` means the owning row is
/// still pending creation and no request was issued; the UI renders a
/// disabled "save the row first" state instead of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Applied,
    Blocked,
}

/// Edits the links of a single row for a single relation kind. Holds the
/// search cache for as long as the panel stays open.
pub struct RelationEditor {
    row_id: String,
    cache: HashMap<String, Vec<LinkableItem>>,
}

impl RelationEditor {
    pub fn new(row_id: impl Into<String>) -> Self {
        Self { row_id: row_id.into(), cache: HashMap::new() }
    }

    pub fn row_id(&self) -> &str {
        &self.row_id
    }

    /// Whether relation edits are currently allowed: the row must exist in
    /// the working set and must not be pending creation. Mirrors the
    /// foreign-key constraint the backend would reject, enforced before
    /// the round trip.
    pub fn can_edit<R: Record>(&self, session: &GridSession<R>) -> bool {
        session.working_row(&self.row_id).is_some()
            && session.status(&self.row_id) != RowStatus::PendingCreate
    }

    /// Searches the external catalog, case-insensitively on name and
    /// sublabel, excluding items the row already links. Results are cached
    /// per term until the panel closes.
    pub async fn search<R: Record, B: RelationBackend>(
        &mut self,
        backend: &B,
        session: &GridSession<R>,
        term: &str,
    ) -> Result<Vec<LinkableItem>> {
        let row = session
            .working_row(&self.row_id)
            .ok_or_else(|| Error::RowNotFound { id: self.row_id.clone() })?;

        let key = term.to_lowercase();
        if !self.cache.contains_key(&key) {
            let fetched = backend.search_linkable(term).await?;
            let filtered: Vec<LinkableItem> =
                fetched.into_iter().filter(|item| item.matches(term)).collect();
            self.cache.insert(key.clone(), filtered);
        }

        // Linked items are excluded at return time, not at cache time, so
        // a link made while the panel is open drops out of later results.
        let linked = row.linked_items();
        Ok(self
            .cache
            .get(&key)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| !linked.iter().any(|l| l.id == item.id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    pub async fn link<R: Record, B: RelationBackend>(
        &self,
        backend: &B,
        session: &GridSession<R>,
        item_id: &str,
    ) -> Result<LinkOutcome> {
        self.guarded(session)?;
        if session.status(&self.row_id) == RowStatus::PendingCreate {
            return Ok(LinkOutcome::Blocked);
        }
        backend.link(&self.row_id, item_id).await?;
        Ok(LinkOutcome::Applied)
    }

    pub async fn unlink<R: Record, B: RelationBackend>(
        &self,
        backend: &B,
        session: &GridSession<R>,
        item_id: &str,
    ) -> Result<LinkOutcome> {
        self.guarded(session)?;
        if session.status(&self.row_id) == RowStatus::PendingCreate {
            return Ok(LinkOutcome::Blocked);
        }
        backend.unlink(&self.row_id, item_id).await?;
        Ok(LinkOutcome::Applied)
    }

    /// Drops the search cache; call when the search panel closes.
    pub fn close(&mut self) {
        self.cache.clear();
    }

    fn guarded<R: Record>(&self, session: &GridSession<R>) -> Result<()> {
        if session.working_row(&self.row_id).is_none() {
            return Err(Error::RowNotFound { id: self.row_id.clone() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::grid::GridOp;
    use crate::record::{EntitySchema, FieldRow, LinkedItem};

    struct MockRelations {
        catalog: Vec<LinkableItem>,
        calls: RefCell<Vec<String>>,
        fail_link: bool,
    }

    impl MockRelations {
        fn new(catalog: Vec<LinkableItem>) -> Self {
            Self { catalog, calls: RefCell::new(Vec::new()), fail_link: false }
        }
    }

    impl RelationBackend for MockRelations {
        async fn search_linkable(&self, term: &str) -> Result<Vec<LinkableItem>> {
            self.calls.borrow_mut().push(format!("search:{}", term));
            Ok(self.catalog.clone())
        }

        async fn link(&self, owner_id: &str, item_id: &str) -> Result<()> {
            self.calls.borrow_mut().push(format!("link:{}:{}", owner_id, item_id));
            if self.fail_link {
                return Err(Error::Persistence("link rejected".to_string()));
            }
            Ok(())
        }

        async fn unlink(&self, owner_id: &str, item_id: &str) -> Result<()> {
            self.calls.borrow_mut().push(format!("unlink:{}:{}", owner_id, item_id));
            Ok(())
        }
    }

    fn catalog() -> Vec<LinkableItem> {
        vec![
            LinkableItem::new("ctl-1", "Access control").with_sublabel("AC-2"),
            LinkableItem::new("ctl-2", "Incident response").with_sublabel("IR-4"),
            LinkableItem::new("ctl-3", "Access review"),
        ]
    }

    fn session_with(rows: Vec<FieldRow>) -> GridSession<FieldRow> {
        GridSession::new(rows)
    }

    fn row(id: &str, name: &str) -> FieldRow {
        FieldRow::new(id, EntitySchema::new("task_template", &["name"])).with_field("name", name)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn link_on_pending_creation_row_is_blocked_without_a_call() {
        let mut session = session_with(vec![]);
        session
            .apply(vec![GridOp::Create { at: 0, rows: vec![row("tmp-1", "A")] }])
            .unwrap();

        let backend = MockRelations::new(catalog());
        let editor = RelationEditor::new("tmp-1");

        assert!(!editor.can_edit(&session));
        let linked = editor.link(&backend, &session, "ctl-1").await.unwrap();
        let unlinked = editor.unlink(&backend, &session, "ctl-1").await.unwrap();

        assert_eq!(linked, LinkOutcome::Blocked);
        assert_eq!(unlinked, LinkOutcome::Blocked);
        assert!(backend.calls.borrow().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn link_on_persisted_row_issues_one_call() {
        let session = session_with(vec![row("srv-1", "A")]);
        let backend = MockRelations::new(catalog());
        let editor = RelationEditor::new("srv-1");

        assert!(editor.can_edit(&session));
        let outcome = editor.link(&backend, &session, "ctl-1").await.unwrap();
        assert_eq!(outcome, LinkOutcome::Applied);
        assert_eq!(backend.calls.borrow().as_slice(), ["link:srv-1:ctl-1"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn link_rejection_surfaces_as_persistence_error() {
        let session = session_with(vec![row("srv-1", "A")]);
        let mut backend = MockRelations::new(catalog());
        backend.fail_link = true;
        let editor = RelationEditor::new("srv-1");

        let err = editor.link(&backend, &session, "ctl-1").await.unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn link_on_missing_row_is_row_not_found() {
        let session = session_with(vec![]);
        let backend = MockRelations::new(catalog());
        let editor = RelationEditor::new("ghost");

        let err = editor.link(&backend, &session, "ctl-1").await.unwrap_err();
        assert!(matches!(err, Error::RowNotFound { .. }));
        assert!(backend.calls.borrow().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn search_filters_case_insensitively_on_name_and_sublabel() {
        let session = session_with(vec![row("srv-1", "A")]);
        let backend = MockRelations::new(catalog());
        let mut editor = RelationEditor::new("srv-1");

        let by_name = editor.search(&backend, &session, "ACCESS").await.unwrap();
        let ids: Vec<_> = by_name.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["ctl-1", "ctl-3"]);

        let by_sublabel = editor.search(&backend, &session, "ir-4").await.unwrap();
        assert_eq!(by_sublabel.len(), 1);
        assert_eq!(by_sublabel[0].id, "ctl-2");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn repeated_search_hits_the_backend_once_until_closed() {
        let session = session_with(vec![row("srv-1", "A")]);
        let backend = MockRelations::new(catalog());
        let mut editor = RelationEditor::new("srv-1");

        editor.search(&backend, &session, "access").await.unwrap();
        editor.search(&backend, &session, "Access").await.unwrap();
        assert_eq!(backend.calls.borrow().len(), 1);

        editor.close();
        editor.search(&backend, &session, "access").await.unwrap();
        assert_eq!(backend.calls.borrow().len(), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn already_linked_items_are_not_offered() {
        let mut linked_row = row("srv-1", "A");
        linked_row.add_relation(LinkedItem::new("ctl-1", "Access control"));
        let session = session_with(vec![linked_row]);

        let backend = MockRelations::new(catalog());
        let mut editor = RelationEditor::new("srv-1");

        let results = editor.search(&backend, &session, "access").await.unwrap();
        let ids: Vec<_> = results.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["ctl-3"]);
    }
}
