use crate::record::Record;

/// Working set (the possibly-dirty rows visible in the grid) plus the
/// baseline (the last committed snapshot, the revert target for cancel).
pub struct RowStore<R: Record> {
    working: Vec<R>,
    baseline: Vec<R>,
}

impl<R: Record> RowStore<R> {
    pub fn new(rows: Vec<R>) -> Self {
        Self { baseline: rows.clone(), working: rows }
    }

    pub fn working(&self) -> &[R] {
        &self.working
    }

    pub fn working_mut(&mut self) -> &mut Vec<R> {
        &mut self.working
    }

    pub fn baseline(&self) -> &[R] {
        &self.baseline
    }

    pub fn working_row(&self, id: &str) -> Option<&R> {
        self.working.iter().find(|r| r.id() == id)
    }

    pub fn baseline_row(&self, id: &str) -> Option<&R> {
        self.baseline.iter().find(|r| r.id() == id)
    }

    /// Total replacement of the working set, used after classification and
    /// after commit reconciliation.
    pub fn replace_working_set(&mut self, rows: Vec<R>) {
        self.working = rows;
    }

    /// Baseline := deep copy of the working set. Called after a commit
    /// attempt completes, success or partial failure alike.
    pub fn promote_to_baseline(&mut self) {
        self.baseline = self.working.clone();
    }

    /// Working set := deep copy of the baseline.
    pub fn revert_to_baseline(&mut self) {
        self.working = self.baseline.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EntitySchema, FieldRow};

    fn row(id: &str, name: &str) -> FieldRow {
        FieldRow::new(id, EntitySchema::new("task_template", &[])).with_field("name", name)
    }

    #[test]
    fn new_store_starts_with_equal_working_and_baseline() {
        let store = RowStore::new(vec![row("a", "A"), row("b", "B")]);
        assert_eq!(store.working().len(), 2);
        assert_eq!(store.baseline().len(), 2);
        assert!(store.working_row("a").is_some());
        assert!(store.working_row("missing").is_none());
    }

    #[test]
    fn promote_and_revert_round_trip() {
        let mut store = RowStore::new(vec![row("a", "A")]);

        store.replace_working_set(vec![row("a", "A"), row("b", "B")]);
        assert_eq!(store.baseline().len(), 1);

        store.promote_to_baseline();
        assert_eq!(store.baseline().len(), 2);

        store.replace_working_set(vec![]);
        store.revert_to_baseline();
        assert_eq!(store.working().len(), 2);
        assert!(store.working_row("b").is_some());
    }

    #[test]
    fn revert_does_not_alias_the_baseline() {
        let mut store = RowStore::new(vec![row("a", "A")]);
        store.revert_to_baseline();
        store.working_mut()[0].set_field("name", "edited");
        assert_eq!(store.baseline_row("a").unwrap().field_str("name"), Some("A"));
    }
}
