use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A linked entity of another kind, as rendered in a relation cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedItem {
    pub id: String,
    pub name: String,
}

impl LinkedItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

/// A bulk-editable record. The engine needs only the identifier, a payload
/// projection for the persistence boundary, and the relation list (which is
/// never part of the payload).
pub trait Record: Clone {
    fn id(&self) -> &str;

    /// Remaps a client temp id to the server-assigned id after a create.
    fn assign_id(&mut self, id: String);

    /// Editable field values sent to the persistence collaborator.
    /// Relation lists are excluded.
    fn payload(&self) -> Map<String, Value>;

    /// Folds server-confirmed values (generated timestamps etc.) back into
    /// the record after a successful create.
    fn absorb_server_fields(&mut self, fields: &Map<String, Value>);

    fn linked_items(&self) -> &[LinkedItem];

    /// Checked before a create request is issued; a failure is counted
    /// without a network round trip.
    fn validate_for_create(&self) -> Result<()> {
        Ok(())
    }
}

/// Field requirements for one entity kind.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    pub kind: String,
    pub required: Vec<String>,
}

impl EntitySchema {
    pub fn new(kind: impl Into<String>, required: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            kind: kind.into(),
            required: required.iter().map(|s| s.to_string()).collect(),
        })
    }
}

/// Generic row: an id, a JSON field map, and a relation list, validated
/// against a shared [`EntitySchema`].
#[derive(Debug, Clone)]
pub struct FieldRow {
    id: String,
    fields: Map<String, Value>,
    relations: Vec<LinkedItem>,
    schema: Arc<EntitySchema>,
}

impl FieldRow {
    pub fn new(id: impl Into<String>, schema: Arc<EntitySchema>) -> Self {
        Self { id: id.into(), fields: Map::new(), relations: Vec::new(), schema }
    }

    /// A fresh row with a client-generated temporary identifier.
    pub fn new_temp(schema: Arc<EntitySchema>) -> Self {
        Self::new(temp_id(), schema)
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn relations(&self) -> &[LinkedItem] {
        &self.relations
    }

    pub fn add_relation(&mut self, item: LinkedItem) {
        if !self.relations.iter().any(|r| r.id == item.id) {
            self.relations.push(item);
        }
    }

    pub fn remove_relation(&mut self, item_id: &str) {
        self.relations.retain(|r| r.id != item_id);
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }
}

impl Record for FieldRow {
    fn id(&self) -> &str {
        &self.id
    }

    fn assign_id(&mut self, id: String) {
        self.id = id;
    }

    fn payload(&self) -> Map<String, Value> {
        self.fields.clone()
    }

    fn absorb_server_fields(&mut self, fields: &Map<String, Value>) {
        for (name, value) in fields {
            self.fields.insert(name.clone(), value.clone());
        }
    }

    fn linked_items(&self) -> &[LinkedItem] {
        &self.relations
    }

    fn validate_for_create(&self) -> Result<()> {
        for required in &self.schema.required {
            match self.fields.get(required) {
                None | Some(Value::Null) => {
                    return Err(Error::Validation {
                        id: self.id.clone(),
                        field: required.clone(),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

static NEXT_TEMP: AtomicU64 = AtomicU64::new(1);

/// Mints a process-unique client-side identifier for a not-yet-persisted row.
pub fn temp_id() -> String {
    format!("tmp-{}", NEXT_TEMP.fetch_add(1, Ordering::Relaxed))
}
