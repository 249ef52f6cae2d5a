// Row/Link Store Contract
//
// The narrow view of the external object/row store that the reconciliation
// engine relies on. Implementations may sit on a CAD database, a file
// snapshot, or memory.
//
// This module defines *interfaces only*, plus the row snapshot type.

mod memory;

pub use memory::InMemoryLinkStore;

use serde::{Deserialize, Serialize};

use crate::feed::same_name;

/// Identifier of a row in the store.
pub type RowId = i64;

/// Position of an entity in a document's primary content space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub usize);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("row {0} not found")]
    RowNotFound(RowId),

    #[error("row {0} is locked")]
    Locked(RowId),

    #[error("column `{column}` does not exist on row {row_id}")]
    UnknownColumn { row_id: RowId, column: String },
}

/// Read-only snapshot of a row: its schema and current values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRow {
    pub row_id: RowId,
    values: Vec<(String, String)>,
}

impl StoreRow {
    pub fn new(row_id: RowId, values: Vec<(String, String)>) -> Self {
        Self { row_id, values }
    }

    /// Column names in schema order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(c, _)| c.as_str())
    }

    /// Schema spelling of `column`, if the row has it.
    pub fn column(&self, column: &str) -> Option<&str> {
        self.columns().find(|c| same_name(c, column))
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(c, _)| same_name(c, column))
            .map(|(_, v)| v.as_str())
    }

    /// First non-blank value among `columns`, trimmed.
    pub fn first_non_empty<'a, I>(&self, columns: I) -> Option<&str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        columns
            .into_iter()
            .filter_map(|c| self.get(c))
            .map(str::trim)
            .find(|v| !v.is_empty())
    }
}

/// Pending changes to a single row.
///
/// Dropping an edit without committing it abandons the changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowEdit {
    pub row_id: RowId,
    changes: Vec<(String, String)>,
}

impl RowEdit {
    pub fn new(row_id: RowId) -> Self {
        Self {
            row_id,
            changes: Vec::new(),
        }
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.changes.push((column.into(), value.into()));
    }

    pub fn changes(&self) -> &[(String, String)] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Link and row access for one document within one project part.
///
/// Properties required from implementations:
/// - `entities` is stable for the duration of a pass
/// - `resolve_row_id` never fails; an entity that cannot be resolved is unlinked
/// - `commit_edit` applies all changes of the edit or none of them
pub trait LinkStore {
    /// Entities in the document's primary content space.
    fn entities(&self) -> Vec<EntityId>;

    /// Native identity handle of an entity.
    fn handle(&self, entity: EntityId) -> Option<String>;

    /// Whether the entity carries a store link at all.
    fn has_link(&self, entity: EntityId) -> bool;

    /// Row linked to the entity, if it can be resolved.
    fn resolve_row_id(&self, entity: EntityId) -> Option<RowId>;

    /// Fetch a snapshot of a row.
    fn fetch_row(&self, row_id: RowId) -> Result<StoreRow, StoreError>;

    /// Open a scoped edit on a row.
    fn begin_edit(&mut self, row_id: RowId) -> Result<RowEdit, StoreError>;

    /// Apply an edit opened with `begin_edit`.
    fn commit_edit(&mut self, edit: RowEdit) -> Result<(), StoreError>;
}
