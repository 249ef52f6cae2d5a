use std::collections::{BTreeMap, BTreeSet};

use super::{EntityId, LinkStore, RowEdit, RowId, StoreError, StoreRow};
use crate::feed::same_name;

#[derive(Debug, Clone, PartialEq, Eq)]
struct MemoryEntity {
    handle: String,
    row_id: Option<RowId>,
}

/// In-memory link store.
///
/// Backs the file-based document adapter and the tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLinkStore {
    entities: Vec<MemoryEntity>,
    rows: BTreeMap<RowId, Vec<(String, String)>>,
    locked: BTreeSet<RowId>,
}

impl InMemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a row with the given schema and values.
    pub fn add_row<K, V, I>(&mut self, row_id: RowId, columns: I)
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let values = columns
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.rows.insert(row_id, values);
    }

    /// Add an entity, optionally linked to a row.
    pub fn add_entity(&mut self, handle: impl Into<String>, row_id: Option<RowId>) -> EntityId {
        self.entities.push(MemoryEntity {
            handle: handle.into(),
            row_id,
        });
        EntityId(self.entities.len() - 1)
    }

    /// Make every subsequent edit of the row fail.
    pub fn lock_row(&mut self, row_id: RowId) {
        self.locked.insert(row_id);
    }

    pub fn value(&self, row_id: RowId, column: &str) -> Option<&str> {
        self.rows
            .get(&row_id)?
            .iter()
            .find(|(c, _)| same_name(c, column))
            .map(|(_, v)| v.as_str())
    }

    pub fn rows(&self) -> impl Iterator<Item = (RowId, &[(String, String)])> {
        self.rows.iter().map(|(id, values)| (*id, values.as_slice()))
    }

    /// Entities as `(handle, linked row)` pairs, in storage order.
    pub fn entity_links(&self) -> impl Iterator<Item = (&str, Option<RowId>)> {
        self.entities.iter().map(|e| (e.handle.as_str(), e.row_id))
    }
}

impl LinkStore for InMemoryLinkStore {
    fn entities(&self) -> Vec<EntityId> {
        (0..self.entities.len()).map(EntityId).collect()
    }

    fn handle(&self, entity: EntityId) -> Option<String> {
        self.entities.get(entity.0).map(|e| e.handle.clone())
    }

    fn has_link(&self, entity: EntityId) -> bool {
        self.entities
            .get(entity.0)
            .is_some_and(|e| e.row_id.is_some())
    }

    fn resolve_row_id(&self, entity: EntityId) -> Option<RowId> {
        self.entities
            .get(entity.0)
            .and_then(|e| e.row_id)
            .filter(|id| *id > 0 && self.rows.contains_key(id))
    }

    fn fetch_row(&self, row_id: RowId) -> Result<StoreRow, StoreError> {
        self.rows
            .get(&row_id)
            .map(|values| StoreRow::new(row_id, values.clone()))
            .ok_or(StoreError::RowNotFound(row_id))
    }

    fn begin_edit(&mut self, row_id: RowId) -> Result<RowEdit, StoreError> {
        if !self.rows.contains_key(&row_id) {
            return Err(StoreError::RowNotFound(row_id));
        }
        Ok(RowEdit::new(row_id))
    }

    fn commit_edit(&mut self, edit: RowEdit) -> Result<(), StoreError> {
        if self.locked.contains(&edit.row_id) {
            return Err(StoreError::Locked(edit.row_id));
        }

        let values = self
            .rows
            .get_mut(&edit.row_id)
            .ok_or(StoreError::RowNotFound(edit.row_id))?;

        // Validate everything before touching the row.
        let mut slots = Vec::with_capacity(edit.changes().len());
        for (column, _) in edit.changes() {
            let slot = values
                .iter()
                .position(|(c, _)| same_name(c, column))
                .ok_or_else(|| StoreError::UnknownColumn {
                    row_id: edit.row_id,
                    column: column.clone(),
                })?;
            slots.push(slot);
        }

        for (slot, (_, value)) in slots.into_iter().zip(edit.changes()) {
            values[slot].1 = value.clone();
        }

        Ok(())
    }
}
