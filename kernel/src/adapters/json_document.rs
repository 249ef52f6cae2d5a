// JSON Document Adapter
//
// A document snapshot stored as JSON: the document's entities with their
// per-part links, and the rows each part keeps for this document.
//
//   {
//     "entities": [ { "handle": "2F1", "links": { "Piping": 12 } } ],
//     "parts": { "Piping": { "rows": [ { "rowId": 12, "columns": { "Tag": "V1" } } ] } }
//   }
//
// A row's schema is the set of its column keys.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::batch::{Document, DocumentError, DocumentHost};
use crate::feed::same_name;
use crate::store::{InMemoryLinkStore, LinkStore, RowId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFile {
    #[serde(default)]
    pub entities: Vec<EntityFile>,
    #[serde(default)]
    pub parts: BTreeMap<String, PartFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityFile {
    pub handle: String,
    #[serde(default)]
    pub links: BTreeMap<String, RowId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartFile {
    #[serde(default)]
    pub rows: Vec<RowFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFile {
    pub row_id: RowId,
    #[serde(default)]
    pub columns: BTreeMap<String, String>,
}

/// An opened JSON document: one link store per part.
#[derive(Debug)]
pub struct JsonDocument {
    path: PathBuf,
    entities: Vec<EntityFile>,
    stores: Vec<(String, InMemoryLinkStore)>,
}

impl JsonDocument {
    pub fn from_file(path: &Path, file: DocumentFile) -> Self {
        let stores = file
            .parts
            .into_iter()
            .map(|(part, content)| {
                let mut store = InMemoryLinkStore::new();
                for row in content.rows {
                    store.add_row(row.row_id, row.columns);
                }
                for entity in &file.entities {
                    let link = entity
                        .links
                        .iter()
                        .find(|(p, _)| same_name(p, &part))
                        .map(|(_, row_id)| *row_id);
                    store.add_entity(entity.handle.clone(), link);
                }
                (part, store)
            })
            .collect();

        Self {
            path: path.to_path_buf(),
            entities: file.entities,
            stores,
        }
    }

    /// Current state as a snapshot file.
    pub fn to_file(&self) -> DocumentFile {
        let parts = self
            .stores
            .iter()
            .map(|(part, store)| {
                let rows = store
                    .rows()
                    .map(|(row_id, values)| RowFile {
                        row_id,
                        columns: values.iter().cloned().collect(),
                    })
                    .collect();
                (part.clone(), PartFile { rows })
            })
            .collect();

        DocumentFile {
            entities: self.entities.clone(),
            parts,
        }
    }
}

impl Document for JsonDocument {
    fn path(&self) -> &Path {
        &self.path
    }

    fn data_links(&mut self, part: &str) -> Option<&mut dyn LinkStore> {
        self.stores
            .iter_mut()
            .find(|(name, _)| same_name(name, part))
            .map(|(_, store)| store as &mut dyn LinkStore)
    }

    fn save_as(&mut self, path: &Path) -> Result<(), DocumentError> {
        let save_error = |reason: String| DocumentError::Save {
            path: path.display().to_string(),
            reason,
        };

        let json = serde_json::to_string_pretty(&self.to_file())
            .map_err(|e| save_error(e.to_string()))?;
        fs::write(path, json).map_err(|e| save_error(e.to_string()))
    }

    fn discard(self: Box<Self>) {
        tracing::debug!(path = %self.path.display(), "document closed");
    }
}

/// Opens JSON document snapshots from disk.
#[derive(Debug, Default)]
pub struct JsonDocumentHost;

impl DocumentHost for JsonDocumentHost {
    fn open(&mut self, path: &Path) -> Result<Box<dyn Document>, DocumentError> {
        let open_error = |reason: String| DocumentError::Open {
            path: path.display().to_string(),
            reason,
        };

        let text = fs::read_to_string(path).map_err(|e| open_error(e.to_string()))?;
        let file: DocumentFile =
            serde_json::from_str(&text).map_err(|e| open_error(e.to_string()))?;

        Ok(Box::new(JsonDocument::from_file(path, file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntityId;

    const SNAPSHOT: &str = r#"
    {
      "entities": [
        { "handle": "2F1", "links": { "Piping": 12 } },
        { "handle": "2F2", "links": { "PnId": 7 } },
        { "handle": "2F3" }
      ],
      "parts": {
        "Piping": { "rows": [ { "rowId": 12, "columns": { "Tag": "V1", "Size": "1in" } } ] },
        "PnId": { "rows": [ { "rowId": 7, "columns": { "Tag": "V1" } } ] }
      }
    }
    "#;

    #[test]
    fn links_are_split_per_part() {
        let file: DocumentFile = serde_json::from_str(SNAPSHOT).unwrap();
        let mut doc = JsonDocument::from_file(Path::new("a.dwg"), file);

        let piping = doc.data_links("piping").unwrap();
        assert_eq!(piping.entities().len(), 3);
        assert_eq!(piping.resolve_row_id(EntityId(0)), Some(12));
        assert_eq!(piping.resolve_row_id(EntityId(1)), None);

        let pnid = doc.data_links("PnId").unwrap();
        assert_eq!(pnid.resolve_row_id(EntityId(1)), Some(7));

        assert!(doc.data_links("Electrical").is_none());
    }

    #[test]
    fn save_as_writes_updated_rows() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.dwg");
        fs::write(&source, SNAPSHOT).unwrap();

        let mut host = JsonDocumentHost;
        let mut doc = host.open(&source).unwrap();

        let store = doc.data_links("Piping").unwrap();
        let mut edit = store.begin_edit(12).unwrap();
        edit.set("Size", "2in");
        store.commit_edit(edit).unwrap();

        let out = dir.path().join("output.dwg");
        doc.save_as(&out).unwrap();
        doc.discard();

        let saved: DocumentFile =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(saved.parts["Piping"].rows[0].columns["Size"], "2in");
        assert_eq!(saved.entities.len(), 3);

        let original: DocumentFile =
            serde_json::from_str(&fs::read_to_string(&source).unwrap()).unwrap();
        assert_eq!(original.parts["Piping"].rows[0].columns["Size"], "1in");
    }

    #[test]
    fn unreadable_document_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.dwg");
        fs::write(&path, "not json").unwrap();

        let err = JsonDocumentHost.open(&path).err().unwrap();
        assert!(matches!(err, DocumentError::Open { .. }));
    }
}
