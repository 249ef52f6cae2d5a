// Document Host Contract
//
// Opening, saving and releasing target documents. The orchestrator owns an
// opened document exclusively until it is discarded.

use std::path::Path;

use crate::store::LinkStore;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("cannot open document {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("cannot save document to {path}: {reason}")]
    Save { path: String, reason: String },
}

/// An opened document.
pub trait Document {
    fn path(&self) -> &Path;

    /// Link store of this document within `part`, if the part has one here.
    fn data_links(&mut self, part: &str) -> Option<&mut dyn LinkStore>;

    /// Persist the current state under a new path.
    fn save_as(&mut self, path: &Path) -> Result<(), DocumentError>;

    /// Release the document without saving.
    fn discard(self: Box<Self>);
}

/// Opens documents by path.
pub trait DocumentHost {
    fn open(&mut self, path: &Path) -> Result<Box<dyn Document>, DocumentError>;
}
