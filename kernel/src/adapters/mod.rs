// File-backed adapters for the store and project contracts.

pub mod json_document;
pub mod json_project;

pub use json_document::{JsonDocument, JsonDocumentHost};
pub use json_project::JsonProject;
