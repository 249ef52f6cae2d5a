// Batch Orchestrator
//
// Runs the feed over every document of a project, one document at a time
// in sorted path order:
//
//   enumerate -> resolve path -> open -> match/apply -> save -> discard
//
// A failing document is recorded and the run moves on. Only configuration
// and feed errors stop a run, and those happen before any document is
// opened.

mod host;
mod summary;

pub use host::{Document, DocumentError, DocumentHost};
pub use summary::{write_summary, DrawingLogEntry, DrawingStatus, RunSummary};

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::applier::ApplyReport;
use crate::config::{ConfigError, RunConfig};
use crate::feed::{MetadataBatch, SchemaError};
use crate::log::{RunEvent, RunLog, RunLogStore};
use crate::parts::{apply_with_selection, PartNotFoundError, PartRegistry, PartSelection};
use crate::project::{resolve_drawings, ProjectDescriptor, ProjectError};

/// Errors that stop a run before any document is touched.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("feed error: {0}")]
    Schema(#[from] SchemaError),

    #[error("project error: {0}")]
    Project(#[from] ProjectError),
}

/// Why a single document failed.
#[derive(Debug, thiserror::Error)]
pub enum DrawingError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Part(#[from] PartNotFoundError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTotals {
    pub drawings_tried: usize,
    pub drawings_updated: usize,
    pub total_matched: usize,
    pub total_updated: usize,
}

/// Result of a batch run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub totals: RunTotals,
    pub drawings: Vec<DrawingLogEntry>,

    /// Apply reports of the documents that were processed, by path.
    pub reports: Vec<(String, ApplyReport)>,
}

/// Result of processing one opened document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentOutcome {
    pub report: ApplyReport,

    /// Where the document was saved, when saving is enabled.
    pub output_path: Option<PathBuf>,
}

/// Apply `batch` to every document of `project`.
pub fn run_batch<S: RunLogStore>(
    config: &RunConfig,
    project: &dyn ProjectDescriptor,
    host: &mut dyn DocumentHost,
    batch: &MetadataBatch,
    mut log: Option<&mut RunLog<S>>,
) -> BatchOutcome {
    emit(
        &mut log,
        RunEvent::RunStart {
            project_xml: config.project_descriptor_path.display().to_string(),
            json_in: config.feed_input_path.display().to_string(),
            save_changes: config.save_changes,
        },
    );

    let mut outcome = BatchOutcome::default();
    let registry = project.registry();
    let drawings = resolve_drawings(project);
    if drawings.is_empty() {
        tracing::warn!("no project drawings found");
    }

    for drawing in drawings {
        outcome.totals.drawings_tried += 1;
        let path = drawing.path;

        if !path.is_file() {
            tracing::warn!(path = %path.display(), "skipping missing drawing");
            emit(
                &mut log,
                RunEvent::Drawing {
                    drawing: path.display().to_string(),
                    status: DrawingStatus::Missing,
                    matched: 0,
                    updated: 0,
                    error: Some("missing_file".into()),
                },
            );
            outcome
                .drawings
                .push(DrawingLogEntry::missing(&path, drawing.note));
            continue;
        }

        let selection = match &batch.project_part {
            Some(part) => PartSelection::Forced(part.clone()),
            None => PartSelection::Forced(drawing.part.clone()),
        };

        match process_document(config, host, &path, &registry, &selection, batch) {
            Ok(DocumentOutcome {
                report,
                output_path,
            }) => {
                let matched = report.matched_links;
                let updated = report.updated_rows;
                tracing::info!(
                    path = %path.display(),
                    part = %report.used_part,
                    matched,
                    updated,
                    "drawing updated"
                );

                outcome.totals.total_matched += matched;
                outcome.totals.total_updated += updated;
                if updated > 0 {
                    outcome.totals.drawings_updated += 1;
                }

                emit(
                    &mut log,
                    RunEvent::Drawing {
                        drawing: path.display().to_string(),
                        status: DrawingStatus::Updated,
                        matched,
                        updated,
                        error: None,
                    },
                );
                outcome.drawings.push(DrawingLogEntry::updated(
                    &path,
                    matched,
                    updated,
                    output_path.as_deref(),
                    drawing.note,
                ));
                outcome.reports.push((path.display().to_string(), report));
            }
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "drawing failed");
                emit(
                    &mut log,
                    RunEvent::Drawing {
                        drawing: path.display().to_string(),
                        status: DrawingStatus::Error,
                        matched: 0,
                        updated: 0,
                        error: Some(err.to_string()),
                    },
                );
                outcome.drawings.push(DrawingLogEntry::failed(
                    &path,
                    drawing.note,
                    err.to_string(),
                ));
            }
        }
    }

    let totals = &outcome.totals;
    emit(
        &mut log,
        RunEvent::RunEnd {
            drawings_tried: totals.drawings_tried,
            drawings_updated: totals.drawings_updated,
            total_matched: totals.total_matched,
            total_updated: totals.total_updated,
        },
    );
    tracing::info!(
        tried = totals.drawings_tried,
        updated = totals.drawings_updated,
        matched = totals.total_matched,
        rows = totals.total_updated,
        "batch run finished"
    );

    outcome
}

/// Open, apply, optionally save, and always discard one document.
pub fn process_document(
    config: &RunConfig,
    host: &mut dyn DocumentHost,
    path: &Path,
    registry: &PartRegistry,
    selection: &PartSelection,
    batch: &MetadataBatch,
) -> Result<DocumentOutcome, DrawingError> {
    let mut document = host.open(path)?;

    let result = apply_and_save(config, document.as_mut(), registry, selection, batch);
    document.discard();
    result
}

fn apply_and_save(
    config: &RunConfig,
    document: &mut dyn Document,
    registry: &PartRegistry,
    selection: &PartSelection,
    batch: &MetadataBatch,
) -> Result<DocumentOutcome, DrawingError> {
    let report = apply_with_selection(document, registry, selection, batch)?;

    let output_path = if config.save_changes {
        let output = config.output_path_for(document.path());
        document.save_as(&output)?;
        Some(output)
    } else {
        None
    };

    Ok(DocumentOutcome {
        report,
        output_path,
    })
}

fn emit<S: RunLogStore>(log: &mut Option<&mut RunLog<S>>, event: RunEvent) {
    if let Some(log) = log.as_deref_mut() {
        if let Err(err) = log.record(event) {
            tracing::warn!(error = %err, "run log append failed");
        }
    }
}
