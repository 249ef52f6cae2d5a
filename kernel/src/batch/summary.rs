// Run Summary
//
// The per-document log collected in memory during a run and written once
// at the end as a single JSON document.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawingStatus {
    Updated,
    Missing,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingLogEntry {
    pub drawing_path: String,
    pub status: DrawingStatus,
    pub matched: usize,
    pub updated: usize,
    pub output_path: Option<String>,
    pub path_resolution: Option<String>,
    pub error: Option<String>,
}

impl DrawingLogEntry {
    pub fn updated(
        path: &Path,
        matched: usize,
        updated: usize,
        output_path: Option<&Path>,
        path_resolution: Option<String>,
    ) -> Self {
        Self {
            drawing_path: path.display().to_string(),
            status: DrawingStatus::Updated,
            matched,
            updated,
            output_path: output_path.map(|p| p.display().to_string()),
            path_resolution,
            error: None,
        }
    }

    pub fn missing(path: &Path, path_resolution: Option<String>) -> Self {
        Self {
            drawing_path: path.display().to_string(),
            status: DrawingStatus::Missing,
            matched: 0,
            updated: 0,
            output_path: None,
            path_resolution,
            error: Some("file not found".into()),
        }
    }

    pub fn failed(path: &Path, path_resolution: Option<String>, error: String) -> Self {
        Self {
            drawing_path: path.display().to_string(),
            status: DrawingStatus::Error,
            matched: 0,
            updated: 0,
            output_path: None,
            path_resolution,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub project_xml: String,
    pub json_in: String,
    pub exported_at_utc: DateTime<Utc>,
    pub drawings: Vec<DrawingLogEntry>,
}

impl RunSummary {
    pub fn new(config: &RunConfig, drawings: Vec<DrawingLogEntry>) -> Self {
        Self {
            project_xml: config.project_descriptor_path.display().to_string(),
            json_in: config.feed_input_path.display().to_string(),
            exported_at_utc: Utc::now(),
            drawings,
        }
    }

    /// Write the summary as indented JSON, creating parent folders.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }
}

/// Write the summary if an output path is configured. Failures are logged
/// and otherwise ignored.
pub fn write_summary(config: &RunConfig, drawings: Vec<DrawingLogEntry>) {
    let Some(path) = &config.run_summary_output_path else {
        return;
    };

    let summary = RunSummary::new(config, drawings);
    match summary.write_to(path) {
        Ok(()) => tracing::info!(path = %path.display(), "run summary written"),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "could not write run summary")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_uses_external_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("reports").join("summary.json");

        let mut config = RunConfig::new("/proj/project.json", "/in/feed.json");
        config.run_summary_output_path = Some(out.clone());

        write_summary(
            &config,
            vec![
                DrawingLogEntry::updated(
                    Path::new("/proj/a.dwg"),
                    2,
                    1,
                    Some(Path::new("/proj/output.dwg")),
                    None,
                ),
                DrawingLogEntry::missing(Path::new("/proj/b.dwg"), None),
            ],
        );

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();

        assert_eq!(value["projectXml"], "/proj/project.json");
        assert_eq!(value["jsonIn"], "/in/feed.json");
        assert!(value["exportedAtUtc"].is_string());

        let first = &value["drawings"][0];
        assert_eq!(first["drawingPath"], "/proj/a.dwg");
        assert_eq!(first["status"], "updated");
        assert_eq!(first["outputPath"], "/proj/output.dwg");
        assert!(first["pathResolution"].is_null());
        assert_eq!(value["drawings"][1]["status"], "missing");
    }
}
