// Run Configuration
//
// Built once at process start and passed by reference to the orchestrator.
// Nothing in the kernel reads the environment directly.

use std::path::{Path, PathBuf};

/// Name given to saved documents, next to their source.
pub const DEFAULT_OUTPUT_FILE_NAME: &str = "output.dwg";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("`{0}` is required")]
    Missing(&'static str),

    #[error("`{key}` points to {path}, which does not exist")]
    NotFound { key: &'static str, path: String },

    #[error("output file name `{0}` must be a bare file name")]
    InvalidOutputName(String),

    #[error("cannot open run log {path}: {reason}")]
    RunLogUnavailable { path: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub project_descriptor_path: PathBuf,
    pub feed_input_path: PathBuf,
    pub run_summary_output_path: Option<PathBuf>,
    pub run_log_path: Option<PathBuf>,
    pub save_changes: bool,
    pub output_file_name: String,
}

impl RunConfig {
    pub fn new(project_descriptor_path: impl Into<PathBuf>, feed_input_path: impl Into<PathBuf>) -> Self {
        Self {
            project_descriptor_path: project_descriptor_path.into(),
            feed_input_path: feed_input_path.into(),
            run_summary_output_path: None,
            run_log_path: None,
            save_changes: true,
            output_file_name: DEFAULT_OUTPUT_FILE_NAME.to_string(),
        }
    }

    /// Check required inputs before any document is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_file("projectDescriptorPath", &self.project_descriptor_path)?;
        require_file("feedInputPath", &self.feed_input_path)?;

        let name = self.output_file_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ConfigError::InvalidOutputName(self.output_file_name.clone()));
        }

        Ok(())
    }

    /// Where a processed document is saved: its own folder, or the feed's
    /// folder when the document's folder is unusable.
    pub fn output_path_for(&self, document: &Path) -> PathBuf {
        let dir = document
            .parent()
            .filter(|d| !d.as_os_str().is_empty() && d.is_dir())
            .or_else(|| self.feed_input_path.parent())
            .unwrap_or_else(|| Path::new("."));
        dir.join(&self.output_file_name)
    }
}

/// Interpret a save-changes flag: only `0` and `false` turn saving off.
pub fn parse_save_flag(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") => true,
        Some(v) => !(v == "0" || v.eq_ignore_ascii_case("false")),
    }
}

fn require_file(key: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Missing(key));
    }
    if !path.is_file() {
        return Err(ConfigError::NotFound {
            key,
            path: path.display().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn save_flag_defaults_to_true() {
        assert!(parse_save_flag(None));
        assert!(parse_save_flag(Some("")));
        assert!(parse_save_flag(Some("1")));
        assert!(parse_save_flag(Some("yes")));
        assert!(!parse_save_flag(Some("0")));
        assert!(!parse_save_flag(Some(" FALSE ")));
    }

    #[test]
    fn missing_inputs_are_rejected() {
        let config = RunConfig::new("", "feed.json");
        assert_eq!(
            config.validate(),
            Err(ConfigError::Missing("projectDescriptorPath"))
        );

        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project.json");
        fs::write(&project, "{}").unwrap();

        let config = RunConfig::new(&project, dir.path().join("nope.json"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotFound {
                key: "feedInputPath",
                ..
            })
        ));
    }

    #[test]
    fn output_name_must_be_bare() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project.json");
        let feed = dir.path().join("feed.json");
        fs::write(&project, "{}").unwrap();
        fs::write(&feed, "{}").unwrap();

        let mut config = RunConfig::new(&project, &feed);
        assert_eq!(config.validate(), Ok(()));

        config.output_file_name = "../out.dwg".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidOutputName(_))
        ));
    }

    #[test]
    fn output_falls_back_to_feed_folder() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::new("project.json", dir.path().join("feed.json"));

        let doc_dir = dir.path().join("dwgs");
        fs::create_dir_all(&doc_dir).unwrap();
        assert_eq!(
            config.output_path_for(&doc_dir.join("a.dwg")),
            doc_dir.join(DEFAULT_OUTPUT_FILE_NAME)
        );

        assert_eq!(
            config.output_path_for(Path::new("/no/such/folder/a.dwg")),
            dir.path().join(DEFAULT_OUTPUT_FILE_NAME)
        );
    }
}
