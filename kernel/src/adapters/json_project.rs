// JSON Project Descriptor Adapter
//
// Reads a project descriptor file and exposes it as a `ProjectDescriptor`.
//
// Relative paths are taken relative to the descriptor's folder. Absolute
// paths are kept verbatim, including paths written on another platform,
// so that drawing path resolution can re-root them.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::feed::same_name;
use crate::project::{ProjectDescriptor, ProjectError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProject {
    #[serde(default)]
    root_folder: Option<String>,
    #[serde(default)]
    parts: Vec<RawPart>,
}

#[derive(Debug, Deserialize)]
struct RawPart {
    name: String,
    #[serde(default)]
    drawings: Vec<String>,
}

/// Project descriptor loaded from JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonProject {
    root: PathBuf,
    parts: Vec<(String, Vec<PathBuf>)>,
}

impl JsonProject {
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let text = fs::read_to_string(path).map_err(|e| ProjectError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_json(&text, base).map_err(|reason| ProjectError::Invalid {
            path: path.display().to_string(),
            reason,
        })
    }

    /// Parse descriptor text, resolving relative paths against `base`.
    pub fn from_json(text: &str, base: &Path) -> Result<Self, String> {
        let raw: RawProject = serde_json::from_str(text).map_err(|e| e.to_string())?;

        let root = match raw.root_folder.as_deref().map(str::trim) {
            Some(folder) if !folder.is_empty() => anchor(base, folder),
            _ => base.to_path_buf(),
        };

        let mut parts: Vec<(String, Vec<PathBuf>)> = Vec::new();
        for part in raw.parts {
            let name = part.name.trim().to_string();
            if name.is_empty() {
                return Err("project part with an empty name".into());
            }
            if parts.iter().any(|(n, _)| same_name(n, &name)) {
                return Err(format!("duplicate project part `{name}`"));
            }

            let drawings = part
                .drawings
                .iter()
                .map(|d| d.trim())
                .filter(|d| !d.is_empty())
                .map(|d| anchor(base, d))
                .collect();
            parts.push((name, drawings));
        }

        Ok(Self { root, parts })
    }
}

impl ProjectDescriptor for JsonProject {
    fn root_folder(&self) -> &Path {
        &self.root
    }

    fn part_names(&self) -> Vec<String> {
        self.parts.iter().map(|(n, _)| n.clone()).collect()
    }

    fn part_drawings(&self, part: &str) -> Result<Vec<PathBuf>, ProjectError> {
        self.parts
            .iter()
            .find(|(n, _)| same_name(n, part))
            .map(|(_, d)| d.clone())
            .ok_or_else(|| ProjectError::PartUnavailable(part.to_string(), "unknown part".into()))
    }
}

fn anchor(base: &Path, path: &str) -> PathBuf {
    if looks_absolute(path) {
        PathBuf::from(path)
    } else {
        base.join(path)
    }
}

/// Absolute on this platform, or a drive/UNC path from Windows.
fn looks_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    Path::new(path).is_absolute()
        || path.starts_with('\\')
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}
