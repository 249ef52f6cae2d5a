// Project Descriptor Contract
//
// A project is a root folder plus named parts, each listing its member
// documents by absolute path. Batch runs enumerate their targets here.

mod paths;

pub use paths::{resolve_drawing_path, PathResolution};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::parts::PartRegistry;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ProjectError {
    #[error("cannot read project descriptor {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("invalid project descriptor {path}: {reason}")]
    Invalid { path: String, reason: String },

    #[error("project part `{0}` cannot list its drawings: {1}")]
    PartUnavailable(String, String),
}

/// Source of project structure.
pub trait ProjectDescriptor {
    /// Folder the project lives in.
    fn root_folder(&self) -> &Path;

    /// Names of the project's parts.
    fn part_names(&self) -> Vec<String>;

    /// Absolute paths of the documents that belong to `part`.
    fn part_drawings(&self, part: &str) -> Result<Vec<PathBuf>, ProjectError>;

    fn registry(&self) -> PartRegistry {
        PartRegistry::new(self.part_names())
    }
}

/// A document to process and the part that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawingRef {
    pub path: PathBuf,
    pub part: String,
}

/// Every member document across all parts, in declaration order.
///
/// A path listed by several parts belongs to the first part listing it.
/// Parts that cannot list their drawings are skipped.
pub fn enumerate_drawings(project: &dyn ProjectDescriptor) -> Vec<DrawingRef> {
    let mut seen = HashSet::new();
    let mut drawings = Vec::new();

    for part in project.part_names() {
        let paths = match project.part_drawings(&part) {
            Ok(paths) => paths,
            Err(err) => {
                tracing::warn!(part = %part, error = %err, "skipping project part");
                continue;
            }
        };

        for path in paths {
            if path.as_os_str().is_empty() {
                continue;
            }
            if seen.insert(path.clone()) {
                drawings.push(DrawingRef {
                    path,
                    part: part.clone(),
                });
            }
        }
    }

    drawings
}

/// A member document mapped onto the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDrawing {
    pub declared: PathBuf,
    pub path: PathBuf,
    pub part: String,
    pub note: Option<String>,
}

/// Member documents resolved against the project root, deduplicated by
/// resolved path and sorted by it.
///
/// Declared paths that land on the same file are processed once, under the
/// part that declared it first.
pub fn resolve_drawings(project: &dyn ProjectDescriptor) -> Vec<ResolvedDrawing> {
    let mut seen = HashSet::new();
    let mut drawings = Vec::new();

    for drawing in enumerate_drawings(project) {
        let resolution = resolve_drawing_path(project.root_folder(), &drawing.path);
        if let Some(note) = &resolution.note {
            tracing::info!(
                declared = %drawing.path.display(),
                resolved = %resolution.path.display(),
                "{note}"
            );
        }

        if !seen.insert(resolution.path.clone()) {
            tracing::debug!(
                declared = %drawing.path.display(),
                resolved = %resolution.path.display(),
                "drawing already listed"
            );
            continue;
        }

        drawings.push(ResolvedDrawing {
            declared: drawing.path,
            path: resolution.path,
            part: drawing.part,
            note: resolution.note,
        });
    }

    drawings.sort_by_cached_key(|d| (path_key(&d.path), d.path.clone()));
    drawings
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProject {
        root: PathBuf,
        parts: Vec<(&'static str, Result<Vec<PathBuf>, ProjectError>)>,
    }

    impl ProjectDescriptor for FixedProject {
        fn root_folder(&self) -> &Path {
            &self.root
        }

        fn part_names(&self) -> Vec<String> {
            self.parts.iter().map(|(n, _)| n.to_string()).collect()
        }

        fn part_drawings(&self, part: &str) -> Result<Vec<PathBuf>, ProjectError> {
            self.parts
                .iter()
                .find(|(n, _)| *n == part)
                .map(|(_, d)| d.clone())
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    #[test]
    fn drawings_belong_to_the_first_listing_part() {
        let project = FixedProject {
            root: PathBuf::from("/proj"),
            parts: vec![
                (
                    "Piping",
                    Ok(vec![
                        PathBuf::from("/proj/b.dwg"),
                        PathBuf::from("/proj/a.dwg"),
                    ]),
                ),
                (
                    "PnId",
                    Ok(vec![PathBuf::from("/proj/a.dwg"), PathBuf::from("/proj/c.dwg")]),
                ),
                (
                    "Broken",
                    Err(ProjectError::PartUnavailable("Broken".into(), "offline".into())),
                ),
            ],
        };

        let drawings = enumerate_drawings(&project);
        let listed: Vec<_> = drawings
            .iter()
            .map(|d| (d.path.to_string_lossy().into_owned(), d.part.as_str()))
            .collect();

        assert_eq!(
            listed,
            vec![
                ("/proj/b.dwg".to_string(), "Piping"),
                ("/proj/a.dwg".to_string(), "Piping"),
                ("/proj/c.dwg".to_string(), "PnId"),
            ]
        );
        assert_eq!(project.registry().get("pnid"), Some("PnId"));
    }

    #[test]
    fn resolved_drawings_are_deduplicated_by_resolved_path_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        for name in ["a.dwg", "b.dwg"] {
            std::fs::create_dir_all(root.join("dwg")).unwrap();
            std::fs::write(root.join("dwg").join(name), "{}").unwrap();
        }

        let project = FixedProject {
            root: root.clone(),
            parts: vec![
                (
                    "Piping",
                    Ok(vec![
                        root.join("dwg").join("b.dwg"),
                        PathBuf::from("/old/one/dwg/a.dwg"),
                    ]),
                ),
                (
                    "PnId",
                    Ok(vec![PathBuf::from("/old/two/dwg/a.dwg")]),
                ),
            ],
        };

        let drawings = resolve_drawings(&project);

        assert_eq!(drawings.len(), 2);
        assert_eq!(drawings[0].path, root.join("dwg").join("a.dwg"));
        assert_eq!(drawings[0].declared, PathBuf::from("/old/one/dwg/a.dwg"));
        assert_eq!(drawings[0].part, "Piping");
        assert!(drawings[0].note.is_some());
        assert_eq!(drawings[1].path, root.join("dwg").join("b.dwg"));
        assert_eq!(drawings[1].note, None);
    }
}
