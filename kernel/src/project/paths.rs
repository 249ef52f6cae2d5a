// Drawing Path Resolution
//
// Project descriptors often carry absolute paths from the machine that
// created them. Declared paths are mapped onto the actual project root:
//
//   1. the declared path, if it exists
//   2. the declared tail re-rooted under the project root, trying the most
//      specific parent directory first
//   3. a unique file of the same name anywhere under the project root
//
// An ambiguous name search keeps the declared path.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::feed::same_name;

/// Upper bound on name-search hits collected before giving up.
const MAX_SEARCH_MATCHES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolution {
    pub path: PathBuf,

    /// How the path was obtained, when it differs from a plain hit.
    pub note: Option<String>,
}

impl PathResolution {
    fn kept(declared: &Path, note: Option<String>) -> Self {
        Self {
            path: declared.to_path_buf(),
            note,
        }
    }
}

pub fn resolve_drawing_path(project_root: &Path, declared: &Path) -> PathResolution {
    if declared.is_file() {
        return PathResolution::kept(declared, None);
    }

    if project_root.as_os_str().is_empty() {
        return PathResolution::kept(declared, None);
    }

    let root = std::path::absolute(project_root).unwrap_or_else(|_| project_root.to_path_buf());

    // Declared paths may come from another platform; split on both separators.
    let declared_text = declared.to_string_lossy();
    let segments: Vec<&str> = declared_text
        .split(['/', '\\'])
        .filter(|s| !s.is_empty())
        .collect();

    for i in (0..segments.len().saturating_sub(1)).rev() {
        let dir_name = segments[i];
        if !root.join(dir_name).is_dir() {
            continue;
        }

        let candidate = segments[i..]
            .iter()
            .fold(root.clone(), |path, segment| path.join(segment));
        if candidate.is_file() {
            return PathResolution {
                path: candidate,
                note: Some(format!("remapped under project folder using '{dir_name}'")),
            };
        }
    }

    let Some(file_name) = segments.last() else {
        return PathResolution::kept(declared, None);
    };

    let matches: Vec<PathBuf> = WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| same_name(&entry.file_name().to_string_lossy(), file_name))
        .map(|entry| entry.into_path())
        .take(MAX_SEARCH_MATCHES)
        .collect();

    match matches.len() {
        0 => PathResolution::kept(declared, None),
        1 => PathResolution {
            path: matches.into_iter().next().unwrap_or_default(),
            note: Some("found by filename search under project folder".into()),
        },
        _ => PathResolution::kept(
            declared,
            Some(format!(
                "multiple matches for '{file_name}' under project folder; not auto-resolving"
            )),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"{}").unwrap();
    }

    #[test]
    fn existing_path_is_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.dwg");
        touch(&file);

        let resolved = resolve_drawing_path(dir.path(), &file);

        assert_eq!(resolved.path, file);
        assert_eq!(resolved.note, None);
    }

    #[test]
    fn tail_is_rerooted_under_project() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("proj");
        let expected = root.join("sub").join("dwgs").join("a.dwg");
        touch(&expected);

        let resolved = resolve_drawing_path(&root, Path::new("/old/sub/dwgs/a.dwg"));

        assert_eq!(resolved.path, expected);
        assert!(resolved.note.unwrap().contains("'sub'"));
    }

    #[test]
    fn windows_style_paths_are_rerooted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("proj");
        let expected = root.join("Piping").join("a.dwg");
        touch(&expected);

        let resolved =
            resolve_drawing_path(&root, Path::new(r"C:\Users\someone\Project\Piping\a.dwg"));

        assert_eq!(resolved.path, expected);
    }

    #[test]
    fn unique_name_is_found_by_search() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("proj");
        let expected = root.join("elsewhere").join("deep").join("a.dwg");
        touch(&expected);

        let resolved = resolve_drawing_path(&root, Path::new("/old/sub/dwgs/A.DWG"));

        assert_eq!(resolved.path, expected);
        assert!(resolved.note.is_some());
    }

    #[test]
    fn ambiguous_name_keeps_declared_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("proj");
        touch(&root.join("one").join("a.dwg"));
        touch(&root.join("two").join("a.dwg"));

        let declared = Path::new("/old/sub/dwgs/a.dwg");
        let resolved = resolve_drawing_path(&root, declared);

        assert_eq!(resolved.path, declared);
        assert!(resolved.note.unwrap().contains("multiple matches"));
    }

    #[test]
    fn nothing_found_keeps_declared_path_silently() {
        let dir = tempfile::tempdir().unwrap();
        let declared = Path::new("/old/sub/missing.dwg");

        let resolved = resolve_drawing_path(dir.path(), declared);

        assert_eq!(resolved.path, declared);
        assert_eq!(resolved.note, None);
    }
}
