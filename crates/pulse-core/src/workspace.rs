//! Workspace roots and folder keys.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A named root directory open in the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRoot {
    pub name: String,
    pub path: PathBuf,
}

impl WorkspaceRoot {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Derives the folder key that groups a file for folder rollups.
///
/// Files under a workspace root map to `"<name>:<relative directory>"`, using
/// `/` separators and `.` for files at the root itself. When roots nest, the
/// deepest one wins. Other files map to their absolute parent directory.
pub fn folder_key(file_path: &str, roots: &[WorkspaceRoot]) -> String {
    let path = Path::new(file_path);

    let best = roots
        .iter()
        .filter_map(|root| {
            path.strip_prefix(&root.path)
                .ok()
                .map(|relative| (root, relative))
        })
        .max_by_key(|(root, _)| root.path.components().count());

    if let Some((root, relative)) = best {
        let dir = relative.parent().map(join_normal).unwrap_or_default();
        let dir = if dir.is_empty() { ".".to_string() } else { dir };
        return format!("{}:{dir}", root.name);
    }

    path.parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn join_normal(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
