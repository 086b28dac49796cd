//! Find terragrunt config files in a directory tree.

use camino::{Utf8Path, Utf8PathBuf};
use walkdir::{DirEntry, WalkDir};

use super::ParserError;

/// Directories to skip during discovery
const IGNORED_DIRS: &[&str] = &[
    ".terragrunt-cache",
    ".terraform",
    ".git",
    "node_modules",
    ".venv",
    "venv",
    "__pycache__",
];

fn is_ignored(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|s| IGNORED_DIRS.contains(&s) || s.starts_with('.'))
            .unwrap_or(false)
}

/// Discovers all config files named one of `file_names` under `root`, in
/// directory order.
pub fn discover_config_files(root: &Utf8Path, file_names: &[String]) -> Result<Vec<Utf8PathBuf>, ParserError> {
    if !root.is_dir() {
        return Err(ParserError::RootNotFound(root.to_owned()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_ignored(e))
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if file_names.iter().any(|f| f == name) {
            let path = Utf8PathBuf::from_path_buf(entry.into_path())
                .map_err(|p| ParserError::NonUtf8(p.display().to_string()))?;
            files.push(path);
        }
    }
    Ok(files)
}
