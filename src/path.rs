//! Path normalization for glob comparison.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("cannot convert '{path}' to an absolute path: {reason}")]
    NotAbsolutizable { path: String, reason: &'static str },
}

/// Normalize a path by resolving . and .. components.
/// Does NOT require the path to exist (pure string manipulation).
/// Leading `..` components are kept for relative inputs.
pub fn clean(path: &Utf8Path) -> Utf8PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Utf8Component::ParentDir => match components.last() {
                Some(Utf8Component::Normal(_)) => {
                    components.pop();
                }
                // `/..` is `/`
                Some(Utf8Component::RootDir) | Some(Utf8Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            Utf8Component::CurDir => {}
            _ => components.push(component),
        }
    }

    if components.is_empty() {
        return Utf8PathBuf::from(".");
    }
    components.iter().collect()
}

/// Canonical absolute form of a file name or pattern, rooted at `/`.
///
/// Either separator is accepted. Relative inputs are anchored at `/` rather
/// than at the process working directory, so `infra/main.tf`, `./infra/main.tf`
/// and `/infra/main.tf` all normalize to `/infra/main.tf`.
pub fn normalize_file_name(file_name: &str) -> Result<String, PathError> {
    if file_name.contains('\0') {
        return Err(PathError::NotAbsolutizable {
            path: file_name.escape_default().to_string(),
            reason: "path contains a NUL byte",
        });
    }

    let unified = file_name.replace('\\', "/");
    let rooted = Utf8PathBuf::from("/").join(unified.trim_start_matches('/'));
    let cleaned = clean(&rooted);

    if !cleaned.is_absolute() {
        return Err(PathError::NotAbsolutizable {
            path: file_name.to_string(),
            reason: "path did not resolve under the root",
        });
    }
    Ok(cleaned.into_string())
}
