//! Find project roots in a working tree.
//!
//! One depth-first traversal, three detectors. A detected directory is
//! recorded relative to the walked root (the root itself is `./`) and its
//! subtree is skipped, since project roots do not nest. Directories named
//! `modules` are never descended into.

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

pub const MODULES_DIR: &str = "modules";
pub const ROOT_DIR: &str = "./";
pub const TERRAGRUNT_CONFIG_SUFFIX: &str = "terragrunt.hcl";
pub const ROOT_INCLUDE_MARKER: &str = "include \"root\"";
pub const DEFAULT_TERRAFORM_FILE_PATTERN: &str = r"\.tf$";

/// Directories skipped below the root in addition to `modules`
const IGNORED_DIRS: &[&str] = &[".terragrunt-cache", ".terraform", ".git", "node_modules"];

#[derive(Error, Debug)]
pub enum WalkError {
    #[error("error walking {root}: {source}")]
    Traverse {
        root: Utf8PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("error reading {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8(String),
    #[error("invalid terraform file pattern '{pattern}': {source}")]
    FilePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Decides whether a directory is a project root.
pub trait Detector {
    /// Directories named `modules` never reach this.
    fn detect(&self, dir: &Utf8Path) -> Result<bool, WalkError>;

    /// Whether a `modules` directory is itself recorded before being pruned.
    fn matches_module_dir(&self) -> bool {
        false
    }
}

/// Lists project directories under a working directory.
pub trait DirWalker {
    fn get_dirs(&self, working_dir: &Utf8Path) -> Result<Vec<String>, WalkError>;
}

fn is_ignored(name: &str) -> bool {
    IGNORED_DIRS.contains(&name) || name.starts_with('.')
}

fn relative_dir(root: &Utf8Path, dir: &Utf8Path) -> String {
    match dir.strip_prefix(root) {
        Ok(rel) if rel.as_str().is_empty() => ROOT_DIR.to_string(),
        Ok(rel) => rel.as_str().replace('\\', "/"),
        Err(_) => dir.to_string(),
    }
}

/// Depth-first walk of `root` in file-name order, collecting detected directories.
pub fn walk<D: Detector + ?Sized>(root: &Utf8Path, detector: &D) -> Result<Vec<String>, WalkError> {
    let mut dirs = Vec::new();
    let mut entries = WalkDir::new(root).sort_by_file_name().into_iter();

    while let Some(entry) = entries.next() {
        let entry = entry.map_err(|source| WalkError::Traverse {
            root: root.to_owned(),
            source,
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let path = Utf8Path::from_path(entry.path())
            .ok_or_else(|| WalkError::NonUtf8(entry.path().display().to_string()))?;

        if entry.depth() > 0 {
            let name = path.file_name().unwrap_or_default();
            if name == MODULES_DIR {
                if detector.matches_module_dir() {
                    dirs.push(relative_dir(root, path));
                }
                entries.skip_current_dir();
                continue;
            }
            if is_ignored(name) {
                entries.skip_current_dir();
                continue;
            }
        }

        if detector.detect(path)? {
            let rel = relative_dir(root, path);
            debug!(dir = %rel, "detected project root");
            dirs.push(rel);
            entries.skip_current_dir();
        }
    }

    Ok(dirs)
}

/// Names of the regular files directly inside `dir`, sorted.
fn file_names(dir: &Utf8Path) -> Result<Vec<String>, WalkError> {
    let io_err = |source| WalkError::Io {
        path: dir.to_owned(),
        source,
    };
    let mut names = Vec::new();
    for entry in dir.read_dir_utf8().map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if entry.file_type().map_err(io_err)?.is_file() {
            names.push(entry.file_name().to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Directories holding at least one terraform source file.
pub struct TopLevelTerraformDirWalker {
    file_pattern: Regex,
}

impl TopLevelTerraformDirWalker {
    pub fn new(file_pattern: &str) -> Result<Self, WalkError> {
        let file_pattern = Regex::new(file_pattern).map_err(|source| WalkError::FilePattern {
            pattern: file_pattern.to_string(),
            source,
        })?;
        Ok(Self { file_pattern })
    }
}

impl Detector for TopLevelTerraformDirWalker {
    fn detect(&self, dir: &Utf8Path) -> Result<bool, WalkError> {
        Ok(file_names(dir)?.iter().any(|name| self.file_pattern.is_match(name)))
    }
}

impl DirWalker for TopLevelTerraformDirWalker {
    fn get_dirs(&self, working_dir: &Utf8Path) -> Result<Vec<String>, WalkError> {
        walk(working_dir, self)
    }
}

/// Directories named `modules`.
#[derive(Default)]
pub struct ModuleDirWalker;

impl Detector for ModuleDirWalker {
    fn detect(&self, _dir: &Utf8Path) -> Result<bool, WalkError> {
        Ok(false)
    }

    fn matches_module_dir(&self) -> bool {
        true
    }
}

impl DirWalker for ModuleDirWalker {
    fn get_dirs(&self, working_dir: &Utf8Path) -> Result<Vec<String>, WalkError> {
        walk(working_dir, self)
    }
}

/// Directories with a terragrunt config that includes the root config.
#[derive(Default)]
pub struct TerragruntDirWalker;

impl Detector for TerragruntDirWalker {
    fn detect(&self, dir: &Utf8Path) -> Result<bool, WalkError> {
        for name in file_names(dir)? {
            if !name.ends_with(TERRAGRUNT_CONFIG_SUFFIX) {
                continue;
            }
            let file = dir.join(&name);
            let content = std::fs::read_to_string(&file).map_err(|source| WalkError::Io { path: file, source })?;
            if content.contains(ROOT_INCLUDE_MARKER) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl DirWalker for TerragruntDirWalker {
    fn get_dirs(&self, working_dir: &Utf8Path) -> Result<Vec<String>, WalkError> {
        walk(working_dir, self)
    }
}
