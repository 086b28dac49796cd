//! Resolve paths and evaluate terragrunt functions.

use std::cell::OnceCell;

use camino::{Utf8Path, Utf8PathBuf};

use super::parser::PathExpr;
use super::TERRAGRUNT_CONFIG;
use crate::path::clean;

/// Base directories a config's path expressions are evaluated against.
pub struct ResolveContext {
    /// Relative paths start here
    pub config_dir: Utf8PathBuf,
    /// Directory of the project config being processed
    pub project_dir: Utf8PathBuf,
    repo_root: OnceCell<Option<Utf8PathBuf>>,
}

impl ResolveContext {
    pub fn new(project_dir: Utf8PathBuf) -> Self {
        Self {
            config_dir: project_dir.clone(),
            project_dir,
            repo_root: OnceCell::new(),
        }
    }

    /// Context for an included config file: relative paths start at the
    /// included file, `find_in_parent_folders` still starts at the project.
    pub fn for_included_config(config_dir: Utf8PathBuf, project_dir: Utf8PathBuf) -> Self {
        Self {
            config_dir,
            project_dir,
            repo_root: OnceCell::new(),
        }
    }

    /// `None` when the expression depends on something only terragrunt knows
    /// at run time.
    pub fn resolve(&self, path_expr: &PathExpr) -> Option<Utf8PathBuf> {
        match path_expr {
            PathExpr::Literal(path) => Some(clean(&self.config_dir.join(path))),

            PathExpr::FindInParentFolders(filename) => {
                let filename = filename.as_deref().unwrap_or(TERRAGRUNT_CONFIG);
                find_in_parent_folders(&self.project_dir, filename)
            }

            PathExpr::GetRepoRoot => self.repo_root().cloned(),

            PathExpr::GetTerragruntDir => Some(self.project_dir.clone()),

            // need the include chain
            PathExpr::GetParentTerragruntDir
            | PathExpr::PathRelativeToInclude
            | PathExpr::PathRelativeFromInclude => None,

            PathExpr::Dirname(inner) => {
                let resolved = self.resolve(inner)?;
                resolved.parent().map(|p| p.to_path_buf())
            }

            PathExpr::Format { fmt, args } => {
                let resolved_args: Vec<String> = args
                    .iter()
                    .map(|arg| self.resolve(arg).map(|p| p.into_string()))
                    .collect::<Option<Vec<_>>>()?;

                let mut result = fmt.clone();
                for arg in resolved_args {
                    if let Some(pos) = result.find("%s") {
                        result.replace_range(pos..pos + 2, &arg);
                    }
                }
                Some(clean(&self.config_dir.join(result)))
            }

            PathExpr::Interpolation(parts) => {
                if parts.is_empty() {
                    return None;
                }

                // literals inside a template are string fragments, not paths
                let mut result = String::new();
                for part in parts {
                    match part {
                        PathExpr::Literal(s) => result.push_str(s),
                        _ => result.push_str(self.resolve(part)?.as_str()),
                    }
                }
                Some(clean(&self.config_dir.join(result)))
            }

            PathExpr::Unresolvable { .. } => None,
        }
    }

    /// Looked up once per context.
    pub fn repo_root(&self) -> Option<&Utf8PathBuf> {
        self.repo_root
            .get_or_init(|| find_repo_root(&self.project_dir))
            .as_ref()
    }
}

/// Nearest `filename` above `from`, skipping `from` itself.
pub fn find_in_parent_folders(from: &Utf8Path, filename: &str) -> Option<Utf8PathBuf> {
    from.ancestors()
        .skip(1)
        .map(|dir| dir.join(filename))
        .find(|candidate| candidate.is_file())
}

/// Nearest directory at or above `from` holding `.git`.
pub fn find_repo_root(from: &Utf8Path) -> Option<Utf8PathBuf> {
    let start = if from.is_file() { from.parent()? } else { from };
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Utf8Path::to_path_buf)
}
