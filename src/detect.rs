//! Synthesizes a digger config for repositories that do not declare one.

use std::collections::HashMap;

use camino::Utf8Path;
use tracing::info;

use crate::config::{DEFAULT_WORKFLOW_NAME, DEFAULT_WORKSPACE};
use crate::error::ConfigError;
use crate::walker::{DirWalker, ModuleDirWalker, TerragruntDirWalker, TopLevelTerraformDirWalker, ROOT_DIR};
use crate::yaml::{DiggerConfigYaml, GenerateProjectsConfigYaml, ProjectYaml};

/// Name given to a project rooted at the working directory itself
pub const ROOT_PROJECT_NAME: &str = "default";

/// Name for a project rooted at `dir`: its base name, `default` for the root.
pub fn project_name_for_dir(dir: &str) -> String {
    if dir == ROOT_DIR {
        return ROOT_PROJECT_NAME.to_string();
    }
    Utf8Path::new(dir)
        .file_name()
        .map(str::to_string)
        .unwrap_or_else(|| ROOT_PROJECT_NAME.to_string())
}

/// Names for projects rooted at `dirs`, in the same order.
///
/// Each dir gets its base name unless another dir in the list shares it;
/// those fall back to the dir path with `/` replaced by `_`.
pub fn project_names_for_dirs(dirs: &[String]) -> Vec<String> {
    let base_names: Vec<String> = dirs.iter().map(|dir| project_name_for_dir(dir)).collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in &base_names {
        *counts.entry(name.as_str()).or_default() += 1;
    }

    dirs.iter()
        .zip(&base_names)
        .map(|(dir, name)| {
            if counts[name.as_str()] > 1 {
                dir.trim_matches('/').replace('/', "_")
            } else {
                name.clone()
            }
        })
        .collect()
}

/// Terragrunt layouts win over plain terraform ones; they are never merged.
///
/// A terragrunt tree yields a bare `generate_projects: {terragrunt: true}`
/// directive. A terraform tree yields one project per top-level terraform
/// directory, each watching every `modules` directory in the repo.
pub fn auto_detect_digger_config(
    working_dir: &Utf8Path,
    terraform_file_pattern: &str,
) -> Result<DiggerConfigYaml, ConfigError> {
    let mut config = DiggerConfigYaml {
        collect_usage_data: Some(true),
        ..Default::default()
    };

    let terragrunt_dirs = TerragruntDirWalker.get_dirs(working_dir)?;
    if !terragrunt_dirs.is_empty() {
        info!(dirs = terragrunt_dirs.len(), "detected terragrunt projects");
        config.generate_projects = Some(GenerateProjectsConfigYaml {
            terragrunt: true,
            ..Default::default()
        });
        return Ok(config);
    }

    let terraform_dirs = TopLevelTerraformDirWalker::new(terraform_file_pattern)?.get_dirs(working_dir)?;
    if terraform_dirs.is_empty() {
        return Err(ConfigError::NotFound {
            dir: working_dir.to_owned(),
        });
    }

    let module_patterns: Vec<String> = ModuleDirWalker
        .get_dirs(working_dir)?
        .into_iter()
        .map(|dir| format!("{}/**", dir))
        .collect();
    info!(
        dirs = terraform_dirs.len(),
        modules = module_patterns.len(),
        "detected terraform projects"
    );

    let names = project_names_for_dirs(&terraform_dirs);
    config.projects = terraform_dirs
        .into_iter()
        .zip(names)
        .map(|(dir, name)| ProjectYaml {
            name,
            dir,
            workflow: DEFAULT_WORKFLOW_NAME.to_string(),
            workspace: DEFAULT_WORKSPACE.to_string(),
            include_patterns: module_patterns.clone(),
            ..Default::default()
        })
        .collect();
    Ok(config)
}
