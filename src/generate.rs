//! Expansion of `generate_projects` into concrete projects.

use std::collections::HashSet;

use camino::Utf8Path;
use tracing::{info, warn};

use crate::config::{DEFAULT_WORKFLOW_NAME, DEFAULT_WORKSPACE};
use crate::detect::project_names_for_dirs;
use crate::error::ConfigError;
use crate::loader::{HydrationFailure, LoadOptions};
use crate::matcher::match_include_exclude_patterns_to_file;
use crate::terragrunt::{ParseRequest, TerragruntParser};
use crate::walker::{DirWalker, TopLevelTerraformDirWalker};
use crate::yaml::{DiggerConfigYaml, ProjectYaml, TerragruntParsingConfig};

/// How a `generate_projects` directive was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// The document has no directive.
    Skipped,
    Complete,
    /// Terragrunt hydration failed and was skipped under
    /// [`HydrationFailure::Degrade`].
    Degraded,
}

/// Appends generated projects to `config.projects`.
///
/// Explicit `terragrunt_parsing` options and a bare `terragrunt: true` both
/// hydrate through `parser` (the latter with default options). Otherwise
/// every top-level terraform directory matching the directive's `include`
/// glob and not its `exclude` glob becomes a project. Without a directive
/// this is a no-op.
pub fn handle_yaml_project_generation(
    config: &mut DiggerConfigYaml,
    working_dir: &Utf8Path,
    options: &LoadOptions,
    parser: &dyn TerragruntParser,
) -> Result<Generation, ConfigError> {
    let Some(generate) = config.generate_projects.clone() else {
        return Ok(Generation::Skipped);
    };

    if let Some(parsing) = &generate.terragrunt_parsing {
        return hydrate_with_terragrunt(config, parsing, working_dir, options, parser);
    }
    if generate.terragrunt {
        return hydrate_with_terragrunt(config, &TerragruntParsingConfig::default(), working_dir, options, parser);
    }

    // an absent include matches nothing, an absent exclude excludes nothing
    let include: Vec<String> = generate.include.into_iter().collect();
    let exclude: Vec<String> = generate.exclude.into_iter().collect();

    let walker = TopLevelTerraformDirWalker::new(&options.terraform_file_pattern)?;
    let mut matched = Vec::new();
    for dir in walker.get_dirs(working_dir)? {
        if match_include_exclude_patterns_to_file(&dir, &include, &exclude)? {
            matched.push(dir);
        }
    }
    info!(generated = matched.len(), "generated terraform projects");

    let names = project_names_for_dirs(&matched);
    config.projects.extend(matched.into_iter().zip(names).map(|(dir, name)| ProjectYaml {
        name,
        dir,
        workflow: DEFAULT_WORKFLOW_NAME.to_string(),
        workspace: DEFAULT_WORKSPACE.to_string(),
        ..Default::default()
    }));
    Ok(Generation::Complete)
}

fn hydrate_with_terragrunt(
    config: &mut DiggerConfigYaml,
    parsing: &TerragruntParsingConfig,
    working_dir: &Utf8Path,
    options: &LoadOptions,
    parser: &dyn TerragruntParser,
) -> Result<Generation, ConfigError> {
    let request = ParseRequest::new(working_dir, parsing);
    let parsed = match parser.parse(&request) {
        Ok(parsed) => parsed,
        Err(error) => match options.hydration_failure {
            HydrationFailure::FailFast => return Err(ConfigError::Subsystem(error)),
            HydrationFailure::Degrade => {
                warn!(root = %request.root, %error, "failed to autogenerate terragrunt projects, continuing without them");
                return Ok(Generation::Degraded);
            }
        },
    };

    config.auto_merge = Some(parsed.auto_merge);

    let declared: HashSet<String> = if request.preserve_projects {
        config.projects.iter().map(|p| p.name.clone()).collect()
    } else {
        HashSet::new()
    };
    let generated: HashSet<&str> = parsed.projects.iter().map(|p| p.name.as_str()).collect();

    let before = config.projects.len();
    for project in &parsed.projects {
        if declared.contains(&project.name) {
            continue;
        }
        config.projects.push(ProjectYaml {
            name: project.name.clone(),
            dir: project.dir.clone(),
            workspace: project.workspace.clone(),
            workflow: project.workflow.clone(),
            terragrunt: true,
            include_patterns: project.autoplan.when_modified.clone(),
            exclude_patterns: Vec::new(),
            depends_on: project
                .depends_on
                .iter()
                .filter(|name| generated.contains(name.as_str()))
                .cloned()
                .collect(),
        });
    }
    info!(
        root = %request.root,
        generated = config.projects.len() - before,
        "hydrated terragrunt projects"
    );
    Ok(Generation::Complete)
}
