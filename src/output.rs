//! JSON/YAML output serialization.

use serde::Serialize;
use thiserror::Error;

use crate::config::Project;
use crate::graph::{GraphError, ProjectGraph};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("JSON serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("YAML serialization failed: {0}")]
    YamlError(#[from] serde_yaml::Error),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[derive(Serialize)]
struct Output<'a> {
    projects: Vec<OutputProject<'a>>,
}

#[derive(Serialize)]
struct OutputProject<'a> {
    name: &'a str,
    dir: &'a str,
    workspace: &'a str,
    workflow: &'a str,
    terragrunt: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    include_patterns: &'a Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    exclude_patterns: &'a Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    depends_on: &'a Vec<String>,
    /// Execution order group: 0 runs first
    layer: u32,
}

/// Render `projects` with their layer in `graph`.
///
/// Projects missing from the graph land in layer 0.
pub fn generate_output(projects: &[Project], graph: &ProjectGraph, format: OutputFormat) -> Result<String, OutputError> {
    let layers = graph.layers()?;
    let output = Output {
        projects: projects
            .iter()
            .map(|p| OutputProject {
                name: &p.name,
                dir: &p.dir,
                workspace: &p.workspace,
                workflow: &p.workflow,
                terragrunt: p.terragrunt,
                include_patterns: &p.include_patterns,
                exclude_patterns: &p.exclude_patterns,
                depends_on: &p.depends_on,
                layer: layers.get(&p.name).copied().unwrap_or(0),
            })
            .collect(),
    };

    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(&output)?,
        OutputFormat::Yaml => serde_yaml::to_string(&output)?,
    })
}
