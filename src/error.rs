//! Errors surfaced by loading, validating and querying a digger config.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::graph::GraphError;
use crate::matcher::MatchError;
use crate::path::PathError;
use crate::terragrunt::ParserError;
use crate::walker::WalkError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("more than one digger config file detected in {dir}, please keep either 'digger.yml' or 'digger.yaml'")]
    Conflict { dir: Utf8PathBuf },

    #[error("no terragrunt or terraform project detected in {dir}")]
    NotFound { dir: Utf8PathBuf },

    #[error("error parsing '{source_name}': {source}")]
    Parse {
        source_name: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no projects configuration found in '{source_name}'")]
    StructuralInvalid { source_name: String },

    #[error("failed to find workflow config '{workflow}' for project '{project}'")]
    MissingWorkflow { workflow: String, project: String },

    #[error("{phase} step's action can't be empty (workflow '{workflow}')")]
    EmptyStepAction { phase: String, workflow: String },

    #[error("project name '{name}' is duplicated")]
    DuplicateProject { name: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("terragrunt project generation failed: {0}")]
    Subsystem(#[source] ParserError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Walk(#[from] WalkError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}
