//! Resolved, validated digger configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::matcher::{match_include_exclude_patterns_to_file, MatchError};

pub const DEFAULT_WORKFLOW_NAME: &str = "default";
pub const DEFAULT_WORKSPACE: &str = "default";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiggerConfig {
    pub projects: Vec<Project>,
    pub workflows: BTreeMap<String, Workflow>,
    pub auto_merge: bool,
    pub collect_usage_data: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub dir: String,
    pub workspace: String,
    pub workflow: String,
    pub terragrunt: bool,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub depends_on: Vec<String>,
}

impl Project {
    /// Declared include patterns plus the pattern implied by the project's layout.
    pub fn effective_include_patterns(&self) -> Vec<String> {
        let implicit = if self.terragrunt {
            format!("{}/*.hcl", self.dir)
        } else {
            format!("{}/**/*.tf", self.dir)
        };
        let mut patterns = self.include_patterns.clone();
        patterns.push(implicit);
        patterns
    }

    /// Whether any of `changed_files` touches this project.
    pub fn is_modified_by<S: AsRef<str>>(&self, changed_files: &[S]) -> Result<bool, MatchError> {
        let includes = self.effective_include_patterns();
        for file in changed_files {
            if match_include_exclude_patterns_to_file(file.as_ref(), &includes, &self.exclude_patterns)? {
                debug!(project = %self.name, file = file.as_ref(), "project modified");
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub plan: Stage,
    pub apply: Stage,
    pub state_env_vars: BTreeMap<String, String>,
    pub command_env_vars: BTreeMap<String, String>,
    pub configuration: WorkflowConfiguration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub action: String,
    /// Command line of a `run` step
    pub value: String,
    pub extra_args: Vec<String>,
    pub shell: String,
}

impl Step {
    pub fn action(action: &str) -> Self {
        Self {
            action: action.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfiguration {
    pub on_pull_request_pushed: Vec<String>,
    pub on_pull_request_closed: Vec<String>,
    pub on_commit_to_default: Vec<String>,
}

impl DiggerConfig {
    pub fn get_project(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name == name)
    }

    /// All projects for an empty name, otherwise the named one (if any).
    pub fn get_projects(&self, name: &str) -> Vec<&Project> {
        if name.is_empty() {
            return self.projects.iter().collect();
        }
        self.get_project(name).into_iter().collect()
    }

    pub fn get_directory(&self, name: &str) -> Option<&str> {
        self.get_project(name).map(|p| p.dir.as_str())
    }

    pub fn get_workflow(&self, name: &str) -> Option<&Workflow> {
        self.workflows.get(name)
    }

    /// Projects affected by `changed_files`, in declaration order.
    pub fn get_modified_projects<S: AsRef<str>>(&self, changed_files: &[S]) -> Result<Vec<Project>, MatchError> {
        let mut modified = Vec::new();
        for project in &self.projects {
            if project.is_modified_by(changed_files)? {
                modified.push(project.clone());
            }
        }
        Ok(modified)
    }
}
