//! The `digger.yml` document as written by users.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiggerConfigYaml {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<ProjectYaml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflows: Option<BTreeMap<String, WorkflowYaml>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_projects: Option<GenerateProjectsConfigYaml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_merge: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collect_usage_data: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectYaml {
    pub name: String,
    pub dir: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub workspace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub workflow: String,
    #[serde(default)]
    pub terragrunt: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// Instruction to synthesize projects instead of listing them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateProjectsConfigYaml {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
    #[serde(default)]
    pub terragrunt: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terragrunt_parsing: Option<TerragruntParsingConfig>,
}

/// Options forwarded to the terragrunt dependency parser.
///
/// Options typed `Option<bool>` default to `true` when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerragruntParsingConfig {
    /// Subdirectory of the working directory to parse from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_hcl_project_external_childs: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_parent_terragrunt: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cascade_dependencies: Option<bool>,
    #[serde(default)]
    pub project_hcl_files: Vec<String>,
    #[serde(default)]
    pub auto_merge: bool,
    #[serde(default)]
    pub filter_path: String,
    #[serde(default)]
    pub create_hcl_project_childs: bool,
    #[serde(default)]
    pub ignore_dependency_blocks: bool,
    #[serde(default)]
    pub default_workflow: String,
    #[serde(default)]
    pub default_apply_requirements: Vec<String>,
    #[serde(default)]
    pub auto_plan: bool,
    #[serde(default)]
    pub default_terraform_version: String,
    #[serde(default)]
    pub create_project_name: bool,
    #[serde(default)]
    pub create_workspace: bool,
    #[serde(default)]
    pub preserve_projects: bool,
    #[serde(default)]
    pub use_project_markers: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowYaml {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<StageYaml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply: Option<StageYaml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_vars: Option<TerraformEnvConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_configuration: Option<WorkflowConfigurationYaml>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageYaml {
    #[serde(default)]
    pub steps: Vec<StepYaml>,
}

/// A workflow step in one of its three spellings:
///
/// ```yaml
/// steps:
///   - init
///   - run: "tflint"
///     shell: bash
///   - plan:
///       extra_args: ["-lock=false"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepYaml {
    Action(String),
    Run {
        run: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        shell: Option<String>,
    },
    Command(BTreeMap<String, Option<StepArgsYaml>>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepArgsYaml {
    #[serde(default)]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerraformEnvConfig {
    #[serde(default)]
    pub state: Vec<EnvVarYaml>,
    #[serde(default)]
    pub commands: Vec<EnvVarYaml>,
}

/// Either a literal `value` or the name of a process variable in `value_from`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvVarYaml {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub value_from: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfigurationYaml {
    #[serde(default)]
    pub on_pull_request_pushed: Vec<String>,
    #[serde(default)]
    pub on_pull_request_closed: Vec<String>,
    #[serde(default)]
    pub on_commit_to_default: Vec<String>,
}
