//! Turn the raw document into a resolved config and its dependency graph.

use std::collections::{BTreeMap, HashSet};

use crate::config::{
    DiggerConfig, Project, Stage, Step, Workflow, WorkflowConfiguration, DEFAULT_WORKFLOW_NAME, DEFAULT_WORKSPACE,
};
use crate::env::collect_terraform_env_config;
use crate::error::ConfigError;
use crate::graph::ProjectGraph;
use crate::yaml::{DiggerConfigYaml, ProjectYaml, StageYaml, StepYaml, WorkflowConfigurationYaml, WorkflowYaml};

fn default_plan_stage() -> Stage {
    Stage {
        steps: vec![Step::action("init"), Step::action("plan")],
    }
}

fn default_apply_stage() -> Stage {
    Stage {
        steps: vec![Step::action("init"), Step::action("apply")],
    }
}

fn default_workflow_configuration() -> WorkflowConfiguration {
    WorkflowConfiguration {
        on_pull_request_pushed: vec!["digger plan".to_string()],
        on_pull_request_closed: vec!["digger unlock".to_string()],
        on_commit_to_default: vec!["digger unlock".to_string()],
    }
}

pub fn default_workflow() -> Workflow {
    Workflow {
        plan: default_plan_stage(),
        apply: default_apply_stage(),
        configuration: default_workflow_configuration(),
        ..Default::default()
    }
}

fn convert_step(step: &StepYaml) -> Vec<Step> {
    match step {
        StepYaml::Action(action) => vec![Step::action(action)],
        StepYaml::Run { run, shell } => vec![Step {
            action: "run".to_string(),
            value: run.clone(),
            shell: shell.clone().unwrap_or_default(),
            ..Default::default()
        }],
        StepYaml::Command(commands) => commands
            .iter()
            .map(|(action, args)| Step {
                action: action.clone(),
                extra_args: args.as_ref().map(|a| a.extra_args.clone()).unwrap_or_default(),
                ..Default::default()
            })
            .collect(),
    }
}

fn convert_stage(stage: Option<&StageYaml>, default: fn() -> Stage) -> Stage {
    match stage {
        Some(stage) => Stage {
            steps: stage.steps.iter().flat_map(convert_step).collect(),
        },
        None => default(),
    }
}

fn convert_workflow_configuration(configuration: Option<&WorkflowConfigurationYaml>) -> WorkflowConfiguration {
    match configuration {
        Some(c) => WorkflowConfiguration {
            on_pull_request_pushed: c.on_pull_request_pushed.clone(),
            on_pull_request_closed: c.on_pull_request_closed.clone(),
            on_commit_to_default: c.on_commit_to_default.clone(),
        },
        None => default_workflow_configuration(),
    }
}

fn convert_workflow(workflow: &WorkflowYaml) -> Workflow {
    let (state_env_vars, command_env_vars) = collect_terraform_env_config(workflow.env_vars.as_ref());
    Workflow {
        plan: convert_stage(workflow.plan.as_ref(), default_plan_stage),
        apply: convert_stage(workflow.apply.as_ref(), default_apply_stage),
        state_env_vars,
        command_env_vars,
        configuration: convert_workflow_configuration(workflow.workflow_configuration.as_ref()),
    }
}

fn or_default(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

fn convert_project(project: &ProjectYaml) -> Project {
    Project {
        name: project.name.clone(),
        dir: project.dir.clone(),
        workspace: or_default(&project.workspace, DEFAULT_WORKSPACE),
        workflow: or_default(&project.workflow, DEFAULT_WORKFLOW_NAME),
        terragrunt: project.terragrunt,
        include_patterns: project.include_patterns.clone(),
        exclude_patterns: project.exclude_patterns.clone(),
        depends_on: project.depends_on.clone(),
    }
}

/// Resolves defaults and builds the project graph.
///
/// A `default` workflow is always present. Project names must be unique and
/// `depends_on` may only name declared projects, without cycles.
pub fn convert_digger_yaml_to_config(yaml: &DiggerConfigYaml) -> Result<(DiggerConfig, ProjectGraph), ConfigError> {
    let mut workflows: BTreeMap<String, Workflow> = yaml
        .workflows
        .iter()
        .flatten()
        .map(|(name, workflow)| (name.clone(), convert_workflow(workflow)))
        .collect();
    workflows
        .entry(DEFAULT_WORKFLOW_NAME.to_string())
        .or_insert_with(default_workflow);

    let mut seen = HashSet::new();
    let mut projects = Vec::with_capacity(yaml.projects.len());
    for project in &yaml.projects {
        if !seen.insert(project.name.as_str()) {
            return Err(ConfigError::DuplicateProject {
                name: project.name.clone(),
            });
        }
        projects.push(convert_project(project));
    }

    let graph = ProjectGraph::from_projects(&projects)?;

    let config = DiggerConfig {
        projects,
        workflows,
        auto_merge: yaml.auto_merge.unwrap_or(false),
        collect_usage_data: yaml.collect_usage_data.unwrap_or(true),
    };
    Ok((config, graph))
}
