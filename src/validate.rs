//! Structural checks on the raw document, semantic checks on the resolved config.

use crate::config::{DiggerConfig, Stage};
use crate::error::ConfigError;
use crate::yaml::DiggerConfigYaml;

/// The document must declare projects or say how to generate them.
pub fn validate_digger_config_yaml(config: &DiggerConfigYaml, source_name: &str) -> Result<(), ConfigError> {
    if config.projects.is_empty() && config.generate_projects.is_none() {
        return Err(ConfigError::StructuralInvalid {
            source_name: source_name.to_string(),
        });
    }
    Ok(())
}

/// After generation the document must hold at least one project.
pub fn validate_generated_projects(config: &DiggerConfigYaml, source_name: &str) -> Result<(), ConfigError> {
    if config.projects.is_empty() {
        return Err(ConfigError::StructuralInvalid {
            source_name: source_name.to_string(),
        });
    }
    Ok(())
}

fn check_steps(phase: &str, workflow: &str, stage: &Stage) -> Result<(), ConfigError> {
    if stage.steps.iter().any(|s| s.action.is_empty()) {
        return Err(ConfigError::EmptyStepAction {
            phase: phase.to_string(),
            workflow: workflow.to_string(),
        });
    }
    Ok(())
}

/// Every project's workflow exists and every step names an action.
pub fn validate_digger_config(config: &DiggerConfig) -> Result<(), ConfigError> {
    for project in &config.projects {
        if !config.workflows.contains_key(&project.workflow) {
            return Err(ConfigError::MissingWorkflow {
                workflow: project.workflow.clone(),
                project: project.name.clone(),
            });
        }
    }

    for (name, workflow) in &config.workflows {
        check_steps("plan", name, &workflow.plan)?;
    }
    for (name, workflow) in &config.workflows {
        check_steps("apply", name, &workflow.apply)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Project, Step, Workflow, DEFAULT_WORKFLOW_NAME};
    use crate::yaml::{GenerateProjectsConfigYaml, ProjectYaml};

    fn config_with(workflow: Workflow, project_workflow: &str) -> DiggerConfig {
        let mut config = DiggerConfig {
            projects: vec![Project {
                name: "prod".to_string(),
                dir: "prod".to_string(),
                workflow: project_workflow.to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        config.workflows.insert(DEFAULT_WORKFLOW_NAME.to_string(), workflow);
        config
    }

    #[test]
    fn test_yaml_without_projects_or_generation_fails() {
        let err = validate_digger_config_yaml(&DiggerConfigYaml::default(), "digger.yml").unwrap_err();

        assert!(matches!(&err, ConfigError::StructuralInvalid { source_name } if source_name == "digger.yml"));
        assert!(err.to_string().contains("digger.yml"));
    }

    #[test]
    fn test_generated_document_without_projects_fails() {
        let yaml = DiggerConfigYaml {
            generate_projects: Some(GenerateProjectsConfigYaml::default()),
            ..Default::default()
        };

        let err = validate_generated_projects(&yaml, "digger.yml").unwrap_err();

        assert!(matches!(err, ConfigError::StructuralInvalid { source_name } if source_name == "digger.yml"));
    }

    #[test]
    fn test_yaml_with_generation_directive_passes() {
        let yaml = DiggerConfigYaml {
            generate_projects: Some(GenerateProjectsConfigYaml::default()),
            ..Default::default()
        };
        assert!(validate_digger_config_yaml(&yaml, "digger.yml").is_ok());
    }

    #[test]
    fn test_yaml_with_projects_passes() {
        let yaml = DiggerConfigYaml {
            projects: vec![ProjectYaml::default()],
            ..Default::default()
        };
        assert!(validate_digger_config_yaml(&yaml, "digger.yml").is_ok());
    }

    #[test]
    fn test_missing_workflow_names_workflow_and_project() {
        let config = config_with(Workflow::default(), "release");

        let err = validate_digger_config(&config).unwrap_err();

        let message = err.to_string();
        assert!(message.contains("release"));
        assert!(message.contains("prod"));
    }

    #[test]
    fn test_empty_plan_step_action() {
        let workflow = Workflow {
            plan: Stage {
                steps: vec![Step::action("init"), Step::action("")],
            },
            ..Default::default()
        };

        let err = validate_digger_config(&config_with(workflow, DEFAULT_WORKFLOW_NAME)).unwrap_err();

        assert!(matches!(err, ConfigError::EmptyStepAction { ref phase, .. } if phase == "plan"));
    }

    #[test]
    fn test_empty_apply_step_action() {
        let workflow = Workflow {
            apply: Stage {
                steps: vec![Step::action("")],
            },
            ..Default::default()
        };

        let err = validate_digger_config(&config_with(workflow, DEFAULT_WORKFLOW_NAME)).unwrap_err();

        assert!(matches!(err, ConfigError::EmptyStepAction { ref phase, .. } if phase == "apply"));
    }

    #[test]
    fn test_valid_config() {
        let workflow = Workflow {
            plan: Stage {
                steps: vec![Step::action("init"), Step::action("plan")],
            },
            ..Default::default()
        };
        assert!(validate_digger_config(&config_with(workflow, DEFAULT_WORKFLOW_NAME)).is_ok());
    }
}
