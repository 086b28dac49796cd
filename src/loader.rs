//! Locating, reading and resolving `digger.yml`.
//!
//! The pipeline is the same for files and strings: structural validation,
//! project generation, conversion, semantic validation. A failure at any
//! step fails the whole load.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

use crate::config::DiggerConfig;
use crate::convert::convert_digger_yaml_to_config;
use crate::detect::auto_detect_digger_config;
use crate::error::ConfigError;
use crate::generate::{handle_yaml_project_generation, Generation};
use crate::graph::ProjectGraph;
use crate::terragrunt::{HclParser, TerragruntParser};
use crate::validate::{validate_digger_config, validate_digger_config_yaml, validate_generated_projects};
use crate::walker::DEFAULT_TERRAFORM_FILE_PATTERN;
use crate::yaml::DiggerConfigYaml;

pub const CONFIG_FILE_NAMES: [&str; 2] = ["digger.yml", "digger.yaml"];

/// Source name reported for configs passed as strings
pub const STRING_SOURCE_NAME: &str = "loaded_yaml_string";

/// Source name reported for synthesized configs
pub const AUTO_DETECTED_SOURCE_NAME: &str = "auto-detected";

/// What to do when terragrunt hydration fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HydrationFailure {
    /// Log a warning and keep the projects already declared.
    #[default]
    Degrade,
    /// Fail the load with [`ConfigError::Subsystem`].
    FailFast,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    pub hydration_failure: HydrationFailure,
    /// Regex matched against file names to detect terraform directories
    pub terraform_file_pattern: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            hydration_failure: HydrationFailure::default(),
            terraform_file_pattern: DEFAULT_TERRAFORM_FILE_PATTERN.to_string(),
        }
    }
}

/// Everything produced by one load.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: DiggerConfig,
    /// The document after project generation
    pub yaml: DiggerConfigYaml,
    pub graph: ProjectGraph,
}

pub struct ConfigLoader {
    options: LoadOptions,
    parser: Box<dyn TerragruntParser>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(LoadOptions::default())
    }
}

impl ConfigLoader {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            parser: Box::new(HclParser),
        }
    }

    /// Replaces the terragrunt dependency parser.
    pub fn with_parser(mut self, parser: impl TerragruntParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Loads the config declared in (or detected from) `working_dir`.
    pub fn load(&self, working_dir: &Utf8Path) -> Result<LoadedConfig, ConfigError> {
        let yaml = self.load_yaml(working_dir)?;
        resolve(yaml)
    }

    /// Loads a config passed as a string; generation still runs against
    /// `working_dir`.
    pub fn load_from_str(&self, content: &str, working_dir: &Utf8Path) -> Result<LoadedConfig, ConfigError> {
        let mut yaml = parse_digger_config_yaml(content, STRING_SOURCE_NAME)?;
        self.generate(&mut yaml, working_dir, STRING_SOURCE_NAME)?;
        resolve(yaml)
    }

    /// Reads or detects the raw document and expands its generation directive.
    pub fn load_yaml(&self, working_dir: &Utf8Path) -> Result<DiggerConfigYaml, ConfigError> {
        let (mut yaml, source_name) = match retrieve_config_file(working_dir)? {
            Some(file) => {
                let content = std::fs::read_to_string(&file).map_err(|source| ConfigError::Io {
                    path: file.clone(),
                    source,
                })?;
                (parse_digger_config_yaml(&content, file.as_str())?, file.into_string())
            }
            None => {
                let yaml = auto_detect_digger_config(working_dir, &self.options.terraform_file_pattern)?;
                match serde_yaml::to_string(&yaml) {
                    Ok(rendered) => info!(dir = %working_dir, "auto detected digger config:\n{}", rendered),
                    Err(error) => debug!(%error, "failed to render auto detected digger config"),
                }
                (yaml, AUTO_DETECTED_SOURCE_NAME.to_string())
            }
        };

        self.generate(&mut yaml, working_dir, &source_name)?;
        Ok(yaml)
    }

    /// Structural checks around project generation. A document left without
    /// projects fails unless terragrunt hydration degraded.
    fn generate(&self, yaml: &mut DiggerConfigYaml, working_dir: &Utf8Path, source_name: &str) -> Result<(), ConfigError> {
        validate_digger_config_yaml(yaml, source_name)?;
        match handle_yaml_project_generation(yaml, working_dir, &self.options, self.parser.as_ref())? {
            Generation::Degraded => Ok(()),
            Generation::Skipped | Generation::Complete => validate_generated_projects(yaml, source_name),
        }
    }
}

fn resolve(yaml: DiggerConfigYaml) -> Result<LoadedConfig, ConfigError> {
    let (config, graph) = convert_digger_yaml_to_config(&yaml)?;
    validate_digger_config(&config)?;
    Ok(LoadedConfig { config, yaml, graph })
}

/// The config file in `working_dir`, if exactly one exists.
pub fn retrieve_config_file(working_dir: &Utf8Path) -> Result<Option<Utf8PathBuf>, ConfigError> {
    let mut found = CONFIG_FILE_NAMES
        .iter()
        .map(|name| working_dir.join(name))
        .filter(|path| path.is_file());

    match (found.next(), found.next()) {
        (Some(_), Some(_)) => Err(ConfigError::Conflict {
            dir: working_dir.to_owned(),
        }),
        (file, _) => Ok(file),
    }
}

/// Deserializes a document. An empty document has no projects.
pub fn parse_digger_config_yaml(content: &str, source_name: &str) -> Result<DiggerConfigYaml, ConfigError> {
    if content.trim().is_empty() {
        return Ok(DiggerConfigYaml::default());
    }
    serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
        source_name: source_name.to_string(),
        source,
    })
}

/// [`ConfigLoader::load`] with default options.
pub fn load_digger_config(working_dir: &Utf8Path) -> Result<LoadedConfig, ConfigError> {
    ConfigLoader::default().load(working_dir)
}

/// [`ConfigLoader::load_from_str`] with default options.
pub fn load_digger_config_from_str(content: &str, working_dir: &Utf8Path) -> Result<LoadedConfig, ConfigError> {
    ConfigLoader::default().load_from_str(content, working_dir)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::terragrunt::{Autoplan, ParseRequest, ParsedTerragrunt, ParserError, TerragruntProject};

    fn tree(files: &[(&str, &str)]) -> (TempDir, Utf8PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        for (rel, content) in files {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
        }
        (tmp, root)
    }

    struct FailingParser;

    impl TerragruntParser for FailingParser {
        fn parse(&self, request: &ParseRequest) -> Result<ParsedTerragrunt, ParserError> {
            Err(ParserError::RootNotFound(request.root.clone()))
        }
    }

    struct FixedParser;

    impl TerragruntParser for FixedParser {
        fn parse(&self, _request: &ParseRequest) -> Result<ParsedTerragrunt, ParserError> {
            let project = |name: &str, depends_on: Vec<String>| TerragruntProject {
                name: name.to_string(),
                dir: format!("live/{}", name),
                workspace: "default".to_string(),
                workflow: "default".to_string(),
                autoplan: Autoplan {
                    when_modified: vec![format!("live/{}/*.hcl", name)],
                    enabled: false,
                },
                depends_on,
                ..Default::default()
            };
            Ok(ParsedTerragrunt {
                projects: vec![project("vpc", vec![]), project("app", vec!["vpc".to_string()])],
                auto_merge: false,
            })
        }
    }

    const DECLARED: &str = r#"
projects:
  - name: prod
    dir: prod
    workflow: release
workflows:
  release:
    plan:
      steps:
        - init
        - plan
"#;

    #[test]
    fn test_load_declared_config() {
        let (_tmp, root) = tree(&[("digger.yml", DECLARED)]);

        let loaded = load_digger_config(&root).unwrap();

        assert_eq!(loaded.config.projects.len(), 1);
        assert_eq!(loaded.config.projects[0].workflow, "release");
        assert!(loaded.config.get_workflow("release").is_some());
        assert!(loaded.config.get_workflow("default").is_some());
        assert!(loaded.graph.contains("prod"));
    }

    #[test]
    fn test_load_yaml_extension() {
        let (_tmp, root) = tree(&[("digger.yaml", DECLARED)]);

        assert!(load_digger_config(&root).is_ok());
    }

    #[test]
    fn test_both_config_files_conflict() {
        let (_tmp, root) = tree(&[("digger.yml", DECLARED), ("digger.yaml", DECLARED)]);

        let result = load_digger_config(&root);

        assert!(matches!(result, Err(ConfigError::Conflict { .. })));
    }

    #[test]
    fn test_no_projects_is_structural_error() {
        let (_tmp, root) = tree(&[("digger.yml", "auto_merge: true\n")]);

        let err = load_digger_config(&root).unwrap_err();

        match &err {
            ConfigError::StructuralInvalid { source_name } => assert!(source_name.ends_with("digger.yml")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("digger.yml"));
    }

    #[test]
    fn test_empty_file_is_structural_error() {
        let (_tmp, root) = tree(&[("digger.yml", "")]);

        assert!(matches!(
            load_digger_config(&root),
            Err(ConfigError::StructuralInvalid { .. })
        ));
    }

    #[test]
    fn test_missing_workflow_is_semantic_error() {
        let (_tmp, root) = tree(&[("digger.yml", "projects:\n  - name: prod\n    dir: prod\n    workflow: release\n")]);

        let err = load_digger_config(&root).unwrap_err();

        match err {
            ConfigError::MissingWorkflow { workflow, project } => {
                assert_eq!(workflow, "release");
                assert_eq!(project, "prod");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let (_tmp, root) = tree(&[("digger.yml", "projects: [\n")]);

        assert!(matches!(load_digger_config(&root), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_auto_detect_when_no_config_file() {
        let (_tmp, root) = tree(&[("prod/main.tf", ""), ("modules/vpc/main.tf", "")]);

        let loaded = load_digger_config(&root).unwrap();

        assert_eq!(loaded.config.projects.len(), 1);
        let prod = &loaded.config.projects[0];
        assert_eq!(prod.name, "prod");
        assert_eq!(prod.include_patterns, vec!["modules/**"]);
        assert!(loaded.config.collect_usage_data);
        let modified = loaded.config.get_modified_projects(&["modules/vpc/variables.tf"]).unwrap();
        assert_eq!(modified.len(), 1);
    }

    #[test]
    fn test_auto_detect_nothing_found() {
        let (_tmp, root) = tree(&[("README.md", "")]);

        assert!(matches!(load_digger_config(&root), Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_load_from_str() {
        let (_tmp, root) = tree(&[]);

        let loaded = load_digger_config_from_str(DECLARED, &root).unwrap();

        assert_eq!(loaded.config.projects[0].name, "prod");
    }

    #[test]
    fn test_load_from_str_reports_string_source() {
        let (_tmp, root) = tree(&[]);

        let err = load_digger_config_from_str("workflows: {}\n", &root).unwrap_err();

        assert!(err.to_string().contains(STRING_SOURCE_NAME));
    }

    #[test]
    fn test_generation_matching_nothing_is_structural_error() {
        let (_tmp, root) = tree(&[("prod/main.tf", "")]);

        let err = load_digger_config_from_str("generate_projects:\n  include: \"nothing/*\"\n", &root).unwrap_err();

        assert!(matches!(&err, ConfigError::StructuralInvalid { source_name } if source_name == STRING_SOURCE_NAME));
    }

    #[test]
    fn test_generation_from_file_names_source() {
        let (_tmp, root) = tree(&[
            ("digger.yml", "generate_projects:\n  include: \"nothing/*\"\n"),
            ("prod/main.tf", ""),
        ]);

        let err = load_digger_config(&root).unwrap_err();

        assert!(matches!(&err, ConfigError::StructuralInvalid { source_name } if source_name.ends_with("digger.yml")));
    }

    #[test]
    fn test_auto_detect_shared_base_names() {
        let (_tmp, root) = tree(&[("dev/app/main.tf", ""), ("prod/app/main.tf", "")]);

        let loaded = load_digger_config(&root).unwrap();

        let names: Vec<&str> = loaded.config.projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["dev_app", "prod_app"]);
    }

    #[test]
    fn test_terragrunt_generation_builds_graph() {
        let (_tmp, root) = tree(&[]);
        let loader = ConfigLoader::default().with_parser(FixedParser);

        let loaded = loader.load_from_str("generate_projects:\n  terragrunt: true\n", &root).unwrap();

        assert_eq!(loaded.yaml.projects.len(), 2);
        assert!(loaded.config.projects.iter().all(|p| p.terragrunt));
        assert_eq!(loaded.graph.dependencies_of("app"), vec!["vpc"]);
        assert!(!loaded.config.auto_merge);
    }

    #[test]
    fn test_hydration_failure_policy() {
        let (_tmp, root) = tree(&[]);
        let doc = "generate_projects:\n  terragrunt: true\n";

        let degraded = ConfigLoader::default()
            .with_parser(FailingParser)
            .load_from_str(doc, &root)
            .unwrap();
        assert!(degraded.config.projects.is_empty());

        let options = LoadOptions {
            hydration_failure: HydrationFailure::FailFast,
            ..Default::default()
        };
        let result = ConfigLoader::new(options).with_parser(FailingParser).load_from_str(doc, &root);
        assert!(matches!(result, Err(ConfigError::Subsystem(_))));
    }

    #[test]
    fn test_retrieve_config_file() {
        let (_tmp, root) = tree(&[]);
        assert_eq!(retrieve_config_file(&root).unwrap(), None);

        fs::write(root.join("digger.yaml"), DECLARED).unwrap();
        assert_eq!(retrieve_config_file(&root).unwrap(), Some(root.join("digger.yaml")));
    }
}
