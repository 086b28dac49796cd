//! Terragrunt dependency parsing.
//!
//! Project generation hands a [`ParseRequest`] to a [`TerragruntParser`] and
//! gets back project definitions with the paths that should trigger a plan
//! and the projects each one depends on. [`HclParser`] is the built-in
//! implementation: it discovers configs, parses them with `hcl-rs`, resolves
//! the terragrunt path functions it can evaluate statically and derives the
//! dependency edges.

pub mod discovery;
pub mod parser;
pub mod processor;
pub mod resolver;

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{DEFAULT_WORKFLOW_NAME, DEFAULT_WORKSPACE};
use crate::yaml::TerragruntParsingConfig;

use self::discovery::discover_config_files;
use self::processor::{process_modules, Module, ModuleResult};

pub const TERRAGRUNT_CONFIG: &str = "terragrunt.hcl";

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Failed to parse HCL in {path}: {source}")]
    Hcl {
        path: Utf8PathBuf,
        #[source]
        source: hcl::Error,
    },
    #[error("IO error on {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error walking terragrunt configs: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8(String),
    #[error("root path does not exist: {0}")]
    RootNotFound(Utf8PathBuf),
    #[error("invalid filter path '{pattern}': {source}")]
    FilterPath {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Fully defaulted parser options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRequest {
    /// Output paths are relative to this directory
    pub working_dir: Utf8PathBuf,
    /// Directory to search for configs
    pub root: Utf8PathBuf,
    pub project_hcl_files: Vec<String>,
    pub create_hcl_project_external_childs: bool,
    pub auto_merge: bool,
    pub parallel: bool,
    pub filter_path: String,
    pub create_hcl_project_childs: bool,
    pub ignore_parent_terragrunt: bool,
    pub ignore_dependency_blocks: bool,
    pub cascade_dependencies: bool,
    pub default_workflow: String,
    pub default_apply_requirements: Vec<String>,
    pub auto_plan: bool,
    pub default_terraform_version: String,
    pub create_project_name: bool,
    pub create_workspace: bool,
    pub preserve_projects: bool,
    pub use_project_markers: bool,
}

impl ParseRequest {
    /// Applies the documented defaults: parse from `git_root` (else the
    /// working directory), and treat absent tri-state options as `true`.
    /// `git_root` always stays under the working directory, even when it is
    /// spelled as an absolute path.
    pub fn new(working_dir: &Utf8Path, config: &TerragruntParsingConfig) -> Self {
        let root = match &config.git_root {
            Some(git_root) => working_dir.join(git_root.trim_start_matches('/')),
            None => working_dir.to_owned(),
        };
        Self {
            working_dir: working_dir.to_owned(),
            root,
            project_hcl_files: config.project_hcl_files.clone(),
            create_hcl_project_external_childs: config.create_hcl_project_external_childs.unwrap_or(true),
            auto_merge: config.auto_merge,
            parallel: config.parallel.unwrap_or(true),
            filter_path: config.filter_path.clone(),
            create_hcl_project_childs: config.create_hcl_project_childs,
            ignore_parent_terragrunt: config.ignore_parent_terragrunt.unwrap_or(true),
            ignore_dependency_blocks: config.ignore_dependency_blocks,
            cascade_dependencies: config.cascade_dependencies.unwrap_or(true),
            default_workflow: config.default_workflow.clone(),
            default_apply_requirements: config.default_apply_requirements.clone(),
            auto_plan: config.auto_plan,
            default_terraform_version: config.default_terraform_version.clone(),
            create_project_name: config.create_project_name,
            create_workspace: config.create_workspace,
            preserve_projects: config.preserve_projects,
            use_project_markers: config.use_project_markers,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Autoplan {
    pub when_modified: Vec<String>,
    pub enabled: bool,
}

/// A project derived from a terragrunt config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerragruntProject {
    pub name: String,
    /// Relative to the working directory
    pub dir: String,
    pub workspace: String,
    pub workflow: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terraform_version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub apply_requirements: Vec<String>,
    pub autoplan: Autoplan,
    /// Names of projects from the same parse this one depends on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedTerragrunt {
    pub projects: Vec<TerragruntProject>,
    pub auto_merge: bool,
}

/// Extracts projects and dependency edges from a terragrunt tree.
pub trait TerragruntParser: Send + Sync {
    fn parse(&self, request: &ParseRequest) -> Result<ParsedTerragrunt, ParserError>;
}

/// The built-in parser
#[derive(Debug, Default, Clone, Copy)]
pub struct HclParser;

/// Convert a path to relative form when it lives under `base`
pub fn make_relative(path: &Utf8Path, base: &Utf8Path) -> String {
    match path.strip_prefix(base) {
        Ok(rel) if rel.as_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.to_string(),
        Err(_) => path.to_string(),
    }
}

fn canonical(path: &Utf8Path) -> Result<Utf8PathBuf, ParserError> {
    if !path.is_dir() {
        return Err(ParserError::RootNotFound(path.to_owned()));
    }
    path.canonicalize_utf8().map_err(|source| ParserError::Io {
        path: path.to_owned(),
        source,
    })
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

impl HclParser {
    /// Picks which discovered configs become projects.
    ///
    /// Without `project_hcl_files` every terragrunt.hcl is a candidate.
    /// Otherwise directories holding one of those files are project roots;
    /// terragrunt.hcl files below a root count only with
    /// `create_hcl_project_childs`, files outside every root only with
    /// `create_hcl_project_external_childs`.
    fn select_candidates(request: &ParseRequest, files: Vec<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
        if request.project_hcl_files.is_empty() {
            return files;
        }

        let is_project_file = |f: &Utf8Path| {
            f.file_name()
                .map(|n| request.project_hcl_files.iter().any(|p| p == n))
                .unwrap_or(false)
        };
        let roots: Vec<Utf8PathBuf> = files
            .iter()
            .filter(|f| is_project_file(f))
            .filter_map(|f| f.parent().map(Utf8Path::to_path_buf))
            .collect();

        let mut seen_dirs = HashSet::new();
        let mut candidates = Vec::new();
        for file in files {
            let Some(dir) = file.parent().map(Utf8Path::to_path_buf) else {
                continue;
            };
            let keep = if is_project_file(&file) || roots.contains(&dir) {
                true
            } else if roots.iter().any(|root| dir.starts_with(root)) {
                request.create_hcl_project_childs
            } else {
                request.create_hcl_project_external_childs
            };
            // one project per directory, first config wins
            if keep && seen_dirs.insert(dir) {
                candidates.push(file);
            }
        }
        candidates
    }

    fn filter(request: &ParseRequest, files: Vec<Utf8PathBuf>) -> Result<Vec<Utf8PathBuf>, ParserError> {
        if request.filter_path.is_empty() {
            return Ok(files);
        }
        let pattern = Pattern::new(&request.filter_path).map_err(|source| ParserError::FilterPath {
            pattern: request.filter_path.clone(),
            source,
        })?;
        Ok(files
            .into_iter()
            .filter(|file| {
                let dir = file.parent().unwrap_or(file.as_path());
                pattern.matches(&make_relative(dir, &request.working_dir))
            })
            .collect())
    }

    fn project_name(request: &ParseRequest, rel_dir: &str) -> String {
        if request.create_project_name {
            rel_dir.replace('/', "_")
        } else {
            rel_dir.to_string()
        }
    }

    /// Dependency directories of `module`, transitively when cascading.
    fn dependency_dirs(
        request: &ParseRequest,
        module: &Module,
        by_dir: &HashMap<&Utf8Path, &Module>,
    ) -> Vec<Utf8PathBuf> {
        let direct = |m: &Module| -> Vec<Utf8PathBuf> {
            let mut dirs = m.dependency_paths.clone();
            if !request.ignore_dependency_blocks {
                dirs.extend(m.dependency_blocks.iter().cloned());
            }
            dirs
        };

        let mut result: Vec<Utf8PathBuf> = Vec::new();
        let mut queue: VecDeque<Utf8PathBuf> = direct(module).into();
        while let Some(dir) = queue.pop_front() {
            if dir == module.dir || result.contains(&dir) {
                continue;
            }
            if request.cascade_dependencies {
                if let Some(dependency) = by_dir.get(dir.as_path()) {
                    queue.extend(direct(dependency));
                }
            }
            result.push(dir);
        }
        result
    }

    fn when_modified(
        request: &ParseRequest,
        module: &Module,
        dependency_dirs: &[Utf8PathBuf],
        by_dir: &HashMap<&Utf8Path, &Module>,
    ) -> Vec<String> {
        let base = &request.working_dir;
        let rel_dir = make_relative(&module.dir, base);
        let mut watched = vec![format!("{}/*.hcl", rel_dir), format!("{}/*.tf*", rel_dir)];

        for file in module.includes.iter().chain(&module.watch_files) {
            push_unique(&mut watched, make_relative(file, base));
        }
        if let Some(source) = &module.source_dir {
            push_unique(&mut watched, format!("{}/*.tf*", make_relative(source, base)));
        }
        for dir in dependency_dirs {
            let config = by_dir
                .get(dir.as_path())
                .map(|m| m.config_file.clone())
                .unwrap_or_else(|| dir.join(TERRAGRUNT_CONFIG));
            push_unique(&mut watched, make_relative(&config, base));
        }
        watched
    }
}

impl TerragruntParser for HclParser {
    fn parse(&self, request: &ParseRequest) -> Result<ParsedTerragrunt, ParserError> {
        let request = ParseRequest {
            working_dir: canonical(&request.working_dir)?,
            root: canonical(&request.root)?,
            ..request.clone()
        };

        let mut file_names = request.project_hcl_files.clone();
        if !file_names.iter().any(|f| f == TERRAGRUNT_CONFIG) {
            file_names.push(TERRAGRUNT_CONFIG.to_string());
        }

        let files = discover_config_files(&request.root, &file_names)?;
        let candidates = Self::select_candidates(&request, files);
        let candidates = Self::filter(&request, candidates)?;
        debug!(root = %request.root, candidates = candidates.len(), "processing terragrunt configs");

        let mut modules = Vec::with_capacity(candidates.len());
        for result in process_modules(candidates, request.parallel) {
            match result {
                ModuleResult::Ok(module) => modules.push(module),
                ModuleResult::Err { path, error } => {
                    debug!(%path, %error, "terragrunt config failed to process");
                    return Err(error);
                }
            }
        }

        modules.retain(|m| {
            !(request.ignore_parent_terragrunt && m.is_parent) && (!request.use_project_markers || m.project_marker)
        });

        let by_dir: HashMap<&Utf8Path, &Module> = modules.iter().map(|m| (m.dir.as_path(), m)).collect();
        let names: BTreeMap<&Utf8Path, String> = modules
            .iter()
            .map(|m| {
                let rel = make_relative(&m.dir, &request.working_dir);
                (m.dir.as_path(), Self::project_name(&request, &rel))
            })
            .collect();

        let workflow = if request.default_workflow.is_empty() {
            DEFAULT_WORKFLOW_NAME.to_string()
        } else {
            request.default_workflow.clone()
        };
        let terraform_version = Some(request.default_terraform_version.clone()).filter(|v| !v.is_empty());

        let projects = modules
            .iter()
            .map(|module| {
                let name = names[module.dir.as_path()].clone();
                let dependency_dirs = Self::dependency_dirs(&request, module, &by_dir);
                let mut depends_on = Vec::new();
                let mut direct = module.dependency_paths.clone();
                if !request.ignore_dependency_blocks {
                    direct.extend(module.dependency_blocks.iter().cloned());
                }
                for dir in &direct {
                    if let Some(dependency) = names.get(dir.as_path()) {
                        if *dependency != name {
                            push_unique(&mut depends_on, dependency.clone());
                        }
                    }
                }

                TerragruntProject {
                    workspace: if request.create_workspace {
                        name.clone()
                    } else {
                        DEFAULT_WORKSPACE.to_string()
                    },
                    name,
                    dir: make_relative(&module.dir, &request.working_dir),
                    workflow: workflow.clone(),
                    terraform_version: terraform_version.clone(),
                    apply_requirements: request.default_apply_requirements.clone(),
                    autoplan: Autoplan {
                        when_modified: Self::when_modified(&request, module, &dependency_dirs, &by_dir),
                        enabled: request.auto_plan,
                    },
                    depends_on,
                }
            })
            .collect();

        Ok(ParsedTerragrunt {
            projects,
            auto_merge: request.auto_merge,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    const CHILD: &str = "include \"root\" {\n  path = find_in_parent_folders()\n}\n";

    fn tree(files: &[(&str, &str)]) -> (TempDir, Utf8PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
            .unwrap()
            .canonicalize_utf8()
            .unwrap();
        for (rel, content) in files {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
        }
        (tmp, root)
    }

    fn live_tree() -> (TempDir, Utf8PathBuf) {
        tree(&[
            ("terragrunt.hcl", "remote_state {}\n"),
            ("live/prod/vpc/terragrunt.hcl", CHILD),
            (
                "live/prod/app/terragrunt.hcl",
                "include \"root\" {\n  path = find_in_parent_folders()\n}\ndependency \"db\" {\n  config_path = \"../db\"\n}\n",
            ),
            (
                "live/prod/db/terragrunt.hcl",
                "include \"root\" {\n  path = find_in_parent_folders()\n}\ndependency \"vpc\" {\n  config_path = \"../vpc\"\n}\n",
            ),
        ])
    }

    fn request(root: &Utf8Path, config: TerragruntParsingConfig) -> ParseRequest {
        ParseRequest::new(root, &config)
    }

    fn project<'a>(parsed: &'a ParsedTerragrunt, name: &str) -> &'a TerragruntProject {
        parsed.projects.iter().find(|p| p.name == name).unwrap()
    }

    #[test]
    fn test_request_defaults() {
        let request = request(Utf8Path::new("/repo"), TerragruntParsingConfig::default());

        assert_eq!(request.root, Utf8PathBuf::from("/repo"));
        assert!(request.parallel);
        assert!(request.ignore_parent_terragrunt);
        assert!(request.cascade_dependencies);
        assert!(request.create_hcl_project_external_childs);
        assert!(!request.auto_merge);
    }

    #[test]
    fn test_request_git_root_and_overrides() {
        let config = TerragruntParsingConfig {
            git_root: Some("live".to_string()),
            parallel: Some(false),
            cascade_dependencies: Some(false),
            ..Default::default()
        };

        let request = request(Utf8Path::new("/repo"), config);

        assert_eq!(request.root, Utf8PathBuf::from("/repo/live"));
        assert!(!request.parallel);
        assert!(!request.cascade_dependencies);
    }

    #[rstest]
    #[case::absolute("/live")]
    #[case::nested_absolute("//live")]
    #[case::relative("live")]
    fn test_request_git_root_stays_under_working_dir(#[case] git_root: &str) {
        let config = TerragruntParsingConfig {
            git_root: Some(git_root.to_string()),
            ..Default::default()
        };

        let request = request(Utf8Path::new("/repo"), config);

        assert_eq!(request.root, Utf8PathBuf::from("/repo/live"));
    }

    #[test]
    fn test_parse_projects_and_dependencies() {
        let (_tmp, root) = live_tree();

        let parsed = HclParser.parse(&request(&root, TerragruntParsingConfig::default())).unwrap();

        let names: Vec<&str> = parsed.projects.iter().map(|p| p.name.as_str()).collect();
        // the root config is a parent and is skipped
        assert_eq!(names, vec!["live/prod/app", "live/prod/db", "live/prod/vpc"]);

        let app = project(&parsed, "live/prod/app");
        assert_eq!(app.dir, "live/prod/app");
        assert_eq!(app.workspace, "default");
        assert_eq!(app.workflow, "default");
        assert_eq!(app.depends_on, vec!["live/prod/db"]);
        assert!(app.autoplan.when_modified.contains(&"live/prod/app/*.hcl".to_string()));
        assert!(app.autoplan.when_modified.contains(&"terragrunt.hcl".to_string()));
        assert!(app.autoplan.when_modified.contains(&"live/prod/db/terragrunt.hcl".to_string()));
        // cascaded through db
        assert!(app.autoplan.when_modified.contains(&"live/prod/vpc/terragrunt.hcl".to_string()));
    }

    #[test]
    fn test_parse_without_cascade() {
        let (_tmp, root) = live_tree();
        let config = TerragruntParsingConfig {
            cascade_dependencies: Some(false),
            ..Default::default()
        };

        let parsed = HclParser.parse(&request(&root, config)).unwrap();

        let app = project(&parsed, "live/prod/app");
        assert!(!app.autoplan.when_modified.contains(&"live/prod/vpc/terragrunt.hcl".to_string()));
    }

    #[test]
    fn test_parse_naming_options() {
        let (_tmp, root) = live_tree();
        let config = TerragruntParsingConfig {
            create_project_name: true,
            create_workspace: true,
            default_workflow: "terragrunt".to_string(),
            default_terraform_version: "1.6.0".to_string(),
            auto_merge: true,
            auto_plan: true,
            ..Default::default()
        };

        let parsed = HclParser.parse(&request(&root, config)).unwrap();

        assert!(parsed.auto_merge);
        let vpc = project(&parsed, "live_prod_vpc");
        assert_eq!(vpc.workspace, "live_prod_vpc");
        assert_eq!(vpc.workflow, "terragrunt");
        assert_eq!(vpc.terraform_version.as_deref(), Some("1.6.0"));
        assert!(vpc.autoplan.enabled);
        assert_eq!(project(&parsed, "live_prod_db").depends_on, vec!["live_prod_vpc"]);
    }

    #[test]
    fn test_parse_ignore_dependency_blocks() {
        let (_tmp, root) = live_tree();
        let config = TerragruntParsingConfig {
            ignore_dependency_blocks: true,
            ..Default::default()
        };

        let parsed = HclParser.parse(&request(&root, config)).unwrap();

        assert!(project(&parsed, "live/prod/app").depends_on.is_empty());
    }

    #[test]
    fn test_parse_keep_parent_configs() {
        let (_tmp, root) = live_tree();
        let config = TerragruntParsingConfig {
            ignore_parent_terragrunt: Some(false),
            ..Default::default()
        };

        let parsed = HclParser.parse(&request(&root, config)).unwrap();

        assert_eq!(parsed.projects.len(), 4);
        assert_eq!(project(&parsed, ".").dir, ".");
    }

    #[test]
    fn test_parse_filter_path() {
        let (_tmp, root) = live_tree();
        let config = TerragruntParsingConfig {
            filter_path: "live/prod/v*".to_string(),
            ..Default::default()
        };

        let parsed = HclParser.parse(&request(&root, config)).unwrap();

        assert_eq!(parsed.projects.len(), 1);
        assert_eq!(parsed.projects[0].name, "live/prod/vpc");
    }

    #[test]
    fn test_parse_project_markers() {
        let (_tmp, root) = tree(&[
            ("a/terragrunt.hcl", "terraform {}\nlocals {\n  atlantis_project = true\n}\n"),
            ("b/terragrunt.hcl", "terraform {}\n"),
        ]);
        let config = TerragruntParsingConfig {
            use_project_markers: true,
            ..Default::default()
        };

        let parsed = HclParser.parse(&request(&root, config)).unwrap();

        assert_eq!(parsed.projects.len(), 1);
        assert_eq!(parsed.projects[0].name, "a");
    }

    #[test]
    fn test_parse_project_hcl_files() {
        let (_tmp, root) = tree(&[
            ("prod/env.hcl", "terraform {}\n"),
            ("prod/app/terragrunt.hcl", "terraform {}\n"),
            ("shared/dns/terragrunt.hcl", "terraform {}\n"),
        ]);
        let base = TerragruntParsingConfig {
            project_hcl_files: vec!["env.hcl".to_string()],
            ..Default::default()
        };

        let parsed = HclParser.parse(&request(&root, base.clone())).unwrap();
        let names: Vec<&str> = parsed.projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["prod", "shared/dns"]);

        let childs = TerragruntParsingConfig {
            create_hcl_project_childs: true,
            create_hcl_project_external_childs: Some(false),
            ..base
        };
        let parsed = HclParser.parse(&request(&root, childs)).unwrap();
        let names: Vec<&str> = parsed.projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["prod/app", "prod"]);
    }

    #[test]
    fn test_parse_invalid_hcl_fails() {
        let (_tmp, root) = tree(&[("bad/terragrunt.hcl", "terraform {")]);

        let result = HclParser.parse(&request(&root, TerragruntParsingConfig::default()));

        assert!(matches!(result, Err(ParserError::Hcl { .. })));
    }

    #[test]
    fn test_parse_missing_root_fails() {
        let result = HclParser.parse(&request(
            Utf8Path::new("/does/not/exist"),
            TerragruntParsingConfig::default(),
        ));

        assert!(matches!(result, Err(ParserError::RootNotFound(_))));
    }

    #[test]
    fn test_make_relative() {
        let base = Utf8Path::new("/repo");

        assert_eq!(make_relative(Utf8Path::new("/repo/live/vpc"), base), "live/vpc");
        assert_eq!(make_relative(Utf8Path::new("/repo"), base), ".");
        assert_eq!(make_relative(Utf8Path::new("/elsewhere/x"), base), "/elsewhere/x");
    }
}
