pub mod config;
pub mod convert;
pub mod detect;
pub mod env;
pub mod error;
pub mod generate;
pub mod graph;
pub mod loader;
pub mod matcher;
pub mod output;
pub mod path;
pub mod terragrunt;
pub mod validate;
pub mod walker;
pub mod yaml;

// Re-export main types
pub use config::{DiggerConfig, Project, Workflow};
pub use error::ConfigError;
pub use graph::ProjectGraph;
pub use loader::{load_digger_config, load_digger_config_from_str, ConfigLoader, HydrationFailure, LoadOptions, LoadedConfig};
pub use matcher::match_include_exclude_patterns_to_file;
pub use yaml::DiggerConfigYaml;
