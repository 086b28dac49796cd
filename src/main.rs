//! digger-config CLI - Resolve digger projects and the ones a change affects

use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use digger_config::loader::{ConfigLoader, HydrationFailure, LoadOptions};
use digger_config::output::{generate_output, OutputFormat};
use digger_config::walker::DEFAULT_TERRAFORM_FILE_PATTERN;

#[derive(Parser)]
#[command(name = "digger-config")]
#[command(author, version, about = "Resolve digger projects and the projects affected by a change")]
struct Cli {
    /// Repository working directory
    dir: Utf8PathBuf,

    /// Changed file, relative to the working directory (repeatable)
    #[arg(short, long = "changed-file")]
    changed_files: Vec<String>,

    /// Read the digger config from this file instead of the working directory
    #[arg(long)]
    config_string_file: Option<Utf8PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "json", value_enum)]
    format: Format,

    /// Fail when terragrunt project generation fails instead of skipping it
    #[arg(long)]
    fail_on_hydration_error: bool,

    /// Regex matched against file names to detect terraform directories
    #[arg(long, default_value = DEFAULT_TERRAFORM_FILE_PATTERN)]
    terraform_pattern: String,

    /// Verbose output (debug logs to stderr)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

impl From<Format> for OutputFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Json => OutputFormat::Json,
            Format::Yaml => OutputFormat::Yaml,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.dir.is_dir() {
        return Err(format!("Working directory does not exist: {}", cli.dir).into());
    }

    let options = LoadOptions {
        hydration_failure: if cli.fail_on_hydration_error {
            HydrationFailure::FailFast
        } else {
            HydrationFailure::Degrade
        },
        terraform_file_pattern: cli.terraform_pattern.clone(),
    };
    let loader = ConfigLoader::new(options);

    let loaded = match &cli.config_string_file {
        Some(file) => {
            let content = std::fs::read_to_string(file).map_err(|e| format!("failed to read {}: {}", file, e))?;
            loader.load_from_str(&content, &cli.dir)?
        }
        None => loader.load(&cli.dir)?,
    };
    info!(
        projects = loaded.config.projects.len(),
        workflows = loaded.config.workflows.len(),
        "loaded digger config"
    );

    let projects = if cli.changed_files.is_empty() {
        loaded.config.projects.clone()
    } else {
        let modified = loaded.config.get_modified_projects(&cli.changed_files)?;
        debug!(changed = cli.changed_files.len(), affected = modified.len(), "selected affected projects");
        modified
    };

    let output = generate_output(&projects, &loaded.graph, cli.format.into())?;
    println!("{}", output);

    Ok(())
}
