//! Processing of discovered terragrunt configs, optionally in parallel.

use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;

use super::parser::{parse_terragrunt_file, PathExpr, TerragruntConfig};
use super::resolver::ResolveContext;
use super::ParserError;

/// A terragrunt config with every path it references resolved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    /// Directory containing the config
    pub dir: Utf8PathBuf,
    pub config_file: Utf8PathBuf,
    /// Included config files
    pub includes: Vec<Utf8PathBuf>,
    /// Directories named by `dependency` blocks
    pub dependency_blocks: Vec<Utf8PathBuf>,
    /// Directories named by `dependencies { paths }`
    pub dependency_paths: Vec<Utf8PathBuf>,
    /// Local terraform module directory
    pub source_dir: Option<Utf8PathBuf>,
    /// Other files read by the config
    pub watch_files: Vec<Utf8PathBuf>,
    pub is_parent: bool,
    pub project_marker: bool,
}

/// Result of processing a single config
#[derive(Debug)]
pub enum ModuleResult {
    Ok(Module),
    Err { path: Utf8PathBuf, error: ParserError },
}

/// Process discovered config files, in parallel when asked to.
///
/// Results come back in input order either way.
pub fn process_modules(config_files: Vec<Utf8PathBuf>, parallel: bool) -> Vec<ModuleResult> {
    if parallel {
        config_files.into_par_iter().map(process_single_module).collect()
    } else {
        config_files.into_iter().map(process_single_module).collect()
    }
}

fn process_single_module(config_file: Utf8PathBuf) -> ModuleResult {
    match build_module(&config_file) {
        Ok(module) => ModuleResult::Ok(module),
        Err(error) => ModuleResult::Err {
            path: config_file,
            error,
        },
    }
}

fn resolve_all(ctx: &ResolveContext, exprs: &[PathExpr]) -> Vec<Utf8PathBuf> {
    exprs.iter().filter_map(|e| ctx.resolve(e)).collect()
}

/// Remote sources (`git::`, registry addresses, URLs) are not watched.
fn local_source(ctx: &ResolveContext, source: &PathExpr) -> Option<Utf8PathBuf> {
    if let PathExpr::Literal(raw) = source {
        if raw.contains("::") || raw.contains("://") || !(raw.starts_with('.') || raw.starts_with('/')) {
            return None;
        }
        // `../modules//vpc` addresses a subdirectory of the module tree
        return ctx.resolve(&PathExpr::Literal(raw.replace("//", "/")));
    }
    ctx.resolve(source)
}

fn merge(module: &mut Module, ctx: &ResolveContext, config: &TerragruntConfig) {
    module.dependency_blocks.extend(resolve_all(ctx, &config.dependencies));
    module.dependency_paths.extend(resolve_all(ctx, &config.dependency_paths));
    module.watch_files.extend(resolve_all(ctx, &config.watch_files));
    if module.source_dir.is_none() {
        module.source_dir = config.terraform_source.as_ref().and_then(|s| local_source(ctx, s));
    }
}

fn build_module(config_file: &Utf8Path) -> Result<Module, ParserError> {
    let dir = config_file
        .parent()
        .map(Utf8Path::to_path_buf)
        .ok_or_else(|| ParserError::RootNotFound(config_file.to_owned()))?;
    let config = parse_terragrunt_file(config_file)?;
    let ctx = ResolveContext::new(dir.clone());

    let mut module = Module {
        dir: dir.clone(),
        config_file: config_file.to_owned(),
        includes: resolve_all(&ctx, &config.includes),
        is_parent: config.is_parent(),
        project_marker: config.project_marker,
        ..Default::default()
    };
    merge(&mut module, &ctx, &config);

    // Included configs contribute dependencies and sources, one level deep.
    for include in module.includes.clone() {
        if !include.is_file() {
            continue;
        }
        let included = parse_terragrunt_file(&include)?;
        let include_dir = include.parent().map(Utf8Path::to_path_buf).unwrap_or_else(|| dir.clone());
        let include_ctx = ResolveContext::for_included_config(include_dir, dir.clone());
        merge(&mut module, &include_ctx, &included);
        module.project_marker |= included.project_marker;
    }

    Ok(module)
}
