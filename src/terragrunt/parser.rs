//! Parse HCL files and extract terragrunt constructs.

use camino::Utf8Path;
use hcl::expr::{Expression, FuncCall, TemplateExpr};
use hcl::template::{Element, Template};
use hcl::Body;

use super::ParserError;

/// Locals flag that marks a config as a project when markers are required
pub const PROJECT_MARKER: &str = "atlantis_project";

/// A path-valued HCL expression, kept symbolic until resolved against a project.
#[derive(Debug, Clone, PartialEq)]
pub enum PathExpr {
    Literal(String),
    /// `find_in_parent_folders()` with an optional file name
    FindInParentFolders(Option<String>),
    GetRepoRoot,
    GetTerragruntDir,
    GetParentTerragruntDir,
    PathRelativeToInclude,
    PathRelativeFromInclude,
    Dirname(Box<PathExpr>),
    /// `format(fmt, args...)` with `%s` placeholders
    Format { fmt: String, args: Vec<PathExpr> },
    /// `"${...}/literal"` string templates
    Interpolation(Vec<PathExpr>),
    Unresolvable { func: String },
}

/// Parsed terragrunt configuration
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TerragruntConfig {
    /// `include` block paths
    pub includes: Vec<PathExpr>,
    /// `dependency` block `config_path`s
    pub dependencies: Vec<PathExpr>,
    /// `dependencies { paths = [...] }`
    pub dependency_paths: Vec<PathExpr>,
    pub terraform_source: Option<PathExpr>,
    pub has_terraform_block: bool,
    /// Files read through `read_terragrunt_config` in `locals`
    pub watch_files: Vec<PathExpr>,
    pub project_marker: bool,
}

impl TerragruntConfig {
    /// A config that neither includes another nor declares a terraform block
    /// only exists to be included.
    pub fn is_parent(&self) -> bool {
        self.includes.is_empty() && !self.has_terraform_block
    }
}

/// Parse a terragrunt.hcl file
pub fn parse_terragrunt_file(path: &Utf8Path) -> Result<TerragruntConfig, ParserError> {
    let content = std::fs::read_to_string(path).map_err(|source| ParserError::Io {
        path: path.to_owned(),
        source,
    })?;
    parse_terragrunt_str(&content).map_err(|source| ParserError::Hcl {
        path: path.to_owned(),
        source,
    })
}

pub fn parse_terragrunt_str(content: &str) -> Result<TerragruntConfig, hcl::Error> {
    let body: Body = hcl::parse(content)?;
    let mut config = TerragruntConfig::default();

    for block in body.blocks() {
        let block_body = block.body();
        match block.identifier() {
            "include" => {
                if let Some(path) = attribute(block_body, "path") {
                    config.includes.push(to_path_expr(path));
                }
            }
            "dependency" => {
                if let Some(path) = attribute(block_body, "config_path") {
                    config.dependencies.push(to_path_expr(path));
                }
            }
            "dependencies" => {
                if let Some(Expression::Array(paths)) = attribute(block_body, "paths") {
                    config.dependency_paths.extend(paths.iter().map(to_path_expr));
                }
            }
            "terraform" => {
                config.has_terraform_block = true;
                config.terraform_source = attribute(block_body, "source").map(to_path_expr);
            }
            "locals" => {
                for attr in block_body.attributes() {
                    match attr.expr() {
                        Expression::Bool(true) if attr.key() == PROJECT_MARKER => config.project_marker = true,
                        Expression::FuncCall(call) if call.name.as_str() == "read_terragrunt_config" => {
                            if let Some(arg) = call.args.first() {
                                config.watch_files.push(to_path_expr(arg));
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    Ok(config)
}

fn attribute<'a>(body: &'a Body, key: &str) -> Option<&'a Expression> {
    body.attributes().find(|a| a.key() == key).map(|a| a.expr())
}

fn to_path_expr(expr: &Expression) -> PathExpr {
    match expr {
        Expression::String(s) => PathExpr::Literal(s.clone()),
        Expression::TemplateExpr(template) => template_to_path_expr(template),
        Expression::FuncCall(call) => func_to_path_expr(call),
        Expression::Parenthesis(inner) => to_path_expr(inner),
        _ => PathExpr::Unresolvable {
            func: "non-path expression".to_string(),
        },
    }
}

fn template_to_path_expr(expr: &TemplateExpr) -> PathExpr {
    let Ok(template) = Template::from_expr(expr) else {
        return PathExpr::Unresolvable {
            func: "template".to_string(),
        };
    };

    let parts: Vec<PathExpr> = template
        .elements()
        .iter()
        .map(|element| match element {
            Element::Literal(s) => PathExpr::Literal(s.clone()),
            Element::Interpolation(interpolation) => to_path_expr(&interpolation.expr),
            Element::Directive(_) => PathExpr::Unresolvable {
                func: "template directive".to_string(),
            },
        })
        .collect();

    // a template without interpolations is a plain string
    if parts.iter().all(|p| matches!(p, PathExpr::Literal(_))) {
        let literal = parts
            .into_iter()
            .filter_map(|p| match p {
                PathExpr::Literal(s) => Some(s),
                _ => None,
            })
            .collect();
        return PathExpr::Literal(literal);
    }
    PathExpr::Interpolation(parts)
}

fn string_arg(call: &FuncCall, index: usize) -> Option<String> {
    match to_path_expr(call.args.get(index)?) {
        PathExpr::Literal(s) => Some(s),
        _ => None,
    }
}

fn func_to_path_expr(call: &FuncCall) -> PathExpr {
    let name = call.name.as_str();
    match name {
        "find_in_parent_folders" => PathExpr::FindInParentFolders(string_arg(call, 0)),
        "get_repo_root" => PathExpr::GetRepoRoot,
        "get_terragrunt_dir" => PathExpr::GetTerragruntDir,
        "get_parent_terragrunt_dir" => PathExpr::GetParentTerragruntDir,
        "path_relative_to_include" => PathExpr::PathRelativeToInclude,
        "path_relative_from_include" => PathExpr::PathRelativeFromInclude,
        "dirname" => match call.args.first() {
            Some(arg) => PathExpr::Dirname(Box::new(to_path_expr(arg))),
            None => PathExpr::Unresolvable {
                func: "dirname()".to_string(),
            },
        },
        "format" => match string_arg(call, 0) {
            Some(fmt) => PathExpr::Format {
                fmt,
                args: call.args.iter().skip(1).map(to_path_expr).collect(),
            },
            None => PathExpr::Unresolvable {
                func: "format()".to_string(),
            },
        },
        _ => PathExpr::Unresolvable {
            func: format!("{}()", name),
        },
    }
}
