//! Include/exclude glob matching of changed files.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use thiserror::Error;
use tracing::debug;

use crate::path::{normalize_file_name, PathError};

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("failed to build glob set: {0}")]
    Build(#[source] globset::Error),
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Normalized patterns and the set compiled from them, in the same order.
struct Compiled {
    patterns: Vec<String>,
    set: GlobSet,
}

impl Compiled {
    /// The first pattern matching `file`, if any.
    fn first_match(&self, file: &str) -> Option<&str> {
        self.set
            .matches(file)
            .into_iter()
            .min()
            .map(|index| self.patterns[index].as_str())
    }
}

/// `*` stays inside one path segment, `**` spans any number of them, and
/// `{a,b}` alternates. A `**` glued to other characters acts like `*`.
fn compile(raw_patterns: &[String]) -> Result<Compiled, MatchError> {
    let mut builder = GlobSetBuilder::new();
    let mut patterns = Vec::with_capacity(raw_patterns.len());
    for raw in raw_patterns {
        let normalized = normalize_file_name(raw)?;
        let glob = GlobBuilder::new(&normalized)
            .literal_separator(true)
            .build()
            .map_err(|source| MatchError::InvalidPattern {
                pattern: raw.clone(),
                source,
            })?;
        builder.add(glob);
        patterns.push(normalized);
    }
    let set = builder.build().map_err(MatchError::Build)?;
    Ok(Compiled { patterns, set })
}

/// Whether `file` matches any include pattern and no exclude pattern.
///
/// The file and every pattern are normalized first, so relative and absolute
/// spellings compare equal. An empty include list never matches. All patterns
/// are compiled up front: a malformed exclude pattern is an error even when
/// no include pattern matched.
pub fn match_include_exclude_patterns_to_file(
    file: &str,
    include_patterns: &[String],
    exclude_patterns: &[String],
) -> Result<bool, MatchError> {
    let file = normalize_file_name(file)?;
    let includes = compile(include_patterns)?;
    let excludes = compile(exclude_patterns)?;

    let Some(include) = includes.first_match(&file) else {
        debug!(%file, "no include pattern matched");
        return Ok(false);
    };

    if let Some(exclude) = excludes.first_match(&file) {
        debug!(%file, include, exclude, "excluded");
        return Ok(false);
    }

    debug!(%file, include, "matched");
    Ok(true)
}
