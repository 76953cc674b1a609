//! Include/exclude path filtering for automatic conversion.

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid path pattern {pattern}: {message}")]
pub struct PatternError {
    pub pattern: String,
    pub message: String,
}

/// One user-supplied pattern: `/…/` is a regular expression tested
/// against the full vault path, anything else a literal path prefix.
#[derive(Debug, Clone)]
pub enum PathPattern {
    Prefix(String),
    Regex(Regex),
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if raw.len() >= 2 && raw.starts_with('/') && raw.ends_with('/') {
            let body = &raw[1..raw.len() - 1];
            let regex = Regex::new(body).map_err(|err| PatternError {
                pattern: raw.to_string(),
                message: err.to_string(),
            })?;
            Ok(PathPattern::Regex(regex))
        } else {
            Ok(PathPattern::Prefix(raw.to_string()))
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
            PathPattern::Regex(regex) => regex.is_match(path),
        }
    }
}

/// Decides whether a path participates in automatic conversion.
///
/// An empty include list admits every path; an empty exclude list
/// rejects none. When both lists match, exclusion wins.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Vec<PathPattern>,
    exclude: Vec<PathPattern>,
}

impl PathFilter {
    pub fn new(
        include_patterns: &[String],
        exclude_patterns: &[String],
    ) -> Result<Self, PatternError> {
        Ok(Self {
            include: parse_all(include_patterns)?,
            exclude: parse_all(exclude_patterns)?,
        })
    }

    /// True when the path must be skipped by automatic operations.
    pub fn is_ignored(&self, path: &str) -> bool {
        let included =
            self.include.is_empty() || self.include.iter().any(|pattern| pattern.matches(path));
        let excluded = self.exclude.iter().any(|pattern| pattern.matches(path));
        !included || excluded
    }
}

fn parse_all(patterns: &[String]) -> Result<Vec<PathPattern>, PatternError> {
    patterns
        .iter()
        .filter(|raw| !raw.is_empty())
        .map(|raw| PathPattern::parse(raw))
        .collect()
}
