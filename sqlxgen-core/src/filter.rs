use regex::Regex;

use crate::error::{IntrospectError, Result};

/// Include/exclude regular expressions over qualified names.
///
/// A name is kept when it matches at least one include pattern and no
/// exclude pattern. No include patterns means nothing is kept.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| IntrospectError::Pattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

impl NameFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// Keeps every name.
    pub fn everything() -> Self {
        Self::new(&["^.+$".to_string()], &[]).unwrap_or_default()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.include.iter().any(|pattern| pattern.is_match(name))
            && !self.exclude.iter().any(|pattern| pattern.is_match(name))
    }
}
