//! Ordered rule set compilation.

use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

use crate::config::schema::PatternRule;

/// Errors raised while building an endpoint matcher.
#[derive(Debug, Error)]
pub enum MatcherError {
    /// A configured pattern is not a valid regular expression.
    #[error("invalid endpoint pattern #{index} `{pattern}`: {source}")]
    InvalidPattern {
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled pattern and the label it assigns.
#[derive(Debug, Clone)]
pub struct Rule {
    regex: Regex,
    label: Arc<str>,
}

impl Rule {
    /// Compile a single rule.
    pub fn compile(index: usize, pattern: &str, label: &str) -> Result<Self, MatcherError> {
        let regex = Regex::new(pattern).map_err(|source| MatcherError::InvalidPattern {
            index,
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            regex,
            label: Arc::from(label),
        })
    }

    /// Returns true if the pattern matches anywhere in `path`.
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn label(&self) -> &Arc<str> {
        &self.label
    }
}

/// Rules in configuration order. The first match wins.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Compile every configured rule, failing on the first bad pattern.
    pub fn compile(rules: &[PatternRule]) -> Result<Self, MatcherError> {
        let rules = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| Rule::compile(index, &rule.pattern, &rule.name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Label of the first rule matching `path`, if any.
    pub fn first_match(&self, path: &str) -> Option<&Arc<str>> {
        self.rules.iter().find(|r| r.matches(path)).map(Rule::label)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}
