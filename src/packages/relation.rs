// src/packages/relation.rs

//! Debian relationship fields
//!
//! A relationship field such as `Depends` is a comma-separated list of
//! alternative groups; each group is a `|`-separated list of constraints.
//! All groups must be satisfied, any one member of a group satisfies it.

use crate::version::{RelationType, version_satisfies};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// A single constraint: `name[:annotation] [(op version)]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    /// Package (or virtual package) name
    pub name: String,

    /// Required version, empty when any version is acceptable
    pub version: String,

    /// Relational operator applied to `version`
    pub relation: RelationType,

    /// Multi-arch qualifier after the colon (`any`, `native`, an architecture, or empty)
    pub multi_arch_annotation: String,
}

/// OR-set of constraints
pub type DependencyGroup = Vec<Dependency>;

impl Dependency {
    /// Unversioned constraint on `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
            relation: RelationType::NoOperation,
            multi_arch_annotation: String::new(),
        }
    }

    /// Versioned constraint on `name`
    pub fn versioned(name: impl Into<String>, relation: RelationType, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            relation,
            multi_arch_annotation: String::new(),
        }
    }

    /// Parse a single constraint
    ///
    /// Architecture restrictions (`[amd64]`) and build profiles (`<!nocheck>`)
    /// are accepted and dropped.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let name_end = s
            .find(|c: char| c.is_whitespace() || c == '(' || c == '[' || c == '<')
            .unwrap_or(s.len());
        let token = &s[..name_end];
        if token.is_empty() {
            return None;
        }

        let (name, annotation) = match token.split_once(':') {
            Some((name, annotation)) => (name, annotation),
            None => (token, ""),
        };

        let rest = &s[name_end..];
        let (relation, version) = match rest.find('(') {
            Some(start) => {
                let end = rest[start..]
                    .find(')')
                    .map(|offset| start + offset)
                    .unwrap_or(rest.len());
                let inner = rest[start + 1..end].trim();
                let op_end = inner
                    .find(|c: char| !matches!(c, '<' | '>' | '=' | '!'))
                    .unwrap_or(inner.len());
                let relation = inner[..op_end].parse::<RelationType>().unwrap_or_else(|e| {
                    debug!("{} in constraint '{}', treating as unversioned", e, s);
                    RelationType::NoOperation
                });
                let version = if relation == RelationType::NoOperation {
                    String::new()
                } else {
                    inner[op_end..].trim().to_string()
                };
                (relation, version)
            }
            None => (RelationType::NoOperation, String::new()),
        };

        Some(Self {
            name: name.to_string(),
            version,
            relation,
            multi_arch_annotation: annotation.to_string(),
        })
    }

    /// Whether `version` satisfies this constraint
    pub fn is_satisfied_by(&self, version: &str) -> bool {
        version_satisfies(version, self.relation, &self.version)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.multi_arch_annotation.is_empty() {
            write!(f, ":{}", self.multi_arch_annotation)?;
        }
        if self.relation != RelationType::NoOperation {
            write!(f, " ({} {})", self.relation, self.version)?;
        }
        Ok(())
    }
}

/// Parse a full relationship field into alternative groups
pub fn parse_relations(field: &str) -> Vec<DependencyGroup> {
    field
        .split(',')
        .map(|group| {
            group
                .split('|')
                .filter_map(Dependency::parse)
                .collect::<DependencyGroup>()
        })
        .filter(|group| !group.is_empty())
        .collect()
}

/// Names mentioned by a relationship field, alternatives flattened
///
/// Used for `Provides`, `Recommends` and `Suggests`, where only names matter.
pub fn relation_names(field: &str) -> Vec<String> {
    parse_relations(field)
        .into_iter()
        .flatten()
        .map(|dep| dep.name)
        .collect()
}
