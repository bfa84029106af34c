// src/backend/sources.rs

//! dpkg status file and apt list parsing
//!
//! Both files are sequences of RFC 822-like stanzas separated by blank lines.
//! Stanzas are parsed independently (and in parallel) so that a single
//! malformed entry cannot take the whole index down with it.

use crate::packages::{MultiArchType, Package, parse_relations, relation_names};
use crate::version::compare_versions;
use rayon::prelude::*;
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Fields the index needs; everything else is dropped before parsing
const INDEX_FIELDS: &[&str] = &[
    "Package",
    "Version",
    "Architecture",
    "Status",
    "Multi-Arch",
    "Pre-Depends",
    "Depends",
    "Conflicts",
    "Breaks",
    "Replaces",
    "Provides",
    "Recommends",
    "Suggests",
];

/// A stanza as found in `status` or `*_Packages`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StanzaEntry {
    package: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    architecture: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(rename = "Multi-Arch", default)]
    multi_arch: Option<String>,
    #[serde(rename = "Pre-Depends", default)]
    pre_depends: Option<String>,
    #[serde(default)]
    depends: Option<String>,
    #[serde(default)]
    conflicts: Option<String>,
    #[serde(default)]
    breaks: Option<String>,
    #[serde(default)]
    replaces: Option<String>,
    #[serde(default)]
    provides: Option<String>,
    #[serde(default)]
    recommends: Option<String>,
    #[serde(default)]
    suggests: Option<String>,
}

impl StanzaEntry {
    /// dpkg marks fully installed packages `install ok installed`
    fn is_installed(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.split_whitespace().last() == Some("installed"))
    }

    fn into_package(self) -> Option<Package> {
        let version = self.version?;
        let architecture = self.architecture?;
        let field = |value: &Option<String>| value.as_deref().unwrap_or("").to_string();

        let mut depends = parse_relations(&field(&self.pre_depends));
        depends.extend(parse_relations(&field(&self.depends)));
        let mut conflicts = parse_relations(&field(&self.conflicts));
        conflicts.extend(parse_relations(&field(&self.breaks)));

        let mut package = Package::new(self.package, architecture, version);
        package.multi_arch = self
            .multi_arch
            .as_deref()
            .and_then(|m| m.parse().ok())
            .unwrap_or(MultiArchType::None);
        package.depends = depends;
        package.conflicts = conflicts;
        package.replaces = parse_relations(&field(&self.replaces));
        package.provides = relation_names(&field(&self.provides));
        package.recommends = relation_names(&field(&self.recommends));
        package.suggests = relation_names(&field(&self.suggests));
        Some(package)
    }
}

/// Split into stanzas, keeping only index fields and their continuation lines
fn split_stanzas(content: &str) -> Vec<String> {
    let mut stanzas = Vec::new();
    let mut current = String::new();
    let mut keep_continuation = false;

    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                stanzas.push(std::mem::take(&mut current));
            }
            keep_continuation = false;
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            if keep_continuation {
                current.push_str(line);
                current.push('\n');
            }
            continue;
        }

        let field = line.split_once(':').map(|(f, _)| f.trim()).unwrap_or("");
        keep_continuation = INDEX_FIELDS.contains(&field);
        if keep_continuation {
            current.push_str(line);
            current.push('\n');
        }
    }

    if !current.is_empty() {
        stanzas.push(current);
    }

    stanzas
}

fn parse_stanzas(content: &str) -> Vec<StanzaEntry> {
    split_stanzas(content)
        .par_iter()
        .filter_map(|stanza| match rfc822_like::from_str::<Vec<StanzaEntry>>(stanza) {
            Ok(entries) => entries.into_iter().next(),
            Err(e) => {
                warn!("Skipping malformed stanza: {}", e);
                None
            }
        })
        .collect()
}

/// Installed packages from a dpkg status file
///
/// Each result has its installed version set and carries the installed
/// entry's relationships.
pub fn parse_status(content: &str) -> Vec<Package> {
    let packages: Vec<Package> = parse_stanzas(content)
        .into_iter()
        .filter(StanzaEntry::is_installed)
        .filter_map(StanzaEntry::into_package)
        .map(|mut p| {
            p.installed_version = Some(p.version.clone());
            p
        })
        .collect();

    debug!("Parsed {} installed packages from status file", packages.len());
    packages
}

/// Available packages from an apt `Packages` list
pub fn parse_packages_list(content: &str) -> Vec<Package> {
    parse_stanzas(content)
        .into_iter()
        .filter_map(StanzaEntry::into_package)
        .collect()
}

/// Combine installed and available entries into one entry per `name:arch`
///
/// The candidate version is the highest one seen, the installed one included.
/// Relationships come from the installed entry when there is one, otherwise
/// from the highest available entry.
pub fn merge_sources(installed: Vec<Package>, available: Vec<Package>) -> Vec<Package> {
    let mut candidates: HashMap<String, Package> = HashMap::new();
    for package in available {
        let key = package.qualified_name();
        match candidates.get(&key) {
            Some(existing) if compare_versions(&existing.version, &package.version) != Ordering::Less => {}
            _ => {
                candidates.insert(key, package);
            }
        }
    }

    for mut package in installed {
        if let Some(candidate) = candidates.remove(&package.qualified_name())
            && compare_versions(&candidate.version, &package.version) == Ordering::Greater
        {
            package.version = candidate.version;
        }
        candidates.insert(package.qualified_name(), package);
    }

    candidates.into_values().collect()
}
