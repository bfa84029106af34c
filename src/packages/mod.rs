// src/packages/mod.rs

//! Package metadata
//!
//! `Package` is the system database's view of one `name:arch` entry: the
//! candidate (mirror) version, the installed version if any, and the
//! relationship fields of whichever of the two is relevant to resolution.
//! `DebPackage` is the view of a local archive queued for installation.

pub mod deb;
pub mod multiarch;
pub mod relation;
pub mod traits;

pub use deb::DebPackage;
pub use multiarch::MultiArchType;
pub use relation::{Dependency, DependencyGroup, parse_relations, relation_names};
pub use traits::PackageRelations;

/// A `name:arch` entry of the system package database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub architecture: String,

    /// Candidate version available from the configured mirrors
    pub version: String,

    /// Version currently installed, if any
    pub installed_version: Option<String>,

    pub multi_arch: MultiArchType,
    pub depends: Vec<DependencyGroup>,
    pub conflicts: Vec<DependencyGroup>,
    pub replaces: Vec<DependencyGroup>,
    pub provides: Vec<String>,
    pub recommends: Vec<String>,
    pub suggests: Vec<String>,

    /// Names of packages whose Depends, Recommends or Suggests mention this one
    pub required_by: Vec<String>,
}

impl Package {
    /// Create an available, not installed package with no relationships
    pub fn new(name: impl Into<String>, architecture: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            architecture: architecture.into(),
            version: version.into(),
            installed_version: None,
            multi_arch: MultiArchType::None,
            depends: Vec::new(),
            conflicts: Vec::new(),
            replaces: Vec::new(),
            provides: Vec::new(),
            recommends: Vec::new(),
            suggests: Vec::new(),
            required_by: Vec::new(),
        }
    }

    pub fn with_installed(mut self, version: impl Into<String>) -> Self {
        self.installed_version = Some(version.into());
        self
    }

    pub fn with_multi_arch(mut self, multi_arch: MultiArchType) -> Self {
        self.multi_arch = multi_arch;
        self
    }

    /// Set Depends from control-file syntax
    pub fn with_depends(mut self, field: &str) -> Self {
        self.depends = parse_relations(field);
        self
    }

    pub fn with_conflicts(mut self, field: &str) -> Self {
        self.conflicts = parse_relations(field);
        self
    }

    pub fn with_replaces(mut self, field: &str) -> Self {
        self.replaces = parse_relations(field);
        self
    }

    pub fn with_provides(mut self, field: &str) -> Self {
        self.provides = relation_names(field);
        self
    }

    pub fn with_recommends(mut self, field: &str) -> Self {
        self.recommends = relation_names(field);
        self
    }

    pub fn with_suggests(mut self, field: &str) -> Self {
        self.suggests = relation_names(field);
        self
    }

    pub fn is_installed(&self) -> bool {
        self.installed_version.is_some()
    }

    /// Installed version, or empty when not installed
    pub fn installed_version(&self) -> &str {
        self.installed_version.as_deref().unwrap_or("")
    }

    /// `name:arch`
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.name, self.architecture)
    }

    /// Whether any dependency group mentions `name`
    pub fn depends_on(&self, name: &str) -> bool {
        self.depends.iter().flatten().any(|dep| dep.name == name)
    }
}

impl PackageRelations for Package {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn architecture(&self) -> &str {
        &self.architecture
    }

    fn depends(&self) -> &[DependencyGroup] {
        &self.depends
    }

    fn conflicts(&self) -> &[DependencyGroup] {
        &self.conflicts
    }

    fn replaces(&self) -> &[DependencyGroup] {
        &self.replaces
    }

    fn provides(&self) -> &[String] {
        &self.provides
    }
}
