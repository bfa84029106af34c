// src/resolver/depends.rs

//! Recursive dependency resolution

use super::Resolver;
use super::status::{PackageDependsStatus, combine_and, combine_or};
use crate::backend::PackageDatabase;
use crate::packages::{Dependency, DependencyGroup, MultiArchType};
use std::collections::BTreeSet;
use tracing::debug;

/// Packages tentatively selected during one resolution pass
///
/// Guards against cycles and re-resolving the same package. Never shared
/// between concurrent resolutions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChosenSet {
    names: BTreeSet<String>,
}

impl ChosenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding just the candidate being resolved
    pub fn seeded(name: impl Into<String>) -> Self {
        let mut set = Self::new();
        set.insert(name);
        set
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.names.iter()
    }
}

impl FromIterator<String> for ChosenSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

impl<'a, D: PackageDatabase + ?Sized> Resolver<'a, D> {
    /// Resolve AND-ed dependency groups for a package of architecture `arch`
    pub fn check_depends(
        &self,
        chosen: &mut ChosenSet,
        arch: &str,
        depends: &[DependencyGroup],
    ) -> PackageDependsStatus {
        combine_and(depends.iter().map(|group| self.check_group(chosen, arch, group)))
    }

    /// Resolve one OR-group; the first satisfiable alternative wins
    pub fn check_group(&self, chosen: &mut ChosenSet, arch: &str, group: &[Dependency]) -> PackageDependsStatus {
        combine_or(group.iter().map(|dep| self.check_dependency(chosen, arch, dep)))
    }

    /// Resolve a single constraint
    pub fn check_dependency(&self, chosen: &mut ChosenSet, arch: &str, dep: &Dependency) -> PackageDependsStatus {
        let Some(p) = self.package_with_arch(&dep.name, arch, &dep.multi_arch_annotation) else {
            debug!("Depends break because package {} is not available", dep.name);
            return PackageDependsStatus::broken(&dep.name);
        };

        if let Some(installed_version) = p.installed_version.as_deref() {
            if dep.is_satisfied_by(installed_version) {
                return PackageDependsStatus::ok();
            }

            if p.version != installed_version && dep.is_satisfied_by(&p.version) {
                debug!(
                    "{}:{} available by upgrade from {} to {}",
                    p.name, p.architecture, installed_version, p.version
                );
                return PackageDependsStatus::available(&p.name);
            }

            debug!(
                "Depends break by {}:{}, installed version {} does not match {}",
                p.name, p.architecture, installed_version, dep
            );
            return PackageDependsStatus::broken(&p.name);
        }

        if !dep.is_satisfied_by(&p.version) {
            debug!(
                "Depends break by {}:{}, available version {} does not match {}",
                p.name, p.architecture, p.version, dep
            );
            return PackageDependsStatus::broken(&p.name);
        }

        if chosen.contains(&p.name) {
            return PackageDependsStatus::ok();
        }

        if p.multi_arch == MultiArchType::Same {
            for other_arch in self.db.architectures() {
                if *other_arch == p.architecture {
                    continue;
                }
                let installed_elsewhere = self
                    .db
                    .package(&format!("{}:{}", p.name, other_arch))
                    .is_some_and(|other| other.architecture != p.architecture && other.is_installed());
                if installed_elsewhere {
                    debug!(
                        "{} is installed for {} but {} is needed",
                        p.name, other_arch, p.architecture
                    );
                    return PackageDependsStatus::broken(p.qualified_name());
                }
            }
        }

        if !self.check_package_conflict(arch, p).is_ok() {
            debug!("{} conflicts with the system, looking for providers", p.name);

            for provider in self.db.providers(&p.name) {
                if provider.is_installed() {
                    debug!("Found an installed provider: {}", provider.name);
                    return PackageDependsStatus::ok();
                }
                if self.check_package_conflict(arch, provider).is_ok() {
                    debug!("Switching to provider {}", provider.name);
                    chosen.insert(&provider.name);
                    return PackageDependsStatus::ok();
                }
            }

            debug!("No usable provider for {}", p.name);
            return PackageDependsStatus::broken(&p.name);
        }

        chosen.insert(&p.name);
        let indirect = self.check_depends(chosen, &p.architecture, &p.depends);
        if indirect.is_break() {
            chosen.remove(&p.name);
            debug!(
                "Depends break by {}:{} through {}",
                p.name, p.architecture, indirect.package
            );
            return PackageDependsStatus::broken(&p.name);
        }

        PackageDependsStatus::available(&p.name)
    }
}
