// src/resolver/conflict.rs

//! Conflict checking
//!
//! Two directions are checked. A candidate's own Conflicts are matched
//! against installed packages (honoring its Replaces and pending upgrades),
//! and installed packages' Conflicts are matched against the candidate.

use super::Resolver;
use crate::backend::PackageDatabase;
use crate::packages::{Dependency, DependencyGroup, PackageRelations, multiarch::is_arch_matches};
use crate::version::{compare_versions, dependency_version_match};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Outcome of a conflict check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictResult {
    Ok,
    /// Name of the package the candidate conflicts with
    Err(String),
}

impl ConflictResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, ConflictResult::Ok)
    }

    /// The conflicting package, if any
    pub fn offender(&self) -> Option<&str> {
        match self {
            ConflictResult::Ok => None,
            ConflictResult::Err(name) => Some(name),
        }
    }
}

/// Conflicts declared by installed packages, as `(owner, constraint)` pairs
///
/// Built on first use and kept until `invalidate()`, which the batch manager
/// calls whenever the database is reloaded.
#[derive(Debug, Default)]
pub struct InstalledConflicts {
    entries: OnceLock<Vec<(String, Dependency)>>,
}

impl InstalledConflicts {
    pub fn get_or_build<D: PackageDatabase + ?Sized>(&self, db: &D) -> &[(String, Dependency)] {
        self.entries.get_or_init(|| {
            let entries: Vec<(String, Dependency)> = db
                .installed_packages_with_conflicts()
                .into_iter()
                .flat_map(|p| {
                    p.conflicts
                        .iter()
                        .flatten()
                        .map(move |conflict| (p.name.clone(), conflict.clone()))
                })
                .collect();
            debug!("Collected {} conflicts declared by installed packages", entries.len());
            entries
        })
    }

    pub fn invalidate(&mut self) {
        self.entries = OnceLock::new();
    }

    pub fn is_built(&self) -> bool {
        self.entries.get().is_some()
    }
}

impl<'a, D: PackageDatabase + ?Sized> Resolver<'a, D> {
    /// Would a package with these Conflicts and Replaces clash with the system?
    pub fn check_conflict(
        &self,
        arch: &str,
        conflicts: &[DependencyGroup],
        replaces: &[DependencyGroup],
    ) -> ConflictResult {
        for conflict in conflicts.iter().flatten() {
            let Some(p) = self.package_with_arch(&conflict.name, arch, &conflict.multi_arch_annotation) else {
                continue;
            };
            let Some(installed_version) = p.installed_version.as_deref() else {
                continue;
            };

            if !is_arch_matches(arch, &p.architecture) {
                debug!(
                    "Conflicting package installed for another architecture: {} {} (target {})",
                    p.name, p.architecture, arch
                );
                return ConflictResult::Err(conflict.name.clone());
            }

            if !conflict.is_satisfied_by(installed_version) {
                continue;
            }

            // The pending upgrade moves the installed package out of range
            if !conflict.is_satisfied_by(&p.version) {
                continue;
            }

            let replaced = replaces
                .iter()
                .flatten()
                .any(|replace| replace.name == conflict.name && replace.is_satisfied_by(installed_version));
            if replaced {
                debug!("Conflict with {} cancelled by Replaces", conflict.name);
                continue;
            }

            warn!(
                "Conflicting package installed: {}:{} {} (conflict {})",
                p.name, p.architecture, installed_version, conflict
            );
            return ConflictResult::Err(conflict.name.clone());
        }

        ConflictResult::Ok
    }

    /// Does any installed package declare a conflict against this candidate?
    pub fn check_installed_conflict(&self, name: &str, version: &str, arch: &str) -> ConflictResult {
        for (owner, conflict) in self.installed_conflicts.get_or_build(self.db) {
            // A package replacing its own installed version is exempt
            if conflict.name != name || owner == name {
                continue;
            }

            let annotation = conflict.multi_arch_annotation.as_str();
            if !annotation.is_empty() && annotation != arch && annotation != "any" && annotation != "native" {
                continue;
            }

            if conflict.version.is_empty()
                || dependency_version_match(compare_versions(version, &conflict.version), conflict.relation)
            {
                debug!("Installed package {} conflicts with {} {}", owner, name, version);
                return ConflictResult::Err(owner.clone());
            }
        }

        ConflictResult::Ok
    }

    /// Both directions for one package: installed conflicts first, then its own
    pub fn check_package_conflict<P: PackageRelations + ?Sized>(&self, arch: &str, package: &P) -> ConflictResult {
        let installed = self.check_installed_conflict(package.name(), package.version(), package.architecture());
        if !installed.is_ok() {
            return installed;
        }
        self.check_conflict(arch, package.conflicts(), package.replaces())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PackageIndex;
    use crate::packages::{Package, parse_relations};

    fn index(packages: Vec<Package>) -> PackageIndex {
        PackageIndex::new(vec!["amd64".to_string(), "i386".to_string()], packages)
    }

    #[test]
    fn test_no_conflict_when_not_installed() {
        let db = index(vec![Package::new("foo", "amd64", "1.0")]);
        let cache = InstalledConflicts::default();
        let resolver = Resolver::new(&db, &cache);

        let result = resolver.check_conflict("amd64", &parse_relations("foo"), &[]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_installed_conflict_detected() {
        let db = index(vec![Package::new("foo", "amd64", "1.0").with_installed("1.0")]);
        let cache = InstalledConflicts::default();
        let resolver = Resolver::new(&db, &cache);

        let result = resolver.check_conflict("amd64", &parse_relations("foo (<< 2.0)"), &[]);
        assert_eq!(result, ConflictResult::Err("foo".to_string()));
        assert_eq!(result.offender(), Some("foo"));
    }

    #[test]
    fn test_version_out_of_range() {
        let db = index(vec![Package::new("foo", "amd64", "3.0").with_installed("3.0")]);
        let cache = InstalledConflicts::default();
        let resolver = Resolver::new(&db, &cache);

        assert!(resolver
            .check_conflict("amd64", &parse_relations("foo (<< 2.0)"), &[])
            .is_ok());
    }

    #[test]
    fn test_pending_upgrade_resolves_conflict() {
        let db = index(vec![Package::new("foo", "amd64", "2.5").with_installed("1.0")]);
        let cache = InstalledConflicts::default();
        let resolver = Resolver::new(&db, &cache);

        assert!(resolver
            .check_conflict("amd64", &parse_relations("foo (<< 2.0)"), &[])
            .is_ok());
    }

    #[test]
    fn test_replaces_cancels_conflict() {
        let db = index(vec![Package::new("foo", "amd64", "1.0").with_installed("1.0")]);
        let cache = InstalledConflicts::default();
        let resolver = Resolver::new(&db, &cache);

        let conflicts = parse_relations("foo");
        assert!(resolver
            .check_conflict("amd64", &conflicts, &parse_relations("foo (<= 1.0)"))
            .is_ok());

        // A replace rule that doesn't cover the installed version leaves the conflict
        assert!(!resolver
            .check_conflict("amd64", &conflicts, &parse_relations("foo (<< 1.0)"))
            .is_ok());
    }

    #[test]
    fn test_architecture_mismatch_conflicts() {
        let db = index(vec![Package::new("foo", "i386", "1.0").with_installed("1.0")]);
        let cache = InstalledConflicts::default();
        let resolver = Resolver::new(&db, &cache);

        // Even a version range that excludes the installed version
        let result = resolver.check_conflict("amd64", &parse_relations("foo (>> 5.0)"), &[]);
        assert_eq!(result, ConflictResult::Err("foo".to_string()));

        // Architecture `all` matches everything
        let db = index(vec![Package::new("bar", "all", "1.0").with_installed("1.0")]);
        let resolver = Resolver::new(&db, &cache);
        assert!(resolver
            .check_conflict("amd64", &parse_relations("bar (>> 5.0)"), &[])
            .is_ok());
    }

    #[test]
    fn test_installed_conflict_against_candidate() {
        let db = index(vec![
            Package::new("guard", "amd64", "1.0")
                .with_installed("1.0")
                .with_conflicts("candidate (<< 2.0), other:i386"),
        ]);
        let cache = InstalledConflicts::default();
        let resolver = Resolver::new(&db, &cache);

        assert_eq!(
            resolver.check_installed_conflict("candidate", "1.5", "amd64"),
            ConflictResult::Err("guard".to_string())
        );
        assert!(resolver.check_installed_conflict("candidate", "2.0", "amd64").is_ok());

        // Architecture-qualified conflicts only apply to that architecture
        assert!(resolver.check_installed_conflict("other", "1.0", "amd64").is_ok());
        assert!(!resolver.check_installed_conflict("other", "1.0", "i386").is_ok());
        assert!(cache.is_built());
    }

    #[test]
    fn test_own_conflicts_ignored_for_upgrade() {
        let db = index(vec![
            Package::new("foo", "amd64", "1.0")
                .with_installed("1.0")
                .with_conflicts("foo (<< 1.0)"),
        ]);
        let cache = InstalledConflicts::default();
        let resolver = Resolver::new(&db, &cache);
        assert!(resolver.check_installed_conflict("foo", "0.5", "amd64").is_ok());
    }

    #[test]
    fn test_invalidate_rebuilds() {
        let db = index(vec![Package::new("a", "amd64", "1").with_installed("1").with_conflicts("b")]);
        let mut cache = InstalledConflicts::default();
        assert_eq!(cache.get_or_build(&db).len(), 1);

        cache.invalidate();
        assert!(!cache.is_built());

        let db = index(Vec::new());
        assert!(cache.get_or_build(&db).is_empty());
    }
}
