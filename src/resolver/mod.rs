// src/resolver/mod.rs

//! Dependency and conflict resolution
//!
//! A `Resolver` is a cheap, read-only view over a package database. All
//! per-request state lives in the `ChosenSet` passed in by the caller, so
//! several resolutions can run concurrently against the same database.

pub mod candidates;
pub mod conflict;
pub mod depends;
pub mod reverse;
pub mod status;

pub use conflict::{ConflictResult, InstalledConflicts};
pub use depends::ChosenSet;
pub use status::{DependsStatus, PackageDependsStatus, combine_and, combine_or};

use crate::backend::PackageDatabase;
use crate::packages::{Package, multiarch::resolve_multi_arch_annotation};
use tracing::debug;

/// Resolution queries over one database snapshot
pub struct Resolver<'a, D: PackageDatabase + ?Sized> {
    db: &'a D,
    installed_conflicts: &'a InstalledConflicts,
}

impl<'a, D: PackageDatabase + ?Sized> Resolver<'a, D> {
    pub fn new(db: &'a D, installed_conflicts: &'a InstalledConflicts) -> Self {
        Self {
            db,
            installed_conflicts,
        }
    }

    pub fn database(&self) -> &'a D {
        self.db
    }

    /// Find the package a constraint on `name` refers to
    ///
    /// Tries the annotated or same-architecture entry, then the unqualified
    /// name, then every supported architecture, and finally the first
    /// package providing `name` as a virtual package.
    pub fn package_with_arch(&self, name: &str, arch: &str, annotation: &str) -> Option<&'a Package> {
        if let Some(package) = self.lookup_real(name, arch, annotation) {
            return Some(package);
        }

        debug!("Checking virtual package providers for {} ({}{})", name, arch, annotation);
        let provider = self
            .db
            .packages()
            .iter()
            .find(|p| p.name != name && p.provides.iter().any(|v| v == name))?;

        Some(self.lookup_real(&provider.name, arch, annotation).unwrap_or(provider))
    }

    fn lookup_real(&self, name: &str, arch: &str, annotation: &str) -> Option<&'a Package> {
        let qualifier = resolve_multi_arch_annotation(annotation, arch, None);
        self.db
            .package(&format!("{}{}", name, qualifier))
            .or_else(|| self.db.package(name))
            .or_else(|| {
                self.db
                    .architectures()
                    .iter()
                    .find_map(|a| self.db.package(&format!("{}:{}", name, a)))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PackageIndex;

    fn index() -> PackageIndex {
        PackageIndex::new(
            vec!["amd64".to_string(), "i386".to_string()],
            vec![
                Package::new("libfoo", "amd64", "1.0"),
                Package::new("libfoo", "i386", "1.0"),
                Package::new("only32", "i386", "1.0"),
                Package::new("postfix", "amd64", "3.0").with_provides("mail-transport-agent"),
                Package::new("exim4", "amd64", "4.0").with_provides("mail-transport-agent"),
            ],
        )
    }

    #[test]
    fn test_lookup_order() {
        let index = index();
        let cache = InstalledConflicts::default();
        let resolver = Resolver::new(&index, &cache);

        let p = resolver.package_with_arch("libfoo", "i386", "").unwrap();
        assert_eq!(p.architecture, "i386");

        let p = resolver.package_with_arch("libfoo", "i386", "any").unwrap();
        assert_eq!(p.architecture, "amd64");

        let p = resolver.package_with_arch("only32", "amd64", "").unwrap();
        assert_eq!(p.architecture, "i386");

        assert!(resolver.package_with_arch("nothing", "amd64", "").is_none());
    }

    #[test]
    fn test_virtual_provider_fallback() {
        let index = index();
        let cache = InstalledConflicts::default();
        let resolver = Resolver::new(&index, &cache);

        // Providers are searched in index order
        let p = resolver.package_with_arch("mail-transport-agent", "amd64", "").unwrap();
        assert_eq!(p.name, "exim4");
    }
}
