// src/manager/wine.rs

//! Wine application detection
//!
//! Wine applications depend on a large, fragile runtime stack. When any part
//! of it is missing they are never offered as `Available`; instead the whole
//! dependency list is installed up front by the privileged helper.

use crate::backend::PackageDatabase;
use crate::packages::DependencyGroup;
use crate::resolver::Resolver;

/// Installed as a bare name; it only exists for the native architecture
const ARCH_LESS_DEPENDENCIES: &[&str] = &["deepin-elf-verify"];

/// Dependencies to hand to the helper for one candidate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WineDepends {
    /// `name:arch` entries for every dependency the database knows
    pub packages: Vec<String>,
    pub is_wine_application: bool,
}

/// Work out whether a candidate is a Wine application and what it needs
pub fn wine_depends<D: PackageDatabase + ?Sized>(
    resolver: &Resolver<'_, D>,
    arch: &str,
    depends: &[DependencyGroup],
    markers: &[String],
) -> WineDepends {
    let mut result = WineDepends::default();

    for dep in depends.iter().flatten() {
        let Some(package) = resolver.package_with_arch(&dep.name, arch, "") else {
            continue;
        };

        if ARCH_LESS_DEPENDENCIES.contains(&package.name.as_str()) {
            result.packages.push(package.name.clone());
        } else {
            result.packages.push(package.qualified_name());
        }

        if markers.iter().any(|marker| dep.name.contains(marker.as_str())) {
            result.is_wine_application = true;
        }
    }

    result
}

/// A dependency install the manager wants performed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependsInstallRequest {
    /// Candidate that triggered the request
    pub index: usize,
    pub packages: Vec<String>,
    /// The dependency that was found missing
    pub broken: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PackageIndex;
    use crate::packages::{Package, parse_relations};
    use crate::resolver::InstalledConflicts;

    fn markers() -> Vec<String> {
        vec!["deepin-wine".to_string()]
    }

    #[test]
    fn test_wine_application_detected() {
        let db = PackageIndex::new(
            vec!["amd64".to_string(), "i386".to_string()],
            vec![
                Package::new("deepin-wine6-stable", "i386", "6.0"),
                Package::new("deepin-elf-verify", "amd64", "1.0"),
                Package::new("libc6", "amd64", "2.36").with_installed("2.36"),
            ],
        );
        let cache = InstalledConflicts::default();
        let resolver = Resolver::new(&db, &cache);

        let result = wine_depends(
            &resolver,
            "i386",
            &parse_relations("deepin-wine6-stable, deepin-elf-verify, libc6, ghost"),
            &markers(),
        );
        assert!(result.is_wine_application);
        assert_eq!(
            result.packages,
            vec!["deepin-wine6-stable:i386", "deepin-elf-verify", "libc6:amd64"]
        );
    }

    #[test]
    fn test_unknown_marker_dependency_ignored() {
        let db = PackageIndex::new(vec!["amd64".to_string()], Vec::new());
        let cache = InstalledConflicts::default();
        let resolver = Resolver::new(&db, &cache);

        // Markers only count for dependencies the database knows
        let result = wine_depends(&resolver, "amd64", &parse_relations("deepin-wine"), &markers());
        assert!(!result.is_wine_application);
        assert!(result.packages.is_empty());
    }
}
