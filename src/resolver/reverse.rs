// src/resolver/reverse.rs

//! Reverse dependencies: what else goes away when a package is removed

use super::Resolver;
use crate::backend::PackageDatabase;
use crate::packages::Package;
use std::collections::{BTreeSet, VecDeque};

/// Packages that were renamed or split; removing the key also affects the value
const RENAMED_PACKAGES: &[(&str, &str)] = &[
    ("deepin-wine-plugin-virtual", "deepin-wine-helper"),
    ("deepin-wine32", "deepin-wine"),
];

fn renamed_to(name: &str) -> Option<&'static str> {
    RENAMED_PACKAGES
        .iter()
        .find(|(from, _)| *from == name)
        .map(|(_, to)| *to)
}

/// `p` depends on `name` only weakly
fn weakly_requires(p: &Package, name: &str) -> bool {
    p.recommends.iter().any(|r| r == name) || p.suggests.iter().any(|s| s == name)
}

impl<'a, D: PackageDatabase + ?Sized> Resolver<'a, D> {
    /// Installed packages that (transitively) depend on `package_name`
    ///
    /// Dependents that only recommend or suggest a package are not followed.
    /// The result is sorted and never contains `package_name` itself; an
    /// unknown package has no reverse dependencies.
    pub fn reverse_dependencies(&self, package_name: &str, arch: &str) -> Vec<String> {
        let Some(package) = self.package_with_arch(package_name, arch, "") else {
            return Vec::new();
        };

        let mut result = BTreeSet::from([package_name.to_string()]);
        let mut queue: VecDeque<String> = package
            .required_by
            .iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect();

        while let Some(item) = queue.pop_front() {
            if result.contains(&item) {
                continue;
            }

            let Some(p) = self.package_with_arch(&item, arch, "") else {
                continue;
            };
            if !p.is_installed() || weakly_requires(p, package_name) {
                continue;
            }

            result.insert(item.clone());

            if let Some(renamed) = renamed_to(&item) {
                queue.push_back(renamed.to_string());
            }

            for dependent in &p.required_by {
                if result.contains(dependent) || queue.contains(dependent) {
                    continue;
                }

                let sub = self.package_with_arch(dependent, arch, "");

                // Renamed applications are only reachable through their own dependents
                if let Some(sub) = sub {
                    for indirect in &sub.required_by {
                        let reachable = self
                            .package_with_arch(indirect, arch, "")
                            .is_some_and(|pkg| pkg.is_installed() && !weakly_requires(pkg, dependent));
                        if reachable {
                            queue.push_back(indirect.clone());
                        }
                    }
                }

                let Some(sub) = sub else {
                    continue;
                };
                if !sub.is_installed() || weakly_requires(sub, &item) {
                    continue;
                }
                queue.push_back(dependent.clone());
            }
        }

        result.remove(package_name);
        result.into_iter().collect()
    }
}
