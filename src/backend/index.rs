// src/backend/index.rs

//! In-memory package index

use super::PackageDatabase;
use crate::error::Result;
use crate::packages::Package;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Packages keyed by `name:arch`, with derived reverse dependencies
#[derive(Debug, Clone, Default)]
pub struct PackageIndex {
    packages: Vec<Package>,
    by_qualified: HashMap<String, usize>,
    architectures: Vec<String>,
}

impl PackageIndex {
    /// Build an index; the first architecture is the native one
    ///
    /// Duplicate `name:arch` entries keep the first occurrence.
    pub fn new(architectures: Vec<String>, mut packages: Vec<Package>) -> Self {
        packages.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.architecture.cmp(&b.architecture))
        });
        packages.dedup_by(|next, kept| next.name == kept.name && next.architecture == kept.architecture);

        Self::fill_required_by(&mut packages);

        let by_qualified = packages
            .iter()
            .enumerate()
            .map(|(i, p)| (p.qualified_name(), i))
            .collect();

        debug!(
            "Indexed {} packages for architectures {:?}",
            packages.len(),
            architectures
        );

        Self {
            packages,
            by_qualified,
            architectures,
        }
    }

    /// Reverse edges of Depends, Recommends and Suggests, by package name
    fn fill_required_by(packages: &mut [Package]) {
        let mut required_by: HashMap<String, BTreeSet<String>> = HashMap::new();

        for p in packages.iter() {
            let names = p
                .depends
                .iter()
                .flatten()
                .map(|dep| dep.name.as_str())
                .chain(p.recommends.iter().map(String::as_str))
                .chain(p.suggests.iter().map(String::as_str));

            for name in names {
                if name != p.name {
                    required_by
                        .entry(name.to_string())
                        .or_default()
                        .insert(p.name.clone());
                }
            }
        }

        for p in packages.iter_mut() {
            p.required_by = required_by
                .get(&p.name)
                .map(|names| names.iter().cloned().collect())
                .unwrap_or_default();
        }
    }

    /// Insert or replace a package and recompute derived data
    pub fn upsert(&mut self, package: Package) {
        let mut packages = std::mem::take(&mut self.packages);
        packages.retain(|p| !(p.name == package.name && p.architecture == package.architecture));
        packages.push(package);
        *self = Self::new(std::mem::take(&mut self.architectures), packages);
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    fn lookup(&self, name: &str, arch: &str) -> Option<&Package> {
        self.by_qualified
            .get(&format!("{}:{}", name, arch))
            .map(|&i| &self.packages[i])
    }
}

impl PackageDatabase for PackageIndex {
    fn package(&self, name: &str) -> Option<&Package> {
        match name.split_once(':') {
            Some((base, arch)) if !matches!(arch, "any" | "native") => {
                self.lookup(base, arch).or_else(|| self.lookup(base, "all"))
            }
            Some((base, _)) => self
                .lookup(base, self.native_architecture())
                .or_else(|| self.lookup(base, "all")),
            None => self
                .lookup(name, self.native_architecture())
                .or_else(|| self.lookup(name, "all")),
        }
    }

    fn packages(&self) -> &[Package] {
        &self.packages
    }

    fn architectures(&self) -> &[String] {
        &self.architectures
    }

    fn reload_cache(&mut self) -> Result<()> {
        Ok(())
    }
}
