// src/resolver/candidates.rs

//! Choosing which packages an `Available` candidate would pull in

use super::Resolver;
use super::depends::ChosenSet;
use crate::backend::PackageDatabase;
use crate::packages::{Dependency, DependencyGroup, multiarch::resolve_multi_arch_annotation};
use std::collections::BTreeSet;
use tracing::debug;

impl<'a, D: PackageDatabase + ?Sized> Resolver<'a, D> {
    /// Collect `name:arch` entries to install or upgrade for `depends`
    ///
    /// Within each group the first alternative that needs no work, or can be
    /// installed without conflicts and without breaking its own dependencies,
    /// is taken; its dependencies are then walked the same way.
    pub fn candidate_choose(&self, chosen: &mut BTreeSet<String>, arch: &str, depends: &[DependencyGroup]) {
        for group in depends {
            self.candidate_choose_group(chosen, arch, group);
        }
    }

    fn candidate_choose_group(&self, chosen: &mut BTreeSet<String>, arch: &str, group: &[Dependency]) {
        for dep in group {
            let Some(package) = self.package_with_arch(&dep.name, arch, &dep.multi_arch_annotation) else {
                continue;
            };

            let chosen_name = format!(
                "{}{}",
                package.name,
                resolve_multi_arch_annotation("", &package.architecture, None)
            );
            if chosen.contains(&chosen_name) {
                break;
            }

            if let Some(installed_version) = package.installed_version.as_deref()
                && dep.is_satisfied_by(installed_version)
            {
                // The group is already satisfied
                break;
            }

            if !self
                .check_conflict(arch, &package.conflicts, &package.replaces)
                .is_ok()
            {
                debug!("Skipping {} for install: conflicts", chosen_name);
                continue;
            }

            let mut upgrade_set: ChosenSet = chosen.iter().cloned().collect();
            upgrade_set.insert(&chosen_name);
            if self
                .check_depends(&mut upgrade_set, &package.architecture, &package.depends)
                .is_break()
            {
                debug!("Skipping {} for install: its dependencies break", chosen_name);
                continue;
            }

            chosen.insert(chosen_name);
            self.candidate_choose(chosen, arch, &package.depends);
            break;
        }
    }
}
