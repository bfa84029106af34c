// src/packages/traits.rs

//! Common traits for package metadata sources

use crate::packages::relation::DependencyGroup;

/// Identity and relationships shared by archive and database packages
///
/// Conflict checking works the same whether the candidate comes from a local
/// .deb or from the system index, so it is written against this trait.
pub trait PackageRelations {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Debian architecture (`amd64`, `i386`, `all`, ...)
    fn architecture(&self) -> &str;

    /// Hard dependencies, AND over OR-groups
    fn depends(&self) -> &[DependencyGroup];

    fn conflicts(&self) -> &[DependencyGroup];

    fn replaces(&self) -> &[DependencyGroup];

    /// Virtual package names
    fn provides(&self) -> &[String];
}
