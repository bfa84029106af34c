// src/backend/mod.rs

//! System package database
//!
//! The resolver only ever reads the database through `PackageDatabase`.
//! `PackageIndex` is the in-memory implementation every backend builds on;
//! `AptBackend` fills one from the dpkg status file and the apt lists.

pub mod apt;
pub mod future;
pub mod index;
pub mod sources;

pub use apt::AptBackend;
pub use future::BackendFuture;
pub use index::PackageIndex;

use crate::error::Result;
use crate::packages::Package;

/// Read access to installed and available packages
pub trait PackageDatabase: Send + Sync {
    /// Look up `name:arch`, or `name` for the native architecture
    ///
    /// Architecture `all` packages answer to every qualifier.
    fn package(&self, name: &str) -> Option<&Package>;

    /// Every known package, ordered by name then architecture
    fn packages(&self) -> &[Package];

    /// Architectures dpkg accepts, native first
    fn architectures(&self) -> &[String];

    /// Re-read the underlying system database
    fn reload_cache(&mut self) -> Result<()>;

    fn native_architecture(&self) -> &str {
        self.architectures().first().map(String::as_str).unwrap_or("")
    }

    /// Installed packages that declare at least one conflict
    fn installed_packages_with_conflicts(&self) -> Vec<&Package> {
        self.packages()
            .iter()
            .filter(|p| p.is_installed() && !p.conflicts.is_empty())
            .collect()
    }

    /// Packages whose Provides lists `name`
    fn providers(&self, name: &str) -> Vec<&Package> {
        self.packages()
            .iter()
            .filter(|p| p.provides.iter().any(|v| v == name))
            .collect()
    }
}
