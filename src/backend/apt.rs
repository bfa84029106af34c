// src/backend/apt.rs

//! System package database backed by dpkg and apt files

use super::index::PackageIndex;
use super::sources::{merge_sources, parse_packages_list, parse_status};
use super::PackageDatabase;
use crate::config::BackendConfig;
use crate::db::{self, models::{PackageRow, SourceStamp}};
use crate::error::{Error, Result};
use crate::packages::Package;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// The live dpkg/apt package database
pub struct AptBackend {
    config: BackendConfig,
    index: PackageIndex,
}

impl AptBackend {
    /// Read the system database, through the index cache when configured
    pub fn load(config: BackendConfig) -> Result<Self> {
        let index = Self::build_index(&config)?;
        Ok(Self { config, index })
    }

    pub fn index(&self) -> &PackageIndex {
        &self.index
    }

    fn build_index(config: &BackendConfig) -> Result<PackageIndex> {
        if !config.dpkg_status.exists() {
            return Err(Error::BackendInit(format!(
                "dpkg status file {} not found",
                config.dpkg_status.display()
            )));
        }

        let architectures = if config.architectures.is_empty() {
            Self::detect_architectures()?
        } else {
            config.architectures.clone()
        };

        let lists = Self::list_files(&config.apt_lists)?;

        let packages = match &config.index_cache {
            Some(cache) => {
                let mut sources = vec![config.dpkg_status.clone()];
                sources.extend(lists.iter().cloned());
                let mut stamps = sources
                    .iter()
                    .map(|path| SourceStamp::of_file(path))
                    .collect::<Result<Vec<_>>>()?;
                stamps.sort_by(|a, b| a.path.cmp(&b.path));

                match Self::load_through_cache(cache, &stamps, &config.dpkg_status, &lists) {
                    Ok(packages) => packages,
                    Err(e) => {
                        warn!("Index cache {} unusable ({}), reading sources directly", cache.display(), e);
                        Self::parse_sources(&config.dpkg_status, &lists)?
                    }
                }
            }
            None => Self::parse_sources(&config.dpkg_status, &lists)?,
        };

        Ok(PackageIndex::new(architectures, packages))
    }

    /// Native architecture first, then foreign ones
    fn detect_architectures() -> Result<Vec<String>> {
        let native = Command::new("dpkg")
            .arg("--print-architecture")
            .output()
            .map_err(|e| Error::BackendInit(format!("Failed to run dpkg: {}", e)))?;
        if !native.status.success() {
            return Err(Error::BackendInit(
                "dpkg --print-architecture failed".to_string(),
            ));
        }

        let mut architectures = vec![String::from_utf8_lossy(&native.stdout).trim().to_string()];

        match Command::new("dpkg").arg("--print-foreign-architectures").output() {
            Ok(foreign) if foreign.status.success() => {
                architectures.extend(
                    String::from_utf8_lossy(&foreign.stdout)
                        .split_whitespace()
                        .map(str::to_string),
                );
            }
            _ => warn!("Could not query foreign architectures, assuming none"),
        }

        debug!("Detected architectures: {:?}", architectures);
        Ok(architectures)
    }

    /// `*_Packages` files in the apt lists directory, sorted
    fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            warn!("apt lists directory {} not found, only installed packages are known", dir.display());
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_list = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with("_Packages"));
            if is_list && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn parse_sources(status: &Path, lists: &[PathBuf]) -> Result<Vec<Package>> {
        info!("Reading package database from {} and {} lists", status.display(), lists.len());

        let installed = parse_status(&fs::read_to_string(status)?);
        let available = lists
            .par_iter()
            .map(|path| fs::read_to_string(path).map(|content| parse_packages_list(&content)))
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();

        Ok(merge_sources(installed, available))
    }

    /// Load from the cache if every source stamp matches, else parse and refresh it
    fn load_through_cache(
        cache: &Path,
        stamps: &[SourceStamp],
        status: &Path,
        lists: &[PathBuf],
    ) -> Result<Vec<Package>> {
        let mut conn = db::init(cache)?;

        let stored = SourceStamp::list_all(&conn)?;
        if !stored.is_empty() && stored == stamps {
            let packages = PackageRow::list_all(&conn)?
                .into_iter()
                .map(PackageRow::into_package)
                .collect::<Result<Vec<_>>>()?;
            info!("Loaded {} packages from index cache", packages.len());
            return Ok(packages);
        }

        debug!("Index cache is stale, rebuilding");
        let packages = Self::parse_sources(status, lists)?;

        db::transaction(&mut conn, |tx| {
            PackageRow::delete_all(tx)?;
            SourceStamp::delete_all(tx)?;
            for package in &packages {
                PackageRow::from_package(package)?.insert(tx)?;
            }
            for stamp in stamps {
                stamp.insert(tx)?;
            }
            Ok(())
        })?;

        info!("Stored {} packages in index cache", packages.len());
        Ok(packages)
    }
}

impl PackageDatabase for AptBackend {
    fn package(&self, name: &str) -> Option<&Package> {
        self.index.package(name)
    }

    fn packages(&self) -> &[Package] {
        self.index.packages()
    }

    fn architectures(&self) -> &[String] {
        self.index.architectures()
    }

    fn reload_cache(&mut self) -> Result<()> {
        info!("Reloading package database");
        self.index = Self::build_index(&self.config)?;
        Ok(())
    }
}
