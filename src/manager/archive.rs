// src/manager/archive.rs

//! Candidate archives queued for installation

use crate::error::Result;
use crate::packages::{DebPackage, PackageRelations, deb::sha256_file};
use std::path::{Path, PathBuf};

/// A local .deb the user asked to install
#[derive(Debug, Clone)]
pub struct CandidateArchive {
    path: PathBuf,
    install_path: PathBuf,
    hash: String,
    deb: DebPackage,
}

impl CandidateArchive {
    /// Read and hash an archive on disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let deb = DebPackage::parse(path)?;
        let hash = sha256_file(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            install_path: path.to_path_buf(),
            hash,
            deb,
        })
    }

    /// Build from control text and a precomputed content hash
    pub fn from_control(path: impl Into<PathBuf>, control: &str, hash: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let deb = DebPackage::from_control(path.clone(), control)?;
        Ok(Self {
            install_path: path.clone(),
            path,
            hash: hash.into(),
            deb,
        })
    }

    /// Where the user picked the file from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path handed to installers; a symbolic link when `path` is unsafe
    pub fn install_path(&self) -> &Path {
        &self.install_path
    }

    pub(crate) fn set_install_path(&mut self, path: PathBuf) {
        self.install_path = path;
    }

    /// SHA-256 of the archive contents
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn deb(&self) -> &DebPackage {
        &self.deb
    }

    pub fn name(&self) -> &str {
        self.deb.name()
    }

    pub fn version(&self) -> &str {
        self.deb.version()
    }

    pub fn architecture(&self) -> &str {
        self.deb.architecture()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_control() {
        let archive = CandidateArchive::from_control(
            "/tmp/app.deb",
            "Package: app\nVersion: 2.0\nArchitecture: all\nDepends: libfoo\n",
            "abc123",
        )
        .unwrap();

        assert_eq!(archive.name(), "app");
        assert_eq!(archive.version(), "2.0");
        assert_eq!(archive.architecture(), "all");
        assert_eq!(archive.hash(), "abc123");
        assert_eq!(archive.install_path(), Path::new("/tmp/app.deb"));
        assert_eq!(archive.deb().depends().len(), 1);
    }

    #[test]
    fn test_open_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.deb");
        std::fs::write(&path, b"garbage").unwrap();
        assert!(CandidateArchive::open(&path).is_err());
    }
}
