// src/manager/links.rs

//! Symbolic links for archives whose paths are unsafe to hand to installers
//!
//! Package managers and shell-based helpers choke on paths with spaces or
//! shell metacharacters. Such archives are exposed under a clean name in a
//! private temporary directory that is removed with the manager.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Does `path` contain characters an installer command line could misread?
pub fn is_unsafe_path(path: &Path) -> bool {
    path.to_string_lossy()
        .chars()
        .any(|c| matches!(c, ' ' | '&' | ';' | '|' | '`'))
}

/// Lazily created directory of links
#[derive(Debug, Default)]
pub struct SymbolicLinks {
    dir: Option<TempDir>,
}

impl SymbolicLinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link `target` as `name`, or `name_1`, `name_2`... when taken
    pub fn link(&mut self, target: &Path, name: &str) -> Result<PathBuf> {
        let dir = match &self.dir {
            Some(dir) => dir.path().to_path_buf(),
            None => {
                let created = tempfile::Builder::new().prefix("deb-installer-").tempdir()?;
                let path = created.path().to_path_buf();
                self.dir = Some(created);
                path
            }
        };

        let mut link = dir.join(name);
        let mut count = 1;
        while link.symlink_metadata().is_ok() {
            let renamed = format!("{}_{}", name, count);
            warn!("{} already linked, using {}", name, renamed);
            link = dir.join(renamed);
            count += 1;
        }

        std::os::unix::fs::symlink(target, &link)?;
        debug!("Linked {} -> {}", link.display(), target.display());
        Ok(link)
    }

    /// The link directory, once something has been linked
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsafe_paths() {
        assert!(is_unsafe_path(Path::new("/home/user/My Downloads/app.deb")));
        assert!(is_unsafe_path(Path::new("/tmp/a&b.deb")));
        assert!(is_unsafe_path(Path::new("/tmp/a;rm.deb")));
        assert!(is_unsafe_path(Path::new("/tmp/a|b.deb")));
        assert!(is_unsafe_path(Path::new("/tmp/`id`.deb")));
        assert!(!is_unsafe_path(Path::new("/tmp/app_1.0_amd64.deb")));
    }

    #[test]
    fn test_links_get_unique_names() {
        let source = tempfile::tempdir().unwrap();
        let target = source.path().join("my app.deb");
        std::fs::write(&target, b"deb").unwrap();

        let mut links = SymbolicLinks::new();
        let first = links.link(&target, "app").unwrap();
        let second = links.link(&target, "app").unwrap();
        let third = links.link(&target, "app").unwrap();

        assert_eq!(first.file_name().unwrap(), "app");
        assert_eq!(second.file_name().unwrap(), "app_1");
        assert_eq!(third.file_name().unwrap(), "app_2");
        assert_eq!(std::fs::read(&second).unwrap(), b"deb");
    }

    #[test]
    fn test_directory_removed_on_drop() {
        let source = tempfile::tempdir().unwrap();
        let target = source.path().join("a b.deb");
        std::fs::write(&target, b"deb").unwrap();

        let mut links = SymbolicLinks::new();
        links.link(&target, "ab").unwrap();
        let dir = links.dir().unwrap().to_path_buf();
        assert!(dir.exists());

        drop(links);
        assert!(!dir.exists());
        assert!(target.exists());
    }
}
