// src/manager/denylist.rs

//! Administrator denylist of packages that may not be installed

use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// Package names blocked by policy
#[derive(Debug, Clone, Default)]
pub struct Denylist {
    names: HashSet<String>,
}

impl Denylist {
    /// Read the denylist file; a missing or unreadable file blocks nothing
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let denylist = Self::parse(&content);
                debug!("Loaded {} denylisted packages from {}", denylist.len(), path.display());
                denylist
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No denylist at {}", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("Failed to read denylist {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Comma-separated names; spaces and line breaks are ignored anywhere
    pub fn parse(content: &str) -> Self {
        let compact: String = content.chars().filter(|c| !matches!(c, ' ' | '\n' | '\r')).collect();
        let names = compact
            .split(',')
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        Self { names }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
