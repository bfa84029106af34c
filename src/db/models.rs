// src/db/models.rs

//! Row models for the index cache

use crate::error::Result;
use crate::packages::{DependencyGroup, MultiArchType, Package};
use rusqlite::{Connection, Row, params};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Size and modification time of a file the index was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStamp {
    pub path: String,
    pub size: i64,
    /// Nanoseconds since the Unix epoch
    pub modified: i64,
}

impl SourceStamp {
    pub fn new(path: String, size: i64, modified: i64) -> Self {
        Self { path, size, modified }
    }

    /// Stamp a file on disk
    pub fn of_file(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let modified = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);

        Ok(Self {
            path: path.to_string_lossy().to_string(),
            size: metadata.len() as i64,
            modified,
        })
    }

    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO index_sources (path, size, modified) VALUES (?1, ?2, ?3)",
            params![&self.path, self.size, self.modified],
        )?;
        Ok(())
    }

    /// All stamps, ordered by path
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT path, size, modified FROM index_sources ORDER BY path")?;
        let stamps = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stamps)
    }

    pub fn delete_all(conn: &Connection) -> Result<()> {
        conn.execute("DELETE FROM index_sources", [])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            path: row.get(0)?,
            size: row.get(1)?,
            modified: row.get(2)?,
        })
    }
}

/// One cached `name:arch` entry
#[derive(Debug, Clone)]
pub struct PackageRow {
    pub id: Option<i64>,
    pub name: String,
    pub architecture: String,
    pub version: String,
    pub installed_version: Option<String>,
    pub multi_arch: String,
    pub depends: String,
    pub conflicts: String,
    pub replaces: String,
    pub provides: String,
    pub recommends: String,
    pub suggests: String,
}

const PACKAGE_COLUMNS: &str = "id, name, architecture, version, installed_version, multi_arch, \
     depends, conflicts, replaces, provides, recommends, suggests";

impl PackageRow {
    /// Encode a package, relationship fields as JSON
    pub fn from_package(package: &Package) -> Result<Self> {
        Ok(Self {
            id: None,
            name: package.name.clone(),
            architecture: package.architecture.clone(),
            version: package.version.clone(),
            installed_version: package.installed_version.clone(),
            multi_arch: package.multi_arch.as_str().to_string(),
            depends: serde_json::to_string(&package.depends)?,
            conflicts: serde_json::to_string(&package.conflicts)?,
            replaces: serde_json::to_string(&package.replaces)?,
            provides: serde_json::to_string(&package.provides)?,
            recommends: serde_json::to_string(&package.recommends)?,
            suggests: serde_json::to_string(&package.suggests)?,
        })
    }

    /// Decode back into a package; `required_by` is derived later by the index
    pub fn into_package(self) -> Result<Package> {
        let depends: Vec<DependencyGroup> = serde_json::from_str(&self.depends)?;
        let conflicts: Vec<DependencyGroup> = serde_json::from_str(&self.conflicts)?;
        let replaces: Vec<DependencyGroup> = serde_json::from_str(&self.replaces)?;

        let mut package = Package::new(self.name, self.architecture, self.version);
        package.installed_version = self.installed_version;
        package.multi_arch = self.multi_arch.parse().unwrap_or(MultiArchType::None);
        package.depends = depends;
        package.conflicts = conflicts;
        package.replaces = replaces;
        package.provides = serde_json::from_str(&self.provides)?;
        package.recommends = serde_json::from_str(&self.recommends)?;
        package.suggests = serde_json::from_str(&self.suggests)?;
        Ok(package)
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO packages (name, architecture, version, installed_version, multi_arch,
                                   depends, conflicts, replaces, provides, recommends, suggests)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                &self.name,
                &self.architecture,
                &self.version,
                &self.installed_version,
                &self.multi_arch,
                &self.depends,
                &self.conflicts,
                &self.replaces,
                &self.provides,
                &self.recommends,
                &self.suggests,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM packages WHERE name = ?1 ORDER BY architecture",
            PACKAGE_COLUMNS
        ))?;
        let rows = stmt
            .query_map([name], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM packages ORDER BY name, architecture",
            PACKAGE_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete_all(conn: &Connection) -> Result<()> {
        conn.execute("DELETE FROM packages", [])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            architecture: row.get(2)?,
            version: row.get(3)?,
            installed_version: row.get(4)?,
            multi_arch: row.get(5)?,
            depends: row.get(6)?,
            conflicts: row.get(7)?,
            replaces: row.get(8)?,
            provides: row.get(9)?,
            recommends: row.get(10)?,
            suggests: row.get(11)?,
        })
    }
}
