// src/packages/deb.rs

//! Debian package archive reader
//!
//! A .deb is an AR archive holding `debian-binary`, a `control.tar*` member and
//! a `data.tar*` member. Only the control member is read: the installer needs
//! the package's identity and relationships, never its payload.

use crate::error::{Error, Result};
use crate::packages::multiarch::MultiArchType;
use crate::packages::relation::{DependencyGroup, parse_relations, relation_names};
use crate::packages::traits::PackageRelations;
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::debug;
use xz2::read::XzDecoder;

/// Metadata read from a local .deb file
#[derive(Debug, Clone)]
pub struct DebPackage {
    path: PathBuf,
    name: String,
    version: String,
    architecture: String,
    description: Option<String>,
    maintainer: Option<String>,
    section: Option<String>,
    installed_size: Option<u64>,
    multi_arch: MultiArchType,
    depends: Vec<DependencyGroup>,
    conflicts: Vec<DependencyGroup>,
    replaces: Vec<DependencyGroup>,
    provides: Vec<String>,
    recommends: Vec<String>,
    suggests: Vec<String>,
}

/// Parsed control file fields
#[derive(Default)]
struct ControlInfo {
    name: Option<String>,
    version: Option<String>,
    architecture: Option<String>,
    description: Option<String>,
    maintainer: Option<String>,
    section: Option<String>,
    installed_size: Option<u64>,
    multi_arch: MultiArchType,
    pre_depends: Vec<DependencyGroup>,
    depends: Vec<DependencyGroup>,
    conflicts: Vec<DependencyGroup>,
    breaks: Vec<DependencyGroup>,
    replaces: Vec<DependencyGroup>,
    provides: Vec<String>,
    recommends: Vec<String>,
    suggests: Vec<String>,
}

impl DebPackage {
    /// Read the control member of a .deb file
    pub fn parse(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Parsing Debian package: {}", path.display());

        let control = Self::extract_control_member(path, "control")?
            .ok_or_else(|| Error::ParseError("control.tar has no control file".to_string()))?;
        let package = Self::build(path.to_path_buf(), Self::parse_control(&control))?;

        debug!(
            "Parsed DEB package: {} version {} ({}, {} dependency groups)",
            package.name,
            package.version,
            package.architecture,
            package.depends.len()
        );
        Ok(package)
    }

    /// Build a package from control file text, without an archive on disk
    pub fn from_control(path: impl Into<PathBuf>, control: &str) -> Result<Self> {
        Self::build(path.into(), Self::parse_control(control))
    }

    fn build(path: PathBuf, control: ControlInfo) -> Result<Self> {
        let name = control
            .name
            .ok_or_else(|| Error::ParseError("Package name not found in control file".to_string()))?;
        let version = control
            .version
            .ok_or_else(|| Error::ParseError(format!("Package version not found in control file of {}", name)))?;
        let architecture = control
            .architecture
            .ok_or_else(|| Error::ParseError(format!("Package architecture not found in control file of {}", name)))?;

        let mut depends = control.pre_depends;
        depends.extend(control.depends);
        let mut conflicts = control.conflicts;
        conflicts.extend(control.breaks);

        Ok(Self {
            path,
            name,
            version,
            architecture,
            description: control.description,
            maintainer: control.maintainer,
            section: control.section,
            installed_size: control.installed_size,
            multi_arch: control.multi_arch,
            depends,
            conflicts,
            replaces: control.replaces,
            provides: control.provides,
            recommends: control.recommends,
            suggests: control.suggests,
        })
    }

    /// Parse a control stanza, folding continuation lines into their field
    fn parse_control(control_content: &str) -> ControlInfo {
        let mut info = ControlInfo::default();

        let mut current_field = String::new();
        let mut current_value = String::new();

        for line in control_content.lines() {
            if line.starts_with(' ') || line.starts_with('\t') {
                if !current_field.is_empty() {
                    current_value.push('\n');
                    current_value.push_str(line.trim());
                }
            } else if let Some((field, value)) = line.split_once(':') {
                if !current_field.is_empty() {
                    Self::apply_control_field(&mut info, &current_field, &current_value);
                }
                current_field = field.trim().to_string();
                current_value = value.trim().to_string();
            }
        }

        if !current_field.is_empty() {
            Self::apply_control_field(&mut info, &current_field, &current_value);
        }

        info
    }

    fn apply_control_field(info: &mut ControlInfo, field: &str, value: &str) {
        match field {
            "Package" => info.name = Some(value.to_string()),
            "Version" => info.version = Some(value.to_string()),
            "Architecture" => info.architecture = Some(value.to_string()),
            "Description" => info.description = value.lines().next().map(str::to_string),
            "Maintainer" => info.maintainer = Some(value.to_string()),
            "Section" => info.section = Some(value.to_string()),
            "Installed-Size" => info.installed_size = value.parse().ok(),
            "Multi-Arch" => info.multi_arch = value.parse().unwrap_or_default(),
            "Pre-Depends" => info.pre_depends = parse_relations(value),
            "Depends" => info.depends = parse_relations(value),
            "Conflicts" => info.conflicts = parse_relations(value),
            "Breaks" => info.breaks = parse_relations(value),
            "Replaces" => info.replaces = parse_relations(value),
            "Provides" => info.provides = relation_names(value),
            "Recommends" => info.recommends = relation_names(value),
            "Suggests" => info.suggests = relation_names(value),
            _ => {}
        }
    }

    /// DebConf template descriptions shipped in the archive
    ///
    /// Seeing one of these in an installer's output means dpkg is waiting on
    /// a configuration prompt.
    pub fn debconf_templates(&self) -> Result<Vec<String>> {
        let Some(templates) = Self::extract_control_member(&self.path, "templates")? else {
            return Ok(Vec::new());
        };

        Ok(templates
            .lines()
            .filter_map(|line| line.strip_prefix("Description: "))
            .map(|description| description.trim_end().to_string())
            .filter(|description| !description.is_empty())
            .collect())
    }

    /// Locate the `control.tar*` member and return one decompressed file from it
    fn extract_control_member(path: &Path, member: &str) -> Result<Option<String>> {
        let file = File::open(path)
            .map_err(|e| Error::ParseError(format!("Failed to open DEB file {}: {}", path.display(), e)))?;
        let mut archive = ar::Archive::new(file);

        while let Some(entry) = archive.next_entry() {
            let mut entry =
                entry.map_err(|e| Error::ParseError(format!("Failed to read AR entry: {}", e)))?;

            let entry_name = String::from_utf8_lossy(entry.header().identifier()).to_string();
            if !entry_name.starts_with("control.tar") {
                continue;
            }

            let mut tar_data = Vec::new();
            entry
                .read_to_end(&mut tar_data)
                .map_err(|e| Error::ParseError(format!("Failed to read {}: {}", entry_name, e)))?;

            let reader: Box<dyn Read> = match entry_name.as_str() {
                "control.tar.gz" => Box::new(GzDecoder::new(&tar_data[..])),
                "control.tar.xz" => Box::new(XzDecoder::new(&tar_data[..])),
                "control.tar.zst" => Box::new(
                    zstd::Decoder::new(&tar_data[..])
                        .map_err(|e| Error::ParseError(format!("Failed to create zstd decoder: {}", e)))?,
                ),
                "control.tar" => Box::new(&tar_data[..]),
                other => {
                    return Err(Error::ParseError(format!("Unsupported control member: {}", other)));
                }
            };

            return Self::read_member_from_tar(reader, member);
        }

        Err(Error::ParseError(format!(
            "No control member in DEB archive {}",
            path.display()
        )))
    }

    fn read_member_from_tar(reader: impl Read, member: &str) -> Result<Option<String>> {
        let mut archive = Archive::new(reader);

        for entry in archive
            .entries()
            .map_err(|e| Error::ParseError(format!("Failed to read control.tar: {}", e)))?
        {
            let mut entry = entry.map_err(|e| Error::ParseError(format!("Failed to read entry: {}", e)))?;
            let entry_path = entry
                .path()
                .map_err(|e| Error::ParseError(format!("Failed to get entry path: {}", e)))?
                .to_string_lossy()
                .to_string();

            if entry_path.trim_start_matches("./") == member {
                let mut content = String::new();
                entry
                    .read_to_string(&mut content)
                    .map_err(|e| Error::ParseError(format!("Failed to read {} file: {}", member, e)))?;
                return Ok(Some(content));
            }
        }

        Ok(None)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn maintainer(&self) -> Option<&str> {
        self.maintainer.as_deref()
    }

    pub fn section(&self) -> Option<&str> {
        self.section.as_deref()
    }

    /// Installed size in KiB
    pub fn installed_size(&self) -> Option<u64> {
        self.installed_size
    }

    pub fn multi_arch(&self) -> MultiArchType {
        self.multi_arch
    }

    pub fn recommends(&self) -> &[String] {
        &self.recommends
    }

    pub fn suggests(&self) -> &[String] {
        &self.suggests
    }
}

impl PackageRelations for DebPackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn architecture(&self) -> &str {
        &self.architecture
    }

    fn depends(&self) -> &[DependencyGroup] {
        &self.depends
    }

    fn conflicts(&self) -> &[DependencyGroup] {
        &self.conflicts
    }

    fn replaces(&self) -> &[DependencyGroup] {
        &self.replaces
    }

    fn provides(&self) -> &[String] {
        &self.provides
    }
}

/// SHA-256 of a whole file, hex encoded
pub fn sha256_file(path: impl AsRef<Path>) -> Result<String> {
    let mut file = File::open(path.as_ref())?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}
