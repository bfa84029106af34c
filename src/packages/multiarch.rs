// src/packages/multiarch.rs

//! Multi-arch metadata and architecture matching

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Value of a package's `Multi-Arch` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultiArchType {
    #[default]
    None,
    Same,
    Foreign,
    Allowed,
}

impl MultiArchType {
    pub fn as_str(&self) -> &str {
        match self {
            MultiArchType::None => "none",
            MultiArchType::Same => "same",
            MultiArchType::Foreign => "foreign",
            MultiArchType::Allowed => "allowed",
        }
    }
}

impl FromStr for MultiArchType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "" | "no" | "none" => Ok(MultiArchType::None),
            "same" => Ok(MultiArchType::Same),
            "foreign" => Ok(MultiArchType::Foreign),
            "allowed" => Ok(MultiArchType::Allowed),
            other => Err(format!("Invalid multi-arch type: {}", other)),
        }
    }
}

/// `all` and `any` match every architecture
pub fn is_generic_arch(arch: &str) -> bool {
    let arch = arch.trim_start_matches(':');
    arch == "all" || arch == "any"
}

/// Whether a package built for `package_arch` fits `target_arch`
pub fn is_arch_matches(target_arch: &str, package_arch: &str) -> bool {
    let target = target_arch.trim_start_matches(':');
    if is_generic_arch(target) || is_generic_arch(package_arch) {
        return true;
    }
    target == package_arch
}

/// Architecture qualifier used to look a dependency up
///
/// `native`, `any` and `all` annotations, and foreign multi-arch packages, need
/// no qualifier. An empty annotation means "same architecture as the
/// dependent". The result carries its leading colon.
pub fn resolve_multi_arch_annotation(annotation: &str, arch: &str, multi_arch: Option<MultiArchType>) -> String {
    if matches!(annotation, "native" | "any" | "all") {
        return String::new();
    }
    if multi_arch == Some(MultiArchType::Foreign) {
        return String::new();
    }

    let qualifier = if annotation.is_empty() { arch } else { annotation };
    if qualifier.is_empty() || qualifier.starts_with(':') {
        qualifier.to_string()
    } else {
        format!(":{}", qualifier)
    }
}
