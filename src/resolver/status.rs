// src/resolver/status.rs

//! Resolution status values and their reducers

use serde::Serialize;
use std::fmt;

/// Severity-ordered resolution outcome
///
/// The resolver only produces `Ok`, `Available` and `Break`; the others are
/// assigned by the batch manager from policy and authorization outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependsStatus {
    /// Everything needed is already installed
    #[default]
    Ok,
    /// Installable after installing or upgrading other packages
    Available,
    /// Cannot be installed
    Break,
    /// The user dismissed the authorization prompt for a dependency install
    AuthCancelled,
    /// Authorization for a dependency install was refused
    AuthFailed,
    /// Denied by administrator policy
    Prohibited,
}

impl DependsStatus {
    pub fn as_str(&self) -> &str {
        match self {
            DependsStatus::Ok => "ok",
            DependsStatus::Available => "available",
            DependsStatus::Break => "break",
            DependsStatus::AuthCancelled => "auth_cancelled",
            DependsStatus::AuthFailed => "auth_failed",
            DependsStatus::Prohibited => "prohibited",
        }
    }
}

impl fmt::Display for DependsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status plus the package responsible for it
///
/// `Break` and `Prohibited` always name the offending package.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PackageDependsStatus {
    pub status: DependsStatus,
    pub package: String,
}

impl PackageDependsStatus {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn available(package: impl Into<String>) -> Self {
        Self {
            status: DependsStatus::Available,
            package: package.into(),
        }
    }

    pub fn broken(package: impl Into<String>) -> Self {
        Self {
            status: DependsStatus::Break,
            package: package.into(),
        }
    }

    pub fn prohibited(package: impl Into<String>) -> Self {
        Self {
            status: DependsStatus::Prohibited,
            package: package.into(),
        }
    }

    pub fn with_status(status: DependsStatus) -> Self {
        Self {
            status,
            package: String::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == DependsStatus::Ok
    }

    pub fn is_available(&self) -> bool {
        self.status == DependsStatus::Available
    }

    pub fn is_break(&self) -> bool {
        self.status == DependsStatus::Break
    }

    pub fn is_prohibited(&self) -> bool {
        self.status == DependsStatus::Prohibited
    }

    /// Keep the more severe status; ties keep `self`
    pub fn max_eq(&mut self, other: PackageDependsStatus) {
        if other.status > self.status {
            *self = other;
        }
    }

    /// Keep the less severe status; ties keep `self`
    pub fn min_eq(&mut self, other: PackageDependsStatus) {
        if other.status < self.status {
            *self = other;
        }
    }
}

/// AND over groups: most severe wins, stops at the first `Break`
///
/// Pass a lazy iterator to skip evaluating the remaining groups.
pub fn combine_and<I>(statuses: I) -> PackageDependsStatus
where
    I: IntoIterator<Item = PackageDependsStatus>,
{
    let mut result = PackageDependsStatus::ok();
    for status in statuses {
        result.max_eq(status);
        if result.is_break() {
            break;
        }
    }
    result
}

/// OR over alternatives: least severe wins, stops at the first non-`Break`
///
/// An empty group is broken.
pub fn combine_or<I>(statuses: I) -> PackageDependsStatus
where
    I: IntoIterator<Item = PackageDependsStatus>,
{
    let mut result = PackageDependsStatus::broken("");
    for status in statuses {
        result.min_eq(status);
        if !result.is_break() {
            break;
        }
    }
    result
}
