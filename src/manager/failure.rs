// src/manager/failure.rs

//! Why a candidate could not be installed

use serde::Serialize;
use std::fmt;

/// Error codes reported by an install transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionErrorCode {
    Init,
    Lock,
    DiskSpace,
    Fetch,
    Commit,
    Auth,
    WorkerDisappeared,
    Untrusted,
    DownloadDisallowed,
    NotFound,
    WrongArch,
    Marking,
    Unknown,
}

impl TransactionErrorCode {
    /// Map a numeric code from the package service; 0 is not an error
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Init,
            2 => Self::Lock,
            3 => Self::DiskSpace,
            4 => Self::Fetch,
            5 => Self::Commit,
            6 => Self::Auth,
            7 => Self::WorkerDisappeared,
            8 => Self::Untrusted,
            9 => Self::DownloadDisallowed,
            10 => Self::NotFound,
            11 => Self::WrongArch,
            12 => Self::Marking,
            _ => Self::Unknown,
        }
    }
}

/// A failed install transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionError {
    pub code: TransactionErrorCode,
    pub message: String,
    pub cancellable: bool,
}

impl TransactionError {
    pub fn new(code: i32, message: impl Into<String>, cancellable: bool) -> Self {
        Self {
            code: TransactionErrorCode::from_code(code),
            message: message.into(),
            cancellable,
        }
    }

    /// An installer process that exited with a non-zero status
    pub fn from_exit_code(exit_code: i32) -> Self {
        Self {
            code: TransactionErrorCode::Commit,
            message: format!("installer exited with status {}", exit_code),
            cancellable: false,
        }
    }

    /// The user dismissed or failed the authorization prompt
    pub fn is_auth_error(&self) -> bool {
        self.code == TransactionErrorCode::Auth
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            TransactionErrorCode::Fetch | TransactionErrorCode::DownloadDisallowed => {
                f.write_str("Installation failed, please check your network connection")
            }
            TransactionErrorCode::DiskSpace => f.write_str("Installation failed, insufficient disk space"),
            _ => f.write_str("Installation failed, please check for updates in Control Center"),
        }
    }
}

/// User-facing reason a candidate failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "package", rename_all = "snake_case")]
pub enum PackageFailure {
    /// The archive is built for an architecture dpkg does not accept
    ArchitectureMismatch,
    /// A dependency is unknown to the package database
    PackageNotFound(String),
    /// A dependency or conflict cannot be satisfied
    VersionConflict(String),
    /// The Wine dependency install for this candidate failed
    DependencyInstallFailed(String),
    /// Denied by administrator policy
    Prohibited(String),
    AuthCancelled,
    AuthFailed,
    Transaction(TransactionError),
}

impl fmt::Display for PackageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageFailure::ArchitectureMismatch => f.write_str("Unmatched package architecture"),
            PackageFailure::PackageNotFound(name) | PackageFailure::VersionConflict(name) => {
                write!(f, "Broken dependencies: {}", name)
            }
            PackageFailure::DependencyInstallFailed(name) => write!(f, "Failed to install {}", name),
            PackageFailure::Prohibited(_) => {
                f.write_str("The administrator has set policies to prevent installation of this package")
            }
            PackageFailure::AuthCancelled => f.write_str("Authorization cancelled"),
            PackageFailure::AuthFailed => f.write_str("Authorization failed"),
            PackageFailure::Transaction(error) => error.fmt(f),
        }
    }
}
