// src/manager/worker.rs

//! Batch install progress

use serde::Serialize;

/// State of the whole batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    #[default]
    Prepare,
    Processing,
    Finished,
}

/// State of one candidate during a batch install
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperateStatus {
    #[default]
    Prepare,
    Waiting,
    Operating,
    Success,
    Failed,
}

impl OperateStatus {
    /// Success and Failed are final for the current batch run
    pub fn is_done(&self) -> bool {
        matches!(self, OperateStatus::Success | OperateStatus::Failed)
    }
}

/// How the installed system relates to a candidate archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    NotInstalled,
    InstalledSameVersion,
    /// The installed version is older than the archive
    InstalledEarlierVersion,
    /// The installed version is newer than the archive
    InstalledLaterVersion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(WorkerStatus::default(), WorkerStatus::Prepare);
        assert_eq!(OperateStatus::default(), OperateStatus::Prepare);
        assert!(OperateStatus::Failed.is_done());
        assert!(!OperateStatus::Waiting.is_done());
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(
            serde_json::to_string(&InstallStatus::InstalledLaterVersion).unwrap(),
            "\"installed_later_version\""
        );
        assert_eq!(serde_json::to_string(&WorkerStatus::Processing).unwrap(), "\"processing\"");
    }
}
