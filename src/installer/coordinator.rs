// src/installer/coordinator.rs

//! Runs the Wine dependency installs the batch manager asks for

use super::{CommandKind, InstallerCommand, InstallerEvent, InstallerHandle, InstallerResult, PrivilegedInstaller};
use crate::backend::PackageDatabase;
use crate::error::Result;
use crate::manager::PackagesManager;
use tracing::{info, warn};

/// Bridges `PackagesManager` dependency-install requests to an installer
pub struct DependsInstallCoordinator<I: PrivilegedInstaller> {
    installer: I,
    current: Option<InstallerHandle>,
}

impl<I: PrivilegedInstaller> DependsInstallCoordinator<I> {
    pub fn new(installer: I) -> Self {
        Self {
            installer,
            current: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }

    /// Start a pending request or collect the running one's outcome
    ///
    /// Never blocks. Returns the result once a run has finished and the
    /// manager has been told about it.
    pub fn poll<D>(&mut self, manager: &mut PackagesManager<D>) -> Result<Option<InstallerResult>>
    where
        D: PackageDatabase + Send + 'static,
    {
        if self.current.is_none() {
            let Some(request) = manager.take_external_install_request() else {
                return Ok(None);
            };

            info!(
                "Installing dependencies for candidate {} (missing {}): {:?}",
                request.index, request.broken, request.packages
            );
            let command = InstallerCommand::new(CommandKind::InstallWineDependency, request.packages);
            match self.installer.start(&command) {
                Ok(handle) => self.current = Some(handle),
                Err(e) => {
                    warn!("Failed to start dependency install: {}", e);
                    let result = InstallerResult::Failed(-1);
                    manager.on_depends_install_finished(result)?;
                    return Ok(Some(result));
                }
            }
        }

        let Some(handle) = self.current.as_mut() else {
            return Ok(None);
        };
        while let Some(event) = handle.try_next() {
            if let InstallerEvent::Finished(result) = event {
                self.current = None;
                manager.on_depends_install_finished(result)?;
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    /// Block until no request is pending or running
    pub fn run_to_completion<D>(&mut self, manager: &mut PackagesManager<D>) -> Result<Vec<InstallerResult>>
    where
        D: PackageDatabase + Send + 'static,
    {
        let mut results = Vec::new();
        loop {
            if let Some(result) = self.poll(manager)? {
                results.push(result);
                continue;
            }
            match self.current.as_mut() {
                Some(handle) => {
                    if let Some(InstallerEvent::Finished(result)) = handle.next_event() {
                        self.current = None;
                        manager.on_depends_install_finished(result)?;
                        results.push(result);
                    }
                }
                None => return Ok(results),
            }
        }
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.current.as_mut() {
            handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendFuture, PackageIndex};
    use crate::error::Error;
    use crate::manager::{CandidateArchive, Denylist};
    use crate::packages::Package;
    use std::sync::Mutex;
    use std::sync::mpsc;

    /// Replays a fixed result and records what it was asked to run
    struct FakeInstaller {
        result: Option<InstallerResult>,
        commands: Mutex<Vec<InstallerCommand>>,
    }

    impl PrivilegedInstaller for FakeInstaller {
        fn start(&self, command: &InstallerCommand) -> Result<InstallerHandle> {
            self.commands.lock().unwrap().push(command.clone());
            let result = self
                .result
                .ok_or_else(|| Error::InstallerError("pkexec missing".to_string()))?;

            let (tx, rx) = mpsc::channel();
            tx.send(InstallerEvent::Started).unwrap();
            tx.send(InstallerEvent::Finished(result)).unwrap();
            Ok(InstallerHandle::from_channel(rx))
        }
    }

    fn wine_manager() -> PackagesManager<PackageIndex> {
        let index = PackageIndex::new(
            vec!["amd64".to_string(), "i386".to_string()],
            vec![Package::new("deepin-wine", "i386", "5.0")],
        );
        let mut manager = PackagesManager::with_denylist(
            BackendFuture::ready(index),
            Denylist::default(),
            vec!["deepin-wine".to_string()],
        );
        let archive = CandidateArchive::from_control(
            "/tmp/wine-app.deb",
            "Package: wine-app\nVersion: 1.0\nArchitecture: i386\nDepends: deepin-wine\n",
            "hash",
        )
        .unwrap();
        manager.append_archive(archive);
        manager
    }

    #[test]
    fn test_nothing_to_do() {
        let mut manager = wine_manager();
        let mut coordinator = DependsInstallCoordinator::new(FakeInstaller {
            result: Some(InstallerResult::Success),
            commands: Mutex::new(Vec::new()),
        });
        assert_eq!(coordinator.poll(&mut manager).unwrap(), None);
        assert!(!coordinator.is_running());
    }

    #[test]
    fn test_success_marks_ok() {
        let mut manager = wine_manager();
        assert!(manager.get_package_depends_status(0).unwrap().is_break());

        let mut coordinator = DependsInstallCoordinator::new(FakeInstaller {
            result: Some(InstallerResult::Success),
            commands: Mutex::new(Vec::new()),
        });
        let results = coordinator.run_to_completion(&mut manager).unwrap();

        assert_eq!(results, vec![InstallerResult::Success]);
        assert!(manager.get_package_depends_status(0).unwrap().is_ok());

        let commands = coordinator.installer.commands.lock().unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].kind, CommandKind::InstallWineDependency);
        assert_eq!(commands[0].targets, vec!["deepin-wine:i386"]);
    }

    #[test]
    fn test_start_failure_reported() {
        let mut manager = wine_manager();
        manager.get_package_depends_status(0).unwrap();

        let mut coordinator = DependsInstallCoordinator::new(FakeInstaller {
            result: None,
            commands: Mutex::new(Vec::new()),
        });
        assert_eq!(
            coordinator.poll(&mut manager).unwrap(),
            Some(InstallerResult::Failed(-1))
        );
        assert_eq!(
            manager.package_failed_reason(0).unwrap(),
            "Failed to install deepin-wine"
        );
    }
}
