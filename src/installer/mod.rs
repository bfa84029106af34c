// src/installer/mod.rs

//! Privileged installer interface
//!
//! Installs and removals run outside this process, through a helper started
//! with elevated privileges. The engine only needs to know whether the helper
//! started, what it printed, and how it exited.

pub mod coordinator;
pub mod process;
pub mod progress;

pub use coordinator::DependsInstallCoordinator;
pub use process::ProcessInstaller;
pub use progress::{OutputLine, OutputParser};

use crate::error::{Error, Result};
use serde::Serialize;
use std::sync::mpsc::{Receiver, TryRecvError};

/// Operations the helper performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandKind {
    /// Install the runtime packages of a Wine application
    InstallWineDependency,
    /// `dpkg -i` an archive that asks DebConf questions
    InstallConfig,
    /// Install into a compatibility root filesystem
    InstallCompatible,
    /// Install as an extension of an immutable system
    InstallImmutable,
    /// Install a UAB bundle
    InstallUab,
    /// Remove an installed UAB bundle
    RemoveUab,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::InstallWineDependency => "install-wine-dependency",
            CommandKind::InstallConfig => "install-config",
            CommandKind::InstallCompatible => "install-compatible",
            CommandKind::InstallImmutable => "install-immutable",
            CommandKind::InstallUab => "install-uab",
            CommandKind::RemoveUab => "remove-uab",
        }
    }

    /// Helper flags selecting this operation
    pub fn helper_flags(&self) -> &'static [&'static str] {
        match self {
            CommandKind::InstallWineDependency => &["--install_wine"],
            CommandKind::InstallConfig => &["--install_config"],
            CommandKind::InstallCompatible => &["--install_compatible", "--install"],
            CommandKind::InstallImmutable => &["--install_immutable", "--install"],
            CommandKind::InstallUab => &["--uab", "--install"],
            CommandKind::RemoveUab => &["--uab", "--remove"],
        }
    }

    /// Kinds that act on exactly one archive or package
    fn takes_single_target(&self) -> bool {
        !matches!(self, CommandKind::InstallWineDependency)
    }
}

/// One helper invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerCommand {
    pub kind: CommandKind,
    /// Package names for dependency installs, otherwise one path or identifier
    pub targets: Vec<String>,
    /// Compatibility root filesystem to operate in
    pub rootfs: Option<String>,
    /// DebConf template descriptions that identify a configuration prompt
    pub debconf_templates: Vec<String>,
}

impl InstallerCommand {
    pub fn new(kind: CommandKind, targets: Vec<String>) -> Self {
        Self {
            kind,
            targets,
            rootfs: None,
            debconf_templates: Vec::new(),
        }
    }

    pub fn with_rootfs(mut self, rootfs: impl Into<String>) -> Self {
        self.rootfs = Some(rootfs.into());
        self
    }

    pub fn with_debconf_templates(mut self, templates: Vec<String>) -> Self {
        self.debconf_templates = templates;
        self
    }

    /// Reject invocations the helper would refuse
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(Error::InstallerError(format!("{} needs a target", self.kind.as_str())));
        }
        if self.kind.takes_single_target() && self.targets.len() != 1 {
            return Err(Error::InstallerError(format!(
                "{} takes exactly one target, got {}",
                self.kind.as_str(),
                self.targets.len()
            )));
        }
        if self.kind == CommandKind::RemoveUab {
            let parts: Vec<&str> = self.targets[0].split('/').collect();
            if parts.len() != 4 || parts.iter().any(|part| part.is_empty()) {
                return Err(Error::InstallerError(format!(
                    "UAB remove target must be id/version/channel/module: {}",
                    self.targets[0]
                )));
            }
        }
        Ok(())
    }

    /// Helper arguments, after validation
    pub fn args(&self) -> Result<Vec<String>> {
        self.validate()?;

        let mut args: Vec<String> = self.kind.helper_flags().iter().map(|s| s.to_string()).collect();
        if let Some(rootfs) = &self.rootfs {
            args.push("--rootfs".to_string());
            args.push(rootfs.clone());
        }
        args.extend(self.targets.iter().cloned());
        Ok(args)
    }
}

/// How a helper run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallerResult {
    Success,
    /// The authorization dialog was dismissed
    AuthCancelled,
    /// Authorization was refused
    AuthFailed,
    /// The helper failed with this exit code (-1 when killed or never started)
    Failed(i32),
}

impl InstallerResult {
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => InstallerResult::Success,
            126 => InstallerResult::AuthCancelled,
            127 => InstallerResult::AuthFailed,
            other => InstallerResult::Failed(other),
        }
    }

    pub fn is_success(&self) -> bool {
        *self == InstallerResult::Success
    }

    /// Inverse of `from_exit_code`
    pub fn exit_code(&self) -> i32 {
        match self {
            InstallerResult::Success => 0,
            InstallerResult::AuthCancelled => 126,
            InstallerResult::AuthFailed => 127,
            InstallerResult::Failed(code) => *code,
        }
    }
}

/// Something the helper reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallerEvent {
    Started,
    Progress { percentage: u32, message: String },
    /// The helper is waiting on a DebConf question
    DebConfPrompt(String),
    Output(String),
    Finished(InstallerResult),
}

/// Starts helper runs
pub trait PrivilegedInstaller {
    fn start(&self, command: &InstallerCommand) -> Result<InstallerHandle>;
}

/// A running helper
pub struct InstallerHandle {
    events: Receiver<InstallerEvent>,
    cancel: Option<Box<dyn FnMut() + Send>>,
    finished: bool,
}

impl InstallerHandle {
    /// Wrap the receiving end of an event channel
    ///
    /// A sender dropped before `Finished` is reported as `Failed(-1)`.
    pub fn from_channel(events: Receiver<InstallerEvent>) -> Self {
        Self {
            events,
            cancel: None,
            finished: false,
        }
    }

    pub fn with_cancel(mut self, cancel: impl FnMut() + Send + 'static) -> Self {
        self.cancel = Some(Box::new(cancel));
        self
    }

    /// Next event without blocking
    pub fn try_next(&mut self) -> Option<InstallerEvent> {
        if self.finished {
            return None;
        }
        match self.events.try_recv() {
            Ok(event) => Some(self.observe(event)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.observe(InstallerEvent::Finished(InstallerResult::Failed(-1)))),
        }
    }

    /// Next event, blocking; `None` once the run has finished
    pub fn next_event(&mut self) -> Option<InstallerEvent> {
        if self.finished {
            return None;
        }
        let event = self
            .events
            .recv()
            .unwrap_or(InstallerEvent::Finished(InstallerResult::Failed(-1)));
        Some(self.observe(event))
    }

    /// Block until the run finishes, passing every event to `on_event`
    pub fn wait(mut self, mut on_event: impl FnMut(&InstallerEvent)) -> InstallerResult {
        while let Some(event) = self.next_event() {
            on_event(&event);
            if let InstallerEvent::Finished(result) = event {
                return result;
            }
        }
        InstallerResult::Failed(-1)
    }

    /// Ask the helper to stop; it still reports `Finished`
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.as_mut() {
            cancel();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn observe(&mut self, event: InstallerEvent) -> InstallerEvent {
        if matches!(event, InstallerEvent::Finished(_)) {
            self.finished = true;
        }
        event
    }
}
