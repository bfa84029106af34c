// src/installer/process.rs

//! Helper runs as child processes under pkexec

use super::progress::{OutputLine, OutputParser};
use super::{InstallerCommand, InstallerEvent, InstallerHandle, InstallerResult, PrivilegedInstaller};
use crate::config::InstallerConfig;
use crate::error::{Error, Result};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const REAP_INTERVAL: Duration = Duration::from_millis(50);

/// Runs `pkexec <helper> <args>`
#[derive(Debug, Clone)]
pub struct ProcessInstaller {
    pkexec: PathBuf,
    helper: PathBuf,
}

impl ProcessInstaller {
    pub fn new(pkexec: impl Into<PathBuf>, helper: impl Into<PathBuf>) -> Self {
        Self {
            pkexec: pkexec.into(),
            helper: helper.into(),
        }
    }

    pub fn from_config(config: &InstallerConfig) -> Self {
        Self::new(&config.pkexec, &config.helper)
    }

    /// The full command line for `command`
    pub fn command_line(&self, command: &InstallerCommand) -> Result<Vec<String>> {
        let mut line = vec![
            self.pkexec.to_string_lossy().to_string(),
            self.helper.to_string_lossy().to_string(),
        ];
        line.extend(command.args()?);
        Ok(line)
    }
}

impl PrivilegedInstaller for ProcessInstaller {
    fn start(&self, command: &InstallerCommand) -> Result<InstallerHandle> {
        let args = command.args()?;
        info!("Exec: {} {} {}", self.pkexec.display(), self.helper.display(), args.join(" "));

        let mut child = Command::new(&self.pkexec)
            .arg(&self.helper)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::InstallerError(format!("failed to start {}: {}", self.pkexec.display(), e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::InstallerError("helper stdout not captured".to_string()))?;
        let stderr = child.stderr.take();

        let child = Arc::new(Mutex::new(child));
        let (tx, rx) = mpsc::channel();
        let parser = OutputParser::new(command.debconf_templates.clone());

        if let Some(stderr) = stderr {
            thread::Builder::new()
                .name("installer-stderr".to_string())
                .spawn(move || {
                    for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                        debug!("helper stderr: {}", line);
                    }
                })?;
        }

        let reader_child = Arc::clone(&child);
        thread::Builder::new()
            .name("installer-output".to_string())
            .spawn(move || read_output(stdout, parser, reader_child, tx))?;

        let cancel_child = Arc::clone(&child);
        Ok(InstallerHandle::from_channel(rx).with_cancel(move || {
            if let Ok(mut child) = cancel_child.lock()
                && let Err(e) = child.kill()
            {
                warn!("Failed to stop helper: {}", e);
            }
        }))
    }
}

fn read_output(
    stdout: impl std::io::Read,
    parser: OutputParser,
    child: Arc<Mutex<Child>>,
    tx: Sender<InstallerEvent>,
) {
    // Receivers may hang up early; the helper is still reaped below
    let _ = tx.send(InstallerEvent::Started);

    for line in BufReader::new(stdout).lines().map_while(|l| l.ok()) {
        let event = match parser.classify(&line) {
            OutputLine::Progress { percentage, message } => InstallerEvent::Progress { percentage, message },
            OutputLine::DebConfPrompt(template) => {
                info!("Helper waiting on DebConf question: {}", template);
                InstallerEvent::DebConfPrompt(template)
            }
            OutputLine::Text(text) => InstallerEvent::Output(text),
        };
        let _ = tx.send(event);
    }

    let result = reap(&child);
    debug!("Helper finished: {:?}", result);
    let _ = tx.send(InstallerEvent::Finished(result));
}

/// Wait for the helper to exit without holding the lock, so cancel can still kill it
fn reap(child: &Mutex<Child>) -> InstallerResult {
    loop {
        let polled = match child.lock() {
            Ok(mut child) => child.try_wait(),
            Err(_) => return InstallerResult::Failed(-1),
        };
        match polled {
            Ok(Some(status)) => {
                return status.code().map_or(InstallerResult::Failed(-1), InstallerResult::from_exit_code);
            }
            Ok(None) => thread::sleep(REAP_INTERVAL),
            Err(e) => {
                warn!("Failed to wait for helper: {}", e);
                return InstallerResult::Failed(-1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::CommandKind;

    #[test]
    fn test_command_line() {
        let installer = ProcessInstaller::new("pkexec", "/usr/bin/helper");
        let command = InstallerCommand::new(CommandKind::RemoveUab, vec!["org.app/1.0/main/binary".to_string()]);
        assert_eq!(
            installer.command_line(&command).unwrap(),
            vec!["pkexec", "/usr/bin/helper", "--uab", "--remove", "org.app/1.0/main/binary"]
        );
    }

    #[test]
    fn test_invalid_command_not_started() {
        let installer = ProcessInstaller::new("/nonexistent/pkexec", "/nonexistent/helper");
        let command = InstallerCommand::new(CommandKind::RemoveUab, vec!["bad".to_string()]);
        assert!(matches!(installer.start(&command), Err(Error::InstallerError(_))));
    }

    #[test]
    fn test_missing_program() {
        let installer = ProcessInstaller::new("/nonexistent/pkexec", "/nonexistent/helper");
        let command = InstallerCommand::new(CommandKind::InstallConfig, vec!["/tmp/a.deb".to_string()]);
        assert!(installer.start(&command).is_err());
    }

    #[test]
    fn test_runs_helper_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("helper.sh");
        std::fs::write(
            &script,
            "echo '{\"percentage\":50, \"message\":\"half\"}'\necho \"Accept the license?\"\necho \"$@\"\nexit 3\n",
        )
        .unwrap();

        // `sh` stands in for pkexec
        let installer = ProcessInstaller::new("sh", &script);
        let command = InstallerCommand::new(CommandKind::InstallConfig, vec!["/tmp/a.deb".to_string()])
            .with_debconf_templates(vec!["Accept the license?".to_string()]);

        let mut events = Vec::new();
        let result = installer.start(&command).unwrap().wait(|e| events.push(e.clone()));

        assert_eq!(result, InstallerResult::Failed(3));
        assert_eq!(events[0], InstallerEvent::Started);
        assert!(events.contains(&InstallerEvent::Progress {
            percentage: 50,
            message: "half".to_string()
        }));
        assert!(events.contains(&InstallerEvent::DebConfPrompt("Accept the license?".to_string())));
        assert!(events.contains(&InstallerEvent::Output("--install_config /tmp/a.deb".to_string())));
    }

    #[test]
    fn test_cancel_after_output_closed() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("helper.sh");
        std::fs::write(&script, "exec >&-\nsleep 30\n").unwrap();

        let installer = ProcessInstaller::new("sh", &script);
        let command = InstallerCommand::new(CommandKind::InstallConfig, vec!["/tmp/a.deb".to_string()]);
        let mut handle = installer.start(&command).unwrap();
        assert_eq!(handle.next_event(), Some(InstallerEvent::Started));

        // Let the reader reach the exit wait
        thread::sleep(Duration::from_millis(300));
        handle.cancel();

        let started = std::time::Instant::now();
        assert_eq!(handle.wait(|_| {}), InstallerResult::Failed(-1));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
