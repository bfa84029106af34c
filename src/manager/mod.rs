// src/manager/mod.rs

//! Batch manager for candidate archives
//!
//! Holds the ordered list of archives the user queued, memoizes resolution
//! per archive position, and tracks a batch install. Positions are the public
//! identity of a candidate; removing one renumbers every cache keyed by them.

pub mod archive;
pub mod denylist;
pub mod failure;
pub mod links;
pub mod renumber;
pub mod wine;
pub mod worker;

pub use archive::CandidateArchive;
pub use denylist::Denylist;
pub use failure::{PackageFailure, TransactionError, TransactionErrorCode};
pub use wine::DependsInstallRequest;
pub use worker::{InstallStatus, OperateStatus, WorkerStatus};

use crate::backend::{BackendFuture, PackageDatabase};
use crate::config::InstallerConfig;
use crate::error::{Error, Result};
use crate::installer::InstallerResult;
use crate::packages::{PackageRelations, multiarch::is_generic_arch};
use crate::resolver::{
    ChosenSet, ConflictResult, DependsStatus, InstalledConflicts, PackageDependsStatus, Resolver,
};
use crate::version::compare_versions;
use links::{SymbolicLinks, is_unsafe_path};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Resolution of one candidate, before it is memoized
struct Evaluation {
    status: PackageDependsStatus,
    /// Wine runtime packages to install, when the candidate needs them
    wine_packages: Option<Vec<String>>,
}

/// Ordered batch of candidate archives over one package database
pub struct PackagesManager<D: PackageDatabase + Send + 'static> {
    backend: BackendFuture<D>,
    installed_conflicts: InstalledConflicts,
    denylist: Denylist,
    wine_markers: Vec<String>,
    links: SymbolicLinks,

    archives: Vec<CandidateArchive>,
    hashes: HashSet<String>,
    current_index: usize,

    install_status: BTreeMap<usize, InstallStatus>,
    depends_status: BTreeMap<usize, PackageDependsStatus>,
    /// Candidates whose Wine dependency install failed
    error_indices: Vec<usize>,
    /// Candidates covered by the pending or running dependency install
    depends_install_marks: Vec<usize>,
    pending_depends_install: Option<DependsInstallRequest>,
    depends_install_running: bool,

    worker_status: WorkerStatus,
    operate_status: BTreeMap<usize, OperateStatus>,
    failures: BTreeMap<usize, PackageFailure>,
    next_operation_index: usize,
    operating_index: Option<usize>,
}

impl<D: PackageDatabase + Send + 'static> PackagesManager<D> {
    /// Create a manager; the denylist is read once, here
    pub fn new(backend: BackendFuture<D>, config: &InstallerConfig) -> Self {
        Self::with_denylist(backend, Denylist::load(&config.denylist), config.wine_markers.clone())
    }

    pub fn with_denylist(backend: BackendFuture<D>, denylist: Denylist, wine_markers: Vec<String>) -> Self {
        Self {
            backend,
            installed_conflicts: InstalledConflicts::default(),
            denylist,
            wine_markers,
            links: SymbolicLinks::new(),
            archives: Vec::new(),
            hashes: HashSet::new(),
            current_index: 0,
            install_status: BTreeMap::new(),
            depends_status: BTreeMap::new(),
            error_indices: Vec::new(),
            depends_install_marks: Vec::new(),
            pending_depends_install: None,
            depends_install_running: false,
            worker_status: WorkerStatus::Prepare,
            operate_status: BTreeMap::new(),
            failures: BTreeMap::new(),
            next_operation_index: 0,
            operating_index: None,
        }
    }

    /// Non-blocking: has the package database finished loading?
    pub fn is_backend_ready(&self) -> bool {
        self.backend.is_ready()
    }

    /// The loaded database, waiting for it if needed
    pub fn backend(&mut self) -> Result<&D> {
        self.backend.wait()?;
        self.backend.get()
    }

    pub fn backend_mut(&mut self) -> Result<&mut D> {
        self.backend.wait()?;
        self.backend.get_mut()
    }

    // ---- Batch ----

    /// Queue an archive from disk; `false` if the same content is queued
    pub fn append_package(&mut self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        debug!("Append package {}", path.display());

        let mut archive = CandidateArchive::open(path)?;
        if self.hashes.contains(archive.hash()) {
            info!("{} is already queued", path.display());
            return Ok(false);
        }

        if is_unsafe_path(path) {
            let link = self.links.link(path, archive.name())?;
            debug!("Unsafe characters in {}, installing through {}", path.display(), link.display());
            archive.set_install_path(link);
        }

        Ok(self.append_archive(archive))
    }

    /// Queue an already parsed archive; `false` if the same content is queued
    pub fn append_archive(&mut self, archive: CandidateArchive) -> bool {
        if !self.hashes.insert(archive.hash().to_string()) {
            return false;
        }
        self.archives.push(archive);
        true
    }

    /// Drop a candidate and renumber everything after it
    pub fn remove_package(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        if self.worker_status == WorkerStatus::Processing {
            return Err(Error::InvalidState("cannot remove packages while installing".to_string()));
        }

        let archive = self.archives.remove(index);
        self.hashes.remove(archive.hash());
        debug!("Removed {} at {}", archive.name(), index);

        renumber::shift_indices(&mut self.depends_install_marks, index);
        renumber::shift_indices(&mut self.error_indices, index);
        renumber::shift_keys(&mut self.install_status, index);
        renumber::shift_keys(&mut self.depends_status, index);
        renumber::shift_keys(&mut self.operate_status, index);
        renumber::shift_keys(&mut self.failures, index);

        if let Some(request) = self.pending_depends_install.take() {
            self.pending_depends_install = renumber::shift_index(request.index, index)
                .map(|shifted| DependsInstallRequest { index: shifted, ..request });
        }

        self.current_index = match renumber::shift_index(self.current_index, index) {
            Some(shifted) => shifted,
            None => index.min(self.archives.len().saturating_sub(1)),
        };
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.archives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }

    pub fn archive(&self, index: usize) -> Result<&CandidateArchive> {
        self.archives.get(index).ok_or(Error::InvalidIndex {
            index,
            len: self.archives.len(),
        })
    }

    pub fn archives(&self) -> &[CandidateArchive] {
        &self.archives
    }

    /// Cursor of the presentation layer
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn set_current_index(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        self.current_index = index;
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.archives.len() {
            Ok(())
        } else {
            Err(Error::InvalidIndex {
                index,
                len: self.archives.len(),
            })
        }
    }

    // ---- Queries ----

    /// Whether the candidate's architecture is one dpkg accepts
    pub fn is_arch_error(&mut self, index: usize) -> Result<bool> {
        self.check_index(index)?;
        self.backend.wait()?;
        let db = self.backend.get()?;
        Ok(arch_error(db, self.archives[index].architecture()))
    }

    /// How the installed system relates to the candidate; memoized
    pub fn package_install_status(&mut self, index: usize) -> Result<InstallStatus> {
        self.check_index(index)?;
        if let Some(status) = self.install_status.get(&index) {
            return Ok(*status);
        }

        let installed_version = self.package_installed_version(index)?;
        let archive = &self.archives[index];
        let status = match installed_version {
            None => InstallStatus::NotInstalled,
            Some(installed) => match compare_versions(archive.version(), &installed) {
                Ordering::Equal => InstallStatus::InstalledSameVersion,
                Ordering::Less => InstallStatus::InstalledLaterVersion,
                Ordering::Greater => InstallStatus::InstalledEarlierVersion,
            },
        };

        self.install_status.insert(index, status);
        Ok(status)
    }

    /// Installed version of the candidate's `name:arch`
    pub fn package_installed_version(&mut self, index: usize) -> Result<Option<String>> {
        self.check_index(index)?;
        self.backend.wait()?;
        let db = self.backend.get()?;
        let archive = &self.archives[index];
        Ok(db
            .package(&format!("{}:{}", archive.name(), archive.architecture()))
            .and_then(|p| p.installed_version.clone()))
    }

    /// Resolution status of a candidate; memoized until the batch or
    /// database changes
    pub fn get_package_depends_status(&mut self, index: usize) -> Result<PackageDependsStatus> {
        self.check_index(index)?;
        if let Some(status) = self.depends_status.get(&index) {
            return Ok(status.clone());
        }

        self.backend.wait()?;
        let db = self.backend.get()?;
        let resolver = Resolver::new(db, &self.installed_conflicts);
        let evaluation = evaluate(&resolver, &self.archives[index], &self.denylist, &self.wine_markers);

        Ok(self.apply_evaluation(index, evaluation))
    }

    /// Resolve every candidate, in parallel for those not yet memoized
    pub fn check_all_depends(&mut self) -> Result<Vec<PackageDependsStatus>> {
        self.backend.wait()?;
        let db = self.backend.get()?;
        let resolver = Resolver::new(db, &self.installed_conflicts);

        let pending: Vec<usize> = (0..self.archives.len())
            .filter(|i| !self.depends_status.contains_key(i))
            .collect();
        debug!("Checking dependencies of {} candidates", pending.len());

        let evaluations: Vec<(usize, Evaluation)> = pending
            .par_iter()
            .map(|&i| (i, evaluate(&resolver, &self.archives[i], &self.denylist, &self.wine_markers)))
            .collect();

        for (index, evaluation) in evaluations {
            self.apply_evaluation(index, evaluation);
        }

        (0..self.archives.len())
            .map(|i| self.get_package_depends_status(i))
            .collect()
    }

    fn apply_evaluation(&mut self, index: usize, evaluation: Evaluation) -> PackageDependsStatus {
        let mut status = evaluation.status;

        if let Some(packages) = evaluation.wine_packages {
            if !self.depends_install_marks.contains(&index) && !self.depends_install_busy() {
                info!(
                    "{} needs its Wine dependencies installed ({} missing)",
                    self.archives[index].name(),
                    status.package
                );
                self.depends_install_marks.push(index);
                self.pending_depends_install = Some(DependsInstallRequest {
                    index,
                    packages,
                    broken: status.package.clone(),
                });
            }
            status.status = DependsStatus::Break;
        }

        debug!("Depends status of {}: {} {}", index, status.status, status.package);
        self.depends_status.insert(index, status.clone());
        status
    }

    /// `name:arch` entries an `Available` candidate would pull in
    pub fn package_available_depends(&mut self, index: usize) -> Result<Vec<String>> {
        self.check_index(index)?;
        self.backend.wait()?;
        let db = self.backend.get()?;
        let resolver = Resolver::new(db, &self.installed_conflicts);
        let archive = &self.archives[index];

        let mut chosen = BTreeSet::new();
        resolver.candidate_choose(&mut chosen, archive.architecture(), archive.deb().depends());
        Ok(chosen.into_iter().collect())
    }

    /// The candidate's own Conflicts against the installed system
    pub fn package_conflict_stat(&mut self, index: usize) -> Result<ConflictResult> {
        self.check_index(index)?;
        self.backend.wait()?;
        let db = self.backend.get()?;
        let resolver = Resolver::new(db, &self.installed_conflicts);
        let deb = self.archives[index].deb();
        Ok(resolver.check_conflict(deb.architecture(), deb.conflicts(), deb.replaces()))
    }

    /// Installed packages that would go away with `package_name`
    pub fn package_reverse_depends(&mut self, package_name: &str, arch: &str) -> Result<Vec<String>> {
        self.backend.wait()?;
        let db = self.backend.get()?;
        Ok(Resolver::new(db, &self.installed_conflicts).reverse_dependencies(package_name, arch))
    }

    /// Why the candidate cannot be, or was not, installed
    pub fn package_failure(&mut self, index: usize) -> Result<Option<PackageFailure>> {
        if self.is_arch_error(index)? {
            return Ok(Some(PackageFailure::ArchitectureMismatch));
        }

        let status = self.get_package_depends_status(index)?;
        let failure = match status.status {
            DependsStatus::Break if self.error_indices.contains(&index) => {
                Some(PackageFailure::DependencyInstallFailed(status.package))
            }
            DependsStatus::Break => {
                let known = self.backend.get()?.package(&status.package).is_some();
                if known {
                    Some(PackageFailure::VersionConflict(status.package))
                } else {
                    Some(PackageFailure::PackageNotFound(status.package))
                }
            }
            DependsStatus::Prohibited => Some(PackageFailure::Prohibited(status.package)),
            DependsStatus::AuthCancelled => Some(PackageFailure::AuthCancelled),
            DependsStatus::AuthFailed => Some(PackageFailure::AuthFailed),
            DependsStatus::Ok | DependsStatus::Available => self.failures.get(&index).cloned(),
        };
        Ok(failure)
    }

    /// User-facing failure text, empty when nothing failed
    pub fn package_failed_reason(&mut self, index: usize) -> Result<String> {
        Ok(self.package_failure(index)?.map(|f| f.to_string()).unwrap_or_default())
    }

    // ---- Resets ----

    /// Empty the batch and reload the database
    pub fn reset(&mut self) -> Result<()> {
        self.archives.clear();
        self.hashes.clear();
        self.current_index = 0;
        self.error_indices.clear();
        self.depends_install_marks.clear();
        self.pending_depends_install = None;
        self.worker_status = WorkerStatus::Prepare;
        self.operate_status.clear();
        self.failures.clear();
        self.next_operation_index = 0;
        self.operating_index = None;
        self.reload()
    }

    /// Forget what is known about the system and reload the database
    pub fn reset_install_status(&mut self) -> Result<()> {
        self.reload()
    }

    /// Reload the database so the candidate is re-resolved on next query
    ///
    /// A candidate still waiting on `deepin-wine` keeps its status so the
    /// dependency install is not requested twice. Every other memoized
    /// status goes with the reload.
    pub fn reset_package_depends_status(&mut self, index: usize) -> Result<()> {
        let Some(status) = self.depends_status.get(&index) else {
            return Ok(());
        };
        if status.package == "deepin-wine" && !status.is_ok() {
            debug!("Keeping depends status of {} until deepin-wine is installed", index);
            return Ok(());
        }

        self.reload()
    }

    /// Re-read the database; memoized statuses do not survive it
    fn reload(&mut self) -> Result<()> {
        self.backend.wait()?;
        self.backend.get_mut()?.reload_cache()?;
        self.installed_conflicts.invalidate();
        self.install_status.clear();
        self.depends_status.clear();
        debug!("Package database reloaded");
        Ok(())
    }

    // ---- Wine dependency install ----

    fn depends_install_busy(&self) -> bool {
        self.depends_install_running || self.pending_depends_install.is_some()
    }

    /// Hand the pending dependency install to whoever performs it
    pub fn take_external_install_request(&mut self) -> Option<DependsInstallRequest> {
        let request = self.pending_depends_install.take()?;
        self.depends_install_running = true;
        Some(request)
    }

    /// Candidates waiting on the pending or running dependency install
    pub fn depends_install_marks(&self) -> &[usize] {
        &self.depends_install_marks
    }

    /// Record how the dependency install ended
    pub fn on_depends_install_finished(&mut self, result: InstallerResult) -> Result<()> {
        let marks = std::mem::take(&mut self.depends_install_marks);
        self.depends_install_running = false;
        info!("Dependency install for {:?} finished: {:?}", marks, result);

        match result {
            InstallerResult::Success => {
                self.error_indices.clear();
                self.reload()?;
                for index in marks {
                    self.depends_status.insert(index, PackageDependsStatus::ok());
                }
            }
            InstallerResult::AuthCancelled => {
                for index in marks {
                    self.set_marked_status(index, DependsStatus::AuthCancelled);
                }
            }
            InstallerResult::AuthFailed => {
                for index in marks {
                    self.set_marked_status(index, DependsStatus::AuthFailed);
                }
            }
            InstallerResult::Failed(_) => {
                for index in marks {
                    self.set_marked_status(index, DependsStatus::Break);
                    if !self.error_indices.contains(&index) {
                        self.error_indices.push(index);
                    }
                }
            }
        }
        Ok(())
    }

    fn set_marked_status(&mut self, index: usize, status: DependsStatus) {
        let entry = self.depends_status.entry(index).or_default();
        entry.status = status;
    }

    // ---- Batch install ----

    pub fn worker_status(&self) -> WorkerStatus {
        self.worker_status
    }

    pub fn operate_status(&self, index: usize) -> OperateStatus {
        self.operate_status.get(&index).copied().unwrap_or_default()
    }

    /// Candidate the installer is working on
    pub fn operating_index(&self) -> Option<usize> {
        self.operating_index
    }

    /// Begin installing the batch in order
    pub fn start_install(&mut self) -> Result<()> {
        if self.worker_status != WorkerStatus::Prepare {
            return Err(Error::InvalidState(format!(
                "install already started ({:?})",
                self.worker_status
            )));
        }
        if self.archives.is_empty() {
            return Err(Error::InvalidState("no packages to install".to_string()));
        }

        info!("Installing {} packages", self.archives.len());
        self.worker_status = WorkerStatus::Processing;
        self.failures.clear();
        self.operate_status = (0..self.archives.len()).map(|i| (i, OperateStatus::Waiting)).collect();
        self.next_operation_index = 0;
        self.operating_index = None;
        Ok(())
    }

    /// Advance to the next installable candidate
    ///
    /// Candidates that cannot be installed are marked failed and skipped.
    /// Returns `None` once the batch is done, which also finishes the worker.
    pub fn next_operation(&mut self) -> Result<Option<usize>> {
        if self.worker_status != WorkerStatus::Processing {
            return Err(Error::InvalidState("no install in progress".to_string()));
        }
        if let Some(index) = self.operating_index {
            return Err(Error::InvalidState(format!("candidate {} is still being installed", index)));
        }

        while self.next_operation_index < self.archives.len() {
            let index = self.next_operation_index;
            self.next_operation_index += 1;

            if let Some(failure) = self.blocking_failure(index)? {
                warn!("Skipping {}: {}", self.archives[index].name(), failure);
                self.operate_status.insert(index, OperateStatus::Failed);
                self.failures.insert(index, failure);
                continue;
            }

            debug!("Installing {} ({})", self.archives[index].name(), index);
            self.operate_status.insert(index, OperateStatus::Operating);
            self.operating_index = Some(index);
            self.current_index = index;
            return Ok(Some(index));
        }

        info!("Batch install finished");
        self.worker_status = WorkerStatus::Finished;
        self.reset_install_status()?;
        Ok(None)
    }

    fn blocking_failure(&mut self, index: usize) -> Result<Option<PackageFailure>> {
        let status = self.get_package_depends_status(index)?;
        if matches!(status.status, DependsStatus::Ok | DependsStatus::Available) {
            return Ok(None);
        }
        self.package_failure(index)
    }

    /// The installer finished with `exit_code` for the operating candidate
    pub fn on_operation_finished(&mut self, index: usize, exit_code: i32) -> Result<()> {
        self.check_operating(index)?;

        match InstallerResult::from_exit_code(exit_code) {
            InstallerResult::Success => {
                info!("Installed {}", self.archives[index].name());
                self.operate_status.insert(index, OperateStatus::Success);
                self.operating_index = None;
            }
            InstallerResult::AuthCancelled => self.cancel_batch(index),
            InstallerResult::AuthFailed => self.fail_operation(index, PackageFailure::AuthFailed),
            InstallerResult::Failed(code) => {
                self.fail_operation(index, PackageFailure::Transaction(TransactionError::from_exit_code(code)))
            }
        }
        Ok(())
    }

    /// The package service reported an error for the operating candidate
    pub fn on_transaction_error(&mut self, code: i32, message: &str, cancellable: bool) -> Result<()> {
        let index = self
            .operating_index
            .ok_or_else(|| Error::InvalidState("no package is being installed".to_string()))?;

        let error = TransactionError::new(code, message, cancellable);
        warn!("Transaction error for {}: {:?} {}", self.archives[index].name(), error.code, message);

        if error.is_auth_error() {
            self.cancel_batch(index);
        } else {
            self.fail_operation(index, PackageFailure::Transaction(error));
        }
        Ok(())
    }

    fn check_operating(&self, index: usize) -> Result<()> {
        if self.operating_index == Some(index) {
            Ok(())
        } else {
            Err(Error::InvalidState(format!("candidate {} is not being installed", index)))
        }
    }

    fn fail_operation(&mut self, index: usize, failure: PackageFailure) {
        warn!("Failed to install {}: {}", self.archives[index].name(), failure);
        self.operate_status.insert(index, OperateStatus::Failed);
        self.failures.insert(index, failure);
        self.operating_index = None;
    }

    /// Authorization was cancelled: back to Prepare so the user can retry
    fn cancel_batch(&mut self, index: usize) {
        info!("Authorization cancelled, stopping the batch");
        self.failures.insert(index, PackageFailure::AuthCancelled);
        for status in self.operate_status.values_mut() {
            if matches!(status, OperateStatus::Waiting | OperateStatus::Operating) {
                *status = OperateStatus::Prepare;
            }
        }
        self.operating_index = None;
        self.next_operation_index = 0;
        self.worker_status = WorkerStatus::Prepare;
    }
}

/// Candidate architecture is neither generic nor supported
fn arch_error<D: PackageDatabase + ?Sized>(db: &D, arch: &str) -> bool {
    !is_generic_arch(arch) && !db.architectures().iter().any(|a| a == arch)
}

/// Resolve one candidate without touching manager state
fn evaluate<D: PackageDatabase + ?Sized>(
    resolver: &Resolver<'_, D>,
    archive: &CandidateArchive,
    denylist: &Denylist,
    wine_markers: &[String],
) -> Evaluation {
    let deb = archive.deb();
    let arch = deb.architecture();
    let finished = |status| Evaluation {
        status,
        wine_packages: None,
    };

    if arch_error(resolver.database(), arch) {
        debug!("{} has unsupported architecture {}", deb.name(), arch);
        return finished(PackageDependsStatus::broken(deb.name()));
    }

    if denylist.contains(deb.name()) {
        warn!("{} is denylisted", deb.name());
        return finished(PackageDependsStatus::prohibited(deb.name()));
    }

    let installed = resolver.check_installed_conflict(deb.name(), deb.version(), arch);
    if let Some(owner) = installed.offender() {
        debug!("{} breaks: installed package {} conflicts with it", deb.name(), owner);
        return finished(PackageDependsStatus::broken(owner));
    }

    let own = resolver.check_conflict(arch, deb.conflicts(), deb.replaces());
    if let Some(offender) = own.offender() {
        debug!("{} breaks: conflicts with installed {}", deb.name(), offender);
        return finished(PackageDependsStatus::broken(offender));
    }

    let mut chosen = ChosenSet::seeded(deb.name());
    let status = resolver.check_depends(&mut chosen, arch, deb.depends());
    debug!("Checked {} depends: {}", deb.name(), status.status);

    if !status.is_ok() {
        let wine = wine::wine_depends(resolver, arch, deb.depends(), wine_markers);
        if wine.is_wine_application {
            return Evaluation {
                status,
                wine_packages: Some(wine.packages),
            };
        }
    }

    finished(status)
}
