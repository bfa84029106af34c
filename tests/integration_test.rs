// tests/integration_test.rs

//! Integration tests for deb-installer
//!
//! These tests build real `.deb` archives and dpkg/apt database files in a
//! temporary directory and drive the batch manager end to end.

use deb_installer::backend::{AptBackend, BackendFuture, PackageDatabase};
use deb_installer::config::{BackendConfig, InstallerConfig};
use deb_installer::manager::{InstallStatus, PackagesManager};
use deb_installer::resolver::DependsStatus;
use deb_installer::version::{RelationType, version_satisfies};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const STATUS: &str = "\
Package: libc6
Status: install ok installed
Architecture: amd64
Version: 2.31-13
Multi-Arch: same

Package: oldtool
Status: install ok installed
Architecture: amd64
Version: 1.0-1

Package: editor
Status: install ok installed
Architecture: amd64
Version: 3.0
Depends: libc6 (>= 2.28)

Package: removed-pkg
Status: deinstall ok config-files
Architecture: amd64
Version: 0.5
";

const PACKAGES: &str = "\
Package: libc6
Architecture: amd64
Version: 2.31-13
Multi-Arch: same

Package: libnew
Architecture: amd64
Version: 1.2-1
Depends: libc6 (>= 2.17)

Package: oldtool
Architecture: amd64
Version: 1.5-1

Package: ping
Architecture: amd64
Version: 1.0
Depends: pong

Package: pong
Architecture: amd64
Version: 1.0
Depends: ping
";

/// A dpkg status file and one apt list in a temporary root
struct SystemFixture {
    dir: TempDir,
}

impl SystemFixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("status"), STATUS).unwrap();
        fs::create_dir(dir.path().join("lists")).unwrap();
        fs::write(
            dir.path().join("lists/deb.example.org_dists_stable_main_binary-amd64_Packages"),
            PACKAGES,
        )
        .unwrap();
        Self { dir }
    }

    fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            dpkg_status: self.dir.path().join("status"),
            apt_lists: self.dir.path().join("lists"),
            index_cache: None,
            architectures: vec!["amd64".to_string(), "i386".to_string()],
        }
    }

    fn installer_config(&self) -> InstallerConfig {
        InstallerConfig {
            denylist: self.dir.path().join("denylist.txt"),
            ..InstallerConfig::default()
        }
    }

    fn manager(&self) -> PackagesManager<AptBackend> {
        let config = self.backend_config();
        let backend = BackendFuture::spawn(move || AptBackend::load(config));
        PackagesManager::new(backend, &self.installer_config())
    }

    fn deb(&self, file_name: &str, control: &str) -> PathBuf {
        write_deb(self.dir.path(), file_name, control)
    }
}

/// Build a minimal `.deb` holding only a gzip control member
fn write_deb(dir: &Path, file_name: &str, control: &str) -> PathBuf {
    let mut tar_builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(control.len() as u64);
    header.set_mode(0o644);
    tar_builder
        .append_data(&mut header, "./control", control.as_bytes())
        .unwrap();
    let tar_data = tar_builder.into_inner().unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_data).unwrap();
    let gz_data = encoder.finish().unwrap();

    let path = dir.join(file_name);
    let mut builder = ar::Builder::new(File::create(&path).unwrap());
    builder
        .append(&ar::Header::new(b"debian-binary".to_vec(), 4), &b"2.0\n"[..])
        .unwrap();
    builder
        .append(
            &ar::Header::new(b"control.tar.gz".to_vec(), gz_data.len() as u64),
            &gz_data[..],
        )
        .unwrap();
    path
}

fn control(name: &str, arch: &str, extra: &str) -> String {
    format!(
        "Package: {}\nVersion: 1.0\nArchitecture: {}\nMaintainer: Test <test@example.org>\nDescription: test\n{}",
        name, arch, extra
    )
}

#[test]
fn test_version_relations() {
    assert!(version_satisfies("1.0", RelationType::LessOrEqual, "1.0"));
    assert!(!version_satisfies("1.0", RelationType::LessThan, "1.0"));
    assert!(version_satisfies("1.0~rc1", RelationType::LessThan, "1.0"));
    assert!(version_satisfies("1:0.1", RelationType::GreaterThan, "9.9"));
    assert!(version_satisfies("2.31-13", RelationType::GreaterOrEqual, "2.28"));
    assert!(version_satisfies("1.0", RelationType::NotEqual, "1.0-1"));
    assert!(version_satisfies("anything", RelationType::NoOperation, ""));
}

#[test]
fn test_apt_backend_from_files() {
    let system = SystemFixture::new();
    let backend = AptBackend::load(system.backend_config()).unwrap();

    assert_eq!(backend.native_architecture(), "amd64");

    let libc = backend.package("libc6:amd64").unwrap();
    assert_eq!(libc.installed_version(), "2.31-13");

    // Installed 1.0-1, candidate upgraded from the list
    let oldtool = backend.package("oldtool").unwrap();
    assert_eq!(oldtool.installed_version(), "1.0-1");
    assert_eq!(oldtool.version, "1.5-1");

    // Config-files only is not installed; the lists do not carry it either
    assert!(backend.package("removed-pkg").is_none());

    let libnew = backend.package("libnew").unwrap();
    assert!(!libnew.is_installed());
}

#[test]
fn test_missing_backend_status_file() {
    let system = SystemFixture::new();
    let mut config = system.backend_config();
    config.dpkg_status = system.dir.path().join("no-such-status");
    assert!(AptBackend::load(config).is_err());
}

#[test]
fn test_index_cache_roundtrip() {
    let system = SystemFixture::new();
    let mut config = system.backend_config();
    config.index_cache = Some(system.dir.path().join("cache/index.db"));

    let first = AptBackend::load(config.clone()).unwrap();
    let second = AptBackend::load(config).unwrap();

    assert_eq!(first.packages().len(), second.packages().len());
    assert_eq!(
        second.package("oldtool").map(|p| p.version.clone()),
        Some("1.5-1".to_string())
    );
}

#[test]
fn test_check_batch_statuses() {
    let system = SystemFixture::new();
    let mut manager = system.manager();

    let ok = system.deb("ok.deb", &control("hello", "amd64", "Depends: libc6 (>= 2.28)\n"));
    let available = system.deb("available.deb", &control("newapp", "amd64", "Depends: libnew\n"));
    let broken = system.deb("broken.deb", &control("brokenapp", "amd64", "Depends: missing-lib\n"));
    let too_new = system.deb(
        "too-new.deb",
        &control("needy", "amd64", "Depends: libc6 (>= 3.0)\n"),
    );

    for path in [&ok, &available, &broken, &too_new] {
        assert!(manager.append_package(path).unwrap());
    }

    let statuses = manager.check_all_depends().unwrap();
    assert_eq!(statuses[0].status, DependsStatus::Ok);
    assert_eq!(statuses[1].status, DependsStatus::Available);
    assert_eq!(statuses[2].status, DependsStatus::Break);
    assert_eq!(statuses[2].package, "missing-lib");
    assert_eq!(statuses[3].status, DependsStatus::Break);
    assert_eq!(statuses[3].package, "libc6");

    assert_eq!(
        manager.package_available_depends(1).unwrap(),
        vec!["libnew:amd64".to_string()]
    );
    assert_eq!(
        manager.package_failed_reason(2).unwrap(),
        "Broken dependencies: missing-lib"
    );
}

#[test]
fn test_depends_status_is_idempotent() {
    let system = SystemFixture::new();
    let mut manager = system.manager();
    let path = system.deb("app.deb", &control("app", "amd64", "Depends: libnew | missing\n"));
    manager.append_package(&path).unwrap();

    let first = manager.get_package_depends_status(0).unwrap();
    let second = manager.get_package_depends_status(0).unwrap();
    assert_eq!(first, second);

    manager.reset_package_depends_status(0).unwrap();
    assert_eq!(manager.get_package_depends_status(0).unwrap(), first);
}

#[test]
fn test_same_archive_twice() {
    let system = SystemFixture::new();
    let mut manager = system.manager();
    let path = system.deb("app.deb", &control("app", "amd64", ""));
    let copy = system.dir.path().join("app-copy.deb");
    fs::copy(&path, &copy).unwrap();

    assert!(manager.append_package(&path).unwrap());
    assert!(!manager.append_package(&path).unwrap());
    // Identical content under another name is still a duplicate
    assert!(!manager.append_package(&copy).unwrap());
    assert_eq!(manager.len(), 1);
}

#[test]
fn test_unsafe_path_installs_through_link() {
    let system = SystemFixture::new();
    let spaced = system.dir.path().join("my debs");
    fs::create_dir(&spaced).unwrap();
    let path = write_deb(&spaced, "app;v1.deb", &control("app", "amd64", ""));

    let mut manager = system.manager();
    manager.append_package(&path).unwrap();

    let archive = manager.archive(0).unwrap();
    assert_eq!(archive.path(), path.as_path());
    assert_ne!(archive.install_path(), path.as_path());
    assert!(archive.install_path().is_symlink());
    assert_eq!(fs::read_link(archive.install_path()).unwrap(), path);
}

#[test]
fn test_remove_renumbers() {
    let system = SystemFixture::new();
    let mut manager = system.manager();
    let first = system.deb("a.deb", &control("a", "amd64", "Depends: missing-lib\n"));
    let second = system.deb("b.deb", &control("b", "amd64", "Depends: libnew\n"));
    let third = system.deb("c.deb", &control("c", "amd64", ""));
    for path in [&first, &second, &third] {
        manager.append_package(path).unwrap();
    }
    manager.check_all_depends().unwrap();

    manager.remove_package(0).unwrap();

    assert_eq!(manager.len(), 2);
    assert_eq!(manager.archive(0).unwrap().name(), "b");
    assert!(manager.get_package_depends_status(0).unwrap().is_available());
    assert!(manager.get_package_depends_status(1).unwrap().is_ok());
    assert!(manager.get_package_depends_status(2).is_err());

    // The removed archive can be queued again
    assert!(manager.append_package(&first).unwrap());
}

#[test]
fn test_conflict_cancelled_by_replaces() {
    let system = SystemFixture::new();
    let mut manager = system.manager();
    let conflicting = system.deb("newtool.deb", &control("newtool", "amd64", "Conflicts: oldtool\n"));
    let replacing = system.deb(
        "newtool2.deb",
        &control("newtool2", "amd64", "Conflicts: oldtool\nReplaces: oldtool\n"),
    );
    manager.append_package(&conflicting).unwrap();
    manager.append_package(&replacing).unwrap();

    let blocked = manager.get_package_depends_status(0).unwrap();
    assert!(blocked.is_break());
    assert_eq!(blocked.package, "oldtool");
    assert!(manager.get_package_depends_status(1).unwrap().is_ok());
}

#[test]
fn test_dependency_cycle_terminates() {
    let system = SystemFixture::new();
    let mut manager = system.manager();
    let path = system.deb("game.deb", &control("game", "amd64", "Depends: ping\n"));
    manager.append_package(&path).unwrap();

    let status = manager.get_package_depends_status(0).unwrap();
    assert!(status.is_available());

    let mut chosen = manager.package_available_depends(0).unwrap();
    chosen.sort();
    assert_eq!(chosen, vec!["ping:amd64".to_string(), "pong:amd64".to_string()]);
}

#[test]
fn test_denylist() {
    let system = SystemFixture::new();

    // No denylist file: nothing is prohibited
    let mut manager = system.manager();
    let path = system.deb("blocked.deb", &control("blocked-app", "amd64", ""));
    manager.append_package(&path).unwrap();
    assert!(manager.get_package_depends_status(0).unwrap().is_ok());

    fs::write(system.dir.path().join("denylist.txt"), "other-app,\n blocked-app ,").unwrap();
    let mut manager = system.manager();
    manager.append_package(&path).unwrap();
    let status = manager.get_package_depends_status(0).unwrap();
    assert!(status.is_prohibited());
    assert_eq!(
        manager.package_failed_reason(0).unwrap(),
        "The administrator has set policies to prevent installation of this package"
    );
}

#[test]
fn test_architectures() {
    let system = SystemFixture::new();
    let mut manager = system.manager();
    let all = system.deb("data.deb", &control("app-data", "all", ""));
    let foreign = system.deb("arm.deb", &control("arm-app", "arm64", ""));
    let multiarch = system.deb("i386.deb", &control("lib32app", "i386", ""));
    for path in [&all, &foreign, &multiarch] {
        manager.append_package(path).unwrap();
    }

    assert!(!manager.is_arch_error(0).unwrap());
    assert!(manager.is_arch_error(1).unwrap());
    assert!(!manager.is_arch_error(2).unwrap());

    assert!(manager.get_package_depends_status(0).unwrap().is_ok());
    assert!(manager.get_package_depends_status(1).unwrap().is_break());
    assert_eq!(
        manager.package_failed_reason(1).unwrap(),
        "Unmatched package architecture"
    );
}

#[test]
fn test_install_status_against_system() {
    let system = SystemFixture::new();
    let mut manager = system.manager();
    let same = system.deb(
        "editor-same.deb",
        "Package: editor\nVersion: 3.0\nArchitecture: amd64\n",
    );
    let newer = system.deb(
        "editor-new.deb",
        "Package: editor\nVersion: 3.1\nArchitecture: amd64\n",
    );
    let fresh = system.deb("fresh.deb", &control("fresh", "amd64", ""));
    for path in [&same, &newer, &fresh] {
        manager.append_package(path).unwrap();
    }

    assert_eq!(
        manager.package_install_status(0).unwrap(),
        InstallStatus::InstalledSameVersion
    );
    assert_eq!(
        manager.package_install_status(1).unwrap(),
        InstallStatus::InstalledEarlierVersion
    );
    assert_eq!(
        manager.package_installed_version(1).unwrap(),
        Some("3.0".to_string())
    );
    assert_eq!(
        manager.package_install_status(2).unwrap(),
        InstallStatus::NotInstalled
    );
}

#[test]
fn test_reverse_depends() {
    let system = SystemFixture::new();
    let mut manager = system.manager();
    assert_eq!(
        manager.package_reverse_depends("libc6", "amd64").unwrap(),
        vec!["editor".to_string()]
    );
    assert!(manager.package_reverse_depends("unknown", "amd64").unwrap().is_empty());
}
