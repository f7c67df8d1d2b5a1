//! Update session against a mock origin.

use crate::common::{TestOrigin, data, data_patch, package, tar_gz, zip};
use patchlaunch::channel::HttpReleaseChannels;
use patchlaunch::config::{LauncherConfig, ReleaseChannel};
use patchlaunch::download::Downloader;
use patchlaunch::index::HttpPatchIndex;
use patchlaunch::platform::LinuxPlatform;
use patchlaunch::progress::ProgressSink;
use patchlaunch::session::{SessionOutcome, UpdateSession};
use patchlaunch::test_utils::{ArchiveBuilder, FixtureEntry, init_test_logging};
use patchlaunch::version::VersionStore;
use std::path::Path;
use tempfile::tempdir;

async fn run_session(config: &LauncherConfig, root: &Path, sink: &ProgressSink) -> SessionOutcome {
    init_test_logging(None);
    let downloader = Downloader::new().unwrap();
    let index = HttpPatchIndex::new(config.clone()).unwrap();
    let channels = HttpReleaseChannels::new(config.clone()).unwrap();
    UpdateSession::new(config, &LinuxPlatform, &index, &channels, &downloader, root).run(sink).await.unwrap()
}

fn dev_config(origin: &TestOrigin) -> LauncherConfig {
    let mut config = origin.config();
    config.channel = ReleaseChannel::Dev;
    config
}

/// Install root with build `build` already in place.
fn installed(root: &Path, origin: &str, build: u32) {
    let app = root.join("app");
    std::fs::create_dir_all(&app).unwrap();
    std::fs::write(app.join("app"), b"#!/bin/sh\nexit 0\n").unwrap();
    std::fs::write(app.join("data.txt"), data(build)).unwrap();
    VersionStore::in_install_root(root).record_installed(build, origin).unwrap();
}

#[tokio::test]
async fn test_fresh_install_downloads_stable() {
    let origin = TestOrigin::start().await;
    origin.channel("stable", 12).await;
    origin.package(12, package(12)).await;
    let root = tempdir().unwrap();
    let config = origin.config();

    let outcome = run_session(&config, root.path(), &ProgressSink::disconnected()).await;

    assert_eq!(outcome, SessionOutcome::Updated(12));
    assert_eq!(std::fs::read(root.path().join("app/data.txt")).unwrap(), data(12));
    let record = VersionStore::in_install_root(root.path()).load();
    assert_eq!(record.local_version, 12);
    assert_eq!(record.origin_server_id, config.origin_id());
    assert!(record.updated_at.is_some());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(root.path().join("app/app")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}

#[tokio::test]
async fn test_patch_chain_through_waypoint() {
    let origin = TestOrigin::start().await;
    origin.channel("stable", 12).await;
    origin.channel("dev", 13).await;
    origin.listing(13, &[12]).await;
    origin.listing(12, &[10, 11]).await;
    origin.patch(10, 12, tar_gz(data_patch(10, 12))).await;
    origin
        .patch(
            12,
            13,
            zip(data_patch(12, 13).entry(FixtureEntry::file("levels/one.txt", b"level one"))),
        )
        .await;
    let root = tempdir().unwrap();
    let config = dev_config(&origin);
    installed(root.path(), config.origin_id(), 10);

    let (sink, mut receiver) = ProgressSink::channel();
    let outcome = run_session(&config, root.path(), &sink).await;
    drop(sink);

    assert_eq!(outcome, SessionOutcome::Updated(13));
    assert_eq!(std::fs::read(root.path().join("app/data.txt")).unwrap(), data(13));
    assert_eq!(std::fs::read(root.path().join("app/levels/one.txt")).unwrap(), b"level one");
    assert_eq!(VersionStore::in_install_root(root.path()).load().local_version, 13);
    assert_eq!(origin.hits("/builds/13/Linux.tar.gz").await, 0);

    let mut labels = Vec::new();
    while let Some(event) = receiver.recv().await {
        if let Some(label) = event.label {
            labels.push(label);
        }
    }
    let applying: Vec<&str> = labels.iter().map(String::as_str).filter(|l| l.starts_with("Applying")).collect();
    assert_eq!(applying, ["Applying patch 10 -> 12", "Applying patch 12 -> 13"]);
}

#[tokio::test]
async fn test_mid_chain_failure_keeps_last_completed_hop() {
    let origin = TestOrigin::start().await;
    origin.channel("stable", 12).await;
    origin.channel("dev", 14).await;
    origin.listing(14, &[12]).await;
    origin.listing(12, &[10]).await;
    origin.patch(10, 12, tar_gz(data_patch(10, 12))).await;
    // 12 -> 14 is listed but never served.
    let root = tempdir().unwrap();
    let config = dev_config(&origin);
    installed(root.path(), config.origin_id(), 10);

    let outcome = run_session(&config, root.path(), &ProgressSink::disconnected()).await;

    // Already on stable after the first hop, so no fallback install.
    assert_eq!(outcome, SessionOutcome::Abandoned(12));
    assert_eq!(VersionStore::in_install_root(root.path()).load().local_version, 12);
    assert_eq!(std::fs::read(root.path().join("app/data.txt")).unwrap(), data(12));
    assert_eq!(origin.hits("/builds/12/Linux.tar.gz").await, 0);
}

#[tokio::test]
async fn test_resume_from_last_completed_hop() {
    let origin = TestOrigin::start().await;
    origin.channel("stable", 12).await;
    origin.channel("dev", 14).await;
    origin.listing(14, &[12]).await;
    origin.patch(12, 14, tar_gz(data_patch(12, 14))).await;
    let root = tempdir().unwrap();
    let config = dev_config(&origin);
    installed(root.path(), config.origin_id(), 12);

    let outcome = run_session(&config, root.path(), &ProgressSink::disconnected()).await;

    assert_eq!(outcome, SessionOutcome::Updated(14));
    assert_eq!(std::fs::read(root.path().join("app/data.txt")).unwrap(), data(14));
}

#[tokio::test]
async fn test_unreachable_falls_back_to_stable() {
    let origin = TestOrigin::start().await;
    origin.channel("stable", 12).await;
    origin.channel("dev", 13).await;
    origin.package(12, package(12)).await;
    let root = tempdir().unwrap();
    let config = dev_config(&origin);
    installed(root.path(), config.origin_id(), 9);

    let outcome = run_session(&config, root.path(), &ProgressSink::disconnected()).await;

    assert_eq!(outcome, SessionOutcome::FellBackToStable(12));
    assert_eq!(VersionStore::in_install_root(root.path()).load().local_version, 12);
    assert_eq!(std::fs::read(root.path().join("app/data.txt")).unwrap(), data(12));
}

#[tokio::test]
async fn test_escaping_patch_falls_back_to_stable() {
    let origin = TestOrigin::start().await;
    origin.channel("stable", 12).await;
    origin.channel("dev", 13).await;
    origin.listing(13, &[11]).await;
    origin
        .patch(11, 13, tar_gz(ArchiveBuilder::new().entry(FixtureEntry::file("../../escaped.txt", b"x"))))
        .await;
    origin.package(12, package(12)).await;
    let root = tempdir().unwrap();
    let config = dev_config(&origin);
    installed(root.path(), config.origin_id(), 11);

    let outcome = run_session(&config, root.path(), &ProgressSink::disconnected()).await;

    assert_eq!(outcome, SessionOutcome::FellBackToStable(12));
    assert!(!root.path().join("escaped.txt").exists());
    assert!(!root.path().parent().unwrap().join("escaped.txt").exists());
}

#[tokio::test]
async fn test_missing_patch_base_falls_back_to_stable() {
    let origin = TestOrigin::start().await;
    origin.channel("stable", 12).await;
    origin.channel("dev", 13).await;
    origin.listing(13, &[11]).await;
    origin
        .patch(
            11,
            13,
            tar_gz(ArchiveBuilder::new().entry(FixtureEntry::bsdiff("levels/two.bin", b"old level", b"new level"))),
        )
        .await;
    origin.package(12, package(12)).await;
    let root = tempdir().unwrap();
    let config = dev_config(&origin);
    installed(root.path(), config.origin_id(), 11);

    let outcome = run_session(&config, root.path(), &ProgressSink::disconnected()).await;

    assert_eq!(outcome, SessionOutcome::FellBackToStable(12));
    assert_eq!(VersionStore::in_install_root(root.path()).load().local_version, 12);
    assert_eq!(std::fs::read(root.path().join("app/data.txt")).unwrap(), data(12));
    assert!(!root.path().join("app/levels/two.bin").exists());
}

#[tokio::test]
async fn test_failed_stable_install_is_not_retried() {
    let origin = TestOrigin::start().await;
    origin.channel("stable", 12).await;
    origin.broken_package(12).await;
    let root = tempdir().unwrap();
    let config = origin.config();

    let outcome = run_session(&config, root.path(), &ProgressSink::disconnected()).await;

    assert_eq!(outcome, SessionOutcome::Abandoned(0));
    assert_eq!(origin.hits("/builds/12/Linux.tar.gz").await, 1);
    assert!(VersionStore::in_install_root(root.path()).load().is_unknown());
}

#[tokio::test]
async fn test_failed_reinstall_of_newer_build_is_not_retried() {
    let origin = TestOrigin::start().await;
    origin.channel("stable", 12).await;
    origin.broken_package(12).await;
    let root = tempdir().unwrap();
    let config = origin.config();
    installed(root.path(), config.origin_id(), 15);

    let outcome = run_session(&config, root.path(), &ProgressSink::disconnected()).await;

    assert_eq!(outcome, SessionOutcome::Abandoned(15));
    assert_eq!(origin.hits("/builds/12/Linux.tar.gz").await, 1);
    assert_eq!(std::fs::read(root.path().join("app/data.txt")).unwrap(), data(15));
}

#[tokio::test]
async fn test_foreign_origin_is_reinstalled() {
    let origin = TestOrigin::start().await;
    origin.channel("stable", 12).await;
    origin.package(12, package(12)).await;
    let root = tempdir().unwrap();
    let config = origin.config();
    installed(root.path(), "https://mirror.example.com", 12);
    std::fs::write(root.path().join("app/data.txt"), b"mirror content").unwrap();

    let outcome = run_session(&config, root.path(), &ProgressSink::disconnected()).await;

    assert_eq!(outcome, SessionOutcome::Updated(12));
    assert_eq!(std::fs::read(root.path().join("app/data.txt")).unwrap(), data(12));
    assert_eq!(VersionStore::in_install_root(root.path()).load().origin_server_id, config.origin_id());
}

#[tokio::test]
async fn test_newer_than_desired_reinstalls_stable() {
    let origin = TestOrigin::start().await;
    origin.channel("stable", 12).await;
    origin.package(12, package(12)).await;
    let root = tempdir().unwrap();
    let config = origin.config();
    installed(root.path(), config.origin_id(), 15);

    let outcome = run_session(&config, root.path(), &ProgressSink::disconnected()).await;

    assert_eq!(outcome, SessionOutcome::Updated(12));
    assert_eq!(VersionStore::in_install_root(root.path()).load().local_version, 12);
}

#[tokio::test]
async fn test_full_install_then_patch_to_dev() {
    let origin = TestOrigin::start().await;
    origin.channel("stable", 12).await;
    origin.channel("dev", 13).await;
    origin.package(12, package(12)).await;
    origin.listing(13, &[12]).await;
    origin.patch(12, 13, tar_gz(data_patch(12, 13))).await;
    let root = tempdir().unwrap();
    let config = dev_config(&origin);

    let outcome = run_session(&config, root.path(), &ProgressSink::disconnected()).await;

    assert_eq!(outcome, SessionOutcome::Updated(13));
    assert_eq!(std::fs::read(root.path().join("app/data.txt")).unwrap(), data(13));
    assert_eq!(origin.hits("/builds/12/Linux.tar.gz").await, 1);
}

#[tokio::test]
async fn test_up_to_date_downloads_nothing() {
    let origin = TestOrigin::start().await;
    origin.channel("stable", 12).await;
    let root = tempdir().unwrap();
    let config = origin.config();
    installed(root.path(), config.origin_id(), 12);

    let outcome = run_session(&config, root.path(), &ProgressSink::disconnected()).await;

    assert_eq!(outcome, SessionOutcome::UpToDate(12));
    assert_eq!(origin.hits("/builds").await, 0);
}
