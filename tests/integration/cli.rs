//! The `patchlaunch` binary.

use crate::common::{TestOrigin, data_patch, tar_gz};
use assert_cmd::Command;
use patchlaunch::version::VersionStore;
use predicates::prelude::*;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn patchlaunch(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("patchlaunch").unwrap();
    cmd.env("NO_COLOR", "1")
        .env_remove("PATCHLAUNCH_CONFIG_PATH")
        .env_remove("PATCHLAUNCH_INSTALL_DIR")
        .env_remove("RUST_LOG")
        .arg("--install-dir")
        .arg(root);
    cmd
}

fn write_config(root: &Path, body: &str) {
    std::fs::write(root.join("patchlaunch.toml"), body).unwrap();
}

#[test]
fn test_status_without_record() {
    let root = tempdir().unwrap();

    patchlaunch(root.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed build: none"));
}

#[test]
fn test_status_json() {
    let root = tempdir().unwrap();
    VersionStore::in_install_root(root.path()).record_installed(13, "https://cdn.example.com").unwrap();

    patchlaunch(root.path())
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"local_version\": 13"))
        .stdout(predicate::str::contains("\"origin_server_id\": \"https://cdn.example.com\""));
}

#[test]
fn test_missing_config_fails_with_suggestion() {
    let root = tempdir().unwrap();

    patchlaunch(root.path())
        .args(["run", "--skip-update"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("patchlaunch.toml"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let root = tempdir().unwrap();
    write_config(root.path(), "origin = \"ftp://example.com\"\n");

    patchlaunch(root.path())
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("origin must be an http(s) URL"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_plan_prints_chain_without_downloading() {
    let origin = TestOrigin::start().await;
    origin.channel("stable", 12).await;
    origin.channel("dev", 13).await;
    origin.listing(13, &[12]).await;
    origin.patch(12, 13, tar_gz(data_patch(12, 13))).await;
    let root = tempdir().unwrap();
    write_config(root.path(), &format!("origin = \"{}\"\nchannel = \"dev\"\n", origin.url()));
    VersionStore::in_install_root(root.path()).record_installed(12, &origin.url()).unwrap();

    let mut cmd = patchlaunch(root.path());
    cmd.arg("plan");
    let output = tokio::task::spawn_blocking(move || cmd.output().unwrap()).await.unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Desired: 13"), "{stdout}");
    assert!(stdout.contains("Action: apply 1 patch(es): 13"), "{stdout}");
    assert_eq!(origin.hits("/builds/13/12.patch").await, 0);
    assert_eq!(VersionStore::in_install_root(root.path()).load().local_version, 12);
}

#[cfg(unix)]
#[test]
fn test_skip_update_launches_package_with_launcher_path() {
    use std::os::unix::fs::PermissionsExt;

    let root = tempdir().unwrap();
    write_config(root.path(), "origin = \"http://127.0.0.1:9\"\n");
    let app = root.path().join("app");
    std::fs::create_dir_all(&app).unwrap();
    let script = app.join("app");
    std::fs::write(&script, "#!/bin/sh\necho \"$@\" > args.tmp && mv args.tmp args.txt\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o644)).unwrap();

    patchlaunch(root.path())
        .args(["run", "--skip-update", "--", "--windowed"])
        .assert()
        .success();

    let args_file = app.join("args.txt");
    let deadline = Instant::now() + Duration::from_secs(10);
    while !args_file.exists() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
    let args = std::fs::read_to_string(&args_file).unwrap();
    assert!(args.starts_with("--launcher "), "{args}");
    assert!(args.trim_end().ends_with("--windowed"), "{args}");
}
