use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Host {
    _dir: TempDir,
    primary: PathBuf,
    backup: PathBuf,
    config: PathBuf,
}

impl Host {
    fn new(backup_mounted: bool) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let primary = root.join("boot");
        let backup = root.join("usb_backup");
        fs::create_dir_all(primary.join("config")).unwrap();
        fs::create_dir_all(&backup).unwrap();
        fs::write(primary.join("config").join("network.cfg"), "USE_DHCP=yes\n").unwrap();

        let mounts = root.join("mounts");
        let mut table = format!("/dev/sda1 {} vfat rw 0 0\n", primary.display());
        if backup_mounted {
            table.push_str(&format!("/dev/sdb1 {} ext4 rw 0 0\n", backup.display()));
        }
        fs::write(&mounts, table).unwrap();

        let config = root.join("config.yaml");
        fs::write(
            &config,
            format!(
                "primary_root: {}\nbackup_root: {}\nmount_table: {}\nnotify_command: {}\n",
                primary.display(),
                backup.display(),
                mounts.display(),
                root.join("no-such-notify").display(),
            ),
        )
        .unwrap();

        Self {
            _dir: dir,
            primary,
            backup,
            config,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("bootmirror").unwrap();
        cmd.env_remove("RUST_LOG").arg("--config").arg(&self.config);
        cmd
    }
}

fn backup_file(backup: &Path) -> PathBuf {
    backup.join("config").join("network.cfg")
}

#[test]
fn check_succeeds_when_both_roots_are_mounted() {
    let host = Host::new(true);
    host.cmd()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("primary").and(predicate::str::contains("backup")));
}

#[test]
fn check_fails_when_backup_is_not_a_mount() {
    let host = Host::new(false);
    host.cmd()
        .args(["check", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"backup_not_mounted\""))
        .stderr(predicate::str::contains("backup destination not a mount"));
}

#[test]
fn dry_run_sync_reports_work_and_writes_nothing() {
    let host = Host::new(true);
    let output = host
        .cmd()
        .args(["sync", "--json", "--dry-run"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["synced"], 1);
    assert!(!backup_file(&host.backup).exists());
    assert!(!host.backup.join("config").exists());
}

#[test]
fn sync_copies_the_tree() {
    let host = Host::new(true);
    host.cmd()
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 synced"));

    assert_eq!(
        fs::read_to_string(backup_file(&host.backup)).unwrap(),
        "USE_DHCP=yes\n"
    );
    assert!(host.primary.join("config").is_dir());
}

#[test]
fn sync_refuses_to_run_when_unavailable() {
    let host = Host::new(false);
    host.cmd()
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("sync aborted"));
    assert!(!backup_file(&host.backup).exists());
}

#[test]
fn config_prints_overrides() {
    let host = Host::new(true);
    host.cmd()
        .args(["config", "--dry-run", "--backup", "/mnt/elsewhere"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("backup_root: /mnt/elsewhere")
                .and(predicate::str::contains("dry_run: true")),
        );
}

#[test]
fn missing_config_file_is_an_error() {
    Command::cargo_bin("bootmirror")
        .unwrap()
        .args(["--config", "/nonexistent/bootmirror.yaml", "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load configuration"));
}
