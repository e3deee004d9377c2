#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use bootmirror_core::PathMapper;
use bootmirror_sync::{AlertChannel, DispatchError, Mirror, Notifier, Severity};
use filetime::FileTime;
use tempfile::TempDir;

pub const EXCLUDED: &str = "System Volume Information";

/// Alert channel that records every dispatched notification.
#[derive(Clone, Default)]
pub struct Recorder {
    pub sent: Arc<Mutex<Vec<(String, String, Severity)>>>,
}

impl Recorder {
    pub fn subjects(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(s, _, _)| s.clone()).collect()
    }
}

impl AlertChannel for Recorder {
    fn dispatch(&self, subject: &str, message: &str, severity: Severity) -> Result<(), DispatchError> {
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), message.to_string(), severity));
        Ok(())
    }
}

pub struct Trees {
    _dir: TempDir,
    pub primary: PathBuf,
    pub backup: PathBuf,
    pub alerts: Recorder,
}

impl Trees {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = TempDir::new().expect("tempdir");
        let primary = dir.path().join("boot");
        let backup = dir.path().join("usb_backup");
        fs::create_dir_all(&primary).expect("primary");
        fs::create_dir_all(&backup).expect("backup");
        Self {
            _dir: dir,
            primary,
            backup,
            alerts: Recorder::default(),
        }
    }

    pub fn mirror(&self, dry_run: bool) -> Mirror {
        let mapper = PathMapper::new(&self.primary, &self.backup, vec![EXCLUDED.to_string()]);
        let notifier = Notifier::new(
            Box::new(self.alerts.clone()),
            Duration::from_secs(300),
            dry_run,
        );
        Mirror::new(mapper, dry_run, notifier)
    }

    /// Write a primary file with a pinned mtime.
    pub fn write_primary(&self, rel: &str, contents: &[u8], mtime_unix: i64) -> PathBuf {
        write_pinned(&self.primary.join(rel), contents, mtime_unix)
    }

    pub fn write_backup(&self, rel: &str, contents: &[u8], mtime_unix: i64) -> PathBuf {
        write_pinned(&self.backup.join(rel), contents, mtime_unix)
    }

    /// Relative file paths in a tree, sorted. Directories end with `/`.
    pub fn listing(root: &Path) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(&dir).expect("read_dir") {
                let path = entry.expect("entry").path();
                let rel = path.strip_prefix(root).unwrap().display().to_string();
                if path.is_dir() {
                    out.push(format!("{rel}/"));
                    stack.push(path);
                } else {
                    out.push(rel);
                }
            }
        }
        out.sort();
        out
    }

    /// Primary and backup agree on existence, size and mtime for every
    /// non-excluded entry.
    pub fn assert_converged(&self) {
        let primary: Vec<_> = Self::listing(&self.primary)
            .into_iter()
            .filter(|p| !p.contains(EXCLUDED))
            .collect();
        let backup: Vec<_> = Self::listing(&self.backup)
            .into_iter()
            .filter(|p| !p.contains(EXCLUDED))
            .collect();
        assert_eq!(primary, backup, "tree shapes differ");
        for rel in primary.iter().filter(|p| !p.ends_with('/')) {
            let p = fs::metadata(self.primary.join(rel)).unwrap();
            let b = fs::metadata(self.backup.join(rel)).unwrap();
            assert_eq!(p.len(), b.len(), "size differs for {rel}");
            assert_eq!(
                p.modified().unwrap(),
                b.modified().unwrap(),
                "mtime differs for {rel}"
            );
        }
    }
}

pub fn write_pinned(path: &Path, contents: &[u8], mtime_unix: i64) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent");
    }
    fs::write(path, contents).expect("write");
    filetime::set_file_mtime(path, FileTime::from_unix_time(mtime_unix, 0)).expect("mtime");
    path.to_path_buf()
}

pub fn mtime(path: &Path) -> SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}
