//! On-disk persistence of pre-session device state.
//!
//! Two kinds of files live in the backup directory: rotating historical
//! snapshots for forensics, and one `current-session.json` recovery copy
//! that survives a crash between capture and restore. A `session.lock`
//! file keeps a second process instance from clobbering the recovery copy.

use chrono::{DateTime, Utc};
use huedeck_hid_via_protocol::RgbState;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How many rotating snapshots to keep before pruning the oldest.
pub const MAX_ROTATING_BACKUPS: usize = 10;

const ROTATING_PREFIX: &str = "rgb-backup-";
const ROTATING_SUFFIX: &str = ".json";
const SESSION_FILE: &str = "current-session.json";
const LOCK_FILE: &str = "session.lock";

/// Persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("backup io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("backup serialization failure: {0}")]
    Serde(#[from] serde_json::Error),

    /// Another live process already holds the session lock.
    #[error("another session holds the backup lock (pid {pid})")]
    SessionActive { pid: u32 },
}

/// One captured device lighting state, stamped at capture time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub rgb: RgbState,
}

impl Snapshot {
    pub fn now(rgb: RgbState) -> Self {
        Self {
            timestamp: Utc::now(),
            rgb,
        }
    }
}

/// Backup directory handle.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    /// Open (creating if needed) the backup directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save a rotating historical snapshot and prune beyond the cap.
    pub fn save_rotating(&self, snapshot: &Snapshot) -> Result<PathBuf, PersistenceError> {
        let name = format!(
            "{ROTATING_PREFIX}{}{ROTATING_SUFFIX}",
            snapshot.timestamp.format("%Y-%m-%dT%H-%M-%S%.3f")
        );
        let path = self.dir.join(name);
        fs::write(&path, serde_json::to_vec_pretty(snapshot)?)?;
        info!(path = %path.display(), "backup saved");
        self.rotate()?;
        Ok(path)
    }

    /// The most recent rotating snapshot, if any parse.
    pub fn latest(&self) -> Result<Option<Snapshot>, PersistenceError> {
        for name in self.rotating_names_newest_first()? {
            match self.read_snapshot(&self.dir.join(&name)) {
                Ok(snapshot) => return Ok(Some(snapshot)),
                Err(e) => warn!(file = %name, "skipping unreadable backup: {e}"),
            }
        }
        Ok(None)
    }

    /// Persist the crash-recovery copy for the current session.
    pub fn save_session(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        let path = self.dir.join(SESSION_FILE);
        fs::write(&path, serde_json::to_vec_pretty(snapshot)?)?;
        debug!(path = %path.display(), "session backup saved");
        Ok(())
    }

    /// Load the crash-recovery copy.
    ///
    /// On this path a read or parse failure means "nothing to restore":
    /// the error is logged and swallowed, never raised.
    pub fn load_session(&self) -> Option<Snapshot> {
        let path = self.dir.join(SESSION_FILE);
        match self.read_snapshot(&path) {
            Ok(snapshot) => Some(snapshot),
            Err(PersistenceError::Io(e)) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!("session backup unreadable, treating as absent: {e}");
                None
            }
        }
    }

    /// Remove the crash-recovery copy. Missing file is not an error.
    pub fn clear_session(&self) -> Result<(), PersistenceError> {
        let path = self.dir.join(SESSION_FILE);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("session backup cleared");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Take the single-instance session lock.
    ///
    /// The lock file records the owning PID. A lock whose owner is provably
    /// dead (Linux: `/proc/<pid>` gone) is stale and taken over; anywhere
    /// else the conservative answer is to refuse.
    pub fn acquire_lock(&self) -> Result<SessionLock, PersistenceError> {
        match self.try_create_lock() {
            Ok(lock) => Ok(lock),
            Err(PersistenceError::SessionActive { pid }) if pid_is_dead(pid) => {
                warn!(pid, "taking over stale session lock from dead process");
                fs::remove_file(self.lock_path())?;
                self.try_create_lock()
            }
            Err(e) => Err(e),
        }
    }

    fn try_create_lock(&self) -> Result<SessionLock, PersistenceError> {
        let path = self.lock_path();
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                write!(file, "{}", std::process::id())?;
                debug!(path = %path.display(), "session lock acquired");
                Ok(SessionLock { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let pid = fs::read_to_string(&path)
                    .ok()
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(0);
                Err(PersistenceError::SessionActive { pid })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    fn read_snapshot(&self, path: &Path) -> Result<Snapshot, PersistenceError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn rotating_names_newest_first(&self) -> Result<Vec<String>, PersistenceError> {
        let mut names: Vec<String> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with(ROTATING_PREFIX) && name.ends_with(ROTATING_SUFFIX))
            .collect();
        // Timestamped names sort lexicographically; newest first.
        names.sort();
        names.reverse();
        Ok(names)
    }

    fn rotate(&self) -> Result<(), PersistenceError> {
        let names = self.rotating_names_newest_first()?;
        for name in names.iter().skip(MAX_ROTATING_BACKUPS) {
            fs::remove_file(self.dir.join(name))?;
            info!(file = %name, "rotated out old backup");
        }
        Ok(())
    }
}

/// Held for the lifetime of one controller session.
#[derive(Debug)]
pub struct SessionLock {
    path: PathBuf,
}

impl SessionLock {
    /// Remove the lock file. Failure only gets logged; the process is
    /// usually exiting when this runs.
    pub fn release(self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!("session lock release failed: {e}");
            }
        }
    }
}

#[cfg(target_os = "linux")]
fn pid_is_dead(pid: u32) -> bool {
    pid != 0 && !Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(not(target_os = "linux"))]
fn pid_is_dead(_pid: u32) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_rgb() -> RgbState {
        RgbState {
            brightness: Some(180),
            effect: Some(2),
            effect_speed: Some(7),
            hue: Some(100),
            saturation: Some(255),
        }
    }

    fn snapshot_at(seconds: u32) -> Snapshot {
        Snapshot {
            timestamp: Utc
                .with_ymd_and_hms(2026, 3, 1, 12, 0, seconds)
                .single()
                .expect("valid timestamp"),
            rgb: sample_rgb(),
        }
    }

    #[test]
    fn test_session_backup_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = BackupStore::new(dir.path()).expect("store");

        assert!(store.load_session().is_none());
        let snapshot = Snapshot::now(sample_rgb());
        store.save_session(&snapshot).expect("save");
        assert_eq!(store.load_session(), Some(snapshot));
        store.clear_session().expect("clear");
        assert!(store.load_session().is_none());
    }

    #[test]
    fn test_clear_session_without_backup_is_ok() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = BackupStore::new(dir.path()).expect("store");
        store.clear_session().expect("clear is a no-op");
    }

    #[test]
    fn test_corrupt_session_backup_reads_as_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = BackupStore::new(dir.path()).expect("store");
        fs::write(dir.path().join(SESSION_FILE), b"{not json").expect("write");
        assert!(store.load_session().is_none());
    }

    #[test]
    fn test_rotation_prunes_oldest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = BackupStore::new(dir.path()).expect("store");
        for seconds in 0..(MAX_ROTATING_BACKUPS as u32 + 3) {
            store.save_rotating(&snapshot_at(seconds)).expect("save");
        }
        let names = store.rotating_names_newest_first().expect("list");
        assert_eq!(names.len(), MAX_ROTATING_BACKUPS);
        // The newest snapshots survive.
        let latest = store.latest().expect("latest").expect("present");
        assert_eq!(latest, snapshot_at(MAX_ROTATING_BACKUPS as u32 + 2));
    }

    #[test]
    fn test_latest_skips_unreadable_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = BackupStore::new(dir.path()).expect("store");
        store.save_rotating(&snapshot_at(1)).expect("save");
        fs::write(
            dir.path().join(format!("{ROTATING_PREFIX}9999{ROTATING_SUFFIX}")),
            b"garbage",
        )
        .expect("write");
        assert_eq!(store.latest().expect("latest"), Some(snapshot_at(1)));
    }

    #[test]
    fn test_second_lock_acquisition_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = BackupStore::new(dir.path()).expect("store");
        let lock = store.acquire_lock().expect("first lock");
        let err = store.acquire_lock().expect_err("second must fail");
        assert!(matches!(err, PersistenceError::SessionActive { pid } if pid == std::process::id()));
        lock.release();
        store.acquire_lock().expect("after release").release();
    }

    #[test]
    fn test_stale_lock_from_dead_pid_is_taken_over() {
        if !cfg!(target_os = "linux") {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let store = BackupStore::new(dir.path()).expect("store");
        // PIDs wrap far below this on Linux; nothing alive should own it.
        fs::write(dir.path().join(LOCK_FILE), b"4294000000").expect("write");
        store.acquire_lock().expect("stale lock takeover").release();
    }
}
