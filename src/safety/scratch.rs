/// Per-request scratch areas for worker runs
/// Each request gets `<base>/<uuid>/<token-hash>/` holding its credential file.
/// The random root is removed on every exit path.
use crate::config::types::{GraderError, Result};
use crate::safety::safe_cleanup;
use crate::utils::trace;
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

const DIR_MODE: u32 = 0o700;
const CREDENTIALS_MODE: u32 = 0o600;

/// Private working directory of one grading request
#[derive(Debug)]
pub struct ScratchArea {
    run_id: String,
    /// Random directory owning the whole area
    root: PathBuf,
    /// Directory handed to the worker
    path: PathBuf,
    credentials_file_path: PathBuf,
    cleaned: AtomicBool,
}

impl ScratchArea {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn credentials_file_path(&self) -> &Path {
        &self.credentials_file_path
    }

    /// Remove the random root (idempotent). Failures are logged and reported
    /// through the return value, never raised.
    pub fn cleanup(&self) -> bool {
        if self.cleaned.swap(true, Ordering::SeqCst) {
            return true;
        }

        match safe_cleanup::remove_tree_secure(&self.root) {
            Ok(()) => {
                log::debug!("Removed scratch area {}", self.root.display());
                true
            }
            Err(e) => {
                log::warn!(
                    "Failed to remove scratch area {}: {}",
                    self.root.display(),
                    e
                );
                false
            }
        }
    }
}

impl Drop for ScratchArea {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Creates scratch areas under one base directory
#[derive(Clone, Debug)]
pub struct ScratchManager {
    base_dir: PathBuf,
    credentials_file_name: String,
}

impl ScratchManager {
    pub fn new(base_dir: impl Into<PathBuf>, credentials_file_name: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            credentials_file_name: credentials_file_name.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Create a fresh area for `trace_token` and write the credential blob
    /// into it before returning.
    pub fn acquire(&self, trace_token: &str, credentials: &[u8]) -> Result<ScratchArea> {
        fs::create_dir_all(&self.base_dir).map_err(|e| {
            GraderError::Filesystem(format!(
                "Failed to create scratch base directory {}: {}",
                self.base_dir.display(),
                e
            ))
        })?;

        let run_id = Uuid::new_v4().to_string();
        let root = self.base_dir.join(&run_id);
        create_private_dir(&root)?;

        let path = root.join(trace::token_hash(trace_token));
        let credentials_file_path = path.join(&self.credentials_file_name);

        // From here on Drop removes the root if anything below fails
        let area = ScratchArea {
            run_id,
            root,
            path,
            credentials_file_path,
            cleaned: AtomicBool::new(false),
        };

        create_private_dir(&area.path)?;
        write_credentials(&area.credentials_file_path, credentials)?;

        Ok(area)
    }

    /// Remove scratch roots older than `max_age` left behind by a crash.
    /// Only uuid-named directories are considered.
    pub fn sweep_stale(&self, max_age: Duration) -> Result<usize> {
        let mut removed = 0;
        let now = SystemTime::now();

        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(GraderError::Filesystem(format!(
                    "Failed to read scratch base directory {}: {}",
                    self.base_dir.display(),
                    e
                )))
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Failed to read directory entry: {}", e);
                    continue;
                }
            };

            let is_run_dir = entry
                .file_name()
                .to_str()
                .map(|name| Uuid::parse_str(name).is_ok())
                .unwrap_or(false);
            if !is_run_dir {
                continue;
            }

            let path = entry.path();
            let metadata = match fs::symlink_metadata(&path) {
                Ok(m) if m.is_dir() => m,
                Ok(_) => continue,
                Err(e) => {
                    log::warn!("Failed to get metadata for {}: {}", path.display(), e);
                    continue;
                }
            };

            let age = match metadata.modified().map(|m| now.duration_since(m)) {
                Ok(Ok(age)) => age,
                // Unreadable or future timestamp
                _ => continue,
            };

            if age >= max_age {
                log::info!("Sweeping stale scratch area: {}", path.display());
                match safe_cleanup::remove_tree_secure(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        log::warn!("Failed to sweep {}: {}", path.display(), e)
                    }
                }
            }
        }

        Ok(removed)
    }
}

fn create_private_dir(path: &Path) -> Result<()> {
    DirBuilder::new().mode(DIR_MODE).create(path).map_err(|e| {
        GraderError::Filesystem(format!(
            "Failed to create scratch directory {}: {}",
            path.display(),
            e
        ))
    })
}

fn write_credentials(path: &Path, credentials: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(CREDENTIALS_MODE)
        .open(path)
        .map_err(|e| {
            GraderError::Filesystem(format!(
                "Failed to create credential file {}: {}",
                path.display(),
                e
            ))
        })?;

    file.write_all(credentials)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn manager(dir: &Path) -> ScratchManager {
        ScratchManager::new(dir.join("scratch"), "azureauth.json")
    }

    #[test]
    fn test_acquire_layout_and_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        let area = manager.acquire("student@example.com", b"{\"k\":1}").unwrap();
        assert!(area.path().starts_with(area.root()));
        assert_eq!(area.root().parent(), Some(manager.base_dir()));
        assert_eq!(
            area.path().file_name().unwrap().to_str().unwrap(),
            trace::token_hash("student@example.com")
        );
        assert_eq!(
            fs::read(area.credentials_file_path()).unwrap(),
            b"{\"k\":1}"
        );

        let dir_mode = fs::metadata(area.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700);
        let file_mode = fs::metadata(area.credentials_file_path())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(file_mode, 0o600);
    }

    #[test]
    fn test_same_trace_gets_distinct_areas() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        let a = manager.acquire("NoTrace", b"a").unwrap();
        let b = manager.acquire("NoTrace", b"b").unwrap();
        assert_ne!(a.root(), b.root());
        assert_eq!(fs::read(a.credentials_file_path()).unwrap(), b"a");
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let area = manager(dir.path()).acquire("t", b"x").unwrap();
        let root = area.root().to_path_buf();

        assert!(area.cleanup());
        assert!(!root.exists());
        assert!(area.cleanup());
    }

    #[test]
    fn test_drop_removes_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = {
            let area = manager(dir.path()).acquire("t", b"x").unwrap();
            fs::write(area.path().join("TestResult.xml"), b"<test-run/>").unwrap();
            area.root().to_path_buf()
        };
        assert!(!root.exists());
    }

    #[test]
    fn test_sweep_stale_only_touches_run_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        let area = manager.acquire("t", b"x").unwrap();
        let root = area.root().to_path_buf();
        std::mem::forget(area);

        let unrelated = manager.base_dir().join("keep-me");
        fs::create_dir(&unrelated).unwrap();

        let removed = manager.sweep_stale(Duration::ZERO).unwrap();
        assert_eq!(removed, 1);
        assert!(!root.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_sweep_keeps_fresh_areas() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let area = manager.acquire("t", b"x").unwrap();

        assert_eq!(manager.sweep_stale(Duration::from_secs(3600)).unwrap(), 0);
        assert!(area.root().exists());
    }

    #[test]
    fn test_sweep_missing_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(manager(dir.path()).sweep_stale(Duration::ZERO).unwrap(), 0);
    }
}
