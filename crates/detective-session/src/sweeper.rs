//! Artifact cleanup in the shared upload directory.
//!
//! Uploads, screenshots and clips for every session share one directory.
//! Evidence files follow the `<role>_<session_id>_<suffix>` naming convention,
//! which is the only thing tying a file to its session. The primary upload
//! is tracked by path in the session record instead.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Role tag encoded in an evidence file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactRole {
    /// Still frame captured from the video.
    Screenshot,
    /// Extracted video segment.
    Clip,
}

impl ArtifactRole {
    /// Every role swept on session teardown.
    pub const ALL: [ArtifactRole; 2] = [ArtifactRole::Screenshot, ArtifactRole::Clip];

    /// File name tag for this role.
    pub fn tag(&self) -> &'static str {
        match self {
            ArtifactRole::Screenshot => "screenshot",
            ArtifactRole::Clip => "clip",
        }
    }

    /// File name prefix shared by all of a session's artifacts with this role.
    pub fn prefix_for(&self, session_id: &str) -> String {
        format!("{}_{}_", self.tag(), session_id)
    }
}

impl fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Build the conventional file name for a session artifact.
pub fn artifact_name(role: ArtifactRole, session_id: &str, suffix: &str) -> String {
    format!("{}{}", role.prefix_for(session_id), suffix)
}

/// A file that could not be removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFailure {
    /// Path that was being removed or inspected.
    pub path: PathBuf,
    /// Error message from the filesystem.
    pub error: String,
}

/// Outcome of a sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Files removed.
    pub removed: Vec<PathBuf>,
    /// Files (or the directory itself) that could not be processed.
    pub failed: Vec<SweepFailure>,
}

impl SweepReport {
    /// True when nothing failed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: SweepReport) {
        self.removed.extend(other.removed);
        self.failed.extend(other.failed);
    }

    fn fail(&mut self, path: &Path, error: &io::Error) {
        self.failed.push(SweepFailure {
            path: path.to_path_buf(),
            error: error.to_string(),
        });
    }
}

type RemoveFn = dyn Fn(&Path) -> io::Result<()> + Send + Sync;

/// Removes expired or session-owned files from the upload directory.
///
/// Each deletion is isolated: a failure is logged and recorded in the
/// [`SweepReport`], and the sweep moves on to the next candidate.
#[derive(Clone)]
pub struct ArtifactSweeper {
    upload_dir: PathBuf,
    remove: Arc<RemoveFn>,
}

impl fmt::Debug for ArtifactSweeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactSweeper")
            .field("upload_dir", &self.upload_dir)
            .finish_non_exhaustive()
    }
}

impl ArtifactSweeper {
    /// Create a sweeper for `upload_dir`.
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            remove: Arc::new(|path: &Path| fs::remove_file(path)),
        }
    }

    /// Replace the function used to delete files.
    pub fn with_remover<F>(mut self, remove: F) -> Self
    where
        F: Fn(&Path) -> io::Result<()> + Send + Sync + 'static,
    {
        self.remove = Arc::new(remove);
        self
    }

    /// The directory this sweeper works on.
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Create the upload directory if it does not exist yet.
    pub fn ensure_upload_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.upload_dir).map_err(|e| Error::io(&self.upload_dir, e))
    }

    /// Remove every regular file last modified strictly before `cutoff`.
    pub fn sweep_expired(&self, cutoff: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();

        for path in self.list_files(&mut report) {
            let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not read modification time");
                    report.fail(&path, &e);
                    continue;
                }
            };

            if modified < cutoff {
                self.remove_one(&path, &mut report);
            }
        }

        if !report.removed.is_empty() {
            info!(
                count = report.removed.len(),
                dir = %self.upload_dir.display(),
                "Removed old upload files"
            );
        }

        report
    }

    /// Remove a session's primary upload and all of its evidence files.
    pub fn sweep_session(&self, session_id: &str, primary: Option<&Path>) -> SweepReport {
        let mut report = SweepReport::default();

        if let Some(path) = primary {
            self.remove_one(path, &mut report);
        }

        if session_id.is_empty() {
            return report;
        }

        let prefixes: Vec<String> = ArtifactRole::ALL
            .iter()
            .map(|role| role.prefix_for(session_id))
            .collect();

        for path in self.list_files(&mut report) {
            let owned = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| prefixes.iter().any(|p| name.starts_with(p.as_str())));
            if owned {
                self.remove_one(&path, &mut report);
            }
        }

        debug!(
            session_id = %session_id,
            removed = report.removed.len(),
            failed = report.failed.len(),
            "Swept session artifacts"
        );

        report
    }

    /// Regular files directly inside the upload directory.
    fn list_files(&self, report: &mut SweepReport) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.upload_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(dir = %self.upload_dir.display(), error = %e, "Could not list upload directory");
                report.fail(&self.upload_dir, &e);
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .map(|entry| entry.path())
            .collect()
    }

    fn remove_one(&self, path: &Path, report: &mut SweepReport) {
        match (self.remove)(path) {
            Ok(()) => {
                info!(path = %path.display(), "Deleted file");
                report.removed.push(path.to_path_buf());
            }
            // Already gone, e.g. removed by a concurrent sweep.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Error deleting file");
                report.fail(path, &e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, age: Duration) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
        path
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(
            artifact_name(ArtifactRole::Screenshot, "abc", "1.png"),
            "screenshot_abc_1.png"
        );
        assert_eq!(artifact_name(ArtifactRole::Clip, "abc", "2.mp4"), "clip_abc_2.mp4");
    }

    #[test]
    fn test_sweep_expired_removes_only_old_files() {
        let dir = TempDir::new().unwrap();
        let old_a = touch(dir.path(), "old_a.mp4", Duration::from_secs(3 * 3600));
        let old_b = touch(dir.path(), "old_b.png", Duration::from_secs(3 * 3600));
        let fresh = touch(dir.path(), "fresh.mp4", Duration::from_secs(60));
        fs::create_dir(dir.path().join("subdir")).unwrap();

        let sweeper = ArtifactSweeper::new(dir.path());
        let report = sweeper.sweep_expired(SystemTime::now() - Duration::from_secs(2 * 3600));

        assert!(report.is_clean());
        assert_eq!(report.removed.len(), 2);
        assert!(!old_a.exists());
        assert!(!old_b.exists());
        assert!(fresh.exists());
        assert!(dir.path().join("subdir").is_dir());
    }

    #[test]
    fn test_sweep_expired_continues_past_failure() {
        let dir = TempDir::new().unwrap();
        for i in 0..4 {
            touch(dir.path(), &format!("old_{i}"), Duration::from_secs(7200));
        }
        let fresh = touch(dir.path(), "fresh", Duration::ZERO);

        let sweeper = ArtifactSweeper::new(dir.path()).with_remover(|path| {
            if path.ends_with("old_2") {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
            } else {
                fs::remove_file(path)
            }
        });
        let report = sweeper.sweep_expired(SystemTime::now() - Duration::from_secs(3600));

        assert_eq!(report.removed.len(), 3);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].path.ends_with("old_2"));
        assert!(dir.path().join("old_2").exists());
        assert!(fresh.exists());
    }

    #[test]
    fn test_sweep_expired_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let sweeper = ArtifactSweeper::new(dir.path().join("missing"));
        let report = sweeper.sweep_expired(SystemTime::now());
        assert_eq!(report, SweepReport::default());
    }

    #[test]
    fn test_sweep_session_is_scoped() {
        let dir = TempDir::new().unwrap();
        let shot = touch(dir.path(), "screenshot_abc_1", Duration::ZERO);
        let clip = touch(dir.path(), "clip_abc_1", Duration::ZERO);
        let other = touch(dir.path(), "screenshot_abcd_1", Duration::ZERO);
        let foreign = touch(dir.path(), "screenshot_xyz_1", Duration::ZERO);
        let video = touch(dir.path(), "video.mp4", Duration::ZERO);

        let sweeper = ArtifactSweeper::new(dir.path());
        let report = sweeper.sweep_session("abc", Some(&video));

        assert!(report.is_clean());
        assert_eq!(report.removed.len(), 3);
        assert!(!shot.exists());
        assert!(!clip.exists());
        assert!(!video.exists());
        assert!(other.exists());
        assert!(foreign.exists());
    }

    #[test]
    fn test_sweep_session_empty_id_matches_nothing() {
        let dir = TempDir::new().unwrap();
        let shot = touch(dir.path(), "screenshot__x_1", Duration::ZERO);
        let clip = touch(dir.path(), "clip__x_1", Duration::ZERO);

        let report = ArtifactSweeper::new(dir.path()).sweep_session("", None);

        assert!(report.removed.is_empty());
        assert!(shot.exists());
        assert!(clip.exists());
    }

    #[test]
    fn test_sweep_session_missing_primary_is_not_a_failure() {
        let dir = TempDir::new().unwrap();
        let sweeper = ArtifactSweeper::new(dir.path());
        let report = sweeper.sweep_session("abc", Some(&dir.path().join("gone.mp4")));
        assert!(report.is_clean());
        assert!(report.removed.is_empty());
    }

    #[test]
    fn test_ensure_upload_dir() {
        let dir = TempDir::new().unwrap();
        let uploads = dir.path().join("static").join("uploads");
        let sweeper = ArtifactSweeper::new(&uploads);
        sweeper.ensure_upload_dir().unwrap();
        assert!(uploads.is_dir());
    }
}
