//! Waits for an image to finish being written before it is read.
//!
//! Each attempt opens the file for reading and takes a non-blocking exclusive
//! lock (`flock` on Unix, `LockFileEx` on Windows via `fs2`). On Windows the
//! open additionally denies all sharing, so a writer that still holds the
//! file makes the open itself fail. Either failure means "not yet", and the
//! attempt is retried after a fixed interval.
//!
//! Unix has no share modes and ordinary writers never lock, so there the
//! file's size and modification time must also hold still across one full
//! interval before it counts as complete.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::time::Instant;

const REQUIRE_QUIET_INTERVAL: bool = !cfg!(windows);

/// Size and modification time seen by one successful attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    len: u64,
    modified: Option<SystemTime>,
}

#[derive(Debug, Clone)]
pub struct StabilityGate {
    poll_interval: Duration,
    max_wait: Option<Duration>,
}

impl StabilityGate {
    pub fn new(poll_interval: Duration, max_wait: Option<Duration>) -> Self {
        Self {
            poll_interval,
            max_wait,
        }
    }

    /// Block until `path` can be opened exclusively and, outside Windows,
    /// has stopped changing.
    ///
    /// Retries forever unless a maximum wait was configured. Only the calling
    /// task is suspended.
    pub async fn wait_until_stable(&self, path: &Path) -> Result<(), StabilityError> {
        let started = Instant::now();
        let mut attempts: u32 = 0;
        let mut previous: Option<Snapshot> = None;

        loop {
            attempts += 1;
            match try_exclusive(path) {
                Ok(snapshot) if !REQUIRE_QUIET_INTERVAL || previous == Some(snapshot) => {
                    if attempts > 2 {
                        tracing::debug!(
                            path = %path.display(),
                            attempts,
                            waited_ms = started.elapsed().as_millis() as u64,
                            "File became readable"
                        );
                    }
                    return Ok(());
                }
                Ok(snapshot) => {
                    if previous.is_some() {
                        tracing::trace!(
                            path = %path.display(),
                            len = snapshot.len,
                            "File still growing"
                        );
                    }
                    previous = Some(snapshot);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(StabilityError::Vanished(path.to_path_buf()));
                }
                Err(e) => {
                    previous = None;
                    tracing::trace!(path = %path.display(), error = %e, "File still busy");
                }
            }

            if let Some(max_wait) = self.max_wait {
                if started.elapsed() >= max_wait {
                    return Err(StabilityError::TimedOut {
                        path: path.to_path_buf(),
                        waited: started.elapsed(),
                    });
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Open `path` with no sharing and hold an exclusive lock for an instant.
/// Dropping the handle releases the lock.
fn try_exclusive(path: &Path) -> io::Result<Snapshot> {
    let file = open_unshared(path)?;
    // Fully qualified: newer std has an inherent `File::try_lock_exclusive`
    // with a different error type.
    FileExt::try_lock_exclusive(&file)?;
    let meta = file.metadata()?;
    Ok(Snapshot {
        len: meta.len(),
        modified: meta.modified().ok(),
    })
}

#[cfg(windows)]
fn open_unshared(path: &Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;
    OpenOptions::new().read(true).share_mode(0).open(path)
}

#[cfg(not(windows))]
fn open_unshared(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).open(path)
}

#[derive(Debug, thiserror::Error)]
pub enum StabilityError {
    #[error("File disappeared before it could be read: {0}")]
    Vanished(PathBuf),

    #[error("File {path} still being written after {waited:?}")]
    TimedOut { path: PathBuf, waited: Duration },
}
