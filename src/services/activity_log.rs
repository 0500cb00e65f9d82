use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only pipeline log shared by every processing unit.
///
/// Each append holds the lock for the whole open-write-flush sequence, so
/// lines from concurrent units never interleave.
pub struct ActivityLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ActivityLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line. Creates the file and its parent on demand.
    pub async fn append(&self, message: &str) -> std::io::Result<()> {
        let line = format_line(chrono::Local::now(), message);

        let _guard = self.lock.lock().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Append, reporting a failed write through tracing instead of the caller.
    pub async fn record(&self, message: &str) {
        if let Err(e) = self.append(message).await {
            tracing::error!(
                log = %self.path.display(),
                error = %e,
                "Failed to append to activity log"
            );
        }
    }
}

fn format_line<Tz: chrono::TimeZone>(at: chrono::DateTime<Tz>, message: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    // Embedded newlines would split one event across lines.
    let message = message.replace(['\r', '\n'], " ");
    format!("{}: {}\n", at.format("%Y-%m-%d %H:%M:%S"), message)
}

pub fn start_message(path: &Path) -> String {
    format!("Processing new image - {}", path.display())
}

pub fn success_message(path: &Path) -> String {
    format!("Image {} classified successfully", path.display())
}

pub fn skipped_message(path: &Path) -> String {
    format!("Image {} already processed, skipped", path.display())
}

pub fn routed_message(path: &Path, category: &str, result_document: &Path) -> String {
    format!(
        "Image {} routed to {} and result saved to {}",
        path.display(),
        category,
        result_document.display()
    )
}

pub fn failure_message(path: &Path, error: &dyn std::fmt::Display) -> String {
    format!("Error processing image {} - {}", path.display(), error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    #[test]
    fn test_line_format() {
        let at = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 8, 30, 5).unwrap();
        assert_eq!(
            format_line(at, "Processing new image - /in/a.jpg"),
            "2024-01-01 08:30:05: Processing new image - /in/a.jpg\n"
        );
    }

    #[test]
    fn test_newlines_flattened() {
        let at = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            format_line(at, "status 500:\nbad gateway"),
            "2024-01-01 00:00:00: status 500: bad gateway\n"
        );
    }

    #[test]
    fn test_message_wording() {
        let image = Path::new("/in/2024-01-01/SN123/img1.jpg");
        assert_eq!(
            skipped_message(image),
            "Image /in/2024-01-01/SN123/img1.jpg already processed, skipped"
        );
        assert_eq!(
            routed_message(image, "FAIL", Path::new("/out/FAIL/img1_result.json")),
            "Image /in/2024-01-01/SN123/img1.jpg routed to FAIL and result saved to \
             /out/FAIL/img1_result.json"
        );
    }

    #[tokio::test]
    async fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log = ActivityLog::new(dir.path().join("out").join("log.txt"));

        tokio_test::assert_ok!(log.append("first").await);
        tokio_test::assert_ok!(log.append("second").await);

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(": first"));
        assert!(lines[1].ends_with(": second"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(ActivityLog::new(dir.path().join("log.txt")));
        let payload_a = "A".repeat(512);
        let payload_b = "B".repeat(512);

        let writers = [("a", payload_a.clone()), ("b", payload_b.clone())]
            .into_iter()
            .map(|(tag, payload)| {
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    for i in 0..100 {
                        log.append(&format!("{tag}-{i} {payload}")).await.unwrap();
                    }
                })
            });
        for result in futures::future::join_all(writers).await {
            result.unwrap();
        }

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 200);
        for line in lines {
            let (_, message) = line.split_once(": ").unwrap();
            let (_, body) = message.split_once(' ').unwrap();
            assert!(body == payload_a || body == payload_b, "interleaved line: {line}");
        }
    }
}
