//! In-process implementations of the engine's outer ports.

use menuhand::workflow::{JobExecutor, LogLevel};
use menuhand::{AutomationError, ScreenshotSink};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Reports job progress and logs through `tracing`.
pub struct LocalExecutor;

#[async_trait::async_trait]
impl JobExecutor for LocalExecutor {
    async fn update_job_progress(
        &self,
        job_id: Uuid,
        percent: u8,
        message: &str,
    ) -> Result<(), AutomationError> {
        info!(job = %job_id, "[{:>3}%] {}", percent, message);
        Ok(())
    }

    async fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => debug!("{}", message),
            LogLevel::Info => info!("{}", message),
            LogLevel::Warn => warn!("{}", message),
            LogLevel::Error => error!("{}", message),
        }
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

/// Writes screenshots as `<millis>-<tag>.png` into a directory.
pub struct DirScreenshotSink {
    dir: PathBuf,
}

impl DirScreenshotSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_name(tag: &str) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let tag: String = tag
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!("{millis}-{tag}.png")
    }
}

#[async_trait::async_trait]
impl ScreenshotSink for DirScreenshotSink {
    async fn save(&self, tag: &str, png: Vec<u8>) -> Result<(), AutomationError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AutomationError::Internal(format!("Cannot create {}: {e}", self.dir.display())))?;
        let path = self.dir.join(Self::file_name(tag));
        tokio::fs::write(&path, png)
            .await
            .map_err(|e| AutomationError::Internal(format!("Cannot write {}: {e}", path.display())))?;
        debug!("Screenshot saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn screenshots_land_in_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirScreenshotSink::new(dir.path().join("shots"));
        sink.save("items-1/failed", vec![0x89, b'P', b'N', b'G'])
            .await
            .unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("shots"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with("-items-1_failed.png"), "{entries:?}");
    }
}
