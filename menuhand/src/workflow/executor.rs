//! The job executor port and the hooks the orchestrator reports through.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AutomationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// What the surrounding job runner provides to a running workflow.
#[async_trait::async_trait]
pub trait JobExecutor: Send + Sync {
    async fn update_job_progress(
        &self,
        job_id: Uuid,
        percent: u8,
        message: &str,
    ) -> Result<(), AutomationError>;

    async fn log(&self, level: LogLevel, message: &str);

    async fn sleep(&self, duration: Duration);
}

/// Checkpoint callbacks. Every method defaults to a no-op (or a plain sleep
/// for `pause`).
#[async_trait::async_trait]
pub trait WorkflowHooks: Send + Sync {
    async fn on_progress(&self, _percent: u8, _message: &str) {}

    async fn on_screenshot(&self, _tag: &str) {}

    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

pub struct NoopHooks;

impl WorkflowHooks for NoopHooks {}

/// Forwards hooks to a [`JobExecutor`] for one job.
pub struct ExecutorHooks {
    executor: Arc<dyn JobExecutor>,
    job_id: Uuid,
}

impl ExecutorHooks {
    pub fn new(executor: Arc<dyn JobExecutor>, job_id: Uuid) -> Self {
        Self { executor, job_id }
    }
}

#[async_trait::async_trait]
impl WorkflowHooks for ExecutorHooks {
    async fn on_progress(&self, percent: u8, message: &str) {
        if let Err(e) = self
            .executor
            .update_job_progress(self.job_id, percent, message)
            .await
        {
            warn!("Progress update for job {} failed: {}", self.job_id, e);
        }
    }

    async fn on_screenshot(&self, tag: &str) {
        self.executor
            .log(LogLevel::Info, &format!("Screenshot captured: {tag}"))
            .await
    }

    async fn pause(&self, duration: Duration) {
        self.executor.sleep(duration).await
    }
}
