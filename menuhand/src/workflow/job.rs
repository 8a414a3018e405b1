use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::AutomationError;
use crate::navigation::{MatchMode, RestaurantRef};
use crate::workflow::payload::{KdsConfigPayload, MenuDeployPayload, PrinterSetupPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    MenuDeploy,
    KdsConfig,
    PrinterSetup,
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobType::MenuDeploy => write!(f, "menu-deploy"),
            JobType::KdsConfig => write!(f, "kds-config"),
            JobType::PrinterSetup => write!(f, "printer-setup"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum JobPayload {
    MenuDeploy(MenuDeployPayload),
    KdsConfig(KdsConfigPayload),
    PrinterSetup(PrinterSetupPayload),
}

impl JobPayload {
    pub fn job_type(&self) -> JobType {
        match self {
            JobPayload::MenuDeploy(_) => JobType::MenuDeploy,
            JobPayload::KdsConfig(_) => JobType::KdsConfig,
            JobPayload::PrinterSetup(_) => JobType::PrinterSetup,
        }
    }

    pub fn validate(&self) -> Result<(), AutomationError> {
        match self {
            JobPayload::MenuDeploy(p) => p.validate(),
            JobPayload::KdsConfig(p) => p.validate(),
            JobPayload::PrinterSetup(p) => p.validate(),
        }
    }
}

/// One unit of configuration work against one restaurant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowJob {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub restaurant: RestaurantRef,
    #[serde(default)]
    pub match_mode: MatchMode,
    pub payload: JobPayload,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl WorkflowJob {
    pub fn new(restaurant: RestaurantRef, payload: JobPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            restaurant,
            match_mode: MatchMode::default(),
            payload,
            progress: 0,
            status: JobStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn job_type(&self) -> JobType {
        self.payload.job_type()
    }

    /// Raise progress to `percent` (capped at 100). Progress never moves
    /// backwards; the effective value is returned.
    pub fn advance_progress(&mut self, percent: u8) -> u8 {
        self.progress = self.progress.max(percent.min(100));
        self.progress
    }

    pub fn set_status(&mut self, status: JobStatus) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
    }
}
