//! Multi-phase configuration jobs.
//!
//! Every job runs strictly sequentially on one session: validate the
//! payload, make sure the session is logged in, switch to the restaurant,
//! then walk the phases in dependency order. Per-item failures are folded
//! into the aggregate and the job carries on; structural failures (auth,
//! navigation, cancellation) abort the job at once.

pub mod executor;
pub mod job;
mod kds;
mod menu;
pub mod payload;
mod printer;
pub mod progress;
pub mod result;

use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::auth::AuthSessionController;
use crate::config::PortalConfig;
use crate::errors::AutomationError;
use crate::navigation::NavigationController;
use crate::pages::{KdsEditor, MenuEditor, PrinterEditor};
use crate::session::Session;

pub use executor::{ExecutorHooks, JobExecutor, LogLevel, NoopHooks, WorkflowHooks};
pub use job::{JobPayload, JobStatus, JobType, WorkflowJob};
pub use payload::{
    CategorySpec, ItemSpec, KdsConfigPayload, MenuDeployPayload, ModifierAssignment,
    PrinterSetupPayload, PrinterSpec, StationSpec,
};
pub use progress::ProgressWindow;
pub use result::{AggregateResult, EntityKind, EntityTally, ItemError, JobResult, OperationResult};

/// Hooks and cancellation for one run.
#[derive(Clone)]
pub struct RunContext {
    pub hooks: Arc<dyn WorkflowHooks>,
    pub cancel: CancellationToken,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            hooks: Arc::new(NoopHooks),
            cancel: CancellationToken::new(),
        }
    }
}

impl RunContext {
    pub fn new(hooks: Arc<dyn WorkflowHooks>) -> Self {
        Self {
            hooks,
            ..Default::default()
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Mutable state of one job while it runs.
pub(crate) struct JobRun<'a> {
    job: &'a mut WorkflowJob,
    ctx: &'a RunContext,
    aggregate: AggregateResult,
}

impl<'a> JobRun<'a> {
    fn start(job: &'a mut WorkflowJob, ctx: &'a RunContext) -> Self {
        job.set_status(JobStatus::Running);
        Self {
            job,
            ctx,
            aggregate: AggregateResult::default(),
        }
    }

    pub(crate) async fn progress(&mut self, percent: u8, message: &str) {
        let percent = self.job.advance_progress(percent);
        self.ctx.hooks.on_progress(percent, message).await;
    }

    /// Cooperative cancellation point between operations.
    pub(crate) fn checkpoint(&self) -> Result<(), AutomationError> {
        if self.ctx.cancel.is_cancelled() {
            Err(AutomationError::Cancelled(format!("Job {} cancelled", self.job.id)))
        } else {
            Ok(())
        }
    }

    pub(crate) fn declare(&mut self, kind: EntityKind) {
        self.aggregate.declare(kind);
    }

    /// Fold one operation into the aggregate. Structural errors pass
    /// through as `Err` and end the job.
    pub(crate) fn record(
        &mut self,
        kind: EntityKind,
        phase: &str,
        entity: &str,
        outcome: Result<OperationResult, AutomationError>,
    ) -> Result<bool, AutomationError> {
        let op = outcome?;
        self.aggregate.record(kind, phase, entity, &op);
        Ok(op.success)
    }

    pub(crate) fn record_bulk(&mut self, kind: EntityKind, count: usize) {
        self.aggregate.record_bulk(kind, count);
    }
}

/// Create an entity unless `skip_if_exists` is set and it already exists.
pub async fn create_if_missing<E, EFut, C, CFut>(
    skip_if_exists: bool,
    exists: E,
    create: C,
) -> Result<OperationResult, AutomationError>
where
    E: FnOnce() -> EFut,
    EFut: Future<Output = Result<bool, AutomationError>>,
    C: FnOnce() -> CFut,
    CFut: Future<Output = Result<(), AutomationError>>,
{
    if skip_if_exists {
        match exists().await {
            Ok(true) => return Ok(OperationResult::skipped()),
            Ok(false) => {}
            Err(e) if e.is_structural() => return Err(e),
            Err(e) => return Ok(OperationResult::failed(e.to_string())),
        }
    }
    OperationResult::settle(create().await)
}

pub struct WorkflowOrchestrator {
    session: Arc<Session>,
    auth: Arc<AuthSessionController>,
    navigator: Arc<NavigationController>,
    menu: Arc<dyn MenuEditor>,
    kds: Arc<dyn KdsEditor>,
    printers: Arc<dyn PrinterEditor>,
    config: Arc<PortalConfig>,
}

/// The editors a [`WorkflowOrchestrator`] drives.
pub struct Editors {
    pub menu: Arc<dyn MenuEditor>,
    pub kds: Arc<dyn KdsEditor>,
    pub printers: Arc<dyn PrinterEditor>,
}

impl WorkflowOrchestrator {
    pub fn new(
        session: Arc<Session>,
        auth: Arc<AuthSessionController>,
        navigator: Arc<NavigationController>,
        editors: Editors,
        config: Arc<PortalConfig>,
    ) -> Self {
        Self {
            session,
            auth,
            navigator,
            menu: editors.menu,
            kds: editors.kds,
            printers: editors.printers,
            config,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Run `job` with whatever payload it carries.
    pub async fn execute(&self, job: &mut WorkflowJob, ctx: &RunContext) -> JobResult {
        match job.payload.clone() {
            JobPayload::MenuDeploy(p) => self.execute_menu_deploy(job, &p, ctx).await,
            JobPayload::KdsConfig(p) => self.execute_kds_config(job, &p, ctx).await,
            JobPayload::PrinterSetup(p) => self.execute_printer_setup(job, &p, ctx).await,
        }
    }

    /// Run `job` reporting to an external executor.
    pub async fn execute_with_executor(
        &self,
        job: &mut WorkflowJob,
        executor: Arc<dyn JobExecutor>,
        cancel: CancellationToken,
    ) -> JobResult {
        let ctx = RunContext::new(Arc::new(ExecutorHooks::new(executor.clone(), job.id)))
            .with_cancel(cancel);
        executor
            .log(LogLevel::Info, &format!("Starting {} job {}", job.job_type(), job.id))
            .await;
        let result = self.execute(job, &ctx).await;
        let level = if result.success {
            LogLevel::Info
        } else {
            LogLevel::Error
        };
        executor
            .log(level, &format!("Job {} finished: {}", job.id, job.status))
            .await;
        result
    }

    /// Login and restaurant switch. A redirect to sign-in during the switch
    /// triggers one re-authentication and a second attempt.
    #[instrument(skip(self, run), fields(job = %run.job.id))]
    async fn prepare(&self, run: &mut JobRun<'_>) -> Result<(), AutomationError> {
        run.checkpoint()?;
        self.auth.ensure_session(&self.session).await?;
        run.progress(progress::PREPARE.at(2, 4), "Session ready").await;

        run.checkpoint()?;
        let restaurant = run.job.restaurant.clone();
        let mode = run.job.match_mode;
        match self
            .navigator
            .switch_to_restaurant(&self.session, &restaurant, mode)
            .await
        {
            Ok(_) => {}
            Err(AutomationError::SessionExpired(reason)) => {
                warn!("Session expired during restaurant switch ({}), re-authenticating", reason);
                self.auth.ensure_session(&self.session).await?;
                self.navigator
                    .switch_to_restaurant(&self.session, &restaurant, mode)
                    .await?;
            }
            Err(e) => return Err(e),
        }
        run.progress(progress::PREPARE.end, "Restaurant selected").await;
        Ok(())
    }

    /// Screenshot and reset after a failed item, so the next item starts
    /// from a clean page.
    async fn after_failure(&self, ctx: &RunContext, job_type: JobType, phase: &str, index: usize) {
        self.capture(ctx, &format!("{phase}-{index}-failed")).await;
        self.close_dialogs(job_type).await;
    }

    async fn close_dialogs(&self, job_type: JobType) {
        match job_type {
            JobType::MenuDeploy => self.menu.close_dialogs().await,
            JobType::KdsConfig => self.kds.close_dialogs().await,
            JobType::PrinterSetup => self.printers.close_dialogs().await,
        }
    }

    /// Screenshot through the session and notify the hooks.
    async fn capture(&self, ctx: &RunContext, tag: &str) {
        self.session.take_screenshot(tag).await;
        ctx.hooks.on_screenshot(tag).await;
    }

    /// Pause between entity operations.
    async fn pace(&self, ctx: &RunContext) {
        let delay = self.config.action_delay();
        if !delay.is_zero() {
            ctx.hooks.pause(delay).await;
        }
    }

    /// Turn the outcome of the phases into the job result and final status.
    async fn finish(&self, run: JobRun<'_>, outcome: Result<(), AutomationError>) -> JobResult {
        let JobRun {
            job,
            ctx,
            aggregate,
        } = run;
        match outcome {
            Ok(()) => {
                let result = JobResult::completed(aggregate);
                job.set_status(if result.success {
                    JobStatus::Completed
                } else {
                    JobStatus::Failed
                });
                let percent = job.advance_progress(100);
                ctx.hooks.on_progress(percent, "Done").await;
                info!(
                    "Job {} finished: success={}, {} item errors",
                    job.id,
                    result.success,
                    result.errors().len()
                );
                self.capture(ctx, &format!("job-{}-done", job.id)).await;
                result
            }
            Err(e) => {
                error!("Job {} aborted: {}", job.id, e);
                self.capture(ctx, &format!("job-{}-aborted", job.id)).await;
                job.set_status(match &e {
                    AutomationError::Cancelled(_) => JobStatus::Cancelled,
                    _ => JobStatus::Failed,
                });
                JobResult::aborted(&e)
            }
        }
    }
}
