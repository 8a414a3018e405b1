use tracing::{info, instrument};

use super::progress::{split, PHASES_END, PREPARE};
use super::{
    create_if_missing, EntityKind, JobResult, JobRun, JobType, OperationResult,
    PrinterSetupPayload, RunContext, WorkflowJob, WorkflowOrchestrator,
};
use crate::errors::AutomationError;

// Clear, printers, station assignments, test prints, routing options.
const WEIGHTS: [u32; 5] = [10, 40, 25, 15, 10];

impl WorkflowOrchestrator {
    /// Register printers, assign them to stations and optionally test them.
    #[instrument(skip_all, fields(job = %job.id))]
    pub async fn execute_printer_setup(
        &self,
        job: &mut WorkflowJob,
        payload: &PrinterSetupPayload,
        ctx: &RunContext,
    ) -> JobResult {
        let mut run = JobRun::start(job, ctx);
        run.declare(EntityKind::Printers);
        if payload.printers.iter().any(|p| !p.station_assignment.is_empty()) {
            run.declare(EntityKind::StationAssignments);
        }

        let outcome = self.printer_setup(&mut run, payload).await;
        self.close_dialogs(JobType::PrinterSetup).await;
        self.finish(run, outcome).await
    }

    async fn printer_setup(
        &self,
        run: &mut JobRun<'_>,
        payload: &PrinterSetupPayload,
    ) -> Result<(), AutomationError> {
        payload.validate()?;
        self.prepare(run).await?;
        self.printers.open_printers().await?;

        let windows = split(PREPARE.end, PHASES_END, &WEIGHTS);

        if payload.clear_existing {
            run.checkpoint()?;
            run.progress(windows[0].start, "Removing existing printers").await;
            match self.printers.clear_printers().await {
                Ok(removed) => {
                    info!("Removed {} existing printers", removed);
                    run.record_bulk(EntityKind::Removed, removed);
                }
                Err(e) if e.is_structural() => return Err(e),
                Err(e) => {
                    run.record(
                        EntityKind::Removed,
                        "clear",
                        "printers",
                        Ok(OperationResult::failed(e.to_string())),
                    )?;
                    self.after_failure(run.ctx, JobType::PrinterSetup, "clear", 0)
                        .await;
                }
            }
        }

        let total = payload.printers.len();
        let mut available = Vec::with_capacity(total);
        for (i, printer) in payload.printers.iter().enumerate() {
            run.checkpoint()?;
            run.progress(windows[1].at(i, total), &format!("Printer {}", printer.name))
                .await;
            let outcome = create_if_missing(
                payload.skip_if_exists,
                || self.printers.printer_exists(&printer.name),
                || self.printers.create_printer(printer),
            )
            .await;
            let ok = run.record(EntityKind::Printers, "printers", &printer.name, outcome)?;
            if !ok {
                self.after_failure(run.ctx, JobType::PrinterSetup, "printers", i)
                    .await;
            }
            available.push(ok);
            self.pace(run.ctx).await;
        }

        let total: usize = payload.printers.iter().map(|p| p.station_assignment.len()).sum();
        let mut step = 0;
        for (printer, ok) in payload.printers.iter().zip(available.iter().copied()) {
            for station in &printer.station_assignment {
                run.checkpoint()?;
                run.progress(
                    windows[2].at(step, total),
                    &format!("Assigning {} to {}", printer.name, station),
                )
                .await;
                let entity = format!("{} / {}", printer.name, station);
                let outcome = if ok {
                    OperationResult::settle(self.printers.assign_station(&printer.name, station).await)
                } else {
                    Ok(OperationResult::failed(format!(
                        "Printer '{}' is not available",
                        printer.name
                    )))
                };
                if !run.record(EntityKind::StationAssignments, "assignments", &entity, outcome)? && ok {
                    self.after_failure(run.ctx, JobType::PrinterSetup, "assignments", step)
                        .await;
                }
                step += 1;
            }
        }

        if payload.test_after_setup {
            run.declare(EntityKind::TestPrints);
            let total = payload.printers.len();
            for (i, (printer, ok)) in payload.printers.iter().zip(available).enumerate() {
                if !ok {
                    continue;
                }
                run.checkpoint()?;
                run.progress(windows[3].at(i, total), &format!("Test print on {}", printer.name))
                    .await;
                let outcome = OperationResult::settle(self.printers.test_print(&printer.name).await);
                if !run.record(EntityKind::TestPrints, "test-print", &printer.name, outcome)? {
                    self.after_failure(run.ctx, JobType::PrinterSetup, "test-print", i)
                        .await;
                }
            }
        }

        if let Some(options) = &payload.routing_config {
            run.declare(EntityKind::RoutingOptions);
            let total = options.len();
            for (i, (option, enabled)) in options.iter().enumerate() {
                run.checkpoint()?;
                run.progress(windows[4].at(i, total), &format!("Routing option {option}"))
                    .await;
                let outcome =
                    OperationResult::settle(self.printers.set_routing_option(option, *enabled).await);
                if !run.record(EntityKind::RoutingOptions, "routing-options", option, outcome)? {
                    self.after_failure(run.ctx, JobType::PrinterSetup, "routing-options", i)
                        .await;
                }
            }
        }
        Ok(())
    }
}
