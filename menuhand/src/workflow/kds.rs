use tracing::{info, instrument};

use super::payload::setting_text;
use super::progress::{split, PHASES_END, PREPARE};
use super::{
    create_if_missing, EntityKind, JobResult, JobRun, JobType, KdsConfigPayload, OperationResult,
    RunContext, WorkflowJob, WorkflowOrchestrator,
};
use crate::errors::AutomationError;

// Clear, template, stations, routing, display settings.
const WEIGHTS: [u32; 5] = [10, 5, 30, 45, 10];

impl WorkflowOrchestrator {
    /// Create prep stations and route menu entries to them.
    #[instrument(skip_all, fields(job = %job.id))]
    pub async fn execute_kds_config(
        &self,
        job: &mut WorkflowJob,
        payload: &KdsConfigPayload,
        ctx: &RunContext,
    ) -> JobResult {
        let mut run = JobRun::start(job, ctx);
        run.declare(EntityKind::Stations);
        if payload.stations.iter().any(|s| s.has_routing()) {
            run.declare(EntityKind::Routing);
        }

        let outcome = self.kds_config(&mut run, payload).await;
        self.close_dialogs(JobType::KdsConfig).await;
        self.finish(run, outcome).await
    }

    async fn kds_config(
        &self,
        run: &mut JobRun<'_>,
        payload: &KdsConfigPayload,
    ) -> Result<(), AutomationError> {
        payload.validate()?;
        self.prepare(run).await?;
        self.kds.open_kds().await?;

        let windows = split(PREPARE.end, PHASES_END, &WEIGHTS);

        if payload.clear_existing {
            run.checkpoint()?;
            run.progress(windows[0].start, "Removing existing stations").await;
            match self.kds.clear_stations().await {
                Ok(removed) => {
                    info!("Removed {} existing stations", removed);
                    run.record_bulk(EntityKind::Removed, removed);
                }
                Err(e) if e.is_structural() => return Err(e),
                Err(e) => {
                    run.record(
                        EntityKind::Removed,
                        "clear",
                        "stations",
                        Ok(OperationResult::failed(e.to_string())),
                    )?;
                    self.after_failure(run.ctx, JobType::KdsConfig, "clear", 0)
                        .await;
                }
            }
        }

        if let Some(template) = &payload.template {
            run.checkpoint()?;
            run.progress(windows[1].start, &format!("Template {template}"))
                .await;
            let outcome = OperationResult::settle(self.kds.apply_template(template).await);
            if !run.record(EntityKind::Template, "template", template, outcome)? {
                self.after_failure(run.ctx, JobType::KdsConfig, "template", 0)
                    .await;
            }
        }

        let total = payload.stations.len();
        let mut available = Vec::with_capacity(total);
        for (i, station) in payload.stations.iter().enumerate() {
            run.checkpoint()?;
            run.progress(windows[2].at(i, total), &format!("Station {}", station.name))
                .await;
            let outcome = create_if_missing(
                payload.skip_if_exists,
                || self.kds.station_exists(&station.name),
                || self.kds.create_station(station),
            )
            .await;
            let ok = run.record(EntityKind::Stations, "stations", &station.name, outcome)?;
            if !ok {
                self.after_failure(run.ctx, JobType::KdsConfig, "stations", i)
                    .await;
            }
            available.push(ok);
            self.pace(run.ctx).await;
        }

        let total = payload.stations.iter().filter(|s| s.has_routing()).count();
        let mut step = 0;
        for (i, (station, ok)) in payload.stations.iter().zip(available).enumerate() {
            if !station.has_routing() {
                continue;
            }
            run.checkpoint()?;
            run.progress(windows[3].at(step, total), &format!("Routing for {}", station.name))
                .await;
            step += 1;

            let opened = if ok {
                OperationResult::settle(self.kds.open_station_routing(&station.name).await)?
            } else {
                OperationResult::failed(format!("Station '{}' is not available", station.name))
            };
            if !opened.success {
                for entry in station.routing_entries() {
                    run.record(EntityKind::Routing, "routing", entry, Ok(opened.clone()))?;
                }
                if !station.item_patterns.is_empty() {
                    run.record(
                        EntityKind::Routing,
                        "routing",
                        &format!("{} patterns", station.name),
                        Ok(opened.clone()),
                    )?;
                }
                self.after_failure(run.ctx, JobType::KdsConfig, "routing", i)
                    .await;
                continue;
            }

            for entry in station.routing_entries() {
                run.checkpoint()?;
                let routed = self.kds.route_entry(&station.name, entry).await;
                let op = if routed.success {
                    OperationResult::done()
                } else {
                    OperationResult::failed(format!(
                        "Could not route to '{}': {}",
                        station.name,
                        routed.error_summary()
                    ))
                };
                run.record(EntityKind::Routing, "routing", entry, Ok(op))?;
            }

            if !station.item_patterns.is_empty() {
                run.checkpoint()?;
                match self
                    .kds
                    .route_patterns(&station.name, &station.item_patterns)
                    .await
                {
                    Ok(report) => {
                        for routed in &report.outcomes {
                            let op = if routed.success {
                                OperationResult::done()
                            } else {
                                OperationResult::failed(routed.error_summary())
                            };
                            run.record(EntityKind::Routing, "routing", &routed.entry, Ok(op))?;
                        }
                    }
                    Err(e) if e.is_structural() => return Err(e),
                    Err(e) => {
                        run.record(
                            EntityKind::Routing,
                            "routing",
                            &format!("{} patterns", station.name),
                            Ok(OperationResult::failed(e.to_string())),
                        )?;
                    }
                }
            }

            let saved = OperationResult::settle(self.kds.save_routing(&station.name).await)?;
            if !saved.success {
                run.record(EntityKind::Routing, "routing-save", &station.name, Ok(saved))?;
                self.after_failure(run.ctx, JobType::KdsConfig, "routing-save", i)
                    .await;
            }
            self.pace(run.ctx).await;
        }

        if let Some(settings) = &payload.display_settings {
            run.declare(EntityKind::DisplaySettings);
            let total = settings.len();
            for (i, (name, value)) in settings.iter().enumerate() {
                run.checkpoint()?;
                run.progress(windows[4].at(i, total), &format!("Display setting {name}"))
                    .await;
                let outcome = OperationResult::settle(
                    self.kds
                        .apply_display_setting(name, &setting_text(value))
                        .await,
                );
                if !run.record(EntityKind::DisplaySettings, "display-settings", name, outcome)? {
                    self.after_failure(run.ctx, JobType::KdsConfig, "display-settings", i)
                        .await;
                }
            }
        }
        Ok(())
    }
}
