use std::collections::HashSet;
use tracing::instrument;

use super::progress::{split, PHASES_END, PREPARE};
use super::{
    create_if_missing, EntityKind, JobResult, JobRun, JobType, MenuDeployPayload, OperationResult,
    RunContext, WorkflowJob, WorkflowOrchestrator,
};
use crate::errors::AutomationError;

// Relative weight of categories, items and modifier groups in the progress bar.
const WEIGHTS: [u32; 3] = [25, 45, 30];

impl WorkflowOrchestrator {
    /// Create categories, then items, then attach modifier groups.
    #[instrument(skip_all, fields(job = %job.id))]
    pub async fn execute_menu_deploy(
        &self,
        job: &mut WorkflowJob,
        payload: &MenuDeployPayload,
        ctx: &RunContext,
    ) -> JobResult {
        let mut run = JobRun::start(job, ctx);
        run.declare(EntityKind::Categories);
        run.declare(EntityKind::Items);
        run.declare(EntityKind::Modifiers);

        let outcome = self.menu_deploy(&mut run, payload).await;
        self.close_dialogs(JobType::MenuDeploy).await;
        self.finish(run, outcome).await
    }

    async fn menu_deploy(
        &self,
        run: &mut JobRun<'_>,
        payload: &MenuDeployPayload,
    ) -> Result<(), AutomationError> {
        payload.validate()?;
        self.prepare(run).await?;
        self.menu.open_menus().await?;

        let windows = split(PREPARE.end, PHASES_END, &WEIGHTS);
        let skip = payload.skip_if_exists;

        let total = payload.categories.len();
        for (i, category) in payload.categories.iter().enumerate() {
            run.checkpoint()?;
            run.progress(windows[0].at(i, total), &format!("Category {}", category.name))
                .await;
            let outcome = create_if_missing(
                skip,
                || self.menu.category_exists(&category.name),
                || self.menu.create_category(category),
            )
            .await;
            if !run.record(EntityKind::Categories, "categories", &category.name, outcome)? {
                self.after_failure(run.ctx, JobType::MenuDeploy, "categories", i)
                    .await;
            }
            self.pace(run.ctx).await;
        }

        let total = payload.items.len();
        let mut failed_items = HashSet::new();
        for (i, item) in payload.items.iter().enumerate() {
            run.checkpoint()?;
            run.progress(windows[1].at(i, total), &format!("Item {}", item.name))
                .await;
            let outcome = create_if_missing(
                skip,
                || self.menu.item_exists(&item.name),
                || self.menu.create_item(item),
            )
            .await;
            if !run.record(EntityKind::Items, "items", &item.name, outcome)? {
                failed_items.insert(item.name.trim().to_lowercase());
                self.after_failure(run.ctx, JobType::MenuDeploy, "items", i)
                    .await;
            }
            self.pace(run.ctx).await;
        }

        let total = payload.modifier_count();
        let mut done = 0;
        for assignment in &payload.modifier_groups_by_item {
            for group in &assignment.groups {
                run.checkpoint()?;
                run.progress(
                    windows[2].at(done, total),
                    &format!("Modifier group {} on {}", group, assignment.item),
                )
                .await;
                let entity = format!("{} / {}", assignment.item, group);
                let outcome = if failed_items.contains(&assignment.item.trim().to_lowercase()) {
                    Ok(OperationResult::failed(format!(
                        "Item '{}' is not available",
                        assignment.item
                    )))
                } else {
                    create_if_missing(
                        skip,
                        || self.menu.has_modifier_group(&assignment.item, group),
                        || self.menu.apply_modifier_group(&assignment.item, group),
                    )
                    .await
                };
                if !run.record(EntityKind::Modifiers, "modifiers", &entity, outcome)? {
                    self.after_failure(run.ctx, JobType::MenuDeploy, "modifiers", done)
                        .await;
                }
                done += 1;
                self.pace(run.ctx).await;
            }
        }
        Ok(())
    }
}
