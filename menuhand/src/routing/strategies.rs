use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::AutomationError;
use crate::locator::{ElementResolver, ResolveOptions};
use crate::page::Page;
use crate::targets::Target;

/// Intermediate pointer positions between press and release.
const DRAG_STEPS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    Checkbox,
    SearchSelect,
    DragAndDrop,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Checkbox => write!(f, "checkbox"),
            StrategyKind::SearchSelect => write!(f, "search-select"),
            StrategyKind::DragAndDrop => write!(f, "drag-and-drop"),
        }
    }
}

/// What a strategy gets to work with.
pub struct RoutingContext<'a> {
    pub page: &'a dyn Page,
    pub resolver: &'a ElementResolver,
    /// Budget for each element lookup.
    pub timeout: Duration,
}

impl RoutingContext<'_> {
    fn options(&self, param: &str) -> ResolveOptions {
        ResolveOptions::new(self.timeout).with_param(param)
    }
}

/// One way of assigning a menu entry to the station whose routing panel is
/// open.
#[async_trait::async_trait]
pub trait InteractionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn route(
        &self,
        ctx: &RoutingContext<'_>,
        entry: &str,
        station: &str,
    ) -> Result<(), AutomationError>;
}

/// Tick the entry's checkbox or toggle.
pub struct CheckboxStrategy;

#[async_trait::async_trait]
impl InteractionStrategy for CheckboxStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Checkbox
    }

    async fn route(
        &self,
        ctx: &RoutingContext<'_>,
        entry: &str,
        _station: &str,
    ) -> Result<(), AutomationError> {
        let resolved = ctx
            .resolver
            .resolve(ctx.page, Target::RoutingCheckbox, &ctx.options(entry))
            .await?;
        if ctx.page.is_checked(&resolved.element).await? {
            debug!("'{}' already routed", entry);
            return Ok(());
        }
        ctx.page.click(&resolved.element).await?;
        if ctx.page.is_checked(&resolved.element).await? {
            Ok(())
        } else {
            Err(AutomationError::TransientUi(format!(
                "Checkbox for '{entry}' did not stay checked"
            )))
        }
    }
}

/// Type into the routing filter and pick the first matching result.
pub struct SearchSelectStrategy;

#[async_trait::async_trait]
impl InteractionStrategy for SearchSelectStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SearchSelect
    }

    async fn route(
        &self,
        ctx: &RoutingContext<'_>,
        entry: &str,
        _station: &str,
    ) -> Result<(), AutomationError> {
        let plain = ResolveOptions::new(ctx.timeout);
        ctx.resolver
            .fill(ctx.page, Target::RoutingFilterInput, &plain, entry)
            .await?;
        let selected = ctx
            .resolver
            .click(ctx.page, Target::RoutingFilterResult, &ctx.options(entry))
            .await;
        clear_filter(ctx).await;
        selected
    }
}

async fn clear_filter(ctx: &RoutingContext<'_>) {
    let immediate = ResolveOptions::immediate();
    let cleared = match ctx
        .resolver
        .click(ctx.page, Target::RoutingFilterClear, &immediate)
        .await
    {
        Ok(()) => Ok(()),
        Err(_) => {
            ctx.resolver
                .fill(ctx.page, Target::RoutingFilterInput, &immediate, "")
                .await
        }
    };
    if let Err(e) = cleared {
        warn!("Could not clear routing filter: {}", e);
    }
}

/// Drag the entry onto the station's drop zone with synthetic pointer events.
pub struct DragAndDropStrategy;

async fn centroid(
    ctx: &RoutingContext<'_>,
    target: Target,
    param: &str,
) -> Result<(f64, f64), AutomationError> {
    let resolved = ctx
        .resolver
        .resolve(ctx.page, target, &ctx.options(param))
        .await?;
    match ctx.page.bounding_box(&resolved.element).await? {
        Some(b) if !b.is_empty() => Ok(b.center()),
        _ => Err(AutomationError::TransientUi(format!(
            "{target} '{param}' has no visible area"
        ))),
    }
}

/// Points strictly between `from` and `to`, then `to` itself.
pub fn drag_path(from: (f64, f64), to: (f64, f64), steps: u32) -> Vec<(f64, f64)> {
    let steps = steps.max(1);
    (1..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            (from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t)
        })
        .collect()
}

#[async_trait::async_trait]
impl InteractionStrategy for DragAndDropStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DragAndDrop
    }

    async fn route(
        &self,
        ctx: &RoutingContext<'_>,
        entry: &str,
        station: &str,
    ) -> Result<(), AutomationError> {
        let from = centroid(ctx, Target::RoutingSourceEntry, entry).await?;
        let to = centroid(ctx, Target::RoutingDropZone, station).await?;
        debug!("Dragging '{}' from {:?} to {:?}", entry, from, to);

        ctx.page.mouse_move(from.0, from.1).await?;
        ctx.page.mouse_down(from.0, from.1).await?;
        for (x, y) in drag_path(from, to, DRAG_STEPS) {
            ctx.page.mouse_move(x, y).await?;
        }
        ctx.page.mouse_up(to.0, to.1).await
    }
}
