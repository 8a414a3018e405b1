use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::errors::AutomationError;
use crate::fallback::first_success;
use crate::page::{ElementHandle, Page};
use crate::registry::{LocatorRegistry, PromotionOutcome};
use crate::selector::Selector;
use crate::targets::Target;

// Default budget if none is specified on the options
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// One re-resolution after a stale handle
const MAX_ACTION_ATTEMPTS: usize = 2;

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Only match elements that are rendered and visible.
    pub visible: bool,
    /// Total budget, shared evenly between candidates.
    pub timeout: Duration,
    /// Value substituted into `{name}` templates.
    pub param: Option<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            visible: true,
            timeout: DEFAULT_RESOLVE_TIMEOUT,
            param: None,
        }
    }
}

impl ResolveOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// A single probe per candidate, no waiting.
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }
}

/// A successful resolution.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub element: ElementHandle,
    /// Every element the winning candidate matched, in document order.
    pub matches: Vec<ElementHandle>,
    /// The candidate as it was queried, with the parameter substituted.
    pub selector: Selector,
    /// Position of the winning candidate in the list at resolution time.
    pub candidate_index: usize,
    pub promotion: Option<PromotionOutcome>,
}

impl Resolved {
    pub fn via_fallback(&self) -> bool {
        self.candidate_index > 0
    }
}

/// Resolves semantic targets to live elements by trying the registry's
/// candidates in order, healing the registry when a fallback wins.
#[derive(Clone)]
pub struct ElementResolver {
    registry: Arc<LocatorRegistry>,
    poll_interval: Duration,
}

impl ElementResolver {
    pub fn new(registry: Arc<LocatorRegistry>) -> Self {
        Self {
            registry,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn registry(&self) -> &Arc<LocatorRegistry> {
        &self.registry
    }

    /// Resolve `target`, waiting up to `options.timeout` in total.
    ///
    /// The budget is split evenly: candidate `i` of `n` may poll until
    /// `start + timeout * (i + 1) / n`, and every candidate gets at least one
    /// probe even when earlier ones used up their share.
    #[instrument(level = "debug", skip(self, page, options), fields(target = %target))]
    pub async fn resolve(
        &self,
        page: &dyn Page,
        target: Target,
        options: &ResolveOptions,
    ) -> Result<Resolved, AutomationError> {
        let candidates = self.registry.get_candidates(target);
        if candidates.is_empty() {
            return Err(AutomationError::not_found(target, 0));
        }
        if target.requires_param() && options.param.is_none() {
            return Err(AutomationError::Validation(format!(
                "Target {target} needs a name parameter"
            )));
        }

        let n = candidates.len() as u32;
        let start = Instant::now();
        let param = options.param.as_deref();

        let outcome = first_success(&candidates, |index, template| {
            let slot_end = start + options.timeout * (index as u32 + 1) / n;
            let selector = template.render(param);
            async move {
                let matches = self
                    .probe_until(page, &selector, options.visible, slot_end)
                    .await?;
                Ok((matches, selector))
            }
        })
        .await;

        match outcome {
            Ok((index, (matches, selector))) => {
                let promotion =
                    match self
                        .registry
                        .promote(target, &candidates[index], Utc::now())
                    {
                        Ok(outcome) => Some(outcome),
                        Err(e) => {
                            warn!("Could not record resolution of {}: {}", target, e);
                            None
                        }
                    };
                if index > 0 {
                    debug!(
                        "Resolved {} via fallback #{} ('{}')",
                        target, index, selector
                    );
                }
                let element = matches[0].clone();
                Ok(Resolved {
                    element,
                    matches,
                    selector,
                    candidate_index: index,
                    promotion,
                })
            }
            Err(errors) => {
                debug!("No candidate matched {}: {}", target, errors.summary());
                Err(AutomationError::not_found(target, candidates.len()))
            }
        }
    }

    /// Whether `target` is present right now (one probe per candidate).
    pub async fn exists(
        &self,
        page: &dyn Page,
        target: Target,
        param: Option<&str>,
    ) -> bool {
        let mut options = ResolveOptions::immediate();
        options.param = param.map(str::to_string);
        self.resolve(page, target, &options).await.is_ok()
    }

    async fn probe_until(
        &self,
        page: &dyn Page,
        selector: &Selector,
        visible: bool,
        deadline: Instant,
    ) -> Result<Vec<ElementHandle>, AutomationError> {
        loop {
            match page.query(selector, visible).await {
                Ok(found) if !found.is_empty() => return Ok(found),
                Ok(_) => {}
                Err(e) if e.is_retryable() => debug!("Retrying '{}' after: {}", selector, e),
                Err(e) => return Err(e),
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(AutomationError::Timeout(format!(
                    "No element matched '{selector}'"
                )));
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Resolve `target` and run `action` on it. A transient failure (stale
    /// handle, re-render) triggers one fresh resolution before giving up.
    pub async fn with_element<T, F, Fut>(
        &self,
        page: &dyn Page,
        target: Target,
        options: &ResolveOptions,
        action: F,
    ) -> Result<T, AutomationError>
    where
        F: Fn(ElementHandle) -> Fut,
        Fut: Future<Output = Result<T, AutomationError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let resolved = self.resolve(page, target, options).await?;
            match action(resolved.element).await {
                Err(e) if e.is_retryable() && attempt < MAX_ACTION_ATTEMPTS => {
                    debug!("Re-resolving {} after transient failure: {}", target, e);
                }
                other => return other,
            }
        }
    }

    pub async fn click(
        &self,
        page: &dyn Page,
        target: Target,
        options: &ResolveOptions,
    ) -> Result<(), AutomationError> {
        self.with_element(page, target, options, |el| async move { page.click(&el).await })
            .await
    }

    pub async fn fill(
        &self,
        page: &dyn Page,
        target: Target,
        options: &ResolveOptions,
        text: &str,
    ) -> Result<(), AutomationError> {
        self.with_element(page, target, options, |el| async move {
            page.fill(&el, text).await
        })
        .await
    }
}
