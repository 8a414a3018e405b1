//! Assigning menu items and categories to kitchen stations.
//!
//! The portal has shipped several routing UIs over time. Each is covered by
//! an [`InteractionStrategy`]; they are tried in a fixed order through the
//! same ordered-fallback helper the resolver uses.

pub mod strategies;

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::errors::AutomationError;
use crate::fallback::first_success;
use crate::locator::{ElementResolver, ResolveOptions};
use crate::page::Page;
use crate::targets::Target;

pub use strategies::{
    CheckboxStrategy, DragAndDropStrategy, InteractionStrategy, RoutingContext,
    SearchSelectStrategy, StrategyKind,
};

pub const DEFAULT_STRATEGY_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Serialize)]
pub struct StrategyAttempt {
    pub strategy: StrategyKind,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutingOutcome {
    pub entry: String,
    pub station: String,
    pub success: bool,
    /// The strategy that worked, if any.
    pub strategy: Option<StrategyKind>,
    /// Strategies that were tried and failed, in order.
    pub attempts: Vec<StrategyAttempt>,
}

impl RoutingOutcome {
    pub fn error_summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| format!("{}: {}", a.strategy, a.error))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PatternRouting {
    /// Items in the snapshot that matched at least one pattern.
    pub matched: Vec<String>,
    pub outcomes: Vec<RoutingOutcome>,
}

impl PatternRouting {
    pub fn routed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &RoutingOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }
}

/// Compile routing patterns, rejecting the whole list on the first bad one.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, AutomationError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| {
                AutomationError::Validation(format!("Invalid item pattern '{p}': {e}"))
            })
        })
        .collect()
}

pub struct RoutingConfigurer {
    resolver: ElementResolver,
    strategies: Vec<Arc<dyn InteractionStrategy>>,
    timeout: Duration,
}

impl RoutingConfigurer {
    /// Checkbox, then search-select, then drag-and-drop.
    pub fn new(resolver: ElementResolver) -> Self {
        Self::with_strategies(
            resolver,
            vec![
                Arc::new(CheckboxStrategy),
                Arc::new(SearchSelectStrategy),
                Arc::new(DragAndDropStrategy),
            ],
        )
    }

    pub fn with_strategies(
        resolver: ElementResolver,
        strategies: Vec<Arc<dyn InteractionStrategy>>,
    ) -> Self {
        Self {
            resolver,
            strategies,
            timeout: DEFAULT_STRATEGY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Route one item or category to `station`, whose routing panel must be
    /// open. Failure is reported in the outcome, not as an error.
    #[instrument(skip(self, page))]
    pub async fn add_item_to_station(
        &self,
        page: &dyn Page,
        entry: &str,
        station: &str,
    ) -> RoutingOutcome {
        let ctx = RoutingContext {
            page,
            resolver: &self.resolver,
            timeout: self.timeout,
        };
        let failures = Mutex::new(Vec::new());
        let result = first_success(&self.strategies, |_, strategy| {
            let ctx = &ctx;
            let failures = &failures;
            async move {
                match strategy.route(ctx, entry, station).await {
                    Ok(()) => Ok(strategy.kind()),
                    Err(e) => {
                        debug!("{} did not route '{}': {}", strategy.kind(), entry, e);
                        failures
                            .lock()
                            .unwrap_or_else(|p| p.into_inner())
                            .push(StrategyAttempt {
                                strategy: strategy.kind(),
                                error: e.to_string(),
                            });
                        Err(e)
                    }
                }
            }
        })
        .await;
        let attempts = failures.into_inner().unwrap_or_else(|p| p.into_inner());

        match result {
            Ok((_, kind)) => {
                debug!("Routed '{}' to '{}' via {}", entry, station, kind);
                RoutingOutcome {
                    entry: entry.to_string(),
                    station: station.to_string(),
                    success: true,
                    strategy: Some(kind),
                    attempts,
                }
            }
            Err(errors) => {
                warn!("Could not route '{}' to '{}': {}", entry, station, errors.summary());
                RoutingOutcome {
                    entry: entry.to_string(),
                    station: station.to_string(),
                    success: false,
                    strategy: None,
                    attempts,
                }
            }
        }
    }

    /// Names of the menu items currently listed, read fresh from the page.
    pub async fn snapshot_items(&self, page: &dyn Page) -> Result<Vec<String>, AutomationError> {
        let rows = match self
            .resolver
            .resolve(page, Target::MenuItemRow, &ResolveOptions::new(self.timeout))
            .await
        {
            Ok(resolved) => resolved.matches,
            Err(AutomationError::NotFound { .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut names = Vec::with_capacity(rows.len());
        for row in &rows {
            let text = page.text_of(row).await?;
            if let Some(name) = text.lines().map(str::trim).find(|l| !l.is_empty()) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Route every listed item whose name matches one of `patterns`.
    #[instrument(skip(self, page, patterns), fields(patterns = patterns.len()))]
    pub async fn route_by_patterns(
        &self,
        page: &dyn Page,
        patterns: &[String],
        station: &str,
    ) -> Result<PatternRouting, AutomationError> {
        let compiled = compile_patterns(patterns)?;
        if compiled.is_empty() {
            return Ok(PatternRouting::default());
        }
        let items = self.snapshot_items(page).await?;

        let mut seen = BTreeSet::new();
        let matched: Vec<String> = items
            .into_iter()
            .filter(|name| compiled.iter().any(|re| re.is_match(name)))
            .filter(|name| seen.insert(name.clone()))
            .collect();
        info!("{} items match routing patterns for '{}'", matched.len(), station);

        let mut outcomes = Vec::with_capacity(matched.len());
        for name in &matched {
            outcomes.push(self.add_item_to_station(page, name, station).await);
        }
        Ok(PatternRouting { matched, outcomes })
    }
}
