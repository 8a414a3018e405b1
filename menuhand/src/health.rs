//! Portal health checks.
//!
//! A health check logs in (or reuses a valid session), probes a set of
//! targets through the resolver and reports which locators still work.
//! Probing goes through the normal resolver, so a target that only resolves
//! via a fallback is healed as a side effect and listed in `healed_targets`.
//!
//! Baselines record which selector each target on a page resolved through.
//! Comparing a fresh capture against a stored one shows where the portal's
//! markup drifted, even when every target still resolves.

use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::auth::AuthSessionController;
use crate::errors::AutomationError;
use crate::locator::{ElementResolver, ResolveOptions};
use crate::navigation::{NavigationController, Section};
use crate::selector::Selector;
use crate::session::Session;
use crate::targets::Target;

/// Overall portal health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Login works and every probed locator matched its primary candidate
    Healthy,
    /// Usable, but some locators failed or needed a fallback
    Degraded,
    /// Login failed or the portal shell did not render
    Unhealthy,
}

impl HealthStatus {
    /// Convert to HTTP status code for health endpoints
    pub fn to_http_status(&self) -> u16 {
        match self {
            HealthStatus::Healthy => 200,
            HealthStatus::Degraded => 206,
            HealthStatus::Unhealthy => 503,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalHealth {
    pub status: HealthStatus,
    pub login_success: bool,
    pub menu_accessible: bool,
    /// True when any probed target was unresolved or only matched a fallback.
    pub ui_changes_detected: bool,
    pub response_time_ms: u64,
    pub selector_health: BTreeMap<Target, bool>,
    pub healed_targets: Vec<Target>,
    pub error: Option<String>,
}

impl PortalHealth {
    fn login_failed(error: String, response_time_ms: u64) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            login_success: false,
            menu_accessible: false,
            ui_changes_detected: false,
            response_time_ms,
            selector_health: BTreeMap::new(),
            healed_targets: Vec::new(),
            error: Some(error),
        }
    }

    fn update_status(&mut self) {
        self.status = if !self.login_success || !self.menu_accessible {
            HealthStatus::Unhealthy
        } else if self.ui_changes_detected {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
    }
}

/// Log in and probe `targets`. Targets that need a name parameter cannot be
/// probed generically and are skipped.
#[instrument(skip_all, fields(targets = targets.len()))]
pub async fn check_portal_health(
    session: &Session,
    auth: &AuthSessionController,
    resolver: &ElementResolver,
    targets: &[Target],
) -> PortalHealth {
    let started = Instant::now();
    let elapsed_ms = || started.elapsed().as_millis() as u64;

    if let Err(e) = auth.ensure_session(session).await {
        warn!("Health check login failed: {}", e);
        return PortalHealth::login_failed(e.to_string(), elapsed_ms());
    }

    let config = auth.config();
    let page = session.page();
    let mut error = None;
    if let Some(restaurant) = session.current_restaurant_context() {
        if let Err(e) = page
            .goto(&config.menu_url(&restaurant), config.navigation_timeout())
            .await
        {
            error = Some(e.to_string());
        }
    }
    let scan = scan_targets(session, resolver, targets, config.default_timeout()).await;
    let selector_health = scan.selector_health;
    let healed_targets = scan.healed_targets;

    let menu_accessible = match selector_health.get(&Target::MainContent) {
        Some(ok) => *ok,
        None => resolver
            .resolve(
                page,
                Target::MainContent,
                &ResolveOptions::new(config.readiness_timeout()),
            )
            .await
            .is_ok(),
    };

    let ui_changes_detected =
        !healed_targets.is_empty() || selector_health.values().any(|ok| !ok);
    let mut health = PortalHealth {
        status: HealthStatus::Unhealthy,
        login_success: true,
        menu_accessible,
        ui_changes_detected,
        response_time_ms: elapsed_ms(),
        selector_health,
        healed_targets,
        error,
    };
    health.update_status();
    info!(
        "Portal health: {:?} ({} ms, {} healed)",
        health.status,
        health.response_time_ms,
        health.healed_targets.len()
    );
    health
}

/// What one pass over a set of targets found.
struct TargetScan {
    selector_health: BTreeMap<Target, bool>,
    healed_targets: Vec<Target>,
    /// The selector each resolved target matched through.
    winners: BTreeMap<Target, Selector>,
}

async fn scan_targets(
    session: &Session,
    resolver: &ElementResolver,
    targets: &[Target],
    timeout: Duration,
) -> TargetScan {
    let page = session.page();
    let options = ResolveOptions::new(timeout);
    let mut scan = TargetScan {
        selector_health: BTreeMap::new(),
        healed_targets: Vec::new(),
        winners: BTreeMap::new(),
    };
    for &target in targets {
        if target.requires_param() {
            warn!("Skipping {} in health check: it needs a name parameter", target);
            continue;
        }
        match resolver.resolve(page, target, &options).await {
            Ok(resolved) => {
                if resolved.via_fallback() {
                    scan.healed_targets.push(target);
                }
                scan.selector_health.insert(target, true);
                scan.winners.insert(target, resolved.selector);
            }
            Err(e) => {
                warn!("Health probe for {} failed: {}", target, e);
                scan.selector_health.insert(target, false);
            }
        }
    }
    scan
}

/// A portal page whose layout is tracked for drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselinePage {
    pub page: String,
    pub section: Section,
    pub targets: Vec<Target>,
}

impl BaselinePage {
    pub fn new(page: impl Into<String>, section: Section, targets: &[Target]) -> Self {
        Self {
            page: page.into(),
            section,
            targets: targets.to_vec(),
        }
    }
}

/// The pages captured when none are named.
pub fn default_baseline_pages() -> Vec<BaselinePage> {
    vec![
        BaselinePage::new(
            "home",
            Section::Home,
            &[Target::MainContent, Target::UserMenu, Target::RestaurantSwitcher],
        ),
        BaselinePage::new(
            "menu_list",
            Section::Menus,
            &[
                Target::MenuSearchInput,
                Target::AddCategoryButton,
                Target::AddItemButton,
            ],
        ),
        BaselinePage::new(
            "kds",
            Section::KitchenDisplay,
            &[Target::AddStationButton, Target::StationRows],
        ),
        BaselinePage::new(
            "printers",
            Section::Printers,
            &[Target::AddPrinterButton, Target::PrinterRows],
        ),
    ]
}

/// The selectors a page resolved through at capture time.
///
/// `selectors_hash` digests the whole map, so two captures of an unchanged
/// portal hash equal. A target that did not resolve is recorded as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageBaseline {
    pub page: String,
    pub selectors_hash: String,
    pub selectors: BTreeMap<Target, Option<String>>,
    pub captured_at: DateTime<Utc>,
}

impl PageBaseline {
    fn from_scan(page: &BaselinePage, scan: &TargetScan, captured_at: DateTime<Utc>) -> Self {
        let selectors: BTreeMap<Target, Option<String>> = page
            .targets
            .iter()
            .filter(|t| !t.requires_param())
            .map(|t| (*t, scan.winners.get(t).map(|s| s.to_string())))
            .collect();
        Self {
            page: page.page.clone(),
            selectors_hash: selectors_hash(&selectors),
            selectors,
            captured_at,
        }
    }

    /// Compare a fresh capture of the same page against this baseline.
    pub fn compare(&self, current: &PageBaseline) -> BaselineComparison {
        let mut changed_targets: Vec<Target> = self
            .selectors
            .iter()
            .filter(|(target, selector)| current.selectors.get(*target) != Some(*selector))
            .map(|(target, _)| *target)
            .collect();
        changed_targets.extend(
            current
                .selectors
                .keys()
                .filter(|target| !self.selectors.contains_key(*target)),
        );
        changed_targets.sort();
        BaselineComparison {
            page: self.page.clone(),
            matches: self.selectors_hash == current.selectors_hash,
            changed_targets,
            baseline_captured_at: self.captured_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineComparison {
    pub page: String,
    #[serde(rename = "match")]
    pub matches: bool,
    pub changed_targets: Vec<Target>,
    pub baseline_captured_at: DateTime<Utc>,
}

fn selectors_hash(selectors: &BTreeMap<Target, Option<String>>) -> String {
    let mut hasher = Sha1::new();
    for (target, selector) in selectors {
        hasher.update(target.to_string().as_bytes());
        hasher.update(b"=");
        hasher.update(selector.as_deref().unwrap_or("-").as_bytes());
        hasher.update(b"\n");
    }
    HEXLOWER.encode(&hasher.finalize())
}

/// Open each page and record the selector every target resolves through.
#[instrument(skip_all, fields(pages = pages.len()))]
pub async fn capture_baseline(
    session: &Session,
    auth: &AuthSessionController,
    navigator: &NavigationController,
    resolver: &ElementResolver,
    pages: &[BaselinePage],
) -> Result<Vec<PageBaseline>, AutomationError> {
    auth.ensure_session(session).await?;
    let timeout = auth.config().default_timeout();
    let mut baselines = Vec::with_capacity(pages.len());
    for page in pages {
        navigator.open_section(session, page.section).await?;
        let scan = scan_targets(session, resolver, &page.targets, timeout).await;
        let baseline = PageBaseline::from_scan(page, &scan, Utc::now());
        debug!("Captured {} ({})", baseline.page, baseline.selectors_hash);
        baselines.push(baseline);
    }
    info!("Captured {} page baselines", baselines.len());
    Ok(baselines)
}

/// Capture the baselined pages again and report which ones drifted.
/// Baselines whose page is not in `pages` are ignored.
pub async fn compare_baseline(
    session: &Session,
    auth: &AuthSessionController,
    navigator: &NavigationController,
    resolver: &ElementResolver,
    pages: &[BaselinePage],
    baselines: &[PageBaseline],
) -> Result<Vec<BaselineComparison>, AutomationError> {
    let tracked: Vec<BaselinePage> = pages
        .iter()
        .filter(|p| baselines.iter().any(|b| b.page == p.page))
        .cloned()
        .collect();
    if tracked.is_empty() {
        return Err(AutomationError::Validation(
            "No baselines for the requested pages; capture first".to_string(),
        ));
    }
    let current = capture_baseline(session, auth, navigator, resolver, &tracked).await?;
    let comparisons: Vec<BaselineComparison> = current
        .iter()
        .filter_map(|now| {
            baselines
                .iter()
                .find(|b| b.page == now.page)
                .map(|b| b.compare(now))
        })
        .collect();
    for drifted in comparisons.iter().filter(|c| !c.matches) {
        warn!(
            "UI drift on {}: {} target(s) changed",
            drifted.page,
            drifted.changed_targets.len()
        );
    }
    Ok(comparisons)
}

/// Lifecycle status of a stored portal integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationStatus {
    Active,
    Inactive,
    Pending,
    Error,
    Expired,
}

/// 0-100 score for an integration: 100, minus 30 when an error is on
/// record, minus 40 for `Error` status or 20 for `Inactive`.
pub fn integration_health_score(last_error: Option<&str>, status: IntegrationStatus) -> u8 {
    let mut score: i32 = 100;
    if last_error.is_some_and(|e| !e.is_empty()) {
        score -= 30;
    }
    score -= match status {
        IntegrationStatus::Error => 40,
        IntegrationStatus::Inactive => 20,
        _ => 0,
    };
    score.max(0) as u8
}
