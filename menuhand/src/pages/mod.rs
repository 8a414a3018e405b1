//! Page objects for the portal's configuration screens.
//!
//! The workflows only see the editor traits. [`PortalEditor`] implements all
//! of them on top of a live [`Session`]; tests substitute fakes.

mod kds;
mod menu;
mod printers;

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::PortalConfig;
use crate::errors::AutomationError;
use crate::locator::{ElementResolver, ResolveOptions};
use crate::navigation::NavigationController;
use crate::routing::{PatternRouting, RoutingConfigurer, RoutingOutcome};
use crate::session::Session;
use crate::targets::Target;
use crate::workflow::payload::{CategorySpec, ItemSpec, PrinterSpec, StationSpec};

/// Upper bound on a single existence lookup.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

const MAX_DIALOGS: usize = 3;

#[async_trait::async_trait]
pub trait MenuEditor: Send + Sync {
    async fn open_menus(&self) -> Result<(), AutomationError>;
    async fn category_exists(&self, name: &str) -> Result<bool, AutomationError>;
    async fn create_category(&self, category: &CategorySpec) -> Result<(), AutomationError>;
    async fn item_exists(&self, name: &str) -> Result<bool, AutomationError>;
    async fn create_item(&self, item: &ItemSpec) -> Result<(), AutomationError>;
    async fn has_modifier_group(&self, item: &str, group: &str) -> Result<bool, AutomationError>;
    async fn apply_modifier_group(&self, item: &str, group: &str) -> Result<(), AutomationError>;
    /// Best effort: leave the page without open dialogs.
    async fn close_dialogs(&self);
}

#[async_trait::async_trait]
pub trait KdsEditor: Send + Sync {
    async fn open_kds(&self) -> Result<(), AutomationError>;
    async fn station_exists(&self, name: &str) -> Result<bool, AutomationError>;
    async fn create_station(&self, station: &StationSpec) -> Result<(), AutomationError>;
    /// Delete every existing station, returning how many were removed.
    async fn clear_stations(&self) -> Result<usize, AutomationError>;
    async fn open_station_routing(&self, station: &str) -> Result<(), AutomationError>;
    async fn route_entry(&self, station: &str, entry: &str) -> RoutingOutcome;
    async fn route_patterns(
        &self,
        station: &str,
        patterns: &[String],
    ) -> Result<PatternRouting, AutomationError>;
    async fn save_routing(&self, station: &str) -> Result<(), AutomationError>;
    async fn apply_template(&self, template: &str) -> Result<(), AutomationError>;
    async fn apply_display_setting(&self, name: &str, value: &str) -> Result<(), AutomationError>;
    async fn close_dialogs(&self);
}

#[async_trait::async_trait]
pub trait PrinterEditor: Send + Sync {
    async fn open_printers(&self) -> Result<(), AutomationError>;
    async fn printer_exists(&self, name: &str) -> Result<bool, AutomationError>;
    async fn create_printer(&self, printer: &PrinterSpec) -> Result<(), AutomationError>;
    async fn clear_printers(&self) -> Result<usize, AutomationError>;
    async fn assign_station(&self, printer: &str, station: &str) -> Result<(), AutomationError>;
    async fn test_print(&self, printer: &str) -> Result<(), AutomationError>;
    async fn set_routing_option(&self, option: &str, enabled: bool) -> Result<(), AutomationError>;
    async fn close_dialogs(&self);
}

/// Drives the real portal through a session.
pub struct PortalEditor {
    session: Arc<Session>,
    resolver: ElementResolver,
    navigator: Arc<NavigationController>,
    routing: RoutingConfigurer,
    config: Arc<PortalConfig>,
}

impl PortalEditor {
    pub fn new(
        session: Arc<Session>,
        resolver: ElementResolver,
        navigator: Arc<NavigationController>,
        config: Arc<PortalConfig>,
    ) -> Self {
        let routing = RoutingConfigurer::new(resolver.clone());
        Self {
            session,
            resolver,
            navigator,
            routing,
            config,
        }
    }

    pub fn with_routing(mut self, routing: RoutingConfigurer) -> Self {
        self.routing = routing;
        self
    }

    fn options(&self) -> ResolveOptions {
        ResolveOptions::new(self.config.default_timeout())
    }

    fn named(&self, name: &str) -> ResolveOptions {
        self.options().with_param(name)
    }

    fn lookup(&self, name: &str) -> ResolveOptions {
        ResolveOptions::new(self.config.default_timeout().min(LOOKUP_TIMEOUT)).with_param(name)
    }

    async fn click(&self, target: Target) -> Result<(), AutomationError> {
        self.resolver
            .click(self.session.page(), target, &self.options())
            .await
    }

    async fn click_named(&self, target: Target, name: &str) -> Result<(), AutomationError> {
        self.resolver
            .click(self.session.page(), target, &self.named(name))
            .await
    }

    async fn fill(&self, target: Target, text: &str) -> Result<(), AutomationError> {
        self.resolver
            .fill(self.session.page(), target, &self.options(), text)
            .await
    }

    /// Open a dropdown and pick the option labelled `value`.
    async fn select(&self, select: Target, option: Target, value: &str) -> Result<(), AutomationError> {
        self.click(select).await?;
        self.click_named(option, value).await
    }

    /// Make a named checkbox or switch match `enabled`.
    async fn set_toggle(&self, target: Target, name: &str, enabled: bool) -> Result<(), AutomationError> {
        let page = self.session.page();
        let resolved = self.resolver.resolve(page, target, &self.named(name)).await?;
        if page.is_checked(&resolved.element).await? != enabled {
            page.click(&resolved.element).await?;
        }
        Ok(())
    }

    /// Whether a row for `name` is listed. Types into the list's search box
    /// first when there is one, since long lists are virtualised.
    async fn row_exists(
        &self,
        search: Option<Target>,
        row: Target,
        name: &str,
    ) -> Result<bool, AutomationError> {
        let page = self.session.page();
        let immediate = ResolveOptions::immediate();
        let mut searched = false;
        if let Some(search) = search {
            searched = self.resolver.fill(page, search, &immediate, name).await.is_ok();
        }
        let found = match self.resolver.resolve(page, row, &self.lookup(name)).await {
            Ok(_) => Ok(true),
            Err(AutomationError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        };
        if let (true, Some(search)) = (searched, search) {
            if let Err(e) = self.resolver.fill(page, search, &immediate, "").await {
                debug!("Could not reset search: {}", e);
            }
        }
        found
    }

    /// Save the open form, confirming if the portal asks.
    async fn save(&self) -> Result<(), AutomationError> {
        let page = self.session.page();
        self.click(Target::SaveButton).await?;
        if self.resolver.exists(page, Target::ConfirmButton, None).await {
            self.resolver
                .click(page, Target::ConfirmButton, &ResolveOptions::immediate())
                .await?;
        }
        self.navigator.wait_ready(&self.session).await;
        Ok(())
    }

    /// Fail unless a row for `name` shows up after a save.
    async fn verify_row(
        &self,
        search: Option<Target>,
        row: Target,
        name: &str,
    ) -> Result<(), AutomationError> {
        if self.row_exists(search, row, name).await? {
            Ok(())
        } else {
            Err(AutomationError::TransientUi(format!(
                "'{name}' not listed after saving"
            )))
        }
    }

    /// Names of every row matched by a list target.
    async fn list_names(&self, rows: Target) -> Result<Vec<String>, AutomationError> {
        let page = self.session.page();
        let resolved = match self
            .resolver
            .resolve(page, rows, &ResolveOptions::new(LOOKUP_TIMEOUT))
            .await
        {
            Ok(resolved) => resolved,
            Err(AutomationError::NotFound { .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut names = Vec::new();
        for row in &resolved.matches {
            let text = page.text_of(row).await?;
            if let Some(name) = text.lines().map(str::trim).find(|l| !l.is_empty()) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Delete every listed row through its delete button.
    async fn delete_all(&self, rows: Target, delete: Target) -> Result<usize, AutomationError> {
        let page = self.session.page();
        let names = self.list_names(rows).await?;
        let mut removed = 0;
        for name in &names {
            self.click_named(delete, name).await?;
            if self.resolver.exists(page, Target::ConfirmButton, None).await {
                self.resolver
                    .click(page, Target::ConfirmButton, &ResolveOptions::immediate())
                    .await?;
            }
            removed += 1;
            debug!("Removed '{}'", name);
        }
        if removed > 0 {
            self.navigator.wait_ready(&self.session).await;
        }
        Ok(removed)
    }

    async fn dismiss_dialogs(&self) {
        let page = self.session.page();
        for _ in 0..MAX_DIALOGS {
            if !self.resolver.exists(page, Target::DialogCloseButton, None).await {
                return;
            }
            if let Err(e) = self
                .resolver
                .click(page, Target::DialogCloseButton, &ResolveOptions::immediate())
                .await
            {
                warn!("Could not close dialog: {}", e);
                if let Err(e) = page.press("Escape").await {
                    debug!("Escape did not go through either: {}", e);
                }
                return;
            }
        }
    }
}
