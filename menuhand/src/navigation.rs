//! Restaurant context switching and page readiness.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::auth::is_login_url;
use crate::config::PortalConfig;
use crate::errors::AutomationError;
use crate::locator::{ElementResolver, ResolveOptions};
use crate::session::Session;
use crate::targets::Target;

/// How search results are compared with the requested restaurant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Exact,
    Substring,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestaurantRef {
    /// Portal identifier (GUID), used in URLs.
    pub id: String,
    /// Display name, used for search and page verification.
    #[serde(default)]
    pub name: Option<String>,
}

impl RestaurantRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn matches(&self, candidate: &str, mode: MatchMode) -> bool {
        let candidate = candidate.trim().to_lowercase();
        if candidate.is_empty() {
            return false;
        }
        let keys = std::iter::once(self.id.as_str()).chain(self.name.as_deref());
        for key in keys {
            let key = key.trim().to_lowercase();
            let hit = match mode {
                MatchMode::Exact => candidate == key,
                MatchMode::Substring => candidate.contains(&key),
            };
            if hit {
                return true;
            }
        }
        false
    }
}

/// Portal areas the workflows open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
    Home,
    Menus,
    KitchenDisplay,
    Printers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Readiness {
    pub loaders_cleared: bool,
    pub content_present: bool,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.loaders_cleared && self.content_present
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchMethod {
    AlreadyActive,
    DirectUrl,
    Search,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwitchOutcome {
    pub method: SwitchMethod,
    pub readiness: Option<Readiness>,
}

pub struct NavigationController {
    resolver: ElementResolver,
    config: Arc<PortalConfig>,
}

impl NavigationController {
    pub fn new(resolver: ElementResolver, config: Arc<PortalConfig>) -> Self {
        Self { resolver, config }
    }

    /// Make `restaurant` the active context of `session`.
    ///
    /// Tries the direct URL first and falls back to the portal's location
    /// search. Any failure is structural: `SessionExpired` when the portal
    /// bounced to sign-in, `Navigation` otherwise.
    #[instrument(skip(self, session), fields(restaurant = %restaurant.id))]
    pub async fn switch_to_restaurant(
        &self,
        session: &Session,
        restaurant: &RestaurantRef,
        mode: MatchMode,
    ) -> Result<SwitchOutcome, AutomationError> {
        if session.current_restaurant_context().as_deref() == Some(restaurant.id.as_str()) {
            debug!("Restaurant already active");
            return Ok(SwitchOutcome {
                method: SwitchMethod::AlreadyActive,
                readiness: None,
            });
        }

        let result = match self.try_direct(session, restaurant).await {
            Ok(Some(readiness)) => Ok(SwitchOutcome {
                method: SwitchMethod::DirectUrl,
                readiness: Some(readiness),
            }),
            Ok(None) => {
                info!("Direct URL did not land on the restaurant, searching instead");
                self.search_and_select(session, restaurant, mode)
                    .await
                    .map(|readiness| SwitchOutcome {
                        method: SwitchMethod::Search,
                        readiness: Some(readiness),
                    })
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => {
                session.set_restaurant_context(Some(restaurant.id.clone()));
                info!("Switched restaurant via {:?}", outcome.method);
                Ok(outcome)
            }
            Err(e) if e.is_structural() => Err(e),
            Err(e) => Err(AutomationError::Navigation(format!(
                "Could not switch to restaurant {}: {}",
                restaurant.id, e
            ))),
        }
    }

    async fn try_direct(
        &self,
        session: &Session,
        restaurant: &RestaurantRef,
    ) -> Result<Option<Readiness>, AutomationError> {
        let url = self.config.restaurant_url(&restaurant.id);
        if let Err(e) = session
            .page()
            .goto(&url, self.config.navigation_timeout())
            .await
        {
            warn!("Direct navigation failed: {}", e);
            self.check_login_redirect(session).await?;
            return Ok(None);
        }
        self.check_login_redirect(session).await?;
        let readiness = self.wait_ready(session).await;
        if self.reflects(session, restaurant).await {
            Ok(Some(readiness))
        } else {
            Ok(None)
        }
    }

    async fn search_and_select(
        &self,
        session: &Session,
        restaurant: &RestaurantRef,
        mode: MatchMode,
    ) -> Result<Readiness, AutomationError> {
        let page = session.page();
        let options = ResolveOptions::new(self.config.default_timeout());
        let term = restaurant.name.as_deref().unwrap_or(&restaurant.id);

        self.resolver
            .click(page, Target::RestaurantSwitcher, &options)
            .await?;
        self.resolver
            .fill(page, Target::RestaurantSearchInput, &options, term)
            .await?;

        let results = self
            .resolver
            .resolve(page, Target::RestaurantSearchResult, &options)
            .await?;
        let mut chosen = None;
        for element in &results.matches {
            let text = page.text_of(element).await.unwrap_or_default();
            if restaurant.matches(&text, mode) {
                chosen = Some(element.clone());
                break;
            }
        }
        let element = match chosen {
            Some(element) => element,
            None => {
                // Some portal builds only label results by name.
                self.resolver
                    .resolve(
                        page,
                        Target::RestaurantSearchResultNamed,
                        &ResolveOptions::immediate().with_param(term),
                    )
                    .await
                    .map_err(|_| {
                        AutomationError::Navigation(format!(
                            "No search result matches '{}' ({} results)",
                            term,
                            results.matches.len()
                        ))
                    })?
                    .element
            }
        };
        page.click(&element).await?;

        self.check_login_redirect(session).await?;
        let readiness = self.wait_ready(session).await;
        if !self.reflects(session, restaurant).await {
            return Err(AutomationError::Navigation(format!(
                "Selected a result but the portal does not show restaurant {}",
                restaurant.id
            )));
        }
        Ok(readiness)
    }

    /// Whether the current page belongs to `restaurant`.
    async fn reflects(&self, session: &Session, restaurant: &RestaurantRef) -> bool {
        let page = session.page();
        let id = restaurant.id.to_lowercase();
        if let Ok(url) = page.current_url().await {
            if url.to_lowercase().contains(&id) {
                return true;
            }
        }
        if let Some(name) = &restaurant.name {
            if let Ok(text) = page.page_text().await {
                return text.to_lowercase().contains(&name.to_lowercase());
            }
        }
        false
    }

    /// Fail with `SessionExpired` (and reset the session) if the portal
    /// redirected to the sign-in page.
    pub async fn check_login_redirect(&self, session: &Session) -> Result<(), AutomationError> {
        let url = session.page().current_url().await?;
        if is_login_url(&url, &self.config.login_url) {
            session.invalidate();
            return Err(AutomationError::SessionExpired(format!(
                "Redirected to sign-in at {url}"
            )));
        }
        Ok(())
    }

    /// Wait for loaders to disappear and the main content to show, each
    /// within the readiness budget. Never fails: an unready page is logged
    /// and the caller carries on.
    pub async fn wait_ready(&self, session: &Session) -> Readiness {
        let budget = self.config.readiness_timeout();
        let loaders_cleared = self.wait_for_loaders(session, budget).await;
        let content_present = self
            .resolver
            .resolve(session.page(), Target::MainContent, &ResolveOptions::new(budget))
            .await
            .is_ok();
        let readiness = Readiness {
            loaders_cleared,
            content_present,
        };
        if !readiness.is_ready() {
            warn!(
                "Page not fully ready (loaders cleared: {}, content: {}), continuing",
                loaders_cleared, content_present
            );
        }
        readiness
    }

    async fn wait_for_loaders(&self, session: &Session, budget: Duration) -> bool {
        let deadline = Instant::now() + budget;
        loop {
            if !self
                .resolver
                .exists(session.page(), Target::LoadingIndicator, None)
                .await
            {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(self.config.poll_interval().min(deadline - now)).await;
        }
    }

    /// Open a portal section for the active restaurant.
    pub async fn open_section(
        &self,
        session: &Session,
        section: Section,
    ) -> Result<Readiness, AutomationError> {
        let restaurant = session.current_restaurant_context().ok_or_else(|| {
            AutomationError::Navigation("No restaurant selected".to_string())
        })?;
        let url = match section {
            Section::Home => self.config.restaurant_url(&restaurant),
            Section::Menus => self.config.menu_url(&restaurant),
            Section::KitchenDisplay => self.config.kds_url(&restaurant),
            Section::Printers => self.config.printers_url(&restaurant),
        };
        debug!("Opening {:?}", section);
        session
            .page()
            .goto(&url, self.config.navigation_timeout())
            .await
            .map_err(|e| AutomationError::Navigation(format!("Could not open {section:?}: {e}")))?;
        self.check_login_redirect(session).await?;
        Ok(self.wait_ready(session).await)
    }
}
