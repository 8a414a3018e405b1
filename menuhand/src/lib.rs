//! Self-healing UI automation for restaurant back-office portals
//!
//! The engine drives a web portal that has no public API: it logs in
//! (including two-factor challenges), switches restaurants and runs
//! multi-step configuration jobs (menu deployment, kitchen display setup,
//! printer setup). Elements are located through ranked candidate lists that
//! heal themselves when the portal's UI drifts.

use std::sync::Arc;

pub mod auth;
pub mod cdp;
pub mod config;
pub mod errors;
pub mod fallback;
pub mod health;
pub mod locator;
pub mod navigation;
pub mod page;
pub mod pages;
pub mod registry;
pub mod routing;
pub mod selector;
pub mod session;
pub mod targets;
#[cfg(test)]
mod tests;
pub mod workflow;

pub use auth::{AuthSessionController, Credentials, LoginOutcome, TwoFactorCodeProvider};
pub use config::PortalConfig;
pub use errors::AutomationError;
pub use health::{
    capture_baseline, check_portal_health, compare_baseline, integration_health_score,
    BaselineComparison, BaselinePage, PageBaseline, PortalHealth,
};
pub use locator::{ElementResolver, ResolveOptions};
pub use navigation::{MatchMode, NavigationController, RestaurantRef};
pub use page::{BoundingBox, ElementHandle, Page};
pub use registry::{LocatorRegistry, LocatorSpec};
pub use selector::Selector;
pub use session::{LoginState, ScreenshotSink, Session};
pub use targets::Target;
pub use workflow::{JobResult, RunContext, WorkflowJob, WorkflowOrchestrator};

use pages::PortalEditor;
use workflow::Editors;

/// Everything needed to automate one portal session, wired together.
pub struct PortalAutomation {
    pub session: Arc<Session>,
    pub resolver: ElementResolver,
    pub auth: Arc<AuthSessionController>,
    pub navigator: Arc<NavigationController>,
    pub orchestrator: WorkflowOrchestrator,
}

impl PortalAutomation {
    pub fn builder(
        page: Arc<dyn Page>,
        config: PortalConfig,
        credentials: Credentials,
    ) -> PortalAutomationBuilder {
        PortalAutomationBuilder {
            page,
            config,
            credentials,
            registry: None,
            code_provider: None,
            screenshots: None,
        }
    }
}

pub struct PortalAutomationBuilder {
    page: Arc<dyn Page>,
    config: PortalConfig,
    credentials: Credentials,
    registry: Option<Arc<LocatorRegistry>>,
    code_provider: Option<Arc<dyn TwoFactorCodeProvider>>,
    screenshots: Option<Arc<dyn ScreenshotSink>>,
}

impl PortalAutomationBuilder {
    /// Use a specific registry instead of the process-wide one.
    pub fn registry(mut self, registry: Arc<LocatorRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn code_provider(mut self, provider: Arc<dyn TwoFactorCodeProvider>) -> Self {
        self.code_provider = Some(provider);
        self
    }

    pub fn screenshot_sink(mut self, sink: Arc<dyn ScreenshotSink>) -> Self {
        self.screenshots = Some(sink);
        self
    }

    /// Apply the configured locator overrides and build every component.
    pub fn build(self) -> Result<PortalAutomation, AutomationError> {
        let registry = self.registry.unwrap_or_else(LocatorRegistry::global);
        registry.apply_overrides(&self.config.locator_overrides)?;
        let config = Arc::new(self.config);

        let resolver = ElementResolver::new(registry).with_poll_interval(config.poll_interval());
        let session = Arc::new(match self.screenshots {
            Some(sink) => Session::with_screenshot_sink(self.page, sink),
            None => Session::new(self.page),
        });

        let mut auth = AuthSessionController::new(resolver.clone(), config.clone(), self.credentials);
        if let Some(provider) = self.code_provider {
            auth = auth.with_code_provider(provider);
        }
        let auth = Arc::new(auth);
        let navigator = Arc::new(NavigationController::new(resolver.clone(), config.clone()));

        let editor = Arc::new(PortalEditor::new(
            session.clone(),
            resolver.clone(),
            navigator.clone(),
            config.clone(),
        ));
        let orchestrator = WorkflowOrchestrator::new(
            session.clone(),
            auth.clone(),
            navigator.clone(),
            Editors {
                menu: editor.clone(),
                kds: editor.clone(),
                printers: editor,
            },
            config,
        );

        Ok(PortalAutomation {
            session,
            resolver,
            auth,
            navigator,
            orchestrator,
        })
    }
}
