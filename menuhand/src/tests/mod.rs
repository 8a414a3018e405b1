mod auth_tests;
mod fake_page;
mod health_tests;
mod navigation_tests;
mod workflow_tests;

use std::sync::Arc;

use crate::auth::{AuthSessionController, Credentials};
use crate::config::PortalConfig;
use crate::locator::ElementResolver;
use crate::navigation::NavigationController;
use crate::registry::LocatorRegistry;
use crate::session::Session;
use fake_page::FakePage;

pub const HOME_URL: &str = "https://www.toasttab.com/restaurants/admin/home";

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_target(true)
        .with_test_writer()
        .try_init();
}

/// A fake page wired to a session and a private registry.
pub struct Rig {
    pub page: Arc<FakePage>,
    pub session: Arc<Session>,
    pub registry: Arc<LocatorRegistry>,
    pub resolver: ElementResolver,
    pub config: Arc<PortalConfig>,
}

impl Rig {
    pub fn new(url: &str) -> Self {
        init_tracing();
        let page = Arc::new(FakePage::new(url));
        let session = Arc::new(Session::new(page.clone()));
        let registry = Arc::new(LocatorRegistry::with_defaults());
        let resolver = ElementResolver::new(registry.clone());
        let config = Arc::new(PortalConfig {
            action_delay_ms: 0,
            ..Default::default()
        });
        Self {
            page,
            session,
            registry,
            resolver,
            config,
        }
    }

    pub fn auth(&self) -> AuthSessionController {
        AuthSessionController::new(
            self.resolver.clone(),
            self.config.clone(),
            Credentials::new("ops@example.com", "hunter2"),
        )
    }

    pub fn navigator(&self) -> NavigationController {
        NavigationController::new(self.resolver.clone(), self.config.clone())
    }

    /// A session that is already logged in and sitting on the portal home.
    pub fn logged_in() -> Self {
        let rig = Self::new(HOME_URL);
        rig.session.set_login_state(crate::session::LoginState::LoggedIn);
        rig.page
            .edit(|s| {
                s.add_target("main", crate::targets::Target::MainContent);
            });
        rig
    }
}
