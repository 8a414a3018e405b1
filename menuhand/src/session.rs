use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::errors::AutomationError;
use crate::page::Page;

/// Where the login state machine currently stands for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoginState {
    Initial,
    CredentialsEntered,
    AwaitingTwoFactor,
    LoggedIn,
    Failed,
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginState::Initial => write!(f, "INITIAL"),
            LoginState::CredentialsEntered => write!(f, "CREDENTIALS_ENTERED"),
            LoginState::AwaitingTwoFactor => write!(f, "AWAITING_2FA"),
            LoginState::LoggedIn => write!(f, "LOGGED_IN"),
            LoginState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Receives diagnostic screenshots. Persistence is up to the embedder.
#[async_trait::async_trait]
pub trait ScreenshotSink: Send + Sync {
    async fn save(&self, tag: &str, png: Vec<u8>) -> Result<(), AutomationError>;
}

/// Drops every screenshot.
pub struct NullScreenshotSink;

#[async_trait::async_trait]
impl ScreenshotSink for NullScreenshotSink {
    async fn save(&self, _tag: &str, _png: Vec<u8>) -> Result<(), AutomationError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SessionState {
    restaurant_context: Option<String>,
    login_state: Option<LoginState>,
}

/// One live browser page driving one job at a time.
///
/// The page is the only mutable resource of a session; everything that
/// touches it runs sequentially.
pub struct Session {
    page: Arc<dyn Page>,
    screenshots: Arc<dyn ScreenshotSink>,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self::with_screenshot_sink(page, Arc::new(NullScreenshotSink))
    }

    pub fn with_screenshot_sink(page: Arc<dyn Page>, screenshots: Arc<dyn ScreenshotSink>) -> Self {
        Self {
            page,
            screenshots,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn page(&self) -> &dyn Page {
        self.page.as_ref()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn current_restaurant_context(&self) -> Option<String> {
        self.state().restaurant_context.clone()
    }

    pub fn set_restaurant_context(&self, restaurant: Option<String>) {
        self.state().restaurant_context = restaurant;
    }

    pub fn login_state(&self) -> LoginState {
        self.state().login_state.unwrap_or(LoginState::Initial)
    }

    pub fn set_login_state(&self, state: LoginState) {
        self.state().login_state = Some(state);
    }

    pub fn is_logged_in(&self) -> bool {
        self.login_state() == LoginState::LoggedIn
    }

    /// Forget login and restaurant context, e.g. after being bounced to the
    /// sign-in page.
    pub fn invalidate(&self) {
        let mut state = self.state();
        state.login_state = Some(LoginState::Initial);
        state.restaurant_context = None;
        debug!("Session invalidated");
    }

    /// Capture and hand off a screenshot. Failures are logged, never
    /// returned.
    pub async fn take_screenshot(&self, tag: &str) {
        match self.page.screenshot().await {
            Ok(png) => {
                if let Err(e) = self.screenshots.save(tag, png).await {
                    warn!("Failed to store screenshot '{}': {}", tag, e);
                }
            }
            Err(e) => warn!("Failed to capture screenshot '{}': {}", tag, e),
        }
    }
}
