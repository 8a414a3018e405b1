//! Login state machine, including two-factor challenges.

pub mod totp;

use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::PortalConfig;
use crate::errors::AutomationError;
use crate::locator::{ElementResolver, ResolveOptions};
use crate::session::{LoginState, Session};
use crate::targets::Target;

pub use totp::{
    code_channel, current_totp, generate_totp, ChannelCodeProvider, CodeSubmitter,
    TotpCodeProvider, TwoFactorCodeProvider,
};

/// Page copy that suggests a second factor is being asked for. This is a
/// heuristic; portal wording changes break it silently.
const TWO_FACTOR_PHRASES: &[&str] = &[
    "verification code",
    "two-factor",
    "two factor",
    "2-step",
    "authentication code",
    "enter the code",
    "one-time code",
];

const TWO_FACTOR_URL_MARKERS: &[&str] = &["/mfa", "mfa-", "verify", "two-factor", "challenge"];

const LOGIN_URL_MARKERS: &[&str] = &["/login", "/signin", "/sign-in", "/u/login", "/authorize"];

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub success: bool,
    pub state: LoginState,
    /// Every state the attempt passed through, starting at `INITIAL`.
    pub transitions: Vec<LoginState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PostSubmit {
    LoggedIn,
    TwoFactor,
    Rejected(String),
}

/// Whether `url` is a sign-in surface.
pub fn is_login_url(url: &str, login_url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    (!login_url.is_empty() && lower.starts_with(&login_url.to_ascii_lowercase()))
        || LOGIN_URL_MARKERS.iter().any(|m| lower.contains(m))
}

fn is_two_factor_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    TWO_FACTOR_URL_MARKERS.iter().any(|m| lower.contains(m))
}

fn mentions_two_factor(text: &str) -> bool {
    let lower = text.to_lowercase();
    TWO_FACTOR_PHRASES.iter().any(|p| lower.contains(p))
}

struct Transitions<'a> {
    session: &'a Session,
    history: Vec<LoginState>,
}

impl<'a> Transitions<'a> {
    fn start(session: &'a Session) -> Self {
        session.set_login_state(LoginState::Initial);
        Self {
            session,
            history: vec![LoginState::Initial],
        }
    }

    fn enter(&mut self, state: LoginState) {
        debug!("Login state {} -> {}", self.session.login_state(), state);
        self.session.set_login_state(state);
        self.history.push(state);
    }
}

pub struct AuthSessionController {
    resolver: ElementResolver,
    config: Arc<PortalConfig>,
    credentials: Credentials,
    code_provider: Option<Arc<dyn TwoFactorCodeProvider>>,
}

impl AuthSessionController {
    pub fn new(resolver: ElementResolver, config: Arc<PortalConfig>, credentials: Credentials) -> Self {
        Self {
            resolver,
            config,
            credentials,
            code_provider: None,
        }
    }

    pub fn with_code_provider(mut self, provider: Arc<dyn TwoFactorCodeProvider>) -> Self {
        self.code_provider = Some(provider);
        self
    }

    pub fn config(&self) -> &Arc<PortalConfig> {
        &self.config
    }

    fn field_options(&self) -> ResolveOptions {
        ResolveOptions::new(self.config.default_timeout())
    }

    /// Run the full login sequence. Never returns an error: failures are
    /// reported in the outcome, with a screenshot taken first.
    #[instrument(skip(self, session), fields(user = %self.credentials.username))]
    pub async fn login(&self, session: &Session) -> LoginOutcome {
        let mut transitions = Transitions::start(session);
        match self.run_login(session, &mut transitions).await {
            Ok(()) => {
                info!("Logged in");
                LoginOutcome {
                    success: true,
                    state: LoginState::LoggedIn,
                    transitions: transitions.history,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Login failed: {}", e);
                session.take_screenshot("login-failed").await;
                transitions.enter(LoginState::Failed);
                LoginOutcome {
                    success: false,
                    state: LoginState::Failed,
                    transitions: transitions.history,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn run_login(
        &self,
        session: &Session,
        transitions: &mut Transitions<'_>,
    ) -> Result<(), AutomationError> {
        let page = session.page();
        let options = self.field_options();

        page.goto(&self.config.login_url, self.config.navigation_timeout())
            .await?;

        self.resolver
            .fill(page, Target::LoginEmailInput, &options, &self.credentials.username)
            .await?;

        // Identifier-first forms only show the password after "Continue".
        if !self
            .resolver
            .exists(page, Target::LoginPasswordInput, None)
            .await
        {
            self.resolver
                .click(page, Target::LoginContinueButton, &options)
                .await?;
        }

        self.resolver
            .fill(page, Target::LoginPasswordInput, &options, &self.credentials.password)
            .await?;
        self.resolver
            .click(page, Target::LoginSubmitButton, &options)
            .await?;
        session.set_login_state(LoginState::CredentialsEntered);

        match self.await_post_submit(session, false).await? {
            PostSubmit::LoggedIn => {
                transitions.enter(LoginState::LoggedIn);
                Ok(())
            }
            PostSubmit::Rejected(message) => Err(AutomationError::Auth(message)),
            PostSubmit::TwoFactor => {
                transitions.enter(LoginState::CredentialsEntered);
                transitions.enter(LoginState::AwaitingTwoFactor);
                self.complete_two_factor(session).await?;
                transitions.enter(LoginState::LoggedIn);
                Ok(())
            }
        }
    }

    async fn complete_two_factor(&self, session: &Session) -> Result<(), AutomationError> {
        let page = session.page();
        let provider = self.code_provider.as_ref().ok_or_else(|| {
            AutomationError::Auth("Two-factor code required but no code source configured".into())
        })?;
        session.take_screenshot("two-factor-challenge").await;

        let code = provider.code().await.map_err(|e| match e {
            AutomationError::Auth(_) => e,
            other => AutomationError::Auth(format!("Could not obtain two-factor code: {other}")),
        })?;

        let options = self.field_options();
        self.resolver
            .fill(page, Target::TwoFactorCodeInput, &options, &code)
            .await?;
        if self
            .resolver
            .exists(page, Target::TwoFactorSubmitButton, None)
            .await
        {
            self.resolver
                .click(page, Target::TwoFactorSubmitButton, &ResolveOptions::immediate())
                .await?;
        } else {
            page.press("Enter").await?;
        }

        // The challenge stays on screen until the portal navigates away.
        match self.await_post_submit(session, true).await? {
            PostSubmit::LoggedIn => Ok(()),
            PostSubmit::TwoFactor => Err(AutomationError::Auth(
                "Two-factor code was not accepted".into(),
            )),
            PostSubmit::Rejected(message) => Err(AutomationError::Auth(message)),
        }
    }

    /// Poll the page after a submit until it shows an error, a second-factor
    /// challenge or the logged-in shell.
    ///
    /// With `challenge_pending` the challenge is the page we just submitted
    /// from, so seeing it again decides nothing; it is only reported if it is
    /// still there at the deadline.
    async fn await_post_submit(
        &self,
        session: &Session,
        challenge_pending: bool,
    ) -> Result<PostSubmit, AutomationError> {
        let page = session.page();
        let deadline = Instant::now() + self.config.navigation_timeout();
        let mut challenge_seen = false;
        loop {
            match self.inspect(session).await? {
                Some(PostSubmit::TwoFactor) if challenge_pending => challenge_seen = true,
                Some(state) => return Ok(state),
                None => {}
            }
            let now = Instant::now();
            if now >= deadline {
                if challenge_seen {
                    return Ok(PostSubmit::TwoFactor);
                }
                return Err(AutomationError::Auth(format!(
                    "No recognisable page after submit (at {})",
                    page.current_url().await.unwrap_or_default()
                )));
            }
            tokio::time::sleep(self.config.poll_interval().min(deadline - now)).await;
        }
    }

    async fn inspect(&self, session: &Session) -> Result<Option<PostSubmit>, AutomationError> {
        let page = session.page();
        let url = page.current_url().await?;

        if let Ok(found) = self
            .resolver
            .resolve(page, Target::LoginErrorMessage, &ResolveOptions::immediate())
            .await
        {
            let message = page.text_of(&found.element).await.unwrap_or_default();
            let message = message.trim();
            return Ok(Some(PostSubmit::Rejected(if message.is_empty() {
                "Portal rejected the credentials".to_string()
            } else {
                message.to_string()
            })));
        }

        if self.detect_two_factor(session, &url).await {
            return Ok(Some(PostSubmit::TwoFactor));
        }

        if !is_login_url(&url, &self.config.login_url)
            && (self.resolver.exists(page, Target::MainContent, None).await
                || self.resolver.exists(page, Target::UserMenu, None).await)
        {
            return Ok(Some(PostSubmit::LoggedIn));
        }
        Ok(None)
    }

    async fn detect_two_factor(&self, session: &Session, url: &str) -> bool {
        let page = session.page();
        if self
            .resolver
            .exists(page, Target::TwoFactorCodeInput, None)
            .await
        {
            return true;
        }
        if is_two_factor_url(url) {
            return true;
        }
        match page.page_text().await {
            Ok(text) => mentions_two_factor(&text),
            Err(_) => false,
        }
    }

    /// Whether the session still looks authenticated: logged in according
    /// to its own state and not bounced back to a sign-in surface.
    pub async fn is_session_valid(&self, session: &Session) -> bool {
        if !session.is_logged_in() {
            return false;
        }
        let page = session.page();
        match page.current_url().await {
            Ok(url) if is_login_url(&url, &self.config.login_url) => {
                debug!("Login redirect detected at {}", url);
                false
            }
            Ok(_) => {
                !self
                    .resolver
                    .exists(page, Target::LoginPasswordInput, None)
                    .await
            }
            Err(_) => false,
        }
    }

    /// Log in unless the session is already valid. Safe to call repeatedly.
    pub async fn ensure_session(&self, session: &Session) -> Result<(), AutomationError> {
        if self.is_session_valid(session).await {
            return Ok(());
        }
        if session.is_logged_in() {
            info!("Session expired, logging in again");
            session.invalidate();
        }
        let outcome = self.login(session).await;
        if outcome.success {
            Ok(())
        } else {
            Err(AutomationError::Auth(
                outcome.error.unwrap_or_else(|| "Login failed".to_string()),
            ))
        }
    }
}
