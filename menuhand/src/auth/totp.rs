//! Time-based one-time codes (RFC 6238) and the manual-code channel.

use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::errors::AutomationError;

pub const TOTP_STEP_SECS: u64 = 30;
pub const TOTP_DIGITS: u32 = 6;

type HmacSha1 = Hmac<Sha1>;

/// Supplies the code for a two-factor challenge.
#[async_trait::async_trait]
pub trait TwoFactorCodeProvider: Send + Sync {
    /// Produce a code. May suspend until one is available.
    async fn code(&self) -> Result<String, AutomationError>;
}

fn decode_secret(secret: &str) -> Result<Vec<u8>, AutomationError> {
    let normalized: String = secret
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '=')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if normalized.is_empty() {
        return Err(AutomationError::Validation("TOTP secret is empty".into()));
    }
    BASE32_NOPAD
        .decode(normalized.as_bytes())
        .map_err(|e| AutomationError::Validation(format!("TOTP secret is not valid base32: {e}")))
}

/// The code for `unix_time` (seconds since the epoch).
pub fn generate_totp(secret: &str, unix_time: u64) -> Result<String, AutomationError> {
    let key = decode_secret(secret)?;
    let counter = unix_time / TOTP_STEP_SECS;

    let mut mac = HmacSha1::new_from_slice(&key)
        .map_err(|e| AutomationError::Validation(format!("Unusable TOTP key: {e}")))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    let code = binary % 10u32.pow(TOTP_DIGITS);
    Ok(format!("{:0width$}", code, width = TOTP_DIGITS as usize))
}

pub fn current_totp(secret: &str) -> Result<String, AutomationError> {
    generate_totp(secret, unix_now())
}

/// Seconds until the code for `unix_time` rolls over.
pub fn seconds_remaining(unix_time: u64) -> u64 {
    TOTP_STEP_SECS - unix_time % TOTP_STEP_SECS
}

fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Generates codes from a shared secret.
pub struct TotpCodeProvider {
    secret: String,
    /// Wait for the next window when fewer seconds than this remain, so the
    /// code does not expire between typing and submitting.
    min_validity: u64,
}

impl TotpCodeProvider {
    pub fn new(secret: impl Into<String>) -> Result<Self, AutomationError> {
        let secret = secret.into();
        decode_secret(&secret)?;
        Ok(Self {
            secret,
            min_validity: 3,
        })
    }
}

impl std::fmt::Debug for TotpCodeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TotpCodeProvider").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl TwoFactorCodeProvider for TotpCodeProvider {
    async fn code(&self) -> Result<String, AutomationError> {
        let remaining = seconds_remaining(unix_now());
        if remaining < self.min_validity {
            debug!("TOTP window closing in {}s, waiting for the next one", remaining);
            tokio::time::sleep(Duration::from_secs(remaining)).await;
        }
        current_totp(&self.secret)
    }
}

/// Hands a manually entered code to a waiting login.
#[derive(Clone)]
pub struct CodeSubmitter {
    tx: mpsc::Sender<String>,
}

impl CodeSubmitter {
    pub async fn submit(&self, code: impl Into<String>) -> Result<(), AutomationError> {
        self.tx
            .send(code.into())
            .await
            .map_err(|_| AutomationError::Auth("No login is waiting for a code".into()))
    }
}

/// Suspends the login until a code arrives through the paired
/// [`CodeSubmitter`], or the timeout elapses.
pub struct ChannelCodeProvider {
    rx: Mutex<mpsc::Receiver<String>>,
    timeout: Duration,
}

/// Create a connected submitter/provider pair.
pub fn code_channel(timeout: Duration) -> (CodeSubmitter, ChannelCodeProvider) {
    let (tx, rx) = mpsc::channel(1);
    (
        CodeSubmitter { tx },
        ChannelCodeProvider {
            rx: Mutex::new(rx),
            timeout,
        },
    )
}

#[async_trait::async_trait]
impl TwoFactorCodeProvider for ChannelCodeProvider {
    async fn code(&self) -> Result<String, AutomationError> {
        let mut rx = self.rx.lock().await;
        info!("Waiting up to {:?} for a two-factor code", self.timeout);
        match tokio::time::timeout(self.timeout, rx.recv()).await {
            Ok(Some(code)) => {
                let code = code.trim().to_string();
                if code.is_empty() {
                    return Err(AutomationError::Auth("Empty two-factor code".into()));
                }
                Ok(code)
            }
            Ok(None) => Err(AutomationError::Auth(
                "Two-factor code source closed".into(),
            )),
            Err(_) => Err(AutomationError::Auth(format!(
                "No two-factor code supplied within {:?}",
                self.timeout
            ))),
        }
    }
}
