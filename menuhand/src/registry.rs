//! Process-wide registry of locator candidates with self-healing promotion.
//!
//! Each [`Target`] owns one [`LocatorSpec`] behind its own lock, so
//! concurrent sessions promoting different targets never contend and two
//! sessions promoting the same target are serialized.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::errors::AutomationError;
use crate::selector::Selector;
use crate::targets::Target;

/// Ordered locator candidates for one semantic target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorSpec {
    pub target: Target,
    pub primary: Selector,
    pub fallbacks: Vec<Selector>,
    pub description: String,
    pub last_verified: Option<DateTime<Utc>>,
}

/// What happened to a promotion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// The matched candidate is now primary.
    Promoted,
    /// The matched candidate already was primary; only the timestamp moved.
    AlreadyPrimary,
    /// A more recent verification exists; the observation was discarded.
    Stale,
    /// The matched candidate is not part of this spec (e.g. it was replaced
    /// by an override while the resolution was in flight).
    Unknown,
}

impl LocatorSpec {
    pub fn new(target: Target, candidates: Vec<Selector>) -> Result<Self, AutomationError> {
        if let Some(bad) = candidates.iter().find(|s| !s.is_valid()) {
            return Err(AutomationError::Validation(format!(
                "Invalid locator for {target}: {bad}"
            )));
        }
        let mut iter = candidates.into_iter();
        let primary = iter.next().ok_or_else(|| {
            AutomationError::Validation(format!("No locator candidates for {target}"))
        })?;
        Ok(Self {
            target,
            primary,
            fallbacks: iter.collect(),
            description: target.description().to_string(),
            last_verified: None,
        })
    }

    fn from_defaults(target: Target) -> Result<Self, AutomationError> {
        let candidates = target
            .default_locators()
            .iter()
            .map(|raw| Selector::from(*raw))
            .collect();
        Self::new(target, candidates)
    }

    /// `[primary, ...fallbacks]` in resolution order.
    pub fn candidates(&self) -> Vec<Selector> {
        std::iter::once(self.primary.clone())
            .chain(self.fallbacks.iter().cloned())
            .collect()
    }

    /// Make `matched` the primary candidate, pushing the old primary to the
    /// head of the fallback list.
    pub fn promote(&mut self, matched: &Selector, observed_at: DateTime<Utc>) -> PromotionOutcome {
        if self.last_verified.is_some_and(|v| v > observed_at) {
            return PromotionOutcome::Stale;
        }
        if &self.primary == matched {
            self.last_verified = Some(observed_at);
            return PromotionOutcome::AlreadyPrimary;
        }
        let Some(pos) = self.fallbacks.iter().position(|s| s == matched) else {
            return PromotionOutcome::Unknown;
        };
        let promoted = self.fallbacks.remove(pos);
        let demoted = std::mem::replace(&mut self.primary, promoted);
        self.fallbacks.insert(0, demoted);
        self.last_verified = Some(observed_at);
        PromotionOutcome::Promoted
    }
}

pub struct LocatorRegistry {
    entries: HashMap<Target, Mutex<LocatorSpec>>,
}

static GLOBAL: OnceCell<Arc<LocatorRegistry>> = OnceCell::new();

impl LocatorRegistry {
    /// Build a registry from the static defaults of every [`Target`].
    pub fn with_defaults() -> Self {
        let mut entries = HashMap::with_capacity(Target::ALL.len());
        for target in Target::ALL {
            match LocatorSpec::from_defaults(*target) {
                Ok(spec) => {
                    entries.insert(*target, Mutex::new(spec));
                }
                Err(e) => warn!("Skipping defaults for {}: {}", target, e),
            }
        }
        debug!("Locator registry initialised with {} targets", entries.len());
        Self { entries }
    }

    /// The process-wide registry shared by every session.
    pub fn global() -> Arc<LocatorRegistry> {
        GLOBAL
            .get_or_init(|| Arc::new(LocatorRegistry::with_defaults()))
            .clone()
    }

    fn lock(&self, target: Target) -> Result<MutexGuard<'_, LocatorSpec>, AutomationError> {
        let entry = self
            .entries
            .get(&target)
            .ok_or_else(|| AutomationError::Internal(format!("Target {target} not registered")))?;
        // A panic while holding the lock cannot leave the spec half-updated:
        // every mutation is a single reorder.
        Ok(entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    pub fn get_candidates(&self, target: Target) -> Vec<Selector> {
        self.lock(target)
            .map(|spec| spec.candidates())
            .unwrap_or_default()
    }

    pub fn spec(&self, target: Target) -> Option<LocatorSpec> {
        self.lock(target).ok().map(|spec| spec.clone())
    }

    /// Record that `matched` resolved `target` at `observed_at`.
    pub fn promote(
        &self,
        target: Target,
        matched: &Selector,
        observed_at: DateTime<Utc>,
    ) -> Result<PromotionOutcome, AutomationError> {
        let mut spec = self.lock(target)?;
        let outcome = spec.promote(matched, observed_at);
        match outcome {
            PromotionOutcome::Promoted => info!(
                "Self-healed locator for {}: '{}' promoted, '{}' demoted",
                target,
                spec.primary,
                spec.fallbacks.first().map(|s| s.to_string()).unwrap_or_default()
            ),
            PromotionOutcome::Stale => debug!(
                "Discarded stale promotion of '{}' for {}",
                matched, target
            ),
            PromotionOutcome::Unknown => warn!(
                "Promotion of unknown candidate '{}' for {} ignored",
                matched, target
            ),
            PromotionOutcome::AlreadyPrimary => {}
        }
        Ok(outcome)
    }

    /// Replace the candidate list for one target.
    pub fn update(&self, target: Target, candidates: Vec<Selector>) -> Result<(), AutomationError> {
        let replacement = LocatorSpec::new(target, candidates)?;
        let mut spec = self.lock(target)?;
        *spec = replacement;
        Ok(())
    }

    /// Apply `target name -> ordered locator strings` overrides from
    /// configuration. Every entry is validated before anything is replaced.
    pub fn apply_overrides(
        &self,
        overrides: &HashMap<String, Vec<String>>,
    ) -> Result<usize, AutomationError> {
        let mut parsed = Vec::with_capacity(overrides.len());
        for (name, raw) in overrides {
            let target: Target = name.parse()?;
            let candidates: Vec<Selector> = raw.iter().map(|s| Selector::from(s.as_str())).collect();
            parsed.push(LocatorSpec::new(target, candidates)?);
        }
        let count = parsed.len();
        for replacement in parsed {
            let target = replacement.target;
            *self.lock(target)? = replacement;
        }
        if count > 0 {
            info!("Applied {} locator overrides", count);
        }
        Ok(count)
    }

    /// A copy of every spec, ordered by target.
    pub fn snapshot(&self) -> Vec<LocatorSpec> {
        let mut specs: Vec<LocatorSpec> = Target::ALL
            .iter()
            .filter_map(|t| self.spec(*t))
            .collect();
        specs.sort_by_key(|s| s.target);
        specs
    }
}

impl Default for LocatorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
