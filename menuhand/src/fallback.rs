//! Ordered fallback: try candidates one after another, stop at the first
//! success. Used both for locator candidates and for routing interaction
//! strategies.

use std::future::Future;

use crate::errors::AutomationError;

/// Errors collected from every candidate that was attempted, in order.
#[derive(Debug, Clone, Default)]
pub struct FallbackErrors {
    pub attempts: Vec<(usize, AutomationError)>,
}

impl FallbackErrors {
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|(i, e)| format!("#{i}: {e}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Run `attempt` for each candidate in order. Later candidates are never
/// started once an earlier one succeeds.
pub async fn first_success<'a, C, T, F, Fut>(
    candidates: &'a [C],
    mut attempt: F,
) -> Result<(usize, T), FallbackErrors>
where
    F: FnMut(usize, &'a C) -> Fut,
    Fut: Future<Output = Result<T, AutomationError>>,
{
    let mut errors = FallbackErrors::default();
    for (index, candidate) in candidates.iter().enumerate() {
        match attempt(index, candidate).await {
            Ok(value) => return Ok((index, value)),
            Err(e) => errors.attempts.push((index, e)),
        }
    }
    Err(errors)
}
