//! Per-item results and their aggregation into a job result.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::warn;

use crate::errors::AutomationError;

/// Outcome of one atomic entity operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub success: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationResult {
    pub fn done() -> Self {
        Self {
            success: true,
            skipped: false,
            error: None,
        }
    }

    pub fn skipped() -> Self {
        Self {
            success: true,
            skipped: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            skipped: false,
            error: Some(error.into()),
        }
    }

    /// Turn an operation error into a failed result, unless it is structural,
    /// in which case it stays an error and aborts the job.
    pub fn settle(result: Result<(), AutomationError>) -> Result<Self, AutomationError> {
        match result {
            Ok(()) => Ok(Self::done()),
            Err(e) if e.is_structural() => Err(e),
            Err(e) => Ok(Self::failed(e.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Categories,
    Items,
    Modifiers,
    Removed,
    Template,
    Stations,
    Routing,
    DisplaySettings,
    Printers,
    StationAssignments,
    TestPrints,
    RoutingOptions,
}

impl EntityKind {
    /// Counter name for successful operations of this kind.
    pub fn verb(&self) -> &'static str {
        match self {
            EntityKind::Categories | EntityKind::Items | EntityKind::Stations | EntityKind::Printers => {
                "created"
            }
            EntityKind::Modifiers
            | EntityKind::Template
            | EntityKind::DisplaySettings
            | EntityKind::RoutingOptions => "applied",
            EntityKind::Routing => "routed",
            EntityKind::StationAssignments => "assigned",
            EntityKind::TestPrints => "sent",
            EntityKind::Removed => "removed",
        }
    }
}

/// Counts for one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityTally {
    kind: EntityKind,
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl EntityTally {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            done: 0,
            skipped: 0,
            failed: 0,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }
}

impl Serialize for EntityTally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry(self.kind.verb(), &self.done)?;
        map.serialize_entry("skipped", &self.skipped)?;
        map.serialize_entry("failed", &self.failed)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    pub entity: String,
    pub phase: String,
    pub error: String,
}

/// Running totals of a job, folded from operation results.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateResult {
    pub results: BTreeMap<EntityKind, EntityTally>,
    pub errors: Vec<ItemError>,
}

impl AggregateResult {
    /// Make `kind` appear in the results even if nothing of that kind runs.
    pub fn declare(&mut self, kind: EntityKind) {
        self.results.entry(kind).or_insert_with(|| EntityTally::new(kind));
    }

    pub fn record(&mut self, kind: EntityKind, phase: &str, entity: &str, op: &OperationResult) {
        let tally = self
            .results
            .entry(kind)
            .or_insert_with(|| EntityTally::new(kind));
        match (op.success, op.skipped) {
            (true, true) => tally.skipped += 1,
            (true, false) => tally.done += 1,
            (false, _) => {
                tally.failed += 1;
                let error = op.error.clone().unwrap_or_else(|| "failed".to_string());
                warn!("{} '{}' failed during {}: {}", kind.verb(), entity, phase, error);
                self.errors.push(ItemError {
                    entity: entity.to_string(),
                    phase: phase.to_string(),
                    error,
                });
            }
        }
    }

    /// Add `count` successes at once (bulk operations such as clearing).
    pub fn record_bulk(&mut self, kind: EntityKind, count: usize) {
        self.results
            .entry(kind)
            .or_insert_with(|| EntityTally::new(kind))
            .done += count;
    }

    pub fn tally(&self, kind: EntityKind) -> Option<&EntityTally> {
        self.results.get(&kind)
    }

    pub fn failed_count(&self) -> usize {
        self.results.values().map(|t| t.failed).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JobBody {
    Completed {
        results: BTreeMap<EntityKind, EntityTally>,
        errors: Vec<ItemError>,
    },
    Aborted {
        error: String,
    },
}

/// What every top-level operation returns.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub success: bool,
    #[serde(flatten)]
    pub body: JobBody,
}

impl JobResult {
    pub fn completed(aggregate: AggregateResult) -> Self {
        Self {
            success: aggregate.is_success(),
            body: JobBody::Completed {
                results: aggregate.results,
                errors: aggregate.errors,
            },
        }
    }

    pub fn aborted(error: &AutomationError) -> Self {
        Self {
            success: false,
            body: JobBody::Aborted {
                error: error.to_string(),
            },
        }
    }

    pub fn tally(&self, kind: EntityKind) -> Option<&EntityTally> {
        match &self.body {
            JobBody::Completed { results, .. } => results.get(&kind),
            JobBody::Aborted { .. } => None,
        }
    }

    pub fn errors(&self) -> &[ItemError] {
        match &self.body {
            JobBody::Completed { errors, .. } => errors,
            JobBody::Aborted { .. } => &[],
        }
    }

    pub fn abort_error(&self) -> Option<&str> {
        match &self.body {
            JobBody::Aborted { error } => Some(error),
            JobBody::Completed { .. } => None,
        }
    }
}
