//! Per-resource outcome report produced by both orchestrators.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::resource::ResourceRef;

/// Which orchestrator produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Provision,
    Teardown,
}

/// The step a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Resolve,
    Create,
    Clone,
    AttachNetwork,
    PowerOn,
    Stop,
    Remove,
}

impl Step {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Create => "create",
            Self::Clone => "clone",
            Self::AttachNetwork => "attach network",
            Self::PowerOn => "power on",
            Self::Stop => "stop",
            Self::Remove => "remove",
        }
    }
}

/// What happened to one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Created,
    AlreadyExists,
    /// An existing VM was (re)attached to the fleet vnet.
    Attached,
    PoweredOn,
    AlreadyRunning,
    Removed,
    AlreadyAbsent,
    /// Present but deliberately left in place.
    Retained { reason: String },
    Failed { step: Step, error: String },
}

impl Action {
    /// Build a failure entry, keeping the full error chain.
    pub fn failed(step: Step, error: &(dyn std::error::Error + 'static)) -> Self {
        let mut msg = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            msg.push_str(": ");
            msg.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::Failed { step, error: msg }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub resource: ResourceRef,
    #[serde(flatten)]
    pub action: Action,
}

/// Ordered list of per-resource outcomes.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub operation: Operation,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<ReportEntry>,
}

impl Report {
    #[must_use]
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            generated_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, resource: ResourceRef, action: Action) {
        self.entries.push(ReportEntry { resource, action });
    }

    /// Number of entries whose action matches `pred`.
    pub fn count(&self, pred: impl Fn(&Action) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.action)).count()
    }

    /// Entries that record a failure.
    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.action.is_failure())
    }

    /// `true` when a pool, zone, or vnet step failed.
    #[must_use]
    pub fn has_infrastructure_failure(&self) -> bool {
        self.failures()
            .any(|e| !matches!(e.resource, ResourceRef::Vm { .. }))
    }

    /// Actions recorded for one resource, in order.
    pub fn actions_for<'a>(
        &'a self,
        resource: &ResourceRef,
    ) -> impl Iterator<Item = &'a Action> + use<'a> {
        let resource = resource.clone();
        self.entries
            .iter()
            .filter(move |e| e.resource == resource)
            .map(|e| &e.action)
    }
}
