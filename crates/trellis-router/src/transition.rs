//! Transition value object
//!
//! A [`Transition`] describes one navigation attempt: where it is going, the
//! models resolved so far, the pivot below which rendering may change, and
//! its lifecycle state. The router owns the active transition; callers only
//! ever see snapshots.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// Dynamic segment values for a navigation, keyed by segment name
pub type Params = BTreeMap<String, String>;

/// Query parameters for a navigation, kept in key order
pub type QueryParams = BTreeMap<String, String>;

/// Monotonic transition identifier; a newer id supersedes every older one
pub type SequenceId = u64;

/// Lifecycle of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    /// Allocated, no model hook invoked yet
    Pending,
    /// Walking the route chain; may be suspended on a pending model
    Resolving,
    /// Superseded or stopped by a handled error; partial effects discarded
    Aborted,
    /// A model rejected and the rejection was not handled
    Error,
    /// Every level resolved and the chain was committed
    Complete,
}

impl TransitionState {
    /// Whether the transition can no longer make progress
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            TransitionState::Aborted | TransitionState::Error | TransitionState::Complete
        )
    }
}

impl fmt::Display for TransitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransitionState::Pending => "pending",
            TransitionState::Resolving => "resolving",
            TransitionState::Aborted => "aborted",
            TransitionState::Error => "error",
            TransitionState::Complete => "complete",
        };
        f.write_str(label)
    }
}

/// A model recorded for one route level of a transition
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedModel {
    /// The hook settled with this value
    Resolved(Value),
    /// The hook returned a value that has not settled yet
    Pending,
}

impl ResolvedModel {
    /// The settled value, if any
    pub fn value(&self) -> Option<&Value> {
        match self {
            ResolvedModel::Resolved(value) => Some(value),
            ResolvedModel::Pending => None,
        }
    }
}

/// Snapshot of a navigation attempt
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub(crate) target: String,
    pub(crate) sequence_id: SequenceId,
    pub(crate) params: Params,
    pub(crate) query_params: QueryParams,
    pub(crate) resolved: Vec<(String, ResolvedModel)>,
    pub(crate) state: TransitionState,
    pub(crate) pivot: Option<String>,
    pub(crate) url: Option<String>,
}

impl Transition {
    pub(crate) fn new(
        target: impl Into<String>,
        sequence_id: SequenceId,
        params: Params,
        query_params: QueryParams,
    ) -> Self {
        Self {
            target: target.into(),
            sequence_id,
            params,
            query_params,
            resolved: Vec::new(),
            state: TransitionState::Pending,
            pivot: None,
            url: None,
        }
    }

    /// Canonical name of the leaf route being navigated to
    pub fn target_route_name(&self) -> &str {
        &self.target
    }

    pub fn sequence_id(&self) -> SequenceId {
        self.sequence_id
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn query_params(&self) -> &QueryParams {
        &self.query_params
    }

    /// Models recorded so far, root first; retained levels come first
    pub fn resolved_models(&self) -> &[(String, ResolvedModel)] {
        &self.resolved
    }

    /// The settled model for a route of this transition
    pub fn model_for(&self, route: &str) -> Option<&Value> {
        self.resolved
            .iter()
            .find(|(name, _)| name == route)
            .and_then(|(_, model)| model.value())
    }

    pub fn state(&self) -> TransitionState {
        self.state
    }

    /// First route of the chain that was not retained from the committed chain
    ///
    /// `None` when every level was retained (navigating to where we already are).
    pub fn pivot_route_name(&self) -> Option<&str> {
        self.pivot.as_deref()
    }

    /// The URL this transition was started from, when it came from `visit`
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub(crate) fn record(&mut self, route: &str, model: ResolvedModel) {
        match self.resolved.iter_mut().find(|(name, _)| name == route) {
            Some(entry) => entry.1 = model,
            None => self.resolved.push((route.to_string(), model)),
        }
    }
}
