//! Asynchronous model values
//!
//! Model hooks return a [`ModelResult`]. A [`Deferred`] stands in for a value
//! that settles later: whoever owns the other end calls [`Deferred::resolve`]
//! or [`Deferred::reject`], and the router picks the settlement up from its
//! queue, tagged with the sequence id of the transition that was waiting.
//! Settlements tagged with a superseded id are dropped by the router, so a
//! late value can never be applied twice or to the wrong navigation.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

use crate::transition::SequenceId;

/// What a model hook produced
#[derive(Debug, Clone)]
pub enum ModelResult {
    Resolved(Value),
    Pending(Deferred),
    Rejected(Value),
}

impl ModelResult {
    pub fn resolved(value: impl Into<Value>) -> Self {
        ModelResult::Resolved(value.into())
    }

    pub fn rejected(reason: impl Into<Value>) -> Self {
        ModelResult::Rejected(reason.into())
    }
}

impl From<Value> for ModelResult {
    fn from(value: Value) -> Self {
        ModelResult::Resolved(value)
    }
}

impl From<Deferred> for ModelResult {
    fn from(deferred: Deferred) -> Self {
        ModelResult::Pending(deferred)
    }
}

/// Final value of a deferred
#[derive(Debug, Clone, PartialEq)]
pub enum Settled {
    Resolved(Value),
    Rejected(Value),
}

/// A settled deferred, addressed to the transition level that awaited it
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub sequence_id: SequenceId,
    pub route: String,
    pub outcome: Settled,
}

#[derive(Debug)]
struct Listener {
    tx: UnboundedSender<Settlement>,
    sequence_id: SequenceId,
    route: String,
}

#[derive(Debug, Default)]
struct Inner {
    outcome: Option<Settled>,
    listener: Option<Listener>,
}

/// Shared handle to a value that settles at most once
///
/// Clones share the same state. Settling an already-settled deferred is a
/// no-op and returns `false`.
///
/// # Examples
///
/// ```
/// use trellis_router::Deferred;
/// use serde_json::json;
///
/// let deferred = Deferred::new();
/// assert!(!deferred.is_settled());
/// assert!(deferred.resolve(json!("ready")));
/// assert!(!deferred.reject(json!("too late")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Deferred {
    inner: Rc<RefCell<Inner>>,
}

impl Deferred {
    pub fn new() -> Self {
        Self::default()
    }

    /// A deferred that already holds its value
    ///
    /// The router treats it exactly like a synchronous return.
    pub fn resolved(value: impl Into<Value>) -> Self {
        let deferred = Self::new();
        deferred.settle(Settled::Resolved(value.into()));
        deferred
    }

    pub fn resolve(&self, value: impl Into<Value>) -> bool {
        self.settle(Settled::Resolved(value.into()))
    }

    pub fn reject(&self, reason: impl Into<Value>) -> bool {
        self.settle(Settled::Rejected(reason.into()))
    }

    pub fn is_settled(&self) -> bool {
        self.inner.borrow().outcome.is_some()
    }

    fn settle(&self, outcome: Settled) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.outcome.is_some() {
            return false;
        }

        if let Some(listener) = inner.listener.take() {
            let settlement = Settlement {
                sequence_id: listener.sequence_id,
                route: listener.route,
                outcome: outcome.clone(),
            };
            if let Err(unsent) = listener.tx.send(settlement) {
                trace!(route = %unsent.0.route, "router dropped, settlement discarded");
            }
        }
        inner.outcome = Some(outcome);
        true
    }

    /// Registers the router's continuation for this value
    ///
    /// Returns the outcome immediately when the deferred has already settled,
    /// in which case nothing is queued.
    pub(crate) fn subscribe(
        &self,
        tx: UnboundedSender<Settlement>,
        sequence_id: SequenceId,
        route: &str,
    ) -> Option<Settled> {
        let mut inner = self.inner.borrow_mut();
        if let Some(outcome) = &inner.outcome {
            return Some(outcome.clone());
        }
        inner.listener = Some(Listener {
            tx,
            sequence_id,
            route: route.to_string(),
        });
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn test_settled_deferred_reports_outcome_on_subscribe() {
        let (tx, mut rx) = unbounded_channel();
        let deferred = Deferred::resolved(json!(1));
        assert_eq!(
            deferred.subscribe(tx, 7, "foo"),
            Some(Settled::Resolved(json!(1)))
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_pending_deferred_queues_tagged_settlement() {
        let (tx, mut rx) = unbounded_channel();
        let deferred = Deferred::new();
        assert_eq!(deferred.subscribe(tx, 3, "foo.bar"), None);

        assert!(deferred.clone().reject(json!({ "msg": "nope" })));
        let settlement = rx.try_recv().unwrap();
        assert_eq!(settlement.sequence_id, 3);
        assert_eq!(settlement.route, "foo.bar");
        assert_eq!(settlement.outcome, Settled::Rejected(json!({ "msg": "nope" })));
    }

    #[test]
    fn test_second_settle_is_ignored() {
        let (tx, mut rx) = unbounded_channel();
        let deferred = Deferred::new();
        deferred.subscribe(tx, 1, "foo");

        assert!(deferred.resolve(json!("a")));
        assert!(!deferred.resolve(json!("b")));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_settling_after_router_dropped_still_records_outcome() {
        let (tx, rx) = unbounded_channel();
        let deferred = Deferred::new();
        deferred.subscribe(tx, 2, "foo.bar");
        drop(rx);

        assert!(deferred.resolve(json!("orphaned")));
        assert!(deferred.is_settled());
        assert_eq!(
            deferred.subscribe(unbounded_channel().0, 3, "foo.bar"),
            Some(Settled::Resolved(json!("orphaned")))
        );
    }
}
