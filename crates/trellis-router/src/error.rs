//! Router error taxonomy

use serde_json::Value;
use thiserror::Error;

use crate::transition::SequenceId;

/// Errors surfaced by the route tree and the router state machine
///
/// Structural errors (`UnrecognizedRoute`, `UnrecognizedUrl`,
/// `MissingParams`, `DuplicateRoute`, `InvalidRouteName`) are reported before
/// any side effect. `Unhandled` and `HandlerFailed` are fatal outcomes of a
/// transition; the rendered error substate, if one was entered, stays on
/// screen.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouterError {
    #[error("There is no route named '{0}'")]
    UnrecognizedRoute(String),

    #[error("The URL '{0}' did not match any routes")]
    UnrecognizedUrl(String),

    #[error("Route '{route}' is missing dynamic segment values: {}", missing.join(", "))]
    MissingParams { route: String, missing: Vec<String> },

    #[error("Route '{0}' is defined more than once")]
    DuplicateRoute(String),

    #[error("Invalid route name '{0}'")]
    InvalidRouteName(String),

    /// A model rejection reached the root of the action chain unhandled
    #[error("Error while processing route: {route}: {reason}")]
    Unhandled {
        route: String,
        reason: Value,
        substate: Option<String>,
    },

    /// An action handler re-threw; this wins over any "handled" signal
    #[error("The '{action}' handler on route '{route}' failed: {reason}")]
    HandlerFailed {
        route: String,
        action: String,
        reason: Value,
    },

    /// The transition was superseded or stopped by a handled error
    #[error("Transition {sequence_id} to '{target}' was aborted")]
    Aborted {
        target: String,
        sequence_id: SequenceId,
    },

    #[error("Nothing handled the action '{0}'")]
    UnhandledAction(String),

    #[error("Route '{0}' is not part of the current route chain")]
    NotActive(String),
}

impl RouterError {
    /// The payload a fatal transition failed with, if any
    ///
    /// For `Unhandled` this is the exact value the model hook rejected with.
    pub fn reason(&self) -> Option<&Value> {
        match self {
            RouterError::Unhandled { reason, .. } | RouterError::HandlerFailed { reason, .. } => {
                Some(reason)
            }
            _ => None,
        }
    }

    /// Whether this error ended a transition (as opposed to a structural error)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RouterError::Unhandled { .. } | RouterError::HandlerFailed { .. }
        )
    }
}

pub type Result<T, E = RouterError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unhandled_carries_exact_reason() {
        let err = RouterError::Unhandled {
            route: "mom.sally".into(),
            reason: json!({ "msg": "did it broke?" }),
            substate: None,
        };
        assert_eq!(err.reason(), Some(&json!({ "msg": "did it broke?" })));
        assert!(err.is_fatal());
        assert!(err.to_string().contains("mom.sally"));
    }

    #[test]
    fn test_missing_params_lists_names() {
        let err = RouterError::MissingParams {
            route: "post".into(),
            missing: vec!["post_id".into(), "slug".into()],
        };
        assert_eq!(
            err.to_string(),
            "Route 'post' is missing dynamic segment values: post_id, slug"
        );
        assert!(!err.is_fatal());
    }
}
