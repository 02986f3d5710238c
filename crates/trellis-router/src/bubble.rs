//! Action bubbling
//!
//! Actions travel from the origin route up its parent links to the root.
//! Each route with a handler for the action gets a turn; the walk stops at
//! the first handler that returns [`Propagation::Stop`] or marks the context
//! handled. A handler returning `Err` re-throws, which ends the walk with
//! [`BubbleOutcome::Failed`] whatever else it did to the context.
//!
//! `loading` and `error` are fired by the router itself; any other name is a
//! user action sent through `Router::send`.

use serde_json::Value;
use tracing::trace;

use crate::handler::{HookContext, Propagation};
use crate::lookup::Lookup;
use crate::transition::Transition;
use crate::tree::RouteTree;

/// Reserved action fired while a model hook is pending
pub const LOADING: &str = "loading";

/// Reserved action fired when a model hook rejects
pub const ERROR: &str = "error";

/// One action on its way up the route chain
#[derive(Debug, Clone, PartialEq)]
pub struct ActionEnvelope {
    pub action_name: String,
    pub payload: Value,
    pub origin_route_name: String,
    pub handled: bool,
    /// The transition the action was fired for; `None` for user actions
    pub transition: Option<Transition>,
}

impl ActionEnvelope {
    pub fn new(action_name: impl Into<String>, payload: Value, origin: impl Into<String>) -> Self {
        Self {
            action_name: action_name.into(),
            payload,
            origin_route_name: origin.into(),
            handled: false,
            transition: None,
        }
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transition = Some(transition);
        self
    }
}

/// How a bubble walk ended
#[derive(Debug, Clone, PartialEq)]
pub enum BubbleOutcome {
    Handled { by: String },
    /// Reached the root without a handler stopping it
    Unhandled,
    /// A handler re-threw
    Failed { route: String, reason: Value },
}

/// Walks `envelope` from its origin to the root
pub fn bubble<L: Lookup + ?Sized>(
    tree: &RouteTree,
    lookup: &L,
    envelope: &mut ActionEnvelope,
    ctx: &mut HookContext,
) -> BubbleOutcome {
    let Some(origin) = tree.id(&envelope.origin_route_name) else {
        return BubbleOutcome::Unhandled;
    };

    for route in tree.ancestors(origin) {
        let Some(definition) = lookup.route(route.name()) else {
            continue;
        };
        let Some(handler) = definition.action(&envelope.action_name) else {
            continue;
        };

        trace!(action = %envelope.action_name, route = route.name(), "invoking action handler");
        match handler(&*envelope, ctx) {
            Err(reason) => {
                return BubbleOutcome::Failed {
                    route: route.name().to_string(),
                    reason,
                };
            }
            Ok(Propagation::Bubble) if !ctx.is_handled() => continue,
            Ok(_) => {
                envelope.handled = true;
                return BubbleOutcome::Handled {
                    by: route.name().to_string(),
                };
            }
        }
    }

    BubbleOutcome::Unhandled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::{RouteMap, RouteOptions};
    use crate::handler::RouteDefinition;
    use crate::lookup::Registry;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn family_tree() -> RouteTree {
        let mut map = RouteMap::new();
        map.nest("grandma", |grandma| {
            grandma.nest_with("mom", RouteOptions::new().reset_namespace(), |mom| {
                mom.route("sally");
            });
        });
        map.build().unwrap()
    }

    fn recording(log: &Rc<RefCell<Vec<String>>>, name: &str, propagation: Propagation) -> RouteDefinition {
        let log = Rc::clone(log);
        let name = name.to_string();
        RouteDefinition::new().on(ERROR, move |_, _| {
            log.borrow_mut().push(name.clone());
            Ok(propagation)
        })
    }

    #[test]
    fn test_bubbles_to_first_stopping_handler() {
        let tree = family_tree();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = Registry::new();
        registry
            .register_route("mom", recording(&log, "mom", Propagation::Bubble))
            .register_route("grandma", recording(&log, "grandma", Propagation::Stop))
            .register_route("application", recording(&log, "application", Propagation::Stop));

        let mut envelope = ActionEnvelope::new(ERROR, json!("boom"), "mom.sally");
        let mut ctx = HookContext::default();
        let outcome = bubble(&tree, &registry, &mut envelope, &mut ctx);

        assert_eq!(outcome, BubbleOutcome::Handled { by: "grandma".into() });
        assert!(envelope.handled);
        assert_eq!(*log.borrow(), vec!["mom".to_string(), "grandma".to_string()]);
    }

    #[test]
    fn test_missing_handlers_bubble_to_root() {
        let tree = family_tree();
        let registry = Registry::new();
        let mut envelope = ActionEnvelope::new(ERROR, json!("boom"), "mom.sally");
        let outcome = bubble(&tree, &registry, &mut envelope, &mut HookContext::default());
        assert_eq!(outcome, BubbleOutcome::Unhandled);
        assert!(!envelope.handled);
    }

    #[test]
    fn test_mark_handled_stops_bubbling() {
        let tree = family_tree();
        let mut registry = Registry::new();
        registry.register_route(
            "mom",
            RouteDefinition::new().on(ERROR, |_, ctx| {
                ctx.mark_handled();
                Ok(Propagation::Bubble)
            }),
        );

        let mut envelope = ActionEnvelope::new(ERROR, Value::Null, "mom.sally");
        let outcome = bubble(&tree, &registry, &mut envelope, &mut HookContext::default());
        assert_eq!(outcome, BubbleOutcome::Handled { by: "mom".into() });
    }

    #[test]
    fn test_throw_wins_over_handled() {
        let tree = family_tree();
        let mut registry = Registry::new();
        registry.register_route(
            "mom",
            RouteDefinition::new().on(ERROR, |envelope, ctx| {
                ctx.mark_handled();
                Err(envelope.payload.clone())
            }),
        );

        let mut envelope = ActionEnvelope::new(ERROR, json!({ "msg": "again" }), "mom.sally");
        let outcome = bubble(&tree, &registry, &mut envelope, &mut HookContext::default());
        assert_eq!(
            outcome,
            BubbleOutcome::Failed {
                route: "mom".into(),
                reason: json!({ "msg": "again" }),
            }
        );
        assert!(!envelope.handled);
    }
}
