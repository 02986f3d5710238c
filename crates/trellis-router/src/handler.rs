//! Route hooks and action handlers
//!
//! A [`RouteDefinition`] is the behaviour registered for one route name: an
//! optional `model` hook, an optional `setup_controller` hook, and a map of
//! action handlers. Every hook receives a [`HookContext`], which is how hooks
//! read router state and ask for a redirect instead of reaching for globals.
//!
//! # Examples
//!
//! ```
//! use trellis_router::{ModelResult, Propagation, RouteDefinition};
//! use serde_json::json;
//!
//! let route = RouteDefinition::new()
//!     .with_model(|params, _ctx| ModelResult::resolved(json!({ "id": params.get("post_id") })))
//!     .on("error", |_envelope, ctx| {
//!         ctx.transition_to("index");
//!         Ok(Propagation::Stop)
//!     });
//!
//! assert!(route.has_action("error"));
//! assert!(!route.has_action("loading"));
//! ```

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::bubble::ActionEnvelope;
use crate::controller::Controller;
use crate::deferred::ModelResult;
use crate::transition::{Params, QueryParams, Transition};

/// Whether an action keeps bubbling after a handler ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Handled; stop here
    Stop,
    /// Not handled; continue to the parent route
    Bubble,
}

/// A navigation requested from inside a hook
#[derive(Debug, Clone, PartialEq)]
pub enum Redirect {
    Transition {
        route: String,
        params: Params,
        query_params: QueryParams,
    },
    Url(String),
}

/// Router state handed to every hook invocation
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    current_path: String,
    current_route_name: String,
    transition: Option<Transition>,
    redirect: Option<Redirect>,
    handled: bool,
}

impl HookContext {
    pub(crate) fn new(
        current_path: &str,
        current_route_name: &str,
        transition: Option<Transition>,
    ) -> Self {
        Self {
            current_path: current_path.to_string(),
            current_route_name: current_route_name.to_string(),
            transition,
            redirect: None,
            handled: false,
        }
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    pub fn current_route_name(&self) -> &str {
        &self.current_route_name
    }

    /// Snapshot of the transition the hook runs for
    pub fn transition(&self) -> Option<&Transition> {
        self.transition.as_ref()
    }

    /// Starts a new navigation once the hook returns, superseding the current one
    pub fn transition_to(&mut self, route: impl Into<String>) {
        self.transition_to_with(route, Params::new(), QueryParams::new());
    }

    pub fn transition_to_with(
        &mut self,
        route: impl Into<String>,
        params: Params,
        query_params: QueryParams,
    ) {
        self.redirect = Some(Redirect::Transition {
            route: route.into(),
            params,
            query_params,
        });
    }

    /// Like [`HookContext::transition_to`], starting from a URL
    pub fn visit(&mut self, url: impl Into<String>) {
        self.redirect = Some(Redirect::Url(url.into()));
    }

    /// Marks the action handled even if the handler returns `Bubble`
    pub fn mark_handled(&mut self) {
        self.handled = true;
    }

    pub fn is_handled(&self) -> bool {
        self.handled
    }

    pub(crate) fn take_redirect(&mut self) -> Option<Redirect> {
        self.redirect.take()
    }
}

pub type ModelHook = Box<dyn Fn(&Params, &mut HookContext) -> ModelResult>;

pub type SetupControllerHook = Box<dyn Fn(&mut Controller, &Value)>;

/// `Err` is a re-throw: the action fails no matter what else the handler did
pub type ActionHandler = Box<dyn Fn(&ActionEnvelope, &mut HookContext) -> Result<Propagation, Value>>;

/// Behaviour registered for a route name
#[derive(Default)]
pub struct RouteDefinition {
    model: Option<ModelHook>,
    setup_controller: Option<SetupControllerHook>,
    actions: HashMap<String, ActionHandler>,
}

impl RouteDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Params, &mut HookContext) -> ModelResult + 'static,
    {
        self.model = Some(Box::new(hook));
        self
    }

    /// Runs after the controller received the model
    pub fn with_setup_controller<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Controller, &Value) + 'static,
    {
        self.setup_controller = Some(Box::new(hook));
        self
    }

    /// Registers an action handler
    pub fn on<F>(mut self, action: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ActionEnvelope, &mut HookContext) -> Result<Propagation, Value> + 'static,
    {
        self.actions.insert(action.into(), Box::new(handler));
        self
    }

    pub fn action(&self, name: &str) -> Option<&ActionHandler> {
        self.actions.get(name)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Runs the model hook, or the default one when none was registered
    pub fn model(&self, params: &Params, ctx: &mut HookContext) -> ModelResult {
        match &self.model {
            Some(hook) => hook(params, ctx),
            None => default_model(params),
        }
    }

    /// Sets the controller's model, then runs the custom hook if any
    pub fn setup_controller(&self, controller: &mut Controller, model: &Value) {
        controller.set_model(model.clone());
        if let Some(hook) = &self.setup_controller {
            hook(controller, model);
        }
    }
}

impl fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        actions.sort_unstable();
        f.debug_struct("RouteDefinition")
            .field("model", &self.model.is_some())
            .field("setup_controller", &self.setup_controller.is_some())
            .field("actions", &actions)
            .finish()
    }
}

/// Model for routes without a hook: the route's own params, or null
pub fn default_model(params: &Params) -> ModelResult {
    if params.is_empty() {
        return ModelResult::Resolved(Value::Null);
    }
    let object: Map<String, Value> = params
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();
    ModelResult::Resolved(Value::Object(object))
}
