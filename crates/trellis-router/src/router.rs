//! Router state machine
//!
//! The [`Router`] owns the route tree, the committed route chain, the chain
//! currently on screen and at most one active [`Transition`]. Navigation
//! walks the target's chain root first, keeping the prefix it shares with
//! the committed chain and running model hooks for the rest:
//!
//! - a resolved model is recorded and the walk moves on;
//! - a pending model suspends the walk, fires `loading` and mounts the
//!   nearest loading substate at or below the pivot;
//! - a rejected model mounts the nearest error substate and bubbles `error`.
//!
//! When every level resolved, the chain is committed and rendered in a
//! single frame. Starting another navigation supersedes the active one;
//! settlements still queued for it are dropped when drained.

use std::collections::{HashMap, VecDeque};

use serde_json::{json, Value};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, trace, warn};

use crate::bubble::{bubble, ActionEnvelope, BubbleOutcome, ERROR, LOADING};
use crate::controller::{Controller, CURRENT_PATH, CURRENT_ROUTE_NAME};
use crate::deferred::{ModelResult, Settled, Settlement};
use crate::error::{Result, RouterError};
use crate::handler::{default_model, HookContext, Redirect};
use crate::lookup::Lookup;
use crate::path::{join_paths, normalize_path, parse_query, split_url};
use crate::render::{diff, RenderTarget, RenderedLevel};
use crate::substate::{SubstateKind, SubstateResolution, SubstateResolver};
use crate::transition::{Params, QueryParams, ResolvedModel, SequenceId, Transition, TransitionState};
use crate::tree::{RouteId, RouteTree, APPLICATION};

/// Finished transitions kept for [`Router::transition_result`]
const RETIRED_LIMIT: usize = 16;

/// Router behaviour switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterOptions {
    /// Prefix for every generated and visited URL
    pub root_url: String,
    /// Log every route the router settles in at info level
    pub log_transitions: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            root_url: "/".to_string(),
            log_transitions: false,
        }
    }
}

/// Current path as the application controller exposes it
///
/// `application` is skipped; each route contributes the part of its dotted
/// name that does not repeat the path built so far.
///
/// ```
/// use trellis_router::router::calculate_path;
///
/// assert_eq!(calculate_path(&["application", "grandma", "grandma.error"]), "grandma.error");
/// assert_eq!(calculate_path(&["application", "grandma", "mom_error"]), "grandma.mom_error");
/// assert_eq!(calculate_path(&["application", "grandma", "mom", "mom.sally"]), "grandma.mom.sally");
/// assert_eq!(calculate_path(&["application_loading"]), "application_loading");
/// ```
pub fn calculate_path(route_names: &[&str]) -> String {
    let mut path: Vec<&str> = Vec::new();

    for name in route_names.iter().filter(|name| **name != APPLICATION) {
        let parts: Vec<&str> = name.split('.').collect();
        let overlap = (0..=path.len().min(parts.len()))
            .rev()
            .find(|n| path[path.len() - n..] == parts[..*n])
            .unwrap_or(0);
        path.extend_from_slice(&parts[overlap..]);
    }

    path.join(".")
}

/// A resolved route level
#[derive(Debug, Clone, PartialEq)]
struct Level {
    id: RouteId,
    /// Only this route's own dynamic segments
    params: Params,
    model: Value,
}

struct ActiveTransition {
    transition: Transition,
    chain: Vec<RouteId>,
    /// Levels carried over from the committed chain
    retained: usize,
    levels: Vec<Level>,
    /// Route whose model is pending
    waiting: Option<String>,
}

struct Retired {
    transition: Transition,
    error: Option<RouterError>,
}

/// The transition state machine
pub struct Router<L: Lookup, T: RenderTarget> {
    tree: RouteTree,
    lookup: L,
    target: T,
    options: RouterOptions,
    controllers: HashMap<String, Controller>,
    committed: Vec<Level>,
    committed_query: QueryParams,
    rendered: Vec<RenderedLevel>,
    active: Option<ActiveTransition>,
    retired: VecDeque<Retired>,
    next_sequence_id: SequenceId,
    tx: UnboundedSender<Settlement>,
    rx: UnboundedReceiver<Settlement>,
    current_path: String,
    current_route_name: String,
    path_history: Vec<String>,
}

impl<L: Lookup, T: RenderTarget> Router<L, T> {
    pub fn new(tree: RouteTree, lookup: L, target: T) -> Self {
        Self::with_options(tree, lookup, target, RouterOptions::default())
    }

    pub fn with_options(tree: RouteTree, lookup: L, target: T, options: RouterOptions) -> Self {
        let (tx, rx) = unbounded_channel();
        let mut controllers = HashMap::new();
        controllers.insert(APPLICATION.to_string(), Controller::new(APPLICATION));

        Self {
            tree,
            lookup,
            target,
            options,
            controllers,
            committed: Vec::new(),
            committed_query: QueryParams::new(),
            rendered: Vec::new(),
            active: None,
            retired: VecDeque::new(),
            next_sequence_id: 1,
            tx,
            rx,
            current_path: String::new(),
            current_route_name: String::new(),
            path_history: Vec::new(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn tree(&self) -> &RouteTree {
        &self.tree
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    pub fn current_route_name(&self) -> &str {
        &self.current_route_name
    }

    /// Every value `current_path` took, in order
    pub fn path_history(&self) -> &[String] {
        &self.path_history
    }

    pub fn active_transition(&self) -> Option<&Transition> {
        self.active.as_ref().map(|active| &active.transition)
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_none()
    }

    pub fn controller(&self, name: &str) -> Option<&Controller> {
        self.controllers.get(name)
    }

    /// Query params of the committed chain
    pub fn query_params(&self) -> &QueryParams {
        &self.committed_query
    }

    pub fn committed_route_names(&self) -> Vec<&str> {
        self.committed
            .iter()
            .map(|level| self.tree.node(level.id).name())
            .collect()
    }

    pub fn rendered_route_names(&self) -> Vec<&str> {
        self.rendered.iter().map(|level| level.route.as_str()).collect()
    }

    /// How a finished transition ended
    ///
    /// `None` while the transition is still active, or once it dropped out of
    /// the short history of finished transitions.
    pub fn transition_result(&self, sequence_id: SequenceId) -> Option<Result<Transition>> {
        let retired = self
            .retired
            .iter()
            .find(|retired| retired.transition.sequence_id == sequence_id)?;

        Some(match (&retired.error, retired.transition.state) {
            (Some(error), _) => Err(error.clone()),
            (None, TransitionState::Aborted) => Err(RouterError::Aborted {
                target: retired.transition.target.clone(),
                sequence_id,
            }),
            (None, _) => Ok(retired.transition.clone()),
        })
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Navigates to a route by canonical name
    ///
    /// Structural errors are returned before anything changes. Otherwise the
    /// returned snapshot tells how far the transition got synchronously: it
    /// is `Resolving` while a model is pending and `Complete` when every
    /// model was available. A rejection that nothing handles fails the call.
    pub fn transition_to(&mut self, name: &str, params: Params) -> Result<Transition> {
        self.transition_to_with(name, params, QueryParams::new())
    }

    pub fn transition_to_with(
        &mut self,
        name: &str,
        params: Params,
        query_params: QueryParams,
    ) -> Result<Transition> {
        let target = self.resolve_navigation(name, &params)?;
        self.begin(target, params, query_params, None, None)
    }

    /// Navigates to whatever route recognizes `url`
    pub fn visit(&mut self, url: &str) -> Result<Transition> {
        let (target, params, query_params) = self.recognize_url(url)?;
        self.begin(target, params, query_params, Some(url.to_string()), None)
    }

    /// Mounts a route right away, without running any model hook
    ///
    /// The active transition, if any, keeps going.
    pub fn intermediate_transition_to(&mut self, name: &str, model: Value) -> Result<()> {
        let id = self.tree.resolve_target(name)?;
        self.mount_intermediate(id, model);
        Ok(())
    }

    /// Re-runs the model hooks of `route_name` and everything below it
    pub fn refresh(&mut self, route_name: &str) -> Result<Transition> {
        let invalidated = self
            .tree
            .id(route_name)
            .filter(|id| self.committed.iter().any(|level| level.id == *id))
            .ok_or_else(|| RouterError::NotActive(route_name.to_string()))?;

        let leaf = self
            .committed
            .last()
            .map(|level| level.id)
            .ok_or_else(|| RouterError::NotActive(route_name.to_string()))?;
        let params: Params = self
            .committed
            .iter()
            .flat_map(|level| level.params.clone())
            .collect();
        let query_params = self.committed_query.clone();

        self.begin(leaf, params, query_params, None, Some(invalidated))
    }

    /// Sets a query param
    ///
    /// While a transition is in flight the value goes into it, without
    /// re-running resolved levels or unblocking a pending one. Otherwise it
    /// updates the committed query params and the leaf controller.
    pub fn set_query_param(&mut self, key: &str, value: &str) {
        if let Some(active) = self.active.as_mut() {
            trace!(key, value, sequence_id = active.transition.sequence_id, "query param on in-flight transition");
            active
                .transition
                .query_params
                .insert(key.to_string(), value.to_string());
            return;
        }

        self.committed_query.insert(key.to_string(), value.to_string());
        if let Some(leaf) = self.committed.last() {
            let name = self.tree.node(leaf.id).name().to_string();
            self.controller_mut(&name).set_query_param(key, value);
        }
    }

    /// URL for a route, under the configured root URL
    pub fn generate(&self, name: &str, params: &Params) -> Result<String> {
        let path = self.tree.generate(name, params)?;
        Ok(join_paths(&self.options.root_url, &path))
    }

    /// Sends a user action, bubbling from the current route
    pub fn send(&mut self, action: &str, payload: Value) -> Result<()> {
        let origin = match self.current_route_name.as_str() {
            "" => APPLICATION.to_string(),
            name => name.to_string(),
        };
        let has_handler = self.tree.id(&origin).is_some_and(|id| {
            self.tree.ancestors(id).any(|route| {
                self.lookup
                    .route(route.name())
                    .is_some_and(|definition| definition.has_action(action))
            })
        });
        if !has_handler {
            return Err(RouterError::UnhandledAction(action.to_string()));
        }

        let mut envelope = ActionEnvelope::new(action, payload, origin);
        let mut ctx = self.context(None);
        let outcome = bubble(&self.tree, &self.lookup, &mut envelope, &mut ctx);

        if let BubbleOutcome::Failed { route, reason } = outcome {
            return Err(RouterError::HandlerFailed {
                route,
                action: action.to_string(),
                reason,
            });
        }
        match ctx.take_redirect() {
            Some(redirect) => self.redirect(redirect, false),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Settlement queue
    // ========================================================================

    /// Applies every queued settlement, returning how many were current
    ///
    /// Settlements for superseded transitions are dropped. A rejection that
    /// nothing handles stops draining and is returned.
    pub fn drain(&mut self) -> Result<usize> {
        let mut applied = 0;
        while let Ok(settlement) = self.rx.try_recv() {
            if self.settle(settlement)? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Waits for the next settlement and applies it
    ///
    /// Returns `Ok(false)` when the settlement belonged to a superseded
    /// transition. Never returns while nothing is pending.
    pub async fn next_settlement(&mut self) -> Result<bool> {
        match self.rx.recv().await {
            Some(settlement) => self.settle(settlement),
            None => Ok(false),
        }
    }

    fn settle(&mut self, settlement: Settlement) -> Result<bool> {
        let Some(active) = self.active.as_mut().filter(|active| {
            active.transition.sequence_id == settlement.sequence_id
                && active.waiting.as_deref() == Some(settlement.route.as_str())
        }) else {
            debug!(
                sequence_id = settlement.sequence_id,
                route = %settlement.route,
                "ignoring settlement for superseded transition"
            );
            return Ok(false);
        };
        active.waiting = None;
        let transition_params = active.transition.params.clone();

        match settlement.outcome {
            Settled::Resolved(model) => {
                let Some(id) = self.tree.id(&settlement.route) else {
                    return Ok(false);
                };
                let params = self.own_params(id, &transition_params);
                trace!(route = %settlement.route, "pending model resolved");
                self.resolve_level(id, params, model);
                self.advance()?;
            }
            Settled::Rejected(reason) => self.reject(&settlement.route, reason)?,
        }
        Ok(true)
    }

    // ========================================================================
    // Transition pipeline
    // ========================================================================

    fn begin(
        &mut self,
        target: RouteId,
        params: Params,
        query_params: QueryParams,
        url: Option<String>,
        invalidated: Option<RouteId>,
    ) -> Result<Transition> {
        let target_name = self.tree.node(target).name().to_string();
        let sequence_id = self.next_sequence_id;
        self.next_sequence_id += 1;
        self.supersede();

        let chain = self.tree.chain(target);
        let retained = chain
            .iter()
            .zip(&self.committed)
            .take_while(|(id, level)| {
                **id == level.id
                    && Some(**id) != invalidated
                    && level.params == self.own_params(**id, &params)
            })
            .count();
        let levels = self.committed[..retained].to_vec();

        let mut transition = Transition::new(target_name.clone(), sequence_id, params, query_params);
        transition.url = url;
        transition.pivot = chain
            .get(retained)
            .map(|id| self.tree.node(*id).name().to_string());
        transition.state = TransitionState::Resolving;
        for level in &levels {
            transition.record(
                self.tree.node(level.id).name(),
                ResolvedModel::Resolved(level.model.clone()),
            );
        }

        debug!(
            sequence_id,
            target = %target_name,
            pivot = ?transition.pivot,
            "starting transition"
        );
        self.active = Some(ActiveTransition {
            transition,
            chain,
            retained,
            levels,
            waiting: None,
        });

        self.advance()?;
        self.snapshot(sequence_id).ok_or(RouterError::Aborted {
            target: target_name,
            sequence_id,
        })
    }

    /// Runs model hooks until the chain is done or a level suspends
    fn advance(&mut self) -> Result<()> {
        loop {
            let Some(active) = self.active.as_ref() else {
                return Ok(());
            };
            if active.waiting.is_some() {
                return Ok(());
            }
            let Some(&id) = active.chain.get(active.levels.len()) else {
                return self.complete();
            };

            let snapshot = active.transition.clone();
            let sequence_id = snapshot.sequence_id;
            let name = self.tree.node(id).name().to_string();
            let params = self.own_params(id, &snapshot.params);

            let mut ctx = self.context(Some(snapshot));
            let result = match self.lookup.route(&name) {
                Some(definition) => definition.model(&params, &mut ctx),
                None => default_model(&params),
            };
            if let Some(redirect) = ctx.take_redirect() {
                return self.redirect(redirect, true);
            }

            match result {
                ModelResult::Resolved(model) => self.resolve_level(id, params, model),
                ModelResult::Rejected(reason) => return self.reject(&name, reason),
                ModelResult::Pending(deferred) => {
                    match deferred.subscribe(self.tx.clone(), sequence_id, &name) {
                        Some(Settled::Resolved(model)) => self.resolve_level(id, params, model),
                        Some(Settled::Rejected(reason)) => return self.reject(&name, reason),
                        None => {
                            self.suspend(&name);
                            return self.enter_loading(&name);
                        }
                    }
                }
            }
        }
    }

    fn resolve_level(&mut self, id: RouteId, params: Params, model: Value) {
        let name = self.tree.node(id).name();
        if let Some(active) = self.active.as_mut() {
            trace!(route = name, "model resolved");
            active
                .transition
                .record(name, ResolvedModel::Resolved(model.clone()));
            active.levels.push(Level { id, params, model });
        }
    }

    fn suspend(&mut self, route: &str) {
        if let Some(active) = self.active.as_mut() {
            debug!(route, sequence_id = active.transition.sequence_id, "model pending");
            active.transition.record(route, ResolvedModel::Pending);
            active.waiting = Some(route.to_string());
        }
    }

    fn enter_loading(&mut self, source: &str) -> Result<()> {
        let Some(snapshot) = self.active.as_ref().map(|active| active.transition.clone()) else {
            return Ok(());
        };
        let pivot = snapshot.pivot.clone();

        let mut envelope = ActionEnvelope::new(LOADING, json!({ "route": source }), source)
            .with_transition(snapshot.clone());
        let mut ctx = self.context(Some(snapshot));
        if let BubbleOutcome::Failed { route, reason } =
            bubble(&self.tree, &self.lookup, &mut envelope, &mut ctx)
        {
            let error = RouterError::HandlerFailed {
                route,
                action: LOADING.to_string(),
                reason,
            };
            return Err(self.fail(error, true));
        }
        if let Some(redirect) = ctx.take_redirect() {
            return self.redirect(redirect, true);
        }

        let resolution = SubstateResolver::new(&self.tree, &self.lookup).resolve(
            SubstateKind::Loading,
            source,
            pivot.as_deref(),
        );
        match resolution {
            Some(resolution) => self.enter_substate(&resolution, Value::Null),
            None => {
                debug!(route = source, "no loading substate, showing the committed chain");
                let frame = self.committed_levels();
                self.render(frame);
            }
        }
        Ok(())
    }

    fn reject(&mut self, source: &str, reason: Value) -> Result<()> {
        let Some(snapshot) = self.active.as_ref().map(|active| active.transition.clone()) else {
            return Ok(());
        };
        warn!(route = source, %reason, "Error while processing route");

        let resolution = SubstateResolver::new(&self.tree, &self.lookup).resolve(
            SubstateKind::Error,
            source,
            snapshot.pivot_route_name(),
        );
        if let Some(resolution) = &resolution {
            self.enter_substate(resolution, reason.clone());
        }
        let substate = resolution.map(|resolution| resolution.entered_route_name);
        let restore = substate.is_none();

        let mut envelope =
            ActionEnvelope::new(ERROR, reason.clone(), source).with_transition(snapshot.clone());
        let mut ctx = self.context(Some(snapshot));
        let outcome = bubble(&self.tree, &self.lookup, &mut envelope, &mut ctx);

        match (outcome, ctx.take_redirect()) {
            (BubbleOutcome::Failed { route, reason }, _) => {
                let error = RouterError::HandlerFailed {
                    route,
                    action: ERROR.to_string(),
                    reason,
                };
                Err(self.fail(error, restore))
            }
            (_, Some(redirect)) => self.redirect(redirect, true),
            (BubbleOutcome::Handled { by }, None) => {
                debug!(route = source, handled_by = %by, "error handled, transition aborted");
                self.finish(TransitionState::Aborted, None, restore);
                Ok(())
            }
            (BubbleOutcome::Unhandled, None) => {
                let error = RouterError::Unhandled {
                    route: source.to_string(),
                    reason,
                    substate,
                };
                Err(self.fail(error, restore))
            }
        }
    }

    fn complete(&mut self) -> Result<()> {
        let Some(ActiveTransition {
            mut transition,
            retained,
            levels,
            ..
        }) = self.active.take()
        else {
            return Ok(());
        };

        for level in &levels[retained..] {
            let name = self.tree.node(level.id).name().to_string();
            let definition = self.lookup.route(&name);
            let controller = self.controller_mut(&name);
            match definition {
                Some(definition) => definition.setup_controller(controller, &level.model),
                None => controller.set_model(level.model.clone()),
            }
        }
        if let Some(leaf) = levels.last() {
            let name = self.tree.node(leaf.id).name().to_string();
            self.controller_mut(&name)
                .replace_query_params(transition.query_params.clone());
        }

        self.committed = levels;
        self.committed_query = transition.query_params.clone();
        let frame = self.committed_levels();
        self.render(frame);

        transition.state = TransitionState::Complete;
        self.log_transition(&transition.target);
        self.retire(transition, None);
        Ok(())
    }

    /// Starts the navigation a hook asked for
    ///
    /// When the target is invalid and `owned` is set, the active transition
    /// fails with the structural error instead of being left unfinished.
    fn redirect(&mut self, redirect: Redirect, owned: bool) -> Result<()> {
        debug!(?redirect, "redirecting");
        let navigation = match redirect {
            Redirect::Transition {
                route,
                params,
                query_params,
            } => self
                .resolve_navigation(&route, &params)
                .map(|target| (target, params, query_params, None)),
            Redirect::Url(url) => self
                .recognize_url(&url)
                .map(|(target, params, query_params)| (target, params, query_params, Some(url))),
        };

        match navigation {
            Ok((target, params, query_params, url)) => {
                self.begin(target, params, query_params, url, None).map(drop)
            }
            Err(error) if owned && self.active.is_some() => {
                warn!(%error, "hook redirected to an invalid target");
                Err(self.fail(error, true))
            }
            Err(error) => Err(error),
        }
    }

    fn supersede(&mut self) {
        if let Some(mut previous) = self.active.take() {
            debug!(
                sequence_id = previous.transition.sequence_id,
                target = %previous.transition.target,
                "transition superseded"
            );
            previous.transition.state = TransitionState::Aborted;
            self.retire(previous.transition, None);
        }
    }

    /// Ends the active transition; `restore` puts the committed chain back on screen
    fn finish(&mut self, state: TransitionState, error: Option<RouterError>, restore: bool) {
        if let Some(mut active) = self.active.take() {
            active.transition.state = state;
            self.retire(active.transition, error);
        }
        if restore {
            let frame = self.committed_levels();
            self.render(frame);
        }
    }

    fn fail(&mut self, error: RouterError, restore: bool) -> RouterError {
        self.finish(TransitionState::Error, Some(error.clone()), restore);
        error
    }

    fn retire(&mut self, transition: Transition, error: Option<RouterError>) {
        self.retired.push_back(Retired { transition, error });
        if self.retired.len() > RETIRED_LIMIT {
            self.retired.pop_front();
        }
    }

    fn snapshot(&self, sequence_id: SequenceId) -> Option<Transition> {
        if let Some(active) = self
            .active
            .as_ref()
            .filter(|active| active.transition.sequence_id == sequence_id)
        {
            return Some(active.transition.clone());
        }
        self.retired
            .iter()
            .find(|retired| retired.transition.sequence_id == sequence_id)
            .map(|retired| retired.transition.clone())
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    fn enter_substate(&mut self, resolution: &SubstateResolution, model: Value) {
        let Some(id) = self.tree.id(&resolution.entered_route_name) else {
            return;
        };
        debug!(
            kind = %resolution.kind,
            route = %resolution.entered_route_name,
            source = %resolution.source_route_name,
            outlet = ?resolution.outlet_parent,
            "entering substate"
        );
        self.mount_intermediate(id, model);
        self.log_transition(&resolution.entered_route_name);
    }

    /// Renders the chain down to `id`, reusing every model already known
    fn mount_intermediate(&mut self, id: RouteId, model: Value) {
        let frame: Vec<RenderedLevel> = self
            .tree
            .chain(id)
            .into_iter()
            .map(|level| {
                let level_model = if level == id {
                    model.clone()
                } else {
                    self.known_model(level)
                };
                self.rendered_level(level, level_model)
            })
            .collect();
        self.render(frame);
    }

    fn known_model(&self, id: RouteId) -> Value {
        self.active
            .iter()
            .flat_map(|active| active.levels.iter())
            .chain(self.committed.iter())
            .find(|level| level.id == id)
            .map(|level| level.model.clone())
            .unwrap_or(Value::Null)
    }

    fn committed_levels(&self) -> Vec<RenderedLevel> {
        self.committed
            .iter()
            .map(|level| self.rendered_level(level.id, level.model.clone()))
            .collect()
    }

    fn rendered_level(&self, id: RouteId, model: Value) -> RenderedLevel {
        let name = self.tree.node(id).name();
        RenderedLevel {
            route: name.to_string(),
            template: self.lookup.template(name).map(str::to_string),
            outlet_parent: self.tree.parent(id).map(|parent| parent.name().to_string()),
            model,
        }
    }

    /// Applies the frame turning the rendered chain into `next`
    fn render(&mut self, next: Vec<RenderedLevel>) {
        let ops = diff(&self.rendered, &next);
        if !ops.is_empty() {
            trace!(ops = ops.len(), "applying render frame");
            self.target.apply(&ops);
        }
        self.rendered = next;
        self.update_current_path();
    }

    fn update_current_path(&mut self) {
        let names = self.rendered_route_names();
        let path = calculate_path(&names);
        let route_name = names.last().map(|name| name.to_string()).unwrap_or_default();

        if path != self.current_path {
            trace!(from = %self.current_path, to = %path, "current path changed");
            self.path_history.push(path.clone());
        }

        let application = self.controller_mut(APPLICATION);
        application.set(CURRENT_PATH, path.clone());
        application.set(CURRENT_ROUTE_NAME, route_name.clone());
        self.current_path = path;
        self.current_route_name = route_name;
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Target route for a named navigation, checking every dynamic segment is given
    fn resolve_navigation(&self, name: &str, params: &Params) -> Result<RouteId> {
        let target = self.tree.resolve_target(name)?;
        let missing: Vec<String> = self
            .tree
            .required_params(target)
            .into_iter()
            .filter(|param| !params.contains_key(param))
            .collect();
        if !missing.is_empty() {
            return Err(RouterError::MissingParams {
                route: self.tree.node(target).name().to_string(),
                missing,
            });
        }
        Ok(target)
    }

    fn recognize_url(&self, url: &str) -> Result<(RouteId, Params, QueryParams)> {
        let (path, query) = split_url(url);
        let path = self.strip_root(path);
        let (target, params) = self
            .tree
            .recognize(&path)
            .ok_or_else(|| RouterError::UnrecognizedUrl(url.to_string()))?;
        let query_params = query.map(parse_query).unwrap_or_default();
        Ok((target, params, query_params))
    }

    fn context(&self, transition: Option<Transition>) -> HookContext {
        HookContext::new(&self.current_path, &self.current_route_name, transition)
    }

    fn controller_mut(&mut self, name: &str) -> &mut Controller {
        self.controllers
            .entry(name.to_string())
            .or_insert_with(|| Controller::new(name))
    }

    /// The subset of `params` that `id` itself declares
    fn own_params(&self, id: RouteId, params: &Params) -> Params {
        self.tree
            .node(id)
            .dynamic_segments()
            .iter()
            .filter_map(|segment| params.get(segment).map(|value| (segment.clone(), value.clone())))
            .collect()
    }

    fn strip_root(&self, path: &str) -> String {
        let root = normalize_path(&self.options.root_url);
        let path = normalize_path(path);
        if root == "/" {
            return path.into_owned();
        }

        match path.strip_prefix(root.as_ref()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => normalize_path(rest).into_owned(),
            _ => path.into_owned(),
        }
    }

    fn log_transition(&self, route: &str) {
        if self.options.log_transitions {
            info!("Transitioned into '{}'", route);
        } else {
            debug!(route, "transitioned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::Deferred;
    use crate::dsl::{RouteMap, RouteOptions};
    use crate::handler::{Propagation, RouteDefinition};
    use crate::lookup::Registry;
    use crate::render::OutletOp;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Frames = Vec<Vec<OutletOp>>;

    fn foo_bar_tree() -> RouteTree {
        let mut map = RouteMap::new();
        map.nest("foo", |foo| {
            foo.route("bar").route("baz");
        });
        map.route_with("post", RouteOptions::new().with_path("/post/:post_id"));
        map.build().unwrap()
    }

    fn pending_route(deferred: &Deferred) -> RouteDefinition {
        let deferred = deferred.clone();
        RouteDefinition::new().with_model(move |_, _| ModelResult::Pending(deferred.clone()))
    }

    fn mounted(frames: &Frames) -> Vec<Vec<String>> {
        frames
            .iter()
            .map(|frame| {
                frame
                    .iter()
                    .map(|op| match op {
                        OutletOp::Mount { route, .. } => format!("+{}", route),
                        OutletOp::Unmount { route } => format!("-{}", route),
                    })
                    .collect()
            })
            .collect()
    }

    #[rstest]
    #[case(&["application"], "")]
    #[case(&["application", "index"], "index")]
    #[case(&["application", "foo", "foo.bar"], "foo.bar")]
    #[case(&["application", "foo", "foo.bar_loading"], "foo.bar_loading")]
    #[case(&["application", "grandma", "mom", "mom.sally"], "grandma.mom.sally")]
    fn test_calculate_path(#[case] names: &[&str], #[case] expected: &str) {
        assert_eq!(calculate_path(names), expected);
    }

    #[test]
    fn test_synchronous_transition_completes() {
        let mut router = Router::new(foo_bar_tree(), Registry::new(), Frames::new());
        let transition = router.transition_to("foo.bar", Params::new()).unwrap();

        assert_eq!(transition.state(), TransitionState::Complete);
        assert_eq!(transition.pivot_route_name(), Some("application"));
        assert_eq!(router.current_path(), "foo.bar");
        assert_eq!(router.committed_route_names(), vec!["application", "foo", "foo.bar"]);
        assert_eq!(
            mounted(router.target()),
            vec![vec!["+application", "+foo", "+foo.bar"]]
        );
    }

    #[test]
    fn test_nested_target_resolves_to_index() {
        let mut router = Router::new(foo_bar_tree(), Registry::new(), Frames::new());
        let transition = router.transition_to("foo", Params::new()).unwrap();
        assert_eq!(transition.target_route_name(), "foo.index");
        assert_eq!(router.current_path(), "foo.index");
    }

    #[test]
    fn test_structural_errors_have_no_side_effects() {
        let mut router = Router::new(foo_bar_tree(), Registry::new(), Frames::new());
        assert_eq!(
            router.transition_to("nope", Params::new()).unwrap_err(),
            RouterError::UnrecognizedRoute("nope".into())
        );
        assert!(matches!(
            router.transition_to("post", Params::new()),
            Err(RouterError::MissingParams { .. })
        ));
        assert!(matches!(router.visit("/nowhere"), Err(RouterError::UnrecognizedUrl(_))));
        assert!(router.target().is_empty());
        assert!(router.path_history().is_empty());
    }

    #[rstest]
    #[case(Redirect::Transition { route: "nope".into(), params: Params::new(), query_params: QueryParams::new() }, RouterError::UnrecognizedRoute("nope".into()))]
    #[case(Redirect::Url("/nowhere".into()), RouterError::UnrecognizedUrl("/nowhere".into()))]
    fn test_model_hook_redirect_to_invalid_target_fails_transition(
        #[case] redirect: Redirect,
        #[case] expected: RouterError,
    ) {
        let mut registry = Registry::new();
        registry.register_route(
            "foo",
            RouteDefinition::new().with_model(move |_, ctx| {
                match redirect.clone() {
                    Redirect::Transition { route, .. } => ctx.transition_to(route),
                    Redirect::Url(url) => ctx.visit(url),
                }
                ModelResult::resolved("foo")
            }),
        );
        let mut router = Router::new(foo_bar_tree(), registry, Frames::new());

        assert_eq!(router.transition_to("foo.bar", Params::new()).unwrap_err(), expected);
        assert!(router.is_idle());
        assert_eq!(router.transition_result(1), Some(Err(expected)));
        assert!(router.target().is_empty());
        assert_eq!(router.current_path(), "");
    }

    #[test]
    fn test_retained_levels_are_not_resolved_again() {
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        let mut registry = Registry::new();
        registry.register_route(
            "foo",
            RouteDefinition::new().with_model(move |_, _| {
                *counter.borrow_mut() += 1;
                ModelResult::resolved("foo")
            }),
        );
        let mut router = Router::new(foo_bar_tree(), registry, Frames::new());

        router.transition_to("foo.bar", Params::new()).unwrap();
        let transition = router.transition_to("foo.baz", Params::new()).unwrap();

        assert_eq!(*calls.borrow(), 1);
        assert_eq!(transition.pivot_route_name(), Some("foo.baz"));
        assert_eq!(transition.model_for("foo"), Some(&json!("foo")));
        assert_eq!(mounted(router.target())[1], vec!["-foo.bar", "+foo.baz"]);

        router.refresh("foo").unwrap();
        assert_eq!(*calls.borrow(), 2);
    }

    #[test]
    fn test_pending_model_waits_for_drain() {
        let deferred = Deferred::new();
        let mut registry = Registry::new();
        registry.register_route("foo.bar", pending_route(&deferred));
        registry.register_template("foo/bar_loading", "Loading...");
        let mut router = Router::new(foo_bar_tree(), registry, Frames::new());

        let transition = router.transition_to("foo.bar", Params::new()).unwrap();
        assert_eq!(transition.state(), TransitionState::Resolving);
        assert_eq!(router.current_path(), "foo.bar_loading");
        assert_eq!(router.drain().unwrap(), 0);

        deferred.resolve(json!({ "id": 1 }));
        assert_eq!(router.drain().unwrap(), 1);
        assert_eq!(router.current_path(), "foo.bar");
        assert!(router.is_idle());
        assert_eq!(
            router.controller("foo.bar").map(Controller::model),
            Some(&json!({ "id": 1 }))
        );
        assert_eq!(
            router.transition_result(transition.sequence_id()).unwrap().unwrap().state(),
            TransitionState::Complete
        );
    }

    #[test]
    fn test_superseded_settlement_is_ignored() {
        let deferred = Deferred::new();
        let mut registry = Registry::new();
        registry.register_route("foo.bar", pending_route(&deferred));
        let mut router = Router::new(foo_bar_tree(), registry, Frames::new());

        let first = router.transition_to("foo.bar", Params::new()).unwrap();
        router.transition_to("foo.baz", Params::new()).unwrap();
        let frames = router.target().len();

        deferred.resolve(json!("late"));
        assert_eq!(router.drain().unwrap(), 0);
        assert_eq!(router.current_path(), "foo.baz");
        assert_eq!(router.target().len(), frames);
        assert_eq!(
            router.transition_result(first.sequence_id()),
            Some(Err(RouterError::Aborted {
                target: "foo.bar".into(),
                sequence_id: first.sequence_id(),
            }))
        );
    }

    #[test]
    fn test_query_param_during_pending_transition() {
        let deferred = Deferred::new();
        let mut registry = Registry::new();
        registry.register_route("foo.bar", pending_route(&deferred));
        let mut router = Router::new(foo_bar_tree(), registry, Frames::new());

        router.transition_to("foo.bar", Params::new()).unwrap();
        router.set_query_param("sort", "desc");
        assert_eq!(
            router.active_transition().unwrap().query_params().get("sort").map(String::as_str),
            Some("desc")
        );
        assert_eq!(router.active_transition().unwrap().state(), TransitionState::Resolving);

        deferred.resolve(Value::Null);
        router.drain().unwrap();
        assert_eq!(router.query_params().get("sort").map(String::as_str), Some("desc"));
        assert_eq!(
            router
                .controller("foo.bar")
                .and_then(|controller| controller.query_params().get("sort"))
                .map(String::as_str),
            Some("desc")
        );
    }

    #[test]
    fn test_visit_and_generate_under_root_url() {
        let options = RouterOptions {
            root_url: "/app".into(),
            log_transitions: true,
        };
        let mut router = Router::with_options(foo_bar_tree(), Registry::new(), Frames::new(), options);

        let transition = router.visit("/app/post/12?tab=comments").unwrap();
        assert_eq!(transition.params().get("post_id").map(String::as_str), Some("12"));
        assert_eq!(transition.url(), Some("/app/post/12?tab=comments"));
        assert_eq!(router.current_path(), "post");
        assert_eq!(
            router.controller("post").map(Controller::model),
            Some(&json!({ "post_id": "12" }))
        );

        let mut params = Params::new();
        params.insert("post_id".into(), "7".into());
        assert_eq!(router.generate("post", &params).unwrap(), "/app/post/7");
    }

    #[test]
    fn test_send_bubbles_user_actions() {
        let mut registry = Registry::new();
        registry.register_route(
            "foo",
            RouteDefinition::new().on("save", |envelope, ctx| {
                assert_eq!(envelope.origin_route_name, "foo.bar");
                ctx.transition_to("foo.baz");
                Ok(Propagation::Stop)
            }),
        );
        let mut router = Router::new(foo_bar_tree(), registry, Frames::new());
        router.transition_to("foo.bar", Params::new()).unwrap();

        router.send("save", Value::Null).unwrap();
        assert_eq!(router.current_path(), "foo.baz");
        assert_eq!(
            router.send("publish", Value::Null),
            Err(RouterError::UnhandledAction("publish".into()))
        );
    }

    #[test]
    fn test_application_controller_tracks_current_path() {
        let mut router = Router::new(foo_bar_tree(), Registry::new(), Frames::new());
        router.transition_to("foo.baz", Params::new()).unwrap();

        let application = router.controller(APPLICATION).unwrap();
        assert_eq!(application.get_str(CURRENT_PATH), Some("foo.baz"));
        assert_eq!(application.get_str(CURRENT_ROUTE_NAME), Some("foo.baz"));
    }

    #[test]
    fn test_intermediate_transition_keeps_active_transition() {
        let deferred = Deferred::new();
        let mut registry = Registry::new();
        registry.register_route("foo.bar", pending_route(&deferred));
        let mut router = Router::new(foo_bar_tree(), registry, Frames::new());

        router.transition_to("foo.bar", Params::new()).unwrap();
        router
            .intermediate_transition_to("foo_loading", Value::Null)
            .unwrap();
        assert_eq!(router.current_path(), "foo_loading");
        assert!(!router.is_idle());

        deferred.resolve(Value::Null);
        router.drain().unwrap();
        assert_eq!(router.current_path(), "foo.bar");
    }
}
