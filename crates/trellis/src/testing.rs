// File: src/testing.rs
// Purpose: Deterministic harness for driving an application in tests

use serde_json::Value;
use tracing::Level;
use trellis_router::{Params, RouterError, Transition};

use crate::application::{AppRouter, Application};

/// Installs a test-friendly tracing subscriber once per process
///
/// Later calls, and calls after another subscriber was installed, do nothing.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Drives an [`Application`] the way a user would, one settled step at a time
///
/// Nothing runs in the background: pending models only make progress when
/// the test calls [`TestContext::settle`] (or awaits
/// [`TestContext::next_settlement`]), so every intermediate state can be
/// asserted on.
pub struct TestContext {
    app: Application,
}

impl TestContext {
    pub fn new(app: Application) -> Self {
        init_tracing();
        Self { app }
    }

    pub fn app(&self) -> &Application {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut Application {
        &mut self.app
    }

    pub fn router(&self) -> &AppRouter {
        self.app.router()
    }

    pub fn router_mut(&mut self) -> &mut AppRouter {
        self.app.router_mut()
    }

    pub fn visit(&mut self, url: &str) -> Result<Transition, RouterError> {
        self.app.visit(url)
    }

    pub fn transition_to(&mut self, route: &str) -> Result<Transition, RouterError> {
        self.app.transition_to(route, Params::new())
    }

    pub fn transition_to_with(&mut self, route: &str, params: &[(&str, &str)]) -> Result<Transition, RouterError> {
        let params: Params = params
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        self.app.transition_to(route, params)
    }

    pub fn send(&mut self, action: &str, payload: Value) -> Result<(), RouterError> {
        self.app.send(action, payload)
    }

    /// Applies every queued settlement
    pub fn settle(&mut self) -> Result<usize, RouterError> {
        self.app.settle()
    }

    /// Waits for one settlement; returns whether it belonged to the active transition
    pub async fn next_settlement(&mut self) -> Result<bool, RouterError> {
        self.app.router_mut().next_settlement().await
    }

    pub fn text(&self) -> String {
        self.app.text()
    }

    pub fn current_path(&self) -> &str {
        self.app.current_path()
    }

    pub fn current_route_name(&self) -> &str {
        self.router().current_route_name()
    }

    pub fn path_history(&self) -> &[String] {
        self.router().path_history()
    }

    /// Rendered text after every frame so far
    pub fn frames(&self) -> &[String] {
        self.router().target().frames()
    }

    pub fn rendered_routes(&self) -> Vec<&str> {
        self.router().rendered_route_names()
    }
}

impl From<Application> for TestContext {
    fn from(app: Application) -> Self {
        Self::new(app)
    }
}
