//! Generated per-route controllers
//!
//! The router creates one [`Controller`] per route name the first time the
//! route is entered and hands it the resolved model in `setup_controller`.
//! The `application` controller additionally carries the observable
//! `currentPath` and `currentRouteName` properties.

use serde_json::{Map, Value};

use crate::transition::QueryParams;

/// Property on the application controller holding the current path
pub const CURRENT_PATH: &str = "currentPath";

/// Property on the application controller holding the current leaf route
pub const CURRENT_ROUTE_NAME: &str = "currentRouteName";

/// Per-route state bag
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Controller {
    name: String,
    model: Value,
    query_params: QueryParams,
    properties: Map<String, Value>,
}

impl Controller {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &Value {
        &self.model
    }

    pub fn set_model(&mut self, model: Value) {
        self.model = model;
    }

    pub fn query_params(&self) -> &QueryParams {
        &self.query_params
    }

    pub(crate) fn replace_query_params(&mut self, query_params: QueryParams) {
        self.query_params = query_params;
    }

    pub(crate) fn set_query_param(&mut self, key: &str, value: &str) {
        self.query_params.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// String property, `None` when missing or not a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }
}
