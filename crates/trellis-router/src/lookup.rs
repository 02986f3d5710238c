//! Lookup contract for route definitions and templates
//!
//! The router never owns route behaviour or template sources; it asks a
//! [`Lookup`] for them by canonical name. [`Registry`] is the plain in-memory
//! implementation the framework layer fills in.

use std::collections::HashMap;
use std::rc::Rc;

use crate::handler::RouteDefinition;

/// Turns a template or route key into its canonical dotted form
///
/// Templates are conventionally named with `/` separators (`foo/bar_loading`);
/// the route tree uses dots (`foo.bar_loading`).
///
/// ```
/// use trellis_router::lookup::canonical_name;
///
/// assert_eq!(canonical_name("foo/bar_loading"), "foo.bar_loading");
/// assert_eq!(canonical_name("mom_error"), "mom_error");
/// ```
pub fn canonical_name(name: &str) -> String {
    name.trim_matches('/').replace('/', ".")
}

/// Resolves `route:` and `template:` definitions by canonical route name
pub trait Lookup {
    fn route(&self, name: &str) -> Option<Rc<RouteDefinition>>;

    fn template(&self, name: &str) -> Option<&str>;

    fn has_route(&self, name: &str) -> bool {
        self.route(name).is_some()
    }

    fn has_template(&self, name: &str) -> bool {
        self.template(name).is_some()
    }
}

/// In-memory registry of route definitions and template sources
#[derive(Debug, Default, Clone)]
pub struct Registry {
    routes: HashMap<String, Rc<RouteDefinition>>,
    templates: HashMap<String, String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_route(&mut self, name: &str, definition: RouteDefinition) -> &mut Self {
        self.routes.insert(canonical_name(name), Rc::new(definition));
        self
    }

    pub fn register_template(&mut self, name: &str, source: impl Into<String>) -> &mut Self {
        self.templates.insert(canonical_name(name), source.into());
        self
    }
}

impl Lookup for Registry {
    fn route(&self, name: &str) -> Option<Rc<RouteDefinition>> {
        self.routes.get(name).cloned()
    }

    fn template(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_are_keyed_canonically() {
        let mut registry = Registry::new();
        registry.register_template("grandma/error", "ERROR: {model.msg}");

        assert!(registry.has_template("grandma.error"));
        assert!(!registry.has_template("grandma/error"));
        assert_eq!(registry.template("grandma.error"), Some("ERROR: {model.msg}"));
    }
}
