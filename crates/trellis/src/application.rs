// File: src/application.rs
// Purpose: Wires configuration, templates, route definitions and the router

use anyhow::{Context, Result};
use tracing::info;
use trellis_router::{
    Params, Registry, RouteDefinition, RouteMap, Router, RouterError, Transition,
};

use crate::config::{Config, Location};
use crate::renderer::OutletTree;
use crate::template_loader::TemplateLoader;

/// The router every application runs on
pub type AppRouter = Router<Registry, OutletTree>;

/// Collects everything an [`Application`] needs before booting
///
/// # Examples
///
/// ```
/// use trellis::Application;
///
/// let mut app = Application::builder()
///     .routes(|map| {
///         map.nest("foo", |foo| {
///             foo.route("bar");
///         });
///     })
///     .template("application", "APP {outlet}")
///     .template("foo/bar", "BAR")
///     .build()
///     .unwrap();
///
/// app.visit("/foo/bar").unwrap();
/// assert_eq!(app.text(), "APP BAR");
/// assert_eq!(app.current_path(), "foo.bar");
/// ```
#[derive(Debug, Default)]
pub struct ApplicationBuilder {
    config: Config,
    map: RouteMap,
    registry: Registry,
    templates: Vec<(String, String)>,
    load_templates: bool,
}

impl ApplicationBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Declares the route map
    pub fn routes<F>(mut self, routes: F) -> Self
    where
        F: FnOnce(&mut RouteMap),
    {
        routes(&mut self.map);
        self
    }

    /// Registers a template; wins over one loaded from disk with the same name
    pub fn template(mut self, name: &str, source: impl Into<String>) -> Self {
        self.templates.push((name.to_string(), source.into()));
        self
    }

    pub fn route(mut self, name: &str, definition: RouteDefinition) -> Self {
        self.registry.register_route(name, definition);
        self
    }

    /// Also load templates from the configured templates directory
    pub fn load_templates(mut self) -> Self {
        self.load_templates = true;
        self
    }

    pub fn build(self) -> Result<Application> {
        let Self {
            config,
            map,
            mut registry,
            templates,
            load_templates,
        } = self;

        if load_templates {
            let mut loader =
                TemplateLoader::with_extension(&config.templates.dir, config.templates.extension.as_str());
            loader
                .load_all()
                .with_context(|| format!("Failed to load templates from {:?}", config.templates.dir))?;
            loader.register_into(&mut registry);
        }
        for (name, source) in templates {
            registry.register_template(&name, source);
        }

        let map = if config.router.enable_loading_substates {
            map
        } else {
            map.without_substates()
        };
        let tree = map.build().context("Failed to build route tree")?;

        info!(
            name = %config.application.name,
            routes = tree.len(),
            "application booted"
        );
        let router = Router::with_options(tree, registry, OutletTree::new(), config.router_options());
        Ok(Application { config, router })
    }
}

/// A booted application
pub struct Application {
    config: Config,
    router: AppRouter,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::default()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn router(&self) -> &AppRouter {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut AppRouter {
        &mut self.router
    }

    /// Navigates to a URL; with hash location only the fragment is routed
    pub fn visit(&mut self, url: &str) -> Result<Transition, RouterError> {
        let url = match (self.config.router.location, url.split_once('#')) {
            (Location::Hash, Some((_, fragment))) => fragment,
            _ => url,
        };
        self.router.visit(url)
    }

    pub fn transition_to(&mut self, route: &str, params: Params) -> Result<Transition, RouterError> {
        self.router.transition_to(route, params)
    }

    /// Applies every queued model settlement
    pub fn settle(&mut self) -> Result<usize, RouterError> {
        self.router.drain()
    }

    pub fn send(&mut self, action: &str, payload: serde_json::Value) -> Result<(), RouterError> {
        self.router.send(action, payload)
    }

    /// URL for a route, in the configured location style
    pub fn url_for(&self, route: &str, params: &Params) -> Result<String, RouterError> {
        let url = self.router.generate(route, params)?;
        Ok(match self.config.router.location {
            Location::Hash => format!("#{}", url),
            Location::History | Location::None => url,
        })
    }

    pub fn text(&self) -> String {
        self.router.target().text()
    }

    pub fn current_path(&self) -> &str {
        self.router.current_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn post_routes(map: &mut RouteMap) {
        map.route_with(
            "post",
            trellis_router::RouteOptions::new().with_path("/post/:post_id"),
        );
    }

    #[test]
    fn test_hash_location() {
        let mut config = Config::default();
        config.router.location = Location::Hash;
        let mut app = Application::builder()
            .config(config)
            .routes(post_routes)
            .template("post", "POST {model.post_id}")
            .build()
            .unwrap();

        app.visit("/#/post/3").unwrap();
        assert_eq!(app.text(), "POST 3");

        let mut params = Params::new();
        params.insert("post_id".into(), "4".into());
        assert_eq!(app.url_for("post", &params).unwrap(), "#/post/4");
    }

    #[test]
    fn test_templates_loaded_from_disk_can_be_overridden() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("application.hbs"), "DISK {outlet}").unwrap();
        fs::write(temp_dir.path().join("post.hbs"), "DISK POST").unwrap();

        let mut config = Config::default();
        config.templates.dir = temp_dir.path().to_string_lossy().into_owned();
        let mut app = Application::builder()
            .config(config)
            .routes(post_routes)
            .load_templates()
            .template("post", "CODE POST")
            .build()
            .unwrap();

        app.visit("/post/1").unwrap();
        assert_eq!(app.text(), "DISK CODE POST");
    }

    #[test]
    fn test_disabled_substates() {
        let mut config = Config::default();
        config.router.enable_loading_substates = false;
        let app = Application::builder()
            .config(config)
            .routes(post_routes)
            .build()
            .unwrap();

        assert!(!app.router().tree().contains("post_loading"));
        assert!(!app.router().tree().contains("application_error"));
    }

    #[test]
    fn test_invalid_route_map_fails_to_build() {
        let result = Application::builder()
            .routes(|map| {
                map.route("foo").route("foo");
            })
            .build();
        let err = result.err().unwrap();
        assert!(err.to_string().contains("Failed to build route tree"));
    }
}
