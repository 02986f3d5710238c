//! Route map DSL
//!
//! Declares the nested route hierarchy the tree is built from:
//!
//! ```
//! use trellis_router::{RouteMap, RouteOptions};
//!
//! let mut map = RouteMap::new();
//! map.nest("grandma", |grandma| {
//!     grandma.nest_with("mom", RouteOptions::new().reset_namespace(), |mom| {
//!         mom.route("sally");
//!     });
//! });
//! map.route_with("post", RouteOptions::new().with_path("/post/:post_id"));
//!
//! let tree = map.build().unwrap();
//! assert!(tree.contains("mom.sally"));
//! assert!(tree.contains("grandma.index"));
//! ```

use crate::error::Result;
use crate::tree::RouteTree;

/// Per-route declaration options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteOptions {
    pub(crate) path: Option<String>,
    pub(crate) reset_namespace: bool,
}

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// URL segment(s) for this route, `/name` when not given
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Restart canonical naming at this route
    ///
    /// `mom` declared under `grandma` with a reset namespace is named `mom`,
    /// and its children `mom.sally`, instead of `grandma.mom.sally`.
    pub fn reset_namespace(mut self) -> Self {
        self.reset_namespace = true;
        self
    }
}

/// One declared route and, when nested, its children
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RouteDecl {
    pub(crate) name: String,
    pub(crate) options: RouteOptions,
    pub(crate) children: Option<Vec<RouteDecl>>,
}

/// Builder for the route hierarchy
///
/// Besides the declared routes the tree always gets an `application` root,
/// an `index` child for every nested route, and (unless disabled with
/// [`RouteMap::without_substates`]) the `loading`/`error` substate routes
/// the substate resolver looks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMap {
    pub(crate) decls: Vec<RouteDecl>,
    pub(crate) substates: bool,
}

impl Default for RouteMap {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteMap {
    pub fn new() -> Self {
        Self {
            decls: Vec::new(),
            substates: true,
        }
    }

    /// Skip generating `loading`/`error` substate routes
    pub fn without_substates(mut self) -> Self {
        self.substates = false;
        self
    }

    /// Whether substate routes will be generated
    pub fn substates_enabled(&self) -> bool {
        self.substates
    }

    /// Declares a leaf route
    pub fn route(&mut self, name: impl Into<String>) -> &mut Self {
        self.route_with(name, RouteOptions::new())
    }

    /// Declares a leaf route with options
    pub fn route_with(&mut self, name: impl Into<String>, options: RouteOptions) -> &mut Self {
        self.decls.push(RouteDecl {
            name: name.into(),
            options,
            children: None,
        });
        self
    }

    /// Declares a route with nested children
    pub fn nest<F>(&mut self, name: impl Into<String>, children: F) -> &mut Self
    where
        F: FnOnce(&mut RouteMap),
    {
        self.nest_with(name, RouteOptions::new(), children)
    }

    /// Declares a route with options and nested children
    pub fn nest_with<F>(
        &mut self,
        name: impl Into<String>,
        options: RouteOptions,
        children: F,
    ) -> &mut Self
    where
        F: FnOnce(&mut RouteMap),
    {
        let mut nested = RouteMap::new();
        children(&mut nested);
        self.decls.push(RouteDecl {
            name: name.into(),
            options,
            children: Some(nested.decls),
        });
        self
    }

    /// Builds the immutable route tree
    pub fn build(&self) -> Result<RouteTree> {
        RouteTree::from_map(self)
    }
}
