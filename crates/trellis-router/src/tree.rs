//! Immutable route tree
//!
//! Nodes live in an arena and point at their parent by index, so walking
//! toward the root is a cheap, allocation-free iteration ([`Ancestors`]).
//! Every node is addressed by its canonical dotted name.
//!
//! ## Synthesized routes
//!
//! Building the tree from a [`RouteMap`] adds, the way the DSL promises:
//!
//! - `application` as the root, with `application_loading` and
//!   `application_error` as top-level siblings;
//! - an `index` child under every nested route (and under `application`);
//! - for every declared route `x`, siblings `x_loading` and `x_error`;
//! - for every nested route `x`, children `x.loading` and `x.error`.
//!
//! Substate siblings follow the same reset-namespace rule as the route they
//! belong to: `mom` declared with a reset namespace under `grandma` gets
//! `mom_loading`, never `grandma.mom_loading`.

use std::collections::{BTreeSet, HashMap};

use tracing::trace;

use crate::dsl::{RouteDecl, RouteMap};
use crate::error::{Result, RouterError};
use crate::path::{join_paths, normalize_path};
use crate::pattern::{calculate_priority, generate_url, match_segments, parse_pattern, PatternSegment};
use crate::substate::SubstateKind;
use crate::transition::Params;

/// Name of the root route
pub const APPLICATION: &str = "application";

/// Index of a node in the tree's arena
pub type RouteId = usize;

/// What kind of node a route is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Application,
    Route,
    Index,
    Substate(SubstateKind),
}

/// One entry of the route tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteNode {
    id: RouteId,
    name: String,
    local_name: String,
    path: Option<String>,
    full_path: Option<String>,
    segments: Vec<PatternSegment>,
    dynamic_segments: BTreeSet<String>,
    parent: Option<RouteId>,
    children: Vec<RouteId>,
    resets_namespace: bool,
    kind: RouteKind,
    synthesized: bool,
}

impl RouteNode {
    pub fn id(&self) -> RouteId {
        self.id
    }

    /// Canonical dotted name, the lookup key everywhere else
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name this route was declared with
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Own path segment; `None` for substates, which have no URL
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Full URL pattern from the root
    pub fn full_path(&self) -> Option<&str> {
        self.full_path.as_deref()
    }

    /// Dynamic segments declared by this route's own path
    pub fn dynamic_segments(&self) -> &BTreeSet<String> {
        &self.dynamic_segments
    }

    pub fn parent(&self) -> Option<RouteId> {
        self.parent
    }

    pub fn children(&self) -> &[RouteId] {
        &self.children
    }

    pub fn resets_namespace(&self) -> bool {
        self.resets_namespace
    }

    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    pub fn is_application(&self) -> bool {
        self.kind == RouteKind::Application
    }

    pub fn is_substate(&self) -> bool {
        matches!(self.kind, RouteKind::Substate(_))
    }

    /// Whether the tree generated this node rather than the route map declaring it
    pub fn is_synthesized(&self) -> bool {
        self.synthesized
    }
}

/// Lazy walk from a node up to its root, yielding the node itself first
///
/// ```
/// use trellis_router::RouteMap;
///
/// let mut map = RouteMap::new();
/// map.nest("foo", |foo| {
///     foo.route("bar");
/// });
/// let tree = map.build().unwrap();
///
/// let bar = tree.id("foo.bar").unwrap();
/// let names: Vec<&str> = tree.ancestors(bar).map(|n| n.name()).collect();
/// assert_eq!(names, vec!["foo.bar", "foo", "application"]);
/// ```
#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    tree: &'a RouteTree,
    current: Option<RouteId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a RouteNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.tree.nodes.get(self.current?)?;
        self.current = node.parent;
        Some(node)
    }
}

/// The static route hierarchy
#[derive(Debug, Clone)]
pub struct RouteTree {
    nodes: Vec<RouteNode>,
    by_name: HashMap<String, RouteId>,
    recognizers: Vec<RouteId>,
}

impl RouteTree {
    /// Builds the tree from a route map
    pub fn from_map(map: &RouteMap) -> Result<Self> {
        let mut builder = Builder {
            tree: RouteTree {
                nodes: Vec::new(),
                by_name: HashMap::new(),
                recognizers: Vec::new(),
            },
            substates: map.substates,
        };

        let application = builder.insert(NodeSpec {
            name: APPLICATION.to_string(),
            local_name: APPLICATION.to_string(),
            path: Some("/".to_string()),
            parent: None,
            resets_namespace: false,
            kind: RouteKind::Application,
            synthesized: true,
        })?;
        builder.add_substate_siblings(None, APPLICATION, false)?;
        builder.add_children(application, &map.decls)?;

        let mut tree = builder.tree;
        tree.index_recognizers();
        trace!(routes = tree.nodes.len(), "built route tree");
        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteNode> {
        self.nodes.iter()
    }

    pub fn id(&self, name: &str) -> Option<RouteId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&RouteNode> {
        self.id(name).map(|id| &self.nodes[id])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Node by id
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this tree.
    pub fn node(&self, id: RouteId) -> &RouteNode {
        &self.nodes[id]
    }

    pub fn parent(&self, id: RouteId) -> Option<&RouteNode> {
        self.nodes.get(id)?.parent.map(|p| &self.nodes[p])
    }

    pub fn ancestors(&self, id: RouteId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            current: Some(id),
        }
    }

    /// Route ids from the root down to `id`, inclusive
    pub fn chain(&self, id: RouteId) -> Vec<RouteId> {
        let mut chain: Vec<RouteId> = self.ancestors(id).map(RouteNode::id).collect();
        chain.reverse();
        chain
    }

    /// Dynamic segments required to enter `id`, across its whole chain
    pub fn required_params(&self, id: RouteId) -> BTreeSet<String> {
        self.ancestors(id)
            .flat_map(|node| node.dynamic_segments.iter().cloned())
            .collect()
    }

    /// Resolves a navigation target, descending into `index` for nested routes
    ///
    /// ```
    /// use trellis_router::RouteMap;
    ///
    /// let mut map = RouteMap::new();
    /// map.nest("foo", |foo| {
    ///     foo.route("bar");
    /// });
    /// let tree = map.build().unwrap();
    ///
    /// let target = tree.resolve_target("foo").unwrap();
    /// assert_eq!(tree.node(target).name(), "foo.index");
    /// assert!(tree.resolve_target("nope").is_err());
    /// ```
    pub fn resolve_target(&self, name: &str) -> Result<RouteId> {
        let id = self
            .id(name)
            .ok_or_else(|| RouterError::UnrecognizedRoute(name.to_string()))?;

        let index = self.nodes[id]
            .children
            .iter()
            .copied()
            .find(|child| self.nodes[*child].kind == RouteKind::Index);

        Ok(index.unwrap_or(id))
    }

    /// Matches a URL path against every routable leaf
    ///
    /// Routes are tried in priority order: static, then dynamic, then wildcard.
    pub fn recognize(&self, path: &str) -> Option<(RouteId, Params)> {
        let normalized = normalize_path(path);
        let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();

        self.recognizers.iter().find_map(|id| {
            match_segments(&self.nodes[*id].segments, &segments).map(|params| (*id, params))
        })
    }

    /// Generates the URL for a route, substituting dynamic segments
    pub fn generate(&self, name: &str, params: &Params) -> Result<String> {
        let id = self.resolve_target(name)?;
        let node = &self.nodes[id];
        if node.full_path.is_none() {
            return Err(RouterError::UnrecognizedRoute(name.to_string()));
        }

        generate_url(&node.segments, params).map_err(|missing| RouterError::MissingParams {
            route: node.name.clone(),
            missing,
        })
    }

    fn index_recognizers(&mut self) {
        let mut leaves: Vec<RouteId> = self
            .nodes
            .iter()
            .filter(|node| matches!(node.kind, RouteKind::Route | RouteKind::Index))
            .filter(|node| node.full_path.is_some())
            .filter(|node| {
                !node
                    .children
                    .iter()
                    .any(|c| matches!(self.nodes[*c].kind, RouteKind::Route | RouteKind::Index))
            })
            .map(RouteNode::id)
            .collect();

        leaves.sort_by_key(|id| calculate_priority(&self.nodes[*id].segments));
        self.recognizers = leaves;
    }
}

struct NodeSpec {
    name: String,
    local_name: String,
    path: Option<String>,
    parent: Option<RouteId>,
    resets_namespace: bool,
    kind: RouteKind,
    synthesized: bool,
}

struct Builder {
    tree: RouteTree,
    substates: bool,
}

impl Builder {
    /// Canonical name for `local` declared under `parent`
    fn full_name(&self, parent: Option<RouteId>, local: &str, resets_namespace: bool) -> String {
        match parent.map(|p| &self.tree.nodes[p]) {
            Some(parent) if !resets_namespace && !parent.is_application() => {
                format!("{}.{}", parent.name, local)
            }
            _ => local.to_string(),
        }
    }

    fn insert(&mut self, spec: NodeSpec) -> Result<RouteId> {
        let parent_path = spec
            .parent
            .and_then(|p| self.tree.nodes[p].full_path.clone());
        let full_path = match (&spec.path, spec.parent) {
            (Some(path), Some(_)) => parent_path.map(|parent| join_paths(&parent, path)),
            (Some(path), None) => Some(normalize_path(path).into_owned()),
            (None, _) => None,
        };
        let own_segments = spec.path.as_deref().map(parse_pattern).unwrap_or_default();
        let dynamic_segments: BTreeSet<String> = own_segments
            .iter()
            .filter_map(|s| s.param_name().map(str::to_string))
            .collect();
        let segments = full_path.as_deref().map(parse_pattern).unwrap_or_default();

        if let Some(existing) = self.tree.id(&spec.name) {
            let node = &mut self.tree.nodes[existing];
            if spec.synthesized {
                return Ok(existing);
            }
            if !node.synthesized {
                return Err(RouterError::DuplicateRoute(spec.name));
            }
            // A declaration replaces the placeholder the tree generated for it.
            node.path = spec.path;
            node.full_path = full_path;
            node.segments = segments;
            node.dynamic_segments = dynamic_segments;
            node.resets_namespace = spec.resets_namespace;
            node.synthesized = false;
            if !matches!(spec.kind, RouteKind::Route) || !node.is_substate() {
                node.kind = spec.kind;
            }
            return Ok(existing);
        }

        let id = self.tree.nodes.len();
        self.tree.nodes.push(RouteNode {
            id,
            name: spec.name.clone(),
            local_name: spec.local_name,
            path: spec.path,
            full_path,
            segments,
            dynamic_segments,
            parent: spec.parent,
            children: Vec::new(),
            resets_namespace: spec.resets_namespace,
            kind: spec.kind,
            synthesized: spec.synthesized,
        });
        self.tree.by_name.insert(spec.name, id);
        if let Some(parent) = spec.parent {
            self.tree.nodes[parent].children.push(id);
        }
        Ok(id)
    }

    fn add_substate_siblings(
        &mut self,
        parent: Option<RouteId>,
        local: &str,
        resets_namespace: bool,
    ) -> Result<()> {
        if !self.substates {
            return Ok(());
        }
        for kind in [SubstateKind::Loading, SubstateKind::Error] {
            let local_name = format!("{}_{}", local, kind);
            let name = self.full_name(parent, &local_name, resets_namespace);
            self.insert(NodeSpec {
                name,
                local_name,
                path: None,
                parent,
                resets_namespace,
                kind: RouteKind::Substate(kind),
                synthesized: true,
            })?;
        }
        Ok(())
    }

    fn add_children(&mut self, parent: RouteId, decls: &[RouteDecl]) -> Result<()> {
        if self.substates {
            for kind in [SubstateKind::Loading, SubstateKind::Error] {
                let local_name = kind.as_str().to_string();
                let name = self.full_name(Some(parent), &local_name, false);
                self.insert(NodeSpec {
                    name,
                    local_name,
                    path: None,
                    parent: Some(parent),
                    resets_namespace: false,
                    kind: RouteKind::Substate(kind),
                    synthesized: true,
                })?;
            }
        }

        for decl in decls {
            self.add_route(parent, decl, false)?;
        }

        if !decls.iter().any(|d| d.name == "index") {
            let index = RouteDecl {
                name: "index".to_string(),
                options: Default::default(),
                children: None,
            };
            self.add_route(parent, &index, true)?;
        }
        Ok(())
    }

    fn add_route(&mut self, parent: RouteId, decl: &RouteDecl, synthesized: bool) -> Result<RouteId> {
        let local = decl.name.as_str();
        if local.is_empty() || local.contains('.') || local.contains('/') {
            return Err(RouterError::InvalidRouteName(decl.name.clone()));
        }
        let resets_namespace = decl.options.reset_namespace;

        self.add_substate_siblings(Some(parent), local, resets_namespace)?;

        let is_index = local == "index";
        let path = decl.options.path.clone().unwrap_or_else(|| {
            if is_index {
                "/".to_string()
            } else {
                format!("/{}", local)
            }
        });
        let kind = if is_index {
            RouteKind::Index
        } else {
            RouteKind::Route
        };

        let id = self.insert(NodeSpec {
            name: self.full_name(Some(parent), local, resets_namespace),
            local_name: local.to_string(),
            path: Some(path),
            parent: Some(parent),
            resets_namespace,
            kind,
            synthesized,
        })?;

        if let Some(children) = &decl.children {
            self.add_children(id, children)?;
        }
        Ok(id)
    }
}
