//! Substate resolution
//!
//! Finds the route to show while a model hook is pending (`loading`) or
//! after it rejected (`error`). The walk starts at the route whose hook is
//! pending/rejected and climbs parent links toward the root; at each
//! ancestor `R` it tries, in order:
//!
//! 1. `R.loading` / `R.error`, a child state of `R` (skipped for the source
//!    route itself, since a child of the source would sit below it). The
//!    application's child states are the bare `loading` / `error`.
//! 2. `R_loading` / `R_error`, a sibling substate of `R`.
//!
//! A candidate matches when the tree has the node and the lookup has a route
//! definition or a template for it. The first match wins. Loading never
//! climbs past the pivot; errors climb to the root, where
//! `application_loading` / `application_error` are the last candidates.

use std::fmt;

use tracing::trace;

use crate::lookup::Lookup;
use crate::tree::{RouteNode, RouteTree};

/// Which substate is being looked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubstateKind {
    Loading,
    Error,
}

impl SubstateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SubstateKind::Loading => "loading",
            SubstateKind::Error => "error",
        }
    }
}

impl fmt::Display for SubstateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a substate goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstateResolution {
    pub kind: SubstateKind,
    pub entered_route_name: String,
    /// The route whose hook was pending or rejected
    pub source_route_name: String,
    /// Route whose outlet receives the substate; `None` for the top level
    pub outlet_parent: Option<String>,
}

/// `R_kind`, named with the same namespace rule as `R` itself
pub fn sibling_substate_name(route: &RouteNode, kind: SubstateKind) -> String {
    format!("{}_{}", route.name(), kind)
}

/// `R.kind`, or the bare kind for the application route
pub fn child_state_name(route: &RouteNode, kind: SubstateKind) -> String {
    if route.is_application() {
        kind.as_str().to_string()
    } else {
        format!("{}.{}", route.name(), kind)
    }
}

/// Walks the route tree looking for substates
pub struct SubstateResolver<'a, L: Lookup + ?Sized> {
    tree: &'a RouteTree,
    lookup: &'a L,
}

impl<'a, L: Lookup + ?Sized> SubstateResolver<'a, L> {
    pub fn new(tree: &'a RouteTree, lookup: &'a L) -> Self {
        Self { tree, lookup }
    }

    /// Finds the substate for `source`, never looking above `pivot` for loading
    pub fn resolve(
        &self,
        kind: SubstateKind,
        source: &str,
        pivot: Option<&str>,
    ) -> Option<SubstateResolution> {
        let source_id = self.tree.id(source)?;

        for route in self.tree.ancestors(source_id) {
            if route.id() != source_id {
                let candidate = child_state_name(route, kind);
                if self.is_defined(&candidate) {
                    return Some(self.resolution(kind, candidate, source));
                }
            }

            let candidate = sibling_substate_name(route, kind);
            if self.is_defined(&candidate) {
                return Some(self.resolution(kind, candidate, source));
            }

            if kind == SubstateKind::Loading && pivot == Some(route.name()) {
                trace!(source, pivot = route.name(), "no loading substate at or below pivot");
                return None;
            }
        }

        trace!(source, %kind, "no substate found");
        None
    }

    /// Whether a candidate name can actually be entered
    pub fn is_defined(&self, name: &str) -> bool {
        self.tree.contains(name) && (self.lookup.has_route(name) || self.lookup.has_template(name))
    }

    fn resolution(&self, kind: SubstateKind, entered: String, source: &str) -> SubstateResolution {
        let outlet_parent = self
            .tree
            .id(&entered)
            .and_then(|id| self.tree.parent(id))
            .map(|parent| parent.name().to_string());

        SubstateResolution {
            kind,
            entered_route_name: entered,
            source_route_name: source.to_string(),
            outlet_parent,
        }
    }
}
