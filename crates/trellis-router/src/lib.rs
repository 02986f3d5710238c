//! # Trellis Router
//!
//! Nested-route transitions with loading and error substates:
//! - Route tree built from a small DSL (`RouteMap`), with reset namespaces
//! - Model hooks that resolve now, later (`Deferred`) or reject
//! - Loading substates mounted at or below the pivot while a model is pending
//! - Error substates plus an `error` action bubbling toward the root
//! - One render frame per change, described as outlet operations
//!
//! ## Substate Lookup
//!
//! For a pending or failing route, candidates are tried from the route up to
//! the root. At every ancestor `R` the child form `R.loading` comes before
//! the sibling form `R_loading`; `application_loading` and
//! `application_error` are the last resort. A template alone is enough to
//! make a candidate count.
//!
//! ## Example
//!
//! ```
//! use trellis_router::{Deferred, ModelResult, Params, Registry, RouteDefinition, RouteMap, Router};
//! use trellis_router::render::OutletOp;
//! use serde_json::json;
//!
//! let mut map = RouteMap::new();
//! map.nest("foo", |foo| {
//!     foo.route("bar");
//! });
//!
//! let deferred = Deferred::new();
//! let pending = deferred.clone();
//! let mut registry = Registry::new();
//! registry
//!     .register_template("foo/bar_loading", "Loading...")
//!     .register_route(
//!         "foo.bar",
//!         RouteDefinition::new().with_model(move |_, _| ModelResult::Pending(pending.clone())),
//!     );
//!
//! let mut router = Router::new(map.build().unwrap(), registry, Vec::<Vec<OutletOp>>::new());
//! router.transition_to("foo.bar", Params::new()).unwrap();
//! assert_eq!(router.current_path(), "foo.bar_loading");
//!
//! deferred.resolve(json!({ "title": "bar" }));
//! router.drain().unwrap();
//! assert_eq!(router.current_path(), "foo.bar");
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod bubble;
pub mod controller;
pub mod deferred;
pub mod dsl;
pub mod error;
pub mod handler;
pub mod lookup;
pub mod path;
pub mod pattern;
pub mod render;
pub mod router;
pub mod substate;
pub mod transition;
pub mod tree;

pub use bubble::{ActionEnvelope, BubbleOutcome};
pub use controller::Controller;
pub use deferred::{Deferred, ModelResult, Settled, Settlement};
pub use dsl::{RouteMap, RouteOptions};
pub use error::{Result, RouterError};
pub use handler::{HookContext, Propagation, Redirect, RouteDefinition};
pub use lookup::{Lookup, Registry};
pub use render::{OutletOp, RenderTarget, RenderedLevel};
pub use router::{Router, RouterOptions};
pub use substate::{SubstateKind, SubstateResolution, SubstateResolver};
pub use transition::{Params, QueryParams, ResolvedModel, SequenceId, Transition, TransitionState};
pub use tree::{RouteId, RouteKind, RouteNode, RouteTree, APPLICATION};
