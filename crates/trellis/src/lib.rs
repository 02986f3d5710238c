// Trellis - nested routes with loading and error substates
// Application layer: configuration, templates, rendering and the test harness

pub mod application;
pub mod config;
pub mod renderer;
pub mod template_loader;
pub mod testing;

pub use application::{AppRouter, Application, ApplicationBuilder};
pub use config::{Config, Location};
pub use renderer::OutletTree;
pub use template_loader::TemplateLoader;
pub use testing::TestContext;

// Re-export the router so applications only depend on this crate
pub use trellis_router as router;
pub use trellis_router::{
    Deferred, HookContext, ModelResult, Params, Propagation, RouteDefinition, RouteMap,
    RouteOptions, RouterError, Transition, TransitionState,
};
