//! Outlet contract between the router and the rendering runtime
//!
//! The router describes what should be on screen as a chain of
//! [`RenderedLevel`]s, root first, each rendered into its parent's outlet.
//! Moving from one chain to the next produces a single batch of
//! [`OutletOp`]s, applied through [`RenderTarget::apply`] as one frame: the
//! shared prefix is left alone, stale levels are unmounted deepest first, and
//! the new levels are mounted top-down.

use serde_json::Value;

/// One mount/unmount instruction
#[derive(Debug, Clone, PartialEq)]
pub enum OutletOp {
    /// Render `route` into the outlet of `outlet_parent` (top level when `None`)
    Mount {
        route: String,
        template: Option<String>,
        outlet_parent: Option<String>,
        model: Value,
    },
    Unmount { route: String },
}

impl OutletOp {
    pub fn route(&self) -> &str {
        match self {
            OutletOp::Mount { route, .. } | OutletOp::Unmount { route } => route,
        }
    }
}

/// The rendering runtime, as seen by the router
pub trait RenderTarget {
    /// Applies one atomic frame
    fn apply(&mut self, ops: &[OutletOp]);
}

/// Records every frame; handy for tests and for replaying a session
impl RenderTarget for Vec<Vec<OutletOp>> {
    fn apply(&mut self, ops: &[OutletOp]) {
        self.push(ops.to_vec());
    }
}

/// A route currently on screen
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedLevel {
    pub route: String,
    pub template: Option<String>,
    pub outlet_parent: Option<String>,
    pub model: Value,
}

impl RenderedLevel {
    fn mount(&self) -> OutletOp {
        OutletOp::Mount {
            route: self.route.clone(),
            template: self.template.clone(),
            outlet_parent: self.outlet_parent.clone(),
            model: self.model.clone(),
        }
    }
}

/// Operations turning the `current` chain into `next`
///
/// Empty when nothing changes, in which case no frame should be applied.
pub fn diff(current: &[RenderedLevel], next: &[RenderedLevel]) -> Vec<OutletOp> {
    let shared = current
        .iter()
        .zip(next)
        .take_while(|(a, b)| a.route == b.route && a.outlet_parent == b.outlet_parent && a.model == b.model)
        .count();

    let unmounts = current[shared..].iter().rev().map(|level| OutletOp::Unmount {
        route: level.route.clone(),
    });
    let mounts = next[shared..].iter().map(RenderedLevel::mount);

    unmounts.chain(mounts).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn level(route: &str, parent: Option<&str>, model: Value) -> RenderedLevel {
        RenderedLevel {
            route: route.to_string(),
            template: None,
            outlet_parent: parent.map(str::to_string),
            model,
        }
    }

    fn routes(ops: &[OutletOp]) -> Vec<String> {
        ops.iter()
            .map(|op| match op {
                OutletOp::Mount { route, .. } => format!("+{}", route),
                OutletOp::Unmount { route } => format!("-{}", route),
            })
            .collect()
    }

    #[test]
    fn test_diff_keeps_shared_prefix() {
        let current = vec![
            level("application", None, Value::Null),
            level("foo", Some("application"), json!("foo")),
            level("foo.bar_loading", Some("foo"), Value::Null),
        ];
        let next = vec![
            level("application", None, Value::Null),
            level("foo", Some("application"), json!("foo")),
            level("foo.bar", Some("foo"), json!("bar")),
        ];

        assert_eq!(routes(&diff(&current, &next)), vec!["-foo.bar_loading", "+foo.bar"]);
    }

    #[test]
    fn test_diff_remounts_changed_models_and_below() {
        let current = vec![
            level("application", None, Value::Null),
            level("post", Some("application"), json!({ "id": 1 })),
            level("post.comments", Some("post"), json!([])),
        ];
        let next = vec![
            level("application", None, Value::Null),
            level("post", Some("application"), json!({ "id": 2 })),
            level("post.comments", Some("post"), json!([])),
        ];

        assert_eq!(
            routes(&diff(&current, &next)),
            vec!["-post.comments", "-post", "+post", "+post.comments"]
        );
    }

    #[test]
    fn test_identical_chains_produce_no_ops() {
        let chain = vec![level("application", None, Value::Null)];
        assert!(diff(&chain, &chain).is_empty());
        assert_eq!(routes(&diff(&[], &chain)), vec!["+application"]);
        assert_eq!(routes(&diff(&chain, &[])), vec!["-application"]);
    }

    #[test]
    fn test_frame_recorder() {
        let mut frames: Vec<Vec<OutletOp>> = Vec::new();
        frames.apply(&[OutletOp::Unmount { route: "foo".into() }]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][0].route(), "foo");
    }
}
