// File: src/renderer.rs
// Purpose: Text renderer for the outlet tree

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::trace;
use trellis_router::{OutletOp, RenderTarget};

/// A route template currently mounted
#[derive(Debug, Clone, PartialEq)]
pub struct MountedOutlet {
    pub route: String,
    pub template: Option<String>,
    pub outlet_parent: Option<String>,
    pub model: Value,
}

/// Nested outlets rendered to plain text
///
/// Each mounted route renders its template with `{model}` / `{model.field}`
/// interpolation, and its child's output replaces `{outlet}`. A route without
/// a template passes its child's output straight through. The text after
/// every applied frame is kept in [`OutletTree::frames`].
#[derive(Debug, Clone, Default)]
pub struct OutletTree {
    mounted: Vec<MountedOutlet>,
    frames: Vec<String>,
}

impl OutletTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mounted(&self) -> &[MountedOutlet] {
        &self.mounted
    }

    pub fn mounted_routes(&self) -> Vec<&str> {
        self.mounted.iter().map(|outlet| outlet.route.as_str()).collect()
    }

    /// Rendered text after each frame, oldest first
    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    /// Current rendered text
    pub fn text(&self) -> String {
        self.mounted.iter().rev().fold(String::new(), |inner, outlet| {
            match &outlet.template {
                Some(template) => interpolate(template, &outlet.model, &inner),
                None => inner,
            }
        })
    }

    fn unmount(&mut self, route: &str) {
        if let Some(position) = self.mounted.iter().position(|outlet| outlet.route == route) {
            self.mounted.truncate(position);
        }
    }

    fn mount(&mut self, outlet: MountedOutlet) {
        if let Some(parent) = &outlet.outlet_parent {
            if let Some(position) = self.mounted.iter().position(|mounted| &mounted.route == parent) {
                self.mounted.truncate(position + 1);
            }
        }
        self.mounted.push(outlet);
    }
}

impl RenderTarget for OutletTree {
    fn apply(&mut self, ops: &[OutletOp]) {
        for op in ops {
            match op {
                OutletOp::Unmount { route } => self.unmount(route),
                OutletOp::Mount {
                    route,
                    template,
                    outlet_parent,
                    model,
                } => self.mount(MountedOutlet {
                    route: route.clone(),
                    template: template.clone(),
                    outlet_parent: outlet_parent.clone(),
                    model: model.clone(),
                }),
            }
        }

        let text = self.text();
        trace!(routes = ?self.mounted_routes(), %text, "rendered frame");
        self.frames.push(text);
    }
}

/// Fills `{outlet}`, `{model}` and `{model.path}` placeholders
///
/// Unknown placeholders are left as they are.
pub fn interpolate(template: &str, model: &Value, outlet: &str) -> String {
    static VAR_REGEX: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_\.]*)\}").unwrap());

    VAR_REGEX
        .replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            if name == "outlet" {
                return outlet.to_string();
            }
            lookup_value(model, name)
                .map(display_value)
                .unwrap_or_else(|| format!("{{{}}}", name))
        })
        .to_string()
}

fn lookup_value<'a>(model: &'a Value, name: &str) -> Option<&'a Value> {
    let mut parts = name.split('.');
    if parts.next()? != "model" {
        return None;
    }
    parts.try_fold(model, |current, part| match current {
        Value::Object(map) => map.get(part),
        Value::Array(items) => part.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    })
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
