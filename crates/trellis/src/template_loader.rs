// File: src/template_loader.rs
// Purpose: Loads route templates from the templates/ directory

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use trellis_router::lookup::canonical_name;
use trellis_router::Registry;
use walkdir::WalkDir;

/// Reads template files and keys them by route name
///
/// `templates/foo/bar_loading.hbs` is registered as `foo.bar_loading`, the
/// name the substate resolver looks for.
#[derive(Debug, Clone)]
pub struct TemplateLoader {
    dir: PathBuf,
    extension: String,
    templates: HashMap<String, String>,
}

impl TemplateLoader {
    /// Create a loader for `*.hbs` files under `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_extension(dir, "hbs")
    }

    pub fn with_extension(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into().trim_start_matches('.').to_string(),
            templates: HashMap::new(),
        }
    }

    /// Load every template below the directory
    ///
    /// A missing directory loads nothing.
    pub fn load_all(&mut self) -> Result<usize> {
        if !self.dir.exists() {
            debug!(dir = ?self.dir, "template directory missing, nothing to load");
            return Ok(0);
        }

        let mut loaded = 0;
        for entry in WalkDir::new(&self.dir).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk template directory: {:?}", self.dir))?;
            let path = entry.path();

            if entry.file_type().is_file()
                && path.extension().and_then(|s| s.to_str()) == Some(self.extension.as_str())
            {
                self.load_template(path)?;
                loaded += 1;
            }
        }

        debug!(loaded, dir = ?self.dir, "loaded templates");
        Ok(loaded)
    }

    /// Load a single template file
    fn load_template(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read template: {:?}", path))?;

        let name = self
            .template_name(path)
            .with_context(|| format!("Template path is not valid UTF-8: {:?}", path))?;
        self.templates.insert(name, content);
        Ok(())
    }

    /// `foo/bar_loading.hbs` relative to the directory becomes `foo.bar_loading`
    fn template_name(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.dir).ok()?.with_extension("");
        let parts = relative
            .components()
            .map(|component| component.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        Some(canonical_name(&parts.join("/")))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Registers every loaded template
    pub fn register_into(&self, registry: &mut Registry) {
        for (name, source) in &self.templates {
            registry.register_template(name, source.clone());
        }
    }
}
