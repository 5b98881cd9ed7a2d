//! Menus: a selection rendered through a template into a single file.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use quire_core::{PagePool, Value, config::MenuConfig};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    context::{ContextStack, Layer},
    selection::{Selection, SelectionError},
    template::{TemplateError, TemplateRegistry},
};

/// Menu errors.
#[derive(Debug, Error)]
pub enum MenuError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type for menu operations.
pub type Result<T> = std::result::Result<T, MenuError>;

/// A templated listing written to `dest_root/<name>`.
#[derive(Debug)]
pub struct Menu<'a> {
    name: String,
    template: String,
    selection: Selection<'a>,
}

impl<'a> Menu<'a> {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        selection: Selection<'a>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            selection,
        }
    }

    #[must_use]
    pub fn from_config(pool: &'a PagePool, config: &MenuConfig) -> Self {
        Self::new(
            &config.name,
            Selection::from_config(pool, &config.selection),
            &config.template,
        )
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn selection(&self) -> &Selection<'a> {
        &self.selection
    }

    /// Render the menu and write it under `dest_root`.
    pub fn render(
        &self,
        base: &ContextStack,
        templates: &TemplateRegistry,
        dest_root: &Path,
    ) -> Result<PathBuf> {
        let pages: Vec<Value> = self
            .selection
            .pages()?
            .iter()
            .cloned()
            .map(Value::Page)
            .collect();
        let count = pages.len();

        let mut stack = base.clone();
        let html = {
            let scope = stack.push(
                Layer::new()
                    .with("pages", pages)
                    .with("menu", self.name.as_str()),
            );
            templates.render(&self.template, &scope)?
        };
        debug_assert_eq!(stack.depth(), base.depth());

        let path = dest_root.join(&self.name);
        let write = |path: &Path| -> io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, html.as_bytes())
        };
        write(&path).map_err(|source| MenuError::Write {
            path: path.clone(),
            source,
        })?;

        info!(menu = %self.name, pages = count, "rendered menu");
        debug!(path = %path.display(), "wrote menu");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use quire_core::Page;
    use tempfile::TempDir;

    use super::*;
    use crate::predicate::Filter;

    fn pool() -> PagePool {
        [
            Page::new("b").with_attr("title", "Bee"),
            Page::new("a").with_attr("title", "Ay"),
            Page::new("c").with_attr("section", "docs"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_render_menu() {
        let dir = TempDir::new().unwrap();
        let pool = pool();
        let mut templates = TemplateRegistry::new();
        templates
            .register_str(
                "nav.html",
                "{{ menu }}|{% for page in pages %}{{ page.name }};{% endfor %}",
            )
            .unwrap();

        let menu = Menu::new("nav.html", Selection::all(&pool), "nav.html");
        let path = menu
            .render(&ContextStack::default(), &templates, dir.path())
            .unwrap();

        assert_eq!(path, dir.path().join("nav.html"));
        assert_eq!(fs::read_to_string(path).unwrap(), "nav.html|a;b;c;");
    }

    #[test]
    fn test_default_template_links_pages() {
        let dir = TempDir::new().unwrap();
        let pool = pool();
        let selection = Selection::new(&pool, Filter::new().with_fn(|p| p.name() != "c"), "-name");
        let menu = Menu::new("menus/main.html", selection, "menu.html");

        let path = menu
            .render(&ContextStack::default(), &TemplateRegistry::new(), dir.path())
            .unwrap();
        let html = fs::read_to_string(path).unwrap();

        let bee = html.find(r#"<a href="/b.html">Bee</a>"#).unwrap();
        let ay = html.find(r#"<a href="/a.html">Ay</a>"#).unwrap();
        assert!(bee < ay);
        assert!(!html.contains("c.html"));
    }

    #[test]
    fn test_base_context_is_visible_and_unchanged() {
        let dir = TempDir::new().unwrap();
        let pool = pool();
        let mut templates = TemplateRegistry::new();
        templates.register_str("nav.html", "{{ site }}").unwrap();
        let base = ContextStack::new(Layer::new().with("site", "Demo"));

        let menu = Menu::new("nav.html", Selection::all(&pool), "nav.html");
        let path = menu.render(&base, &templates, dir.path()).unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "Demo");
        assert!(base.resolve("pages").is_none());
    }

    #[test]
    fn test_unknown_template() {
        let dir = TempDir::new().unwrap();
        let pool = pool();
        let menu = Menu::new("nav.html", Selection::all(&pool), "nope.html");
        let err = menu
            .render(&ContextStack::default(), &TemplateRegistry::new(), dir.path())
            .unwrap_err();
        assert!(matches!(err, MenuError::Template(TemplateError::NotFound(_))));
        assert!(!dir.path().join("nav.html").exists());
    }

    #[test]
    fn test_from_config() {
        let pool = pool();
        let mut config = MenuConfig::new("docs.html");
        config
            .selection
            .filter_by
            .insert("section".to_string(), serde_yaml::Value::from("docs"));
        let menu = Menu::from_config(&pool, &config);

        assert_eq!(menu.name(), "docs.html");
        let pages = menu.selection().pages().unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].name(), "c");
    }
}
