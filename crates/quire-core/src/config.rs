//! Site configuration management.

use std::{
    collections::{BTreeMap, HashSet},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Main configuration structure for Quire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Site-wide settings.
    pub site: SiteConfig,

    /// Build settings.
    #[serde(default)]
    pub build: BuildConfig,

    /// Extra bindings for the base render context.
    #[serde(default)]
    pub context: BTreeMap<String, serde_yaml::Value>,

    /// Templated page listings, one output file each.
    #[serde(default)]
    pub menus: Vec<MenuConfig>,

    /// Tag indexes, one output file per tag.
    #[serde(default)]
    pub tag_indexes: Vec<TagIndexConfig>,

    /// RSS feeds.
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

/// Site-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site title.
    pub title: String,

    /// Base URL for the site (e.g., "https://example.com").
    pub base_url: String,

    /// Site description for feeds and meta tags.
    #[serde(default)]
    pub description: Option<String>,
}

/// Build configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Directory holding content files.
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    /// Directory holding user templates.
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    /// Output directory for generated files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Extension of rendered output files.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Whether to include drafts.
    #[serde(default)]
    pub drafts: bool,
}

/// Filter and ordering shared by every page listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Field constraints; list-valued fields match by containment.
    #[serde(default)]
    pub filter_by: BTreeMap<String, serde_yaml::Value>,

    /// Sort field, prefixed with `-` for descending order.
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
}

/// A templated listing rendered to a single file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuConfig {
    /// Output file name relative to the output directory.
    pub name: String,

    #[serde(default = "default_menu_template")]
    pub template: String,

    #[serde(flatten)]
    pub selection: SelectionConfig,
}

/// A tag index rendered to one file per tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagIndexConfig {
    /// Index name; its extension is stripped to name the output directory.
    pub name: String,

    #[serde(default = "default_tag_template")]
    pub template: String,

    /// Tags never counted nor rendered.
    #[serde(default)]
    pub exclude_tags: Vec<String>,

    #[serde(flatten)]
    pub selection: SelectionConfig,
}

/// An RSS feed over a selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Output file name relative to the output directory.
    #[serde(default = "default_feed_name")]
    pub name: String,

    /// Maximum number of items.
    #[serde(default)]
    pub limit: Option<usize>,

    #[serde(flatten)]
    pub selection: SelectionConfig,
}

// Default value functions
fn default_content_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_extension() -> String {
    "html".to_string()
}

fn default_sort_by() -> String {
    "name".to_string()
}

fn default_menu_template() -> String {
    "menu.html".to_string()
}

fn default_tag_template() -> String {
    "tag.html".to_string()
}

fn default_feed_name() -> String {
    "feed.xml".to_string()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
            templates_dir: default_templates_dir(),
            output_dir: default_output_dir(),
            extension: default_extension(),
            drafts: false,
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            filter_by: BTreeMap::new(),
            sort_by: default_sort_by(),
        }
    }
}

impl MenuConfig {
    /// Menu over every page, rendered with the default template.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: default_menu_template(),
            selection: SelectionConfig::default(),
        }
    }
}

impl TagIndexConfig {
    /// Tag index over every page, rendered with the default template.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: default_tag_template(),
            exclude_tags: Vec::new(),
            selection: SelectionConfig::default(),
        }
    }
}

impl FeedConfig {
    /// Unbounded feed over every page.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            limit: None,
            selection: SelectionConfig::default(),
        }
    }
}

impl Config {
    /// Minimal configuration for a site with no listings.
    #[must_use]
    pub fn new(title: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            site: SiteConfig {
                title: title.into(),
                base_url: base_url.into(),
                description: None,
            },
            build: BuildConfig::default(),
            context: BTreeMap::new(),
            menus: Vec::new(),
            tag_indexes: Vec::new(),
            feeds: Vec::new(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            CoreError::config_with_source(
                format!("Failed to parse config file: {}", path.display()),
                e,
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `QUIRE__SECTION__KEY` environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("QUIRE").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.site.title.is_empty() {
            return Err(CoreError::config("site.title cannot be empty"));
        }

        if self.site.base_url.is_empty() {
            return Err(CoreError::config("site.base_url cannot be empty"));
        }

        if self.site.base_url.ends_with('/') {
            tracing::warn!("site.base_url should not have a trailing slash");
        }

        if self.build.extension.is_empty() || self.build.extension.starts_with('.') {
            return Err(CoreError::config(
                "build.extension must be a bare extension such as \"html\"",
            ));
        }

        let mut outputs = HashSet::new();
        let names = self
            .menus
            .iter()
            .map(|m| (m.name.as_str(), &m.selection))
            .chain(self.tag_indexes.iter().map(|t| (t.name.as_str(), &t.selection)))
            .chain(self.feeds.iter().map(|f| (f.name.as_str(), &f.selection)));

        for (name, selection) in names {
            if name.trim().is_empty() {
                return Err(CoreError::config("output names cannot be empty"));
            }
            if !outputs.insert(name) {
                return Err(CoreError::config(format!(
                    "output name {name:?} is declared more than once"
                )));
            }
            if selection.sort_by.trim_start_matches('-').is_empty() {
                return Err(CoreError::config(format!(
                    "{name}: sort_by must name a field"
                )));
            }
        }

        Ok(())
    }

    /// Get the full URL for a path.
    pub fn url_for(&self, path: &str) -> String {
        let base = self.site.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn create_test_config() -> String {
        r#"
[site]
title = "Test Site"
base_url = "https://example.com"
description = "Notes"

[build]
output_dir = "dist"
drafts = true

[context]
author = "Jo"

[[menus]]
name = "menu.html"
sort_by = "-date"

[[tag_indexes]]
name = "tags.html"
exclude_tags = ["meta"]
filter_by = { section = "posts" }

[[feeds]]
name = "rss.xml"
limit = 5
"#
        .to_string()
    }

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config_path = dir.path().join("quire.toml");
        let mut file = std::fs::File::create(&config_path).expect("create file");
        file.write_all(create_test_config().as_bytes())
            .expect("write");

        let config = Config::load(&config_path).expect("load config");

        assert_eq!(config.site.title, "Test Site");
        assert_eq!(config.site.description.as_deref(), Some("Notes"));
        assert_eq!(config.build.output_dir, PathBuf::from("dist"));
        assert!(config.build.drafts);
        assert!(config.context.contains_key("author"));

        assert_eq!(config.menus[0].template, "menu.html");
        assert_eq!(config.menus[0].selection.sort_by, "-date");

        let tags = &config.tag_indexes[0];
        assert_eq!(tags.template, "tag.html");
        assert_eq!(tags.exclude_tags, vec!["meta"]);
        assert_eq!(tags.selection.sort_by, "name");
        assert!(tags.selection.filter_by.contains_key("section"));

        assert_eq!(config.feeds[0].name, "rss.xml");
        assert_eq!(config.feeds[0].limit, Some(5));
    }

    #[test]
    fn test_config_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config_path = dir.path().join("quire.toml");
        let minimal_config = r#"
[site]
title = "Minimal Site"
base_url = "https://example.com"
"#;
        std::fs::write(&config_path, minimal_config).expect("write");

        let config = Config::load(&config_path).expect("load config");

        assert_eq!(config.build.content_dir, PathBuf::from("content"));
        assert_eq!(config.build.templates_dir, PathBuf::from("templates"));
        assert_eq!(config.build.output_dir, PathBuf::from("public"));
        assert_eq!(config.build.extension, "html");
        assert!(!config.build.drafts);
        assert!(config.menus.is_empty());
        assert!(config.tag_indexes.is_empty());
        assert!(config.feeds.is_empty());
    }

    #[test]
    fn test_url_for() {
        let config = Config::new("Test", "https://example.com/");

        assert_eq!(
            config.url_for("/posts/hello"),
            "https://example.com/posts/hello"
        );
        assert_eq!(
            config.url_for("posts/hello"),
            "https://example.com/posts/hello"
        );
    }

    #[test]
    fn test_config_validation_empty_title() {
        let config = Config::new("", "https://example.com");
        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("title cannot be empty")
        );
    }

    #[test]
    fn test_config_validation_duplicate_output() {
        let mut config = Config::new("Test", "https://example.com");
        let menu = MenuConfig {
            name: "menu.html".to_string(),
            template: default_menu_template(),
            selection: SelectionConfig::default(),
        };
        config.menus = vec![menu.clone(), menu];

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_config_validation_bare_sort_marker() {
        let mut config = Config::new("Test", "https://example.com");
        config.feeds.push(FeedConfig {
            name: "feed.xml".to_string(),
            limit: None,
            selection: SelectionConfig {
                filter_by: BTreeMap::new(),
                sort_by: "-".to_string(),
            },
        });

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sort_by"));
    }

    #[test]
    fn test_config_not_found() {
        let result = Config::load(Path::new("/nonexistent/quire.toml"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_load_with_env_reads_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config_path = dir.path().join("quire.toml");
        std::fs::write(&config_path, create_test_config()).expect("write");

        let config = Config::load_with_env(&config_path).expect("load config");
        assert_eq!(config.site.title, "Test Site");
        assert_eq!(config.tag_indexes.len(), 1);
    }
}
