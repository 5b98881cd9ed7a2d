//! RSS feed generation.
//!
//! Builds an RSS 2.0 channel from a selection, with an Atom self link.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use quire_core::{Config, Page, PagePool, config::FeedConfig};
use rss::{
    Channel, ChannelBuilder, GuidBuilder, Item, ItemBuilder,
    extension::atom::{AtomExtension, Link},
};
use thiserror::Error;
use tracing::{debug, info};

use crate::selection::{Selection, SelectionError};

/// Feed errors.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Selection could not be evaluated.
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// RSS serialization error.
    #[error("RSS error: {0}")]
    Rss(#[from] rss::Error),

    /// Write error.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;

/// An RSS feed over a selection, written to `dest_root/<name>`.
#[derive(Debug)]
pub struct Feed<'a> {
    name: String,
    limit: Option<usize>,
    selection: Selection<'a>,
}

impl<'a> Feed<'a> {
    #[must_use]
    pub fn new(name: impl Into<String>, selection: Selection<'a>) -> Self {
        Self {
            name: name.into(),
            limit: None,
            selection,
        }
    }

    /// Cap the number of items.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn from_config(pool: &'a PagePool, config: &FeedConfig) -> Self {
        Self {
            name: config.name.clone(),
            limit: config.limit,
            selection: Selection::from_config(pool, &config.selection),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build the RSS channel.
    pub fn channel(&self, config: &Config) -> Result<Channel> {
        let pages = self.selection.pages()?;
        let limit = self.limit.unwrap_or(pages.len());

        let items: Vec<Item> = pages
            .iter()
            .take(limit)
            .map(|page| page_to_item(page, config))
            .collect();

        debug!(feed = %self.name, count = items.len(), limit = ?self.limit, "generating RSS feed");

        let mut self_link = Link::default();
        self_link.set_href(config.url_for(&self.name));
        self_link.set_rel("self");
        self_link.set_mime_type(Some("application/rss+xml".to_string()));
        let mut atom = AtomExtension::default();
        atom.set_links(vec![self_link]);

        Ok(ChannelBuilder::default()
            .title(&config.site.title)
            .link(&config.site.base_url)
            .description(
                config
                    .site
                    .description
                    .as_deref()
                    .unwrap_or(&config.site.title),
            )
            .atom_ext(Some(atom))
            .items(items)
            .build())
    }

    /// Serialize the feed as pretty-printed XML.
    pub fn to_xml(&self, config: &Config) -> Result<Vec<u8>> {
        let channel = self.channel(config)?;
        Ok(channel.pretty_write_to(Vec::new(), b' ', 2)?)
    }

    /// Write the feed under `dest_root`.
    pub fn write(&self, config: &Config, dest_root: &Path) -> Result<PathBuf> {
        let xml = self.to_xml(config)?;
        let path = dest_root.join(&self.name);

        let write = |path: &Path| -> io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, &xml)
        };
        write(&path).map_err(|source| FeedError::Write {
            path: path.clone(),
            source,
        })?;

        info!(feed = %self.name, path = %path.display(), "wrote feed");
        Ok(path)
    }
}

fn page_to_item(page: &Page, config: &Config) -> Item {
    let link = config.url_for(&page.url_path());
    ItemBuilder::default()
        .title(Some(page.title().to_string()))
        .link(Some(link.clone()))
        .guid(Some(GuidBuilder::default().permalink(true).value(link).build()))
        .description(Some(String::new()))
        .build()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn config() -> Config {
        let mut config = Config::new("Test Site", "https://example.com");
        config.site.description = Some("A test site".to_string());
        config
    }

    fn pool() -> PagePool {
        [
            Page::new("a").with_attr("title", "First"),
            Page::new("b").with_output_filename("posts/b/index.html"),
            Page::new("c").with_attr("title", "Third"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_channel_fields() {
        let pool = pool();
        let feed = Feed::new("feed.xml", Selection::all(&pool));
        let channel = feed.channel(&config()).unwrap();

        assert_eq!(channel.title(), "Test Site");
        assert_eq!(channel.link(), "https://example.com");
        assert_eq!(channel.description(), "A test site");

        let atom = channel.atom_ext().unwrap();
        assert_eq!(atom.links()[0].href(), "https://example.com/feed.xml");
        assert_eq!(atom.links()[0].rel(), "self");
    }

    #[test]
    fn test_items() {
        let pool = pool();
        let feed = Feed::new("feed.xml", Selection::all(&pool));
        let channel = feed.channel(&config()).unwrap();
        let items = channel.items();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title(), Some("First"));
        assert_eq!(items[0].link(), Some("https://example.com/a.html"));
        assert_eq!(items[0].description(), Some(""));

        // Title falls back to the page name.
        assert_eq!(items[1].title(), Some("b"));
        assert_eq!(items[1].link(), Some("https://example.com/posts/b/index.html"));
        let guid = items[1].guid().unwrap();
        assert!(guid.is_permalink());
        assert_eq!(guid.value(), "https://example.com/posts/b/index.html");
    }

    #[test]
    fn test_limit() {
        let pool = pool();
        let feed = Feed::new("feed.xml", Selection::new(&pool, Default::default(), "-name"))
            .with_limit(2);
        let channel = feed.channel(&config()).unwrap();
        let titles: Vec<_> = channel.items().iter().filter_map(Item::title).collect();
        assert_eq!(titles, ["Third", "b"]);
    }

    #[test]
    fn test_description_falls_back_to_title() {
        let pool = pool();
        let feed = Feed::new("feed.xml", Selection::all(&pool));
        let config = Config::new("Bare", "https://example.com/");
        let channel = feed.channel(&config).unwrap();
        assert_eq!(channel.description(), "Bare");
    }

    #[test]
    fn test_write_pretty_xml() {
        let dir = TempDir::new().unwrap();
        let pool = pool();
        let feed = Feed::new("blog/rss.xml", Selection::all(&pool));

        let path = feed.write(&config(), dir.path()).unwrap();
        assert_eq!(path, dir.path().join("blog/rss.xml"));

        let xml = fs::read_to_string(&path).unwrap();
        assert!(xml.contains("<rss"));
        assert!(xml.contains("<title>Test Site</title>"));
        assert!(xml.contains("atom:link"));
        assert!(xml.contains(r#"href="https://example.com/blog/rss.xml""#));
        assert!(xml.contains("\n  <channel>"));

        let parsed = Channel::read_from(xml.as_bytes()).unwrap();
        assert_eq!(parsed.items().len(), 3);
    }

    #[test]
    fn test_from_config() {
        let pool = pool();
        let mut config = FeedConfig::new("atom.xml");
        config.limit = Some(1);
        let feed = Feed::from_config(&pool, &config);
        assert_eq!(feed.name(), "atom.xml");
        assert_eq!(feed.channel(&self::config()).unwrap().items().len(), 1);
    }
}
