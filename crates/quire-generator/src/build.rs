//! Build orchestration.
//!
//! Coordinates collection, context construction and rendering of every
//! configured menu, tag index and feed.

use std::{
    fmt,
    path::{Path, PathBuf},
    time::Instant,
};

use quire_core::{Config, CoreError, PagePool};
use thiserror::Error;
use tracing::info;

use crate::{
    collector::{CollectorError, ContentCollector},
    context::{ContextError, ContextProvider, ContextProviders, ContextStack},
    feed::{Feed, FeedError},
    menu::{Menu, MenuError},
    tag_index::{TagCounts, TagIndex, TagIndexError},
    template::{TemplateError, TemplateRegistry},
};

/// Build errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] CoreError),

    /// Collector error.
    #[error("collector error: {0}")]
    Collector(#[from] CollectorError),

    /// Template loading error.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Context provider error.
    #[error("context error: {0}")]
    Context(#[from] ContextError),

    /// Menu rendering error.
    #[error("menu {name:?}: {source}")]
    Menu {
        name: String,
        #[source]
        source: MenuError,
    },

    /// Tag index rendering error.
    #[error("{0}")]
    TagIndex(#[from] TagIndexError),

    /// Feed generation error.
    #[error("feed {name:?}: {source}")]
    Feed {
        name: String,
        #[source]
        source: FeedError,
    },

    /// No tag index with the requested name is configured.
    #[error("no tag index named {0:?}")]
    UnknownTagIndex(String),
}

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Build statistics.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    /// Number of pages in the pool.
    pub pages: usize,

    /// Number of menus rendered.
    pub menus: usize,

    /// Number of tag pages written across all indexes.
    pub tag_pages: usize,

    /// Number of feeds written.
    pub feeds: usize,

    /// Build duration in milliseconds.
    pub duration_ms: u64,
}

/// Site builder that owns the configuration and context providers.
pub struct Builder {
    config: Config,
    content_dir: PathBuf,
    templates_dir: PathBuf,
    output_dir: PathBuf,
    providers: ContextProviders,
    pool: Option<PagePool>,
}

impl Builder {
    /// Create a builder using the directories from `config.build`.
    ///
    /// The default site and helper providers are registered.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let providers = ContextProviders::with_defaults(&config);
        Self {
            content_dir: config.build.content_dir.clone(),
            templates_dir: config.build.templates_dir.clone(),
            output_dir: config.build.output_dir.clone(),
            config,
            providers,
            pool: None,
        }
    }

    /// Resolve the configured directories against `root`.
    #[must_use]
    pub fn with_root(mut self, root: &Path) -> Self {
        self.content_dir = root.join(&self.content_dir);
        self.templates_dir = root.join(&self.templates_dir);
        self.output_dir = root.join(&self.output_dir);
        self
    }

    /// Override the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Use a prepared page pool instead of collecting from disk.
    #[must_use]
    pub fn with_pool(mut self, pool: PagePool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Register an extra context provider, applied after the defaults.
    #[must_use]
    pub fn with_provider(mut self, provider: impl ContextProvider + 'static) -> Self {
        self.providers.register(provider);
        self
    }

    pub fn providers_mut(&mut self) -> &mut ContextProviders {
        &mut self.providers
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    #[must_use]
    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The page pool: the supplied one, or pages collected from the content
    /// directory.
    pub fn collect(&self) -> Result<PagePool> {
        match &self.pool {
            Some(pool) => Ok(pool.clone()),
            None => Ok(ContentCollector::new(&self.content_dir)
                .with_drafts(self.config.build.drafts)
                .collect()?),
        }
    }

    /// Built-in templates overlaid with the templates directory.
    pub fn load_templates(&self) -> Result<TemplateRegistry> {
        let mut templates =
            TemplateRegistry::new().with_extension(self.config.build.extension.clone());
        let loaded = templates.load_dir(&self.templates_dir)?;
        info!(
            dir = %self.templates_dir.display(),
            loaded,
            total = templates.names().len(),
            "templates loaded"
        );
        Ok(templates)
    }

    /// Run every provider once to produce the base context.
    pub fn base_context(&self) -> Result<ContextStack> {
        Ok(self.providers.build_base()?)
    }

    /// Tag counts for the configured tag index `name`.
    pub fn tag_counts(&self, name: &str) -> Result<TagCounts> {
        let config = self
            .config
            .tag_indexes
            .iter()
            .find(|index| index.name == name)
            .ok_or_else(|| BuildError::UnknownTagIndex(name.to_string()))?;
        let pool = self.collect()?;
        let index = TagIndex::from_config(&pool, config);
        Ok(index.tag_counts()?.clone())
    }

    /// Execute the full build.
    pub fn build(&self) -> Result<BuildStats> {
        let start = Instant::now();
        let mut stats = BuildStats::default();

        info!(
            content = %self.content_dir.display(),
            output = %self.output_dir.display(),
            "starting build"
        );

        self.config.validate()?;

        // 1. Collect pages
        let pool = self.collect()?;
        stats.pages = pool.len();

        // 2. Templates and base context
        let templates = self.load_templates()?;
        let base = self.base_context()?;

        // 3. Menus
        for config in &self.config.menus {
            Menu::from_config(&pool, config)
                .render(&base, &templates, &self.output_dir)
                .map_err(|source| BuildError::Menu {
                    name: config.name.clone(),
                    source,
                })?;
            stats.menus += 1;
        }

        // 4. Tag indexes
        for config in &self.config.tag_indexes {
            let rendered = TagIndex::from_config(&pool, config).render(
                &base,
                &templates,
                &self.output_dir,
            )?;
            stats.tag_pages += rendered.files.len();
        }

        // 5. Feeds
        for config in &self.config.feeds {
            Feed::from_config(&pool, config)
                .write(&self.config, &self.output_dir)
                .map_err(|source| BuildError::Feed {
                    name: config.name.clone(),
                    source,
                })?;
            stats.feeds += 1;
        }

        stats.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            pages = stats.pages,
            menus = stats.menus,
            tag_pages = stats.tag_pages,
            feeds = stats.feeds,
            duration_ms = stats.duration_ms,
            "build complete"
        );

        Ok(stats)
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("content_dir", &self.content_dir)
            .field("templates_dir", &self.templates_dir)
            .field("output_dir", &self.output_dir)
            .field("providers", &self.providers)
            .field("pool", &self.pool.as_ref().map(PagePool::len))
            .finish()
    }
}
