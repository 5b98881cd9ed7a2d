//! Content collection.
//!
//! Walks the content directory and parses every content file into a
//! [`Page`], producing the pool that selections run over.

use std::{
    fs,
    path::{Path, PathBuf},
};

use quire_core::{
    CoreError, Page, PagePool,
    frontmatter::parse_frontmatter,
};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// File extensions treated as content.
pub const CONTENT_EXTENSIONS: &[&str] = &["md", "markdown", "html"];

/// Content collection errors.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// IO error.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory walk error.
    #[error("failed to walk content directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// Frontmatter could not be parsed.
    #[error(transparent)]
    Parse(#[from] CoreError),
}

/// Result type for collector operations.
pub type Result<T> = std::result::Result<T, CollectorError>;

/// Collects pages from a content directory.
#[derive(Debug, Clone)]
pub struct ContentCollector {
    content_dir: PathBuf,
    include_drafts: bool,
}

impl ContentCollector {
    /// Create a new content collector.
    #[must_use]
    pub fn new(content_dir: impl Into<PathBuf>) -> Self {
        Self {
            content_dir: content_dir.into(),
            include_drafts: false,
        }
    }

    /// Keep pages marked `draft: true`.
    #[must_use]
    pub fn with_drafts(mut self, include: bool) -> Self {
        self.include_drafts = include;
        self
    }

    #[must_use]
    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    /// Collect all pages, in sorted path order.
    ///
    /// A missing content directory yields an empty pool.
    pub fn collect(&self) -> Result<PagePool> {
        info!(dir = %self.content_dir.display(), "collecting content");

        let files = self.find_content_files()?;
        info!(count = files.len(), "found content files");

        let parsed: Vec<Option<Page>> = files
            .par_iter()
            .map(|path| self.parse_file(path))
            .collect::<Result<_>>()?;

        let mut pool = PagePool::new();
        let mut drafts = 0;
        for page in parsed {
            match page {
                Some(page) => {
                    if let Some(previous) = pool.insert(page) {
                        debug!(name = previous.name(), "page replaced by a later file");
                    }
                }
                None => drafts += 1,
            }
        }

        info!(pages = pool.len(), drafts, "content collection complete");
        Ok(pool)
    }

    /// Content files under the content directory, sorted by path.
    fn find_content_files(&self) -> Result<Vec<PathBuf>> {
        if !self.content_dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.content_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() && is_content_file(entry.path()) {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    /// Parse a single file. Returns `None` for skipped drafts.
    fn parse_file(&self, path: &Path) -> Result<Option<Page>> {
        debug!(path = %path.display(), "parsing file");

        let content = fs::read_to_string(path).map_err(|source| CollectorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let (frontmatter, body) = parse_frontmatter(&content, path)?;

        if frontmatter.draft && !self.include_drafts {
            debug!(path = %path.display(), "skipping draft");
            return Ok(None);
        }

        let name = page_name(path.strip_prefix(&self.content_dir).unwrap_or(path));
        Ok(Some(frontmatter.into_page(name, body)))
    }
}

/// Page name for a content path: the relative path without its extension,
/// `/`-separated.
#[must_use]
pub fn page_name(relative: &Path) -> String {
    relative
        .with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_content_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| CONTENT_EXTENSIONS.contains(&ext))
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}
