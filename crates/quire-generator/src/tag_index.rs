//! Tag index generation.
//!
//! A tag index groups the pages of a selection by tag and renders one page
//! per distinct tag into a directory named after the index.

use std::{
    collections::{HashMap, HashSet},
    fmt::Write as _,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use quire_core::{Page, PagePool, Value, config::TagIndexConfig};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    context::{ContextStack, Layer},
    memo::Memo,
    selection::{Selection, SelectionError},
    template::{TemplateError, TemplateRegistry},
};

/// Characters that cannot appear verbatim in a tag file stem.
const UNSAFE_STEM: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'\\')
    .add(b':')
    .add(b'*')
    .add(b'?')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'|')
    .add(b'%');

/// Failure while producing a single tag page.
#[derive(Debug, Error)]
pub enum TagPageError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Tag index errors.
#[derive(Debug, Error)]
pub enum TagIndexError {
    /// Selection could not be evaluated.
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// Template lookup failed before any page was rendered.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The output directory could not be created.
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// One or more tag pages failed.
    #[error("tag index {index:?}: {}", describe_failures(.failures))]
    Render {
        index: String,
        failures: Vec<(String, TagPageError)>,
    },
}

fn describe_failures(failures: &[(String, TagPageError)]) -> String {
    let mut out = format!("{} tag page(s) failed", failures.len());
    for (tag, error) in failures {
        let _ = write!(out, "; {tag:?}: {error}");
    }
    out
}

/// Result type for tag index operations.
pub type Result<T> = std::result::Result<T, TagIndexError>;

/// Page count per tag, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagCounts {
    entries: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl TagCounts {
    fn increment(&mut self, tag: &str) {
        match self.index.get(tag) {
            Some(&slot) => self.entries[slot].1 += 1,
            None => {
                self.index.insert(tag.to_string(), self.entries.len());
                self.entries.push((tag.to_string(), 1));
            }
        }
    }

    /// Number of pages carrying `tag`.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<usize> {
        self.index.get(tag).map(|&slot| self.entries[slot].1)
    }

    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.index.contains_key(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(tag, count)| (tag.as_str(), *count))
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(tag, _)| tag.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, count)| count).sum()
    }
}

/// Files written by [`TagIndex::render`].
#[derive(Debug, Clone, Default)]
pub struct RenderedIndex {
    /// Directory holding the tag pages.
    pub directory: PathBuf,
    /// One file per tag, in tag order.
    pub files: Vec<PathBuf>,
}

/// Per-tag listing over a selection.
#[derive(Debug)]
pub struct TagIndex<'a> {
    name: String,
    template: String,
    exclude_tags: HashSet<String>,
    selection: Selection<'a>,
    tag_counts: Memo<TagCounts>,
}

impl<'a> TagIndex<'a> {
    /// Create a tag index named `name` over `selection`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        selection: Selection<'a>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            exclude_tags: HashSet::new(),
            selection,
            tag_counts: Memo::new(),
        }
    }

    /// Exclude tags from counting and rendering.
    #[must_use]
    pub fn with_exclude_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Create a tag index from its configuration entry.
    #[must_use]
    pub fn from_config(pool: &'a PagePool, config: &TagIndexConfig) -> Self {
        Self::new(
            &config.name,
            Selection::from_config(pool, &config.selection),
            &config.template,
        )
        .with_exclude_tags(config.exclude_tags.iter().cloned())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    #[must_use]
    pub fn selection(&self) -> &Selection<'a> {
        &self.selection
    }

    #[must_use]
    pub fn is_excluded(&self, tag: &str) -> bool {
        self.exclude_tags.contains(tag)
    }

    /// Pages per tag over the selected pages.
    ///
    /// Computed once; later calls return the same mapping.
    pub fn tag_counts(&self) -> Result<&TagCounts> {
        self.tag_counts.get_or_try_init(|| {
            let mut counts = TagCounts::default();
            for page in self.selection.pages()? {
                for tag in page.tags() {
                    if !self.is_excluded(tag) {
                        counts.increment(tag);
                    }
                }
            }
            debug!(index = %self.name, tags = counts.len(), "tag counts computed");
            Ok(counts)
        })
    }

    /// Selected pages carrying `tag`, in selection order.
    pub fn members(&self, tag: &str) -> Result<Vec<Arc<Page>>> {
        Ok(members_of(self.selection.pages()?, tag))
    }

    /// Directory receiving this index's tag pages.
    ///
    /// The index name with the renderer's extension removed, under
    /// `dest_root`.
    #[must_use]
    pub fn output_dir(&self, dest_root: &Path, extension: &str) -> PathBuf {
        let suffix = format!(".{extension}");
        let stem = self.name.strip_suffix(suffix.as_str()).unwrap_or(self.name.as_str());
        dest_root.join(stem)
    }

    /// Render one page per tag under [`Self::output_dir`].
    ///
    /// Each page sees the base context plus a layer binding `tag` and
    /// `pages`. Tags render in parallel; every failure is collected and
    /// reported together.
    pub fn render(
        &self,
        base: &ContextStack,
        templates: &TemplateRegistry,
        dest_root: &Path,
    ) -> Result<RenderedIndex> {
        let counts = self.tag_counts()?;
        let pages = self.selection.pages()?;
        let template = templates.resolve(&self.template)?;
        let extension = templates.extension();
        let directory = self.output_dir(dest_root, extension);

        fs::create_dir_all(&directory).map_err(|source| TagIndexError::CreateDir {
            path: directory.clone(),
            source,
        })?;

        info!(
            index = %self.name,
            tags = counts.len(),
            dir = %directory.display(),
            "rendering tag index"
        );

        let tags: Vec<&str> = counts.tags().collect();
        let results: Vec<(String, std::result::Result<PathBuf, TagPageError>)> = tags
            .par_iter()
            .map(|&tag| {
                let listed: Vec<Value> = members_of(pages, tag)
                    .into_iter()
                    .map(Value::Page)
                    .collect();
                let scope = base.with_layer(Layer::new().with("tag", tag).with("pages", listed));
                let path = directory.join(format!("{}.{extension}", escape_tag_stem(tag)));

                let result = template
                    .render(&scope)
                    .map_err(TagPageError::from)
                    .and_then(|html| {
                        fs::write(&path, html).map_err(|source| TagPageError::Write {
                            path: path.clone(),
                            source,
                        })
                    })
                    .map(|()| path);

                if let Ok(path) = &result {
                    debug!(tag, path = %path.display(), "wrote tag page");
                }
                (tag.to_string(), result)
            })
            .collect();

        let mut files = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (tag, result) in results {
            match result {
                Ok(path) => files.push(path),
                Err(error) => {
                    warn!(index = %self.name, tag = %tag, error = %error, "failed to render tag page");
                    failures.push((tag, error));
                }
            }
        }

        if !failures.is_empty() {
            return Err(TagIndexError::Render {
                index: self.name.clone(),
                failures,
            });
        }

        Ok(RenderedIndex { directory, files })
    }
}

fn members_of(pages: &[Arc<Page>], tag: &str) -> Vec<Arc<Page>> {
    pages
        .iter()
        .filter(|page| page.has_tag(tag))
        .cloned()
        .collect()
}

/// Map a tag to a file stem that is safe on common filesystems.
///
/// Path separators, reserved punctuation, control characters, `%`, non-ASCII
/// bytes and a leading `.` are percent-encoded. The empty tag maps to `_`,
/// so the tag `_` itself is written as `%5F`.
#[must_use]
pub fn escape_tag_stem(tag: &str) -> String {
    match tag {
        "" => return "_".to_string(),
        "_" => return "%5F".to_string(),
        _ => {}
    }
    match tag.strip_prefix('.') {
        Some(rest) => format!("%2E{}", utf8_percent_encode(rest, UNSAFE_STEM)),
        None => utf8_percent_encode(tag, UNSAFE_STEM).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::predicate::Filter;

    fn pool() -> PagePool {
        [
            Page::new("A").with_tags(["foo", "bar"]),
            Page::new("B").with_tags(["foo"]),
            Page::new("C").with_tags(["bar"]),
        ]
        .into_iter()
        .collect()
    }

    fn templates() -> TemplateRegistry {
        let mut templates = TemplateRegistry::new();
        templates
            .register_str(
                "tag.html",
                "{{ tag }}:{% for page in pages %}{{ page.name }},{% endfor %}",
            )
            .unwrap();
        templates
    }

    #[test]
    fn test_tag_counts_first_seen_order() {
        let pool = pool();
        let index = TagIndex::new("tags.html", Selection::all(&pool), "tag.html");
        let counts = index.tag_counts().unwrap();

        assert_eq!(counts.iter().collect::<Vec<_>>(), [("foo", 2), ("bar", 2)]);
        assert_eq!(counts.get("foo"), Some(2));
        assert_eq!(counts.get("baz"), None);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn test_counts_sum_equals_tag_occurrences() {
        let pool = pool();
        let index = TagIndex::new("tags.html", Selection::all(&pool), "tag.html");
        let occurrences: usize = pool.iter().map(|page| page.tags().len()).sum();
        assert_eq!(index.tag_counts().unwrap().total(), occurrences);
    }

    #[test]
    fn test_counts_sum_skips_excluded_occurrences() {
        let pool: PagePool = [
            Page::new("A").with_tags(["foo", "bar", "baz"]),
            Page::new("B").with_tags(["foo", "baz"]),
            Page::new("C").with_tags(["bar"]),
        ]
        .into_iter()
        .collect();
        let index = TagIndex::new("tags.html", Selection::all(&pool), "tag.html")
            .with_exclude_tags(["baz"]);

        let kept: usize = pool
            .iter()
            .map(|page| page.tags().iter().filter(|tag| *tag != "baz").count())
            .sum();
        let counts = index.tag_counts().unwrap();
        assert_eq!(counts.total(), kept);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn test_tag_counts_are_memoized() {
        let pool = pool();
        let index = TagIndex::new("tags.html", Selection::all(&pool), "tag.html");
        let first: *const TagCounts = index.tag_counts().unwrap();
        let second: *const TagCounts = index.tag_counts().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_counts_respect_selection_filter() {
        let pool = pool();
        let selection = Selection::new(&pool, Filter::new().with_fn(|p| p.name() != "B"), "name");
        let index = TagIndex::new("tags.html", selection, "tag.html");
        let counts = index.tag_counts().unwrap();
        assert_eq!(counts.get("foo"), Some(1));
        assert_eq!(counts.get("bar"), Some(2));
    }

    #[test]
    fn test_excluded_tags_are_not_counted() {
        let pool = pool();
        let index = TagIndex::new("tags.html", Selection::all(&pool), "tag.html")
            .with_exclude_tags(["bar"]);
        let counts = index.tag_counts().unwrap();
        assert_eq!(counts.len(), 1);
        assert!(!counts.contains("bar"));
    }

    #[test]
    fn test_output_dir_strips_extension() {
        let pool = pool();
        let root = Path::new("/out");
        let index = TagIndex::new("tags.html", Selection::all(&pool), "tag.html");
        assert_eq!(index.output_dir(root, "html"), root.join("tags"));

        let nested = TagIndex::new("blog/topics.html", Selection::all(&pool), "tag.html");
        assert_eq!(nested.output_dir(root, "html"), root.join("blog/topics"));

        let bare = TagIndex::new("topics", Selection::all(&pool), "tag.html");
        assert_eq!(bare.output_dir(root, "html"), root.join("topics"));
    }

    #[test]
    fn test_render_writes_one_file_per_tag() {
        let dir = TempDir::new().unwrap();
        let pool = pool();
        let index = TagIndex::new("tags.html", Selection::all(&pool), "tag.html");

        let rendered = index
            .render(&ContextStack::default(), &templates(), dir.path())
            .unwrap();

        assert_eq!(rendered.directory, dir.path().join("tags"));
        assert_eq!(
            rendered.files,
            [
                dir.path().join("tags/foo.html"),
                dir.path().join("tags/bar.html"),
            ]
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("tags/foo.html")).unwrap(),
            "foo:A,B,"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("tags/bar.html")).unwrap(),
            "bar:A,C,"
        );
    }

    #[test]
    fn test_render_leaves_base_context_untouched() {
        let dir = TempDir::new().unwrap();
        let pool = pool();
        let index = TagIndex::new("tags.html", Selection::all(&pool), "tag.html");
        let base = ContextStack::new(Layer::new().with("site", "demo"));

        index.render(&base, &templates(), dir.path()).unwrap();

        assert_eq!(base.depth(), 1);
        assert!(base.resolve("tag").is_none());
        assert!(base.resolve("pages").is_none());
    }

    #[test]
    fn test_render_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let pool = pool();
        let index = TagIndex::new("tags.html", Selection::all(&pool), "tag.html");
        let templates = templates();

        index
            .render(&ContextStack::default(), &templates, dir.path())
            .unwrap();
        let first = fs::read(dir.path().join("tags/foo.html")).unwrap();
        index
            .render(&ContextStack::default(), &templates, dir.path())
            .unwrap();
        let second = fs::read(dir.path().join("tags/foo.html")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_excluded_tags_are_not_rendered() {
        let dir = TempDir::new().unwrap();
        let pool = pool();
        let index = TagIndex::new("tags.html", Selection::all(&pool), "tag.html")
            .with_exclude_tags(["foo"]);

        let rendered = index
            .render(&ContextStack::default(), &templates(), dir.path())
            .unwrap();
        assert_eq!(rendered.files.len(), 1);
        assert!(!dir.path().join("tags/foo.html").exists());
    }

    #[test]
    fn test_missing_template_is_fatal() {
        let dir = TempDir::new().unwrap();
        let pool = pool();
        let index = TagIndex::new("tags.html", Selection::all(&pool), "missing.html");

        let err = index
            .render(&ContextStack::default(), &templates(), dir.path())
            .unwrap_err();
        assert!(matches!(err, TagIndexError::Template(TemplateError::NotFound(_))));
    }

    #[test]
    fn test_render_failures_are_collected() {
        let dir = TempDir::new().unwrap();
        let pool = pool();
        let mut templates = TemplateRegistry::new();
        templates.register_str("tag.html", "{{ missing }}").unwrap();
        let index = TagIndex::new("tags.html", Selection::all(&pool), "tag.html");

        let err = index
            .render(&ContextStack::default(), &templates, dir.path())
            .unwrap_err();
        match err {
            TagIndexError::Render { index, failures } => {
                assert_eq!(index, "tags.html");
                let tags: Vec<_> = failures.iter().map(|(tag, _)| tag.as_str()).collect();
                assert_eq!(tags, ["foo", "bar"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unsafe_tags_are_escaped() {
        let dir = TempDir::new().unwrap();
        let pool: PagePool = [Page::new("A").with_tags(["c/c++", "..", "ok tag"])]
            .into_iter()
            .collect();
        let index = TagIndex::new("tags.html", Selection::all(&pool), "tag.html");

        index
            .render(&ContextStack::default(), &templates(), dir.path())
            .unwrap();

        assert!(dir.path().join("tags/c%2Fc++.html").exists());
        assert!(dir.path().join("tags/%2E..html").exists());
        assert!(dir.path().join("tags/ok tag.html").exists());
    }

    #[test]
    fn test_empty_and_underscore_tags_get_distinct_files() {
        let dir = TempDir::new().unwrap();
        let pool: PagePool = [Page::new("A").with_tags(["", "_"])].into_iter().collect();
        let index = TagIndex::new("tags.html", Selection::all(&pool), "tag.html");

        let rendered = index
            .render(&ContextStack::default(), &templates(), dir.path())
            .unwrap();

        assert_eq!(
            rendered.files,
            [
                dir.path().join("tags/_.html"),
                dir.path().join("tags/%5F.html"),
            ]
        );
        assert_eq!(fs::read_to_string(&rendered.files[0]).unwrap(), ":A,");
        assert_eq!(fs::read_to_string(&rendered.files[1]).unwrap(), "_:A,");
    }

    #[test]
    fn test_escape_tag_stem() {
        assert_eq!(escape_tag_stem("rust"), "rust");
        assert_eq!(escape_tag_stem(""), "_");
        assert_eq!(escape_tag_stem("_"), "%5F");
        assert_eq!(escape_tag_stem("a_b"), "a_b");
        assert_eq!(escape_tag_stem("a:b"), "a%3Ab");
        assert_eq!(escape_tag_stem("50%"), "50%25");
        assert_eq!(escape_tag_stem(".hidden"), "%2Ehidden");
        assert_eq!(escape_tag_stem("día"), "d%C3%ADa");
    }

    #[test]
    fn test_from_config() {
        let pool = pool();
        let mut config = TagIndexConfig::new("topics.html");
        config.exclude_tags.push("bar".to_string());
        let index = TagIndex::from_config(&pool, &config);
        assert_eq!(index.name(), "topics.html");
        assert_eq!(index.template(), "tag.html");
        assert!(index.is_excluded("bar"));
    }
}
