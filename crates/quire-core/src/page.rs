//! Pages and the page pool.

use std::{
    borrow::Cow,
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::value::Value;

/// A single content item.
///
/// `name`, `tags` and `output_filename` are built-in fields; anything else
/// declared by the content lives in the attribute map. All of them are
/// reachable by name through [`Page::get`].
#[derive(Debug, Clone)]
pub struct Page {
    name: String,
    tags: Vec<String>,
    output_filename: PathBuf,
    attrs: BTreeMap<String, Value>,
}

impl Page {
    /// Create a page with no tags, writing to `<name>.html`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let output_filename = PathBuf::from(format!("{name}.html"));
        Self {
            name,
            tags: Vec::new(),
            output_filename,
            attrs: BTreeMap::new(),
        }
    }

    /// Set the tag set. Duplicates are dropped, first occurrence wins.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.clear();
        for tag in tags {
            self.add_tag(tag);
        }
        self
    }

    #[must_use]
    pub fn with_output_filename(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_filename = path.into();
        self
    }

    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Add a tag unless already present.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    /// Set a declared attribute. Built-in field names are routed to the
    /// corresponding built-in.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match key.as_str() {
            "tags" => {
                let tags: Vec<String> = match value {
                    Value::List(items) => items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                    other => other.as_str().map(str::to_string).into_iter().collect(),
                };
                self.tags.clear();
                for tag in tags {
                    self.add_tag(tag);
                }
            }
            "output_filename" => {
                if let Some(path) = value.as_str() {
                    self.output_filename = PathBuf::from(path);
                }
            }
            "name" => {}
            _ => {
                self.attrs.insert(key, value);
            }
        }
    }

    /// Page identity within the pool.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    #[must_use]
    pub fn output_filename(&self) -> &Path {
        &self.output_filename
    }

    /// Output filename with `/` separators, for building URLs.
    #[must_use]
    pub fn url_path(&self) -> String {
        self.output_filename.to_string_lossy().replace('\\', "/")
    }

    /// Declared attributes, excluding built-in fields.
    #[must_use]
    pub fn attrs(&self) -> &BTreeMap<String, Value> {
        &self.attrs
    }

    /// Display title: the `title` attribute, or the page name.
    #[must_use]
    pub fn title(&self) -> &str {
        self.attrs
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or(&self.name)
    }

    /// Look up a field by name. Returns `None` for fields the page does not
    /// define.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Cow<'_, Value>> {
        match field {
            "name" => Some(Cow::Owned(Value::Str(self.name.clone()))),
            "tags" => Some(Cow::Owned(Value::List(
                self.tags.iter().map(|t| Value::Str(t.clone())).collect(),
            ))),
            "output_filename" => Some(Cow::Owned(Value::Str(self.url_path()))),
            _ => self.attrs.get(field).map(Cow::Borrowed),
        }
    }
}

/// Registry of all pages known to a build, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct PagePool {
    pages: Vec<Arc<Page>>,
    by_name: HashMap<String, usize>,
}

impl PagePool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a page. A page with the same name is replaced in place and
    /// returned.
    pub fn insert(&mut self, page: Page) -> Option<Arc<Page>> {
        let page = Arc::new(page);
        match self.by_name.get(page.name()) {
            Some(&idx) => Some(std::mem::replace(&mut self.pages[idx], page)),
            None => {
                self.by_name.insert(page.name().to_string(), self.pages.len());
                self.pages.push(page);
                None
            }
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Page>> {
        self.by_name.get(name).map(|&idx| &self.pages[idx])
    }

    /// Iterate pages in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Page>> {
        self.pages.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl FromIterator<Page> for PagePool {
    fn from_iter<T: IntoIterator<Item = Page>>(iter: T) -> Self {
        let mut pool = Self::new();
        for page in iter {
            pool.insert(page);
        }
        pool
    }
}
