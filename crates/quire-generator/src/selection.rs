//! Filtered, sorted views over the page pool.

use std::{fmt, sync::Arc};

use quire_core::{Page, PagePool, config::SelectionConfig};
use thiserror::Error;
use tracing::debug;

use crate::{memo::Memo, predicate::Filter};

/// Selection errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectionError {
    /// The sort field is not defined on a selected page.
    #[error("unknown sort key {field:?}: page {page:?} does not define it")]
    UnknownSortKey { field: String, page: String },
}

/// Result type for selection operations.
pub type Result<T> = std::result::Result<T, SelectionError>;

/// Sort field with direction, parsed from `"field"` or `"-field"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    field: String,
    descending: bool,
}

impl SortKey {
    /// Marker prefix for descending order.
    pub const DESCENDING: char = '-';

    /// Parse a sort key such as `name` or `-name`.
    #[must_use]
    pub fn parse(key: &str) -> Self {
        match key.strip_prefix(Self::DESCENDING) {
            Some(field) => Self {
                field: field.to_string(),
                descending: true,
            },
            None => Self {
                field: key.to_string(),
                descending: false,
            },
        }
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub fn is_descending(&self) -> bool {
        self.descending
    }
}

impl Default for SortKey {
    fn default() -> Self {
        Self::parse("name")
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "{}{}", Self::DESCENDING, self.field)
        } else {
            f.write_str(&self.field)
        }
    }
}

/// An ordered, filtered view over a [`PagePool`].
///
/// The page list is computed on first access and frozen for the lifetime of
/// the selection. Build a new selection to observe later pool changes.
#[derive(Debug)]
pub struct Selection<'a> {
    pool: &'a PagePool,
    filter: Filter,
    sort: SortKey,
    pages: Memo<Vec<Arc<Page>>>,
}

impl<'a> Selection<'a> {
    /// Create a selection over `pool`.
    #[must_use]
    pub fn new(pool: &'a PagePool, filter: Filter, sort_by: &str) -> Self {
        Self {
            pool,
            filter,
            sort: SortKey::parse(sort_by),
            pages: Memo::new(),
        }
    }

    /// Every page, ordered by name.
    #[must_use]
    pub fn all(pool: &'a PagePool) -> Self {
        Self::new(pool, Filter::new(), "name")
    }

    /// Create a selection from a listing's configuration.
    #[must_use]
    pub fn from_config(pool: &'a PagePool, config: &SelectionConfig) -> Self {
        Self::new(pool, Filter::from_config(&config.filter_by), &config.sort_by)
    }

    #[must_use]
    pub fn pool(&self) -> &'a PagePool {
        self.pool
    }

    #[must_use]
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    #[must_use]
    pub fn sort_key(&self) -> &SortKey {
        &self.sort
    }

    /// Matching pages in sort order.
    ///
    /// Ties keep pool order in both directions. Fails if the sort field is
    /// missing on any matching page; the failure is not cached.
    pub fn pages(&self) -> Result<&[Arc<Page>]> {
        self.pages
            .get_or_try_init(|| self.compute())
            .map(Vec::as_slice)
    }

    fn compute(&self) -> Result<Vec<Arc<Page>>> {
        let field = self.sort.field();
        let mut keyed = Vec::new();

        for page in self.pool.iter().filter(|page| self.filter.matches(page)) {
            let key = page
                .get(field)
                .ok_or_else(|| SelectionError::UnknownSortKey {
                    field: field.to_string(),
                    page: page.name().to_string(),
                })?
                .into_owned();
            keyed.push((key, Arc::clone(page)));
        }

        let descending = self.sort.is_descending();
        keyed.sort_by(|(a, _), (b, _)| {
            let ord = a.natural_cmp(b);
            if descending { ord.reverse() } else { ord }
        });

        debug!(
            pool = self.pool.len(),
            selected = keyed.len(),
            sort_by = %self.sort,
            "selection computed"
        );

        Ok(keyed.into_iter().map(|(_, page)| page).collect())
    }
}
