//! Page predicates.
//!
//! A [`Filter`] is a conjunction of clauses. Each clause names a page field
//! and compares it against an expected value; a page that does not define
//! the field never matches.

use std::{collections::BTreeMap, fmt, sync::Arc};

use quire_core::{Page, Value};

/// Comparison applied by a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Field equals the expected value.
    Eq,
    /// Collection-valued field contains the expected value.
    Contains,
    /// `Contains` for collection-valued fields, `Eq` otherwise.
    Auto,
}

type PageFn = dyn Fn(&Page) -> bool + Send + Sync;

#[derive(Clone)]
enum Clause {
    Field {
        field: String,
        op: Op,
        expected: Value,
    },
    Custom(Arc<PageFn>),
}

impl Clause {
    fn matches(&self, page: &Page) -> bool {
        match self {
            Self::Field {
                field,
                op,
                expected,
            } => {
                let Some(actual) = page.get(field) else {
                    return false;
                };
                match op {
                    Op::Eq => *actual == *expected,
                    Op::Contains => actual.contains(expected),
                    Op::Auto if actual.is_collection() => actual.contains(expected),
                    Op::Auto => *actual == *expected,
                }
            }
            Self::Custom(f) => f(page),
        }
    }
}

impl fmt::Debug for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field {
                field,
                op,
                expected,
            } => write!(f, "{field} {op:?} {expected:?}"),
            Self::Custom(_) => f.write_str("<fn>"),
        }
    }
}

/// A conjunction of field constraints. The empty filter matches every page.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    /// Filter matching every page.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `expected`, or contain it if the field is a
    /// collection.
    #[must_use]
    pub fn with(self, field: impl Into<String>, expected: impl Into<Value>) -> Self {
        self.with_op(field, Op::Auto, expected)
    }

    /// Require `field` to equal `expected`.
    #[must_use]
    pub fn with_eq(self, field: impl Into<String>, expected: impl Into<Value>) -> Self {
        self.with_op(field, Op::Eq, expected)
    }

    /// Require collection-valued `field` to contain `expected`.
    #[must_use]
    pub fn with_contains(self, field: impl Into<String>, expected: impl Into<Value>) -> Self {
        self.with_op(field, Op::Contains, expected)
    }

    #[must_use]
    pub fn with_op(
        mut self,
        field: impl Into<String>,
        op: Op,
        expected: impl Into<Value>,
    ) -> Self {
        self.clauses.push(Clause::Field {
            field: field.into(),
            op,
            expected: expected.into(),
        });
        self
    }

    /// Add an arbitrary predicate.
    #[must_use]
    pub fn with_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Page) -> bool + Send + Sync + 'static,
    {
        self.clauses.push(Clause::Custom(Arc::new(f)));
        self
    }

    /// Build a filter from a declarative `field = expected` table.
    #[must_use]
    pub fn from_table<I, K, V>(table: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        table
            .into_iter()
            .fold(Self::new(), |filter, (field, expected)| {
                filter.with(field, expected)
            })
    }

    /// Build a filter from a `filter_by` configuration table.
    #[must_use]
    pub fn from_config(table: &BTreeMap<String, serde_yaml::Value>) -> Self {
        Self::from_table(
            table
                .iter()
                .map(|(field, expected)| (field.clone(), Value::from(expected.clone()))),
        )
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether `page` satisfies every clause.
    #[must_use]
    pub fn matches(&self, page: &Page) -> bool {
        self.clauses.iter().all(|clause| clause.matches(page))
    }
}

/// Whether `page` satisfies `filter`.
#[must_use]
pub fn matches(page: &Page, filter: &Filter) -> bool {
    filter.matches(page)
}
