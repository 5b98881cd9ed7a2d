//! Dynamically typed values for page attributes and render contexts.

use std::{borrow::Cow, cmp::Ordering, collections::BTreeMap, fmt, sync::Arc};

use crate::page::Page;

type HelperFn = dyn Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync;

/// A named function exposed to templates through the render context.
#[derive(Clone)]
pub struct Helper {
    name: String,
    func: Arc<HelperFn>,
}

impl Helper {
    /// Wrap a closure as a helper.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Helper name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the helper.
    pub fn call(&self, args: &[Value]) -> std::result::Result<Value, String> {
        (self.func)(args)
    }
}

impl fmt::Debug for Helper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Helper").field("name", &self.name).finish()
    }
}

/// A page attribute or context binding.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent or explicit null.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Plain text, escaped on output.
    Str(String),
    /// Pre-sanitized HTML, written verbatim.
    Safe(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Reference to a page in the pool.
    Page(Arc<Page>),
    Helper(Helper),
}

impl Value {
    /// Rank used to order values of different kinds.
    fn kind_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Float(_) => 2,
            Self::Str(_) | Self::Safe(_) => 3,
            Self::List(_) => 4,
            Self::Map(_) => 5,
            Self::Page(_) => 6,
            Self::Helper(_) => 7,
        }
    }

    /// Short kind name for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Safe(_) => "safe string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Page(_) => "page",
            Self::Helper(_) => "helper",
        }
    }

    /// Text content of string-like values.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::Safe(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content, accepting whole floats.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Whether the value is a collection for containment tests.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::List(_) | Self::Map(_))
    }

    /// Truthiness for template conditionals.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) | Self::Safe(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Map(map) => !map.is_empty(),
            Self::Page(_) | Self::Helper(_) => true,
        }
    }

    /// Total natural ordering.
    ///
    /// Numbers compare numerically, text lexicographically and lists
    /// element-wise. Different kinds order by kind, nulls first.
    #[must_use]
    pub fn natural_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64).total_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.total_cmp(&(*b as f64)),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::List(a), Self::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    let ord = x.natural_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Self::Page(a), Self::Page(b)) => a.name().cmp(b.name()),
            (Self::Helper(a), Self::Helper(b)) => a.name().cmp(b.name()),
            (Self::Map(a), Self::Map(b)) => a.len().cmp(&b.len()),
            _ => match (self.as_str(), other.as_str()) {
                (Some(a), Some(b)) => a.cmp(b),
                _ => self.kind_rank().cmp(&other.kind_rank()),
            },
        }
    }

    /// Containment test for collection values: list membership or map key.
    #[must_use]
    pub fn contains(&self, needle: &Value) -> bool {
        match self {
            Self::List(items) => items.iter().any(|item| item == needle),
            Self::Map(map) => needle.as_str().is_some_and(|key| map.contains_key(key)),
            _ => false,
        }
    }

    /// Look up a named field of a map or page value.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Cow<'_, Value>> {
        match self {
            Self::Map(map) => map.get(name).map(Cow::Borrowed),
            Self::Page(page) => page.get(name),
            _ => None,
        }
    }

    /// Plain-text rendering used by templates.
    #[must_use]
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Self::Null => Cow::Borrowed(""),
            Self::Bool(b) => Cow::Owned(b.to_string()),
            Self::Int(i) => Cow::Owned(i.to_string()),
            Self::Float(f) => Cow::Owned(f.to_string()),
            Self::Str(s) | Self::Safe(s) => Cow::Borrowed(s),
            Self::List(items) => Cow::Owned(
                items
                    .iter()
                    .map(|item| item.to_text().into_owned())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            Self::Map(_) => Cow::Borrowed("[map]"),
            Self::Page(page) => Cow::Borrowed(page.name()),
            Self::Helper(helper) => Cow::Borrowed(helper.name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                self.natural_cmp(other) == Ordering::Equal
            }
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Page(a), Self::Page(b)) => Arc::ptr_eq(a, b) || a.name() == b.name(),
            (Self::Helper(a), Self::Helper(b)) => Arc::ptr_eq(&a.func, &b.func),
            _ => match (self.as_str(), other.as_str()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<Arc<Page>> for Value {
    fn from(page: Arc<Page>) -> Self {
        Self::Page(page)
    }
}

impl From<Helper> for Value {
    fn from(helper: Helper) -> Self {
        Self::Helper(helper)
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value as Yaml;

        match value {
            Yaml::Null => Self::Null,
            Yaml::Bool(b) => Self::Bool(b),
            Yaml::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Yaml::String(s) => Self::Str(s),
            Yaml::Sequence(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Yaml::Mapping(mapping) => Self::Map(
                mapping
                    .into_iter()
                    .map(|(key, value)| (yaml_key(key), Self::from(value)))
                    .collect(),
            ),
            Yaml::Tagged(tagged) => Self::from(tagged.value),
        }
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}
