//! HTML template system for page generation.
//!
//! A deliberately small template language rendered against a
//! [`ContextStack`]:
//!
//! - `{{ path }}` prints a variable, HTML-escaped unless it is marked safe.
//!   Dotted paths reach into maps and pages (`{{ page.title }}`).
//! - `{{ path? }}` prints nothing when the variable is missing.
//! - `{{ helper arg ... }}` calls a helper bound in the context. Arguments
//!   are paths, integers or double-quoted strings.
//! - `{% for item in path %}...{% endfor %}` iterates a list.
//! - `{% if path %}...{% else %}...{% endif %}` tests truthiness.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use quire_core::Value;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::{
    context::{ContextStack, Layer},
    helpers::escape_html,
};

/// Template rendering errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Missing required variable.
    #[error("missing required variable: {0}")]
    MissingVariable(String),

    /// Template not found.
    #[error("template not found: {0}")]
    NotFound(String),

    /// Invalid template syntax.
    #[error("invalid template syntax in {template}: {message}")]
    InvalidSyntax { template: String, message: String },

    /// A value had the wrong kind for where it was used.
    #[error("{path}: expected {expected}, found {found}")]
    Type {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A helper call failed.
    #[error("helper {name} failed: {message}")]
    Helper { name: String, message: String },

    /// Template file could not be read.
    #[error("failed to load template {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Int(i64),
    Str(String),
    Path(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Expr {
    head: String,
    args: Vec<Arg>,
    optional: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Output(Expr),
    For {
        var: String,
        iterable: String,
        body: Vec<Node>,
    },
    If {
        cond: String,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

enum Frame {
    For {
        var: String,
        iterable: String,
        body: Vec<Node>,
    },
    If {
        cond: String,
        then: Vec<Node>,
        otherwise: Vec<Node>,
        in_else: bool,
    },
}

impl Frame {
    fn sink(&mut self) -> &mut Vec<Node> {
        match self {
            Self::For { body, .. } => body,
            Self::If {
                then,
                otherwise,
                in_else,
                ..
            } => {
                if *in_else {
                    otherwise
                } else {
                    then
                }
            }
        }
    }
}

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parse a template with the given name and content.
    pub fn parse(name: impl Into<String>, content: &str) -> Result<Self> {
        let name = name.into();
        let nodes = Parser::new(&name).parse(content)?;
        Ok(Self { name, nodes })
    }

    /// Get the template name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render the template against a context.
    pub fn render(&self, context: &ContextStack) -> Result<String> {
        let mut out = String::new();
        render_nodes(&self.nodes, context, &mut out)?;
        Ok(out)
    }
}

struct Parser<'a> {
    template: &'a str,
    root: Vec<Node>,
    stack: Vec<Frame>,
}

impl<'a> Parser<'a> {
    fn new(template: &'a str) -> Self {
        Self {
            template,
            root: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::InvalidSyntax {
            template: self.template.to_string(),
            message: message.into(),
        }
    }

    fn sink(&mut self) -> &mut Vec<Node> {
        match self.stack.last_mut() {
            Some(frame) => frame.sink(),
            None => &mut self.root,
        }
    }

    fn parse(mut self, content: &str) -> Result<Vec<Node>> {
        let mut rest = content;

        while let Some(start) = rest.find("{{").into_iter().chain(rest.find("{%")).min() {
            if start > 0 {
                self.sink().push(Node::Text(rest[..start].to_string()));
            }
            let is_output = rest[start..].starts_with("{{");
            let close = if is_output { "}}" } else { "%}" };
            let inner_start = start + 2;
            let end = rest[inner_start..]
                .find(close)
                .ok_or_else(|| {
                    self.error(format!("unclosed {} delimiter", &rest[start..inner_start]))
                })?;
            let inner = rest[inner_start..inner_start + end].trim();

            if is_output {
                let expr = self.parse_expr(inner)?;
                self.sink().push(Node::Output(expr));
            } else {
                self.parse_tag(inner)?;
            }
            rest = &rest[inner_start + end + close.len()..];
        }

        if !rest.is_empty() {
            self.sink().push(Node::Text(rest.to_string()));
        }

        match self.stack.last() {
            Some(Frame::For { .. }) => Err(self.error("missing {% endfor %}")),
            Some(Frame::If { .. }) => Err(self.error("missing {% endif %}")),
            None => Ok(self.root),
        }
    }

    fn parse_expr(&self, inner: &str) -> Result<Expr> {
        let mut tokens = tokenize(inner).map_err(|m| self.error(m))?.into_iter();
        let head = tokens.next().ok_or_else(|| self.error("empty expression"))?;
        let optional = head.ends_with('?');
        let head = if optional {
            head[..head.len() - 1].to_string()
        } else {
            head
        };
        if head.starts_with('"') || head.parse::<i64>().is_ok() {
            return Err(self.error(format!("expression must start with a name: {head}")));
        }

        let args = tokens
            .map(|token| {
                if token.starts_with('"') {
                    Arg::Str(token[1..token.len() - 1].to_string())
                } else if let Ok(n) = token.parse::<i64>() {
                    Arg::Int(n)
                } else {
                    Arg::Path(token)
                }
            })
            .collect();

        Ok(Expr {
            head,
            args,
            optional,
        })
    }

    fn parse_tag(&mut self, inner: &str) -> Result<()> {
        let words: Vec<&str> = inner.split_whitespace().collect();
        match words.as_slice() {
            ["for", var, "in", iterable] => {
                self.stack.push(Frame::For {
                    var: (*var).to_string(),
                    iterable: (*iterable).to_string(),
                    body: Vec::new(),
                });
            }
            ["if", cond] => {
                self.stack.push(Frame::If {
                    cond: (*cond).to_string(),
                    then: Vec::new(),
                    otherwise: Vec::new(),
                    in_else: false,
                });
            }
            ["else"] => {
                if !matches!(self.stack.last(), Some(Frame::If { in_else: false, .. })) {
                    return Err(self.error("{% else %} outside of {% if %}"));
                }
                if let Some(Frame::If { in_else, .. }) = self.stack.last_mut() {
                    *in_else = true;
                }
            }
            ["endfor"] => match self.stack.pop() {
                Some(Frame::For {
                    var,
                    iterable,
                    body,
                }) => self.sink().push(Node::For {
                    var,
                    iterable,
                    body,
                }),
                _ => return Err(self.error("unexpected {% endfor %}")),
            },
            ["endif"] => match self.stack.pop() {
                Some(Frame::If {
                    cond,
                    then,
                    otherwise,
                    ..
                }) => self.sink().push(Node::If {
                    cond,
                    then,
                    otherwise,
                }),
                _ => return Err(self.error("unexpected {% endif %}")),
            },
            _ => return Err(self.error(format!("unknown tag: {{% {inner} %}}"))),
        }
        Ok(())
    }
}

/// Split an expression on whitespace, keeping double-quoted strings whole.
fn tokenize(input: &str) -> std::result::Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' {
            chars.next();
            let mut token = String::from('"');
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some(ch) => token.push(ch),
                    None => return Err("unterminated string literal".to_string()),
                }
            }
            token.push('"');
            tokens.push(token);
        } else {
            let mut token = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                token.push(ch);
                chars.next();
            }
            tokens.push(token);
        }
    }

    Ok(tokens)
}

fn render_nodes(nodes: &[Node], context: &ContextStack, out: &mut String) -> Result<()> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Output(expr) => write_value(&eval(expr, context)?, out),
            Node::For {
                var,
                iterable,
                body,
            } => {
                let Some(value) = context.resolve_path(iterable) else {
                    return Err(TemplateError::MissingVariable(iterable.clone()));
                };
                let items = match &*value {
                    Value::Null => &[][..],
                    Value::List(items) => items.as_slice(),
                    other => {
                        return Err(TemplateError::Type {
                            path: iterable.clone(),
                            expected: "list",
                            found: other.kind(),
                        });
                    }
                };
                for item in items {
                    let scope = context.with_layer(Layer::new().with(var.clone(), item.clone()));
                    render_nodes(body, &scope, out)?;
                }
            }
            Node::If {
                cond,
                then,
                otherwise,
            } => {
                let truthy = context
                    .resolve_path(cond)
                    .is_some_and(|value| value.is_truthy());
                render_nodes(if truthy { then } else { otherwise }, context, out)?;
            }
        }
    }
    Ok(())
}

fn eval(expr: &Expr, context: &ContextStack) -> Result<Value> {
    let Some(head) = context.resolve_path(&expr.head) else {
        if expr.optional {
            return Ok(Value::Null);
        }
        return Err(TemplateError::MissingVariable(expr.head.clone()));
    };

    if let Value::Helper(helper) = &*head {
        let args = expr
            .args
            .iter()
            .map(|arg| match arg {
                Arg::Int(n) => Ok(Value::Int(*n)),
                Arg::Str(s) => Ok(Value::Str(s.clone())),
                Arg::Path(path) => context
                    .resolve_path(path)
                    .map(|v| v.into_owned())
                    .ok_or_else(|| TemplateError::MissingVariable(path.clone())),
            })
            .collect::<Result<Vec<_>>>()?;
        return helper.call(&args).map_err(|message| TemplateError::Helper {
            name: helper.name().to_string(),
            message,
        });
    }

    if !expr.args.is_empty() {
        return Err(TemplateError::Type {
            path: expr.head.clone(),
            expected: "helper",
            found: head.kind(),
        });
    }
    Ok(head.into_owned())
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Safe(html) => out.push_str(html),
        other => out.push_str(&escape_html(&other.to_text())),
    }
}

/// Registry of templates.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: HashMap<String, Template>,
    extension: String,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self {
            templates: HashMap::new(),
            extension: "html".to_string(),
        }
    }
}

impl TemplateRegistry {
    /// Create a new registry with default templates.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register_defaults();
        registry
    }

    /// Register default built-in templates.
    fn register_defaults(&mut self) {
        for (name, content) in [
            ("menu.html", DEFAULT_MENU_TEMPLATE),
            ("tag.html", DEFAULT_TAG_TEMPLATE),
        ] {
            match Template::parse(name, content) {
                Ok(template) => self.register(template),
                Err(e) => tracing::error!(template = name, error = %e, "invalid built-in template"),
            }
        }
    }

    /// Set the extension of rendered output files.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Extension of rendered output files, without the dot.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Register a template, replacing any with the same name.
    pub fn register(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), template);
    }

    /// Parse and register a template from a string.
    pub fn register_str(&mut self, name: impl Into<String>, content: &str) -> Result<()> {
        self.register(Template::parse(name, content)?);
        Ok(())
    }

    /// Load every file under `dir`, named by its `/`-separated relative path.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        if !dir.exists() {
            debug!(dir = %dir.display(), "no template directory");
            return Ok(0);
        }

        let mut count = 0;
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| TemplateError::Load {
                path: e.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let name = path
                .strip_prefix(dir)
                .unwrap_or(path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let content = fs::read_to_string(path).map_err(|source| TemplateError::Load {
                path: path.to_path_buf(),
                source,
            })?;

            self.register(Template::parse(name.clone(), &content)?);
            debug!(template = %name, "loaded template");
            count += 1;
        }

        Ok(count)
    }

    /// Get a template by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// Get a template by name, failing if it is not registered.
    pub fn resolve(&self, name: &str) -> Result<&Template> {
        self.get(name)
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))
    }

    /// Render a named template with the given context.
    pub fn render(&self, name: &str, context: &ContextStack) -> Result<String> {
        self.resolve(name)?.render(context)
    }

    /// Registered template names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Default listing template.
pub const DEFAULT_MENU_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{{ site.title? }}</title>
</head>
<body>
    <ul>
{% for page in pages %}        <li><a href="/{{ page.output_filename }}">{% if page.title %}{{ page.title }}{% else %}{{ page.name }}{% endif %}</a></li>
{% endfor %}    </ul>
</body>
</html>
"#;

/// Default per-tag template.
pub const DEFAULT_TAG_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{{ tag }} | {{ site.title? }}</title>
</head>
<body>
    <h1>Tagged: {{ tag }}</h1>
    <ul>
{% for page in pages %}        <li><a href="/{{ page.output_filename }}">{% if page.title %}{{ page.title }}{% else %}{{ page.name }}{% endif %}</a></li>
{% endfor %}    </ul>
</body>
</html>
"#;
