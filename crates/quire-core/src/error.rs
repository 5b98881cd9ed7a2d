//! Errors raised while loading a site: reading `quire.toml` and parsing page
//! headers.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Failure to load site configuration or page metadata.
#[derive(Error, Debug)]
pub enum CoreError {
    /// `quire.toml` is unreadable or fails validation.
    #[error("invalid site config: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A content file has a malformed `---`/`+++` header.
    #[error("bad page header in {path}: {message}")]
    Frontmatter { path: PathBuf, message: String },

    #[error("cannot read site file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed quire.toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("malformed YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// File plus `QUIRE__*` environment overlay could not be merged.
    #[error("cannot merge config layers: {0}")]
    Layered(#[from] config::ConfigError),
}

impl CoreError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Config error that keeps the underlying cause reachable via `source()`.
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Header error for the content file at `path`.
    pub fn frontmatter(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Frontmatter {
            path: path.into(),
            message: message.into(),
        }
    }
}
