//! Quire Core Library
//!
//! Core types, configuration, and error handling for the Quire page renderer.

pub mod config;
pub mod error;
pub mod frontmatter;
pub mod page;
pub mod value;

pub use config::Config;
pub use error::{CoreError, Result};
pub use frontmatter::Frontmatter;
pub use page::{Page, PagePool};
pub use value::{Helper, Value};
