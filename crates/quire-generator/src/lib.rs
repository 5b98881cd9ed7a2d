//! Quire Generator Library
//!
//! Selection, tag index and feed rendering engine for Quire.
//!
//! # Modules
//!
//! - [`memo`] - Compute-once storage for derived attributes
//! - [`predicate`] - Page filters
//! - [`selection`] - Filtered, sorted views over the page pool
//! - [`context`] - Layered rendering context and context providers
//! - [`template`] - Template parsing and rendering
//! - [`helpers`] - Text helpers bound into the base context
//! - [`tag_index`] - Per-tag listing pages
//! - [`menu`] - Single-file templated listings
//! - [`feed`] - RSS feed generation
//! - [`collector`] - Content collection
//! - [`build`] - Build orchestration

pub mod build;
pub mod collector;
pub mod context;
pub mod feed;
pub mod helpers;
pub mod memo;
pub mod menu;
pub mod predicate;
pub mod selection;
pub mod tag_index;
pub mod template;

pub use build::{BuildError, BuildStats, Builder};
pub use collector::ContentCollector;
pub use context::{ContextProvider, ContextProviders, ContextStack, Layer};
pub use feed::Feed;
pub use memo::Memo;
pub use menu::Menu;
pub use predicate::{Filter, matches};
pub use selection::{Selection, SortKey};
pub use tag_index::{TagCounts, TagIndex};
pub use template::{Template, TemplateRegistry};
