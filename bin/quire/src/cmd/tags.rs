//! Tags command - prints page counts per tag

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use quire_generator::TagCounts;

use super::load_builder;

/// Run the tags command.
///
/// Prints `tag<TAB>count` lines in first-seen order.
pub fn run(config_path: &Path, index: &str) -> Result<TagCounts> {
    tracing::info!(?config_path, index, "Counting tags");

    let builder = load_builder(config_path, false)?;
    let counts = builder
        .tag_counts(index)
        .wrap_err_with(|| format!("Failed to count tags for {index}"))?;

    for (tag, count) in counts.iter() {
        println!("{tag}\t{count}");
    }
    tracing::info!(tags = counts.len(), pages = counts.total(), "Counted tags");

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn site() -> TempDir {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("content")).unwrap();
        fs::write(
            root.path().join("quire.toml"),
            r#"
[site]
title = "Test"
base_url = "https://example.com"

[[tag_indexes]]
name = "tags.html"
exclude_tags = ["meta"]
"#,
        )
        .unwrap();
        for (name, tags) in [("a", "[foo, bar, meta]"), ("b", "[foo]"), ("c", "[bar]")] {
            fs::write(
                root.path().join(format!("content/{name}.md")),
                format!("---\ntags: {tags}\n---\n"),
            )
            .unwrap();
        }
        root
    }

    #[test]
    fn test_tags_counts() {
        let root = site();
        let counts = run(&root.path().join("quire.toml"), "tags.html").unwrap();
        assert_eq!(counts.iter().collect::<Vec<_>>(), [("foo", 2), ("bar", 2)]);
    }

    #[test]
    fn test_tags_unknown_index() {
        let root = site();
        let err = run(&root.path().join("quire.toml"), "topics.html").unwrap_err();
        assert!(err.to_string().contains("topics.html"));
    }
}
