//! Check command - validate configuration, templates and content

use std::path::Path;

use color_eyre::eyre::{Result, bail};
use quire_core::config::SelectionConfig;
use quire_generator::{Builder, Selection};

use super::load_builder;

/// Validation result.
#[derive(Debug, Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Run the check command.
///
/// Validates the configuration, that every listing's template resolves, and
/// that every selection can be evaluated over the collected content.
pub fn run(config_path: &Path, strict: bool) -> Result<()> {
    tracing::info!(?config_path, strict, "Checking configuration and content");

    let mut result = ValidationResult::default();

    println!("Checking configuration...");
    let builder = match load_builder(config_path, false) {
        Ok(builder) => {
            println!("  ✓ Configuration valid");
            Some(builder)
        }
        Err(e) => {
            result.add_error(format!("{e:#}"));
            println!("  ✗ Configuration invalid: {e:#}");
            None
        }
    };

    if let Some(builder) = &builder {
        println!("\nChecking templates...");
        check_templates(builder, &mut result);

        println!("\nChecking content...");
        check_content(builder, &mut result);
    }

    println!();
    println!("Summary:");
    println!("  Errors:   {}", result.errors.len());
    println!("  Warnings: {}", result.warnings.len());

    if result.has_errors() {
        println!();
        println!("Errors:");
        for err in &result.errors {
            println!("  ✗ {err}");
        }
    }

    if result.has_warnings() {
        println!();
        println!("Warnings:");
        for warn in &result.warnings {
            println!("  ⚠ {warn}");
        }
    }

    if result.has_errors() {
        bail!("Validation failed with {} error(s)", result.errors.len());
    }

    if strict && result.has_warnings() {
        bail!(
            "Validation failed with {} warning(s) (strict mode)",
            result.warnings.len()
        );
    }

    println!();
    println!("✓ All checks passed");

    Ok(())
}

fn check_templates(builder: &Builder, result: &mut ValidationResult) {
    if !builder.templates_dir().is_dir() {
        result.add_warning(format!(
            "Templates directory {} does not exist; using built-in templates",
            builder.templates_dir().display()
        ));
    }

    let templates = match builder.load_templates() {
        Ok(templates) => templates,
        Err(e) => {
            result.add_error(e.to_string());
            return;
        }
    };

    let config = builder.config();
    let wanted = config
        .menus
        .iter()
        .map(|m| (m.name.as_str(), m.template.as_str()))
        .chain(
            config
                .tag_indexes
                .iter()
                .map(|t| (t.name.as_str(), t.template.as_str())),
        );

    for (name, template) in wanted {
        if templates.get(template).is_some() {
            println!("  ✓ {name}: {template}");
        } else {
            result.add_error(format!("{name}: template {template:?} not found"));
        }
    }
}

fn check_content(builder: &Builder, result: &mut ValidationResult) {
    if !builder.content_dir().is_dir() {
        result.add_warning(format!(
            "Content directory {} does not exist",
            builder.content_dir().display()
        ));
    }

    let pool = match builder.collect() {
        Ok(pool) => pool,
        Err(e) => {
            result.add_error(e.to_string());
            return;
        }
    };
    println!("  ✓ {} page(s) collected", pool.len());

    let config = builder.config();
    let selections: Vec<(&str, &SelectionConfig)> = config
        .menus
        .iter()
        .map(|m| (m.name.as_str(), &m.selection))
        .chain(config.tag_indexes.iter().map(|t| (t.name.as_str(), &t.selection)))
        .chain(config.feeds.iter().map(|f| (f.name.as_str(), &f.selection)))
        .collect();

    for (name, selection) in selections {
        match Selection::from_config(&pool, selection).pages() {
            Ok([]) if !pool.is_empty() => {
                result.add_warning(format!("{name}: selection matches no pages"));
            }
            Ok(pages) => println!("  ✓ {name}: {} page(s)", pages.len()),
            Err(e) => result.add_error(format!("{name}: {e}")),
        }
    }
}
