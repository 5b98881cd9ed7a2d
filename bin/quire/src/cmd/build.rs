//! Build command - renders every configured output

use std::{path::Path, time::Instant};

use color_eyre::eyre::{Result, WrapErr};
use quire_generator::BuildStats;

use super::load_builder;

/// Run the build command.
///
/// `output` overrides the configured output directory; `drafts` includes
/// pages marked as drafts.
pub fn run(config_path: &Path, output: Option<&Path>, drafts: bool) -> Result<BuildStats> {
    let start = Instant::now();
    tracing::info!(?config_path, ?output, drafts, "Starting build");

    let mut builder = load_builder(config_path, drafts)?;
    if let Some(output) = output {
        builder = builder.with_output_dir(output);
    }

    let stats = builder.build().wrap_err("Build failed")?;
    let duration = start.elapsed();

    println!();
    println!("  Build completed successfully!");
    println!();
    println!("  Pages:      {}", stats.pages);
    println!("  Menus:      {}", stats.menus);
    println!("  Tag pages:  {}", stats.tag_pages);
    println!("  Feeds:      {}", stats.feeds);
    println!();
    println!("  Duration:   {:.2}s", duration.as_secs_f64());
    println!("  Output:     {}", builder.output_dir().display());
    println!();

    tracing::info!(?stats, ?duration, "Build completed successfully");

    Ok(stats)
}
