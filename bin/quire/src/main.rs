//! Quire CLI
//!
//! Renders menus, tag indexes and feeds from a content directory.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;

/// Command-line interface for Quire.
#[derive(Parser)]
#[command(
    name = "quire",
    version,
    about = "Render tag indexes, menus and feeds for a static site"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "quire.toml")]
    config: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Render every configured menu, tag index and feed
    Build {
        /// Output directory, overriding `build.output_dir`
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Include draft pages
        #[arg(long)]
        drafts: bool,
    },
    /// Print page counts per tag for a tag index
    Tags {
        /// Tag index name as configured (e.g. tags.html)
        index: String,
    },
    /// Validate configuration, templates and content
    Check {
        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    quire::init_tracing(cli.verbose);

    match cli.command {
        Commands::Build { output, drafts } => {
            quire::cmd::build::run(&cli.config, output.as_deref(), drafts)?;
        }
        Commands::Tags { index } => {
            quire::cmd::tags::run(&cli.config, &index)?;
        }
        Commands::Check { strict } => {
            quire::cmd::check::run(&cli.config, strict)?;
        }
    }

    Ok(())
}
