//! catalogd: mirrors a service-discovery catalog into local hosts, gateway,
//! and DNS artifacts.
//!
//! # Quick start
//!
//! ```bash
//! # Show the effective configuration after merging defaults, config files,
//! # and environment overrides.
//! catalogd config dump
//!
//! # Run the agent until a shutdown signal arrives.
//! catalogd run
//! ```

mod commands;
mod fatal;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "catalogd")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the watch/coalesce/dispatch agent until a shutdown signal arrives.
    Run {
        /// Directory to load `catalogd.toml` / `catalogd.local.toml` from.
        #[arg(long, default_value = ".")]
        project: String,
    },

    /// Configuration inspection commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration after merging every source.
    Dump {
        /// Directory to load `catalogd.toml` / `catalogd.local.toml` from.
        #[arg(long, default_value = ".")]
        project: String,

        /// Output format.
        #[arg(long, default_value = "toml")]
        format: String,
    },

    /// Print a description of every configuration field.
    Schema {
        /// Output format.
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { project } => commands::run::run(&project),
        Commands::Config(ConfigCommands::Dump { project, format }) => {
            commands::config::dump(&project, &format)
        }
        Commands::Config(ConfigCommands::Schema { format }) => commands::config::schema(&format),
    }
}
