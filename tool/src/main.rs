#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used
)]
#![allow(clippy::print_stdout)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use sc_link_tool::commands::{self, FieldArgs, DEFAULT_VERSION};
use sc_link_tool::config::Config;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// sc-link - encode, decode and verify sigchain outer links
#[derive(Parser, Debug)]
#[command(name = "sc-link")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a YAML configuration file (default: sc-link.yaml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, overriding logging.level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encode a link under the configured feature gates; prints base64url
    Encode {
        /// User or team whose chain is being extended
        #[arg(long, default_value = "default")]
        subject: String,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Decode a base64url link and print it as JSON
    Decode {
        /// The encoded link
        link: String,
    },

    /// Decode a link and check it against expected fields
    Verify {
        /// The encoded link
        link: String,

        /// Expected outer format version
        #[arg(long, default_value_t = DEFAULT_VERSION)]
        version: u64,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Check that a run of links chains together
    CheckChain {
        /// Encoded links, oldest first
        links: Vec<String>,

        /// Read links from a file instead, one per line
        #[arg(long, conflicts_with = "links")]
        file: Option<PathBuf>,
    },
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Load and validate configuration first (fail-fast)
    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    // Logs go to stderr so stdout stays machine-readable
    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let filter =
        EnvFilter::try_new(level).with_context(|| format!("invalid log filter '{level}'"))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Encode { subject, fields } => {
            let encoded = commands::encode(&config.features, &subject, &fields)?;
            println!("{encoded}");
        }
        Commands::Decode { link } => {
            let view = commands::decode(&link)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&view).context("rendering link as JSON")?
            );
        }
        Commands::Verify {
            link,
            version,
            fields,
        } => {
            let view = commands::verify(&link, version, &fields)?;
            println!("ok: link {} ({})", view.seqno, view.link_id);
        }
        Commands::CheckChain { links, file } => {
            let links = match file {
                Some(path) => commands::read_links(&path)?,
                None => links,
            };
            let count = commands::check_links(&links)?;
            println!("ok: {count} links");
        }
    }

    Ok(())
}
