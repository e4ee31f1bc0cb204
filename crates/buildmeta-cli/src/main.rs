//! Buildmeta CLI - inspect build metadata from the command line.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Buildmeta - reproducible build metadata
#[derive(Parser, Debug)]
#[command(name = "buildmeta")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the committer date of a ref as RFC 3339
    CommitTime {
        /// Repository URL
        repo: String,
        /// Branch, tag or commit id
        reference: String,
        /// Sandbox base image
        #[arg(long)]
        base_image: Option<String>,
        /// Timeout for the extraction command, in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Do not forward SSH_AUTH_SOCK even if it is set
        #[arg(long)]
        no_agent: bool,
    },

    /// Print the operating-system family of an artifact spec (JSON file)
    Os {
        /// Path to the artifact spec
        spec: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("buildmeta={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Commands::CommitTime {
            repo,
            reference,
            base_image,
            timeout,
            no_agent,
        } => {
            let options = commands::CommitTimeOptions {
                base_image,
                timeout,
                forward_agent: !no_agent,
            };
            commands::commit_time(&repo, &reference, options).await
        }
        Commands::Os { spec } => commands::os(&spec),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
