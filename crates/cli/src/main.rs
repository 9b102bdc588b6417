//! Keyward CLI — the main entry point.
//!
//! Commands:
//! - `init`    — Create the config directory, default config and vault key
//! - `secret`  — Store, read, remove and list encrypted tokens
//! - `path`    — Check where a relative path resolves under the base dir
//! - `file`    — Read a file through the path guard
//! - `fetch`   — GET a URL through the rate-limited transport
//! - `status`  — Show configuration and vault state

use clap::{Parser, Subcommand};

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(
    name = "keyward",
    about = "Keyward — guarded files, encrypted tokens and rate-limited HTTP",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and the vault key
    Init {
        /// Overwrite an existing config.toml with the defaults
        #[arg(long)]
        force: bool,
    },

    /// Manage encrypted tokens
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },

    /// Inspect path resolution
    Path {
        #[command(subcommand)]
        action: PathAction,
    },

    /// Guarded file access
    File {
        #[command(subcommand)]
        action: FileAction,
    },

    /// Fetch a URL through the rate limiter for an integration
    Fetch {
        /// Integration name (rate-limit key and vault token name)
        target: String,

        /// URL to GET
        url: String,

        /// Send the request this many times in a row
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },

    /// Show system status
    Status,
}

#[derive(Subcommand)]
enum SecretAction {
    /// Store a token (read from stdin when --value is omitted)
    Set {
        name: String,
        #[arg(long)]
        value: Option<String>,
    },
    /// Print a decrypted token
    Get { name: String },
    /// Remove a token
    Rm { name: String },
    /// List stored token names
    List,
}

#[derive(Subcommand)]
enum PathAction {
    /// Print the absolute path a relative path resolves to
    Check { path: String },
}

#[derive(Subcommand)]
enum FileAction {
    /// Print a file under the base directory
    Cat { path: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::load()?;

    match cli.command {
        Commands::Init { force } => commands::init::run(&ctx, force).await?,
        Commands::Secret { action } => match action {
            SecretAction::Set { name, value } => {
                let value = match value {
                    Some(v) => v,
                    None => commands::secret::read_value_from_stdin()?,
                };
                commands::secret::set(&ctx, &name, &value).await?
            }
            SecretAction::Get { name } => commands::secret::get(&ctx, &name).await?,
            SecretAction::Rm { name } => commands::secret::remove(&ctx, &name).await?,
            SecretAction::List => commands::secret::list(&ctx).await?,
        },
        Commands::Path { action } => match action {
            PathAction::Check { path } => commands::path::check(&ctx, &path).await?,
        },
        Commands::File { action } => match action {
            FileAction::Cat { path } => commands::file::cat(&ctx, &path).await?,
        },
        Commands::Fetch { target, url, count } => {
            commands::fetch::run(&ctx, &target, &url, count).await?
        }
        Commands::Status => commands::status::run(&ctx).await?,
    }

    Ok(())
}
