//! Blockgraph CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "blockgraph")]
#[command(about = "Cached, per-user personalized course block structures", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Project root holding blockgraph.toml and the cache (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and cache the base structure of a course definition
    Build {
        /// JSON course definition
        definition: PathBuf,

        /// Course id (defaults to the file stem)
        #[arg(long)]
        course: Option<String>,
    },
    /// Print the personalized structure for one or more users
    Blocks {
        /// JSON course definition
        definition: PathBuf,

        /// User to personalize for; repeat for several users
        #[arg(short, long = "user", required = true)]
        users: Vec<String>,

        /// Transformer to apply; repeat for several. None applies no transformers
        #[arg(short, long = "transformer")]
        transformers: Vec<String>,

        /// JSON file of recorded selections: {"<user>": {"<type>@<id>": {"selected": [...]}}}
        #[arg(long)]
        state: Option<PathBuf>,

        /// Block to root the structure at, as type@id
        #[arg(long)]
        from: Option<String>,

        /// Course id (defaults to the file stem)
        #[arg(long)]
        course: Option<String>,

        /// Personalize as staff
        #[arg(long)]
        staff: bool,
    },
    /// Clear the structure cache
    Clear,
    /// Show version
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("blockgraph={}", log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Blockgraph v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Project root: {}", cli.root.display());

    match cli.command {
        Commands::Build { definition, course } => commands::build(cli.root, definition, course),
        Commands::Blocks {
            definition,
            users,
            transformers,
            state,
            from,
            course,
            staff,
        } => commands::blocks(
            cli.root,
            commands::BlocksRequest {
                definition,
                users,
                transformers,
                state,
                from,
                course,
                staff,
            },
        ),
        Commands::Clear => commands::clear(cli.root),
        Commands::Version => {
            println!("Blockgraph v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
