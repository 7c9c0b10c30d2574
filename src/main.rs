mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use textscape::cancel::CancelFlag;
use textscape::config::TextscapeConfig;
use textscape::projection::OutputFormat;

#[derive(Parser)]
#[command(name = "textscape", version, about = "Embed, project, and cluster free-text records")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Embed a text source and persist the vectors next to it
    Embed {
        /// CSV or line-delimited text file
        source: PathBuf,
        /// Text-bearing column for CSV sources
        #[arg(long, default_value = "body")]
        column: String,
        /// Cap on the number of rows loaded
        #[arg(long)]
        limit: Option<usize>,
        /// Continue from an existing checkpoint instead of restarting
        #[arg(long)]
        resume: bool,
    },
    /// Project a persisted vector collection to 2D with t-SNE
    Project {
        /// NPY vector collection (e.g. train_embeddings.npy)
        input: PathBuf,
        /// Effective neighborhood size; should scale with row count
        #[arg(long)]
        perplexity: Option<f32>,
        /// RNG seed for a reproducible layout
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,
    },
    /// Join projected coordinates with cluster labels into a plot-ready table
    Cluster {
        /// Projected coordinates (tsne_projected.csv or .npy)
        input: PathBuf,
        /// Annotated tabular file with a `cluster` column
        #[arg(long, conflicts_with = "k")]
        clusters_file: Option<PathBuf>,
        /// Compute labels with k-means over the 2D points instead
        #[arg(long)]
        k: Option<usize>,
        /// RNG seed for k-means initialization
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Embed a single query string and print the vector as JSON
    Query { text: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Npy,
    Csv,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Npy => OutputFormat::Npy,
            Format::Csv => OutputFormat::Csv,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = TextscapeConfig::load()?;

    // Initialize tracing with the configured log level. Log to stderr so
    // stdout stays clean for piped output (e.g. `query` JSON).
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Ctrl-C requests cooperative cancellation; long stages check the flag
    // at chunk/iteration boundaries.
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("cancellation requested");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Embed {
            source,
            column,
            limit,
            resume,
        } => {
            cli::embed::run(&config, &source, &column, limit, resume, cancel).await?;
        }
        Command::Project {
            input,
            perplexity,
            seed,
            format,
        } => {
            cli::project::run(&config, &input, perplexity, seed, format.into(), cancel).await?;
        }
        Command::Cluster {
            input,
            clusters_file,
            k,
            seed,
        } => {
            cli::cluster::run(&config, &input, clusters_file.as_deref(), k, seed)?;
        }
        Command::Query { text } => {
            cli::query::run(&config, &text).await?;
        }
    }

    Ok(())
}
