use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use takc::rate::{CompressionRate, QueryComplexity};
use takc::server::DEFAULT_PORT;
use takc::telemetry::{LOG_FILE_ENV, TracingOptions, init_tracing};

mod cmd;

#[derive(Parser)]
#[command(name = "takc")]
#[command(version, about = "Task-aware knowledge compression with multi-rate caching")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compress a context file and store it in the cache
    Compress {
        #[arg(long)]
        task_type: String,

        /// File holding the context to compress
        #[arg(long)]
        context_file: PathBuf,

        /// Rates to build (comma-separated). One rate runs single-rate mode; none builds all four
        #[arg(long, value_delimiter = ',')]
        rate: Vec<CompressionRate>,

        #[arg(long)]
        task_description: Option<String>,

        #[arg(long)]
        few_shot_examples: Option<String>,

        /// Model identifier or catalog name (see `takc models`)
        #[arg(long)]
        model_id: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Answer a query from the compressed cache
    Query {
        #[arg(long)]
        task_type: String,

        #[arg(short, long)]
        query: String,

        /// Rate to read; picked from the query when omitted
        #[arg(long)]
        rate: Option<CompressionRate>,

        #[arg(long)]
        json: bool,
    },
    /// Recommend a compression rate for a workload
    Recommend {
        #[arg(long)]
        task_type: String,

        /// Workload size in words
        #[arg(long)]
        data_size: usize,

        #[arg(long, default_value = "moderate")]
        complexity: QueryComplexity,
    },
    /// Chunk a document into the store, optionally compressing it right away
    Ingest {
        #[arg(long)]
        task_type: String,

        /// Document to ingest
        #[arg(long)]
        source: PathBuf,

        #[arg(long)]
        chunk_size: Option<usize>,

        #[arg(long)]
        overlap: Option<usize>,

        /// Preprocessing steps (repeatable): clean_whitespace, remove_special_chars, lowercase
        #[arg(long = "step")]
        steps: Vec<String>,

        /// Build the multi-rate cache from the stored chunks
        #[arg(long)]
        compress: bool,
    },
    /// List supported models, optionally probing access
    Models {
        /// Send a short probe to each model
        #[arg(long)]
        test: bool,
    },
    /// Serve the HTTP query API
    Serve {
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Enable dev mode (bind 0.0.0.0, permissive CORS)
        #[arg(long)]
        dev: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default takc.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingOptions {
        verbose: cli.verbose,
        json: cli.log_json,
        log_file: std::env::var_os(LOG_FILE_ENV).map(PathBuf::from),
    });

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Compress {
            task_type,
            context_file,
            rate,
            task_description,
            few_shot_examples,
            model_id,
            json,
        } => {
            let config = cmd::load_config(&project_dir)?;
            cmd::cmd_compress(
                &config,
                &cmd::CompressArgs {
                    task_type,
                    context_file,
                    rates: rate,
                    task_description: task_description.as_deref(),
                    few_shot_examples: few_shot_examples.as_deref(),
                    model_id: model_id.as_deref(),
                    json: *json,
                },
            )
            .await?;
        }
        Commands::Query {
            task_type,
            query,
            rate,
            json,
        } => {
            let config = cmd::load_config(&project_dir)?;
            cmd::cmd_query(&config, task_type, query, *rate, *json).await?;
        }
        Commands::Recommend {
            task_type,
            data_size,
            complexity,
        } => cmd::cmd_recommend(task_type, *data_size, *complexity),
        Commands::Ingest {
            task_type,
            source,
            chunk_size,
            overlap,
            steps,
            compress,
        } => {
            let config = cmd::load_config(&project_dir)?;
            cmd::cmd_ingest(
                &config,
                &cmd::IngestArgs {
                    task_type,
                    source,
                    chunk_size: *chunk_size,
                    overlap: *overlap,
                    steps,
                    compress: *compress,
                },
            )
            .await?;
        }
        Commands::Models { test } => {
            let config = cmd::load_config(&project_dir)?;
            cmd::cmd_models(&config, *test).await?;
        }
        Commands::Serve { port, dev } => {
            let config = cmd::load_config(&project_dir)?;
            cmd::cmd_serve(&config, *port, *dev).await?;
        }
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
