mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "spoofsentry")]
#[command(about = "GPS spoofing simulation and rule-based detection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate labeled train and test datasets
    Generate {
        /// Path to the configuration file (built-in defaults when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory to write train.csv, test.csv and test_labels.csv into
        #[arg(short, long, default_value = "data")]
        out_dir: PathBuf,

        /// Seed overriding the configured one
        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Run the rule detector over an event table
    Detect {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Event table to score
        #[arg(short, long, default_value = "data/test.csv")]
        input: PathBuf,

        /// Directory to write rules_predictions.csv and results.json into
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Score a prediction table against ground-truth labels
    Evaluate {
        #[arg(short, long, default_value = "rules_predictions.csv")]
        predictions: PathBuf,

        #[arg(short, long, default_value = "data/test_labels.csv")]
        labels: PathBuf,

        /// Print the metrics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Explain a sample of the flagged events
    Explain {
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long, default_value = "data/test.csv")]
        input: PathBuf,

        #[arg(short, long, default_value = "results_sample.json")]
        output: PathBuf,

        /// Share of flagged events to explain, overriding the configured one
        #[arg(short, long)]
        fraction: Option<f64>,

        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();

    match args.command {
        Commands::Generate {
            config,
            out_dir,
            seed,
        } => {
            commands::generate(config.as_deref(), &out_dir, seed)?;
        }
        Commands::Detect {
            config,
            input,
            out_dir,
        } => {
            commands::detect(config.as_deref(), &input, &out_dir)?;
        }
        Commands::Evaluate {
            predictions,
            labels,
            json,
        } => {
            commands::evaluate(&predictions, &labels, json)?;
        }
        Commands::Explain {
            config,
            input,
            output,
            fraction,
            seed,
        } => {
            commands::explain(config.as_deref(), &input, &output, fraction, seed).await?;
        }
        Commands::Validate { config } => {
            commands::validate(&config)?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "spoofsentry",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
