use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nepi_core::{Config, IntakeError, LoadedFile, StrategyChoice};
use nepi_ingest::{Pipeline, RemoteFetcher, SourceHints, load_path};
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

/// NEPI document intake - pull meter identifiers and consumption figures out of bills
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract key information from a local file or a URL
    Extract {
        /// Path to a PDF, CSV or text file, or an http(s) URL
        source: String,

        /// Override the declared media type
        #[arg(long)]
        content_type: Option<String>,

        /// Fact extraction strategy: auto, heuristic or delegated
        #[arg(long)]
        strategy: Option<StrategyChoice>,

        /// Print the raw JSON response instead of a summary
        #[arg(long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Write output to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Extract {
            source,
            content_type,
            strategy,
            json,
            no_color,
            output,
        } => extract(source, content_type, strategy, json, no_color, output).await,
    }
}

async fn extract(
    source: String,
    content_type: Option<String>,
    strategy: Option<StrategyChoice>,
    json: bool,
    no_color: bool,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(strategy) = strategy {
        config.strategy = strategy;
    }

    let color = ColorMode(!no_color && output.is_none());
    let mut writer: Box<dyn Write> = if let Some(ref output_path) = output {
        Box::new(std::fs::File::create(output_path)?)
    } else {
        Box::new(std::io::stdout())
    };

    let client = reqwest::Client::new();
    let pipeline = Pipeline::from_config(&config, client.clone())?;

    let result = match load(&source, content_type, &config, client).await {
        Ok(file) => pipeline.process(file).await,
        Err(e) => Err(e),
    };
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(error = %e, "extraction failed");
            nepi_ingest::failure(&e)
        }
    };

    if json {
        serde_json::to_writer_pretty(&mut writer, &response)?;
        writeln!(writer)?;
    } else {
        output::print_summary(&mut writer, &response, color)?;
    }
    writer.flush()?;

    if !response.ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn load(
    source: &str,
    content_type: Option<String>,
    config: &Config,
    client: reqwest::Client,
) -> Result<LoadedFile, IntakeError> {
    if is_url(source) {
        let hints = SourceHints {
            name: None,
            content_type,
        };
        RemoteFetcher::from_config(config, client).fetch(source, hints).await
    } else {
        load_path(std::path::Path::new(source), content_type)
    }
}

fn is_url(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
