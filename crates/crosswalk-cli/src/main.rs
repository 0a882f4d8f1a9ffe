mod display;
mod report;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use crosswalk_ai::{ClientConfig, CrosswalkEngine, EngineConfig, OpenAiClient};
use crosswalk_core::{FingerprintStyle, fingerprint};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crosswalk", version, about = "Semantic crosswalk between plan documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compare two documents and write the crosswalk report.
    Compare(CompareArgs),
    /// Print the embedding fingerprint of every item in a document.
    Fingerprint {
        /// Extraction JSON of the document.
        input: PathBuf,
        /// Tag provision fingerprints with type and vendor.
        #[arg(long)]
        tagged: bool,
    },
    /// Print the summary card of a saved comparison.
    Summary {
        /// Comparison JSON written by `compare`.
        input: PathBuf,
    },
}

#[derive(Args)]
struct CompareArgs {
    /// Extraction JSON of the source document.
    #[arg(long)]
    source: PathBuf,
    /// Extraction JSON of the target document.
    #[arg(long)]
    target: PathBuf,
    /// Where to write the comparison JSON.
    #[arg(long, short, default_value = "comparison.json")]
    output: PathBuf,
    /// Also write selected mappings as Parquet.
    #[arg(long)]
    parquet: Option<PathBuf>,
    /// Candidates verified per source item.
    #[arg(long, env = "CROSSWALK_TOP_K", default_value_t = 3)]
    top_k: usize,
    /// Concurrent verification requests.
    #[arg(long, env = "CROSSWALK_WORKERS", default_value_t = 16)]
    workers: usize,
    /// Per-pair verification timeout in seconds.
    #[arg(long, env = "CROSSWALK_TIMEOUT_SECS", default_value_t = 120)]
    timeout_secs: u64,
    /// Tag provision fingerprints with type and vendor.
    #[arg(long)]
    tagged: bool,
    #[command(flatten)]
    client: ClientArgs,
}

#[derive(Args)]
struct ClientArgs {
    /// OpenAI-compatible API base URL.
    #[arg(long, env = "CROSSWALK_BASE_URL", default_value = crosswalk_ai::client::DEFAULT_BASE_URL)]
    base_url: String,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long, env = "LLM_MODEL", default_value = crosswalk_ai::client::DEFAULT_CHAT_MODEL)]
    chat_model: String,
    #[arg(long, env = "EMBEDDING_MODEL", default_value = crosswalk_ai::client::DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,
}

fn style(tagged: bool) -> FingerprintStyle {
    if tagged {
        FingerprintStyle::Tagged
    } else {
        FingerprintStyle::Plain
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Compare(args) => compare(args).await,
        Command::Fingerprint { input, tagged } => {
            let doc = report::read_document(&input)?;
            for item in doc.items() {
                println!("{}\t{}", item.id(), fingerprint(&item, style(tagged)));
            }
            Ok(())
        }
        Command::Summary { input } => {
            let comparison = report::read_comparison(&input)?;
            display::print_comparison_card(&comparison);
            Ok(())
        }
    }
}

async fn compare(args: CompareArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let source = report::read_document(&args.source)?;
    let target = report::read_document(&args.target)?;

    let config = EngineConfig {
        top_k: args.top_k,
        max_workers: args.workers,
        verify_timeout: Duration::from_secs(args.timeout_secs),
        fingerprint_style: style(args.tagged),
    };
    let client = Arc::new(OpenAiClient::new(ClientConfig {
        base_url: args.client.base_url,
        api_key: args.client.api_key,
        chat_model: args.client.chat_model,
        embedding_model: args.client.embedding_model,
    }));
    let engine = CrosswalkEngine::new(config, client.clone(), client)?;

    let comparison = engine
        .compare(&source, &target)
        .await
        .context("running comparison")?;

    report::write_comparison_json(&args.output, &comparison)?;
    info!(path = %args.output.display(), "wrote comparison");
    if let Some(path) = &args.parquet {
        let rows = report::write_mappings_parquet(path, &comparison.mappings)?;
        info!(path = %path.display(), rows, "wrote mapping parquet");
    }

    display::print_comparison_card(&comparison);
    info!(elapsed_secs = start.elapsed().as_secs_f64(), "done");
    Ok(())
}
