use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use caselens::anonymize::verify_documents;
use caselens::config::Config;
use caselens::dataset::{ingest_current_study, DatasetBuilder};
use caselens::frames::{list_frame_files, DicomStudy};
use caselens::models::CollectionHits;
use caselens::services::DEFAULT_KS;
use caselens::CaseLensContext;

#[derive(Parser)]
#[command(name = "caselens")]
#[command(about = "Similar-case retrieval and evidence assembly for imaging review")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the anonymized dataset from the labelled study tree
    BuildDataset,
    /// Sample frames from one study into the current-study area
    ExtractFrames {
        #[arg(long)]
        dicom: PathBuf,
        /// Defaults to the configured current frames directory
        #[arg(long)]
        out: Option<PathBuf>,
        /// Frames to sample; defaults to QUERY_FRAMES (12)
        #[arg(long)]
        n: Option<usize>,
    },
    /// Index collections that are not populated yet
    Index,
    /// Drop and rebuild both collections
    Reset,
    /// Show raw retrieval results for a query
    Search {
        #[arg(long)]
        query: String,
        /// Overrides both top-k settings
        #[arg(long)]
        k: Option<usize>,
    },
    /// Review a report, printing the JSON result
    Analyze {
        /// Report file, or `-` for stdin
        #[arg(long)]
        report: String,
        /// Directory with frames of the study under review
        #[arg(long)]
        frames: Option<PathBuf>,
    },
    /// Re-check the document store for identifying data
    VerifyAnonymization,
    /// Hit@k and MRR of case retrieval against labels.csv
    Evaluate,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "caselens=info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn read_report(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    Ok(std::fs::read_to_string(source)?)
}

fn hits_json(hits: &CollectionHits) -> serde_json::Value {
    match hits {
        CollectionHits::Hits(hits) => json!({ "hits": hits }),
        CollectionHits::Unavailable { reason } => json!({ "unavailable": reason }),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env();

    match args.command {
        Command::BuildDataset => {
            let report =
                DatasetBuilder::new(config.data.clone(), config.indexing.frames_per_case).build()?;
            tracing::info!(
                cases = report.cases,
                frame_documents = report.frame_documents,
                skipped = report.skipped.len(),
                "Dataset built"
            );
            for skipped in &report.skipped {
                tracing::warn!(file = %skipped.file, reason = %skipped.reason, "Study skipped");
            }
        }
        Command::ExtractFrames { dicom, out, n } => {
            let study = DicomStudy::open(&dicom)?;
            let out = out.unwrap_or_else(|| config.data.current_frames_dir());
            let n = n.unwrap_or(config.sampling.query_frames);
            let result = ingest_current_study(&study, &out, n)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::VerifyAnonymization => {
            let report = verify_documents(&config.data.documents_path())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_clean() {
                anyhow::bail!(
                    "{} of {} documents failed anonymization checks",
                    report.violations.len(),
                    report.checked
                );
            }
        }
        command => {
            let context = CaseLensContext::init(config).await?;
            let outcome = run_with_context(&context, command).await;
            context.shutdown().await?;
            outcome?;
        }
    }

    Ok(())
}

async fn run_with_context(context: &CaseLensContext, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Index => {
            let report = context.indexer().index_all().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Reset => {
            let report = context.indexer().reset().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Search { query, k } => {
            context.indexer().index_all().await?;
            let retrieval = &context.config.retrieval;
            let k_cases = k.unwrap_or(retrieval.top_k_cases);
            let k_guidelines = k.unwrap_or(retrieval.top_k_guidelines);
            let outcome = context
                .retrieval()
                .retrieve(&query, k_cases, k_guidelines)
                .await?;
            let output = json!({
                "cases": hits_json(&outcome.cases),
                "guidelines": hits_json(&outcome.guidelines),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Analyze { report, frames } => {
            let report = read_report(&report)?;
            context.indexer().index_all().await?;
            let frames = frames
                .map(|dir| list_frame_files(&dir))
                .unwrap_or_default();
            let result = context.analysis().analyze(&report, &frames).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Evaluate => {
            context.indexer().index_all().await?;
            let report = context.evaluate(DEFAULT_KS).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::BuildDataset | Command::ExtractFrames { .. } | Command::VerifyAnonymization => {
            anyhow::bail!("command does not use the indexed collections")
        }
    }
    Ok(())
}
