use clap::{Parser, Subcommand};
use tracing::{error, info};

mod config;
mod domain;
mod error;
mod logging;
mod observability;
mod pipeline;
mod source;
mod storage;

use crate::config::Config;
use crate::domain::MonthKey;
use crate::pipeline::clean::clean_month;
use crate::pipeline::extract::WindowedExtractor;
use crate::pipeline::merge::merge_into_store;
use crate::pipeline::month_select::select_month;
use crate::pipeline::orchestrator::PipelineOrchestrator;
use crate::pipeline::sentiment::{sentiment_month, LexiconSentiment};
use crate::pipeline::topics::{topics_for_month, SeedTermFactory};
use crate::source::PlayStoreSource;
use crate::storage::partitions::{latest_month, StagePrefix};
use crate::storage::FsBlobStore;

#[derive(Parser)]
#[command(name = "review_pulse")]
#[command(about = "App store review ingestion and enrichment pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the trailing review window and merge it into the raw partitions
    Extract,
    /// Normalize review text for a month (defaults to the latest raw month)
    Clean {
        /// Month to clean, as YYYY_MM
        #[arg(long)]
        month: Option<String>,
    },
    /// Apply sentiment to a month (defaults to the latest clean month)
    Sentiment {
        /// Month to score, as YYYY_MM
        #[arg(long)]
        month: Option<String>,
    },
    /// Run topic modeling on the best available sentiment month
    Topics,
    /// Run the full pipeline sequentially
    Run,
}

fn parse_month(arg: Option<String>) -> Result<Option<MonthKey>, Box<dyn std::error::Error>> {
    match arg {
        Some(raw) => {
            let month = raw
                .parse::<MonthKey>()
                .map_err(|e| format!("--month: {}", e))?;
            Ok(Some(month))
        }
        None => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    logging::init_logging();
    if let Err(e) = observability::metrics::init() {
        error!("Metrics init failed: {}", e);
    }

    let cli = Cli::parse();
    let cfg = Config::load_from(&cli.config)?;
    let store = FsBlobStore::new(&cfg.storage.data_root)?;

    match cli.command {
        Commands::Extract => {
            println!("🔄 Extracting review window...");
            let source = PlayStoreSource::new(cfg.source.clone())?;
            let extractor = WindowedExtractor::new(&source, &cfg.source, &cfg.extract);
            let now = chrono::Utc::now().with_timezone(&extractor.timezone());

            let rows = extractor.extract(now).await?;
            let summary = merge_into_store(&store, rows).await?;
            println!("\n📊 Extraction results:");
            println!("   Rows written: {}", summary.rows_written);
            println!("   Duplicates collapsed: {}", summary.duplicates_dropped);
            for month in &summary.months {
                println!("   Partition updated: {}", StagePrefix::Raw.key(*month));
            }
        }
        Commands::Clean { month } => {
            let month = match parse_month(month)? {
                Some(m) => m,
                None => latest_month(&store, StagePrefix::Raw).await?,
            };
            println!("🧹 Cleaning partition {}...", month);
            let rows = clean_month(&store, month).await?;
            println!("✅ Cleaned {} rows → {}", rows, StagePrefix::Clean.key(month));
        }
        Commands::Sentiment { month } => {
            let month = match parse_month(month)? {
                Some(m) => m,
                None => latest_month(&store, StagePrefix::Clean).await?,
            };
            println!(
                "🔮 Applying sentiment ({}) to partition {}...",
                cfg.sentiment.model_version, month
            );
            let classifier = LexiconSentiment::new();
            let rows = sentiment_month(&store, month, &classifier).await?;
            println!(
                "✅ Scored {} rows → {}",
                rows,
                StagePrefix::Sentiment.key(month)
            );
        }
        Commands::Topics => {
            println!("🧠 Running topic modeling...");
            let selected = select_month(&store, cfg.topics.min_reviews).await?;
            if !selected.met_threshold {
                println!(
                    "⚠️  No month met the {}-review threshold, using oldest {}",
                    cfg.topics.min_reviews, selected.month
                );
            }
            let report = topics_for_month(
                &store,
                selected.month,
                selected.rows,
                &cfg.topics,
                &SeedTermFactory,
            )
            .await?;
            println!("\n📊 Topic results for {}:", report.month);
            println!("   Total rows: {}", report.total);
            println!("   Short: {}", report.short_docs);
            println!("   Positive: {}", report.pos_docs);
            println!("   Negative: {}", report.neg_docs);
            println!("   Outliers: {}", report.outliers);
        }
        Commands::Run => {
            println!("🟡 Starting pipeline run...");
            let source = PlayStoreSource::new(cfg.source.clone())?;
            let classifier = LexiconSentiment::new();
            let orchestrator =
                PipelineOrchestrator::new(&store, &source, &classifier, &SeedTermFactory, &cfg);

            match orchestrator.run().await {
                Ok(summary) => {
                    info!("Pipeline run finished");
                    println!("\n📊 Pipeline run {}:", summary.run_id);
                    println!("   Extracted: {}", summary.extracted);
                    println!("   Duplicates collapsed: {}", summary.duplicates_dropped);
                    println!(
                        "   Months touched: {}",
                        summary
                            .months
                            .iter()
                            .map(|m| m.to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                    println!("   Cleaned: {}", summary.cleaned);
                    println!("   Sentiment rows: {}", summary.sentiment_rows);
                    println!(
                        "   Topics: {} rows on {} ({} outliers)",
                        summary.topic_rows, summary.topic_month, summary.topic_outliers
                    );
                    println!("✅ Pipeline executed successfully");
                }
                Err(failure) => {
                    error!("Pipeline run failed: {}", failure);
                    println!("❌ Pipeline failed in {} stage: {}", failure.stage, failure.source);
                    return Err(failure.into());
                }
            }
        }
    }

    Ok(())
}
