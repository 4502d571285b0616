//! Eco-Sorter command line
//!
//! Run with: cargo run -p eco-sorter --features cli --bin eco-sorter -- <command>

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eco_sorter::config::EcoConfig;
use eco_sorter::ingestion::{collect_guides, DocumentRegistry, GuideIndexer, IngestPipeline};
use eco_sorter::providers::{embedding_from_config, SqliteVectorStore, VectorStoreProvider};
use eco_sorter::region::{Region, RegionInfo};
use eco_sorter::server::state::AppState;
use eco_sorter::vision::{WasteClassifier, YoloClassifier};

#[derive(Parser)]
#[command(name = "eco-sorter", version, about = "Assistant de tri des déchets par région")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a guide, or every supported guide in a directory
    Ingest {
        path: PathBuf,
        /// Region tag or label, e.g. `bruxelles` or `Brabant Wallon`
        #[arg(long, short)]
        region: Region,
    },
    /// Ask a sorting question
    Ask {
        question: String,
        #[arg(long, short, default_value = "bruxelles")]
        region: Region,
    },
    /// Classify a photo and print the follow-up question
    Classify { image: PathBuf },
    /// List regions and their indexed chunk counts
    Regions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eco_sorter=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = EcoConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Ingest { path, region } => ingest(&config, &path, region).await,
        Command::Ask { question, region } => ask(config, &question, region).await,
        Command::Classify { image } => classify(&config, &image).await,
        Command::Regions => regions(&config).await,
    }
}

/// Bare file names are looked up in the configured documents directory
fn resolve_guide_path(config: &EcoConfig, path: &Path) -> PathBuf {
    if path.exists() || path.is_absolute() {
        return path.to_path_buf();
    }
    let candidate = config.documents.documents_dir.join(path);
    if candidate.exists() {
        candidate
    } else {
        path.to_path_buf()
    }
}

fn open_store(config: &EcoConfig) -> anyhow::Result<Arc<SqliteVectorStore>> {
    std::fs::create_dir_all(config.storage_dir())?;
    Ok(Arc::new(SqliteVectorStore::open(&config.vector_db.storage_path)?))
}

async fn ingest(config: &EcoConfig, path: &Path, region: Region) -> anyhow::Result<()> {
    let path = resolve_guide_path(config, path);
    let files = collect_guides(&path);
    if files.is_empty() {
        bail!("No supported guides (pdf, txt, md) found at {}", path.display());
    }

    let indexer = GuideIndexer::new(
        IngestPipeline::new(config.chunking.chunk_size, config.chunking.chunk_overlap),
        embedding_from_config(config).await?,
        open_store(config)?,
        Arc::new(DocumentRegistry::open(config.storage_dir().join("documents.json"))),
        config.embeddings.batch_size,
    );

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let mut total_chunks = 0u32;
    let mut failures = 0usize;

    for file in &files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        progress.set_message(name.clone());

        match indexer.ingest_path(file, region).await {
            Ok(outcome) if outcome.is_skipped() => {
                progress.println(format!("{} {} (déjà indexé)", style("=").dim(), name));
            }
            Ok(outcome) => {
                total_chunks += outcome.chunks_created();
                progress.println(format!(
                    "{} {} ({} chunks)",
                    style("+").green(),
                    name,
                    outcome.chunks_created()
                ));
            }
            Err(e) => {
                failures += 1;
                progress.println(format!("{} {}: {}", style("x").red(), name, e));
            }
        }
        progress.inc(1);
    }

    progress.finish_and_clear();
    println!(
        "{} {} fichier(s) pour {}, {} chunks créés, {} échec(s)",
        style("Ingestion terminée:").bold(),
        files.len(),
        region,
        total_chunks,
        failures
    );

    if failures > 0 {
        bail!("{} guide(s) failed to ingest", failures);
    }
    Ok(())
}

async fn ask(config: EcoConfig, question: &str, region: Region) -> anyhow::Result<()> {
    config.validate()?;
    let state = AppState::new(config).await?;
    let response = state.assistant().ask_or_apologize(question, region).await;

    println!("{}", style(format!("Eco-Sorter ({})", region)).bold().green());
    println!("{}\n", response.answer);

    for source in &response.sources {
        println!("  {} {}", style("·").dim(), source.format_source());
    }

    let m = &response.metrics;
    println!(
        "\n{} entrée {} / sortie {} / total {} tokens, {} CO₂",
        style("Impact:").dim(),
        m.input_tokens,
        m.output_tokens,
        m.total_tokens,
        m.format_co2()
    );
    Ok(())
}

async fn classify(config: &EcoConfig, image: &Path) -> anyhow::Result<()> {
    let data = tokio::fs::read(image)
        .await
        .with_context(|| format!("Failed to read {}", image.display()))?;

    let classifier = YoloClassifier::load(&config.vision)?;
    let prediction = classifier.classify(&data).await?;

    println!("{} {}", style("Détection:").bold(), prediction.describe());
    println!("{} {}", style("Question:").bold(), prediction.follow_up_question());
    Ok(())
}

async fn regions(config: &EcoConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    for region in Region::ALL {
        let info = RegionInfo::new(region, store.count_by_region(region).await?);
        println!("{:<16} {:<16} {:>6} chunks", info.label, info.tag, info.chunk_count);
    }
    Ok(())
}
