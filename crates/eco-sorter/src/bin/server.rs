//! Eco-Sorter server binary
//!
//! Run with: cargo run -p eco-sorter --bin eco-sorter-server [config.toml]

use eco_sorter::{config::EcoConfig, server::EcoSorterServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eco_sorter=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                        Eco-Sorter                         ║
║        Assistant de tri des déchets par région            ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    // Optional TOML config path as the first argument
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = EcoConfig::load(config_path.as_deref())?;
    config.validate()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embeddings: {:?} ({})", config.embeddings.backend, config.embeddings.model);
    tracing::info!("  - LLM: {:?} ({})", config.llm.backend, config.llm.model);
    tracing::info!(
        "  - Chunking: {} chars, {} overlap",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - Retrieval top_k: {}", config.retrieval.top_k);
    tracing::info!("  - Vector store: {}", config.vector_db.storage_path.display());

    let server = EcoSorterServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/ingest    - Upload sorting guides");
    println!("  POST /api/ask       - Ask a sorting question");
    println!("  POST /api/classify  - Classify a photo");
    println!("  GET  /api/regions   - List regions");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
