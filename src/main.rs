//! # ragmill CLI
//!
//! The `ragmill` binary starts the ingestion/search HTTP server and offers a
//! local segmentation preview for tuning chunking parameters.
//!
//! ## Usage
//!
//! ```bash
//! ragmill --config ./config/ragmill.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragmill serve` | Start the HTTP server |
//! | `ragmill chunk <path>` | Segment a local file and print the chunks |
//!
//! ## Examples
//!
//! ```bash
//! # Start the server with defaults (binds 0.0.0.0:8001)
//! ragmill serve
//!
//! # Preview how a document would be chunked
//! ragmill chunk ./notes.md --chunk-size 300 --overlap 30
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ragmill::config::{self, Config};
use ragmill::index::MemoryIndex;
use ragmill::server;
use ragmill::service::RagService;

/// ragmill — document ingestion and vector similarity search service.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ragmill.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ragmill",
    about = "Document ingestion and vector similarity search service",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/ragmill.toml`. If the file does not exist,
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/ragmill.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// ingestion, search, and document-management endpoints.
    Serve,

    /// Segment a local file and print the resulting chunks.
    ///
    /// Runs the same extraction and segmentation pipeline as ingestion,
    /// without touching the index. Useful for tuning `chunk_size` and
    /// `overlap` before uploading.
    Chunk {
        /// Path to the file to segment.
        path: PathBuf,

        /// Soft upper bound on chunk length in characters.
        #[arg(long, default_value_t = 500)]
        chunk_size: usize,

        /// Characters of trailing context carried into the next chunk.
        #[arg(long, default_value_t = 0)]
        overlap: usize,
    },
}

fn load_or_default(path: &PathBuf) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::default())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let cfg = load_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let index = Arc::new(MemoryIndex::new());
            let service = Arc::new(RagService::new(cfg, index)?);
            server::run_server(service).await?;
        }
        Commands::Chunk {
            path,
            chunk_size,
            overlap,
        } => {
            run_chunk(&cfg, &path, chunk_size, overlap)?;
        }
    }

    Ok(())
}

fn run_chunk(cfg: &Config, path: &PathBuf, chunk_size: usize, overlap: usize) -> anyhow::Result<()> {
    use ragmill::extract::extract_text;
    use ragmill::segment::Segmenter;

    let bytes = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("input.txt");
    let text = extract_text(filename, &bytes)?;

    let segmenter = Segmenter::new(cfg.chunking.kind()?, chunk_size, overlap)?;
    let chunks = segmenter.segment(&text);

    let total: usize = chunks.iter().map(|c| c.len()).sum();
    for (i, chunk) in chunks.iter().enumerate() {
        println!("--- chunk {} ({} chars) ---", i, chunk.len());
        println!("{}", chunk);
    }
    println!();
    println!(
        "{} chunks, avg {:.1} chars",
        chunks.len(),
        if chunks.is_empty() {
            0.0
        } else {
            total as f64 / chunks.len() as f64
        }
    );
    Ok(())
}
