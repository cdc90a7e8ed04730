//! TOML configuration parsing and validation.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::segment::SegmenterKind;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8001".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Soft upper bound on chunk length in characters.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Characters of trailing context carried into the next chunk.
    #[serde(default)]
    pub overlap: usize,
    /// `sentence` or `naive`.
    #[serde(default = "default_strategy")]
    pub strategy: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap: 0,
            strategy: default_strategy(),
        }
    }
}

impl ChunkingConfig {
    pub fn kind(&self) -> Result<SegmenterKind> {
        match self.strategy.as_str() {
            "sentence" => Ok(SegmenterKind::SentenceAware),
            "naive" => Ok(SegmenterKind::Naive),
            other => anyhow::bail!(
                "Unknown chunking strategy: '{}'. Must be sentence or naive.",
                other
            ),
        }
    }
}

fn default_max_chars() -> usize {
    500
}
fn default_strategy() -> String {
    "sentence".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Embedding model identifier reported by `/stats`.
    #[serde(default = "default_model")]
    pub model: String,
    /// Upper bound on chunks fetched by a read-back query.
    #[serde(default = "default_read_back_limit")]
    pub read_back_limit: usize,
    /// Bound on every index call; a timeout follows the read-back failure path.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            read_back_limit: default_read_back_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl IndexConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}
fn default_read_back_limit() -> usize {
    10_000
}
fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            default_threshold: default_threshold(),
        }
    }
}

fn default_limit() -> usize {
    5
}
fn default_threshold() -> f64 {
    0.5
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap must be smaller than chunking.max_chars");
    }
    config.chunking.kind()?;

    if config.index.read_back_limit == 0 {
        anyhow::bail!("index.read_back_limit must be >= 1");
    }
    if config.index.timeout_secs == 0 {
        anyhow::bail!("index.timeout_secs must be >= 1");
    }

    if config.search.default_limit == 0 {
        anyhow::bail!("search.default_limit must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.search.default_threshold) {
        anyhow::bail!("search.default_threshold must be in [0.0, 1.0]");
    }

    Ok(config)
}
