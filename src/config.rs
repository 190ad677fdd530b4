//! TOML configuration.
//!
//! One [`Config`] struct is loaded at process start and passed by
//! reference into the components that need it; no module-level
//! singletons. The index API key is read from the environment (named by
//! `index.api_key_env`), never from the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
    pub chunking: ChunkingConfig,
    pub ingest: IngestConfig,
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
}

/// Hosted vector index settings (provisioning + data plane).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    /// Index name on the provider's control plane.
    pub name: String,
    /// Control-plane base URL.
    pub api_base: String,
    /// Data-plane host. Resolved from the control plane when unset.
    pub host: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Logical namespace scoping all reads and writes.
    pub namespace: String,
    pub dimension: usize,
    pub metric: String,
    pub cloud: String,
    pub region: String,
    /// Wait after index creation before treating it as queryable.
    pub settle_secs: u64,
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: "lesson-documents".to_string(),
            api_base: "https://api.pinecone.io".to_string(),
            host: None,
            api_key_env: "PINECONE_API_KEY".to_string(),
            namespace: "__default__".to_string(),
            dimension: 1024,
            metric: "cosine".to_string(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            settle_secs: 10,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IngestConfig {
    /// Records per upsert call, independent of document size.
    pub batch_size: usize,
    /// Pause between batches (rate-limit backpressure).
    pub batch_delay_ms: u64,
    /// Bound on queued ingestion jobs.
    pub queue_depth: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 95,
            batch_delay_ms: 500,
            queue_depth: 64,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Default hit count when the caller does not pass one.
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7411".to_string(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load the config file when present, defaults otherwise.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.overlap must be < chunking.chunk_size");
    }
    if config.ingest.batch_size == 0 {
        anyhow::bail!("ingest.batch_size must be > 0");
    }
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be > 0");
    }
    if config.index.dimension == 0 {
        anyhow::bail!("index.dimension must be > 0");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_match_production_constants() {
        let config = Config::default();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.ingest.batch_size, 95);
        assert_eq!(config.ingest.batch_delay_ms, 500);
        assert_eq!(config.index.dimension, 1024);
        assert_eq!(config.index.metric, "cosine");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let file = write_config("[chunking]\nchunk_size = 500\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.retrieval.top_k, 5);
    }

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        let file = write_config("[chunking]\nchunk_size = 100\noverlap = 100\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config_or_default(Path::new("/nonexistent/lsn.toml")).unwrap();
        assert_eq!(config.ingest.batch_size, 95);
    }
}
