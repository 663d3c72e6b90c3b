//! Configuration for the vector store.

use std::path::{Path, PathBuf};
use std::time::Duration;

use guida_embeddings::OpenAIProvider;
use serde::{Deserialize, Serialize};

use crate::document::CollectionKind;
use crate::error::{Result, RetrievalError};

/// Relevance threshold of the general pipeline.
pub const DEFAULT_MIN_RELEVANCE: f32 = 0.5;

/// Relevance threshold of the stricter product-assistant variant.
pub const STRICT_MIN_RELEVANCE: f32 = 0.7;

/// Configuration for the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Directory holding the per-collection snapshots.
    pub data_dir: PathBuf,

    /// Raw-record files used to bootstrap collections without a snapshot.
    pub sources: SourceConfig,

    /// Documents per embedding provider call.
    pub batch_size: usize,

    /// Minimum similarity for a document to be returned.
    pub min_relevance: f32,

    /// Per-collection result cap used when a caller does not pass one.
    pub default_max_results: usize,

    /// Embedding cache capacity.
    pub cache_max_entries: usize,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,
}

impl VectorStoreConfig {
    /// Create a new configuration with default values.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            sources: SourceConfig::default(),
            batch_size: 20,
            min_relevance: DEFAULT_MIN_RELEVANCE,
            default_max_results: 5,
            cache_max_entries: guida_embeddings::cache::DEFAULT_CAPACITY,
            embedding: EmbeddingConfig::default(),
        }
    }

    /// Load a configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RetrievalError::Config(format!("{}: {e}", path.display())))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RetrievalError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the store cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(RetrievalError::Config(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.min_relevance) {
            return Err(RetrievalError::Config(format!(
                "min_relevance must be within [-1, 1], got {}",
                self.min_relevance
            )));
        }
        Ok(())
    }

    /// Set the snapshot directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the bootstrap source file for a collection.
    pub fn with_source(mut self, kind: CollectionKind, path: impl Into<PathBuf>) -> Self {
        match kind {
            CollectionKind::Pages => self.sources.pages = Some(path.into()),
            CollectionKind::Products => self.sources.products = Some(path.into()),
        }
        self
    }

    /// Set the embedding batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the relevance threshold.
    pub fn with_min_relevance(mut self, min_relevance: f32) -> Self {
        self.min_relevance = min_relevance;
        self
    }

    /// Set the embedding cache capacity.
    pub fn with_cache_max_entries(mut self, max_entries: usize) -> Self {
        self.cache_max_entries = max_entries;
        self
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self::new("data")
    }
}

/// Raw-record files, one per collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub pages: Option<PathBuf>,
    pub products: Option<PathBuf>,
}

impl SourceConfig {
    /// Source file configured for a collection.
    pub fn path(&self, kind: CollectionKind) -> Option<&Path> {
        match kind {
            CollectionKind::Pages => self.pages.as_deref(),
            CollectionKind::Products => self.products.as_deref(),
        }
    }
}

/// Configuration for the embedding provider client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model to use for embeddings.
    pub model: String,

    /// API base URL.
    pub base_url: String,

    /// Retries for rate limits, timeouts and server errors.
    pub max_retries: u32,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    /// Build the OpenAI client this configuration describes.
    pub fn build_provider(&self) -> OpenAIProvider {
        OpenAIProvider::new()
            .with_model(&self.model)
            .with_base_url(&self.base_url)
            .with_max_retries(self.max_retries)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-ada-002".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            max_retries: 3,
            timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = VectorStoreConfig::default();
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.min_relevance, DEFAULT_MIN_RELEVANCE);
        assert_eq!(config.cache_max_entries, 1000);
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: VectorStoreConfig = toml::from_str(
            r#"
            data_dir = "/var/lib/guida"
            min_relevance = 0.7

            [sources]
            products = "json/products.json"

            [embedding]
            max_retries = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/guida"));
        assert_eq!(config.min_relevance, STRICT_MIN_RELEVANCE);
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.sources.path(CollectionKind::Pages), None);
        assert_eq!(
            config.sources.path(CollectionKind::Products),
            Some(Path::new("json/products.json"))
        );
        assert_eq!(config.embedding.max_retries, 5);
        assert_eq!(config.embedding.model, "text-embedding-ada-002");
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = VectorStoreConfig::default().with_batch_size(0);
        assert!(matches!(config.validate(), Err(RetrievalError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let config = VectorStoreConfig::default().with_min_relevance(1.5);
        assert!(config.validate().is_err());
    }
}
