//! # Embeddings
//!
//! This crate turns text into dense vectors and compares them. It is the
//! leaf layer of the Guida retrieval backend.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to vectors through an [`EmbeddingProvider`]
//! - **Caching**: Content-keyed LRU cache of previously computed vectors
//! - **Similarity Search**: Single-pass cosine similarity and stable top-k ranking
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► CachedProvider ──► Embedding             │
//! │       │                    │                  │                 │
//! │       ▼                    ▼                  ▼                 │
//! │    OpenAI            EmbeddingCache      rank_by_similarity     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod provider;
pub mod similarity;

pub use cache::{CacheStats, CachedProvider, EmbeddingCache};
pub use error::{EmbeddingError, Result};
pub use provider::{EmbeddingProvider, OpenAIProvider};
pub use similarity::{ScoredIndex, cosine_similarity, rank_by_similarity};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
