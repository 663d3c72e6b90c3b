//! # Retrieval
//!
//! In-memory vector store behind the Guida assistant. It keeps two
//! collections, site pages and catalogue products, embeds them through a
//! cached provider, and ranks them against customer questions so the chat
//! layer can ground its answers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Vector Store                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  PageRecord / ProductRecord                                      │
//! │          │  prepare_documents                                    │
//! │          ▼                                                       │
//! │  ┌──────────────┐   batches   ┌──────────────────────────┐      │
//! │  │   Document   │ ──────────► │ CachedProvider (LRU)     │      │
//! │  └──────────────┘             └──────────────────────────┘      │
//! │          │                                 │                     │
//! │          └──────────────┬──────────────────┘                     │
//! │                         ▼                                        │
//! │                 ┌──────────────┐        ┌──────────────┐        │
//! │                 │  Collection  │ ─────► │   Snapshot   │        │
//! │                 └──────────────┘        └──────────────┘        │
//! │                         │                                        │
//! │                         ▼                                        │
//! │                 ranked SearchHits per collection                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use guida_retrieval::{VectorStore, VectorStoreConfig};
//!
//! let store = Arc::new(VectorStore::from_config(VectorStoreConfig::new("data"))?);
//! store.init().await;
//!
//! let results = store.search("Do you ship to Switzerland?", 5).await?;
//! ```

pub mod collection;
pub mod config;
pub mod document;
pub mod error;
pub mod record;
pub mod snapshot;
pub mod store;

pub use collection::{Collection, SearchHit};
pub use config::{EmbeddingConfig, SourceConfig, VectorStoreConfig};
pub use document::{CollectionKind, Document, DocumentMetadata, Price};
pub use error::{Result, RetrievalError};
pub use record::{PageRecord, ProductRecord, SourceRecord, prepare_documents};
pub use snapshot::SnapshotStore;
pub use store::{
    CollectionInit, CollectionStatus, InitReport, InitSource, SearchResults, StatusReport,
    UpdateOutcome, VectorStore,
};

// Re-export from dependencies for convenience
pub use guida_embeddings::{EmbeddingProvider, OpenAIProvider};
