//! The vector store: collections, their update pipeline, and search.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use guida_embeddings::{CacheStats, CachedProvider, Embedding, EmbeddingCache, EmbeddingProvider};

use crate::collection::{Collection, SearchHit};
use crate::config::VectorStoreConfig;
use crate::document::{CollectionKind, Document};
use crate::error::{Result, RetrievalError};
use crate::record::{PageRecord, ProductRecord, SourceRecord, fingerprint, load_records, prepare_documents};
use crate::snapshot::SnapshotStore;

/// In-memory vector store over the page and product collections.
///
/// Construct one at startup, call [`VectorStore::init`], and share it behind
/// an `Arc` with request handlers. Searches run concurrently with each other
/// and with updates; an update swaps a collection in whole once all of its
/// embeddings are ready, so a search sees either the old pairing of
/// documents and embeddings or the new one.
pub struct VectorStore {
    /// Configuration.
    config: VectorStoreConfig,

    /// Provider behind the content-keyed embedding cache.
    embedder: CachedProvider<Arc<dyn EmbeddingProvider>>,

    /// Durable snapshot storage.
    snapshots: SnapshotStore,

    pages: CollectionSlot,
    products: CollectionSlot,

    /// Outstanding snapshot writes.
    persistence: TaskTracker,
}

/// Live state of one collection.
#[derive(Default)]
struct CollectionSlot {
    current: RwLock<Arc<Collection>>,

    /// Set once the collection was loaded from a snapshot or built.
    initialized: AtomicBool,

    /// Serializes updates; holds the generation of the installed collection.
    update: Mutex<u64>,

    /// Generation of the last snapshot written to disk.
    persisted: Arc<Mutex<u64>>,
}

impl CollectionSlot {
    async fn snapshot(&self) -> Arc<Collection> {
        Arc::clone(&*self.current.read().await)
    }

    async fn install(&self, collection: Arc<Collection>) {
        *self.current.write().await = collection;
        self.initialized.store(true, Ordering::Release);
    }
}

impl VectorStore {
    /// Create a store backed by `provider`. Collections start empty.
    pub fn new(config: VectorStoreConfig, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()?;

        let cache = EmbeddingCache::new(config.cache_max_entries);
        Ok(Self {
            embedder: CachedProvider::new(provider, cache),
            snapshots: SnapshotStore::new(&config.data_dir),
            config,
            pages: CollectionSlot::default(),
            products: CollectionSlot::default(),
            persistence: TaskTracker::new(),
        })
    }

    /// Create a store using the OpenAI client described by `config`.
    pub fn from_config(config: VectorStoreConfig) -> Result<Self> {
        let provider = config.embedding.build_provider();
        if !provider.is_available() {
            warn!("OPENAI_API_KEY is not set; embedding calls will fail");
        }
        Self::new(config, Arc::new(provider))
    }

    pub fn config(&self) -> &VectorStoreConfig {
        &self.config
    }

    fn slot(&self, kind: CollectionKind) -> &CollectionSlot {
        match kind {
            CollectionKind::Pages => &self.pages,
            CollectionKind::Products => &self.products,
        }
    }

    /// Current contents of a collection.
    pub async fn collection(&self, kind: CollectionKind) -> Arc<Collection> {
        self.slot(kind).snapshot().await
    }

    /// Load every collection from its snapshot, falling back to the
    /// configured source records.
    ///
    /// Never fails: a collection with neither a usable snapshot nor
    /// loadable source records stays empty until the next
    /// [`update_collection`](Self::update_collection).
    pub async fn init(&self) -> InitReport {
        info!("Initializing vector store in {}", self.snapshots.root().display());

        let mut report = InitReport::default();
        for kind in CollectionKind::ALL {
            let source = self.init_collection(kind).await;
            report.collections.push(CollectionInit { kind, source });
        }

        info!("Vector store initialized");
        report
    }

    async fn init_collection(&self, kind: CollectionKind) -> InitSource {
        if let Some(collection) = self.snapshots.load(kind).await {
            let slot = self.slot(kind);
            let _update = slot.update.lock().await;
            let documents = collection.len();
            slot.install(Arc::new(collection)).await;
            return InitSource::Snapshot { documents };
        }

        let Some(path) = self.config.sources.path(kind) else {
            info!("No {kind} snapshot or source records, starting empty");
            return InitSource::Empty;
        };

        let bootstrap = match kind {
            CollectionKind::Pages => self.update_from_file::<PageRecord>(path).await,
            CollectionKind::Products => self.update_from_file::<ProductRecord>(path).await,
        };

        match bootstrap {
            Ok(_) => InitSource::Source {
                documents: self.collection(kind).await.len(),
            },
            Err(e) => {
                warn!("Could not bootstrap {kind} from {}: {e}", path.display());
                InitSource::Empty
            }
        }
    }

    /// Read source records from a JSON file and update their collection.
    pub async fn update_from_file<R: SourceRecord>(&self, path: &Path) -> Result<UpdateOutcome> {
        let records: Vec<R> = load_records(path).await?;
        self.update_collection(&records).await
    }

    /// Rebuild the collection for `R` from `records`.
    ///
    /// A no-op when `records` hash to the fingerprint the collection was
    /// last built from. Otherwise every document is embedded (cached
    /// contents skip the provider) and the collection is replaced as a unit.
    /// Any provider error aborts the update and leaves the collection as it
    /// was. The new snapshot is written in the background; see
    /// [`wait_for_persistence`](Self::wait_for_persistence).
    pub async fn update_collection<R: SourceRecord>(&self, records: &[R]) -> Result<UpdateOutcome> {
        let kind = R::KIND;
        let slot = self.slot(kind);
        let mut generation = slot.update.lock().await;

        let fingerprint = fingerprint(records)?;
        if slot.snapshot().await.fingerprint() == Some(fingerprint.as_str()) {
            debug!("{kind} unchanged, skipping update");
            slot.initialized.store(true, Ordering::Release);
            return Ok(UpdateOutcome::Unchanged);
        }

        let documents = prepare_documents(records);
        info!("Embedding {} {kind} documents", documents.len());
        let embeddings = self.embed_documents(&documents).await?;

        let collection = Arc::new(Collection::new(documents, embeddings, fingerprint)?);
        let documents = collection.len();
        slot.install(Arc::clone(&collection)).await;
        *generation += 1;
        info!("Updated {kind} collection with {documents} documents");

        self.persist(kind, collection, *generation);
        Ok(UpdateOutcome::Updated { documents })
    }

    /// Embed documents in fixed-size batches, all batches in flight at once.
    async fn embed_documents(&self, documents: &[Document]) -> Result<Vec<Embedding>> {
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let batches = texts
            .chunks(self.config.batch_size)
            .map(|batch| self.embedder.embed_batch(batch));

        let embeddings: Vec<Embedding> = try_join_all(batches).await?.into_iter().flatten().collect();

        if embeddings.len() != documents.len() {
            return Err(RetrievalError::EmbeddingCountMismatch {
                expected: documents.len(),
                actual: embeddings.len(),
            });
        }
        Ok(embeddings)
    }

    /// Write a collection snapshot without blocking the caller.
    fn persist(&self, kind: CollectionKind, collection: Arc<Collection>, generation: u64) {
        let snapshots = self.snapshots.clone();
        let persisted = Arc::clone(&self.slot(kind).persisted);

        self.persistence.spawn(async move {
            let mut last_written = persisted.lock().await;
            if *last_written > generation {
                debug!("Skipping stale {kind} snapshot (generation {generation})");
                return;
            }

            match snapshots.save(kind, &collection).await {
                Ok(()) => *last_written = generation,
                Err(e) => warn!("Failed to persist {kind} snapshot: {e}"),
            }
        });
    }

    /// Wait until every snapshot write started so far has finished.
    pub async fn wait_for_persistence(&self) {
        self.persistence.close();
        self.persistence.wait().await;
        self.persistence.reopen();
    }

    /// Search every collection with the configured relevance threshold.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<SearchResults> {
        self.search_with_threshold(query, max_results, self.config.min_relevance)
            .await
    }

    /// Search every collection, keeping at most `max_results` documents per
    /// collection that score at least `min_relevance`.
    ///
    /// Collections are ranked independently. Empty collections yield empty
    /// lists; when all are empty the provider is not called. A collection
    /// whose embeddings have a different dimension than the query (a
    /// snapshot from another model) is skipped.
    pub async fn search_with_threshold(
        &self,
        query: &str,
        max_results: usize,
        min_relevance: f32,
    ) -> Result<SearchResults> {
        let pages = self.collection(CollectionKind::Pages).await;
        let products = self.collection(CollectionKind::Products).await;

        if pages.is_empty() && products.is_empty() {
            debug!("All collections empty, skipping query embedding");
            return Ok(SearchResults::default());
        }

        let query_embedding = self.embedder.embed(query).await?;

        let results = SearchResults {
            pages: search_collection(
                CollectionKind::Pages,
                &pages,
                &query_embedding,
                max_results,
                min_relevance,
            ),
            products: search_collection(
                CollectionKind::Products,
                &products,
                &query_embedding,
                max_results,
                min_relevance,
            ),
        };
        debug!(
            "Search matched {} pages and {} products",
            results.pages.len(),
            results.products.len()
        );
        Ok(results)
    }

    /// Per-collection counts and fingerprints, for health reporting.
    pub async fn collections_status(&self) -> StatusReport {
        let mut collections = Vec::with_capacity(CollectionKind::ALL.len());
        for kind in CollectionKind::ALL {
            let slot = self.slot(kind);
            let collection = slot.snapshot().await;
            collections.push(CollectionStatus {
                kind,
                documents: collection.len(),
                embeddings: collection.embeddings().len(),
                fingerprint: collection.fingerprint().map(str::to_string),
                last_updated: collection.last_updated(),
                initialized: slot.initialized.load(Ordering::Acquire),
            });
        }

        StatusReport {
            collections,
            cache: self.embedder.cache().stats().await,
        }
    }
}

fn search_collection(
    kind: CollectionKind,
    collection: &Collection,
    query: &[f32],
    max_results: usize,
    min_relevance: f32,
) -> Vec<SearchHit> {
    match collection.dimension() {
        Some(dimension) if dimension != query.len() => {
            warn!(
                "Skipping {kind} search: stored embeddings have dimension {dimension}, query has {}",
                query.len()
            );
            Vec::new()
        }
        _ => collection.search(query, max_results, min_relevance),
    }
}

/// Result of [`VectorStore::update_collection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Records matched the stored fingerprint; nothing was embedded.
    Unchanged,
    /// The collection was rebuilt.
    Updated { documents: usize },
}

/// Where each collection's contents came from during [`VectorStore::init`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub collections: Vec<CollectionInit>,
}

impl InitReport {
    pub fn source(&self, kind: CollectionKind) -> Option<InitSource> {
        self.collections
            .iter()
            .find(|c| c.kind == kind)
            .map(|c| c.source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionInit {
    pub kind: CollectionKind,
    pub source: InitSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitSource {
    /// Loaded from a durable snapshot.
    Snapshot { documents: usize },
    /// Built from the configured source records.
    Source { documents: usize },
    /// Nothing available; waiting for an update.
    Empty,
}

/// Ranked hits per collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub pages: Vec<SearchHit>,
    pub products: Vec<SearchHit>,
}

impl SearchResults {
    pub fn get(&self, kind: CollectionKind) -> &[SearchHit] {
        match kind {
            CollectionKind::Pages => &self.pages,
            CollectionKind::Products => &self.products,
        }
    }

    /// Whether no collection produced a hit.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.products.is_empty()
    }
}

/// Health report returned by [`VectorStore::collections_status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub collections: Vec<CollectionStatus>,
    pub cache: CacheStats,
}

impl StatusReport {
    pub fn get(&self, kind: CollectionKind) -> Option<&CollectionStatus> {
        self.collections.iter().find(|c| c.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStatus {
    pub kind: CollectionKind,
    pub documents: usize,
    pub embeddings: usize,
    pub fingerprint: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub initialized: bool,
}
