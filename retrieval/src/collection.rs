//! A collection: prepared documents and their parallel embeddings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use guida_embeddings::{Embedding, rank_by_similarity};

use crate::document::Document;
use crate::error::{Result, RetrievalError};

/// Documents of one collection paired index-for-index with their embeddings.
///
/// A collection is immutable once built. Updates construct a new value and
/// swap it in whole, so a reader holding one always sees a matching pair of
/// lists. This is also the on-disk snapshot format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    documents: Vec<Document>,
    embeddings: Vec<Embedding>,

    /// Hash of the source records this collection was built from.
    #[serde(default)]
    fingerprint: Option<String>,

    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
}

impl Collection {
    /// Build a collection, rejecting lists of different lengths.
    pub fn new(
        documents: Vec<Document>,
        embeddings: Vec<Embedding>,
        fingerprint: impl Into<String>,
    ) -> Result<Self> {
        let collection = Self {
            documents,
            embeddings,
            fingerprint: Some(fingerprint.into()),
            last_updated: Some(Utc::now()),
        };
        collection.validate()?;
        Ok(collection)
    }

    /// Check the pairing invariant and that every embedding has the same
    /// non-zero dimension.
    pub fn validate(&self) -> Result<()> {
        if self.documents.len() != self.embeddings.len() {
            return Err(RetrievalError::EmbeddingCountMismatch {
                expected: self.documents.len(),
                actual: self.embeddings.len(),
            });
        }

        if let Some(first) = self.embeddings.first() {
            let dimension = first.len();
            if let Some(bad) = self
                .embeddings
                .iter()
                .find(|e| e.is_empty() || e.len() != dimension)
            {
                return Err(RetrievalError::DimensionMismatch {
                    expected: dimension,
                    actual: bad.len(),
                });
            }
        }

        Ok(())
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn embeddings(&self) -> &[Embedding] {
        &self.embeddings
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Embedding dimension, if the collection holds any embeddings.
    pub fn dimension(&self) -> Option<usize> {
        self.embeddings.first().map(Vec::len)
    }

    /// Rank documents against `query`, best first.
    ///
    /// Documents scoring below `min_relevance` are dropped and at most
    /// `max_results` are returned. Equal scores keep document order.
    pub fn search(&self, query: &[f32], max_results: usize, min_relevance: f32) -> Vec<SearchHit> {
        rank_by_similarity(query, &self.embeddings, max_results, min_relevance)
            .into_iter()
            .map(|hit| SearchHit {
                document: self.documents[hit.index].clone(),
                score: hit.score,
            })
            .collect()
    }
}

/// A document matched by a search, with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub document: Document,
    pub score: f32,
}
