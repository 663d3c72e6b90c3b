//! Raw source records and their preparation into documents.
//!
//! Every field of a source record is optional and leniently typed: a record
//! with missing or oddly-typed fields still prepares into a document, with
//! the absent parts rendered as empty strings.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::document::{CollectionKind, Document, DocumentMetadata, Price};
use crate::error::{Result, RetrievalError};

/// Currency symbol used when a product record does not name one.
pub const DEFAULT_CURRENCY: &str = "€";

/// A raw record that belongs to exactly one collection.
pub trait SourceRecord: Serialize + DeserializeOwned + Send + Sync {
    /// Collection this record type populates.
    const KIND: CollectionKind;

    /// Map the record to its embeddable document.
    fn to_document(&self) -> Document;
}

/// A site page as exported by the content fetchers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub url: Option<String>,

    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "lenient_text")]
    pub meta_description: Option<String>,

    /// Main body text.
    #[serde(default, alias = "main_content", deserialize_with = "lenient_text")]
    pub content: Option<String>,

    /// Kept verbatim; sources disagree on list vs comma-separated string.
    #[serde(default)]
    pub keywords: Option<serde_json::Value>,
}

/// A catalogue product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub url: Option<String>,

    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "lenient_text")]
    pub description: Option<String>,

    #[serde(default, deserialize_with = "lenient_price")]
    pub price: Option<Price>,

    #[serde(default, deserialize_with = "lenient_text")]
    pub currency: Option<String>,
}

impl SourceRecord for PageRecord {
    const KIND: CollectionKind = CollectionKind::Pages;

    fn to_document(&self) -> Document {
        let title = self.title.as_deref().unwrap_or_default();
        let meta = self.meta_description.as_deref().unwrap_or_default();
        let body = self.content.as_deref().unwrap_or_default();

        Document {
            content: format!("{title}\n{meta}\n{body}"),
            metadata: DocumentMetadata::Page {
                url: self.url.clone().unwrap_or_default(),
                title: title.to_string(),
                keywords: self.keywords.clone(),
            },
        }
    }
}

impl SourceRecord for ProductRecord {
    const KIND: CollectionKind = CollectionKind::Products;

    fn to_document(&self) -> Document {
        let title = self.title.as_deref().unwrap_or_default();
        let description = self.description.as_deref().unwrap_or_default();
        let currency = self.currency.as_deref().unwrap_or(DEFAULT_CURRENCY);
        let price = self
            .price
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();

        Document {
            content: format!("{title}\n{description}\nPrice: {currency}{price}"),
            metadata: DocumentMetadata::Product {
                url: self.url.clone().unwrap_or_default(),
                title: title.to_string(),
                price: self.price.clone(),
            },
        }
    }
}

/// Prepare raw records for embedding, preserving their order.
pub fn prepare_documents<R: SourceRecord>(records: &[R]) -> Vec<Document> {
    records.iter().map(SourceRecord::to_document).collect()
}

/// Read a JSON array of source records from `path`.
pub async fn load_records<R: SourceRecord>(path: &Path) -> Result<Vec<R>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RetrievalError::Source(format!("{}: {e}", path.display())))?;
    let records: Vec<R> = serde_json::from_str(&content)
        .map_err(|e| RetrievalError::Source(format!("{}: {e}", path.display())))?;
    info!("Read {} {} records from {}", records.len(), R::KIND, path.display());
    Ok(records)
}

/// Content hash of a record list, used to skip unchanged updates.
pub fn fingerprint<R: Serialize>(records: &[R]) -> Result<String> {
    let canonical = serde_json::to_vec(records)?;
    Ok(format!("{:x}", Sha256::digest(&canonical)))
}

/// Accept strings, numbers and booleans as text; anything else is absent.
fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_price<'de, D>(deserializer: D) -> std::result::Result<Option<Price>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => Some(Price::Amount(n)),
        Some(serde_json::Value::String(s)) => Some(Price::Text(s)),
        _ => None,
    })
}
