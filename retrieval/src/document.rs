//! Prepared documents and the collections they belong to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A named partition of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// Site pages (about, shipping, care guides, ...).
    Pages,
    /// Catalogue products.
    Products,
}

impl CollectionKind {
    /// Every collection, in the order they are searched and reported.
    pub const ALL: [CollectionKind; 2] = [CollectionKind::Pages, CollectionKind::Products];

    /// Name used in snapshot file names and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionKind::Pages => "pages",
            CollectionKind::Products => "products",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record prepared for embedding.
///
/// `content` is the exact text sent to the embedding provider; `metadata`
/// is what the prompt layer shows the model alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Text that was embedded.
    pub content: String,

    /// Source details.
    pub metadata: DocumentMetadata,
}

/// Metadata carried with a document, tagged by record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentMetadata {
    Page {
        #[serde(default)]
        url: String,
        #[serde(default)]
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        keywords: Option<serde_json::Value>,
    },
    Product {
        #[serde(default)]
        url: String,
        #[serde(default)]
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        price: Option<Price>,
    },
}

impl DocumentMetadata {
    /// Collection this metadata belongs to.
    pub fn kind(&self) -> CollectionKind {
        match self {
            DocumentMetadata::Page { .. } => CollectionKind::Pages,
            DocumentMetadata::Product { .. } => CollectionKind::Products,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            DocumentMetadata::Page { url, .. } | DocumentMetadata::Product { url, .. } => url,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            DocumentMetadata::Page { title, .. } | DocumentMetadata::Product { title, .. } => title,
        }
    }
}

/// A product price as it appeared in the source data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Amount(serde_json::Number),
    Text(String),
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Price::Amount(n) => match n.as_f64() {
                // Whole amounts render without a trailing ".0".
                Some(v) if n.is_f64() && v.fract() == 0.0 && v.abs() < 1e15 => {
                    write!(f, "{v:.0}")
                }
                _ => write!(f, "{n}"),
            },
            Price::Text(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_metadata_serializes_with_type_tag() {
        let metadata = DocumentMetadata::Product {
            url: "https://example.com/p/1".to_string(),
            title: "Silk scarf".to_string(),
            price: Some(Price::Amount(serde_json::Number::from(89))),
        };

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "product",
                "url": "https://example.com/p/1",
                "title": "Silk scarf",
                "price": 89,
            })
        );
    }

    #[test]
    fn test_metadata_tolerates_missing_fields() {
        let metadata: DocumentMetadata =
            serde_json::from_value(serde_json::json!({ "type": "page" })).unwrap();
        assert_eq!(metadata.kind(), CollectionKind::Pages);
        assert_eq!(metadata.url(), "");
        assert_eq!(metadata.title(), "");
    }

    #[test]
    fn test_price_display() {
        let whole: Price = serde_json::from_str("129.0").unwrap();
        let cents: Price = serde_json::from_str("59.5").unwrap();
        let text: Price = serde_json::from_str("\"from 40\"").unwrap();

        assert_eq!(whole.to_string(), "129");
        assert_eq!(cents.to_string(), "59.5");
        assert_eq!(text.to_string(), "from 40");
    }
}
