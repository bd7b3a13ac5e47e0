use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors from the Wikipedia API boundary.
///
/// Only `fetch_random_article` and `fetch_article_summary` surface these to the
/// caller; category lookups degrade to `None`/empty at the service boundary.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
}

// ============================================================================
// Article
// ============================================================================

/// A fetched article summary. The title is the identity key.
///
/// This is also the record persisted in the liked set, so field names are part
/// of the on-disk format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    #[serde(default)]
    pub extract: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_image_url: Option<String>,
    #[serde(default)]
    pub page_url: String,
}

impl Article {
    /// Image used for the card background: the thumbnail, else the original.
    pub fn image_url(&self) -> Option<&str> {
        self.thumbnail_url
            .as_deref()
            .or(self.original_image_url.as_deref())
    }

    /// Category cards only show articles with a thumbnail.
    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// Wire shape of `page/summary` and `page/random/summary`.
#[derive(Debug, Deserialize)]
pub(crate) struct SummaryResponse {
    title: String,
    #[serde(default)]
    extract: String,
    thumbnail: Option<ImageRef>,
    originalimage: Option<ImageRef>,
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ImageRef {
    source: String,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: Option<PageUrls>,
}

#[derive(Debug, Deserialize)]
struct PageUrls {
    page: String,
}

impl From<SummaryResponse> for Article {
    fn from(resp: SummaryResponse) -> Self {
        Self {
            title: resp.title,
            extract: resp.extract,
            thumbnail_url: resp.thumbnail.map(|i| i.source),
            original_image_url: resp.originalimage.map(|i| i.source),
            page_url: resp
                .content_urls
                .and_then(|c| c.desktop)
                .map(|d| d.page)
                .unwrap_or_default(),
        }
    }
}

// ============================================================================
// Categories
// ============================================================================

/// Namespace tag of the main (article) namespace.
pub const ARTICLE_NAMESPACE: i64 = 0;

/// One entry of a category listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryMember {
    pub title: String,
    #[serde(default)]
    pub ns: i64,
}

impl CategoryMember {
    pub fn new(title: impl Into<String>, ns: i64) -> Self {
        Self {
            title: title.into(),
            ns,
        }
    }

    /// Subcategories, files and talk pages are not displayable.
    pub fn is_article(&self) -> bool {
        self.ns == ARTICLE_NAMESPACE
    }
}

/// Strip the `Category:` namespace prefix from a category title.
pub fn strip_category_prefix(title: &str) -> &str {
    title.strip_prefix("Category:").unwrap_or(title)
}
