use async_trait::async_trait;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use super::types::{strip_category_prefix, Article, CategoryMember, ContentError, SummaryResponse};

pub const DEFAULT_REST_BASE: &str = "https://en.wikipedia.org/api/rest_v1";
pub const DEFAULT_ACTION_API: &str = "https://en.wikipedia.org/w/api.php";

const MAX_RESPONSE_SIZE: usize = 2 * 1024 * 1024; // 2MB

/// Categories requested per title. Hidden (maintenance) categories are
/// excluded server-side via `clshow=!hidden`.
const CATEGORY_LOOKUP_LIMIT: u32 = 10;

/// The four request/response operations the feed needs from the encyclopedia.
///
/// No retries happen at this layer. Category lookups never fail: transport or
/// decode errors are logged and degrade to `None` / an empty list.
#[async_trait]
pub trait ContentService: Send + Sync {
    async fn fetch_random_article(&self) -> Result<Article, ContentError>;

    /// First non-hidden category of the article, without the `Category:` prefix.
    async fn fetch_category_of(&self, article: &Article) -> Option<String>;

    /// Up to one page (50 by default) of members, in API order.
    async fn fetch_category_members(&self, category: &str) -> Vec<CategoryMember>;

    async fn fetch_article_summary(&self, title: &str) -> Result<Article, ContentError>;
}

// ============================================================================
// Wire types (Action API)
// ============================================================================

#[derive(Debug, Deserialize)]
struct CategoriesResponse {
    query: Option<CategoriesQuery>,
}

#[derive(Debug, Deserialize)]
struct CategoriesQuery {
    #[serde(default)]
    pages: HashMap<String, PageCategories>,
}

#[derive(Debug, Deserialize)]
struct PageCategories {
    #[serde(default)]
    categories: Vec<CategoryTitle>,
}

#[derive(Debug, Deserialize)]
struct CategoryTitle {
    title: String,
}

#[derive(Debug, Deserialize)]
struct MembersResponse {
    query: Option<MembersQuery>,
}

#[derive(Debug, Deserialize)]
struct MembersQuery {
    #[serde(default)]
    categorymembers: Vec<CategoryMember>,
}

// ============================================================================
// Wikipedia client
// ============================================================================

/// [`ContentService`] backed by the Wikipedia REST and Action APIs.
#[derive(Clone)]
pub struct WikipediaClient {
    client: reqwest::Client,
    rest_base: Url,
    action_api: Url,
    member_page_size: u32,
    request_timeout: Option<Duration>,
}

impl WikipediaClient {
    /// Build a client for the given endpoints.
    ///
    /// Both base URLs must be HTTPS; plain HTTP is accepted only for
    /// `localhost`/`127.0.0.1` so tests can point at a mock server.
    pub fn new(
        client: reqwest::Client,
        rest_base: &str,
        action_api: &str,
    ) -> Result<Self, ContentError> {
        Ok(Self {
            client,
            rest_base: validate_base_url(rest_base)?,
            action_api: validate_base_url(action_api)?,
            member_page_size: 50,
            request_timeout: None,
        })
    }

    pub fn with_member_page_size(mut self, size: u32) -> Self {
        self.member_page_size = size.clamp(1, 500);
        self
    }

    /// Zero disables the timeout (the default): a hung request simply never resolves.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    fn rest_url(&self, segments: &[&str]) -> Result<Url, ContentError> {
        let mut url = self.rest_base.clone();
        url.path_segments_mut()
            .map_err(|_| ContentError::InvalidUrl)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn action_url(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.action_api.clone();
        url.query_pairs_mut()
            .append_pair("action", "query")
            .append_pair("format", "json")
            .extend_pairs(params);
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ContentError> {
        let send = self.client.get(url).send();
        let response = match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, send)
                .await
                .map_err(|_| ContentError::Timeout)?,
            None => send.await,
        }
        .map_err(ContentError::Network)?;

        if !response.status().is_success() {
            return Err(ContentError::HttpStatus(response.status().as_u16()));
        }

        let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn try_category_of(&self, title: &str) -> Result<Option<String>, ContentError> {
        let limit = CATEGORY_LOOKUP_LIMIT.to_string();
        let url = self.action_url(&[
            ("prop", "categories"),
            ("titles", title),
            ("cllimit", &limit),
            ("clshow", "!hidden"),
        ]);
        let resp: CategoriesResponse = self.get_json(url).await?;

        let category = resp
            .query
            .and_then(|q| q.pages.into_values().next())
            .and_then(|page| page.categories.into_iter().next())
            .map(|c| strip_category_prefix(&c.title).to_string())
            .filter(|name| !name.is_empty());
        Ok(category)
    }

    async fn try_category_members(
        &self,
        category: &str,
    ) -> Result<Vec<CategoryMember>, ContentError> {
        let cmtitle = format!("Category:{}", category);
        let limit = self.member_page_size.to_string();
        let url = self.action_url(&[
            ("list", "categorymembers"),
            ("cmtitle", &cmtitle),
            ("cmlimit", &limit),
        ]);
        let resp: MembersResponse = self.get_json(url).await?;
        Ok(resp.query.map(|q| q.categorymembers).unwrap_or_default())
    }
}

#[async_trait]
impl ContentService for WikipediaClient {
    async fn fetch_random_article(&self) -> Result<Article, ContentError> {
        let url = self.rest_url(&["page", "random", "summary"])?;
        let resp: SummaryResponse = self.get_json(url).await?;
        Ok(resp.into())
    }

    async fn fetch_category_of(&self, article: &Article) -> Option<String> {
        match self.try_category_of(&article.title).await {
            Ok(category) => {
                tracing::debug!(title = %article.title, category = ?category, "Resolved category");
                category
            }
            Err(e) => {
                tracing::warn!(title = %article.title, error = %e, "Category lookup failed");
                None
            }
        }
    }

    async fn fetch_category_members(&self, category: &str) -> Vec<CategoryMember> {
        match self.try_category_members(category).await {
            Ok(members) => members,
            Err(e) => {
                tracing::warn!(category = %category, error = %e, "Category member lookup failed");
                Vec::new()
            }
        }
    }

    async fn fetch_article_summary(&self, title: &str) -> Result<Article, ContentError> {
        let url = self.rest_url(&["page", "summary", title])?;
        let resp: SummaryResponse = self.get_json(url).await?;
        Ok(resp.into())
    }
}

/// Parse a base URL, requiring HTTPS except for loopback hosts.
fn validate_base_url(base: &str) -> Result<Url, ContentError> {
    let url = Url::parse(base).map_err(|_| ContentError::InvalidUrl)?;
    match url.scheme() {
        "https" => Ok(url),
        "http" if matches!(url.host_str(), Some("localhost") | Some("127.0.0.1")) => {
            tracing::warn!(base_url = %base, "Using non-HTTPS API base URL (localhost only)");
            Ok(url)
        }
        "http" => {
            tracing::error!(base_url = %base, "Rejecting non-HTTPS API base URL");
            Err(ContentError::InsecureBaseUrl)
        }
        _ => Err(ContentError::InvalidUrl),
    }
}

/// Read a response body, refusing anything larger than `limit` bytes.
pub(crate) async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, ContentError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ContentError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ContentError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ContentError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
