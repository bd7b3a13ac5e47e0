use async_trait::async_trait;

use super::types::ContentError;
use super::wikipedia::read_limited_bytes;

const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Load priority hint for an image request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ImagePriority {
    #[default]
    Low,
    /// The card is about to become visible.
    High,
}

impl ImagePriority {
    /// RFC 9218 `Priority` header value.
    fn header_value(self) -> &'static str {
        match self {
            ImagePriority::Low => "u=5",
            ImagePriority::High => "u=1",
        }
    }
}

/// Fetches card images. Returns the number of bytes received.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_image(&self, url: &str, priority: ImagePriority)
        -> Result<usize, ContentError>;
}

/// Downloads images over HTTP, forwarding the priority hint to the server.
#[derive(Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_image(
        &self,
        url: &str,
        priority: ImagePriority,
    ) -> Result<usize, ContentError> {
        let parsed = url::Url::parse(url).map_err(|_| ContentError::InvalidUrl)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ContentError::InvalidUrl);
        }

        let response = self
            .client
            .get(parsed)
            .header("Priority", priority.header_value())
            .send()
            .await
            .map_err(ContentError::Network)?;

        if !response.status().is_success() {
            return Err(ContentError::HttpStatus(response.status().as_u16()));
        }

        let bytes = read_limited_bytes(response, MAX_IMAGE_SIZE).await?;
        Ok(bytes.len())
    }
}
