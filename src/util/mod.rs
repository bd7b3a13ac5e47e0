//! Shared helpers.
//!
//! - **Text**: Unicode-aware width, truncation, excerpts and control-char stripping
//! - **Files**: atomic writes for exports
//! - **URLs**: checks before handing a page link to the system browser

mod fs;
mod text;

pub use fs::atomic_write;
pub use text::{display_width, excerpt, strip_control_chars, truncate_to_width, wrap_to_width};

use url::Url;

/// Parse a page link for opening in the system browser. Only http(s) with a
/// host is accepted.
pub fn validate_url_for_open(raw: &str) -> Option<Url> {
    let url = Url::parse(raw).ok()?;
    let web = matches!(url.scheme(), "http" | "https");
    (web && url.host_str().is_some_and(|h| !h.is_empty())).then_some(url)
}
