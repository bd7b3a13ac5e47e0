//! Encyclopedia API boundary.
//!
//! - [`wikipedia`] - the [`ContentService`] trait and its REST/Action API client
//! - [`image`] - card image downloads with priority hints
//! - [`types`] - `Article`, `CategoryMember` and the error type
//!
//! Everything here is plain request/response. Retry and timeout policy lives
//! in the callers (`pipeline`).

mod image;
mod types;
mod wikipedia;

pub use image::{HttpImageFetcher, ImageFetcher, ImagePriority};
pub use types::{strip_category_prefix, Article, CategoryMember, ContentError, ARTICLE_NAMESPACE};
pub use wikipedia::{ContentService, WikipediaClient, DEFAULT_ACTION_API, DEFAULT_REST_BASE};
