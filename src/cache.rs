//! Read-through cache for article→category assignments and category listings.
//!
//! Both maps are bounded LRUs. Concurrent lookups of the same uncached key join
//! one shared pending future, so each key costs at most one upstream request
//! while it is in flight.

use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::content::{Article, CategoryMember, ContentService};

type Pending<T> = Shared<BoxFuture<'static, T>>;

/// Default number of leading members scanned for a displayable article.
pub const DEFAULT_SCAN_LIMIT: usize = 5;

/// Result of the one-time scan for a category's first displayable member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirstDisplayable {
    Unscanned,
    Found(Article),
    /// Scanned; none of the leading members had a thumbnail.
    Missing,
}

#[derive(Debug, Clone)]
pub struct CategoryEntry {
    pub members: Arc<Vec<CategoryMember>>,
    pub first_displayable: FirstDisplayable,
}

struct Inner {
    assignments: LruCache<String, String>,
    categories: LruCache<String, CategoryEntry>,
    pending_assignments: HashMap<String, Pending<Option<String>>>,
    pending_members: HashMap<String, Pending<Arc<Vec<CategoryMember>>>>,
    pending_scans: HashMap<String, Pending<Option<Article>>>,
}

pub struct CategoryCache {
    service: Arc<dyn ContentService>,
    scan_limit: usize,
    inner: Mutex<Inner>,
}

impl CategoryCache {
    pub fn new(service: Arc<dyn ContentService>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            service,
            scan_limit: DEFAULT_SCAN_LIMIT,
            inner: Mutex::new(Inner {
                assignments: LruCache::new(capacity),
                categories: LruCache::new(capacity),
                pending_assignments: HashMap::new(),
                pending_members: HashMap::new(),
                pending_scans: HashMap::new(),
            }),
        }
    }

    pub fn with_scan_limit(mut self, limit: usize) -> Self {
        self.scan_limit = limit.max(1);
        self
    }

    // The lock is never held across an await, so a poisoned guard still holds
    // consistent maps.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Article → category
    // ========================================================================

    /// Category of the article, resolving it upstream on first use.
    ///
    /// Only successful lookups are cached; `None` means "not resolved", so a
    /// later call asks again.
    pub async fn category_of(&self, article: &Article) -> Option<String> {
        let title = article.title.clone();
        let pending = {
            let mut inner = self.lock();
            if let Some(category) = inner.assignments.get(&title) {
                return Some(category.clone());
            }
            let service = Arc::clone(&self.service);
            let article = article.clone();
            join_or_start(&mut inner.pending_assignments, &title, move || {
                async move { service.fetch_category_of(&article).await }.boxed()
            })
        };

        let category = pending.await;

        let mut inner = self.lock();
        if inner.pending_assignments.remove(&title).is_some() {
            if let Some(category) = &category {
                inner.assignments.put(title, category.clone());
            }
        }
        category
    }

    /// Cached category, without touching the network or LRU order.
    pub fn cached_category(&self, title: &str) -> Option<String> {
        self.lock().assignments.peek(title).cloned()
    }

    // ========================================================================
    // Category → members
    // ========================================================================

    /// Member list for the category, fetched once and then served from cache.
    ///
    /// Empty results (including failed lookups) are returned but not cached.
    pub async fn members(&self, category: &str) -> Arc<Vec<CategoryMember>> {
        let pending = {
            let mut inner = self.lock();
            if let Some(entry) = inner.categories.get(category) {
                return Arc::clone(&entry.members);
            }
            let service = Arc::clone(&self.service);
            let name = category.to_string();
            join_or_start(&mut inner.pending_members, category, move || {
                async move { Arc::new(service.fetch_category_members(&name).await) }.boxed()
            })
        };

        let members = pending.await;

        let mut inner = self.lock();
        if inner.pending_members.remove(category).is_some()
            && !members.is_empty()
            && !inner.categories.contains(category)
        {
            inner.categories.put(
                category.to_string(),
                CategoryEntry {
                    members: Arc::clone(&members),
                    first_displayable: FirstDisplayable::Unscanned,
                },
            );
        }
        members
    }

    // ========================================================================
    // First displayable member
    // ========================================================================

    /// First of the leading members (in list order) whose summary has a thumbnail.
    ///
    /// The scan runs at most once per cached category; its outcome, found or
    /// not, is recorded on the entry.
    pub async fn first_displayable(&self, category: &str) -> Option<Article> {
        let members = self.members(category).await;
        if members.is_empty() {
            return None;
        }

        let pending = {
            let mut inner = self.lock();
            let state = inner
                .categories
                .get(category)
                .map(|entry| entry.first_displayable.clone());
            match state {
                Some(FirstDisplayable::Found(article)) => return Some(article),
                Some(FirstDisplayable::Missing) => return None,
                Some(FirstDisplayable::Unscanned) | None => {}
            }
            let service = Arc::clone(&self.service);
            let limit = self.scan_limit;
            join_or_start(&mut inner.pending_scans, category, move || {
                async move { scan_first_displayable(service.as_ref(), &members, limit).await }
                    .boxed()
            })
        };

        let found = pending.await;

        let mut inner = self.lock();
        if inner.pending_scans.remove(category).is_some() {
            if let Some(entry) = inner.categories.get_mut(category) {
                entry.first_displayable = match &found {
                    Some(article) => FirstDisplayable::Found(article.clone()),
                    None => FirstDisplayable::Missing,
                };
            }
        }
        found
    }

    pub fn cached_first_displayable(&self, category: &str) -> Option<Article> {
        match self.lock().categories.peek(category) {
            Some(CategoryEntry {
                first_displayable: FirstDisplayable::Found(article),
                ..
            }) => Some(article.clone()),
            _ => None,
        }
    }

    /// Number of cached categories.
    pub fn len(&self) -> usize {
        self.lock().categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn join_or_start<T, F>(pending: &mut HashMap<String, Pending<T>>, key: &str, start: F) -> Pending<T>
where
    T: Clone,
    F: FnOnce() -> BoxFuture<'static, T>,
{
    if let Some(existing) = pending.get(key) {
        return existing.clone();
    }
    let fut = start().shared();
    pending.insert(key.to_string(), fut.clone());
    fut
}

async fn scan_first_displayable(
    service: &dyn ContentService,
    members: &[CategoryMember],
    limit: usize,
) -> Option<Article> {
    for member in members.iter().take(limit).filter(|m| m.is_article()) {
        match service.fetch_article_summary(&member.title).await {
            Ok(article) if article.has_thumbnail() => return Some(article),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(title = %member.title, error = %e, "Failed to preload category article");
            }
        }
    }
    None
}
