//! Main-feed prefetch pipeline.
//!
//! [`PrefetchPipeline`] is the bookkeeping half: the FIFO of not-yet-displayed
//! articles, the in-flight fetch count, and the side batch used for category
//! prefetch. It performs no I/O. The async half (`prefetch_category`,
//! `prefetch_batch`, `materialize_members`, [`image::load_image`]) runs inside
//! spawned tasks and reports back through the app event channel.
//!
//! Every fetch failure is logged and dropped. The pipeline never blocks on a
//! failed item; the next depth check simply asks for more.

pub mod image;

use lru::LruCache;
use std::collections::{HashSet, VecDeque};
use std::num::NonZeroUsize;

use crate::cache::CategoryCache;
use crate::content::{Article, CategoryMember, ContentError, ContentService};

pub use image::{load_image, ImageOutcome, ImagePolicy, ImageState};

/// Stage bookkeeping is kept for this many recent articles.
const STAGE_HISTORY: usize = 256;

/// Per-article prefetch progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleStage {
    Fetched,
    CategoryResolving,
    CategoryResolved(String),
    MembersPreloading(String),
    MembersReady {
        category: String,
        first_article_preloaded: bool,
    },
    /// The article has no qualifying category (or the lookup failed).
    Uncategorized,
}

/// What happened to one `fetch_random_article` result.
#[derive(Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Appended to the queue. `batch` is set when the side batch filled up and
    /// should be handed to a category-prefetch task.
    Queued { batch: Option<Vec<Article>> },
    /// Same title is already waiting in the queue.
    Duplicate,
    Failed,
}

pub struct PrefetchPipeline {
    queue: VecDeque<Article>,
    target_depth: usize,
    in_flight: usize,
    batch: Vec<Article>,
    batch_threshold: usize,
    batch_running: bool,
    stages: LruCache<String, ArticleStage>,
    failures: u64,
}

impl PrefetchPipeline {
    pub fn new(target_depth: usize, batch_threshold: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(target_depth),
            target_depth: target_depth.max(1),
            in_flight: 0,
            batch: Vec::new(),
            batch_threshold: batch_threshold.max(1),
            batch_running: false,
            stages: LruCache::new(NonZeroUsize::new(STAGE_HISTORY).unwrap_or(NonZeroUsize::MIN)),
            failures: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn target_depth(&self) -> usize {
        self.target_depth
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Fetches needed to bring queued + in-flight back to the target depth.
    pub fn deficit(&self) -> usize {
        self.target_depth
            .saturating_sub(self.queue.len() + self.in_flight)
    }

    /// Reserve slots for the deficit and return how many fetches to issue.
    pub fn begin_refill(&mut self) -> usize {
        let needed = self.deficit();
        self.in_flight += needed;
        needed
    }

    /// Record a completed fetch. Completion order, not request order, decides
    /// queue order.
    pub fn record_fetch(&mut self, result: Result<Article, ContentError>) -> FetchOutcome {
        self.in_flight = self.in_flight.saturating_sub(1);

        let article = match result {
            Ok(article) => article,
            Err(e) => {
                self.failures += 1;
                tracing::warn!(error = %e, failures = self.failures, "Random article fetch failed");
                return FetchOutcome::Failed;
            }
        };

        if self.queue.iter().any(|queued| queued.title == article.title) {
            tracing::debug!(title = %article.title, "Skipping duplicate random article");
            return FetchOutcome::Duplicate;
        }

        self.stages.put(article.title.clone(), ArticleStage::Fetched);
        self.batch.push(article.clone());
        self.queue.push_back(article);

        FetchOutcome::Queued {
            batch: self.take_batch(),
        }
    }

    /// Hand out the side batch once it reaches the threshold. Only one batch
    /// task runs at a time.
    fn take_batch(&mut self) -> Option<Vec<Article>> {
        if self.batch_running || self.batch.len() < self.batch_threshold {
            return None;
        }
        self.batch_running = true;
        Some(self.batch.drain(..self.batch_threshold).collect())
    }

    /// A batch task finished; returns the next batch if one is already full.
    pub fn finish_batch(&mut self) -> Option<Vec<Article>> {
        self.batch_running = false;
        self.take_batch()
    }

    pub fn dequeue(&mut self) -> Option<Article> {
        self.queue.pop_front()
    }

    pub fn set_stage(&mut self, title: &str, stage: ArticleStage) {
        self.stages.put(title.to_string(), stage);
    }

    pub fn stage(&self, title: &str) -> Option<&ArticleStage> {
        self.stages.peek(title)
    }
}

// ============================================================================
// Async prefetch steps
// ============================================================================

/// Drive one article through category resolution and member preloading,
/// reporting each stage as it is entered.
pub async fn prefetch_category<F>(cache: &CategoryCache, article: &Article, mut report: F) -> ArticleStage
where
    F: FnMut(ArticleStage),
{
    report(ArticleStage::CategoryResolving);
    let Some(category) = cache.category_of(article).await else {
        report(ArticleStage::Uncategorized);
        return ArticleStage::Uncategorized;
    };
    report(ArticleStage::CategoryResolved(category.clone()));

    report(ArticleStage::MembersPreloading(category.clone()));
    let members = cache.members(&category).await;
    let first = if members.is_empty() {
        None
    } else {
        cache.first_displayable(&category).await
    };

    let stage = ArticleStage::MembersReady {
        category,
        first_article_preloaded: first.is_some(),
    };
    report(stage.clone());
    stage
}

/// Resolve categories, member lists and first displayable articles for a
/// whole batch, one article after another.
pub async fn prefetch_batch(cache: &CategoryCache, batch: &[Article]) -> Vec<(String, Option<String>)> {
    let mut resolved = Vec::with_capacity(batch.len());
    for article in batch {
        let category = cache.category_of(article).await;
        if let Some(category) = &category {
            if !cache.members(category).await.is_empty() {
                cache.first_displayable(category).await;
            }
        }
        resolved.push((article.title.clone(), category));
    }
    tracing::debug!(count = resolved.len(), "Category batch prefetched");
    resolved
}

/// Fetch summaries for `candidates` in order until `wanted` displayable
/// articles are found. Returns the articles and the unconsumed candidates.
///
/// Members outside the article namespace and titles in `skip` are consumed
/// without a request.
pub async fn materialize_members(
    service: &dyn ContentService,
    candidates: Vec<CategoryMember>,
    wanted: usize,
    skip: &HashSet<String>,
) -> (Vec<Article>, Vec<CategoryMember>) {
    let mut found = Vec::with_capacity(wanted);
    let mut rest = candidates.into_iter();

    while found.len() < wanted {
        let Some(member) = rest.next() else { break };
        if !member.is_article() || skip.contains(&member.title) {
            continue;
        }
        match service.fetch_article_summary(&member.title).await {
            Ok(article) if article.has_thumbnail() && !skip.contains(&article.title) => {
                found.push(article)
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(title = %member.title, error = %e, "Failed to fetch category article");
            }
        }
    }

    (found, rest.collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn article(title: &str, thumbnail: bool) -> Article {
        Article {
            title: title.to_string(),
            extract: String::new(),
            thumbnail_url: thumbnail.then(|| format!("https://img.example.org/{title}.jpg")),
            original_image_url: None,
            page_url: format!("https://en.wikipedia.org/wiki/{title}"),
        }
    }

    #[test]
    fn test_refill_reserves_deficit() {
        let mut pipeline = PrefetchPipeline::new(10, 5);
        assert_eq!(pipeline.begin_refill(), 10);
        assert_eq!(pipeline.in_flight(), 10);
        // Nothing more to ask for while those are outstanding.
        assert_eq!(pipeline.begin_refill(), 0);
    }

    #[test]
    fn test_dequeue_opens_one_slot() {
        let mut pipeline = PrefetchPipeline::new(3, 5);
        pipeline.begin_refill();
        for title in ["A", "B", "C"] {
            pipeline.record_fetch(Ok(article(title, false)));
        }
        assert_eq!(pipeline.len(), 3);
        assert_eq!(pipeline.deficit(), 0);

        assert_eq!(pipeline.dequeue().map(|a| a.title), Some("A".to_string()));
        assert_eq!(pipeline.begin_refill(), 1);
    }

    #[test]
    fn test_failed_fetch_frees_slot_without_queueing() {
        let mut pipeline = PrefetchPipeline::new(2, 5);
        pipeline.begin_refill();
        assert_eq!(
            pipeline.record_fetch(Err(ContentError::HttpStatus(500))),
            FetchOutcome::Failed
        );
        assert_eq!(pipeline.len(), 0);
        assert_eq!(pipeline.in_flight(), 1);
        assert_eq!(pipeline.failures(), 1);
        assert_eq!(pipeline.deficit(), 1);
    }

    #[test]
    fn test_duplicate_titles_dropped() {
        let mut pipeline = PrefetchPipeline::new(4, 5);
        pipeline.begin_refill();
        pipeline.record_fetch(Ok(article("Same", false)));
        assert_eq!(
            pipeline.record_fetch(Ok(article("Same", false))),
            FetchOutcome::Duplicate
        );
        assert_eq!(pipeline.len(), 1);
    }

    #[test]
    fn test_batch_released_at_threshold() {
        let mut pipeline = PrefetchPipeline::new(10, 3);
        pipeline.begin_refill();
        assert_eq!(
            pipeline.record_fetch(Ok(article("A", false))),
            FetchOutcome::Queued { batch: None }
        );
        pipeline.record_fetch(Ok(article("B", false)));
        let FetchOutcome::Queued { batch: Some(batch) } = pipeline.record_fetch(Ok(article("C", false)))
        else {
            panic!("expected a full batch");
        };
        let titles: Vec<_> = batch.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);

        // While the batch runs, a second full batch waits.
        for title in ["D", "E", "F"] {
            assert_eq!(
                pipeline.record_fetch(Ok(article(title, false))),
                FetchOutcome::Queued { batch: None }
            );
        }
        let next = pipeline.finish_batch().expect("queued batch released");
        assert_eq!(next.len(), 3);
        assert_eq!(pipeline.finish_batch(), None);
    }

    #[test]
    fn test_stage_tracking() {
        let mut pipeline = PrefetchPipeline::new(2, 5);
        pipeline.begin_refill();
        pipeline.record_fetch(Ok(article("Foo", false)));
        assert_eq!(pipeline.stage("Foo"), Some(&ArticleStage::Fetched));
        pipeline.set_stage("Foo", ArticleStage::CategoryResolved("Bar".into()));
        assert_eq!(
            pipeline.stage("Foo"),
            Some(&ArticleStage::CategoryResolved("Bar".into()))
        );
    }

    proptest! {
        /// Healthy upstream: after every refill, queued + in-flight covers the target.
        #[test]
        fn prop_refill_restores_depth(target in 1usize..20, ops in proptest::collection::vec(any::<bool>(), 0..60)) {
            let mut pipeline = PrefetchPipeline::new(target, 5);
            let mut next_id = 0u32;
            let mut outstanding = pipeline.begin_refill();

            for dequeue in ops {
                if dequeue {
                    pipeline.dequeue();
                } else if outstanding > 0 {
                    outstanding -= 1;
                    next_id += 1;
                    pipeline.record_fetch(Ok(article(&format!("A{next_id}"), false)));
                }
                outstanding += pipeline.begin_refill();
                prop_assert!(pipeline.len() + pipeline.in_flight() >= target);
                prop_assert_eq!(pipeline.in_flight(), outstanding);
            }
        }
    }

    struct SummaryService {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContentService for SummaryService {
        async fn fetch_random_article(&self) -> Result<Article, ContentError> {
            Err(ContentError::HttpStatus(500))
        }
        async fn fetch_category_of(&self, _article: &Article) -> Option<String> {
            None
        }
        async fn fetch_category_members(&self, _category: &str) -> Vec<CategoryMember> {
            Vec::new()
        }
        async fn fetch_article_summary(&self, title: &str) -> Result<Article, ContentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if title == "Broken" {
                return Err(ContentError::HttpStatus(404));
            }
            Ok(article(title, !title.starts_with("Plain")))
        }
    }

    #[tokio::test]
    async fn test_materialize_stops_at_wanted() {
        let service = SummaryService {
            calls: AtomicUsize::new(0),
        };
        let candidates = vec![
            CategoryMember::new("Category:Sub", 14),
            CategoryMember::new("Plain1", 0),
            CategoryMember::new("Broken", 0),
            CategoryMember::new("Seen", 0),
            CategoryMember::new("Pic1", 0),
            CategoryMember::new("Pic2", 0),
            CategoryMember::new("Pic3", 0),
        ];
        let skip: HashSet<String> = ["Seen".to_string()].into_iter().collect();

        let (found, rest) = materialize_members(&service, candidates, 2, &skip).await;

        let titles: Vec<_> = found.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Pic1", "Pic2"]);
        assert_eq!(rest, vec![CategoryMember::new("Pic3", 0)]);
        // Plain1, Broken, Pic1, Pic2
        assert_eq!(service.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_prefetch_category_uncategorized() {
        let service = Arc::new(SummaryService {
            calls: AtomicUsize::new(0),
        });
        let cache = CategoryCache::new(service, 8);
        let mut seen = Vec::new();

        let stage = prefetch_category(&cache, &article("Lonely", false), |s| seen.push(s)).await;

        assert_eq!(stage, ArticleStage::Uncategorized);
        assert_eq!(
            seen,
            vec![ArticleStage::CategoryResolving, ArticleStage::Uncategorized]
        );
    }
}
