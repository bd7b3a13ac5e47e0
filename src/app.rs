use std::borrow::Cow;
use std::collections::HashMap;
use std::future::Future;
use std::ops::Range;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::FutureExt;
use reqwest::redirect::Policy;
use tokio::sync::{mpsc, watch};

use crate::cache::CategoryCache;
use crate::config::Config;
use crate::content::{
    Article, CategoryMember, ContentError, ContentService, HttpImageFetcher, ImageFetcher,
    ImagePriority, WikipediaClient,
};
use crate::feed::{CategorySwitch, FeedViewModel, OverlayState, Surface, Viewport};
use crate::gesture::{
    GestureController, GestureEffect, GestureSurface, PointerKind, PointerPress, Settled,
};
use crate::liked::LikedStore;
use crate::pipeline::{
    self, ArticleStage, FetchOutcome, ImageOutcome, ImagePolicy, ImageState, PrefetchPipeline,
};
use crate::theme::{ColorPalette, ThemeVariant};
use crate::util::validate_url_for_open;

pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Card height in rows, borders included.
pub const CARD_HEIGHT: usize = 9;
pub const SHRUNK_CARD_HEIGHT: usize = 4;
/// Rows above the overlay's card list (header and loading line).
pub const OVERLAY_HEADER_ROWS: usize = 2;

/// Horizontal delta sent by the arrow keys, in wheel units.
pub const ARROW_WHEEL_DELTA: f64 = 50.0;
/// Horizontal delta of one mouse side-scroll notch.
pub const MOUSE_WHEEL_DELTA: f64 = 30.0;
/// Rows scrolled per vertical wheel notch.
pub const WHEEL_SCROLL_ROWS: isize = 3;

/// Content within this many cards of the bottom triggers an append.
const APPEND_DISTANCE_CARDS: usize = 2;
/// Images of cards within this many cards of the viewport load at high priority.
const PROXIMITY_CARDS: usize = 2;
const DOUBLE_CLICK: Duration = Duration::from_millis(400);
/// Delay before re-asking upstream after a round of random fetches all failed.
/// Doubles per failed round up to the cap.
const REFILL_BACKOFF_MIN: Duration = Duration::from_secs(1);
const REFILL_BACKOFF_MAX: Duration = Duration::from_secs(30);
const STATUS_TTL: Duration = Duration::from_secs(3);

// ============================================================================
// HTTP Client Configuration
// ============================================================================

/// Redirect policy: at most 3 hops, loops rejected.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }
        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }
        tracing::debug!(to = %url, hop = attempt.previous().len() + 1, "Following redirect");
        attempt.follow()
    })
}

/// Shared HTTP client for API and image requests. No global timeout; API
/// timeouts are opt-in per request and images use their own watchdog.
pub fn build_http_client(config: &Config) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .redirect(create_redirect_policy())
        .pool_max_idle_per_host(8)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()?;
    Ok(client)
}

// ============================================================================
// View and Event Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Feed,
    Liked,
}

/// Events from background tasks
pub enum AppEvent {
    ArticleFetched(Result<Article, ContentError>),
    StageChanged {
        title: String,
        stage: ArticleStage,
    },
    CategoryBatchDone {
        resolved: Vec<(String, Option<String>)>,
    },
    /// Members (and the first displayable article, if any) for an overlay
    /// generation.
    OverlayMembersLoaded {
        generation: u64,
        members: Arc<Vec<CategoryMember>>,
        first: Option<Article>,
    },
    OverlayCardsLoaded {
        generation: u64,
        articles: Vec<Article>,
        leftover: Vec<CategoryMember>,
    },
    ImageSettled {
        surface: Surface,
        generation: u64,
        title: String,
        outcome: ImageOutcome,
    },
    /// A background task panicked.
    TaskPanicked {
        task: &'static str,
        error: String,
    },
}

/// Run `future`, turning a panic into its message.
async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future).catch_unwind().await.map_err(|panic| {
        if let Some(s) = panic.downcast_ref::<&'static str>() {
            s.to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        }
    })
}

async fn send(tx: &mpsc::Sender<AppEvent>, event: AppEvent) {
    if tx.send(event).await.is_err() {
        tracing::debug!("Event receiver dropped");
    }
}

// ============================================================================
// Application State
// ============================================================================

pub struct App {
    pub config: Config,
    service: Arc<dyn ContentService>,
    images: Arc<dyn ImageFetcher>,
    image_policy: ImagePolicy,
    pub cache: Arc<CategoryCache>,
    pub pipeline: PrefetchPipeline,
    pub feed: FeedViewModel,
    pub main_gesture: GestureController,
    /// Present while the overlay is committed open.
    pub overlay_gesture: Option<GestureController>,
    pub liked: LikedStore,

    pub view: View,
    pub main_viewport: Viewport,
    pub overlay_viewport: Viewport,
    pub width: u16,
    pub liked_selected: usize,
    pub export_path: PathBuf,
    pub theme: ThemeVariant,
    pub palette: ColorPalette,
    pub show_help: bool,

    pub status_message: Option<(Cow<'static, str>, Instant)>,
    pub needs_redraw: bool,

    image_priorities: HashMap<(Surface, String), watch::Sender<ImagePriority>>,
    /// Category of the card under the active main-feed gesture, captured
    /// when the gesture started.
    swipe_category: Option<String>,
    refill_retry_at: Option<Instant>,
    refill_backoff: Duration,
    last_press: Option<(Instant, u16, u16)>,
    link_press: Option<String>,
    event_tx: mpsc::Sender<AppEvent>,
}

impl App {
    pub fn new(
        config: Config,
        service: Arc<dyn ContentService>,
        images: Arc<dyn ImageFetcher>,
        liked: LikedStore,
        event_tx: mpsc::Sender<AppEvent>,
    ) -> Self {
        let cache = CategoryCache::new(service.clone(), config.cache_capacity)
            .with_scan_limit(config.first_displayable_scan);
        let gesture_config = config.gesture_config();
        let theme = config.theme_variant();

        Self {
            image_policy: config.image_policy(),
            pipeline: PrefetchPipeline::new(config.queue_depth, config.category_batch_size),
            feed: FeedViewModel::new(config.scroll_settle()),
            main_gesture: GestureController::new(GestureSurface::MainFeed, 80.0, gesture_config),
            overlay_gesture: None,
            cache: Arc::new(cache),
            service,
            images,
            liked,
            view: View::Feed,
            main_viewport: Viewport::new(23, CARD_HEIGHT),
            overlay_viewport: Viewport::new(23 - OVERLAY_HEADER_ROWS, CARD_HEIGHT),
            width: 80,
            liked_selected: 0,
            export_path: PathBuf::from("liked-articles.md"),
            theme,
            palette: theme.palette(),
            show_help: false,
            status_message: None,
            needs_redraw: true,
            image_priorities: HashMap::new(),
            swipe_category: None,
            refill_retry_at: None,
            refill_backoff: REFILL_BACKOFF_MIN,
            last_press: None,
            link_press: None,
            event_tx,
            config,
        }
    }

    /// Build the app against the live Wikipedia APIs.
    pub fn from_config(
        config: Config,
        liked: LikedStore,
        event_tx: mpsc::Sender<AppEvent>,
    ) -> Result<Self> {
        let client = build_http_client(&config)?;
        let service = WikipediaClient::new(client.clone(), &config.rest_base_url, &config.action_api_url)?
            .with_member_page_size(config.category_page_size)
            .with_request_timeout(config.request_timeout());
        let images = HttpImageFetcher::new(client);
        Ok(Self::new(config, Arc::new(service), Arc::new(images), liked, event_tx))
    }

    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    pub fn cycle_theme(&mut self) {
        self.theme = self.theme.next();
        self.palette = self.theme.palette();
        self.set_status(format!("Theme: {}", self.theme.name()));
    }

    /// Returns true if a message was cleared.
    pub fn clear_expired_status(&mut self, now: Instant) -> bool {
        if let Some((_, at)) = &self.status_message {
            if now.saturating_duration_since(*at) >= STATUS_TTL {
                self.status_message = None;
                return true;
            }
        }
        false
    }

    /// Spawn a background task with panic reporting.
    fn spawn_task<F, Fut>(&self, task: &'static str, make: F)
    where
        F: FnOnce(mpsc::Sender<AppEvent>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let tx = self.event_tx.clone();
        let future = make(tx.clone());
        tokio::spawn(async move {
            if let Err(error) = catch_task_panic(future).await {
                tracing::error!(task, error = %error, "Background task panicked");
                send(&tx, AppEvent::TaskPanicked { task, error }).await;
            }
        });
    }

    // ------------------------------------------------------------------
    // Layout
    // ------------------------------------------------------------------

    pub fn card_height(&self) -> usize {
        if self.feed.is_shrunk() {
            SHRUNK_CARD_HEIGHT
        } else {
            CARD_HEIGHT
        }
    }

    /// Terminal resized. One row is reserved for the status bar.
    pub fn resize(&mut self, width: u16, height: u16, now: Instant) {
        let body = usize::from(height).saturating_sub(1);
        self.width = width;
        self.main_viewport.height = body;
        self.overlay_viewport.height = body.saturating_sub(OVERLAY_HEADER_ROWS);
        self.main_gesture.set_viewport_width(f64::from(width));
        if let Some(ctrl) = self.overlay_gesture.as_mut() {
            ctrl.set_viewport_width(f64::from(width));
        }
        self.relayout(now);
    }

    fn relayout(&mut self, now: Instant) {
        let card_height = self.card_height();
        for viewport in [&mut self.main_viewport, &mut self.overlay_viewport] {
            viewport.card_height = card_height;
        }
        let main_count = self.feed.cards().len();
        self.main_viewport.scroll_by(0, main_count);
        let overlay_count = self.feed.surface_cards(Surface::Category).len();
        self.overlay_viewport.scroll_by(0, overlay_count);
        self.update_current(now);
        self.fill_main_feed(now);
        self.escalate_nearby_images();
        self.needs_redraw = true;
    }

    pub fn toggle_shrunk(&mut self, now: Instant) {
        let shrunk = self.feed.toggle_shrunk();
        // Keep the same card at the top.
        let first = self.main_viewport.scroll / self.main_viewport.card_height;
        let overlay_first = self.overlay_viewport.scroll / self.overlay_viewport.card_height;
        let card_height = self.card_height();
        self.main_viewport.scroll = first * card_height;
        self.overlay_viewport.scroll = overlay_first * card_height;
        tracing::debug!(shrunk, "Display mode toggled");
        self.relayout(now);
    }

    /// Surface under a column, given the overlay's current slide position.
    pub fn surface_at(&self, column: u16) -> Surface {
        if self.feed.overlay().is_none() {
            return Surface::MainFeed;
        }
        let left = (self.feed.overlay_left_fraction() * f64::from(self.width)).round();
        if f64::from(column) >= left && left < f64::from(self.width) {
            Surface::Category
        } else {
            Surface::MainFeed
        }
    }

    /// Card index at a screen row of `surface`.
    pub fn card_at(&self, surface: Surface, row: u16) -> Option<usize> {
        let (viewport, offset) = match surface {
            Surface::MainFeed => (&self.main_viewport, 0),
            Surface::Category => (&self.overlay_viewport, OVERLAY_HEADER_ROWS),
        };
        let row = usize::from(row).checked_sub(offset)?;
        if row >= viewport.height {
            return None;
        }
        let index = (viewport.scroll + row) / viewport.card_height;
        (index < self.feed.surface_cards(surface).len()).then_some(index)
    }

    /// Page link under a screen row: the title line of a card.
    fn link_at(&self, surface: Surface, row: u16) -> Option<String> {
        let (viewport, offset) = match surface {
            Surface::MainFeed => (&self.main_viewport, 0),
            Surface::Category => (&self.overlay_viewport, OVERLAY_HEADER_ROWS),
        };
        let local = usize::from(row).checked_sub(offset)?;
        if (viewport.scroll + local) % viewport.card_height != 1 {
            return None;
        }
        let index = self.card_at(surface, row)?;
        Some(self.feed.surface_cards(surface)[index].article.page_url.clone())
    }

    fn proximity_range(&self, surface: Surface) -> Range<usize> {
        let viewport = match surface {
            Surface::MainFeed => &self.main_viewport,
            Surface::Category => &self.overlay_viewport,
        };
        let count = self.feed.surface_cards(surface).len();
        viewport.proximity_range(count, PROXIMITY_CARDS * viewport.card_height)
    }

    /// Surface that keyboard scrolling and actions apply to.
    pub fn focused_surface(&self) -> Surface {
        match self.feed.state() {
            OverlayState::Open { .. } | OverlayState::Closing { .. } => Surface::Category,
            OverlayState::Closed | OverlayState::Opening { .. } => Surface::MainFeed,
        }
    }

    pub fn focused_article(&self) -> Option<&Article> {
        match self.focused_surface() {
            Surface::MainFeed => self.feed.current_card().map(|c| &c.article),
            Surface::Category => {
                let overlay = self.feed.overlay()?;
                overlay.cards.get(overlay.selected).map(|c| &c.article)
            }
        }
    }

    fn is_dragging(&self) -> bool {
        self.main_gesture.is_tracking()
            || self.overlay_gesture.as_ref().is_some_and(|g| g.is_tracking())
    }

    /// Frames are needed while any gesture animates or a wheel swipe is live.
    pub fn is_animating(&self) -> bool {
        self.main_gesture.needs_frames()
            || self.overlay_gesture.as_ref().is_some_and(|g| g.needs_frames())
    }

    // ------------------------------------------------------------------
    // Main feed pipeline
    // ------------------------------------------------------------------

    pub fn start(&mut self) {
        tracing::info!(depth = self.pipeline.target_depth(), "Starting feed");
        self.refill_queue();
    }

    /// Issue random-article fetches for the queue deficit, in parallel.
    pub fn refill_queue(&mut self) {
        let count = self.pipeline.begin_refill();
        if count > 0 {
            tracing::debug!(count, queued = self.pipeline.len(), "Refilling article queue");
        }
        for _ in 0..count {
            let service = self.service.clone();
            self.spawn_task("random_article", move |tx| async move {
                let result = service.fetch_random_article().await;
                send(&tx, AppEvent::ArticleFetched(result)).await;
            });
        }
    }

    fn spawn_stage_prefetch(&self, article: Article) {
        let cache = self.cache.clone();
        self.spawn_task("category_prefetch", move |tx| async move {
            let title = article.title.clone();
            let stage = pipeline::prefetch_category(&cache, &article, |stage| {
                if matches!(stage, ArticleStage::MembersReady { .. } | ArticleStage::Uncategorized) {
                    return;
                }
                let event = AppEvent::StageChanged {
                    title: title.clone(),
                    stage,
                };
                if tx.try_send(event).is_err() {
                    tracing::debug!(title = %title, "Event channel full, stage update skipped");
                }
            })
            .await;
            send(&tx, AppEvent::StageChanged { title, stage }).await;
        });
    }

    fn spawn_category_batch(&self, batch: Vec<Article>) {
        let cache = self.cache.clone();
        self.spawn_task("category_batch", move |tx| async move {
            let resolved = pipeline::prefetch_batch(&cache, &batch).await;
            send(&tx, AppEvent::CategoryBatchDone { resolved }).await;
        });
    }

    /// Append queued articles while the viewport is unfilled or the end is
    /// near. An empty queue at the end asks upstream again.
    pub fn fill_main_feed(&mut self, now: Instant) {
        loop {
            let count = self.feed.cards().len();
            let distance = APPEND_DISTANCE_CARDS * self.main_viewport.card_height;
            if !self.main_viewport.near_end(count, distance) {
                break;
            }
            if !self.append_next_article(now) {
                self.refill_queue();
                break;
            }
        }
    }

    /// After a failed fetch leaves nothing in flight, schedule another refill
    /// so the feed recovers without user input.
    fn schedule_refill_retry(&mut self, now: Instant) {
        if self.pipeline.in_flight() > 0
            || self.pipeline.deficit() == 0
            || self.refill_retry_at.is_some()
        {
            return;
        }
        tracing::info!(
            backoff_ms = self.refill_backoff.as_millis() as u64,
            failures = self.pipeline.failures(),
            "All random fetches failed, retrying later"
        );
        self.refill_retry_at = Some(now + self.refill_backoff);
        self.refill_backoff = (self.refill_backoff * 2).min(REFILL_BACKOFF_MAX);
    }

    /// Move the next queued article into the feed. Returns false when the
    /// queue is empty.
    pub fn append_next_article(&mut self, now: Instant) -> bool {
        let Some(article) = self.pipeline.dequeue() else {
            return false;
        };
        let category = self.cache.cached_category(&article.title);
        tracing::debug!(title = %article.title, category = ?category, "Card added");
        self.feed.push_card(article, category);
        self.start_image_loads(Surface::MainFeed);
        self.refill_queue();
        self.update_current(now);
        self.needs_redraw = true;
        true
    }

    fn update_current(&mut self, now: Instant) {
        let count = self.feed.cards().len();
        let Some(index) = self.main_viewport.current_index(count) else {
            return;
        };
        if self.feed.current_index() == Some(index) {
            return;
        }
        let dragging = self.is_dragging();
        if let Some(switch) = self.feed.set_current(index, dragging, now) {
            self.load_overlay(switch);
        }
    }

    pub fn scroll_main(&mut self, delta: isize, now: Instant) {
        if self.main_viewport.scroll_by(delta, self.feed.cards().len()) {
            self.update_current(now);
            self.escalate_nearby_images();
            self.needs_redraw = true;
        }
        self.fill_main_feed(now);
    }

    pub fn scroll_overlay(&mut self, delta: isize, now: Instant) {
        let count = self.feed.surface_cards(Surface::Category).len();
        if count == 0 {
            return;
        }
        self.feed.note_overlay_scroll(now);
        if self.overlay_viewport.scroll_by(delta, count) {
            if let Some(index) = self.overlay_viewport.current_index(count) {
                self.feed.select_overlay_card(index);
            }
            self.escalate_nearby_images();
            self.needs_redraw = true;
        }
        let distance = APPEND_DISTANCE_CARDS * self.overlay_viewport.card_height;
        if self.overlay_viewport.near_end(count, distance) {
            self.feed.want_more_overlay_cards(self.config.overlay_scroll_batch);
            self.pump_overlay();
        }
    }

    /// Scroll whichever surface has focus.
    pub fn scroll_focused(&mut self, delta: isize, now: Instant) {
        match self.focused_surface() {
            Surface::MainFeed => self.scroll_main(delta, now),
            Surface::Category => self.scroll_overlay(delta, now),
        }
    }

    // ------------------------------------------------------------------
    // Category overlay
    // ------------------------------------------------------------------

    /// Populate the overlay for a switch token: members, first displayable
    /// article, then cards up to the target.
    fn load_overlay(&mut self, switch: CategorySwitch) {
        self.image_priorities.retain(|(surface, _), _| *surface != Surface::Category);
        self.overlay_viewport.scroll = 0;
        let transient = self.feed.overlay().is_some_and(|o| o.transient);
        self.feed.want_overlay_cards(if transient {
            1
        } else {
            self.config.overlay_preload
        });

        let cache = self.cache.clone();
        let CategorySwitch {
            generation,
            category,
        } = switch;
        tracing::debug!(%category, generation, "Loading category overlay");
        self.spawn_task("overlay_members", move |tx| async move {
            let members = cache.members(&category).await;
            let first = if members.is_empty() {
                None
            } else {
                cache.first_displayable(&category).await
            };
            send(
                &tx,
                AppEvent::OverlayMembersLoaded {
                    generation,
                    members,
                    first,
                },
            )
            .await;
        });
    }

    /// Start the next materialisation batch if the overlay is short of cards.
    fn pump_overlay(&mut self) {
        let Some(request) = self.feed.next_materialize_batch() else {
            return;
        };
        let service = self.service.clone();
        self.spawn_task("overlay_cards", move |tx| async move {
            let (articles, leftover) = pipeline::materialize_members(
                service.as_ref(),
                request.candidates,
                request.wanted,
                &request.skip,
            )
            .await;
            send(
                &tx,
                AppEvent::OverlayCardsLoaded {
                    generation: request.generation,
                    articles,
                    leftover,
                },
            )
            .await;
        });
    }

    fn new_overlay_gesture(&self) -> GestureController {
        GestureController::new(
            GestureSurface::CategoryView,
            f64::from(self.width),
            self.config.gesture_config(),
        )
    }

    /// The open swipe finished its commit animation.
    fn finish_open(&mut self) {
        if !self.feed.commit_open() {
            return;
        }
        tracing::info!(category = ?self.feed.overlay().map(|o| o.category.as_str()), "Category overlay opened");
        self.overlay_gesture = Some(self.new_overlay_gesture());
        self.feed.want_overlay_cards(self.config.overlay_preload);
        self.pump_overlay();
    }

    pub fn close_overlay(&mut self, now: Instant) {
        self.main_gesture.cancel_animation();
        if let Some(ctrl) = self.overlay_gesture.as_mut() {
            ctrl.cancel_animation();
        }
        self.feed.close_overlay();
        self.overlay_gesture = None;
        self.swipe_category = None;
        self.image_priorities.retain(|(surface, _), _| *surface != Surface::Category);
        self.main_gesture.start_cooldown(now);
        self.needs_redraw = true;
    }

    /// Keyboard open/close of the overlay for the current card.
    pub fn toggle_overlay(&mut self, now: Instant) {
        if self.feed.overlay().is_some() {
            self.close_overlay(now);
            return;
        }
        let Some(category) = self.feed.current_card().and_then(|c| c.category.clone()) else {
            self.set_status("No category known for this article yet");
            return;
        };
        if let Some(switch) = self.feed.open_overlay(category, false) {
            self.overlay_gesture = Some(self.new_overlay_gesture());
            self.load_overlay(switch);
            self.needs_redraw = true;
        }
    }

    // ------------------------------------------------------------------
    // Pointer and gestures
    // ------------------------------------------------------------------

    pub fn pointer_down(&mut self, column: u16, row: u16, kind: PointerKind, now: Instant) {
        if let Some((at, c, r)) = self.last_press.take() {
            if c == column && r == row && now.saturating_duration_since(at) < DOUBLE_CLICK {
                self.toggle_shrunk(now);
                return;
            }
        }
        self.last_press = Some((now, column, row));
        if self.view != View::Feed {
            return;
        }

        let surface = self.surface_at(column);
        self.link_press = self.link_at(surface, row);
        let press = PointerPress {
            x: f64::from(column),
            y: f64::from(row),
            kind,
            on_link: self.link_press.is_some(),
        };

        match surface {
            Surface::MainFeed => {
                self.swipe_category = self
                    .card_at(Surface::MainFeed, row)
                    .or(self.feed.current_index())
                    .and_then(|i| self.feed.cards().get(i))
                    .and_then(|c| c.category.clone());
                self.main_gesture.press(press, now);
            }
            Surface::Category => {
                if let Some(ctrl) = self.overlay_gesture.as_mut() {
                    ctrl.press(press, now);
                }
            }
        }
    }

    pub fn pointer_drag(&mut self, column: u16, row: u16) {
        let (x, y) = (f64::from(column), f64::from(row));
        if self.main_gesture.is_tracking() {
            let effect = self.main_gesture.drag(x, y);
            self.apply_main_effect(effect);
        } else if let Some(effect) = self
            .overlay_gesture
            .as_mut()
            .filter(|g| g.is_tracking())
            .map(|g| g.drag(x, y))
        {
            self.apply_overlay_effect(effect);
        }
        if self.is_dragging() {
            self.link_press = None;
        }
    }

    pub fn pointer_up(&mut self, column: u16, now: Instant) {
        let x = f64::from(column);
        if self.main_gesture.is_tracking() {
            let effect = self.main_gesture.release(x, now);
            self.apply_main_effect(effect);
        } else if let Some(effect) = self
            .overlay_gesture
            .as_mut()
            .filter(|g| g.is_tracking())
            .map(|g| g.release(x, now))
        {
            self.apply_overlay_effect(effect);
        }
        if let Some(url) = self.link_press.take() {
            self.open_page(&url);
        }
    }

    /// Horizontal wheel delta, routed to the focused surface.
    pub fn wheel_horizontal(&mut self, dx: f64, now: Instant) {
        if self.view != View::Feed {
            return;
        }
        if self.focused_surface() == Surface::Category {
            if let Some(effect) = self.overlay_gesture.as_mut().map(|g| g.wheel(dx, 0.0, now)) {
                self.apply_overlay_effect(effect);
            }
            return;
        }
        if !self.main_gesture.is_tracking() {
            self.swipe_category = self.feed.current_card().and_then(|c| c.category.clone());
        }
        let effect = self.main_gesture.wheel(dx, 0.0, now);
        self.apply_main_effect(effect);
    }

    fn apply_main_effect(&mut self, effect: GestureEffect) {
        let progress = match effect {
            GestureEffect::Reveal(progress) => progress,
            GestureEffect::CommitStarted(_) => self.main_gesture.position(),
            GestureEffect::None | GestureEffect::Yield | GestureEffect::CancelStarted => return,
        };
        if self.feed.overlay().is_none() {
            // No category known at gesture start: nothing to reveal.
            let Some(category) = self.swipe_category.clone() else {
                return;
            };
            if let Some(switch) = self.feed.open_overlay(category, true) {
                self.load_overlay(switch);
            }
        }
        if !matches!(self.feed.state(), OverlayState::Open { .. }) {
            self.feed.set_opening_progress(progress);
            self.needs_redraw = true;
        }
    }

    fn apply_overlay_effect(&mut self, effect: GestureEffect) {
        if let GestureEffect::Reveal(progress) = effect {
            self.feed.set_closing_progress(progress);
            self.needs_redraw = true;
        }
    }

    /// Periodic work: animation frames, wheel timeouts, status expiry, and
    /// retargeting the overlay once scrolling has settled.
    pub fn tick(&mut self, now: Instant) {
        if let Some(frame) = self.main_gesture.tick(now) {
            self.needs_redraw = true;
            match frame.settled {
                None => {
                    if self.feed.overlay().is_some()
                        && !matches!(self.feed.state(), OverlayState::Open { .. })
                    {
                        self.feed.set_opening_progress(frame.position);
                    }
                }
                Some(Settled::Committed(_)) => self.finish_open(),
                Some(Settled::Cancelled) => {
                    self.feed.cancel_open();
                    if self.feed.overlay().is_none() {
                        self.image_priorities
                            .retain(|(surface, _), _| *surface != Surface::Category);
                    }
                }
            }
        }

        if let Some(frame) = self.overlay_gesture.as_mut().and_then(|g| g.tick(now)) {
            self.needs_redraw = true;
            match frame.settled {
                None => self.feed.set_closing_progress(frame.position),
                Some(Settled::Committed(_)) => self.close_overlay(now),
                Some(Settled::Cancelled) => self.feed.settle_open(),
            }
        }

        if let Some(switch) = self.feed.sync_overlay_category(self.is_dragging(), now) {
            self.load_overlay(switch);
            self.needs_redraw = true;
        }
        if self.refill_retry_at.is_some_and(|at| now >= at) {
            self.refill_retry_at = None;
            self.refill_queue();
        }
        if self.clear_expired_status(now) {
            self.needs_redraw = true;
        }
    }

    // ------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------

    fn start_image_loads(&mut self, surface: Surface) {
        let generation = self.feed.generation();
        let nearby = self.proximity_range(surface);
        let pending: Vec<(usize, String, String)> = self
            .feed
            .surface_cards(surface)
            .iter()
            .enumerate()
            .filter(|(_, card)| card.image == ImageState::Pending)
            .filter_map(|(i, card)| {
                let url = card.article.image_url()?.to_string();
                Some((i, card.article.title.clone(), url))
            })
            .collect();

        for (index, title, url) in pending {
            let priority = if nearby.contains(&index) {
                ImagePriority::High
            } else {
                ImagePriority::Low
            };
            let (priority_tx, priority_rx) = watch::channel(priority);
            self.image_priorities
                .insert((surface, title.clone()), priority_tx);
            if let Some(state) = self.feed.card_image_mut(surface, &title) {
                *state = ImageState::Loading {
                    attempt: 1,
                    priority,
                };
            }

            let images = self.images.clone();
            let policy = self.image_policy.clone();
            self.spawn_task("image_load", move |tx| async move {
                let outcome = pipeline::load_image(images.as_ref(), &url, &policy, priority_rx).await;
                send(
                    &tx,
                    AppEvent::ImageSettled {
                        surface,
                        generation,
                        title,
                        outcome,
                    },
                )
                .await;
            });
        }
    }

    /// Raise images near either viewport to high priority.
    fn escalate_nearby_images(&mut self) {
        for surface in [Surface::MainFeed, Surface::Category] {
            let titles: Vec<String> = self.feed.surface_cards(surface)[self.proximity_range(surface)]
                .iter()
                .map(|c| c.article.title.clone())
                .collect();
            for title in titles {
                let Some(sender) = self.image_priorities.get(&(surface, title.clone())) else {
                    continue;
                };
                let raised = sender.send_if_modified(|p| {
                    let raise = *p < ImagePriority::High;
                    *p = ImagePriority::High;
                    raise
                });
                if raised {
                    if let Some(ImageState::Loading { priority, .. }) =
                        self.feed.card_image_mut(surface, &title)
                    {
                        *priority = ImagePriority::High;
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Background events
    // ------------------------------------------------------------------

    pub fn handle_event(&mut self, event: AppEvent, now: Instant) {
        self.needs_redraw = true;
        match event {
            AppEvent::ArticleFetched(result) => {
                let article = result.as_ref().ok().cloned();
                match self.pipeline.record_fetch(result) {
                    FetchOutcome::Queued { batch } => {
                        self.refill_backoff = REFILL_BACKOFF_MIN;
                        self.refill_retry_at = None;
                        if let Some(article) = article {
                            self.spawn_stage_prefetch(article);
                        }
                        if let Some(batch) = batch {
                            self.spawn_category_batch(batch);
                        }
                        self.fill_main_feed(now);
                    }
                    FetchOutcome::Duplicate => self.refill_queue(),
                    FetchOutcome::Failed => self.schedule_refill_retry(now),
                }
            }

            AppEvent::StageChanged { title, stage } => {
                let category = match &stage {
                    ArticleStage::CategoryResolved(category)
                    | ArticleStage::MembersReady { category, .. } => Some(category.clone()),
                    _ => None,
                };
                self.pipeline.set_stage(&title, stage);
                if let Some(category) = category {
                    self.on_category_known(&title, &category, now);
                }
            }

            AppEvent::CategoryBatchDone { resolved } => {
                for (title, category) in resolved {
                    if let Some(category) = category {
                        self.on_category_known(&title, &category, now);
                    }
                }
                if let Some(next) = self.pipeline.finish_batch() {
                    self.spawn_category_batch(next);
                }
            }

            AppEvent::OverlayMembersLoaded {
                generation,
                members,
                first,
            } => {
                if self.feed.apply_members(generation, &members, first) {
                    self.start_image_loads(Surface::Category);
                    self.pump_overlay();
                }
            }

            AppEvent::OverlayCardsLoaded {
                generation,
                articles,
                leftover,
            } => {
                if let Some(added) = self.feed.apply_materialized(generation, articles, leftover) {
                    tracing::debug!(added, "Category cards added");
                    self.start_image_loads(Surface::Category);
                    self.pump_overlay();
                }
            }

            AppEvent::ImageSettled {
                surface,
                generation,
                title,
                outcome,
            } => {
                if surface == Surface::Category && !self.feed.is_current(generation) {
                    return;
                }
                self.image_priorities.remove(&(surface, title.clone()));
                if let Some(state) = self.feed.card_image_mut(surface, &title) {
                    *state = ImageState::from(&outcome);
                }
            }

            AppEvent::TaskPanicked { task, error } => {
                tracing::error!(task, error = %error, "Background task panicked");
                self.set_status(format!("Internal error in {task}"));
            }
        }
    }

    fn on_category_known(&mut self, title: &str, category: &str, now: Instant) {
        let is_current = self
            .feed
            .current_card()
            .is_some_and(|c| c.article.title == title);
        if self.feed.set_card_category(title, category) && is_current {
            if let Some(switch) = self.feed.sync_overlay_category(self.is_dragging(), now) {
                self.load_overlay(switch);
            }
        }
    }

    // ------------------------------------------------------------------
    // Liked articles
    // ------------------------------------------------------------------

    pub async fn toggle_like_focused(&mut self) -> Result<()> {
        let Some(article) = self.focused_article().cloned() else {
            return Ok(());
        };
        let liked = self.liked.toggle(&article).await?;
        self.set_status(if liked {
            "\u{2665} Liked"
        } else {
            "Removed from liked"
        });
        Ok(())
    }

    pub fn is_liked(&self, title: &str) -> bool {
        self.liked.contains(title)
    }

    pub fn open_liked_view(&mut self) {
        if self.liked.is_empty() {
            self.set_status("No liked articles yet");
            return;
        }
        self.view = View::Liked;
        self.liked_selected = 0;
    }

    pub fn close_liked_view(&mut self) {
        self.view = View::Feed;
    }

    pub fn select_liked(&mut self, delta: isize) {
        let last = self.liked.len().saturating_sub(1);
        self.liked_selected = self.liked_selected.saturating_add_signed(delta).min(last);
    }

    pub fn open_selected_liked(&mut self) {
        if let Some(url) = self
            .liked
            .list()
            .get(self.liked_selected)
            .map(|a| a.page_url.clone())
        {
            self.open_page(&url);
        }
    }

    pub async fn remove_selected_liked(&mut self) -> Result<()> {
        let Some(title) = self
            .liked
            .list()
            .get(self.liked_selected)
            .map(|a| a.title.clone())
        else {
            return Ok(());
        };
        self.liked.remove(&title).await?;
        self.select_liked(0);
        if self.liked.is_empty() {
            self.view = View::Feed;
        }
        Ok(())
    }

    pub async fn clear_liked(&mut self) -> Result<()> {
        self.liked.clear().await?;
        self.view = View::Feed;
        self.set_status("Liked articles cleared");
        Ok(())
    }

    pub fn export_liked(&mut self) {
        match self.liked.export_to_file(&self.export_path) {
            Ok(()) => {
                let msg = format!(
                    "Exported {} liked articles to {}",
                    self.liked.len(),
                    self.export_path.display()
                );
                self.set_status(msg);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Liked export failed");
                self.set_status(format!("Export failed: {e}"));
            }
        }
    }

    // ------------------------------------------------------------------
    // Browser
    // ------------------------------------------------------------------

    pub fn open_page(&mut self, url: &str) {
        let Some(url) = validate_url_for_open(url) else {
            tracing::warn!(url, "Refusing to open non-web link");
            self.set_status("Cannot open link");
            return;
        };
        if let Err(e) = open::that(url.as_str()) {
            tracing::warn!(error = %e, "Failed to open browser");
            self.set_status(format!("Failed to open browser: {e}"));
        }
    }

    pub fn open_focused_page(&mut self) {
        if let Some(url) = self.focused_article().map(|a| a.page_url.clone()) {
            self.open_page(&url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn article(title: &str, thumbnail: bool) -> Article {
        Article {
            title: title.to_string(),
            extract: format!("{title} is an article."),
            thumbnail_url: thumbnail.then(|| format!("https://img.example.org/{title}.jpg")),
            original_image_url: None,
            page_url: format!("https://en.wikipedia.org/wiki/{title}"),
        }
    }

    /// Serves scripted random articles first, then uncategorised fillers.
    /// The first `random_failures` random fetches fail.
    #[derive(Default)]
    struct ScriptedService {
        random_failures: AtomicUsize,
        random: Mutex<VecDeque<Article>>,
        fillers: AtomicUsize,
        categories: HashMap<String, String>,
        members: HashMap<String, Vec<CategoryMember>>,
        summaries: HashMap<String, Article>,
    }

    #[async_trait]
    impl ContentService for ScriptedService {
        async fn fetch_random_article(&self) -> Result<Article, ContentError> {
            let failing = self
                .random_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(ContentError::HttpStatus(503));
            }
            let scripted = self.random.lock().unwrap().pop_front();
            Ok(scripted.unwrap_or_else(|| {
                let n = self.fillers.fetch_add(1, Ordering::SeqCst);
                article(&format!("Filler {n}"), false)
            }))
        }

        async fn fetch_category_of(&self, article: &Article) -> Option<String> {
            self.categories.get(&article.title).cloned()
        }

        async fn fetch_category_members(&self, category: &str) -> Vec<CategoryMember> {
            self.members.get(category).cloned().unwrap_or_default()
        }

        async fn fetch_article_summary(&self, title: &str) -> Result<Article, ContentError> {
            self.summaries
                .get(title)
                .cloned()
                .ok_or(ContentError::HttpStatus(404))
        }
    }

    struct InstantImages;

    #[async_trait]
    impl ImageFetcher for InstantImages {
        async fn fetch_image(&self, _url: &str, _priority: ImagePriority) -> Result<usize, ContentError> {
            Ok(1024)
        }
    }

    /// Every image request fails; counts the attempts.
    #[derive(Default)]
    struct BrokenImages {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImageFetcher for BrokenImages {
        async fn fetch_image(&self, _url: &str, _priority: ImagePriority) -> Result<usize, ContentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ContentError::HttpStatus(500))
        }
    }

    /// "Foo" has no image and sits in category "Bar", whose only member with
    /// an image is "Baz".
    fn foo_bar_baz() -> ScriptedService {
        ScriptedService {
            random: Mutex::new(VecDeque::from([article("Foo", false)])),
            categories: HashMap::from([("Foo".to_string(), "Bar".to_string())]),
            members: HashMap::from([(
                "Bar".to_string(),
                vec![CategoryMember::new("Foo", 0), CategoryMember::new("Baz", 0)],
            )]),
            summaries: HashMap::from([
                ("Foo".to_string(), article("Foo", false)),
                ("Baz".to_string(), article("Baz", true)),
            ]),
            ..Default::default()
        }
    }

    async fn setup(service: ScriptedService) -> (App, mpsc::Receiver<AppEvent>) {
        setup_with_images(service, Arc::new(InstantImages)).await
    }

    async fn setup_with_images(
        service: ScriptedService,
        images: Arc<dyn ImageFetcher>,
    ) -> (App, mpsc::Receiver<AppEvent>) {
        let config = Config {
            queue_depth: 3,
            ..Config::default()
        };
        let db = Database::open(":memory:").await.unwrap();
        let liked = LikedStore::load(db).await.unwrap();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let mut app = App::new(config, Arc::new(service), images, liked, tx);
        app.resize(80, 24, Instant::now());
        (app, rx)
    }

    /// Feed background events to the app until none arrive for a while.
    async fn drain(app: &mut App, rx: &mut mpsc::Receiver<AppEvent>) {
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
            app.handle_event(event, Instant::now());
        }
    }

    async fn started(service: ScriptedService) -> (App, mpsc::Receiver<AppEvent>) {
        let (mut app, mut rx) = setup(service).await;
        app.start();
        drain(&mut app, &mut rx).await;
        (app, rx)
    }

    #[tokio::test]
    async fn test_card_without_image_uses_fallback() {
        let (app, _rx) = started(foo_bar_baz()).await;
        let first = &app.feed.cards()[0];
        assert_eq!(first.article.title, "Foo");
        assert_eq!(first.image, ImageState::Fallback);
        assert_eq!(first.category.as_deref(), Some("Bar"));
        assert_eq!(app.feed.current_index(), Some(0));
    }

    #[tokio::test]
    async fn test_feed_fills_viewport_and_keeps_queue_topped_up() {
        let (app, _rx) = started(foo_bar_baz()).await;
        // 23 body rows of 9-row cards, plus two cards of lookahead.
        assert!(app.feed.cards().len() >= 5);
        assert_eq!(app.pipeline.len() + app.pipeline.in_flight(), 3);
    }

    fn outage(failures: usize) -> ScriptedService {
        ScriptedService {
            random_failures: AtomicUsize::new(failures),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_scroll_after_failed_refill_asks_again() {
        let (mut app, mut rx) = started(outage(3)).await;
        assert!(app.feed.cards().is_empty());
        assert_eq!(app.pipeline.len() + app.pipeline.in_flight(), 0);
        assert_eq!(app.pipeline.failures(), 3);

        app.scroll_main(9, Instant::now());
        drain(&mut app, &mut rx).await;
        assert!(!app.feed.cards().is_empty());
        assert!(app.feed.cards()[0].article.title.starts_with("Filler"));
    }

    #[tokio::test]
    async fn test_failed_refill_retried_after_backoff() {
        let (mut app, mut rx) = started(outage(3)).await;
        assert!(app.feed.cards().is_empty());

        // Still inside the backoff window.
        app.tick(Instant::now());
        assert_eq!(app.pipeline.in_flight(), 0);

        app.tick(Instant::now() + REFILL_BACKOFF_MIN);
        assert_eq!(app.pipeline.in_flight(), 3);
        drain(&mut app, &mut rx).await;
        assert!(!app.feed.cards().is_empty());
        assert_eq!(app.pipeline.len() + app.pipeline.in_flight(), 3);
    }

    #[tokio::test]
    async fn test_broken_image_ends_in_fallback_after_three_attempts() {
        let service = ScriptedService {
            random: Mutex::new(VecDeque::from([article("Foo", true)])),
            ..Default::default()
        };
        let images = Arc::new(BrokenImages::default());
        let (mut app, mut rx) = setup_with_images(service, images.clone()).await;

        // Database is open; only timers from here on.
        tokio::time::pause();
        app.start();
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(30), rx.recv()).await {
            app.handle_event(event, Instant::now());
        }

        let foo = app
            .feed
            .cards()
            .iter()
            .find(|c| c.article.title == "Foo")
            .unwrap();
        assert_eq!(foo.image, ImageState::Fallback);
        assert_eq!(images.calls.load(Ordering::SeqCst), 3);
        assert!(app.image_priorities.is_empty());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(images.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_swipe_left_opens_category_overlay() {
        let (mut app, mut rx) = started(foo_bar_baz()).await;
        let now = Instant::now();

        app.pointer_down(60, 5, PointerKind::Mouse, now);
        app.pointer_drag(20, 5);
        assert!(matches!(app.feed.state(), OverlayState::Opening { .. }));
        app.pointer_up(20, now);

        app.tick(now + Duration::from_millis(400));
        assert_eq!(
            app.feed.state(),
            &OverlayState::Open {
                category: "Bar".to_string()
            }
        );
        assert!(app.overlay_gesture.is_some());

        drain(&mut app, &mut rx).await;
        let overlay = app.feed.overlay().unwrap();
        let titles: Vec<_> = overlay.cards.iter().map(|c| c.article.title.as_str()).collect();
        assert_eq!(titles, vec!["Baz"]);
        assert_eq!(overlay.cards[0].image, ImageState::Loaded { bytes: 1024 });
        assert!(!overlay.loading);
    }

    #[tokio::test]
    async fn test_short_swipe_discards_transient_overlay() {
        let (mut app, _rx) = started(foo_bar_baz()).await;
        let now = Instant::now();

        app.pointer_down(60, 5, PointerKind::Mouse, now);
        app.pointer_drag(55, 5);
        assert!(app.feed.overlay().is_some());
        app.pointer_up(55, now);

        app.tick(now + Duration::from_millis(400));
        assert!(app.feed.overlay().is_none());
        assert_eq!(app.feed.state(), &OverlayState::Closed);
    }

    #[tokio::test]
    async fn test_swipe_on_uncategorised_card_reveals_nothing() {
        let (mut app, _rx) = started(ScriptedService::default()).await;
        let now = Instant::now();
        app.pointer_down(60, 5, PointerKind::Mouse, now);
        app.pointer_drag(10, 5);
        assert!(app.feed.overlay().is_none());
    }

    #[tokio::test]
    async fn test_wheel_close_starts_cooldown() {
        let (mut app, mut rx) = started(foo_bar_baz()).await;
        app.toggle_overlay(Instant::now());
        drain(&mut app, &mut rx).await;
        assert_eq!(app.focused_surface(), Surface::Category);

        let now = Instant::now();
        for _ in 0..4 {
            app.wheel_horizontal(-ARROW_WHEEL_DELTA, now);
        }
        let closed_at = now + Duration::from_millis(400);
        app.tick(closed_at);
        assert!(app.feed.overlay().is_none());

        // Re-opening right away is ignored.
        app.wheel_horizontal(ARROW_WHEEL_DELTA, closed_at + Duration::from_millis(100));
        assert!(app.feed.overlay().is_none());
        assert!(!app.main_gesture.is_tracking());
    }

    #[tokio::test]
    async fn test_stale_overlay_results_dropped() {
        let (mut app, mut rx) = started(foo_bar_baz()).await;
        app.toggle_overlay(Instant::now());
        let stale = app.feed.generation() - 1;
        app.handle_event(
            AppEvent::OverlayCardsLoaded {
                generation: stale,
                articles: vec![article("Intruder", true)],
                leftover: Vec::new(),
            },
            Instant::now(),
        );
        drain(&mut app, &mut rx).await;
        let overlay = app.feed.overlay().unwrap();
        assert!(overlay.cards.iter().all(|c| c.article.title != "Intruder"));
    }

    #[tokio::test]
    async fn test_like_and_export() {
        let (mut app, _rx) = started(foo_bar_baz()).await;
        let dir = std::env::temp_dir().join(format!("wikiscroll_app_export_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        app.export_path = dir.join("liked.md");

        app.toggle_like_focused().await.unwrap();
        assert!(app.is_liked("Foo"));
        app.export_liked();
        let exported = std::fs::read_to_string(&app.export_path).unwrap();
        assert_eq!(exported, "- [Foo](https://en.wikipedia.org/wiki/Foo)\n");

        app.open_liked_view();
        assert_eq!(app.view, View::Liked);
        app.remove_selected_liked().await.unwrap();
        assert_eq!(app.view, View::Feed);
        assert!(!app.is_liked("Foo"));
    }

    #[tokio::test]
    async fn test_liked_view_needs_entries() {
        let (mut app, _rx) = setup(ScriptedService::default()).await;
        app.open_liked_view();
        assert_eq!(app.view, View::Feed);
        assert!(app.status_message.is_some());
    }

    #[tokio::test]
    async fn test_double_click_toggles_shrunk() {
        let (mut app, _rx) = setup(ScriptedService::default()).await;
        let now = Instant::now();
        app.pointer_down(10, 3, PointerKind::Mouse, now);
        app.pointer_up(10, now);
        app.pointer_down(10, 3, PointerKind::Mouse, now + Duration::from_millis(200));
        assert!(app.feed.is_shrunk());
        assert_eq!(app.main_viewport.card_height, SHRUNK_CARD_HEIGHT);
    }

    #[tokio::test]
    async fn test_task_panic_reported() {
        let result = catch_task_panic(async { panic!("boom") }).await;
        assert_eq!(result, Err::<(), _>("boom".to_string()));

        let (mut app, _rx) = setup(ScriptedService::default()).await;
        app.handle_event(
            AppEvent::TaskPanicked {
                task: "image_load",
                error: "boom".to_string(),
            },
            Instant::now(),
        );
        let (msg, _) = app.status_message.as_ref().unwrap();
        assert_eq!(msg.as_ref(), "Internal error in image_load");
    }

    #[tokio::test]
    async fn test_status_expires() {
        let (mut app, _rx) = setup(ScriptedService::default()).await;
        app.set_status("Exported");
        let set_at = app.status_message.as_ref().unwrap().1;
        assert!(!app.clear_expired_status(set_at + Duration::from_secs(1)));
        assert!(app.clear_expired_status(set_at + STATUS_TTL));
        assert!(app.status_message.is_none());
    }
}
