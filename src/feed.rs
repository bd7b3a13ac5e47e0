//! Feed view model: main-feed cards, the current card, and the category
//! overlay with its working member list.
//!
//! All methods are synchronous. Async results come back tagged with the
//! overlay generation they were requested under; anything from an older
//! generation is discarded.

use std::collections::{HashSet, VecDeque};
use std::ops::Range;
use std::time::{Duration, Instant};

use crate::content::{Article, CategoryMember};
use crate::pipeline::ImageState;

/// Summaries requested per wanted card when materialising category members.
pub const CANDIDATE_OVERSAMPLE: usize = 3;

/// Which scrolling surface a card lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    MainFeed,
    Category,
}

#[derive(Debug, Clone)]
pub struct Card {
    pub article: Article,
    pub image: ImageState,
    /// Known category of the article, if resolved yet.
    pub category: Option<String>,
}

impl Card {
    pub fn new(article: Article, category: Option<String>) -> Self {
        let image = if article.image_url().is_some() {
            ImageState::Pending
        } else {
            ImageState::Fallback
        };
        Self {
            article,
            image,
            category,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayState {
    Closed,
    /// Being dragged in from the right. `progress` is 0..=100.
    Opening { progress: f64, category: String },
    Open { category: String },
    /// Being dragged back out. `progress` is 0..=100.
    Closing { progress: f64 },
}

/// Token for a single-flight overlay population request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySwitch {
    pub generation: u64,
    pub category: String,
}

/// Request to turn category members into displayable cards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeRequest {
    pub generation: u64,
    pub wanted: usize,
    pub candidates: Vec<CategoryMember>,
    pub skip: HashSet<String>,
}

#[derive(Debug)]
pub struct CategoryOverlay {
    pub category: String,
    pub cards: Vec<Card>,
    pub loading: bool,
    /// Created by a drag that has not committed yet.
    pub transient: bool,
    pub selected: usize,
    /// Number of cards the overlay should hold.
    target: usize,
    members: VecDeque<CategoryMember>,
    members_loaded: bool,
    displayed: HashSet<String>,
    materializing: bool,
}

impl CategoryOverlay {
    fn new(category: String, transient: bool) -> Self {
        Self {
            category,
            cards: Vec::new(),
            loading: true,
            transient,
            selected: 0,
            target: 0,
            members: VecDeque::new(),
            members_loaded: false,
            displayed: HashSet::new(),
            materializing: false,
        }
    }

    fn reset(&mut self, category: String) {
        self.category = category;
        self.cards.clear();
        self.members.clear();
        self.displayed.clear();
        self.loading = true;
        self.materializing = false;
        self.members_loaded = false;
        self.target = 0;
        self.selected = 0;
    }

    fn push_card(&mut self, article: Article) -> bool {
        if !self.displayed.insert(article.title.clone()) {
            return false;
        }
        self.members.retain(|m| m.title != article.title);
        self.cards.push(Card::new(article, Some(self.category.clone())));
        true
    }

    pub fn remaining_members(&self) -> usize {
        self.members.len()
    }

    pub fn is_materializing(&self) -> bool {
        self.materializing
    }

    pub fn target(&self) -> usize {
        self.target
    }
}

pub struct FeedViewModel {
    cards: Vec<Card>,
    current: Option<usize>,
    overlay: Option<CategoryOverlay>,
    state: OverlayState,
    generation: u64,
    scroll_settle: Duration,
    overlay_scrolled_at: Option<Instant>,
    shrunk: bool,
}

impl FeedViewModel {
    pub fn new(scroll_settle: Duration) -> Self {
        Self {
            cards: Vec::new(),
            current: None,
            overlay: None,
            state: OverlayState::Closed,
            generation: 0,
            scroll_settle,
            overlay_scrolled_at: None,
            shrunk: false,
        }
    }

    // ------------------------------------------------------------------
    // Main feed
    // ------------------------------------------------------------------

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn push_card(&mut self, article: Article, category: Option<String>) -> usize {
        self.cards.push(Card::new(article, category));
        if self.current.is_none() {
            self.current = Some(0);
        }
        self.cards.len() - 1
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_card(&self) -> Option<&Card> {
        self.current.and_then(|i| self.cards.get(i))
    }

    /// Record a category resolved after the card was created.
    pub fn set_card_category(&mut self, title: &str, category: &str) -> bool {
        let mut changed = false;
        for card in self.cards.iter_mut().filter(|c| c.article.title == title) {
            if card.category.as_deref() != Some(category) {
                card.category = Some(category.to_string());
                changed = true;
            }
        }
        changed
    }

    /// Move the current card. Returns a switch token when the overlay should
    /// follow the new card's category.
    pub fn set_current(&mut self, index: usize, dragging: bool, now: Instant) -> Option<CategorySwitch> {
        if index >= self.cards.len() {
            return None;
        }
        self.current = Some(index);
        self.sync_overlay_category(dragging, now)
    }

    /// Retarget an open overlay at the current card's category.
    ///
    /// Skipped mid-drag, mid-transition, and while the overlay itself is
    /// still being scrolled.
    pub fn sync_overlay_category(&mut self, dragging: bool, now: Instant) -> Option<CategorySwitch> {
        if dragging || self.overlay_scrolling(now) {
            return None;
        }
        let OverlayState::Open { category: shown } = &self.state else {
            return None;
        };
        let wanted = self.current_card()?.category.clone()?;
        if *shown == wanted {
            return None;
        }
        self.begin_category_switch(wanted)
    }

    /// Point the overlay at `category`, dropping its cards and working list.
    /// Any request made under the previous generation becomes stale.
    pub fn begin_category_switch(&mut self, category: String) -> Option<CategorySwitch> {
        let overlay = self.overlay.as_mut()?;
        tracing::debug!(from = %overlay.category, to = %category, "Switching category overlay");
        overlay.reset(category.clone());
        if let OverlayState::Open { category: shown } = &mut self.state {
            *shown = category.clone();
        }
        self.generation += 1;
        Some(CategorySwitch {
            generation: self.generation,
            category,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.overlay.is_some() && generation == self.generation
    }

    pub fn surface_cards(&self, surface: Surface) -> &[Card] {
        match (surface, &self.overlay) {
            (Surface::MainFeed, _) => &self.cards,
            (Surface::Category, Some(overlay)) => &overlay.cards,
            (Surface::Category, None) => &[],
        }
    }

    pub fn card_image_mut(&mut self, surface: Surface, title: &str) -> Option<&mut ImageState> {
        let cards = match surface {
            Surface::MainFeed => &mut self.cards,
            Surface::Category => &mut self.overlay.as_mut()?.cards,
        };
        cards
            .iter_mut()
            .find(|c| c.article.title == title)
            .map(|c| &mut c.image)
    }

    // ------------------------------------------------------------------
    // Overlay lifecycle
    // ------------------------------------------------------------------

    pub fn overlay(&self) -> Option<&CategoryOverlay> {
        self.overlay.as_ref()
    }

    pub fn overlay_mut(&mut self) -> Option<&mut CategoryOverlay> {
        self.overlay.as_mut()
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    /// Create the overlay. No-op when one already exists.
    pub fn open_overlay(&mut self, category: String, transient: bool) -> Option<CategorySwitch> {
        if self.overlay.is_some() {
            return None;
        }
        self.overlay = Some(CategoryOverlay::new(category.clone(), transient));
        self.state = if transient {
            OverlayState::Opening {
                progress: 0.0,
                category: category.clone(),
            }
        } else {
            OverlayState::Open {
                category: category.clone(),
            }
        };
        self.generation += 1;
        tracing::debug!(%category, transient, "Category overlay created");
        Some(CategorySwitch {
            generation: self.generation,
            category,
        })
    }

    /// Drag progress while opening.
    pub fn set_opening_progress(&mut self, progress: f64) {
        let progress = progress.clamp(0.0, 100.0);
        match &mut self.state {
            OverlayState::Opening { progress: p, .. } => *p = progress,
            OverlayState::Closed | OverlayState::Open { .. } | OverlayState::Closing { .. } => {
                if let Some(overlay) = &self.overlay {
                    self.state = OverlayState::Opening {
                        progress,
                        category: overlay.category.clone(),
                    };
                }
            }
        }
    }

    /// Drag progress while closing.
    pub fn set_closing_progress(&mut self, progress: f64) {
        if self.overlay.is_some() {
            self.state = OverlayState::Closing {
                progress: progress.clamp(0.0, 100.0),
            };
        }
    }

    /// The open gesture committed; the overlay becomes permanent.
    pub fn commit_open(&mut self) -> bool {
        let Some(overlay) = self.overlay.as_mut() else {
            return false;
        };
        overlay.transient = false;
        self.state = OverlayState::Open {
            category: overlay.category.clone(),
        };
        true
    }

    /// The open gesture was cancelled. A transient overlay is discarded.
    pub fn cancel_open(&mut self) {
        match self.overlay.as_ref().map(|o| o.transient) {
            Some(true) => self.close_overlay(),
            Some(false) => self.settle_open(),
            None => self.state = OverlayState::Closed,
        }
    }

    /// A close drag was cancelled; the overlay stays open.
    pub fn settle_open(&mut self) {
        if let Some(overlay) = &self.overlay {
            self.state = OverlayState::Open {
                category: overlay.category.clone(),
            };
        }
    }

    pub fn close_overlay(&mut self) {
        if self.overlay.take().is_some() {
            tracing::debug!("Category overlay closed");
            self.generation += 1;
        }
        self.state = OverlayState::Closed;
        self.overlay_scrolled_at = None;
    }

    /// Fraction of the width the overlay's left edge sits at. 0.0 is fully
    /// shown, 1.0 is fully off-screen to the right.
    pub fn overlay_left_fraction(&self) -> f64 {
        match &self.state {
            OverlayState::Closed => 1.0,
            OverlayState::Opening { progress, .. } => 1.0 - progress / 100.0,
            OverlayState::Open { .. } => 0.0,
            OverlayState::Closing { progress } => progress / 100.0,
        }
    }

    // ------------------------------------------------------------------
    // Overlay population
    // ------------------------------------------------------------------

    /// Install the member list (and optional preloaded first article) for the
    /// token's generation. Returns false when the token is stale.
    pub fn apply_members(
        &mut self,
        generation: u64,
        members: &[CategoryMember],
        first: Option<Article>,
    ) -> bool {
        if !self.is_current(generation) {
            tracing::debug!(generation, current = self.generation, "Dropping stale category members");
            return false;
        }
        let Some(overlay) = self.overlay.as_mut() else {
            return false;
        };

        overlay.members_loaded = true;
        overlay.members = members
            .iter()
            .filter(|m| !overlay.displayed.contains(&m.title))
            .cloned()
            .collect();

        if let Some(first) = first.filter(|a| a.has_thumbnail()) {
            overlay.push_card(first);
        }
        if overlay.members.is_empty() || !overlay.cards.is_empty() {
            overlay.loading = false;
        }
        true
    }

    /// Ask for at least `total` cards in the overlay.
    pub fn want_overlay_cards(&mut self, total: usize) {
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.target = overlay.target.max(total);
        }
    }

    /// Ask for `more` cards beyond those already shown.
    pub fn want_more_overlay_cards(&mut self, more: usize) {
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.target = overlay.target.max(overlay.cards.len() + more);
        }
    }

    /// Take the next batch of candidate members toward the card target.
    /// Only one batch is outstanding per overlay, and none before the
    /// member list has arrived.
    pub fn next_materialize_batch(&mut self) -> Option<MaterializeRequest> {
        let generation = self.generation;
        let overlay = self.overlay.as_mut()?;
        let wanted = overlay.target.saturating_sub(overlay.cards.len());
        if wanted == 0 || overlay.materializing || !overlay.members_loaded {
            return None;
        }

        let mut candidates = Vec::with_capacity(wanted * CANDIDATE_OVERSAMPLE);
        while candidates.len() < wanted * CANDIDATE_OVERSAMPLE {
            let Some(member) = overlay.members.pop_front() else {
                break;
            };
            if member.is_article() && !overlay.displayed.contains(&member.title) {
                candidates.push(member);
            }
        }

        if candidates.is_empty() {
            overlay.loading = false;
            return None;
        }

        overlay.materializing = true;
        Some(MaterializeRequest {
            generation,
            wanted,
            candidates,
            skip: overlay.displayed.clone(),
        })
    }

    /// Install materialised articles. Returns how many cards were added, or
    /// `None` when the result was stale and discarded.
    pub fn apply_materialized(
        &mut self,
        generation: u64,
        articles: Vec<Article>,
        leftover: Vec<CategoryMember>,
    ) -> Option<usize> {
        if !self.is_current(generation) {
            tracing::debug!(generation, current = self.generation, "Dropping stale category cards");
            return None;
        }
        let overlay = self.overlay.as_mut()?;
        overlay.materializing = false;

        let mut added = 0;
        for article in articles {
            if article.has_thumbnail() && overlay.push_card(article) {
                added += 1;
            }
        }
        for member in leftover.into_iter().rev() {
            overlay.members.push_front(member);
        }
        overlay.loading = false;

        Some(added)
    }

    // ------------------------------------------------------------------
    // Overlay scroll and display mode
    // ------------------------------------------------------------------

    pub fn note_overlay_scroll(&mut self, now: Instant) {
        self.overlay_scrolled_at = Some(now);
    }

    /// True until `scroll_settle` has passed since the last overlay scroll.
    pub fn overlay_scrolling(&self, now: Instant) -> bool {
        self.overlay_scrolled_at
            .is_some_and(|at| now.saturating_duration_since(at) < self.scroll_settle)
    }

    pub fn select_overlay_card(&mut self, index: usize) {
        if let Some(overlay) = self.overlay.as_mut() {
            if index < overlay.cards.len() {
                overlay.selected = index;
            }
        }
    }

    pub fn is_shrunk(&self) -> bool {
        self.shrunk
    }

    pub fn toggle_shrunk(&mut self) -> bool {
        self.shrunk = !self.shrunk;
        self.shrunk
    }
}

// ============================================================================
// Viewport geometry
// ============================================================================

/// Row-based viewport over a list of equal-height cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// First visible row.
    pub scroll: usize,
    pub height: usize,
    pub card_height: usize,
}

impl Viewport {
    pub fn new(height: usize, card_height: usize) -> Self {
        Self {
            scroll: 0,
            height,
            card_height: card_height.max(1),
        }
    }

    pub fn content_height(&self, count: usize) -> usize {
        count * self.card_height
    }

    pub fn max_scroll(&self, count: usize) -> usize {
        self.content_height(count).saturating_sub(self.height)
    }

    /// Scroll by `delta` rows, clamped to the content. Returns true if the
    /// position changed.
    pub fn scroll_by(&mut self, delta: isize, count: usize) -> bool {
        let target = self
            .scroll
            .saturating_add_signed(delta)
            .min(self.max_scroll(count));
        let changed = target != self.scroll;
        self.scroll = target;
        changed
    }

    /// Share of card `index` inside the viewport, 0.0..=1.0.
    pub fn visibility_ratio(&self, index: usize) -> f64 {
        let top = index * self.card_height;
        let bottom = top + self.card_height;
        let visible_top = top.max(self.scroll);
        let visible_bottom = bottom.min(self.scroll + self.height);
        if visible_bottom <= visible_top {
            return 0.0;
        }
        (visible_bottom - visible_top) as f64 / self.card_height as f64
    }

    /// The first card at least half visible.
    pub fn current_index(&self, count: usize) -> Option<usize> {
        let first = self.scroll / self.card_height;
        (first..count)
            .take_while(|&i| i * self.card_height < self.scroll + self.height)
            .find(|&i| self.visibility_ratio(i) >= 0.5)
    }

    /// Cards within `margin` rows of the viewport.
    pub fn proximity_range(&self, count: usize, margin: usize) -> Range<usize> {
        let top = self.scroll.saturating_sub(margin);
        let bottom = self.scroll + self.height + margin;
        let start = (top / self.card_height).min(count);
        let end = bottom.div_ceil(self.card_height).min(count);
        start..end
    }

    /// The viewport reaches within `distance` rows of the end of the content.
    pub fn near_end(&self, count: usize, distance: usize) -> bool {
        self.scroll + self.height + distance >= self.content_height(count)
    }

    /// Content does not yet fill the viewport.
    pub fn underfilled(&self, count: usize) -> bool {
        self.content_height(count) <= self.height
    }
}
