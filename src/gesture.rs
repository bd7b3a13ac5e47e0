//! Horizontal swipe recognition for the main feed and the category view.
//!
//! One [`GestureController`] per surface. The main feed opens the overlay
//! with a leftward drag (or rightward wheel); the category view closes it
//! with a rightward drag (or leftward wheel). Positions are reveal progress
//! in percent, 0 meaning "where the gesture started".
//!
//! State machine: Idle → Dragging/Wheeling → Committing | Cancelling → Idle.
//! Animations are sampled by [`GestureController::tick`] and may be stopped
//! at any frame.

use std::f64::consts::PI;
use std::time::{Duration, Instant};

pub const DEFAULT_THRESHOLD: f64 = 0.2;
pub const DEFAULT_ANIMATION: Duration = Duration::from_millis(300);
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(500);

/// Vertical movement beyond this many rows, when it dominates, belongs to
/// vertical scrolling. One terminal row is roughly the height of a 10px
/// pointer wobble, so single-row jitter stays a swipe candidate.
const VERTICAL_YIELD: f64 = 1.0;
/// Horizontal wheel deltas at or below this are noise.
const WHEEL_DEADZONE: f64 = 5.0;
const WHEEL_SCALE: f64 = 10.0;
const WHEEL_STEP_CAP: f64 = 5.0;
/// A wheel gesture with no input for this long is abandoned.
const WHEEL_IDLE: Duration = Duration::from_millis(200);

/// Bounce easing over `k` in 0..=1.
pub fn bounce_out(k: f64) -> f64 {
    let k = k.clamp(0.0, 1.0);
    1.0 - (1.0 - k).powf(2.75) * (k.powf(1.5) * 2.5 * PI).cos().abs()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionAnimation {
    pub from: f64,
    pub to: f64,
    pub started: Instant,
    pub duration: Duration,
}

impl PositionAnimation {
    /// Position at `now`, and whether the animation has finished.
    pub fn sample(&self, now: Instant) -> (f64, bool) {
        let elapsed = now.saturating_duration_since(self.started);
        if self.duration.is_zero() || elapsed >= self.duration {
            return (self.to, true);
        }
        let k = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        (self.from + (self.to - self.from) * bounce_out(k), false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureSurface {
    MainFeed,
    CategoryView,
}

impl GestureSurface {
    fn min_contacts(self) -> u8 {
        match self {
            GestureSurface::MainFeed => 2,
            GestureSurface::CategoryView => 1,
        }
    }

    /// Drag travel in the surface's committing direction.
    fn drag_travel(self, dx: f64) -> Option<f64> {
        match self {
            GestureSurface::MainFeed if dx < 0.0 => Some(-dx),
            GestureSurface::CategoryView if dx > 0.0 => Some(dx),
            _ => None,
        }
    }

    /// Wheel deltas run opposite to finger drags.
    fn wheel_travel(self, dx: f64) -> Option<f64> {
        self.drag_travel(-dx)
    }

    pub fn resolution(self) -> Resolution {
        match self {
            GestureSurface::MainFeed => Resolution::Open,
            GestureSurface::CategoryView => Resolution::Close,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Pen,
    Touch { contacts: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerPress {
    pub x: f64,
    pub y: f64,
    pub kind: PointerKind,
    /// Pressed on a link; clicks there are never gestures.
    pub on_link: bool,
}

/// What a committed gesture does to the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Open,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GesturePhase {
    Idle,
    Dragging { origin_x: f64, origin_y: f64, position: f64 },
    Wheeling { travel: f64, last_input: Instant },
    Committing(PositionAnimation),
    Cancelling(PositionAnimation),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEffect {
    None,
    /// Leave the input to vertical scrolling.
    Yield,
    /// Reveal progress in percent.
    Reveal(f64),
    CommitStarted(Resolution),
    CancelStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Committed(Resolution),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub position: f64,
    pub settled: Option<Settled>,
}

#[derive(Debug, Clone, Copy)]
pub struct GestureConfig {
    /// Fraction of the viewport width a release must exceed to commit.
    pub threshold: f64,
    pub animation: Duration,
    pub cooldown: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            animation: DEFAULT_ANIMATION,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

#[derive(Debug)]
pub struct GestureController {
    surface: GestureSurface,
    config: GestureConfig,
    viewport_width: f64,
    phase: GesturePhase,
    /// Last rendered position, kept when an animation is stopped early.
    position: f64,
    cooldown_until: Option<Instant>,
}

impl GestureController {
    pub fn new(surface: GestureSurface, viewport_width: f64, config: GestureConfig) -> Self {
        Self {
            surface,
            config,
            viewport_width: viewport_width.max(1.0),
            phase: GesturePhase::Idle,
            position: 0.0,
            cooldown_until: None,
        }
    }

    pub fn surface(&self) -> GestureSurface {
        self.surface
    }

    pub fn phase(&self) -> &GesturePhase {
        &self.phase
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn set_viewport_width(&mut self, width: f64) {
        self.viewport_width = width.max(1.0);
    }

    /// Drag or wheel input in progress.
    pub fn is_tracking(&self) -> bool {
        matches!(
            self.phase,
            GesturePhase::Dragging { .. } | GesturePhase::Wheeling { .. }
        )
    }

    pub fn is_animating(&self) -> bool {
        matches!(
            self.phase,
            GesturePhase::Committing(_) | GesturePhase::Cancelling(_)
        )
    }

    /// Needs frame ticks: animating, or a wheel gesture waiting to time out.
    pub fn needs_frames(&self) -> bool {
        self.is_animating() || matches!(self.phase, GesturePhase::Wheeling { .. })
    }

    pub fn start_cooldown(&mut self, now: Instant) {
        self.cooldown_until = Some(now + self.config.cooldown);
    }

    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    fn threshold_px(&self) -> f64 {
        self.viewport_width * self.config.threshold
    }

    fn progress(&self, travel: f64) -> f64 {
        (travel / self.viewport_width).min(1.0) * 100.0
    }

    /// Stop any running animation where it is. Returns the position it
    /// stopped at.
    pub fn cancel_animation(&mut self) -> Option<f64> {
        if self.is_animating() {
            self.phase = GesturePhase::Idle;
            Some(self.position)
        } else {
            None
        }
    }

    /// Pointer down. Returns whether the press starts tracking.
    pub fn press(&mut self, press: PointerPress, now: Instant) -> bool {
        if press.on_link {
            return false;
        }
        if let PointerKind::Touch { contacts } = press.kind {
            if contacts < self.surface.min_contacts() {
                return false;
            }
        }
        if self.surface == GestureSurface::MainFeed && self.in_cooldown(now) {
            return false;
        }

        self.cancel_animation();
        self.phase = GesturePhase::Dragging {
            origin_x: press.x,
            origin_y: press.y,
            position: 0.0,
        };
        true
    }

    /// Pointer moved while pressed.
    pub fn drag(&mut self, x: f64, y: f64) -> GestureEffect {
        let GesturePhase::Dragging {
            origin_x,
            origin_y,
            position,
        } = &mut self.phase
        else {
            return GestureEffect::None;
        };

        let dx = x - *origin_x;
        let dy = y - *origin_y;
        if dy.abs() > dx.abs() && dy.abs() > VERTICAL_YIELD {
            return GestureEffect::Yield;
        }

        let Some(travel) = self.surface.drag_travel(dx) else {
            return GestureEffect::None;
        };
        let progress = (travel / self.viewport_width).min(1.0) * 100.0;
        *position = progress;
        self.position = progress;
        GestureEffect::Reveal(progress)
    }

    /// Pointer up. Commits when travel strictly exceeds the threshold.
    pub fn release(&mut self, x: f64, now: Instant) -> GestureEffect {
        let GesturePhase::Dragging {
            origin_x, position, ..
        } = self.phase
        else {
            return GestureEffect::None;
        };

        match self.surface.drag_travel(x - origin_x) {
            Some(travel) if travel > self.threshold_px() => self.start_commit(position, now),
            Some(_) => self.start_cancel(position, now),
            None => {
                self.phase = GesturePhase::Idle;
                GestureEffect::None
            }
        }
    }

    /// Horizontal wheel (or synthetic arrow-key) input.
    pub fn wheel(&mut self, dx: f64, dy: f64, now: Instant) -> GestureEffect {
        if dx.abs() <= dy.abs() || dx.abs() <= WHEEL_DEADZONE {
            return GestureEffect::None;
        }
        if self.is_animating()
            || (self.surface == GestureSurface::MainFeed && self.in_cooldown(now))
        {
            return GestureEffect::None;
        }
        if self.surface.wheel_travel(dx).is_none() {
            return GestureEffect::None;
        }

        let step = (dx.abs() / WHEEL_SCALE).min(WHEEL_STEP_CAP);
        let travel = match self.phase {
            GesturePhase::Wheeling { travel, .. } => travel + step,
            _ => step,
        };
        let progress = self.progress(travel);
        self.position = progress;

        if travel >= self.threshold_px() {
            return self.start_commit(progress, now);
        }
        self.phase = GesturePhase::Wheeling {
            travel,
            last_input: now,
        };
        GestureEffect::Reveal(progress)
    }

    /// Advance animations and wheel timeouts.
    pub fn tick(&mut self, now: Instant) -> Option<Frame> {
        match self.phase {
            GesturePhase::Wheeling { last_input, .. }
                if now.saturating_duration_since(last_input) >= WHEEL_IDLE =>
            {
                self.start_cancel(self.position, now);
                Some(Frame {
                    position: self.position,
                    settled: None,
                })
            }
            GesturePhase::Committing(animation) => {
                Some(self.advance(animation, now, Settled::Committed(self.surface.resolution())))
            }
            GesturePhase::Cancelling(animation) => Some(self.advance(animation, now, Settled::Cancelled)),
            _ => None,
        }
    }

    fn advance(&mut self, animation: PositionAnimation, now: Instant, outcome: Settled) -> Frame {
        let (position, done) = animation.sample(now);
        self.position = position;
        if !done {
            return Frame {
                position,
                settled: None,
            };
        }
        self.phase = GesturePhase::Idle;
        self.position = 0.0;
        Frame {
            position,
            settled: Some(outcome),
        }
    }

    fn start_commit(&mut self, from: f64, now: Instant) -> GestureEffect {
        self.phase = GesturePhase::Committing(PositionAnimation {
            from,
            to: 100.0,
            started: now,
            duration: self.config.animation,
        });
        tracing::debug!(surface = ?self.surface, from, "Swipe committed");
        GestureEffect::CommitStarted(self.surface.resolution())
    }

    fn start_cancel(&mut self, from: f64, now: Instant) -> GestureEffect {
        self.phase = GesturePhase::Cancelling(PositionAnimation {
            from,
            to: 0.0,
            started: now,
            duration: self.config.animation,
        });
        tracing::debug!(surface = ?self.surface, from, "Swipe cancelled");
        GestureEffect::CancelStarted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const WIDTH: f64 = 1000.0;

    fn controller(surface: GestureSurface) -> GestureController {
        GestureController::new(surface, WIDTH, GestureConfig::default())
    }

    fn mouse(x: f64, y: f64) -> PointerPress {
        PointerPress {
            x,
            y,
            kind: PointerKind::Mouse,
            on_link: false,
        }
    }

    fn revealed(effect: GestureEffect) -> f64 {
        match effect {
            GestureEffect::Reveal(progress) => progress,
            other => panic!("expected a reveal, got {other:?}"),
        }
    }

    fn close_to(actual: f64, expected: f64) -> bool {
        (actual - expected).abs() < 1e-9
    }

    fn finish(ctrl: &mut GestureController, start: Instant) -> Frame {
        ctrl.tick(start + Duration::from_millis(400)).unwrap()
    }

    #[test]
    fn test_bounce_endpoints() {
        assert_eq!(bounce_out(0.0), 0.0);
        assert_eq!(bounce_out(1.0), 1.0);
        assert_eq!(bounce_out(-3.0), 0.0);
    }

    proptest! {
        #[test]
        fn prop_bounce_within_unit(k in 0.0f64..=1.0) {
            let v = bounce_out(k);
            prop_assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_drag_just_over_threshold_commits() {
        let now = Instant::now();
        let mut ctrl = controller(GestureSurface::MainFeed);
        assert!(ctrl.press(mouse(800.0, 300.0), now));
        assert!(close_to(revealed(ctrl.drag(599.0, 300.0)), 20.1));
        assert_eq!(
            ctrl.release(599.0, now),
            GestureEffect::CommitStarted(Resolution::Open)
        );
        let frame = finish(&mut ctrl, now);
        assert_eq!(frame.settled, Some(Settled::Committed(Resolution::Open)));
        assert_eq!(frame.position, 100.0);
        assert_eq!(ctrl.phase(), &GesturePhase::Idle);
    }

    #[test]
    fn test_drag_just_under_threshold_cancels() {
        let now = Instant::now();
        let mut ctrl = controller(GestureSurface::MainFeed);
        ctrl.press(mouse(800.0, 300.0), now);
        ctrl.drag(601.0, 300.0);
        assert_eq!(ctrl.release(601.0, now), GestureEffect::CancelStarted);
        let frame = finish(&mut ctrl, now);
        assert_eq!(frame.settled, Some(Settled::Cancelled));
        assert_eq!(frame.position, 0.0);
    }

    #[test]
    fn test_exactly_threshold_cancels() {
        let now = Instant::now();
        let mut ctrl = controller(GestureSurface::MainFeed);
        ctrl.press(mouse(800.0, 300.0), now);
        ctrl.drag(600.0, 300.0);
        assert_eq!(ctrl.release(600.0, now), GestureEffect::CancelStarted);
    }

    #[test]
    fn test_wrong_direction_is_ignored() {
        let now = Instant::now();
        let mut main = controller(GestureSurface::MainFeed);
        main.press(mouse(100.0, 0.0), now);
        assert_eq!(main.drag(500.0, 0.0), GestureEffect::None);
        assert_eq!(main.release(500.0, now), GestureEffect::None);
        assert_eq!(main.phase(), &GesturePhase::Idle);

        let mut category = controller(GestureSurface::CategoryView);
        category.press(mouse(100.0, 0.0), now);
        assert!(close_to(revealed(category.drag(300.0, 0.0)), 20.0));
        assert_eq!(
            category.release(301.0, now),
            GestureEffect::CommitStarted(Resolution::Close)
        );
    }

    #[test]
    fn test_vertical_drag_yields() {
        let now = Instant::now();
        let mut ctrl = controller(GestureSurface::MainFeed);
        ctrl.press(mouse(500.0, 100.0), now);
        // Two rows down, one column across.
        assert_eq!(ctrl.drag(499.0, 102.0), GestureEffect::Yield);
        // A single row of wobble is still a horizontal candidate.
        assert!(close_to(revealed(ctrl.drag(490.0, 101.0)), 1.0));
    }

    #[test]
    fn test_touch_contact_requirements() {
        let now = Instant::now();
        let one = PointerPress {
            kind: PointerKind::Touch { contacts: 1 },
            ..mouse(0.0, 0.0)
        };
        let two = PointerPress {
            kind: PointerKind::Touch { contacts: 2 },
            ..one
        };
        assert!(!controller(GestureSurface::MainFeed).press(one, now));
        assert!(controller(GestureSurface::MainFeed).press(two, now));
        assert!(controller(GestureSurface::CategoryView).press(one, now));
    }

    #[test]
    fn test_link_press_ignored() {
        let press = PointerPress {
            on_link: true,
            ..mouse(0.0, 0.0)
        };
        assert!(!controller(GestureSurface::MainFeed).press(press, Instant::now()));
    }

    #[test]
    fn test_cooldown_blocks_main_feed() {
        let now = Instant::now();
        let mut ctrl = controller(GestureSurface::MainFeed);
        ctrl.start_cooldown(now);
        assert!(!ctrl.press(mouse(0.0, 0.0), now + Duration::from_millis(499)));
        assert_eq!(
            ctrl.wheel(60.0, 0.0, now + Duration::from_millis(100)),
            GestureEffect::None
        );
        assert!(ctrl.press(mouse(0.0, 0.0), now + Duration::from_millis(500)));
    }

    #[test]
    fn test_new_press_stops_animation_in_place() {
        let now = Instant::now();
        let mut ctrl = controller(GestureSurface::MainFeed);
        ctrl.press(mouse(800.0, 0.0), now);
        ctrl.drag(500.0, 0.0);
        ctrl.release(500.0, now);

        let mid = ctrl.tick(now + Duration::from_millis(100)).unwrap();
        assert_eq!(mid.settled, None);
        assert!(mid.position > 30.0 && mid.position <= 100.0);

        assert!(ctrl.press(mouse(800.0, 0.0), now + Duration::from_millis(120)));
        assert_eq!(ctrl.position(), mid.position);
        assert_eq!(ctrl.tick(now + Duration::from_millis(400)), None);
    }

    #[test]
    fn test_cancel_animation() {
        let now = Instant::now();
        let mut ctrl = controller(GestureSurface::CategoryView);
        assert_eq!(ctrl.cancel_animation(), None);
        ctrl.press(mouse(0.0, 0.0), now);
        ctrl.drag(50.0, 0.0);
        ctrl.release(50.0, now);
        assert!(close_to(ctrl.cancel_animation().unwrap(), 5.0));
        assert!(!ctrl.is_animating());
    }

    #[test]
    fn test_wheel_accumulates_to_commit() {
        let now = Instant::now();
        let mut ctrl = controller(GestureSurface::MainFeed);
        // Threshold is 200px; each capped step adds 5.
        for i in 0..39 {
            let effect = ctrl.wheel(80.0, 0.0, now + Duration::from_millis(i * 10));
            assert!(matches!(effect, GestureEffect::Reveal(_)), "step {i}: {effect:?}");
        }
        assert_eq!(
            ctrl.wheel(80.0, 0.0, now + Duration::from_millis(390)),
            GestureEffect::CommitStarted(Resolution::Open)
        );
    }

    #[test]
    fn test_wheel_filters() {
        let now = Instant::now();
        let mut ctrl = controller(GestureSurface::MainFeed);
        assert_eq!(ctrl.wheel(5.0, 0.0, now), GestureEffect::None);
        assert_eq!(ctrl.wheel(20.0, 30.0, now), GestureEffect::None);
        assert_eq!(ctrl.wheel(-40.0, 0.0, now), GestureEffect::None);
        assert!(close_to(revealed(ctrl.wheel(40.0, 0.0, now)), 0.4));

        let mut category = controller(GestureSurface::CategoryView);
        assert_eq!(category.wheel(40.0, 0.0, now), GestureEffect::None);
        assert!(close_to(revealed(category.wheel(-40.0, 0.0, now)), 0.4));
    }

    #[test]
    fn test_idle_wheel_cancels() {
        let now = Instant::now();
        let mut ctrl = controller(GestureSurface::MainFeed);
        ctrl.wheel(50.0, 0.0, now);
        assert_eq!(ctrl.tick(now + Duration::from_millis(100)), None);
        let frame = ctrl.tick(now + Duration::from_millis(250)).unwrap();
        assert_eq!(frame.settled, None);
        assert!(ctrl.is_animating());
        let frame = ctrl.tick(now + Duration::from_millis(600)).unwrap();
        assert_eq!(frame.settled, Some(Settled::Cancelled));
    }

    #[test]
    fn test_animation_sample() {
        let start = Instant::now();
        let animation = PositionAnimation {
            from: 40.0,
            to: 100.0,
            started: start,
            duration: Duration::from_millis(300),
        };
        assert_eq!(animation.sample(start), (40.0, false));
        assert_eq!(animation.sample(start + Duration::from_millis(300)), (100.0, true));
    }
}
