//! Input handling for the TUI.
//!
//! Keys and mouse events are routed by view. Horizontal input in the feed
//! goes through the gesture controllers; arrow keys act as a synthetic
//! horizontal wheel.

use crate::app::{
    App, View, ARROW_WHEEL_DELTA, MOUSE_WHEEL_DELTA, WHEEL_SCROLL_ROWS,
};
use crate::feed::Surface;
use crate::gesture::PointerKind;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use std::time::Instant;

use super::Action;

/// Main key dispatch.
pub(super) async fn handle_key(app: &mut App, key: KeyEvent, now: Instant) -> Result<Action> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Ok(Action::Quit);
    }

    if app.show_help {
        if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc | KeyCode::Char('q')) {
            app.show_help = false;
        }
        return Ok(Action::Continue);
    }

    match app.view {
        View::Feed => handle_feed_key(app, key.code, now).await,
        View::Liked => handle_liked_key(app, key.code).await,
    }
}

async fn handle_feed_key(app: &mut App, code: KeyCode, now: Instant) -> Result<Action> {
    let card = app.card_height() as isize;
    let page = app.main_viewport.height.max(1) as isize;
    match code {
        KeyCode::Char('q') => return Ok(Action::Quit),
        KeyCode::Char('j') | KeyCode::Down => app.scroll_focused(card, now),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_focused(-card, now),
        KeyCode::PageDown | KeyCode::Char(' ') => app.scroll_focused(page, now),
        KeyCode::PageUp => app.scroll_focused(-page, now),
        KeyCode::Right => app.wheel_horizontal(ARROW_WHEEL_DELTA, now),
        KeyCode::Left => app.wheel_horizontal(-ARROW_WHEEL_DELTA, now),
        KeyCode::Char('c') => app.toggle_overlay(now),
        KeyCode::Esc => {
            if app.feed.overlay().is_some() {
                app.close_overlay(now);
            }
        }
        KeyCode::Char('s') => app.toggle_shrunk(now),
        KeyCode::Char('l') => app.toggle_like_focused().await?,
        KeyCode::Char('L') => app.open_liked_view(),
        KeyCode::Char('o') | KeyCode::Enter => app.open_focused_page(),
        KeyCode::Char('e') => app.export_liked(),
        KeyCode::Char('X') => app.clear_liked().await?,
        KeyCode::Char('t') => app.cycle_theme(),
        KeyCode::Char('?') => app.show_help = true,
        _ => {}
    }
    Ok(Action::Continue)
}

async fn handle_liked_key(app: &mut App, code: KeyCode) -> Result<Action> {
    match code {
        KeyCode::Char('q') => return Ok(Action::Quit),
        KeyCode::Char('j') | KeyCode::Down => app.select_liked(1),
        KeyCode::Char('k') | KeyCode::Up => app.select_liked(-1),
        KeyCode::Char('d') | KeyCode::Delete => app.remove_selected_liked().await?,
        KeyCode::Char('o') | KeyCode::Enter => app.open_selected_liked(),
        KeyCode::Char('e') => app.export_liked(),
        KeyCode::Char('X') => app.clear_liked().await?,
        KeyCode::Char('t') => app.cycle_theme(),
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Esc | KeyCode::Char('L') => app.close_liked_view(),
        _ => {}
    }
    Ok(Action::Continue)
}

/// Mouse dispatch. Presses, drags and releases of the left button feed the
/// gesture controllers; the wheel scrolls whatever is under the pointer.
pub(super) fn handle_mouse(app: &mut App, mouse: MouseEvent, now: Instant) {
    if app.show_help {
        return;
    }
    let shift = mouse.modifiers.contains(KeyModifiers::SHIFT);
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            app.pointer_down(mouse.column, mouse.row, PointerKind::Mouse, now);
        }
        MouseEventKind::Drag(MouseButton::Left) => app.pointer_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.pointer_up(mouse.column, now),
        // Shift+wheel is horizontal in most terminals.
        MouseEventKind::ScrollDown if shift => app.wheel_horizontal(MOUSE_WHEEL_DELTA, now),
        MouseEventKind::ScrollUp if shift => app.wheel_horizontal(-MOUSE_WHEEL_DELTA, now),
        MouseEventKind::ScrollRight => app.wheel_horizontal(MOUSE_WHEEL_DELTA, now),
        MouseEventKind::ScrollLeft => app.wheel_horizontal(-MOUSE_WHEEL_DELTA, now),
        MouseEventKind::ScrollDown => wheel_vertical(app, mouse.column, WHEEL_SCROLL_ROWS, now),
        MouseEventKind::ScrollUp => wheel_vertical(app, mouse.column, -WHEEL_SCROLL_ROWS, now),
        _ => {}
    }
}

fn wheel_vertical(app: &mut App, column: u16, rows: isize, now: Instant) {
    if app.view == View::Liked {
        app.select_liked(rows.signum());
        return;
    }
    match app.surface_at(column) {
        Surface::MainFeed => app.scroll_main(rows, now),
        Surface::Category => app.scroll_overlay(rows, now),
    }
}
