//! Render functions for the TUI.
//!
//! Dispatches on the current view. The category overlay is drawn on top of
//! the main feed, shifted right by the open/close progress.

use crate::app::{App, View, OVERLAY_HEADER_ROWS};
use crate::feed::Surface;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Clear, Paragraph},
    Frame,
};

use super::{cards, help, liked, status};

/// Minimum terminal dimensions required for normal operation.
pub(super) const MIN_WIDTH: u16 = 30;
pub(super) const MIN_HEIGHT: u16 = 8;

pub(super) fn render(f: &mut Frame, app: &App) {
    let area = f.area();
    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = if area.height < 3 || area.width < 20 {
            Paragraph::new("Too small")
        } else {
            Paragraph::new(format!(
                "Terminal too small\n\nMinimum: {}x{}\nCurrent: {}x{}",
                MIN_WIDTH, MIN_HEIGHT, area.width, area.height
            ))
            .alignment(Alignment::Center)
        };
        f.render_widget(msg, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    match app.view {
        View::Feed => render_feed(f, app, chunks[0]),
        View::Liked => liked::render(f, app, chunks[0]),
    }
    status::render(f, app, chunks[1]);

    if app.show_help {
        help::render(f, app);
    }
}

fn render_feed(f: &mut Frame, app: &App, area: Rect) {
    if app.feed.cards().is_empty() {
        let msg = Paragraph::new("\n\nFetching random articles...")
            .style(app.palette.muted)
            .alignment(Alignment::Center);
        f.render_widget(msg, area);
    } else {
        cards::render_list(
            f,
            app,
            area,
            app.feed.cards(),
            &app.main_viewport,
            app.feed.current_index(),
        );
    }

    if app.feed.overlay().is_some() {
        render_overlay(f, app, area);
    }
}

fn render_overlay(f: &mut Frame, app: &App, area: Rect) {
    let Some(overlay) = app.feed.overlay() else {
        return;
    };
    let left = (app.feed.overlay_left_fraction() * f64::from(area.width)).round() as u16;
    if left >= area.width {
        return;
    }
    let panel = Rect {
        x: area.x + left,
        y: area.y,
        width: area.width - left,
        height: area.height,
    };
    f.render_widget(Clear, panel);

    let header_rows = OVERLAY_HEADER_ROWS as u16;
    let header = Rect {
        height: header_rows.min(panel.height),
        ..panel
    };
    let status_line = if overlay.loading && overlay.cards.is_empty() {
        Span::styled("Loading...", app.palette.overlay_loading)
    } else if overlay.cards.is_empty() {
        Span::styled("No articles with images in this category", app.palette.muted)
    } else if overlay.loading || overlay.is_materializing() {
        Span::styled(
            format!("{} articles, loading more...", overlay.cards.len()),
            app.palette.overlay_loading,
        )
    } else {
        Span::styled(format!("{} articles", overlay.cards.len()), app.palette.muted)
    };
    let lines = vec![
        Line::from(vec![
            Span::styled("\u{2190} ", app.palette.overlay_border),
            Span::styled(overlay.category.clone(), app.palette.overlay_header),
        ]),
        Line::from(status_line),
    ];
    f.render_widget(Paragraph::new(lines), header);

    let body = Rect {
        y: panel.y + header.height,
        height: panel.height.saturating_sub(header.height),
        ..panel
    };
    cards::render_list(
        f,
        app,
        body,
        app.feed.surface_cards(Surface::Category),
        &app.overlay_viewport,
        Some(overlay.selected),
    );
}
