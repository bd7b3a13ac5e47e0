//! Help overlay: a centered keybinding table.

use crate::app::App;
use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Row, Table},
    Frame,
};

/// Sections of (key, description) pairs in display order.
const SECTIONS: &[(&str, &[(&str, &str)])] = &[
    (
        "Feed",
        &[
            ("j / k, wheel", "Scroll"),
            ("\u{2192} / wheel right", "Swipe toward the category view"),
            ("\u{2190} / wheel left", "Swipe the category view closed"),
            ("drag left / right", "Open / close the category view"),
            ("c", "Toggle the category view"),
            ("double-click, s", "Toggle shrunk cards"),
            ("click title, o", "Open article in browser"),
        ],
    ),
    (
        "Liked",
        &[
            ("l", "Like / unlike the focused article"),
            ("L", "Show liked articles"),
            ("d", "Remove selected (liked view)"),
            ("e", "Export liked articles as Markdown"),
            ("X", "Clear all liked articles"),
        ],
    ),
    (
        "General",
        &[
            ("t", "Cycle theme"),
            ("?", "Toggle this help"),
            ("Esc", "Back / close"),
            ("q", "Quit"),
        ],
    ),
];

pub fn render(f: &mut Frame, app: &App) {
    let overlay = centered_rect(70, 80, f.area());
    if overlay.width < 20 || overlay.height < 6 {
        return;
    }
    f.render_widget(Clear, overlay);

    let mut rows: Vec<Row> = Vec::new();
    for (label, bindings) in SECTIONS {
        if !rows.is_empty() {
            rows.push(Row::new(vec![String::new(), String::new()]));
        }
        rows.push(
            Row::new(vec![
                Line::from(Span::styled(
                    format!("-- {label} --"),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
            ])
            .style(app.palette.help_heading),
        );
        for (key, description) in *bindings {
            rows.push(Row::new(vec![format!("  {key}"), description.to_string()]));
        }
    }

    let widths = [Constraint::Length(24), Constraint::Min(20)];
    let table = Table::new(rows, widths).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(app.palette.card_border_current)
            .title(" Help (? to close) "),
    );
    f.render_widget(table, overlay);
}

/// Create a centered rectangle with the given percentage of the parent area.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let width = area.width * percent_x / 100;
    let height = area.height * percent_y / 100;
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
