use ratatui::{
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

use crate::app::App;
use crate::util::{excerpt, strip_control_chars};

/// Extract characters shown per liked article.
const LIKED_EXCERPT_CHARS: usize = 100;

/// Render the liked-articles list: title plus a short excerpt per entry.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .liked
        .list()
        .iter()
        .map(|article| {
            let extract = strip_control_chars(&article.extract);
            ListItem::new(vec![
                Line::from(Span::styled(
                    strip_control_chars(&article.title).into_owned(),
                    app.palette.card_title,
                )),
                Line::from(Span::styled(
                    excerpt(&extract, LIKED_EXCERPT_CHARS).into_owned(),
                    app.palette.card_extract,
                )),
                Line::from(""),
            ])
        })
        .collect();

    let title = format!(" Liked articles ({}) ", app.liked.len());
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(app.palette.card_border_current)
                .title(title),
        )
        .highlight_style(app.palette.card_category.add_modifier(Modifier::REVERSED));

    let mut state = ListState::default();
    state.select(Some(app.liked_selected));
    f.render_stateful_widget(list, area, &mut state);
}
