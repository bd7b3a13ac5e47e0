use crate::app::{App, View};
use crate::feed::Surface;
use crate::pipeline::ArticleStage;
use ratatui::{layout::Rect, widgets::Paragraph, Frame};
use std::borrow::Cow;

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    let text: Cow<'_, str> = if let Some((msg, _)) = &app.status_message {
        Cow::Borrowed(msg.as_ref())
    } else {
        match (app.view, app.focused_surface()) {
            (View::Liked, _) => Cow::Borrowed("[j/k]select [d]elete [o]pen [e]xport [Esc]back [q]uit"),
            (View::Feed, Surface::Category) => {
                Cow::Borrowed("[\u{2190}]close [j/k]scroll [l]ike [o]pen [s]hrink [?]help [q]uit")
            }
            (View::Feed, Surface::MainFeed) if app.feed.cards().is_empty() => {
                Cow::Owned(format!("Loading articles... ({} queued)", app.pipeline.len()))
            }
            (View::Feed, Surface::MainFeed) => {
                let hint = "[\u{2192}]category [j/k]scroll [l]ike [L]iked [o]pen [s]hrink [?]help [q]uit";
                let stage = app
                    .feed
                    .current_card()
                    .and_then(|card| app.pipeline.stage(&card.article.title));
                match stage.map(stage_label) {
                    Some(label) => Cow::Owned(format!("{label} | {hint}")),
                    None => Cow::Borrowed(hint),
                }
            }
        }
    };

    f.render_widget(Paragraph::new(text).style(app.palette.status_bar), area);
}

/// Prefetch progress of the current card's category.
fn stage_label(stage: &ArticleStage) -> Cow<'_, str> {
    match stage {
        ArticleStage::Fetched | ArticleStage::CategoryResolving => Cow::Borrowed("Finding category..."),
        ArticleStage::CategoryResolved(category) | ArticleStage::MembersPreloading(category) => {
            Cow::Owned(format!("Loading {category}..."))
        }
        ArticleStage::MembersReady { category, .. } => Cow::Owned(format!("Category: {category}")),
        ArticleStage::Uncategorized => Cow::Borrowed("No category"),
    }
}
