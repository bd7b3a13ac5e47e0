//! Card list widget shared by the main feed and the category overlay.
//!
//! Cards are drawn as fixed-height line blocks and the list is scrolled by
//! row, so a card can be partially visible at either edge.

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::{App, SHRUNK_CARD_HEIGHT};
use crate::feed::{Card, Viewport};
use crate::pipeline::ImageState;
use crate::theme::ColorPalette;
use crate::util::{display_width, strip_control_chars, truncate_to_width, wrap_to_width};

/// Rows of image band in a full-size card.
const IMAGE_ROWS: usize = 3;

struct CardStyle<'a> {
    palette: &'a ColorPalette,
    current: bool,
    liked: bool,
}

/// Render `cards` through `viewport`, highlighting `current`.
pub(super) fn render_list(
    f: &mut Frame,
    app: &App,
    area: Rect,
    cards: &[Card],
    viewport: &Viewport,
    current: Option<usize>,
) {
    if area.width < 4 || area.height < 1 || cards.is_empty() {
        return;
    }
    let height = viewport.card_height;
    let first = viewport.scroll / height;
    let last = (viewport.scroll + viewport.height).div_ceil(height).min(cards.len());

    let mut lines: Vec<Line<'static>> = Vec::with_capacity((last - first.min(last)) * height);
    for (index, card) in cards.iter().enumerate().take(last).skip(first) {
        let style = CardStyle {
            palette: &app.palette,
            current: current == Some(index),
            liked: app.is_liked(&card.article.title),
        };
        lines.extend(card_lines(card, area.width, height, &style));
    }

    let offset = u16::try_from(viewport.scroll - first * height).unwrap_or(0);
    f.render_widget(Paragraph::new(lines).scroll((offset, 0)), area);
}

/// Exactly `height` lines for one card. Row 1 is always the title link.
fn card_lines(card: &Card, width: u16, height: usize, style: &CardStyle<'_>) -> Vec<Line<'static>> {
    let inner = usize::from(width).saturating_sub(2);
    let border = if style.current {
        style.palette.card_border_current
    } else {
        style.palette.card_border
    };

    let label = card
        .category
        .as_deref()
        .map(|c| format!(" {} ", strip_control_chars(c)))
        .unwrap_or_default();
    let heart = if style.liked { "\u{2665} " } else { "\u{2661} " };
    let label = truncate_to_width(&label, inner.saturating_sub(display_width(heart))).into_owned();
    let used = display_width(&label) + display_width(heart);

    let mut lines = Vec::with_capacity(height);
    lines.push(Line::from(vec![
        Span::styled("\u{250c}", border),
        Span::styled(label, style.palette.card_category),
        Span::styled(heart, style.palette.card_liked),
        Span::styled("\u{2500}".repeat(inner.saturating_sub(used)), border),
        Span::styled("\u{2510}", border),
    ]));

    let title = strip_control_chars(&card.article.title).into_owned();
    lines.push(boxed(&title, inner, border, style.palette.card_title));

    let body_rows = height.saturating_sub(3);
    let (image_rows, extract_rows) = if height <= SHRUNK_CARD_HEIGHT {
        (0, body_rows)
    } else {
        (IMAGE_ROWS.min(body_rows), body_rows.saturating_sub(IMAGE_ROWS))
    };

    for row in 0..image_rows {
        let (text, fill) = image_band(&card.image, style.palette);
        let text = if row == image_rows / 2 { text } else { String::new() };
        lines.push(boxed(&text, inner, border, fill));
    }

    let extract = strip_control_chars(&card.article.extract);
    let mut wrapped = wrap_to_width(&extract, inner, extract_rows).into_iter();
    for _ in 0..extract_rows {
        let text = wrapped.next().unwrap_or_default();
        lines.push(boxed(&text, inner, border, style.palette.card_extract));
    }

    lines.push(Line::from(vec![
        Span::styled("\u{2514}", border),
        Span::styled("\u{2500}".repeat(inner), border),
        Span::styled("\u{2518}", border),
    ]));
    lines
}

fn image_band(state: &ImageState, palette: &ColorPalette) -> (String, Style) {
    match state {
        ImageState::Loaded { bytes } => (
            format!("\u{25a3} image {} KB", bytes.div_ceil(1024)),
            palette.image_loaded,
        ),
        ImageState::Loading { attempt: 1, .. } => ("loading image...".to_string(), palette.image_loading),
        ImageState::Loading { attempt, .. } => (
            format!("loading image... (attempt {attempt})"),
            palette.image_loading,
        ),
        ImageState::Pending => (String::new(), palette.image_loading),
        ImageState::Fallback => (String::new(), palette.image_fallback),
    }
}

/// One bordered row with `text` padded to the inner width.
fn boxed(text: &str, inner: usize, border: Style, fill: Style) -> Line<'static> {
    let text = truncate_to_width(text, inner);
    let pad = inner.saturating_sub(display_width(&text));
    Line::from(vec![
        Span::styled("\u{2502}", border),
        Span::styled(format!("{text}{}", " ".repeat(pad)), fill),
        Span::styled("\u{2502}", border),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::CARD_HEIGHT;
    use crate::content::Article;
    use crate::theme::ThemeVariant;

    fn card(image: ImageState) -> Card {
        let mut card = Card::new(
            Article {
                title: "Foo".to_string(),
                extract: "Foo is a word used as a placeholder in many examples.".to_string(),
                thumbnail_url: Some("https://img.example.org/foo.jpg".to_string()),
                original_image_url: None,
                page_url: "https://en.wikipedia.org/wiki/Foo".to_string(),
            },
            Some("Bar".to_string()),
        );
        card.image = image;
        card
    }

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_card_has_exact_height_and_width() {
        let palette = ThemeVariant::Dark.palette();
        let style = CardStyle {
            palette: &palette,
            current: true,
            liked: false,
        };
        for height in [CARD_HEIGHT, SHRUNK_CARD_HEIGHT] {
            let lines = card_lines(&card(ImageState::Pending), 40, height, &style);
            assert_eq!(lines.len(), height);
            for line in &lines {
                assert_eq!(display_width(&text(line)), 40);
            }
            assert!(text(&lines[1]).contains("Foo"));
        }
    }

    #[test]
    fn test_category_label_in_top_border() {
        let palette = ThemeVariant::Dark.palette();
        let style = CardStyle {
            palette: &palette,
            current: false,
            liked: true,
        };
        let lines = card_lines(&card(ImageState::Fallback), 30, CARD_HEIGHT, &style);
        let top = text(&lines[0]);
        assert!(top.contains(" Bar "));
        assert!(top.contains('\u{2665}'));

        let unliked = CardStyle { liked: false, ..style };
        let top = text(&card_lines(&card(ImageState::Fallback), 30, CARD_HEIGHT, &unliked)[0]);
        assert!(top.contains('\u{2661}'));
    }

    #[test]
    fn test_image_band_states() {
        let palette = ThemeVariant::Dark.palette();
        let (loaded, fill) = image_band(&ImageState::Loaded { bytes: 2048 }, &palette);
        assert_eq!(loaded, "\u{25a3} image 2 KB");
        assert_eq!(fill, palette.image_loaded);
        let (_, fallback) = image_band(&ImageState::Fallback, &palette);
        assert_eq!(fallback, palette.image_fallback);
    }
}
