//! Theme system for the TUI.
//!
//! `ThemeVariant` selects between Dark and Light palettes; each palette maps
//! the semantic roles of the feed to ratatui `Style` values.

use ratatui::style::{Color, Modifier, Style};

/// Available theme variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeVariant {
    #[default]
    Dark,
    Light,
}

impl ThemeVariant {
    /// Parse a variant name from a string (case-insensitive).
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            _ => None,
        }
    }

    pub fn palette(self) -> ColorPalette {
        match self {
            Self::Dark => ColorPalette::dark(),
            Self::Light => ColorPalette::light(),
        }
    }

    /// Cycle to the next variant: Dark → Light → Dark.
    pub fn next(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Dark => "Dark",
            Self::Light => "Light",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColorPalette {
    // -- Cards --
    pub card_border: Style,
    pub card_border_current: Style,
    pub card_title: Style,
    pub card_extract: Style,
    pub card_category: Style,
    pub card_liked: Style,
    /// Band drawn where a loaded image sits.
    pub image_loaded: Style,
    pub image_loading: Style,
    /// Flat background for cards without an image.
    pub image_fallback: Style,

    // -- Category overlay --
    pub overlay_border: Style,
    pub overlay_header: Style,
    pub overlay_loading: Style,

    // -- Chrome --
    pub status_bar: Style,
    pub help_heading: Style,
    pub muted: Style,
}

impl ColorPalette {
    fn dark() -> Self {
        Self {
            card_border: Style::default().fg(Color::DarkGray),
            card_border_current: Style::default().fg(Color::Cyan),
            card_title: Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            card_extract: Style::default(),
            card_category: Style::default().fg(Color::Cyan),
            card_liked: Style::default().fg(Color::Red),
            image_loaded: Style::default().bg(Color::Blue),
            image_loading: Style::default().fg(Color::DarkGray),
            image_fallback: Style::default().bg(Color::Rgb(40, 40, 48)),

            overlay_border: Style::default().fg(Color::Yellow),
            overlay_header: Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
            overlay_loading: Style::default().fg(Color::DarkGray),

            status_bar: Style::default().bg(Color::DarkGray).fg(Color::White),
            help_heading: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            muted: Style::default().fg(Color::DarkGray),
        }
    }

    /// Adapted for light terminal backgrounds.
    fn light() -> Self {
        Self {
            card_border: Style::default().fg(Color::Gray),
            card_border_current: Style::default().fg(Color::Blue),
            card_title: Style::default()
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            card_extract: Style::default().fg(Color::Black),
            card_category: Style::default().fg(Color::Blue),
            card_liked: Style::default().fg(Color::Magenta),
            image_loaded: Style::default().bg(Color::LightBlue),
            image_loading: Style::default().fg(Color::Gray),
            image_fallback: Style::default().bg(Color::Rgb(224, 224, 230)),

            overlay_border: Style::default().fg(Color::Magenta),
            overlay_header: Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
            overlay_loading: Style::default().fg(Color::DarkGray),

            status_bar: Style::default().bg(Color::White).fg(Color::Black),
            help_heading: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
            muted: Style::default().fg(Color::DarkGray),
        }
    }
}
