//! Terminal User Interface module.
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard and mouse handling
//! - `render` - View rendering dispatch
//! - `cards` - Card list widget for the feed and the category overlay
//! - `liked` - Liked articles list
//! - `help` - Keybinding overlay
//! - `status` - Status bar widget

mod cards;
mod help;
mod input;
mod liked;
mod loop_runner;
mod render;
mod status;

pub use loop_runner::{run, Action};
