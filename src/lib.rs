//! Infinite-scroll terminal browser for random Wikipedia articles.
//!
//! The main feed is kept ahead of the reader by a prefetch queue of random
//! articles. Swiping a card reveals a category view listing other articles
//! from the same category; liked articles persist in a local SQLite store.

pub mod app;
pub mod cache;
pub mod config;
pub mod content;
pub mod feed;
pub mod gesture;
pub mod liked;
pub mod pipeline;
pub mod storage;
pub mod theme;
pub mod ui;
pub mod util;
