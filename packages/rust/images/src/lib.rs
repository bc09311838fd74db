//! Quest image collection and per-objective image matching.
//!
//! This crate provides:
//! - [`ImageCollector`]: structural extraction plus reference-page scraping
//! - [`KeywordSet`]: keyword relevance scoring
//! - [`match_image`]: picks the image to show next to an objective

pub mod collector;
pub mod matching;
pub mod relevance;
pub mod scrape;

pub use collector::{ImageCollector, structural_images};
pub use matching::{MATCH_THRESHOLD, match_image, match_image_with};
pub use relevance::KeywordSet;
