//! Enrichment orchestration for QuestGuide.
//!
//! Ties the content cache, guide generation and image collection together
//! behind [`Enricher::enrich`], which always answers with either an enriched
//! result or a baseline marker.

pub mod enrichment;

pub use enrichment::{Enricher, Enrichment, GuideProvider, ImageProvider};
