//! Picks the single best image to show next to an objective.
//!
//! Preference order:
//! 1. structural full image for the objective
//! 2. structural icon for the objective
//! 3. the best scraped image whose relevance to the objective clears the threshold
//! 4. the first scraped image
//!
//! Structural images always outrank scraped ones, whatever their score.

use questguide_shared::{ImageKind, ImageSet, Objective};

use crate::relevance::KeywordSet;

/// Default per-objective relevance a scraped image must exceed.
pub const MATCH_THRESHOLD: f64 = 0.5;

/// Best image URL for objective `index`, using [`MATCH_THRESHOLD`].
pub fn match_image<'a>(objective: &Objective, index: usize, images: &'a ImageSet) -> Option<&'a str> {
    match_image_with(objective, index, images, MATCH_THRESHOLD)
}

/// Best image URL for objective `index` with an explicit scraped-image threshold.
pub fn match_image_with<'a>(
    objective: &Objective,
    index: usize,
    images: &'a ImageSet,
    threshold: f64,
) -> Option<&'a str> {
    if let Some(structural) = images.objective_images.get(&index) {
        let by_kind = |kind: ImageKind| structural.iter().find(|i| i.kind == kind);
        if let Some(image) = by_kind(ImageKind::FullImage).or_else(|| by_kind(ImageKind::Icon)) {
            return Some(image.url.as_str());
        }
    }

    let keywords = KeywordSet::for_objective(objective);
    let mut best: Option<(f64, &str)> = None;
    for scraped in &images.wiki_images {
        let score = keywords
            .score(&scraped.context)
            .max(keywords.score(&scraped.image.description));
        if score > threshold && best.is_none_or(|(top, _)| score > top) {
            best = Some((score, scraped.image.url.as_str()));
        }
    }

    best.map(|(_, url)| url)
        .or_else(|| images.wiki_images.first().map(|i| i.image.url.as_str()))
}
