//! Quest enrichment orchestrator.
//!
//! Checks the content cache, and on a miss runs guide generation and image
//! collection as two concurrent tasks over the same quest snapshot. A usable
//! guide plus the collected images is cached and returned; anything else
//! degrades to [`Enrichment::Baseline`] so the caller renders the plain quest.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use questguide_cache::{CacheStats, ContentCache};
use questguide_guide::{GuideGenerator, TextModel};
use questguide_images::{ImageCollector, MATCH_THRESHOLD, match_image_with};
use questguide_shared::{EnrichmentResult, Guide, ImageSet, Quest};

// ---------------------------------------------------------------------------
// Provider seams
// ---------------------------------------------------------------------------

/// Produces a guide for a quest, or `None` when generation failed.
pub trait GuideProvider: Send + Sync + 'static {
    fn generate(&self, quest: &Quest) -> impl Future<Output = Option<Guide>> + Send;
}

/// Collects images for a quest. Never fails; an empty set is a valid result.
pub trait ImageProvider: Send + Sync + 'static {
    fn collect(&self, quest: &Quest) -> impl Future<Output = ImageSet> + Send;

    /// Relevance a scraped image must exceed to be matched to an objective.
    fn match_threshold(&self) -> f64 {
        MATCH_THRESHOLD
    }
}

impl<M: TextModel + 'static> GuideProvider for GuideGenerator<M> {
    fn generate(&self, quest: &Quest) -> impl Future<Output = Option<Guide>> + Send {
        GuideGenerator::generate(self, quest)
    }
}

impl ImageProvider for ImageCollector {
    fn collect(&self, quest: &Quest) -> impl Future<Output = ImageSet> + Send {
        ImageCollector::collect(self, quest)
    }

    fn match_threshold(&self) -> f64 {
        self.config().match_threshold
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Outcome of [`Enricher::enrich`].
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment {
    /// Guide and images, either fresh or served from the cache.
    Enriched(Arc<EnrichmentResult>),
    /// Enrichment was not possible; show the unenriched quest.
    Baseline,
}

impl Enrichment {
    pub fn result(&self) -> Option<&EnrichmentResult> {
        match self {
            Self::Enriched(result) => Some(result),
            Self::Baseline => None,
        }
    }

    pub fn is_enriched(&self) -> bool {
        matches!(self, Self::Enriched(_))
    }
}

/// Cache-fronted enrichment over a guide and an image provider.
pub struct Enricher<G, I> {
    cache: Arc<ContentCache>,
    guides: Arc<G>,
    images: Arc<I>,
}

impl<G, I> Clone for Enricher<G, I> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            guides: Arc::clone(&self.guides),
            images: Arc::clone(&self.images),
        }
    }
}

impl<G: GuideProvider, I: ImageProvider> Enricher<G, I> {
    pub fn new(cache: Arc<ContentCache>, guides: G, images: I) -> Self {
        Self {
            cache,
            guides: Arc::new(guides),
            images: Arc::new(images),
        }
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// Enrich `quest`. Never fails: every error path ends in [`Enrichment::Baseline`].
    #[instrument(skip_all, fields(quest_id = %quest.id, objectives = quest.objectives.len()))]
    pub async fn enrich(&self, quest: &Quest) -> Enrichment {
        if let Some(cached) = self.cache.get(&quest.id, &quest.objectives) {
            debug!("served from cache");
            return Enrichment::Enriched(cached);
        }

        debug!("cache miss, generating guide and collecting images");
        let snapshot = Arc::new(quest.clone());

        let guide_task = {
            let guides = Arc::clone(&self.guides);
            let quest = Arc::clone(&snapshot);
            tokio::spawn(async move { guides.generate(&quest).await })
        };
        let image_task = {
            let images = Arc::clone(&self.images);
            let quest = Arc::clone(&snapshot);
            tokio::spawn(async move { images.collect(&quest).await })
        };

        let (guide, images) = tokio::join!(guide_task, image_task);

        let guide = match guide {
            Ok(Some(guide)) => guide,
            Ok(None) => {
                warn!("no usable guide, falling back to baseline");
                return Enrichment::Baseline;
            }
            Err(e) => {
                error!(error = %e, "guide task failed, falling back to baseline");
                return Enrichment::Baseline;
            }
        };
        let images = match images {
            Ok(images) => images,
            Err(e) => {
                error!(error = %e, "image task failed, falling back to baseline");
                return Enrichment::Baseline;
            }
        };

        let result = Arc::new(EnrichmentResult { guide, images });
        if !self
            .cache
            .set(&quest.id, &quest.objectives, Arc::clone(&result))
        {
            warn!("result not cached");
        }

        info!(images = result.images.total_images, "quest enriched");
        Enrichment::Enriched(result)
    }

    /// Drop any cached result for `quest` so the next [`enrich`](Self::enrich) regenerates.
    pub fn invalidate(&self, quest: &Quest) -> bool {
        self.cache.invalidate(&quest.id, &quest.objectives) > 0
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Image to show next to objective `index` of `quest`.
    pub fn match_image<'a>(
        &self,
        quest: &Quest,
        index: usize,
        images: &'a ImageSet,
    ) -> Option<&'a str> {
        let objective = quest.objectives.get(index)?;
        match_image_with(objective, index, images, self.images.match_threshold())
    }
}
