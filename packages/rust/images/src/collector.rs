//! Quest image collection: structural images from the quest data plus
//! scraped images from the quest's reference page.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

use questguide_shared::{
    ImageConfig, ImageKind, ImageRef, ImageSet, ImageSource, ItemRef, Quest, QuestGuideError,
    Result, ScoredImageRef,
};

use crate::relevance::KeywordSet;
use crate::scrape::{self, ImageCandidate};

/// User-Agent string for reference-page requests.
const USER_AGENT: &str = concat!("QuestGuide/", env!("CARGO_PKG_VERSION"));

/// Collects structural and scraped images for a quest.
#[derive(Clone)]
pub struct ImageCollector {
    client: Client,
    config: ImageConfig,
}

impl ImageCollector {
    /// Create a collector with its own HTTP client.
    pub fn new(config: ImageConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| QuestGuideError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    /// Collect every image for `quest`. Never fails: a missing or unreachable
    /// reference page just means no scraped images.
    #[instrument(skip_all, fields(quest = %quest.name))]
    pub async fn collect(&self, quest: &Quest) -> ImageSet {
        let (map_image, objective_images) = structural_images(quest);

        let wiki_images = match quest.wiki_link.as_deref() {
            Some(link) => self.scrape(quest, link).await,
            None => Vec::new(),
        };

        let structural_count = objective_images.values().map(Vec::len).sum::<usize>()
            + usize::from(map_image.is_some());
        let total_images = structural_count + wiki_images.len();

        info!(
            structural = structural_count,
            scraped = wiki_images.len(),
            "image collection complete"
        );

        ImageSet {
            map_image,
            objective_images,
            wiki_images,
            total_images,
        }
    }

    /// Fetch and score the reference page. All failures degrade to an empty list.
    async fn scrape(&self, quest: &Quest, link: &str) -> Vec<ScoredImageRef> {
        let page_url = match Url::parse(link) {
            Ok(url) => url,
            Err(e) => {
                warn!(link, error = %e, "invalid reference page URL");
                return Vec::new();
            }
        };

        // Hard bound on the whole fetch, body included; the request is dropped on expiry.
        let html = match tokio::time::timeout(self.config.fetch_timeout, self.fetch_page(&page_url))
            .await
        {
            Ok(Ok(html)) => html,
            Ok(Err(e)) => {
                warn!(url = %page_url, error = %e, "reference page fetch failed");
                return Vec::new();
            }
            Err(_) => {
                warn!(
                    url = %page_url,
                    timeout_ms = duration_ms(self.config.fetch_timeout),
                    "reference page fetch timed out"
                );
                return Vec::new();
            }
        };

        self.score_page(&html, &page_url, &KeywordSet::for_quest(quest))
    }

    async fn fetch_page(&self, url: &Url) -> Result<String> {
        debug!(%url, "fetching reference page");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| QuestGuideError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QuestGuideError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| QuestGuideError::Network(format!("{url}: body read failed: {e}")))
    }

    /// Score candidate images on an already-fetched page and keep the best ones.
    ///
    /// An image is kept if it clears the relevance threshold or simply looks like
    /// article content; reference pages rarely have many on-topic images, so
    /// recall wins over precision here.
    pub fn score_page(&self, html: &str, page_url: &Url, keywords: &KeywordSet) -> Vec<ScoredImageRef> {
        let candidates = scrape::extract_candidates(html, page_url, self.config.min_dimension);
        let found = candidates.len();

        let mut scored: Vec<ScoredImageRef> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let score = keywords.score(&candidate.context);
                let accepted = score > self.config.relevance_threshold
                    || scrape::is_content_image(&candidate.url);
                accepted.then(|| to_scored(candidate, score))
            })
            .collect();

        // Stable sort keeps page order among equal scores.
        scored.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        scored.truncate(self.config.max_scraped);

        debug!(found, kept = scored.len(), "scored reference page images");
        scored
    }
}

fn to_scored(candidate: ImageCandidate, score: f64) -> ScoredImageRef {
    let description = if candidate.alt.is_empty() {
        candidate.context.chars().take(120).collect()
    } else {
        candidate.alt
    };
    ScoredImageRef {
        image: ImageRef {
            url: candidate.url,
            description,
            source: ImageSource::WikiScraped,
            kind: ImageKind::FullImage,
        },
        context: candidate.context,
        relevance_score: score.clamp(0.0, 1.0),
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Structural extraction
// ---------------------------------------------------------------------------

/// Images referenced directly by the quest data: the map image, and per
/// objective the marker item and required items.
pub fn structural_images(quest: &Quest) -> (Option<ImageRef>, BTreeMap<usize, Vec<ImageRef>>) {
    let map_image = quest.location.as_ref().and_then(|location| {
        location.image_link.as_ref().map(|url| ImageRef {
            url: url.clone(),
            description: format!("{} map", location.name),
            source: ImageSource::ApiStructured,
            kind: ImageKind::FullImage,
        })
    });

    let mut objective_images = BTreeMap::new();
    for (index, objective) in quest.objectives.iter().enumerate() {
        let mut images: Vec<ImageRef> = Vec::new();
        for item in objective.marker_item.iter().chain(&objective.items) {
            for image in item_images(item) {
                if !images.iter().any(|i| i.url == image.url) {
                    images.push(image);
                }
            }
        }
        if !images.is_empty() {
            objective_images.insert(index, images);
        }
    }

    (map_image, objective_images)
}

fn item_images(item: &ItemRef) -> impl Iterator<Item = ImageRef> + '_ {
    let full = item.image_link.as_ref().map(|url| (url, ImageKind::FullImage));
    let icon = item.icon_link.as_ref().map(|url| (url, ImageKind::Icon));
    full.into_iter().chain(icon).map(move |(url, kind)| ImageRef {
        url: url.clone(),
        description: item.name.clone(),
        source: ImageSource::ApiStructured,
        kind,
    })
}
