//! Core domain types: quests as supplied by the game-data API, and the
//! enrichment results produced from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Quest (as supplied by the data source)
// ---------------------------------------------------------------------------

/// A quest snapshot. Field names follow the data API's camelCase wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
    /// Stable quest identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Trader who gives the quest.
    pub trader: String,
    /// Map the quest takes place on, if it is bound to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Minimum player level required to start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_player_level: Option<u32>,
    /// Ordered objective list.
    #[serde(default)]
    pub objectives: Vec<Objective>,
    /// Names of quests that must be completed first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prerequisite_quests: Vec<String>,
    /// Trader loyalty levels required to start.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trader_requirements: Vec<TraderRequirement>,
    /// Completion rewards.
    #[serde(default)]
    pub rewards: Rewards,
    /// Reference (wiki) page for the quest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiki_link: Option<String>,
    /// Quest artwork shown in the baseline view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_link: Option<String>,
    /// Whether the quest is required for the Kappa container.
    #[serde(default)]
    pub kappa_required: bool,
    /// Whether the quest is required for the Lightkeeper questline.
    #[serde(default)]
    pub lightkeeper_required: bool,
}

impl Quest {
    /// Name of the quest's map, if any.
    pub fn location_name(&self) -> Option<&str> {
        self.location.as_ref().map(|l| l.name.as_str())
    }

    /// Objective descriptions in order.
    pub fn objective_descriptions(&self) -> impl Iterator<Item = &str> {
        self.objectives.iter().map(|o| o.description.as_str())
    }
}

/// A map a quest is bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub name: String,
    /// Map overview image, if the data source provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_link: Option<String>,
}

/// A single quest objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Objective {
    #[serde(default)]
    pub id: String,
    /// Objective type as reported by the API (e.g. `mark`, `giveItem`, `shoot`).
    #[serde(default, rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(default)]
    pub optional: bool,
    /// Marker item to place (for `mark` objectives).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_item: Option<ItemRef>,
    /// Items to find, hand over or plant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ItemRef>,
    /// Required count for item/kill objectives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Whether handed-over items must be found in raid.
    #[serde(default)]
    pub found_in_raid: bool,
}

/// Reference to an item, with whatever imagery the API attaches to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRef {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    /// Small inventory icon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_link: Option<String>,
    /// Full-size render.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_link: Option<String>,
}

/// A trader loyalty-level prerequisite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderRequirement {
    pub trader: String,
    pub level: u32,
}

/// Quest completion rewards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rewards {
    #[serde(default)]
    pub experience: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<RewardItem>,
    /// Trader offers unlocked on completion (item names).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unlocks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reputation: Vec<ReputationDelta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardItem {
    pub item: ItemRef,
    #[serde(default = "one")]
    pub count: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationDelta {
    pub trader: String,
    pub delta: f64,
}

// ---------------------------------------------------------------------------
// Enrichment results
// ---------------------------------------------------------------------------

/// AI guidance plus images for one quest. Immutable once cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub guide: Guide,
    pub images: ImageSet,
}

/// Model output segmented per objective.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Guide {
    pub overview: String,
    pub tips: String,
    /// One slot per quest objective; empty when unresolved.
    pub objectives: Vec<String>,
    /// Number of `[IMAGE: ...]` placeholders found in each objective slot.
    #[serde(default)]
    pub image_hints: Vec<usize>,
    /// Full model output, kept for diagnostics.
    pub raw: String,
}

impl Guide {
    /// Guidance for objective `index`, if that slot was resolved.
    pub fn objective(&self, index: usize) -> Option<&str> {
        self.objectives
            .get(index)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Where an image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    /// Referenced directly by the quest data (authoritative).
    ApiStructured,
    /// Discovered by scraping the quest's reference page.
    WikiScraped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Icon,
    FullImage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    pub description: String,
    pub source: ImageSource,
    pub kind: ImageKind,
}

/// A scraped image with its relevance to the quest in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredImageRef {
    #[serde(flatten)]
    pub image: ImageRef,
    /// Text surrounding the image on the reference page.
    #[serde(default)]
    pub context: String,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_image: Option<ImageRef>,
    /// Structural images keyed by objective index.
    #[serde(default)]
    pub objective_images: BTreeMap<usize, Vec<ImageRef>>,
    /// Scraped images, best score first.
    #[serde(default)]
    pub wiki_images: Vec<ScoredImageRef>,
    pub total_images: usize,
}

impl ImageSet {
    /// Number of structural images across all objectives.
    pub fn objective_image_count(&self) -> usize {
        self.objective_images.values().map(Vec::len).sum()
    }

    pub fn has_images(&self) -> bool {
        self.total_images > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUEST_JSON: &str = r#"{
        "id": "5967733e86f774602332fc84",
        "name": "Shortage",
        "trader": "Therapist",
        "location": { "name": "Interchange" },
        "minPlayerLevel": 3,
        "objectives": [
            {
                "id": "obj-1",
                "type": "findItem",
                "description": "Find Salewa first aid kit in raid",
                "count": 3,
                "foundInRaid": true,
                "items": [{ "name": "Salewa first aid kit", "iconLink": "https://assets.example/salewa-icon.webp" }]
            },
            { "description": "Hand over the kits", "optional": true }
        ],
        "rewards": { "experience": 3800, "reputation": [{ "trader": "Therapist", "delta": 0.08 }] },
        "wikiLink": "https://wiki.example/wiki/Shortage"
    }"#;

    #[test]
    fn quest_deserializes_from_api_shape() {
        let quest: Quest = serde_json::from_str(QUEST_JSON).expect("deserialize quest");
        assert_eq!(quest.name, "Shortage");
        assert_eq!(quest.location_name(), Some("Interchange"));
        assert_eq!(quest.objectives.len(), 2);
        assert_eq!(quest.objectives[0].kind, "findItem");
        assert!(quest.objectives[0].found_in_raid);
        assert!(quest.objectives[1].optional);
        assert_eq!(quest.rewards.experience, 3800);
        assert!(quest.prerequisite_quests.is_empty());
    }

    #[test]
    fn guide_objective_skips_empty_slots() {
        let guide = Guide {
            objectives: vec!["Go to the mall".into(), String::new()],
            ..Default::default()
        };
        assert_eq!(guide.objective(0), Some("Go to the mall"));
        assert_eq!(guide.objective(1), None);
        assert_eq!(guide.objective(5), None);
    }

    #[test]
    fn scored_image_flattens_on_the_wire() {
        let scored = ScoredImageRef {
            image: ImageRef {
                url: "https://wiki.example/a.png".into(),
                description: "Relay station".into(),
                source: ImageSource::WikiScraped,
                kind: ImageKind::FullImage,
            },
            context: "Relay station near the checkpoint".into(),
            relevance_score: 0.75,
        };
        let json = serde_json::to_value(&scored).expect("serialize");
        assert_eq!(json["source"], "wiki_scraped");
        assert_eq!(json["kind"], "full_image");
        assert_eq!(json["relevance_score"], 0.75);
    }

    #[test]
    fn image_set_counts() {
        let mut set = ImageSet::default();
        assert!(!set.has_images());
        set.objective_images.insert(
            0,
            vec![ImageRef {
                url: "https://assets.example/i.webp".into(),
                description: "Item".into(),
                source: ImageSource::ApiStructured,
                kind: ImageKind::Icon,
            }],
        );
        set.total_images = 1;
        assert_eq!(set.objective_image_count(), 1);
        assert!(set.has_images());
    }
}
