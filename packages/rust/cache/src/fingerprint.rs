//! Content-addressed cache keys.

use serde::Serialize;
use sha2::{Digest, Sha256};

use questguide_shared::{ItemRef, Objective, QuestGuideError, Result};

/// Hex SHA-256 over a quest's identity, objective text, and the items each
/// objective references (with their imagery).
///
/// Two quests with the same id but different objective wording or item images
/// get different fingerprints, so edited quests are regenerated rather than
/// served stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

#[derive(Serialize)]
struct ObjectiveKey<'a> {
    description: &'a str,
    optional: bool,
    items: Vec<ItemKey<'a>>,
}

#[derive(Serialize)]
struct ItemKey<'a> {
    id: &'a str,
    icon_link: Option<&'a str>,
    image_link: Option<&'a str>,
}

impl<'a> From<&'a ItemRef> for ItemKey<'a> {
    fn from(item: &'a ItemRef) -> Self {
        Self {
            id: &item.id,
            icon_link: item.icon_link.as_deref(),
            image_link: item.image_link.as_deref(),
        }
    }
}

impl Fingerprint {
    /// Compute the fingerprint for `(quest_id, objectives)`.
    pub fn of(quest_id: &str, objectives: &[Objective]) -> Result<Self> {
        let keys: Vec<ObjectiveKey<'_>> = objectives
            .iter()
            .map(|o| ObjectiveKey {
                description: &o.description,
                optional: o.optional,
                items: o.marker_item.iter().chain(&o.items).map(ItemKey::from).collect(),
            })
            .collect();
        let serialized = serde_json::to_string(&keys).map_err(|e| {
            QuestGuideError::Cache(format!("failed to serialize objectives: {e}"))
        })?;

        let mut hasher = Sha256::new();
        hasher.update(quest_id.as_bytes());
        // Separator keeps ("ab", "[..]") and ("a", "b[..]") apart.
        hasher.update([0u8]);
        hasher.update(serialized.as_bytes());
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shard index derived from the leading hex digit.
    pub(crate) fn shard(&self, shard_count: usize) -> usize {
        let nibble = self
            .0
            .chars()
            .next()
            .and_then(|c| c.to_digit(16))
            .unwrap_or(0) as usize;
        nibble % shard_count
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form is enough to correlate log lines.
        write!(f, "{}", &self.0[..self.0.len().min(12)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objective(description: &str) -> Objective {
        Objective {
            id: String::new(),
            kind: "mark".into(),
            description: description.into(),
            optional: false,
            marker_item: None,
            items: vec![],
            count: None,
            found_in_raid: false,
        }
    }

    #[test]
    fn fingerprint_deterministic() {
        let objs = vec![objective("Mark the fuel tank"), objective("Survive and extract")];
        let a = Fingerprint::of("quest-1", &objs).unwrap();
        let b = Fingerprint::of("quest-1", &objs.clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn fingerprint_changes_with_objective_text() {
        let before = vec![objective("Mark the fuel tank")];
        let after = vec![objective("Mark the second fuel tank")];
        assert_ne!(
            Fingerprint::of("quest-1", &before).unwrap(),
            Fingerprint::of("quest-1", &after).unwrap()
        );
    }

    #[test]
    fn fingerprint_changes_with_optional_flag() {
        let required = vec![objective("Kill 5 Scavs")];
        let mut optional = required.clone();
        optional[0].optional = true;
        assert_ne!(
            Fingerprint::of("quest-1", &required).unwrap(),
            Fingerprint::of("quest-1", &optional).unwrap()
        );
    }

    #[test]
    fn fingerprint_ignores_non_text_fields() {
        let plain = vec![objective("Find the flash drive")];
        let mut with_meta = plain.clone();
        with_meta[0].id = "obj-9".into();
        with_meta[0].count = Some(1);
        assert_eq!(
            Fingerprint::of("quest-1", &plain).unwrap(),
            Fingerprint::of("quest-1", &with_meta).unwrap()
        );
    }

    #[test]
    fn fingerprint_changes_with_item_imagery() {
        let mut before = objective("Mark the fuel tank");
        before.marker_item = Some(ItemRef {
            id: "ms2000".into(),
            name: "MS2000 Marker".into(),
            short_name: None,
            icon_link: Some("https://assets.example/ms2000-icon.webp".into()),
            image_link: None,
        });
        let mut after = before.clone();
        if let Some(marker) = after.marker_item.as_mut() {
            marker.image_link = Some("https://assets.example/ms2000.webp".into());
        }

        assert_ne!(
            Fingerprint::of("quest-1", &[before]).unwrap(),
            Fingerprint::of("quest-1", &[after]).unwrap()
        );
    }

    #[test]
    fn fingerprint_differs_by_quest_id() {
        let objs = vec![objective("Find the flash drive")];
        assert_ne!(
            Fingerprint::of("quest-1", &objs).unwrap(),
            Fingerprint::of("quest-2", &objs).unwrap()
        );
    }

    #[test]
    fn shard_is_in_range() {
        let fp = Fingerprint::of("quest-1", &[]).unwrap();
        assert!(fp.shard(16) < 16);
        assert!(fp.shard(3) < 3);
    }
}
