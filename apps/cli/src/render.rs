//! Plain-text and JSON rendering of enrichment outcomes.

use std::fmt::Write;

use questguide_core::Enrichment;
use questguide_shared::{EnrichmentResult, Quest};

const RULE: &str = "────────────────────────────────────────";

/// Quest name, giver and requirements; shared by both views.
fn header(out: &mut String, quest: &Quest) {
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "  {}", quest.name);
    let _ = writeln!(
        out,
        "  Trader: {}   Map: {}",
        quest.trader,
        quest.location_name().unwrap_or("Any")
    );
    if let Some(level) = quest.min_player_level {
        let _ = writeln!(out, "  Level:  {level}");
    }
    if !quest.prerequisite_quests.is_empty() {
        let _ = writeln!(out, "  Requires: {}", quest.prerequisite_quests.join(", "));
    }
    let flags: Vec<&str> = [
        (quest.kappa_required, "Kappa"),
        (quest.lightkeeper_required, "Lightkeeper"),
    ]
    .into_iter()
    .filter_map(|(set, name)| set.then_some(name))
    .collect();
    if !flags.is_empty() {
        let _ = writeln!(out, "  Required for: {}", flags.join(", "));
    }
    let _ = writeln!(out, "{RULE}");
}

fn rewards(out: &mut String, quest: &Quest) {
    let rewards = &quest.rewards;
    if rewards.experience == 0 && rewards.items.is_empty() && rewards.unlocks.is_empty() {
        return;
    }
    let _ = writeln!(out, "\nRewards");
    if rewards.experience > 0 {
        let _ = writeln!(out, "  {} EXP", rewards.experience);
    }
    for reward in &rewards.items {
        let _ = writeln!(out, "  {}x {}", reward.count, reward.item.name);
    }
    for unlock in &rewards.unlocks {
        let _ = writeln!(out, "  Unlocks: {unlock}");
    }
}

fn indented(out: &mut String, text: &str) {
    for line in text.lines() {
        let _ = writeln!(out, "    {line}");
    }
}

/// The plain quest view, shown when no guide is available.
pub(crate) fn baseline(quest: &Quest) -> String {
    let mut out = String::new();
    header(&mut out, quest);

    let _ = writeln!(out, "\nObjectives");
    for (i, objective) in quest.objectives.iter().enumerate() {
        let optional = if objective.optional { " (optional)" } else { "" };
        let _ = writeln!(out, "  {}. {}{optional}", i + 1, objective.description);
    }
    rewards(&mut out, quest);

    if let Some(link) = &quest.wiki_link {
        let _ = writeln!(out, "\nWiki: {link}");
    }
    let _ = writeln!(out, "\n  (AI guide unavailable, showing quest details only)\n");
    out
}

/// The enriched view: overview, per-objective guidance with its image, tips.
pub(crate) fn enriched<'a>(
    quest: &Quest,
    result: &'a EnrichmentResult,
    image_for: impl Fn(usize) -> Option<&'a str>,
) -> String {
    let guide = &result.guide;
    let mut out = String::new();
    header(&mut out, quest);

    if !guide.overview.is_empty() {
        let _ = writeln!(out, "\nOverview");
        indented(&mut out, &guide.overview);
    }
    if let Some(map) = &result.images.map_image {
        let _ = writeln!(out, "  Map: {}", map.url);
    }

    for (i, objective) in quest.objectives.iter().enumerate() {
        let _ = writeln!(out, "\n  {}. {}", i + 1, objective.description);
        match guide.objective(i) {
            Some(text) => indented(&mut out, text),
            None => {
                let _ = writeln!(out, "    (no specific guidance)");
            }
        }
        if let Some(url) = image_for(i) {
            let _ = writeln!(out, "    Image: {url}");
        }
    }

    if !guide.tips.is_empty() {
        let _ = writeln!(out, "\nPriority Tips");
        indented(&mut out, &guide.tips);
    }
    rewards(&mut out, quest);
    let _ = writeln!(out, "\n  {} images collected\n", result.images.total_images);
    out
}

/// One entry of the `--json` report.
pub(crate) fn json_entry(quest: &Quest, outcome: &Enrichment) -> serde_json::Value {
    serde_json::json!({
        "questId": quest.id,
        "name": quest.name,
        "enriched": outcome.is_enriched(),
        "result": outcome.result(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use questguide_shared::{Guide, ImageSet, Objective, Rewards};

    fn quest() -> Quest {
        let objective = |d: &str| Objective {
            id: String::new(),
            kind: "visit".into(),
            description: d.into(),
            optional: false,
            marker_item: None,
            items: vec![],
            count: None,
            found_in_raid: false,
        };
        Quest {
            id: "q1".into(),
            name: "Checking".into(),
            trader: "Prapor".into(),
            location: None,
            min_player_level: Some(3),
            objectives: vec![objective("Reach the bunker"), objective("Find the key")],
            prerequisite_quests: vec![],
            trader_requirements: vec![],
            rewards: Rewards {
                experience: 1200,
                ..Rewards::default()
            },
            wiki_link: Some("https://wiki.example/Checking".into()),
            image_link: None,
            kappa_required: true,
            lightkeeper_required: false,
        }
    }

    fn result() -> EnrichmentResult {
        EnrichmentResult {
            guide: Guide {
                overview: "A quick run.".into(),
                tips: "- Go at night.".into(),
                objectives: vec!["Take the east gate.".into(), String::new()],
                image_hints: vec![0, 0],
                raw: String::new(),
            },
            images: ImageSet::default(),
        }
    }

    #[test]
    fn baseline_lists_objectives_and_notes_missing_guide() {
        let text = baseline(&quest());
        assert!(text.contains("Checking"));
        assert!(text.contains("1. Reach the bunker"));
        assert!(text.contains("2. Find the key"));
        assert!(text.contains("1200 EXP"));
        assert!(text.contains("Required for: Kappa"));
        assert!(text.contains("AI guide unavailable"));
    }

    #[test]
    fn enriched_places_guidance_and_images_per_objective() {
        let result = result();
        let text = enriched(&quest(), &result, |i| (i == 0).then_some("https://img/relay.png"));

        assert!(text.contains("A quick run."));
        assert!(text.contains("1. Reach the bunker\n    Take the east gate.\n    Image: https://img/relay.png"));
        assert!(text.contains("2. Find the key\n    (no specific guidance)"));
        assert!(text.contains("- Go at night."));
    }

    #[test]
    fn json_entry_marks_baseline() {
        let entry = json_entry(&quest(), &Enrichment::Baseline);
        assert_eq!(entry["enriched"], false);
        assert!(entry["result"].is_null());

        let entry = json_entry(&quest(), &Enrichment::Enriched(Arc::new(result())));
        assert_eq!(entry["result"]["guide"]["overview"], "A quick run.");
    }
}
