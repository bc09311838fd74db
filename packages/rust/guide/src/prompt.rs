//! Prompt construction for guide generation.
//!
//! The prompt asks for fixed markdown headings (`## Overview`,
//! `## Step-by-Step Guide` with one `### Objective N:` per objective, and
//! `## Priority Tips`) so the response can be segmented afterwards.

use std::fmt::Write;

use questguide_shared::Quest;

/// Extra instructions for quests whose name marks them as needing special guidance.
#[derive(Debug, Clone)]
pub struct SpecialCategory {
    pub name: String,
    /// Case-insensitive substrings of the quest name that select this category.
    pub keywords: Vec<String>,
    pub instructions: String,
}

impl SpecialCategory {
    /// Weapon-modification quests: build order and part sourcing matter more than routing.
    pub fn gunsmith() -> Self {
        Self {
            name: "Gunsmith".into(),
            keywords: vec!["gunsmith".into()],
            instructions: "This is a weapon modification quest. In addition to the standard sections:\n\
                - List every required part with its exact name.\n\
                - Give the installation order, starting from the base weapon.\n\
                - Call out common incompatibilities between parts and how to avoid them.\n\
                - Say where each part can be bought (trader and loyalty level) or found.\n\
                - State the target stats (ergonomics, recoil, weight, etc.) the build must hit."
                .into(),
        }
    }

    fn applies_to(&self, quest_name: &str) -> bool {
        let name = quest_name.to_lowercase();
        self.keywords.iter().any(|k| name.contains(&k.to_lowercase()))
    }
}

const FORMAT_INSTRUCTIONS: &str = "\
Write the guide in markdown using exactly these sections:

## Overview
Two or three sentences on what the quest involves and how hard it is.

## Step-by-Step Guide
One subsection per objective, in order, each headed `### Objective N: <objective text>`.
Under each, give concrete steps: where to go, what to bring, what to watch out for.
Where a screenshot or map would help, insert a placeholder on its own line like
`[IMAGE: short description of what the image should show]`.

## Priority Tips
A short bulleted list of the most important tips, most important first.";

/// Builds the single natural-language prompt sent to the model.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    categories: Vec<SpecialCategory>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            categories: vec![SpecialCategory::gunsmith()],
        }
    }
}

impl PromptBuilder {
    /// Register another special category.
    pub fn with_category(mut self, category: SpecialCategory) -> Self {
        self.categories.push(category);
        self
    }

    /// Categories matching this quest's name.
    pub fn categories_for<'a>(&'a self, quest: &'a Quest) -> impl Iterator<Item = &'a SpecialCategory> {
        self.categories.iter().filter(|c| c.applies_to(&quest.name))
    }

    pub fn build(&self, quest: &Quest) -> String {
        // `write!` into a String cannot fail.
        let mut p = String::with_capacity(2048);

        let _ = writeln!(p, "Write a player guide for the following quest.\n");
        let _ = writeln!(p, "Quest: {}", quest.name);
        let _ = writeln!(p, "Trader: {}", quest.trader);
        let _ = writeln!(p, "Location: {}", quest.location_name().unwrap_or("Any"));
        if let Some(level) = quest.min_player_level {
            let _ = writeln!(p, "Required level: {level}");
        }
        if !quest.prerequisite_quests.is_empty() {
            let _ = writeln!(p, "Prerequisite quests: {}", quest.prerequisite_quests.join(", "));
        }
        if !quest.trader_requirements.is_empty() {
            let reqs: Vec<String> = quest
                .trader_requirements
                .iter()
                .map(|r| format!("{} LL{}", r.trader, r.level))
                .collect();
            let _ = writeln!(p, "Trader requirements: {}", reqs.join(", "));
        }

        let _ = writeln!(p, "\nObjectives:");
        for (i, objective) in quest.objectives.iter().enumerate() {
            let optional = if objective.optional { " (optional)" } else { "" };
            let _ = writeln!(p, "{}. {}{optional}", i + 1, objective.description);
        }

        let rewards = &quest.rewards;
        let _ = writeln!(p, "\nRewards:");
        if rewards.experience > 0 {
            let _ = writeln!(p, "- {} EXP", rewards.experience);
        }
        for reward in &rewards.items {
            let _ = writeln!(p, "- {}x {}", reward.count, reward.item.name);
        }
        for unlock in &rewards.unlocks {
            let _ = writeln!(p, "- Unlocks purchase: {unlock}");
        }
        for rep in &rewards.reputation {
            let _ = writeln!(p, "- {} reputation {:+.2}", rep.trader, rep.delta);
        }

        for category in self.categories_for(quest) {
            let _ = writeln!(p, "\n{}", category.instructions);
        }

        let _ = write!(p, "\n{FORMAT_INSTRUCTIONS}");
        p
    }
}
