//! Keyword relevance scoring for scraped images.
//!
//! A keyword scores 2 when it appears in the context as a whole word and 1
//! when it only appears as a substring. The total is normalized by
//! `2 × keyword count`, giving a score in `[0, 1]`.

use regex::Regex;

use questguide_shared::{Objective, Quest};

/// Objective words shorter than this are too generic to be keywords.
const MIN_WORD_LEN: usize = 5;

#[derive(Debug, Clone)]
struct Keyword {
    text: String,
    whole_word: Option<Regex>,
}

/// Lowercased, de-duplicated keywords in insertion order.
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    keywords: Vec<Keyword>,
}

impl KeywordSet {
    /// Keywords for a whole quest: its name, its map name, and every
    /// long-enough word across all objective descriptions.
    pub fn for_quest(quest: &Quest) -> Self {
        let mut set = Self::default();
        set.push(&quest.name);
        if let Some(location) = quest.location_name() {
            set.push(location);
        }
        for description in quest.objective_descriptions() {
            set.extend_words(description);
        }
        set
    }

    /// Keywords for one objective: long-enough description words plus the
    /// names of any items it references.
    pub fn for_objective(objective: &Objective) -> Self {
        let mut set = Self::default();
        set.extend_words(&objective.description);
        if let Some(marker) = &objective.marker_item {
            set.push(&marker.name);
        }
        for item in &objective.items {
            set.push(&item.name);
        }
        set
    }

    pub fn from_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for keyword in keywords {
            set.push(keyword.as_ref());
        }
        set
    }

    fn extend_words(&mut self, text: &str) {
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() >= MIN_WORD_LEN)
        {
            self.push(word);
        }
    }

    fn push(&mut self, keyword: &str) {
        let text = keyword.trim().to_lowercase();
        if text.is_empty() || self.keywords.iter().any(|k| k.text == text) {
            return;
        }
        // `\b` never matches after a trailing `?` or `.`; bound on non-word chars instead.
        let whole_word =
            Regex::new(&format!(r"(?i)(?:^|\W){}(?:\W|$)", regex::escape(&text))).ok();
        self.keywords.push(Keyword { text, whole_word });
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(|k| k.text.as_str())
    }

    /// Relevance of `context` to this keyword set, in `[0, 1]`.
    pub fn score(&self, context: &str) -> f64 {
        if self.keywords.is_empty() || context.is_empty() {
            return 0.0;
        }

        let haystack = context.to_lowercase();
        let points: usize = self
            .keywords
            .iter()
            .map(|keyword| {
                if !haystack.contains(&keyword.text) {
                    0
                } else if keyword
                    .whole_word
                    .as_ref()
                    .is_some_and(|re| re.is_match(&haystack))
                {
                    2
                } else {
                    1
                }
            })
            .sum();

        points as f64 / (2 * self.keywords.len()) as f64
    }
}
