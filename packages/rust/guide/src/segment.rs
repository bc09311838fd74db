//! Segmentation of free-text model output into a [`Guide`].
//!
//! The model is asked for fixed headings but does not always comply, so each
//! objective slot is resolved through an ordered chain of strategies, first
//! success wins:
//!
//! 1. [`Strategy::Heading`]: an `Objective N` (or `### N.`) heading, bounded by
//!    the next objective or section heading.
//! 2. [`Strategy::Description`]: the first 30 characters of the objective's
//!    own text used as an anchor, capturing a bounded window after it.
//!
//! Only when *every* slot is still empty are the document-level strategies tried:
//!
//! 3. [`Strategy::Positional`]: split the guide block into chunks (numbered
//!    items, else blank-line paragraphs) and assign chunk `i` to objective `i`.
//!    Missing chunks leave trailing slots empty; surplus chunks are appended to
//!    the last slot.
//! 4. [`Strategy::FullText`]: every slot gets the whole response. This is
//!    also the result if segmentation itself fails.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use questguide_shared::{Guide, Objective, QuestGuideError, Result};

/// Characters of an objective description used as a search anchor.
const ANCHOR_CHARS: usize = 30;

/// Longest window captured after a description anchor.
const ANCHOR_WINDOW_CHARS: usize = 800;

/// Start of a markdown heading line: `#`s and/or opening bold.
const HEADING_PREFIX: &str = r"^[ \t]*(?:#{1,6}[ \t]*(?:\*\*)?|\*\*)[ \t]*";

static OVERVIEW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?im){HEADING_PREFIX}(?:quest[ \t]+)?overview\b.*$"))
        .expect("valid regex")
});

static TIPS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?im){HEADING_PREFIX}priority[ \t]+tips\b.*$")).expect("valid regex")
});

/// A bare `# Tips` heading. Needs real `#`s so inline `**Tips:**` labels
/// inside an objective are not taken for the section.
const PLAIN_TIPS_HEADING: &str = r"^[ \t]*#{1,6}[ \t]*(?:\*\*)?[ \t]*tips\b.*$";

static PLAIN_TIPS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("(?im){PLAIN_TIPS_HEADING}")).expect("valid regex"));

static GUIDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?im){HEADING_PREFIX}(?:step[- ]by[- ]step|walkthrough|objective[ \t]+guide)\b.*$"
    ))
    .expect("valid regex")
});

/// Any known top-level section heading.
static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?im){HEADING_PREFIX}(?:(?:quest[ \t]+)?overview|priority[ \t]+tips|step[- ]by[- ]step|walkthrough|objective[ \t]+guide)\b.*$|{PLAIN_TIPS_HEADING}"
    ))
    .expect("valid regex")
});

/// Any objective heading, whatever its number.
static OBJECTIVE_ANY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?im)^[ \t]*(?:#{{1,6}}[ \t]*)?(?:\*\*)?[ \t]*objective[ \t]+\d+\b.*$|{HEADING_PREFIX}\d+\.[ \t].*$"
    ))
    .expect("valid regex")
});

static NUMBERED_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\d+[.)][ \t]+").expect("valid regex"));

static BLANK_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("valid regex"));

static IMAGE_HINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[IMAGE:[^\]]*\]").expect("valid regex"));

/// How an objective slot was filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Heading,
    Description,
    Positional,
    FullText,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heading => "heading",
            Self::Description => "description",
            Self::Positional => "positional",
            Self::FullText => "full_text",
        }
    }
}

/// A segmented guide plus which strategy resolved each slot.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub guide: Guide,
    /// Parallel to `guide.objectives`; `None` for slots left empty.
    pub resolved_by: Vec<Option<Strategy>>,
}

/// Segment `raw` into overview, tips and one slot per objective. Never fails.
pub fn segment(raw: &str, objectives: &[Objective]) -> Segmentation {
    match try_segment(raw, objectives) {
        Ok(segmentation) => segmentation,
        Err(e) => {
            warn!(error = %e, "segmentation failed, using full text for every objective");
            let text = normalize(raw);
            let slots = vec![text; objectives.len()];
            finish(raw, String::new(), String::new(), slots, vec![
                Some(Strategy::FullText);
                objectives.len()
            ])
        }
    }
}

fn try_segment(raw: &str, objectives: &[Objective]) -> Result<Segmentation> {
    let text = normalize(raw);

    let overview = extract_overview(&text).unwrap_or_default();
    let tips = extract_tips(&text).unwrap_or_default();

    let mut slots = vec![String::new(); objectives.len()];
    let mut resolved_by = vec![None; objectives.len()];

    for (index, objective) in objectives.iter().enumerate() {
        let found = match by_heading(&text, index)? {
            Some(body) => Some((body, Strategy::Heading)),
            None => by_description(&text, &objective.description)?
                .map(|body| (body, Strategy::Description)),
        };
        if let Some((body, strategy)) = found {
            slots[index] = body;
            resolved_by[index] = Some(strategy);
        }
    }

    if !objectives.is_empty() && slots.iter().all(String::is_empty) {
        let chunks = split_guide_block(&text);
        if chunks.is_empty() {
            debug!("no guide chunks found, using full text for every objective");
            slots.fill(text.clone());
            resolved_by.fill(Some(Strategy::FullText));
        } else {
            debug!(chunks = chunks.len(), objectives = objectives.len(), "positional split");
            assign_positionally(chunks, &mut slots, &mut resolved_by);
        }
    }

    for (index, strategy) in resolved_by.iter().enumerate() {
        debug!(
            objective = index + 1,
            strategy = strategy.map_or("unresolved", |s| s.as_str()),
            "objective segmented"
        );
    }

    Ok(finish(raw, overview, tips, slots, resolved_by))
}

fn finish(
    raw: &str,
    overview: String,
    tips: String,
    slots: Vec<String>,
    resolved_by: Vec<Option<Strategy>>,
) -> Segmentation {
    let image_hints = slots
        .iter()
        .map(|s| IMAGE_HINT_RE.find_iter(s).count())
        .collect();
    Segmentation {
        guide: Guide {
            overview,
            tips,
            objectives: slots,
            image_hints,
            raw: raw.to_string(),
        },
        resolved_by,
    }
}

fn normalize(raw: &str) -> String {
    raw.replace("\r\n", "\n").trim().to_string()
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Byte offset just past the line containing `pos`.
fn next_line_start(text: &str, pos: usize) -> usize {
    text[pos..].find('\n').map_or(text.len(), |i| pos + i + 1)
}

/// Earliest boundary match at or after `from`, else end of text.
fn boundary(text: &str, from: usize, boundaries: &[&Regex]) -> usize {
    boundaries
        .iter()
        .filter_map(|re| re.find_at(text, from))
        .map(|m| m.start())
        .min()
        .unwrap_or(text.len())
}

/// Body under the first `heading` match, up to the next boundary. Empty bodies are `None`.
fn section<'t>(text: &'t str, heading: &Regex, boundaries: &[&Regex]) -> Option<&'t str> {
    let m = heading.find(text)?;
    let start = next_line_start(text, m.end());
    let end = boundary(text, start, boundaries);
    Some(text[start..end].trim()).filter(|s| !s.is_empty())
}

fn extract_overview(text: &str) -> Option<String> {
    section(text, &OVERVIEW_RE, &[&*SECTION_RE, &*OBJECTIVE_ANY_RE]).map(str::to_string)
}

/// The `Priority Tips` heading, else a plain `# Tips` heading.
fn tips_heading(text: &str) -> &'static Regex {
    if TIPS_RE.is_match(text) { &*TIPS_RE } else { &*PLAIN_TIPS_RE }
}

/// Tips run from their heading to the end of the document.
fn extract_tips(text: &str) -> Option<String> {
    section(text, tips_heading(text), &[]).map(str::to_string)
}

// ---------------------------------------------------------------------------
// Per-objective strategies
// ---------------------------------------------------------------------------

fn by_heading(text: &str, index: usize) -> Result<Option<String>> {
    let n = index + 1;
    let heading = Regex::new(&format!(
        r"(?im)^[ \t]*(?:#{{1,6}}[ \t]*)?(?:\*\*)?[ \t]*objective[ \t]+{n}\b.*$|{HEADING_PREFIX}{n}\.[ \t].*$"
    ))
    .map_err(|e| QuestGuideError::parse(format!("objective heading pattern: {e}")))?;

    Ok(section(text, &heading, &[&*OBJECTIVE_ANY_RE, &*SECTION_RE]).map(str::to_string))
}

fn by_description(text: &str, description: &str) -> Result<Option<String>> {
    let anchor: String = description.trim().chars().take(ANCHOR_CHARS).collect();
    let anchor = anchor.trim();
    if anchor.is_empty() {
        return Ok(None);
    }

    let pattern = Regex::new(&format!("(?i){}", regex::escape(anchor)))
        .map_err(|e| QuestGuideError::parse(format!("description anchor pattern: {e}")))?;

    // Prefer the guide block so a mention in the overview is not picked up.
    let search_from = GUIDE_RE.find(text).map_or(0, |m| m.start());
    let Some(m) = pattern
        .find_at(text, search_from)
        .or_else(|| pattern.find(text))
    else {
        return Ok(None);
    };

    let start = next_line_start(text, m.end());
    let end = boundary(text, start, &[&*OBJECTIVE_ANY_RE, &*SECTION_RE]);
    let window_end = text[start..end]
        .char_indices()
        .nth(ANCHOR_WINDOW_CHARS)
        .map_or(end, |(i, _)| start + i);

    let body = text[start..window_end].trim();
    Ok((!body.is_empty()).then(|| body.to_string()))
}

// ---------------------------------------------------------------------------
// Document-level strategies
// ---------------------------------------------------------------------------

/// The step-by-step block: under its heading if present, otherwise the
/// document with the overview and tips sections removed.
fn guide_block(text: &str) -> String {
    if let Some(m) = GUIDE_RE.find(text) {
        let start = next_line_start(text, m.end());
        let end = boundary(text, start, &[&*SECTION_RE]);
        return text[start..end].to_string();
    }

    let mut block = text.to_string();
    if let Some(cut) = tips_heading(&block).find(&block).map(|m| m.start()) {
        block.truncate(cut);
    }
    if let Some((start, heading_end)) = OVERVIEW_RE.find(&block).map(|m| (m.start(), m.end())) {
        let body_start = next_line_start(&block, heading_end);
        let end = boundary(&block, body_start, &[&*SECTION_RE, &*OBJECTIVE_ANY_RE]);
        block.replace_range(start..end, "");
    }
    block
}

fn split_guide_block(text: &str) -> Vec<String> {
    let block = guide_block(text);

    let mut bounds: Vec<usize> = NUMBERED_ITEM_RE.find_iter(&block).map(|m| m.start()).collect();
    let pieces: Vec<&str> = if bounds.len() >= 2 {
        bounds.push(block.len());
        bounds.windows(2).map(|w| &block[w[0]..w[1]]).collect()
    } else {
        BLANK_LINE_RE.split(&block).collect()
    };

    pieces
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty() && !is_bare_heading(p))
        .map(str::to_string)
        .collect()
}

fn is_bare_heading(piece: &str) -> bool {
    !piece.contains('\n') && piece.starts_with('#')
}

fn assign_positionally(
    chunks: Vec<String>,
    slots: &mut [String],
    resolved_by: &mut [Option<Strategy>],
) {
    let last = slots.len() - 1;
    for (i, chunk) in chunks.into_iter().enumerate() {
        let index = i.min(last);
        if slots[index].is_empty() {
            slots[index] = chunk;
        } else {
            slots[index].push_str("\n\n");
            slots[index].push_str(&chunk);
        }
        resolved_by[index] = Some(Strategy::Positional);
    }
}
