//! Image extraction from reference-page HTML.
//!
//! Walks every `<img>` in the document and keeps the ones that look like
//! content: big enough, not UI chrome, and resolvable to an absolute http(s) URL.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Block-level tags that bound an image's surrounding text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "figure", "li", "td", "th", "dd", "section", "article", "blockquote", "table",
    "center", "aside", "main", "body",
];

/// Markers in alt text or URL that identify UI icons.
const ICON_MARKERS: &[&str] = &[
    "icon", "logo", "sprite", "button", "arrow", "favicon", "badge",
];

/// Longest context string kept per image.
const MAX_CONTEXT_CHARS: usize = 500;

/// An image found on a reference page, before scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCandidate {
    /// Absolute http(s) URL.
    pub url: String,
    pub alt: String,
    /// Text of the smallest enclosing block, or alt/title when that is empty.
    pub context: String,
}

/// Extract candidate images from `html`, resolving URLs against `page_url`.
pub fn extract_candidates(html: &str, page_url: &Url, min_dimension: u32) -> Vec<ImageCandidate> {
    let doc = Html::parse_document(html);
    let img_sel = Selector::parse("img").expect("valid selector");
    let mut candidates: Vec<ImageCandidate> = Vec::new();

    for img in doc.select(&img_sel) {
        let el = img.value();
        let Some(src) = ["data-src", "src"]
            .iter()
            .filter_map(|attr| el.attr(attr))
            .map(str::trim)
            .find(|s| !s.is_empty())
        else {
            continue;
        };

        if src.starts_with("data:") {
            continue;
        }

        if is_too_small(el.attr("width"), min_dimension)
            || is_too_small(el.attr("height"), min_dimension)
        {
            continue;
        }

        let alt = el.attr("alt").unwrap_or("").trim().to_string();
        let Some(url) = normalize_image_url(src, page_url) else {
            continue;
        };

        if is_ui_icon(&alt, &url) {
            continue;
        }

        if candidates.iter().any(|c| c.url == url) {
            continue;
        }

        let context = block_context(&img)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| {
                if alt.is_empty() {
                    el.attr("title").unwrap_or("").trim().to_string()
                } else {
                    alt.clone()
                }
            });

        candidates.push(ImageCandidate { url, alt, context });
    }

    candidates
}

/// Declared dimension below the threshold. Undeclared dimensions pass.
fn is_too_small(value: Option<&str>, min_dimension: u32) -> bool {
    value
        .map(|v| v.trim().trim_end_matches("px"))
        .and_then(|v| v.parse::<u32>().ok())
        .is_some_and(|v| v < min_dimension)
}

/// Alt text or URL that marks the image as UI chrome.
pub fn is_ui_icon(alt: &str, url: &str) -> bool {
    let alt = alt.to_lowercase();
    // Only look at the path; hostnames like `static.icons.example` say nothing.
    let path = Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_else(|_| url.to_lowercase());
    ICON_MARKERS
        .iter()
        .any(|m| alt.contains(m) || path.contains(m))
}

/// Whether the URL looks like article content rather than an ad, avatar or tiny thumbnail.
pub fn is_content_image(url: &str) -> bool {
    static SCALED_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"/scale-to-width-down/(\d+)").expect("valid regex")
    });

    let lower = url.to_lowercase();
    if ["/ads/", "advert", "banner", "thumb", "avatar"]
        .iter()
        .any(|m| lower.contains(m))
    {
        return false;
    }

    match SCALED_RE.captures(&lower) {
        Some(caps) => caps[1].parse::<u32>().is_ok_and(|w| w >= 100),
        None => true,
    }
}

/// Resolve relative and protocol-relative sources against the page URL.
pub fn normalize_image_url(src: &str, page_url: &Url) -> Option<String> {
    if src.starts_with("data:") {
        return None;
    }
    let resolved = page_url.join(src).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Whitespace-normalized text of the smallest block-level ancestor.
fn block_context(img: &ElementRef<'_>) -> Option<String> {
    let block = img
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| BLOCK_TAGS.contains(&el.value().name()))?;

    let text = block
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");

    Some(text.chars().take(MAX_CONTEXT_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://wiki.example.com/wiki/Signal_-_Part_1").unwrap()
    }

    #[test]
    fn extracts_context_from_enclosing_block() {
        let html = r#"<html><body>
            <div class="thumb"><a href="/f"><img src="/images/relay.png" width="300" alt="Relay"></a>
            <div class="caption">The relay station near the checkpoint</div></div>
        </body></html>"#;
        let found = extract_candidates(html, &page(), 50);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://wiki.example.com/images/relay.png");
        assert!(found[0].context.contains("relay station near the checkpoint"));
    }

    #[test]
    fn rejects_small_icons_and_data_uris() {
        let html = r#"<html><body><p>
            <img src="/a.png" width="16" height="16">
            <img src="/b.png" alt="Edit icon">
            <img src="/static/logo.svg">
            <img src="data:image/gif;base64,R0lGODlhAQABAAAAACw=">
            <img src="/c.png" width="40px">
            <img src="/keep.png" width="200">
        </p></body></html>"#;
        let found = extract_candidates(html, &page(), 50);
        let urls: Vec<&str> = found.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://wiki.example.com/keep.png"]);
    }

    #[test]
    fn prefers_lazy_src_and_normalizes_protocol_relative() {
        let html = r#"<html><body><p>
            <img src="data:image/gif;base64,AAAA" data-src="//static.wiki.example.com/images/a/ab/Map.png">
        </p></body></html>"#;
        let found = extract_candidates(html, &page(), 50);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://static.wiki.example.com/images/a/ab/Map.png");
    }

    #[test]
    fn falls_back_to_alt_for_context() {
        let html = r#"<html><body><p><img src="/a.png" alt="Bunker entrance"></p></body></html>"#;
        let found = extract_candidates(html, &page(), 50);
        assert_eq!(found[0].context, "Bunker entrance");
    }

    #[test]
    fn deduplicates_by_url() {
        let html = r#"<html><body>
            <p>First <img src="/a.png"></p><p>Second <img src="/a.png"></p>
        </body></html>"#;
        let found = extract_candidates(html, &page(), 50);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].context, "First");
    }

    #[test]
    fn content_image_rules() {
        assert!(is_content_image("https://wiki.example.com/images/Relay.png"));
        assert!(!is_content_image("https://wiki.example.com/ads/promo.png"));
        assert!(!is_content_image("https://wiki.example.com/images/thumb/a.png"));
        assert!(!is_content_image(
            "https://static.example.com/a.png/revision/latest/scale-to-width-down/40"
        ));
        assert!(is_content_image(
            "https://static.example.com/a.png/revision/latest/scale-to-width-down/600"
        ));
    }

    #[test]
    fn normalize_rejects_non_http() {
        assert_eq!(normalize_image_url("data:image/png;base64,AA", &page()), None);
        assert_eq!(normalize_image_url("javascript:void(0)", &page()), None);
        assert_eq!(
            normalize_image_url("../images/x.png", &page()).as_deref(),
            Some("https://wiki.example.com/images/x.png")
        );
    }
}
