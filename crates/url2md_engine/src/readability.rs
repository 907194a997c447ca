//! Article extraction by paragraph scoring.
//!
//! Boilerplate elements are detached first. Every paragraph-like element with
//! enough text adds a content score to its parent and half of it to its
//! grandparent. The best candidate, discounted by link density, is the article
//! root; siblings that look like part of the same article are merged in.
//!
//! A result under the character threshold is retried with progressively fewer
//! heuristics, and the longest attempt wins.

use std::collections::HashMap;

use ego_tree::NodeId;
use scraper::{ElementRef, Html};
use url2md_logging::conv_debug;

const SCORED_TAGS: &[&str] = &["p", "pre", "td", "blockquote"];

// Never content, whatever the pass.
const NON_CONTENT_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "button", "input", "select",
    "textarea", "object", "embed", "svg",
];

// Page chrome, dropped only while conditional cleaning is on.
const CHROME_TAGS: &[&str] = &["nav", "footer", "aside"];

// Class/id tokens that mark a block as chrome rather than content.
const UNLIKELY_TOKENS: &[&str] = &[
    "ad", "ads", "advert", "advertisement", "agegate", "banner", "breadcrumb", "breadcrumbs",
    "combx", "comment", "comments", "community", "cookie", "disqus", "footer", "gdpr", "header",
    "masthead", "menu", "nav", "newsletter", "pager", "pagination", "popup", "promo", "related",
    "remark", "replies", "rss", "share", "shoutbox", "sidebar", "skyscraper", "social",
    "sponsor", "sponsored", "subscribe",
];

const MAYBE_TOKENS: &[&str] = &[
    "article", "body", "column", "content", "entry", "main", "post", "story", "text",
];

const POSITIVE_TOKENS: &[&str] = &[
    "article", "blog", "body", "content", "entry", "hentry", "main", "page", "post", "story",
    "text",
];

const NEGATIVE_TOKENS: &[&str] = &[
    "ad", "ads", "advert", "banner", "combx", "comment", "contact", "foot", "footer",
    "footnote", "hidden", "masthead", "media", "menu", "meta", "nav", "outbrain", "promo",
    "related", "share", "shoutbox", "sidebar", "skyscraper", "social", "sponsor", "tags",
    "tool", "widget",
];

const TITLE_SEPARATORS: &[&str] = &[" | ", " - ", " — ", " :: "];

/// Heuristics active during one extraction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pass {
    /// Detach blocks whose class or id looks like chrome.
    strip_unlikely: bool,
    /// Add class/id weights to candidate scores.
    weight_classes: bool,
    /// Drop chrome tags and discount candidates by link density.
    clean_conditionally: bool,
}

const PASSES: [Pass; 4] = [
    Pass {
        strip_unlikely: true,
        weight_classes: true,
        clean_conditionally: true,
    },
    Pass {
        strip_unlikely: false,
        weight_classes: true,
        clean_conditionally: true,
    },
    Pass {
        strip_unlikely: false,
        weight_classes: false,
        clean_conditionally: true,
    },
    Pass {
        strip_unlikely: false,
        weight_classes: false,
        clean_conditionally: false,
    },
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreConfig {
    /// Minimum characters of article text for a successful extraction.
    pub char_threshold: usize,
    /// Paragraphs shorter than this contribute no score.
    pub min_paragraph_len: usize,
    /// Fraction of the top score a sibling needs to be merged.
    pub sibling_ratio: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            char_threshold: 500,
            min_paragraph_len: 25,
            sibling_ratio: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub title: Option<String>,
    pub content_html: String,
    /// Characters of normalized text in `content_html`.
    pub text_len: usize,
}

/// Locates the primary article in `html`. `None` when the page has no body at all.
///
/// Passes run until one reaches `char_threshold`; otherwise the longest attempt is returned.
pub fn extract_article(html: &str, config: &ScoreConfig) -> Option<Article> {
    let mut best: Option<Article> = None;
    for (attempt, pass) in PASSES.iter().enumerate() {
        let article = extract_with(html, config, *pass)?;
        if article.text_len >= config.char_threshold {
            return Some(article);
        }
        conv_debug!(
            "Extraction attempt {} kept only {} characters",
            attempt + 1,
            article.text_len
        );
        if best.as_ref().is_none_or(|kept| article.text_len > kept.text_len) {
            best = Some(article);
        }
    }
    best
}

fn extract_with(html: &str, config: &ScoreConfig, pass: Pass) -> Option<Article> {
    let mut document = Html::parse_document(html);
    let title = article_title(&document);
    strip_boilerplate(&mut document, pass);

    let body = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == "body")?;

    let scores = score_paragraphs(body, config, pass);
    let top = scores
        .iter()
        .filter_map(|(id, score)| {
            let element = document.tree.get(*id).and_then(ElementRef::wrap)?;
            let discount = if pass.clean_conditionally {
                1.0 - link_density(element)
            } else {
                1.0
            };
            Some((element, score * discount))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1));

    let (content_html, text_len) = match top {
        Some((top, top_score)) if top.id() != body.id() => {
            merge_siblings(top, top_score, &scores, config)
        }
        _ => (body.inner_html(), normalized_text(body).chars().count()),
    };

    Some(Article {
        title,
        content_html,
        text_len,
    })
}

fn strip_boilerplate(document: &mut Html, pass: Pass) {
    let doomed: Vec<NodeId> = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|element| is_boilerplate(*element, pass))
        .map(|element| element.id())
        .collect();
    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn is_boilerplate(element: ElementRef, pass: Pass) -> bool {
    let tag = element.value().name();
    if NON_CONTENT_TAGS.contains(&tag) {
        return true;
    }
    if pass.clean_conditionally && CHROME_TAGS.contains(&tag) {
        return true;
    }
    if !pass.strip_unlikely || matches!(tag, "html" | "body" | "article" | "main") {
        return false;
    }
    let tokens = class_id_tokens(element);
    let unlikely = tokens.iter().any(|token| UNLIKELY_TOKENS.contains(&token.as_str()));
    let maybe = tokens.iter().any(|token| MAYBE_TOKENS.contains(&token.as_str()));
    unlikely && !maybe && !wraps_article(element)
}

/// An element holding an `<article>` or `<main>` is a layout wrapper, not chrome.
fn wraps_article(element: ElementRef) -> bool {
    element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|descendant| matches!(descendant.value().name(), "article" | "main"))
}

fn score_paragraphs(body: ElementRef, config: &ScoreConfig, pass: Pass) -> HashMap<NodeId, f64> {
    let mut scores: HashMap<NodeId, f64> = HashMap::new();
    for paragraph in body.descendants().filter_map(ElementRef::wrap) {
        if !SCORED_TAGS.contains(&paragraph.value().name()) {
            continue;
        }
        let text = normalized_text(paragraph);
        if text.chars().count() < config.min_paragraph_len {
            continue;
        }
        let score = content_density_score(&text);

        let ancestors = paragraph
            .ancestors()
            .filter_map(ElementRef::wrap)
            .take_while(|ancestor| ancestor.value().name() != "html")
            .take(2);
        for (level, ancestor) in ancestors.enumerate() {
            let divider = if level == 0 { 1.0 } else { 2.0 };
            let entry = scores.entry(ancestor.id()).or_insert_with(|| {
                let weight = if pass.weight_classes {
                    class_id_weight(ancestor)
                } else {
                    0.0
                };
                base_tag_score(ancestor.value().name()) + weight
            });
            *entry += score / divider;
        }
    }
    scores
}

fn merge_siblings(
    top: ElementRef,
    top_score: f64,
    scores: &HashMap<NodeId, f64>,
    config: &ScoreConfig,
) -> (String, usize) {
    let Some(parent) = top.parent().and_then(ElementRef::wrap) else {
        return (top.html(), normalized_text(top).chars().count());
    };

    let threshold = (top_score * config.sibling_ratio).max(10.0);
    let top_class = top.value().attr("class").unwrap_or("");
    let mut html = String::new();
    let mut text_len = 0;

    for sibling in parent.children().filter_map(ElementRef::wrap) {
        let keep = sibling.id() == top.id() || {
            let bonus = match sibling.value().attr("class") {
                Some(class) if !class.is_empty() && class == top_class => top_score * 0.2,
                _ => 0.0,
            };
            let score = scores.get(&sibling.id()).copied().unwrap_or(0.0) + bonus;
            score >= threshold || is_article_paragraph(sibling)
        };
        if keep {
            html.push_str(&sibling.html());
            text_len += normalized_text(sibling).chars().count();
        }
    }
    (html, text_len)
}

fn is_article_paragraph(element: ElementRef) -> bool {
    if element.value().name() != "p" {
        return false;
    }
    let text = normalized_text(element);
    let len = text.chars().count();
    let density = link_density(element);
    if len > 80 {
        density < 0.25
    } else {
        len > 0 && density == 0.0 && (text.contains(". ") || text.ends_with('.'))
    }
}

pub fn base_tag_score(tag: &str) -> f64 {
    match tag {
        "article" | "main" => 10.0,
        "div" | "section" => 5.0,
        "pre" | "td" | "blockquote" => 3.0,
        "address" | "ol" | "ul" | "dl" | "dd" | "dt" | "li" | "form" => -3.0,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th" => -5.0,
        _ => 0.0,
    }
}

pub fn class_id_weight(element: ElementRef) -> f64 {
    let value = element.value();
    [value.attr("class"), value.id()]
        .into_iter()
        .flatten()
        .map(|attr| {
            let tokens = tokenize(attr);
            let mut weight = 0.0;
            if tokens.iter().any(|token| NEGATIVE_TOKENS.contains(&token.as_str())) {
                weight -= 25.0;
            }
            if tokens.iter().any(|token| POSITIVE_TOKENS.contains(&token.as_str())) {
                weight += 25.0;
            }
            weight
        })
        .sum()
}

/// One point per paragraph, one per comma, one per 100 characters (up to 3).
pub fn content_density_score(text: &str) -> f64 {
    let commas = text.chars().filter(|ch| matches!(ch, ',' | '，')).count();
    let length_bonus = (text.chars().count() / 100).min(3);
    1.0 + commas as f64 + length_bonus as f64
}

/// Share of an element's text that sits inside links, 0.0 to 1.0.
pub fn link_density(element: ElementRef) -> f64 {
    let total = normalized_text(element).chars().count();
    if total == 0 {
        return 0.0;
    }
    let linked: usize = element
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|descendant| descendant.value().name() == "a")
        .map(|link| normalized_text(link).chars().count())
        .sum();
    (linked as f64 / total as f64).min(1.0)
}

/// `og:title`, then the cleaned `<title>`, then a lone `<h1>`.
pub fn article_title(document: &Html) -> Option<String> {
    let elements = || document.root_element().descendants().filter_map(ElementRef::wrap);

    let og_title = elements()
        .filter(|element| element.value().name() == "meta")
        .find(|meta| {
            matches!(meta.value().attr("property"), Some("og:title"))
                || matches!(meta.value().attr("name"), Some("og:title"))
        })
        .and_then(|meta| meta.value().attr("content"))
        .map(|content| content.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|content| !content.is_empty());
    if og_title.is_some() {
        return og_title;
    }

    if let Some(title) = elements()
        .find(|element| element.value().name() == "title")
        .map(normalized_text)
        .filter(|title| !title.is_empty())
    {
        return Some(strip_site_name(&title));
    }

    let mut headings = elements().filter(|element| element.value().name() == "h1");
    match (headings.next(), headings.next()) {
        (Some(heading), None) => Some(normalized_text(heading)).filter(|text| !text.is_empty()),
        _ => None,
    }
}

/// `"Headline text here | Site"` becomes `"Headline text here"` if at least three words remain.
pub fn strip_site_name(title: &str) -> String {
    let cut = TITLE_SEPARATORS
        .iter()
        .filter_map(|separator| title.rfind(separator))
        .max();
    match cut {
        Some(index) => {
            let head = title[..index].trim();
            if head.split_whitespace().count() >= 3 {
                head.to_string()
            } else {
                title.to_string()
            }
        }
        None => title.to_string(),
    }
}

pub(crate) fn normalized_text(element: ElementRef) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

fn class_id_tokens(element: ElementRef) -> Vec<String> {
    let value = element.value();
    [value.attr("class"), value.id()]
        .into_iter()
        .flatten()
        .flat_map(tokenize)
        .collect()
}

fn tokenize(attr: &str) -> Vec<String> {
    attr.split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_name_is_stripped_only_when_enough_words_remain() {
        assert_eq!(
            strip_site_name("How Rust borrows work | Example Blog"),
            "How Rust borrows work"
        );
        assert_eq!(strip_site_name("Home - Example"), "Home - Example");
        assert_eq!(strip_site_name("Plain title"), "Plain title");
    }

    #[test]
    fn density_score_counts_commas_and_length() {
        let text = "a, b, c ".repeat(20);
        assert_eq!(content_density_score(&text), 1.0 + 40.0 + 1.0);
    }

    #[test]
    fn og_title_beats_document_title() {
        let html = r#"<html><head><title>Doc | Site</title>
            <meta property="og:title" content="Open Graph headline"></head><body></body></html>"#;
        let document = Html::parse_document(html);
        assert_eq!(article_title(&document).as_deref(), Some("Open Graph headline"));
    }
}
