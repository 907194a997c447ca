use ego_tree::NodeId;
use scraper::{ElementRef, Html};
use url2md_logging::conv_debug;

use crate::readability::{self, ScoreConfig};
use crate::{ConversionError, FailureKind};

pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub title: String,
    /// Markup of the chosen subtree, without a wrapper element.
    pub content_html: String,
}

pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str) -> Result<ExtractedContent, ConversionError>;
}

/// Raw mode: the whole `<body>`, titled by `<title>`.
#[derive(Debug, Default)]
pub struct BodyExtractor;

impl Extractor for BodyExtractor {
    fn extract(&self, html: &str) -> Result<ExtractedContent, ConversionError> {
        let document = Html::parse_document(html);
        let content_html = find_element(&document, "body")
            .map(|body| body.inner_html())
            .unwrap_or_else(|| document.root_element().inner_html());
        Ok(ExtractedContent {
            title: document_title(&document).unwrap_or_else(|| UNTITLED.to_string()),
            content_html,
        })
    }
}

/// Readable mode: the scored article, or `ExtractionFailed` below the text threshold.
#[derive(Debug, Default)]
pub struct ReadableExtractor {
    config: ScoreConfig,
}

impl ReadableExtractor {
    pub fn new(config: ScoreConfig) -> Self {
        Self { config }
    }
}

impl Extractor for ReadableExtractor {
    fn extract(&self, html: &str) -> Result<ExtractedContent, ConversionError> {
        let article = readability::extract_article(html, &self.config)
            .filter(|article| article.text_len >= self.config.char_threshold)
            .ok_or_else(|| {
                ConversionError::new(
                    FailureKind::ExtractionFailed,
                    "Failed to extract readable content from the page",
                )
            })?;
        conv_debug!("Readable extraction kept {} characters", article.text_len);

        let title = match article.title {
            Some(title) => title,
            None => document_title(&Html::parse_document(html))
                .unwrap_or_else(|| UNTITLED.to_string()),
        };
        Ok(ExtractedContent {
            title,
            content_html: article.content_html,
        })
    }
}

/// Re-parses extracted markup under a synthetic `<div>` so both modes render from the same shape.
pub fn content_fragment(content_html: &str) -> Html {
    Html::parse_fragment(&format!("<div>{content_html}</div>"))
}

/// Detaches every `<img>` from `fragment`. Returns how many were removed.
pub fn remove_images(fragment: &mut Html) -> usize {
    let images: Vec<NodeId> = fragment
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|element| element.value().name() == "img")
        .map(|element| element.id())
        .collect();
    for id in &images {
        if let Some(mut node) = fragment.tree.get_mut(*id) {
            node.detach();
        }
    }
    images.len()
}

fn document_title(document: &Html) -> Option<String> {
    find_element(document, "title")
        .map(readability::normalized_text)
        .filter(|title| !title.is_empty())
}

fn find_element<'a>(document: &'a Html, tag: &str) -> Option<ElementRef<'a>> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == tag)
}
