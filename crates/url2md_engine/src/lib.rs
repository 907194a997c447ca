//! url2md engine: fetching, decoding, content extraction and markdown rendering.
mod decode;
mod extract;
mod fetch;
mod pipeline;
mod readability;
mod render;
mod types;

pub use decode::{decode_html, DecodedHtml};
pub use extract::{
    content_fragment, remove_images, BodyExtractor, ExtractedContent, Extractor,
    ReadableExtractor, UNTITLED,
};
pub use fetch::{validate_url, FetchSettings, Fetcher, ReqwestFetcher, DEFAULT_USER_AGENT};
pub use pipeline::{render_page, PageConverter};
pub use readability::{
    article_title, base_tag_score, class_id_weight, content_density_score, extract_article,
    link_density, strip_site_name, Article, ScoreConfig,
};
pub use render::MarkdownRenderer;
pub use types::{
    ConversionError, ConvertOptions, ConvertedPage, FailureKind, FetchMetadata, FetchOutput,
};
