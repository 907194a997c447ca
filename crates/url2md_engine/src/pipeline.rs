use std::sync::Arc;

use url2md_logging::{conv_debug, conv_info};

use crate::extract::{content_fragment, remove_images};
use crate::{
    decode_html, validate_url, BodyExtractor, ConversionError, ConvertOptions, ConvertedPage,
    Extractor, Fetcher, MarkdownRenderer, ReadableExtractor,
};

/// Fetch, extract and render in one call.
#[derive(Clone)]
pub struct PageConverter {
    fetcher: Arc<dyn Fetcher>,
}

impl PageConverter {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    pub async fn convert(
        &self,
        url: &str,
        options: ConvertOptions,
    ) -> Result<ConvertedPage, ConversionError> {
        validate_url(url)?;
        let fetched = self.fetcher.fetch(url).await?;
        let decoded = decode_html(&fetched.bytes, fetched.metadata.content_type.as_deref());
        conv_debug!(
            "Decoded {} as {}{}",
            fetched.metadata.final_url,
            decoded.encoding_label,
            if decoded.had_errors { " (lossy)" } else { "" }
        );

        let (title, markdown) = render_page(&decoded.html, &fetched.metadata.final_url, options)?;
        conv_info!(
            "Converted {} ({} chars of markdown)",
            fetched.metadata.final_url,
            markdown.len()
        );
        Ok(ConvertedPage {
            url: url.to_string(),
            final_url: fetched.metadata.final_url,
            title,
            markdown,
        })
    }
}

/// Synchronous half of the pipeline: extract, drop images if asked, render.
///
/// Returns `(title, markdown)`. Kept free of `.await` since parsed documents are not `Send`.
pub fn render_page(
    html: &str,
    base_url: &str,
    options: ConvertOptions,
) -> Result<(String, String), ConversionError> {
    let extracted = if options.clean_html {
        ReadableExtractor::default().extract(html)?
    } else {
        BodyExtractor.extract(html)?
    };

    let mut fragment = content_fragment(&extracted.content_html);
    if !options.include_images {
        let removed = remove_images(&mut fragment);
        if removed > 0 {
            conv_debug!("Removed {} images", removed);
        }
    }
    let markdown = MarkdownRenderer::new(Some(base_url)).render(&fragment);
    Ok((extracted.title.trim().to_string(), markdown))
}
