use pretty_assertions::assert_eq;
use url2md_engine::{
    render_page, BodyExtractor, ConvertOptions, Extractor, FailureKind, ReadableExtractor,
};

const BASE: &str = "https://news.example/story";

fn paragraph(seed: &str) -> String {
    format!("{seed} ").repeat(12).trim_end().to_string()
}

fn article_page() -> String {
    format!(
        r#"<html><head><title>Borrow checker deep dive - News Example</title></head>
        <body>
          <div class="site-header"><a href="/">Home</a> <a href="/latest">Latest</a></div>
          <div class="sidebar"><p>Subscribe to our newsletter for more stories like this one, today</p></div>
          <div class="post-content">
            <h1>Borrow checker deep dive</h1>
            <p>{}</p>
            <p>{}</p>
            <p>{}</p>
          </div>
          <div class="comments"><p>First comment with enough text to be a paragraph, surely</p></div>
        </body></html>"#,
        paragraph("Ownership moves values, and borrows lend them for a while."),
        paragraph("Lifetimes describe how long a reference stays valid, nothing more."),
        paragraph("The checker rejects programs that could observe dangling data."),
    )
}

#[test]
fn raw_mode_takes_the_whole_body_and_document_title() {
    let extracted = BodyExtractor.extract(&article_page()).unwrap();
    assert_eq!(extracted.title, "Borrow checker deep dive - News Example");
    assert!(extracted.content_html.contains("Subscribe to our newsletter"));
    assert!(extracted.content_html.contains("First comment"));
}

#[test]
fn raw_mode_without_title_is_untitled() {
    let extracted = BodyExtractor.extract("<p>hello</p>").unwrap();
    assert_eq!(extracted.title, "Untitled");
}

#[test]
fn readable_mode_keeps_the_article_and_drops_chrome() {
    let extracted = ReadableExtractor::default()
        .extract(&article_page())
        .unwrap();
    assert_eq!(extracted.title, "Borrow checker deep dive");
    assert!(extracted.content_html.contains("Lifetimes describe"));
    assert!(!extracted.content_html.contains("Subscribe to our newsletter"));
    assert!(!extracted.content_html.contains("First comment"));
    assert!(!extracted.content_html.contains("Latest"));
}

#[test]
fn readable_mode_fails_below_text_threshold() {
    let html = "<html><head><title>Short</title></head><body><article>\
                <p>Only a couple of sentences here, which is not an article.</p>\
                </article></body></html>";
    let err = ReadableExtractor::default().extract(html).unwrap_err();
    assert_eq!(err.kind, FailureKind::ExtractionFailed);
}

#[test]
fn render_page_in_readable_mode_produces_headline_and_paragraphs() {
    let (title, markdown) = render_page(
        &article_page(),
        BASE,
        ConvertOptions {
            include_images: true,
            clean_html: true,
        },
    )
    .unwrap();
    assert_eq!(title, "Borrow checker deep dive");
    assert!(markdown.starts_with("# Borrow checker deep dive\n\n"));
    assert!(!markdown.contains("Home"));
}

#[test]
fn render_page_in_raw_mode_still_skips_excluded_elements() {
    let html = "<html><body><nav><a href=\"/x\">Nav link</a></nav><p>Body text</p>\
                <footer>Footer text</footer></body></html>";
    let (title, markdown) = render_page(html, BASE, ConvertOptions::default()).unwrap();
    assert_eq!(title, "Untitled");
    assert_eq!(markdown, "Body text");
}

fn wrapped_article(open: &str, close: &str) -> String {
    format!(
        r#"<html><head><title>Borrow checker deep dive - News Example</title></head>
        <body>{open}
          <div class="post">
            <p>{}</p>
            <p>{}</p>
            <p>{}</p>
          </div>
          <input type="hidden" name="__VIEWSTATE" value="abc">
        {close}</body></html>"#,
        paragraph("Ownership moves values, and borrows lend them for a while."),
        paragraph("Lifetimes describe how long a reference stays valid, nothing more."),
        paragraph("The checker rejects programs that could observe dangling data."),
    )
}

#[test]
fn readable_mode_finds_an_article_inside_a_page_form() {
    let html = wrapped_article(r#"<form id="aspnetForm" method="post">"#, "</form>");
    let extracted = ReadableExtractor::default().extract(&html).unwrap();
    assert!(extracted.content_html.contains("Ownership moves values"));
    assert!(extracted.content_html.contains("dangling data"));
}

#[test]
fn readable_mode_retries_when_the_layout_wrapper_looks_like_chrome() {
    let html = wrapped_article(r#"<div class="layout has-sidebar">"#, "</div>");
    let extracted = ReadableExtractor::default().extract(&html).unwrap();
    assert_eq!(extracted.title, "Borrow checker deep dive");
    assert!(extracted.content_html.contains("Lifetimes describe"));

    let (_, markdown) = render_page(
        &html,
        BASE,
        ConvertOptions {
            include_images: true,
            clean_html: true,
        },
    )
    .unwrap();
    assert!(markdown.contains("The checker rejects programs"));
}
