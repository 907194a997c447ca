use pretty_assertions::assert_eq;
use url2md_engine::{content_fragment, remove_images, MarkdownRenderer};

fn render(html: &str) -> String {
    render_with_base(html, "https://site.example/page")
}

fn render_with_base(html: &str, base: &str) -> String {
    MarkdownRenderer::new(Some(base)).render(&content_fragment(html))
}

#[test]
fn headings_paragraphs_and_emphasis() {
    let html = "<h1>Title</h1><p>Some <strong>bold</strong> and <em>soft</em> text.</p><h3>Sub</h3>";
    assert_eq!(
        render(html),
        "# Title\n\nSome **bold** and _soft_ text.\n\n### Sub"
    );
}

#[test]
fn lists_use_dash_bullets_and_numbers() {
    let html = "<ul><li>one</li><li>two</li></ul><ol start=\"3\"><li>three</li><li>four</li></ol>";
    assert_eq!(render(html), "- one\n- two\n\n3. three\n4. four");
}

#[test]
fn code_blocks_are_fenced_with_language() {
    let html = "<pre><code class=\"language-rust\">fn main() {\n    println!(\"hi\");\n}\n</code></pre><p>Use <code>cargo</code>.</p>";
    assert_eq!(
        render(html),
        "```rust\nfn main() {\n    println!(\"hi\");\n}\n```\n\nUse `cargo`."
    );
}

#[test]
fn blockquote_and_rule() {
    let html = "<blockquote><p>quoted</p><p>twice</p></blockquote><hr><p>after</p>";
    assert_eq!(render(html), "> quoted\n>\n> twice\n\n---\n\nafter");
}

#[test]
fn excluded_elements_never_render() {
    let html = "<nav>menu</nav><script>alert(1)</script><style>p{}</style>\
                <p>kept</p><aside>aside</aside><footer>foot</footer>";
    assert_eq!(render(html), "kept");
}

#[test]
fn root_relative_image_resolves_against_origin() {
    let md = render("<p><img src=\"/a.png\" alt=\"x\"></p>");
    assert_eq!(md, "![x](https://site.example/a.png)");
}

#[test]
fn image_title_is_quoted_and_missing_src_renders_nothing() {
    let md = render("<p><img src=\"pic.jpg\" alt=\"A\" title=\"Cap\"><img alt=\"none\"></p>");
    assert_eq!(md, "![A](pic.jpg \"Cap\")");
}

#[test]
fn document_relative_references_are_left_alone() {
    let md = render_with_base(
        "<p><a href=\"other.html\">rel</a> <a href=\"/docs\">root</a></p>",
        "https://site.example/a/b",
    );
    assert_eq!(md, "[rel](other.html) [root](https://site.example/docs)");
}

#[test]
fn links_with_empty_or_fragment_href_render_as_text() {
    assert_eq!(render("<p><a href=\"\">text</a></p>"), "text");
    assert_eq!(render("<p><a href=\"#section\">jump</a></p>"), "jump");
    assert_eq!(render("<p><a>bare</a></p>"), "bare");
}

#[test]
fn link_title_is_kept() {
    let md = render("<p><a href=\"https://x.example/\" title=\"X site\">x</a></p>");
    assert_eq!(md, "[x](https://x.example/ \"X site\")");
}

#[test]
fn removing_images_leaves_no_image_syntax() {
    let mut fragment = content_fragment("<p>Look <img src=\"/a.png\" alt=\"x\"> here</p>");
    assert_eq!(remove_images(&mut fragment), 1);
    let md = MarkdownRenderer::new(Some("https://site.example/page")).render(&fragment);
    assert!(!md.contains("!["));
    assert_eq!(md, "Look here");
}

#[test]
fn tables_render_as_pipe_rows() {
    let html = "<table><tr><th>a</th><th>b</th></tr><tr><td>1</td><td>2</td></tr></table>";
    assert_eq!(render(html), "| a | b |\n| --- | --- |\n| 1 | 2 |");
}

#[test]
fn markdown_characters_in_text_are_escaped() {
    assert_eq!(render("<p>snake_case and *stars*</p>"), "snake\\_case and \\*stars\\*");
}

#[test]
fn line_breaks_become_hard_breaks() {
    assert_eq!(render("<p>one<br>two</p>"), "one  \ntwo");
}

#[test]
fn whitespace_inside_a_link_stays_between_words() {
    assert_eq!(
        render("<p>see<a href=\"/x\"> the docs </a>now</p>"),
        "see [the docs](https://site.example/x) now"
    );
}

#[test]
fn brackets_in_alt_text_are_escaped() {
    assert_eq!(
        render("<p><img src=\"/a.png\" alt=\"x]y [z\"></p>"),
        "![x\\]y \\[z](https://site.example/a.png)"
    );
}

#[test]
fn nested_lists_stay_tight() {
    let html = "<ul><li>one<ul><li>two</li><li>three</li></ul></li><li>four</li></ul>";
    assert_eq!(render(html), "- one\n  - two\n  - three\n- four");
}
