//! HTML subtree to markdown.
//!
//! Every element tag maps to a [`Rule`]; each rule turns the element into a
//! string without touching the tree. Block rules wrap their output in blank
//! lines and [`join`] collapses adjacent separators, so the result never has
//! more than one blank line in a row.

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html};
use url::Url;

/// Elements that never reach the output, in any mode.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "aside", "noscript", "template", "iframe", "head",
    "title", "meta", "link",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Skip,
    Block,
    Heading(usize),
    Paragraph,
    LineBreak,
    HorizontalRule,
    List { ordered: bool },
    ListItem,
    Quote,
    CodeBlock,
    InlineCode,
    Strong,
    Emphasis,
    Link,
    Image,
    Table,
    Inline,
}

fn rule_for(tag: &str) -> Rule {
    if SKIPPED_TAGS.contains(&tag) {
        return Rule::Skip;
    }
    match tag {
        "h1" => Rule::Heading(1),
        "h2" => Rule::Heading(2),
        "h3" => Rule::Heading(3),
        "h4" => Rule::Heading(4),
        "h5" => Rule::Heading(5),
        "h6" => Rule::Heading(6),
        "p" => Rule::Paragraph,
        "br" => Rule::LineBreak,
        "hr" => Rule::HorizontalRule,
        "ul" => Rule::List { ordered: false },
        "ol" => Rule::List { ordered: true },
        "li" => Rule::ListItem,
        "blockquote" => Rule::Quote,
        "pre" => Rule::CodeBlock,
        "code" | "kbd" | "samp" | "tt" => Rule::InlineCode,
        "strong" | "b" => Rule::Strong,
        "em" | "i" => Rule::Emphasis,
        "a" => Rule::Link,
        "img" => Rule::Image,
        "table" => Rule::Table,
        "div" | "section" | "article" | "main" | "header" | "figure" | "figcaption"
        | "address" | "dl" | "dt" | "dd" | "details" | "summary" | "body" | "html" | "form"
        | "fieldset" | "center" => Rule::Block,
        _ => Rule::Inline,
    }
}

/// Converts a DOM subtree into markdown. Pure; never fails.
#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer {
    base_url: Option<Url>,
}

impl MarkdownRenderer {
    /// `base_url` is the page address root-relative links and images resolve against.
    pub fn new(base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url.and_then(|base| Url::parse(base).ok()),
        }
    }

    pub fn render(&self, document: &Html) -> String {
        self.render_children(*document.root_element())
            .trim()
            .to_string()
    }

    pub fn render_element(&self, element: ElementRef) -> String {
        self.render_node(*element).trim().to_string()
    }

    fn render_children(&self, node: NodeRef<'_, Node>) -> String {
        let mut out = String::new();
        for child in node.children() {
            let piece = self.render_node(child);
            join(&mut out, &piece);
        }
        out
    }

    fn render_node(&self, node: NodeRef<'_, Node>) -> String {
        match node.value() {
            Node::Text(text) => escape_text(&collapse_whitespace(text)),
            Node::Element(_) => match ElementRef::wrap(node) {
                Some(element) => self.render_tag(element),
                None => String::new(),
            },
            Node::Document | Node::Fragment => self.render_children(node),
            _ => String::new(),
        }
    }

    fn render_tag(&self, element: ElementRef) -> String {
        let tag = element.value().name().to_ascii_lowercase();
        match rule_for(&tag) {
            Rule::Skip => String::new(),
            Rule::Block | Rule::Paragraph => block(self.render_children(*element).trim()),
            Rule::Heading(level) => {
                let content = self.render_children(*element);
                let content = single_line(content.trim());
                if content.is_empty() {
                    return String::new();
                }
                block(&format!("{} {}", "#".repeat(level), content))
            }
            Rule::LineBreak => "  \n".to_string(),
            Rule::HorizontalRule => block("---"),
            Rule::List { ordered } => self.render_list(element, ordered),
            Rule::ListItem => {
                let body = self.render_children(*element);
                format!("\n{}\n", list_item("- ", body.trim()))
            }
            Rule::Quote => {
                let content = self.render_children(*element);
                let quoted = content
                    .trim()
                    .lines()
                    .map(|line| {
                        if line.is_empty() {
                            ">".to_string()
                        } else {
                            format!("> {line}")
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                block(&quoted)
            }
            Rule::CodeBlock => render_code_block(element),
            Rule::InlineCode => {
                let code: String = element.text().collect();
                let code = collapse_whitespace(&code);
                if code.trim().is_empty() {
                    return code;
                }
                let ticks = "`".repeat(longest_run(&code, '`') + 1);
                let pad = if code.starts_with('`') || code.ends_with('`') { " " } else { "" };
                format!("{ticks}{pad}{code}{pad}{ticks}")
            }
            Rule::Strong => wrap_inline(&self.render_children(*element), "**"),
            Rule::Emphasis => wrap_inline(&self.render_children(*element), "_"),
            Rule::Link => self.render_link(element),
            Rule::Image => self.render_image(element),
            Rule::Table => self.render_table(element),
            Rule::Inline => self.render_children(*element),
        }
    }

    fn render_list(&self, element: ElementRef, ordered: bool) -> String {
        let start = element
            .value()
            .attr("start")
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(1);
        let items = element
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|child| child.value().name().eq_ignore_ascii_case("li"))
            .enumerate()
            .map(|(index, item)| {
                let marker = if ordered {
                    format!("{}. ", start + index)
                } else {
                    "- ".to_string()
                };
                let body = self.render_children(*item);
                list_item(&marker, body.trim())
            })
            .collect::<Vec<_>>();
        if items.is_empty() {
            return String::new();
        }
        let items = items.join("\n");
        if closes_list_item(element) {
            // Hugs the item text above it so the outer list stays tight.
            return format!("\n{items}");
        }
        block(&items)
    }

    fn render_link(&self, element: ElementRef) -> String {
        let content = self.render_children(*element);
        let href = element.value().attr("href").map(str::trim).unwrap_or("");
        if href.is_empty() || href.starts_with('#') {
            return content;
        }
        let href = self.resolve(href);
        let text = content.trim();
        let link = match non_empty_attr(element, "title") {
            Some(title) => format!("[{text}]({href} \"{}\")", escape_title(title)),
            None => format!("[{text}]({href})"),
        };
        if text.is_empty() {
            return link;
        }
        let lead = if content.starts_with(char::is_whitespace) { " " } else { "" };
        let trail = if content.ends_with(char::is_whitespace) { " " } else { "" };
        format!("{lead}{link}{trail}")
    }

    fn render_image(&self, element: ElementRef) -> String {
        let Some(src) = non_empty_attr(element, "src") else {
            return String::new();
        };
        let alt = escape_label(&single_line(element.value().attr("alt").unwrap_or("")));
        let src = self.resolve(src.trim());
        match non_empty_attr(element, "title") {
            Some(title) => format!("![{alt}]({src} \"{}\")", escape_title(title)),
            None => format!("![{alt}]({src})"),
        }
    }

    fn render_table(&self, element: ElementRef) -> String {
        let rows = element
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|row| row.value().name().eq_ignore_ascii_case("tr"))
            .filter(|row| nearest_table(*row).map(|table| table.id()) == Some(element.id()))
            .map(|row| {
                let cells = row
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                    .collect::<Vec<_>>();
                let header = cells.iter().any(|cell| cell.value().name() == "th");
                let rendered = cells
                    .iter()
                    .map(|cell| {
                        let content = self.render_children(**cell);
                        single_line(content.trim()).replace('|', "\\|")
                    })
                    .collect::<Vec<_>>();
                (header, rendered)
            })
            .filter(|(_, cells)| !cells.is_empty())
            .collect::<Vec<_>>();

        let Some(width) = rows.iter().map(|(_, cells)| cells.len()).max() else {
            return String::new();
        };
        let mut lines = Vec::with_capacity(rows.len() + 1);
        for (index, (header, mut cells)) in rows.into_iter().enumerate() {
            cells.resize(width, String::new());
            lines.push(format!("| {} |", cells.join(" | ")));
            if index == 0 && header {
                lines.push(format!("|{}", " --- |".repeat(width)));
            }
        }
        block(&lines.join("\n"))
    }

    /// Only root-relative references are made absolute, against the page origin.
    fn resolve(&self, reference: &str) -> String {
        if !reference.starts_with('/') {
            return reference.to_string();
        }
        self.base_url
            .as_ref()
            .and_then(|base| base.join(reference).ok())
            .map(String::from)
            .unwrap_or_else(|| reference.to_string())
    }
}

fn render_code_block(element: ElementRef) -> String {
    let code_child = element
        .children()
        .filter_map(ElementRef::wrap)
        .find(|child| child.value().name().eq_ignore_ascii_case("code"));
    let language = code_child
        .and_then(code_language)
        .or_else(|| code_language(element))
        .unwrap_or_default();
    let code: String = match code_child {
        Some(code) => code.text().collect(),
        None => element.text().collect(),
    };
    let code = code.trim_end_matches('\n');
    let fence = "`".repeat(longest_run(code, '`').max(2) + 1);
    format!("\n\n{fence}{language}\n{code}\n{fence}\n\n")
}

fn code_language(element: ElementRef) -> Option<String> {
    element.value().classes().find_map(|class| {
        class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("lang-"))
            .filter(|lang| !lang.is_empty())
            .map(str::to_string)
    })
}

fn nearest_table(element: ElementRef) -> Option<ElementRef> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name().eq_ignore_ascii_case("table"))
}

fn non_empty_attr<'a>(element: ElementRef<'a>, name: &str) -> Option<&'a str> {
    element
        .value()
        .attr(name)
        .filter(|value| !value.trim().is_empty())
}

fn block(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }
    format!("\n\n{content}\n\n")
}

/// Indents continuation lines under the marker. Blank lines stay empty.
fn list_item(marker: &str, body: &str) -> String {
    let indent = " ".repeat(marker.len());
    let mut lines = body.split('\n');
    let mut out = format!("{marker}{}", lines.next().unwrap_or_default());
    for line in lines {
        out.push('\n');
        if !line.is_empty() {
            out.push_str(&indent);
            out.push_str(line);
        }
    }
    out
}

/// True for a list that is the last element inside an `<li>`.
fn closes_list_item(list: ElementRef) -> bool {
    let Some(parent) = list.parent().and_then(ElementRef::wrap) else {
        return false;
    };
    parent.value().name().eq_ignore_ascii_case("li")
        && parent.children().filter_map(ElementRef::wrap).last().map(|last| last.id())
            == Some(list.id())
}

/// Moves surrounding whitespace outside the delimiters, as `**a**` must not start with a space.
fn wrap_inline(content: &str, delimiter: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return content.to_string();
    }
    let lead = if content.starts_with(char::is_whitespace) { " " } else { "" };
    let trail = if content.ends_with(char::is_whitespace) { " " } else { "" };
    format!("{lead}{delimiter}{trimmed}{delimiter}{trail}")
}

fn single_line(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn longest_run(text: &str, ch: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == ch {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

/// Escapes brackets in text taken from attributes, such as `alt`.
fn escape_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for ch in label.chars() {
        if matches!(ch, '\\' | '[' | ']') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn escape_title(title: &str) -> String {
    title.replace('"', "\\\"")
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let body = text.trim_start();
    out.push_str(&text[..text.len() - body.len()]);

    // Sequences that only mean something at the start of a line.
    let starts_block = body.starts_with('#')
        || body.starts_with('>')
        || body.starts_with("- ")
        || body.starts_with("+ ")
        || body.starts_with('=')
        || ordered_marker_len(body).is_some();
    if starts_block {
        if let Some(len) = ordered_marker_len(body) {
            out.push_str(&body[..len - 1]);
            out.push_str("\\.");
            return escape_inline(&body[len..], out);
        }
        out.push('\\');
    }
    escape_inline(body, out)
}

fn escape_inline(text: &str, mut out: String) -> String {
    for ch in text.chars() {
        if matches!(ch, '\\' | '*' | '_' | '`' | '[' | ']') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Length of `"12."` when `text` starts with digits followed by `". "`.
fn ordered_marker_len(text: &str) -> Option<usize> {
    let digits = text.chars().take_while(char::is_ascii_digit).count();
    (digits > 0 && text[digits..].starts_with(". ")).then_some(digits + 1)
}

/// Appends `piece` to `out`, merging the newlines between them so that at most
/// one blank line separates blocks, and dropping doubled spaces at the seam.
fn join(out: &mut String, piece: &str) {
    if piece.is_empty() {
        return;
    }
    let trailing = out.len() - out.trim_end_matches('\n').len();
    let leading = piece.len() - piece.trim_start_matches('\n').len();
    let separator = trailing.max(leading).min(2);
    let mut rest = &piece[leading..];

    out.truncate(out.len() - trailing);
    if rest.starts_with("  \n") && separator == 0 {
        let kept = out.trim_end_matches(' ').len();
        out.truncate(kept);
        out.push_str(rest);
        return;
    }
    if separator > 0 {
        // Trailing spaces before a block are noise; before plain text they may be a hard break.
        if leading > 0 {
            let kept = out.trim_end_matches(' ').len();
            out.truncate(kept);
        }
        if !out.is_empty() {
            out.push_str(&"\n".repeat(separator));
        }
    }
    if out.is_empty() || out.ends_with(' ') || out.ends_with('\n') {
        rest = rest.trim_start_matches(' ');
    }
    out.push_str(rest);
}
