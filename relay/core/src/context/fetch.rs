//! Page Text Extraction
//!
//! Reduces fetched HTML to clean text: prefers the article/main
//! content region, strips scripts, styles, navigation and similar
//! noise, and collapses whitespace. Works best on static pages;
//! JavaScript-rendered pages come out empty, which the enricher treats
//! as "no context".

use scraper::{ElementRef, Html, Node, Selector};

const NOISE_TAGS: [&str; 8] = [
    "script", "style", "nav", "footer", "header", "noscript", "svg", "iframe",
];

const CONTENT_SELECTORS: [&str; 4] = ["article", "main", "[role=\"main\"]", "#content"];

/// Extract readable text from an HTML document.
#[must_use]
pub fn extract_page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut output = String::new();

    let noise: Vec<Selector> = NOISE_TAGS
        .iter()
        .filter_map(|tag| Selector::parse(tag).ok())
        .collect();

    let content_root = CONTENT_SELECTORS
        .iter()
        .filter_map(|sel| Selector::parse(sel).ok())
        .find_map(|sel| document.select(&sel).next());

    let root = content_root.or_else(|| {
        Selector::parse("body")
            .ok()
            .and_then(|sel| document.select(&sel).next())
    });

    match root {
        Some(root) => collect_text(&root, &noise, &mut output),
        None => return String::new(),
    }

    collapse_whitespace(&output)
}

/// Walk the element tree, appending text and skipping noise elements.
fn collect_text(element: &ElementRef, noise: &[Selector], output: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    output.push_str(trimmed);
                    output.push(' ');
                }
            }
            Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    if noise.iter().any(|sel| sel.matches(&child_ref)) {
                        continue;
                    }

                    let tag = child_ref.value().name();
                    let is_block = matches!(
                        tag,
                        "p" | "div"
                            | "h1"
                            | "h2"
                            | "h3"
                            | "h4"
                            | "h5"
                            | "h6"
                            | "li"
                            | "br"
                            | "tr"
                            | "blockquote"
                            | "pre"
                            | "section"
                    );

                    if is_block {
                        output.push('\n');
                    }
                    collect_text(&child_ref, noise, output);
                    if is_block {
                        output.push('\n');
                    }
                }
            }
            _ => {}
        }
    }
}

/// Collapse runs of blank lines and trailing spaces.
fn collapse_whitespace(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut newlines = 0;
    for ch in text.chars() {
        if ch == '\n' {
            newlines += 1;
            if newlines <= 2 {
                cleaned.push(ch);
            }
        } else {
            newlines = 0;
            cleaned.push(ch);
        }
    }
    cleaned.trim().to_string()
}
