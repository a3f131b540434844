//! HTML to plain-text normalization.
//!
//! Both web strategies (static fetch and headless browser) end up with an
//! HTML document. They differ only in which elements get stripped; the
//! rest of the algorithm is shared so the two produce identical text for
//! identical markup:
//!
//! 1. Strip non-content elements
//! 2. Pick the content root from an ordered selector list, else join all
//!    paragraphs in document order
//! 3. Collapse whitespace, trim, truncate

use scraper::{ElementRef, Html, Selector};

/// Max characters of page text returned to callers
pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Appended to text cut at [`MAX_CONTENT_CHARS`]
pub const TRUNCATION_MARKER: &str = "...";

/// Title used when a page has neither `<title>` nor `<h1>`
pub const UNTITLED_PAGE: &str = "Untitled Page";

/// Content roots, in order of preference
const CONTENT_ROOTS: [&str; 5] = ["main", "article", "[role=\"main\"]", ".content", "#content"];

const STATIC_STRIP: [&str; 5] = ["script", "style", "nav", "footer", "header"];
const SCRIPTED_STRIP: [&str; 6] = ["script", "style", "nav", "footer", "header", "iframe"];

/// Which set of elements to strip before reading text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlProfile {
    /// Raw HTML from a plain HTTP fetch
    Static,

    /// DOM serialized by a headless browser (iframes are also dropped)
    Scripted,
}

impl HtmlProfile {
    fn strip_selectors(&self) -> &'static [&'static str] {
        match self {
            HtmlProfile::Static => &STATIC_STRIP,
            HtmlProfile::Scripted => &SCRIPTED_STRIP,
        }
    }
}

/// Title and content as read from the document, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    pub title: Option<String>,
    pub content: String,
}

/// Normalized page text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPage {
    pub title: String,
    pub text: String,
}

/// Read and normalize a page in one step
pub fn normalize_html(html: &str, profile: HtmlProfile) -> NormalizedPage {
    normalize_page(read_page(html, profile))
}

/// Strip non-content elements and read the raw title and content
pub fn read_page(html: &str, profile: HtmlProfile) -> RawPage {
    let mut document = Html::parse_document(html);
    strip_elements(&mut document, profile.strip_selectors());

    RawPage {
        title: read_title(&document),
        content: read_content(&document),
    }
}

/// Resolve the title fallback and clean up the content text
pub fn normalize_page(raw: RawPage) -> NormalizedPage {
    let title = raw
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED_PAGE.to_string());

    NormalizedPage {
        title,
        text: truncate_content(&collapse_whitespace(&raw.content)),
    }
}

/// Collapse every whitespace run to a single space and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut text at [`MAX_CONTENT_CHARS`] characters, marking the cut
pub fn truncate_content(text: &str) -> String {
    match text.char_indices().nth(MAX_CONTENT_CHARS) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Detach every match from the tree. Detached nodes stay in the arena, so
/// later lookups must go through [`attached`] rather than `Html::select`.
fn strip_elements(document: &mut Html, selectors: &[&str]) {
    for css in selectors {
        let Some(sel) = selector(css) else {
            continue;
        };

        let ids: Vec<_> = attached(document).select(&sel).map(|el| el.id()).collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }
}

/// The `<html>` element; selecting from it only reaches nodes still in the tree
fn attached(document: &Html) -> ElementRef<'_> {
    document.root_element()
}

fn read_title(document: &Html) -> Option<String> {
    let root = attached(document);
    let from = |css: &str, all: bool| -> Option<String> {
        let sel = selector(css)?;
        let text: String = if all {
            root.select(&sel).flat_map(|el| el.text()).collect()
        } else {
            root.select(&sel).next()?.text().collect()
        };
        Some(text).filter(|t| !t.trim().is_empty())
    };

    from("title", true).or_else(|| from("h1", false))
}

fn read_content(document: &Html) -> String {
    let root = attached(document);
    for css in CONTENT_ROOTS {
        if let Some(sel) = selector(css) {
            if let Some(found) = root.select(&sel).next() {
                return found.text().collect();
            }
        }
    }

    // No content root: every paragraph in document order
    match selector("p") {
        Some(sel) => root
            .select(&sel)
            .map(|p| p.text().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n\n"),
        None => String::new(),
    }
}
