//! Article reformatting: raw page HTML in, simplified display fragment out.
//!
//! The fragment only ever contains `p`, `h2`, `h3`, `ul`/`ol` + `li` and
//! `blockquote` tags carrying fixed `medium-*` classes. Element text is
//! flattened (nested markup dropped) and re-escaped, so nothing from the
//! source page can smuggle other tags into the output.

use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Instant;

use dom_query::{Document, NodeRef};
use quill_common::{ExtractionResult, QuillError, Result};
use regex::Regex;

use crate::fetch::PageFetcher;
use crate::parse::HtmlParser;

/// Title used when the page has no level-1 heading.
pub const DEFAULT_TITLE: &str = "Talent Building in HR: From Recruitment to Development";

/// Elements stripped from the content container before the walk.
pub const NOISE_SELECTORS: &[&str] = &["nav", ".js-postMetaLockup", ".pw-highlight-menu"];

/// Tags re-emitted into the fragment; everything else is only traversed.
const CONTENT_TAGS: &[&str] = &["p", "h2", "h3", "ul", "ol", "blockquote"];

#[allow(clippy::expect_used)]
static H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h1\b[^>]*>(.*?)</h1\s*>").expect("valid h1 regex"));

/// Fetches a page and reformats its article body.
pub struct ContentExtractor {
    fetcher: Arc<dyn PageFetcher>,
    parser: Arc<dyn HtmlParser>,
}

impl ContentExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, parser: Arc<dyn HtmlParser>) -> Self {
        Self { fetcher, parser }
    }

    /// Fetch `url` and extract it. Any fetch failure ends the call immediately.
    pub async fn extract(&self, url: &str) -> Result<ExtractionResult> {
        let started = Instant::now();
        tracing::info!(target: "web.extract", %url, "extract.start");

        let html = self.fetcher.fetch(url).await.map_err(|e| {
            let message = format!("{e:#}");
            tracing::warn!(target: "web.extract", %url, error = %message, "extract.fetch_failed");
            QuillError::Fetch(message)
        })?;

        let result = self.extract_from_html(url, &html)?;
        tracing::info!(
            target: "web.extract",
            %url,
            title = %result.title,
            content_len = result.content.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "extract.complete"
        );
        Ok(result)
    }

    /// Extract from markup that has already been fetched. Deterministic for a given input.
    pub fn extract_from_html(&self, url: &str, html: &str) -> Result<ExtractionResult> {
        let title = extract_title(html);
        let doc = self.parser.parse(html).map_err(|e| {
            let message = format!("{e:#}");
            tracing::warn!(target: "web.extract", %url, error = %message, "extract.parse_failed");
            QuillError::Parse(message)
        })?;
        let content = format_content(&doc);

        Ok(ExtractionResult {
            title,
            content,
            url: url.to_string(),
        })
    }
}

/// Inner text of the first `<h1>` in the raw markup, or [`DEFAULT_TITLE`].
///
/// The heading is located on the markup rather than the parsed tree, so an
/// `<h1>` inside a comment or script still counts. Its inner markup is then
/// parsed as a fragment, which drops nested tags and decodes entities.
pub fn extract_title(html: &str) -> String {
    H1_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|inner| {
            Document::fragment(inner.as_str())
                .text()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

/// Reformat the primary container (`article`, else `main`) of a parsed page.
///
/// Noise elements are removed from the tree first. Returns an empty string
/// when neither container exists.
pub fn format_content(doc: &Document) -> String {
    let article = doc.select("article");
    let container = if article.exists() {
        article.first()
    } else {
        doc.select("main").first()
    };

    let Some(root) = container.nodes().first().copied() else {
        return String::new();
    };

    container.select(&NOISE_SELECTORS.join(", ")).remove();

    let mut out = String::new();
    // Pre-order walk, children pushed in reverse so they pop in document order.
    let mut stack: Vec<NodeRef> = root.children().into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        if !node.is_element() {
            continue;
        }
        if let Some(tag) = node.node_name() {
            if let Some(block) = render_block(&tag, &node) {
                out.push_str(&block);
            }
        }
        stack.extend(node.children().into_iter().rev());
    }
    out
}

fn render_block(tag: &str, node: &NodeRef) -> Option<String> {
    if !CONTENT_TAGS.contains(&tag) {
        return None;
    }
    let block = match tag {
        "h2" | "h3" => format!(
            "<{tag} class=\"medium-heading\">{}</{tag}>",
            escape_text(&node.text())
        ),
        "blockquote" => format!(
            "<blockquote class=\"medium-quote\">{}</blockquote>",
            escape_text(&node.text())
        ),
        "ul" | "ol" => {
            let items: String = node
                .children()
                .iter()
                .filter(|child| child.is_element() && child.node_name().as_deref() == Some("li"))
                .map(|li| format!("<li>{}</li>", escape_text(&li.text())))
                .collect();
            format!("<{tag} class=\"medium-list\">{items}</{tag}>")
        }
        _ => format!(
            "<p class=\"medium-paragraph\">{}</p>",
            escape_text(&node.text())
        ),
    };
    Some(block)
}

fn escape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
