use anyhow::Result;
use dom_query::Document;

/// Turns raw markup into a traversable document tree.
pub trait HtmlParser: Send + Sync {
    fn parse(&self, html: &str) -> Result<Document>;
}

/// html5ever-based parser via `dom_query`; recovers from malformed markup like a browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomQueryParser;

impl HtmlParser for DomQueryParser {
    fn parse(&self, html: &str) -> Result<Document> {
        Ok(Document::from(html))
    }
}
