//! Page acquisition and article extraction.
//!
//! - Page fetching trait and reqwest-backed implementation (`fetch`)
//! - HTML parsing seam over `dom_query` (`parse`)
//! - Article reformatting into a simplified HTML fragment (`extract`)
//!
//! The extractor only ever talks to the [`fetch::PageFetcher`] and
//! [`parse::HtmlParser`] traits, so tests can swap either for a double.

pub mod extract;
pub mod fetch;
pub mod parse;

pub use extract::{ContentExtractor, DEFAULT_TITLE};
pub use fetch::{HttpPageFetcher, PageFetcher};
pub use parse::{DomQueryParser, HtmlParser};
