//! Common types and utilities shared across Quill crates.
//!
//! This crate defines the request/response shapes of the extraction API,
//! the shared error taxonomy, and observability helpers used throughout the
//! Quill workspace. It is intentionally lightweight so that every crate can
//! depend on it without introducing heavy transitive costs.
//!
//! # Overview
//!
//! - [`ExtractionRequest`]: Inbound payload naming the page to extract
//! - [`ExtractionResult`]: Title + simplified HTML fragment for a page
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`QuillError`] and [`Result`]: Shared error handling
//!
//! # Examples
//!
//! Validating an inbound request:
//!
//! ```rust
//! use quill_common::{ExtractionRequest, QuillError};
//!
//! let req = ExtractionRequest { url: Some("https://medium.com/@a/b".into()) };
//! assert_eq!(req.validated_url().unwrap(), "https://medium.com/@a/b");
//!
//! let empty = ExtractionRequest { url: Some("   ".into()) };
//! assert!(matches!(empty.validated_url(), Err(QuillError::MissingUrl)));
//! ```
use serde::{Deserialize, Serialize};

pub mod observability;

/// Message returned to callers that omit the page URL.
pub const MISSING_URL_MESSAGE: &str = "No Medium URL provided";

/// Inbound payload for the extraction endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionRequest {
    /// Page to fetch. Absent and blank values are rejected by [`Self::validated_url`].
    #[serde(default)]
    pub url: Option<String>,
}

impl ExtractionRequest {
    /// Return the trimmed URL, or [`QuillError::MissingUrl`] when it is absent or blank.
    pub fn validated_url(&self) -> Result<&str> {
        match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(QuillError::MissingUrl),
        }
    }
}

/// Extracted page, ready for display.
///
/// Title and content are always produced together; a failed extraction never
/// yields a partially populated result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Text of the first level-1 heading, or a fixed fallback.
    pub title: String,
    /// Simplified HTML fragment (paragraphs, headings, lists, quotes).
    pub content: String,
    /// The URL the caller asked for.
    pub url: String,
}

/// Error types used across the Quill system.
#[derive(thiserror::Error, Debug)]
pub enum QuillError {
    /// The caller did not supply a usable URL.
    #[error("No Medium URL provided")]
    MissingUrl,

    /// Retrieving the page failed (network, status, content type, size).
    #[error("{0}")]
    Fetch(String),

    /// The fetched markup could not be turned into a document tree.
    #[error("{0}")]
    Parse(String),
}

impl QuillError {
    /// Whether the failure was caused by the caller's input rather than a downstream system.
    pub fn is_client_error(&self) -> bool {
        matches!(self, QuillError::MissingUrl)
    }
}

/// Convenient alias for results that use [`QuillError`].
pub type Result<T> = std::result::Result<T, QuillError>;
