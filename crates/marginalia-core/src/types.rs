//! Annotation data model shared with the host application.
//!
//! The JSON shape matches what the host persists:
//! `{id, type, data, text, timestamp, range: {start, end}}`.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::ops::Range;

use crate::error::MarginaliaError;
use crate::offsets::utf16_len;

/// Offsets into a source document, in UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRange {
    pub start: usize,
    pub end: usize,
}

impl SourceRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The sentinel range for `text`: "offset unknown, locate by text".
    pub fn sentinel_for(text: &str) -> Self {
        Self {
            start: 0,
            end: utf16_len(text),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn to_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl From<Range<usize>> for SourceRange {
    fn from(range: Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }
}

/// Kind of review comment attached to a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentKind {
    /// Violation of quality
    Voq,
    Strength,
    Improvement,
    #[default]
    Other,
}

/// One annotation on a source document.
///
/// `kind` and `data` are opaque to rendering and pass through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub id: SmolStr,
    #[serde(rename = "type", default)]
    pub kind: CommentKind,
    #[serde(default)]
    pub data: Vec<String>,
    /// The literal text the user selected.
    pub text: String,
    /// Creation time in milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: u64,
    /// Missing in records written before ranges were tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<SourceRange>,
}

/// How an annotation is to be placed in the rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Placed by source offsets.
    Offset(SourceRange),
    /// Placed by searching the rendered text for the anchor text.
    Text,
}

impl AnnotationRecord {
    pub fn new(id: impl Into<SmolStr>, text: impl Into<String>, range: SourceRange) -> Self {
        Self {
            id: id.into(),
            kind: CommentKind::default(),
            data: Vec::new(),
            text: text.into(),
            timestamp: 0,
            range: Some(range),
        }
    }

    /// A record whose position is unknown and must be found by text search.
    pub fn text_anchored(id: impl Into<SmolStr>, text: impl Into<String>) -> Self {
        let text = text.into();
        let range = SourceRange::sentinel_for(&text);
        Self::new(id, text, range)
    }

    pub fn with_kind(mut self, kind: CommentKind, data: Vec<String>) -> Self {
        self.kind = kind;
        self.data = data;
        self
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Classify the record. The sentinel `{start: 0, end: len(text)}` and a
    /// missing range both mean "locate by text".
    pub fn anchor(&self) -> Anchor {
        match self.range {
            Some(range) if range != SourceRange::sentinel_for(&self.text) => Anchor::Offset(range),
            _ => Anchor::Text,
        }
    }

    /// Whether the structured payload has not been filled in yet.
    pub fn is_incomplete(&self) -> bool {
        !self.data.iter().any(|d| !d.trim().is_empty())
    }
}

/// Decode a JSON array of annotation records.
pub fn parse_records(json: &str) -> Result<Vec<AnnotationRecord>, MarginaliaError> {
    serde_json::from_str(json).map_err(MarginaliaError::Records)
}

/// Encode annotation records as a JSON array.
pub fn records_to_json(records: &[AnnotationRecord]) -> Result<String, MarginaliaError> {
    serde_json::to_string(records).map_err(MarginaliaError::Encode)
}
