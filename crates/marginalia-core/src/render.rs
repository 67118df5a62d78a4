//! The render pipeline: annotated source in, highlighted HTML out.
//!
//! 1. Valid offset-anchored annotations are turned into start/end markers in
//!    the source text ([`insert_markers`]).
//! 2. Math regions are pulled out into a block store ([`protect`]).
//! 3. The remaining text is split into headings and paragraphs, scanned for
//!    undelimited math and for emphasis ([`build_blocks`]).
//! 4. The blocks are emitted as HTML. Highlights are tracked as a set of
//!    active ids; a `<mark>` is opened lazily before content and closed before
//!    any structural tag, so a highlight crossing element boundaries becomes
//!    several wrappers with the same id and the output stays well nested.
//! 5. Text-anchored annotations are located in the finished HTML.
//!
//! Nothing here fails. Bad ranges are skipped, bad math falls back to its
//! escaped source.

use std::collections::HashSet;
use std::fmt;

use markdown_weaver_escape::{escape_html, escape_html_body_text};
use serde::Serialize;
use smol_str::SmolStr;
use tracing::{debug, warn};

use crate::config::RenderOptions;
use crate::highlight::{highlight_records, open_mark};
use crate::markdown::{Block, Inline, build_blocks};
use crate::math::{MathResult, render_math};
use crate::offsets::utf16_range_to_bytes;
use crate::protect::{Marker, Placement, ProtectedBlock, insert_markers, is_reserved, protect};
use crate::types::{Anchor, AnnotationRecord, SourceRange};

/// Why an annotation got no highlight in a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// Empty id, or an id containing reserved marker characters
    InvalidId,
    /// Another annotation earlier in the list has the same id
    DuplicateId,
    /// The anchor text is empty or whitespace
    EmptyText,
    /// `start >= end`
    Degenerate,
    /// Past the end of the source or inside a surrogate pair
    OutOfBounds,
    /// The source under the range no longer reads as the anchor text
    SourceMismatch,
    /// The anchor text does not occur in the rendered text
    NotFound,
    /// The anchor text occurs only across element boundaries
    Split,
    /// The anchor text occurs only inside typeset math
    InMath,
    /// The range covers no rendered content
    Collapsed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::InvalidId => "invalid id",
            SkipReason::DuplicateId => "duplicate id",
            SkipReason::EmptyText => "empty anchor text",
            SkipReason::Degenerate => "empty or inverted range",
            SkipReason::OutOfBounds => "range out of bounds",
            SkipReason::SourceMismatch => "source text does not match anchor text",
            SkipReason::NotFound => "anchor text not found in rendered output",
            SkipReason::Split => "anchor text split across elements",
            SkipReason::InMath => "anchor text only found inside typeset math",
            SkipReason::Collapsed => "range covers no rendered content",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skipped {
    pub id: SmolStr,
    pub reason: SkipReason,
}

/// What happened to each annotation during a render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderReport {
    /// Highlighted by source offsets
    pub offset_anchored: Vec<SmolStr>,
    /// Highlighted by searching the rendered text
    pub text_anchored: Vec<SmolStr>,
    pub skipped: Vec<Skipped>,
}

impl RenderReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    fn skip(&mut self, id: &SmolStr, reason: SkipReason) {
        warn!(%id, %reason, "skipping annotation");
        self.skipped.push(Skipped {
            id: id.clone(),
            reason,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rendered {
    pub html: String,
    pub report: RenderReport,
}

/// Render `source` with `annotations` highlighted, using default class names.
pub fn render(source: &str, annotations: &[AnnotationRecord]) -> String {
    render_with(source, annotations, &RenderOptions::default())
}

pub fn render_with(
    source: &str,
    annotations: &[AnnotationRecord],
    options: &RenderOptions,
) -> String {
    render_with_report(source, annotations, options).html
}

/// Render and report which annotations were placed and how.
pub fn render_with_report(
    source: &str,
    annotations: &[AnnotationRecord],
    options: &RenderOptions,
) -> Rendered {
    let mut report = RenderReport::default();
    let (placements, text_anchored) = partition(source, annotations, &mut report);

    let marked = insert_markers(source, &placements);
    let protected = protect(&marked);
    let blocks = build_blocks(&protected.tokens);
    debug!(
        placed = placements.len(),
        text_anchored = text_anchored.len(),
        math_blocks = protected.blocks.len(),
        blocks = blocks.len(),
        "rendering"
    );

    let mut emitter = Emitter::new(options, &protected.blocks);
    emitter.blocks(&blocks);
    let (html, emitted) = emitter.finish();

    for placement in &placements {
        let id = SmolStr::new(placement.id);
        if emitted.contains(placement.id) {
            report.offset_anchored.push(id);
        } else {
            report.skip(&id, SkipReason::Collapsed);
        }
    }

    let html = strip_reserved(html);
    let html = highlight_records(html, &text_anchored, options, &mut report);
    Rendered { html, report }
}

/// Split annotations into validated placements and text-anchored records.
fn partition<'a>(
    source: &str,
    annotations: &'a [AnnotationRecord],
    report: &mut RenderReport,
) -> (Vec<Placement<'a>>, Vec<&'a AnnotationRecord>) {
    let mut seen = HashSet::new();
    let mut placements = Vec::new();
    let mut text_anchored = Vec::new();

    for record in annotations {
        if record.id.is_empty() || record.id.contains(is_reserved) {
            report.skip(&record.id, SkipReason::InvalidId);
            continue;
        }
        if !seen.insert(record.id.as_str()) {
            report.skip(&record.id, SkipReason::DuplicateId);
            continue;
        }
        if record.text.trim().is_empty() {
            report.skip(&record.id, SkipReason::EmptyText);
            continue;
        }
        match record.anchor() {
            Anchor::Text => text_anchored.push(record),
            Anchor::Offset(range) => match validate(source, &record.text, range) {
                Ok(bytes) => placements.push(Placement {
                    id: record.id.as_str(),
                    bytes,
                }),
                Err(reason) => report.skip(&record.id, reason),
            },
        }
    }
    (placements, text_anchored)
}

/// Check a range against the source and convert it to bytes.
fn validate(
    source: &str,
    text: &str,
    range: SourceRange,
) -> Result<std::ops::Range<usize>, SkipReason> {
    if range.is_empty() {
        return Err(SkipReason::Degenerate);
    }
    let bytes = utf16_range_to_bytes(source, range.to_range()).ok_or(SkipReason::OutOfBounds)?;
    if source[bytes.clone()].trim() != text.trim() {
        return Err(SkipReason::SourceMismatch);
    }
    Ok(bytes)
}

/// Last-resort removal of marker characters that reached the output.
fn strip_reserved(html: String) -> String {
    if !html.contains(is_reserved) {
        return html;
    }
    warn!("stripping leaked highlight markers from rendered output");
    html.chars().filter(|c| !is_reserved(*c)).collect()
}

struct Emitter<'a, 's> {
    out: String,
    options: &'a RenderOptions,
    math: &'a [ProtectedBlock<'s>],
    /// Highlights in effect, in the order they started
    active: Vec<&'s str>,
    /// `<mark>` elements currently open, innermost last
    open: Vec<&'s str>,
    emitted: HashSet<&'s str>,
}

impl<'a, 's> Emitter<'a, 's> {
    fn new(options: &'a RenderOptions, math: &'a [ProtectedBlock<'s>]) -> Self {
        Self {
            out: String::new(),
            options,
            math,
            active: Vec::new(),
            open: Vec::new(),
            emitted: HashSet::new(),
        }
    }

    fn finish(mut self) -> (String, HashSet<&'s str>) {
        self.close_all();
        if self.out.is_empty() {
            self.out.push_str("<p></p>");
        }
        (self.out, self.emitted)
    }

    fn marker(&mut self, marker: Marker<'s>) {
        match marker {
            Marker::Start(id) => {
                if !self.active.contains(&id) {
                    self.active.push(id);
                }
            }
            Marker::End(id) => {
                self.active.retain(|a| *a != id);
                if self.open.contains(&id) {
                    while let Some(top) = self.open.pop() {
                        self.out.push_str("</mark>");
                        if top == id {
                            break;
                        }
                    }
                }
            }
        }
    }

    fn close_all(&mut self) {
        for _ in self.open.drain(..) {
            self.out.push_str("</mark>");
        }
    }

    /// Open a wrapper for every active highlight that has none here yet.
    fn open_marks(&mut self) {
        for &id in &self.active {
            if !self.open.contains(&id) {
                open_mark(&mut self.out, self.options, id);
                self.open.push(id);
                self.emitted.insert(id);
            }
        }
    }

    fn structural(&mut self, tag: &str) {
        self.close_all();
        self.out.push_str(tag);
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.open_marks();
        let _ = escape_html_body_text(&mut self.out, text);
    }

    fn formula(&mut self, mathml: &str, display: bool) {
        self.open_marks();
        self.out.push_str("<span class=\"");
        let _ = escape_html(&mut self.out, &self.options.formula_class);
        if display {
            self.out.push(' ');
            let _ = escape_html(&mut self.out, &self.options.formula_class);
            self.out.push_str("-display");
        }
        self.out.push_str("\">");
        self.out.push_str(mathml);
        self.out.push_str("</span>");
    }

    fn blocks(&mut self, blocks: &[Block<'s>]) {
        for block in blocks {
            match block {
                Block::Heading { level, content } => {
                    self.structural(&format!("<h{level}>"));
                    self.inlines(content);
                    self.structural(&format!("</h{level}>"));
                }
                Block::Paragraph(lines) => {
                    self.structural("<p>");
                    for (i, line) in lines.iter().enumerate() {
                        if i > 0 {
                            self.out.push_str("<br>");
                        }
                        self.inlines(line);
                    }
                    self.structural("</p>");
                }
                Block::Anchors(markers) => {
                    for marker in markers {
                        self.marker(*marker);
                    }
                }
            }
        }
    }

    fn inlines(&mut self, inlines: &[Inline<'s>]) {
        for inline in inlines {
            match inline {
                Inline::Text(text) => self.text(text),
                Inline::Marker(marker) => self.marker(*marker),
                Inline::InlineMath { latex, source } => match render_math(latex, false) {
                    MathResult::Success(mathml) => self.formula(&mathml, false),
                    MathResult::Error { message, .. } => {
                        debug!(latex = %latex, %message, "inline math left as text");
                        self.text(source);
                    }
                },
                Inline::Math(idx) => {
                    let math = self.math;
                    let Some(block) = math.get(*idx) else {
                        continue;
                    };
                    let display = block.kind.display_mode();
                    match render_math(&block.latex, display) {
                        MathResult::Success(mathml) => self.formula(&mathml, display),
                        MathResult::Error { message, .. } => {
                            debug!(latex = %block.latex, %message, "math block left as source");
                            self.text(&block.source);
                        }
                    }
                }
                Inline::Strong(children) => {
                    self.structural("<strong>");
                    self.inlines(children);
                    self.structural("</strong>");
                }
                Inline::Emphasis(children) => {
                    self.structural("<em>");
                    self.inlines(children);
                    self.structural("</em>");
                }
            }
        }
    }
}
