//! Mapping a selection in the rendered view back to source offsets.
//!
//! Strategies, first success wins:
//!
//! 1. the trimmed selected text occurs exactly once in the source
//! 2. it occurs several times: pick the occurrence whose preceding source
//!    text shares the longest trailing run with the rendered text before the
//!    selection (ties go to the earliest occurrence)
//! 3. it does not occur: span from the first to the last word of at least
//!    [`ResolveOptions::min_word_len`] chars, or from the first word to the
//!    end of its sentence or line if the last word is missing
//!
//! A degenerate or out-of-bounds result is no result.

use std::ops::Range;

use tracing::debug;

use crate::config::ResolveOptions;
use crate::offsets::{byte_to_utf16, char_to_byte, tail_chars, utf16_len, utf16_to_byte};
use crate::rendered::TextRuns;
use crate::types::SourceRange;

/// A selection made in the rendered output.
pub trait RenderedSelection {
    /// The selected text as displayed.
    fn selected_text(&self) -> String;

    /// Up to `max_chars` chars of rendered text immediately before the
    /// selection.
    fn text_before(&self, max_chars: usize) -> String;
}

/// A selection described directly by its text and the text preceding it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlainSelection {
    pub text: String,
    pub preceding: String,
}

impl PlainSelection {
    pub fn new(text: impl Into<String>, preceding: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            preceding: preceding.into(),
        }
    }
}

impl RenderedSelection for PlainSelection {
    fn selected_text(&self) -> String {
        self.text.clone()
    }

    fn text_before(&self, max_chars: usize) -> String {
        tail_chars(&self.preceding, max_chars).to_string()
    }
}

/// A boundary point in rendered HTML: the index of a text run (as yielded by
/// [`TextRuns`]) and an offset into its decoded text in UTF-16 units, the
/// same way a DOM `Range` addresses a text node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DomPoint {
    pub run: usize,
    pub offset: usize,
}

impl DomPoint {
    pub fn new(run: usize, offset: usize) -> Self {
        Self { run, offset }
    }
}

/// A selection between two [`DomPoint`]s of rendered HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlSelection<'h> {
    html: &'h str,
    start: DomPoint,
    end: DomPoint,
}

impl<'h> HtmlSelection<'h> {
    /// Points given in reverse order are swapped.
    pub fn new(html: &'h str, start: DomPoint, end: DomPoint) -> Self {
        let (start, end) = if end < start { (end, start) } else { (start, end) };
        Self { html, start, end }
    }

    /// Build a selection from UTF-16 offsets into the rendered text content.
    ///
    /// Returns `None` for an inverted range or one past the end of the text.
    pub fn from_rendered_offsets(html: &'h str, range: Range<usize>) -> Option<Self> {
        if range.start > range.end {
            return None;
        }
        let mut start = None;
        let mut end = None;
        let mut seen = 0;
        let mut last = None;
        for (idx, run) in TextRuns::new(html).enumerate() {
            let len = run.text().encode_utf16().count();
            if start.is_none() && range.start < seen + len {
                start = Some(DomPoint::new(idx, range.start - seen));
            }
            if end.is_none() && range.end <= seen + len && range.end > seen {
                end = Some(DomPoint::new(idx, range.end - seen));
            }
            seen += len;
            last = Some(DomPoint::new(idx, len));
        }
        if range.end > seen {
            return None;
        }
        // An empty range at the very end, or a selection touching the end.
        let start = start.or(last)?;
        let end = end.unwrap_or(start);
        Some(Self::new(html, start, end))
    }

    pub fn start(&self) -> DomPoint {
        self.start
    }

    pub fn end(&self) -> DomPoint {
        self.end
    }

    /// Decoded run texts, in document order.
    fn runs(&self) -> Vec<String> {
        TextRuns::new(self.html)
            .map(|run| run.text().into_owned())
            .collect()
    }
}

/// Byte offset in `text` for a UTF-16 offset, clamped to the text.
fn clamp_point(text: &str, utf16: usize) -> usize {
    let mut offset = utf16.min(utf16_len(text));
    while offset > 0 {
        if let Some(byte) = utf16_to_byte(text, offset) {
            return byte;
        }
        offset -= 1;
    }
    0
}

impl RenderedSelection for HtmlSelection<'_> {
    fn selected_text(&self) -> String {
        let runs = self.runs();
        let mut out = String::new();
        for (idx, text) in runs.iter().enumerate() {
            if idx < self.start.run || idx > self.end.run {
                continue;
            }
            let from = if idx == self.start.run {
                clamp_point(text, self.start.offset)
            } else {
                0
            };
            let to = if idx == self.end.run {
                clamp_point(text, self.end.offset)
            } else {
                text.len()
            };
            if from < to {
                out.push_str(&text[from..to]);
            }
        }
        out
    }

    fn text_before(&self, max_chars: usize) -> String {
        let runs = self.runs();
        let mut before = String::new();
        for (idx, text) in runs.iter().enumerate() {
            if idx < self.start.run {
                before.push_str(text);
            } else if idx == self.start.run {
                before.push_str(&text[..clamp_point(text, self.start.offset)]);
            }
        }
        tail_chars(&before, max_chars).to_string()
    }
}

/// Resolve a rendered selection to a source range with default tunables.
pub fn resolve<S: RenderedSelection + ?Sized>(selection: &S, source: &str) -> Option<SourceRange> {
    resolve_with(selection, source, &ResolveOptions::default())
}

/// Resolve a rendered selection to a source range in UTF-16 units.
pub fn resolve_with<S: RenderedSelection + ?Sized>(
    selection: &S,
    source: &str,
    options: &ResolveOptions,
) -> Option<SourceRange> {
    let selected = selection.selected_text();
    let needle = selected.trim();
    if needle.is_empty() {
        debug!("empty selection");
        return None;
    }

    let bytes = match occurrences(source, needle).as_slice() {
        [] => fuzzy(source, needle, options),
        [only] => Some(*only..*only + needle.len()),
        many => {
            // whitespace trimmed off the selection belongs to its context
            let leading = &selected[..selected.len() - selected.trim_start().len()];
            let context = selection.text_before(options.context_window) + leading;
            let context = tail_chars(&context, options.context_window);
            let at = best_by_context(source, many, context);
            Some(at..at + needle.len())
        }
    }?;

    if bytes.start >= bytes.end || bytes.end > source.len() {
        debug!(?bytes, "resolved range is degenerate");
        return None;
    }
    Some(SourceRange::new(
        byte_to_utf16(source, bytes.start),
        byte_to_utf16(source, bytes.end),
    ))
}

/// Every start of `needle` in `source`, overlapping occurrences included.
fn occurrences(source: &str, needle: &str) -> Vec<usize> {
    let mut found = Vec::new();
    let mut from = 0;
    while let Some(at) = source[from..].find(needle) {
        let at = from + at;
        found.push(at);
        from = at + source[at..].chars().next().map_or(1, char::len_utf8);
    }
    found
}

/// Length of the common trailing run of two strings, in chars.
fn trailing_match(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

fn best_by_context(source: &str, candidates: &[usize], context: &str) -> usize {
    let window = context.chars().count();
    let mut best = candidates[0];
    let mut best_score = 0;
    for &at in candidates {
        let score = trailing_match(tail_chars(&source[..at], window), context);
        debug!(at, score, "context score");
        if score > best_score {
            best = at;
            best_score = score;
        }
    }
    best
}

/// Span between the first and last significant words of the selection.
fn fuzzy(source: &str, needle: &str, options: &ResolveOptions) -> Option<Range<usize>> {
    let words: Vec<&str> = needle
        .split_whitespace()
        .filter(|w| w.chars().count() >= options.min_word_len)
        .collect();
    let (first, last) = match words.as_slice() {
        [] => {
            debug!("no significant words in selection");
            return None;
        }
        [first, .., last] => (*first, *last),
        [only] => (*only, *only),
    };

    let start = source.find(first)?;
    let first_end = start + first.len();
    if let Some(at) = source[start..].find(last) {
        return Some(start..start + at + last.len());
    }

    debug!(first, last, "last word missing, bounding by sentence");
    let after = &source[first_end..];
    let cap = start + char_to_byte(&source[start..], options.fallback_window);
    let end = [after.find('.'), after.find('\n')]
        .into_iter()
        .flatten()
        .map(|at| first_end + at + 1)
        .chain(std::iter::once(cap))
        .min()
        .unwrap_or(cap);
    Some(start..end.max(first_end))
}
