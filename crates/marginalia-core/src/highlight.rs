//! Text-based highlighting of already rendered HTML.
//!
//! Used for annotations whose source offsets are unknown. The anchor text is
//! looked up in the rendered text and the first text run containing it gets
//! wrapped. Later occurrences are never wrapped.

use markdown_weaver_escape::escape_html;
use smol_str::SmolStr;

use crate::config::RenderOptions;
use crate::render::{RenderReport, SkipReason, Skipped};
use crate::rendered::{TextRuns, text_content};
use crate::types::AnnotationRecord;

/// Write the opening tag of a highlight wrapper for `id`.
pub(crate) fn open_mark(out: &mut String, options: &RenderOptions, id: &str) {
    out.push_str("<mark class=\"");
    let _ = escape_html(&mut *out, &options.highlight_class);
    out.push_str("\" data-comment-id=\"");
    let _ = escape_html(&mut *out, id);
    out.push_str("\">");
}

/// Wrap the first occurrence of `anchor` in the rendered text of `html`.
fn wrap_first(
    html: &str,
    id: &str,
    anchor: &str,
    options: &RenderOptions,
) -> Result<String, SkipReason> {
    let needle = anchor.trim();
    if needle.is_empty() {
        return Err(SkipReason::EmptyText);
    }
    if !text_content(html).contains(needle) {
        return Err(SkipReason::NotFound);
    }

    let mut outside_math = String::new();
    for run in TextRuns::new(html) {
        if run.in_math {
            continue;
        }
        outside_math.push_str(&run.text());
        let Some(at) = run.text().find(needle) else {
            continue;
        };
        let start = run.span.start + run.raw_offset(at);
        let end = run.span.start + run.raw_offset(at + needle.len());

        let mut out = String::with_capacity(html.len() + id.len() + 64);
        out.push_str(&html[..start]);
        open_mark(&mut out, options, id);
        out.push_str(&html[start..end]);
        out.push_str("</mark>");
        out.push_str(&html[end..]);
        return Ok(out);
    }
    if outside_math.contains(needle) {
        Err(SkipReason::Split)
    } else {
        Err(SkipReason::InMath)
    }
}

/// Apply text-anchored highlights in order, recording the outcome of each.
pub(crate) fn highlight_records(
    mut html: String,
    records: &[&AnnotationRecord],
    options: &RenderOptions,
    report: &mut RenderReport,
) -> String {
    for record in records {
        match wrap_first(&html, &record.id, &record.text, options) {
            Ok(next) => {
                html = next;
                report.text_anchored.push(record.id.clone());
            }
            Err(reason) => {
                tracing::warn!(
                    id = %record.id,
                    anchor = %record.text,
                    %reason,
                    "text-anchored annotation not highlighted"
                );
                report.skipped.push(Skipped {
                    id: record.id.clone(),
                    reason,
                });
            }
        }
    }
    html
}

/// Highlight each annotation's anchor text in rendered HTML, ignoring any
/// source offsets the records carry.
///
/// Annotations whose text does not appear in a single text run are skipped.
pub fn apply_text_highlights(
    html: &str,
    annotations: &[AnnotationRecord],
    options: &RenderOptions,
) -> String {
    let records: Vec<&AnnotationRecord> = annotations.iter().collect();
    let mut report = RenderReport::default();
    let html = highlight_records(html.to_string(), &records, options, &mut report);
    tracing::debug!(
        highlighted = report.text_anchored.len(),
        skipped = report.skipped.len(),
        "applied text highlights"
    );
    html
}

/// Ids present in `html` as highlight wrappers, in document order.
pub fn highlighted_ids(html: &str) -> Vec<SmolStr> {
    const ATTR: &str = "data-comment-id=\"";
    let mut ids = Vec::new();
    let mut rest = html;
    while let Some(at) = rest.find(ATTR) {
        rest = &rest[at + ATTR.len()..];
        let Some(end) = rest.find('"') else { break };
        let id = crate::rendered::decode_entities(&rest[..end]);
        if !ids.iter().any(|seen: &SmolStr| seen.as_str() == id) {
            ids.push(SmolStr::new(id));
        }
        rest = &rest[end..];
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceRange;

    fn wrap(html: &str, anchor: &str) -> Result<String, SkipReason> {
        wrap_first(html, "c1", anchor, &RenderOptions::default())
    }

    #[test]
    fn wraps_first_occurrence_only() {
        let out = wrap("<p>foo bar foo</p>", "foo").unwrap();
        assert_eq!(
            out,
            r#"<p><mark class="latex-highlight" data-comment-id="c1">foo</mark> bar foo</p>"#
        );
    }

    #[test]
    fn matches_through_entities() {
        let out = wrap("<p>if a &lt; b then</p>", "a < b").unwrap();
        assert_eq!(
            out,
            r#"<p>if <mark class="latex-highlight" data-comment-id="c1">a &lt; b</mark> then</p>"#
        );
    }

    #[test]
    fn skips_math_runs() {
        let html = r#"<p><span><math><mi>x</mi></math></span> and x</p>"#;
        let out = wrap(html, "x").unwrap();
        assert!(out.ends_with(r#" and <mark class="latex-highlight" data-comment-id="c1">x</mark></p>"#));
    }

    #[test]
    fn missing_and_split_text() {
        assert_eq!(wrap("<p>abc</p>", "zzz"), Err(SkipReason::NotFound));
        assert_eq!(
            wrap("<p>a <strong>b</strong></p>", "a b"),
            Err(SkipReason::Split)
        );
        assert_eq!(wrap("<p>abc</p>", "  "), Err(SkipReason::EmptyText));
    }

    #[test]
    fn text_only_inside_math_is_reported_as_such() {
        let html = r#"<p><span><math><mi>x</mi></math></span> and <span><math><mi>x</mi></math></span></p>"#;
        assert_eq!(wrap(html, "x"), Err(SkipReason::InMath));
    }

    #[test]
    fn anchor_text_is_trimmed() {
        let out = wrap("<p>alpha beta</p>", " beta ").unwrap();
        assert!(out.contains(">beta</mark>"));
    }

    #[test]
    fn ids_are_attribute_escaped() {
        let rec = AnnotationRecord::new("a\"b", "word", SourceRange::new(0, 0));
        let out = apply_text_highlights("<p>word</p>", &[rec], &RenderOptions::default());
        assert!(out.contains(r#"data-comment-id="a&quot;b""#));
        assert_eq!(highlighted_ids(&out), vec![SmolStr::new("a\"b")]);
    }
}
