//! End-to-end behaviour of the render pipeline.

use marginalia_core::{
    AnnotationRecord, RenderOptions, SkipReason, SourceRange, highlighted_ids, render,
    render_with_report, text_content,
};
use pretty_assertions::assert_eq;

fn rec(id: &str, text: &str, start: usize, end: usize) -> AnnotationRecord {
    AnnotationRecord::new(id, text, SourceRange::new(start, end))
}

/// Text inside the first highlight wrapper for `id`.
fn wrapped<'h>(html: &'h str, id: &str) -> Option<&'h str> {
    let open = format!("data-comment-id=\"{id}\">");
    let start = html.find(&open)? + open.len();
    let len = html[start..].find("</mark>")?;
    Some(&html[start..start + len])
}

#[test]
fn basic_highlight() {
    let html = render("The integral converges.", &[rec("c1", "integral", 4, 12)]);
    assert_eq!(highlighted_ids(&html).len(), 1);
    assert_eq!(wrapped(&html, "c1"), Some("integral"));
    assert_eq!(text_content(&html), "The integral converges.");
}

#[test]
fn rendering_is_idempotent() {
    let source = "# Title\n\nLet \\(x^2\\) and $$\\sum_{i=0}^{n} i$$ hold for **all** x_1.\n\nSecond σ paragraph.";
    let annotations = vec![
        rec("a", "Title", 2, 7),
        rec("b", "all", 57, 60),
        AnnotationRecord::text_anchored("c", "Second"),
        rec("d", "oops", 90, 3),
    ];
    let first = render_with_report(source, &annotations, &RenderOptions::default());
    let second = render_with_report(source, &annotations, &RenderOptions::default());
    assert_eq!(first, second);
    assert_eq!(render(source, &annotations), first.html);
}

#[test]
fn non_overlapping_annotations_do_not_interfere() {
    let source = "first part, middle, second part";
    let a1 = rec("a1", "first part", 0, 10);
    let a2 = rec("a2", "second part", 20, 31);
    let html = render(source, &[a1.clone(), a2.clone()]);
    assert_eq!(wrapped(&html, "a1"), Some("first part"));
    assert_eq!(wrapped(&html, "a2"), Some("second part"));

    // order of the list does not matter
    assert_eq!(render(source, &[a2, a1]), html);
}

#[test]
fn offset_and_text_anchored_together() {
    let source = "first part, middle, second part";
    let html = render(
        source,
        &[
            rec("a1", "first part", 0, 10),
            AnnotationRecord::text_anchored("t1", "middle"),
        ],
    );
    assert_eq!(wrapped(&html, "a1"), Some("first part"));
    assert_eq!(wrapped(&html, "t1"), Some("middle"));
}

#[test]
fn degenerate_ranges_are_skipped() {
    let source = "short text";
    let annotations = vec![
        rec("empty", "text", 6, 6),
        rec("inverted", "text", 10, 6),
        rec("past", "text", 6, 11),
    ];
    let rendered = render_with_report(source, &annotations, &RenderOptions::default());
    assert_eq!(rendered.html, "<p>short text</p>");
    let reasons: Vec<_> = rendered.report.skipped.iter().map(|s| s.reason).collect();
    assert_eq!(
        reasons,
        vec![
            SkipReason::Degenerate,
            SkipReason::Degenerate,
            SkipReason::OutOfBounds
        ]
    );
}

#[test]
fn stale_range_is_skipped() {
    // The text moved after the annotation was made.
    let html = render("the new integral", &[rec("c1", "integral", 4, 12)]);
    assert!(highlighted_ids(&html).is_empty());
}

#[test]
fn math_survives() {
    let html = render("\\(x^2\\)", &[]);
    assert!(html.contains("class=\"latex-formula\""), "{html}");
    assert!(html.contains("<math"));
    assert!(!html.contains("\\("));
    assert!(!html.contains("\\)"));
}

#[test]
fn display_and_environment_math_are_display_mode() {
    let html = render(
        "\\[a+b\\]\n\n\\begin{matrix}1 & 2\\end{matrix}",
        &[],
    );
    assert_eq!(html.matches("latex-formula-display").count(), 2, "{html}");
}

#[test]
fn undelimited_math_is_typeset() {
    let html = render(r"so \frac{\frac{a}{b}}{c} holds", &[]);
    assert_eq!(html.matches("<math").count(), 1, "{html}");
    assert!(html.starts_with("<p>so "));
    assert!(html.ends_with(" holds</p>"));
}

#[test]
fn sentinel_range_falls_back_to_text_search() {
    let html = render(
        "alpha beta gamma",
        &[rec("s", "beta", 0, 4)],
    );
    assert_eq!(wrapped(&html, "s"), Some("beta"));
    insta::assert_snapshot!("sentinel_fallback", html);
}

#[test]
fn unmatched_text_anchor_renders_whole_document() {
    let rendered = render_with_report(
        "alpha beta gamma",
        &[AnnotationRecord::text_anchored("n", "nonexistent")],
        &RenderOptions::default(),
    );
    assert_eq!(rendered.html, "<p>alpha beta gamma</p>");
    assert_eq!(rendered.report.skipped[0].reason, SkipReason::NotFound);
}

#[test]
fn legacy_record_without_range_is_text_anchored() {
    let mut record = rec("legacy", "gamma", 0, 0);
    record.range = None;
    let html = render("alpha beta gamma", &[record]);
    assert_eq!(wrapped(&html, "legacy"), Some("gamma"));
}

#[test]
fn structure_with_highlights() {
    let source = "# Results\n\nThe **main** claim holds.\nIt is *robust* & simple.\n\n## Notes\nFinal remark.";
    let html = render(
        source,
        &[
            rec("c1", "**main** claim", 15, 29),
            AnnotationRecord::text_anchored("c2", "simple"),
        ],
    );
    insta::assert_snapshot!("structure", html);
    insta::assert_yaml_snapshot!("structure_ids", highlighted_ids(&html));
}

#[test]
fn malformed_input_never_panics() {
    let inputs = [
        "",
        "\\(",
        "$$",
        "$x",
        "\\begin{",
        "\\begin{x}",
        "\\frac{",
        "**",
        "*a**b*",
        "# ",
        "\u{E000}id\u{E002}text\u{E001}id",
        "𝔸𝔸𝔸",
        "[x^2](",
        "(\\alpha",
        "\\[ \\( \\] \\)",
    ];
    for input in inputs {
        let annotations = vec![
            rec("a", "x", 0, 1),
            rec("b", "𝔸", 1, 2),
            AnnotationRecord::text_anchored("c", "text"),
        ];
        let html = render(input, &annotations);
        assert!(html.starts_with('<'), "{input:?} -> {html}");
        assert!(!html.contains(['\u{E000}', '\u{E001}', '\u{E002}']));
    }
}
