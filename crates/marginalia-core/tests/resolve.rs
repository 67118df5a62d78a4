//! Selection-to-source resolution, including round trips through rendering.

use marginalia_core::offsets::utf16_len;
use marginalia_core::{
    AnnotationRecord, HtmlSelection, PlainSelection, SourceRange, render, resolve, text_content,
};

#[test]
fn unique_substrings_round_trip() {
    let source = "Every bounded monotone sequence of reals converges to its supremum.";
    let words = ["bounded monotone", "sequence", "reals converges", "supremum."];
    for t in words {
        let start = source.find(t).unwrap();
        assert_eq!(source.matches(t).count(), 1);
        let expected = SourceRange::new(start, start + t.len());
        assert_eq!(
            resolve(&PlainSelection::new(t, &source[..start]), source),
            Some(expected),
            "{t}"
        );
    }
}

#[test]
fn duplicate_occurrence_is_disambiguated_by_context() {
    let source = "foo BAR foo BAZ foo QUX";
    let got = resolve(&PlainSelection::new("foo", "BAR "), source);
    assert_eq!(got, Some(SourceRange::new(8, 11)));
}

#[test]
fn selection_in_rendered_html_maps_back() {
    let source = "Intro line.\n\nfoo **BAR** foo BAZ foo QUX";
    let html = render(source, &[]);
    let text = text_content(&html);

    // select the second "foo" in the rendered text
    let at = text.match_indices("foo").nth(1).unwrap().0;
    let start = utf16_len(&text[..at]);
    let selection = HtmlSelection::from_rendered_offsets(&html, start..start + 3).unwrap();

    let range = resolve(&selection, source).unwrap();
    let expected = source.match_indices("foo").nth(1).unwrap().0;
    assert_eq!(range, SourceRange::new(expected, expected + 3));
}

#[test]
fn selection_next_to_existing_highlight_maps_back() {
    let source = "foo BAR foo BAZ foo QUX";
    let html = render(source, &[AnnotationRecord::new("h", "BAR foo", SourceRange::new(4, 11))]);
    assert!(html.contains(r#"data-comment-id="h">BAR foo</mark>"#), "{html}");

    // the second "foo" sits inside the existing wrapper
    let selection = HtmlSelection::from_rendered_offsets(&html, 8..11).unwrap();
    assert_eq!(resolve(&selection, source), Some(SourceRange::new(8, 11)));
}

#[test]
fn resolved_range_renders_as_highlight() {
    let source = "A lemma: every $n$ has a successor.";
    let selection = PlainSelection::new("has a successor", "every n ");
    let range = resolve(&selection, source).unwrap();

    let record = AnnotationRecord::new("r", "has a successor", range);
    let html = render(source, &[record]);
    assert!(
        html.contains(r#"data-comment-id="r">has a successor</mark>"#),
        "{html}"
    );
}

#[test]
fn selection_over_rendered_math_uses_fuzzy_words() {
    let source = r"Suppose \(\alpha > 0\). Then the series converges absolutely.";
    let selected = "Suppose α > 0. Then the series converges absolutely";
    let range = resolve(&PlainSelection::new(selected, ""), source).unwrap();
    assert_eq!(range.start, 0);
    assert_eq!(range.end, source.find("absolutely").unwrap() + "absolutely".len());
}

#[test]
fn failure_returns_none() {
    let source = "nothing to see";
    assert_eq!(resolve(&PlainSelection::new("", ""), source), None);
    assert_eq!(resolve(&PlainSelection::new("xyz", ""), source), None);
    assert_eq!(
        resolve(&PlainSelection::new("unrelated words entirely", ""), source),
        None
    );
}
