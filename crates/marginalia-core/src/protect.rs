//! Highlight markers and math-region protection.
//!
//! Annotated spans are delimited in the source text by marker sequences built
//! from private-use characters, which no markdown or LaTeX syntax produces:
//!
//! - start: `U+E000 <id> U+E002`
//! - end:   `U+E001 <id> U+E002`
//!
//! [`protect`] then splits the marked text into typed tokens, pulling out
//! display math, inline math and environment blocks into an indexed store so
//! the markdown and inline-math passes never see them.

use std::borrow::Cow;
use std::ops::Range;

pub(crate) const MARK_START: char = '\u{E000}';
pub(crate) const MARK_END: char = '\u{E001}';
pub(crate) const MARK_CLOSE: char = '\u{E002}';

pub(crate) fn is_reserved(c: char) -> bool {
    matches!(c, MARK_START | MARK_END | MARK_CLOSE)
}

/// An annotation's validated byte range in the unmarked source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Placement<'a> {
    pub id: &'a str,
    pub bytes: Range<usize>,
}

/// A highlight boundary found in the marked text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Marker<'s> {
    Start(&'s str),
    End(&'s str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MathKind {
    Display,
    Inline,
    /// `\begin{name}..\end{name}`, always typeset in display mode
    Environment,
}

impl MathKind {
    pub fn display_mode(self) -> bool {
        !matches!(self, MathKind::Inline)
    }
}

/// A math region taken out of the text stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProtectedBlock<'s> {
    pub kind: MathKind,
    /// What gets typeset (delimiters removed, except for environments)
    pub latex: Cow<'s, str>,
    /// The region as written, used as the escaped fallback
    pub source: Cow<'s, str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token<'s> {
    Text(&'s str),
    Marker(Marker<'s>),
    /// Index into [`Protected::blocks`]
    Math(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Protected<'s> {
    pub tokens: Vec<Token<'s>>,
    pub blocks: Vec<ProtectedBlock<'s>>,
}

/// Insert start/end markers for every placement in one forward pass.
///
/// At equal positions ends come before starts, so adjacent spans stay
/// disjoint. Among starts the longer span opens first; among ends the
/// later-starting span closes first. Reserved characters already present in
/// the source are dropped so they cannot forge markers.
pub(crate) fn insert_markers(source: &str, placements: &[Placement<'_>]) -> String {
    // (position, is_start, tiebreak, placement index)
    let mut events: Vec<(usize, bool, isize, usize)> = Vec::with_capacity(placements.len() * 2);
    for (i, p) in placements.iter().enumerate() {
        events.push((p.bytes.start, true, -(p.bytes.end as isize), i));
        events.push((p.bytes.end, false, -(p.bytes.start as isize), i));
    }
    events.sort();

    let extra: usize = placements.iter().map(|p| 2 * (p.id.len() + 6)).sum();
    let mut out = String::with_capacity(source.len() + extra);
    let mut last = 0;
    for (pos, is_start, _, i) in events {
        push_unreserved(&mut out, &source[last..pos]);
        last = pos;
        out.push(if is_start { MARK_START } else { MARK_END });
        out.push_str(placements[i].id);
        out.push(MARK_CLOSE);
    }
    push_unreserved(&mut out, &source[last..]);
    out
}

fn push_unreserved(out: &mut String, text: &str) {
    if text.contains(is_reserved) {
        out.extend(text.chars().filter(|c| !is_reserved(*c)));
    } else {
        out.push_str(text);
    }
}

/// Parse a marker at the start of `text`, returning it and its byte length.
fn parse_marker(text: &str) -> Option<(Marker<'_>, usize)> {
    let mut chars = text.chars();
    let kind = chars.next()?;
    if kind != MARK_START && kind != MARK_END {
        return None;
    }
    let body = &text[kind.len_utf8()..];
    let close = body.find(|c: char| is_reserved(c))?;
    if !body[close..].starts_with(MARK_CLOSE) || close == 0 {
        return None;
    }
    let id = &body[..close];
    let marker = if kind == MARK_START {
        Marker::Start(id)
    } else {
        Marker::End(id)
    };
    Some((marker, kind.len_utf8() + close + MARK_CLOSE.len_utf8()))
}

/// A math region matched at the current position.
struct MathMatch<'s> {
    kind: MathKind,
    len: usize,
    latex: &'s str,
}

fn environment_name(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("\\begin{")?;
    let close = rest.find('}')?;
    let name = &rest[..close];
    let bare = name.strip_suffix('*').unwrap_or(name);
    (!bare.is_empty() && bare.chars().all(|c| c.is_ascii_alphabetic())).then_some(name)
}

/// Single-dollar inline math: no newline inside, no space just inside either
/// dollar, and the closing dollar is not followed by a digit.
fn dollar_inline(rest: &str) -> Option<MathMatch<'_>> {
    let body = rest.strip_prefix('$')?;
    if body.starts_with(|c: char| c.is_whitespace() || c == '$') {
        return None;
    }
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        match c {
            '\n' => return None,
            '\\' => {
                escaped = !escaped;
                continue;
            }
            '$' if !escaped => {
                let latex = &body[..i];
                if latex.ends_with(char::is_whitespace) {
                    return None;
                }
                if body[i + 1..].starts_with(|c: char| c.is_ascii_digit()) {
                    return None;
                }
                return Some(MathMatch {
                    kind: MathKind::Inline,
                    len: 1 + i + 1,
                    latex,
                });
            }
            _ => {}
        }
        escaped = false;
    }
    None
}

fn delimited<'s>(rest: &'s str, open: &str, close: &str, kind: MathKind) -> Option<MathMatch<'s>> {
    let body = rest.strip_prefix(open)?;
    let end = body.find(close)?;
    Some(MathMatch {
        kind,
        len: open.len() + end + close.len(),
        latex: &body[..end],
    })
}

fn match_math(rest: &str) -> Option<MathMatch<'_>> {
    if let Some(m) = delimited(rest, "\\[", "\\]", MathKind::Display) {
        return Some(m);
    }
    if let Some(m) = delimited(rest, "$$", "$$", MathKind::Display) {
        return Some(m);
    }
    if let Some(m) = delimited(rest, "\\(", "\\)", MathKind::Inline) {
        return Some(m);
    }
    if let Some(name) = environment_name(rest) {
        let end_tag = format!("\\end{{{name}}}");
        let open_len = "\\begin{".len() + name.len() + 1;
        let end = rest[open_len..].find(&end_tag)?;
        let len = open_len + end + end_tag.len();
        return Some(MathMatch {
            kind: MathKind::Environment,
            len,
            latex: &rest[..len],
        });
    }
    dollar_inline(rest)
}

/// Remove marker sequences from a math region, returning them in order.
fn split_markers(region: &str) -> (Cow<'_, str>, Vec<Marker<'_>>) {
    if !region.contains(is_reserved) {
        return (Cow::Borrowed(region), Vec::new());
    }
    let mut clean = String::with_capacity(region.len());
    let mut markers = Vec::new();
    let mut i = 0;
    while i < region.len() {
        let rest = &region[i..];
        if let Some((marker, len)) = parse_marker(rest) {
            markers.push(marker);
            i += len;
            continue;
        }
        let Some(c) = rest.chars().next() else { break };
        if !is_reserved(c) {
            clean.push(c);
        }
        i += c.len_utf8();
    }
    (Cow::Owned(clean), markers)
}

/// Split marked text into text, marker and protected math tokens.
///
/// Markers inside a math region are hoisted out of it: starts go before the
/// math token and ends after, so a highlight that touches a formula encloses
/// the whole formula. Reserved characters that do not form a marker are
/// dropped.
pub(crate) fn protect(marked: &str) -> Protected<'_> {
    let mut protected = Protected::default();
    let mut text_start = 0;
    let mut i = 0;

    fn flush<'s>(tokens: &mut Vec<Token<'s>>, marked: &'s str, from: usize, to: usize) {
        if from < to {
            tokens.push(Token::Text(&marked[from..to]));
        }
    }

    while i < marked.len() {
        let rest = &marked[i..];
        let Some(c) = rest.chars().next() else { break };

        if is_reserved(c) {
            flush(&mut protected.tokens, marked, text_start, i);
            match parse_marker(rest) {
                Some((marker, len)) => {
                    protected.tokens.push(Token::Marker(marker));
                    i += len;
                }
                None => {
                    tracing::trace!(offset = i, "dropping stray reserved character");
                    i += c.len_utf8();
                }
            }
            text_start = i;
            continue;
        }

        // Escaped backslash and escaped dollar never open math.
        if rest.starts_with("\\\\") || rest.starts_with("\\$") {
            i += 2;
            continue;
        }

        if c == '\\' || c == '$' {
            if let Some(m) = match_math(rest) {
                flush(&mut protected.tokens, marked, text_start, i);
                let region = &rest[..m.len];
                let (latex, latex_markers) = split_markers(m.latex);
                let (source, _) = split_markers(region);
                let (starts, ends): (Vec<_>, Vec<_>) = latex_markers
                    .into_iter()
                    .partition(|m| matches!(m, Marker::Start(_)));
                protected
                    .tokens
                    .extend(starts.into_iter().map(Token::Marker));
                protected.tokens.push(Token::Math(protected.blocks.len()));
                protected.blocks.push(ProtectedBlock {
                    kind: m.kind,
                    latex,
                    source,
                });
                protected.tokens.extend(ends.into_iter().map(Token::Marker));
                i += m.len;
                text_start = i;
                continue;
            }
        }

        i += c.len_utf8();
    }
    flush(&mut protected.tokens, marked, text_start, marked.len());
    protected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marked(source: &str, spans: &[(&'static str, Range<usize>)]) -> String {
        let placements: Vec<_> = spans
            .iter()
            .map(|(id, r)| Placement {
                id,
                bytes: r.clone(),
            })
            .collect();
        insert_markers(source, &placements)
    }

    #[test]
    fn inserts_markers_around_span() {
        let out = marked("The integral converges.", &[("c1", 4..12)]);
        assert_eq!(
            out,
            "The \u{E000}c1\u{E002}integral\u{E001}c1\u{E002} converges."
        );
    }

    #[test]
    fn adjacent_spans_close_before_opening() {
        let out = marked("abcd", &[("b", 2..4), ("a", 0..2)]);
        assert_eq!(
            out,
            "\u{E000}a\u{E002}ab\u{E001}a\u{E002}\u{E000}b\u{E002}cd\u{E001}b\u{E002}"
        );
    }

    #[test]
    fn nested_spans_open_outer_first() {
        let out = marked("abcd", &[("inner", 0..2), ("outer", 0..4)]);
        assert!(out.starts_with("\u{E000}outer\u{E002}\u{E000}inner\u{E002}"));
    }

    #[test]
    fn reserved_chars_in_source_cannot_forge_markers() {
        let out = marked("a\u{E000}x\u{E002}b", &[("k", 0..1)]);
        assert_eq!(out, "\u{E000}k\u{E002}a\u{E001}k\u{E002}xb");
    }

    #[test]
    fn parses_markers() {
        let text = "\u{E001}abc\u{E002}rest";
        let (marker, len) = parse_marker(text).unwrap();
        assert_eq!(marker, Marker::End("abc"));
        assert_eq!(&text[len..], "rest");
        assert!(parse_marker("\u{E000}\u{E002}").is_none());
        assert!(parse_marker("\u{E000}abc").is_none());
    }

    #[test]
    fn protects_all_math_kinds() {
        let p = protect(r"a \[x\] b \(y\) c $$z$$ d $w$ e \begin{pmatrix}1\end{pmatrix}");
        let kinds: Vec<_> = p.blocks.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MathKind::Display,
                MathKind::Inline,
                MathKind::Display,
                MathKind::Inline,
                MathKind::Environment
            ]
        );
        assert_eq!(p.blocks[0].latex, "x");
        assert_eq!(p.blocks[1].source, r"\(y\)");
        assert_eq!(p.blocks[4].latex, r"\begin{pmatrix}1\end{pmatrix}");
        assert_eq!(p.tokens[0], Token::Text("a "));
        assert_eq!(p.tokens[1], Token::Math(0));
    }

    #[test]
    fn unterminated_delimiters_stay_text() {
        let p = protect(r"cost \(x + $5 and \begin{align} x");
        assert!(p.blocks.is_empty());
        assert_eq!(p.tokens, vec![Token::Text(r"cost \(x + $5 and \begin{align} x")]);
    }

    #[test]
    fn dollar_rules() {
        assert!(protect("costs $5 or $6").blocks.is_empty());
        assert!(protect("a $ b $ c").blocks.is_empty());
        assert_eq!(protect("area $r^2$ here").blocks.len(), 1);
        assert!(protect(r"price \$x$").blocks.is_empty());
    }

    #[test]
    fn display_math_spans_lines() {
        let p = protect("before\n\\[\na\n\nb\n\\]\nafter");
        assert_eq!(p.blocks.len(), 1);
        assert_eq!(p.blocks[0].latex, "\na\n\nb\n");
    }

    #[test]
    fn markers_inside_math_are_hoisted() {
        let text = "x \\(a\u{E000}k\u{E002}+b\u{E001}k\u{E002}\\) y";
        let p = protect(text);
        assert_eq!(
            p.tokens,
            vec![
                Token::Text("x "),
                Token::Marker(Marker::Start("k")),
                Token::Math(0),
                Token::Marker(Marker::End("k")),
                Token::Text(" y"),
            ]
        );
        assert_eq!(p.blocks[0].latex, "a+b");
        assert_eq!(p.blocks[0].source, "\\(a+b\\)");
    }

    #[test]
    fn stray_reserved_chars_are_dropped() {
        let p = protect("a\u{E002}b\u{E000}c");
        assert_eq!(p.tokens, vec![Token::Text("a"), Token::Text("b"), Token::Text("c")]);
    }
}
