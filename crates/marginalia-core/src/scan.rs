//! Detection of undelimited inline math in plain text.
//!
//! A single left-to-right scan. At each position the rules are tried in
//! precedence order and the first hit is consumed whole, so nothing that has
//! been claimed as math is looked at again:
//!
//! 1. `[ .. ]` with LaTeX-looking content, not followed by `(` (a link)
//! 2. `( .. )` with LaTeX-looking content
//! 3. a Greek run or a standalone alphanumeric base followed by `^`/`_` scripts
//! 4. `\command` with its optional `[..]` argument, brace-matched `{..}`
//!    arguments and trailing scripts
//! 5. a bare standalone Greek run

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// Backslash commands or sub/superscript/brace characters.
pub static LATEX_SIGNAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[a-zA-Z]+|[\^_{}]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Bracket,
    Paren,
    Scripted,
    Command,
    Greek,
}

/// A span of text that should be typeset as inline math.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathSpan {
    /// Byte range of the whole match in the scanned text
    pub span: Range<usize>,
    /// Byte range of the LaTeX to typeset (excludes `[ ]` / `( )`)
    pub latex: Range<usize>,
    pub rule: Rule,
}

pub fn is_greek(c: char) -> bool {
    matches!(c, '\u{0391}'..='\u{03A9}' | '\u{03B1}'..='\u{03C9}' | 'ϑ' | 'ϕ' | 'ϖ' | 'ϵ')
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Find the end of a brace group starting at `open` (which must be `{`).
///
/// Counts nesting and skips escaped braces. Returns the byte offset just past
/// the matching `}`.
pub fn match_braces(text: &str, open: usize) -> Option<usize> {
    if !text[open..].starts_with('{') {
        return None;
    }
    let mut depth = 0usize;
    let mut escaped = false;
    for (i, c) in text[open..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Content between `open` and the first `close`, if it has none of
/// `open`/`close`/newline inside and looks like LaTeX.
fn simple_group(text: &str, at: usize, open: char, close: char) -> Option<Range<usize>> {
    let body_start = at + open.len_utf8();
    let body = &text[body_start..];
    let end = body.find(|c: char| c == open || c == close || c == '\n')?;
    if !body[end..].starts_with(close) {
        return None;
    }
    let content = &body[..end];
    if !LATEX_SIGNAL_RE.is_match(content) {
        return None;
    }
    Some(body_start..body_start + end)
}

fn bracket(text: &str, at: usize) -> Option<MathSpan> {
    let latex = simple_group(text, at, '[', ']')?;
    let end = latex.end + 1;
    if text[end..].starts_with('(') {
        return None;
    }
    Some(MathSpan {
        span: at..end,
        latex,
        rule: Rule::Bracket,
    })
}

fn paren(text: &str, at: usize, prev: Option<char>) -> Option<MathSpan> {
    if prev == Some(']') {
        return None;
    }
    let latex = simple_group(text, at, '(', ')')?;
    Some(MathSpan {
        span: at..latex.end + 1,
        latex,
        rule: Rule::Paren,
    })
}

/// One `^x` / `_{..}` / `^\cmd` script at `at`, returning the offset past it.
fn script(text: &str, at: usize) -> Option<usize> {
    let rest = &text[at..];
    if !(rest.starts_with('^') || rest.starts_with('_')) {
        return None;
    }
    let arg = at + 1;
    let after = &text[arg..];
    if after.starts_with('{') {
        return match_braces(text, arg);
    }
    if let Some(name) = after.strip_prefix('\\') {
        let len = name.find(|c: char| !c.is_ascii_alphabetic()).unwrap_or(name.len());
        return (len > 0).then_some(arg + 1 + len);
    }
    let len = after
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(after.len());
    (len > 0).then_some(arg + len)
}

fn scripts(text: &str, mut at: usize) -> (usize, usize) {
    let mut count = 0;
    while let Some(next) = script(text, at) {
        at = next;
        count += 1;
    }
    (at, count)
}

fn greek_run(text: &str, at: usize) -> usize {
    text[at..]
        .find(|c: char| !is_greek(c))
        .map(|len| at + len)
        .unwrap_or(text.len())
}

fn scripted(text: &str, at: usize, c: char, prev: Option<char>) -> Option<MathSpan> {
    let base_end = if is_greek(c) {
        if prev.is_some_and(is_greek) {
            return None;
        }
        greek_run(text, at)
    } else if c.is_ascii_alphanumeric() {
        if prev.is_some_and(is_word) {
            return None;
        }
        at + 1
    } else {
        return None;
    };
    let (end, count) = scripts(text, base_end);
    if count == 0 || text[end..].starts_with(is_word) {
        return None;
    }
    Some(MathSpan {
        span: at..end,
        latex: at..end,
        rule: Rule::Scripted,
    })
}

fn command(text: &str, at: usize) -> Option<MathSpan> {
    let name = text[at..].strip_prefix('\\')?;
    let len = name.find(|c: char| !c.is_ascii_alphabetic()).unwrap_or(name.len());
    if len == 0 || matches!(&name[..len], "begin" | "end") {
        return None;
    }
    let mut end = at + 1 + len;

    if text[end..].starts_with('[') {
        if let Some(close) = text[end..].find(|c: char| c == ']' || c == '\n') {
            if text[end + close..].starts_with(']') {
                end += close + 1;
            }
        }
    }
    while let Some(next) = match_braces(text, end) {
        end = next;
    }
    let (end, _) = scripts(text, end);
    Some(MathSpan {
        span: at..end,
        latex: at..end,
        rule: Rule::Command,
    })
}

fn greek(text: &str, at: usize, c: char, prev: Option<char>) -> Option<MathSpan> {
    if !is_greek(c) || prev.is_some_and(char::is_alphanumeric) {
        return None;
    }
    let end = greek_run(text, at);
    if text[end..].starts_with(char::is_alphanumeric) {
        return None;
    }
    Some(MathSpan {
        span: at..end,
        latex: at..end,
        rule: Rule::Greek,
    })
}

/// Try every rule at `at`, in precedence order.
pub fn match_at(text: &str, at: usize, prev: Option<char>) -> Option<MathSpan> {
    let c = text[at..].chars().next()?;
    match c {
        '[' => bracket(text, at),
        '(' => paren(text, at, prev),
        '\\' => command(text, at),
        _ => scripted(text, at, c, prev).or_else(|| greek(text, at, c, prev)),
    }
}

/// Find all inline math spans in `text`, left to right, non-overlapping.
pub fn find_inline_math(text: &str) -> Vec<MathSpan> {
    let mut spans = Vec::new();
    let mut prev = None;
    let mut at = 0;
    while at < text.len() {
        if let Some(span) = match_at(text, at, prev) {
            at = span.span.end;
            prev = text[..at].chars().next_back();
            spans.push(span);
            continue;
        }
        let Some(c) = text[at..].chars().next() else { break };
        prev = Some(c);
        at += c.len_utf8();
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(text: &str) -> Vec<(&str, Rule)> {
        find_inline_math(text)
            .into_iter()
            .map(|m| (&text[m.latex], m.rule))
            .collect()
    }

    #[test]
    fn brace_matching_counts_nesting() {
        let text = r"\frac{\frac{a}{b}}{c} rest";
        assert_eq!(match_braces(text, 5), Some(18));
        assert_eq!(match_braces(r"{a\}b}", 0), Some(6));
        assert_eq!(match_braces("{unclosed", 0), None);
    }

    #[test]
    fn nested_command_is_one_unit() {
        assert_eq!(
            found(r"so \frac{\frac{a}{b}}{c} holds"),
            vec![(r"\frac{\frac{a}{b}}{c}", Rule::Command)]
        );
    }

    #[test]
    fn command_with_optional_arg_and_scripts() {
        assert_eq!(
            found(r"root \sqrt[3]{x}^2 and \sum_{i=0}^{n} done"),
            vec![
                (r"\sqrt[3]{x}^2", Rule::Command),
                (r"\sum_{i=0}^{n}", Rule::Command)
            ]
        );
    }

    #[test]
    fn bracket_and_paren_groups() {
        assert_eq!(found(r"see [x^2 + y^2] now"), vec![("x^2 + y^2", Rule::Bracket)]);
        assert_eq!(found(r"where (\alpha + 1) holds"), vec![(r"\alpha + 1", Rule::Paren)]);
    }

    #[test]
    fn plain_groups_and_links_are_skipped() {
        assert!(found("a (plain aside) and [a note]").is_empty());
        let spans = found(r"[x_1](http://example.com)");
        assert!(spans.iter().all(|(_, rule)| *rule != Rule::Bracket));
    }

    #[test]
    fn scripted_bases() {
        assert_eq!(
            found("with x^2 and σ_i and a_{ij}"),
            vec![
                ("x^2", Rule::Scripted),
                ("σ_i", Rule::Scripted),
                ("a_{ij}", Rule::Scripted)
            ]
        );
    }

    #[test]
    fn snake_case_is_not_math() {
        assert!(found("call my_var and file_1 here").is_empty());
    }

    #[test]
    fn bare_greek_runs() {
        assert_eq!(found("let θ be small"), vec![("θ", Rule::Greek)]);
        assert!(found("plain ascii").is_empty());
    }

    #[test]
    fn higher_precedence_claims_first() {
        // the paren group swallows the command inside it
        assert_eq!(
            found(r"(\frac{1}{2})"),
            vec![(r"\frac{1}{2}", Rule::Paren)]
        );
    }

    #[test]
    fn begin_and_end_are_left_alone() {
        assert!(found(r"\begin{foo} text").is_empty());
    }
}
