//! The lightweight markdown layer.
//!
//! Works on the token stream left by [`protect`](crate::protect::protect), so
//! math regions and highlight markers arrive as typed tokens and are never
//! mistaken for markup. Supported: `#`/`##`/`###` headings, `**strong**`,
//! `*emphasis*`, blank-line paragraph breaks and single-newline line breaks.

use std::borrow::Cow;
use std::collections::VecDeque;

use crate::protect::{Marker, Token};
use crate::scan::find_inline_math;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Inline<'s> {
    Text(Cow<'s, str>),
    /// Undelimited math found by the scanner. `source` is the span as written.
    InlineMath { latex: &'s str, source: &'s str },
    /// Index into the protected block store
    Math(usize),
    Marker(Marker<'s>),
    Strong(Vec<Inline<'s>>),
    Emphasis(Vec<Inline<'s>>),
}

pub(crate) type Line<'s> = Vec<Inline<'s>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Block<'s> {
    Heading { level: u8, content: Line<'s> },
    /// Lines joined by line breaks
    Paragraph(Vec<Line<'s>>),
    /// Markers sitting on otherwise blank lines
    Anchors(Vec<Marker<'s>>),
}

/// Split the token stream at newlines. Math tokens never split, so a display
/// block spanning several source lines stays on one line here.
fn split_lines<'s>(tokens: &[Token<'s>]) -> Vec<Vec<Token<'s>>> {
    let mut lines = vec![Vec::new()];
    for token in tokens {
        match token {
            Token::Text(text) => {
                let mut parts = text.split('\n');
                if let Some(first) = parts.next() {
                    push_text(&mut lines, first);
                }
                for part in parts {
                    lines.push(Vec::new());
                    push_text(&mut lines, part);
                }
            }
            other => {
                if let Some(line) = lines.last_mut() {
                    line.push(other.clone());
                }
            }
        }
    }
    lines
}

fn push_text<'s>(lines: &mut [Vec<Token<'s>>], text: &'s str) {
    let text = text.strip_suffix('\r').unwrap_or(text);
    if text.is_empty() {
        return;
    }
    if let Some(line) = lines.last_mut() {
        line.push(Token::Text(text));
    }
}

fn is_blank(line: &[Token<'_>]) -> bool {
    line.iter().all(|t| match t {
        Token::Text(text) => text.trim().is_empty(),
        Token::Marker(_) => true,
        Token::Math(_) => false,
    })
}

/// Heading level if the line's first text (after any leading markers)
/// starts with one to three `#` and a space. Strips the prefix in place.
fn take_heading(line: &mut [Token<'_>]) -> Option<u8> {
    let first = line.iter_mut().find(|t| !matches!(t, Token::Marker(_)))?;
    let Token::Text(text) = first else {
        return None;
    };
    let current = *text;
    let hashes = current.len() - current.trim_start_matches('#').len();
    if !(1..=3).contains(&hashes) || !current[hashes..].starts_with(' ') {
        return None;
    }
    *text = &current[hashes + 1..];
    Some(hashes as u8)
}

/// Emphasis delimiter run or finished inline.
#[derive(Debug)]
enum Piece<'s> {
    Inline(Inline<'s>),
    Delim(usize),
}

/// Cut text into plain pieces and `**` / `*` delimiters, longest first.
fn delimit<'s>(text: &'s str, out: &mut Vec<Piece<'s>>) {
    let mut rest = text;
    while let Some(star) = rest.find('*') {
        if star > 0 {
            out.push(Piece::Inline(Inline::Text(Cow::Borrowed(&rest[..star]))));
        }
        let width = if rest[star..].starts_with("**") { 2 } else { 1 };
        out.push(Piece::Delim(width));
        rest = &rest[star + width..];
    }
    if !rest.is_empty() {
        out.push(Piece::Inline(Inline::Text(Cow::Borrowed(rest))));
    }
}

/// Pair delimiters of `width` left to right: each opener takes the nearest
/// following delimiter of the same width, provided something lies between.
/// Unpaired delimiters pass through for the next, narrower pass.
fn pair_delimiters<'s>(pieces: Vec<Piece<'s>>, width: usize) -> Vec<Piece<'s>> {
    let mut queue: VecDeque<Piece<'s>> = pieces.into();
    let mut out = Vec::with_capacity(queue.len());

    while let Some(piece) = queue.pop_front() {
        let Piece::Delim(w) = piece else {
            out.push(piece);
            continue;
        };
        let close = queue
            .iter()
            .position(|p| matches!(p, Piece::Delim(x) if *x == w && w == width));
        match close {
            Some(close) if close > 0 => {
                let inner: Vec<Piece<'s>> = queue.drain(..close).collect();
                queue.pop_front();
                let inner = if width == 2 {
                    pair_delimiters(inner, 1)
                } else {
                    inner
                };
                let children = finish(inner);
                out.push(Piece::Inline(if width == 2 {
                    Inline::Strong(children)
                } else {
                    Inline::Emphasis(children)
                }));
            }
            _ => out.push(Piece::Delim(w)),
        }
    }
    out
}

/// Turn leftover delimiters back into literal text.
fn finish(pieces: Vec<Piece<'_>>) -> Vec<Inline<'_>> {
    pieces
        .into_iter()
        .map(|p| match p {
            Piece::Inline(inline) => inline,
            Piece::Delim(2) => Inline::Text(Cow::Borrowed("**")),
            Piece::Delim(_) => Inline::Text(Cow::Borrowed("*")),
        })
        .collect()
}

/// Build the inline content of one line: scan plain text for undelimited
/// math, then pair emphasis delimiters in what is left.
fn parse_line<'s>(line: Vec<Token<'s>>) -> Line<'s> {
    let mut pieces = Vec::new();
    for token in line {
        match token {
            Token::Text(text) => {
                let mut last = 0;
                for span in find_inline_math(text) {
                    delimit(&text[last..span.span.start], &mut pieces);
                    pieces.push(Piece::Inline(Inline::InlineMath {
                        latex: &text[span.latex],
                        source: &text[span.span.clone()],
                    }));
                    last = span.span.end;
                }
                delimit(&text[last..], &mut pieces);
            }
            Token::Marker(marker) => pieces.push(Piece::Inline(Inline::Marker(marker))),
            Token::Math(idx) => pieces.push(Piece::Inline(Inline::Math(idx))),
        }
    }
    let pieces = pair_delimiters(pieces, 2);
    finish(pair_delimiters(pieces, 1))
}

/// Group protected tokens into headings and paragraphs.
pub(crate) fn build_blocks<'s>(tokens: &[Token<'s>]) -> Vec<Block<'s>> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<Line<'s>> = Vec::new();

    fn flush<'s>(blocks: &mut Vec<Block<'s>>, paragraph: &mut Vec<Line<'s>>) {
        if !paragraph.is_empty() {
            blocks.push(Block::Paragraph(std::mem::take(paragraph)));
        }
    }

    for mut line in split_lines(tokens) {
        if is_blank(&line) {
            flush(&mut blocks, &mut paragraph);
            let markers: Vec<_> = line
                .into_iter()
                .filter_map(|t| match t {
                    Token::Marker(m) => Some(m),
                    _ => None,
                })
                .collect();
            if !markers.is_empty() {
                blocks.push(Block::Anchors(markers));
            }
            continue;
        }
        if let Some(level) = take_heading(&mut line) {
            flush(&mut blocks, &mut paragraph);
            blocks.push(Block::Heading {
                level,
                content: parse_line(line),
            });
            continue;
        }
        paragraph.push(parse_line(line));
    }
    flush(&mut blocks, &mut paragraph);
    blocks
}
