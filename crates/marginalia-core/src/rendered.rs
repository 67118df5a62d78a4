//! Walking the text of rendered HTML.
//!
//! [`TextRuns`] yields the text between tags in document order, the way a
//! DOM text-node walk would. It only needs to understand the markup the
//! renderer itself produces: plain tags, quoted attributes and the basic
//! character entities.

use std::borrow::Cow;
use std::ops::Range;

/// One run of text between two tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun<'h> {
    /// The run as it appears in the HTML, entities undecoded
    pub raw: &'h str,
    /// Byte span of `raw` in the HTML
    pub span: Range<usize>,
    /// Inside a `<math>` element
    pub in_math: bool,
}

impl<'h> TextRun<'h> {
    /// The run's text with entities decoded.
    pub fn text(&self) -> Cow<'h, str> {
        decode_entities(self.raw)
    }

    /// Map a byte offset in the decoded text back to a byte offset in `raw`.
    ///
    /// Offsets landing inside a decoded entity map to the entity's start.
    pub fn raw_offset(&self, decoded: usize) -> usize {
        let mut raw = 0;
        let mut seen = 0;
        while raw < self.raw.len() && seen < decoded {
            let rest = &self.raw[raw..];
            match entity_at(rest) {
                Some((ch, len)) => {
                    if seen + ch.len_utf8() > decoded {
                        break;
                    }
                    seen += ch.len_utf8();
                    raw += len;
                }
                None => {
                    let Some(c) = rest.chars().next() else { break };
                    seen += c.len_utf8();
                    raw += c.len_utf8();
                }
            }
        }
        raw
    }
}

/// Iterator over the [`TextRun`]s of an HTML fragment.
#[derive(Debug, Clone)]
pub struct TextRuns<'h> {
    html: &'h str,
    pos: usize,
    math_depth: usize,
}

impl<'h> TextRuns<'h> {
    pub fn new(html: &'h str) -> Self {
        Self {
            html,
            pos: 0,
            math_depth: 0,
        }
    }

    /// Byte offset just past the tag starting at `at`, honouring quotes.
    fn tag_end(&self, at: usize) -> usize {
        let mut quote = None;
        for (i, c) in self.html[at..].char_indices() {
            match (quote, c) {
                (None, '"' | '\'') => quote = Some(c),
                (Some(q), c) if c == q => quote = None,
                (None, '>') => return at + i + 1,
                _ => {}
            }
        }
        self.html.len()
    }

    fn track_math(&mut self, tag: &str) {
        let name_of = |t: &str| {
            t.trim_start_matches(['<', '/'])
                .split(|c: char| c.is_whitespace() || c == '>' || c == '/')
                .next()
                .unwrap_or("")
                .to_ascii_lowercase()
        };
        if name_of(tag) != "math" || tag.ends_with("/>") {
            return;
        }
        if tag.starts_with("</") {
            self.math_depth = self.math_depth.saturating_sub(1);
        } else {
            self.math_depth += 1;
        }
    }
}

impl<'h> Iterator for TextRuns<'h> {
    type Item = TextRun<'h>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.html.len() {
            let rest = &self.html[self.pos..];
            if rest.starts_with('<') {
                let end = self.tag_end(self.pos);
                let tag = &self.html[self.pos..end];
                self.track_math(tag);
                self.pos = end;
                continue;
            }
            let len = rest.find('<').unwrap_or(rest.len());
            let span = self.pos..self.pos + len;
            self.pos += len;
            return Some(TextRun {
                raw: &self.html[span.clone()],
                span,
                in_math: self.math_depth > 0,
            });
        }
        None
    }
}

/// Decode a character entity at the start of `text`: the char and the
/// entity's byte length.
fn entity_at(text: &str) -> Option<(char, usize)> {
    let body = text.strip_prefix('&')?;
    let semi = body.find(';')?;
    if semi > 10 {
        return None;
    }
    let name = &body[..semi];
    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{A0}',
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)?
        }
    };
    Some((ch, 1 + semi + 1))
}

/// Decode the basic character entities. Unknown entities are left as is.
pub fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let rest = &raw[i..];
        if let Some((ch, len)) = entity_at(rest) {
            out.push(ch);
            i += len;
            continue;
        }
        let Some(c) = rest.chars().next() else { break };
        out.push(c);
        i += c.len_utf8();
    }
    Cow::Owned(out)
}

/// The full rendered text of an HTML fragment, like the DOM `textContent`.
pub fn text_content(html: &str) -> String {
    TextRuns::new(html).map(|run| run.text()).collect()
}
