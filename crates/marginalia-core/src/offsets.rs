//! UTF-16 offset arithmetic.
//!
//! Annotation ranges come from a browser host, so they count UTF-16 code
//! units. Rust strings are indexed by UTF-8 bytes; these helpers translate
//! between the two.

use std::ops::Range;

/// Length of `text` in UTF-16 code units.
pub fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}

/// Convert a UTF-16 offset into a byte offset.
///
/// Returns `None` if the offset lies past the end of `text` or splits a
/// surrogate pair.
pub fn utf16_to_byte(text: &str, utf16_offset: usize) -> Option<usize> {
    let mut units = 0;
    for (byte, ch) in text.char_indices() {
        if units == utf16_offset {
            return Some(byte);
        }
        units += ch.len_utf16();
        if units > utf16_offset {
            return None;
        }
    }
    (units == utf16_offset).then_some(text.len())
}

/// Convert a byte offset into a UTF-16 offset.
///
/// Offsets that are not on a char boundary are clamped down to the previous
/// boundary.
pub fn byte_to_utf16(text: &str, byte_offset: usize) -> usize {
    let mut end = byte_offset.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    utf16_len(&text[..end])
}

/// Convert a UTF-16 range into a byte range, if both ends are valid.
pub fn utf16_range_to_bytes(text: &str, range: Range<usize>) -> Option<Range<usize>> {
    let start = utf16_to_byte(text, range.start)?;
    let end = utf16_to_byte(text, range.end)?;
    Some(start..end)
}

/// Byte offset of the `n`th char of `text`, or its length if there are fewer.
pub(crate) fn char_to_byte(text: &str, n: usize) -> usize {
    text.char_indices().nth(n).map(|(i, _)| i).unwrap_or(text.len())
}

/// The last `max_chars` chars of `text`.
pub(crate) fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    &text[char_to_byte(text, count - max_chars)..]
}
