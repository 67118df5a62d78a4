//! Tunables for rendering and anchor resolution.

use serde::{Deserialize, Serialize};

/// Class names used in rendered output. Styling hooks only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Class on highlight wrappers (`<mark data-comment-id=..>`)
    pub highlight_class: String,
    /// Class on typeset formula wrappers
    pub formula_class: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            highlight_class: "latex-highlight".to_string(),
            formula_class: "latex-formula".to_string(),
        }
    }
}

/// Tunables for mapping a rendered selection back to source offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveOptions {
    /// Chars of preceding context compared when the selection occurs more than once
    pub context_window: usize,
    /// Words shorter than this are ignored by the fuzzy boundary match
    pub min_word_len: usize,
    /// Cap on the fallback window after the first matched word, in chars
    pub fallback_window: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            context_window: 100,
            min_word_len: 4,
            fallback_window: 200,
        }
    }
}
