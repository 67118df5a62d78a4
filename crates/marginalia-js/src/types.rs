//! Types exposed to JavaScript via wasm-bindgen.

use marginalia_core::SourceRange;
use wasm_bindgen::prelude::*;

/// Result from rendering LaTeX math.
#[wasm_bindgen]
pub struct JsMathResult {
    pub success: bool,
    #[wasm_bindgen(getter_with_clone)]
    pub html: String,
    #[wasm_bindgen(getter_with_clone)]
    pub error: Option<String>,
}

/// Source offsets in UTF-16 code units, as JS strings index them.
#[wasm_bindgen]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsSourceRange {
    pub start: u32,
    pub end: u32,
}

impl From<SourceRange> for JsSourceRange {
    fn from(range: SourceRange) -> Self {
        Self {
            start: range.start as u32,
            end: range.end as u32,
        }
    }
}
