//! WASM bindings for marginalia-core.
//!
//! Exposes sync rendering and selection resolution to the browser host.
//! Annotation records cross the boundary as plain JS objects in the host's
//! `{id, type, data, text, timestamp, range}` shape.

use marginalia_core::{
    AnnotationRecord, DomPoint, HtmlSelection, PlainSelection, RenderOptions, ResolveOptions,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_wasm_bindgen::Deserializer;
use wasm_bindgen::prelude::*;

mod types;

pub use types::*;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn records(value: JsValue) -> Result<Vec<AnnotationRecord>, JsError> {
    let deserializer = Deserializer::from(value);
    Vec::<AnnotationRecord>::deserialize(deserializer)
        .map_err(|e| JsError::new(&format!("Invalid annotation records: {}", e)))
}

fn options<T: DeserializeOwned + Default>(value: Option<JsValue>) -> Result<T, JsError> {
    match value {
        Some(value) if !value.is_undefined() && !value.is_null() => {
            serde_wasm_bindgen::from_value(value)
                .map_err(|e| JsError::new(&format!("Invalid options: {}", e)))
        }
        _ => Ok(T::default()),
    }
}

/// Render source text to HTML with annotations highlighted.
///
/// # Arguments
/// * `source` - The LaTeX/markdown source text
/// * `annotations` - Array of annotation records
/// * `options` - Optional `{highlight_class, formula_class}`
#[wasm_bindgen]
pub fn render(
    source: &str,
    annotations: JsValue,
    options: Option<JsValue>,
) -> Result<String, JsError> {
    let records = records(annotations)?;
    let options: RenderOptions = self::options(options)?;
    Ok(marginalia_core::render_with(source, &records, &options))
}

/// Render and return `{html, report}` where the report lists how each
/// annotation was placed or why it was skipped.
#[wasm_bindgen(js_name = renderWithReport)]
pub fn render_with_report(
    source: &str,
    annotations: JsValue,
    options: Option<JsValue>,
) -> Result<JsValue, JsError> {
    let records = records(annotations)?;
    let options: RenderOptions = self::options(options)?;
    let rendered = marginalia_core::render_with_report(source, &records, &options);
    serde_wasm_bindgen::to_value(&rendered).map_err(|e| JsError::new(&e.to_string()))
}

/// Highlight annotations in already rendered HTML by searching for their text.
#[wasm_bindgen(js_name = applyTextHighlights)]
pub fn apply_text_highlights(
    html: &str,
    annotations: JsValue,
    options: Option<JsValue>,
) -> Result<String, JsError> {
    let records = records(annotations)?;
    let options: RenderOptions = self::options(options)?;
    Ok(marginalia_core::apply_text_highlights(html, &records, &options))
}

/// Map a selection to source offsets from its text and the rendered text
/// preceding it (as `Range.toString()` gives them).
///
/// Returns `undefined` when no anchor could be found; callers should then
/// store the sentinel range and rely on text highlighting.
#[wasm_bindgen(js_name = resolveSelection)]
pub fn resolve_selection(
    source: &str,
    selected_text: &str,
    text_before: &str,
    options: Option<JsValue>,
) -> Result<Option<JsSourceRange>, JsError> {
    let options: ResolveOptions = self::options(options)?;
    let selection = PlainSelection::new(selected_text, text_before);
    Ok(marginalia_core::resolve_with(&selection, source, &options).map(JsSourceRange::from))
}

/// Map a selection given as text-run positions in rendered HTML.
///
/// Runs are counted the way a depth-first text-node walk visits them;
/// offsets are UTF-16 units into each run, like DOM text offsets.
#[wasm_bindgen(js_name = resolveHtmlSelection)]
pub fn resolve_html_selection(
    source: &str,
    html: &str,
    start_run: u32,
    start_offset: u32,
    end_run: u32,
    end_offset: u32,
    options: Option<JsValue>,
) -> Result<Option<JsSourceRange>, JsError> {
    let options: ResolveOptions = self::options(options)?;
    let selection = HtmlSelection::new(
        html,
        DomPoint::new(start_run as usize, start_offset as usize),
        DomPoint::new(end_run as usize, end_offset as usize),
    );
    Ok(marginalia_core::resolve_with(&selection, source, &options).map(JsSourceRange::from))
}

/// Drop stale incomplete annotations and give range-less records a range.
///
/// # Arguments
/// * `annotations` - Array of annotation records
/// * `source` - The current source text
/// * `now_ms` - Current time, e.g. `Date.now()`
/// * `max_incomplete_age_ms` - Defaults to one minute
#[wasm_bindgen(js_name = pruneRecords)]
pub fn prune_records(
    annotations: JsValue,
    source: &str,
    now_ms: f64,
    max_incomplete_age_ms: Option<f64>,
) -> Result<JsValue, JsError> {
    let records = records(annotations)?;
    let max_age = max_incomplete_age_ms
        .map(|ms| ms as u64)
        .unwrap_or(marginalia_core::DEFAULT_MAX_INCOMPLETE_AGE_MS);
    let kept = marginalia_core::prune_records(records, source, now_ms as u64, max_age);
    serde_wasm_bindgen::to_value(&kept).map_err(|e| JsError::new(&e.to_string()))
}

/// Render LaTeX math to MathML.
///
/// # Arguments
/// * `latex` - The LaTeX math expression
/// * `display_mode` - true for display math (block), false for inline math
#[wasm_bindgen(js_name = renderMath)]
pub fn render_math(latex: &str, display_mode: bool) -> JsMathResult {
    match marginalia_core::render_math(latex, display_mode) {
        marginalia_core::MathResult::Success(html) => JsMathResult {
            success: true,
            html,
            error: None,
        },
        marginalia_core::MathResult::Error { html, message } => JsMathResult {
            success: false,
            html,
            error: Some(message),
        },
    }
}
