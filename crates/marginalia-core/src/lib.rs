//! Marginalia
//!
//! Renders LaTeX-flavoured markdown to HTML with annotated spans highlighted,
//! and maps selections in the rendered view back to source offsets.
//!
//! All offsets exchanged with callers are UTF-16 code units.

pub mod annotations;
pub mod config;
pub mod error;
pub mod highlight;
mod markdown;
pub mod math;
pub mod offsets;
mod protect;
pub mod render;
pub mod rendered;
pub mod resolve;
pub mod scan;
pub mod types;

pub use annotations::{DEFAULT_MAX_INCOMPLETE_AGE_MS, prune_records};
pub use config::{RenderOptions, ResolveOptions};
pub use error::MarginaliaError;
pub use highlight::{apply_text_highlights, highlighted_ids};
pub use math::{MathResult, render_math};
pub use render::{
    RenderReport, Rendered, SkipReason, Skipped, render, render_with, render_with_report,
};
pub use rendered::{TextRun, TextRuns, text_content};
pub use resolve::{DomPoint, HtmlSelection, PlainSelection, RenderedSelection, resolve, resolve_with};
pub use types::{Anchor, AnnotationRecord, CommentKind, SourceRange, parse_records, records_to_json};
