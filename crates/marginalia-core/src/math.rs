//! LaTeX math rendering via pulldown-latex → MathML

use markdown_weaver_escape::escape_html;
use pulldown_latex::{
    Parser, Storage, config::DisplayMode, config::RenderConfig, mathml::push_mathml,
};

/// Result of attempting to render LaTeX math
#[derive(Debug, Clone, PartialEq)]
pub enum MathResult {
    /// Successfully rendered MathML
    Success(String),
    /// Rendering failed - contains the escaped source and the error message
    Error { html: String, message: String },
}

impl MathResult {
    pub fn is_success(&self) -> bool {
        matches!(self, MathResult::Success(_))
    }
}

/// Render LaTeX math to MathML
///
/// # Arguments
/// * `latex` - The LaTeX source string (without delimiters like `\(` or `\[`)
/// * `display_mode` - If true, render as display math (block); if false, inline
pub fn render_math(latex: &str, display_mode: bool) -> MathResult {
    if latex.trim().is_empty() {
        return MathResult::Error {
            html: escape(latex),
            message: "empty formula".to_string(),
        };
    }

    let storage = Storage::new();
    let parser = Parser::new(latex, &storage);
    let config = RenderConfig {
        display_mode: if display_mode {
            DisplayMode::Block
        } else {
            DisplayMode::Inline
        },
        ..Default::default()
    };

    let mut mathml = String::new();

    // Collect events, tracking any errors
    let events: Vec<_> = parser.collect();
    let errors: Vec<String> = events
        .iter()
        .filter_map(|e| e.as_ref().err().map(|err| err.to_string()))
        .collect();

    if !errors.is_empty() {
        return MathResult::Error {
            html: escape(latex),
            message: errors.join("; "),
        };
    }

    if let Err(e) = push_mathml(&mut mathml, events.into_iter(), config) {
        return MathResult::Error {
            html: escape(latex),
            message: e.to_string(),
        };
    }
    MathResult::Success(mathml)
}

pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Writing to a String can't fail
    let _ = escape_html(&mut out, text);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_inline_math() {
        let result = render_math("x^2", false);
        assert!(result.is_success());
        if let MathResult::Success(mathml) = result {
            assert!(mathml.contains("<math"));
            assert!(mathml.contains("</math>"));
        }
    }

    #[test]
    fn renders_display_math() {
        let result = render_math(r"\frac{a}{b}", true);
        if let MathResult::Success(mathml) = result {
            assert!(mathml.contains("<mfrac"));
        } else {
            panic!("expected success, got {result:?}");
        }
    }

    #[test]
    fn nested_fractions() {
        assert!(render_math(r"\frac{\frac{a}{b}}{c}", false).is_success());
    }

    #[test]
    fn invalid_latex_falls_back_to_escaped_source() {
        let result = render_math(r"\frac{a<b", false);
        match result {
            MathResult::Error { html, message } => {
                assert_eq!(html, r"\frac{a&lt;b");
                assert!(!message.is_empty());
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn empty_formula_is_an_error() {
        assert!(!render_math("  ", true).is_success());
    }
}
