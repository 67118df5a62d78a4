//! KDL configuration file.
//!
//! ```kdl
//! highlight-class "latex-highlight"
//! formula-class "latex-formula"
//! context-window 100
//! min-word-len 4
//! fallback-window 200
//! ```
//!
//! Every node is optional.

use std::path::{Path, PathBuf};

use kdl::{KdlDocument, KdlValue};
use marginalia_core::{MarginaliaError, RenderOptions, ResolveOptions};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub render: RenderOptions,
    pub resolve: ResolveOptions,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("marginalia").join("config.kdl"))
}

impl Config {
    /// Load from `path`, or from the default location if it exists, or fall
    /// back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, MarginaliaError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };
        tracing::debug!(path = %path.display(), "loading config");
        let text = std::fs::read_to_string(&path)?;
        Self::from_kdl(&text)
    }

    pub fn from_kdl(text: &str) -> Result<Self, MarginaliaError> {
        let doc: KdlDocument = text
            .parse()
            .map_err(|e: kdl::KdlError| MarginaliaError::Config(e.to_string()))?;
        let mut config = Self::default();

        if let Some(class) = string_node(&doc, "highlight-class")? {
            config.render.highlight_class = class;
        }
        if let Some(class) = string_node(&doc, "formula-class")? {
            config.render.formula_class = class;
        }
        if let Some(n) = count_node(&doc, "context-window")? {
            config.resolve.context_window = n;
        }
        if let Some(n) = count_node(&doc, "min-word-len")? {
            config.resolve.min_word_len = n;
        }
        if let Some(n) = count_node(&doc, "fallback-window")? {
            config.resolve.fallback_window = n;
        }
        Ok(config)
    }
}

fn first_value<'d>(doc: &'d KdlDocument, name: &str) -> Option<&'d KdlValue> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .map(|entry| entry.value())
}

fn string_node(doc: &KdlDocument, name: &str) -> Result<Option<String>, MarginaliaError> {
    let Some(value) = first_value(doc, name) else {
        return Ok(None);
    };
    value
        .as_string()
        .map(|s| Some(s.to_string()))
        .ok_or_else(|| MarginaliaError::Config(format!("`{name}` expects a string")))
}

fn count_node(doc: &KdlDocument, name: &str) -> Result<Option<usize>, MarginaliaError> {
    let Some(value) = first_value(doc, name) else {
        return Ok(None);
    };
    value
        .as_i64()
        .and_then(|n| usize::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| MarginaliaError::Config(format!("`{name}` expects a non-negative integer")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Config::from_kdl("").unwrap(), Config::default());
    }

    #[test]
    fn reads_all_nodes() {
        let config = Config::from_kdl(
            r#"
            highlight-class "hl"
            formula-class "fx"
            context-window 40
            min-word-len 5
            fallback-window 80
            "#,
        )
        .unwrap();
        assert_eq!(config.render.highlight_class, "hl");
        assert_eq!(config.render.formula_class, "fx");
        assert_eq!(config.resolve.context_window, 40);
        assert_eq!(config.resolve.min_word_len, 5);
        assert_eq!(config.resolve.fallback_window, 80);
    }

    #[test]
    fn rejects_wrong_types() {
        let err = Config::from_kdl("context-window \"wide\"").unwrap_err();
        assert!(matches!(err, MarginaliaError::Config(_)));
        let err = Config::from_kdl("min-word-len -1").unwrap_err();
        assert!(matches!(err, MarginaliaError::Config(_)));
        let err = Config::from_kdl("formula-class 3").unwrap_err();
        assert!(matches!(err, MarginaliaError::Config(_)));
    }

    #[test]
    fn rejects_invalid_kdl() {
        assert!(Config::from_kdl("highlight-class \"unterminated").is_err());
    }
}
