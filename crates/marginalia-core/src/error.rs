//! Error types for the fallible edges of marginalia.
//!
//! Rendering and anchor resolution never fail; these errors only come out of
//! loading annotation records and configuration.

use miette::Diagnostic;

/// Main error type for marginalia operations
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum MarginaliaError {
    /// Annotation records could not be decoded from the host JSON format
    #[error("invalid annotation records: {0}")]
    #[diagnostic(
        code(marginalia::records),
        help("expected a JSON array of {{id, type, data, text, timestamp, range}} objects")
    )]
    Records(#[source] serde_json::Error),

    /// Annotation records could not be encoded
    #[error("could not serialize annotation records: {0}")]
    #[diagnostic(code(marginalia::records::encode))]
    Encode(#[source] serde_json::Error),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    #[diagnostic(code(marginalia::config))]
    Config(String),

    /// IO error
    #[error(transparent)]
    #[diagnostic(code(marginalia::io))]
    Io(#[from] std::io::Error),
}
