use thiserror::Error;

/// Failure to turn a configuration file into a [`FlatConfig`](super::FlatConfig).
///
/// Never escapes a resolver query: callers log it and continue with an empty
/// configuration for the offending source.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    #[error("structured document is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("malformed structured document: {0}")]
    Structured(#[from] serde_yaml::Error),

    #[error("malformed \\uxxxx escape on line {line}")]
    MalformedEscape { line: usize },
}
