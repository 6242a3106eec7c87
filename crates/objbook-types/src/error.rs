use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid {kind} text: {text:?}")]
    InvalidText { kind: &'static str, text: String },

    #[error("numeric denominator must be positive, got {0}")]
    InvalidDenominator(i64),

    #[error("unsupported parameter kind: {0}")]
    UnsupportedKind(String),

    #[error("invalid kvp path: {0:?}")]
    InvalidPath(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TypeError {
    /// Shorthand for [`TypeError::InvalidText`].
    pub fn text(kind: &'static str, text: &str) -> Self {
        Self::InvalidText {
            kind,
            text: text.to_string(),
        }
    }
}
