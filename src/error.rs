//! Error types for property list encoding and decoding.

/// Errors that can occur while reading or writing a property list.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlistError {
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("truncated input: {0}")]
    TruncatedInput(String),

    #[error("invalid object reference: {0}")]
    InvalidReference(String),

    #[error("unsupported object marker 0x{marker:02X} at offset {offset}")]
    UnsupportedMarker { marker: u8, offset: usize },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("integer overflow: {0}")]
    IntegerOverflow(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("nesting exceeds depth limit of {limit}")]
    NestingTooDeep { limit: usize },

    #[error("property list too large: {0}")]
    TooLarge(String),

    #[error("XML syntax error at {line}:{column}: {message}")]
    XmlSyntax {
        message: String,
        line: usize,
        column: usize,
    },
}

/// Result alias used throughout the crate.
pub type PlistResult<T> = Result<T, PlistError>;

/// The category of a [`PlistError`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedHeader,
    TruncatedInput,
    InvalidReference,
    UnsupportedMarker,
    TypeMismatch,
    Encoding,
    IntegerOverflow,
    InvalidDate,
    NestingTooDeep,
    TooLarge,
    XmlSyntax,
}

impl PlistError {
    /// Returns the error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedHeader(_) => ErrorKind::MalformedHeader,
            Self::TruncatedInput(_) => ErrorKind::TruncatedInput,
            Self::InvalidReference(_) => ErrorKind::InvalidReference,
            Self::UnsupportedMarker { .. } => ErrorKind::UnsupportedMarker,
            Self::TypeMismatch(_) => ErrorKind::TypeMismatch,
            Self::Encoding(_) => ErrorKind::Encoding,
            Self::IntegerOverflow(_) => ErrorKind::IntegerOverflow,
            Self::InvalidDate(_) => ErrorKind::InvalidDate,
            Self::NestingTooDeep { .. } => ErrorKind::NestingTooDeep,
            Self::TooLarge(_) => ErrorKind::TooLarge,
            Self::XmlSyntax { .. } => ErrorKind::XmlSyntax,
        }
    }

    /// Builds an XML syntax error at a 1-based line and column.
    pub(crate) fn xml(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::XmlSyntax {
            message: message.into(),
            line,
            column,
        }
    }
}
