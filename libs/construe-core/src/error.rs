//! Error types for construe-core.

use serde::Serialize;
use thiserror::Error;

/// Result type alias using MasteryError.
pub type Result<T> = std::result::Result<T, MasteryError>;

/// Reasons a tagged construction cannot become a target.
///
/// These are reported and skipped; they never abort an excerpt.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum ExcerptError {
    #[error("construction {ordinal}: unknown type {value:?}")]
    UnknownType { ordinal: usize, value: String },

    #[error("construction {ordinal}: missing span")]
    MissingSpan { ordinal: usize },

    #[error("construction {ordinal}: span {start}..={end} out of range for {len} tokens")]
    SpanOutOfRange {
        ordinal: usize,
        start: i64,
        end: i64,
        len: usize,
    },

    #[error("construction {ordinal}: reversed span {start}..={end}")]
    ReversedSpan { ordinal: usize, start: i64, end: i64 },

    #[error("construction {ordinal}: bad highlight span {detail}")]
    BadHighlightSpan { ordinal: usize, detail: String },
}

impl ExcerptError {
    pub fn ordinal(&self) -> usize {
        match self {
            Self::UnknownType { ordinal, .. }
            | Self::MissingSpan { ordinal }
            | Self::SpanOutOfRange { ordinal, .. }
            | Self::ReversedSpan { ordinal, .. }
            | Self::BadHighlightSpan { ordinal, .. } => *ordinal,
        }
    }
}

/// Errors raised by mastery persistence.
#[derive(Debug, Error)]
pub enum MasteryError {
    #[error("mastery storage error: {0}")]
    Storage(String),

    #[error("invalid mastery data: {0}")]
    InvalidData(String),
}
