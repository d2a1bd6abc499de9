// error.rs - Error taxonomy for the decoder and the analysis engine

use thiserror::Error;

/// Problems found while decoding an ABIF container.
///
/// Only `InvalidSignature` (and a directory with no readable entry) aborts a
/// decode; the other variants are recorded as warnings on the decoded file.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Not an ABIF file, or shorter than the fixed header
    #[error("Invalid ABIF signature: {reason}")]
    InvalidSignature { reason: String },

    /// Directory declares more entries than the buffer holds
    #[error("Truncated directory: {declared} entries declared, {readable} readable")]
    TruncatedDirectory { declared: usize, readable: usize },

    /// Out-of-line data lies beyond the end of the buffer
    #[error("Tag {tag} out of bounds: offset {offset} + size {size} exceeds file length {file_len}")]
    TagOutOfBounds {
        tag: String,
        offset: usize,
        size: usize,
        file_len: usize,
    },

    /// Element layout that cannot be decoded as a trace or string
    #[error("Tag {tag} has unsupported element type {element_type} (size {element_size})")]
    UnsupportedElement {
        tag: String,
        element_type: i16,
        element_size: i16,
    },

    /// A channel tag with zero samples
    #[error("Channel {channel} has no samples")]
    EmptyTrace { channel: u8 },
}

impl ParseError {
    pub fn invalid_signature(reason: impl Into<String>) -> Self {
        Self::InvalidSignature {
            reason: reason.into(),
        }
    }

    /// True for errors that prevent any further decoding of the file
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ParseError::InvalidSignature { .. } | ParseError::TruncatedDirectory { readable: 0, .. }
        )
    }
}

/// Failure of one file's analysis. Converted into a failed `AnalysisResult`
/// at the engine boundary, never propagated to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("No trace data found in file")]
    NoTraceData,

    #[error("Unhandled error during analysis: {0}")]
    Unhandled(String),
}

/// Type alias for Results using AnalysisError
pub type Result<T> = std::result::Result<T, AnalysisError>;
