// src/tokenizer/result.rs

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A vocabulary line that could not be parsed. `line` is 1-based.
    #[error("malformed vocabulary line {line}: {reason}")]
    Format { line: usize, reason: String },

    #[error("piece not found in vocabulary: {0:?}")]
    NotFound(String),

    #[error("id {id} is out of range for a vocabulary of size {size}")]
    OutOfRange { id: u32, size: usize },

    /// Reassembled byte-fallback pieces did not form valid UTF-8.
    #[error("could not decode byte pieces: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    /// First failure seen by a batch worker; partial results are dropped.
    #[error("batch item {index} failed: {source}")]
    Batch {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    /// A token in an id stream that is not a decimal `u32`. `line` is 1-based.
    #[error("line {line}: invalid id {token:?}")]
    InvalidId { line: usize, token: String },

    #[error("could not build the piece index: {0}")]
    Index(#[from] aho_corasick::BuildError),

    #[error("could not start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn format(line_index: usize, reason: impl Into<String>) -> Self {
        Error::Format {
            line: line_index + 1,
            reason: reason.into(),
        }
    }

    /// Unwraps a `Batch` failure down to the error the worker actually hit.
    pub fn root(&self) -> &Error {
        match self {
            Error::Batch { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_error_reports_one_based_line() {
        let err = Error::format(0, "missing tab separator");
        assert_eq!(
            err.to_string(),
            "malformed vocabulary line 1: missing tab separator"
        );
    }

    #[test]
    fn root_unwraps_nested_batch_failures() {
        let err = Error::Batch {
            index: 3,
            source: Box::new(Error::OutOfRange { id: 9, size: 4 }),
        };
        assert!(matches!(err.root(), Error::OutOfRange { id: 9, size: 4 }));
        assert!(err.to_string().starts_with("batch item 3 failed"));
    }
}
