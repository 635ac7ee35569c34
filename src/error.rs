use std::io;

use thiserror::Error;

/// Errors raised while reading corpora, training, or loading models
#[derive(Debug, Error)]
pub enum Error {
    /// A corpus line is not a `<character> <tag>` pair
    #[error("corpus format error at line {line}: {message}")]
    Format {
        /// 1-based line number
        line: usize,
        /// What was wrong with the line
        message: String,
    },

    /// The training corpus contains no sentence
    #[error("no training data")]
    EmptyCorpus,

    /// A sequence handed to the trainer or tagger is unusable
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A hyperparameter is out of range
    #[error("{0}")]
    InvalidParameter(String),

    /// The optimizer gave up before converging
    #[error("failed to optimize CRF: {0}")]
    NotConverged(String),

    /// The optimizer returned a NaN or infinite weight
    #[error("weight #{index} is not finite")]
    NonFiniteWeight {
        /// Feature id of the offending weight
        index: usize,
    },

    /// A model artifact could not be decoded
    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn format<M: Into<String>>(line: usize, message: M) -> Self {
        Error::Format {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_model<M: Into<String>>(message: M) -> Self {
        Error::InvalidModel(message.into())
    }

    /// Process exit code for command-line wrappers.
    ///
    /// `1` for bad input, `2` when training fails to produce a usable model,
    /// `3` for I/O and model-file errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Format { .. }
            | Error::EmptyCorpus
            | Error::InvalidInput(_)
            | Error::InvalidParameter(_) => 1,
            Error::NotConverged(_) | Error::NonFiniteWeight { .. } => 2,
            Error::InvalidModel(_) | Error::Io(_) => 3,
        }
    }
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;
