use thiserror::Error;

use crate::driver::DriverState;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Error reported by a [`crate::ModelBackend`] from tokenize, step or decode.
///
/// The driver never inspects or retries these; they are carried unchanged to
/// whoever is consuming the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The audio sink could not be opened or refused to play an event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("audio unavailable: {reason}")]
pub struct AudioUnavailable {
    pub reason: String,
}

impl AudioUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    /// The backend returned tensors that do not have the expected shape
    /// (zero layers, a weight buffer that disagrees with its declared
    /// dimensions, non-finite values). Fatal to the current run.
    #[error("malformed model output: {0}")]
    MalformedModelOutput(String),

    #[error("backend failure: {0}")]
    Backend(#[from] BackendError),

    #[error(transparent)]
    AudioUnavailable(#[from] AudioUnavailable),

    /// A driver only runs once; `start` was called outside the `Idle` state.
    #[error("generation driver cannot start from state {0}")]
    DriverNotIdle(DriverState),
}

impl CoreError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedModelOutput(message.into())
    }
}
