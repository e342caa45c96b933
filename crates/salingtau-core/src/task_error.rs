//! Retry classification for job failures
//!
//! A job handler returns `anyhow::Error`. Wrapping the cause in [`TaskError`]
//! records whether running the job again can succeed: a storage hiccup or a
//! database timeout can, a missing staged blob or an upload ffmpeg rejects
//! cannot. The queue reads the flag back with [`is_unrecoverable`].

use std::fmt;

#[derive(Debug)]
pub struct TaskError {
    cause: anyhow::Error,
    recoverable: bool,
}

impl TaskError {
    /// Fails the job on the first attempt.
    pub fn unrecoverable(cause: impl Into<anyhow::Error>) -> Self {
        Self {
            cause: cause.into(),
            recoverable: false,
        }
    }

    /// Retried with backoff until the queue's retry limit.
    pub fn recoverable(cause: impl Into<anyhow::Error>) -> Self {
        Self {
            cause: cause.into(),
            recoverable: true,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.cause, f)
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.source()
    }
}

/// True when `err` carries a [`TaskError`] marked unrecoverable. Anything
/// else is worth another attempt.
pub fn is_unrecoverable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<TaskError>()
        .is_some_and(|task_error| !task_error.is_recoverable())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_kept() {
        let err = TaskError::unrecoverable(anyhow::anyhow!("staged file missing"));
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "staged file missing");

        assert!(TaskError::recoverable(anyhow::anyhow!("connection reset")).is_recoverable());
    }

    #[test]
    fn classification_survives_anyhow() {
        let err: anyhow::Error = TaskError::unrecoverable(anyhow::anyhow!("probe")).into();
        assert!(is_unrecoverable(&err));

        let err: anyhow::Error = TaskError::recoverable(anyhow::anyhow!("network")).into();
        assert!(!is_unrecoverable(&err));

        assert!(!is_unrecoverable(&anyhow::anyhow!("plain")));
    }
}
