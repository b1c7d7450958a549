use std::any::Any;
use std::sync::Arc;

/// The error slot of a settlement.
///
/// Errors are cloned into every handler waiting on a promise, so anything
/// that is not itself `Clone` is kept behind an `Arc`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(Arc<dyn std::error::Error + Send + Sync>),

    #[error("continuation panicked: {0}")]
    Panicked(String),

    #[error("resolver called with both a value and an error")]
    BothValueAndError,

    #[error("resolver called with neither a value nor an error")]
    NeitherValueNorError,

    #[error("producer dropped the resolver without settling")]
    ProducerDropped,

    #[error("promise cannot be resolved with itself")]
    SelfResolution,

    #[error("promise {index} in promises was rejected")]
    MemberRejected { index: usize, source: Box<Error> },

    #[error("all {} promises were rejected", .errors.len())]
    AllRejected { errors: Vec<Error> },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("executor pool failed to start: {0}")]
    Io(Arc<std::io::Error>),
}

impl Error {
    pub fn msg(message: impl Into<String>) -> Self {
        Error::Message(message.into())
    }

    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Other(Arc::new(error))
    }

    /// Converts a `catch_unwind` payload into a rejection.
    pub(crate) fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_owned(),
                Err(_) => "non-string panic payload".to_owned(),
            },
        };
        Error::Panicked(message)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(Arc::new(error))
    }
}
