//! Unified error type.

use thiserror::Error;

/// The error type returned by tether's fallible operations.
///
/// Application-level failures (404, 405, 500) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// misuse of the container and the pipeline, plus infrastructure failures
/// while binding or accepting connections.
#[derive(Debug, Error)]
pub enum Error {
    /// Attempted to set or unset a frozen container key.
    #[error("container key `{0}` is frozen")]
    FrozenKey(String),

    /// `get` on a key the container does not hold.
    #[error("container key `{0}` not found")]
    NotFound(String),

    /// `unset` on a key the container does not hold.
    #[error("offset `{0}` does not exist")]
    OutOfRange(String),

    /// The stored value (or factory output) is not of the requested type.
    #[error("container key `{key}` does not hold a `{expected}`")]
    TypeMismatch { key: String, expected: &'static str },

    /// A factory asked for its own key while being resolved.
    #[error("container key `{0}` depends on itself")]
    CyclicResolution(String),

    /// A middleware layer element is not a recognized shape.
    #[error("invalid middleware `{0}`")]
    InvalidMiddleware(String),

    /// `run` found nothing to dispatch.
    #[error("can't run, no middleware found")]
    NoMiddleware,

    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
