//! Main Crate Error

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Kbuckets crate error enum.
pub enum Error {
    /// Id bytes were not exactly [ID_SIZE](crate::ID_SIZE) long.
    #[error("Invalid Id size, expected 20, got {0}")]
    InvalidIdSize(usize),

    /// Id string was not 40 hex characters.
    #[error("Invalid Id encoding: {0}")]
    InvalidIdEncoding(String),

    /// Indicates that a bucket or replacement cache was configured with zero capacity.
    #[error("{0} must be greater than zero")]
    InvalidBucketSize(&'static str),

    /// Indicates that the liveness probe pool was configured with no workers or no queue.
    #[error("{0} must be greater than zero")]
    InvalidProbePool(&'static str),
}

/// Crate [Result](std::result::Result) alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;
