use thiserror::Error;

/// Failure of a (possibly retried) HTTP request
#[derive(Debug, Error)]
pub enum FetchError {
    /// No response at all; always retried
    #[error("transport error: {0}")]
    Transport(String),

    #[error("giving up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: String,
    },
}

/// Reasons the route reference could not be built. All of them are fatal for the session.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to fetch route reference")]
    Fetch(#[source] FetchError),

    #[error("route reference returned status {0}")]
    Status(u16),

    #[error("route reference is not valid JSON")]
    Decode(#[source] serde_json::Error),

    #[error("malformed reference data: {0}")]
    Malformed(&'static str),

    #[error("route reference contains no usable routes")]
    Empty,
}

/// Reasons a single refresh tick failed
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("failed to fetch vehicle positions")]
    Fetch(#[source] FetchError),

    #[error("vehicle feed returned status {0}")]
    Status(u16),

    #[error("failed to parse vehicle feed")]
    Decode(#[source] serde_json::Error),
}
