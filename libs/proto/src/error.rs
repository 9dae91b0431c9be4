//! Error types for the status stream.

use thiserror::Error;

/// Failures while registering for, or reading, status notifications.
///
/// All of these are transient from the subscriber's point of view: the
/// readiness gate logs them and reconnects.
#[derive(Debug, Error)]
pub enum StatusStreamError {
    /// The endpoint is not a valid URI.
    #[error("invalid status endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    /// The connection could not be established.
    #[error("failed to connect to status endpoint {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    /// The service rejected the registration.
    #[error("status registration failed: {0}")]
    Register(tonic::Status),

    /// Reading from an open stream failed.
    #[error("error reading from status stream: {0}")]
    Read(tonic::Status),

    /// The server ended the stream without a terminal status.
    #[error("status stream closed by server")]
    Closed,
}
