use thiserror::Error;

/// Error raised by a [`crate::Transport`] while dispatching a single POST.
///
/// Connection-refused failures get their own variant because the provider's
/// connectivity state machine treats them specially: they are the only
/// failure kind that flips a connected provider back to disconnected.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote endpoint is unreachable (the `ECONNREFUSED` class of
    /// failures), distinct from an application-level RPC error
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// Any other error raised by the HTTP layer
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The response body could not be parsed as JSON
    #[error("deserialization error: {err}. Response: {text}")]
    SerdeJson {
        /// Underlying error
        err: serde_json::Error,
        /// The contents of the HTTP response that could not be deserialized
        text: String,
    },

    /// Custom error from unknown source
    #[error("{0}")]
    Custom(String),
}

impl TransportError {
    /// Returns `true` if the failure means the remote endpoint refused the
    /// connection
    pub fn is_connection_refused(&self) -> bool {
        matches!(self, TransportError::ConnectionRefused(_))
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() {
            TransportError::ConnectionRefused(err.to_string())
        } else {
            TransportError::Http(err)
        }
    }
}

/// An error thrown when making a call to the provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The endpoint string does not look like an HTTP(S) URL
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// A request was issued before any client was bound
    #[error("http client has not been initialized")]
    UninitializedClient,

    /// Transport or remote failure during a call
    #[error("error invoking RPC: {0}")]
    Request(#[from] TransportError),

    /// Failure during the connectivity chain-identity query
    #[error("failed to connect: {0}")]
    Connect(#[source] Box<ProviderError>),

    /// Failure while switching the provider to a new endpoint
    #[error("failed to set endpoint: {0}")]
    Rebind(#[source] Box<ProviderError>),
}
