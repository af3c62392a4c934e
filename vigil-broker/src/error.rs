use thiserror::Error;
use vigil_integration::error::SocketError;

/// Broker gateway error.
///
/// The variant is the error kind contract shared by both backends: read operations
/// surface these to the caller unchanged, while order placement raises them only for
/// transport or session loss (business rejections travel inside
/// [`OrderResult`](vigil_instrument::order::OrderResult) instead).
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum BrokerError {
    #[error("broker not connected: {0}")]
    NotConnected(String),

    #[error("broker request timed out: {0}")]
    Timeout(String),

    #[error("broker transport failure: {0}")]
    Transport(String),

    #[error("broker protocol violation: {0}")]
    Protocol(String),

    #[error("broker rejected the session: {0}")]
    Auth(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<SocketError> for BrokerError {
    fn from(error: SocketError) -> Self {
        match error {
            SocketError::HttpTimeout(error) => Self::Timeout(error.to_string()),
            SocketError::HttpUnauthorized(message) => Self::Auth(message),
            SocketError::Deserialise { .. } | SocketError::Serialise(_) => {
                Self::Protocol(error.to_string())
            }
            SocketError::Http(error) if error.is_connect() => Self::NotConnected(error.to_string()),
            SocketError::Terminated(message) => Self::NotConnected(message),
            error => Self::Transport(error.to_string()),
        }
    }
}
