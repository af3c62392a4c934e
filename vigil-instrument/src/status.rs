use serde::{Deserialize, Serialize};

/// Broker connection health, reported via fields rather than errors.
///
/// `reachable` means the transport answered at all; `authenticated` that the broker
/// accepted the session; `competing` that another session is live for the same user
/// (informational, placements are not refused).
#[derive(Debug, Clone, Eq, PartialEq, Default, Deserialize, Serialize)]
pub struct ConnectionStatus {
    pub reachable: bool,
    pub authenticated: bool,
    pub connected: bool,
    pub competing: bool,
    pub message: Option<String>,
}

impl ConnectionStatus {
    /// Transport never answered; everything else is necessarily false.
    pub fn unreachable<M>(message: M) -> Self
    where
        M: Into<String>,
    {
        Self {
            reachable: false,
            authenticated: false,
            connected: false,
            competing: false,
            message: Some(message.into()),
        }
    }
}
