use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::error;
use vigil_integration::{error::SocketError, protocol::http::HttpParser};

/// [`HttpParser`] for the session-cookie gateway.
///
/// The gateway signals an expired or missing session with a redirect to its login page
/// (or a 401), which must surface as an authentication failure rather than a decode
/// failure so `connection_status` can report `reachable=false` with a useful message.
#[derive(Debug, Copy, Clone, Default)]
pub struct GatewayParser;

impl HttpParser for GatewayParser {
    type ApiError = serde_json::Value;
    type OutputError = SocketError;

    fn parse<Response>(
        &self,
        status: StatusCode,
        payload: &[u8],
    ) -> Result<Response, Self::OutputError>
    where
        Response: DeserializeOwned,
    {
        if status.is_redirection() {
            return Err(SocketError::HttpUnauthorized(format!(
                "gateway redirected with status {status}: session missing or expired"
            )));
        }

        let parse_ok_error = match serde_json::from_slice::<Response>(payload) {
            Ok(response) => return Ok(response),
            Err(serde_error) => serde_error,
        };

        if let Ok(api_error) = serde_json::from_slice::<Self::ApiError>(payload) {
            return Err(self.parse_api_error(status, api_error));
        }

        error!(
            status_code = ?status,
            ?parse_ok_error,
            response_body = %String::from_utf8_lossy(payload),
            "error deserializing gateway response"
        );

        Err(SocketError::Deserialise {
            error: parse_ok_error,
            payload: String::from_utf8_lossy(payload).into_owned(),
        })
    }

    fn parse_api_error(&self, status: StatusCode, error: Self::ApiError) -> Self::OutputError {
        let error = error.to_string();

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                SocketError::HttpUnauthorized(error)
            }
            _ => SocketError::HttpResponse(status, error),
        }
    }
}
