use serde::Deserialize;
use std::borrow::Cow;
use vigil_instrument::status::ConnectionStatus;
use vigil_integration::protocol::http::RestRequest;

/// Probe the gateway's session state.
///
/// <https://interactivebrokers.github.io/cpwebapi/endpoints> - `POST /iserver/auth/status`
#[derive(Debug, Copy, Clone)]
pub struct AuthStatusRequest;

impl RestRequest for AuthStatusRequest {
    type Response = AuthStatusResponse;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/iserver/auth/status")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::POST
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthStatusResponse {
    #[serde(default)]
    pub authenticated: bool,

    #[serde(default)]
    pub competing: bool,

    #[serde(default)]
    pub connected: bool,

    #[serde(default)]
    pub message: Option<String>,
}

impl From<AuthStatusResponse> for ConnectionStatus {
    fn from(response: AuthStatusResponse) -> Self {
        Self {
            reachable: true,
            authenticated: response.authenticated,
            connected: response.connected,
            competing: response.competing,
            message: response.message.filter(|message| !message.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod de {
        use super::*;

        #[test]
        fn test_auth_status() {
            let raw_response = r#"{
                "authenticated": true,
                "competing": false,
                "connected": true,
                "message": "",
                "MAC": "98:F2:B3:23:BF:A0",
                "serverInfo": {"serverName": "JifN19053", "serverVersion": "Build 10.25.0p"}
            }"#;

            let actual = serde_json::from_str::<AuthStatusResponse>(raw_response).unwrap();

            let expected = AuthStatusResponse {
                authenticated: true,
                competing: false,
                connected: true,
                message: Some(String::new()),
            };

            assert_eq!(actual, expected);

            let status = ConnectionStatus::from(actual);
            assert!(status.reachable);
            assert!(status.authenticated);
            assert_eq!(status.message, None);
        }
    }
}
