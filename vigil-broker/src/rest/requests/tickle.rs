use serde::Deserialize;
use std::borrow::Cow;
use vigil_integration::protocol::http::RestRequest;

/// Session keep-alive probe.
///
/// <https://interactivebrokers.github.io/cpwebapi/endpoints> - `POST /tickle`
#[derive(Debug, Copy, Clone)]
pub struct TickleRequest;

impl RestRequest for TickleRequest {
    type Response = TickleResponse;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/tickle")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::POST
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TickleResponse {
    pub session: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    mod de {
        use super::*;

        #[test]
        fn test_tickle() {
            let raw_response = r#"{
                "session": "b3b18b2e9d0ee34ef44c6f44e8a1f9aa",
                "ssoExpires": 412841,
                "collission": false,
                "userId": 45112345,
                "iserver": {"authStatus": {"authenticated": true, "competing": false, "connected": true}}
            }"#;

            let actual = serde_json::from_str::<TickleResponse>(raw_response).unwrap();
            assert_eq!(actual.session, "b3b18b2e9d0ee34ef44c6f44e8a1f9aa");
        }
    }
}
