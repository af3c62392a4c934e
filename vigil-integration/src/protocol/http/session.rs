use crate::{
    error::SocketError,
    protocol::http::{BuildStrategy, RestRequest},
};
use reqwest::header::{ACCEPT, COOKIE, HeaderValue};

/// [`BuildStrategy`] for anonymous APIs requiring no decoration, eg/ a public FX-rate
/// source.
#[derive(Debug, Copy, Clone, Default)]
pub struct PublicNoHeaders;

impl BuildStrategy for PublicNoHeaders {
    fn build<Request>(
        &self,
        _: Request,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Request, SocketError>
    where
        Request: RestRequest,
    {
        builder.build().map_err(SocketError::from)
    }
}

/// [`BuildStrategy`] for a stateful broker API authenticated by a login session cookie.
///
/// Every request carries `Accept: */*` plus the configured cookie, matching what the
/// broker's own web client sends. Without the cookie the broker answers with a redirect
/// to its login page.
#[derive(Debug, Clone, Default)]
pub struct SessionCookie {
    cookie: Option<HeaderValue>,
}

impl SessionCookie {
    pub fn new(cookie: Option<&str>) -> Result<Self, SocketError> {
        let cookie = match cookie {
            Some(cookie) => Some(
                HeaderValue::from_str(cookie)
                    .map_err(|error| SocketError::Exchange(format!("invalid session cookie: {error}")))?,
            ),
            None => None,
        };

        Ok(Self { cookie })
    }
}

impl BuildStrategy for SessionCookie {
    fn build<Request>(
        &self,
        _: Request,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Request, SocketError>
    where
        Request: RestRequest,
    {
        let mut builder = builder.header(ACCEPT, HeaderValue::from_static("*/*"));

        if let Some(cookie) = &self.cookie {
            builder = builder.header(COOKIE, cookie.clone());
        }

        builder.build().map_err(SocketError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::http::client::RestClient;
    use serde::Deserialize;
    use std::borrow::Cow;

    #[derive(Deserialize)]
    struct Empty {}

    struct Probe;

    impl RestRequest for Probe {
        type Response = Empty;
        type QueryParams = ();
        type Body = ();

        fn path(&self) -> Cow<'static, str> {
            Cow::Borrowed("/tickle")
        }

        fn method() -> reqwest::Method {
            reqwest::Method::POST
        }
    }

    struct NoopParser;

    impl crate::protocol::http::HttpParser for NoopParser {
        type ApiError = serde_json::Value;
        type OutputError = SocketError;

        fn parse_api_error(
            &self,
            status: reqwest::StatusCode,
            error: Self::ApiError,
        ) -> Self::OutputError {
            SocketError::HttpResponse(status, error.to_string())
        }
    }

    #[test]
    fn test_session_cookie_decorates_request() {
        let client = RestClient::new(
            "https://localhost:5000/v1/api",
            SessionCookie::new(Some("ibsession=abc123")).unwrap(),
            NoopParser,
        );

        let request = client.build(Probe).unwrap();
        assert_eq!(request.headers().get(ACCEPT).unwrap(), "*/*");
        assert_eq!(request.headers().get(COOKIE).unwrap(), "ibsession=abc123");
        assert_eq!(request.url().path(), "/v1/api/tickle");
    }

    #[test]
    fn test_missing_cookie_still_sends_accept() {
        let client = RestClient::new(
            "https://localhost:5000/v1/api",
            SessionCookie::new(None).unwrap(),
            NoopParser,
        );

        let request = client.build(Probe).unwrap();
        assert_eq!(request.headers().get(ACCEPT).unwrap(), "*/*");
        assert!(request.headers().get(COOKIE).is_none());
    }
}
