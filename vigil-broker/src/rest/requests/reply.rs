use super::place_order::PlaceOrderReply;
use serde::Serialize;
use smol_str::SmolStr;
use std::borrow::Cow;
use vigil_integration::protocol::http::RestRequest;

/// Confirm a risk-warning reply raised by an order submission.
///
/// Bounded at one confirmation step: the broker asks once per ticket and the answer is
/// always `confirmed: true`.
///
/// <https://interactivebrokers.github.io/cpwebapi/endpoints> - `POST /iserver/reply/{replyId}`
#[derive(Debug, Clone)]
pub struct ReplyConfirmRequest {
    reply_id: SmolStr,
    body: ReplyBody,
}

impl ReplyConfirmRequest {
    pub fn confirmed(reply_id: SmolStr) -> Self {
        Self {
            reply_id,
            body: ReplyBody { confirmed: true },
        }
    }
}

impl RestRequest for ReplyConfirmRequest {
    type Response = Vec<PlaceOrderReply>;
    type QueryParams = ();
    type Body = ReplyBody;

    fn path(&self) -> Cow<'static, str> {
        Cow::Owned(format!("/iserver/reply/{}", self.reply_id))
    }

    fn method() -> reqwest::Method {
        reqwest::Method::POST
    }

    fn body(&self) -> Option<&Self::Body> {
        Some(&self.body)
    }
}

#[derive(Debug, Copy, Clone, Serialize)]
pub struct ReplyBody {
    pub confirmed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_confirm_request() {
        let request = ReplyConfirmRequest::confirmed("07a13a5a".into());
        assert_eq!(request.path(), "/iserver/reply/07a13a5a");
        assert_eq!(
            serde_json::to_string(request.body().unwrap()).unwrap(),
            r#"{"confirmed":true}"#
        );
    }
}
