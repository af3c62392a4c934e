use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::borrow::Cow;
use vigil_instrument::{Side, account::AccountId, order::StopLossOrderRequest};
use vigil_integration::protocol::http::RestRequest;

/// Submit an order ticket for one account.
///
/// The response is two-faced: either the order went straight through
/// ([`PlaceOrderReply::Submitted`]) or the broker is asking for confirmation of a risk
/// warning ([`PlaceOrderReply::Confirmation`]), which must be answered via
/// [`ReplyConfirmRequest`](super::reply::ReplyConfirmRequest) before the order exists.
///
/// <https://interactivebrokers.github.io/cpwebapi/endpoints> -
/// `POST /iserver/account/{accountId}/orders`
#[derive(Debug, Clone, Constructor)]
pub struct PlaceOrderRequest {
    account: AccountId,
    body: PlaceOrderBody,
}

impl PlaceOrderRequest {
    pub fn stop_loss(request: &StopLossOrderRequest) -> Self {
        Self::new(
            request.account.clone(),
            PlaceOrderBody {
                orders: vec![PlaceOrderTicket {
                    account: request.account.clone(),
                    conid: request.conid.0,
                    order_type: "STP",
                    price: request.stop_price,
                    side: request.side(),
                    quantity: request.quantity,
                    time_in_force: "GTC",
                }],
            },
        )
    }
}

impl RestRequest for PlaceOrderRequest {
    type Response = Vec<PlaceOrderReply>;
    type QueryParams = ();
    type Body = PlaceOrderBody;

    fn path(&self) -> Cow<'static, str> {
        Cow::Owned(format!("/iserver/account/{}/orders", self.account))
    }

    fn method() -> reqwest::Method {
        reqwest::Method::POST
    }

    fn body(&self) -> Option<&Self::Body> {
        Some(&self.body)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaceOrderBody {
    pub orders: Vec<PlaceOrderTicket>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaceOrderTicket {
    #[serde(rename = "acctId")]
    pub account: AccountId,

    pub conid: i64,

    /// For "STP" tickets the gateway takes the trigger in `price`.
    #[serde(rename = "orderType")]
    pub order_type: &'static str,

    pub price: Decimal,

    pub side: Side,

    pub quantity: Decimal,

    #[serde(rename = "tif")]
    pub time_in_force: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PlaceOrderReply {
    Submitted {
        #[serde(rename = "order_id")]
        order_id: SmolStr,

        #[serde(default, rename = "order_status")]
        status: Option<SmolStr>,
    },
    Confirmation {
        id: SmolStr,

        #[serde(default)]
        message: Vec<String>,
    },
}
