use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::borrow::Cow;
use vigil_instrument::{
    Conid, Side, Ticker,
    account::AccountId,
    order::{Order, OrderId},
};
use vigil_integration::protocol::http::RestRequest;

/// Fetch the live-orders list for the currently selected account.
///
/// The gateway serves this list from a server-side cache that only refreshes when a
/// `force=true` read is issued, so a reliable read is two requests: a forced one to
/// trigger the refresh, then a plain one to collect it.
///
/// <https://interactivebrokers.github.io/cpwebapi/endpoints> - `GET /iserver/account/orders`
#[derive(Debug, Clone)]
pub struct GetOrdersRequest {
    query: Option<OrdersQuery>,
}

impl GetOrdersRequest {
    /// Trigger the server-side refresh; the body of this response is stale.
    pub fn refresh() -> Self {
        Self {
            query: Some(OrdersQuery { force: true }),
        }
    }

    /// Collect the refreshed list.
    pub fn list() -> Self {
        Self { query: None }
    }
}

impl RestRequest for GetOrdersRequest {
    type Response = OrdersResponse;
    type QueryParams = OrdersQuery;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/iserver/account/orders")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        self.query.as_ref()
    }
}

#[derive(Debug, Copy, Clone, Serialize)]
pub struct OrdersQuery {
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct OrdersResponse {
    #[serde(default)]
    pub orders: Vec<OrderRow>,

    #[serde(default)]
    pub snapshot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderRow {
    #[serde(rename = "orderId")]
    pub order_id: i64,

    #[serde(rename = "acct")]
    pub account: AccountId,

    pub conid: i64,

    #[serde(default)]
    pub ticker: Option<Ticker>,

    #[serde(default, rename = "orderType")]
    pub order_type: Option<SmolStr>,

    #[serde(default)]
    pub side: Option<Side>,

    #[serde(default)]
    pub price: Option<Decimal>,

    #[serde(default, rename = "stop_price")]
    pub stop_price: Option<Decimal>,

    #[serde(default, rename = "auxPrice")]
    pub aux_price: Option<Decimal>,

    #[serde(default, rename = "totalSize")]
    pub total_size: Option<Decimal>,

    #[serde(default, rename = "remainingQuantity")]
    pub remaining_quantity: Option<Decimal>,

    #[serde(default)]
    pub status: Option<SmolStr>,

    #[serde(default, rename = "orderDesc")]
    pub order_desc: Option<String>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            order_id: OrderId::from(row.order_id),
            account: row.account,
            conid: Conid(row.conid),
            ticker: row.ticker,
            order_type: row.order_type,
            side: row.side,
            price: row.price,
            // Some gateway builds report the trigger in auxPrice instead of stop_price
            stop_price: row.stop_price.or(row.aux_price),
            quantity: row.total_size,
            remaining_quantity: row.remaining_quantity,
            status: row.status,
            description: row.order_desc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    mod de {
        use super::*;

        #[test]
        fn test_orders_list() {
            let raw_response = r#"{
                "orders": [
                    {
                        "acct": "U1234567",
                        "conid": 265598,
                        "orderId": 1799796559,
                        "cashCcy": "USD",
                        "ticker": "AAPL",
                        "orderType": "Stop",
                        "side": "SELL",
                        "auxPrice": 120.0,
                        "totalSize": 100.0,
                        "remainingQuantity": 100.0,
                        "status": "Submitted",
                        "orderDesc": "Sell 100 Stop 120.00, GTC"
                    },
                    {
                        "acct": "U1234567",
                        "conid": 8314,
                        "orderId": 1799796560,
                        "ticker": "IBM",
                        "orderType": "Limit",
                        "side": "BUY",
                        "price": 140.5,
                        "totalSize": 50.0,
                        "status": "Cancelled"
                    }
                ],
                "snapshot": true
            }"#;

            let response = serde_json::from_str::<OrdersResponse>(raw_response).unwrap();
            assert!(response.snapshot);
            assert_eq!(response.orders.len(), 2);

            let stop = Order::from(response.orders[0].clone());
            assert_eq!(stop.order_id, OrderId::new("1799796559"));
            assert_eq!(stop.stop_price, Some(dec!(120.0)));
            assert_eq!(stop.quantity, Some(dec!(100.0)));
            assert!(stop.is_stop());
            assert!(stop.is_active());

            let limit = Order::from(response.orders[1].clone());
            assert_eq!(limit.price, Some(dec!(140.5)));
            assert!(!limit.is_stop());
            assert!(!limit.is_active());
        }

        #[test]
        fn test_orders_list_empty() {
            let response = serde_json::from_str::<OrdersResponse>(r#"{"snapshot": false}"#).unwrap();
            assert!(response.orders.is_empty());
        }
    }
}
