use crate::{Conid, Side, Ticker, account::AccountId};
use derive_more::{Constructor, Display};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Order statuses that terminate an order; anything else (including a missing status)
/// is treated as active.
const INACTIVE_STATUSES: [&str; 3] = ["Cancelled", "Filled", "ApiCancelled"];

/// Broker-assigned order identifier.
///
/// Opaque, but stable across refreshes of the same order, which makes it the dedup key
/// when stop orders are accumulated across per-account reads.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
pub struct OrderId(SmolStr);

impl OrderId {
    pub fn new<S>(id: S) -> Self
    where
        S: Into<SmolStr>,
    {
        Self(id.into())
    }

    pub fn name(&self) -> &SmolStr {
        &self.0
    }
}

impl From<&str> for OrderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<i64> for OrderId {
    fn from(value: i64) -> Self {
        Self::new(value.to_string())
    }
}

/// Read-only snapshot of one broker order.
///
/// `order_type` is free-form broker text ("STP", "Stop", "LIMIT", ...); most fields are
/// optional because the two backends populate different subsets.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct Order {
    pub order_id: OrderId,
    pub account: AccountId,
    pub conid: Conid,
    pub ticker: Option<Ticker>,
    pub order_type: Option<SmolStr>,
    pub side: Option<Side>,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub quantity: Option<Decimal>,
    pub remaining_quantity: Option<Decimal>,
    pub status: Option<SmolStr>,
    /// Human-readable broker description, eg/ "SELL 100 AAPL Stop 120.50".
    pub description: Option<String>,
}

impl Order {
    /// An order is active unless its status marks it terminal.
    pub fn is_active(&self) -> bool {
        match &self.status {
            None => true,
            Some(status) => !INACTIVE_STATUSES
                .iter()
                .any(|inactive| status.eq_ignore_ascii_case(inactive)),
        }
    }

    /// Stop orders are matched on the broker's free-form type: exactly "STP"
    /// (case-insensitive) or any type containing "stop".
    pub fn is_stop(&self) -> bool {
        match &self.order_type {
            None => false,
            Some(order_type) => {
                order_type.eq_ignore_ascii_case("STP")
                    || order_type.to_lowercase().contains("stop")
            }
        }
    }

    /// Quantity still working at the broker, falling back to the order quantity.
    pub fn working_quantity(&self) -> Decimal {
        self.remaining_quantity
            .or(self.quantity)
            .unwrap_or(Decimal::ZERO)
            .abs()
    }

    /// Reconciliation key: stop orders group per `(conid, account)`.
    pub fn key(&self) -> (Conid, AccountId) {
        (self.conid, self.account.clone())
    }
}

/// Request to protect a position with a stop-loss order.
///
/// `quantity` is always positive; `is_long` selects the closing [`Side`].
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct StopLossOrderRequest {
    pub account: AccountId,
    pub conid: Conid,
    pub stop_price: Decimal,
    pub quantity: Decimal,
    pub is_long: bool,
}

impl StopLossOrderRequest {
    /// A stop protecting a long position sells; one protecting a short buys back.
    pub fn side(&self) -> Side {
        if self.is_long { Side::Sell } else { Side::Buy }
    }
}

/// Outcome of one placement attempt.
///
/// `success == false` carries a broker business rejection; transport failures are
/// raised as errors by the gateway instead.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct OrderResult {
    pub success: bool,
    pub order_id: Option<OrderId>,
    pub message: String,
}

impl OrderResult {
    pub fn ok<M>(order_id: OrderId, message: M) -> Self
    where
        M: Into<String>,
    {
        Self {
            success: true,
            order_id: Some(order_id),
            message: message.into(),
        }
    }

    pub fn rejected<M>(message: M) -> Self
    where
        M: Into<String>,
    {
        Self {
            success: false,
            order_id: None,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(order_type: Option<&str>, status: Option<&str>) -> Order {
        Order {
            order_id: OrderId::new("1"),
            account: AccountId::new("U1"),
            conid: Conid(265598),
            ticker: None,
            order_type: order_type.map(SmolStr::new),
            side: Some(Side::Sell),
            price: None,
            stop_price: Some(dec!(120)),
            quantity: Some(dec!(100)),
            remaining_quantity: None,
            status: status.map(SmolStr::new),
            description: None,
        }
    }

    #[test]
    fn test_is_active_ignores_status_case() {
        assert!(order(Some("STP"), None).is_active());
        assert!(order(Some("STP"), Some("Submitted")).is_active());
        assert!(!order(Some("STP"), Some("cancelled")).is_active());
        assert!(!order(Some("STP"), Some("Filled")).is_active());
        assert!(!order(Some("STP"), Some("ApiCancelled")).is_active());
    }

    #[test]
    fn test_is_stop_matches_broker_spellings() {
        assert!(order(Some("STP"), None).is_stop());
        assert!(order(Some("stp"), None).is_stop());
        assert!(order(Some("Stop"), None).is_stop());
        assert!(order(Some("Stop Limit"), None).is_stop());
        assert!(!order(Some("LMT"), None).is_stop());
        assert!(!order(None, None).is_stop());
    }

    #[test]
    fn test_working_quantity_prefers_remaining() {
        let mut order = order(Some("STP"), None);
        order.remaining_quantity = Some(dec!(-40));
        assert_eq!(order.working_quantity(), dec!(40));

        order.remaining_quantity = None;
        assert_eq!(order.working_quantity(), dec!(100));

        order.quantity = None;
        assert_eq!(order.working_quantity(), Decimal::ZERO);
    }

    #[test]
    fn test_stop_loss_request_side() {
        let long = StopLossOrderRequest::new(AccountId::new("U1"), Conid(1), dec!(90), dec!(10), true);
        let short = StopLossOrderRequest::new(AccountId::new("U1"), Conid(1), dec!(110), dec!(10), false);
        assert_eq!(long.side(), Side::Sell);
        assert_eq!(short.side(), Side::Buy);
    }
}
