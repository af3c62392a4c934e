use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vigil_instrument::{Currency, Ticker, account::AccountId};

/// One output row per reconciled position.
///
/// `order_quantity` is the summed stop quantity for protected rows (which may
/// legitimately exceed the position size when the broker split the stop across child
/// orders) and the absolute position size for unprotected rows.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRisk {
    pub account_id: AccountId,
    pub ticker: Option<Ticker>,

    /// Signed position size: positive long, negative short.
    pub position_size: Decimal,
    pub avg_price: Decimal,
    pub current_price: Decimal,

    /// Actual weighted-average stop for protected rows, assumed stop otherwise.
    pub stop_price: Decimal,
    pub order_quantity: Decimal,

    /// Realised P&L if the stop triggers at its current price, native currency.
    pub locked_profit: Decimal,

    /// In-profit rows: unrealised gain above the stop a tighter stop could capture.
    /// Underwater rows: remaining loss exposure before the stop triggers, negative.
    pub at_risk_profit: Decimal,
    pub position_value: Decimal,
    pub currency: Option<Currency>,

    pub locked_profit_base: Decimal,
    pub at_risk_profit_base: Decimal,
    pub position_value_base: Decimal,
    pub base_currency: Currency,

    /// True iff the stop is an actual active broker order.
    pub has_stop_loss: bool,

    /// Share of the portfolio's base-currency value, 0-100.
    pub portfolio_percentage: Decimal,
}

/// Portfolio worst-case report, rows sorted by locked profit descending.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskReport {
    pub total_position_value: Decimal,

    /// Sum of all locked profit in base currency: the P&L realised if every stop
    /// (actual and assumed) triggered right now.
    pub worst_case_profit: Decimal,
    pub worst_case_profit_with_stop_loss: Decimal,
    pub worst_case_profit_without_stop_loss: Decimal,
    pub total_at_risk_profit: Decimal,

    /// Base currency every `*_base` figure is denominated in.
    pub currency: Currency,
    pub unprotected_loss_percentage_used: Decimal,
    pub position_risks: Vec<PositionRisk>,
}
