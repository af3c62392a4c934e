//! Deterministic worst-case risk engine for Vigil.
//!
//! Consumes position and stop-order snapshots fetched by a broker gateway and answers:
//! if every protective stop triggered right now, what profit is already locked in, and
//! how much still rides on the market? Positions without a stop are priced as if exited
//! at a configured loss percentage from entry.
//!
//! All monetary math is exact fixed-point: currency amounts round to 2 decimals
//! half-up, rates and percentages to 4, FX inversions to 10.

use rust_decimal::{Decimal, RoundingStrategy};

/// The risk calculation: reconciliation, per-position P&L branches, aggregation.
pub mod engine;

/// Stop price extraction from heterogeneous order records.
pub mod extract;

/// Cached currency conversion into the configured base currency.
pub mod fx;

/// Report output types.
pub mod report;

/// Round a currency amount to 2 decimals, half-up.
pub(crate) fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
