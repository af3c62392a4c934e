use crate::{Conid, Currency, Ticker, account::AccountId};
use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Read-only snapshot of one broker position.
///
/// `quantity` is signed: positive is long, negative is short, zero is closed. Gateways
/// exclude closed rows from their position fetches, so a zero quantity only appears in
/// hand-built inputs.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Position {
    pub account: AccountId,
    pub conid: Conid,
    pub ticker: Option<Ticker>,
    pub quantity: Decimal,
    pub avg_price: Decimal,
    pub market_price: Decimal,
    pub currency: Option<Currency>,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    pub fn is_long(&self) -> bool {
        self.quantity.is_sign_positive() && !self.quantity.is_zero()
    }

    /// Reconciliation key: a position is unique per `(conid, account)`.
    pub fn key(&self) -> (Conid, AccountId) {
        (self.conid, self.account.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(quantity: Decimal) -> Position {
        Position::new(
            AccountId::new("U1"),
            Conid(265598),
            Some(Ticker::new("AAPL")),
            quantity,
            dec!(100),
            dec!(110),
            Some(Currency::new("USD")),
        )
    }

    #[test]
    fn test_position_signedness() {
        assert!(position(dec!(100)).is_long());
        assert!(!position(dec!(-100)).is_long());
        assert!(position(dec!(0)).is_flat());
    }
}
