//! Core Vigil data structures shared by the broker gateways and the risk engine.
//!
//! Defines the identifier newtypes ([`Conid`], [`Ticker`], [`Currency`]), the account
//! snapshot types ([`Position`](position::Position), [`Order`](order::Order)) and the
//! order-placement types exchanged with a broker backend.

use derive_more::{Constructor, Display};
use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, StrExt};
use std::borrow::Borrow;

/// Account identifier and configured-account helpers.
pub mod account;

/// Broker order snapshot, stop-loss placement request and placement result types.
pub mod order;

/// Broker position snapshot type.
pub mod position;

/// Broker connection status report.
pub mod status;

/// Broker-internal integer contract identifier, unique per instrument.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Constructor,
)]
pub struct Conid(pub i64);

impl std::fmt::Display for Conid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exchange ticker symbol for an instrument, eg/ "AAPL".
///
/// Not unique across brokers; [`Conid`] is the authoritative instrument key.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
pub struct Ticker(SmolStr);

impl Ticker {
    pub fn new<S>(ticker: S) -> Self
    where
        S: Into<SmolStr>,
    {
        Self(ticker.into())
    }

    pub fn name(&self) -> &SmolStr {
        &self.0
    }

    /// Case-insensitive symbol comparison, eg/ "aapl" matches "AAPL".
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl From<&str> for Ticker {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Ticker {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Borrow<str> for Ticker {
    fn borrow(&self) -> &str {
        self.0.borrow()
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// Uppercase ISO-4217 currency code, eg/ "EUR".
///
/// Constructed uppercase so equality is effectively case-insensitive regardless of how
/// the broker or FX source spells the code.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Display)]
pub struct Currency(SmolStr);

impl Currency {
    pub fn new<S>(code: S) -> Self
    where
        S: Into<SmolStr>,
    {
        let code = code.into();
        if code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
            Self(code)
        } else {
            Self(code.to_uppercase_smolstr())
        }
    }

    pub fn code(&self) -> &SmolStr {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        SmolStr::deserialize(deserializer).map(Currency::new)
    }
}

impl From<&str> for Currency {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Currency {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Borrow<str> for Currency {
    fn borrow(&self) -> &str {
        self.0.borrow()
    }
}

impl AsRef<str> for Currency {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// [`Side`] of an order - Buy or Sell.
///
/// Serialises in the broker's spelling ("BUY"/"SELL"); deserialises every spelling the
/// backends emit.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum Side {
    #[serde(rename = "BUY", alias = "Buy", alias = "buy", alias = "b")]
    Buy,
    #[serde(rename = "SELL", alias = "Sell", alias = "sell", alias = "s")]
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Side::Buy => "BUY",
                Side::Sell => "SELL",
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_normalises_case() {
        assert_eq!(Currency::new("usd"), Currency::new("USD"));
        assert_eq!(Currency::new("Usd").code(), "USD");
    }

    #[test]
    fn test_ticker_matches_ignores_case() {
        assert!(Ticker::new("AAPL").matches("aapl"));
        assert!(!Ticker::new("AAPL").matches("MSFT"));
    }

    #[test]
    fn test_side_deserialises_broker_spelling() {
        assert_eq!(serde_json::from_str::<Side>(r#""SELL""#).unwrap(), Side::Sell);
        assert_eq!(serde_json::from_str::<Side>(r#""buy""#).unwrap(), Side::Buy);
    }
}
