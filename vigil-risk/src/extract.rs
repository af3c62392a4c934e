use regex::Regex;
use rust_decimal::Decimal;
use std::{str::FromStr, sync::LazyLock};
use tracing::warn;
use vigil_instrument::order::Order;

/// First "Stop <number>" fragment in a broker order description, eg/
/// "Sell 100 AAPL Stop 1,250.50, GTC".
static STOP_DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)stop\s+([\d,]+\.?\d*)").expect("stop description pattern is valid"));

/// Extracts a numeric stop price from heterogeneous order records.
///
/// The broker backends disagree on where a stop order carries its trigger: some rows
/// have an explicit stop price, some reuse the price field, and some only spell it out
/// in the human-readable description.
#[derive(Debug, Copy, Clone, Default)]
pub struct StopPriceExtractor;

impl StopPriceExtractor {
    /// The order's effective stop price: explicit stop price, then price, then the
    /// description text. `None` if the order carries no recognisable trigger.
    pub fn extract(order: &Order) -> Option<Decimal> {
        if let Some(stop_price) = order.stop_price {
            return Some(stop_price);
        }

        if let Some(price) = order.price {
            return Some(price);
        }

        let description = order.description.as_deref()?;
        Self::parse_description(description)
    }

    fn parse_description(description: &str) -> Option<Decimal> {
        let Some(captures) = STOP_DESCRIPTION.captures(description) else {
            warn!(description, "no stop price found in order description");
            return None;
        };

        let raw = captures[1].replace(',', "");
        match Decimal::from_str(&raw) {
            Ok(price) => Some(price),
            Err(error) => {
                warn!(description, %error, "unparseable stop price in order description");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use vigil_instrument::{Conid, account::AccountId, order::OrderId};

    fn order(
        stop_price: Option<Decimal>,
        price: Option<Decimal>,
        description: Option<&str>,
    ) -> Order {
        Order {
            order_id: OrderId::new("1"),
            account: AccountId::new("U1"),
            conid: Conid(1),
            ticker: None,
            order_type: Some("STP".into()),
            side: None,
            price,
            stop_price,
            quantity: Some(dec!(100)),
            remaining_quantity: None,
            status: None,
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn test_extract_prefers_stop_price() {
        let order = order(Some(dec!(120)), Some(dec!(119)), Some("Stop 118"));
        assert_eq!(StopPriceExtractor::extract(&order), Some(dec!(120)));
    }

    #[test]
    fn test_extract_falls_back_to_price() {
        let order = order(None, Some(dec!(119)), Some("Stop 118"));
        assert_eq!(StopPriceExtractor::extract(&order), Some(dec!(119)));
    }

    #[test]
    fn test_extract_parses_description() {
        let order = order(None, None, Some("Sell 100 AAPL Stop 1,250.50, GTC"));
        assert_eq!(StopPriceExtractor::extract(&order), Some(dec!(1250.50)));
    }

    #[test]
    fn test_extract_is_case_insensitive() {
        let order = order(None, None, Some("sell 10 msft STOP 41.2"));
        assert_eq!(StopPriceExtractor::extract(&order), Some(dec!(41.2)));
    }

    #[test]
    fn test_extract_none_when_description_has_no_stop() {
        let order = order(None, None, Some("Sell 100 AAPL Limit 150.00"));
        assert_eq!(StopPriceExtractor::extract(&order), None);
    }

    #[test]
    fn test_extract_none_when_nothing_present() {
        let order = order(None, None, None);
        assert_eq!(StopPriceExtractor::extract(&order), None);
    }
}
