use crate::{
    extract::StopPriceExtractor,
    fx::FxCache,
    report::{PositionRisk, RiskReport},
    round_money,
};
use rust_decimal::{Decimal, RoundingStrategy};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tracing::debug;
use vigil_instrument::{Conid, Currency, Ticker, account::AccountId, order::Order, position::Position};

type PositionKey = (Conid, AccountId);

/// The configured loss percentage as a fraction, 4 digits half-up.
pub fn loss_fraction(percentage: Decimal) -> Decimal {
    (percentage / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

/// Stop price quoted a loss fraction away from the market price, rounded in the
/// broker's favour: down for longs, up for shorts, 2 decimals.
pub fn quote_stop_price(market_price: Decimal, loss_fraction: Decimal, is_long: bool) -> Decimal {
    if is_long {
        (market_price * (Decimal::ONE - loss_fraction))
            .round_dp_with_strategy(2, RoundingStrategy::ToNegativeInfinity)
    } else {
        (market_price * (Decimal::ONE + loss_fraction))
            .round_dp_with_strategy(2, RoundingStrategy::ToPositiveInfinity)
    }
}

/// Pure reconciliation of position and stop-order snapshots into a [`RiskReport`].
///
/// No broker I/O: failures fetching the inputs abort upstream, and the only
/// collaborator is the FX cache (which never fails, degrading to 1:1).
#[derive(Debug)]
pub struct RiskEngine {
    base_currency: Currency,
    unprotected_loss_percentage: Decimal,
    fx: Arc<FxCache>,
}

impl RiskEngine {
    pub fn new(base_currency: Currency, unprotected_loss_percentage: Decimal, fx: Arc<FxCache>) -> Self {
        Self {
            base_currency,
            unprotected_loss_percentage,
            fx,
        }
    }

    pub fn unprotected_loss_percentage(&self) -> Decimal {
        self.unprotected_loss_percentage
    }

    /// Build the worst-case report.
    ///
    /// Positions protected by at least one active stop with a recognisable trigger are
    /// priced at their quantity-weighted average stop; the rest are priced as if
    /// exited at the configured loss percentage from entry.
    pub async fn calculate(&self, positions: Vec<Position>, stop_orders: Vec<Order>) -> RiskReport {
        let (index, ordered_keys) = build_position_index(positions);

        let mut protected: HashSet<PositionKey> = HashSet::new();
        let mut rows: Vec<PositionRisk> = Vec::with_capacity(ordered_keys.len());

        for (key, orders) in group_stop_orders(stop_orders) {
            let Some(aggregate) = StopAggregate::of(&orders) else {
                continue;
            };

            protected.insert(key.clone());

            let Some(position) = index.get(&key) else {
                debug!(conid = %key.0, account = %key.1, "active stop without a matching position");
                continue;
            };

            let ticker = aggregate.ticker.clone().or_else(|| position.ticker.clone());
            rows.push(
                self.position_risk(
                    position,
                    aggregate.avg_stop_price,
                    aggregate.total_quantity,
                    true,
                    ticker,
                )
                .await,
            );
        }

        let m = loss_fraction(self.unprotected_loss_percentage);
        for key in &ordered_keys {
            if protected.contains(key) {
                continue;
            }

            let position = &index[key];
            if position.is_flat() {
                continue;
            }

            let assumed_stop = if position.is_long() {
                position.avg_price * (Decimal::ONE - m)
            } else {
                position.avg_price * (Decimal::ONE + m)
            };

            rows.push(
                self.position_risk(
                    position,
                    assumed_stop,
                    position.quantity.abs(),
                    false,
                    position.ticker.clone(),
                )
                .await,
            );
        }

        self.finalise(rows)
    }

    /// Per-position math. Every multiplication uses the absolute quantity; the signed
    /// size is preserved in the output row.
    async fn position_risk(
        &self,
        position: &Position,
        stop_price: Decimal,
        order_quantity: Decimal,
        has_stop_loss: bool,
        ticker: Option<Ticker>,
    ) -> PositionRisk {
        let avg = position.avg_price;
        let current = position.market_price;

        let (locked_per_share, at_risk_per_share) = if position.is_long() {
            let locked = stop_price - avg;
            let at_risk = if current > avg {
                current - stop_price
            } else {
                -(current - stop_price)
            };
            (locked, at_risk)
        } else {
            let locked = avg - stop_price;
            let at_risk = if current < avg {
                stop_price - current
            } else {
                -(stop_price - current)
            };
            (locked, at_risk)
        };

        let locked_profit = round_money(locked_per_share * order_quantity);
        let at_risk_profit = round_money(at_risk_per_share * order_quantity);
        let position_value = round_money(position.quantity.abs() * position.market_price);

        let currency = position.currency.as_ref();
        PositionRisk {
            account_id: position.account.clone(),
            ticker,
            position_size: position.quantity,
            avg_price: avg,
            current_price: current,
            stop_price,
            order_quantity,
            locked_profit,
            at_risk_profit,
            position_value,
            currency: position.currency.clone(),
            locked_profit_base: self.fx.convert_to_base(locked_profit, currency).await,
            at_risk_profit_base: self.fx.convert_to_base(at_risk_profit, currency).await,
            position_value_base: self.fx.convert_to_base(position_value, currency).await,
            base_currency: self.base_currency.clone(),
            has_stop_loss,
            portfolio_percentage: Decimal::ZERO,
        }
    }

    fn finalise(&self, mut rows: Vec<PositionRisk>) -> RiskReport {
        let total_position_value: Decimal = rows.iter().map(|row| row.position_value_base).sum();

        let worst_case_with: Decimal = rows
            .iter()
            .filter(|row| row.has_stop_loss)
            .map(|row| row.locked_profit_base)
            .sum();
        let worst_case_without: Decimal = rows
            .iter()
            .filter(|row| !row.has_stop_loss)
            .map(|row| row.locked_profit_base)
            .sum();
        let total_at_risk: Decimal = rows.iter().map(|row| row.at_risk_profit_base).sum();

        if !total_position_value.is_zero() {
            for row in &mut rows {
                row.portfolio_percentage = round_money(
                    row.position_value_base * Decimal::ONE_HUNDRED / total_position_value,
                );
            }
        }

        rows.sort_by(|a, b| b.locked_profit.cmp(&a.locked_profit));

        RiskReport {
            total_position_value,
            worst_case_profit: worst_case_with + worst_case_without,
            worst_case_profit_with_stop_loss: worst_case_with,
            worst_case_profit_without_stop_loss: worst_case_without,
            total_at_risk_profit: total_at_risk,
            currency: self.base_currency.clone(),
            unprotected_loss_percentage_used: self.unprotected_loss_percentage,
            position_risks: rows,
        }
    }
}

/// First-wins merge of duplicate `(conid, account)` rows, preserving input order.
fn build_position_index(
    positions: Vec<Position>,
) -> (HashMap<PositionKey, Position>, Vec<PositionKey>) {
    let mut index = HashMap::with_capacity(positions.len());
    let mut ordered_keys = Vec::with_capacity(positions.len());

    for position in positions {
        let key = position.key();
        if index.contains_key(&key) {
            debug!(conid = %key.0, account = %key.1, "duplicate position merged first-wins");
            continue;
        }
        ordered_keys.push(key.clone());
        index.insert(key, position);
    }

    (index, ordered_keys)
}

/// Group stop orders by `(conid, account)` preserving first-seen group order.
fn group_stop_orders(stop_orders: Vec<Order>) -> Vec<(PositionKey, Vec<Order>)> {
    let mut groups: Vec<(PositionKey, Vec<Order>)> = Vec::new();
    let mut group_index: HashMap<PositionKey, usize> = HashMap::new();

    for order in stop_orders {
        let key = order.key();
        match group_index.get(&key) {
            Some(&at) => groups[at].1.push(order),
            None => {
                group_index.insert(key.clone(), groups.len());
                groups.push((key, vec![order]));
            }
        }
    }

    groups
}

/// Quantity-weighted aggregate of one stop-order group, so the report is invariant to
/// how the broker split the intended stop across child orders.
struct StopAggregate {
    avg_stop_price: Decimal,
    total_quantity: Decimal,
    ticker: Option<Ticker>,
}

impl StopAggregate {
    /// `None` when no order carries a recognisable trigger, or the group's working
    /// quantity sums to zero - either way the position stays unprotected.
    fn of(orders: &[Order]) -> Option<Self> {
        let mut total_quantity = Decimal::ZERO;
        let mut weighted_sum = Decimal::ZERO;
        let mut priced_any = false;

        for order in orders {
            let Some(stop_price) = StopPriceExtractor::extract(order) else {
                continue;
            };
            priced_any = true;

            let quantity = order.working_quantity();
            total_quantity += quantity;
            weighted_sum += stop_price * quantity;
        }

        if !priced_any || total_quantity.is_zero() {
            return None;
        }

        Some(Self {
            avg_stop_price: round_money(weighted_sum / total_quantity),
            total_quantity,
            ticker: orders.iter().find_map(|order| order.ticker.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use vigil_instrument::order::OrderId;

    fn stop_order(order_id: &str, conid: i64, stop_price: Decimal, quantity: Decimal) -> Order {
        Order {
            order_id: OrderId::new(order_id),
            account: AccountId::new("U1"),
            conid: Conid(conid),
            ticker: Some(Ticker::new("AAPL")),
            order_type: Some("STP".into()),
            side: None,
            price: None,
            stop_price: Some(stop_price),
            quantity: Some(quantity),
            remaining_quantity: None,
            status: None,
            description: None,
        }
    }

    #[test]
    fn test_loss_fraction_rounds_to_four_digits() {
        assert_eq!(loss_fraction(dec!(50)), dec!(0.5));
        assert_eq!(loss_fraction(dec!(33.335)), dec!(0.3334));
        assert_eq!(loss_fraction(dec!(12.3449)), dec!(0.1234));
    }

    #[test]
    fn test_quote_stop_price_rounds_directionally() {
        // long: 150.2549 * 0.8 = 120.20392 -> down
        assert_eq!(quote_stop_price(dec!(150.2549), dec!(0.2), true), dec!(120.20));
        // short: 150.2549 * 1.2 = 180.30588 -> up
        assert_eq!(quote_stop_price(dec!(150.2549), dec!(0.2), false), dec!(180.31));
    }

    #[test]
    fn test_weighted_average_stop() {
        let orders = vec![
            stop_order("1", 1, dec!(110), dec!(50)),
            stop_order("2", 1, dec!(120), dec!(150)),
        ];

        let aggregate = StopAggregate::of(&orders).unwrap();
        assert_eq!(aggregate.avg_stop_price, dec!(117.50));
        assert_eq!(aggregate.total_quantity, dec!(200));
    }

    #[test]
    fn test_zero_quantity_group_is_not_protected() {
        let orders = vec![stop_order("1", 1, dec!(110), dec!(0))];
        assert!(StopAggregate::of(&orders).is_none());
    }

    #[test]
    fn test_unpriced_group_is_not_protected() {
        let mut order = stop_order("1", 1, dec!(0), dec!(100));
        order.stop_price = None;
        assert!(StopAggregate::of(&[order]).is_none());
    }

    #[test]
    fn test_position_index_merges_first_wins() {
        let first = Position::new(
            AccountId::new("U1"),
            Conid(1),
            Some(Ticker::new("AAPL")),
            dec!(100),
            dec!(100),
            dec!(150),
            Some(Currency::new("USD")),
        );
        let mut duplicate = first.clone();
        duplicate.quantity = dec!(999);

        let (index, ordered_keys) = build_position_index(vec![first.clone(), duplicate]);
        assert_eq!(ordered_keys.len(), 1);
        assert_eq!(index[&ordered_keys[0]].quantity, dec!(100));
    }

    #[test]
    fn test_group_stop_orders_preserves_first_seen_order() {
        let orders = vec![
            stop_order("1", 2, dec!(110), dec!(50)),
            stop_order("2", 1, dec!(100), dec!(50)),
            stop_order("3", 2, dec!(120), dec!(50)),
        ];

        let groups = group_stop_orders(orders);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0.0, Conid(2));
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0.0, Conid(1));
    }
}
