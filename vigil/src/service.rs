use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};
use vigil_broker::{BrokerGateway, dedup_by_order_id, error::BrokerError};
use vigil_instrument::{
    Conid, Ticker,
    account::AccountId,
    order::{OrderResult, StopLossOrderRequest},
    position::Position,
};
use vigil_risk::{
    engine::{RiskEngine, loss_fraction, quote_stop_price},
    extract::StopPriceExtractor,
    report::{PositionRisk, RiskReport},
};

/// Outcome of one stop-loss creation attempt.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopLossResult {
    pub account_id: AccountId,
    pub conid: Conid,
    pub ticker: Option<Ticker>,

    /// The quoted (or already existing) stop price, when one was determined.
    pub stop_price: Option<Decimal>,
    pub outcome: OrderResult,
}

/// Application façade: the operations the external API layer publishes, expressed
/// over one [`BrokerGateway`] and the [`RiskEngine`].
#[derive(Debug)]
pub struct RiskService<Gateway> {
    gateway: Gateway,
    engine: RiskEngine,
}

impl<Gateway> RiskService<Gateway>
where
    Gateway: BrokerGateway,
{
    pub fn new(gateway: Gateway, engine: RiskEngine) -> Self {
        Self { gateway, engine }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Worst-case report across every configured account.
    pub async fn calculate_worst_case(&self) -> Result<RiskReport, BrokerError> {
        let positions = self.gateway.all_positions().await?;
        let stop_orders = self.gateway.all_stop_orders().await?;
        Ok(self.engine.calculate(positions, stop_orders).await)
    }

    /// Worst-case report restricted to the given accounts.
    pub async fn calculate_worst_case_for_accounts(
        &self,
        accounts: &[AccountId],
    ) -> Result<RiskReport, BrokerError> {
        let mut positions = Vec::new();
        let mut stop_orders = Vec::new();
        for account in accounts {
            positions.extend(self.gateway.positions(account).await?);
            stop_orders.extend(self.gateway.stop_orders(account).await?);
        }

        Ok(self
            .engine
            .calculate(positions, dedup_by_order_id(stop_orders))
            .await)
    }

    /// Only the rows riding without an actual protective stop.
    pub async fn unprotected_positions(&self) -> Result<Vec<PositionRisk>, BrokerError> {
        Ok(self
            .calculate_worst_case()
            .await?
            .position_risks
            .into_iter()
            .filter(|row| !row.has_stop_loss)
            .collect())
    }

    /// Place a stop for every position in `account` that has none, at
    /// `loss_percentage` below (long) or above (short) the current market price.
    pub async fn create_missing_stop_losses(
        &self,
        account: &AccountId,
        loss_percentage: Option<Decimal>,
    ) -> Result<Vec<StopLossResult>, BrokerError> {
        self.warn_if_competing().await;

        let percentage = loss_percentage.unwrap_or(self.engine.unprotected_loss_percentage());
        let m = loss_fraction(percentage);

        let positions = self.gateway.positions(account).await?;
        let stop_orders = self.gateway.stop_orders(account).await?;
        let protected: HashSet<Conid> = stop_orders.iter().map(|order| order.conid).collect();

        let mut results = Vec::new();
        for position in positions {
            if protected.contains(&position.conid) || position.is_flat() {
                continue;
            }

            results.push(self.place_protective_stop(position, m).await?);
        }

        info!(
            %account,
            created = results.iter().filter(|result| result.outcome.success).count(),
            attempted = results.len(),
            "missing stop losses processed"
        );
        Ok(results)
    }

    /// Place a stop for one position identified by contract id.
    pub async fn create_stop_loss_for_position(
        &self,
        account: &AccountId,
        conid: Conid,
        loss_percentage: Option<Decimal>,
    ) -> Result<StopLossResult, BrokerError> {
        let position = self
            .gateway
            .positions(account)
            .await?
            .into_iter()
            .find(|position| position.conid == conid)
            .ok_or_else(|| {
                BrokerError::BadRequest(format!("no position for conid {conid} in account {account}"))
            })?;

        self.create_stop_loss(position, loss_percentage).await
    }

    /// Place a stop for one position identified by ticker symbol.
    pub async fn create_stop_loss_for_position_by_ticker(
        &self,
        account: &AccountId,
        ticker: &str,
        loss_percentage: Option<Decimal>,
    ) -> Result<StopLossResult, BrokerError> {
        let position = self
            .gateway
            .positions(account)
            .await?
            .into_iter()
            .find(|position| {
                position
                    .ticker
                    .as_ref()
                    .is_some_and(|symbol| symbol.matches(ticker))
            })
            .ok_or_else(|| {
                BrokerError::BadRequest(format!("no position for ticker {ticker} in account {account}"))
            })?;

        self.create_stop_loss(position, loss_percentage).await
    }

    async fn create_stop_loss(
        &self,
        position: Position,
        loss_percentage: Option<Decimal>,
    ) -> Result<StopLossResult, BrokerError> {
        if position.quantity.is_zero() {
            return Ok(StopLossResult {
                account_id: position.account,
                conid: position.conid,
                ticker: position.ticker,
                stop_price: None,
                outcome: OrderResult::rejected("Position size is zero"),
            });
        }

        let existing = self
            .gateway
            .stop_orders_for_conid(&position.account, position.conid)
            .await?;
        if !existing.is_empty() {
            let existing_price = existing.iter().find_map(StopPriceExtractor::extract);
            let message = match existing_price {
                Some(price) => format!("Stop loss already exists at price {price}"),
                None => "Stop loss already exists".to_string(),
            };
            return Ok(StopLossResult {
                account_id: position.account,
                conid: position.conid,
                ticker: position.ticker,
                stop_price: existing_price,
                outcome: OrderResult::rejected(message),
            });
        }

        self.warn_if_competing().await;

        let percentage = loss_percentage.unwrap_or(self.engine.unprotected_loss_percentage());
        self.place_protective_stop(position, loss_fraction(percentage))
            .await
    }

    async fn place_protective_stop(
        &self,
        position: Position,
        loss_fraction: Decimal,
    ) -> Result<StopLossResult, BrokerError> {
        let stop_price = quote_stop_price(position.market_price, loss_fraction, position.is_long());
        let request = StopLossOrderRequest::new(
            position.account.clone(),
            position.conid,
            stop_price,
            position.quantity.abs(),
            position.is_long(),
        );

        let outcome = self.gateway.place_stop_loss_order(request).await?;
        info!(
            account = %position.account,
            conid = %position.conid,
            %stop_price,
            success = outcome.success,
            "protective stop placement attempted"
        );

        Ok(StopLossResult {
            account_id: position.account,
            conid: position.conid,
            ticker: position.ticker,
            stop_price: Some(stop_price),
            outcome,
        })
    }

    /// The competing flag is informational: placements proceed, but the operator
    /// should know another session may interfere.
    async fn warn_if_competing(&self) {
        let status = self.gateway.connection_status().await;
        if status.competing {
            warn!("another broker session is competing for this user; placements may misbehave");
        }
    }
}
