use crate::{
    BrokerGateway, dedup_by_order_id,
    error::BrokerError,
    rest::{
        parser::GatewayParser,
        requests::{
            AuthStatusRequest, GetOrdersRequest, GetPositionsRequest, PlaceOrderReply,
            PlaceOrderRequest, ReplyConfirmRequest, SwitchAccountRequest, TickleRequest,
        },
    },
};
use std::{borrow::Cow, time::Duration};
use tokio::time::sleep;
use tracing::{debug, warn};
use vigil_instrument::{
    account::AccountId,
    order::{Order, OrderId, OrderResult, StopLossOrderRequest},
    position::Position,
    status::ConnectionStatus,
};
use vigil_integration::{
    error::SocketError,
    protocol::http::{client::RestClient, session::SessionCookie},
};

/// [`HttpParser`](vigil_integration::protocol::http::HttpParser) for the gateway.
pub mod parser;

/// Typed endpoint requests.
pub mod requests;

/// How long the gateway is given to settle an account switch before reads.
///
/// Empirical: the switch is acknowledged before it takes effect server-side, and no
/// smaller value has been observed to reliably avoid reads against the old account.
const DEFAULT_SWITCH_SETTLE: Duration = Duration::from_millis(200);

/// How long the gateway is given to rebuild its server-side orders cache after a
/// forced refresh. Empirical, same caveat as [`DEFAULT_SWITCH_SETTLE`].
const DEFAULT_REFRESH_SETTLE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct RestGatewayConfig {
    /// Base Url of the local gateway, eg/ `https://localhost:5000/v1/api`.
    pub base_url: String,

    /// Login session cookie to present on every request.
    pub session_cookie: Option<String>,

    /// Accounts this gateway serves.
    pub accounts: Vec<AccountId>,

    /// Settle time after an account switch.
    pub switch_settle: Duration,

    /// Settle time after a forced orders refresh.
    pub refresh_settle: Duration,
}

impl RestGatewayConfig {
    pub fn new(base_url: String, session_cookie: Option<String>, accounts: Vec<AccountId>) -> Self {
        Self {
            base_url,
            session_cookie,
            accounts,
            switch_settle: DEFAULT_SWITCH_SETTLE,
            refresh_settle: DEFAULT_REFRESH_SETTLE,
        }
    }
}

/// Broker gateway over the session-cookie REST API.
///
/// The API is stateful: account-scoped endpoints answer for the gateway-side "current"
/// account, and the orders list is served from a cache that refreshes asynchronously
/// after a forced read. Both quirks are absorbed here so callers see the
/// [`BrokerGateway`] contract.
#[derive(Debug)]
pub struct RestGateway {
    accounts: Vec<AccountId>,
    switch_settle: Duration,
    refresh_settle: Duration,
    rest_client: RestClient<'static, SessionCookie, GatewayParser>,
}

impl RestGateway {
    pub fn new(config: RestGatewayConfig) -> Result<Self, BrokerError> {
        let strategy = SessionCookie::new(config.session_cookie.as_deref())
            .map_err(BrokerError::from)?;

        // The gateway is a localhost proxy without real certificates, and it signals
        // an expired session with a redirect that must stay observable.
        let http_client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|error| BrokerError::Transport(error.to_string()))?;

        Ok(Self {
            accounts: config.accounts,
            switch_settle: config.switch_settle,
            refresh_settle: config.refresh_settle,
            rest_client: RestClient {
                http_client,
                base_url: Cow::Owned(config.base_url),
                strategy,
                parser: GatewayParser,
            },
        })
    }

    /// The mandated stale-proof orders read: switch, settle, force a refresh, settle,
    /// collect. Returns the rows reported for `account`.
    async fn read_orders(&self, account: &AccountId, refresh: bool) -> Result<Vec<Order>, BrokerError> {
        self.switch_account(account).await?;
        sleep(self.switch_settle).await;

        if refresh {
            let (_, _metric) = self
                .rest_client
                .execute(GetOrdersRequest::refresh())
                .await
                .map_err(BrokerError::from)?;
            sleep(self.refresh_settle).await;
        }

        let (response, _metric) = self
            .rest_client
            .execute(GetOrdersRequest::list())
            .await
            .map_err(BrokerError::from)?;

        Ok(response
            .orders
            .into_iter()
            .map(Order::from)
            .filter(|order| &order.account == account)
            .collect())
    }

    /// Answer the broker's risk-warning confirmation for a pending reply id.
    async fn confirm_reply(&self, reply_id: smol_str::SmolStr, messages: Vec<String>) -> Result<OrderResult, BrokerError> {
        debug!(%reply_id, ?messages, "confirming order risk warning");

        match self
            .rest_client
            .execute(ReplyConfirmRequest::confirmed(reply_id.clone()))
            .await
        {
            Ok((_, _metric)) => Ok(OrderResult::ok(
                OrderId::new(reply_id),
                messages.join("; "),
            )),
            Err(SocketError::HttpResponse(_, message)) => Ok(OrderResult::rejected(message)),
            Err(error) => Err(BrokerError::from(error)),
        }
    }
}

impl BrokerGateway for RestGateway {
    async fn connection_status(&self) -> ConnectionStatus {
        match self.rest_client.execute(AuthStatusRequest).await {
            Ok((response, _metric)) => ConnectionStatus::from(response),
            Err(error) => ConnectionStatus::unreachable(error.to_string()),
        }
    }

    async fn keep_alive(&self) -> bool {
        match self.rest_client.execute(TickleRequest).await {
            Ok((response, _metric)) => {
                debug!(session = %response.session, "tickle acknowledged");
                true
            }
            Err(error) => {
                warn!(%error, "tickle failed");
                false
            }
        }
    }

    fn configured_accounts(&self) -> &[AccountId] {
        &self.accounts
    }

    async fn switch_account(&self, account: &AccountId) -> Result<(), BrokerError> {
        let (response, _metric) = self
            .rest_client
            .execute(SwitchAccountRequest::for_account(account.clone()))
            .await
            .map_err(BrokerError::from)?;

        // set=false is what the gateway answers when the account was already current
        debug!(%account, set = response.set, "account switch acknowledged");
        Ok(())
    }

    async fn positions(&self, account: &AccountId) -> Result<Vec<Position>, BrokerError> {
        let (rows, _metric) = self
            .rest_client
            .execute(GetPositionsRequest::first_page(account.clone()))
            .await
            .map_err(BrokerError::from)?;

        Ok(rows
            .into_iter()
            .map(Position::from)
            .filter(|position| !position.is_flat())
            .collect())
    }

    async fn orders(&self, account: &AccountId) -> Result<Vec<Order>, BrokerError> {
        self.read_orders(account, false).await
    }

    async fn stop_orders(&self, account: &AccountId) -> Result<Vec<Order>, BrokerError> {
        Ok(self
            .read_orders(account, true)
            .await?
            .into_iter()
            .filter(|order| order.is_stop() && order.is_active())
            .collect())
    }

    async fn all_stop_orders(&self) -> Result<Vec<Order>, BrokerError> {
        let mut orders = Vec::new();
        for account in self.accounts.clone() {
            orders.extend(self.stop_orders(&account).await?);
        }
        Ok(dedup_by_order_id(orders))
    }

    async fn place_stop_loss_order(
        &self,
        request: StopLossOrderRequest,
    ) -> Result<OrderResult, BrokerError> {
        let replies = match self
            .rest_client
            .execute(PlaceOrderRequest::stop_loss(&request))
            .await
        {
            Ok((replies, _metric)) => replies,
            // The broker answers business rejections in-band, not as transport failures
            Err(SocketError::HttpResponse(_, message)) => {
                return Ok(OrderResult::rejected(message));
            }
            Err(error) => return Err(BrokerError::from(error)),
        };

        match replies.into_iter().next() {
            Some(PlaceOrderReply::Submitted { order_id, status }) => Ok(OrderResult::ok(
                OrderId::new(order_id),
                status.unwrap_or_else(|| "Submitted".into()),
            )),
            Some(PlaceOrderReply::Confirmation { id, message }) if !message.is_empty() => {
                self.confirm_reply(id, message).await
            }
            Some(PlaceOrderReply::Confirmation { id, .. }) => {
                Ok(OrderResult::ok(OrderId::new(id), "Submitted"))
            }
            None => Ok(OrderResult::rejected("broker returned no placement reply")),
        }
    }
}
