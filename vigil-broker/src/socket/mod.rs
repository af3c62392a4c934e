use crate::{
    BrokerGateway, dedup_by_order_id,
    error::BrokerError,
    socket::{
        registry::{SessionState, TwsShared, dispatch},
        transport::{TwsRequest, TwsTransport, TwsWriter},
    },
};
use futures::future::join_all;
use rust_decimal::Decimal;
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::{debug, warn};
use vigil_instrument::{
    account::AccountId,
    order::{Order, OrderId, OrderResult, StopLossOrderRequest},
    position::Position,
    status::ConnectionStatus,
};

/// Callback registry, shared session state and the reader loop.
mod registry;

/// Typed request/event enums and the wire-codec boundary trait.
pub mod transport;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_POSITIONS_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_ORDERS_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MARKET_DATA_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_PLACE_ORDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Delayed market data: the free tier, 15-minute-delayed quotes.
const MARKET_DATA_TYPE_DELAYED: i32 = 3;

#[derive(Debug, Clone)]
pub struct TwsGatewayConfig {
    pub host: String,
    pub port: u16,
    pub client_id: i32,

    /// Accounts this gateway serves; socket fetches span the whole session and are
    /// filtered down to these.
    pub accounts: Vec<AccountId>,

    pub connect_timeout: Duration,
    pub positions_timeout: Duration,
    pub orders_timeout: Duration,
    pub market_data_timeout: Duration,
    pub place_order_timeout: Duration,
}

impl TwsGatewayConfig {
    pub fn new(accounts: Vec<AccountId>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4001,
            client_id: 1,
            accounts,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            positions_timeout: DEFAULT_POSITIONS_TIMEOUT,
            orders_timeout: DEFAULT_ORDERS_TIMEOUT,
            market_data_timeout: DEFAULT_MARKET_DATA_TIMEOUT,
            place_order_timeout: DEFAULT_PLACE_ORDER_TIMEOUT,
        }
    }
}

/// Broker gateway over the asynchronous trading socket.
///
/// The socket protocol is stream-oriented: requests and callbacks correlate by
/// caller-assigned ids where they correlate at all, batches end with terminal
/// markers, and nothing is ordered beyond message arrival. This gateway bridges that
/// to the synchronous [`BrokerGateway`] contract with futures registered in a
/// callback table that a background reader resolves.
///
/// Positions and open orders have no correlation id, so at most one fetch per kind
/// may be outstanding; a mutex around the whole send-register-await cycle enforces
/// that. Reconnection is opportunistic: every operation re-runs the handshake if the
/// session dropped.
pub struct TwsGateway<Transport>
where
    Transport: TwsTransport,
{
    transport: Transport,
    config: TwsGatewayConfig,
    shared: Arc<TwsShared>,
    writer: tokio::sync::Mutex<Option<Transport::Writer>>,
    connect_lock: tokio::sync::Mutex<()>,
    positions_fetch: tokio::sync::Mutex<()>,
    orders_fetch: tokio::sync::Mutex<()>,
}

impl<Transport> TwsGateway<Transport>
where
    Transport: TwsTransport + Sync,
    Transport::Writer: Send,
{
    pub fn new(transport: Transport, config: TwsGatewayConfig) -> Self {
        Self {
            transport,
            config,
            shared: Arc::new(TwsShared::default()),
            writer: tokio::sync::Mutex::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
            positions_fetch: tokio::sync::Mutex::new(()),
            orders_fetch: tokio::sync::Mutex::new(()),
        }
    }

    /// The wire codec this gateway drives. Exposed for inspection, mainly by tests.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    async fn send(&self, request: TwsRequest) -> Result<(), BrokerError> {
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(writer) => writer.send(request).await,
            None => Err(BrokerError::NotConnected(
                "socket writer not initialised".to_string(),
            )),
        }
    }

    /// Lazy reconnect: a no-op while the session is `Ready`, otherwise the full
    /// handshake (connect, await connectAck, startAPI).
    async fn ensure_connected(&self) -> Result<(), BrokerError> {
        if self.shared.state() == SessionState::Ready {
            return Ok(());
        }

        let _guard = self.connect_lock.lock().await;
        if self.shared.state() == SessionState::Ready {
            return Ok(());
        }

        self.shared.set_state(SessionState::Handshaking);
        let ack = self.shared.register_connect_ack();

        let (writer, events) = match self
            .transport
            .connect(&self.config.host, self.config.port, self.config.client_id)
            .await
        {
            Ok(connection) => connection,
            Err(error) => {
                self.shared.set_state(SessionState::Disconnected);
                return Err(error);
            }
        };

        let epoch = self.shared.next_epoch();
        *self.writer.lock().await = Some(writer);
        tokio::spawn(dispatch(events, Arc::clone(&self.shared), epoch));

        match timeout(self.config.connect_timeout, ack).await {
            Ok(Ok(())) => {
                self.send(TwsRequest::StartApi {
                    client_id: self.config.client_id,
                })
                .await?;
                self.shared.set_state(SessionState::Ready);
                debug!(host = %self.config.host, port = self.config.port, "socket session ready");
                Ok(())
            }
            Ok(Err(_)) => {
                self.shared.set_state(SessionState::Disconnected);
                Err(BrokerError::NotConnected(
                    "connection closed during handshake".to_string(),
                ))
            }
            Err(_) => {
                self.shared.set_state(SessionState::Disconnected);
                Err(BrokerError::Timeout(format!(
                    "no connectAck within {:?}",
                    self.config.connect_timeout
                )))
            }
        }
    }

    /// Fetch the full positions batch and enrich each row with a snapshot quote.
    async fn fetch_positions(&self) -> Result<Vec<Position>, BrokerError> {
        self.ensure_connected().await?;
        let _guard = self.positions_fetch.lock().await;

        let rx = self.shared.registry.register_positions();
        self.send(TwsRequest::ReqPositions).await?;

        let rows = match timeout(self.config.positions_timeout, rx).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(_)) => {
                return Err(BrokerError::NotConnected(
                    "connection closed awaiting positions".to_string(),
                ));
            }
            Err(_) => {
                self.shared.registry.abort_positions();
                return Err(BrokerError::Timeout(format!(
                    "no positionEnd within {:?}",
                    self.config.positions_timeout
                )));
            }
        };

        let rows: Vec<Position> = rows.into_iter().filter(|row| !row.is_flat()).collect();
        self.enrich_market_prices(rows).await
    }

    /// The position callback carries avgCost but no market price, so each non-flat
    /// row costs one snapshot market-data request. Snapshot mode means the broker
    /// auto-cancels the subscription; a timed-out quote degrades to zero.
    async fn enrich_market_prices(
        &self,
        mut positions: Vec<Position>,
    ) -> Result<Vec<Position>, BrokerError> {
        if positions.is_empty() {
            return Ok(positions);
        }

        self.send(TwsRequest::ReqMarketDataType {
            market_data_type: MARKET_DATA_TYPE_DELAYED,
        })
        .await?;

        let mut pending = Vec::with_capacity(positions.len());
        for position in &positions {
            let req_id = self.shared.next_request_id();
            let rx = self.shared.registry.register_market_data(req_id, position.conid);
            self.send(TwsRequest::ReqMktData {
                req_id,
                conid: position.conid,
                exchange: "SMART".into(),
                snapshot: true,
            })
            .await?;
            pending.push((req_id, position.conid, rx));
        }

        let shared = &self.shared;
        let market_data_timeout = self.config.market_data_timeout;
        let prices = join_all(pending.into_iter().map(|(req_id, conid, rx)| async move {
            match timeout(market_data_timeout, rx).await {
                Ok(Ok(price)) => Ok(price),
                Ok(Err(_)) => Err(BrokerError::NotConnected(
                    "connection closed awaiting market data".to_string(),
                )),
                Err(_) => {
                    shared.registry.abort_market_data(req_id);
                    warn!(%conid, "market data snapshot timed out, using zero");
                    Ok(Decimal::ZERO)
                }
            }
        }))
        .await;

        for (position, price) in positions.iter_mut().zip(prices) {
            position.market_price = price?;
        }

        Ok(positions)
    }

    /// Fetch the full open-orders batch. The terminal marker is not guaranteed when
    /// the set is empty, so a timeout yields whatever was collected.
    async fn fetch_orders(&self) -> Result<Vec<Order>, BrokerError> {
        self.ensure_connected().await?;
        let _guard = self.orders_fetch.lock().await;

        let rx = self.shared.registry.register_orders();
        self.send(TwsRequest::ReqOpenOrders).await?;

        match timeout(self.config.orders_timeout, rx).await {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(_)) => Err(BrokerError::NotConnected(
                "connection closed awaiting open orders".to_string(),
            )),
            Err(_) => {
                let partial = self.shared.registry.take_partial_orders();
                warn!(
                    collected = partial.len(),
                    "no openOrderEnd within {:?}, returning partial open orders",
                    self.config.orders_timeout
                );
                Ok(partial)
            }
        }
    }

    fn is_configured(&self, account: &AccountId) -> bool {
        self.config.accounts.iter().any(|configured| configured == account)
    }
}

impl<Transport> BrokerGateway for TwsGateway<Transport>
where
    Transport: TwsTransport + Send + Sync,
    Transport::Writer: Send,
{
    async fn connection_status(&self) -> ConnectionStatus {
        match self.ensure_connected().await {
            Ok(()) => ConnectionStatus {
                reachable: true,
                authenticated: true,
                connected: true,
                competing: false,
                message: None,
            },
            Err(error) => ConnectionStatus::unreachable(error.to_string()),
        }
    }

    async fn keep_alive(&self) -> bool {
        self.ensure_connected().await.is_ok()
    }

    fn configured_accounts(&self) -> &[AccountId] {
        &self.config.accounts
    }

    /// The socket scopes every request to the session, not to a "current" account.
    async fn switch_account(&self, _: &AccountId) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn positions(&self, account: &AccountId) -> Result<Vec<Position>, BrokerError> {
        Ok(self
            .fetch_positions()
            .await?
            .into_iter()
            .filter(|position| &position.account == account)
            .collect())
    }

    async fn all_positions(&self) -> Result<Vec<Position>, BrokerError> {
        Ok(self
            .fetch_positions()
            .await?
            .into_iter()
            .filter(|position| self.is_configured(&position.account))
            .collect())
    }

    async fn orders(&self, account: &AccountId) -> Result<Vec<Order>, BrokerError> {
        Ok(self
            .fetch_orders()
            .await?
            .into_iter()
            .filter(|order| &order.account == account)
            .collect())
    }

    async fn all_orders(&self) -> Result<Vec<Order>, BrokerError> {
        Ok(self
            .fetch_orders()
            .await?
            .into_iter()
            .filter(|order| self.is_configured(&order.account))
            .collect())
    }

    async fn all_stop_orders(&self) -> Result<Vec<Order>, BrokerError> {
        Ok(dedup_by_order_id(
            self.all_orders()
                .await?
                .into_iter()
                .filter(|order| order.is_stop() && order.is_active())
                .collect(),
        ))
    }

    async fn place_stop_loss_order(
        &self,
        request: StopLossOrderRequest,
    ) -> Result<OrderResult, BrokerError> {
        self.ensure_connected().await?;

        let order_id = self.shared.next_request_id();
        let rx = self.shared.registry.register_order_status(order_id);

        self.send(TwsRequest::PlaceOrder {
            order_id,
            conid: request.conid,
            side: request.side(),
            quantity: request.quantity,
            stop_price: request.stop_price,
        })
        .await?;

        match timeout(self.config.place_order_timeout, rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(BrokerError::NotConnected(
                "connection closed awaiting order status".to_string(),
            )),
            Err(_) => {
                self.shared.registry.abort_order_status(order_id);
                // The broker may still have accepted it; report optimistically
                Ok(OrderResult::ok(OrderId::from(order_id), "confirmation pending"))
            }
        }
    }
}
