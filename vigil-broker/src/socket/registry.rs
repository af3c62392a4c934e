use crate::socket::transport::TwsEvent;
use fnv::FnvHashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};
use tokio::sync::{mpsc::UnboundedReceiver, oneshot};
use tracing::{debug, warn};
use vigil_instrument::{
    Conid,
    order::{Order, OrderId, OrderResult},
    position::Position,
};

/// Tick fields that carry a usable trade price: last/close plus their delayed
/// variants served by market-data type 3.
pub(super) const SNAPSHOT_PRICE_FIELDS: [i32; 8] = [4, 9, 68, 75, 72, 73, 66, 67];

/// Notices, not failures: 10167 is the delayed-data warning, 300 an unknown ticker.
const BENIGN_ERROR_CODES: [i32; 2] = [10167, 300];

/// Connectivity lost between the socket server and the broker.
const CONNECTIVITY_ERROR_CODES: [i32; 2] = [502, 504];

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(super) enum SessionState {
    Disconnected,
    Handshaking,
    Ready,
}

/// An in-flight batch: rows accumulate callback by callback until the terminal
/// marker completes the future with a snapshot of the list.
#[derive(Debug)]
struct PendingBatch<T> {
    rows: Vec<T>,
    tx: oneshot::Sender<Vec<T>>,
}

#[derive(Debug)]
struct PendingPrice {
    conid: Conid,
    tx: oneshot::Sender<Decimal>,
}

/// The synchronous bridge: futures registered per request kind, resolved by the
/// reader task as callbacks arrive.
///
/// Positions and orders are single-slot - the protocol has no correlation id for
/// them, so at most one fetch per kind may be outstanding. Market data and order
/// status correlate naturally by id and live in maps.
#[derive(Debug, Default)]
pub(super) struct Registry {
    positions: Mutex<Option<PendingBatch<Position>>>,
    orders: Mutex<Option<PendingBatch<Order>>>,
    market_data: Mutex<FnvHashMap<i64, PendingPrice>>,
    order_status: Mutex<FnvHashMap<i64, oneshot::Sender<OrderResult>>>,
}

impl Registry {
    pub(super) fn register_positions(&self) -> oneshot::Receiver<Vec<Position>> {
        let (tx, rx) = oneshot::channel();
        *self.positions.lock() = Some(PendingBatch { rows: Vec::new(), tx });
        rx
    }

    /// Drop the positions slot after a timeout so the next fetch can re-register.
    pub(super) fn abort_positions(&self) {
        self.positions.lock().take();
    }

    pub(super) fn register_orders(&self) -> oneshot::Receiver<Vec<Order>> {
        let (tx, rx) = oneshot::channel();
        *self.orders.lock() = Some(PendingBatch { rows: Vec::new(), tx });
        rx
    }

    /// Take whatever the open-orders batch collected so far; the socket does not
    /// guarantee a terminal marker when the set is empty.
    pub(super) fn take_partial_orders(&self) -> Vec<Order> {
        self.orders
            .lock()
            .take()
            .map(|pending| pending.rows)
            .unwrap_or_default()
    }

    pub(super) fn register_market_data(&self, req_id: i64, conid: Conid) -> oneshot::Receiver<Decimal> {
        let (tx, rx) = oneshot::channel();
        self.market_data
            .lock()
            .insert(req_id, PendingPrice { conid, tx });
        rx
    }

    /// Drop a market-data registration after a timeout so a late tick is ignored.
    pub(super) fn abort_market_data(&self, req_id: i64) {
        self.market_data.lock().remove(&req_id);
    }

    pub(super) fn register_order_status(&self, order_id: i64) -> oneshot::Receiver<OrderResult> {
        let (tx, rx) = oneshot::channel();
        self.order_status.lock().insert(order_id, tx);
        rx
    }

    pub(super) fn abort_order_status(&self, order_id: i64) {
        self.order_status.lock().remove(&order_id);
    }

    fn push_position(&self, position: Position) {
        match self.positions.lock().as_mut() {
            Some(pending) => pending.rows.push(position),
            None => debug!(?position, "position callback with no fetch outstanding"),
        }
    }

    fn complete_positions(&self) {
        if let Some(pending) = self.positions.lock().take() {
            let _ = pending.tx.send(pending.rows);
        }
    }

    fn push_order(&self, order: Order) {
        match self.orders.lock().as_mut() {
            Some(pending) => pending.rows.push(order),
            None => debug!(order_id = %order.order_id, "openOrder callback with no fetch outstanding"),
        }
    }

    fn complete_orders(&self) {
        if let Some(pending) = self.orders.lock().take() {
            let _ = pending.tx.send(pending.rows);
        }
    }

    fn complete_market_data(&self, req_id: i64, price: Decimal) {
        if let Some(pending) = self.market_data.lock().remove(&req_id) {
            let _ = pending.tx.send(price);
        }
    }

    fn complete_order_status(&self, order_id: i64, result: OrderResult) -> bool {
        match self.order_status.lock().remove(&order_id) {
            Some(tx) => {
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }

    /// Fail the batch futures by dropping their senders; awaiting callers observe a
    /// closed channel and map it to a connection loss.
    fn fail_batches(&self) {
        self.positions.lock().take();
        self.orders.lock().take();
    }

    /// Connection loss is a distributed cancellation: every outstanding future of
    /// every kind fails.
    fn fail_all(&self) {
        self.fail_batches();
        self.market_data.lock().clear();
        self.order_status.lock().clear();
    }
}

/// State shared between the gateway callers and the socket reader task.
#[derive(Debug)]
pub(super) struct TwsShared {
    pub(super) registry: Registry,
    next_request_id: AtomicI64,
    state: Mutex<SessionState>,
    connect_ack: Mutex<Option<oneshot::Sender<()>>>,
    /// Connection generation. A reader outlived by a reconnect must not tear down
    /// the session that replaced it.
    epoch: AtomicI64,
}

impl Default for TwsShared {
    fn default() -> Self {
        Self {
            registry: Registry::default(),
            next_request_id: AtomicI64::new(0),
            state: Mutex::new(SessionState::Disconnected),
            connect_ack: Mutex::new(None),
            epoch: AtomicI64::new(0),
        }
    }
}

impl TwsShared {
    pub(super) fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub(super) fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }

    /// Allocate the next caller-assigned request/order id.
    pub(super) fn next_request_id(&self) -> i64 {
        self.next_request_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(super) fn register_connect_ack(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        *self.connect_ack.lock() = Some(tx);
        rx
    }

    /// Start a new connection generation, invalidating any reader still draining the
    /// previous one.
    pub(super) fn next_epoch(&self) -> i64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn on_connection_closed(&self, epoch: i64) {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!(epoch, "stale socket reader ended after reconnect");
            return;
        }
        self.set_state(SessionState::Disconnected);
        self.connect_ack.lock().take();
        self.registry.fail_all();
    }
}

/// Reader loop: consumes inbound callbacks and resolves registered futures.
///
/// Runs until the event channel closes; a close without an explicit
/// [`TwsEvent::ConnectionClosed`] is treated the same way.
pub(super) async fn dispatch(
    mut events: UnboundedReceiver<TwsEvent>,
    shared: Arc<TwsShared>,
    epoch: i64,
) {
    while let Some(event) = events.recv().await {
        match event {
            TwsEvent::ConnectAck => {
                if let Some(tx) = shared.connect_ack.lock().take() {
                    let _ = tx.send(());
                }
            }
            TwsEvent::NextValidId { order_id } => {
                debug!(order_id, "request id counter seeded");
                shared.next_request_id.store(order_id, Ordering::SeqCst);
            }
            TwsEvent::Position {
                account,
                conid,
                ticker,
                currency,
                quantity,
                avg_cost,
            } => {
                shared.registry.push_position(Position {
                    account,
                    conid,
                    ticker,
                    quantity,
                    avg_price: avg_cost,
                    // Filled in by the snapshot enrichment pass after positionEnd
                    market_price: Decimal::ZERO,
                    currency,
                });
            }
            TwsEvent::PositionEnd => shared.registry.complete_positions(),
            TwsEvent::OpenOrder { order } => shared.registry.push_order(order),
            TwsEvent::OpenOrderEnd => shared.registry.complete_orders(),
            TwsEvent::OrderStatus { order_id, status } => {
                let success = !(status.eq_ignore_ascii_case("Cancelled")
                    || status.eq_ignore_ascii_case("ApiCancelled"));
                shared.registry.complete_order_status(
                    order_id,
                    OrderResult {
                        success,
                        order_id: Some(OrderId::from(order_id)),
                        message: status.to_string(),
                    },
                );
            }
            TwsEvent::TickPrice { req_id, field, price } => {
                if SNAPSHOT_PRICE_FIELDS.contains(&field) && price > Decimal::ZERO {
                    shared.registry.complete_market_data(req_id, price);
                }
            }
            TwsEvent::TickSnapshotEnd { req_id } => {
                // A snapshot that ends without a usable tick resolves to zero
                shared.registry.complete_market_data(req_id, Decimal::ZERO);
            }
            TwsEvent::Error { req_id, code, message } => {
                if BENIGN_ERROR_CODES.contains(&code) {
                    warn!(req_id, code, %message, "benign socket notice");
                } else if CONNECTIVITY_ERROR_CODES.contains(&code) {
                    warn!(req_id, code, %message, "socket connectivity lost, failing batch fetches");
                    shared.registry.fail_batches();
                } else if shared.registry.market_data.lock().contains_key(&req_id) {
                    warn!(req_id, code, %message, "market data request failed, using zero");
                    shared.registry.complete_market_data(req_id, Decimal::ZERO);
                } else if shared.registry.complete_order_status(
                    req_id,
                    OrderResult::rejected(format!("{code}: {message}")),
                ) {
                    warn!(req_id, code, %message, "order rejected by broker");
                } else {
                    warn!(req_id, code, %message, "unhandled socket error");
                }
            }
            TwsEvent::ConnectionClosed => {
                warn!("socket connection closed, failing outstanding requests");
                shared.on_connection_closed(epoch);
                return;
            }
        }
    }

    debug!("socket event stream ended");
    shared.on_connection_closed(epoch);
}
