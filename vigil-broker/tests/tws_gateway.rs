use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use vigil_broker::{
    BrokerGateway,
    error::BrokerError,
    socket::{
        TwsGateway, TwsGatewayConfig,
        transport::{TwsEvent, TwsRequest, TwsTransport, TwsWriter},
    },
};
use vigil_instrument::{
    Conid, Currency, Ticker,
    account::AccountId,
    order::{Order, OrderId, StopLossOrderRequest},
};

type Responder = dyn Fn(&TwsRequest) -> Vec<TwsEvent> + Send + Sync;

/// Channel-driven wire codec stand-in: every outbound request is recorded and
/// answered with the events the test scripted for it.
struct MockTransport {
    responder: Arc<Responder>,
    sent: Arc<Mutex<Vec<TwsRequest>>>,
    connects: Arc<Mutex<usize>>,
}

struct MockWriter {
    responder: Arc<Responder>,
    sent: Arc<Mutex<Vec<TwsRequest>>>,
    events: UnboundedSender<TwsEvent>,
}

impl MockTransport {
    fn new(responder: impl Fn(&TwsRequest) -> Vec<TwsEvent> + Send + Sync + 'static) -> Self {
        Self {
            responder: Arc::new(responder),
            sent: Arc::new(Mutex::new(Vec::new())),
            connects: Arc::new(Mutex::new(0)),
        }
    }

    fn sent(&self) -> Vec<TwsRequest> {
        self.sent.lock().clone()
    }

    fn connects(&self) -> usize {
        *self.connects.lock()
    }
}

impl TwsTransport for MockTransport {
    type Writer = MockWriter;

    async fn connect(
        &self,
        _host: &str,
        _port: u16,
        _client_id: i32,
    ) -> Result<(Self::Writer, UnboundedReceiver<TwsEvent>), BrokerError> {
        *self.connects.lock() += 1;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let _ = events_tx.send(TwsEvent::ConnectAck);
        let _ = events_tx.send(TwsEvent::NextValidId { order_id: 50 });

        Ok((
            MockWriter {
                responder: Arc::clone(&self.responder),
                sent: Arc::clone(&self.sent),
                events: events_tx,
            },
            events_rx,
        ))
    }
}

impl TwsWriter for MockWriter {
    async fn send(&mut self, request: TwsRequest) -> Result<(), BrokerError> {
        self.sent.lock().push(request.clone());
        for event in (self.responder)(&request) {
            let _ = self.events.send(event);
        }
        Ok(())
    }
}

fn accounts() -> Vec<AccountId> {
    vec![AccountId::new("U1")]
}

fn config() -> TwsGatewayConfig {
    let mut config = TwsGatewayConfig::new(accounts());
    // Keep negative-path tests fast; the positive paths never hit these bounds
    config.orders_timeout = Duration::from_millis(100);
    config.market_data_timeout = Duration::from_millis(100);
    config.place_order_timeout = Duration::from_millis(200);
    config
}

fn position_event(account: &str, conid: i64, quantity: Decimal) -> TwsEvent {
    TwsEvent::Position {
        account: AccountId::new(account),
        conid: Conid(conid),
        ticker: Some(Ticker::new("AAPL")),
        currency: Some(Currency::new("USD")),
        quantity,
        avg_cost: dec!(100.00),
    }
}

fn open_order(account: &str, order_id: i64, conid: i64) -> Order {
    Order {
        order_id: OrderId::from(order_id),
        account: AccountId::new(account),
        conid: Conid(conid),
        ticker: Some(Ticker::new("AAPL")),
        order_type: Some("STP".into()),
        side: None,
        price: None,
        stop_price: Some(dec!(120.00)),
        quantity: Some(dec!(100)),
        remaining_quantity: Some(dec!(100)),
        status: Some("Submitted".into()),
        description: None,
    }
}

#[tokio::test]
async fn test_positions_enriched_with_snapshot_quotes() {
    let transport = MockTransport::new(|request| match request {
        TwsRequest::ReqPositions => vec![
            position_event("U1", 1, dec!(100)),
            position_event("U1", 2, dec!(0)),
            position_event("U2", 3, dec!(50)),
            TwsEvent::PositionEnd,
        ],
        TwsRequest::ReqMktData { req_id, .. } => vec![TwsEvent::TickPrice {
            req_id: *req_id,
            field: 68,
            price: dec!(150.25),
        }],
        _ => vec![],
    });
    let gateway = TwsGateway::new(transport, config());

    let positions = gateway.all_positions().await.unwrap();

    // zero-quantity rows and unconfigured accounts are excluded
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].conid, Conid(1));
    assert_eq!(positions[0].market_price, dec!(150.25));
}

#[tokio::test]
async fn test_positions_selects_delayed_market_data() {
    let transport = MockTransport::new(|request| match request {
        TwsRequest::ReqPositions => vec![position_event("U1", 1, dec!(100)), TwsEvent::PositionEnd],
        TwsRequest::ReqMktData { req_id, .. } => vec![TwsEvent::TickPrice {
            req_id: *req_id,
            field: 4,
            price: dec!(151.00),
        }],
        _ => vec![],
    });
    let gateway = TwsGateway::new(transport, config());

    let positions = gateway.positions(&AccountId::new("U1")).await.unwrap();
    assert_eq!(positions[0].market_price, dec!(151.00));

    let sent = gateway_requests(&gateway);
    assert!(sent.contains(&TwsRequest::ReqMarketDataType { market_data_type: 3 }));
    assert!(sent.iter().any(|request| matches!(
        request,
        TwsRequest::ReqMktData { snapshot: true, conid: Conid(1), .. }
    )));
}

#[tokio::test]
async fn test_snapshot_end_without_price_yields_zero() {
    let transport = MockTransport::new(|request| match request {
        TwsRequest::ReqPositions => vec![position_event("U1", 1, dec!(100)), TwsEvent::PositionEnd],
        TwsRequest::ReqMktData { req_id, .. } => vec![
            // Field 6 (high) is not a usable trade price and must be ignored
            TwsEvent::TickPrice {
                req_id: *req_id,
                field: 6,
                price: dec!(999),
            },
            TwsEvent::TickSnapshotEnd { req_id: *req_id },
        ],
        _ => vec![],
    });
    let gateway = TwsGateway::new(transport, config());

    let positions = gateway.positions(&AccountId::new("U1")).await.unwrap();
    assert_eq!(positions[0].market_price, Decimal::ZERO);
}

#[tokio::test]
async fn test_market_data_timeout_degrades_to_zero() {
    let transport = MockTransport::new(|request| match request {
        TwsRequest::ReqPositions => vec![position_event("U1", 1, dec!(100)), TwsEvent::PositionEnd],
        // no answer to ReqMktData at all
        _ => vec![],
    });
    let gateway = TwsGateway::new(transport, config());

    let positions = gateway.positions(&AccountId::new("U1")).await.unwrap();
    assert_eq!(positions[0].market_price, Decimal::ZERO);
}

#[tokio::test]
async fn test_open_orders_complete_on_terminal_marker() {
    let transport = MockTransport::new(|request| match request {
        TwsRequest::ReqOpenOrders => vec![
            TwsEvent::OpenOrder {
                order: open_order("U1", 7, 1),
            },
            TwsEvent::OpenOrderEnd,
        ],
        _ => vec![],
    });
    let gateway = TwsGateway::new(transport, config());

    let orders = gateway.all_stop_orders().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_id, OrderId::from(7));
}

#[tokio::test]
async fn test_open_orders_timeout_returns_partial_batch() {
    let transport = MockTransport::new(|request| match request {
        // terminal marker never sent
        TwsRequest::ReqOpenOrders => vec![TwsEvent::OpenOrder {
            order: open_order("U1", 7, 1),
        }],
        _ => vec![],
    });
    let gateway = TwsGateway::new(transport, config());

    let orders = gateway.orders(&AccountId::new("U1")).await.unwrap();
    assert_eq!(orders.len(), 1);

    // the slot is terminal after the timeout; a second fetch re-registers cleanly
    let orders = gateway.orders(&AccountId::new("U1")).await.unwrap();
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
async fn test_place_order_resolves_on_order_status() {
    let transport = MockTransport::new(|request| match request {
        TwsRequest::PlaceOrder { order_id, .. } => vec![TwsEvent::OrderStatus {
            order_id: *order_id,
            status: "PreSubmitted".into(),
        }],
        _ => vec![],
    });
    let gateway = TwsGateway::new(transport, config());

    let result = gateway
        .place_stop_loss_order(StopLossOrderRequest::new(
            AccountId::new("U1"),
            Conid(1),
            dec!(120.00),
            dec!(100),
            true,
        ))
        .await
        .unwrap();

    assert!(result.success);
    // the id counter was seeded from nextValidId
    assert_eq!(result.order_id, Some(OrderId::from(50)));
    assert_eq!(result.message, "PreSubmitted");
}

#[tokio::test]
async fn test_place_order_cancelled_status_is_rejection() {
    let transport = MockTransport::new(|request| match request {
        TwsRequest::PlaceOrder { order_id, .. } => vec![TwsEvent::OrderStatus {
            order_id: *order_id,
            status: "Cancelled".into(),
        }],
        _ => vec![],
    });
    let gateway = TwsGateway::new(transport, config());

    let result = gateway
        .place_stop_loss_order(StopLossOrderRequest::new(
            AccountId::new("U1"),
            Conid(1),
            dec!(120.00),
            dec!(100),
            true,
        ))
        .await
        .unwrap();

    assert!(!result.success);
}

#[tokio::test]
async fn test_place_order_error_event_is_rejection() {
    let transport = MockTransport::new(|request| match request {
        TwsRequest::PlaceOrder { order_id, .. } => vec![TwsEvent::Error {
            req_id: *order_id,
            code: 201,
            message: "Order rejected - reason: insufficient margin".to_string(),
        }],
        _ => vec![],
    });
    let gateway = TwsGateway::new(transport, config());

    let result = gateway
        .place_stop_loss_order(StopLossOrderRequest::new(
            AccountId::new("U1"),
            Conid(1),
            dec!(120.00),
            dec!(100),
            true,
        ))
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.message.contains("201"));
}

#[tokio::test]
async fn test_place_order_timeout_reports_confirmation_pending() {
    let transport = MockTransport::new(|_| vec![]);
    let gateway = TwsGateway::new(transport, config());

    let result = gateway
        .place_stop_loss_order(StopLossOrderRequest::new(
            AccountId::new("U1"),
            Conid(1),
            dec!(120.00),
            dec!(100),
            true,
        ))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.message, "confirmation pending");
}

#[tokio::test]
async fn test_benign_error_codes_do_not_disturb_fetches() {
    let transport = MockTransport::new(|request| match request {
        TwsRequest::ReqOpenOrders => vec![
            TwsEvent::Error {
                req_id: -1,
                code: 10167,
                message: "Requested market data is not subscribed. Displaying delayed market data.".to_string(),
            },
            TwsEvent::OpenOrder {
                order: open_order("U1", 7, 1),
            },
            TwsEvent::OpenOrderEnd,
        ],
        _ => vec![],
    });
    let gateway = TwsGateway::new(transport, config());

    let orders = gateway.orders(&AccountId::new("U1")).await.unwrap();
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
async fn test_connectivity_error_fails_outstanding_fetch() {
    let transport = MockTransport::new(|request| match request {
        TwsRequest::ReqPositions => vec![TwsEvent::Error {
            req_id: -1,
            code: 502,
            message: "Couldn't connect to TWS".to_string(),
        }],
        _ => vec![],
    });
    let gateway = TwsGateway::new(transport, config());

    let error = gateway.all_positions().await.unwrap_err();
    assert!(matches!(error, BrokerError::NotConnected(_)));
}

#[tokio::test]
async fn test_connection_closed_fails_fetch_and_reconnects_lazily() {
    let transport = MockTransport::new(|request| match request {
        TwsRequest::ReqPositions => vec![TwsEvent::ConnectionClosed],
        _ => vec![],
    });
    let gateway = TwsGateway::new(transport, config());

    let error = gateway.all_positions().await.unwrap_err();
    assert!(matches!(error, BrokerError::NotConnected(_)));

    // next call re-runs the handshake opportunistically
    assert!(gateway.keep_alive().await);
    assert_eq!(gateway_connects(&gateway), 2);
}

#[tokio::test]
async fn test_keep_alive_connects_once_and_is_idempotent() {
    let transport = MockTransport::new(|_| vec![]);
    let gateway = TwsGateway::new(transport, config());

    assert!(gateway.keep_alive().await);
    assert!(gateway.keep_alive().await);
    assert_eq!(gateway_connects(&gateway), 1);

    let status = gateway.connection_status().await;
    assert!(status.reachable);
    assert!(status.authenticated);
}

// The gateway owns the transport; peek into the mock through the shared handles.
fn gateway_requests(gateway: &TwsGateway<MockTransport>) -> Vec<TwsRequest> {
    gateway.transport().sent()
}

fn gateway_connects(gateway: &TwsGateway<MockTransport>) -> usize {
    gateway.transport().connects()
}
