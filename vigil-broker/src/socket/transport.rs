use crate::error::BrokerError;
use rust_decimal::Decimal;
use smol_str::SmolStr;
use std::future::Future;
use tokio::sync::mpsc::UnboundedReceiver;
use vigil_instrument::{Conid, Currency, Side, Ticker, account::AccountId, order::Order};

/// Outbound framed messages the gateway sends to the trading socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TwsRequest {
    /// Start the API conversation after the handshake is acknowledged.
    StartApi { client_id: i32 },

    /// Request the positions batch across all accounts of the session.
    ReqPositions,

    /// Request the open-orders batch.
    ReqOpenOrders,

    /// Select the market-data feed; type 3 is the free delayed tier.
    ReqMarketDataType { market_data_type: i32 },

    /// One-shot snapshot quote for a contract; the broker auto-cancels the
    /// subscription after [`TwsEvent::TickSnapshotEnd`].
    ReqMktData {
        req_id: i64,
        conid: Conid,
        exchange: SmolStr,
        snapshot: bool,
    },

    /// Submit a stop order under a caller-assigned order id.
    PlaceOrder {
        order_id: i64,
        conid: Conid,
        side: Side,
        quantity: Decimal,
        stop_price: Decimal,
    },
}

/// Inbound typed callbacks delivered by the socket reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TwsEvent {
    /// Handshake accepted by the server.
    ConnectAck,

    /// Seed (or reseed) for the caller-assigned request/order id counter.
    NextValidId { order_id: i64 },

    /// One row of the in-flight positions batch. Market price is not part of this
    /// callback; the gateway enriches rows with snapshot quotes afterwards.
    Position {
        account: AccountId,
        conid: Conid,
        ticker: Option<Ticker>,
        currency: Option<Currency>,
        quantity: Decimal,
        avg_cost: Decimal,
    },

    /// Terminal marker for the positions batch.
    PositionEnd,

    /// One row of the in-flight open-orders batch.
    OpenOrder { order: Order },

    /// Terminal marker for the open-orders batch. Not guaranteed when the set is
    /// empty - consumers bound the wait and accept the partial batch.
    OpenOrderEnd,

    /// Status transition for a caller-assigned order id.
    OrderStatus { order_id: i64, status: SmolStr },

    /// Price tick for a market-data request.
    TickPrice {
        req_id: i64,
        field: i32,
        price: Decimal,
    },

    /// Terminal marker for a snapshot market-data request.
    TickSnapshotEnd { req_id: i64 },

    /// Error or notice; `req_id` is negative for connection-level notices.
    Error {
        req_id: i64,
        code: i32,
        message: String,
    },

    /// The server closed the socket; every outstanding await must fail.
    ConnectionClosed,
}

/// The socket wire codec, out of scope here: implementations frame [`TwsRequest`]s
/// onto the connection and decode inbound frames into [`TwsEvent`]s.
pub trait TwsTransport {
    type Writer: TwsWriter;

    /// Open the socket and return the single writer plus the inbound event stream.
    fn connect(
        &self,
        host: &str,
        port: u16,
        client_id: i32,
    ) -> impl Future<Output = Result<(Self::Writer, UnboundedReceiver<TwsEvent>), BrokerError>> + Send;
}

/// The writing half of a socket connection. The gateway serialises access, so
/// implementations need not be re-entrant.
pub trait TwsWriter
where
    Self: Send + 'static,
{
    fn send(&mut self, request: TwsRequest) -> impl Future<Output = Result<(), BrokerError>> + Send;
}
