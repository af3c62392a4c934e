//! Typed [`RestRequest`](vigil_integration::protocol::http::RestRequest)s for the
//! session-cookie gateway, one module per endpoint.

pub mod auth_status;
pub mod orders;
pub mod place_order;
pub mod positions;
pub mod reply;
pub mod switch_account;
pub mod tickle;

pub use auth_status::{AuthStatusRequest, AuthStatusResponse};
pub use orders::{GetOrdersRequest, OrderRow, OrdersResponse};
pub use place_order::{PlaceOrderBody, PlaceOrderReply, PlaceOrderRequest, PlaceOrderTicket};
pub use positions::{GetPositionsRequest, PositionRow};
pub use reply::ReplyConfirmRequest;
pub use switch_account::{SwitchAccountRequest, SwitchAccountResponse};
pub use tickle::{TickleRequest, TickleResponse};
