//! Unified broker gateway for Vigil.
//!
//! A broker backend is one capability set - connection health, accounts, positions,
//! orders, stop-loss placement - expressed by the [`BrokerGateway`] trait. Two very
//! different transports implement it:
//!
//! - [`rest::RestGateway`]: a stateful request/response REST session authenticated by a
//!   login cookie, with per-account switching and refresh-then-read semantics.
//! - [`socket::TwsGateway`]: a fully asynchronous socket protocol correlated by request
//!   ids and terminal batch markers, bridged to synchronous-feeling calls with futures.
//!
//! The risk engine stays ignorant of which backend is active.

use crate::error::BrokerError;
use std::collections::HashSet;
use std::future::Future;
use vigil_instrument::{
    Conid,
    account::AccountId,
    order::{Order, OrderResult, StopLossOrderRequest},
    position::Position,
    status::ConnectionStatus,
};

pub mod error;

/// Deterministic in-memory [`BrokerGateway`] for tests and downstream fixtures.
pub mod mock;

/// Session-cookie REST backend.
pub mod rest;

/// Asynchronous socket backend.
pub mod socket;

/// One broker behind one contract.
///
/// Read operations fail with [`BrokerError`]; placement returns business rejections
/// inside the [`OrderResult`] and raises [`BrokerError`] only for transport loss.
pub trait BrokerGateway
where
    Self: Sync,
{
    /// Broker connection health. Never fails; problems are reported via the fields.
    fn connection_status(&self) -> impl Future<Output = ConnectionStatus> + Send;

    /// True iff a liveness probe succeeded within this call.
    fn keep_alive(&self) -> impl Future<Output = bool> + Send;

    /// The configured account list, verbatim.
    fn configured_accounts(&self) -> &[AccountId];

    /// Select the broker-side "current" account.
    ///
    /// Idempotent. Required before account-scoped reads on backends that track a
    /// current account; a no-op on backends that scope per-request.
    fn switch_account(
        &self,
        account: &AccountId,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Open positions for one account. Zero-quantity rows are excluded and every row
    /// carries a populated market price.
    fn positions(
        &self,
        account: &AccountId,
    ) -> impl Future<Output = Result<Vec<Position>, BrokerError>> + Send;

    /// Union of [`Self::positions`] across the configured accounts.
    fn all_positions(&self) -> impl Future<Output = Result<Vec<Position>, BrokerError>> + Send {
        async move {
            let mut positions = Vec::new();
            for account in self.configured_accounts().to_vec() {
                positions.extend(self.positions(&account).await?);
            }
            Ok(positions)
        }
    }

    /// Orders for one account, all statuses included - callers filter.
    fn orders(
        &self,
        account: &AccountId,
    ) -> impl Future<Output = Result<Vec<Order>, BrokerError>> + Send;

    /// Union of [`Self::orders`] across the configured accounts.
    fn all_orders(&self) -> impl Future<Output = Result<Vec<Order>, BrokerError>> + Send {
        async move {
            let mut orders = Vec::new();
            for account in self.configured_accounts().to_vec() {
                orders.extend(self.orders(&account).await?);
            }
            Ok(orders)
        }
    }

    /// Stop-typed AND active orders for one account.
    fn stop_orders(
        &self,
        account: &AccountId,
    ) -> impl Future<Output = Result<Vec<Order>, BrokerError>> + Send {
        async move {
            Ok(self
                .orders(account)
                .await?
                .into_iter()
                .filter(|order| order.is_stop() && order.is_active())
                .collect())
        }
    }

    /// Stop-typed AND active orders across the configured accounts, deduplicated by
    /// order id (first occurrence wins).
    fn all_stop_orders(&self) -> impl Future<Output = Result<Vec<Order>, BrokerError>> + Send {
        async move {
            let mut orders = Vec::new();
            for account in self.configured_accounts().to_vec() {
                orders.extend(self.stop_orders(&account).await?);
            }
            Ok(dedup_by_order_id(orders))
        }
    }

    /// [`Self::stop_orders`] restricted to one contract.
    fn stop_orders_for_conid(
        &self,
        account: &AccountId,
        conid: Conid,
    ) -> impl Future<Output = Result<Vec<Order>, BrokerError>> + Send {
        async move {
            Ok(self
                .stop_orders(account)
                .await?
                .into_iter()
                .filter(|order| order.conid == conid)
                .collect())
        }
    }

    /// Place a stop-loss order protecting one position.
    fn place_stop_loss_order(
        &self,
        request: StopLossOrderRequest,
    ) -> impl Future<Output = Result<OrderResult, BrokerError>> + Send;
}

/// Drop repeated observations of the same broker order, keeping the first.
///
/// Order ids are stable across refreshes, so accumulating per-account reads and
/// re-reads never double counts a stop.
pub fn dedup_by_order_id(orders: Vec<Order>) -> Vec<Order> {
    let mut seen = HashSet::with_capacity(orders.len());
    orders
        .into_iter()
        .filter(|order| seen.insert(order.order_id.clone()))
        .collect()
}
