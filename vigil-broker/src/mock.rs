use crate::{BrokerGateway, dedup_by_order_id, error::BrokerError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use vigil_instrument::{
    account::AccountId,
    order::{Order, OrderId, OrderResult, StopLossOrderRequest},
    position::Position,
    status::ConnectionStatus,
};

/// Deterministic in-memory [`BrokerGateway`] serving preloaded fixtures.
///
/// Placements are recorded for inspection and acknowledged with sequential order ids,
/// or uniformly rejected when `reject_placements` is set.
#[derive(Debug, Default)]
pub struct MockGateway {
    pub accounts: Vec<AccountId>,
    pub positions: Vec<Position>,
    pub orders: Vec<Order>,
    pub connection: ConnectionStatus,
    pub reject_placements: bool,
    placements: Mutex<Vec<StopLossOrderRequest>>,
    next_order_id: AtomicI64,
}

impl MockGateway {
    pub fn new(accounts: Vec<AccountId>) -> Self {
        Self {
            accounts,
            connection: ConnectionStatus {
                reachable: true,
                authenticated: true,
                connected: true,
                competing: false,
                message: None,
            },
            next_order_id: AtomicI64::new(1000),
            ..Self::default()
        }
    }

    pub fn with_positions(mut self, positions: Vec<Position>) -> Self {
        self.positions = positions;
        self
    }

    pub fn with_orders(mut self, orders: Vec<Order>) -> Self {
        self.orders = orders;
        self
    }

    /// Placement requests observed so far, in submission order.
    pub fn placements(&self) -> Vec<StopLossOrderRequest> {
        self.placements.lock().clone()
    }
}

impl BrokerGateway for MockGateway {
    async fn connection_status(&self) -> ConnectionStatus {
        self.connection.clone()
    }

    async fn keep_alive(&self) -> bool {
        self.connection.reachable
    }

    fn configured_accounts(&self) -> &[AccountId] {
        &self.accounts
    }

    async fn switch_account(&self, _: &AccountId) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn positions(&self, account: &AccountId) -> Result<Vec<Position>, BrokerError> {
        Ok(self
            .positions
            .iter()
            .filter(|position| &position.account == account && !position.is_flat())
            .cloned()
            .collect())
    }

    async fn orders(&self, account: &AccountId) -> Result<Vec<Order>, BrokerError> {
        Ok(self
            .orders
            .iter()
            .filter(|order| &order.account == account)
            .cloned()
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
        self.placements.lock().push(request);

        if self.reject_placements {
            return Ok(OrderResult::rejected("mock rejection"));
        }

        let order_id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        Ok(OrderResult::ok(OrderId::from(order_id), "Submitted"))
    }
}
