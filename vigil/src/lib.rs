//! Portfolio risk backend for a retail broker account.
//!
//! Answers two operational questions across a configured set of accounts: if every
//! protective stop triggered right now, what profit is locked in and what still rides
//! on the market - and for any position lacking a stop, place one at a configured
//! distance from the current market price.
//!
//! The [`service::RiskService`] façade wires a
//! [`BrokerGateway`](vigil_broker::BrokerGateway) backend (REST session or trading
//! socket) to the [`RiskEngine`](vigil_risk::engine::RiskEngine) and exposes the
//! operations an API layer publishes.

/// File- and environment-backed configuration.
pub mod config;

/// The application façade.
pub mod service;
