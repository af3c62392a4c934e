//! Low-level web-integration plumbing shared by the Vigil broker gateways and the
//! FX-rate client.
//!
//! The centre of the crate is the [`RestClient`](protocol::http::client::RestClient):
//! a configurable executor for typed [`RestRequest`](protocol::http::RestRequest)s,
//! combining a [`BuildStrategy`](protocol::http::BuildStrategy) (how a request is
//! decorated - eg/ with a session cookie) with an
//! [`HttpParser`](protocol::http::HttpParser) (how responses and API errors are
//! decoded).

/// All transport-level errors generated in `vigil-integration`.
pub mod error;

/// Observed measurement of a request round trip, emitted alongside every response.
pub mod metric;

/// Http protocol abstractions.
pub mod protocol;
