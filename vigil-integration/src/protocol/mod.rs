/// Defines an abstract [`RestRequest`](http::RestRequest) executed by a fully
/// configurable [`RestClient`](http::client::RestClient).
pub mod http;
