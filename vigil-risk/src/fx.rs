use crate::round_money;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use std::{borrow::Cow, collections::HashMap, time::Duration};
use tracing::{debug, warn};
use vigil_instrument::Currency;
use vigil_integration::{
    error::SocketError,
    protocol::http::{HttpParser, RestRequest, client::RestClient, session::PublicNoHeaders},
};

/// Default FX-rate source. Returns `base -> other` quotes which are inverted into
/// `other -> base` rates on ingest.
pub const DEFAULT_FX_URL: &str = "https://api.frankfurter.dev/v1";

/// Rates older than this trigger a refresh on the next read.
const REFRESH_AFTER: TimeDelta = TimeDelta::hours(1);

const FX_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Process-wide cache of `currency -> base-currency` rates.
///
/// Constructed once at startup and never torn down. Conversion never fails: a missing
/// rate degrades to 1:1 with a warning, and refresh failures keep the existing table.
#[derive(Debug)]
pub struct FxCache {
    base: Currency,
    rates: RwLock<HashMap<Currency, Decimal>>,
    last_refresh: Mutex<Option<DateTime<Utc>>>,
    /// Coalesces refreshes: whoever fails to take this proceeds on stale rates.
    refresh_guard: tokio::sync::Mutex<()>,
    rest_client: RestClient<'static, PublicNoHeaders, FxParser>,
}

impl FxCache {
    pub fn new(base: Currency, endpoint: impl Into<Cow<'static, str>>) -> Self {
        Self {
            base,
            rates: RwLock::new(HashMap::new()),
            last_refresh: Mutex::new(None),
            refresh_guard: tokio::sync::Mutex::new(()),
            rest_client: RestClient::new(endpoint, PublicNoHeaders, FxParser),
        }
    }

    /// A cache preloaded with `currency -> base` rates and marked fresh, so reads
    /// never touch the network. Intended for tests and offline runs.
    pub fn with_rates(base: Currency, rates: HashMap<Currency, Decimal>) -> Self {
        let cache = Self::new(base, DEFAULT_FX_URL);
        *cache.rates.write() = rates;
        *cache.last_refresh.lock() = Some(Utc::now());
        cache
    }

    pub fn base(&self) -> &Currency {
        &self.base
    }

    /// Convert `amount` from `currency` into the base currency, rounded to 2 decimals
    /// half-up. Identity when the currency is absent, already the base, or unknown.
    pub async fn convert_to_base(&self, amount: Decimal, currency: Option<&Currency>) -> Decimal {
        let Some(currency) = currency else {
            return amount;
        };

        if currency == &self.base {
            return amount;
        }

        self.refresh_if_stale().await;

        match self.rates.read().get(currency) {
            Some(rate) => round_money(amount * rate),
            None => {
                warn!(%currency, base = %self.base, "no FX rate cached, converting 1:1");
                amount
            }
        }
    }

    fn is_fresh(&self) -> bool {
        match *self.last_refresh.lock() {
            Some(refreshed_at) => Utc::now() - refreshed_at <= REFRESH_AFTER,
            None => false,
        }
    }

    async fn refresh_if_stale(&self) {
        if self.is_fresh() {
            return;
        }

        // Single in-flight refresh; concurrent readers continue on stale rates
        let Ok(_guard) = self.refresh_guard.try_lock() else {
            return;
        };

        if self.is_fresh() {
            return;
        }

        match self
            .rest_client
            .execute(LatestRatesRequest {
                query: LatestRatesQuery {
                    base: self.base.clone(),
                },
            })
            .await
        {
            Ok((response, _metric)) => {
                let mut rates: HashMap<Currency, Decimal> = response
                    .rates
                    .into_iter()
                    .filter_map(|(currency, quote)| {
                        if quote.is_zero() {
                            warn!(%currency, "zero FX quote dropped");
                            return None;
                        }
                        // quote is base -> other; the cache stores other -> base
                        Some((
                            currency,
                            (Decimal::ONE / quote)
                                .round_dp_with_strategy(10, RoundingStrategy::MidpointAwayFromZero),
                        ))
                    })
                    .collect();
                rates.insert(self.base.clone(), Decimal::ONE);

                debug!(count = rates.len(), base = %self.base, "FX rates refreshed");
                *self.rates.write() = rates;
                *self.last_refresh.lock() = Some(Utc::now());
            }
            Err(error) => warn!(%error, "FX refresh failed, keeping existing rates"),
        }
    }
}

struct LatestRatesRequest {
    query: LatestRatesQuery,
}

#[derive(Debug, Clone, serde::Serialize)]
struct LatestRatesQuery {
    base: Currency,
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    rates: HashMap<Currency, Decimal>,
}

impl RestRequest for LatestRatesRequest {
    type Response = LatestRatesResponse;
    type QueryParams = LatestRatesQuery;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/latest")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.query)
    }

    fn timeout() -> Duration {
        FX_REQUEST_TIMEOUT
    }
}

#[derive(Debug)]
struct FxParser;

impl HttpParser for FxParser {
    type ApiError = serde_json::Value;
    type OutputError = SocketError;

    fn parse_api_error(&self, status: reqwest::StatusCode, error: Self::ApiError) -> Self::OutputError {
        SocketError::HttpResponse(status, error.to_string())
    }
}
