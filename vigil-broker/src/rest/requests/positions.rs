use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::borrow::Cow;
use vigil_instrument::{Conid, Currency, Ticker, account::AccountId, position::Position};
use vigil_integration::protocol::http::RestRequest;

/// Fetch one page of portfolio positions for an account.
///
/// <https://interactivebrokers.github.io/cpwebapi/endpoints> -
/// `GET /portfolio/{accountId}/positions/{pageId}`
#[derive(Debug, Clone, Constructor)]
pub struct GetPositionsRequest {
    account: AccountId,
    page: usize,
}

impl GetPositionsRequest {
    /// The first page is enough: the gateway pages at 100 rows and the accounts this
    /// system watches stay well below that.
    pub fn first_page(account: AccountId) -> Self {
        Self::new(account, 0)
    }
}

impl RestRequest for GetPositionsRequest {
    type Response = Vec<PositionRow>;
    type QueryParams = ();
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Owned(format!("/portfolio/{}/positions/{}", self.account, self.page))
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PositionRow {
    #[serde(rename = "acctId")]
    pub account: AccountId,

    pub conid: i64,

    #[serde(default, rename = "contractDesc")]
    pub contract_desc: Option<String>,

    #[serde(default)]
    pub position: Decimal,

    #[serde(default, rename = "avgPrice")]
    pub avg_price: Decimal,

    #[serde(default, rename = "mktPrice")]
    pub market_price: Decimal,

    #[serde(default)]
    pub currency: Option<Currency>,
}

impl From<PositionRow> for Position {
    fn from(row: PositionRow) -> Self {
        Self {
            account: row.account,
            conid: Conid(row.conid),
            ticker: row
                .contract_desc
                .as_deref()
                .map(str::trim)
                .filter(|desc| !desc.is_empty())
                .map(Ticker::new),
            quantity: row.position,
            avg_price: row.avg_price,
            market_price: row.market_price,
            currency: row.currency,
        }
    }
}
