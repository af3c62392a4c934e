use derive_more::Constructor;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use vigil_instrument::account::AccountId;
use vigil_integration::protocol::http::RestRequest;

/// Select the gateway-side "current" account.
///
/// The orders endpoints only answer for the selected account, so this must precede
/// account-scoped reads.
///
/// <https://interactivebrokers.github.io/cpwebapi/endpoints> - `POST /iserver/account`
#[derive(Debug, Clone, Constructor)]
pub struct SwitchAccountRequest(SwitchAccountBody);

impl SwitchAccountRequest {
    pub fn for_account(account: AccountId) -> Self {
        Self::new(SwitchAccountBody { account })
    }
}

impl RestRequest for SwitchAccountRequest {
    type Response = SwitchAccountResponse;
    type QueryParams = ();
    type Body = SwitchAccountBody;

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/iserver/account")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::POST
    }

    fn body(&self) -> Option<&Self::Body> {
        Some(&self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SwitchAccountBody {
    #[serde(rename = "acctId")]
    pub account: AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SwitchAccountResponse {
    #[serde(default)]
    pub set: bool,

    #[serde(default, rename = "acctId")]
    pub account: Option<AccountId>,
}
